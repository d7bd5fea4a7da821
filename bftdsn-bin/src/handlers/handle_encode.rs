use crate::utils::{format_bytes, manifest_path};
use bftdsn_lib::{BlobStore, CodecConfig, LocalBlobStore, ShardSet, ShardSetManifest, encode_with_manifest, shard_file_path};
use std::{path::PathBuf, process::exit};

pub fn handle_encode_command(input_path: &PathBuf, data_shards: usize, parity_shards: usize) {
    let (set, _) = encode_and_store(input_path, data_shards, parity_shards);
    println!("{} shard files placed next to {:?}", set.total_shards(), input_path);
}

/// Encodes `input_path` and writes all shard files plus the manifest next to
/// it. Shared between `encode` (which stops here) and `deal` (which goes on to
/// place the shard files with providers).
pub(super) fn encode_and_store(input_path: &PathBuf, data_shards: usize, parity_shards: usize) -> (ShardSet, ShardSetManifest) {
    let config = match CodecConfig::new(data_shards, parity_shards) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    };

    let store = LocalBlobStore;
    let file = match store.read_file(input_path) {
        Ok(bytes) => {
            println!("Read {:?}", input_path);
            println!("Size {}", format_bytes(bytes.len()));
            bytes
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    };

    let (set, manifest) = match encode_with_manifest(&file, config) {
        Ok(encoded) => encoded,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    };

    println!("BLAKE3 Digest: {}", const_hex::encode(manifest.get_file_digest().as_bytes()));
    println!("Data shards: {}", config.data_shards());
    println!("Parity shards: {}", config.parity_shards());
    println!("Shard size {}", format_bytes(manifest.get_shard_len()));

    for index in 0..set.total_shards() {
        let shard_path = shard_file_path(input_path, index);
        match set.get_shard(index) {
            Ok(Some(bytes)) => {
                if let Err(e) = store.write_file(&shard_path, bytes) {
                    eprintln!("Error: {}", e);
                    exit(1);
                }
            }
            _ => {
                eprintln!("Error: shard {} is absent after encoding", index);
                exit(1);
            }
        }
    }

    let manifest_path = manifest_path(input_path);
    match manifest.to_bytes() {
        Ok(bytes) => {
            if let Err(e) = store.write_file(&manifest_path, &bytes) {
                eprintln!("Error: {}", e);
                exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    }
    println!("Manifest written to {:?}", manifest_path);

    (set, manifest)
}
