use crate::utils::{format_bytes, manifest_path, read_manifest, read_shard_file};
use bftdsn_lib::{
    BlobStore, CodecConfig, ErasureCodec, LocalBlobStore, ShardSet, ShardSetIntegrityVerifier, ShardSetManifest, VerifierState,
    shard_file_path,
};
use std::{path::PathBuf, process::exit};

pub fn handle_decode_command(input_path: &PathBuf, data_shards: usize, parity_shards: usize, out: &Option<PathBuf>) {
    let output_path = out.clone().unwrap_or_else(|| input_path.clone());

    let manifest_path = manifest_path(input_path);
    let joined = match manifest_path.try_exists() {
        Ok(true) => decode_with_manifest(input_path, &read_manifest(&manifest_path)),
        Ok(false) => {
            println!("No manifest at {:?}, decoding unverified with k = {}, m = {}", manifest_path, data_shards, parity_shards);
            decode_without_manifest(input_path, data_shards, parity_shards)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    };

    if let Err(e) = LocalBlobStore.write_file(&output_path, &joined) {
        eprintln!("Error: {}", e);
        exit(1);
    }
    println!("Recovered {} to {:?}", format_bytes(joined.len()), output_path);
}

/// Digest-verified decode path: every shard file is checked against the
/// committed digest vector, corrupted and missing shards are repaired, and the
/// joined file is checked against the whole-file digest.
fn decode_with_manifest(input_path: &PathBuf, manifest: &ShardSetManifest) -> Vec<u8> {
    let digests = match manifest.get_digest_vector() {
        Ok(digests) => digests,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    };
    let mut verifier = match ShardSetIntegrityVerifier::new(manifest.get_shard_len(), digests) {
        Ok(verifier) => verifier,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    };

    for index in 0..manifest.get_config().total_shards() {
        let shard_path = shard_file_path(input_path, index);
        let shard = match read_shard_file(&shard_path, manifest.get_shard_len()) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                println!("Skipping shard {}: {}", index, e);
                None
            }
        };

        if let Err(e) = verifier.offer_shard(index, shard) {
            eprintln!("Error: {}", e);
            exit(1);
        }
    }

    if verifier.run() != VerifierState::Verified {
        for fault in verifier.get_faults() {
            eprintln!("Shard {}: {}", fault.index, fault.kind);
        }
        match verifier.get_failure() {
            Some(failure) => eprintln!("Error: {}", failure),
            None => eprintln!("Error: shard set is unrecoverable"),
        }
        exit(1);
    }

    for fault in verifier.get_faults() {
        println!("Repaired shard {} ({})", fault.index, fault.kind);
    }

    let set = match verifier.into_verified_set() {
        Ok(set) => set,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    };
    let joined = join_set(&set, manifest.get_config(), manifest.get_original_len());

    if blake3::hash(&joined) != manifest.get_file_digest() {
        eprintln!("Error: recovered file digest does not match the manifest");
        exit(1);
    }
    println!("BLAKE3 Digest verified: {}", const_hex::encode(manifest.get_file_digest().as_bytes()));

    joined
}

/// Fallback decode path for shard sets without a manifest: only erasure-level
/// parity consistency can be checked, and trailing zero padding of the last
/// data shard cannot be stripped.
fn decode_without_manifest(input_path: &PathBuf, data_shards: usize, parity_shards: usize) -> Vec<u8> {
    let config = match CodecConfig::new(data_shards, parity_shards) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    };

    let mut slots: Vec<Option<Vec<u8>>> = Vec::with_capacity(config.total_shards());
    for index in 0..config.total_shards() {
        match LocalBlobStore.read_file(&shard_file_path(input_path, index)) {
            Ok(bytes) => slots.push(Some(bytes)),
            Err(e) => {
                println!("Skipping shard {}: {}", index, e);
                slots.push(None);
            }
        }
    }

    let Some(shard_len) = slots.iter().flatten().map(Vec::len).max() else {
        eprintln!("Error: no shard files found for {:?}", input_path);
        exit(1);
    };

    let mut set = ShardSet::new_empty(config, shard_len);
    for (index, slot) in slots.into_iter().enumerate() {
        if let Some(bytes) = slot {
            if bytes.len() != shard_len {
                println!("Skipping shard {}: {}B long, expected {}B", index, bytes.len(), shard_len);
                continue;
            }
            if let Err(e) = set.set_shard(index, bytes) {
                eprintln!("Error: {}", e);
                exit(1);
            }
        }
    }

    let codec = match ErasureCodec::new(config) {
        Ok(codec) => codec,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    };

    match codec.verify(&set) {
        Ok(true) => println!("No reconstruction needed"),
        Ok(false) => {
            println!("Verification failed, reconstructing data");
            match codec.reconstruct(&set) {
                Ok(recovered) => set = recovered,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    exit(1);
                }
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    }

    join_set(&set, config, shard_len * config.data_shards())
}

fn join_set(set: &ShardSet, config: CodecConfig, original_len: usize) -> Vec<u8> {
    let codec = match ErasureCodec::new(config) {
        Ok(codec) => codec,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    };

    match codec.join(set, original_len) {
        Ok(joined) => joined,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    }
}
