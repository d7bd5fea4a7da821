use bftdsn_lib::{BftDsnError, BlobStore, LocalBlobStore, ShardSetManifest};
use std::{
    path::{Path, PathBuf},
    process::exit,
};

use crate::errors::BftDsnCLIError;

pub fn format_bytes(bytes: usize) -> String {
    let suffixes = ["B", "KB", "MB", "GB"];
    let mut index = 0;
    let mut size = bytes as f64;

    while size >= 1024.0 && index < suffixes.len() - 1 {
        size /= 1024.0;
        index += 1;
    }

    format!("{:.1}{}", size, suffixes[index])
}

/// The manifest of a shard set encoded from `input_path` lives at `<input_path>.manifest`.
pub fn manifest_path(input_path: &Path) -> PathBuf {
    let mut name = input_path.as_os_str().to_os_string();
    name.push(".manifest");
    PathBuf::from(name)
}

pub fn read_manifest(manifest_path: &PathBuf) -> ShardSetManifest {
    match std::fs::read(manifest_path) {
        Ok(bytes) => match ShardSetManifest::from_bytes(&bytes) {
            Ok((manifest, n)) => {
                if n != bytes.len() {
                    eprintln!(
                        "Shard set manifest file {:?} is {} bytes longer than it should be",
                        manifest_path,
                        bytes.len() - n
                    );
                    exit(1);
                }

                manifest
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                exit(1);
            }
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    }
}

pub fn read_shard_file(shard_path: &Path, expected_len: usize) -> Result<Vec<u8>, BftDsnCLIError> {
    match LocalBlobStore.read_file(shard_path) {
        Ok(bytes) => {
            if bytes.len() != expected_len {
                Err(BftDsnCLIError::ShardFileLengthMismatch(bytes.len(), expected_len))
            } else {
                Ok(bytes)
            }
        }
        Err(BftDsnError::Io(e)) => Err(BftDsnCLIError::ShardFileUnreadable(e)),
        Err(e) => Err(BftDsnCLIError::ShardFileUnreadable(e.to_string())),
    }
}

pub fn file_name_of(path: &Path) -> String {
    match path.file_name().and_then(|name| name.to_str()) {
        Some(name) => name.to_string(),
        None => {
            eprintln!("Error: {:?} has no usable file name", path);
            exit(1);
        }
    }
}
