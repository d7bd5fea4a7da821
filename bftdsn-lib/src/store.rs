use crate::errors::BftDsnError;
use std::path::Path;

/// Narrow file-system seam used to materialize and ingest shard files.
///
/// Kept behind a trait so the command surface and tests can swap the backing
/// store without touching codec or verifier logic.
pub trait BlobStore {
    fn read_file(&self, path: &Path) -> Result<Vec<u8>, BftDsnError>;
    fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<(), BftDsnError>;
}

/// `BlobStore` over the local file system.
pub struct LocalBlobStore;

impl BlobStore for LocalBlobStore {
    fn read_file(&self, path: &Path) -> Result<Vec<u8>, BftDsnError> {
        std::fs::read(path).map_err(|err| BftDsnError::Io(format!("failed to read {:?}: {}", path, err)))
    }

    fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<(), BftDsnError> {
        std::fs::write(path, bytes).map_err(|err| BftDsnError::Io(format!("failed to write {:?}: {}", path, err)))
    }
}
