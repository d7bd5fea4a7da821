use crate::{
    codec::{CodecConfig, ErasureCodec},
    consts::BFTDSN_BINCODE_CONFIG,
    digest::{DigestVector, ShardDigest, ShardDigestCommitter},
    errors::BftDsnError,
    shard::ShardSet,
};
use serde::{Deserialize, Serialize};

/// Out-of-band metadata for one encoded shard set.
///
/// The erasure code alone cannot tell how long the original file was (the last
/// data shard may carry zero padding), nor which (k, m) produced a shard tree
/// on disk. The manifest persists both, together with the BLAKE3 digest of the
/// whole file and the committed digest vector, so decode and retrieval never
/// depend on caller-supplied parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShardSetManifest {
    original_len: usize,
    shard_len: usize,
    config: CodecConfig,
    file_digest: blake3::Hash,
    digests: Vec<ShardDigest>,
}

impl ShardSetManifest {
    pub fn get_original_len(&self) -> usize {
        self.original_len
    }

    pub fn get_shard_len(&self) -> usize {
        self.shard_len
    }

    pub fn get_config(&self) -> CodecConfig {
        self.config
    }

    pub fn get_file_digest(&self) -> blake3::Hash {
        self.file_digest
    }

    pub fn get_digest_vector(&self) -> Result<DigestVector, BftDsnError> {
        DigestVector::from_parts(self.config, self.digests.clone())
    }

    /// Serializes the manifest into a vector of bytes using `bincode`.
    pub fn to_bytes(&self) -> Result<Vec<u8>, BftDsnError> {
        bincode::serde::encode_to_vec(self, BFTDSN_BINCODE_CONFIG).map_err(|err| BftDsnError::ManifestSerializationFailed(err.to_string()))
    }

    /// Deserializes a manifest from a byte slice using `bincode`.
    ///
    /// # Returns
    ///
    /// Returns a `Result` which is:
    /// - `Ok((Self, usize))` containing the manifest and the number of bytes read.
    /// - `Err(BftDsnError::ManifestDeserializationFailed)` if decoding fails or
    ///   the decoded fields are internally inconsistent.
    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, usize), BftDsnError> {
        match bincode::serde::decode_from_slice::<ShardSetManifest, bincode::config::Configuration>(bytes, BFTDSN_BINCODE_CONFIG) {
            Ok((manifest, n)) => {
                if manifest.digests.len() != manifest.config.total_shards() {
                    return Err(BftDsnError::ManifestDeserializationFailed(
                        "digest count and codec configuration do not match".to_string(),
                    ));
                }
                if manifest.original_len == 0 || manifest.shard_len == 0 {
                    return Err(BftDsnError::ManifestDeserializationFailed("zero-length shard set".to_string()));
                }
                if manifest.original_len > manifest.shard_len * manifest.config.data_shards() {
                    return Err(BftDsnError::ManifestDeserializationFailed(
                        "original length exceeds data shard capacity".to_string(),
                    ));
                }

                Ok((manifest, n))
            }
            Err(err) => Err(BftDsnError::ManifestDeserializationFailed(err.to_string())),
        }
    }
}

/// Runs the full encode pipeline over one file: split into data shards, fill
/// parity, commit the homomorphic digest vector, and capture the manifest.
///
/// # Arguments
///
/// * `file` - The original file bytes.
/// * `config` - The (k, m) codec configuration to encode with.
///
/// # Returns
///
/// Returns a `Result` which is:
/// - `Ok((ShardSet, ShardSetManifest))` with all k + m shards populated.
/// - `Err(BftDsnError::EmptyInput)` if `file` is empty.
pub fn encode_with_manifest(file: &[u8], config: CodecConfig) -> Result<(ShardSet, ShardSetManifest), BftDsnError> {
    let codec = ErasureCodec::new(config)?;
    let committer = ShardDigestCommitter::new(config)?;

    let mut set = codec.split(file)?;
    codec.encode_parity(&mut set)?;
    let vector = committer.commit(&set)?;

    let manifest = ShardSetManifest {
        original_len: file.len(),
        shard_len: set.get_shard_len(),
        config,
        file_digest: blake3::hash(file),
        digests: vector.iter().copied().collect(),
    };

    Ok((set, manifest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_manifest_serialization_roundtrip() {
        let mut rng = rand::rng();
        let file = (0..10_000).map(|_| rng.random()).collect::<Vec<u8>>();

        let config = CodecConfig::new(4, 2).unwrap();
        let (_, manifest) = encode_with_manifest(&file, config).unwrap();

        let bytes = manifest.to_bytes().unwrap();
        let (decoded, n) = ShardSetManifest::from_bytes(&bytes).unwrap();

        assert_eq!(n, bytes.len());
        assert_eq!(decoded, manifest);
        assert_eq!(decoded.get_original_len(), 10_000);
        assert_eq!(decoded.get_shard_len(), 2500);
        assert_eq!(decoded.get_file_digest(), blake3::hash(&file));
    }

    #[test]
    fn test_manifest_decode_reports_trailing_bytes() {
        let mut rng = rand::rng();
        let file = (0..512).map(|_| rng.random()).collect::<Vec<u8>>();

        let config = CodecConfig::new(3, 2).unwrap();
        let (_, manifest) = encode_with_manifest(&file, config).unwrap();

        let mut bytes = manifest.to_bytes().unwrap();
        let clean_len = bytes.len();
        bytes.extend_from_slice(&[0xab; 7]);

        // Consumers compare the reported read count against the buffer length
        // and refuse manifest files carrying trailing bytes.
        let (decoded, n) = ShardSetManifest::from_bytes(&bytes).unwrap();
        assert_eq!(n, clean_len);
        assert!(n < bytes.len());
        assert_eq!(decoded, manifest);
    }

    #[test]
    fn test_manifest_rejects_inconsistent_fields() {
        let mut rng = rand::rng();
        let file = (0..256).map(|_| rng.random()).collect::<Vec<u8>>();

        let config = CodecConfig::new(4, 2).unwrap();
        let (_, manifest) = encode_with_manifest(&file, config).unwrap();

        let mut tampered = manifest.clone();
        tampered.digests.pop();
        let bytes = tampered.to_bytes().unwrap();

        assert!(matches!(ShardSetManifest::from_bytes(&bytes), Err(BftDsnError::ManifestDeserializationFailed(_))));
    }
}
