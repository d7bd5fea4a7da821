use crate::{
    codec::{CodecConfig, ErasureCodec},
    errors::BftDsnError,
    shard::ShardSet,
};
use rayon::prelude::*;
use reed_solomon_erasure::galois_8;
use serde::{Deserialize, Serialize};

/// Byte length of a shard digest.
pub const SHARD_DIGEST_SIZE: usize = 32;

// First evaluation point; lanes use consecutive points 2, 3, .., 33, all
// distinct and outside {0, 1} so no lane degenerates to a plain XOR fold.
const FIRST_EVALUATION_POINT: u8 = 2;

/// Fixed-size homomorphic digest of one shard.
///
/// Lane `j` evaluates the shard payload as a GF(2^8) polynomial at a fixed
/// point, so the digest is linear in the shard bytes under the field
/// arithmetic of the erasure code: `digest(a*A + b*B) = a*digest(A) + b*digest(B)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardDigest([u8; SHARD_DIGEST_SIZE]);

impl ShardDigest {
    pub fn as_bytes(&self) -> &[u8; SHARD_DIGEST_SIZE] {
        &self.0
    }
}

impl From<[u8; SHARD_DIGEST_SIZE]> for ShardDigest {
    fn from(bytes: [u8; SHARD_DIGEST_SIZE]) -> Self {
        ShardDigest(bytes)
    }
}

impl std::fmt::Display for ShardDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Ordered sequence of `k + m` digests, index-aligned with a `ShardSet`.
///
/// Digests at indices `0..k` are computed from data shard content; digests at
/// indices `k..k+m` are the linear-code encoding of the first k digests,
/// established once at commit time and treated as the trusted reference for
/// the corresponding parity shards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestVector {
    config: CodecConfig,
    digests: Vec<ShardDigest>,
}

impl DigestVector {
    pub(crate) fn from_parts(config: CodecConfig, digests: Vec<ShardDigest>) -> Result<Self, BftDsnError> {
        if digests.len() != config.total_shards() {
            return Err(BftDsnError::DigestVectorLengthMismatch(digests.len(), config.total_shards()));
        }

        Ok(DigestVector { config, digests })
    }

    pub fn get_config(&self) -> CodecConfig {
        self.config
    }

    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&ShardDigest, BftDsnError> {
        self.digests.get(index).ok_or(BftDsnError::InvalidShardIndex(index, self.digests.len()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ShardDigest> {
        self.digests.iter()
    }
}

/// Computes homomorphic per-shard digests and propagates them through the
/// erasure code, so parity-shard digests never have to be recomputed from
/// parity content at commit time.
pub struct ShardDigestCommitter {
    codec: ErasureCodec,
}

impl ShardDigestCommitter {
    pub fn new(config: CodecConfig) -> Result<Self, BftDsnError> {
        Ok(ShardDigestCommitter { codec: ErasureCodec::new(config)? })
    }

    pub fn get_config(&self) -> CodecConfig {
        self.codec.get_config()
    }

    /// Computes the 32-byte homomorphic digest of one shard.
    ///
    /// Single pass over the payload, Horner evaluation in all 32 lanes.
    pub fn digest(&self, shard: &[u8]) -> ShardDigest {
        let mut lanes = [0u8; SHARD_DIGEST_SIZE];

        for &byte in shard {
            for (j, lane) in lanes.iter_mut().enumerate() {
                let point = FIRST_EVALUATION_POINT + j as u8;
                *lane = galois_8::add(galois_8::mul(*lane, point), byte);
            }
        }

        ShardDigest(lanes)
    }

    /// Computes the digest of every data shard, then fills parity digests by
    /// applying the code's parity transform to the digest rows.
    ///
    /// Deterministic and side-effect-free: committing an unchanged set always
    /// yields the same vector.
    ///
    /// # Returns
    ///
    /// Returns a `Result` which is:
    /// - `Ok(DigestVector)` aligned with the shard set.
    /// - `Err(BftDsnError::CodecConfigMismatch)` if `set` was built for a different (k, m).
    /// - `Err(BftDsnError::MissingDataShard)` if any data shard is absent.
    pub fn commit(&self, set: &ShardSet) -> Result<DigestVector, BftDsnError> {
        let config = self.codec.get_config();
        if set.get_config() != config {
            return Err(BftDsnError::CodecConfigMismatch);
        }

        let data_digests = (0..config.data_shards())
            .into_par_iter()
            .map(|i| match set.get_shard(i) {
                Ok(Some(shard)) => Ok(self.digest(shard)),
                Ok(None) => Err(BftDsnError::MissingDataShard(i)),
                Err(e) => Err(e),
            })
            .collect::<Result<Vec<ShardDigest>, BftDsnError>>()?;

        let mut rows = data_digests.iter().map(|digest| digest.as_bytes().to_vec()).collect::<Vec<Vec<u8>>>();
        rows.extend((0..config.parity_shards()).map(|_| vec![0u8; SHARD_DIGEST_SIZE]));
        self.codec.encode_rows(&mut rows)?;

        let digests = rows
            .into_iter()
            .map(|row| {
                let mut bytes = [0u8; SHARD_DIGEST_SIZE];
                bytes.copy_from_slice(&row);
                ShardDigest(bytes)
            })
            .collect::<Vec<ShardDigest>>();

        DigestVector::from_parts(config, digests)
    }

    /// Recomputes the digest of `shard` and compares it bit-for-bit against the
    /// committed digest at `index`. The authoritative per-shard corruption
    /// check; usable even when only this one shard is available.
    pub fn verify_shard(&self, shard: &[u8], index: usize, vector: &DigestVector) -> Result<bool, BftDsnError> {
        let committed = vector.get(index)?;
        Ok(self.digest(shard) == *committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn committed_set(k: usize, m: usize, len: usize) -> (ShardSet, DigestVector, ShardDigestCommitter) {
        let mut rng = rand::rng();
        let file = (0..len).map(|_| rng.random()).collect::<Vec<u8>>();

        let config = CodecConfig::new(k, m).unwrap();
        let codec = ErasureCodec::new(config).unwrap();
        let committer = ShardDigestCommitter::new(config).unwrap();

        let mut set = codec.split(&file).unwrap();
        codec.encode_parity(&mut set).unwrap();
        let vector = committer.commit(&set).unwrap();

        (set, vector, committer)
    }

    #[test]
    fn prop_test_parity_digests_match_parity_content() {
        const NUM_TEST_ITERATIONS: usize = 8;
        let mut rng = rand::rng();

        (0..NUM_TEST_ITERATIONS).for_each(|_| {
            let k = rng.random_range(1..=12);
            let m = rng.random_range(0..=6);
            let len = rng.random_range(1..=4096);

            let (set, vector, committer) = committed_set(k, m, len);

            // The encode-derived parity digests must equal the digests computed
            // directly from the parity shard payloads.
            for index in 0..set.total_shards() {
                let shard = set.get_shard(index).unwrap().unwrap();
                assert!(committer.verify_shard(shard, index, &vector).unwrap());
            }
        });
    }

    #[test]
    fn prop_test_single_byte_flip_is_detected_in_exactly_one_shard() {
        let mut rng = rand::rng();
        let (set, vector, committer) = committed_set(4, 2, 2500);

        let victim = rng.random_range(0..set.total_shards());
        let mut corrupted = set.get_shard(victim).unwrap().unwrap().to_vec();
        let position = rng.random_range(0..corrupted.len());
        corrupted[position] ^= 0x01;

        assert!(!committer.verify_shard(&corrupted, victim, &vector).unwrap());
        for index in (0..set.total_shards()).filter(|&i| i != victim) {
            let shard = set.get_shard(index).unwrap().unwrap();
            assert!(committer.verify_shard(shard, index, &vector).unwrap());
        }
    }

    #[test]
    fn test_commit_is_idempotent() {
        let (set, vector, committer) = committed_set(10, 3, 12_345);
        assert_eq!(committer.commit(&set).unwrap(), vector);
        assert_eq!(committer.commit(&set).unwrap(), vector);
    }

    #[test]
    fn test_digest_is_linear_under_field_arithmetic() {
        let mut rng = rand::rng();
        let committer = ShardDigestCommitter::new(CodecConfig::new(2, 1).unwrap()).unwrap();

        let a = (0..512).map(|_| rng.random()).collect::<Vec<u8>>();
        let b = (0..512).map(|_| rng.random()).collect::<Vec<u8>>();
        let coefficient: u8 = rng.random();

        let combined = a
            .iter()
            .zip(b.iter())
            .map(|(&x, &y)| galois_8::add(galois_8::mul(coefficient, x), y))
            .collect::<Vec<u8>>();

        let expected = committer
            .digest(&a)
            .as_bytes()
            .iter()
            .zip(committer.digest(&b).as_bytes())
            .map(|(&x, &y)| galois_8::add(galois_8::mul(coefficient, x), y))
            .collect::<Vec<u8>>();

        assert_eq!(committer.digest(&combined).as_bytes().as_slice(), expected.as_slice());
    }
}
