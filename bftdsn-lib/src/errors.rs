use crate::consts;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BftDsnError {
    EmptyInput,
    InvalidCodecParameters(usize, usize),
    CodecConfigMismatch,

    InvalidShardIndex(usize, usize),
    ShardLengthMismatch(usize, usize),
    MissingDataShard(usize),
    ShardSetIncomplete(usize),
    InsufficientShards(usize, usize),
    ReconstructionFailed(String),
    ReconstructedParityMismatch,
    TruncationError(usize, usize),

    DigestVectorLengthMismatch(usize, usize),

    ManifestSerializationFailed(String),
    ManifestDeserializationFailed(String),

    ShardOfferAfterCollecting(usize),
    ShardAlreadyResolved(usize),
    VerifierNotVerified,

    NoProvidersAvailable,
    ProviderOfferFailed(String, String),
    FetchInitiationFailed(String, String),
    ShardExportFailed(usize, String),
    StatusStreamClosed,
    RetrievalTaskFailed(String),

    Io(String),
}

impl std::fmt::Display for BftDsnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BftDsnError::EmptyInput => write!(f, "input must not be empty"),
            BftDsnError::InvalidCodecParameters(k, m) => write!(
                f,
                "invalid codec parameters: k = {}, m = {} (need k >= 1, k + m <= {})",
                k,
                m,
                consts::BFTDSN_MAX_TOTAL_SHARDS
            ),
            BftDsnError::CodecConfigMismatch => write!(f, "shard set was built with a different codec configuration"),

            BftDsnError::InvalidShardIndex(index, total) => write!(f, "invalid shard index: {} (total shards: {})", index, total),
            BftDsnError::ShardLengthMismatch(got, expected) => write!(f, "shard is {}B long, expected {}B", got, expected),
            BftDsnError::MissingDataShard(index) => write!(f, "data shard {} is absent", index),
            BftDsnError::ShardSetIncomplete(present) => write!(f, "shard set has only {} present shards, all slots must be populated", present),
            BftDsnError::InsufficientShards(present, required) => {
                write!(f, "insufficient shards for reconstruction: {} present, {} required", present, required)
            }
            BftDsnError::ReconstructionFailed(err) => write!(f, "reconstruction failed: {}", err),
            BftDsnError::ReconstructedParityMismatch => {
                write!(f, "reconstructed shards are inconsistent with present parity, data likely corrupted")
            }
            BftDsnError::TruncationError(requested, available) => {
                write!(f, "cannot truncate joined data to {}B, only {}B available", requested, available)
            }

            BftDsnError::DigestVectorLengthMismatch(got, expected) => {
                write!(f, "digest vector has {} entries, expected {}", got, expected)
            }

            BftDsnError::ManifestSerializationFailed(err) => write!(f, "failed to serialize shard set manifest: {}", err),
            BftDsnError::ManifestDeserializationFailed(err) => write!(f, "failed to deserialize shard set manifest: {}", err),

            BftDsnError::ShardOfferAfterCollecting(index) => {
                write!(f, "shard {} offered after the collecting phase has ended", index)
            }
            BftDsnError::ShardAlreadyResolved(index) => write!(f, "shard slot {} has already been resolved", index),
            BftDsnError::VerifierNotVerified => write!(f, "shard set verifier has not reached the Verified state"),

            BftDsnError::NoProvidersAvailable => write!(f, "provider directory listed no storage providers"),
            BftDsnError::ProviderOfferFailed(provider, err) => write!(f, "offer query to provider {} failed: {}", provider, err),
            BftDsnError::FetchInitiationFailed(provider, err) => write!(f, "fetch initiation with provider {} failed: {}", provider, err),
            BftDsnError::ShardExportFailed(index, err) => write!(f, "export of shard {} failed: {}", index, err),
            BftDsnError::StatusStreamClosed => write!(f, "provider status stream closed before a terminal status arrived"),
            BftDsnError::RetrievalTaskFailed(err) => write!(f, "retrieval task failed: {}", err),

            BftDsnError::Io(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for BftDsnError {}
