/// Fixed configuration for `bincode` serialization and deserialization.
pub const BFTDSN_BINCODE_CONFIG: bincode::config::Configuration = bincode::config::standard();

/// Default number of data shards (parameter K of the RS code).
pub const BFTDSN_DEFAULT_DATA_SHARDS: usize = 10;

/// Default number of parity shards (parameter M of the RS code).
pub const BFTDSN_DEFAULT_PARITY_SHARDS: usize = 3;

/// Upper bound on k + m, imposed by the GF(2^8) Reed-Solomon code.
pub const BFTDSN_MAX_TOTAL_SHARDS: usize = 255;
