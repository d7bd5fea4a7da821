use crate::{consts::BFTDSN_MAX_TOTAL_SHARDS, errors::BftDsnError, shard::ShardSet};
use reed_solomon_erasure::galois_8::ReedSolomon;
use serde::{Deserialize, Serialize};

/// Explicit (k, m) parameters of the systematic Reed-Solomon code.
///
/// Passed into every component constructor instead of being held as
/// package-level state, so shard sets with different configurations can
/// coexist in one process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    data_shards: usize,
    parity_shards: usize,
}

impl CodecConfig {
    /// Creates a new codec configuration.
    ///
    /// # Arguments
    ///
    /// * `data_shards` - Parameter K of the RS code, must be >= 1.
    /// * `parity_shards` - Parameter M of the RS code, may be 0.
    ///
    /// # Returns
    ///
    /// Returns a `Result` which is:
    /// - `Ok(CodecConfig)` if the parameters are valid.
    /// - `Err(BftDsnError::InvalidCodecParameters)` if k < 1 or k + m exceeds the GF(2^8) limit of 255 shards.
    pub fn new(data_shards: usize, parity_shards: usize) -> Result<Self, BftDsnError> {
        if data_shards < 1 || data_shards + parity_shards > BFTDSN_MAX_TOTAL_SHARDS {
            return Err(BftDsnError::InvalidCodecParameters(data_shards, parity_shards));
        }

        Ok(CodecConfig { data_shards, parity_shards })
    }

    pub fn data_shards(&self) -> usize {
        self.data_shards
    }

    pub fn parity_shards(&self) -> usize {
        self.parity_shards
    }

    pub fn total_shards(&self) -> usize {
        self.data_shards + self.parity_shards
    }
}

/// Thin adapter over the systematic GF(2^8) Reed-Solomon code.
///
/// Exposes the split / encode-parity / verify / reconstruct / join operations
/// the rest of the engine is built on. All operations are deterministic and
/// side-effect-free except `encode_parity`, which fills the parity slots of a
/// freshly split set in place.
pub struct ErasureCodec {
    config: CodecConfig,
    // None when parity_shards == 0: the underlying code requires m >= 1,
    // and a parity-less set degenerates to plain chunking.
    encoder: Option<ReedSolomon>,
}

impl ErasureCodec {
    /// Creates a codec for the given configuration.
    pub fn new(config: CodecConfig) -> Result<Self, BftDsnError> {
        let encoder = if config.parity_shards() > 0 {
            Some(
                ReedSolomon::new(config.data_shards(), config.parity_shards())
                    .map_err(|_| BftDsnError::InvalidCodecParameters(config.data_shards(), config.parity_shards()))?,
            )
        } else {
            None
        };

        Ok(ErasureCodec { config, encoder })
    }

    pub fn get_config(&self) -> CodecConfig {
        self.config
    }

    /// Partitions `file` into k equal-length data shards, zero-padding the tail,
    /// and allocates m zeroed parity shards of the same length.
    ///
    /// # Returns
    ///
    /// Returns a `Result` which is:
    /// - `Ok(ShardSet)` with all k + m slots populated (parity still zeroed).
    /// - `Err(BftDsnError::EmptyInput)` if `file` is empty.
    pub fn split(&self, file: &[u8]) -> Result<ShardSet, BftDsnError> {
        if file.is_empty() {
            return Err(BftDsnError::EmptyInput);
        }

        let k = self.config.data_shards();
        let shard_len = file.len().div_ceil(k);

        let mut shards = Vec::with_capacity(self.config.total_shards());
        for i in 0..k {
            let from = i * shard_len;
            let to = ((i + 1) * shard_len).min(file.len());

            let mut shard = if from < file.len() { file[from..to].to_vec() } else { Vec::new() };
            shard.resize(shard_len, 0);
            shards.push(Some(shard));
        }
        for _ in 0..self.config.parity_shards() {
            shards.push(Some(vec![0u8; shard_len]));
        }

        Ok(ShardSet::from_parts(self.config, shard_len, shards))
    }

    /// Computes the parity shards in place from the data shards, using the
    /// code's generator matrix. Deterministic: the same data shards always
    /// produce the same parity shards.
    ///
    /// # Returns
    ///
    /// Returns a `Result` which is:
    /// - `Ok(())` on success.
    /// - `Err(BftDsnError::CodecConfigMismatch)` if `set` was built for a different (k, m).
    /// - `Err(BftDsnError::ShardSetIncomplete)` if any slot is absent.
    pub fn encode_parity(&self, set: &mut ShardSet) -> Result<(), BftDsnError> {
        if set.get_config() != self.config {
            return Err(BftDsnError::CodecConfigMismatch);
        }
        if !set.is_complete() {
            return Err(BftDsnError::ShardSetIncomplete(set.present_count()));
        }

        let Some(encoder) = &self.encoder else {
            return Ok(());
        };

        let mut rows = Vec::with_capacity(self.config.total_shards());
        for (i, slot) in set.slots_mut().iter_mut().enumerate() {
            rows.push(slot.take().ok_or(BftDsnError::MissingDataShard(i))?);
        }

        let encoded = encoder.encode(&mut rows);
        for (slot, row) in set.slots_mut().iter_mut().zip(rows) {
            *slot = Some(row);
        }
        encoded.map_err(|err| BftDsnError::ReconstructionFailed(err.to_string()))
    }

    /// Checks that every parity shard equals the value re-derived from the
    /// current data shards. A pure consistency check, not a cryptographic proof.
    ///
    /// # Returns
    ///
    /// `Ok(false)` when any slot is absent (equality cannot be asserted without
    /// content) or when re-derived parity differs, `Ok(true)` otherwise.
    pub fn verify(&self, set: &ShardSet) -> Result<bool, BftDsnError> {
        if set.get_config() != self.config {
            return Err(BftDsnError::CodecConfigMismatch);
        }

        let Some(rows) = set.slots().iter().map(|slot| slot.as_deref()).collect::<Option<Vec<&[u8]>>>() else {
            return Ok(false);
        };

        match &self.encoder {
            Some(encoder) => encoder.verify(&rows).map_err(|err| BftDsnError::ReconstructionFailed(err.to_string())),
            None => Ok(true),
        }
    }

    /// Solves the linear system to recover all absent slots, given at least k
    /// present shards (any mix of data and parity).
    ///
    /// Produces a brand-new `ShardSet`; the input is never mutated, which keeps
    /// failure analysis on the original set possible.
    ///
    /// # Returns
    ///
    /// Returns a `Result` which is:
    /// - `Ok(ShardSet)` with all slots populated.
    /// - `Err(BftDsnError::InsufficientShards)` if fewer than k shards are present.
    /// - `Err(BftDsnError::ReconstructedParityMismatch)` if the recovered data is
    ///   inconsistent with the present parity, which signals corrupted or
    ///   adversarial shard content.
    pub fn reconstruct(&self, set: &ShardSet) -> Result<ShardSet, BftDsnError> {
        if set.get_config() != self.config {
            return Err(BftDsnError::CodecConfigMismatch);
        }

        let present = set.present_count();
        if present < self.config.data_shards() {
            return Err(BftDsnError::InsufficientShards(present, self.config.data_shards()));
        }

        let mut slots = set.clone_slots();
        if let Some(encoder) = &self.encoder {
            encoder.reconstruct(&mut slots).map_err(|err| match err {
                reed_solomon_erasure::Error::TooFewShardsPresent => BftDsnError::InsufficientShards(present, self.config.data_shards()),
                other => BftDsnError::ReconstructionFailed(other.to_string()),
            })?;
        }

        let recovered = ShardSet::from_parts(self.config, set.get_shard_len(), slots);
        if !self.verify(&recovered)? {
            return Err(BftDsnError::ReconstructedParityMismatch);
        }

        Ok(recovered)
    }

    /// Concatenates the k data shards and truncates to `original_len`.
    ///
    /// The original file length is not self-describing (the last data shard may
    /// carry zero padding), so it must be supplied out of band, usually from
    /// the shard set manifest.
    ///
    /// # Returns
    ///
    /// Returns a `Result` which is:
    /// - `Ok(Vec<u8>)` with exactly `original_len` bytes.
    /// - `Err(BftDsnError::MissingDataShard)` if any data slot is absent.
    /// - `Err(BftDsnError::TruncationError)` if `original_len` exceeds the concatenated length.
    pub fn join(&self, set: &ShardSet, original_len: usize) -> Result<Vec<u8>, BftDsnError> {
        if set.get_config() != self.config {
            return Err(BftDsnError::CodecConfigMismatch);
        }

        let available = self.config.data_shards() * set.get_shard_len();
        if original_len > available {
            return Err(BftDsnError::TruncationError(original_len, available));
        }

        let mut joined = Vec::with_capacity(available);
        for i in 0..self.config.data_shards() {
            let shard = set.get_shard(i)?.ok_or(BftDsnError::MissingDataShard(i))?;
            joined.extend_from_slice(shard);
        }

        joined.truncate(original_len);
        Ok(joined)
    }

    /// Applies the parity transform to arbitrary equal-length byte rows, one
    /// row per shard index. This is how digest rows inherit the exact generator
    /// matrix of the shard code.
    pub(crate) fn encode_rows(&self, rows: &mut Vec<Vec<u8>>) -> Result<(), BftDsnError> {
        if rows.len() != self.config.total_shards() {
            return Err(BftDsnError::CodecConfigMismatch);
        }

        match &self.encoder {
            Some(encoder) => encoder.encode(rows).map_err(|err| BftDsnError::ReconstructionFailed(err.to_string())),
            None => Ok(()),
        }
    }
}
