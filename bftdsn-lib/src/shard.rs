use crate::{codec::CodecConfig, errors::BftDsnError};

/// An ordered, index-addressed set of exactly `k + m` equal-length shard slots.
///
/// Slots `0..k` hold data shards, slots `k..k+m` hold parity shards. A slot is
/// either present (`Some`) or absent (`None`); validity of present shards is
/// tracked by the integrity verifier, not here. A `ShardSet` together with its
/// `DigestVector` is created once at encode time and treated as immutable;
/// reconstruction produces a fresh `ShardSet` instead of patching slots in place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShardSet {
    config: CodecConfig,
    shard_len: usize,
    shards: Vec<Option<Vec<u8>>>,
}

impl ShardSet {
    /// Creates a `ShardSet` with all `k + m` slots absent.
    ///
    /// # Arguments
    ///
    /// * `config` - The (k, m) codec configuration this set belongs to.
    /// * `shard_len` - The fixed byte length every present shard must have.
    pub fn new_empty(config: CodecConfig, shard_len: usize) -> Self {
        ShardSet {
            config,
            shard_len,
            shards: vec![None; config.total_shards()],
        }
    }

    pub(crate) fn from_parts(config: CodecConfig, shard_len: usize, shards: Vec<Option<Vec<u8>>>) -> Self {
        debug_assert_eq!(shards.len(), config.total_shards());
        ShardSet { config, shard_len, shards }
    }

    pub fn get_config(&self) -> CodecConfig {
        self.config
    }

    pub fn get_shard_len(&self) -> usize {
        self.shard_len
    }

    pub fn total_shards(&self) -> usize {
        self.config.total_shards()
    }

    /// Number of slots currently holding shard bytes.
    pub fn present_count(&self) -> usize {
        self.shards.iter().filter(|slot| slot.is_some()).count()
    }

    /// Returns `true` iff every slot holds shard bytes.
    pub fn is_complete(&self) -> bool {
        self.present_count() == self.total_shards()
    }

    /// Looks up the shard at `index`.
    ///
    /// # Returns
    ///
    /// Returns a `Result` which is:
    /// - `Ok(Some(&[u8]))` if the slot is present.
    /// - `Ok(None)` if the slot is absent.
    /// - `Err(BftDsnError::InvalidShardIndex)` if `index` is out of bounds.
    pub fn get_shard(&self, index: usize) -> Result<Option<&[u8]>, BftDsnError> {
        self.shards
            .get(index)
            .map(|slot| slot.as_deref())
            .ok_or(BftDsnError::InvalidShardIndex(index, self.total_shards()))
    }

    /// Populates the slot at `index` with shard bytes.
    ///
    /// # Returns
    ///
    /// Returns a `Result` which is:
    /// - `Ok(())` on success.
    /// - `Err(BftDsnError::InvalidShardIndex)` if `index` is out of bounds.
    /// - `Err(BftDsnError::ShardLengthMismatch)` if `bytes` is not exactly `shard_len` long.
    pub fn set_shard(&mut self, index: usize, bytes: Vec<u8>) -> Result<(), BftDsnError> {
        if index >= self.total_shards() {
            return Err(BftDsnError::InvalidShardIndex(index, self.total_shards()));
        }
        if bytes.len() != self.shard_len {
            return Err(BftDsnError::ShardLengthMismatch(bytes.len(), self.shard_len));
        }

        self.shards[index] = Some(bytes);
        Ok(())
    }

    /// Marks the slot at `index` absent, e.g. when a shard file failed to load.
    pub fn mark_absent(&mut self, index: usize) -> Result<(), BftDsnError> {
        if index >= self.total_shards() {
            return Err(BftDsnError::InvalidShardIndex(index, self.total_shards()));
        }

        self.shards[index] = None;
        Ok(())
    }

    pub(crate) fn slots(&self) -> &[Option<Vec<u8>>] {
        &self.shards
    }

    pub(crate) fn clone_slots(&self) -> Vec<Option<Vec<u8>>> {
        self.shards.clone()
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [Option<Vec<u8>>] {
        &mut self.shards
    }
}
