use crate::{
    codec::ErasureCodec,
    digest::{DigestVector, ShardDigestCommitter},
    errors::BftDsnError,
    shard::ShardSet,
};
use log::{debug, warn};

/// States of the shard set integrity state machine.
///
/// `Verified` and `Unrecoverable` are terminal; all other states advance via
/// [`ShardSetIntegrityVerifier::step`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerifierState {
    Collecting,
    Verifying,
    Reconstructing,
    Verified,
    Unrecoverable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShardFaultKind {
    /// The slot was never filled: the shard could not be fetched or loaded.
    Absent,
    /// The shard arrived but its homomorphic digest did not match the commitment.
    Corrupted,
    /// A reconstructed shard failed the second digest pass, so the surviving
    /// shard content itself must be wrong.
    Inconsistent,
}

impl std::fmt::Display for ShardFaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShardFaultKind::Absent => write!(f, "absent"),
            ShardFaultKind::Corrupted => write!(f, "corrupted"),
            ShardFaultKind::Inconsistent => write!(f, "inconsistent after reconstruction"),
        }
    }
}

/// One per-index diagnostic entry, reported for manual fault analysis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShardFault {
    pub index: usize,
    pub kind: ShardFaultKind,
}

/// Drives a candidate shard set from collection to a terminal verdict.
///
/// The machine runs Collecting -> Verifying -> (Reconstructing -> Verifying)
/// -> Verified | Unrecoverable. Absent and digest-corrupted shards are treated
/// identically: both become holes the reconstruction must fill. A successful
/// reconstruction is always followed by a second digest pass over the complete
/// set, which catches a self-consistent but wrong reconstruction that pure
/// erasure verification could miss.
///
/// Reconstruction replaces the working shard set wholesale, so the verifier
/// owns its set exclusively; nothing else may observe it mid-repair.
pub struct ShardSetIntegrityVerifier {
    codec: ErasureCodec,
    committer: ShardDigestCommitter,
    digests: DigestVector,
    set: ShardSet,
    resolved: Vec<bool>,
    faults: Vec<ShardFault>,
    failure: Option<BftDsnError>,
    reconstructed: bool,
    state: VerifierState,
}

impl ShardSetIntegrityVerifier {
    /// Creates a verifier in the `Collecting` state.
    ///
    /// # Arguments
    ///
    /// * `shard_len` - The fixed byte length every offered shard must have.
    /// * `digests` - The committed digest vector the candidate set is checked against.
    pub fn new(shard_len: usize, digests: DigestVector) -> Result<Self, BftDsnError> {
        let config = digests.get_config();

        Ok(ShardSetIntegrityVerifier {
            codec: ErasureCodec::new(config)?,
            committer: ShardDigestCommitter::new(config)?,
            set: ShardSet::new_empty(config, shard_len),
            resolved: vec![false; config.total_shards()],
            faults: Vec::new(),
            failure: None,
            reconstructed: false,
            digests,
            state: VerifierState::Collecting,
        })
    }

    pub fn get_state(&self) -> VerifierState {
        self.state
    }

    /// Faults observed so far; on `Unrecoverable` these name the ultimate cause
    /// per shard index.
    pub fn get_faults(&self) -> &[ShardFault] {
        &self.faults
    }

    /// The codec-level error that forced `Unrecoverable`, if reconstruction itself failed.
    pub fn get_failure(&self) -> Option<&BftDsnError> {
        self.failure.as_ref()
    }

    /// Resolves one shard slot during collection: `Some(bytes)` for a fetched
    /// shard, `None` for a shard that could not be obtained. Once every slot
    /// has been attempted the machine transitions to `Verifying`.
    ///
    /// # Returns
    ///
    /// Returns a `Result` which is:
    /// - `Ok(())` on success.
    /// - `Err(BftDsnError::ShardOfferAfterCollecting)` if collection has already ended.
    /// - `Err(BftDsnError::ShardAlreadyResolved)` if this slot was resolved before.
    /// - `Err(BftDsnError::ShardLengthMismatch)` if the bytes have the wrong length.
    pub fn offer_shard(&mut self, index: usize, shard: Option<Vec<u8>>) -> Result<(), BftDsnError> {
        if self.state != VerifierState::Collecting {
            return Err(BftDsnError::ShardOfferAfterCollecting(index));
        }
        if *self
            .resolved
            .get(index)
            .ok_or(BftDsnError::InvalidShardIndex(index, self.set.total_shards()))?
        {
            return Err(BftDsnError::ShardAlreadyResolved(index));
        }

        match shard {
            Some(bytes) => self.set.set_shard(index, bytes)?,
            None => self.set.mark_absent(index)?,
        }
        self.resolved[index] = true;

        if self.resolved.iter().all(|slot| *slot) {
            debug!("all {} shard slots resolved, verifying", self.set.total_shards());
            self.state = VerifierState::Verifying;
        }

        Ok(())
    }

    /// Advances the state machine by one transition and returns the new state.
    /// A no-op in `Collecting` (until all slots are resolved) and in the
    /// terminal states.
    pub fn step(&mut self) -> VerifierState {
        match self.state {
            VerifierState::Verifying => self.step_verifying(),
            VerifierState::Reconstructing => self.step_reconstructing(),
            VerifierState::Collecting | VerifierState::Verified | VerifierState::Unrecoverable => {}
        }

        self.state
    }

    /// Runs the machine to a terminal state. Returns `Collecting` unchanged if
    /// slots are still outstanding.
    pub fn run(&mut self) -> VerifierState {
        loop {
            match self.state {
                VerifierState::Collecting | VerifierState::Verified | VerifierState::Unrecoverable => return self.state,
                _ => {
                    self.step();
                }
            }
        }
    }

    /// Consumes the verifier and yields the fully verified shard set.
    ///
    /// # Returns
    ///
    /// Returns a `Result` which is:
    /// - `Ok(ShardSet)` when the machine has reached `Verified`.
    /// - `Err(BftDsnError::VerifierNotVerified)` otherwise.
    pub fn into_verified_set(self) -> Result<ShardSet, BftDsnError> {
        if self.state == VerifierState::Verified {
            Ok(self.set)
        } else {
            Err(BftDsnError::VerifierNotVerified)
        }
    }

    fn step_verifying(&mut self) {
        let mut holes = Vec::new();
        let mut inconsistent = Vec::new();

        for index in 0..self.set.total_shards() {
            match self.set.get_shard(index) {
                Ok(Some(shard)) => {
                    let valid = matches!(self.committer.verify_shard(shard, index, &self.digests), Ok(true));
                    if !valid {
                        if self.reconstructed {
                            inconsistent.push(index);
                        } else {
                            warn!("shard {} failed digest verification", index);
                            holes.push((index, ShardFaultKind::Corrupted));
                        }
                    }
                }
                // Slots cannot be absent after a successful reconstruction.
                _ => holes.push((index, ShardFaultKind::Absent)),
            }
        }

        if holes.is_empty() && inconsistent.is_empty() {
            debug!("shard set verified ({} pass)", if self.reconstructed { "second" } else { "first" });
            self.state = VerifierState::Verified;
            return;
        }

        if self.reconstructed {
            // Second pass after reconstruction: digest mismatches here mean the
            // surviving shards fed the decoder wrong content.
            self.faults.extend(inconsistent.into_iter().map(|index| ShardFault {
                index,
                kind: ShardFaultKind::Inconsistent,
            }));
            self.state = VerifierState::Unrecoverable;
            return;
        }

        for &(index, _) in &holes {
            unsafe { self.set.mark_absent(index).unwrap_unchecked() };
        }
        self.faults.extend(holes.into_iter().map(|(index, kind)| ShardFault { index, kind }));
        self.state = VerifierState::Reconstructing;
    }

    fn step_reconstructing(&mut self) {
        match self.codec.reconstruct(&self.set) {
            Ok(recovered) => {
                debug!("reconstruction recovered {} missing shards", self.faults.len());
                self.set = recovered;
                self.reconstructed = true;
                self.state = VerifierState::Verifying;
            }
            Err(err) => {
                warn!("reconstruction failed: {}", err);
                self.failure = Some(err);
                self.state = VerifierState::Unrecoverable;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{codec::CodecConfig, manifest::encode_with_manifest};
    use rand::Rng;

    fn encoded_fixture(k: usize, m: usize, len: usize) -> (crate::shard::ShardSet, DigestVector, usize) {
        let mut rng = rand::rng();
        let file = (0..len).map(|_| rng.random()).collect::<Vec<u8>>();

        let config = CodecConfig::new(k, m).unwrap();
        let (set, manifest) = encode_with_manifest(&file, config).unwrap();
        let shard_len = manifest.get_shard_len();

        (set, manifest.get_digest_vector().unwrap(), shard_len)
    }

    fn offer_all(verifier: &mut ShardSetIntegrityVerifier, set: &crate::shard::ShardSet, lost: &[usize]) {
        for index in 0..set.total_shards() {
            let shard = if lost.contains(&index) {
                None
            } else {
                set.get_shard(index).unwrap().map(<[u8]>::to_vec)
            };
            verifier.offer_shard(index, shard).unwrap();
        }
    }

    #[test]
    fn test_two_lost_shards_are_recovered() {
        let (set, digests, shard_len) = encoded_fixture(4, 2, 10_000);
        let mut verifier = ShardSetIntegrityVerifier::new(shard_len, digests).unwrap();

        assert_eq!(verifier.get_state(), VerifierState::Collecting);
        offer_all(&mut verifier, &set, &[1, 4]);
        assert_eq!(verifier.get_state(), VerifierState::Verifying);

        assert_eq!(verifier.step(), VerifierState::Reconstructing);
        assert_eq!(verifier.step(), VerifierState::Verifying);
        assert_eq!(verifier.step(), VerifierState::Verified);

        let recovered = verifier.into_verified_set().unwrap();
        assert_eq!(recovered, set);
    }

    #[test]
    fn test_three_lost_shards_are_unrecoverable() {
        let (set, digests, shard_len) = encoded_fixture(4, 2, 10_000);
        let mut verifier = ShardSetIntegrityVerifier::new(shard_len, digests).unwrap();

        offer_all(&mut verifier, &set, &[0, 1, 4]);
        assert_eq!(verifier.run(), VerifierState::Unrecoverable);

        assert_eq!(verifier.get_failure(), Some(&BftDsnError::InsufficientShards(3, 4)));
        let fault_indices = verifier.get_faults().iter().map(|fault| fault.index).collect::<Vec<usize>>();
        assert_eq!(fault_indices, vec![0, 1, 4]);
        assert!(verifier.get_faults().iter().all(|fault| fault.kind == ShardFaultKind::Absent));
    }

    #[test]
    fn test_corrupted_shard_is_treated_as_hole_and_repaired() {
        let (set, digests, shard_len) = encoded_fixture(4, 2, 10_000);
        let mut verifier = ShardSetIntegrityVerifier::new(shard_len, digests).unwrap();

        for index in 0..set.total_shards() {
            let mut shard = set.get_shard(index).unwrap().unwrap().to_vec();
            if index == 3 {
                shard[17] ^= 0xff;
            }
            verifier.offer_shard(index, Some(shard)).unwrap();
        }

        assert_eq!(verifier.run(), VerifierState::Verified);
        assert_eq!(
            verifier.get_faults(),
            &[ShardFault {
                index: 3,
                kind: ShardFaultKind::Corrupted
            }]
        );
        assert_eq!(verifier.into_verified_set().unwrap(), set);
    }

    #[test]
    fn test_clean_set_verifies_without_reconstruction() {
        let (set, digests, shard_len) = encoded_fixture(10, 3, 54_321);
        let mut verifier = ShardSetIntegrityVerifier::new(shard_len, digests).unwrap();

        offer_all(&mut verifier, &set, &[]);
        assert_eq!(verifier.step(), VerifierState::Verified);
        assert!(verifier.get_faults().is_empty());
    }

    #[test]
    fn test_offers_are_rejected_outside_collection() {
        let (set, digests, shard_len) = encoded_fixture(2, 1, 64);
        let mut verifier = ShardSetIntegrityVerifier::new(shard_len, digests).unwrap();

        verifier.offer_shard(0, set.get_shard(0).unwrap().map(<[u8]>::to_vec)).unwrap();
        assert_eq!(
            verifier.offer_shard(0, None),
            Err(BftDsnError::ShardAlreadyResolved(0))
        );

        offer_all_remaining(&mut verifier, &set);
        assert_eq!(verifier.offer_shard(1, None), Err(BftDsnError::ShardOfferAfterCollecting(1)));
    }

    fn offer_all_remaining(verifier: &mut ShardSetIntegrityVerifier, set: &crate::shard::ShardSet) {
        for index in 1..set.total_shards() {
            verifier
                .offer_shard(index, set.get_shard(index).unwrap().map(<[u8]>::to_vec))
                .unwrap();
        }
    }
}
