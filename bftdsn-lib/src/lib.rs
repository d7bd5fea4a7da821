//! # BFT-DSN-lib: Byzantine-Fault-Tolerant Distributed Storage Library
//!
//! `bftdsn-lib` provides the erasure-coding and integrity-verification engine of a
//! Byzantine-fault-tolerant distributed storage scheme: a file is split into `k` data and
//! `m` parity shards using a systematic Reed-Solomon code, each shard receives a
//! homomorphic digest commitment, and the original file can later be reconstructed and
//! re-verified even when some shards are missing or were corrupted by unreliable storage
//! providers.
//!
//! The homomorphic digests are the distinguishing piece: parity-shard digests are derived
//! by pushing the data-shard digests through the *same* linear code as the shards
//! themselves, so a parity shard's integrity can be checked without trusting the provider
//! that served it and without re-deriving parity from the full data set.
//!
//! ## How to Use
//!
//! ### 1. Encode a file
//!
//! [`encode_with_manifest`] splits a file, fills in parity and commits the digest vector.
//! The returned [`ShardSetManifest`] carries everything decode needs out of band: original
//! length, (k, m), shard length, the whole-file BLAKE3 digest and the digest vector.
//!
//! ```rust
//! use bftdsn_lib::{CodecConfig, encode_with_manifest};
//!
//! let file = b"a small file that will survive provider failures".to_vec();
//! let config = CodecConfig::new(4, 2).expect("valid codec parameters");
//!
//! let (set, manifest) = encode_with_manifest(&file, config).expect("encoding must succeed");
//! assert_eq!(set.total_shards(), 6);
//! assert_eq!(manifest.get_original_len(), file.len());
//!
//! // The manifest serializes with bincode for storage alongside the shards.
//! let manifest_bytes = manifest.to_bytes().expect("manifest must serialize");
//! assert!(!manifest_bytes.is_empty());
//! ```
//!
//! ### 2. Verify and repair a candidate shard set
//!
//! After fetching shards back (some may be lost or tampered with), feed them to the
//! [`ShardSetIntegrityVerifier`]. It digest-checks every present shard, treats corrupted
//! and absent slots identically as holes, reconstructs when at least `k` valid shards
//! survive, and re-verifies the reconstructed set before declaring success.
//!
//! ```rust
//! use bftdsn_lib::{CodecConfig, ErasureCodec, ShardSetIntegrityVerifier, VerifierState, encode_with_manifest};
//!
//! let file: Vec<u8> = (0u32..10_000).map(|i| (i % 251) as u8).collect();
//! let config = CodecConfig::new(4, 2).expect("valid codec parameters");
//! let (set, manifest) = encode_with_manifest(&file, config).expect("encoding must succeed");
//!
//! let digests = manifest.get_digest_vector().expect("digest vector must be well-formed");
//! let mut verifier = ShardSetIntegrityVerifier::new(manifest.get_shard_len(), digests).expect("verifier setup");
//!
//! // Shards 1 and 4 were lost in transit.
//! for index in 0..set.total_shards() {
//!     let shard = match index {
//!         1 | 4 => None,
//!         _ => set.get_shard(index).expect("index in range").map(<[u8]>::to_vec),
//!     };
//!     verifier.offer_shard(index, shard).expect("slot must accept resolution");
//! }
//!
//! assert_eq!(verifier.run(), VerifierState::Verified);
//!
//! let recovered = verifier.into_verified_set().expect("set must be verified");
//! let codec = ErasureCodec::new(config).expect("codec setup");
//! let joined = codec.join(&recovered, manifest.get_original_len()).expect("join must succeed");
//! assert_eq!(joined, file);
//! ```
//!
//! ### 3. Retrieve shards from storage providers
//!
//! The [`RetrievalOrchestrator`] drives the per-shard remote-fetch protocol (query offer,
//! subscribe to status updates, initiate fetch, export) against any [`ProviderAccess`]
//! implementation, fans out one task per shard, and aggregates terminal
//! [`RetrievalOutcome`]s for the verifier. One provider rejecting its deal never aborts
//! the sibling fetches; the verifier decides recoverability from whatever arrived intact.
//!
//! ## Components
//!
//! - [`ErasureCodec`]: split / encode-parity / verify / reconstruct / join over the
//!   systematic GF(2^8) Reed-Solomon code.
//! - [`ShardDigestCommitter`]: homomorphic per-shard digests, propagated through the code.
//! - [`ShardSetIntegrityVerifier`]: the Collecting → Verifying → Reconstructing →
//!   Verified / Unrecoverable state machine.
//! - [`RetrievalOrchestrator`]: fault-contained fan-out retrieval over [`ProviderAccess`].
//! - [`ShardSetManifest`]: out-of-band metadata (original length, (k, m), digest vector).

mod codec;
mod consts;
mod digest;
mod errors;
mod manifest;
mod retrieval;
mod shard;
mod store;
mod verifier;

#[cfg(test)]
mod tests;

pub use codec::{CodecConfig, ErasureCodec};
pub use consts::{BFTDSN_DEFAULT_DATA_SHARDS, BFTDSN_DEFAULT_PARITY_SHARDS, BFTDSN_MAX_TOTAL_SHARDS};
pub use digest::{DigestVector, SHARD_DIGEST_SIZE, ShardDigest, ShardDigestCommitter};
pub use errors::BftDsnError;
pub use manifest::{ShardSetManifest, encode_with_manifest};
pub use retrieval::{
    Offer, ProviderAccess, ProviderDirectory, ProviderId, ProviderStatus, RetrievalConfig, RetrievalOrchestrator, RetrievalOutcome, SessionId,
    ShardHandle, StatusEvent, shard_file_path,
};
pub use shard::ShardSet;
pub use store::{BlobStore, LocalBlobStore};
pub use verifier::{ShardFault, ShardFaultKind, ShardSetIntegrityVerifier, VerifierState};
