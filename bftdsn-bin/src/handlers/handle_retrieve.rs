use crate::{
    providers::DirectoryProviderStore,
    utils::{file_name_of, format_bytes, manifest_path, read_manifest},
};
use bftdsn_lib::{
    BftDsnError, BlobStore, ErasureCodec, LocalBlobStore, RetrievalConfig, RetrievalOrchestrator, RetrievalOutcome, ShardHandle,
    ShardSetIntegrityVerifier, VerifierState,
};
use std::{path::PathBuf, process::exit, sync::Arc, time::Duration};

pub async fn handle_retrieve_command(input_path: &PathBuf, output_path: &PathBuf, store_dir: &PathBuf, timeout_secs: u64) {
    let manifest = read_manifest(&manifest_path(input_path));

    let store = match DirectoryProviderStore::open(store_dir) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    };
    let orchestrator = match RetrievalOrchestrator::new(
        Arc::clone(&store),
        store.as_ref(),
        RetrievalConfig {
            shard_deadline: Duration::from_secs(timeout_secs),
        },
    ) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    };

    let file_name = file_name_of(input_path);
    let handles = (0..manifest.get_config().total_shards())
        .map(|index| ShardHandle {
            index,
            name: format!("{}.{}", file_name, index),
        })
        .collect::<Vec<ShardHandle>>();

    println!("Retrieving {} shards from providers under {:?}", handles.len(), store_dir);
    let outcomes = orchestrator.retrieve_all(&handles, output_path).await;

    let digests = match manifest.get_digest_vector() {
        Ok(digests) => digests,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    };
    let mut verifier = match ShardSetIntegrityVerifier::new(manifest.get_shard_len(), digests) {
        Ok(verifier) => verifier,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    };

    for (index, outcome) in outcomes.into_iter().enumerate() {
        let bytes = shard_bytes_for_offer(index, outcome, manifest.get_shard_len());
        if let Err(e) = verifier.offer_shard(index, bytes) {
            eprintln!("Error: {}", e);
            exit(1);
        }
    }

    if verifier.run() != VerifierState::Verified {
        for fault in verifier.get_faults() {
            eprintln!("Shard {}: {}", fault.index, fault.kind);
        }
        match verifier.get_failure() {
            Some(failure) => eprintln!("Error: {}", failure),
            None => eprintln!("Error: shard set is unrecoverable"),
        }
        exit(1);
    }

    for fault in verifier.get_faults() {
        println!("Repaired shard {} ({})", fault.index, fault.kind);
    }

    let set = match verifier.into_verified_set() {
        Ok(set) => set,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    };
    let codec = match ErasureCodec::new(manifest.get_config()) {
        Ok(codec) => codec,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    };
    let joined = match codec.join(&set, manifest.get_original_len()) {
        Ok(joined) => joined,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    };

    if blake3::hash(&joined) != manifest.get_file_digest() {
        eprintln!("Error: retrieved file digest does not match the manifest");
        exit(1);
    }

    if let Err(e) = LocalBlobStore.write_file(output_path, &joined) {
        eprintln!("Error: {}", e);
        exit(1);
    }
    println!("Retrieved {} to {:?}", format_bytes(joined.len()), output_path);
}

/// Maps one per-shard retrieval result onto the verifier's offer. Anything
/// other than a completed fetch of exactly `shard_len` bytes resolves the slot
/// to absent: a provider serving a wrong-length payload is just another
/// per-shard fault and must never abort the sibling shards.
fn shard_bytes_for_offer(index: usize, outcome: Result<RetrievalOutcome, BftDsnError>, shard_len: usize) -> Option<Vec<u8>> {
    match outcome {
        Ok(RetrievalOutcome::Completed(bytes)) => {
            if bytes.len() != shard_len {
                println!("Shard {}: provider served {}B, expected {}B", index, bytes.len(), shard_len);
                None
            } else {
                Some(bytes)
            }
        }
        Ok(outcome) => {
            println!("Shard {}: {}", index, outcome);
            None
        }
        Err(e) => {
            println!("Shard {}: {}", index, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::DirectoryProviderStore;
    use bftdsn_lib::{CodecConfig, ProviderDirectory, encode_with_manifest};
    use rand::Rng;

    fn handle_for(index: usize) -> ShardHandle {
        ShardHandle {
            index,
            name: format!("report.bin.{}", index),
        }
    }

    #[test]
    fn test_wrong_length_shard_resolves_to_an_absent_offer() {
        let bytes = vec![7u8; 100];
        assert_eq!(shard_bytes_for_offer(0, Ok(RetrievalOutcome::Completed(bytes.clone())), 100), Some(bytes));
        assert_eq!(shard_bytes_for_offer(1, Ok(RetrievalOutcome::Completed(vec![7u8; 60])), 100), None);
        assert_eq!(shard_bytes_for_offer(2, Ok(RetrievalOutcome::TimedOut), 100), None);
        assert_eq!(shard_bytes_for_offer(3, Err(BftDsnError::StatusStreamClosed), 100), None);
    }

    #[tokio::test]
    async fn test_truncated_provider_shard_does_not_abort_recovery() {
        let mut rng = rand::rng();
        let file = (0..4000).map(|_| rng.random()).collect::<Vec<u8>>();

        let config = CodecConfig::new(4, 2).unwrap();
        let (set, manifest) = encode_with_manifest(&file, config).unwrap();

        let store_dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DirectoryProviderStore::create(store_dir.path(), 3).unwrap());
        let providers = store.list_providers();

        for index in 0..set.total_shards() {
            let bytes = set.get_shard(index).unwrap().unwrap();
            // The provider holding shard 2 serves a truncated payload.
            let stored = if index == 2 { &bytes[..bytes.len() / 2] } else { bytes };
            store.store_shard(&providers[index % providers.len()], &handle_for(index), stored).unwrap();
        }

        let orchestrator = RetrievalOrchestrator::new(
            Arc::clone(&store),
            store.as_ref(),
            RetrievalConfig {
                shard_deadline: Duration::from_secs(5),
            },
        )
        .unwrap();

        let export_dir = tempfile::tempdir().unwrap();
        let handles = (0..set.total_shards()).map(handle_for).collect::<Vec<ShardHandle>>();
        let outcomes = orchestrator.retrieve_all(&handles, &export_dir.path().join("report.bin")).await;

        let mut verifier = ShardSetIntegrityVerifier::new(manifest.get_shard_len(), manifest.get_digest_vector().unwrap()).unwrap();
        for (index, outcome) in outcomes.into_iter().enumerate() {
            let bytes = shard_bytes_for_offer(index, outcome, manifest.get_shard_len());
            verifier.offer_shard(index, bytes).unwrap();
        }

        assert_eq!(verifier.run(), VerifierState::Verified);

        let recovered = verifier.into_verified_set().unwrap();
        let codec = ErasureCodec::new(config).unwrap();
        assert_eq!(codec.join(&recovered, manifest.get_original_len()).unwrap(), file);
    }
}
