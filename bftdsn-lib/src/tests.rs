use crate::{
    CodecConfig, ErasureCodec, ShardDigestCommitter, ShardSetIntegrityVerifier, ShardSetManifest, VerifierState, encode_with_manifest,
};
use rand::{Rng, seq::SliceRandom};

#[test]
fn prop_test_encode_lose_up_to_m_shards_and_recover() {
    const NUM_TEST_ITERATIONS: usize = 12;

    const MIN_FILE_BYTE_LEN: usize = 1;
    const MAX_FILE_BYTE_LEN: usize = 1 << 16;

    let mut rng = rand::rng();

    (0..NUM_TEST_ITERATIONS).for_each(|_| {
        let k = rng.random_range(1..=16);
        let m = rng.random_range(1..=8);
        let file_len = rng.random_range(MIN_FILE_BYTE_LEN..=MAX_FILE_BYTE_LEN);
        let file = (0..file_len).map(|_| rng.random()).collect::<Vec<u8>>();

        let config = CodecConfig::new(k, m).unwrap();
        let (set, manifest) = encode_with_manifest(&file, config).expect("Must be able to encode file into shard set");

        // Lose a random subset of at most m shards; recovery must always succeed.
        let mut indices = (0..set.total_shards()).collect::<Vec<usize>>();
        indices.shuffle(&mut rng);
        let lost = &indices[..rng.random_range(0..=m)];

        let mut verifier = ShardSetIntegrityVerifier::new(manifest.get_shard_len(), manifest.get_digest_vector().unwrap())
            .expect("Must be able to set up verifier");
        for index in 0..set.total_shards() {
            let shard = if lost.contains(&index) {
                None
            } else {
                set.get_shard(index).unwrap().map(<[u8]>::to_vec)
            };
            verifier.offer_shard(index, shard).unwrap();
        }

        assert_eq!(verifier.run(), VerifierState::Verified);

        let recovered = verifier.into_verified_set().expect("Set must be verified by this point!");
        let codec = ErasureCodec::new(config).unwrap();
        assert_eq!(codec.join(&recovered, file.len()).unwrap(), file);
        assert_eq!(blake3::hash(&codec.join(&recovered, file.len()).unwrap()), manifest.get_file_digest());
    });
}

#[test]
fn prop_test_losing_more_than_m_shards_is_unrecoverable() {
    const NUM_TEST_ITERATIONS: usize = 8;

    let mut rng = rand::rng();

    (0..NUM_TEST_ITERATIONS).for_each(|_| {
        let k = rng.random_range(2..=12);
        let m = rng.random_range(1..=6);
        let file = (0..rng.random_range(64..=8192)).map(|_| rng.random()).collect::<Vec<u8>>();

        let config = CodecConfig::new(k, m).unwrap();
        let (set, manifest) = encode_with_manifest(&file, config).unwrap();

        let mut indices = (0..set.total_shards()).collect::<Vec<usize>>();
        indices.shuffle(&mut rng);
        let lost = &indices[..m + 1];

        let mut verifier = ShardSetIntegrityVerifier::new(manifest.get_shard_len(), manifest.get_digest_vector().unwrap()).unwrap();
        for index in 0..set.total_shards() {
            let shard = if lost.contains(&index) {
                None
            } else {
                set.get_shard(index).unwrap().map(<[u8]>::to_vec)
            };
            verifier.offer_shard(index, shard).unwrap();
        }

        assert_eq!(verifier.run(), VerifierState::Unrecoverable);
        assert_eq!(verifier.get_faults().len(), m + 1);
    });
}

#[test]
fn prop_test_corruption_and_loss_mix_is_detected_and_repaired() {
    const NUM_TEST_ITERATIONS: usize = 8;

    let mut rng = rand::rng();

    (0..NUM_TEST_ITERATIONS).for_each(|_| {
        let file = (0..rng.random_range(1024..=16_384)).map(|_| rng.random()).collect::<Vec<u8>>();

        let config = CodecConfig::new(6, 4).unwrap();
        let (set, manifest) = encode_with_manifest(&file, config).unwrap();

        // One lost shard plus two byte-flipped shards stays within the m = 4 budget.
        let mut indices = (0..set.total_shards()).collect::<Vec<usize>>();
        indices.shuffle(&mut rng);
        let (lost, corrupted) = (indices[0], [indices[1], indices[2]]);

        let mut verifier = ShardSetIntegrityVerifier::new(manifest.get_shard_len(), manifest.get_digest_vector().unwrap()).unwrap();
        for index in 0..set.total_shards() {
            let shard = if index == lost {
                None
            } else {
                let mut bytes = set.get_shard(index).unwrap().unwrap().to_vec();
                if corrupted.contains(&index) {
                    let position = rng.random_range(0..bytes.len());
                    bytes[position] = bytes[position].wrapping_add(1);
                }
                Some(bytes)
            };
            verifier.offer_shard(index, shard).unwrap();
        }

        assert_eq!(verifier.run(), VerifierState::Verified);
        assert_eq!(verifier.get_faults().len(), 3);

        let recovered = verifier.into_verified_set().unwrap();
        let codec = ErasureCodec::new(config).unwrap();
        assert_eq!(codec.join(&recovered, file.len()).unwrap(), file);
    });
}

#[test]
fn prop_test_verification_is_idempotent() {
    let mut rng = rand::rng();
    let file = (0..20_000).map(|_| rng.random()).collect::<Vec<u8>>();

    let config = CodecConfig::new(10, 3).unwrap();
    let (set, manifest) = encode_with_manifest(&file, config).unwrap();

    let codec = ErasureCodec::new(config).unwrap();
    let committer = ShardDigestCommitter::new(config).unwrap();

    // Re-running the pure checks on an unchanged set never changes the answer.
    for _ in 0..3 {
        assert!(codec.verify(&set).unwrap());
        assert_eq!(committer.commit(&set).unwrap(), manifest.get_digest_vector().unwrap());
    }
}

#[test]
fn prop_test_manifest_survives_storage_roundtrip() {
    let mut rng = rand::rng();
    let file = (0..rng.random_range(1..=4096)).map(|_| rng.random()).collect::<Vec<u8>>();

    let config = CodecConfig::new(5, 2).unwrap();
    let (_, manifest) = encode_with_manifest(&file, config).unwrap();

    let bytes = manifest.to_bytes().unwrap();
    let (restored, n) = ShardSetManifest::from_bytes(&bytes).unwrap();

    assert_eq!(n, bytes.len());
    assert_eq!(restored, manifest);
    assert_eq!(restored.get_digest_vector().unwrap(), manifest.get_digest_vector().unwrap());
}
