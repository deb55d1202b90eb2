/// End-to-end linearizer tests over real temp directories
#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use sha2::{Digest, Sha256};
    use tempfile::TempDir;

    use crate::blocks::{BlockStream, NumberedBlockFiles};
    use crate::canonical_chain::CanonicalIndex;
    use crate::config::{OutputTarget, Settings};
    use crate::error::LinearizeError;
    use crate::hashing::{HashCodec, PowHasher};
    use crate::linearizer::{LinearizeState, Linearizer};
    use crate::output::OutputRotator;
    use crate::run_linearize_with;
    use crate::types::{FrameHeader, NetMagic, BLOCK_HEADER_SIZE};

    const MAGIC: NetMagic = NetMagic([0x70, 0x35, 0x22, 0x05]);
    // 2014-01-15 and 2014-02-15, UTC
    const JAN: u32 = 1_389_744_000;
    const FEB: u32 = 1_392_422_400;

    /// Cheap stand-in for scrypt so tests stay fast
    struct SingleSha;

    impl PowHasher for SingleSha {
        fn pow_hash(&self, header: &[u8; BLOCK_HEADER_SIZE]) -> [u8; 32] {
            Sha256::digest(header).into()
        }
    }

    /// A framed block: unique header (nonce) plus some body bytes
    fn make_block(nonce: u32, time: u32, body_len: usize) -> Vec<u8> {
        let mut payload = vec![0u8; BLOCK_HEADER_SIZE + body_len];
        payload[0] = 1;
        payload[68..72].copy_from_slice(&time.to_le_bytes());
        payload[76..80].copy_from_slice(&nonce.to_le_bytes());
        for (i, b) in payload[BLOCK_HEADER_SIZE..].iter_mut().enumerate() {
            *b = (i as u32 + nonce) as u8;
        }
        let mut framed = FrameHeader {
            magic: MAGIC,
            length: payload.len() as u32,
        }
        .to_bytes()
        .to_vec();
        framed.extend(payload);
        framed
    }

    fn hash_of<P: PowHasher>(codec: &HashCodec<P>, framed: &[u8], position: u64) -> String {
        let header: &[u8; BLOCK_HEADER_SIZE] =
            framed[8..8 + BLOCK_HEADER_SIZE].try_into().unwrap();
        codec.identify(header, position)
    }

    struct Fixture {
        _dir: TempDir,
        input: PathBuf,
        output: PathBuf,
        hashlist: PathBuf,
    }

    /// Lay out numbered input files and a hash list
    fn fixture(files: &[Vec<&Vec<u8>>], canonical: &[String]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input");
        let output = dir.path().join("output");
        fs::create_dir_all(&input).unwrap();

        for (i, blocks) in files.iter().enumerate() {
            let data: Vec<u8> = blocks.iter().flat_map(|b| b.iter().copied()).collect();
            fs::write(input.join(format!("blk{:04}.dat", i + 1)), data).unwrap();
        }

        let hashlist = dir.path().join("hashlist.txt");
        fs::write(&hashlist, canonical.join("\n") + "\n").unwrap();

        Fixture {
            _dir: dir,
            input,
            output,
            hashlist,
        }
    }

    fn settings_for(fx: &Fixture, output: OutputTarget) -> Settings {
        Settings {
            input: fx.input.clone(),
            hashlist: fx.hashlist.clone(),
            output,
            ..Settings::default()
        }
    }

    fn directory_settings(fx: &Fixture) -> Settings {
        settings_for(fx, OutputTarget::Directory(fx.output.clone()))
    }

    fn read_outputs(dir: &Path) -> Vec<Vec<u8>> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        paths.sort();
        paths.iter().map(|p| fs::read(p).unwrap()).collect()
    }

    #[test]
    fn test_round_trip_across_input_files() {
        let codec = HashCodec::with_pow(SingleSha);
        let blocks: Vec<Vec<u8>> = (0..5)
            .map(|n| make_block(n, JAN + n, 40 + n as usize))
            .collect();
        let canonical: Vec<String> = blocks
            .iter()
            .enumerate()
            .map(|(i, b)| hash_of(&codec, b, i as u64))
            .collect();

        let fx = fixture(
            &[
                vec![&blocks[0], &blocks[1]],
                vec![&blocks[2]],
                vec![&blocks[3], &blocks[4]],
            ],
            &canonical,
        );
        let summary = run_linearize_with(&directory_settings(&fx), &codec).unwrap();

        assert_eq!(summary.accepted, 5);
        assert_eq!(summary.skipped_orphans, 0);
        assert_eq!(summary.input_files, 3);
        assert_eq!(summary.output_files, 1);
        assert_eq!(summary.high_water_timestamp, JAN + 4);

        let expected: Vec<u8> = blocks.concat();
        assert_eq!(read_outputs(&fx.output).concat(), expected);
        assert_eq!(summary.bytes_written, expected.len() as u64);
    }

    #[test]
    fn test_orphan_between_canonical_blocks_is_skipped() {
        // Fork block sits between two canonical blocks and never reaches output
        let codec = HashCodec::with_pow(SingleSha);
        let a = make_block(1, JAN, 30);
        let orphan = make_block(99, JAN, 30);
        let b = make_block(2, JAN, 30);
        let canonical = vec![hash_of(&codec, &a, 0), hash_of(&codec, &b, 1)];

        let fx = fixture(&[vec![&a, &orphan, &b]], &canonical);
        let out_file = fx.output.with_extension("dat");
        let settings = settings_for(&fx, OutputTarget::File(out_file.clone()));
        let summary = run_linearize_with(&settings, &codec).unwrap();

        assert_eq!(summary.accepted, 2);
        assert_eq!(summary.skipped_orphans, 1);
        assert_eq!(fs::read(out_file).unwrap(), [a, b].concat());
    }

    #[test]
    fn test_swapped_canonical_blocks_abort() {
        let codec = HashCodec::with_pow(SingleSha);
        let a = make_block(1, JAN, 30);
        let b = make_block(2, JAN, 30);
        let c = make_block(3, JAN, 30);
        let canonical = vec![
            hash_of(&codec, &a, 0),
            hash_of(&codec, &b, 1),
            hash_of(&codec, &c, 2),
        ];

        let fx = fixture(&[vec![&a, &c, &b]], &canonical);
        let err = run_linearize_with(&directory_settings(&fx), &codec).unwrap_err();

        match err {
            LinearizeError::OutOfOrder { expected, actual } => {
                assert_eq!(expected, canonical[1]);
                assert_eq!(actual, canonical[2]);
            }
            other => panic!("expected OutOfOrder, got {other}"),
        }
        // Only the block before the violation was written
        assert_eq!(read_outputs(&fx.output), vec![a]);
    }

    #[test]
    fn test_exhausted_hash_list_aborts() {
        let codec = HashCodec::with_pow(SingleSha);
        let a = make_block(1, JAN, 30);
        let canonical = vec![hash_of(&codec, &a, 0)];

        // Same block stored twice
        let fx = fixture(&[vec![&a, &a]], &canonical);
        let err = run_linearize_with(&directory_settings(&fx), &codec).unwrap_err();
        assert!(matches!(err, LinearizeError::CanonicalExhausted { position: 1, .. }));
    }

    #[test]
    fn test_size_rotation_through_linearizer() {
        let codec = HashCodec::with_pow(SingleSha);
        let a = make_block(1, JAN, 100);
        let b = make_block(2, JAN, 100);
        let canonical = vec![hash_of(&codec, &a, 0), hash_of(&codec, &b, 1)];

        let fx = fixture(&[vec![&a, &b]], &canonical);
        let settings = Settings {
            max_out_sz: (a.len() + b.len() - 1) as u64,
            ..directory_settings(&fx)
        };
        let summary = run_linearize_with(&settings, &codec).unwrap();

        assert_eq!(summary.output_files, 2);
        let outputs = read_outputs(&fx.output);
        assert_eq!(outputs, vec![a, b]);
        assert!(outputs.iter().all(|o| o.len() as u64 <= settings.max_out_sz));
    }

    #[test]
    fn test_month_split_through_linearizer() {
        let codec = HashCodec::with_pow(SingleSha);
        let a = make_block(1, JAN, 30);
        let b = make_block(2, FEB, 30);
        let canonical = vec![hash_of(&codec, &a, 0), hash_of(&codec, &b, 1)];

        let fx = fixture(&[vec![&a, &b]], &canonical);
        let settings = Settings {
            split_timestamp: true,
            ..directory_settings(&fx)
        };
        let summary = run_linearize_with(&settings, &codec).unwrap();

        assert_eq!(summary.output_files, 2);
        assert_eq!(read_outputs(&fx.output), vec![a, b]);
    }

    #[test]
    fn test_bad_magic_aborts_run() {
        let codec = HashCodec::with_pow(SingleSha);
        let a = make_block(1, JAN, 30);
        let mut bad = make_block(2, JAN, 30);
        bad[..4].copy_from_slice(&[0xf9, 0xbe, 0xb4, 0xd9]);
        let canonical = vec![hash_of(&codec, &a, 0), hash_of(&codec, &bad, 1)];

        let fx = fixture(&[vec![&a, &bad]], &canonical);
        let err = run_linearize_with(&directory_settings(&fx), &codec).unwrap_err();
        assert!(matches!(err, LinearizeError::BadMagic { .. }));
        assert_eq!(read_outputs(&fx.output), vec![a]);
    }

    #[test]
    fn test_sanity_hash_blocks_processing() {
        let codec = HashCodec::with_pow(SingleSha);
        let a = make_block(1, JAN, 30);
        let fx = fixture(&[vec![&a]], &[hash_of(&codec, &a, 0)]);
        let settings = Settings {
            sanity_hash: Some("00".repeat(32)),
            ..directory_settings(&fx)
        };

        let err = run_linearize_with(&settings, &codec).unwrap_err();
        assert!(matches!(err, LinearizeError::SanityHashMissing(_)));
        assert!(!fx.output.exists());
    }

    #[test]
    fn test_state_machine_steps() {
        let codec = HashCodec::with_pow(SingleSha);
        let a = make_block(1, JAN, 30);
        let orphan = make_block(7, JAN, 30);
        let canonical = vec![hash_of(&codec, &a, 0)];
        let fx = fixture(&[vec![&orphan, &a]], &canonical);

        let index = CanonicalIndex::load(&fx.hashlist).unwrap();
        let settings = directory_settings(&fx);
        let stream = BlockStream::new(NumberedBlockFiles::new(&fx.input), MAGIC);
        let rotator = OutputRotator::new(&settings).unwrap();
        let mut linearizer = Linearizer::new(&index, &codec, stream, rotator);

        assert!(matches!(linearizer.step().unwrap(), LinearizeState::Verify(_)));
        assert!(matches!(linearizer.step().unwrap(), LinearizeState::SeekNext));
        assert!(matches!(linearizer.step().unwrap(), LinearizeState::Verify(_)));
        assert!(matches!(linearizer.step().unwrap(), LinearizeState::Emit(_, _)));
        assert!(matches!(linearizer.step().unwrap(), LinearizeState::SeekNext));
        assert_eq!(linearizer.accepted_count(), 1);
        assert!(matches!(linearizer.step().unwrap(), LinearizeState::Done));
    }

    #[test]
    fn test_algo_switch_follows_accepted_count_not_stream_position() {
        // Switch after one accepted block. The orphan puts `b` at stream
        // position 2 while only one block has been accepted, so `b` must
        // still be identified by the Pow hash and `c` by SHA-256d.
        let codec = HashCodec::with_pow(SingleSha).with_switch_after(1);
        let a = make_block(1, JAN, 30);
        let orphan = make_block(42, JAN, 30);
        let b = make_block(2, JAN, 30);
        let c = make_block(3, JAN, 30);
        let canonical = vec![
            hash_of(&codec, &a, 0),
            hash_of(&codec, &b, 1),
            hash_of(&codec, &c, 2),
        ];
        assert_ne!(hash_of(&codec, &b, 1), hash_of(&codec, &b, 2));

        let fx = fixture(&[vec![&a, &orphan, &b, &c]], &canonical);
        let summary = run_linearize_with(&directory_settings(&fx), &codec).unwrap();

        assert_eq!(summary.accepted, 3);
        assert_eq!(summary.skipped_orphans, 1);
        assert_eq!(read_outputs(&fx.output).concat(), [a, b, c].concat());
    }

    #[test]
    fn test_scrypt_codec_end_to_end() {
        let codec = HashCodec::new().unwrap();
        let a = make_block(1, JAN, 10);
        let orphan = make_block(5, JAN, 10);
        let b = make_block(2, JAN, 10);
        let canonical = vec![hash_of(&codec, &a, 0), hash_of(&codec, &b, 1)];

        let fx = fixture(&[vec![&orphan, &a], vec![&b]], &canonical);
        let out_file = fx.output.with_extension("dat");
        let settings = settings_for(&fx, OutputTarget::File(out_file.clone()));
        let summary = run_linearize_with(&settings, &codec).unwrap();

        assert_eq!(summary.accepted, 2);
        assert_eq!(summary.skipped_orphans, 1);
        assert_eq!(fs::read(out_file).unwrap(), [a, b].concat());
    }
}
