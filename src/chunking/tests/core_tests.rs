use super::*;
use crate::config::{Algorithm, ChunkerConfig};
use crate::patch::BuildSummary;
use crate::chunking::{ChunkMetadata, GearTable};
use proptest::prelude::*;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::collections::HashSet;
use std::fs;
use std::io::{self, Read};

const AVG_SIZE: u32 = 8_192;

fn generate_patterned_data(len: usize) -> Vec<u8> {
    const BLOCKS: [&[u8]; 3] = [b"LOREM", b"IPSUM", b"DOLOR"];

    let mut data = Vec::with_capacity(len);
    let mut idx = 0;

    while data.len() < len {
        data.extend_from_slice(BLOCKS[idx % BLOCKS.len()]);
        idx += 1;
    }

    data.truncate(len);
    data
}

fn generate_random_data(len: usize, seed: u64) -> Vec<u8> {
    let mut data = vec![0u8; len];
    ChaCha20Rng::seed_from_u64(seed).fill_bytes(&mut data);
    data
}

fn chunker(algorithm: Algorithm, expected_chunk_size: u32) -> Chunker {
    ChunkerConfig {
        algorithm,
        expected_chunk_size,
        ..Default::default()
    }
    .build()
    .expect("Failed to build chunker")
}

fn collect_chunks(chunker: &Chunker, data: &[u8]) -> Vec<Chunk> {
    chunker
        .chunk_bytes(data)
        .expect("Failed to create chunk iterator")
        .collect::<Result<Vec<_>>>()
        .expect("Failed to chunk input")
}

// --- Input Tests ---

#[test]
fn test_empty_input() {
    let chunker = chunker(Algorithm::FastCdc, AVG_SIZE);

    // A zero declared size is a usage error, not an empty sequence
    assert!(matches!(
        chunker.chunk_bytes(&[]),
        Err(Error::Configuration(_))
    ));
    assert!(matches!(
        chunker.chunk_reader(io::empty(), 0),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn test_small_input() {
    let data = generate_patterned_data(1_000);
    let chunker = chunker(Algorithm::FastCdc, AVG_SIZE);
    let chunks = collect_chunks(&chunker, &data);

    // Input smaller than min_size should result in a single chunk
    assert_eq!(chunks.len(), 1, "Small input must produce exactly one chunk");
    assert_eq!(chunks[0].offset(), 0);
    assert_eq!(chunks[0].length() as usize, data.len());
    assert_eq!(chunks[0].data().as_ref(), &data[..]);
}

// --- Chunking Tests ---

#[test]
fn test_round_trip_chunking() {
    let data = generate_random_data(500_000, 11);

    for algorithm in [Algorithm::FastCdc, Algorithm::FastCdcRightShift, Algorithm::FixedSize] {
        let chunker = chunker(algorithm, AVG_SIZE);

        let mut reconstructed = Vec::with_capacity(data.len());
        let mut expected_offset = 0;

        for chunk in collect_chunks(&chunker, &data) {
            // Offsets are contiguous from zero
            assert_eq!(chunk.offset(), expected_offset);
            assert_eq!(chunk.length() as usize, chunk.data().len());
            assert!(chunk.length() as usize <= chunker.detector().max_size());

            expected_offset += u64::from(chunk.length());
            reconstructed.extend_from_slice(chunk.data());
        }

        assert_eq!(
            reconstructed, data,
            "Reconstructed data does not match original for {algorithm}"
        );
    }
}

#[test]
fn test_chunk_hashes() {
    let data = generate_random_data(100_000, 12);
    let chunker = ChunkerConfig {
        digest: DigestAlgorithm::Sha256,
        ..Default::default()
    }
    .build()
    .unwrap();

    for chunk in collect_chunks(&chunker, &data) {
        assert_eq!(chunk.hash(), DigestAlgorithm::Sha256.digest(chunk.data()).as_slice());
        assert_eq!(chunk.hash().len(), 32);
        assert_eq!(chunk.hex_hash(), hex::encode(chunk.hash()));
    }
}

#[test]
fn test_chunking_is_deterministic() {
    let data = generate_random_data(300_000, 13);

    let first = collect_chunks(&chunker(Algorithm::FastCdc, AVG_SIZE), &data);
    let second = collect_chunks(&chunker(Algorithm::FastCdc, AVG_SIZE), &data);

    assert_eq!(first, second);
}

#[test]
fn test_known_boundaries() {
    let data = generate_random_data(200_000, 42);
    assert_eq!(hex::encode(&data[..8]), "7848b5d711bc9883");

    let cases: [(Algorithm, usize, [u32; 6], [&str; 3]); 2] = [
        (
            Algorithm::FastCdc,
            33,
            [3_063, 2_842, 6_105, 2_552, 2_151, 4_525],
            [
                "7f3665fc67d59c8594dcedcd36324174e091eb8f",
                "6666c0732067bae8f4d3bba3ede2c45ad3a8aa62",
                "006b178f8fab60fe276c584cef7a21c45a1609ee",
            ],
        ),
        (
            Algorithm::FastCdcRightShift,
            45,
            [5_544, 4_310, 4_253, 2_303, 7_000, 2_955],
            [
                "bc9789249863c0113f8777670bd336fc1e906193",
                "747ce41ee3ab4e037a2be5470f912622349b9fb1",
                "5fc98deba4ba47c247065f2a556979a12323541b",
            ],
        ),
    ];

    for (algorithm, count, lengths, hashes) in cases {
        let chunker = ChunkerConfig {
            algorithm,
            gear_table: GearTable::Md5,
            ..Default::default()
        }
        .build()
        .unwrap();
        let chunks = collect_chunks(&chunker, &data);

        assert_eq!(chunks.len(), count, "{algorithm}");
        let head: Vec<u32> = chunks.iter().take(6).map(Chunk::length).collect();
        assert_eq!(head, lengths, "{algorithm}");
        for (chunk, hash) in chunks.iter().zip(hashes) {
            assert_eq!(chunk.hex_hash(), hash, "{algorithm}");
        }
    }
}

#[test]
fn test_fixed_size_zeros() {
    let data = vec![0u8; 1 << 20];
    let chunker = chunker(Algorithm::FixedSize, AVG_SIZE);

    let summary: BuildSummary = chunker
        .chunk_bytes(&data)
        .unwrap()
        .map(|chunk| chunk.map(ChunkMetadata::from))
        .collect::<Result<_>>()
        .unwrap();

    assert_eq!(summary.total_chunk_count(), 128);
    assert_eq!(summary.unique_chunk_count(), 1);
    assert_eq!(summary.total_size(), 1_048_576);
    assert_eq!(summary.unique_size(), 8_192);
}

#[test]
fn test_prepend_keeps_most_chunks() {
    let data = generate_random_data(256 * 1024, 14);
    let mut shifted = generate_random_data(100, 15);
    shifted.extend_from_slice(&data);

    for algorithm in [Algorithm::FastCdc, Algorithm::FastCdcRightShift] {
        let chunker = chunker(algorithm, 1_024);

        let original: Vec<_> = collect_chunks(&chunker, &data)
            .iter()
            .map(|chunk| chunk.hex_hash().to_owned())
            .collect();
        let edited: HashSet<_> = collect_chunks(&chunker, &shifted)
            .iter()
            .map(|chunk| chunk.hex_hash().to_owned())
            .collect();

        let kept = original.iter().filter(|hash| edited.contains(*hash)).count();
        assert!(
            kept * 2 >= original.len(),
            "{algorithm}: only {kept} of {} chunks survived a prepend",
            original.len()
        );
    }

    // The fixed-size baseline loses alignment entirely.
    let chunker = chunker(Algorithm::FixedSize, 1_024);
    let original: HashSet<_> = collect_chunks(&chunker, &data)
        .into_iter()
        .map(|chunk| chunk.hex_hash().to_owned())
        .collect();
    assert!(
        collect_chunks(&chunker, &shifted)
            .iter()
            .all(|chunk| !original.contains(chunk.hex_hash()))
    );
}

#[test]
fn test_iterator_progress() {
    let data = generate_patterned_data(20_000);
    let chunker = chunker(Algorithm::FixedSize, AVG_SIZE);

    let mut chunks = chunker.chunk_bytes(&data).unwrap();
    assert_eq!(chunks.size(), 20_000);
    assert_eq!(chunks.remaining(), 20_000);

    chunks.next().unwrap().unwrap();
    assert_eq!(chunks.offset(), 8_192);
    assert_eq!(chunks.remaining(), 20_000 - 8_192);

    assert_eq!(chunks.by_ref().count(), 2);
    assert!(chunks.next().is_none());
}

// --- Error Tests ---

struct FailingReader;

impl Read for FailingReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::other("simulated read error"))
    }
}

#[test]
fn test_reader_error() {
    let chunker = chunker(Algorithm::FastCdc, AVG_SIZE);

    let mut iter = chunker
        .chunk_reader(BufReader::new(FailingReader), 10_000)
        .unwrap();
    let result = iter.next().expect("Iterator expected to yield a result");

    // Verify that the iterator correctly propagates the error from the underlying reader
    assert!(matches!(result, Err(Error::Io(_))));
    assert!(iter.next().is_none(), "Iterator must stop after an error");
}

#[test]
fn test_short_source() {
    let data = generate_random_data(30_000, 16);
    let chunker = chunker(Algorithm::FastCdc, AVG_SIZE);

    let results: Vec<_> = chunker.chunk_reader(&data[..], 50_000).unwrap().collect();
    let (last, chunks) = results.split_last().unwrap();

    assert!(chunks.iter().all(|chunk| chunk.is_ok()));
    assert!(matches!(
        last,
        Err(Error::StreamExhausted {
            declared: 50_000,
            delivered: 30_000
        })
    ));
}

// --- File Tests ---

#[test]
fn test_chunk_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.bin");
    let data = generate_random_data(70_000, 17);
    fs::write(&path, &data).unwrap();

    let chunker = chunker(Algorithm::FastCdc, AVG_SIZE);
    let from_file = chunker
        .chunk_file(&path)
        .unwrap()
        .collect::<Result<Vec<_>>>()
        .unwrap();

    assert_eq!(from_file, collect_chunks(&chunker, &data));

    let empty = dir.path().join("empty.bin");
    fs::write(&empty, b"").unwrap();
    assert!(matches!(chunker.chunk_file(&empty), Err(Error::Configuration(_))));
}

#[test]
fn test_chunk_path_walks_directory() {
    let dir = tempfile::tempdir().unwrap();
    let a = generate_random_data(20_000, 18);
    let b = generate_random_data(9_000, 19);
    let c = generate_random_data(3_000, 20);

    fs::create_dir(dir.path().join("nested")).unwrap();
    fs::write(dir.path().join("b.bin"), &b).unwrap();
    fs::write(dir.path().join("a.bin"), &a).unwrap();
    fs::write(dir.path().join("nested/c.bin"), &c).unwrap();
    fs::write(dir.path().join("empty.bin"), b"").unwrap();

    let chunker = chunker(Algorithm::FastCdc, 1_024);
    let chunks = chunker
        .chunk_path(dir.path())
        .unwrap()
        .collect::<Result<Vec<_>>>()
        .unwrap();

    // Files come in name order and each one restarts at offset zero
    let mut expected = collect_chunks(&chunker, &a);
    expected.extend(collect_chunks(&chunker, &b));
    expected.extend(collect_chunks(&chunker, &c));

    assert_eq!(chunks, expected);
    assert_eq!(chunks.iter().filter(|chunk| chunk.offset() == 0).count(), 3);
}

#[test]
fn test_chunk_paths_keeps_root_order() {
    let dir = tempfile::tempdir().unwrap();
    let first = generate_random_data(5_000, 21);
    let second = generate_random_data(5_000, 22);
    fs::write(dir.path().join("z.bin"), &first).unwrap();
    fs::write(dir.path().join("y.bin"), &second).unwrap();

    let chunker = chunker(Algorithm::FixedSize, 4_096);
    let chunks = chunker
        .chunk_paths([dir.path().join("z.bin"), dir.path().join("y.bin")])
        .collect::<Result<Vec<_>>>()
        .unwrap();

    let mut expected = collect_chunks(&chunker, &first);
    expected.extend(collect_chunks(&chunker, &second));
    assert_eq!(chunks, expected);
}

#[test]
fn test_chunk_path_errors() {
    let dir = tempfile::tempdir().unwrap();
    let chunker = chunker(Algorithm::FastCdc, AVG_SIZE);

    assert!(matches!(
        chunker.chunk_path(dir.path().join("missing")),
        Err(Error::Io(_))
    ));

    let mut walk = chunker.chunk_paths([dir.path().join("missing")]);
    assert!(matches!(walk.next(), Some(Err(Error::Walk(_)))));
    assert!(walk.next().is_none());
}

#[cfg(unix)]
#[test]
fn test_chunk_path_rejects_special_files() {
    let chunker = chunker(Algorithm::FastCdc, AVG_SIZE);

    assert!(matches!(
        chunker.chunk_path("/dev/null"),
        Err(Error::UnsupportedPath(_))
    ));
}

#[cfg(unix)]
#[test]
fn test_chunk_path_follows_file_symlinks() {
    use std::os::unix::fs::symlink;

    let outside = tempfile::tempdir().unwrap();
    let target = outside.path().join("target.bin");
    let data = generate_random_data(6_000, 23);
    fs::write(&target, &data).unwrap();
    fs::create_dir(outside.path().join("linked_dir")).unwrap();
    fs::write(outside.path().join("linked_dir/hidden.bin"), b"not reached").unwrap();

    let dir = tempfile::tempdir().unwrap();
    symlink(&target, dir.path().join("a_link.bin")).unwrap();
    symlink(outside.path().join("missing.bin"), dir.path().join("b_dangling.bin")).unwrap();
    symlink(outside.path().join("linked_dir"), dir.path().join("c_dir_link")).unwrap();

    let chunker = chunker(Algorithm::FastCdc, 1_024);
    let chunks = chunker
        .chunk_path(dir.path())
        .unwrap()
        .collect::<Result<Vec<_>>>()
        .unwrap();

    // Only the link to a regular file contributes chunks
    assert_eq!(chunks, collect_chunks(&chunker, &data));
}

// --- Property Tests ---

proptest! {
    #[test]
    fn prop_chunks_reassemble(data in prop::collection::vec(any::<u8>(), 1..50_000)) {
        let chunker = chunker(Algorithm::FastCdc, 256);

        let chunks = collect_chunks(&chunker, &data);
        let total: u64 = chunks.iter().map(|chunk| u64::from(chunk.length())).sum();
        let reconstructed: Vec<u8> = chunks.iter().flat_map(|chunk| chunk.data().to_vec()).collect();

        prop_assert_eq!(total, data.len() as u64);
        prop_assert_eq!(reconstructed, data);
    }
}
