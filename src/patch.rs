use crate::chunking::ChunkMetadata;
use std::collections::HashMap;
use tracing::debug;

/// The chunks of one build, folded by hash.
///
/// Keeps the first occurrence of every hash, in the order hashes were first seen,
/// plus counters over every chunk pushed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSummary {
    chunks: Vec<ChunkMetadata>,
    index: HashMap<String, usize>,
    total_chunk_count: u64,
    total_size: u64,
    unique_size: u64,
}

impl BuildSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one chunk. Returns `false` if a chunk with the same hash was already recorded.
    pub fn push(&mut self, chunk: ChunkMetadata) -> bool {
        let length = u64::from(chunk.length());
        self.total_chunk_count += 1;
        self.total_size += length;

        if self.index.contains_key(chunk.hex_hash()) {
            return false;
        }

        self.unique_size += length;
        self.index.insert(chunk.hex_hash().to_owned(), self.chunks.len());
        self.chunks.push(chunk);
        true
    }

    pub fn contains(&self, hex_hash: &str) -> bool {
        self.index.contains_key(hex_hash)
    }

    /// First occurrence of the chunk with the given hex hash.
    pub fn get(&self, hex_hash: &str) -> Option<&ChunkMetadata> {
        self.index.get(hex_hash).map(|&idx| &self.chunks[idx])
    }

    /// Unique chunks in first-seen order.
    pub fn chunks(&self) -> &[ChunkMetadata] {
        &self.chunks
    }

    pub fn total_chunk_count(&self) -> u64 {
        self.total_chunk_count
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn unique_chunk_count(&self) -> u64 {
        self.chunks.len() as u64
    }

    pub fn unique_size(&self) -> u64 {
        self.unique_size
    }

    pub fn is_empty(&self) -> bool {
        self.total_chunk_count == 0
    }

    /// Mean chunk length over every chunk pushed, `None` for an empty build.
    pub fn average_chunk_size(&self) -> Option<u64> {
        self.total_size.checked_div(self.total_chunk_count)
    }

    /// Unique size over total size, `None` for an empty build.
    pub fn deduplication_ratio(&self) -> Option<f64> {
        if self.total_size == 0 {
            return None;
        }
        Some(self.unique_size as f64 / self.total_size as f64)
    }
}

impl Extend<ChunkMetadata> for BuildSummary {
    fn extend<I: IntoIterator<Item = ChunkMetadata>>(&mut self, iter: I) {
        for chunk in iter {
            self.push(chunk);
        }
    }
}

impl FromIterator<ChunkMetadata> for BuildSummary {
    fn from_iter<I: IntoIterator<Item = ChunkMetadata>>(iter: I) -> Self {
        let mut summary = BuildSummary::new();
        summary.extend(iter);
        summary
    }
}

/// What changed between two builds, at chunk granularity.
///
/// The four lists are disjoint. Chunks found in both builds are reported with the
/// metadata of the current one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchSummary {
    to_add: Vec<ChunkMetadata>,
    to_remove: Vec<ChunkMetadata>,
    to_move: Vec<ChunkMetadata>,
    untouched: Vec<ChunkMetadata>,
    patch_size: u64,
}

impl PatchSummary {
    pub fn new(previous: &BuildSummary, current: &BuildSummary) -> Self {
        let to_remove: Vec<_> = previous
            .chunks()
            .iter()
            .filter(|chunk| !current.contains(chunk.hex_hash()))
            .cloned()
            .collect();

        let mut to_add = Vec::new();
        let mut to_move = Vec::new();
        let mut untouched = Vec::new();

        for chunk in current.chunks() {
            match previous.get(chunk.hex_hash()) {
                None => to_add.push(chunk.clone()),
                Some(old) if old.offset() != chunk.offset() => to_move.push(chunk.clone()),
                Some(_) => untouched.push(chunk.clone()),
            }
        }

        let patch_size = to_add.iter().map(|chunk| u64::from(chunk.length())).sum();

        debug!(
            to_add = to_add.len(),
            to_remove = to_remove.len(),
            to_move = to_move.len(),
            untouched = untouched.len(),
            patch_size,
            "patch summary computed"
        );

        Self {
            to_add,
            to_remove,
            to_move,
            untouched,
            patch_size,
        }
    }

    /// Chunks of the current build whose hash the previous build lacks.
    pub fn to_add(&self) -> &[ChunkMetadata] {
        &self.to_add
    }

    /// Chunks of the previous build whose hash the current build lacks.
    pub fn to_remove(&self) -> &[ChunkMetadata] {
        &self.to_remove
    }

    /// Chunks present in both builds at different offsets.
    pub fn to_move(&self) -> &[ChunkMetadata] {
        &self.to_move
    }

    /// Chunks present in both builds at the same offset.
    pub fn untouched(&self) -> &[ChunkMetadata] {
        &self.untouched
    }

    /// Total length of `to_add`, the bytes a patch has to carry.
    pub fn patch_size(&self) -> u64 {
        self.patch_size
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty() && self.to_move.is_empty()
    }
}

/// Diffs the chunks of two builds.
pub fn diff<P, C>(previous: P, current: C) -> PatchSummary
where
    P: IntoIterator<Item = ChunkMetadata>,
    C: IntoIterator<Item = ChunkMetadata>,
{
    let previous: BuildSummary = previous.into_iter().collect();
    let current: BuildSummary = current.into_iter().collect();
    PatchSummary::new(&previous, &current)
}
