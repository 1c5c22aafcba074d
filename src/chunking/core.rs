use crate::chunking::chunk::Chunk;
use crate::chunking::detector::{BoundaryDetector, Detector};
use crate::chunking::digest::DigestAlgorithm;
use crate::chunking::gear::SEEDED_GEAR_SEED;
use crate::config::ChunkerConfig;
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

/// A content-defined chunker: one boundary detector and one digest algorithm.
///
/// Immutable once built, so a single `Chunker` can drive any number of
/// independent chunk sequences, including from several threads.
#[derive(Debug, Clone)]
pub struct Chunker {
    detector: Detector,
    digest: DigestAlgorithm,
}

impl Chunker {
    ///
    /// Constructs a new `Chunker` from a configuration.
    ///
    /// ## Errors
    ///
    /// Returns `Error::Configuration` if any setting used by the selected algorithm is
    /// invalid: a zero expected size, size factors out of range, a gear table without
    /// exactly 256 entries, or a normalization level no mask can be built for.
    ///
    pub fn new(config: &ChunkerConfig) -> Result<Self> {
        let detector = config.detector()?;

        debug!(
            algorithm = %config.algorithm,
            expected_size = config.expected_chunk_size,
            min_size = detector.min_size(),
            max_size = detector.max_size(),
            digest = %config.digest,
            gear_seed = SEEDED_GEAR_SEED,
            "chunker configured"
        );

        Ok(Self::with_detector(detector, config.digest))
    }

    /// Constructs a `Chunker` around an already built detector.
    pub fn with_detector(detector: Detector, digest: DigestAlgorithm) -> Self {
        Self { detector, digest }
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    pub fn digest(&self) -> DigestAlgorithm {
        self.digest
    }

    ///
    /// Creates an iterator that yields chunks from `source`.
    ///
    /// `source` must deliver at least `size` bytes; only the first `size` are chunked.
    ///
    /// ## Errors
    ///
    /// Returns `Error::Configuration` if `size` is zero. Errors of `source` are
    /// reported by the iterator.
    ///
    pub fn chunk_reader<R: BufRead>(&self, source: R, size: u64) -> Result<Chunks<'_, R>> {
        if size == 0 {
            return Err(Error::config("the declared size must be positive"));
        }

        Ok(Chunks {
            chunker: self,
            source,
            size,
            offset: 0,
            failed: false,
        })
    }

    /// Creates an iterator that yields chunks of an in-memory buffer, which must not be empty.
    pub fn chunk_bytes<'a>(&'a self, data: &'a [u8]) -> Result<Chunks<'a, &'a [u8]>> {
        self.chunk_reader(data, data.len() as u64)
    }

    /// Creates an iterator that yields chunks of a regular file, which must not be empty.
    pub fn chunk_file(&self, path: impl AsRef<Path>) -> Result<Chunks<'_, BufReader<File>>> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let size = file.metadata()?.len();

        debug!(path = %path.display(), size, "chunking file");

        self.chunk_reader(BufReader::new(file), size)
    }

    ///
    /// Creates an iterator that yields the chunks of every regular file under `path`.
    ///
    /// `path` is either a regular file or a directory, which is walked recursively in
    /// file name order. Chunk offsets restart at zero for every file. Symlinks to
    /// regular files are chunked like the files they point to, symlinks to
    /// directories are not descended into, and dangling symlinks and empty files
    /// yield no chunks.
    ///
    /// ## Errors
    ///
    /// Returns `Error::UnsupportedPath` if `path` is neither a regular file nor a
    /// directory.
    ///
    pub fn chunk_path(&self, path: impl AsRef<Path>) -> Result<PathChunks<'_>> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;

        if !metadata.is_file() && !metadata.is_dir() {
            return Err(Error::UnsupportedPath(path.to_path_buf()));
        }

        Ok(self.chunk_paths([path]))
    }

    /// Like [`Chunker::chunk_path`] over several roots, processed in the given order.
    /// Roots that are not regular files or directories are skipped.
    pub fn chunk_paths<I, P>(&self, paths: I) -> PathChunks<'_>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let roots: Vec<PathBuf> = paths
            .into_iter()
            .map(|path| path.as_ref().to_path_buf())
            .collect();

        PathChunks {
            chunker: self,
            roots: roots.into_iter(),
            walker: None,
            current: None,
            failed: false,
        }
    }

    pub(crate) fn make_chunk(&self, data: bytes::Bytes, offset: u64) -> Result<Chunk> {
        let hash = self.digest.digest(&data);
        Chunk::new(data, offset, hash)
    }
}

/// An iterator that yields `Chunk`s from a `BufRead` source of declared size.
///
/// Stops after the first error.
pub struct Chunks<'a, R: BufRead> {
    chunker: &'a Chunker,
    source: R,
    size: u64,
    offset: u64,
    failed: bool,
}

impl<R: BufRead> Chunks<'_, R> {
    /// Offset at which the next chunk starts.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Declared size of the source.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Bytes left to chunk.
    pub fn remaining(&self) -> u64 {
        self.size - self.offset
    }
}

impl<R: BufRead> Iterator for Chunks<'_, R> {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.size {
            return None;
        }

        let chunk = match self
            .chunker
            .detector
            .read_next_chunk(&mut self.source, self.size, self.offset)
            .and_then(|data| self.chunker.make_chunk(data, self.offset))
        {
            Ok(chunk) => chunk,
            Err(e) => {
                self.failed = true;
                return Some(Err(e));
            }
        };

        self.offset += u64::from(chunk.length());

        trace!(
            offset = chunk.offset(),
            length = chunk.length(),
            hash = chunk.hex_hash(),
            "chunk produced"
        );

        Some(Ok(chunk))
    }
}

impl<R: BufRead> FusedIterator for Chunks<'_, R> {}

/// An iterator that yields the chunks of every regular file below a set of roots.
///
/// Files are opened one at a time, when the previous one is exhausted. Stops after
/// the first error.
pub struct PathChunks<'a> {
    chunker: &'a Chunker,
    roots: std::vec::IntoIter<PathBuf>,
    walker: Option<walkdir::IntoIter>,
    current: Option<Chunks<'a, BufReader<File>>>,
    failed: bool,
}

impl PathChunks<'_> {
    /// Next non-empty regular file, in walk order.
    fn next_file(&mut self) -> Result<Option<PathBuf>> {
        loop {
            let Some(walker) = self.walker.as_mut() else {
                match self.roots.next() {
                    Some(root) => {
                        self.walker = Some(WalkDir::new(root).sort_by_file_name().into_iter());
                        continue;
                    }
                    None => return Ok(None),
                }
            };

            match walker.next() {
                Some(entry) => {
                    let entry = entry?;
                    let file_type = entry.file_type();
                    if file_type.is_dir() {
                        continue;
                    }

                    // Links are resolved for files only, the walk never descends through them.
                    let metadata = if file_type.is_symlink() {
                        match std::fs::metadata(entry.path()) {
                            Ok(metadata) => metadata,
                            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                            Err(e) => return Err(e.into()),
                        }
                    } else {
                        entry.metadata()?
                    };
                    if !metadata.is_file() {
                        continue;
                    }
                    if metadata.len() == 0 {
                        trace!(path = %entry.path().display(), "skipping empty file");
                        continue;
                    }
                    return Ok(Some(entry.into_path()));
                }
                None => self.walker = None,
            }
        }
    }

    fn fail(&mut self, e: Error) -> Option<Result<Chunk>> {
        self.failed = true;
        self.current = None;
        Some(Err(e))
    }
}

impl Iterator for PathChunks<'_> {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.failed {
                return None;
            }

            if let Some(chunks) = self.current.as_mut() {
                match chunks.next() {
                    Some(Ok(chunk)) => return Some(Ok(chunk)),
                    Some(Err(e)) => return self.fail(e),
                    None => self.current = None,
                }
            }

            match self.next_file() {
                Ok(Some(path)) => match self.chunker.chunk_file(&path) {
                    Ok(chunks) => self.current = Some(chunks),
                    Err(e) => return self.fail(e),
                },
                Ok(None) => return None,
                Err(e) => return self.fail(e),
            }
        }
    }
}

impl FusedIterator for PathChunks<'_> {}

#[cfg(test)]
#[path = "tests/core_tests.rs"]
mod tests;
