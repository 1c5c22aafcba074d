use crate::chunking::cut::{CutPlan, Cutter, LeftShift, RightShift, Roll, find_cutpoint};
use crate::error::{Error, Result};
use bytes::Bytes;
use std::io::{self, BufRead};
use std::marker::PhantomData;

/// Finds chunk boundaries in a byte source.
///
/// Implementors only describe the next chunk (`plan`) and test bytes (`scan`);
/// `read_next_chunk` drives both over any buffered source.
pub trait BoundaryDetector {
    /// Lays out the next chunk given the number of bytes left, which is never zero.
    fn plan(&self, remaining: u64) -> CutPlan;

    /// Tests `window`, starting at chunk position `position`, for a boundary.
    ///
    /// Returns how many bytes of `window` end the chunk, or `None` to keep reading.
    fn scan(&self, fp_hash: &mut u64, window: &[u8], position: usize, plan: &CutPlan) -> Option<usize>;

    ///
    /// Reads the next chunk from `source`, which is positioned at `current_offset`
    /// of a stream declared to hold `total_size` bytes.
    ///
    /// Exactly the returned bytes are consumed from `source`.
    ///
    /// ## Errors
    ///
    /// * `Error::OutOfData` if `current_offset` is not below `total_size`.
    /// * `Error::StreamExhausted` if `source` ends before the chunk is complete.
    /// * `Error::Io` for any error of `source`.
    ///
    fn read_next_chunk<R>(&self, source: &mut R, total_size: u64, current_offset: u64) -> Result<Bytes>
    where
        R: BufRead + ?Sized,
    {
        let remaining = total_size
            .checked_sub(current_offset)
            .filter(|&remaining| remaining > 0)
            .ok_or(Error::OutOfData {
                offset: current_offset,
                size: total_size,
            })?;

        let mut cutter = Cutter::new(self.plan(remaining));

        loop {
            let available = match source.fill_buf() {
                Ok(available) => available,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };

            if available.is_empty() {
                return Err(Error::StreamExhausted {
                    declared: total_size,
                    delivered: current_offset + cutter.len() as u64,
                });
            }

            let (used, complete) = cutter.feed(self, available);
            source.consume(used);

            if complete {
                return Ok(cutter.finish());
            }
        }
    }
}

/// Gear rolling-hash detector with normalized chunking.
///
/// `S` fixes the shift direction of the fingerprint at compile time.
#[derive(Debug, Clone)]
pub struct GearDetector<S> {
    min_size: usize,
    expected_size: usize,
    max_size: usize,
    gear: [u64; 256],
    mask_s: u64,
    mask_l: u64,
    roll: PhantomData<S>,
}

impl<S: Roll> GearDetector<S> {
    ///
    /// Constructs a new `GearDetector`.
    ///
    /// ## Arguments
    ///
    /// * `min_size`: Bytes taken without a boundary test.
    /// * `expected_size`: Chunk size from which `mask_l` replaces `mask_s`.
    /// * `max_size`: Hard cap for a chunk.
    /// * `gear`: Gear table, one value per byte.
    /// * `mask_s`: Mask tested below `expected_size`.
    /// * `mask_l`: Mask tested from `expected_size` on.
    ///
    /// ## Errors
    ///
    /// Returns `Error::Configuration` unless `min_size <= expected_size <= max_size`,
    /// `max_size > 0` and `max_size` fits in a `u32`.
    ///
    pub fn new(
        min_size: usize,
        expected_size: usize,
        max_size: usize,
        gear: [u64; 256],
        mask_s: u64,
        mask_l: u64,
    ) -> Result<Self> {
        if max_size == 0 {
            return Err(Error::config("max_size must be positive"));
        }

        if u32::try_from(max_size).is_err() {
            return Err(Error::config(format!(
                "max_size must fit in 32 bits, was: {max_size}"
            )));
        }

        if !(min_size <= expected_size && expected_size <= max_size) {
            return Err(Error::config(
                "must satisfy the condition: min_size <= expected_size <= max_size",
            ));
        }

        Ok(Self {
            min_size,
            expected_size,
            max_size,
            gear,
            mask_s,
            mask_l,
            roll: PhantomData,
        })
    }

    pub fn min_size(&self) -> usize {
        self.min_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn masks(&self) -> (u64, u64) {
        (self.mask_s, self.mask_l)
    }
}

impl<S: Roll> BoundaryDetector for GearDetector<S> {
    fn plan(&self, remaining: u64) -> CutPlan {
        let remaining = usize::try_from(remaining).unwrap_or(usize::MAX);

        if remaining <= self.min_size {
            return CutPlan::fixed(remaining);
        }

        let limit = remaining.min(self.max_size);
        CutPlan {
            skip: self.min_size,
            normal: self.expected_size.min(limit),
            limit,
        }
    }

    #[inline]
    fn scan(&self, fp_hash: &mut u64, window: &[u8], position: usize, plan: &CutPlan) -> Option<usize> {
        find_cutpoint::<S>(
            &self.gear,
            window,
            position,
            plan.normal,
            self.mask_s,
            self.mask_l,
            fp_hash,
        )
    }
}

/// Content-agnostic baseline that cuts every `chunk_size` bytes.
#[derive(Debug, Clone, Copy)]
pub struct FixedSizeDetector {
    chunk_size: usize,
}

impl FixedSizeDetector {
    pub fn new(chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::config("chunk size must be positive"));
        }
        if u32::try_from(chunk_size).is_err() {
            return Err(Error::config(format!(
                "chunk size must fit in 32 bits, was: {chunk_size}"
            )));
        }
        Ok(Self { chunk_size })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl BoundaryDetector for FixedSizeDetector {
    fn plan(&self, remaining: u64) -> CutPlan {
        let remaining = usize::try_from(remaining).unwrap_or(usize::MAX);
        CutPlan::fixed(remaining.min(self.chunk_size))
    }

    fn scan(&self, _fp_hash: &mut u64, _window: &[u8], _position: usize, _plan: &CutPlan) -> Option<usize> {
        None
    }
}

/// The detectors a `Chunker` can run, picked once from its configuration.
#[derive(Debug, Clone)]
pub enum Detector {
    FastCdc(GearDetector<LeftShift>),
    FastCdcRightShift(GearDetector<RightShift>),
    FixedSize(FixedSizeDetector),
}

impl Detector {
    /// Largest chunk this detector can produce.
    pub fn max_size(&self) -> usize {
        match self {
            Detector::FastCdc(d) => d.max_size(),
            Detector::FastCdcRightShift(d) => d.max_size(),
            Detector::FixedSize(d) => d.chunk_size(),
        }
    }

    /// Smallest chunk this detector produces, except at the end of a stream.
    pub fn min_size(&self) -> usize {
        match self {
            Detector::FastCdc(d) => d.min_size(),
            Detector::FastCdcRightShift(d) => d.min_size(),
            Detector::FixedSize(d) => d.chunk_size(),
        }
    }
}

impl BoundaryDetector for Detector {
    fn plan(&self, remaining: u64) -> CutPlan {
        match self {
            Detector::FastCdc(d) => d.plan(remaining),
            Detector::FastCdcRightShift(d) => d.plan(remaining),
            Detector::FixedSize(d) => d.plan(remaining),
        }
    }

    fn scan(&self, fp_hash: &mut u64, window: &[u8], position: usize, plan: &CutPlan) -> Option<usize> {
        match self {
            Detector::FastCdc(d) => d.scan(fp_hash, window, position, plan),
            Detector::FastCdcRightShift(d) => d.scan(fp_hash, window, position, plan),
            Detector::FixedSize(d) => d.scan(fp_hash, window, position, plan),
        }
    }
}

#[cfg(test)]
#[path = "tests/detector_tests.rs"]
mod tests;
