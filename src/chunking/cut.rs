use crate::chunking::detector::BoundaryDetector;
use bytes::{Bytes, BytesMut};

/// Direction in which the gear fingerprint is shifted before each byte is added.
pub trait Roll {
    fn roll(fp_hash: u64, gear: u64) -> u64;
}

/// `F = (F << 1) + gear[b]`, the canonical FastCDC fingerprint.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeftShift;

/// `F = (F >> 1) + gear[b]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RightShift;

impl Roll for LeftShift {
    #[inline(always)]
    fn roll(fp_hash: u64, gear: u64) -> u64 {
        (fp_hash << 1).wrapping_add(gear)
    }
}

impl Roll for RightShift {
    #[inline(always)]
    fn roll(fp_hash: u64, gear: u64) -> u64 {
        (fp_hash >> 1).wrapping_add(gear)
    }
}

/// Layout of the next chunk, decided from the number of bytes left in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutPlan {
    /// Leading bytes taken without a boundary test.
    pub skip: usize,
    /// Position from which the large mask applies.
    pub normal: usize,
    /// Hard cap, the chunk never grows past it.
    pub limit: usize,
}

impl CutPlan {
    /// A plan that takes exactly `len` bytes without testing any of them.
    pub fn fixed(len: usize) -> Self {
        Self {
            skip: len,
            normal: len,
            limit: len,
        }
    }
}

///
/// Scans `window` with a gear rolling hash.
///
/// `position` is the offset of `window[0]` within the chunk being built. Bytes below
/// `normal` are tested against `mask_s`, the rest against `mask_l`.
///
/// Returns the number of bytes of `window` that belong to the chunk when a boundary
/// was found. `fp_hash` carries the fingerprint across calls.
///
#[inline]
pub fn find_cutpoint<S: Roll>(
    gear: &[u64; 256],
    window: &[u8],
    position: usize,
    normal: usize,
    mask_s: u64,
    mask_l: u64,
    fp_hash: &mut u64,
) -> Option<usize> {
    let mut hash = *fp_hash;
    let split = normal.saturating_sub(position).min(window.len());

    for (idx, &byte) in window[..split].iter().enumerate() {
        hash = S::roll(hash, gear[byte as usize]);

        if (hash & mask_s) == 0 {
            *fp_hash = hash;
            return Some(idx + 1);
        }
    }

    for (idx, &byte) in window[split..].iter().enumerate() {
        hash = S::roll(hash, gear[byte as usize]);

        if (hash & mask_l) == 0 {
            *fp_hash = hash;
            return Some(split + idx + 1);
        }
    }

    *fp_hash = hash;
    None
}

/// Assembles one chunk from successive windows of a buffered source.
///
/// Only ever takes bytes that belong to the chunk, so the caller can consume
/// exactly what `feed` reports.
#[derive(Debug)]
pub(crate) struct Cutter {
    plan: CutPlan,
    buf: BytesMut,
    fp_hash: u64,
}

impl Cutter {
    pub(crate) fn new(plan: CutPlan) -> Self {
        Self {
            plan,
            buf: BytesMut::with_capacity(plan.limit),
            fp_hash: 0,
        }
    }

    /// Bytes gathered so far.
    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    /// Takes as many bytes of `available` as the chunk needs.
    ///
    /// Returns the number of bytes taken and whether the chunk is complete.
    pub(crate) fn feed<D>(&mut self, detector: &D, available: &[u8]) -> (usize, bool)
    where
        D: BoundaryDetector + ?Sized,
    {
        let mut taken = 0;

        if self.buf.len() < self.plan.skip {
            taken = (self.plan.skip - self.buf.len()).min(available.len());
            self.buf.extend_from_slice(&available[..taken]);
        }

        if self.buf.len() >= self.plan.limit {
            return (taken, true);
        }
        if self.buf.len() < self.plan.skip {
            return (taken, false);
        }

        let rest = &available[taken..];
        let window = &rest[..(self.plan.limit - self.buf.len()).min(rest.len())];

        match detector.scan(&mut self.fp_hash, window, self.buf.len(), &self.plan) {
            Some(cutpoint) => {
                self.buf.extend_from_slice(&window[..cutpoint]);
                (taken + cutpoint, true)
            }
            None => {
                self.buf.extend_from_slice(window);
                (taken + window.len(), self.buf.len() >= self.plan.limit)
            }
        }
    }

    pub(crate) fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}
