//!
//! Content-defined chunking based on the FastCDC algorithm, as described in the paper:
//! **"FastCDC: a Fast and Efficient Content-Defined Chunking Approach for Data Deduplication"**.
//!
//! ## Reference
//! * **Title**: FastCDC: a Fast and Efficient Content-Defined Chunking Approach for Data Deduplication
//! * **Authors**: Wen Xia, Yukun Zhou, Hong Jiang, Dan Feng, Yu Hua, Yuchong Hu, Qing Liu, and Yucheng Zhang.
//! * **Conference**: USENIX Annual Technical Conference (ATC '16), 2016.
//!
//! ## Detectors
//! 1. **FastCDC**: Gear rolling hash, `F = (F << 1) + gear[b]`, with sub-minimum cut-point
//!    skipping and normalized chunking (a stricter mask below the expected size, a looser one above).
//! 2. **FastCDC, right shift**: Identical except that the fingerprint is shifted right.
//! 3. **Fixed size**: Cuts every `n` bytes. A baseline without content alignment.
//!
//! The detector is picked once when a [`Chunker`] is built. [`Chunker`] then produces
//! lazy sequences of [`Chunk`]s, each carrying its digest.
//!

mod chunk;
mod core;
mod cut;
mod detector;
mod digest;
mod gear;
mod mask;
#[cfg(feature = "async")]
mod stream;

pub use chunk::{Chunk, ChunkMetadata};
pub use core::{Chunker, Chunks, PathChunks};
pub use cut::{CutPlan, LeftShift, RightShift, Roll, find_cutpoint};
pub use detector::{BoundaryDetector, Detector, FixedSizeDetector, GearDetector};
pub use digest::DigestAlgorithm;
pub use gear::{GearTable, MD5_GEAR, SEEDED_GEAR, SEEDED_GEAR_SEED};
pub use mask::{DEFAULT_MASK_SEED, MaskGenerator, MaskLayout, SCATTERED_MASK_WIDTH};
#[cfg(feature = "async")]
pub use stream::ChunkStream;
