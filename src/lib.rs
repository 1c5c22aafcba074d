//!
//! Content-defined chunking for deduplication and incremental transfer.
//!
//! A [`Chunker`] splits byte streams, files and directory trees into variable-size
//! [`Chunk`]s whose boundaries depend on the content, so that a local edit only
//! disturbs the chunks around it. The chunks of two builds of the same artifact can
//! then be compared with [`diff`] to find what has to be shipped.
//!
//! ```no_run
//! use gearcut::{ChunkMetadata, ChunkerConfig, diff};
//!
//! # fn main() -> gearcut::Result<()> {
//! let chunker = ChunkerConfig::default().build()?;
//!
//! let previous = chunker
//!     .chunk_path("build-1.0")?
//!     .map(|chunk| chunk.map(ChunkMetadata::from))
//!     .collect::<gearcut::Result<Vec<_>>>()?;
//! let current = chunker
//!     .chunk_path("build-1.1")?
//!     .map(|chunk| chunk.map(ChunkMetadata::from))
//!     .collect::<gearcut::Result<Vec<_>>>()?;
//!
//! let patch = diff(previous, current);
//! println!("{} chunks to add, {} bytes", patch.to_add().len(), patch.patch_size());
//! # Ok(())
//! # }
//! ```
//!

pub mod chunking;
pub mod config;
pub mod error;
pub mod patch;

pub use chunking::{Chunk, ChunkMetadata, Chunker, DigestAlgorithm, GearTable, MaskLayout};
pub use config::{Algorithm, ChunkerConfig};
pub use error::{Error, Result};
pub use patch::{BuildSummary, PatchSummary, diff};
