use crate::error::{Error, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Represents a content-defined chunk.
///
/// Chunks own their payload, so keep them short-lived and retain
/// [`ChunkMetadata`] instead when a whole build has to be indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    data: Bytes,
    offset: u64,
    length: u32,
    hash: Vec<u8>,
    hex_hash: String,
}

impl Chunk {
    ///
    /// Constructs a new `Chunk`, deriving its hexadecimal hash once.
    ///
    /// ## Arguments
    ///
    /// * `data`: The chunk payload, at most `u32::MAX` bytes.
    /// * `offset`: The offset of the chunk in its source stream.
    /// * `hash`: The digest of `data`.
    ///
    pub(crate) fn new(data: Bytes, offset: u64, hash: Vec<u8>) -> Result<Self> {
        let length = u32::try_from(data.len()).map_err(|_| {
            Error::config(format!("chunk of {} bytes does not fit in 32 bits", data.len()))
        })?;

        Ok(Self {
            length,
            hex_hash: hex::encode(&hash),
            data,
            offset,
            hash,
        })
    }

    /// The chunk payload.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Takes the payload out of the chunk.
    pub fn into_data(self) -> Bytes {
        self.data
    }

    /// The offset of the chunk in its source stream.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The length of the chunk in bytes.
    pub fn length(&self) -> u32 {
        self.length
    }

    /// The digest of the payload.
    pub fn hash(&self) -> &[u8] {
        &self.hash
    }

    /// Lowercase hexadecimal form of [`Chunk::hash`].
    pub fn hex_hash(&self) -> &str {
        &self.hex_hash
    }

    /// Copies everything but the payload.
    pub fn to_metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            offset: self.offset,
            length: self.length,
            hash: self.hash.clone(),
            hex_hash: self.hex_hash.clone(),
        }
    }
}

/// A chunk without its payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "MetadataRecord")]
pub struct ChunkMetadata {
    offset: u64,
    length: u32,
    #[serde(with = "hex")]
    hash: Vec<u8>,
    #[serde(skip)]
    hex_hash: String,
}

impl ChunkMetadata {
    pub fn new(offset: u64, length: u32, hash: Vec<u8>) -> Self {
        Self {
            offset,
            length,
            hex_hash: hex::encode(&hash),
            hash,
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn hash(&self) -> &[u8] {
        &self.hash
    }

    pub fn hex_hash(&self) -> &str {
        &self.hex_hash
    }
}

impl From<Chunk> for ChunkMetadata {
    fn from(chunk: Chunk) -> Self {
        ChunkMetadata {
            offset: chunk.offset,
            length: chunk.length,
            hash: chunk.hash,
            hex_hash: chunk.hex_hash,
        }
    }
}

impl From<&Chunk> for ChunkMetadata {
    fn from(chunk: &Chunk) -> Self {
        chunk.to_metadata()
    }
}

#[derive(Deserialize)]
struct MetadataRecord {
    offset: u64,
    length: u32,
    #[serde(with = "hex")]
    hash: Vec<u8>,
}

impl From<MetadataRecord> for ChunkMetadata {
    fn from(record: MetadataRecord) -> Self {
        ChunkMetadata::new(record.offset, record.length, record.hash)
    }
}
