use std::io;
use std::path::PathBuf;

/// Errors raised while configuring a chunker, chunking a source or walking paths.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration or usage, detected before any byte is read.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A configuration file could not be parsed.
    #[error("invalid configuration file: {0}")]
    ConfigFile(#[from] toml::de::Error),

    /// A chunk was requested at or past the declared end of the source.
    #[error("no data left: offset {offset} is not below the declared size {size}")]
    OutOfData { offset: u64, size: u64 },

    /// The source ended before delivering the declared number of bytes.
    #[error("stream exhausted: declared {declared} bytes but the source ended after {delivered}")]
    StreamExhausted { declared: u64, delivered: u64 },

    /// I/O error from the underlying byte source.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Directory traversal error.
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// The path is neither a regular file nor a directory.
    #[error("only regular files and directories can be chunked: {0}")]
    UnsupportedPath(PathBuf),
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
