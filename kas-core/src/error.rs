//! # Error Handling
//!
//! Error types shared by every KAS component.
//!
//! ## Design Principles
//!
//! 1. **Stable kinds**: the set of variants is part of the format contract
//!    and does not change within a major version
//! 2. **Contextual**: variants carry the offsets, lengths and codes that
//!    triggered them
//! 3. **Defensive reads**: a file that ends early is a format problem, not
//!    an I/O problem, so truncation maps to [`Error::BadFileFormat`]

use thiserror::Error;

/// Result type alias for KAS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Primary error type for the KAS store
#[derive(Error, Debug)]
pub enum Error {
    /// Internal invariant violation. Seeing this is a bug in the library.
    #[error("internal error: {message}")]
    Generic { message: String },

    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Operation invoked on a store opened in the wrong mode.
    #[error("operation is not valid on a store opened in {mode} mode")]
    BadMode { mode: &'static str },

    #[error("out of memory: {message}")]
    NoMemory { message: String },

    /// Any structural violation: bad magic, short file, descriptor bounds
    /// outside the file, non-canonical packing.
    #[error("file is not in KAS format: {message}")]
    BadFileFormat { message: String },

    #[error("file major version {file} is older than library major version {library}")]
    VersionTooOld { file: u16, library: u16 },

    #[error("file major version {file} is newer than library major version {library}")]
    VersionTooNew { file: u16, library: u16 },

    #[error("unknown element type code {code}")]
    BadType { code: u8 },

    #[error("duplicate key: {key}")]
    DuplicateKey { key: String },

    #[error("key not found")]
    KeyNotFound,

    #[error("keys must be at least one byte long")]
    EmptyKey,
}

impl Error {
    /// Stable error code for monitoring and assertions
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Generic { .. } => "GENERIC",
            Error::Io { .. } => "IO_ERROR",
            Error::BadMode { .. } => "BAD_MODE",
            Error::NoMemory { .. } => "NO_MEMORY",
            Error::BadFileFormat { .. } => "BAD_FILE_FORMAT",
            Error::VersionTooOld { .. } => "VERSION_TOO_OLD",
            Error::VersionTooNew { .. } => "VERSION_TOO_NEW",
            Error::BadType { .. } => "BAD_TYPE",
            Error::DuplicateKey { .. } => "DUPLICATE_KEY",
            Error::KeyNotFound => "KEY_NOT_FOUND",
            Error::EmptyKey => "EMPTY_KEY",
        }
    }

    /// Constructor for unreachable internal paths.
    pub fn generic(message: impl Into<String>) -> Self {
        Error::Generic {
            message: message.into(),
        }
    }

    /// Constructor used by the internal codecs for structural violations.
    pub fn bad_format(message: impl Into<String>) -> Self {
        Error::BadFileFormat {
            message: message.into(),
        }
    }
}

// Conversion from std::io::Error. Read paths that must distinguish
// truncation from genuine I/O failure map UnexpectedEof themselves before
// this conversion applies.
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            message: err.to_string(),
            source: err,
        }
    }
}
