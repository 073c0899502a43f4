//! Error types that can be emitted from this library

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent warpper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// unable to open {path}
    #[error("unable to open {}", path.display())]
    OpenFailed {
        /// The archive or loose file that failed to open
        path: PathBuf,
        /// Underlying cause
        #[source]
        source: std::io::Error,
    },

    /// file is invalid or truncated
    #[error("file is invalid or truncated")]
    Truncated,

    /// file is not a supported dat archive: {0}
    #[error("file is not a supported dat archive: {0}")]
    #[diagnostic(help("only Fallout 1, Fallout 2 and Arcanum archives can be read"))]
    UnsupportedFormat(String),

    /// unable to allocate {0} bytes
    #[error("unable to allocate {0} bytes")]
    AllocFailed(usize),

    /// unable to decode entry data: {0}
    #[error("unable to decode entry data: {0}")]
    DecodeError(String),

    /// unable to find requested file
    #[error("unable to find requested file")]
    FileNotFound(#[from] FileNotFoundError),
}

/// Error type to provide further information when a file has not been found
#[derive(Error, Diagnostic, Debug)]
#[error("unable to find requested file")]
pub enum FileNotFoundError {
    /// at index {0}
    #[error("at index {0}")]
    Index(usize),

    /// by name {0}
    #[error("by name {0}")]
    Name(String),

    /// by name {name} in any of {searched:?}
    #[error("by name {name} in any of {searched:?}")]
    Sources {
        /// The requested path
        name: String,
        /// Every source that was probed, in probe order
        searched: Vec<String>,
    },
}

impl Error {
    /// Whether this error only means the requested path is absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::FileNotFound(_))
    }
}

impl From<flate2::DecompressError> for Error {
    fn from(value: flate2::DecompressError) -> Self {
        Error::DecodeError(value.to_string())
    }
}

impl From<Error> for std::io::Error {
    fn from(value: Error) -> Self {
        match value {
            Error::IOError(e) => e,
            Error::FileNotFound(e) => std::io::Error::new(std::io::ErrorKind::NotFound, e),
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other),
        }
    }
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
