//! Error types for the unredaction engine.
//!
//! Failures are scoped to the smallest unit that can absorb them: an image
//! that cannot be decoded is kept unclassified, a page whose content stream
//! is malformed becomes a blank page, and only document-level conditions
//! (unreadable container, failed serialization) abort a single document.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type alias for unredaction operations.
pub type UnredactResult<T> = Result<T, UnredactError>;

/// Error type for all unredaction operations.
#[derive(Debug)]
pub enum UnredactError {
    /// The PDF container could not be opened or parsed at all.
    UnreadableDocument {
        name: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// One page's content stream is malformed. Recovered with a blank page.
    UnreadablePage { page: u32, reason: String },

    /// One raster image could not be decoded. Recovered by keeping it.
    UndecodableImage { page: u32, source: DecodeError },

    /// Part of a page's content (a nested form or a missing XObject) could
    /// not be interpreted. The page is rebuilt without it.
    IncompleteContent { page: u32, reason: String },

    /// Serializing the reconstructed document or its report failed.
    WriteFailure {
        name: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Error occurred while reading or writing files
    Io { path: PathBuf, source: io::Error },

    /// Invalid configuration or parameters
    InvalidInput { parameter: String, reason: String },
}

impl UnredactError {
    /// Returns true for failures the assembler recovers from without
    /// abandoning the document.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnreadablePage { .. }
                | Self::UndecodableImage { .. }
                | Self::IncompleteContent { .. }
        )
    }

    /// The 1-based page this failure is scoped to, if any.
    pub fn page(&self) -> Option<u32> {
        match self {
            Self::UnreadablePage { page, .. }
            | Self::UndecodableImage { page, .. }
            | Self::IncompleteContent { page, .. } => Some(*page),
            _ => None,
        }
    }
}

impl fmt::Display for UnredactError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnreadableDocument { name, source } => match source {
                Some(err) => write!(f, "Cannot read document '{}': {}", name, err),
                None => write!(f, "Cannot read document '{}'", name),
            },
            Self::UnreadablePage { page, reason } => {
                write!(f, "Cannot read page {}: {}", page, reason)
            }
            Self::UndecodableImage { page, source } => {
                write!(f, "Cannot decode image on page {}: {}", page, source)
            }
            Self::IncompleteContent { page, reason } => {
                write!(f, "Incomplete content on page {}: {}", page, reason)
            }
            Self::WriteFailure { name, source } => match source {
                Some(err) => write!(f, "Failed to write output for '{}': {}", name, err),
                None => write!(f, "Failed to write output for '{}'", name),
            },
            Self::Io { path, source } => {
                write!(f, "IO error for path '{}': {}", path.display(), source)
            }
            Self::InvalidInput { parameter, reason } => {
                write!(f, "Invalid input for '{}': {}", parameter, reason)
            }
        }
    }
}

impl std::error::Error for UnredactError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::UndecodableImage { source, .. } => Some(source),
            Self::UnreadableDocument { source, .. } | Self::WriteFailure { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl From<io::Error> for UnredactError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<lopdf::Error> for UnredactError {
    fn from(err: lopdf::Error) -> Self {
        Self::UnreadableDocument {
            name: "<unknown>".to_string(),
            source: Some(Box::new(err)),
        }
    }
}

/// Why an image's samples could not be turned into a brightness value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("unsupported image filter {0}")]
    UnsupportedFilter(String),

    #[error("unsupported color space {0}")]
    UnsupportedColorSpace(String),

    #[error("unsupported bits per component {0}")]
    UnsupportedBitDepth(i64),

    #[error("stream decompression failed: {0}")]
    Decompression(String),

    #[error("JPEG decode failed: {0}")]
    Jpeg(String),

    #[error("image has no samples")]
    Empty,

    #[error("image of {width}x{height} does not fit in {actual} bytes of data")]
    Truncated {
        width: usize,
        height: usize,
        actual: usize,
    },

    #[error("missing image attribute {0}")]
    MissingAttribute(&'static str),
}
