//! Typed errors for the encoding session and the translation of codec status codes.

use strum_macros::AsRefStr;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by a [`crate::Session`].
///
/// Every variant carries a human-readable detail. Raw codec status codes only
/// appear in [`Error::UnknownCodec`].
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown option, wrong value type, or a value the codec rejected
    #[error("Invalid configuration for '{option}': {message}")]
    Configuration { option: String, message: String },

    /// The codec handle could not be created or its parameters could not be locked
    #[error("Initialization failed: {0}")]
    Initialization(String),

    /// The operation is not valid in the session's current lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The output buffer could not be grown
    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    #[error("Psychoacoustic problem: {0}")]
    Psychoacoustic(String),

    /// Legacy codec status tied to an output format that is not compiled in
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// The output buffer was sized incorrectly for a codec call
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Unknown codec error (status {status})")]
    UnknownCodec { status: i32 },

    /// The PCM input does not consist of whole frames
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The discrete kind of an [`Error`], without its detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Initialization,
    InvalidState,
    OutOfMemory,
    Psychoacoustic,
    UnsupportedFeature,
    Internal,
    UnknownCodec,
    InvalidInput,
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl Error {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Initialization(..) => ErrorKind::Initialization,
            Self::InvalidState(..) => ErrorKind::InvalidState,
            Self::OutOfMemory(..) => ErrorKind::OutOfMemory,
            Self::Psychoacoustic(..) => ErrorKind::Psychoacoustic,
            Self::UnsupportedFeature(..) => ErrorKind::UnsupportedFeature,
            Self::Internal(..) => ErrorKind::Internal,
            Self::UnknownCodec { .. } => ErrorKind::UnknownCodec,
            Self::InvalidInput(..) => ErrorKind::InvalidInput,
            Self::Io(..) => ErrorKind::Io,
        }
    }

    pub(crate) fn configuration(option: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            option: option.into(),
            message: message.into(),
        }
    }
}

/// Translates the signed status returned by the codec's encode and flush calls.
///
/// Non-negative values are the number of bytes written to the destination
/// buffer. Zero is a valid result: the codec may buffer input without emitting
/// a frame yet.
///
/// # Errors
///
/// * `-1` the destination buffer was too small, reported as [`Error::Internal`]
/// * `-2` the codec ran out of memory, [`Error::OutOfMemory`]
/// * `-3` the codec parameters were never locked, [`Error::InvalidState`]
/// * `-4` [`Error::Psychoacoustic`]
/// * `-5` and `-6` [`Error::UnsupportedFeature`]
/// * any other negative value, [`Error::UnknownCodec`]
pub fn translate_status(status: i32) -> Result<usize> {
    if let Ok(written) = usize::try_from(status) {
        return Ok(written);
    }

    let error = match status {
        -1 => {
            log::warn!("Codec reported an undersized output buffer");
            Error::Internal("mp3 buffer too small for codec output".to_string())
        }
        -2 => Error::OutOfMemory("codec failed to allocate memory".to_string()),
        -3 => {
            log::warn!("Codec reported that its parameters were never locked");
            Error::InvalidState("codec parameters were not initialized".to_string())
        }
        -4 => Error::Psychoacoustic("psychoacoustic analysis failed".to_string()),
        -5 => {
            log::warn!("Codec returned legacy Ogg cleanup status");
            Error::UnsupportedFeature("ogg cleanup encoding is not supported".to_string())
        }
        -6 => {
            log::warn!("Codec returned legacy Ogg frame status");
            Error::UnsupportedFeature("ogg frame encoding is not supported".to_string())
        }
        status => Error::UnknownCodec { status },
    };

    Err(error)
}
