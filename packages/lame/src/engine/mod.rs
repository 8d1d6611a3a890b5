//! The codec engine adapter.
//!
//! A [`CodecEngine`] is the narrow surface the session drives: parameter
//! setters, the parameter lock, encode/flush into a caller-provided buffer, and
//! read-only counters. Engines report raw codec status codes; translating them
//! into [`crate::Error`] is the session's job.

#![allow(clippy::module_name_repetitions)]

use crate::{ConfigOption, OptionValue, Result};

#[cfg(feature = "lame")]
pub mod lame;

#[cfg(feature = "simulator")]
pub mod simulator;

/// Number of nominal bitrates in a codec bitrate table.
pub const BITRATE_BUCKETS: usize = 14;

/// Number of stereo modes tracked per frame.
pub const STEREO_MODES: usize = 4;

/// Version information reported by a codec engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineVersion {
    pub major: i32,
    pub minor: i32,
    pub alpha: i32,
    pub beta: i32,
    pub psy_major: i32,
    pub psy_minor: i32,
    pub psy_alpha: i32,
    pub psy_beta: i32,
    /// Compile time features of the codec library
    pub features: String,
    pub url: String,
}

impl std::fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if self.alpha > 0 {
            write!(f, " (alpha {})", self.alpha)?;
        } else if self.beta > 0 {
            write!(f, " (beta {})", self.beta)?;
        }
        Ok(())
    }
}

/// An exclusively owned codec handle.
///
/// Dropping the engine releases the handle.
pub trait CodecEngine {
    /// Allocates a fresh codec handle.
    ///
    /// # Errors
    ///
    /// * [`crate::Error::Initialization`] if the handle cannot be allocated
    fn create() -> Result<Self>
    where
        Self: Sized;

    /// Sets a parameter. Returns `0` on success and a negative value if the
    /// codec rejects the value.
    fn set_parameter(&mut self, option: ConfigOption, value: OptionValue) -> i32;

    /// Reads back a parameter. Only [`ConfigOption::is_readable`] options are
    /// guaranteed to return a value.
    fn parameter(&self, option: ConfigOption) -> Option<OptionValue>;

    /// Validates and locks the configured parameters. Returns a negative value
    /// if the configuration is rejected.
    fn lock_parameters(&mut self) -> i32;

    /// Encodes `frames` frames of interleaved 16-bit PCM into `dest`.
    ///
    /// Returns the number of bytes written, or a negative status code.
    fn encode(&mut self, pcm: &[i16], frames: usize, dest: &mut [u8]) -> i32;

    /// Encodes any buffered input and writes the final frames into `dest`.
    ///
    /// Returns the number of bytes written, or a negative status code.
    fn flush(&mut self, dest: &mut [u8]) -> i32;

    /// Frames encoded so far.
    fn frame_count(&self) -> u32;

    /// Estimated total frames for the configured sample count.
    fn estimated_total_frames(&self) -> u32;

    /// The nominal bitrates, in kbps, of the bitrate table in use.
    fn bitrate_table_kbps(&self) -> [u32; BITRATE_BUCKETS];

    /// Frames encoded at each nominal bitrate.
    fn bitrate_histogram(&self) -> [u32; BITRATE_BUCKETS];

    /// Frames encoded in each stereo mode, ordered LR, LR-intensity, MS,
    /// MS-intensity.
    fn stereo_mode_histogram(&self) -> [u32; STEREO_MODES];

    /// Frames encoded at each bitrate, split by stereo mode.
    fn bitrate_stereo_mode_histogram(&self) -> [[u32; STEREO_MODES]; BITRATE_BUCKETS];

    /// Writes the final VBR/LAME info frame into `dest`.
    ///
    /// Returns the number of bytes written, the required size if `dest` is too
    /// small, or `0` if the engine has no info frame to write.
    fn lametag_frame(&self, dest: &mut [u8]) -> usize;

    fn version(&self) -> EngineVersion;
}
