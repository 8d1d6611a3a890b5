//! Stateful MP3 encoding over LAME.
//!
//! A [`Session`] drives a codec engine through configuration, parameter
//! locking, encoding, and a single flush, while managing an output buffer sized
//! against the worst-case MP3 expansion bound and translating the codec's
//! status codes into typed [`Error`]s.
//!
//! # Features
//!
//! * `lame` - The libmp3lame codec engine
//! * `simulator` - A deterministic in-memory codec engine with scripted failures
//!
//! All features are enabled by default.
//!
//! # Example
//!
//! ```rust
//! # #[cfg(feature = "simulator")]
//! # {
//! use moosicbox_lame::{ConfigOption, SimulatedSession};
//!
//! # fn example() -> Result<(), moosicbox_lame::Error> {
//! let mut session = SimulatedSession::new()?;
//! session.configure(ConfigOption::NumChannels, 2)?;
//! session.configure(ConfigOption::Bitrate, 128)?;
//! session.configure(ConfigOption::NumSamples, 44_100)?;
//! session.initialize()?;
//!
//! let mut mp3 = Vec::new();
//! let silence = vec![0i16; 2 * 44_100];
//! mp3.extend_from_slice(session.encode(&silence)?);
//! mp3.extend_from_slice(session.flush()?);
//!
//! println!("{} frames, {} bytes", session.frame_count()?, mp3.len());
//! session.close();
//! # Ok(())
//! # }
//! # example().unwrap();
//! # }
//! ```

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

pub mod buffer;
pub mod config;
pub mod engine;
pub mod error;
pub mod option;
pub mod session;
pub mod stats;

pub use buffer::OutputBuffer;
pub use config::SessionConfig;
pub use engine::{CodecEngine, EngineVersion};
pub use error::{Error, ErrorKind, Result};
pub use option::{ConfigOption, MpegMode, OptionKind, OptionValue, Preset, VbrMode};
pub use session::{Session, SessionState};
pub use stats::{BitrateBucket, BitrateStereoModeRow, StereoMode, StereoModeHistogram};

/// A session over libmp3lame.
#[cfg(feature = "lame")]
pub type LameSession = Session<engine::lame::LameEngine>;

/// A session over the in-memory simulator.
#[cfg(feature = "simulator")]
pub type SimulatedSession = Session<engine::simulator::SimulatedEngine>;
