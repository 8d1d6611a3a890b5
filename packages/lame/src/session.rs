//! The encoding session state machine.
//!
//! A [`Session`] owns one codec engine and one output buffer. It moves through
//! `Created -> Configured -> Initialized -> Encoding -> Flushed -> Closed`, and
//! every operation checks the current state before touching the engine.

use std::{
    io::{Read, Seek, SeekFrom, Write},
    str::FromStr as _,
};

use strum_macros::AsRefStr;

use crate::{
    ConfigOption, Error, OptionValue, Result, SessionConfig,
    buffer::OutputBuffer,
    engine::{BITRATE_BUCKETS, CodecEngine, EngineVersion},
    error::translate_status,
    stats::{self, BitrateBucket, BitrateStereoModeRow, StereoModeHistogram},
};

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    Created,
    Configured,
    Initialized,
    Encoding,
    Flushed,
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl SessionState {
    /// Whether the codec parameters have been locked.
    #[must_use]
    pub const fn is_locked(self) -> bool {
        matches!(self, Self::Initialized | Self::Encoding | Self::Flushed)
    }
}

/// A stateful MP3 encoding session.
///
/// The byte slices returned by [`Session::encode`] and [`Session::flush`]
/// borrow the session's output buffer and are only valid until the next call
/// on the session. Copy them out if they need to outlive it.
pub struct Session<E: CodecEngine> {
    engine: Option<E>,
    buffer: OutputBuffer,
    samples_hint: Option<u64>,
    channels: usize,
    state: SessionState,
}

impl<E: CodecEngine> std::fmt::Debug for Session<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("capacity", &self.buffer.capacity())
            .field("samples_hint", &self.samples_hint)
            .field("channels", &self.channels)
            .finish_non_exhaustive()
    }
}

impl<E: CodecEngine> Session<E> {
    /// Creates a session with a freshly allocated codec handle.
    ///
    /// # Errors
    ///
    /// * [`Error::Initialization`] if the engine cannot allocate a handle
    pub fn new() -> Result<Self> {
        Ok(Self::with_engine(E::create()?))
    }

    /// Creates a session around an already created engine.
    #[must_use]
    pub fn with_engine(engine: E) -> Self {
        let channels = engine
            .parameter(ConfigOption::NumChannels)
            .and_then(OptionValue::as_int)
            .and_then(|channels| usize::try_from(channels).ok())
            .filter(|&channels| channels > 0)
            .unwrap_or(2);

        Self {
            engine: Some(engine),
            buffer: OutputBuffer::new(),
            samples_hint: None,
            channels,
            state: SessionState::Created,
        }
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Current output buffer capacity in bytes.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// The declared total sample count per channel, if configured.
    #[must_use]
    pub const fn samples_hint(&self) -> Option<u64> {
        self.samples_hint
    }

    /// The underlying engine, unless the session is closed.
    #[must_use]
    pub const fn engine(&self) -> Option<&E> {
        self.engine.as_ref()
    }

    fn invalid_state(&self, operation: &str) -> Error {
        Error::InvalidState(format!(
            "cannot {operation} a session in the {} state",
            self.state
        ))
    }

    fn require(&self, operation: &str, allowed: &[SessionState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(self.invalid_state(operation))
        }
    }

    fn open_engine(&self, operation: &str) -> Result<&E> {
        self.engine
            .as_ref()
            .ok_or_else(|| self.invalid_state(operation))
    }

    /// Sets an encoder option.
    ///
    /// Before [`Session::initialize`] every option is writable. Afterwards only
    /// the options for which [`ConfigOption::is_writable_after_lock`] holds can
    /// change.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidState`] if the session is closed or the option is
    ///   locked
    /// * [`Error::Configuration`] if the value has the wrong type or the codec
    ///   rejects it
    pub fn configure(&mut self, option: ConfigOption, value: impl Into<OptionValue>) -> Result<()> {
        if self.state == SessionState::Closed
            || (self.state.is_locked() && !option.is_writable_after_lock())
        {
            return Err(self.invalid_state(&format!("configure '{option}' on")));
        }

        let value = option.coerce(value.into())?;
        let Some(engine) = self.engine.as_mut() else {
            return Err(self.invalid_state("configure"));
        };

        let status = engine.set_parameter(option, value);
        if status < 0 {
            return Err(Error::configuration(
                option.as_ref(),
                format!("value {value} rejected by codec"),
            ));
        }

        log::debug!("Configured {option} = {value}");

        match (option, value) {
            (ConfigOption::NumSamples, OptionValue::Int(samples)) => {
                self.samples_hint = u64::try_from(samples).ok();
            }
            (ConfigOption::NumChannels, OptionValue::Int(channels)) => {
                if let Some(channels) = usize::try_from(channels).ok().filter(|&c| c > 0) {
                    self.channels = channels;
                }
            }
            _ => {}
        }

        if self.state == SessionState::Created {
            self.state = SessionState::Configured;
        }

        Ok(())
    }

    /// Sets an encoder option by name.
    ///
    /// # Errors
    ///
    /// * [`Error::Configuration`] if `name` is not a known option, plus every
    ///   error of [`Session::configure`]
    pub fn configure_named(&mut self, name: &str, value: impl Into<OptionValue>) -> Result<()> {
        let option = ConfigOption::from_str(name)
            .map_err(|_| Error::configuration(name, "unknown option"))?;

        self.configure(option, value)
    }

    /// Applies every option in `config`, stopping at the first rejection.
    ///
    /// # Errors
    ///
    /// * The first error returned by [`Session::configure`]
    pub fn apply_config(&mut self, config: &SessionConfig) -> Result<()> {
        for (option, value) in config.iter() {
            self.configure(option, value)?;
        }

        Ok(())
    }

    /// Reads back one of the readable options.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidState`] if the session is closed
    /// * [`Error::Configuration`] if the option is write-only
    pub fn get(&self, option: ConfigOption) -> Result<OptionValue> {
        let engine = self.open_engine("read an option from")?;

        if !option.is_readable() {
            return Err(Error::configuration(option.as_ref(), "option is write-only"));
        }

        engine
            .parameter(option)
            .ok_or_else(|| Error::configuration(option.as_ref(), "value unavailable"))
    }

    fn get_int(&self, option: ConfigOption) -> Result<u32> {
        self.get(option)?
            .as_int()
            .and_then(|value| u32::try_from(value).ok())
            .ok_or_else(|| Error::configuration(option.as_ref(), "not a positive integer"))
    }

    /// # Errors
    ///
    /// * [`Error::InvalidState`] if the session is closed
    pub fn sample_rate(&self) -> Result<u32> {
        self.get_int(ConfigOption::InSamplerate)
    }

    /// # Errors
    ///
    /// * [`Error::InvalidState`] if the session is closed
    pub fn channel_count(&self) -> Result<u32> {
        self.get_int(ConfigOption::NumChannels)
    }

    /// # Errors
    ///
    /// * [`Error::InvalidState`] if the session is closed
    pub fn scale(&self) -> Result<f64> {
        Ok(self.get(ConfigOption::Scale)?.as_float())
    }

    /// # Errors
    ///
    /// * [`Error::InvalidState`] if the session is closed
    pub fn scale_left(&self) -> Result<f64> {
        Ok(self.get(ConfigOption::ScaleLeft)?.as_float())
    }

    /// # Errors
    ///
    /// * [`Error::InvalidState`] if the session is closed
    pub fn scale_right(&self) -> Result<f64> {
        Ok(self.get(ConfigOption::ScaleRight)?.as_float())
    }

    /// Sizes the output buffer for the sample hint and locks the codec
    /// parameters.
    ///
    /// On failure the session stays `Configured`; the caller should close it.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidState`] unless the session is `Created` or `Configured`
    /// * [`Error::OutOfMemory`] if the buffer cannot be allocated
    /// * [`Error::Initialization`] if the codec rejects the configuration
    pub fn initialize(&mut self) -> Result<()> {
        self.require(
            "initialize",
            &[SessionState::Created, SessionState::Configured],
        )?;

        let frames = usize::try_from(self.samples_hint.unwrap_or(0)).map_err(|_| {
            Error::OutOfMemory("sample hint exceeds the addressable buffer size".to_string())
        })?;
        self.buffer.allocate(frames)?;

        let Some(engine) = self.engine.as_mut() else {
            return Err(self.invalid_state("initialize"));
        };

        let status = engine.lock_parameters();
        if status < 0 {
            log::error!("Codec rejected the configuration (status {status})");
            self.state = SessionState::Configured;
            return Err(Error::Initialization(
                "codec rejected the configured parameters".to_string(),
            ));
        }

        log::debug!(
            "Initialized session: {} byte output buffer for {frames} frames",
            self.buffer.capacity()
        );

        self.state = SessionState::Initialized;

        Ok(())
    }

    /// Encodes interleaved 16-bit PCM.
    ///
    /// Returns the encoded bytes, which may be empty while the codec buffers
    /// input. The slice is valid until the next call on the session.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidState`] unless the session is `Initialized` or
    ///   `Encoding`
    /// * [`Error::InvalidInput`] if `pcm` is not made of whole frames
    /// * [`Error::OutOfMemory`] if the output buffer cannot grow
    /// * Any codec error from [`translate_status`]
    pub fn encode(&mut self, pcm: &[i16]) -> Result<&[u8]> {
        self.require(
            "encode",
            &[SessionState::Initialized, SessionState::Encoding],
        )?;

        if pcm.len() % self.channels != 0 {
            return Err(Error::InvalidInput(format!(
                "{} samples is not a whole number of {}-channel frames",
                pcm.len(),
                self.channels
            )));
        }

        let frames = pcm.len() / self.channels;
        if i32::try_from(frames).is_err() {
            return Err(Error::InvalidInput(format!(
                "{frames} frames exceeds the codec's per-call limit"
            )));
        }

        self.buffer.ensure_capacity(frames)?;

        let Some(engine) = self.engine.as_mut() else {
            return Err(self.invalid_state("encode"));
        };

        let status = engine.encode(pcm, frames, self.buffer.destination());
        let written = translate_status(status)?;

        log::trace!("Encoded {frames} frames into {written} bytes");

        self.state = SessionState::Encoding;

        self.buffer.commit(written)
    }

    /// Encodes any buffered input and returns the final frames.
    ///
    /// The session moves to `Flushed` whether or not the codec succeeds, so a
    /// second flush always fails with [`Error::InvalidState`].
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidState`] unless the session is `Initialized` or
    ///   `Encoding`
    /// * Any codec error from [`translate_status`]
    pub fn flush(&mut self) -> Result<&[u8]> {
        self.require("flush", &[SessionState::Initialized, SessionState::Encoding])?;

        self.buffer.ensure_capacity(0)?;

        let Some(engine) = self.engine.as_mut() else {
            return Err(self.invalid_state("flush"));
        };

        let status = engine.flush(self.buffer.destination());
        self.state = SessionState::Flushed;

        let written = translate_status(status).inspect_err(|e| {
            log::error!("Flush failed: {e}");
        })?;

        log::debug!("Flushed {written} bytes");

        self.buffer.commit(written)
    }

    /// Frames encoded so far.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidState`] if the session is closed
    pub fn frame_count(&self) -> Result<u32> {
        Ok(self.open_engine("read statistics from")?.frame_count())
    }

    /// Estimated total frame count, accurate when
    /// [`ConfigOption::NumSamples`] was set before initializing.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidState`] if the session is closed
    pub fn estimated_total_frames(&self) -> Result<u32> {
        Ok(self
            .open_engine("read statistics from")?
            .estimated_total_frames())
    }

    /// The nominal bitrates, in kbps, of the bitrate table in use.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidState`] if the session is closed
    pub fn bitrate_values(&self) -> Result<[u32; BITRATE_BUCKETS]> {
        Ok(self.open_engine("read statistics from")?.bitrate_table_kbps())
    }

    /// # Errors
    ///
    /// * [`Error::InvalidState`] if the session is closed
    pub fn bitrate_histogram(&self) -> Result<Vec<BitrateBucket>> {
        Ok(stats::bitrate_histogram(
            self.open_engine("read statistics from")?,
        ))
    }

    /// # Errors
    ///
    /// * [`Error::InvalidState`] if the session is closed
    pub fn stereo_mode_histogram(&self) -> Result<StereoModeHistogram> {
        Ok(stats::stereo_mode_histogram(
            self.open_engine("read statistics from")?,
        ))
    }

    /// # Errors
    ///
    /// * [`Error::InvalidState`] if the session is closed
    pub fn bitrate_stereo_mode_histogram(&self) -> Result<Vec<BitrateStereoModeRow>> {
        Ok(stats::bitrate_stereo_mode_histogram(
            self.open_engine("read statistics from")?,
        ))
    }

    /// # Errors
    ///
    /// * [`Error::InvalidState`] if the session is closed
    pub fn engine_version(&self) -> Result<EngineVersion> {
        Ok(self.open_engine("read the version of")?.version())
    }

    /// Overwrites the placeholder info frame at the start of `sink` with the
    /// final VBR/LAME tag.
    ///
    /// `sink` must hold the complete encoded stream, optionally preceded by an
    /// ID3v2 tag. Nothing is written if the engine has no info frame, e.g.
    /// when [`ConfigOption::WriteVbrTag`] is disabled. The sink is left
    /// positioned at its end.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidState`] unless the session is `Flushed`
    /// * [`Error::InvalidInput`] if `sink` is empty
    /// * [`Error::Io`] if reading, seeking or writing `sink` fails
    pub fn write_trailer_tags<S: Read + Write + Seek>(&self, sink: &mut S) -> Result<()> {
        self.require("write trailer tags for", &[SessionState::Flushed])?;
        let engine = self.open_engine("write trailer tags for")?;

        let size = engine.lametag_frame(&mut []);
        if size == 0 {
            log::debug!("No info frame to write");
            return Ok(());
        }

        let mut frame = vec![0; size];
        let written = engine.lametag_frame(&mut frame);
        if written == 0 || written > size {
            return Err(Error::Internal(format!(
                "codec produced a {written} byte info frame, expected {size}"
            )));
        }

        let end = sink.seek(SeekFrom::End(0))?;
        if end == 0 {
            return Err(Error::InvalidInput(
                "trailer tags need the encoded stream in the sink".to_string(),
            ));
        }

        sink.seek(SeekFrom::Start(0))?;
        let offset = id3v2_tag_size(sink)?;

        log::debug!("Writing {written} byte info frame at offset {offset}");

        sink.seek(SeekFrom::Start(offset))?;
        sink.write_all(&frame[..written])?;
        sink.flush()?;
        sink.seek(SeekFrom::End(0))?;

        Ok(())
    }

    /// Releases the codec handle and the output buffer. Closing a closed
    /// session does nothing.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }

        log::debug!("Closing session in the {} state", self.state);

        self.engine = None;
        self.buffer.release();
        self.state = SessionState::Closed;
    }
}

impl<E: CodecEngine> Drop for Session<E> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Total size of an ID3v2 tag at the reader's current position, header and
/// footer included, or `0` if there is none.
fn id3v2_tag_size(reader: &mut impl Read) -> Result<u64> {
    let mut header = [0u8; 10];
    match reader.read_exact(&mut header) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(0),
        Err(e) => return Err(e.into()),
    }

    if &header[..3] != b"ID3" {
        return Ok(0);
    }

    let body = header[6..10]
        .iter()
        .fold(0u64, |size, byte| (size << 7) | u64::from(byte & 0x7F));
    let footer = if header[5] & 0x10 == 0 { 0 } else { 10 };

    Ok(10 + body + footer)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test_log::test]
    fn test_id3v2_tag_size_without_tag() {
        let mut reader = Cursor::new(vec![0xFF, 0xFB, 0x90, 0x64, 0, 0, 0, 0, 0, 0, 0]);

        assert_eq!(id3v2_tag_size(&mut reader).unwrap(), 0);
    }

    #[test_log::test]
    fn test_id3v2_tag_size_reads_syncsafe_length() {
        let mut reader = Cursor::new(b"ID3\x04\x00\x00\x00\x00\x02\x01".to_vec());

        assert_eq!(id3v2_tag_size(&mut reader).unwrap(), 10 + 257);
    }

    #[test_log::test]
    fn test_id3v2_tag_size_includes_footer() {
        let mut reader = Cursor::new(b"ID3\x04\x00\x10\x00\x00\x00\x05".to_vec());

        assert_eq!(id3v2_tag_size(&mut reader).unwrap(), 10 + 5 + 10);
    }

    #[test_log::test]
    fn test_id3v2_tag_size_short_stream() {
        let mut reader = Cursor::new(b"ID3".to_vec());

        assert_eq!(id3v2_tag_size(&mut reader).unwrap(), 0);
    }

    #[test_log::test]
    fn test_state_labels() {
        assert_eq!(SessionState::Initialized.to_string(), "initialized");
        assert!(SessionState::Flushed.is_locked());
        assert!(!SessionState::Configured.is_locked());
    }
}
