//! A deterministic, in-memory codec engine.
//!
//! The simulator follows the status-code contract of the real codec without
//! producing decodable audio. Output frames are sized from the configured
//! bitrate and sample rate, counters and histograms are kept the way the codec
//! keeps them, and failures can be scripted so the session's error paths can be
//! driven from tests.

use std::collections::BTreeMap;

use strum::IntoEnumIterator as _;

use crate::{
    ConfigOption, OptionValue, Result,
    engine::{BITRATE_BUCKETS, CodecEngine, EngineVersion, STEREO_MODES},
};

/// Samples of encoder delay buffered before the first frame is emitted.
pub const ENCODER_DELAY: usize = 576;

const MPEG1_BITRATES: [u32; BITRATE_BUCKETS] =
    [32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320];
const MPEG2_BITRATES: [u32; BITRATE_BUCKETS] =
    [8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160];

const STATUS_REJECTED: i32 = -1;
const STATUS_BUFFER_TOO_SMALL: i32 = -1;
const STATUS_NOT_INITIALIZED: i32 = -3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Configuring,
    Locked,
}

/// A scriptable [`CodecEngine`] that needs no native library.
#[derive(Debug, Clone)]
pub struct SimulatedEngine {
    params: BTreeMap<ConfigOption, OptionValue>,
    phase: Phase,
    frame_size: usize,
    pending: usize,
    info_frame_pending: bool,
    frames: u32,
    encode_calls: usize,
    bitrate_counts: [u32; BITRATE_BUCKETS],
    stereo_counts: [u32; STEREO_MODES],
    combined_counts: [[u32; STEREO_MODES]; BITRATE_BUCKETS],
    reject_lock: bool,
    encode_statuses: BTreeMap<usize, i32>,
    flush_status: Option<i32>,
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedEngine {
    #[must_use]
    pub fn new() -> Self {
        let params = ConfigOption::iter()
            .filter_map(|option| option.default_value().map(|value| (option, value)))
            .collect();

        Self {
            params,
            phase: Phase::Configuring,
            frame_size: 1152,
            pending: 0,
            info_frame_pending: false,
            frames: 0,
            encode_calls: 0,
            bitrate_counts: [0; BITRATE_BUCKETS],
            stereo_counts: [0; STEREO_MODES],
            combined_counts: [[0; STEREO_MODES]; BITRATE_BUCKETS],
            reject_lock: false,
            encode_statuses: BTreeMap::new(),
            flush_status: None,
        }
    }

    /// Makes [`CodecEngine::lock_parameters`] reject the configuration.
    #[must_use]
    pub const fn with_lock_failure(mut self) -> Self {
        self.reject_lock = true;
        self
    }

    /// Makes the `call`th encode (zero based) return `status` without
    /// touching any counters.
    #[must_use]
    pub fn with_encode_status(mut self, call: usize, status: i32) -> Self {
        self.encode_statuses.insert(call, status);
        self
    }

    /// Makes [`CodecEngine::flush`] return `status`.
    #[must_use]
    pub const fn with_flush_status(mut self, status: i32) -> Self {
        self.flush_status = Some(status);
        self
    }

    /// Samples per channel consumed by each emitted frame.
    #[must_use]
    pub const fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn int(&self, option: ConfigOption) -> i64 {
        self.params
            .get(&option)
            .and_then(|value| value.as_int())
            .unwrap_or(0)
    }

    fn channels(&self) -> i64 {
        self.int(ConfigOption::NumChannels)
    }

    fn output_rate(&self) -> i64 {
        match self.int(ConfigOption::OutSamplerate) {
            0 => self.int(ConfigOption::InSamplerate),
            rate => rate,
        }
    }

    fn bitrate_table(&self) -> [u32; BITRATE_BUCKETS] {
        if self.output_rate() >= 32_000 {
            MPEG1_BITRATES
        } else {
            MPEG2_BITRATES
        }
    }

    fn accepts(option: ConfigOption, value: OptionValue) -> bool {
        let OptionValue::Int(int) = value else {
            return match option {
                ConfigOption::CompressionRatio => value.as_float() > 0.0,
                _ => option.kind() == crate::OptionKind::Float,
            };
        };

        match option {
            ConfigOption::InSamplerate => int > 0,
            ConfigOption::NumChannels => (1..=2).contains(&int),
            ConfigOption::NumSamples | ConfigOption::OutSamplerate => int >= 0,
            ConfigOption::Quality | ConfigOption::VbrQuality => (0..=9).contains(&int),
            ConfigOption::Mode => (0..=3).contains(&int),
            ConfigOption::Vbr => (0..=4).contains(&int),
            ConfigOption::Bitrate => {
                int == 0
                    || u32::try_from(int)
                        .is_ok_and(|kbps| MPEG1_BITRATES.contains(&kbps) || MPEG2_BITRATES.contains(&kbps))
            }
            ConfigOption::AbrBitrate | ConfigOption::VbrMinBitrate | ConfigOption::VbrMaxBitrate => {
                (0..=320).contains(&int)
            }
            ConfigOption::Analysis
            | ConfigOption::WriteVbrTag
            | ConfigOption::ForceMs
            | ConfigOption::FreeFormat
            | ConfigOption::Copyright
            | ConfigOption::Original
            | ConfigOption::ErrorProtection
            | ConfigOption::Extension
            | ConfigOption::StrictIso
            | ConfigOption::DisableReservoir
            | ConfigOption::VbrMinEnforce
            | ConfigOption::AthForMaskingOnly
            | ConfigOption::AthForShortOnly
            | ConfigOption::AthDisable
            | ConfigOption::UseTemporalMasking
            | ConfigOption::NoShortBlocks
            | ConfigOption::ForceShortBlocks => (0..=1).contains(&int),
            ConfigOption::LowpassFrequency | ConfigOption::HighpassFrequency => int >= -1,
            _ => option.kind() == crate::OptionKind::Int,
        }
    }

    fn effective_bitrate(&self) -> u32 {
        let table = self.bitrate_table();
        let kbps = match self.int(ConfigOption::Vbr) {
            0 => self.int(ConfigOption::Bitrate),
            3 => self.int(ConfigOption::AbrBitrate),
            _ => {
                // Quality 0 maps to the top of the table.
                let quality = usize::try_from(self.int(ConfigOption::VbrQuality)).unwrap_or(4);
                let index = BITRATE_BUCKETS.saturating_sub(1 + quality).min(BITRATE_BUCKETS - 1);
                return table[index];
            }
        };
        let kbps = u32::try_from(kbps).unwrap_or(0);

        if kbps == 0 {
            return table[8];
        }

        // Snap to the nearest nominal bitrate not above the request.
        table
            .iter()
            .copied()
            .filter(|&nominal| nominal <= kbps)
            .max()
            .unwrap_or(table[0])
    }

    fn stereo_mode_index(&self) -> usize {
        let mid_side = self.int(ConfigOption::ForceMs) == 1
            || (self.channels() == 2 && self.params.get(&ConfigOption::Mode) == Some(&OptionValue::Int(1)));

        if mid_side { 2 } else { 0 }
    }

    fn frame_bytes(&self, kbps: u32) -> usize {
        let rate = usize::try_from(self.output_rate()).unwrap_or(1).max(1);
        let kbps = usize::try_from(kbps).unwrap_or(0);

        self.frame_size / 8 * kbps * 1000 / rate
    }

    /// Emits `count` audio frames, plus the info frame if one is still owed.
    ///
    /// Returns the number of bytes written, or `None` if `dest` is too small.
    /// Nothing is mutated when `None` is returned.
    fn emit(&mut self, count: usize, dest: &mut [u8]) -> Option<usize> {
        let kbps = self.effective_bitrate();
        let frame_bytes = self.frame_bytes(kbps);
        let info_bytes = if self.info_frame_pending {
            frame_bytes
        } else {
            0
        };
        let total = frame_bytes.checked_mul(count)?.checked_add(info_bytes)?;

        if total > dest.len() {
            return None;
        }

        let mut offset = 0;
        if self.info_frame_pending {
            write_frame_header(&mut dest[..info_bytes]);
            offset += info_bytes;
            self.info_frame_pending = false;
        }
        for _ in 0..count {
            write_frame_header(&mut dest[offset..offset + frame_bytes]);
            offset += frame_bytes;
        }

        let bucket = self
            .bitrate_table()
            .iter()
            .position(|&nominal| nominal == kbps)
            .unwrap_or(0);
        let mode = self.stereo_mode_index();
        let count = u32::try_from(count).unwrap_or(u32::MAX);

        self.frames = self.frames.saturating_add(count);
        self.bitrate_counts[bucket] = self.bitrate_counts[bucket].saturating_add(count);
        self.stereo_counts[mode] = self.stereo_counts[mode].saturating_add(count);
        self.combined_counts[bucket][mode] =
            self.combined_counts[bucket][mode].saturating_add(count);

        Some(total)
    }
}

fn write_frame_header(frame: &mut [u8]) {
    let header = [0xFF, 0xFB, 0x90, 0x64];
    let len = header.len().min(frame.len());
    frame[..len].copy_from_slice(&header[..len]);
    frame[len..].fill(0);
}

fn status(written: usize) -> i32 {
    i32::try_from(written).unwrap_or(i32::MAX)
}

impl CodecEngine for SimulatedEngine {
    fn create() -> Result<Self> {
        Ok(Self::new())
    }

    fn set_parameter(&mut self, option: ConfigOption, value: OptionValue) -> i32 {
        if self.phase == Phase::Locked && !option.is_writable_after_lock() {
            return STATUS_REJECTED;
        }
        if !Self::accepts(option, value) {
            return STATUS_REJECTED;
        }

        self.params.insert(option, value);
        0
    }

    fn parameter(&self, option: ConfigOption) -> Option<OptionValue> {
        if !option.is_readable() {
            return None;
        }

        self.params.get(&option).copied()
    }

    fn lock_parameters(&mut self) -> i32 {
        if self.reject_lock {
            return STATUS_REJECTED;
        }

        let min = self.int(ConfigOption::VbrMinBitrate);
        let max = self.int(ConfigOption::VbrMaxBitrate);
        if min > 0 && max > 0 && min > max {
            return STATUS_REJECTED;
        }

        self.frame_size = if self.output_rate() >= 32_000 { 1152 } else { 576 };
        self.pending = ENCODER_DELAY;
        self.info_frame_pending = self.int(ConfigOption::WriteVbrTag) == 1;
        self.phase = Phase::Locked;

        0
    }

    fn encode(&mut self, _pcm: &[i16], frames: usize, dest: &mut [u8]) -> i32 {
        let call = self.encode_calls;
        self.encode_calls += 1;

        if let Some(&status) = self.encode_statuses.get(&call) {
            return status;
        }
        if self.phase != Phase::Locked {
            return STATUS_NOT_INITIALIZED;
        }

        let pending = self.pending.saturating_add(frames);
        let Some(written) = self.emit(pending / self.frame_size, dest) else {
            return STATUS_BUFFER_TOO_SMALL;
        };
        self.pending = pending % self.frame_size;

        status(written)
    }

    fn flush(&mut self, dest: &mut [u8]) -> i32 {
        if let Some(status) = self.flush_status {
            return status;
        }
        if self.phase != Phase::Locked {
            return STATUS_NOT_INITIALIZED;
        }

        let Some(written) = self.emit(self.pending.div_ceil(self.frame_size), dest) else {
            return STATUS_BUFFER_TOO_SMALL;
        };
        self.pending = 0;

        status(written)
    }

    fn frame_count(&self) -> u32 {
        self.frames
    }

    fn estimated_total_frames(&self) -> u32 {
        let samples = usize::try_from(self.int(ConfigOption::NumSamples)).unwrap_or(0);
        let frames = samples.saturating_add(ENCODER_DELAY).div_ceil(self.frame_size);

        u32::try_from(frames).unwrap_or(u32::MAX)
    }

    fn bitrate_table_kbps(&self) -> [u32; BITRATE_BUCKETS] {
        self.bitrate_table()
    }

    fn bitrate_histogram(&self) -> [u32; BITRATE_BUCKETS] {
        self.bitrate_counts
    }

    fn stereo_mode_histogram(&self) -> [u32; STEREO_MODES] {
        self.stereo_counts
    }

    fn bitrate_stereo_mode_histogram(&self) -> [[u32; STEREO_MODES]; BITRATE_BUCKETS] {
        self.combined_counts
    }

    fn lametag_frame(&self, dest: &mut [u8]) -> usize {
        if self.phase != Phase::Locked || self.int(ConfigOption::WriteVbrTag) != 1 {
            return 0;
        }

        let size = self.frame_bytes(self.effective_bitrate());
        // Side info is 32 bytes for MPEG1 stereo, 17 for MPEG1 mono.
        let tag_offset = 4 + if self.channels() == 1 { 17 } else { 32 };
        if size < tag_offset + 8 {
            return 0;
        }
        if dest.len() < size {
            return size;
        }

        let frame = &mut dest[..size];
        write_frame_header(frame);
        frame[tag_offset..tag_offset + 4].copy_from_slice(b"Xing");
        frame[tag_offset + 4..tag_offset + 8].copy_from_slice(&self.frames.to_be_bytes());

        size
    }

    fn version(&self) -> EngineVersion {
        EngineVersion {
            major: 3,
            minor: 100,
            alpha: 0,
            beta: 0,
            psy_major: 1,
            psy_minor: 0,
            psy_alpha: 0,
            psy_beta: 0,
            features: "simulator".to_string(),
            url: "https://lame.sourceforge.io/".to_string(),
        }
    }
}
