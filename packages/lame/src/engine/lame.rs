//! Codec engine backed by libmp3lame.
//!
//! `mp3lame-sys` builds and links the library; the entry points used here are
//! declared with their `lame.h` signatures.

use std::{
    ffi::{CStr, c_char, c_double, c_float, c_int, c_ulong},
    ptr::NonNull,
};

use mp3lame_sys as _;

use crate::{
    ConfigOption, Error, OptionValue, Result,
    engine::{BITRATE_BUCKETS, CodecEngine, EngineVersion, STEREO_MODES},
};

#[allow(non_snake_case)]
mod ffi {
    use std::ffi::{c_char, c_double, c_float, c_int, c_short, c_uchar, c_ulong};

    #[repr(C)]
    pub struct LameGlobalFlags {
        _private: [u8; 0],
    }

    #[repr(C)]
    pub struct LameVersion {
        pub major: c_int,
        pub minor: c_int,
        pub alpha: c_int,
        pub beta: c_int,
        pub psy_major: c_int,
        pub psy_minor: c_int,
        pub psy_alpha: c_int,
        pub psy_beta: c_int,
        pub features: *const c_char,
    }

    unsafe extern "C" {
        pub fn lame_init() -> *mut LameGlobalFlags;
        pub fn lame_close(gfp: *mut LameGlobalFlags) -> c_int;
        pub fn lame_init_params(gfp: *mut LameGlobalFlags) -> c_int;

        pub fn lame_set_in_samplerate(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_get_in_samplerate(gfp: *const LameGlobalFlags) -> c_int;
        pub fn lame_set_num_channels(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_get_num_channels(gfp: *const LameGlobalFlags) -> c_int;
        pub fn lame_set_num_samples(gfp: *mut LameGlobalFlags, value: c_ulong) -> c_int;
        pub fn lame_set_scale(gfp: *mut LameGlobalFlags, value: c_float) -> c_int;
        pub fn lame_get_scale(gfp: *const LameGlobalFlags) -> c_float;
        pub fn lame_set_scale_left(gfp: *mut LameGlobalFlags, value: c_float) -> c_int;
        pub fn lame_get_scale_left(gfp: *const LameGlobalFlags) -> c_float;
        pub fn lame_set_scale_right(gfp: *mut LameGlobalFlags, value: c_float) -> c_int;
        pub fn lame_get_scale_right(gfp: *const LameGlobalFlags) -> c_float;
        pub fn lame_set_out_samplerate(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_analysis(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_bWriteVbrTag(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_quality(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_mode(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_force_ms(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_free_format(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_brate(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_compression_ratio(gfp: *mut LameGlobalFlags, value: c_float) -> c_int;
        pub fn lame_set_preset(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_copyright(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_original(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_error_protection(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_extension(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_strict_ISO(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_disable_reservoir(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_experimentalX(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_experimentalY(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_experimentalZ(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_exp_nspsytune(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_msfix(gfp: *mut LameGlobalFlags, value: c_double);
        pub fn lame_set_VBR(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_VBR_q(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_VBR_mean_bitrate_kbps(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_VBR_min_bitrate_kbps(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_VBR_max_bitrate_kbps(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_VBR_hard_min(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_lowpassfreq(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_lowpasswidth(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_highpassfreq(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_highpasswidth(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_ATHonly(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_ATHshort(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_noATH(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_ATHtype(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_ATHlower(gfp: *mut LameGlobalFlags, value: c_float) -> c_int;
        pub fn lame_set_athaa_type(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_athaa_sensitivity(gfp: *mut LameGlobalFlags, value: c_float) -> c_int;
        pub fn lame_set_allow_diff_short(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_useTemporal(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_interChRatio(gfp: *mut LameGlobalFlags, value: c_float) -> c_int;
        pub fn lame_set_no_short_blocks(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;
        pub fn lame_set_force_short_blocks(gfp: *mut LameGlobalFlags, value: c_int) -> c_int;

        pub fn lame_encode_buffer(
            gfp: *mut LameGlobalFlags,
            buffer_l: *const c_short,
            buffer_r: *const c_short,
            nsamples: c_int,
            mp3buf: *mut c_uchar,
            mp3buf_size: c_int,
        ) -> c_int;
        pub fn lame_encode_buffer_interleaved(
            gfp: *mut LameGlobalFlags,
            pcm: *mut c_short,
            num_samples: c_int,
            mp3buf: *mut c_uchar,
            mp3buf_size: c_int,
        ) -> c_int;
        pub fn lame_encode_flush(
            gfp: *mut LameGlobalFlags,
            mp3buf: *mut c_uchar,
            size: c_int,
        ) -> c_int;

        pub fn lame_get_frameNum(gfp: *const LameGlobalFlags) -> c_int;
        pub fn lame_get_totalframes(gfp: *const LameGlobalFlags) -> c_int;
        pub fn lame_bitrate_kbps(gfp: *const LameGlobalFlags, bitrate_kbps: *mut c_int);
        pub fn lame_bitrate_hist(gfp: *const LameGlobalFlags, bitrate_count: *mut c_int);
        pub fn lame_stereo_mode_hist(gfp: *const LameGlobalFlags, stereo_mode_count: *mut c_int);
        pub fn lame_bitrate_stereo_mode_hist(
            gfp: *const LameGlobalFlags,
            bitrate_stmode_count: *mut [c_int; 4],
        );
        pub fn lame_get_lametag_frame(
            gfp: *const LameGlobalFlags,
            buffer: *mut c_uchar,
            size: usize,
        ) -> usize;

        pub fn get_lame_version_numerical(version: *mut LameVersion);
        pub fn get_lame_url() -> *const c_char;
    }
}

/// A `lame_global_flags` handle.
pub struct LameEngine {
    gfp: NonNull<ffi::LameGlobalFlags>,
}

// The handle holds no thread-affine state.
unsafe impl Send for LameEngine {}

impl std::fmt::Debug for LameEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LameEngine").finish_non_exhaustive()
    }
}

impl Drop for LameEngine {
    fn drop(&mut self) {
        log::trace!("Closing LAME handle");
        unsafe {
            ffi::lame_close(self.gfp.as_ptr());
        }
    }
}

impl LameEngine {
    fn ptr(&self) -> *mut ffi::LameGlobalFlags {
        self.gfp.as_ptr()
    }

    fn set_int(&mut self, option: ConfigOption, value: c_int) -> c_int {
        let gfp = self.ptr();
        unsafe {
            match option {
                ConfigOption::InSamplerate => ffi::lame_set_in_samplerate(gfp, value),
                ConfigOption::NumChannels => ffi::lame_set_num_channels(gfp, value),
                ConfigOption::OutSamplerate => ffi::lame_set_out_samplerate(gfp, value),
                ConfigOption::Analysis => ffi::lame_set_analysis(gfp, value),
                ConfigOption::WriteVbrTag => ffi::lame_set_bWriteVbrTag(gfp, value),
                ConfigOption::Quality => ffi::lame_set_quality(gfp, value),
                ConfigOption::Mode => ffi::lame_set_mode(gfp, value),
                ConfigOption::ForceMs => ffi::lame_set_force_ms(gfp, value),
                ConfigOption::FreeFormat => ffi::lame_set_free_format(gfp, value),
                ConfigOption::Bitrate => ffi::lame_set_brate(gfp, value),
                ConfigOption::Preset => ffi::lame_set_preset(gfp, value),
                ConfigOption::Copyright => ffi::lame_set_copyright(gfp, value),
                ConfigOption::Original => ffi::lame_set_original(gfp, value),
                ConfigOption::ErrorProtection => ffi::lame_set_error_protection(gfp, value),
                ConfigOption::Extension => ffi::lame_set_extension(gfp, value),
                ConfigOption::StrictIso => ffi::lame_set_strict_ISO(gfp, value),
                ConfigOption::DisableReservoir => ffi::lame_set_disable_reservoir(gfp, value),
                ConfigOption::ExpQuantization => ffi::lame_set_experimentalX(gfp, value),
                ConfigOption::ExpY => ffi::lame_set_experimentalY(gfp, value),
                ConfigOption::ExpZ => ffi::lame_set_experimentalZ(gfp, value),
                ConfigOption::ExpNspsytune => ffi::lame_set_exp_nspsytune(gfp, value),
                ConfigOption::Vbr => ffi::lame_set_VBR(gfp, value),
                ConfigOption::VbrQuality => ffi::lame_set_VBR_q(gfp, value),
                ConfigOption::AbrBitrate => ffi::lame_set_VBR_mean_bitrate_kbps(gfp, value),
                ConfigOption::VbrMinBitrate => ffi::lame_set_VBR_min_bitrate_kbps(gfp, value),
                ConfigOption::VbrMaxBitrate => ffi::lame_set_VBR_max_bitrate_kbps(gfp, value),
                ConfigOption::VbrMinEnforce => ffi::lame_set_VBR_hard_min(gfp, value),
                ConfigOption::LowpassFrequency => ffi::lame_set_lowpassfreq(gfp, value),
                ConfigOption::LowpassWidth => ffi::lame_set_lowpasswidth(gfp, value),
                ConfigOption::HighpassFrequency => ffi::lame_set_highpassfreq(gfp, value),
                ConfigOption::HighpassWidth => ffi::lame_set_highpasswidth(gfp, value),
                ConfigOption::AthForMaskingOnly => ffi::lame_set_ATHonly(gfp, value),
                ConfigOption::AthForShortOnly => ffi::lame_set_ATHshort(gfp, value),
                ConfigOption::AthDisable => ffi::lame_set_noATH(gfp, value),
                ConfigOption::AthType => ffi::lame_set_ATHtype(gfp, value),
                ConfigOption::AthaaType => ffi::lame_set_athaa_type(gfp, value),
                ConfigOption::AllowBlocktypeDifference => {
                    ffi::lame_set_allow_diff_short(gfp, value)
                }
                ConfigOption::UseTemporalMasking => ffi::lame_set_useTemporal(gfp, value),
                ConfigOption::NoShortBlocks => ffi::lame_set_no_short_blocks(gfp, value),
                ConfigOption::ForceShortBlocks => ffi::lame_set_force_short_blocks(gfp, value),
                ConfigOption::NumSamples
                | ConfigOption::CompressionRatio
                | ConfigOption::ExpMsfix
                | ConfigOption::AthLower
                | ConfigOption::AthaaSensitivity
                | ConfigOption::InterChannelRatio
                | ConfigOption::Scale
                | ConfigOption::ScaleLeft
                | ConfigOption::ScaleRight => -1,
            }
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn set_float(&mut self, option: ConfigOption, value: f64) -> c_int {
        let gfp = self.ptr();
        let single = value as c_float;
        unsafe {
            match option {
                ConfigOption::CompressionRatio => ffi::lame_set_compression_ratio(gfp, single),
                ConfigOption::ExpMsfix => {
                    ffi::lame_set_msfix(gfp, value as c_double);
                    0
                }
                ConfigOption::AthLower => ffi::lame_set_ATHlower(gfp, single),
                ConfigOption::AthaaSensitivity => ffi::lame_set_athaa_sensitivity(gfp, single),
                ConfigOption::InterChannelRatio => ffi::lame_set_interChRatio(gfp, single),
                ConfigOption::Scale => ffi::lame_set_scale(gfp, single),
                ConfigOption::ScaleLeft => ffi::lame_set_scale_left(gfp, single),
                ConfigOption::ScaleRight => ffi::lame_set_scale_right(gfp, single),
                _ => -1,
            }
        }
    }
}

impl CodecEngine for LameEngine {
    fn create() -> Result<Self> {
        let gfp = unsafe { ffi::lame_init() };
        let gfp = NonNull::new(gfp)
            .ok_or_else(|| Error::Initialization("Can't initialize LAME".to_string()))?;

        log::trace!("Created LAME handle");

        Ok(Self { gfp })
    }

    fn set_parameter(&mut self, option: ConfigOption, value: OptionValue) -> i32 {
        match value {
            OptionValue::Int(value) if option == ConfigOption::NumSamples => {
                c_ulong::try_from(value).map_or(-1, |value| unsafe {
                    ffi::lame_set_num_samples(self.ptr(), value)
                })
            }
            OptionValue::Int(value) => {
                c_int::try_from(value).map_or(-1, |value| self.set_int(option, value))
            }
            OptionValue::Float(value) => self.set_float(option, value),
        }
    }

    fn parameter(&self, option: ConfigOption) -> Option<OptionValue> {
        let gfp = self.ptr();
        let value: OptionValue = unsafe {
            match option {
                ConfigOption::InSamplerate => ffi::lame_get_in_samplerate(gfp).into(),
                ConfigOption::NumChannels => ffi::lame_get_num_channels(gfp).into(),
                ConfigOption::Scale => ffi::lame_get_scale(gfp).into(),
                ConfigOption::ScaleLeft => ffi::lame_get_scale_left(gfp).into(),
                ConfigOption::ScaleRight => ffi::lame_get_scale_right(gfp).into(),
                _ => return None,
            }
        };

        Some(value)
    }

    fn lock_parameters(&mut self) -> i32 {
        unsafe { ffi::lame_init_params(self.ptr()) }
    }

    fn encode(&mut self, pcm: &[i16], frames: usize, dest: &mut [u8]) -> i32 {
        let Ok(frames) = c_int::try_from(frames) else {
            return -1;
        };
        let dest_size = c_int::try_from(dest.len()).unwrap_or(c_int::MAX);
        let gfp = self.ptr();

        unsafe {
            if ffi::lame_get_num_channels(gfp) == 1 {
                ffi::lame_encode_buffer(
                    gfp,
                    pcm.as_ptr(),
                    pcm.as_ptr(),
                    frames,
                    dest.as_mut_ptr(),
                    dest_size,
                )
            } else {
                // The interleaved entry point never writes to its input.
                ffi::lame_encode_buffer_interleaved(
                    gfp,
                    pcm.as_ptr().cast_mut(),
                    frames,
                    dest.as_mut_ptr(),
                    dest_size,
                )
            }
        }
    }

    fn flush(&mut self, dest: &mut [u8]) -> i32 {
        let dest_size = c_int::try_from(dest.len()).unwrap_or(c_int::MAX);
        unsafe { ffi::lame_encode_flush(self.ptr(), dest.as_mut_ptr(), dest_size) }
    }

    fn frame_count(&self) -> u32 {
        let frames = unsafe { ffi::lame_get_frameNum(self.ptr()) };
        u32::try_from(frames).unwrap_or(0)
    }

    fn estimated_total_frames(&self) -> u32 {
        let frames = unsafe { ffi::lame_get_totalframes(self.ptr()) };
        u32::try_from(frames).unwrap_or(0)
    }

    fn bitrate_table_kbps(&self) -> [u32; BITRATE_BUCKETS] {
        let mut table: [c_int; BITRATE_BUCKETS] = [0; BITRATE_BUCKETS];
        unsafe {
            ffi::lame_bitrate_kbps(self.ptr(), table.as_mut_ptr());
        }
        table.map(non_negative)
    }

    fn bitrate_histogram(&self) -> [u32; BITRATE_BUCKETS] {
        let mut counts: [c_int; BITRATE_BUCKETS] = [0; BITRATE_BUCKETS];
        unsafe {
            ffi::lame_bitrate_hist(self.ptr(), counts.as_mut_ptr());
        }
        counts.map(non_negative)
    }

    fn stereo_mode_histogram(&self) -> [u32; STEREO_MODES] {
        let mut counts: [c_int; STEREO_MODES] = [0; STEREO_MODES];
        unsafe {
            ffi::lame_stereo_mode_hist(self.ptr(), counts.as_mut_ptr());
        }
        counts.map(non_negative)
    }

    fn bitrate_stereo_mode_histogram(&self) -> [[u32; STEREO_MODES]; BITRATE_BUCKETS] {
        let mut counts: [[c_int; STEREO_MODES]; BITRATE_BUCKETS] =
            [[0; STEREO_MODES]; BITRATE_BUCKETS];
        unsafe {
            ffi::lame_bitrate_stereo_mode_hist(self.ptr(), counts.as_mut_ptr());
        }
        counts.map(|row| row.map(non_negative))
    }

    fn lametag_frame(&self, dest: &mut [u8]) -> usize {
        unsafe { ffi::lame_get_lametag_frame(self.ptr(), dest.as_mut_ptr(), dest.len()) }
    }

    fn version(&self) -> EngineVersion {
        let mut version = ffi::LameVersion {
            major: 0,
            minor: 0,
            alpha: 0,
            beta: 0,
            psy_major: 0,
            psy_minor: 0,
            psy_alpha: 0,
            psy_beta: 0,
            features: std::ptr::null(),
        };

        let url = unsafe {
            ffi::get_lame_version_numerical(&raw mut version);
            c_string(ffi::get_lame_url())
        };
        let features = unsafe { c_string(version.features) };

        EngineVersion {
            major: version.major,
            minor: version.minor,
            alpha: version.alpha,
            beta: version.beta,
            psy_major: version.psy_major,
            psy_minor: version.psy_minor,
            psy_alpha: version.psy_alpha,
            psy_beta: version.psy_beta,
            features,
            url,
        }
    }
}

fn non_negative(value: c_int) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

/// # Safety
///
/// `ptr` must be null or point to a nul-terminated string that outlives the call.
unsafe fn c_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }

    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test_log::test]
    fn test_create_and_drop_handle() {
        let engine = LameEngine::create().unwrap();
        drop(engine);
    }

    #[test_log::test]
    fn test_readable_parameters_have_codec_defaults() {
        let engine = LameEngine::create().unwrap();

        assert_eq!(
            engine.parameter(ConfigOption::InSamplerate),
            Some(OptionValue::Int(44_100))
        );
        assert_eq!(
            engine.parameter(ConfigOption::NumChannels),
            Some(OptionValue::Int(2))
        );
        assert_eq!(
            engine.parameter(ConfigOption::Scale),
            Some(OptionValue::Float(1.0))
        );
        assert_eq!(engine.parameter(ConfigOption::Bitrate), None);
    }

    #[test_log::test]
    fn test_set_parameter_rejects_mismatched_kind() {
        let mut engine = LameEngine::create().unwrap();

        assert_eq!(
            engine.set_parameter(ConfigOption::Scale, OptionValue::Int(1)),
            -1
        );
        assert_eq!(
            engine.set_parameter(ConfigOption::Bitrate, OptionValue::Float(1.0)),
            -1
        );
    }

    #[test_log::test]
    fn test_set_parameter_accepts_bitrate() {
        let mut engine = LameEngine::create().unwrap();

        assert_eq!(
            engine.set_parameter(ConfigOption::Bitrate, OptionValue::Int(192)),
            0
        );
    }

    #[test_log::test]
    fn test_statistics_before_lock_are_empty() {
        let engine = LameEngine::create().unwrap();

        assert_eq!(engine.frame_count(), 0);
        assert_eq!(engine.bitrate_histogram(), [0; BITRATE_BUCKETS]);
        assert_eq!(engine.stereo_mode_histogram(), [0; STEREO_MODES]);
    }

    #[test_log::test]
    fn test_locked_bitrate_table_is_mpeg1() {
        let mut engine = LameEngine::create().unwrap();
        assert_eq!(engine.lock_parameters(), 0);

        assert_eq!(
            engine.bitrate_table_kbps(),
            [32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320]
        );
    }

    #[test_log::test]
    fn test_version_is_reported() {
        let engine = LameEngine::create().unwrap();
        let version = engine.version();

        assert_eq!(version.major, 3);
        assert!(!version.url.is_empty());
    }
}
