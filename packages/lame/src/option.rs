//! The closed set of encoder options a [`crate::Session`] accepts.
//!
//! Each option has a value kind, a default (or `None` when the codec picks one),
//! and a short description. Validation of the value's domain is left to the
//! codec engine; this module only enforces the value's type.

#![allow(clippy::module_name_repetitions)]

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumIter, EnumString};

use crate::{Error, Result};

/// The value type an option accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum OptionKind {
    Int,
    Float,
}

/// A configured option value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Int(i64),
    Float(f64),
}

impl OptionValue {
    #[must_use]
    pub const fn as_int(self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(value),
            Self::Float(..) => None,
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_float(self) -> f64 {
        match self {
            Self::Int(value) => value as f64,
            Self::Float(value) => value,
        }
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<u32> for OptionValue {
    fn from(value: u32) -> Self {
        Self::Int(value.into())
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<f32> for OptionValue {
    fn from(value: f32) -> Self {
        Self::Float(value.into())
    }
}

impl std::fmt::Display for OptionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
        }
    }
}

/// Every option the encoder exposes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConfigOption {
    InSamplerate,
    NumChannels,
    NumSamples,
    OutSamplerate,
    Analysis,
    WriteVbrTag,
    Quality,
    Mode,
    ForceMs,
    FreeFormat,
    Bitrate,
    CompressionRatio,
    Preset,
    Copyright,
    Original,
    ErrorProtection,
    Extension,
    StrictIso,
    DisableReservoir,
    ExpQuantization,
    ExpY,
    ExpZ,
    ExpNspsytune,
    ExpMsfix,
    Vbr,
    VbrQuality,
    AbrBitrate,
    VbrMinBitrate,
    VbrMaxBitrate,
    VbrMinEnforce,
    LowpassFrequency,
    LowpassWidth,
    HighpassFrequency,
    HighpassWidth,
    AthForMaskingOnly,
    AthForShortOnly,
    AthDisable,
    AthType,
    AthLower,
    AthaaType,
    AthaaSensitivity,
    AllowBlocktypeDifference,
    UseTemporalMasking,
    InterChannelRatio,
    NoShortBlocks,
    ForceShortBlocks,
    Scale,
    ScaleLeft,
    ScaleRight,
}

impl std::fmt::Display for ConfigOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl ConfigOption {
    #[must_use]
    pub const fn kind(self) -> OptionKind {
        match self {
            Self::CompressionRatio
            | Self::ExpMsfix
            | Self::AthLower
            | Self::AthaaSensitivity
            | Self::InterChannelRatio
            | Self::Scale
            | Self::ScaleLeft
            | Self::ScaleRight => OptionKind::Float,
            _ => OptionKind::Int,
        }
    }

    /// The value the codec starts with, or `None` when the codec chooses one
    /// while locking its parameters.
    #[must_use]
    pub const fn default_value(self) -> Option<OptionValue> {
        let value = match self {
            Self::InSamplerate => OptionValue::Int(44_100),
            Self::NumChannels => OptionValue::Int(2),
            Self::WriteVbrTag
            | Self::Original
            | Self::UseTemporalMasking => OptionValue::Int(1),
            Self::Bitrate | Self::AbrBitrate => OptionValue::Int(128),
            Self::CompressionRatio => OptionValue::Float(11.0),
            Self::VbrQuality => OptionValue::Int(4),
            Self::AthLower | Self::AthaaSensitivity => OptionValue::Float(0.0),
            Self::Scale | Self::ScaleLeft | Self::ScaleRight => OptionValue::Float(1.0),
            Self::OutSamplerate
            | Self::Analysis
            | Self::ForceMs
            | Self::FreeFormat
            | Self::Copyright
            | Self::ErrorProtection
            | Self::Extension
            | Self::StrictIso
            | Self::DisableReservoir
            | Self::ExpQuantization
            | Self::ExpY
            | Self::ExpZ
            | Self::ExpNspsytune
            | Self::Vbr
            | Self::VbrMinEnforce
            | Self::LowpassFrequency
            | Self::HighpassFrequency
            | Self::AthForMaskingOnly
            | Self::AthForShortOnly
            | Self::AthDisable
            | Self::NoShortBlocks
            | Self::ForceShortBlocks => OptionValue::Int(0),
            Self::NumSamples
            | Self::Quality
            | Self::Mode
            | Self::Preset
            | Self::ExpMsfix
            | Self::VbrMinBitrate
            | Self::VbrMaxBitrate
            | Self::LowpassWidth
            | Self::HighpassWidth
            | Self::AthType
            | Self::AthaaType
            | Self::AllowBlocktypeDifference
            | Self::InterChannelRatio => return None,
        };

        Some(value)
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::InSamplerate => "Input sample rate in Hz",
            Self::NumChannels => "Number of channels in the input stream",
            Self::NumSamples => "Expected total number of samples per channel",
            Self::OutSamplerate => "Output sample rate in Hz (0: let the codec choose)",
            Self::Analysis => "Collect data for an MP3 frame analyzer",
            Self::WriteVbrTag => "Write a Xing VBR header frame",
            Self::Quality => "Algorithm quality, 0 (best) to 9 (worst)",
            Self::Mode => "Channel mode (stereo, joint stereo, dual channel, mono)",
            Self::ForceMs => "Force mid/side stereo for all frames",
            Self::FreeFormat => "Use free format bitstreams",
            Self::Bitrate => "Constant bitrate in kbps",
            Self::CompressionRatio => "Target compression ratio",
            Self::Preset => "Built-in preset (bitrate or preset constant)",
            Self::Copyright => "Set the copyright bit",
            Self::Original => "Set the original bit",
            Self::ErrorProtection => "Protect each frame with a CRC (uses 2 bytes per frame)",
            Self::Extension => "Set the private extension bit",
            Self::StrictIso => "Enforce strict ISO compliance",
            Self::DisableReservoir => "Disable the bit reservoir",
            Self::ExpQuantization => "Select an experimental quantization function",
            Self::ExpY => "Experimental option Y",
            Self::ExpZ => "Experimental option Z",
            Self::ExpNspsytune => "Use the alternative psychoacoustic model",
            Self::ExpMsfix => "Mid/side masking fix",
            Self::Vbr => "Variable bitrate mode",
            Self::VbrQuality => "VBR quality, 0 (highest) to 9 (lowest)",
            Self::AbrBitrate => "Average bitrate in kbps for ABR",
            Self::VbrMinBitrate => "Minimum bitrate in kbps for ABR/VBR",
            Self::VbrMaxBitrate => "Maximum bitrate in kbps for ABR/VBR",
            Self::VbrMinEnforce => "Enforce the minimum bitrate even for digital silence",
            Self::LowpassFrequency => "Lowpass frequency in Hz (-1: disabled)",
            Self::LowpassWidth => "Width of the lowpass transition band in Hz",
            Self::HighpassFrequency => "Highpass frequency in Hz (-1: disabled)",
            Self::HighpassWidth => "Width of the highpass transition band in Hz",
            Self::AthForMaskingOnly => "Only use the ATH for masking",
            Self::AthForShortOnly => "Only use the ATH for short blocks",
            Self::AthDisable => "Disable the ATH",
            Self::AthType => "Type of ATH curve",
            Self::AthLower => "Lower the ATH by this many dB",
            Self::AthaaType => "Type of ATH adaptive adjustment",
            Self::AthaaSensitivity => "Level in dB below which adaptive ATH adjustment occurs",
            Self::AllowBlocktypeDifference => "Allow block types to differ between channels",
            Self::UseTemporalMasking => "Use temporal masking",
            Self::InterChannelRatio => "Inter-channel masking ratio",
            Self::NoShortBlocks => "Disable short blocks",
            Self::ForceShortBlocks => "Force short blocks",
            Self::Scale => "Scale the input by this amount before encoding",
            Self::ScaleLeft => "Scale the left channel by this amount before encoding",
            Self::ScaleRight => "Scale the right channel by this amount before encoding",
        }
    }

    /// Options whose current value can be read back from the codec.
    #[must_use]
    pub const fn is_readable(self) -> bool {
        matches!(
            self,
            Self::InSamplerate | Self::NumChannels | Self::Scale | Self::ScaleLeft | Self::ScaleRight
        )
    }

    /// Options the codec permits to change after its parameters are locked.
    #[must_use]
    pub const fn is_writable_after_lock(self) -> bool {
        self.is_readable()
    }

    /// Checks `value` against this option's kind, widening integers for float
    /// options.
    ///
    /// # Errors
    ///
    /// * If a float is given for an integer option
    /// * If an integer is outside the range the codec can represent
    pub fn coerce(self, value: OptionValue) -> Result<OptionValue> {
        match (self.kind(), value) {
            (OptionKind::Int, OptionValue::Int(int)) => {
                let in_range = if self == Self::NumSamples {
                    u32::try_from(int).is_ok()
                } else {
                    i32::try_from(int).is_ok()
                };

                if in_range {
                    Ok(value)
                } else {
                    Err(Error::configuration(
                        self.as_ref(),
                        format!("value {int} is out of range"),
                    ))
                }
            }
            (OptionKind::Int, OptionValue::Float(..)) => Err(Error::configuration(
                self.as_ref(),
                "must be an integer",
            )),
            (OptionKind::Float, value) => {
                let float = value.as_float();
                if float.is_finite() {
                    Ok(OptionValue::Float(float))
                } else {
                    Err(Error::configuration(self.as_ref(), "must be a finite number"))
                }
            }
        }
    }
}

/// Variable bitrate modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum VbrMode {
    Off,
    OldAlgorithm,
    Abr,
    NewAlgorithm,
    Default,
}

impl VbrMode {
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Off => 0,
            Self::OldAlgorithm => 2,
            Self::Abr => 3,
            Self::NewAlgorithm | Self::Default => 4,
        }
    }
}

impl From<VbrMode> for OptionValue {
    fn from(value: VbrMode) -> Self {
        Self::Int(value.code().into())
    }
}

/// MPEG channel modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MpegMode {
    Stereo = 0,
    JointStereo = 1,
    DualChannel = 2,
    Mono = 3,
}

impl From<MpegMode> for OptionValue {
    fn from(value: MpegMode) -> Self {
        Self::Int(value as i64)
    }
}

/// Built-in encoder presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// VBR quality level, `0` (best) to `9`
    Vbr(u8),
    /// Average bitrate in kbps, `8` to `320`
    Abr(u16),
    R3mix,
    Standard,
    StandardFast,
    Extreme,
    ExtremeFast,
    Insane,
    Medium,
    MediumFast,
}

impl Preset {
    /// The numeric preset identifier understood by the codec.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Vbr(level) => 500 - 10 * i32::from(level.min(9)),
            Self::Abr(kbps) => i32::from(kbps.clamp(8, 320)),
            Self::R3mix => 1000,
            Self::Standard => 1001,
            Self::Extreme => 1002,
            Self::Insane => 1003,
            Self::StandardFast => 1004,
            Self::ExtremeFast => 1005,
            Self::Medium => 1006,
            Self::MediumFast => 1007,
        }
    }
}

impl From<Preset> for OptionValue {
    fn from(value: Preset) -> Self {
        Self::Int(value.code().into())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator as _;

    use super::*;

    #[test_log::test]
    fn test_option_names_round_trip_through_from_str() {
        for option in ConfigOption::iter() {
            assert_eq!(ConfigOption::from_str(option.as_ref()).unwrap(), option);
        }
    }

    #[test_log::test]
    fn test_option_names_are_snake_case() {
        assert_eq!(ConfigOption::InSamplerate.as_ref(), "in_samplerate");
        assert_eq!(ConfigOption::WriteVbrTag.as_ref(), "write_vbr_tag");
        assert_eq!(ConfigOption::StrictIso.as_ref(), "strict_iso");
        assert_eq!(ConfigOption::ExpY.as_ref(), "exp_y");
        assert_eq!(ConfigOption::AthaaSensitivity.as_ref(), "athaa_sensitivity");
    }

    #[test_log::test]
    fn test_unknown_option_name_is_rejected() {
        assert!(ConfigOption::from_str("nonexistent_option").is_err());
    }

    #[test_log::test]
    fn test_defaults_match_kinds() {
        for option in ConfigOption::iter() {
            match (option.kind(), option.default_value()) {
                (OptionKind::Int, Some(value)) => {
                    assert!(value.as_int().is_some(), "{option} default should be an int");
                }
                (OptionKind::Float, Some(value)) => {
                    assert!(value.as_int().is_none(), "{option} default should be a float");
                }
                (_, None) => {}
            }
        }
    }

    #[test_log::test]
    fn test_well_known_defaults() {
        assert_eq!(
            ConfigOption::Bitrate.default_value(),
            Some(OptionValue::Int(128))
        );
        assert_eq!(
            ConfigOption::CompressionRatio.default_value(),
            Some(OptionValue::Float(11.0))
        );
        assert_eq!(
            ConfigOption::VbrQuality.default_value(),
            Some(OptionValue::Int(4))
        );
        assert_eq!(ConfigOption::Vbr.default_value(), Some(OptionValue::Int(0)));
        assert_eq!(ConfigOption::Quality.default_value(), None);
    }

    #[test_log::test]
    fn test_readable_subset() {
        let readable = ConfigOption::iter()
            .filter(|option| option.is_readable())
            .collect::<Vec<_>>();

        assert_eq!(
            readable,
            vec![
                ConfigOption::InSamplerate,
                ConfigOption::NumChannels,
                ConfigOption::Scale,
                ConfigOption::ScaleLeft,
                ConfigOption::ScaleRight,
            ]
        );
    }

    #[test_log::test]
    fn test_coerce_rejects_float_for_int_option() {
        let err = ConfigOption::Bitrate
            .coerce(OptionValue::Float(128.0))
            .unwrap_err();

        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
    }

    #[test_log::test]
    fn test_coerce_widens_int_for_float_option() {
        assert_eq!(
            ConfigOption::Scale.coerce(OptionValue::Int(2)).unwrap(),
            OptionValue::Float(2.0)
        );
    }

    #[test_log::test]
    fn test_coerce_rejects_non_finite_float() {
        assert!(ConfigOption::Scale.coerce(OptionValue::Float(f64::NAN)).is_err());
    }

    #[test_log::test]
    fn test_coerce_checks_int_range() {
        assert!(ConfigOption::Bitrate.coerce(OptionValue::Int(i64::from(i32::MAX) + 1)).is_err());
        assert!(ConfigOption::NumSamples.coerce(OptionValue::Int(i64::from(u32::MAX))).is_ok());
        assert!(ConfigOption::NumSamples.coerce(OptionValue::Int(-1)).is_err());
    }

    #[test_log::test]
    fn test_option_value_deserializes_untagged() {
        let int: OptionValue = serde_json::from_str("128").unwrap();
        let float: OptionValue = serde_json::from_str("11.5").unwrap();

        assert_eq!(int, OptionValue::Int(128));
        assert_eq!(float, OptionValue::Float(11.5));
    }

    #[test_log::test]
    fn test_vbr_mode_codes() {
        assert_eq!(VbrMode::Off.code(), 0);
        assert_eq!(VbrMode::OldAlgorithm.code(), 2);
        assert_eq!(VbrMode::Abr.code(), 3);
        assert_eq!(VbrMode::NewAlgorithm.code(), 4);
        assert_eq!(VbrMode::Default.code(), VbrMode::NewAlgorithm.code());
        assert_eq!(VbrMode::from_str("new-algorithm").unwrap(), VbrMode::NewAlgorithm);
    }

    #[test_log::test]
    fn test_preset_codes() {
        assert_eq!(Preset::Vbr(0).code(), 500);
        assert_eq!(Preset::Vbr(9).code(), 410);
        assert_eq!(Preset::Abr(320).code(), 320);
        assert_eq!(Preset::Abr(8).code(), 8);
        assert_eq!(Preset::Standard.code(), 1001);
        assert_eq!(Preset::MediumFast.code(), 1007);
        assert_eq!(OptionValue::from(MpegMode::JointStereo), OptionValue::Int(1));
    }
}
