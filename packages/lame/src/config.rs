//! Serializable session configuration.

#![allow(clippy::module_name_repetitions)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ConfigOption, Error, OptionValue, Result};

/// A set of option values to apply to a session before it is initialized.
///
/// Serialized as a flat object keyed by option name:
///
/// ```json
/// { "num_channels": 2, "bitrate": 192, "scale": 0.5 }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionConfig {
    options: BTreeMap<ConfigOption, OptionValue>,
}

impl SessionConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            options: BTreeMap::new(),
        }
    }

    /// Parses a JSON configuration.
    ///
    /// # Errors
    ///
    /// * If the JSON is malformed or names an unknown option
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::configuration("config", e.to_string()))
    }

    /// # Errors
    ///
    /// * If serialization fails
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::configuration("config", e.to_string()))
    }

    #[must_use]
    pub fn with(mut self, option: ConfigOption, value: impl Into<OptionValue>) -> Self {
        self.set(option, value);
        self
    }

    pub fn set(&mut self, option: ConfigOption, value: impl Into<OptionValue>) {
        self.options.insert(option, value.into());
    }

    #[must_use]
    pub fn get(&self, option: ConfigOption) -> Option<OptionValue> {
        self.options.get(&option).copied()
    }

    /// Options in the order they are applied.
    pub fn iter(&self) -> impl Iterator<Item = (ConfigOption, OptionValue)> + '_ {
        self.options.iter().map(|(option, value)| (*option, *value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.options.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{MpegMode, VbrMode};

    #[test_log::test]
    fn test_from_json_reads_named_options() {
        let config =
            SessionConfig::from_json(r#"{"bitrate": 192, "num_channels": 1, "scale": 0.5}"#)
                .unwrap();

        assert_eq!(config.len(), 3);
        assert_eq!(config.get(ConfigOption::Bitrate), Some(OptionValue::Int(192)));
        assert_eq!(config.get(ConfigOption::Scale), Some(OptionValue::Float(0.5)));
    }

    #[test_log::test]
    fn test_from_json_rejects_unknown_option() {
        let err = SessionConfig::from_json(r#"{"nonexistent_option": 1}"#).unwrap_err();

        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
    }

    #[test_log::test]
    fn test_iter_follows_option_table_order() {
        let config = SessionConfig::new()
            .with(ConfigOption::Vbr, VbrMode::Abr)
            .with(ConfigOption::Mode, MpegMode::Mono)
            .with(ConfigOption::NumChannels, 1);

        let order = config.iter().map(|(option, _)| option).collect::<Vec<_>>();

        assert_eq!(
            order,
            vec![ConfigOption::NumChannels, ConfigOption::Mode, ConfigOption::Vbr]
        );
    }

    #[test_log::test]
    fn test_to_json_uses_option_names() {
        let config = SessionConfig::new().with(ConfigOption::WriteVbrTag, false);

        assert_eq!(config.to_json().unwrap(), r#"{"write_vbr_tag":0}"#);
    }
}
