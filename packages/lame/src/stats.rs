//! Labeled snapshots of the codec's frame counters.

use serde::Serialize;
use strum_macros::{AsRefStr, EnumIter};

use crate::engine::{BITRATE_BUCKETS, CodecEngine, STEREO_MODES};

/// Frames observed at one nominal bitrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BitrateBucket {
    pub bitrate_kbps: u32,
    pub frames: u32,
}

/// Per-frame stereo coding choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, AsRefStr, EnumIter)]
pub enum StereoMode {
    #[strum(serialize = "LR")]
    #[serde(rename = "LR")]
    LeftRight,
    #[strum(serialize = "LR-intensity")]
    #[serde(rename = "LR-intensity")]
    LeftRightIntensity,
    #[strum(serialize = "MS")]
    #[serde(rename = "MS")]
    MidSide,
    #[strum(serialize = "MS-intensity")]
    #[serde(rename = "MS-intensity")]
    MidSideIntensity,
}

impl StereoMode {
    /// All modes in histogram order.
    pub const ALL: [Self; STEREO_MODES] = [
        Self::LeftRight,
        Self::LeftRightIntensity,
        Self::MidSide,
        Self::MidSideIntensity,
    ];

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for StereoMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// Frame counts per [`StereoMode`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StereoModeHistogram {
    counts: [u32; STEREO_MODES],
}

impl StereoModeHistogram {
    #[must_use]
    pub const fn new(counts: [u32; STEREO_MODES]) -> Self {
        Self { counts }
    }

    #[must_use]
    pub const fn get(&self, mode: StereoMode) -> u32 {
        self.counts[mode.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (StereoMode, u32)> + '_ {
        StereoMode::ALL.into_iter().map(|mode| (mode, self.get(mode)))
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().copied().map(u64::from).sum()
    }

    #[must_use]
    pub const fn counts(&self) -> [u32; STEREO_MODES] {
        self.counts
    }
}

/// One nominal bitrate's frames, split by stereo mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BitrateStereoModeRow {
    pub bitrate_kbps: u32,
    pub modes: StereoModeHistogram,
}

pub(crate) fn bitrate_histogram(engine: &impl CodecEngine) -> Vec<BitrateBucket> {
    engine
        .bitrate_table_kbps()
        .into_iter()
        .zip(engine.bitrate_histogram())
        .map(|(bitrate_kbps, frames)| BitrateBucket {
            bitrate_kbps,
            frames,
        })
        .collect()
}

pub(crate) fn stereo_mode_histogram(engine: &impl CodecEngine) -> StereoModeHistogram {
    StereoModeHistogram::new(engine.stereo_mode_histogram())
}

pub(crate) fn bitrate_stereo_mode_histogram(
    engine: &impl CodecEngine,
) -> Vec<BitrateStereoModeRow> {
    let rows: [[u32; STEREO_MODES]; BITRATE_BUCKETS] = engine.bitrate_stereo_mode_histogram();

    engine
        .bitrate_table_kbps()
        .into_iter()
        .zip(rows)
        .map(|(bitrate_kbps, counts)| BitrateStereoModeRow {
            bitrate_kbps,
            modes: StereoModeHistogram::new(counts),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator as _;

    use super::*;

    #[test_log::test]
    fn test_stereo_mode_labels() {
        let labels = StereoMode::iter()
            .map(|mode| mode.to_string())
            .collect::<Vec<_>>();

        assert_eq!(labels, vec!["LR", "LR-intensity", "MS", "MS-intensity"]);
    }

    #[test_log::test]
    fn test_all_matches_index_order() {
        for (index, mode) in StereoMode::ALL.into_iter().enumerate() {
            assert_eq!(mode.index(), index);
        }
    }

    #[test_log::test]
    fn test_histogram_iterates_labeled_counts() {
        let histogram = StereoModeHistogram::new([5, 0, 7, 1]);

        assert_eq!(histogram.get(StereoMode::MidSide), 7);
        assert_eq!(histogram.total(), 13);
        assert_eq!(
            histogram.iter().collect::<Vec<_>>(),
            vec![
                (StereoMode::LeftRight, 5),
                (StereoMode::LeftRightIntensity, 0),
                (StereoMode::MidSide, 7),
                (StereoMode::MidSideIntensity, 1),
            ]
        );
    }

    #[test_log::test]
    fn test_stereo_mode_serializes_as_label() {
        assert_eq!(
            serde_json::to_string(&StereoMode::LeftRightIntensity).unwrap(),
            "\"LR-intensity\""
        );
    }
}
