//! Dailies transcode desk.
//!
//! Holds the operator's render settings, estimates output sizes for a clip
//! and keeps a capped, newest-first list of simulated renders.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::clock::{Clock, RECORD_DATE_FORMAT, prefixed_id};
use super::models::ClipMetadata;

pub const DEFAULT_HISTORY_LIMIT: usize = 200;

static TIMECODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([01]\d|2[0-3]):([0-5]\d):([0-5]\d):(\d\d)$").expect("static regex")
});

#[derive(Debug, Error, PartialEq)]
pub enum TranscodeError {
    #[error("Invalid timecode {0:?}, expected HH:MM:SS:FF")]
    InvalidTimecode(String),
    #[error("Clip {clip} has an unreadable duration {duration:?}")]
    BadDuration { clip: String, duration: String },
    #[error("Clip not found: {0}")]
    ClipNotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TranscodeFormat {
    #[default]
    #[serde(rename = "ProRes 422 Proxy")]
    ProResProxy,
    #[serde(rename = "ProRes 422 LT")]
    ProResLt,
    #[serde(rename = "ProRes 4444")]
    ProRes4444,
    #[serde(rename = "H.264 High")]
    H264,
    #[serde(rename = "H.265 Main10")]
    H265,
    #[serde(rename = "DNxHD 115")]
    DnxHd115,
    #[serde(rename = "DNxHR LB")]
    DnxHrLb,
}

impl TranscodeFormat {
    /// Nominal video bitrate used for size estimates.
    pub fn bitrate_mbps(self) -> f64 {
        match self {
            Self::H264 => 15.0,
            Self::H265 => 10.0,
            Self::ProRes4444 => 300.0,
            _ => 45.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProResProxy => "ProRes 422 Proxy",
            Self::ProResLt => "ProRes 422 LT",
            Self::ProRes4444 => "ProRes 4444",
            Self::H264 => "H.264 High",
            Self::H265 => "H.265 Main10",
            Self::DnxHd115 => "DNxHD 115",
            Self::DnxHrLb => "DNxHR LB",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputResolution {
    #[default]
    #[serde(rename = "1920x1080")]
    Hd,
    #[serde(rename = "1280x720")]
    Hd720,
    #[serde(rename = "3840x2160")]
    Uhd,
    #[serde(rename = "1080x1920")]
    VerticalHd,
    #[serde(rename = "720x1280")]
    Vertical720,
    #[serde(rename = "2160x3840")]
    VerticalUhd,
}

impl OutputResolution {
    /// Portrait framing for social deliverables.
    pub fn is_vertical(self) -> bool {
        matches!(self, Self::VerticalHd | Self::Vertical720 | Self::VerticalUhd)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FrameRate {
    #[default]
    Source,
    #[serde(rename = "23.976")]
    Fps23_976,
    #[serde(rename = "24")]
    Fps24,
    #[serde(rename = "25")]
    Fps25,
    #[serde(rename = "29.97")]
    Fps29_97,
    #[serde(rename = "30")]
    Fps30,
    #[serde(rename = "50")]
    Fps50,
    #[serde(rename = "59.94")]
    Fps59_94,
    #[serde(rename = "60")]
    Fps60,
}

impl FrameRate {
    /// Target rate, or `None` to keep the clip's own.
    pub fn fps(self) -> Option<f64> {
        match self {
            Self::Source => None,
            Self::Fps23_976 => Some(23.976),
            Self::Fps24 => Some(24.0),
            Self::Fps25 => Some(25.0),
            Self::Fps29_97 => Some(29.97),
            Self::Fps30 => Some(30.0),
            Self::Fps50 => Some(50.0),
            Self::Fps59_94 => Some(59.94),
            Self::Fps60 => Some(60.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    #[default]
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimecodeSource {
    #[default]
    File,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeSettings {
    pub burn_in_timecode: bool,
    pub timecode_source: TimecodeSource,
    pub manual_timecode_start: String,
    pub burn_in_watermark: bool,
    pub watermark_text: String,
    pub watermark_position: WatermarkPosition,
    pub apply_lut: bool,
    pub lut_name: String,
    pub format: TranscodeFormat,
    pub output_resolution: OutputResolution,
    pub frame_rate: FrameRate,
    pub source_path: String,
    pub dest_path: String,
    pub log_path: String,
    /// Fixed output size in MB; 0 means estimate from bitrate.
    pub target_size_mb: u64,
    pub generate_log: bool,
}

impl Default for TranscodeSettings {
    fn default() -> Self {
        Self {
            burn_in_timecode: true,
            timecode_source: TimecodeSource::File,
            manual_timecode_start: "00:00:00:00".into(),
            burn_in_watermark: false,
            watermark_text: "PROPERTY OF STUDIO".into(),
            watermark_position: WatermarkPosition::Center,
            apply_lut: true,
            lut_name: "ARRI_709_v2.cube".into(),
            format: TranscodeFormat::ProResProxy,
            output_resolution: OutputResolution::Hd,
            frame_rate: FrameRate::Source,
            source_path: "/Volumes/Mag_A/Clips".into(),
            dest_path: "/Volumes/Dailies/Day_01".into(),
            log_path: "/Volumes/Dailies/Logs".into(),
            target_size_mb: 0,
            generate_log: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TranscodeStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodeRecord {
    pub id: String,
    pub date: String,
    pub clip_name: String,
    /// Display name of the format; older records carry free text.
    pub format: String,
    pub output_size: String,
    pub duration: String,
    pub source_path: String,
    pub dest_path: String,
    pub status: TranscodeStatus,
}

/// Keeps digits only, at most eight, and re-inserts the `:` separators.
///
/// Partial input stays partial: `"0130"` becomes `"01:30"`.
pub fn mask_timecode(input: &str) -> String {
    let digits: Vec<char> = input.chars().filter(char::is_ascii_digit).take(8).collect();
    let mut out = String::with_capacity(11);
    for (i, digit) in digits.into_iter().enumerate() {
        if i > 0 && i % 2 == 0 {
            out.push(':');
        }
        out.push(digit);
    }
    out
}

pub fn is_valid_timecode(timecode: &str) -> bool {
    TIMECODE.is_match(timecode)
}

/// Whole seconds of an `HH:MM:SS:FF` duration. Frames are ignored.
pub fn duration_seconds(duration: &str) -> Option<u64> {
    let mut parts = duration.split(':').map(|p| p.trim().parse::<u64>());
    let hours = parts.next()?.ok()?;
    let minutes = parts.next()?.ok()?;
    let seconds = parts.next()?.ok()?;
    Some(hours * 3600 + minutes * 60 + seconds)
}

/// Estimated output size in MB for `clip` under `settings`.
pub fn estimate_size_mb(clip: &ClipMetadata, settings: &TranscodeSettings) -> Result<u64, TranscodeError> {
    let seconds = duration_seconds(&clip.duration).ok_or_else(|| TranscodeError::BadDuration {
        clip: clip.name.clone(),
        duration: clip.duration.clone(),
    })?;
    if settings.target_size_mb > 0 {
        return Ok(settings.target_size_mb);
    }

    let source_fps = clip.frame_rate.trim().parse::<f64>().ok();
    let fps_multiplier = match (settings.frame_rate.fps(), source_fps) {
        (Some(target), Some(source)) if source > 0.0 => target / source,
        _ => 1.0,
    };

    let megabytes = seconds as f64 * settings.format.bitrate_mbps() / 8.0 * fps_multiplier;
    Ok(megabytes.round() as u64)
}

/// Settings plus render history for the dailies desk.
#[derive(Debug, Clone)]
pub struct TranscodeDesk {
    settings: TranscodeSettings,
    history: Vec<TranscodeRecord>,
    history_limit: usize,
}

impl Default for TranscodeDesk {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl TranscodeDesk {
    /// Desk seeded with the two reference renders.
    pub fn new(history_limit: usize) -> Self {
        let mut desk = Self::empty(history_limit);
        desk.history = reference_history();
        desk.history.truncate(desk.history_limit);
        desk
    }

    pub fn empty(history_limit: usize) -> Self {
        Self {
            settings: TranscodeSettings::default(),
            history: Vec::new(),
            history_limit: history_limit.max(1),
        }
    }

    pub fn settings(&self) -> &TranscodeSettings {
        &self.settings
    }

    /// Replace the settings. The manual start timecode is re-masked.
    pub fn update_settings(&mut self, mut settings: TranscodeSettings) {
        settings.manual_timecode_start = mask_timecode(&settings.manual_timecode_start);
        debug!(format = settings.format.as_str(), "Transcode settings updated");
        self.settings = settings;
    }

    pub fn estimate(&self, clip: &ClipMetadata) -> Result<u64, TranscodeError> {
        estimate_size_mb(clip, &self.settings)
    }

    /// Simulate a render of `clip` and record it, newest first.
    pub fn render(&mut self, clip: &ClipMetadata, clock: &dyn Clock) -> Result<TranscodeRecord, TranscodeError> {
        if self.settings.timecode_source == TimecodeSource::Manual
            && !is_valid_timecode(&self.settings.manual_timecode_start)
        {
            return Err(TranscodeError::InvalidTimecode(self.settings.manual_timecode_start.clone()));
        }
        let size_mb = self.estimate(clip)?;

        let now = clock.now();
        let record = TranscodeRecord {
            id: prefixed_id("t", now),
            date: now.format(RECORD_DATE_FORMAT).to_string(),
            clip_name: clip.name.clone(),
            format: self.settings.format.as_str().to_string(),
            output_size: format!("{size_mb} MB"),
            duration: clip.duration.clone(),
            source_path: self.settings.source_path.clone(),
            dest_path: self.settings.dest_path.clone(),
            status: TranscodeStatus::Completed,
        };
        info!(clip = %record.clip_name, format = %record.format, size_mb, "Transcode rendered");

        self.history.insert(0, record.clone());
        self.history.truncate(self.history_limit);
        Ok(record)
    }

    /// Newest first.
    pub fn history(&self) -> &[TranscodeRecord] {
        &self.history
    }
}

fn reference_history() -> Vec<TranscodeRecord> {
    let record = |id: &str, date: &str, clip: &str, size: &str, duration: &str| TranscodeRecord {
        id: id.into(),
        date: date.into(),
        clip_name: clip.into(),
        format: "H.264".into(),
        output_size: size.into(),
        duration: duration.into(),
        source_path: "/Volumes/MagA/Clips".into(),
        dest_path: "/Volumes/Dailies".into(),
        status: TranscodeStatus::Completed,
    };
    vec![
        record("t-1", "2023-10-24 10:15:00", "A001_C001", "450 MB", "00:02:14:00"),
        record("t-2", "2023-10-24 10:18:00", "A001_C002", "120 MB", "00:00:35:00"),
    ]
}
