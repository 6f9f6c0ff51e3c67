use serde::{Deserialize, Serialize};

/// Lifecycle of a single card offload run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardStatus {
    Idle,
    Copying,
    /// Interrupted by the operator; `paused_progress` holds where the copy stopped.
    Paused,
    /// Fast re-check of already copied data before copying continues.
    Resuming,
    Verifying,
    Completed,
    Error,
}

impl CardStatus {
    /// Statuses the ticker advances. Everything else is parked.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Copying | Self::Resuming | Self::Verifying)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Copying => "COPYING",
            Self::Paused => "PAUSED",
            Self::Resuming => "RESUMING",
            Self::Verifying => "VERIFYING",
            Self::Completed => "COMPLETED",
            Self::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for CardStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Simulation acceleration applied to copy and verify steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedMultiplier {
    #[default]
    Normal,
    Fast,
}

impl SpeedMultiplier {
    pub fn factor(&self) -> f64 {
        match self {
            Self::Normal => 1.0,
            Self::Fast => 5.0,
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Self::Normal => Self::Fast,
            Self::Fast => Self::Normal,
        }
    }
}

/// How thoroughly the post-copy phase re-reads the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMode {
    /// Size and spot checks only.
    Quick,
    /// Checksum-equivalent pass over every clip.
    #[default]
    Full,
}

impl VerificationMode {
    pub fn toggled(&self) -> Self {
        match self {
            Self::Quick => Self::Full,
            Self::Full => Self::Quick,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Full => "full",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipMetadata {
    pub name: String,
    /// Human readable, e.g. "4.2 GB".
    pub size: String,
    pub duration: String,
    pub resolution: String,
    pub frame_rate: String,
    pub log_format: String,
    pub audio_tracks: u32,
    pub timecode_start: String,
    pub timecode_end: String,
    pub camera_model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lens: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    Success,
    Error,
}

/// Immutable entry written when a run finishes verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub id: String,
    pub date: String,
    pub card_label: String,
    pub total_size: String,
    pub clip_count: usize,
    pub destination: String,
    pub status: RecordStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub slot_label: String,
    pub label: String,
    pub color: String,
    pub status: CardStatus,
    /// Percentage of the current phase, 0..=100.
    pub progress: f64,
    pub paused_progress: Option<f64>,
    pub transfer_rate_mbps: f64,
    pub speed_multiplier: SpeedMultiplier,
    pub clips: Vec<ClipMetadata>,
    pub total_size_gb: u64,
    pub destination_path: String,
    pub is_locked: bool,
    pub is_mounted: bool,
    /// Newest first.
    pub history: Vec<BackupRecord>,
}

impl Card {
    /// A card in the middle of a run. Path edits and eject are refused while busy.
    pub fn is_busy(&self) -> bool {
        matches!(
            self.status,
            CardStatus::Copying | CardStatus::Verifying | CardStatus::Resuming | CardStatus::Paused
        )
    }

    pub fn total_size_label(&self) -> String {
        format!("{} GB", self.total_size_gb)
    }
}
