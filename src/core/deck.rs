//! Card definitions the engine is seeded with.
//!
//! Without `[[cards]]` in the config the daemon loads a three-magazine demo deck.

use serde::{Deserialize, Serialize};

use super::models::{
    BackupRecord, Card, CardStatus, ClipMetadata, RecordStatus, SpeedMultiplier,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardSpec {
    pub id: String,
    pub slot_label: String,
    pub label: String,
    pub color: String,
    pub total_size_gb: u64,
    pub destination_path: String,
    #[serde(default)]
    pub clips: Vec<ClipMetadata>,
    #[serde(default)]
    pub history: Vec<BackupRecord>,
}

impl CardSpec {
    pub fn into_card(self) -> Card {
        Card {
            id: self.id,
            slot_label: self.slot_label,
            label: self.label,
            color: self.color,
            status: CardStatus::Idle,
            progress: 0.0,
            paused_progress: None,
            transfer_rate_mbps: 0.0,
            speed_multiplier: SpeedMultiplier::Normal,
            clips: self.clips,
            total_size_gb: self.total_size_gb,
            destination_path: self.destination_path,
            is_locked: false,
            is_mounted: true,
            history: self.history,
        }
    }
}

/// Build cards from config, falling back to the demo deck.
pub fn load(specs: &[CardSpec]) -> Vec<Card> {
    let specs = if specs.is_empty() {
        demo_deck()
    } else {
        specs.to_vec()
    };
    specs.into_iter().map(CardSpec::into_card).collect()
}

#[allow(clippy::too_many_arguments)]
fn clip(
    name: &str,
    size: &str,
    duration: &str,
    frame_rate: &str,
    log_format: &str,
    audio_tracks: u32,
    timecode: (&str, &str),
    resolution: &str,
    camera_model: &str,
) -> ClipMetadata {
    ClipMetadata {
        name: name.to_string(),
        size: size.to_string(),
        duration: duration.to_string(),
        resolution: resolution.to_string(),
        frame_rate: frame_rate.to_string(),
        log_format: log_format.to_string(),
        audio_tracks,
        timecode_start: timecode.0.to_string(),
        timecode_end: timecode.1.to_string(),
        camera_model: camera_model.to_string(),
        lens: None,
    }
}

fn mag_a_clips() -> Vec<ClipMetadata> {
    let alexa = |name, size, duration, fps, tc| {
        clip(name, size, duration, fps, "LogC4", 4, tc, "4096x2160", "ALEXA 35")
    };
    // C004 is absent on purpose; reports should flag it.
    vec![
        alexa("A001_C001_1024XJ.mxf", "4.2 GB", "00:02:14:00", "24.00", ("10:00:00:00", "10:02:14:00")),
        alexa("A001_C002_1024XJ.mxf", "1.1 GB", "00:00:35:00", "24.00", ("10:04:12:00", "10:04:47:00")),
        alexa("A001_C003_1024XJ.mxf", "8.5 GB", "00:04:30:00", "48.00", ("10:06:00:00", "10:10:30:00")),
        alexa("A001_C005_1024XJ.mxf", "2.3 GB", "00:01:12:00", "24.00", ("10:15:20:00", "10:16:32:00")),
    ]
}

fn mag_b_clips() -> Vec<ClipMetadata> {
    let mini = |name, size, duration, tc| {
        clip(name, size, duration, "24.00", "LogC4", 2, tc, "4096x2160", "ALEXA Mini LF")
    };
    vec![
        mini("B002_C001_1024TH.mxf", "3.2 GB", "00:01:40:00", ("14:22:10:00", "14:23:50:00")),
        mini("B002_C002_1024TH.mxf", "3.5 GB", "00:01:55:00", ("14:25:00:00", "14:26:55:00")),
    ]
}

fn mag_c_clips() -> Vec<ClipMetadata> {
    vec![clip(
        "C001_C001_1024AB.mxf",
        "0.5 GB",
        "00:00:15:00",
        "23.98",
        "S-Log3",
        4,
        ("08:11:05:00", "08:11:20:00"),
        "3840x2160",
        "FX9",
    )]
}

fn seeded_history() -> Vec<BackupRecord> {
    let record = |id: &str, date: &str, total_size: &str, clip_count| BackupRecord {
        id: id.to_string(),
        date: date.to_string(),
        card_label: "Mag A (Red)".to_string(),
        total_size: total_size.to_string(),
        clip_count,
        destination: "/Volumes/RAID/Day1".to_string(),
        status: RecordStatus::Success,
    };
    vec![
        record("h-1", "2023-10-24 10:00", "128 GB", 15),
        record("h-2", "2023-10-24 14:30", "64 GB", 8),
    ]
}

pub fn demo_deck() -> Vec<CardSpec> {
    vec![
        CardSpec {
            id: "card-a".to_string(),
            slot_label: "Slot A".to_string(),
            label: "Mag A (Red)".to_string(),
            color: "#FF5E5E".to_string(),
            total_size_gb: 128,
            destination_path: "/Volumes/RAID_01/Day_01".to_string(),
            clips: mag_a_clips(),
            history: seeded_history(),
        },
        CardSpec {
            id: "card-b".to_string(),
            slot_label: "Slot B".to_string(),
            label: "Mag B (Cyan)".to_string(),
            color: "#4FD1C5".to_string(),
            total_size_gb: 64,
            destination_path: "/Volumes/RAID_01/Day_01".to_string(),
            clips: mag_b_clips(),
            history: Vec::new(),
        },
        CardSpec {
            id: "card-c".to_string(),
            slot_label: "Slot C".to_string(),
            label: "Mag C (Amber)".to_string(),
            color: "#F6AD55".to_string(),
            total_size_gb: 32,
            destination_path: "/Volumes/SSD_Shuttle/Day_01".to_string(),
            clips: mag_c_clips(),
            history: Vec::new(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_loads_demo_deck() {
        let cards = load(&[]);
        assert_eq!(cards.len(), 3);
        assert!(cards.iter().all(|c| c.status == CardStatus::Idle && c.is_mounted));
        assert_eq!(cards[0].clips.len(), 4);
        assert_eq!(cards[0].history.len(), 2);
        assert!(cards[1].history.is_empty());
    }

    #[test]
    fn configured_cards_replace_demo_deck() {
        let spec = CardSpec {
            id: "x".to_string(),
            slot_label: "Slot X".to_string(),
            label: "Mag X".to_string(),
            color: "#000000".to_string(),
            total_size_gb: 10,
            destination_path: "/tmp/x".to_string(),
            clips: Vec::new(),
            history: Vec::new(),
        };
        let cards = load(&[spec]);
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].id, "x");
        assert_eq!(cards[0].paused_progress, None);
    }
}
