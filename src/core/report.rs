//! Camera log reports.
//!
//! Report generation is normally delegated to an external service behind
//! [`LogGenerator`]. [`summarize`] builds the same report locally and is what
//! callers get when no generator is configured or the generator fails.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::clock::Clock;
use super::models::ClipMetadata;

/// `A001_C003_...`: reel prefix and clip counter.
static CLIP_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<reel>[A-Za-z]\d{3})_C(?P<clip>\d{3,4})").expect("valid clip name regex")
});

static SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?P<value>\d+(?:\.\d+)?)\s*(?P<unit>TB|GB|MB|KB)\s*$").expect("valid size regex")
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogReport {
    pub date: String,
    pub camera_model: String,
    pub total_clips: usize,
    pub first_clip: String,
    pub last_clip: String,
    pub missing_clips: Vec<String>,
    pub total_size: String,
    pub formats: String,
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_match: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptEntry {
    pub scene: String,
    pub take: String,
    pub clip_name: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub good: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ScriptNotes {
    Text(String),
    Entries(Vec<ScriptEntry>),
}

impl Default for ScriptNotes {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRequest {
    pub card_label: String,
    pub clips: Vec<ClipMetadata>,
    #[serde(default)]
    pub script: ScriptNotes,
}

/// Port for the external report writer.
#[async_trait]
pub trait LogGenerator: Send + Sync {
    async fn generate(&self, request: &LogRequest) -> Result<LogReport>;
}

/// Ask `generator` for a report, falling back to [`summarize`] on failure.
pub async fn generate_or_fallback(
    generator: Option<&dyn LogGenerator>,
    request: &LogRequest,
    clock: &dyn Clock,
) -> LogReport {
    let Some(generator) = generator else {
        return summarize(request, clock);
    };

    match generator.generate(request).await {
        Ok(report) => report,
        Err(e) => {
            warn!(card = %request.card_label, error = %e, "Log generation failed, using local summary");
            let mut report = summarize(request, clock);
            report.notes = format!("Log generation failed: {e}");
            report
        }
    }
}

pub fn summarize(request: &LogRequest, clock: &dyn Clock) -> LogReport {
    let clips = &request.clips;
    let cameras: BTreeSet<&str> = clips.iter().map(|c| c.camera_model.as_str()).collect();
    let camera_model = if cameras.is_empty() {
        "Unknown".to_string()
    } else {
        cameras.into_iter().collect::<Vec<_>>().join(" / ")
    };

    LogReport {
        date: clock.now().format("%Y-%m-%d").to_string(),
        camera_model,
        total_clips: clips.len(),
        first_clip: clips.first().map_or("N/A".to_string(), |c| c.name.clone()),
        last_clip: clips.last().map_or("N/A".to_string(), |c| c.name.clone()),
        missing_clips: missing_clips(clips),
        total_size: total_size(clips).unwrap_or_else(|| "Unknown".to_string()),
        formats: formats(clips),
        notes: String::new(),
        script_match: script_match(&request.script, clips),
    }
}

/// Gaps in the clip counter within each reel, e.g. `A001_C004`.
pub fn missing_clips(clips: &[ClipMetadata]) -> Vec<String> {
    let mut reels: BTreeMap<String, (usize, BTreeSet<u32>)> = BTreeMap::new();
    for clip in clips {
        let Some(caps) = CLIP_NAME.captures(&clip.name) else {
            continue;
        };
        let Ok(number) = caps["clip"].parse::<u32>() else {
            continue;
        };
        let entry = reels
            .entry(caps["reel"].to_string())
            .or_insert_with(|| (caps["clip"].len(), BTreeSet::new()));
        entry.1.insert(number);
    }

    let mut missing = Vec::new();
    for (reel, (width, numbers)) in &reels {
        let (Some(&first), Some(&last)) = (numbers.first(), numbers.last()) else {
            continue;
        };
        let width = *width;
        missing.extend(
            (first..=last)
                .filter(|n| !numbers.contains(n))
                .map(|n| format!("{reel}_C{n:0width$}")),
        );
    }
    missing
}

fn parse_size_gb(size: &str) -> Option<f64> {
    let caps = SIZE.captures(size)?;
    let value: f64 = caps["value"].parse().ok()?;
    let gb = match caps["unit"].to_ascii_uppercase().as_str() {
        "TB" => value * 1024.0,
        "GB" => value,
        "MB" => value / 1024.0,
        "KB" => value / (1024.0 * 1024.0),
        _ => return None,
    };
    Some(gb)
}

/// Sum of clip sizes, `None` if any size is unreadable.
pub fn total_size(clips: &[ClipMetadata]) -> Option<String> {
    if clips.is_empty() {
        return None;
    }
    let total = clips
        .iter()
        .map(|c| parse_size_gb(&c.size))
        .sum::<Option<f64>>()?;
    Some(format!("{total:.1} GB"))
}

fn formats(clips: &[ClipMetadata]) -> String {
    let unique: BTreeSet<String> = clips
        .iter()
        .map(|c| {
            format!(
                "{} @ {} fps, {}, {} audio tracks",
                c.resolution, c.frame_rate, c.log_format, c.audio_tracks
            )
        })
        .collect();

    if unique.is_empty() {
        "Check manually".to_string()
    } else {
        unique.into_iter().collect::<Vec<_>>().join("; ")
    }
}

fn script_match(script: &ScriptNotes, clips: &[ClipMetadata]) -> Option<String> {
    match script {
        ScriptNotes::Text(text) if text.trim().is_empty() => None,
        ScriptNotes::Text(_) => Some("Free-text notes attached; match manually".to_string()),
        ScriptNotes::Entries(entries) => {
            let unmatched: Vec<&str> = entries
                .iter()
                .filter(|e| !clips.iter().any(|c| clip_matches(&c.name, &e.clip_name)))
                .map(|e| e.clip_name.as_str())
                .collect();
            let matched = entries.len() - unmatched.len();

            let mut summary = format!("{matched} of {} script entries matched clips", entries.len());
            if !unmatched.is_empty() {
                summary.push_str(&format!("; unmatched: {}", unmatched.join(", ")));
            }
            Some(summary)
        }
    }
}

/// Script sheets usually drop the suffix, so `A001_C002` matches `A001_C002_1024XJ.mxf`.
fn clip_matches(clip_name: &str, reference: &str) -> bool {
    let reference = reference.trim();
    !reference.is_empty() && clip_name.starts_with(reference)
}
