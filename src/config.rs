use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::core::deck::CardSpec;
use crate::core::models::VerificationMode;
use crate::core::transcode;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/ditd/config.toml";
pub const ENV_PREFIX: &str = "DITD_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// How often the ticker advances the engine.
    pub tick_interval_ms: u64,
    pub verification_mode: VerificationMode,
    pub rpc_bind: SocketAddr,
    pub verbose: bool,
    pub json_logs: bool,
    pub simulation: SimulationConfig,
    pub notifications: NotificationConfig,
    pub transcode: TranscodeConfig,
    /// Replaces the built-in demo deck when non-empty.
    pub cards: Vec<CardSpec>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
            verification_mode: VerificationMode::Full,
            rpc_bind: SocketAddr::from(([127, 0, 0, 1], 7878)),
            verbose: false,
            json_logs: false,
            simulation: SimulationConfig::default(),
            notifications: NotificationConfig::default(),
            transcode: TranscodeConfig::default(),
            cards: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Layer defaults, the TOML file, `DITD_*` env vars and CLI overrides, in that order.
    ///
    /// A missing config file is not an error; the defaults apply.
    pub fn new<T: Serialize>(cli_overrides: Option<&T>, path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        if let Some(overrides) = cli_overrides {
            figment = figment.merge(Serialized::defaults(overrides));
        }

        let config: AppConfig = figment
            .extract()
            .with_context(|| format!("Failed to load configuration ({})", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            anyhow::bail!("tick_interval_ms must be greater than zero");
        }
        if self.transcode.history_limit == 0 {
            anyhow::bail!("transcode.history_limit must be greater than zero");
        }
        self.simulation.validate()
    }
}

/// Step sizes and rates of the offload simulation.
///
/// Steps are percentage points per nominal 50 ms tick; the engine scales
/// them by the real elapsed time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub copy_step: f64,
    pub resume_step: f64,
    pub quick_verify_step: f64,
    pub full_verify_step: f64,
    pub base_rate_mbps: f64,
    pub rate_jitter_mbps: f64,
    /// Read-back during verification outruns the write.
    pub verify_rate_factor: f64,
    pub history_limit: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            copy_step: 0.2,
            resume_step: 5.0,
            quick_verify_step: 2.0,
            full_verify_step: 0.1,
            base_rate_mbps: 450.0,
            rate_jitter_mbps: 25.0,
            verify_rate_factor: 1.5,
            history_limit: 50,
        }
    }
}

impl SimulationConfig {
    /// Steps must be finite and positive or a card can stall or leave 0..=100.
    pub fn validate(&self) -> Result<()> {
        let steps = [
            ("copy_step", self.copy_step),
            ("resume_step", self.resume_step),
            ("quick_verify_step", self.quick_verify_step),
            ("full_verify_step", self.full_verify_step),
        ];
        for (name, value) in steps {
            if !value.is_finite() || value <= 0.0 {
                anyhow::bail!("simulation.{name} must be a finite number greater than zero (got {value})");
            }
        }

        let rates = [
            ("base_rate_mbps", self.base_rate_mbps),
            ("rate_jitter_mbps", self.rate_jitter_mbps),
            ("verify_rate_factor", self.verify_rate_factor),
        ];
        for (name, value) in rates {
            if !value.is_finite() || value < 0.0 {
                anyhow::bail!("simulation.{name} must be a finite, non-negative number (got {value})");
            }
        }

        if self.history_limit == 0 {
            anyhow::bail!("simulation.history_limit must be greater than zero");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    /// Renders kept on the dailies desk, newest first.
    pub history_limit: usize,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            history_limit: transcode::DEFAULT_HISTORY_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannelType {
    #[default]
    None,
    Bell,
    Slack,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub channel: NotificationChannelType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slack_webhook: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[derive(Serialize)]
    struct Overrides {
        #[serde(skip_serializing_if = "Option::is_none")]
        tick_interval_ms: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        verification_mode: Option<VerificationMode>,
    }

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            AppConfig::new(None::<&Overrides>, Some(&dir.path().join("absent.toml"))).unwrap();

        assert_eq!(config.tick_interval_ms, 50);
        assert_eq!(config.verification_mode, VerificationMode::Full);
        assert_eq!(config.simulation, SimulationConfig::default());
        assert!(config.cards.is_empty());
    }

    #[test]
    fn file_values_override_defaults() {
        let file = write_config(
            r#"
            verification_mode = "quick"
            rpc_bind = "127.0.0.1:9000"

            [simulation]
            copy_step = 1.0
            history_limit = 10

            [notifications]
            channel = "bell"
            "#,
        );

        let config = AppConfig::new(None::<&Overrides>, Some(file.path())).unwrap();

        assert_eq!(config.verification_mode, VerificationMode::Quick);
        assert_eq!(config.rpc_bind.port(), 9000);
        assert_eq!(config.simulation.copy_step, 1.0);
        assert_eq!(config.simulation.history_limit, 10);
        // untouched keys keep their defaults
        assert_eq!(config.simulation.resume_step, 5.0);
        assert_eq!(config.notifications.channel, NotificationChannelType::Bell);
    }

    #[test]
    fn cli_overrides_win_over_file() {
        let file = write_config("tick_interval_ms = 100\nverification_mode = \"quick\"\n");
        let overrides = Overrides {
            tick_interval_ms: Some(20),
            verification_mode: None,
        };

        let config = AppConfig::new(Some(&overrides), Some(file.path())).unwrap();

        assert_eq!(config.tick_interval_ms, 20);
        assert_eq!(config.verification_mode, VerificationMode::Quick);
    }

    #[test]
    fn zero_tick_interval_is_rejected() {
        let file = write_config("tick_interval_ms = 0\n");
        assert!(AppConfig::new(None::<&Overrides>, Some(file.path())).is_err());
    }

    #[test]
    fn non_finite_or_non_positive_steps_are_rejected() {
        for key in ["copy_step", "resume_step", "quick_verify_step", "full_verify_step"] {
            for value in ["nan", "inf", "0.0", "-1.0"] {
                let file = write_config(&format!("[simulation]\n{key} = {value}\n"));
                let err = AppConfig::new(None::<&Overrides>, Some(file.path()))
                    .expect_err(&format!("{key} = {value} should be rejected"));
                assert!(format!("{err:#}").contains(key), "{err:#}");
            }
        }
    }

    #[test]
    fn negative_rates_are_rejected() {
        for key in ["base_rate_mbps", "rate_jitter_mbps", "verify_rate_factor"] {
            let sim: SimulationConfig = toml::from_str(&format!("{key} = -0.5\n")).unwrap();
            assert!(sim.validate().is_err(), "{key} accepted a negative value");

            let sim: SimulationConfig = toml::from_str(&format!("{key} = nan\n")).unwrap();
            assert!(sim.validate().is_err(), "{key} accepted NaN");
        }

        let calm = SimulationConfig {
            rate_jitter_mbps: 0.0,
            ..SimulationConfig::default()
        };
        assert!(calm.validate().is_ok());
    }

    #[test]
    fn zero_history_limit_is_rejected() {
        let file = write_config("[simulation]\nhistory_limit = 0\n");
        assert!(AppConfig::new(None::<&Overrides>, Some(file.path())).is_err());

        let file = write_config("[transcode]\nhistory_limit = 0\n");
        let err = AppConfig::new(None::<&Overrides>, Some(file.path())).unwrap_err();
        assert!(format!("{err:#}").contains("transcode.history_limit"));
    }

    #[test]
    fn transcode_history_defaults_to_two_hundred() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            AppConfig::new(None::<&Overrides>, Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.transcode.history_limit, 200);

        let file = write_config("[transcode]\nhistory_limit = 25\n");
        let config = AppConfig::new(None::<&Overrides>, Some(file.path())).unwrap();
        assert_eq!(config.transcode.history_limit, 25);
    }

    #[test]
    fn defaults_round_trip_through_toml() {
        let text = AppConfig::default().to_toml().unwrap();
        assert!(text.contains("tick_interval_ms = 50"));
        assert!(text.contains("[simulation]"));
    }
}
