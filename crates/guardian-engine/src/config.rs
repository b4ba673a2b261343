use std::time::Duration;

use serde::Deserialize;

use domain::services::zone_evaluator::HysteresisConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Seconds to wait for a first push sample before engaging polling.
    #[serde(default = "default_fallback_delay")]
    pub fallback_delay_secs: u64,

    /// Fixed polling period once the fallback has engaged.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Capacity of the accepted-sample queue feeding the dispatcher.
    #[serde(default = "default_sample_queue_capacity")]
    pub sample_queue_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Battery percentage below which a low-battery event fires.
    #[serde(default = "default_low_battery_threshold")]
    pub low_battery_threshold: u8,

    /// Consecutive matching samples that commit a zone transition.
    #[serde(default = "default_hysteresis_samples")]
    pub hysteresis_samples: u32,

    /// Candidate age in seconds that commits a zone transition on its own.
    /// Defaults to one poll interval when unset.
    #[serde(default)]
    pub hysteresis_window_secs: Option<u64>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_fallback_delay() -> u64 {
    3
}

fn default_poll_interval() -> u64 {
    5
}

fn default_sample_queue_capacity() -> usize {
    256
}

fn default_low_battery_threshold() -> u8 {
    20
}

fn default_hysteresis_samples() -> u32 {
    2
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            fallback_delay_secs: default_fallback_delay(),
            poll_interval_secs: default_poll_interval(),
            sample_queue_capacity: default_sample_queue_capacity(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            low_battery_threshold: default_low_battery_threshold(),
            hysteresis_samples: default_hysteresis_samples(),
            hysteresis_window_secs: None,
        }
    }
}

impl SyncConfig {
    pub fn fallback_delay(&self) -> Duration {
        Duration::from_secs(self.fallback_delay_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl DispatchConfig {
    /// Evaluator tuning; the time window falls back to one poll interval.
    pub fn hysteresis(&self, poll_interval: Duration) -> HysteresisConfig {
        let window = self
            .hysteresis_window_secs
            .map(Duration::from_secs)
            .unwrap_or(poll_interval);
        HysteresisConfig {
            min_samples: self.hysteresis_samples,
            min_window: chrono::Duration::from_std(window)
                .unwrap_or_else(|_| chrono::Duration::seconds(5)),
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration (optional)
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with GUARDIAN__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("GUARDIAN").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(config::ConfigError::Message)?;
        Ok(cfg)
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.sync.poll_interval_secs == 0 {
            return Err("sync.poll_interval_secs must be at least 1".into());
        }
        if self.sync.fallback_delay_secs == 0 {
            return Err("sync.fallback_delay_secs must be at least 1".into());
        }
        if self.sync.sample_queue_capacity == 0 {
            return Err("sync.sample_queue_capacity must be at least 1".into());
        }
        if self.dispatch.low_battery_threshold > 100 {
            return Err("dispatch.low_battery_threshold must be at most 100".into());
        }
        if self.dispatch.hysteresis_samples == 0 {
            return Err("dispatch.hysteresis_samples must be at least 1".into());
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            sync: SyncConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.sync.fallback_delay_secs, 3);
        assert_eq!(config.sync.poll_interval_secs, 5);
        assert_eq!(config.dispatch.low_battery_threshold, 20);
        assert_eq!(config.dispatch.hysteresis_samples, 2);
        assert!(config.dispatch.hysteresis_window_secs.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_hysteresis_window_defaults_to_poll_interval() {
        let config = Config::default();
        let hysteresis = config.dispatch.hysteresis(config.sync.poll_interval());
        assert_eq!(hysteresis.min_window, chrono::Duration::seconds(5));
        assert_eq!(hysteresis.min_samples, 2);
    }

    #[test]
    fn test_explicit_hysteresis_window_wins() {
        let mut config = Config::default();
        config.dispatch.hysteresis_window_secs = Some(12);
        let hysteresis = config.dispatch.hysteresis(config.sync.poll_interval());
        assert_eq!(hysteresis.min_window, chrono::Duration::seconds(12));
    }

    #[test]
    fn test_validate_rejects_zero_poll_interval() {
        let mut config = Config::default();
        config.sync.poll_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_hysteresis_samples() {
        let mut config = Config::default();
        config.dispatch.hysteresis_samples = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial_toml() {
        let cfg = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [sync]
                fallback_delay_secs = 2

                [dispatch]
                low_battery_threshold = 15
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let parsed: Config = cfg.try_deserialize().unwrap();
        assert_eq!(parsed.sync.fallback_delay_secs, 2);
        assert_eq!(parsed.sync.poll_interval_secs, 5);
        assert_eq!(parsed.dispatch.low_battery_threshold, 15);
    }
}
