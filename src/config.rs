use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Component, ErrorContext, ExecError, Result};
use crate::market::{DataWindow, SyntheticConfig, TickSource};
use crate::rl::config::{AgentConfig, EnvConfig, EvalConfig, RLConfig, TrainingConfig};
use crate::rl::core::RewardWeights;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub environment: EnvConfig,
    pub reward: RewardWeights,
    pub agent: AgentConfig,
    pub training: TrainingConfig,
    pub evaluation: EvalConfig,
    pub data: DataConfig,
    pub logging: LoggingConfig,
}

/// Where training and evaluation ticks come from.
///
/// Each source is `path` or `path@start_ns..end_ns`. With no training
/// sources, `synthetic_windows` generated markets are used instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub train_sources: Vec<String>,
    pub eval_sources: Vec<String>,
    pub synthetic_windows: usize,
    pub synthetic: SyntheticConfig,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            train_sources: Vec::new(),
            eval_sources: Vec::new(),
            synthetic_windows: 4,
            synthetic: SyntheticConfig::default(),
        }
    }
}

impl DataConfig {
    pub fn train_windows(&self) -> Result<Vec<DataWindow>> {
        if self.train_sources.is_empty() {
            return Ok(self.synthetic_data_windows(0));
        }
        self.train_sources.iter().map(|s| parse_window(s)).collect()
    }

    /// Held-out windows; synthetic markets use seeds disjoint from training
    pub fn eval_windows(&self) -> Result<Vec<DataWindow>> {
        if self.eval_sources.is_empty() {
            return Ok(self.synthetic_data_windows(1_000));
        }
        self.eval_sources.iter().map(|s| parse_window(s)).collect()
    }

    fn synthetic_data_windows(&self, seed_offset: u64) -> Vec<DataWindow> {
        (0..self.synthetic_windows.max(1) as u64)
            .map(|i| {
                let config = SyntheticConfig {
                    seed: self.synthetic.seed.wrapping_add(seed_offset + i),
                    ..self.synthetic.clone()
                };
                DataWindow::whole(TickSource::memory(crate::market::generate_ticks(&config)))
            })
            .collect()
    }
}

/// Parse `path` or `path@start_ns..end_ns`
pub fn parse_window(spec: &str) -> Result<DataWindow> {
    let ctx = ErrorContext::new(Component::Config);
    let Some((path, range)) = spec.rsplit_once('@') else {
        return Ok(DataWindow::whole(TickSource::file(spec)));
    };
    let (start, end) = range
        .split_once("..")
        .ok_or_else(|| ExecError::config(ctx, format!("window range must be start..end: {spec}")))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<u64>()
            .map_err(|e| ExecError::config(ctx, format!("bad window bound {v:?} in {spec}: {e}")))
    };
    let (start, end) = (parse(start)?, parse(end)?);
    if end < start {
        return Err(ExecError::config(ctx, format!("window ends before it starts: {spec}")));
    }
    Ok(DataWindow::between(TickSource::file(path), start, end))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable JSON formatted logs
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration: defaults, then the optional TOML file, then
    /// `EXECRL__SECTION__KEY` environment overrides
    pub fn load_from(path: Option<&Path>) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder
            .add_source(
                Environment::with_prefix("EXECRL")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("data.train_sources")
                    .with_list_parse_key("data.eval_sources"),
            )
            .build()?
            .try_deserialize()
    }

    /// RL sections as one value
    pub fn rl(&self) -> RLConfig {
        RLConfig {
            environment: self.environment.clone(),
            reward: self.reward,
            agent: self.agent.clone(),
            training: self.training.clone(),
            evaluation: self.evaluation.clone(),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = self.rl().validate();

        if self.data.train_sources.is_empty() && self.data.synthetic_windows == 0 {
            errors.push("data.train_sources is empty and synthetic_windows is 0".to_string());
        }
        for source in self.data.train_sources.iter().chain(&self.data.eval_sources) {
            if let Err(e) = parse_window(source) {
                errors.push(e.to_string());
            }
        }
        if !matches!(
            self.logging.level.to_ascii_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            errors.push(format!("logging.level {:?} is not a log level", self.logging.level));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and convert violations into one configuration error
    pub fn ensure_valid(&self) -> Result<()> {
        self.validate().map_err(|errors| {
            ExecError::config(ErrorContext::new(Component::Config), errors.join("; "))
        })
    }

    /// Default configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;

    #[test]
    fn test_defaults_are_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_load_file_overrides_defaults() {
        let path = temp_dir().join(format!("execrl-config-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            "[environment]\ntotal_volume = 2500.0\nside = \"sell\"\n\n[training]\nepisodes = 12\n",
        )
        .unwrap();

        let config = AppConfig::load_from(Some(&path)).unwrap();
        assert_eq!(config.environment.total_volume, 2_500.0);
        assert_eq!(config.environment.side, crate::market::Side::Sell);
        assert_eq!(config.training.episodes, 12);
        assert_eq!(config.environment.deadline_steps, 50);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("EXECRL__REWARD__W_TIME_PENALTY", "3.5");
        let config = AppConfig::load_from(None).unwrap();
        std::env::remove_var("EXECRL__REWARD__W_TIME_PENALTY");
        assert_eq!(config.reward.w_time_penalty, 3.5);
    }

    #[test]
    fn test_missing_file_is_error() {
        let path = temp_dir().join(format!("execrl-missing-{}.toml", uuid::Uuid::new_v4()));
        assert!(AppConfig::load_from(Some(&path)).is_err());
    }

    #[test]
    fn test_validation_collects_errors() {
        let mut config = AppConfig::default();
        config.environment.book_buckets = 0;
        config.logging.level = "loud".into();
        config.data.eval_sources = vec!["ticks.csv@10..5".into()];
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(config.ensure_valid().unwrap_err().is_config_error());
    }

    #[test]
    fn test_parse_window() {
        let window = parse_window("data/ticks.csv.zst@100..200").unwrap();
        assert_eq!(window.start_ns, Some(100));
        assert_eq!(window.end_ns, Some(200));
        assert!(parse_window("ticks.csv@abc..1").is_err());

        let whole = parse_window("ticks.jsonl").unwrap();
        assert_eq!(whole.start_ns, None);
    }

    #[test]
    fn test_default_toml_round_trip() {
        let toml = AppConfig::default().to_toml().unwrap();
        let parsed: AppConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.training.episodes, AppConfig::default().training.episodes);
        assert_eq!(parsed.agent.actions, AppConfig::default().agent.actions);
    }
}
