//! Service Configuration Module
//!
//! Provides configuration loading and management for pipeline services.
//! Supports loading from TOML files with environment-specific overrides.

use crate::service;
use anyhow::{bail, Context, Result};
use config_rs::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default location of the base configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/pipeline.toml";

/// Prefix of environment overrides, e.g. `PIPELINE__CANDLES__EMIT_MODE=current`
pub const ENV_PREFIX: &str = "PIPELINE";

/// Main pipeline configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub bus: BusConfig,
    pub trades: TradesConfig,
    pub candles: CandlesConfig,
    pub technical_indicators: IndicatorsConfig,
    pub to_feature_store: FeatureStoreConfig,
}

/// Event log settings shared by every stage
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct BusConfig {
    pub data_dir: PathBuf,
    pub partitions: u32,
    pub poll_interval_ms: u64,
    pub max_poll_records: usize,
}

/// Mock trade producer settings
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct TradesConfig {
    pub output_topic: String,
    pub pairs: Vec<String>,
    pub trades_per_second: u32,
    pub start_price: f64,
    /// Fixed seed for reproducible runs
    pub seed: Option<u64>,
}

/// Whether the candle stage publishes partial windows
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmitMode {
    /// Publish the updated candle after every trade
    Current,
    /// Publish a candle once, when its window is sealed
    #[default]
    Final,
}

/// Candle aggregation settings
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CandlesConfig {
    pub input_topic: String,
    pub output_topic: String,
    pub consumer_group: String,
    pub candle_interval_seconds: u64,
    pub emit_mode: EmitMode,
    pub state_dir: PathBuf,
}

/// Technical indicator settings
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct IndicatorsConfig {
    pub input_topic: String,
    pub output_topic: String,
    pub consumer_group: String,
    /// Only candles of this window size are processed
    pub candle_interval_seconds: u64,
    pub max_candles_in_state: usize,
    pub state_dir: PathBuf,
}

/// Feature store sink settings
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct FeatureStoreConfig {
    pub input_topic: String,
    pub consumer_group: String,
    pub output_path: PathBuf,
    pub batch_size: usize,
    pub idle_flush_ms: u64,
    pub max_retry_after_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(service::bus::DATA_DIR),
            partitions: service::bus::PARTITIONS,
            poll_interval_ms: service::bus::POLL_INTERVAL_MS,
            max_poll_records: service::bus::MAX_POLL_RECORDS,
        }
    }
}

impl Default for TradesConfig {
    fn default() -> Self {
        Self {
            output_topic: service::trades::OUTPUT_TOPIC.to_string(),
            pairs: vec!["BTC/USD".to_string(), "ETH/USD".to_string()],
            trades_per_second: service::trades::TRADES_PER_SECOND,
            start_price: service::trades::START_PRICE,
            seed: None,
        }
    }
}

impl Default for CandlesConfig {
    fn default() -> Self {
        Self {
            input_topic: service::candles::INPUT_TOPIC.to_string(),
            output_topic: service::candles::OUTPUT_TOPIC.to_string(),
            consumer_group: service::candles::CONSUMER_GROUP.to_string(),
            candle_interval_seconds: service::candles::CANDLE_INTERVAL_SECONDS,
            emit_mode: EmitMode::default(),
            state_dir: PathBuf::from(service::candles::STATE_DIR),
        }
    }
}

impl Default for IndicatorsConfig {
    fn default() -> Self {
        Self {
            input_topic: service::technical_indicators::INPUT_TOPIC.to_string(),
            output_topic: service::technical_indicators::OUTPUT_TOPIC.to_string(),
            consumer_group: service::technical_indicators::CONSUMER_GROUP.to_string(),
            candle_interval_seconds: service::candles::CANDLE_INTERVAL_SECONDS,
            max_candles_in_state: service::technical_indicators::MAX_CANDLES_IN_STATE,
            state_dir: PathBuf::from(service::technical_indicators::STATE_DIR),
        }
    }
}

impl Default for FeatureStoreConfig {
    fn default() -> Self {
        Self {
            input_topic: service::to_feature_store::INPUT_TOPIC.to_string(),
            consumer_group: service::to_feature_store::CONSUMER_GROUP.to_string(),
            output_path: PathBuf::from(service::to_feature_store::OUTPUT_PATH),
            batch_size: service::to_feature_store::BATCH_SIZE,
            idle_flush_ms: service::to_feature_store::IDLE_FLUSH_MS,
            max_retry_after_ms: service::to_feature_store::MAX_RETRY_AFTER_MS,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from files with environment overrides.
    ///
    /// An explicit `base_path` must exist; the default path is optional so a
    /// service can start on built-in defaults.
    pub fn load(base_path: Option<&Path>, environment: Option<&str>) -> Result<Self> {
        let (base, required) = match base_path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };

        let mut builder = Config::builder().add_source(File::from(base.as_path()).required(required));

        // Add environment-specific overrides if specified
        if let Some(env) = environment {
            let env_file = base
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("environments")
                .join(format!("{}.toml", env));

            if env_file.exists() {
                info!("Loading environment config: {:?}", env_file);
                builder = builder.add_source(File::from(env_file));
            } else {
                warn!("Environment config not found: {:?}", env_file);
            }
        }

        // Override with environment variables (PIPELINE__ prefix)
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("trades.pairs")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let mut config: PipelineConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.expand_env_vars()?;
        Ok(config)
    }

    /// Expand environment variables in path values
    pub fn expand_env_vars(&mut self) -> Result<()> {
        self.bus.data_dir = expand_path(&self.bus.data_dir)?;
        self.candles.state_dir = expand_path(&self.candles.state_dir)?;
        self.technical_indicators.state_dir = expand_path(&self.technical_indicators.state_dir)?;
        self.to_feature_store.output_path = expand_path(&self.to_feature_store.output_path)?;
        Ok(())
    }

    /// Reject values no service can run with
    pub fn validate(&self) -> Result<()> {
        if self.bus.partitions == 0 {
            bail!("bus.partitions must be at least 1");
        }
        if self.bus.max_poll_records == 0 {
            bail!("bus.max_poll_records must be at least 1");
        }
        if self.trades.pairs.is_empty() {
            bail!("trades.pairs cannot be empty");
        }
        if self.trades.trades_per_second == 0 {
            bail!("trades.trades_per_second must be at least 1");
        }
        if self.candles.candle_interval_seconds == 0 {
            bail!("candles.candle_interval_seconds must be positive");
        }
        if self.technical_indicators.candle_interval_seconds == 0 {
            bail!("technical_indicators.candle_interval_seconds must be positive");
        }
        if self.technical_indicators.max_candles_in_state == 0 {
            bail!("technical_indicators.max_candles_in_state must be at least 1");
        }
        if self.to_feature_store.batch_size == 0 {
            bail!("to_feature_store.batch_size must be at least 1");
        }
        if let Some((candles, indicators)) = self.interval_mismatch() {
            warn!(
                "candles.candle_interval_seconds = {} but technical_indicators expects {}; \
                 the indicator stage will skip every candle",
                candles, indicators
            );
        }
        Ok(())
    }

    /// Candle and indicator intervals, when they disagree
    pub fn interval_mismatch(&self) -> Option<(u64, u64)> {
        let candles = self.candles.candle_interval_seconds;
        let indicators = self.technical_indicators.candle_interval_seconds;
        (candles != indicators).then_some((candles, indicators))
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw)
        .with_context(|| format!("Failed to expand path {:?}", path))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Load the layered configuration and refuse it if it does not validate
pub fn load_config(path: Option<&Path>, environment: Option<&str>) -> Result<PipelineConfig> {
    let config = PipelineConfig::load(path, environment)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_base_config() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("pipeline.toml");

        let config_content = r#"
[bus]
data_dir = "/tmp/candlestream-test/bus"
partitions = 2

[candles]
candle_interval_seconds = 15
emit_mode = "current"

[technical_indicators]
candle_interval_seconds = 15
max_candles_in_state = 64
"#;

        fs::write(&config_path, config_content).unwrap();

        let config = PipelineConfig::load(Some(&config_path), None).unwrap();

        assert_eq!(config.bus.data_dir, PathBuf::from("/tmp/candlestream-test/bus"));
        assert_eq!(config.bus.partitions, 2);
        assert_eq!(config.candles.candle_interval_seconds, 15);
        assert_eq!(config.candles.emit_mode, EmitMode::Current);
        assert_eq!(config.technical_indicators.max_candles_in_state, 64);

        // Unspecified sections fall back to defaults
        assert_eq!(config.candles.output_topic, "candles");
        assert_eq!(config.to_feature_store.batch_size, service::to_feature_store::BATCH_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_interval_mismatch_is_reported() {
        let mut config = PipelineConfig::default();
        assert_eq!(config.interval_mismatch(), None);

        config.candles.candle_interval_seconds = 300;
        assert_eq!(config.interval_mismatch(), Some((300, 60)));
        // Legal, only warned about
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config_refuses_invalid_values() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("pipeline.toml");
        fs::write(&config_path, "[to_feature_store]\nbatch_size = 0\n").unwrap();

        let err = load_config(Some(&config_path), None).unwrap_err();
        assert!(err.to_string().contains("batch_size"));

        fs::write(&config_path, "[to_feature_store]\nbatch_size = 5\n").unwrap();
        let config = load_config(Some(&config_path), None).unwrap();
        assert_eq!(config.to_feature_store.batch_size, 5);
    }

    #[test]
    fn test_environment_file_override() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("pipeline.toml");
        fs::write(&config_path, "[candles]\ncandle_interval_seconds = 60\n").unwrap();

        fs::create_dir_all(dir.path().join("environments")).unwrap();
        fs::write(
            dir.path().join("environments").join("staging.toml"),
            "[candles]\ncandle_interval_seconds = 300\n",
        )
        .unwrap();

        let config = PipelineConfig::load(Some(&config_path), Some("staging")).unwrap();
        assert_eq!(config.candles.candle_interval_seconds, 300);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(PipelineConfig::load(Some(&missing), None).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = PipelineConfig::default();
        assert!(config.validate().is_ok());

        config.candles.candle_interval_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.bus.partitions = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.to_feature_store.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_emit_mode_serde_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: EmitMode,
        }
        let w: Wrapper = toml::from_str("mode = \"final\"").unwrap();
        assert_eq!(w.mode, EmitMode::Final);
        let w: Wrapper = toml::from_str("mode = \"current\"").unwrap();
        assert_eq!(w.mode, EmitMode::Current);
    }
}
