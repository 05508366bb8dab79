//! Configuration resolution for streamrelay.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (`<config dir>/streamrelay/settings.json`)
//! 3. Project config (`.streamrelay/settings.json`)
//! 4. Environment variables
//! 5. CLI arguments (applied by the binary, highest priority)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::audio::{AudioEncoding, AudioFormat};
use crate::error::{Error, Result};

/// Complete streamrelay configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// What a bounded queue does with an event that arrives while it is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest queued event to make room.
    #[default]
    DropOldest,
    /// Discard the incoming event.
    DropNewest,
}

impl std::str::FromStr for OverflowPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "drop_oldest" => Ok(Self::DropOldest),
            "drop_newest" => Ok(Self::DropNewest),
            other => Err(Error::Config(format!("unknown overflow policy: {other}"))),
        }
    }
}

/// Relay-specific configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub sample_rate: u32,
    pub audio_encoding: AudioEncoding,
    /// `None` keeps the queue unbounded.
    pub queue_capacity: Option<usize>,
    /// Only consulted when `queue_capacity` is set.
    pub overflow_policy: OverflowPolicy,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            audio_encoding: AudioEncoding::Linear16,
            queue_capacity: None,
            overflow_policy: OverflowPolicy::DropOldest,
        }
    }
}

impl RelayConfig {
    pub fn audio_format(&self) -> Result<AudioFormat> {
        AudioFormat::new(self.sample_rate, self.audio_encoding)
    }

    pub fn validate(&self) -> Result<()> {
        self.audio_format()?;
        if self.queue_capacity == Some(0) {
            return Err(Error::Config(
                "queue_capacity must be at least 1 (omit it for an unbounded queue)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
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

/// Configuration source priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigSource {
    Default = 0,
    Global = 1,
    Project = 2,
    Environment = 3,
    Cli = 4,
}

/// An environment override that was set but could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoredOverride {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

/// Resolved configuration plus what went into it.
///
/// Loading happens before logging is set up, so nothing is logged here;
/// callers report `layers` and `ignored` once tracing is installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedConfig {
    pub config: Config,
    /// Layers that contributed a value, lowest priority first.
    pub layers: Vec<(ConfigSource, Option<PathBuf>)>,
    pub ignored: Vec<IgnoredOverride>,
}

impl LoadedConfig {
    /// Record that a higher-priority layer (such as CLI flags) changed the config.
    pub fn record(&mut self, source: ConfigSource) {
        if !self.layers.iter().any(|(s, _)| *s == source) {
            self.layers.push((source, None));
        }
    }
}

/// Load configuration with hierarchical resolution.
///
/// The result is not validated: CLI arguments may still replace values, so
/// callers run [`RelayConfig::validate`] after the last layer is applied.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    let global = global_config_path();
    let project = project_dir.map(project_config_path);
    let mut loaded = load_layers(global.as_deref(), project.as_deref())?;
    let env = apply_env_overrides(&mut loaded.config, |key| std::env::var(key).ok());
    if env.applied > 0 {
        loaded.record(ConfigSource::Environment);
    }
    loaded.ignored = env.ignored;
    Ok(loaded)
}

/// Global settings file location, if a config directory can be determined.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("streamrelay").join("settings.json"))
}

pub fn project_config_path(dir: &Path) -> PathBuf {
    dir.join(".streamrelay").join("settings.json")
}

/// Merge the defaults with whichever of the given files exist.
///
/// Files may be partial; keys they omit keep the value from the layer below.
pub fn load_layers(global: Option<&Path>, project: Option<&Path>) -> Result<LoadedConfig> {
    let mut merged = serde_json::to_value(Config::default())?;
    let mut layers = vec![(ConfigSource::Default, None)];

    for (source, path) in [(ConfigSource::Global, global), (ConfigSource::Project, project)] {
        let Some(path) = path.filter(|p| p.exists()) else {
            continue;
        };
        merge_values(&mut merged, load_config_file(path)?);
        layers.push((source, Some(path.to_path_buf())));
    }

    let config = serde_json::from_value(merged)
        .map_err(|e| Error::Config(format!("Invalid merged configuration: {e}")))?;
    Ok(LoadedConfig {
        config,
        layers,
        ignored: Vec::new(),
    })
}

fn load_config_file(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_values(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Outcome of [`apply_env_overrides`].
#[derive(Debug, Default)]
pub struct EnvOverrides {
    pub applied: usize,
    pub ignored: Vec<IgnoredOverride>,
}

impl EnvOverrides {
    fn apply<T, E: std::fmt::Display>(
        &mut self,
        key: &'static str,
        value: String,
        parsed: std::result::Result<T, E>,
        set: impl FnOnce(T),
    ) {
        match parsed {
            Ok(v) => {
                set(v);
                self.applied += 1;
            }
            Err(e) => self.ignored.push(IgnoredOverride {
                key,
                value,
                reason: e.to_string(),
            }),
        }
    }
}

/// Apply `STREAMRELAY_*` overrides. Unparseable values are left out and
/// reported in [`EnvOverrides::ignored`].
pub fn apply_env_overrides(
    config: &mut Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> EnvOverrides {
    let mut env = EnvOverrides::default();
    let relay = &mut config.relay;

    if let Some(val) = lookup("STREAMRELAY_SAMPLE_RATE") {
        let parsed = val.parse::<u32>();
        env.apply("STREAMRELAY_SAMPLE_RATE", val, parsed, |n| relay.sample_rate = n);
    }
    if let Some(val) = lookup("STREAMRELAY_AUDIO_ENCODING") {
        let parsed = val.parse::<AudioEncoding>();
        env.apply("STREAMRELAY_AUDIO_ENCODING", val, parsed, |enc| {
            relay.audio_encoding = enc;
        });
    }
    if let Some(val) = lookup("STREAMRELAY_QUEUE_CAPACITY") {
        let parsed = if val.eq_ignore_ascii_case("unbounded") {
            Ok(None)
        } else {
            val.parse::<usize>().map(Some)
        };
        env.apply("STREAMRELAY_QUEUE_CAPACITY", val, parsed, |cap| {
            relay.queue_capacity = cap;
        });
    }
    if let Some(val) = lookup("STREAMRELAY_OVERFLOW_POLICY") {
        let parsed = val.parse::<OverflowPolicy>();
        env.apply("STREAMRELAY_OVERFLOW_POLICY", val, parsed, |policy| {
            relay.overflow_policy = policy;
        });
    }
    if let Some(val) = lookup("STREAMRELAY_LOG_LEVEL") {
        config.logging.level = val;
        env.applied += 1;
    }
    env
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn write_settings(dir: &Path, body: &str) -> PathBuf {
        let path = project_config_path(dir);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn default_config_is_unbounded_16k_linear16() {
        let config = Config::default();
        assert_eq!(config.relay.sample_rate, 16_000);
        assert_eq!(config.relay.audio_encoding, AudioEncoding::Linear16);
        assert_eq!(config.relay.queue_capacity, None);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn missing_files_yield_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let loaded = load_layers(Some(&tmp.path().join("nope.json")), None).unwrap();
        assert_eq!(loaded.config, Config::default());
        assert_eq!(loaded.layers, vec![(ConfigSource::Default, None)]);
    }

    #[test]
    fn project_layer_overrides_only_keys_it_sets() {
        let global_dir = tempfile::tempdir().unwrap();
        let project_dir = tempfile::tempdir().unwrap();
        let global = write_settings(
            global_dir.path(),
            r#"{"relay": {"sample_rate": 8000, "audio_encoding": "mulaw"}, "logging": {"json": true}}"#,
        );
        let project = write_settings(project_dir.path(), r#"{"relay": {"sample_rate": 24000}}"#);

        let loaded = load_layers(Some(&global), Some(&project)).unwrap();
        assert_eq!(loaded.config.relay.sample_rate, 24_000);
        assert_eq!(loaded.config.relay.audio_encoding, AudioEncoding::Mulaw);
        assert!(loaded.config.logging.json);
        let sources: Vec<_> = loaded.layers.iter().map(|(s, _)| *s).collect();
        assert_eq!(
            sources,
            [ConfigSource::Default, ConfigSource::Global, ConfigSource::Project]
        );
        assert_eq!(loaded.layers[2].1.as_deref(), Some(project.as_path()));
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_settings(tmp.path(), "{not json");
        let err = load_layers(None, Some(&path)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn env_overrides_apply_and_bad_values_are_ignored() {
        let vars: HashMap<&str, &str> = [
            ("STREAMRELAY_SAMPLE_RATE", "not-a-number"),
            ("STREAMRELAY_AUDIO_ENCODING", "mulaw"),
            ("STREAMRELAY_QUEUE_CAPACITY", "256"),
            ("STREAMRELAY_OVERFLOW_POLICY", "drop-newest"),
            ("STREAMRELAY_LOG_LEVEL", "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        let env = apply_env_overrides(&mut config, |k| vars.get(k).map(ToString::to_string));

        assert_eq!(env.applied, 4);
        assert_eq!(env.ignored.len(), 1);
        assert_eq!(env.ignored[0].key, "STREAMRELAY_SAMPLE_RATE");
        assert_eq!(env.ignored[0].value, "not-a-number");
        assert_eq!(config.relay.sample_rate, 16_000);
        assert_eq!(config.relay.audio_encoding, AudioEncoding::Mulaw);
        assert_eq!(config.relay.queue_capacity, Some(256));
        assert_eq!(config.relay.overflow_policy, OverflowPolicy::DropNewest);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn unbounded_capacity_override_clears_bound() {
        let mut config = Config::default();
        config.relay.queue_capacity = Some(8);
        let env = apply_env_overrides(&mut config, |k| {
            (k == "STREAMRELAY_QUEUE_CAPACITY").then(|| "Unbounded".to_string())
        });
        assert_eq!(config.relay.queue_capacity, None);
        assert!(env.ignored.is_empty());
    }

    #[test]
    fn invalid_layer_value_loads_and_is_left_to_validation() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_settings(tmp.path(), r#"{"relay": {"sample_rate": 0}}"#);

        let mut loaded = load_layers(None, Some(&path)).unwrap();
        assert!(loaded.config.relay.validate().is_err());

        loaded.config.relay.sample_rate = 8000;
        loaded.record(ConfigSource::Cli);
        loaded.record(ConfigSource::Cli);
        assert!(loaded.config.relay.validate().is_ok());
        assert_eq!(loaded.layers.last(), Some(&(ConfigSource::Cli, None)));
        assert_eq!(loaded.layers.len(), 3);
    }

    #[test]
    fn validate_rejects_zero_rate_and_zero_capacity() {
        let mut relay = RelayConfig {
            sample_rate: 0,
            ..RelayConfig::default()
        };
        assert!(relay.validate().is_err());

        relay.sample_rate = 8000;
        relay.queue_capacity = Some(0);
        assert!(relay.validate().is_err());

        relay.queue_capacity = Some(1);
        assert!(relay.validate().is_ok());
    }
}
