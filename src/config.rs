use crate::classification::ClassificationRule;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SmartDoorConfig {
    pub timing: TimingConfig,
    #[serde(default)]
    pub debounce: DebounceConfig,
    #[serde(default)]
    pub classification: ClassificationConfig,
    pub system: SystemConfig,
    pub simulation: SimulationConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TimingConfig {
    /// Minimum time between an action and a following unlock (0 disables)
    #[serde(default = "default_min_unlock_interval_ms")]
    pub min_unlock_interval_ms: u64,

    /// Minimum time between an action and a following lock (0 disables)
    #[serde(default = "default_min_lock_interval_ms")]
    pub min_lock_interval_ms: u64,

    /// Capture period; also bounds how long one capture + classify may take
    #[serde(default = "default_min_capture_interval_ms")]
    pub min_capture_interval_ms: u64,
}

/// Which interval gates which transition
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DebounceMode {
    /// Unlock gated by the unlock interval, lock by the lock interval
    #[default]
    PerAction,
    /// Every transition gated by the unlock interval
    Shared,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct DebounceConfig {
    #[serde(default)]
    pub mode: DebounceMode,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ClassificationConfig {
    /// Rules producing a dog detection (checked first)
    #[serde(default = "default_unlock_rules")]
    pub unlock: Vec<ClassificationRule>,

    /// Rules producing a cat detection
    #[serde(default = "default_lock_rules")]
    pub lock: Vec<ClassificationRule>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    /// Door actions buffered between decision engine and executor
    #[serde(default = "default_action_queue_capacity")]
    pub action_queue_capacity: usize,

    /// Time allowed for each task to stop during shutdown
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// Lock the door whenever it (re)connects and no action is pending
    #[serde(default = "default_lock_on_connect")]
    pub lock_on_connect: bool,
}

/// Settings for the simulated adapters driven by the binary
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Labels the simulated classifier reports, cycled one per capture
    #[serde(default = "default_simulation_labels")]
    pub labels: Vec<String>,

    #[serde(default = "default_simulation_confidence")]
    pub confidence: f32,

    #[serde(default = "default_frames_per_capture")]
    pub frames_per_capture: usize,

    #[serde(default = "default_capture_latency_ms")]
    pub capture_latency_ms: u64,

    #[serde(default = "default_actuator_latency_ms")]
    pub actuator_latency_ms: u64,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            unlock: default_unlock_rules(),
            lock: default_lock_rules(),
        }
    }
}

impl TimingConfig {
    pub fn min_unlock_interval(&self) -> Duration {
        Duration::from_millis(self.min_unlock_interval_ms)
    }

    pub fn min_lock_interval(&self) -> Duration {
        Duration::from_millis(self.min_lock_interval_ms)
    }

    pub fn min_capture_interval(&self) -> Duration {
        Duration::from_millis(self.min_capture_interval_ms)
    }
}

impl SystemConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl SmartDoorConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default(
                "timing.min_unlock_interval_ms",
                default_min_unlock_interval_ms() as i64,
            )?
            .set_default("timing.min_lock_interval_ms", default_min_lock_interval_ms() as i64)?
            .set_default(
                "timing.min_capture_interval_ms",
                default_min_capture_interval_ms() as i64,
            )?
            .set_default("debounce.mode", "per_action")?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .set_default(
                "system.action_queue_capacity",
                default_action_queue_capacity() as i64,
            )?
            .set_default("system.shutdown_timeout_ms", default_shutdown_timeout_ms() as i64)?
            .set_default("system.lock_on_connect", default_lock_on_connect())?
            .set_default("simulation.labels", default_simulation_labels())?
            .set_default(
                "simulation.confidence",
                default_simulation_confidence() as f64,
            )?
            .set_default(
                "simulation.frames_per_capture",
                default_frames_per_capture() as i64,
            )?
            .set_default("simulation.capture_latency_ms", default_capture_latency_ms() as i64)?
            .set_default(
                "simulation.actuator_latency_ms",
                default_actuator_latency_ms() as i64,
            )?
            .add_source(File::with_name(&path_str).required(false))
            // e.g. SMARTDOOR_TIMING__MIN_CAPTURE_INTERVAL_MS=500
            .add_source(
                Environment::with_prefix("SMARTDOOR")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: SmartDoorConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_rules("classification.unlock", &self.classification.unlock)?;
        validate_rules("classification.lock", &self.classification.lock)?;

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        if self.system.action_queue_capacity == 0 {
            return Err(ConfigError::Message(
                "Action queue capacity must be greater than 0".to_string(),
            ));
        }

        if self.simulation.labels.is_empty() {
            return Err(ConfigError::Message(
                "Simulation labels must not be empty".to_string(),
            ));
        }

        if self.simulation.frames_per_capture == 0 {
            return Err(ConfigError::Message(
                "Simulation frames_per_capture must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.simulation.confidence) {
            return Err(ConfigError::Message(
                "Simulation confidence must be within [0, 1]".to_string(),
            ));
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> crate::error::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn validate_rules(section: &str, rules: &[ClassificationRule]) -> Result<(), ConfigError> {
    if rules.is_empty() {
        return Err(ConfigError::Message(format!(
            "{} must contain at least one rule",
            section
        )));
    }

    for rule in rules {
        if rule.label.trim().is_empty() {
            return Err(ConfigError::Message(format!(
                "{} contains a rule with an empty label",
                section
            )));
        }
        if !(0.0..=1.0).contains(&rule.min_confidence) {
            return Err(ConfigError::Message(format!(
                "{} rule '{}' has min_confidence {} outside [0, 1]",
                section, rule.label, rule.min_confidence
            )));
        }
    }

    Ok(())
}

impl Default for SmartDoorConfig {
    fn default() -> Self {
        Self {
            timing: TimingConfig {
                min_unlock_interval_ms: default_min_unlock_interval_ms(),
                min_lock_interval_ms: default_min_lock_interval_ms(),
                min_capture_interval_ms: default_min_capture_interval_ms(),
            },
            debounce: DebounceConfig::default(),
            classification: ClassificationConfig::default(),
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
                action_queue_capacity: default_action_queue_capacity(),
                shutdown_timeout_ms: default_shutdown_timeout_ms(),
                lock_on_connect: default_lock_on_connect(),
            },
            simulation: SimulationConfig {
                labels: default_simulation_labels(),
                confidence: default_simulation_confidence(),
                frames_per_capture: default_frames_per_capture(),
                capture_latency_ms: default_capture_latency_ms(),
                actuator_latency_ms: default_actuator_latency_ms(),
            },
        }
    }
}

// Default value functions
fn default_min_unlock_interval_ms() -> u64 {
    3000
}
fn default_min_lock_interval_ms() -> u64 {
    3000
}
fn default_min_capture_interval_ms() -> u64 {
    1000
}

fn default_unlock_rules() -> Vec<ClassificationRule> {
    vec![ClassificationRule::new("dog", 0.7)]
}
fn default_lock_rules() -> Vec<ClassificationRule> {
    vec![ClassificationRule::new("cat", 0.7)]
}

fn default_event_bus_capacity() -> usize {
    100
}
fn default_action_queue_capacity() -> usize {
    8
}
fn default_shutdown_timeout_ms() -> u64 {
    5000
}
fn default_lock_on_connect() -> bool {
    true
}

fn default_simulation_labels() -> Vec<String> {
    ["none", "dog", "dog", "none", "cat", "cat"]
        .iter()
        .map(|label| label.to_string())
        .collect()
}
fn default_simulation_confidence() -> f32 {
    0.9
}
fn default_frames_per_capture() -> usize {
    1
}
fn default_capture_latency_ms() -> u64 {
    50
}
fn default_actuator_latency_ms() -> u64 {
    200
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = SmartDoorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.debounce.mode, DebounceMode::PerAction);
        assert_eq!(config.timing.min_capture_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_load_from_file() {
        let file = write_config(
            r#"
[timing]
min_unlock_interval_ms = 0
min_capture_interval_ms = 250

[debounce]
mode = "shared"

[[classification.unlock]]
label = "dog"
min_confidence = 0.8

[[classification.lock]]
label = "cat"
min_confidence = 0.6

[[classification.lock]]
label = "raccoon"
min_confidence = 0.5
"#,
        );

        let config = SmartDoorConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.timing.min_unlock_interval(), Duration::ZERO);
        assert_eq!(config.timing.min_lock_interval_ms, 3000);
        assert_eq!(config.timing.min_capture_interval_ms, 250);
        assert_eq!(config.debounce.mode, DebounceMode::Shared);
        assert_eq!(
            config.classification.unlock,
            vec![ClassificationRule::new("dog", 0.8)]
        );
        assert_eq!(config.classification.lock.len(), 2);
        assert_eq!(config.classification.lock[1].label, "raccoon");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SmartDoorConfig::load_from_file(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.classification, SmartDoorConfig::default().classification);
        assert_eq!(config.system, SmartDoorConfig::default().system);
    }

    #[test]
    fn test_negative_duration_rejected() {
        let file = write_config(
            r#"
[timing]
min_lock_interval_ms = -5
"#,
        );
        assert!(SmartDoorConfig::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SmartDoorConfig::default();

        config.classification.unlock.clear();
        assert!(config.validate().is_err());

        config.classification.unlock = vec![ClassificationRule::new("dog", 1.5)];
        assert!(config.validate().is_err());

        config.classification.unlock = vec![ClassificationRule::new("  ", 0.5)];
        assert!(config.validate().is_err());

        config.classification.unlock = vec![ClassificationRule::new("dog", 0.5)];
        assert!(config.validate().is_ok());

        config.system.action_queue_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip_of_defaults() {
        let rendered = SmartDoorConfig::default().to_toml().unwrap();
        let parsed: SmartDoorConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, SmartDoorConfig::default());
    }
}
