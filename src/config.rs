//! # Configuration Management
//!
//! Centralized configuration for the satellite's radio stack.
//!
//! The flight configuration is a JSON document holding the satellite's
//! identity, the shared command secret, radio parameters, protocol timing and
//! logging options. Values can be validated as a whole or key by key, and
//! updated at runtime either temporarily (RAM only) or persistently (written
//! back to the backing file).
//!
//! ## Configuration Sources
//! - JSON files via [`SatelliteConfig::from_file`]
//! - JSON strings via [`SatelliteConfig::from_json`]
//! - Direct instantiation with defaults and overrides
//!
//! ## Schema
//! Updatable keys and their constraints:
//!
//! | key | section | constraint |
//! |---|---|---|
//! | `cubesat_name` | root | 1-10 characters |
//! | `super_secret_code` | root | 1-24 characters |
//! | `license` | radio | string |
//! | `modulation` | radio | `LoRa` or `FSK` |
//! | `start_time` | radio | 0-80000 |
//! | `transmit_frequency` | radio | 435-438 or 915 MHz |
//! | `broadcast_address`, `node_address` | radio.fsk | 0-255 |
//! | `modulation_type` | radio.fsk | 0-1 |
//! | `ack_delay` | radio.lora | 0.0-2.0 |
//! | `coding_rate` | radio.lora | 4-8 |
//! | `cyclic_redundancy_check`, `max_output` | radio.lora | bool |
//! | `spreading_factor` | radio.lora | 6-12 |
//! | `transmit_power` | radio.lora | 5-23 |

use crate::error::{ProtocolError, Result};
use crate::transport::Modulation;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn, Level};

/// Delay between packets of a multi-packet message
pub const DEFAULT_SEND_DELAY: Duration = Duration::from_millis(200);

/// Listen window when the caller gives none
pub const DEFAULT_LISTEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause before acknowledging a command, letting the ground station switch to receive
pub const DEFAULT_ACK_DELAY: Duration = Duration::from_millis(200);

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SatelliteConfig {
    /// Name every command envelope must address
    pub cubesat_name: String,

    /// Shared secret every command envelope must carry
    pub super_secret_code: String,

    /// Responses for the `send_joke` command
    #[serde(default)]
    pub jokes: Vec<String>,

    /// Radio configuration
    pub radio: RadioConfig,

    /// Packet framer timing
    #[serde(default)]
    pub framer: FramerConfig,

    /// Command protocol timing
    #[serde(default)]
    pub command: CommandConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// File persistent updates are written to
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl Default for SatelliteConfig {
    fn default() -> Self {
        Self {
            cubesat_name: String::from("CubeSat"),
            super_secret_code: String::new(),
            jokes: Vec::new(),
            radio: RadioConfig::default(),
            framer: FramerConfig::default(),
            command: CommandConfig::default(),
            logging: LoggingConfig::default(),
            path: None,
        }
    }
}

impl SatelliteConfig {
    /// Load configuration from a JSON file. Persistent updates are written back to it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(&path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        let mut config = Self::from_json(&contents)?;
        config.path = Some(path.as_ref().to_path_buf());
        Ok(config)
    }

    /// Load configuration from a JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse JSON: {e}")))
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        serde_json::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("{}"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Backing file, if the configuration was loaded from one
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Attach a backing file for persistent updates
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        match serde_json::to_value(self) {
            Ok(document) => {
                for field in SCHEMA {
                    let Some(value) = lookup(&document, field) else {
                        continue;
                    };
                    if let Err(reason) = field.rule.check(value) {
                        errors.push(format!("Invalid value for '{}': {reason}", field.key));
                    }
                }
            }
            Err(e) => errors.push(format!("Failed to inspect configuration: {e}")),
        }

        if self.radio.license.is_empty() {
            errors.push("Radio license is empty - transmissions are disabled".to_string());
        }

        errors.extend(self.framer.validate());
        errors.extend(self.command.validate());
        errors.extend(self.logging.validate());

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }

    /// Check a candidate value for an updatable key without applying it
    pub fn validate_key(&self, key: &str, value: &JsonValue) -> Result<()> {
        let field = schema_field(key)?;
        field
            .rule
            .check(value)
            .map_err(|reason| ProtocolError::ValidationError {
                key: key.to_string(),
                reason,
            })
    }

    /// Update one configuration value.
    ///
    /// The value is validated against the key's schema first. A temporary
    /// update changes only the in-memory configuration; otherwise the backing
    /// file is rewritten with the new value at the key's nesting level before
    /// memory is updated.
    pub fn update_config(&mut self, key: &str, value: JsonValue, temporary: bool) -> Result<()> {
        self.validate_key(key, &value)?;
        let section = schema_field(key)?.section;

        let mut document = serde_json::to_value(&*self)?;
        set_key(&mut document, section, key, value.clone())?;
        let mut updated: Self = serde_json::from_value(document)?;

        if !temporary {
            match &self.path {
                Some(path) => persist_key(path, section, key, value)?,
                None => warn!(key, "No backing config file, update kept in memory only"),
            }
        }

        updated.path = self.path.take();
        *self = updated;
        info!(key, temporary, "Configuration updated");
        Ok(())
    }
}

/// Radio configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RadioConfig {
    /// Amateur radio license (callsign); transmission is disabled while empty
    #[serde(default)]
    pub license: String,

    pub modulation: Modulation,

    /// Transmit frequency in MHz
    pub transmit_frequency: f64,

    /// Seconds after boot before the radio may transmit
    #[serde(default)]
    pub start_time: u32,

    #[serde(default)]
    pub fsk: FskConfig,

    #[serde(default)]
    pub lora: LoraConfig,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            license: String::new(),
            modulation: Modulation::LoRa,
            transmit_frequency: 437.4,
            start_time: 80,
            fsk: FskConfig::default(),
            lora: LoraConfig::default(),
        }
    }
}

/// FSK-specific radio settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FskConfig {
    pub broadcast_address: u8,
    pub node_address: u8,
    pub modulation_type: u8,
}

impl Default for FskConfig {
    fn default() -> Self {
        Self {
            broadcast_address: 255,
            node_address: 1,
            modulation_type: 0,
        }
    }
}

/// LoRa-specific radio settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoraConfig {
    /// Acknowledgement delay in seconds
    pub ack_delay: f64,
    pub coding_rate: u8,
    pub cyclic_redundancy_check: bool,
    #[serde(default)]
    pub max_output: bool,
    pub spreading_factor: u8,
    /// Transmit power in dBm
    pub transmit_power: u8,
}

impl Default for LoraConfig {
    fn default() -> Self {
        Self {
            ack_delay: 0.2,
            coding_rate: 8,
            cyclic_redundancy_check: true,
            max_output: true,
            spreading_factor: 8,
            transmit_power: 23,
        }
    }
}

/// Packet framer timing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FramerConfig {
    /// Delay after each packet of a multi-packet message
    #[serde(with = "duration_serde")]
    pub send_delay: Duration,

    /// Listen window when the caller passes none
    #[serde(with = "duration_serde")]
    pub listen_timeout: Duration,

    /// Sleep after an empty receive; zero busy-polls the radio
    #[serde(with = "duration_serde")]
    pub poll_interval: Duration,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            send_delay: DEFAULT_SEND_DELAY,
            listen_timeout: DEFAULT_LISTEN_TIMEOUT,
            poll_interval: Duration::ZERO,
        }
    }
}

impl FramerConfig {
    /// No inter-packet pacing, for links that need no receiver re-arm time
    pub fn immediate() -> Self {
        Self {
            send_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Validate framer configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.send_delay.as_secs() > 5 {
            errors.push("Send delay too long (maximum: 5s)".to_string());
        }

        if self.listen_timeout.is_zero() {
            errors.push("Listen timeout must be greater than 0".to_string());
        } else if self.listen_timeout.as_secs() > 3600 {
            errors.push("Listen timeout too long (maximum: 1 hour)".to_string());
        }

        if !self.poll_interval.is_zero() && self.poll_interval >= self.listen_timeout {
            errors.push("Poll interval must be shorter than the listen timeout".to_string());
        }

        errors
    }
}

/// Command protocol timing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommandConfig {
    /// Pause before the ACK so the ground station can switch to receive
    #[serde(with = "duration_serde")]
    pub ack_delay: Duration,

    /// Listen window for one command cycle
    #[serde(with = "duration_serde")]
    pub listen_timeout: Duration,

    /// Persist `change_radio_modulation` updates to the config file
    #[serde(default = "default_true")]
    pub persist_updates: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            ack_delay: DEFAULT_ACK_DELAY,
            listen_timeout: DEFAULT_LISTEN_TIMEOUT,
            persist_updates: true,
        }
    }
}

impl CommandConfig {
    /// Validate command configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.ack_delay.as_secs() > 5 {
            errors.push("ACK delay too long (maximum: 5s)".to_string());
        }

        if self.listen_timeout.is_zero() {
            errors.push("Command listen timeout must be greater than 0".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("cubesat-link"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Radio,
    Fsk,
    Lora,
}

impl Section {
    fn path(self) -> &'static [&'static str] {
        match self {
            Section::Root => &[],
            Section::Radio => &["radio"],
            Section::Fsk => &["radio", "fsk"],
            Section::Lora => &["radio", "lora"],
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Rule {
    Text { min_len: usize, max_len: usize },
    Int { min: i64, max: i64 },
    Float { min: f64, max: f64 },
    Bool,
    OneOf(&'static [&'static str]),
    Frequency,
}

impl Rule {
    fn check(&self, value: &JsonValue) -> std::result::Result<(), String> {
        match *self {
            Rule::Text { min_len, max_len } => {
                let text = value.as_str().ok_or("expected a string")?;
                let len = text.chars().count();
                if len < min_len || len > max_len {
                    return Err(format!(
                        "length {len} outside allowed range {min_len}-{max_len}"
                    ));
                }
            }
            Rule::Int { min, max } => {
                let number = value.as_i64().ok_or("expected an integer")?;
                if number < min || number > max {
                    return Err(format!("{number} outside allowed range {min}-{max}"));
                }
            }
            Rule::Float { min, max } => {
                let number = value.as_f64().ok_or("expected a number")?;
                if number < min || number > max {
                    return Err(format!("{number} outside allowed range {min}-{max}"));
                }
            }
            Rule::Bool => {
                if !value.is_boolean() {
                    return Err("expected a boolean".to_string());
                }
            }
            Rule::OneOf(allowed) => {
                let text = value.as_str().ok_or("expected a string")?;
                if !allowed.contains(&text) {
                    return Err(format!(
                        "'{text}' is not one of {}",
                        allowed.join(", ")
                    ));
                }
            }
            Rule::Frequency => {
                let mhz = value.as_f64().ok_or("expected a number")?;
                if !((435.0..=438.0).contains(&mhz) || mhz == 915.0) {
                    return Err(format!("{mhz} MHz outside the 435-438 and 915 MHz bands"));
                }
            }
        }
        Ok(())
    }
}

struct SchemaField {
    key: &'static str,
    section: Section,
    rule: Rule,
}

/// Keys `update_config` accepts. Flight-computer settings outside the radio
/// stack (power thresholds, detumbling, sleep and reboot timing) are not
/// part of this configuration.
const SCHEMA: &[SchemaField] = &[
    SchemaField {
        key: "cubesat_name",
        section: Section::Root,
        rule: Rule::Text {
            min_len: 1,
            max_len: 10,
        },
    },
    SchemaField {
        key: "super_secret_code",
        section: Section::Root,
        rule: Rule::Text {
            min_len: 1,
            max_len: 24,
        },
    },
    SchemaField {
        key: "license",
        section: Section::Radio,
        rule: Rule::Text {
            min_len: 0,
            max_len: usize::MAX,
        },
    },
    SchemaField {
        key: "modulation",
        section: Section::Radio,
        rule: Rule::OneOf(&["LoRa", "FSK"]),
    },
    SchemaField {
        key: "start_time",
        section: Section::Radio,
        rule: Rule::Int { min: 0, max: 80000 },
    },
    SchemaField {
        key: "transmit_frequency",
        section: Section::Radio,
        rule: Rule::Frequency,
    },
    SchemaField {
        key: "broadcast_address",
        section: Section::Fsk,
        rule: Rule::Int { min: 0, max: 255 },
    },
    SchemaField {
        key: "node_address",
        section: Section::Fsk,
        rule: Rule::Int { min: 0, max: 255 },
    },
    SchemaField {
        key: "modulation_type",
        section: Section::Fsk,
        rule: Rule::Int { min: 0, max: 1 },
    },
    SchemaField {
        key: "ack_delay",
        section: Section::Lora,
        rule: Rule::Float { min: 0.0, max: 2.0 },
    },
    SchemaField {
        key: "coding_rate",
        section: Section::Lora,
        rule: Rule::Int { min: 4, max: 8 },
    },
    SchemaField {
        key: "cyclic_redundancy_check",
        section: Section::Lora,
        rule: Rule::Bool,
    },
    SchemaField {
        key: "max_output",
        section: Section::Lora,
        rule: Rule::Bool,
    },
    SchemaField {
        key: "spreading_factor",
        section: Section::Lora,
        rule: Rule::Int { min: 6, max: 12 },
    },
    SchemaField {
        key: "transmit_power",
        section: Section::Lora,
        rule: Rule::Int { min: 5, max: 23 },
    },
];

fn schema_field(key: &str) -> Result<&'static SchemaField> {
    SCHEMA
        .iter()
        .find(|field| field.key == key)
        .ok_or_else(|| ProtocolError::ConfigError(format!("Unknown configuration key: {key}")))
}

fn lookup<'a>(document: &'a JsonValue, field: &SchemaField) -> Option<&'a JsonValue> {
    let mut node = document;
    for part in field.section.path() {
        node = node.get(*part)?;
    }
    node.get(field.key)
}

fn set_key(document: &mut JsonValue, section: Section, key: &str, value: JsonValue) -> Result<()> {
    let mut node = document;
    for part in section.path() {
        node = node
            .get_mut(*part)
            .ok_or_else(|| ProtocolError::ConfigError(format!("Missing config section: {part}")))?;
    }
    node.as_object_mut()
        .ok_or_else(|| {
            ProtocolError::ConfigError(format!("Config section for {key} is not an object"))
        })?
        .insert(key.to_string(), value);
    Ok(())
}

fn persist_key(path: &Path, section: Section, key: &str, value: JsonValue) -> Result<()> {
    let contents = fs::read_to_string(path)
        .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;
    let mut document: JsonValue = serde_json::from_str(&contents)
        .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse JSON: {e}")))?;

    set_key(&mut document, section, key, value)?;

    let content = serde_json::to_string_pretty(&document)
        .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;
    fs::write(path, content)
        .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;
    Ok(())
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
