//! Instrument configuration using Figment
//!
//! Configuration is loaded from:
//! 1. `config/instruments.toml` (or any path given to [`Settings::load_from`])
//! 2. Environment variables prefixed with `LABCTL_`, nested keys separated by `__`
//!
//! # Environment Variable Overrides
//!
//! ```text
//! LABCTL_APPLICATION__LOG_LEVEL=debug
//! LABCTL_APPLICATION__NAME="Bench 3"
//! ```
//!
//! # Example
//!
//! ```no_run
//! use lab_instruments::config::Settings;
//!
//! let settings = Settings::load()?;
//! for instrument in settings.enabled_instruments() {
//!     println!("{} -> {} ({})", instrument.id, instrument.resource, instrument.driver);
//! }
//! # Ok::<(), lab_instruments::config::ConfigError>(())
//! ```

use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::drivers::DriverKind;
use crate::hardware::{Endpoint, SessionConfig};

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/instruments.toml";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration load error: {0}")]
    LoadError(#[from] figment::Error),
    #[error("Configuration validation error: {0}")]
    ValidationError(String),
    #[error("Configuration serialization error: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Application settings
    pub application: ApplicationConfig,
    /// Instrument definitions
    #[serde(default)]
    pub instruments: Vec<InstrumentDefinition>,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// One instrument on the bench.
///
/// The optional session fields override the driver's own defaults; anything left out keeps the
/// value from the driver's dialect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentDefinition {
    /// Unique instrument identifier
    pub id: String,
    /// Driver that talks to it
    pub driver: DriverKind,
    /// Endpoint address, e.g. "GPIB0::22::INSTR" or "ASRL/dev/ttyUSB0::INSTR"
    pub resource: String,
    /// Whether this instrument is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Read and handshake timeout in milliseconds
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Pause between a query's write and its read, in milliseconds
    #[serde(default)]
    pub query_delay_ms: Option<u64>,
    /// Log every command at info level
    #[serde(default)]
    pub echo: Option<bool>,
    /// Serial line speed; serial endpoints only
    #[serde(default)]
    pub baud_rate: Option<u32>,
    /// Appended to every command
    #[serde(default)]
    pub write_terminator: Option<String>,
    /// Marks the end of a reply
    #[serde(default)]
    pub read_terminator: Option<String>,
    /// Channel the network analyzer driver addresses
    #[serde(default)]
    pub analyzer_channel: Option<u8>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_enabled() -> bool {
    true
}

impl InstrumentDefinition {
    /// Session parameters: the driver's defaults with this definition's overrides applied.
    pub fn session_config(&self) -> SessionConfig {
        let mut config = self.driver.session_config();
        if let Some(ms) = self.timeout_ms {
            config = config.with_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.query_delay_ms {
            config = config.with_query_delay(Duration::from_millis(ms));
        }
        if let Some(echo) = self.echo {
            config = config.with_echo(echo);
        }
        if let Some(baud) = self.baud_rate {
            config = config.with_baud_rate(baud);
        }
        if let Some(terminator) = &self.write_terminator {
            config = config.with_write_terminator(terminator.clone());
        }
        if let Some(terminator) = &self.read_terminator {
            config = config.with_read_terminator(terminator.clone());
        }
        config
    }

    /// Whether the resource names a serial port.
    pub fn is_serial(&self) -> bool {
        matches!(Endpoint::parse(&self.resource), Endpoint::Serial(_))
    }
}

impl Settings {
    /// Load configuration from `config/instruments.toml` and environment variables.
    ///
    /// # Errors
    ///
    /// Returns a ConfigError if the file cannot be loaded or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// Precedence, highest first: `LABCTL_` environment variables, then the file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("LABCTL_").split("__"))
            .extract()
            .map_err(ConfigError::LoadError)?;

        settings.validate()?;
        Ok(settings)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let settings: Self = Figment::new()
            .merge(Toml::string(text))
            .extract()
            .map_err(ConfigError::LoadError)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration after loading
    ///
    /// Checks:
    /// - Log level is valid (trace, debug, info, warn, error)
    /// - Instrument IDs are unique
    /// - Every resource is non-empty
    /// - Timeouts are non-zero
    /// - Baud rates only appear on serial instruments
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        let mut ids = std::collections::HashSet::new();
        for instrument in &self.instruments {
            if !ids.insert(&instrument.id) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate instrument ID: '{}'",
                    instrument.id
                )));
            }
            Self::validate_instrument(instrument)?;
        }

        Ok(())
    }

    fn validate_instrument(instrument: &InstrumentDefinition) -> Result<(), ConfigError> {
        if instrument.id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Instrument 'id' cannot be empty".to_string(),
            ));
        }
        if instrument.resource.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "Instrument '{}': 'resource' cannot be empty",
                instrument.id
            )));
        }
        if instrument.timeout_ms == Some(0) {
            return Err(ConfigError::ValidationError(format!(
                "Instrument '{}': 'timeout_ms' must be > 0",
                instrument.id
            )));
        }
        if let Some(baud) = instrument.baud_rate {
            if baud == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "Instrument '{}': 'baud_rate' must be > 0",
                    instrument.id
                )));
            }
            if !instrument.is_serial() {
                return Err(ConfigError::ValidationError(format!(
                    "Instrument '{}': 'baud_rate' only applies to serial resources, not '{}'",
                    instrument.id, instrument.resource
                )));
            }
        }
        if instrument.driver == DriverKind::Dac && !instrument.is_serial() {
            return Err(ConfigError::ValidationError(format!(
                "DAC '{}' needs a serial resource, got '{}'",
                instrument.id, instrument.resource
            )));
        }
        if instrument.analyzer_channel.is_some() && instrument.driver != DriverKind::Ms464xb {
            return Err(ConfigError::ValidationError(format!(
                "Instrument '{}': 'analyzer_channel' only applies to the ms464xb driver",
                instrument.id
            )));
        }
        Ok(())
    }

    /// Get all enabled instruments
    pub fn enabled_instruments(&self) -> Vec<&InstrumentDefinition> {
        self.instruments
            .iter()
            .filter(|inst| inst.enabled)
            .collect()
    }

    /// Look up an instrument by id, enabled or not.
    pub fn find(&self, id: &str) -> Option<&InstrumentDefinition> {
        self.instruments.iter().find(|inst| inst.id == id)
    }

    /// Render back to TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BENCH: &str = r#"
[application]
name = "Bench 3"
log_level = "debug"

[[instruments]]
id = "dmm"
driver = "hp34401a"
resource = "GPIB0::22::INSTR"

[[instruments]]
id = "meter"
driver = "fluke45"
resource = "ASRL/dev/ttyUSB1::INSTR"
baud_rate = 19200
enabled = false

[[instruments]]
id = "vna"
driver = "ms464xb"
resource = "TCPIP0::10.0.0.7::INSTR"
timeout_ms = 30000
analyzer_channel = 2
"#;

    fn definition(id: &str, driver: DriverKind, resource: &str) -> InstrumentDefinition {
        InstrumentDefinition {
            id: id.to_string(),
            driver,
            resource: resource.to_string(),
            enabled: true,
            timeout_ms: None,
            query_delay_ms: None,
            echo: None,
            baud_rate: None,
            write_terminator: None,
            read_terminator: None,
            analyzer_channel: None,
        }
    }

    fn settings(instruments: Vec<InstrumentDefinition>) -> Settings {
        Settings {
            application: ApplicationConfig {
                name: "test".to_string(),
                log_level: "info".to_string(),
            },
            instruments,
        }
    }

    #[test]
    fn parses_bench_file() {
        let settings = Settings::from_toml_str(BENCH).unwrap();
        assert_eq!(settings.application.log_level, "debug");
        assert_eq!(settings.instruments.len(), 3);
        let ids: Vec<_> = settings
            .enabled_instruments()
            .iter()
            .map(|i| i.id.as_str())
            .collect();
        assert_eq!(ids, vec!["dmm", "vna"]);
        assert_eq!(settings.find("meter").unwrap().driver, DriverKind::Fluke45);
        assert!(settings.find("scope").is_none());
    }

    #[test]
    fn overrides_apply_on_top_of_driver_defaults() {
        let settings = Settings::from_toml_str(BENCH).unwrap();
        let vna = settings.find("vna").unwrap().session_config();
        assert_eq!(vna.timeout, Duration::from_millis(30_000));
        assert_eq!(vna.read_terminator, "\r\n");

        let meter = settings.find("meter").unwrap().session_config();
        assert_eq!(meter.baud_rate, 19200);
        assert_eq!(meter.timeout, DriverKind::Fluke45.session_config().timeout);
    }

    #[test]
    fn duplicate_ids_rejected() {
        let config = settings(vec![
            definition("a", DriverKind::Rto6, "TCPIP::1::INSTR"),
            definition("a", DriverKind::E8267d, "GPIB0::19::INSTR"),
        ]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate instrument ID"));
    }

    #[test]
    fn invalid_log_level_rejected() {
        let mut config = settings(vec![]);
        config.application.log_level = "verbose".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn empty_resource_and_zero_timeout_rejected() {
        let config = settings(vec![definition("dmm", DriverKind::Hp34401a, "  ")]);
        assert!(config.validate().is_err());

        let mut dmm = definition("dmm", DriverKind::Hp34401a, "GPIB0::22::INSTR");
        dmm.timeout_ms = Some(0);
        assert!(settings(vec![dmm]).validate().is_err());
    }

    #[test]
    fn baud_rate_only_for_serial() {
        let mut scope = definition("scope", DriverKind::Rto6, "TCPIP0::10.0.0.2::INSTR");
        scope.baud_rate = Some(9600);
        let err = settings(vec![scope]).validate().unwrap_err();
        assert!(err.to_string().contains("only applies to serial"));

        let mut dac = definition("dac", DriverKind::Dac, "/dev/ttyUSB0");
        dac.baud_rate = Some(115_200);
        assert!(settings(vec![dac]).validate().is_ok());
    }

    #[test]
    fn dac_requires_serial_resource() {
        let dac = definition("dac", DriverKind::Dac, "GPIB0::3::INSTR");
        assert!(settings(vec![dac]).validate().is_err());
    }

    #[test]
    fn unknown_driver_fails_to_load() {
        let text = r#"
[application]
name = "x"

[[instruments]]
id = "k"
driver = "keithley2000"
resource = "GPIB0::1::INSTR"
"#;
        assert!(matches!(
            Settings::from_toml_str(text),
            Err(ConfigError::LoadError(_))
        ));
    }

    #[test]
    fn toml_round_trip_keeps_instruments() {
        let settings = Settings::from_toml_str(BENCH).unwrap();
        let text = settings.to_toml_string().unwrap();
        let again = Settings::from_toml_str(&text).unwrap();
        assert_eq!(again.instruments.len(), 3);
        assert_eq!(again.find("vna").unwrap().analyzer_channel, Some(2));
    }

    #[test]
    #[serial]
    fn load_from_file_with_env_override() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(BENCH.as_bytes()).unwrap();

        std::env::set_var("LABCTL_APPLICATION__LOG_LEVEL", "warn");
        let result = Settings::load_from(file.path());
        std::env::remove_var("LABCTL_APPLICATION__LOG_LEVEL");

        let settings = result.unwrap();
        assert_eq!(settings.application.log_level, "warn");
        assert_eq!(settings.application.name, "Bench 3");
    }

    #[test]
    #[serial]
    fn missing_file_without_env_fails() {
        let result = Settings::load_from("/nonexistent/instruments.toml");
        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }
}
