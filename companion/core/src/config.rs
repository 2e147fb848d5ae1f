//! TOML Configuration File Support
//!
//! Centralized configuration loading for the companion, supporting a TOML
//! file at `~/.config/desktop-companion/companion.toml`.
//!
//! # Configuration Priority
//!
//! Values are resolved with the following priority (highest first):
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables (`COMPANION_*`)
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! base_url = "127.0.0.1:8001"
//! chat_path = "/api/chat_v2"
//! speech_path = "/api/gptsovits"
//! request_timeout_ms = 60000
//!
//! [interaction]
//! idle_event = true
//! idle_time_ms = 180000
//! morning_hour = 7
//! noon_hour = 12
//! night_hour = 23
//! time_poll_secs = 3000
//!
//! [playback]
//! volume = 0.8
//! hide_delay_ms = 5000
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sources::{IdleSchedule, TimeSchedule, MAX_IDLE_DELAY};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Server section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerToml {
    /// Host and port of the chat backend, with or without scheme
    pub base_url: Option<String>,

    /// Path of the streaming chat endpoint
    pub chat_path: Option<String>,

    /// Path of the text-to-speech endpoint
    pub speech_path: Option<String>,

    /// Time allowed for response headers in milliseconds (0 = no limit)
    pub request_timeout_ms: Option<u64>,
}

/// Interaction section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionToml {
    /// Whether idle chatter is enabled
    pub idle_event: Option<bool>,

    /// Required user inactivity before idle chatter, in milliseconds
    pub idle_time_ms: Option<u64>,

    /// Unit of the idle delay in milliseconds
    pub idle_base_unit_ms: Option<u64>,

    /// Lower bound of the idle delay factor
    pub idle_min_factor: Option<f64>,

    /// Upper bound of the idle delay factor
    pub idle_max_factor: Option<f64>,

    /// Hour that triggers the morning greeting
    pub morning_hour: Option<u32>,

    /// Hour that triggers the noon greeting
    pub noon_hour: Option<u32>,

    /// Hour that triggers the night greeting
    pub night_hour: Option<u32>,

    /// Seconds between clock checks
    pub time_poll_secs: Option<u64>,

    /// Log every bus event at debug level
    pub debug_events: Option<bool>,
}

/// Playback section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackToml {
    /// Initial volume, 0.0 to 1.0
    pub volume: Option<f32>,

    /// Delay before hiding the bubble once the queue drains, in milliseconds
    pub hide_delay_ms: Option<u64>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanionToml {
    /// Server section
    pub server: ServerToml,

    /// Interaction section
    pub interaction: InteractionToml,

    /// Playback section
    pub playback: PlaybackToml,
}

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Where the chat backend lives
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host and port (scheme optional; `http://` is assumed)
    pub base_url: String,
    /// Streaming chat endpoint path
    pub chat_path: String,
    /// Speech endpoint path
    pub speech_path: String,
    /// Time allowed for response headers; `None` waits forever
    pub request_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "127.0.0.1:8001".to_string(),
            chat_path: "/api/chat_v2".to_string(),
            speech_path: "/api/gptsovits".to_string(),
            request_timeout: Some(Duration::from_secs(60)),
        }
    }
}

impl ServerConfig {
    /// Base URL with a scheme and without a trailing slash
    #[must_use]
    pub fn origin(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.starts_with("http://") || base.starts_with("https://") {
            base.to_string()
        } else {
            format!("http://{base}")
        }
    }

    /// Full chat endpoint URL
    #[must_use]
    pub fn chat_url(&self) -> String {
        format!("{}{}", self.origin(), self.chat_path)
    }

    /// Full speech endpoint URL
    #[must_use]
    pub fn speech_url(&self) -> String {
        format!("{}{}", self.origin(), self.speech_path)
    }
}

/// Interaction event settings
#[derive(Clone, Debug, PartialEq)]
pub struct InteractionConfig {
    /// Idle source schedule (includes the enable flag)
    pub idle: IdleSchedule,
    /// Required user inactivity before idle chatter
    pub idle_time: Duration,
    /// Time-of-day source schedule
    pub time: TimeSchedule,
    /// Subscribe a `*` tap that logs every event
    pub debug_events: bool,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            idle: IdleSchedule::default(),
            idle_time: Duration::from_millis(180_000),
            time: TimeSchedule::default(),
            debug_events: false,
        }
    }
}

/// Playback settings
#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackConfig {
    /// Initial volume, 0.0 to 1.0
    pub volume: f32,
    /// Delay before hiding the bubble once the queue drains
    pub hide_delay: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            volume: 1.0,
            hide_delay: Duration::from_millis(5000),
        }
    }
}

/// Centralized configuration for the companion
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug)]
pub struct CompanionConfig {
    /// Backend endpoints
    pub server: ServerConfig,

    /// Interaction events
    pub interaction: InteractionConfig,

    /// Audio and bubble behaviour
    pub playback: PlaybackConfig,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            interaction: InteractionConfig::default(),
            playback: PlaybackConfig::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl CompanionConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::ValidationError(msg));

        if self.server.base_url.trim().is_empty() {
            return invalid("server.base_url must not be empty".into());
        }
        for (name, path) in [
            ("chat_path", &self.server.chat_path),
            ("speech_path", &self.server.speech_path),
        ] {
            if !path.starts_with('/') {
                return invalid(format!("server.{name} must start with '/', got {path:?}"));
            }
        }

        let time = &self.interaction.time;
        for (name, hour) in [
            ("morning_hour", time.morning_hour),
            ("noon_hour", time.noon_hour),
            ("night_hour", time.night_hour),
        ] {
            if hour > 23 {
                return invalid(format!("interaction.{name} must be 0-23, got {hour}"));
            }
        }
        if time.poll_interval.is_zero() {
            return invalid("interaction.time_poll_secs must be positive".into());
        }

        let idle = &self.interaction.idle;
        if idle.base_unit.is_zero() {
            return invalid("interaction.idle_base_unit_ms must be positive".into());
        }
        if !idle.min_factor.is_finite()
            || !idle.max_factor.is_finite()
            || idle.min_factor <= 0.0
            || idle.max_factor < idle.min_factor
        {
            return invalid(format!(
                "interaction idle factors must be finite with 0 < min <= max, got {} and {}",
                idle.min_factor, idle.max_factor
            ));
        }
        if idle.base_unit.as_secs_f64() * idle.max_factor > MAX_IDLE_DELAY.as_secs_f64() {
            return invalid(format!(
                "interaction idle delay may not exceed {}s (idle_base_unit_ms x idle_max_factor)",
                MAX_IDLE_DELAY.as_secs()
            ));
        }

        if !(0.0..=1.0).contains(&self.playback.volume) {
            return invalid(format!(
                "playback.volume must be within 0.0-1.0, got {}",
                self.playback.volume
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/desktop-companion/companion.toml` or
/// `~/.config/desktop-companion/companion.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("desktop-companion").join("companion.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
/// A missing config file is not an error (defaults are used).
pub fn load_config() -> Result<CompanionConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Arguments
///
/// * `path` - Optional path to the configuration file. If `None`, only defaults
///   and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<CompanionConfig, ConfigError> {
    let mut config = CompanionConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: CompanionToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

fn millis_or_none(ms: u64) -> Option<Duration> {
    (ms > 0).then_some(Duration::from_millis(ms))
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut CompanionConfig, toml: &CompanionToml) {
    // Server settings
    if let Some(ref url) = toml.server.base_url {
        config.server.base_url.clone_from(url);
    }
    if let Some(ref path) = toml.server.chat_path {
        config.server.chat_path.clone_from(path);
    }
    if let Some(ref path) = toml.server.speech_path {
        config.server.speech_path.clone_from(path);
    }
    if let Some(ms) = toml.server.request_timeout_ms {
        config.server.request_timeout = millis_or_none(ms);
    }

    // Interaction settings
    let interaction = &toml.interaction;
    if let Some(enabled) = interaction.idle_event {
        config.interaction.idle.enabled = enabled;
    }
    if let Some(ms) = interaction.idle_time_ms {
        config.interaction.idle_time = Duration::from_millis(ms);
    }
    if let Some(ms) = interaction.idle_base_unit_ms {
        config.interaction.idle.base_unit = Duration::from_millis(ms);
    }
    if let Some(factor) = interaction.idle_min_factor {
        config.interaction.idle.min_factor = factor;
    }
    if let Some(factor) = interaction.idle_max_factor {
        config.interaction.idle.max_factor = factor;
    }
    if let Some(hour) = interaction.morning_hour {
        config.interaction.time.morning_hour = hour;
    }
    if let Some(hour) = interaction.noon_hour {
        config.interaction.time.noon_hour = hour;
    }
    if let Some(hour) = interaction.night_hour {
        config.interaction.time.night_hour = hour;
    }
    if let Some(secs) = interaction.time_poll_secs {
        config.interaction.time.poll_interval = Duration::from_secs(secs);
    }
    if let Some(debug) = interaction.debug_events {
        config.interaction.debug_events = debug;
    }

    // Playback settings
    if let Some(volume) = toml.playback.volume {
        config.playback.volume = volume;
    }
    if let Some(ms) = toml.playback.hide_delay_ms {
        config.playback.hide_delay = Duration::from_millis(ms);
    }
}

fn parse_flag(value: &str) -> bool {
    value != "0" && !value.eq_ignore_ascii_case("false")
}

/// Apply environment variable overrides, reading variables through `lookup`
fn apply_env_config<F>(config: &mut CompanionConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("COMPANION_BASE_URL") {
        config.server.base_url = url;
        config.source = ConfigSource::Env;
    }
    if let Some(timeout) = lookup("COMPANION_REQUEST_TIMEOUT_MS") {
        if let Ok(ms) = timeout.parse::<u64>() {
            config.server.request_timeout = millis_or_none(ms);
            config.source = ConfigSource::Env;
        }
    }
    if let Some(enabled) = lookup("COMPANION_IDLE_EVENT") {
        config.interaction.idle.enabled = parse_flag(&enabled);
        config.source = ConfigSource::Env;
    }
    if let Some(debug) = lookup("COMPANION_DEBUG_EVENTS") {
        config.interaction.debug_events = parse_flag(&debug);
        config.source = ConfigSource::Env;
    }
    if let Some(volume) = lookup("COMPANION_VOLUME") {
        if let Ok(v) = volume.parse::<f32>() {
            config.playback.volume = v;
            config.source = ConfigSource::Env;
        }
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Backend base URL override
    pub base_url: Option<String>,

    /// Idle chatter enabled override
    pub idle_event: Option<bool>,

    /// Volume override
    pub volume: Option<f32>,

    /// Debug event tap override
    pub debug_events: Option<bool>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set base URL override
    #[must_use]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Set idle chatter override
    #[must_use]
    pub fn with_idle_event(mut self, enabled: bool) -> Self {
        self.idle_event = Some(enabled);
        self
    }

    /// Set volume override
    #[must_use]
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Set debug event tap override
    #[must_use]
    pub fn with_debug_events(mut self, enabled: bool) -> Self {
        self.debug_events = Some(enabled);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut CompanionConfig) {
        if self.base_url.is_some()
            || self.idle_event.is_some()
            || self.volume.is_some()
            || self.debug_events.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.base_url {
            config.server.base_url.clone_from(url);
        }
        if let Some(enabled) = self.idle_event {
            config.interaction.idle.enabled = enabled;
        }
        if let Some(volume) = self.volume {
            config.playback.volume = volume;
        }
        if let Some(debug) = self.debug_events {
            config.interaction.debug_events = debug;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
