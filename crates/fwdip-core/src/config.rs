//! Configuration types for the forwarded IP manager
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

/// Default metadata server endpoint
pub const DEFAULT_METADATA_URL: &str = "http://169.254.169.254/computeMetadata/v1/";

/// Default location of the file ledger
pub const DEFAULT_LEDGER_PATH: &str = "/var/lib/fwdip/ledger.json";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FwdipConfig {
    /// Metadata server configuration
    #[serde(default)]
    pub metadata: MetadataConfig,

    /// Ledger store configuration
    #[serde(default)]
    pub ledger: LedgerStoreConfig,

    /// Path to the local override configuration file
    #[serde(default)]
    pub local_config_path: Option<String>,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl FwdipConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.metadata.validate()?;
        self.ledger.validate()?;
        self.engine.validate()?;

        if let Some(path) = &self.local_config_path
            && path.is_empty()
        {
            return Err(crate::Error::config("Local config path cannot be empty"));
        }

        Ok(())
    }
}

/// Metadata server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Base URL of the metadata server
    #[serde(default = "default_metadata_url")]
    pub url: String,

    /// Request timeout (in seconds); hanging GETs add this to their wait
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Use hanging GETs that return only when metadata changes
    #[serde(default = "default_wait_for_change")]
    pub wait_for_change: bool,

    /// How long the server may hold a hanging GET (in seconds)
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
}

impl MetadataConfig {
    /// Validate the metadata configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.url.is_empty() {
            return Err(crate::Error::config("Metadata URL cannot be empty"));
        }
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(crate::Error::config(format!(
                "Metadata URL must use HTTP or HTTPS scheme. Got: {}",
                self.url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("Metadata timeout must be > 0"));
        }
        if self.wait_for_change && self.wait_timeout_secs == 0 {
            return Err(crate::Error::config("Metadata wait timeout must be > 0"));
        }
        Ok(())
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            url: default_metadata_url(),
            timeout_secs: default_timeout_secs(),
            wait_for_change: default_wait_for_change(),
            wait_timeout_secs: default_wait_timeout_secs(),
        }
    }
}

/// Ledger store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerStoreConfig {
    /// File-based ledger
    File {
        /// Path to the ledger file
        path: String,
    },

    /// In-memory ledger (not persistent)
    Memory,
}

impl LedgerStoreConfig {
    /// Validate the ledger configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            LedgerStoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("Ledger file path cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Get the ledger type name
    pub fn type_name(&self) -> &str {
        match self {
            LedgerStoreConfig::File { .. } => "file",
            LedgerStoreConfig::Memory => "memory",
        }
    }
}

impl Default for LedgerStoreConfig {
    fn default() -> Self {
        LedgerStoreConfig::File {
            path: DEFAULT_LEDGER_PATH.to_string(),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Delay between metadata polls when hanging GETs are off (in seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Delay before the next cycle after a failed one (in seconds)
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Capacity of the reconciler event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        if self.poll_interval_secs == 0 {
            return Err(crate::Error::config("Poll interval must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            retry_delay_secs: default_retry_delay_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_metadata_url() -> String {
    DEFAULT_METADATA_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_wait_for_change() -> bool {
    true
}

fn default_wait_timeout_secs() -> u64 {
    60
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_event_channel_capacity() -> usize {
    1000
}
