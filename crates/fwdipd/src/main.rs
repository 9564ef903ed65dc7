// # fwdipd - Forwarded IP Daemon
//
// This daemon is a THIN integration layer. All reconciliation logic lives in
// fwdip-core; the daemon only wires collaborators together and schedules
// cycles.
//
// The fwdipd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Building the backend, ledger and metadata source
// 4. Driving one reconcile cycle per metadata snapshot until shutdown
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Metadata
// - `FWDIP_METADATA_URL`: Metadata server base URL
// - `FWDIP_METADATA_TIMEOUT_SECS`: Request timeout
// - `FWDIP_WAIT_FOR_CHANGE`: Use hanging GETs (`true`/`false`, default `true`)
//
// ### Ledger
// - `FWDIP_LEDGER_TYPE`: Type of ledger store (file, memory)
// - `FWDIP_LEDGER_PATH`: Path to ledger file (for file store)
//
// ### Local overrides
// - `FWDIP_LOCAL_CONFIG`: Path to the local override file (re-read every cycle)
//
// ### Engine
// - `FWDIP_POLL_INTERVAL_SECS`: Delay between polls without hanging GETs
// - `FWDIP_RETRY_DELAY_SECS`: Delay after a failed cycle
// - `FWDIP_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export FWDIP_LEDGER_TYPE=file
// export FWDIP_LEDGER_PATH=/var/lib/fwdip/ledger.json
// export FWDIP_LOCAL_CONFIG=/etc/fwdip/local.json
//
// fwdipd
// ```

use anyhow::{Context, Result};
use fwdip_core::config::{DEFAULT_LEDGER_PATH, DEFAULT_METADATA_URL};
use fwdip_core::traits::SnapshotSource;
use fwdip_core::{
    CycleOutcome, EngineConfig, FwdipConfig, LedgerStoreConfig, LocalConfig, MetadataConfig,
    Reconciler, ReconcilerEvent,
};
use fwdip_metadata_http::HttpSnapshotSource;
use fwdip_os_linux::LinuxBackend;
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum FwdipExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<FwdipExitCode> for ExitCode {
    fn from(code: FwdipExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Daemon configuration
#[derive(Debug)]
struct Config {
    core: FwdipConfig,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let metadata_defaults = MetadataConfig::default();
        let engine_defaults = EngineConfig::default();

        let metadata = MetadataConfig {
            url: lookup("FWDIP_METADATA_URL").unwrap_or_else(|| DEFAULT_METADATA_URL.to_string()),
            timeout_secs: parse_var(&lookup, "FWDIP_METADATA_TIMEOUT_SECS")?
                .unwrap_or(metadata_defaults.timeout_secs),
            wait_for_change: parse_var(&lookup, "FWDIP_WAIT_FOR_CHANGE")?
                .unwrap_or(metadata_defaults.wait_for_change),
            wait_timeout_secs: metadata_defaults.wait_timeout_secs,
        };

        let ledger = match lookup("FWDIP_LEDGER_TYPE").as_deref().unwrap_or("file") {
            "file" => LedgerStoreConfig::File {
                path: lookup("FWDIP_LEDGER_PATH")
                    .unwrap_or_else(|| DEFAULT_LEDGER_PATH.to_string()),
            },
            "memory" => LedgerStoreConfig::Memory,
            other => anyhow::bail!(
                "FWDIP_LEDGER_TYPE '{}' is not supported. \
                Supported types: file, memory",
                other
            ),
        };

        let engine = EngineConfig {
            poll_interval_secs: parse_var(&lookup, "FWDIP_POLL_INTERVAL_SECS")?
                .unwrap_or(engine_defaults.poll_interval_secs),
            retry_delay_secs: parse_var(&lookup, "FWDIP_RETRY_DELAY_SECS")?
                .unwrap_or(engine_defaults.retry_delay_secs),
            event_channel_capacity: engine_defaults.event_channel_capacity,
        };

        Ok(Self {
            core: FwdipConfig {
                metadata,
                ledger,
                local_config_path: lookup("FWDIP_LOCAL_CONFIG"),
                engine,
            },
            log_level: lookup("FWDIP_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Structural checks live in fwdip-core; this adds the range checks that
    /// only make sense for a long-running daemon.
    fn validate(&self) -> Result<()> {
        self.core.validate()?;

        let metadata = &self.core.metadata;
        if !(1..=300).contains(&metadata.timeout_secs) {
            anyhow::bail!(
                "FWDIP_METADATA_TIMEOUT_SECS must be between 1 and 300 seconds. Got: {}",
                metadata.timeout_secs
            );
        }

        let engine = &self.core.engine;
        if !(1..=3600).contains(&engine.poll_interval_secs) {
            anyhow::bail!(
                "FWDIP_POLL_INTERVAL_SECS must be between 1 and 3600 seconds. Got: {}",
                engine.poll_interval_secs
            );
        }

        if !(1..=300).contains(&engine.retry_delay_secs) {
            anyhow::bail!(
                "FWDIP_RETRY_DELAY_SECS must be between 1 and 300 seconds. Got: {}",
                engine.retry_delay_secs
            );
        }

        if let LedgerStoreConfig::File { path } = &self.core.ledger
            && let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            // The store creates it, but say so up front
            eprintln!(
                "NOTE: FWDIP_LEDGER_PATH parent directory {} does not exist and will be created",
                parent.display()
            );
        }

        self.level()?;
        Ok(())
    }

    fn level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "FWDIP_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }
}

/// Parse an optional variable, failing loudly on a malformed value
fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{} has an invalid value: {:?}", name, raw))
        })
        .transpose()
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return FwdipExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return FwdipExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = config.level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return FwdipExitCode::ConfigError.into();
    }

    info!("Starting fwdipd daemon");
    info!(
        "Configuration loaded: metadata {}, ledger {}",
        config.core.metadata.url,
        config.core.ledger.type_name()
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return FwdipExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config.core).await {
            error!("Daemon error: {:#}", e);
            FwdipExitCode::RuntimeError
        } else {
            FwdipExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon until a shutdown signal arrives
async fn run_daemon(config: FwdipConfig) -> Result<()> {
    let backend = LinuxBackend::new().context("Failed to create network backend")?;
    let ledger = fwdip_core::state::from_config(&config.ledger)
        .await
        .context("Failed to open ledger")?;
    let source = HttpSnapshotSource::new(&config.metadata).context("Failed to create metadata source")?;
    let local = load_local_config(config.local_config_path.as_deref())
        .await
        .unwrap_or_else(|e| {
            warn!("{}; continuing without local overrides", e);
            LocalConfig::empty()
        });

    let (mut reconciler, events) =
        Reconciler::new(Box::new(backend), ledger, Box::new(local), &config.engine)?;
    let event_logger = tokio::spawn(log_events(events));

    info!(
        "Reconciling with backend {} and source {}",
        reconciler.backend_name(),
        source.source_name()
    );

    let mut shutdown = ShutdownSignal::new()?;
    let poll_interval = Duration::from_secs(config.engine.poll_interval_secs);
    let retry_delay = Duration::from_secs(config.engine.retry_delay_secs);

    let signal_name = loop {
        // Local overrides may be edited at any time
        if let Some(path) = config.local_config_path.as_deref() {
            match LocalConfig::load(path).await {
                Ok(local) => reconciler.set_local_config(Box::new(local)),
                Err(e) => warn!("{}; keeping previous local overrides", e),
            }
        }

        let delay = tokio::select! {
            signal = shutdown.recv() => break signal,
            fetched = source.fetch() => match fetched {
                Ok(snapshot) => match reconciler.run_cycle(snapshot).await {
                    Ok(outcome) => {
                        log_outcome(&outcome);
                        if source.waits_for_change() { Duration::ZERO } else { poll_interval }
                    }
                    Err(e) => {
                        error!("Reconcile cycle failed: {}", e);
                        retry_delay
                    }
                },
                Err(e) => {
                    error!("Failed to fetch metadata from {}: {}", source.source_name(), e);
                    retry_delay
                }
            },
        };

        if !delay.is_zero() {
            tokio::select! {
                signal = shutdown.recv() => break signal,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    };

    info!("Received shutdown signal: {}", signal_name);
    info!("Shutting down daemon");

    let flushed = reconciler.flush().await;
    drop(reconciler);
    if event_logger.await.is_err() {
        warn!("Event logger task ended abnormally");
    }
    flushed.context("Failed to flush ledger")?;

    Ok(())
}

async fn load_local_config(path: Option<&str>) -> Result<LocalConfig> {
    match path {
        Some(path) => Ok(LocalConfig::load(path).await?),
        None => Ok(LocalConfig::empty()),
    }
}

fn log_outcome(outcome: &CycleOutcome) {
    match outcome {
        CycleOutcome::Disabled => debug!("Address manager disabled, cycle skipped"),
        CycleOutcome::Unchanged => debug!("Metadata unchanged, cycle skipped"),
        CycleOutcome::Applied(report) if report.has_failures() => warn!(
            "Cycle applied with {} failure(s) and {} unreadable interface(s); retrying next cycle",
            report.failed, report.transient
        ),
        CycleOutcome::Applied(report) => debug!(
            "Cycle applied: {} added, {} removed",
            report.added, report.removed
        ),
    }
}

/// Drain reconciler events into the log until the reconciler is dropped
async fn log_events(events: mpsc::Receiver<ReconcilerEvent>) {
    let mut stream = ReceiverStream::new(events);
    while let Some(event) = stream.next().await {
        match event {
            ReconcilerEvent::ManagerStatus { component, disabled } => {
                info!(component, disabled, "Manager status changed");
            }
            ReconcilerEvent::CycleCompleted { reconciled, skipped } => {
                debug!(reconciled, skipped, "Cycle completed");
            }
            other => debug!(event = ?other, "Reconciler event"),
        }
    }
}

/// SIGTERM/SIGINT listener
#[cfg(unix)]
struct ShutdownSignal {
    sigterm: Signal,
    sigint: Signal,
}

#[cfg(unix)]
impl ShutdownSignal {
    fn new() -> Result<Self> {
        let sigterm = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
        let sigint = signal(SignalKind::interrupt())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;
        Ok(Self { sigterm, sigint })
    }

    /// Wait for the next signal and return its name
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        }
    }
}

/// CTRL-C listener
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
struct ShutdownSignal;

#[cfg(not(unix))]
impl ShutdownSignal {
    fn new() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to wait for CTRL-C: {}", e);
        }
        "SIGINT"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.core.metadata.url, DEFAULT_METADATA_URL);
        assert!(config.core.metadata.wait_for_change);
        assert!(matches!(config.core.ledger, LedgerStoreConfig::File { .. }));
        assert_eq!(config.core.local_config_path, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("FWDIP_LEDGER_TYPE", "memory"),
            ("FWDIP_POLL_INTERVAL_SECS", "30"),
            ("FWDIP_WAIT_FOR_CHANGE", "false"),
            ("FWDIP_LOCAL_CONFIG", "/etc/fwdip/local.json"),
            ("FWDIP_LOG_LEVEL", "DEBUG"),
        ])
        .unwrap();

        assert!(matches!(config.core.ledger, LedgerStoreConfig::Memory));
        assert_eq!(config.core.engine.poll_interval_secs, 30);
        assert!(!config.core.metadata.wait_for_change);
        assert_eq!(
            config.core.local_config_path.as_deref(),
            Some("/etc/fwdip/local.json")
        );
        assert_eq!(config.level().unwrap(), Level::DEBUG);
    }

    #[test]
    fn test_malformed_number_is_rejected() {
        assert!(config_from(&[("FWDIP_POLL_INTERVAL_SECS", "soon")]).is_err());
    }

    #[test]
    fn test_unknown_ledger_type_is_rejected() {
        assert!(config_from(&[("FWDIP_LEDGER_TYPE", "redis")]).is_err());
    }

    #[test]
    fn test_range_checks() {
        let config = config_from(&[("FWDIP_POLL_INTERVAL_SECS", "0")]).unwrap();
        assert!(config.validate().is_err());

        let config = config_from(&[("FWDIP_RETRY_DELAY_SECS", "301")]).unwrap();
        assert!(config.validate().is_err());

        let config = config_from(&[("FWDIP_LOG_LEVEL", "loud")]).unwrap();
        assert!(config.validate().is_err());

        let config = config_from(&[("FWDIP_METADATA_URL", "ftp://metadata")]).unwrap();
        assert!(config.validate().is_err());
    }
}
