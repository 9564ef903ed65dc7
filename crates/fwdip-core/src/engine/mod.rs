//! Forwarded IP reconciler
//!
//! The Reconciler is responsible for:
//! - Resolving effective settings from local config and metadata
//! - Gating work on the disable flag and on declared changes
//! - Filtering failover cluster addresses out of the declaration
//! - Diffing declared, owned and live addresses per interface
//! - Binding/unbinding addresses and keeping the ledger truthful
//!
//! ## Architecture
//!
//! ```text
//!   Snapshot ──► settings::resolve ──► wsfc::apply_exclusion
//!                                              │
//!                     ┌────────────────────────┼──────────────────────┐
//!                     ▼                        ▼                      ▼
//!             ┌──────────────┐         ┌──────────────┐       ┌──────────────┐
//!             │NetworkBackend│         │ diff::diff   │       │ LedgerStore  │
//!             │ (live, add,  │ ──────► │ (per iface)  │ ◄──── │ (owned IPs)  │
//!             │  remove)     │         └──────────────┘       └──────────────┘
//!             └──────────────┘                 │
//!                                              ▼
//!                                   ReconcilerEvent channel
//! ```
//!
//! ## Cycle Flow
//!
//! 1. Disable gate (edge-triggered status event)
//! 2. Change detection against the retained previous snapshot
//! 3. Enumerate interfaces (the only error that escapes a cycle)
//! 4. Per declared interface: match by MAC, read live + ledger, diff, apply
//! 5. Write back what is actually believed bound
//!
//! ## Concurrency
//!
//! Every cycle takes `&mut self`. The ledger and live interface state are not
//! locked, so exclusive access is what keeps cycles from overlapping.

pub mod bad_input;
pub mod change;
pub mod diff;
pub mod wsfc;

use std::net::IpAddr;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::model::{MacAddr, NetworkInterface, Snapshot};
use crate::settings::{self, EffectiveSettings};
use crate::traits::{ConfigSource, LedgerStore, LiveInterface, NetworkBackend, host_prefix_len};

pub use bad_input::BadInputSet;
pub use change::TransitionMemo;
pub use diff::{AddressDiff, diff};
pub use wsfc::{Exclusion, apply_exclusion};

/// Component name used in status notifications
pub const STATUS_COMPONENT: &str = "address";

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcilerEvent {
    /// The disable flag changed since the previous cycle
    ManagerStatus {
        component: &'static str,
        disabled: bool,
    },

    /// An interface needs addresses bound or unbound
    ForwardedIpsChanged {
        mac: String,
        added: Vec<String>,
        removed: Vec<String>,
    },

    /// Binding an address failed; it is left out of the ledger
    AddressAddFailed {
        mac: String,
        ip: String,
        error: String,
    },

    /// Unbinding an address failed; it stays in the ledger
    AddressRemoveFailed {
        mac: String,
        ip: String,
        error: String,
    },

    /// A declared hardware address is unparseable or not present on the host
    ///
    /// Emitted once per distinct value for the life of the reconciler.
    BadInterface { mac: String, reason: String },

    /// A declared forwarded IP is unparseable and was left out
    ///
    /// Emitted once per interface and value for the life of the reconciler.
    BadForwardedIp { mac: String, ip: String },

    /// An apply pass finished
    CycleCompleted { reconciled: usize, skipped: usize },
}

/// Counters for one apply pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Interfaces fully processed (ledger written)
    pub reconciled: usize,
    /// Interfaces skipped (bad input or transient read failure)
    pub skipped: usize,
    /// Skips caused by a failed address or ledger read
    pub transient: usize,
    /// Addresses bound
    pub added: usize,
    /// Addresses unbound
    pub removed: usize,
    /// Add/remove operations or ledger writes that failed
    pub failed: usize,
}

impl ApplyReport {
    /// Whether anything failed and should be retried next cycle
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.transient > 0
    }
}

/// Result of [`Reconciler::run_cycle`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The address manager is disabled; nothing ran
    Disabled,
    /// Nothing relevant changed; nothing ran
    Unchanged,
    /// An apply pass ran
    Applied(ApplyReport),
}

enum InterfaceOutcome {
    Reconciled,
    Skipped,
}

/// Forwarded IP reconciler
///
/// Owns the collaborators plus the per-process memory (transition scalars,
/// bad-input set, previous snapshot). Construct one per node and drive it
/// from a single scheduling loop.
pub struct Reconciler {
    /// Host network stack
    backend: Box<dyn NetworkBackend>,

    /// Ownership ledger
    ledger: Box<dyn LedgerStore>,

    /// Local override configuration
    local_config: Box<dyn ConfigSource>,

    /// Scalars remembered across cycles
    memo: TransitionMemo,

    /// Hardware addresses already reported as bad
    bad_input: BadInputSet,

    /// `<mac> <ip>` pairs already reported as unparseable
    bad_ips: BadInputSet,

    /// Snapshot of the last completed cycle
    previous: Option<Snapshot>,

    /// Set when the last apply failed in any way, forcing the next one
    retry_pending: bool,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<ReconcilerEvent>,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Returns
    ///
    /// A tuple of (reconciler, event_receiver) where event_receiver yields reconciler events
    pub fn new(
        backend: Box<dyn NetworkBackend>,
        ledger: Box<dyn LedgerStore>,
        local_config: Box<dyn ConfigSource>,
        config: &EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<ReconcilerEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let reconciler = Self {
            backend,
            ledger,
            local_config,
            memo: TransitionMemo::default(),
            bad_input: BadInputSet::new(),
            bad_ips: BadInputSet::new(),
            previous: None,
            retry_pending: false,
            event_tx: tx,
        };

        Ok((reconciler, rx))
    }

    /// Replace the local override configuration (e.g. after reloading the file)
    pub fn set_local_config(&mut self, local_config: Box<dyn ConfigSource>) {
        self.local_config = local_config;
    }

    /// Resolve effective settings for `snapshot`
    pub fn settings(&self, snapshot: &Snapshot) -> EffectiveSettings {
        settings::resolve(self.local_config.as_ref(), snapshot, self.memo.last_disabled)
    }

    /// Disable gate
    ///
    /// Emits one status event whenever the resolved flag differs from the
    /// previous cycle's.
    pub fn is_disabled(&mut self, snapshot: &Snapshot) -> bool {
        let disabled = self.settings(snapshot).disabled;
        if self.memo.record_disabled(disabled) {
            info!(
                "{} manager status: {}",
                STATUS_COMPONENT,
                if disabled { "disabled" } else { "enabled" }
            );
            self.emit_event(ReconcilerEvent::ManagerStatus {
                component: STATUS_COMPONENT,
                disabled,
            });
        }
        disabled
    }

    /// Change detector
    ///
    /// Samples the transition memory: call at most once per cycle.
    pub fn has_changed(&mut self, previous: Option<&Snapshot>, current: &Snapshot) -> bool {
        let settings = self.settings(current);
        self.memo.sample_changes(previous, current, &settings)
    }

    /// Disable gate followed by an apply pass
    pub async fn reconcile(&mut self, snapshot: &Snapshot) -> Result<CycleOutcome> {
        if self.is_disabled(snapshot) {
            return Ok(CycleOutcome::Disabled);
        }
        self.apply(snapshot).await.map(CycleOutcome::Applied)
    }

    /// One scheduling tick
    ///
    /// Disable gate, change detection against the snapshot retained from the
    /// previous tick, apply when needed, then retain `snapshot`. An apply that
    /// failed in any way forces the next tick to apply even without changes.
    pub async fn run_cycle(&mut self, snapshot: Snapshot) -> Result<CycleOutcome> {
        if self.is_disabled(&snapshot) {
            self.previous = Some(snapshot);
            return Ok(CycleOutcome::Disabled);
        }

        let previous = self.previous.take();
        let changed = self.has_changed(previous.as_ref(), &snapshot);

        let outcome = if changed || self.retry_pending {
            match self.apply(&snapshot).await {
                Ok(report) => Ok(CycleOutcome::Applied(report)),
                Err(e) => {
                    self.retry_pending = true;
                    Err(e)
                }
            }
        } else {
            debug!("No forwarded IP changes, skipping apply");
            Ok(CycleOutcome::Unchanged)
        };

        self.previous = Some(snapshot);
        outcome
    }

    /// Apply loop
    ///
    /// Fails only if interfaces cannot be enumerated. Per-interface and
    /// per-address failures are logged, reflected in the ledger and retried
    /// on a later cycle.
    pub async fn apply(&mut self, snapshot: &Snapshot) -> Result<ApplyReport> {
        let live_interfaces = self.backend.interfaces().await.map_err(|e| {
            error!("Failed to enumerate network interfaces: {}", e);
            e
        })?;

        let settings = self.settings(snapshot);
        let mut declared: Vec<NetworkInterface> = snapshot.network_interfaces().to_vec();
        match apply_exclusion(&settings, &mut declared) {
            Exclusion::Listed => debug!(
                "Excluding failover cluster addresses {:?}",
                settings.wsfc_addresses
            ),
            Exclusion::All => debug!("Failover cluster enabled, excluding all forwarded IPs"),
            Exclusion::None => {}
        }

        let mut report = ApplyReport::default();
        for iface in &declared {
            match self
                .reconcile_interface(iface, &live_interfaces, &mut report)
                .await
            {
                InterfaceOutcome::Reconciled => report.reconciled += 1,
                InterfaceOutcome::Skipped => report.skipped += 1,
            }
        }

        self.retry_pending = report.has_failures();
        self.emit_event(ReconcilerEvent::CycleCompleted {
            reconciled: report.reconciled,
            skipped: report.skipped,
        });
        debug!(
            "Apply finished: {} reconciled, {} skipped ({} transient), {} added, {} removed, {} failed",
            report.reconciled,
            report.skipped,
            report.transient,
            report.added,
            report.removed,
            report.failed
        );

        Ok(report)
    }

    async fn reconcile_interface(
        &mut self,
        declared: &NetworkInterface,
        live_interfaces: &[LiveInterface],
        report: &mut ApplyReport,
    ) -> InterfaceOutcome {
        let mac: MacAddr = match declared.mac.parse() {
            Ok(mac) => mac,
            Err(e) => {
                self.report_bad_input(&declared.mac, e.to_string());
                return InterfaceOutcome::Skipped;
            }
        };

        let Some(iface) = live_interfaces.iter().find(|i| i.mac == Some(mac)) else {
            self.report_bad_input(
                &declared.mac,
                format!("no interface with mac {} exists on system", mac),
            );
            return InterfaceOutcome::Skipped;
        };

        let live: Vec<String> = match self.backend.addresses(iface).await {
            Ok(addrs) => addrs.iter().map(ToString::to_string).collect(),
            Err(e) => {
                error!("Failed to read addresses of {} ({}): {}", iface.name, mac, e);
                report.transient += 1;
                return InterfaceOutcome::Skipped;
            }
        };

        let key = mac.to_string();
        let persisted = match self.ledger.read(&key).await {
            Ok(ips) => ips.unwrap_or_default(),
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => {
                error!("Failed to read ledger entry for {}: {}", mac, e);
                report.transient += 1;
                return InterfaceOutcome::Skipped;
            }
        };
        // Nothing unparseable can be bound, so it cannot be owned either
        let persisted: Vec<String> = persisted
            .into_iter()
            .filter(|ip| {
                let valid = ip.parse::<IpAddr>().is_ok();
                if !valid {
                    warn!("Dropping unparseable ledger entry {:?} for {}", ip, mac);
                }
                valid
            })
            .collect();

        let mut desired = dedup(&declared.forwarded_ips);
        desired.retain(|ip| {
            let valid = ip.parse::<IpAddr>().is_ok();
            if !valid {
                self.report_bad_ip(&key, ip);
            }
            valid
        });
        let AddressDiff { to_add, to_remove } = diff(&persisted, &desired, &live);

        if !to_add.is_empty() || !to_remove.is_empty() {
            info!(
                "Changing forwarded IPs for {} from {:?} to {:?} by adding {:?} and removing {:?}.",
                mac, persisted, desired, to_add, to_remove
            );
            self.emit_event(ReconcilerEvent::ForwardedIpsChanged {
                mac: key.clone(),
                added: to_add.clone(),
                removed: to_remove.clone(),
            });
        }

        // Start from the full declaration and correct for whatever fails
        let mut next = desired;

        for ip in &to_add {
            let result = match ip.parse::<IpAddr>() {
                Ok(addr) => {
                    self.backend
                        .add_address(iface, addr, host_prefix_len(&addr))
                        .await
                }
                Err(_) => Err(Error::invalid_input(format!("{:?} is not an IP address", ip))),
            };
            match result {
                Ok(()) => report.added += 1,
                Err(e) => {
                    error!("Failed to add {} to {} ({}): {}", ip, iface.name, mac, e);
                    next.retain(|n| n != ip);
                    report.failed += 1;
                    self.emit_event(ReconcilerEvent::AddressAddFailed {
                        mac: key.clone(),
                        ip: ip.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        for ip in &to_remove {
            let result = match ip.parse::<IpAddr>() {
                Ok(addr) => self.backend.remove_address(iface, addr).await,
                Err(_) => Err(Error::invalid_input(format!("{:?} is not an IP address", ip))),
            };
            match result {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    error!("Failed to remove {} from {} ({}): {}", ip, iface.name, mac, e);
                    if !next.contains(ip) {
                        next.push(ip.clone());
                    }
                    report.failed += 1;
                    self.emit_event(ReconcilerEvent::AddressRemoveFailed {
                        mac: key.clone(),
                        ip: ip.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if let Err(e) = self.ledger.write(&key, &next).await {
            error!("Failed to write ledger entry for {}: {}", mac, e);
            report.failed += 1;
        }

        InterfaceOutcome::Reconciled
    }

    /// Log and emit once per interface and unparseable forwarded IP
    fn report_bad_ip(&mut self, mac: &str, ip: &str) {
        if self.bad_ips.first_report(&format!("{} {}", mac, ip)) {
            error!("Ignoring forwarded IP {:?} for {}: not an IP address", ip, mac);
            self.emit_event(ReconcilerEvent::BadForwardedIp {
                mac: mac.to_string(),
                ip: ip.to_string(),
            });
        }
    }

    /// Log and emit once per distinct bad hardware address
    fn report_bad_input(&mut self, raw: &str, reason: String) {
        if self.bad_input.first_report(raw) {
            error!("Skipping declared interface {:?}: {}", raw, reason);
            self.emit_event(ReconcilerEvent::BadInterface {
                mac: raw.to_string(),
                reason,
            });
        }
    }

    /// Persist any pending ledger changes
    pub async fn flush(&self) -> Result<()> {
        self.ledger.flush().await
    }

    /// The ledger store
    pub fn ledger(&self) -> &dyn LedgerStore {
        self.ledger.as_ref()
    }

    /// Transition memory
    pub fn memo(&self) -> &TransitionMemo {
        &self.memo
    }

    /// Hardware addresses reported as bad so far
    pub fn bad_input(&self) -> &BadInputSet {
        &self.bad_input
    }

    /// Backend name, for logging
    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    /// Emit a reconciler event
    fn emit_event(&self, event: ReconcilerEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody is listening; events are advisory
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

/// Collapse duplicates, keeping first occurrences in order
fn dedup(ips: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(ips.len());
    for ip in ips {
        if !out.contains(ip) {
            out.push(ip.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let ips: Vec<String> = ["b", "a", "b", "c", "a"].iter().map(|s| s.to_string()).collect();
        assert_eq!(dedup(&ips), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_report_failures() {
        let mut report = ApplyReport::default();
        assert!(!report.has_failures());
        report.failed = 1;
        assert!(report.has_failures());

        let report = ApplyReport {
            transient: 1,
            ..ApplyReport::default()
        };
        assert!(report.has_failures());
    }
}
