//! Change detection and transition memory
//!
//! [`TransitionMemo`] holds the scalars remembered from the previous cycle.
//! Sampling it is not a pure predicate: every call overwrites the memory with
//! the current values, so it must run at most once per cycle or a transition
//! is lost.

use crate::model::{NetworkInterface, Snapshot};
use crate::settings::EffectiveSettings;

/// Values remembered from the previous cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionMemo {
    /// Failover cluster addresses resolved last cycle
    pub last_wsfc_addresses: Vec<String>,
    /// Failover cluster flag resolved last cycle
    pub last_wsfc_enabled: bool,
    /// Disable flag resolved last cycle
    pub last_disabled: bool,
}

impl TransitionMemo {
    /// Decide whether reconciliation is needed, then remember `settings`
    ///
    /// True when the declared interfaces differ from `previous` (order
    /// sensitive, field by field) or either failover setting changed. A
    /// missing previous snapshot compares as no interfaces.
    pub fn sample_changes(
        &mut self,
        previous: Option<&Snapshot>,
        current: &Snapshot,
        settings: &EffectiveSettings,
    ) -> bool {
        let previous_interfaces = previous.map(Snapshot::network_interfaces).unwrap_or(&[]);

        let changed = !interfaces_equal(previous_interfaces, current.network_interfaces())
            || settings.wsfc_enabled != self.last_wsfc_enabled
            || settings.wsfc_addresses != self.last_wsfc_addresses;

        self.last_wsfc_addresses = settings.wsfc_addresses.clone();
        self.last_wsfc_enabled = settings.wsfc_enabled;
        changed
    }

    /// Remember the disable flag; true when it differs from last cycle
    pub fn record_disabled(&mut self, disabled: bool) -> bool {
        let transitioned = disabled != self.last_disabled;
        self.last_disabled = disabled;
        transitioned
    }
}

fn interfaces_equal(a: &[NetworkInterface], b: &[NetworkInterface]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| x.mac == y.mac && x.forwarded_ips == y.forwarded_ips)
}
