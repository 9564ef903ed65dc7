//! Failover cluster (WSFC) exclusion
//!
//! Addresses owned by a failover cluster resource must never be managed
//! here. An explicit address list is more precise than the enable flag, so
//! it always wins:
//!
//! 1. Non-empty address list: drop exactly those addresses.
//! 2. Empty list, flag set: drop every forwarded IP.
//! 3. Otherwise: no change.

use crate::model::NetworkInterface;
use crate::settings::EffectiveSettings;

/// Which exclusion was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    /// Listed addresses were dropped
    Listed,
    /// All forwarded IPs were dropped
    All,
    /// Nothing was dropped
    None,
}

/// Filter failover cluster addresses out of the declared interfaces, in place
pub fn apply_exclusion(settings: &EffectiveSettings, interfaces: &mut [NetworkInterface]) -> Exclusion {
    if !settings.wsfc_addresses.is_empty() {
        for iface in interfaces.iter_mut() {
            iface
                .forwarded_ips
                .retain(|ip| !settings.wsfc_addresses.contains(ip));
        }
        Exclusion::Listed
    } else if settings.wsfc_enabled {
        for iface in interfaces.iter_mut() {
            iface.forwarded_ips.clear();
        }
        Exclusion::All
    } else {
        Exclusion::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interfaces() -> Vec<NetworkInterface> {
        vec![
            NetworkInterface::new("42:01:0a:80:00:02", ["10.0.0.5", "10.0.0.10"]),
            NetworkInterface::new("42:01:0a:80:00:03", ["10.0.1.5"]),
        ]
    }

    #[test]
    fn test_list_beats_flag() {
        let settings = EffectiveSettings {
            wsfc_enabled: true,
            wsfc_addresses: vec!["10.0.0.10".to_string()],
            disabled: false,
        };
        let mut ifaces = interfaces();

        assert_eq!(apply_exclusion(&settings, &mut ifaces), Exclusion::Listed);
        assert_eq!(ifaces[0].forwarded_ips, vec!["10.0.0.5"]);
        assert_eq!(ifaces[1].forwarded_ips, vec!["10.0.1.5"]);
    }

    #[test]
    fn test_flag_alone_clears_everything() {
        let settings = EffectiveSettings {
            wsfc_enabled: true,
            ..Default::default()
        };
        let mut ifaces = interfaces();

        assert_eq!(apply_exclusion(&settings, &mut ifaces), Exclusion::All);
        assert!(ifaces.iter().all(|i| i.forwarded_ips.is_empty()));
    }

    #[test]
    fn test_list_without_flag_still_filters() {
        let settings = EffectiveSettings {
            wsfc_addresses: vec!["10.0.1.5".to_string()],
            ..Default::default()
        };
        let mut ifaces = interfaces();

        apply_exclusion(&settings, &mut ifaces);
        assert_eq!(ifaces[0].forwarded_ips.len(), 2);
        assert!(ifaces[1].forwarded_ips.is_empty());
    }

    #[test]
    fn test_no_settings_no_change() {
        let mut ifaces = interfaces();
        assert_eq!(
            apply_exclusion(&EffectiveSettings::default(), &mut ifaces),
            Exclusion::None
        );
        assert_eq!(ifaces, interfaces());
    }
}
