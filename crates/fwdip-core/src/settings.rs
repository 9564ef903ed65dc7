//! Effective settings resolution
//!
//! Every setting is resolved from three sources, highest precedence first:
//!
//! 1. Local override configuration ([`ConfigSource`])
//! 2. Instance attributes
//! 3. Project attributes
//!
//! The first source that yields a *parseable* value wins. A present but
//! malformed value does not stop the fallthrough. When no source yields a
//! value, booleans fall back to `false`, except the disable flag, which keeps
//! its remembered value from the previous cycle. Resolution never fails.

use std::net::IpAddr;

use crate::model::{Attributes, Snapshot};
use crate::traits::ConfigSource;

/// Local config section for failover cluster settings
pub const WSFC_SECTION: &str = "wsfc";
/// Local config key for the failover cluster address list
pub const WSFC_ADDRESSES_KEY: &str = "addresses";
/// Local config key for the failover cluster enable flag
pub const WSFC_ENABLE_KEY: &str = "enable";
/// Local config section for the address manager
pub const ADDRESS_MANAGER_SECTION: &str = "addressManager";
/// Local config key for the address manager disable flag
pub const DISABLE_KEY: &str = "disable";

/// Settings derived for one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectiveSettings {
    /// Failover cluster flag
    pub wsfc_enabled: bool,
    /// Failover cluster addresses (validated, deduplicated, source order)
    pub wsfc_addresses: Vec<String>,
    /// Whether the address manager is disabled
    pub disabled: bool,
}

/// Resolve all settings for this cycle
///
/// `remembered_disabled` is the disable flag from the previous cycle, used
/// when no source yields a parseable value.
pub fn resolve(
    local: &dyn ConfigSource,
    snapshot: &Snapshot,
    remembered_disabled: bool,
) -> EffectiveSettings {
    EffectiveSettings {
        wsfc_enabled: resolve_wsfc_enabled(local, snapshot),
        wsfc_addresses: resolve_wsfc_addresses(local, snapshot),
        disabled: resolve_disabled(local, snapshot, remembered_disabled),
    }
}

/// Resolve the failover cluster address list
///
/// The first source with a non-empty raw value supplies the list; its
/// entries are then validated individually.
pub fn resolve_wsfc_addresses(local: &dyn ConfigSource, snapshot: &Snapshot) -> Vec<String> {
    let raw = local
        .get(WSFC_SECTION, WSFC_ADDRESSES_KEY)
        .filter(|v| !v.is_empty())
        .or_else(|| non_empty(&snapshot.instance.attributes, |a| &a.wsfc_addresses))
        .or_else(|| non_empty(&snapshot.project.attributes, |a| &a.wsfc_addresses));

    raw.map(|raw| parse_address_list(&raw)).unwrap_or_default()
}

/// Resolve the failover cluster enable flag
pub fn resolve_wsfc_enabled(local: &dyn ConfigSource, snapshot: &Snapshot) -> bool {
    local
        .get(WSFC_SECTION, WSFC_ENABLE_KEY)
        .and_then(|v| parse_bool_lenient(&v))
        .or_else(|| attribute_bool(&snapshot.instance.attributes, |a| &a.enable_wsfc))
        .or_else(|| attribute_bool(&snapshot.project.attributes, |a| &a.enable_wsfc))
        .unwrap_or(false)
}

/// Resolve the address manager disable flag
pub fn resolve_disabled(
    local: &dyn ConfigSource,
    snapshot: &Snapshot,
    remembered_disabled: bool,
) -> bool {
    local
        .get(ADDRESS_MANAGER_SECTION, DISABLE_KEY)
        .and_then(|v| parse_bool(&v))
        .or_else(|| attribute_bool(&snapshot.instance.attributes, |a| &a.disable_address_manager))
        .or_else(|| attribute_bool(&snapshot.project.attributes, |a| &a.disable_address_manager))
        .unwrap_or(remembered_disabled)
}

/// Split a comma-separated address list
///
/// Entries are trimmed; empty entries are dropped silently, entries that are
/// not IP addresses are dropped with a warning.
pub fn parse_address_list(raw: &str) -> Vec<String> {
    let mut addresses: Vec<String> = Vec::new();
    for entry in raw.split(',').map(str::trim) {
        if entry.is_empty() {
            continue;
        }
        if entry.parse::<IpAddr>().is_err() {
            tracing::warn!("Ignoring failover cluster address {:?}: not a valid IP address", entry);
            continue;
        }
        if !addresses.iter().any(|a| a == entry) {
            addresses.push(entry.to_string());
        }
    }
    addresses
}

/// Strict boolean vocabulary used by metadata attributes
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Lenient boolean vocabulary used by local override files
pub fn parse_bool_lenient(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "y" | "yes" | "on" => Some(true),
        "0" | "f" | "false" | "n" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn non_empty(
    attributes: &Attributes,
    field: impl Fn(&Attributes) -> &Option<String>,
) -> Option<String> {
    field(attributes).as_ref().filter(|v| !v.is_empty()).cloned()
}

fn attribute_bool(
    attributes: &Attributes,
    field: impl Fn(&Attributes) -> &Option<String>,
) -> Option<bool> {
    field(attributes).as_deref().and_then(parse_bool)
}
