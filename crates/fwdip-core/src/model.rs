//! Declarative snapshot types and hardware addresses
//!
//! A [`Snapshot`] is the metadata tree fetched once per cycle. It is decoded
//! from the metadata server's recursive JSON document and treated as
//! immutable: the reconciler filters a working copy of the declared
//! interfaces, never the snapshot itself.
//!
//! ## JSON Shape
//!
//! ```json
//! {
//!   "instance": {
//!     "attributes": { "enable-wsfc": "true", "wsfc-addrs": "10.0.0.10" },
//!     "networkInterfaces": [
//!       { "mac": "42:01:0a:80:00:02", "forwardedIps": ["10.0.0.5"] }
//!     ]
//!   },
//!   "project": { "attributes": { "disable-address-manager": "false" } }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// One metadata snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    /// Instance-level metadata
    pub instance: InstanceMetadata,
    /// Project (fleet group) level metadata
    pub project: ProjectMetadata,
}

impl Snapshot {
    /// Decode a snapshot from the metadata server's JSON document
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json)
            .map_err(|e| Error::metadata(format!("Failed to decode metadata snapshot: {}", e)))
    }

    /// Declared network interfaces, in metadata order
    pub fn network_interfaces(&self) -> &[NetworkInterface] {
        &self.instance.network_interfaces
    }
}

/// Instance-level metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InstanceMetadata {
    /// Instance attributes
    pub attributes: Attributes,
    /// Declared network interfaces
    pub network_interfaces: Vec<NetworkInterface>,
}

/// Project-level metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectMetadata {
    /// Project attributes
    pub attributes: Attributes,
}

/// The attributes this manager reads
///
/// Values stay raw strings; absence (`None`) is distinct from an empty or
/// unparseable value, and parsing happens in [`crate::settings`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attributes {
    /// Failover cluster enable flag
    #[serde(rename = "enable-wsfc", skip_serializing_if = "Option::is_none")]
    pub enable_wsfc: Option<String>,

    /// Comma-separated failover cluster addresses
    #[serde(rename = "wsfc-addrs", skip_serializing_if = "Option::is_none")]
    pub wsfc_addresses: Option<String>,

    /// Address manager disable flag
    #[serde(
        rename = "disable-address-manager",
        skip_serializing_if = "Option::is_none"
    )]
    pub disable_address_manager: Option<String>,
}

/// A declared network interface and the forwarded IPs it should carry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkInterface {
    /// Hardware address as written in metadata (unparsed)
    pub mac: String,
    /// Forwarded IPs, in metadata order
    pub forwarded_ips: Vec<String>,
}

impl NetworkInterface {
    /// Create a declared interface
    pub fn new<I, S>(mac: impl Into<String>, forwarded_ips: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mac: mac.into(),
            forwarded_ips: forwarded_ips.into_iter().map(Into::into).collect(),
        }
    }
}

/// A 48-bit hardware (MAC) address
///
/// Parses colon-separated (`42:01:0a:80:00:02`), hyphen-separated
/// (`42-01-0A-80-00-02`) and dotted (`4201.0a80.0002`) forms. Displays in
/// lowercase colon form, which is also the ledger key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddr([u8; 6]);

impl MacAddr {
    /// Create from raw octets
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Raw octets
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::invalid_input(format!("invalid MAC address {:?}", s));

        let groups: Vec<&str> = if s.contains(':') {
            s.split(':').collect()
        } else if s.contains('-') {
            s.split('-').collect()
        } else if s.contains('.') {
            s.split('.').collect()
        } else {
            return Err(invalid());
        };

        // from_str_radix tolerates a sign prefix
        if !groups.iter().all(|g| g.bytes().all(|b| b.is_ascii_hexdigit())) {
            return Err(invalid());
        }

        let mut octets = [0u8; 6];
        match groups.len() {
            6 => {
                for (octet, group) in octets.iter_mut().zip(&groups) {
                    if group.len() != 2 {
                        return Err(invalid());
                    }
                    *octet = u8::from_str_radix(group, 16).map_err(|_| invalid())?;
                }
            }
            3 if s.contains('.') => {
                for (pair, group) in octets.chunks_exact_mut(2).zip(&groups) {
                    if group.len() != 4 {
                        return Err(invalid());
                    }
                    let word = u16::from_str_radix(group, 16).map_err(|_| invalid())?;
                    pair.copy_from_slice(&word.to_be_bytes());
                }
            }
            _ => return Err(invalid()),
        }

        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}
