// # Network Backend Trait
//
// Defines the interface to the host's network stack: enumerating interfaces,
// reading the addresses bound to them, and adding/removing single addresses.
//
// ## Implementations
//
// - Linux (rtnetlink): `fwdip-os-linux` crate
// - Test doubles in `tests/common`
//
// ## Usage
//
// ```rust,ignore
// use fwdip_core::NetworkBackend;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let backend = /* NetworkBackend implementation */;
//
//     for iface in backend.interfaces().await? {
//         let addrs = backend.addresses(&iface).await?;
//         println!("{}: {:?}", iface.name, addrs);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::fmt;
use std::net::IpAddr;

use crate::model::MacAddr;

/// A network interface as reported by the OS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveInterface {
    /// Interface name (e.g., "eth0")
    pub name: String,
    /// OS interface index
    pub index: u32,
    /// Hardware address, if the interface has one
    pub mac: Option<MacAddr>,
}

/// An address currently bound to an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LiveAddress {
    /// The bound IP
    pub ip: IpAddr,
    /// Prefix length the address is bound with
    pub prefix_len: u8,
}

impl LiveAddress {
    /// Create a live address
    pub fn new(ip: IpAddr, prefix_len: u8) -> Self {
        Self { ip, prefix_len }
    }

    /// Create a host-prefixed address (`/32` or `/128`)
    pub fn host(ip: IpAddr) -> Self {
        Self::new(ip, host_prefix_len(&ip))
    }
}

/// Comparison form: the bare IP for host routes, `ip/prefix` otherwise
///
/// Forwarded IPs are always bound with the host prefix, so only those can
/// ever compare equal to a declared entry.
impl fmt::Display for LiveAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prefix_len == host_prefix_len(&self.ip) {
            write!(f, "{}", self.ip)
        } else {
            write!(f, "{}/{}", self.ip, self.prefix_len)
        }
    }
}

/// Prefix length of a single-host route for this address family
pub fn host_prefix_len(ip: &IpAddr) -> u8 {
    match ip {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

/// Trait for network backend implementations
///
/// Each method is a single blocking-in-spirit OS operation with no internal
/// retry or timeout; the reconciler decides what to do with failures.
///
/// # Trust Level: Semi-Trusted
///
/// ## Allowed Capabilities
/// - ✅ Perform platform-specific I/O (netlink, sysfs)
/// - ✅ Translate OS errors into [`crate::Error::Backend`]
///
/// ## Forbidden Capabilities
/// - ❌ Access the ledger store (owned by `Reconciler`)
/// - ❌ Implement retry logic (retry happens on the next cycle)
/// - ❌ Decide which addresses to add or remove
#[async_trait]
pub trait NetworkBackend: Send + Sync {
    /// Enumerate the host's network interfaces
    ///
    /// A failure here aborts the whole reconciliation cycle.
    async fn interfaces(&self) -> Result<Vec<LiveInterface>, crate::Error>;

    /// Read the addresses currently bound to an interface
    async fn addresses(&self, iface: &LiveInterface) -> Result<Vec<LiveAddress>, crate::Error>;

    /// Bind `ip` with the given prefix length to `iface`
    async fn add_address(
        &self,
        iface: &LiveInterface,
        ip: IpAddr,
        prefix_len: u8,
    ) -> Result<(), crate::Error>;

    /// Remove `ip` from `iface`
    async fn remove_address(&self, iface: &LiveInterface, ip: IpAddr) -> Result<(), crate::Error>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}
