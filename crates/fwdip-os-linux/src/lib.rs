// # Netlink Network Backend
//
// This crate binds and unbinds forwarded IPs on Linux hosts.
//
// ## Implementation
//
// Talks rtnetlink directly: links are listed for their index and hardware
// address, addresses are dumped per link index, and changes are sent as
// RTM_NEWADDR / RTM_DELADDR. Every forwarded IP is bound with a host prefix
// (`/32` or `/128`).
//
// ## Platform Support
//
// The backend type exists on every platform so callers compile everywhere,
// but construction fails outside Linux.

#[cfg(target_os = "linux")]
mod netlink;

#[cfg(target_os = "linux")]
pub use netlink::LinuxBackend;

#[cfg(not(target_os = "linux"))]
pub use unsupported::LinuxBackend;

#[cfg(not(target_os = "linux"))]
mod unsupported {
    use fwdip_core::traits::{LiveAddress, LiveInterface, NetworkBackend};
    use fwdip_core::{Error, Result};
    use std::net::IpAddr;

    fn unavailable() -> Error {
        Error::config("The Linux network backend is only available on Linux")
    }

    /// Placeholder for non-Linux builds; cannot be constructed
    pub struct LinuxBackend {
        _private: (),
    }

    impl LinuxBackend {
        pub fn new() -> Result<Self> {
            Err(unavailable())
        }
    }

    #[async_trait::async_trait]
    impl NetworkBackend for LinuxBackend {
        async fn interfaces(&self) -> Result<Vec<LiveInterface>> {
            Err(unavailable())
        }

        async fn addresses(&self, _iface: &LiveInterface) -> Result<Vec<LiveAddress>> {
            Err(unavailable())
        }

        async fn add_address(&self, _iface: &LiveInterface, _ip: IpAddr, _prefix_len: u8) -> Result<()> {
            Err(unavailable())
        }

        async fn remove_address(&self, _iface: &LiveInterface, _ip: IpAddr) -> Result<()> {
            Err(unavailable())
        }

        fn backend_name(&self) -> &'static str {
            "unsupported"
        }
    }

}
