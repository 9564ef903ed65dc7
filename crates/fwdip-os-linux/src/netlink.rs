//! rtnetlink implementation of [`NetworkBackend`]

use fwdip_core::model::MacAddr;
use fwdip_core::traits::{LiveAddress, LiveInterface, NetworkBackend};
use fwdip_core::{Error, Result};

use futures::TryStreamExt;
use rtnetlink::packet_route::address::{AddressAttribute, AddressMessage};
use rtnetlink::packet_route::link::{LinkAttribute, LinkMessage};
use rtnetlink::{Handle, new_connection};
use std::net::IpAddr;
use tracing::debug;

/// Network backend over an rtnetlink socket
pub struct LinuxBackend {
    handle: Handle,
}

impl LinuxBackend {
    /// Open a netlink connection and drive it on the current runtime
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| Error::config("The netlink backend needs a running tokio runtime"))?;
        let (connection, handle, _) = new_connection()
            .map_err(|e| Error::backend(format!("Unable to create netlink socket: {}", e)))?;
        runtime.spawn(connection);

        debug!("Netlink connection established");
        Ok(Self { handle })
    }

    /// Every address message for the link with `index`
    async fn address_messages(&self, index: u32) -> Result<Vec<AddressMessage>> {
        let mut stream = self
            .handle
            .address()
            .get()
            .set_link_index_filter(index)
            .execute();

        let mut messages = Vec::new();
        while let Some(msg) = stream
            .try_next()
            .await
            .map_err(|e| Error::backend(format!("Failed to dump addresses of link {}: {}", index, e)))?
        {
            // The kernel may ignore the filter on older versions
            if msg.header.index == index {
                messages.push(msg);
            }
        }
        Ok(messages)
    }
}

fn to_interface(link: &LinkMessage) -> LiveInterface {
    let mut name = String::new();
    let mut mac = None;

    for attr in &link.attributes {
        match attr {
            LinkAttribute::IfName(n) => name = n.clone(),
            LinkAttribute::Address(addr) if addr.len() == 6 => {
                let mut octets = [0u8; 6];
                octets.copy_from_slice(addr);
                mac = Some(MacAddr::new(octets));
            }
            _ => {}
        }
    }

    LiveInterface {
        name,
        index: link.header.index,
        mac,
    }
}

/// The local address of `msg`, if it carries one
///
/// On point-to-point links IFA_ADDRESS is the peer, so IFA_LOCAL wins.
fn to_address(msg: &AddressMessage) -> Option<LiveAddress> {
    let mut local = None;
    let mut address = None;

    for attr in &msg.attributes {
        match attr {
            AddressAttribute::Local(ip) => local = Some(*ip),
            AddressAttribute::Address(ip) => address = Some(*ip),
            _ => {}
        }
    }

    local
        .or(address)
        .map(|ip| LiveAddress::new(ip, msg.header.prefix_len))
}

#[async_trait::async_trait]
impl NetworkBackend for LinuxBackend {
    async fn interfaces(&self) -> Result<Vec<LiveInterface>> {
        let mut links = self.handle.link().get().execute();

        let mut interfaces = Vec::new();
        while let Some(link) = links
            .try_next()
            .await
            .map_err(|e| Error::backend(format!("Failed to list links: {}", e)))?
        {
            interfaces.push(to_interface(&link));
        }
        Ok(interfaces)
    }

    async fn addresses(&self, iface: &LiveInterface) -> Result<Vec<LiveAddress>> {
        Ok(self
            .address_messages(iface.index)
            .await?
            .iter()
            .filter_map(to_address)
            .collect())
    }

    async fn add_address(&self, iface: &LiveInterface, ip: IpAddr, prefix_len: u8) -> Result<()> {
        debug!("Adding {}/{} to {}", ip, prefix_len, iface.name);
        self.handle
            .address()
            .add(iface.index, ip, prefix_len)
            .execute()
            .await
            .map_err(|e| Error::backend(format!("Unable to add {} to {}: {}", ip, iface.name, e)))
    }

    async fn remove_address(&self, iface: &LiveInterface, ip: IpAddr) -> Result<()> {
        let msg = self
            .address_messages(iface.index)
            .await?
            .into_iter()
            .find(|msg| to_address(msg).is_some_and(|a| a.ip == ip))
            .ok_or_else(|| Error::not_found(format!("{} on {}", ip, iface.name)))?;

        debug!(
            "Removing {}/{} from {}",
            ip,
            msg.header.prefix_len,
            iface.name
        );
        self.handle
            .address()
            .del(msg)
            .execute()
            .await
            .map_err(|e| {
                Error::backend(format!("Unable to remove {} from {}: {}", ip, iface.name, e))
            })
    }

    fn backend_name(&self) -> &'static str {
        "linux-netlink"
    }
}
