//! Test doubles and common utilities for reconciler contract tests
//!
//! `FakeBackend` is an in-memory host network stack whose handles share
//! state, so a test can keep one handle while the reconciler owns another.

#![allow(dead_code)]

use fwdip_core::engine::ReconcilerEvent;
use fwdip_core::error::{Error, Result};
use fwdip_core::traits::{LedgerStore, LiveAddress, LiveInterface, NetworkBackend};
use fwdip_core::{EngineConfig, LocalConfig, MacAddr, MemoryLedgerStore, NetworkInterface, Reconciler, Snapshot};
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub const MAC_A: &str = "42:01:0a:80:00:02";
pub const MAC_B: &str = "42:01:0a:80:00:03";

/// In-memory network stack with injectable failures
#[derive(Clone, Default)]
pub struct FakeBackend {
    interfaces: Arc<Mutex<Vec<LiveInterface>>>,
    addresses: Arc<Mutex<HashMap<u32, Vec<LiveAddress>>>>,
    failing_adds: Arc<Mutex<HashSet<IpAddr>>>,
    failing_removes: Arc<Mutex<HashSet<IpAddr>>>,
    failing_reads: Arc<Mutex<HashSet<u32>>>,
    fail_enumeration: Arc<AtomicBool>,
    add_calls: Arc<AtomicUsize>,
    remove_calls: Arc<AtomicUsize>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an interface with the given MAC and bound addresses
    pub fn with_interface(self, name: &str, mac: &str, addrs: &[LiveAddress]) -> Self {
        let mut interfaces = self.interfaces.lock().unwrap();
        let index = interfaces.len() as u32 + 1;
        interfaces.push(LiveInterface {
            name: name.to_string(),
            index,
            mac: Some(mac.parse::<MacAddr>().expect("valid test MAC")),
        });
        drop(interfaces);
        self.addresses.lock().unwrap().insert(index, addrs.to_vec());
        self
    }

    /// Addresses currently bound to the interface with `mac`, in comparison form
    pub fn bound(&self, mac: &str) -> Vec<String> {
        let index = self.index_of(mac);
        self.addresses.lock().unwrap()[&index]
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    pub fn fail_add(&self, ip: &str) {
        self.failing_adds.lock().unwrap().insert(ip.parse().unwrap());
    }

    pub fn fail_remove(&self, ip: &str) {
        self.failing_removes.lock().unwrap().insert(ip.parse().unwrap());
    }

    pub fn fail_reads_for(&self, mac: &str) {
        let index = self.index_of(mac);
        self.failing_reads.lock().unwrap().insert(index);
    }

    pub fn heal(&self) {
        self.failing_adds.lock().unwrap().clear();
        self.failing_removes.lock().unwrap().clear();
        self.failing_reads.lock().unwrap().clear();
        self.fail_enumeration.store(false, Ordering::SeqCst);
    }

    pub fn fail_enumeration(&self) {
        self.fail_enumeration.store(true, Ordering::SeqCst);
    }

    pub fn add_calls(&self) -> usize {
        self.add_calls.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }

    fn index_of(&self, mac: &str) -> u32 {
        let mac: MacAddr = mac.parse().unwrap();
        self.interfaces
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.mac == Some(mac))
            .map(|i| i.index)
            .expect("interface exists")
    }
}

#[async_trait::async_trait]
impl NetworkBackend for FakeBackend {
    async fn interfaces(&self) -> Result<Vec<LiveInterface>> {
        if self.fail_enumeration.load(Ordering::SeqCst) {
            return Err(Error::backend("enumeration unavailable"));
        }
        Ok(self.interfaces.lock().unwrap().clone())
    }

    async fn addresses(&self, iface: &LiveInterface) -> Result<Vec<LiveAddress>> {
        if self.failing_reads.lock().unwrap().contains(&iface.index) {
            return Err(Error::backend("address read failed"));
        }
        Ok(self
            .addresses
            .lock()
            .unwrap()
            .get(&iface.index)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_address(&self, iface: &LiveInterface, ip: IpAddr, prefix_len: u8) -> Result<()> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_adds.lock().unwrap().contains(&ip) {
            return Err(Error::backend(format!("cannot add {}", ip)));
        }
        self.addresses
            .lock()
            .unwrap()
            .entry(iface.index)
            .or_default()
            .push(LiveAddress::new(ip, prefix_len));
        Ok(())
    }

    async fn remove_address(&self, iface: &LiveInterface, ip: IpAddr) -> Result<()> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_removes.lock().unwrap().contains(&ip) {
            return Err(Error::backend(format!("cannot remove {}", ip)));
        }
        if let Some(addrs) = self.addresses.lock().unwrap().get_mut(&iface.index) {
            addrs.retain(|a| a.ip != ip);
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "fake"
    }
}

/// Memory ledger whose reads can be made to fail
#[derive(Clone, Default)]
pub struct FlakyLedger {
    inner: MemoryLedgerStore,
    fail_reads: Arc<AtomicBool>,
}

impl FlakyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl LedgerStore for FlakyLedger {
    async fn read(&self, mac: &str) -> Result<Option<Vec<String>>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::ledger("ledger unreadable"));
        }
        self.inner.read(mac).await
    }

    async fn write(&self, mac: &str, forwarded_ips: &[String]) -> Result<()> {
        self.inner.write(mac, forwarded_ips).await
    }

    async fn delete(&self, mac: &str) -> Result<()> {
        self.inner.delete(mac).await
    }

    async fn list(&self) -> Result<Vec<String>> {
        self.inner.list().await
    }

    async fn flush(&self) -> Result<()> {
        self.inner.flush().await
    }
}

/// A host-prefixed live address
pub fn host(ip: &str) -> LiveAddress {
    LiveAddress::host(ip.parse().unwrap())
}

/// String list helper
pub fn ips(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Snapshot declaring the given interfaces
pub fn snapshot(interfaces: Vec<NetworkInterface>) -> Snapshot {
    let mut snapshot = Snapshot::default();
    snapshot.instance.network_interfaces = interfaces;
    snapshot
}

/// Reconciler over a fake backend and a shared memory ledger
pub fn reconciler(
    backend: &FakeBackend,
    ledger: &MemoryLedgerStore,
    local: LocalConfig,
) -> (Reconciler, mpsc::Receiver<ReconcilerEvent>) {
    Reconciler::new(
        Box::new(backend.clone()),
        Box::new(ledger.clone()),
        Box::new(local),
        &EngineConfig::default(),
    )
    .expect("reconciler construction succeeds")
}

/// Drain every event currently queued
pub fn drain(rx: &mut mpsc::Receiver<ReconcilerEvent>) -> Vec<ReconcilerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
