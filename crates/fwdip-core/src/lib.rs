// # fwdip-core
//
// Core library for the forwarded IP manager.
//
// ## Architecture Overview
//
// This library keeps the secondary ("forwarded") IP addresses bound to a
// host's network interfaces aligned with a declaration fetched from metadata:
// - **NetworkBackend**: Trait for enumerating interfaces and binding addresses
// - **LedgerStore**: Trait for the durable record of addresses this manager owns
// - **SnapshotSource**: Trait for fetching the declarative metadata snapshot
// - **ConfigSource**: Trait for local override configuration
// - **Reconciler**: Resolves settings, detects changes, diffs and applies
//
// ## Design Principles
//
// 1. **Ownership**: Never remove an address the ledger does not record
// 2. **Truthful Ledger**: Record what is actually believed bound, so failed
//    operations are retried on the next cycle
// 3. **Library-First**: All reconciliation logic lives here; the daemon only
//    schedules cycles
// 4. **Single Writer**: Cycles take `&mut Reconciler` and never overlap

pub mod config;
pub mod engine;
pub mod error;
pub mod local_config;
pub mod model;
pub mod settings;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{EngineConfig, FwdipConfig, LedgerStoreConfig, MetadataConfig};
pub use engine::{ApplyReport, CycleOutcome, Reconciler, ReconcilerEvent};
pub use error::{Error, Result};
pub use local_config::LocalConfig;
pub use model::{MacAddr, NetworkInterface, Snapshot};
pub use settings::EffectiveSettings;
pub use state::{FileLedgerStore, MemoryLedgerStore};
pub use traits::{ConfigSource, LedgerStore, LiveAddress, LiveInterface, NetworkBackend, SnapshotSource};
