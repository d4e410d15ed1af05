//! Impls - adapters behind the ports.
//!
//! - **InMemoryQueueStore**: tests and embedding
//! - **FileQueueStore**: durable JSON file, used by the CLI
//! - **SimulatedLedger** / **DevSigner**: in-process ledger for demos and tests

pub mod entries;
pub mod file_queue;
pub mod memory_queue;
pub mod simulated_ledger;

pub use self::entries::{EntryTable, QueueEntry};
pub use self::file_queue::FileQueueStore;
pub use self::memory_queue::InMemoryQueueStore;
pub use self::simulated_ledger::{Balance, DevSigner, KeyError, SimulatedLedger};
