//! Ports - seams to external systems.
//!
//! Each trait hides one collaborator (the request queue, the ledger, key
//! material, time, id generation) so the core can be driven by in-memory
//! fakes in tests and by real clients in production.

pub mod clock;
pub mod id_generator;
pub mod ledger;
pub mod queue_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::ledger::{LedgerClient, Signer};
pub use self::queue_store::QueueStore;
