/// Identity of one competitor for the lease. Stable for the lifetime of an actor and written
/// verbatim as the leader key's value.
pub type ActorId = String;
/// The store's per-key version counter. Every write to a key moves it forward, so presenting the
/// index observed at the last read is enough to fence out writers that have lost the lease.
pub type StoreIndex = u64;

pub mod actor;
pub mod chaos;
pub mod config;
pub mod election;
pub mod error;
pub mod state;
pub mod store;
pub mod supervisor;
