//! Sync subsystem: the single-flight coordinator pipeline (§4.6), the
//! history compactor it triggers on success (§4.8), the debounced/interval
//! scheduler that decides when to call it (§4.7), and the lifecycle event
//! bus subscribers observe it through.

pub mod compactor;
pub mod coordinator;
pub mod events;
pub mod scheduler;

pub use compactor::Compactor;
pub use coordinator::{StatusSnapshot, SyncCoordinator, SyncOutcome};
pub use events::{EventBus, SyncEvent, SyncEventKind, SyncStatus, Unsubscribe};
pub use scheduler::Scheduler;
