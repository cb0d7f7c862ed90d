/*!
 * Process Module
 * Identifier allocation, process registry, and the fork/exit/wait protocol
 */

pub mod manager;
pub mod pid;
pub mod registry;
pub mod stats;
pub mod traits;
pub mod types;

// Re-export for convenience
pub use manager::{Process, ProcessManager, ProcessManagerBuilder};
pub use pid::PidAllocator;
pub use registry::Registry;
pub use stats::{AtomicLifecycleStats, LifecycleStats};
pub use traits::{ExecutionHost, ForkedTask, HostError, HostResult, SpawnError};
pub use types::{ExitOutcome, OwnTransition, ProcessRecord, RecordState};
