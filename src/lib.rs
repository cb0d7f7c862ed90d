/*!
 * Lifecycle Kernel Library
 * Process identity, parentage and exit/wait coordination
 */

pub mod core;
pub mod host;
pub mod monitoring;
pub mod process;
pub mod syscalls;

// Re-exports
pub use crate::core::{
    ExitCode, KernelConfig, KernelError, KernelResult, Pid, ProcessError, ProcessResult,
};
pub use host::{program, run_root, Fault, Program, Session, ThreadHost, TrapFrame};
pub use monitoring::init_tracing;
pub use process::{
    ExecutionHost, ExitOutcome, LifecycleStats, OwnTransition, Process, ProcessManager,
    ProcessRecord, RecordState,
};
pub use syscalls::{SyscallExecutor, SyscallResult};
