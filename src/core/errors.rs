/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use super::types::Pid;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// POSIX errno values surfaced by the syscall layer
pub mod errno {
    pub const ESRCH: i32 = 3;
    pub const ECHILD: i32 = 10;
    pub const EAGAIN: i32 = 11;
    pub const ENOMEM: i32 = 12;
    pub const EFAULT: i32 = 14;
    pub const EINVAL: i32 = 22;
}

/// Process lifecycle errors with serialization support
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ProcessError {
    #[error("Out of memory: {0}")]
    #[diagnostic(
        code(process::out_of_memory),
        help("A collaborator could not allocate the child's resources. Nothing was committed.")
    )]
    OutOfMemory(String),

    #[error("Process limit reached: all identifiers up to {limit} are in use")]
    #[diagnostic(
        code(process::limit_reached),
        help("Identifiers are recycled once both a process and its parent have exited.")
    )]
    LimitReached { limit: Pid },

    #[error("No such process: {0}")]
    #[diagnostic(
        code(process::no_such_process),
        help("The identifier was never forked or its record has already been reclaimed.")
    )]
    NoSuchProcess(Pid),

    #[error("Process {target} is not a child of {caller}")]
    #[diagnostic(
        code(process::not_my_child),
        help("Only the direct parent may wait on a process.")
    )]
    NotMyChild { caller: Pid, target: Pid },
}

impl ProcessError {
    /// Identifier or memory exhaustion during process creation
    #[inline]
    #[must_use]
    pub const fn is_resource_exhausted(&self) -> bool {
        matches!(self, Self::OutOfMemory(_) | Self::LimitReached { .. })
    }

    /// errno reported to the calling process
    #[inline]
    #[must_use]
    pub const fn errno(&self) -> i32 {
        match self {
            Self::OutOfMemory(_) => errno::ENOMEM,
            Self::LimitReached { .. } => errno::EAGAIN,
            Self::NoSuchProcess(_) => errno::ESRCH,
            Self::NotMyChild { .. } => errno::ECHILD,
        }
    }
}

/// Process operation result
///
/// # Must Use
/// Fork and wait can fail and the caller must report the failure to the process
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Unified kernel error type with miette diagnostics
#[derive(Error, Debug, Diagnostic)]
pub enum KernelError {
    #[error("Process error: {0}")]
    #[diagnostic(transparent)]
    Process(#[from] ProcessError),

    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(kernel::configuration_error),
        help("The lifecycle kernel cannot boot with this configuration.")
    )]
    Configuration(String),
}

/// Result type for kernel operations
pub type KernelResult<T> = Result<T, KernelError>;
