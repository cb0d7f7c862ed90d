/*!
 * Process Traits
 * Collaborator interface the lifecycle kernel drives during fork and exit
 */

use super::manager::{Process, ProcessManager};
use crate::core::errors::ProcessError;
use std::fmt;
use thiserror::Error;

/// Collaborator failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("could not allocate {0}")]
    OutOfMemory(&'static str),

    #[error("thread creation failed: {0}")]
    ThreadSpawn(String),
}

pub type HostResult<T> = Result<T, HostError>;

impl From<HostError> for ProcessError {
    fn from(err: HostError) -> Self {
        ProcessError::OutOfMemory(err.to_string())
    }
}

/// Execution environment the kernel forks into
///
/// Owns everything the lifecycle kernel treats as opaque: process containers,
/// address spaces, saved execution contexts and kernel threads.
pub trait ExecutionHost: Send + Sync + Sized + 'static {
    /// Per-process container (name, host bookkeeping)
    type Container: Send + 'static;
    /// Address space owned by one process
    type AddressSpace: Send + 'static;
    /// Saved execution context (trap frame)
    type Context: Send + 'static;

    fn create_container(&self, name: &str) -> HostResult<Self::Container>;

    fn destroy_container(&self, container: Self::Container);

    /// Owned copy of a saved context for the child
    fn copy_context(&self, context: &Self::Context) -> HostResult<Self::Context>;

    fn copy_address_space(&self, space: &Self::AddressSpace) -> HostResult<Self::AddressSpace>;

    fn destroy_address_space(&self, space: Self::AddressSpace);

    /// Start the child's thread, resuming from `task.context`
    ///
    /// The thread must finish by handing the process to
    /// [`ProcessManager::exit`]. On failure the task is handed back untouched.
    fn spawn_thread(&self, task: ForkedTask<Self>) -> Result<(), SpawnError<Self>>;
}

/// Everything a freshly forked child needs to start running
pub struct ForkedTask<H: ExecutionHost> {
    pub manager: ProcessManager<H>,
    pub process: Process<H>,
    pub context: H::Context,
}

impl<H: ExecutionHost> fmt::Debug for ForkedTask<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForkedTask")
            .field("process", &self.process)
            .finish_non_exhaustive()
    }
}

/// Thread creation failure, carrying the task back to the kernel
pub struct SpawnError<H: ExecutionHost> {
    pub error: HostError,
    pub task: ForkedTask<H>,
}

impl<H: ExecutionHost> SpawnError<H> {
    pub fn new(error: HostError, task: ForkedTask<H>) -> Self {
        Self { error, task }
    }
}

impl<H: ExecutionHost> fmt::Debug for SpawnError<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpawnError")
            .field("error", &self.error)
            .field("task", &self.task)
            .finish()
    }
}
