/*!
 * Process Management
 * Fork, exit and wait on top of the identifier allocator and the registry
 */

use super::pid::PidAllocator;
use super::registry::Registry;
use super::stats::{AtomicLifecycleStats, LifecycleStats};
use super::traits::{ExecutionHost, ForkedTask, SpawnError};
use super::types::{ExitOutcome, OwnTransition, ProcessRecord};
use crate::core::config::KernelConfig;
use crate::core::errors::{KernelResult, ProcessResult};
use crate::core::types::{ExitCode, Pid};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A process as seen by the kernel: identity plus host-owned resources
///
/// `ProcessManager::exit` consumes it, so nothing can act for a process after
/// it has exited.
pub struct Process<H: ExecutionHost> {
    pid: Pid,
    parent: Option<Pid>,
    name: String,
    container: H::Container,
    address_space: Option<H::AddressSpace>,
}

impl<H: ExecutionHost> Process<H> {
    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Parent at fork time; `None` for boot-time root processes
    #[inline]
    pub fn parent_pid(&self) -> Option<Pid> {
        self.parent
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn container(&self) -> &H::Container {
        &self.container
    }

    #[inline]
    pub fn address_space(&self) -> Option<&H::AddressSpace> {
        self.address_space.as_ref()
    }
}

impl<H: ExecutionHost> fmt::Debug for Process<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("parent", &self.parent)
            .field("name", &self.name)
            .field("has_address_space", &self.address_space.is_some())
            .finish()
    }
}

struct Inner<H: ExecutionHost> {
    config: KernelConfig,
    host: H,
    pids: PidAllocator,
    registry: Registry,
    stats: AtomicLifecycleStats,
}

/// Process identity and lifecycle manager
///
/// Cloning is cheap and every clone drives the same allocator and registry.
pub struct ProcessManager<H: ExecutionHost> {
    inner: Arc<Inner<H>>,
}

/// Builder for ProcessManager
#[derive(Debug, Clone, Default)]
pub struct ProcessManagerBuilder {
    config: KernelConfig,
}

impl ProcessManagerBuilder {
    /// Create a new ProcessManager builder
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: KernelConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the identifier bound
    pub fn with_pid_max(mut self, pid_max: Pid) -> Self {
        self.config = self.config.with_pid_max(pid_max);
        self
    }

    /// Build the ProcessManager on top of `host`
    ///
    /// An invalid configuration is fatal: the kernel can't run without a
    /// usable identifier space.
    pub fn build<H: ExecutionHost>(self, host: H) -> KernelResult<ProcessManager<H>> {
        self.config.validate()?;

        info!(pid_max = self.config.pid_max, "Process manager initialized");

        Ok(ProcessManager {
            inner: Arc::new(Inner {
                pids: PidAllocator::new(self.config.pid_max),
                registry: Registry::new(),
                stats: AtomicLifecycleStats::new(),
                config: self.config,
                host,
            }),
        })
    }
}

impl<H: ExecutionHost> ProcessManager<H> {
    /// Create a builder for constructing a ProcessManager
    pub fn builder() -> ProcessManagerBuilder {
        ProcessManagerBuilder::new()
    }

    /// ProcessManager with the default configuration
    pub fn new(host: H) -> KernelResult<Self> {
        Self::builder().build(host)
    }

    #[inline]
    pub fn host(&self) -> &H {
        &self.inner.host
    }

    #[inline]
    pub fn config(&self) -> &KernelConfig {
        &self.inner.config
    }

    /// Create a boot-time process with no parent
    ///
    /// Root processes get an identifier but no registry record: nobody can
    /// wait on them, and their identifier is released when they exit.
    pub fn create_root(
        &self,
        name: &str,
        address_space: Option<H::AddressSpace>,
    ) -> ProcessResult<Process<H>> {
        let host = self.host();

        let container = match host.create_container(name) {
            Ok(container) => container,
            Err(e) => {
                if let Some(space) = address_space {
                    host.destroy_address_space(space);
                }
                return Err(e.into());
            }
        };

        let pid = match self.inner.pids.acquire() {
            Ok(pid) => pid,
            Err(e) => {
                if let Some(space) = address_space {
                    host.destroy_address_space(space);
                }
                host.destroy_container(container);
                return Err(e);
            }
        };

        info!(pid, name, "Created root process");
        Ok(Process {
            pid,
            parent: None,
            name: name.to_string(),
            container,
            address_space,
        })
    }

    /// Fork `parent`, resuming the child from a copy of `context`
    ///
    /// Every failure unwinds what was allocated so far; the allocator,
    /// registry and host are left as they were.
    #[instrument(skip_all, fields(parent_pid = parent.pid()))]
    pub fn fork(&self, parent: &Process<H>, context: &H::Context) -> ProcessResult<Pid> {
        let result = self.try_fork(parent, context);
        match &result {
            Ok(pid) => {
                self.inner.stats.inc_forks();
                info!(pid, parent = parent.pid(), "Forked process");
            }
            Err(e) => {
                self.inner.stats.inc_fork_failures();
                warn!(parent = parent.pid(), error = %e, "Fork failed");
            }
        }
        result
    }

    fn try_fork(&self, parent: &Process<H>, context: &H::Context) -> ProcessResult<Pid> {
        let host = self.host();
        let pids = &self.inner.pids;

        let container = host.create_container(&parent.name)?;

        let pid = match pids.acquire() {
            Ok(pid) => pid,
            Err(e) => {
                host.destroy_container(container);
                return Err(e);
            }
        };

        let child_context = match host.copy_context(context) {
            Ok(copy) => copy,
            Err(e) => {
                pids.rollback(pid);
                host.destroy_container(container);
                return Err(e.into());
            }
        };

        let address_space = match parent.address_space.as_ref() {
            Some(space) => match host.copy_address_space(space) {
                Ok(copy) => Some(copy),
                Err(e) => {
                    pids.rollback(pid);
                    host.destroy_container(container);
                    return Err(e.into());
                }
            },
            None => None,
        };

        self.inner
            .registry
            .insert(ProcessRecord::new(pid, parent.pid));

        let task = ForkedTask {
            manager: self.clone(),
            process: Process {
                pid,
                parent: Some(parent.pid),
                name: parent.name.clone(),
                container,
                address_space,
            },
            context: child_context,
        };

        if let Err(SpawnError { error, task }) = host.spawn_thread(task) {
            // Nobody has seen the child yet: drop its record before the id
            // can be handed out again
            let removed = self.inner.registry.remove_unclaimed(pid);
            debug_assert!(removed, "record for pid {pid} vanished before spawn");
            pids.rollback(pid);
            self.destroy(task.process);
            return Err(error.into());
        }

        Ok(pid)
    }

    /// Terminate `process` with `code`
    ///
    /// Retires the process's own record and updates its children's records
    /// in one registry pass, then returns reclaimed identifiers to the pool
    /// and tears down the process's resources.
    #[instrument(skip_all, fields(pid = process.pid(), code = code))]
    pub fn exit(&self, process: Process<H>, code: ExitCode) {
        let pid = process.pid;
        let outcome = self.inner.registry.exit(pid, code);

        if process.parent.is_none() {
            // Root processes have no record; nobody will ever wait on them
            self.inner.pids.release(pid);
        }

        for &reclaimed in &outcome.reclaimed {
            self.inner.pids.release(reclaimed);
        }

        self.inner.stats.record_exit(&outcome);
        self.log_exit(pid, code, &outcome);

        self.destroy(process);
    }

    fn log_exit(&self, pid: Pid, code: ExitCode, outcome: &ExitOutcome) {
        match outcome.own {
            OwnTransition::Zombie => debug!(pid, code, "Process exited, awaiting parent"),
            OwnTransition::Reclaimed => debug!(pid, code, "Orphan exited, reclaimed"),
            OwnTransition::Untracked => debug!(pid, code, "Root process exited"),
        }
        if !outcome.reclaimed.is_empty() || !outcome.orphaned.is_empty() {
            info!(
                pid,
                reclaimed = ?outcome.reclaimed,
                orphaned = ?outcome.orphaned,
                "Process exit settled records"
            );
        }
    }

    /// Wait for direct child `pid` to exit and return its exit code
    ///
    /// Blocks without timeout. The child's record stays until `caller` exits.
    #[instrument(skip_all, fields(caller = caller.pid(), child = pid))]
    pub fn waitpid(&self, caller: &Process<H>, pid: Pid) -> ProcessResult<ExitCode> {
        self.inner.stats.inc_waits();
        let result = self.inner.registry.wait(caller.pid, pid);
        if let Err(ref e) = result {
            debug!(caller = caller.pid, pid, error = %e, "waitpid rejected");
        }
        result
    }

    #[inline]
    pub fn current_pid(&self, process: &Process<H>) -> Pid {
        process.pid
    }

    fn destroy(&self, mut process: Process<H>) {
        let host = self.host();
        if let Some(space) = process.address_space.take() {
            host.destroy_address_space(space);
        }
        host.destroy_container(process.container);
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub fn record(&self, pid: Pid) -> Option<ProcessRecord> {
        self.inner.registry.get(pid)
    }

    pub fn records(&self) -> Vec<ProcessRecord> {
        self.inner.registry.snapshot()
    }

    /// Records of every live child of `pid`
    pub fn children(&self, pid: Pid) -> Vec<ProcessRecord> {
        self.inner.registry.find_all(|r| r.is_child_of(pid))
    }

    pub fn high_water_mark(&self) -> Pid {
        self.inner.pids.high_water_mark()
    }

    pub fn free_pids(&self) -> Vec<Pid> {
        self.inner.pids.free_pool()
    }

    pub fn pids_in_use(&self) -> usize {
        self.inner.pids.in_use()
    }

    pub fn stats(&self) -> LifecycleStats {
        self.inner.stats.snapshot()
    }
}

impl<H: ExecutionHost> Clone for ProcessManager<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: ExecutionHost> fmt::Debug for ProcessManager<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessManager")
            .field("config", &self.inner.config)
            .field("records", &self.inner.registry.len())
            .finish_non_exhaustive()
    }
}
