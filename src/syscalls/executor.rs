/*!
 * Syscall Executor
 * Process lifecycle system calls with errno-style results
 */

use super::types::SyscallResult;
use crate::core::errors::errno;
use crate::core::types::{ExitCode, Pid};
use crate::process::{ExecutionHost, Process, ProcessManager};
use tracing::{debug, warn};

/// System call executor for fork, getpid, waitpid and _exit
pub struct SyscallExecutor<H: ExecutionHost> {
    manager: ProcessManager<H>,
}

impl<H: ExecutionHost> SyscallExecutor<H> {
    pub fn new(manager: ProcessManager<H>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &ProcessManager<H> {
        &self.manager
    }

    /// Returns the child's pid to the parent
    pub fn sys_fork(&self, process: &Process<H>, context: &H::Context) -> SyscallResult {
        match self.manager.fork(process, context) {
            Ok(pid) => SyscallResult::success(pid),
            Err(e) => e.into(),
        }
    }

    pub fn sys_getpid(&self, process: &Process<H>) -> SyscallResult {
        SyscallResult::success(self.manager.current_pid(process))
    }

    /// Wait for `pid`, storing its exit status in `status`
    ///
    /// No wait options are supported and a status slot is mandatory.
    pub fn sys_waitpid(
        &self,
        process: &Process<H>,
        pid: Pid,
        status: Option<&mut ExitCode>,
        options: i32,
    ) -> SyscallResult {
        if options != 0 {
            warn!(pid = process.pid(), options, "waitpid with unsupported options");
            return SyscallResult::error(errno::EINVAL, format!("Unsupported options: {options:#x}"));
        }

        let Some(status) = status else {
            return SyscallResult::error(errno::EFAULT, "Invalid status pointer");
        };

        match self.manager.waitpid(process, pid) {
            Ok(code) => {
                *status = code;
                debug!(caller = process.pid(), pid, code, "waitpid completed");
                SyscallResult::success(pid)
            }
            Err(e) => e.into(),
        }
    }

    /// Terminates the calling process; it can't be used afterwards
    pub fn sys_exit(&self, process: Process<H>, code: ExitCode) {
        debug!(pid = process.pid(), code, "_exit");
        self.manager.exit(process, code);
    }
}

impl<H: ExecutionHost> Clone for SyscallExecutor<H> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
        }
    }
}
