/*!
 * Process Types
 * Bookkeeping records and exit/wait protocol outcomes
 */

use crate::core::types::{ExitCode, Pid};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a record that still exists
///
/// `Reclaimed` has no variant: a reclaimed record is gone from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    /// Neither the process nor its parent has exited
    Running,
    /// Exited, exit code retained until the parent exits
    ZombieAwaitingParent,
    /// Still running, parent gone, nobody can wait on it
    Orphaned,
}

/// Bookkeeping record of a forked process
///
/// Mutated by exactly two parties: the process itself and its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProcessRecord {
    pub pid: Pid,
    pub parent_pid: Pid,
    pub child_exited: bool,
    pub parent_exited: bool,
    exit_code: ExitCode,
}

impl ProcessRecord {
    /// Record for a freshly forked child
    #[inline]
    #[must_use]
    pub const fn new(pid: Pid, parent_pid: Pid) -> Self {
        Self {
            pid,
            parent_pid,
            child_exited: false,
            parent_exited: false,
            exit_code: 0,
        }
    }

    /// Exit code, only once the process has exited
    #[inline]
    #[must_use]
    pub const fn exit_code(&self) -> Option<ExitCode> {
        if self.child_exited {
            Some(self.exit_code)
        } else {
            None
        }
    }

    #[inline]
    pub(crate) fn store_exit_code(&mut self, code: ExitCode) {
        self.exit_code = code;
    }

    /// Both parties have left; the record must not outlive this
    #[inline(always)]
    #[must_use]
    pub const fn is_reclaimable(&self) -> bool {
        self.child_exited && self.parent_exited
    }

    /// Whether `pid` is the live parent of this record
    ///
    /// Once the parent has exited its identifier may be recycled, so a later
    /// holder of the same pid is not the parent.
    #[inline(always)]
    #[must_use]
    pub const fn is_child_of(&self, pid: Pid) -> bool {
        self.parent_pid == pid && !self.parent_exited
    }

    #[must_use]
    pub const fn state(&self) -> RecordState {
        match (self.child_exited, self.parent_exited) {
            (true, _) => RecordState::ZombieAwaitingParent,
            (false, true) => RecordState::Orphaned,
            (false, false) => RecordState::Running,
        }
    }
}

/// What happened to the exiting process's own record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnTransition {
    /// Parent still running; exit code kept for its wait
    Zombie,
    /// Parent already gone; record destroyed on the spot
    Reclaimed,
    /// No record (boot-time root process)
    Untracked,
}

/// Result of one exit pass over the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExitOutcome {
    pub own: OwnTransition,
    /// Identifiers whose records were destroyed, own record first
    pub reclaimed: Vec<Pid>,
    /// Running children that just lost their parent
    pub orphaned: Vec<Pid>,
    /// Whether waiters were woken
    pub broadcast: bool,
}

impl ExitOutcome {
    pub(crate) const fn untracked() -> Self {
        Self {
            own: OwnTransition::Untracked,
            reclaimed: Vec::new(),
            orphaned: Vec::new(),
            broadcast: false,
        }
    }
}
