/*!
 * Process Registry
 *
 * Table of live and zombie process records plus the exit/wait protocol.
 *
 * # Locking
 *
 * One mutex guards every record and one condition variable is tied to it.
 * Every exit broadcasts on that condition, so each waiter wakes on every
 * exit and re-checks its own target (O(waiters) per exit).
 *
 * Lookup is a linear scan; the table holds one entry per process that is
 * running or whose exit code is still owed to a parent.
 */

use super::types::{ExitOutcome, OwnTransition, ProcessRecord};
use crate::core::errors::{ProcessError, ProcessResult};
use crate::core::types::{ExitCode, Pid};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

/// Authoritative process record table
pub struct Registry {
    records: Mutex<Vec<ProcessRecord>>,
    exited: Condvar,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            exited: Condvar::new(),
        }
    }

    /// Admit a freshly forked child
    pub fn insert(&self, record: ProcessRecord) {
        let mut records = self.records.lock();
        debug_assert!(
            records.iter().all(|r| r.pid != record.pid),
            "pid {} already has a record",
            record.pid
        );
        trace!(pid = record.pid, parent = record.parent_pid, "record inserted");
        records.push(record);
    }

    /// Copies of every record matching `predicate`
    pub fn find_all<P>(&self, predicate: P) -> Vec<ProcessRecord>
    where
        P: Fn(&ProcessRecord) -> bool,
    {
        self.records
            .lock()
            .iter()
            .filter(|r| predicate(r))
            .cloned()
            .collect()
    }

    pub fn get(&self, pid: Pid) -> Option<ProcessRecord> {
        self.records.lock().iter().find(|r| r.pid == pid).cloned()
    }

    pub fn snapshot(&self) -> Vec<ProcessRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Drop the record of a child that never started running
    ///
    /// Only a record nobody has touched yet is removed.
    pub fn remove_unclaimed(&self, pid: Pid) -> bool {
        let mut records = self.records.lock();
        match records
            .iter()
            .position(|r| r.pid == pid && !r.child_exited && !r.parent_exited)
        {
            Some(idx) => {
                records.swap_remove(idx);
                trace!(pid, "unclaimed record removed");
                true
            }
            None => false,
        }
    }

    /// Run both exit passes for `pid` in one critical section
    ///
    /// Reclaimed identifiers are returned, not released: the caller hands
    /// them to the allocator after this lock is dropped.
    pub fn exit(&self, pid: Pid, code: ExitCode) -> ExitOutcome {
        let mut records = self.records.lock();
        let mut outcome = ExitOutcome::untracked();

        // Own record
        if let Some(idx) = records.iter().position(|r| r.pid == pid) {
            let record = &mut records[idx];
            record.child_exited = true;

            if record.is_reclaimable() {
                records.swap_remove(idx);
                outcome.own = OwnTransition::Reclaimed;
                outcome.reclaimed.push(pid);
            } else {
                record.store_exit_code(code);
                outcome.own = OwnTransition::Zombie;
                outcome.broadcast = true;
                self.exited.notify_all();
            }
        }

        // Children
        records.retain_mut(|record| {
            if !record.is_child_of(pid) {
                return true;
            }
            record.parent_exited = true;
            if record.is_reclaimable() {
                outcome.reclaimed.push(record.pid);
                false
            } else {
                outcome.orphaned.push(record.pid);
                true
            }
        });

        debug!(
            pid,
            code,
            own = ?outcome.own,
            reclaimed = ?outcome.reclaimed,
            orphaned = ?outcome.orphaned,
            "exit protocol applied"
        );
        outcome
    }

    /// Block until `target` has exited and return its exit code
    ///
    /// Restricted to the direct, still-running parent. Does not reclaim.
    pub fn wait(&self, caller: Pid, target: Pid) -> ProcessResult<ExitCode> {
        let mut records = self.records.lock();

        loop {
            let record = records
                .iter()
                .find(|r| r.pid == target)
                .ok_or(ProcessError::NoSuchProcess(target))?;

            if !record.is_child_of(caller) {
                return Err(ProcessError::NotMyChild { caller, target });
            }

            if let Some(code) = record.exit_code() {
                return Ok(code);
            }

            trace!(caller, target, "waiting for child exit");
            self.exited.wait(&mut records);
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
