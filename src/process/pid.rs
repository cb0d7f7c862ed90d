/*!
 * Process Identifier Allocator
 *
 * Bounded identifier space with FIFO recycling. Identifiers come from the
 * free pool first and from the high-water mark only when the pool is empty.
 *
 * The allocator has its own lock. It is never taken while the registry lock
 * is held, so fork and exit can't invert lock order.
 */

use crate::core::errors::{ProcessError, ProcessResult};
use crate::core::limits::{PID_MIN, PID_RESERVED};
use crate::core::types::Pid;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::{debug, trace};

struct PidState {
    /// Next never-yet-used identifier
    next: Pid,
    /// Reclaimed identifiers, oldest first
    free: VecDeque<Pid>,
}

/// Identifier allocator with recycling support
pub struct PidAllocator {
    pid_max: Pid,
    state: Mutex<PidState>,
}

impl PidAllocator {
    /// Create an allocator handing out `PID_MIN..=pid_max`
    pub fn new(pid_max: Pid) -> Self {
        Self {
            pid_max,
            state: Mutex::new(PidState {
                next: PID_MIN,
                free: VecDeque::new(),
            }),
        }
    }

    /// Hand out an unused identifier
    ///
    /// Fails with `LimitReached` when the pool is empty and the high-water
    /// mark is past the bound. The mark is left untouched in that case.
    pub fn acquire(&self) -> ProcessResult<Pid> {
        let mut state = self.state.lock();

        if let Some(pid) = state.free.pop_front() {
            trace!(pid, "reusing recycled pid");
            return Ok(pid);
        }

        if state.next > self.pid_max {
            debug!(pid_max = self.pid_max, "pid space exhausted");
            return Err(ProcessError::LimitReached {
                limit: self.pid_max,
            });
        }

        let pid = state.next;
        state.next += 1;
        Ok(pid)
    }

    /// Return a fully retired identifier to the back of the free pool
    ///
    /// Callers guarantee no record still carries `pid`.
    pub fn release(&self, pid: Pid) {
        debug_assert_ne!(pid, PID_RESERVED, "reserved pid can't be released");
        self.state.lock().free.push_back(pid);
        trace!(pid, "pid released");
    }

    /// Undo a speculative `acquire` for a fork that never became visible
    ///
    /// Only the latest high-water allocation moves the mark back. Anything
    /// else (a recycled id, or one overtaken by a concurrent fork) goes back
    /// to the front of the pool so it is the next one handed out.
    pub fn rollback(&self, pid: Pid) {
        let mut state = self.state.lock();
        if pid.checked_add(1) == Some(state.next) {
            state.next = pid;
        } else {
            state.free.push_front(pid);
        }
        trace!(pid, "pid rolled back");
    }

    /// Next never-yet-used identifier
    pub fn high_water_mark(&self) -> Pid {
        self.state.lock().next
    }

    /// Recycled identifiers in the order they will be reused
    pub fn free_pool(&self) -> Vec<Pid> {
        self.state.lock().free.iter().copied().collect()
    }

    /// Identifiers currently handed out
    pub fn in_use(&self) -> usize {
        let state = self.state.lock();
        (state.next - PID_MIN) as usize - state.free.len()
    }

    #[inline]
    pub fn pid_max(&self) -> Pid {
        self.pid_max
    }
}
