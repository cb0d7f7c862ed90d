/*!
 * Threaded Simulation Host
 *
 * Runs every simulated process on its own OS thread. Address spaces are byte
 * buffers and a saved context is a register snapshot plus the program the
 * process resumes into.
 *
 * Each fallible collaborator call can be armed to fail once, which makes
 * every fork rollback path reachable from tests.
 */

use crate::core::errors::ProcessResult;
use crate::core::types::{ExitCode, Pid};
use crate::process::manager::{Process, ProcessManager};
use crate::process::traits::{ExecutionHost, ForkedTask, HostError, HostResult, SpawnError};
use parking_lot::Mutex;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{trace, warn};

/// Default size of a root process's address space
pub const DEFAULT_ADDRESS_SPACE_SIZE: usize = 4096;

/// Exit code of a process whose program panicked
pub const PANIC_EXIT_CODE: ExitCode = 255;

/// Code a simulated process runs; its return value is the exit code
pub type Program = Arc<dyn Fn(&Session<'_>) -> ExitCode + Send + Sync>;

/// Wrap a closure as a [`Program`]
pub fn program<F>(f: F) -> Program
where
    F: Fn(&Session<'_>) -> ExitCode + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Saved user registers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    /// Syscall return value
    pub retval: i64,
    /// Syscall error flag
    pub error: bool,
    /// Program counter
    pub pc: u64,
}

/// Saved execution context
#[derive(Clone)]
pub struct TrapFrame {
    pub registers: Registers,
    program: Program,
}

impl TrapFrame {
    pub fn new(program: Program) -> Self {
        Self {
            registers: Registers::default(),
            program,
        }
    }

    /// Same registers, different continuation
    pub fn with_program(&self, program: Program) -> Self {
        Self {
            registers: self.registers,
            program,
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }
}

impl fmt::Debug for TrapFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrapFrame")
            .field("registers", &self.registers)
            .finish_non_exhaustive()
    }
}

/// Simulated address space
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimAddressSpace {
    bytes: Vec<u8>,
}

impl SimAddressSpace {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

/// Host-side process container
#[derive(Debug)]
pub struct SimContainer {
    name: String,
}

impl SimContainer {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Collaborator call that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    CreateContainer,
    CopyContext,
    CopyAddressSpace,
    SpawnThread,
}

const FAULT_KINDS: usize = 4;

/// Execution host backed by OS threads
pub struct ThreadHost {
    faults: [AtomicBool; FAULT_KINDS],
    live_containers: AtomicUsize,
    live_address_spaces: AtomicUsize,
    /// Handles of process threads not yet joined
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadHost {
    pub fn new() -> Self {
        Self {
            faults: Default::default(),
            live_containers: AtomicUsize::new(0),
            live_address_spaces: AtomicUsize::new(0),
            threads: Mutex::new(Vec::new()),
        }
    }

    /// Make the next call of `fault`'s kind fail
    pub fn inject(&self, fault: Fault) {
        self.faults[fault as usize].store(true, Ordering::SeqCst);
    }

    fn take_fault(&self, fault: Fault) -> bool {
        let hit = self.faults[fault as usize].swap(false, Ordering::SeqCst);
        if hit {
            trace!(?fault, "injected fault triggered");
        }
        hit
    }

    /// Fresh zeroed address space, for root processes
    pub fn create_address_space(&self, size: usize) -> SimAddressSpace {
        self.live_address_spaces.fetch_add(1, Ordering::SeqCst);
        SimAddressSpace {
            bytes: vec![0; size],
        }
    }

    pub fn live_containers(&self) -> usize {
        self.live_containers.load(Ordering::SeqCst)
    }

    pub fn live_address_spaces(&self) -> usize {
        self.live_address_spaces.load(Ordering::SeqCst)
    }

    /// Thread handles still held; finished threads are joined on each spawn
    pub fn held_threads(&self) -> usize {
        self.threads.lock().len()
    }

    /// Join every process thread, including ones spawned while joining
    pub fn join_all(&self) {
        loop {
            let handles = std::mem::take(&mut *self.threads.lock());
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if handle.join().is_err() {
                    warn!("process thread panicked before exiting");
                }
            }
        }
    }
}

impl Default for ThreadHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionHost for ThreadHost {
    type Container = SimContainer;
    type AddressSpace = SimAddressSpace;
    type Context = TrapFrame;

    fn create_container(&self, name: &str) -> HostResult<SimContainer> {
        if self.take_fault(Fault::CreateContainer) {
            return Err(HostError::OutOfMemory("process container"));
        }
        self.live_containers.fetch_add(1, Ordering::SeqCst);
        Ok(SimContainer {
            name: name.to_string(),
        })
    }

    fn destroy_container(&self, _container: SimContainer) {
        self.live_containers.fetch_sub(1, Ordering::SeqCst);
    }

    fn copy_context(&self, context: &TrapFrame) -> HostResult<TrapFrame> {
        if self.take_fault(Fault::CopyContext) {
            return Err(HostError::OutOfMemory("trapframe"));
        }
        Ok(context.clone())
    }

    fn copy_address_space(&self, space: &SimAddressSpace) -> HostResult<SimAddressSpace> {
        if self.take_fault(Fault::CopyAddressSpace) {
            return Err(HostError::OutOfMemory("address space"));
        }
        self.live_address_spaces.fetch_add(1, Ordering::SeqCst);
        Ok(space.clone())
    }

    fn destroy_address_space(&self, _space: SimAddressSpace) {
        self.live_address_spaces.fetch_sub(1, Ordering::SeqCst);
    }

    fn spawn_thread(&self, task: ForkedTask<Self>) -> Result<(), SpawnError<Self>> {
        if self.take_fault(Fault::SpawnThread) {
            return Err(SpawnError::new(
                HostError::ThreadSpawn("injected fault".into()),
                task,
            ));
        }

        let name = format!("{}[{}]", task.process.name(), task.process.pid());
        let slot = Arc::new(Mutex::new(Some(task)));
        let thread_slot = Arc::clone(&slot);

        let spawned = thread::Builder::new().name(name).spawn(move || {
            let task = thread_slot.lock().take();
            if let Some(task) = task {
                enter_forked_process(task);
            }
        });

        match spawned {
            Ok(handle) => {
                let mut threads = self.threads.lock();
                reap_finished(&mut threads);
                threads.push(handle);
                Ok(())
            }
            Err(e) => {
                let task = slot.lock().take();
                match task {
                    Some(task) => Err(SpawnError::new(
                        HostError::ThreadSpawn(e.to_string()),
                        task,
                    )),
                    None => Ok(()),
                }
            }
        }
    }
}

/// Join the handles of threads that have already terminated
fn reap_finished(threads: &mut Vec<JoinHandle<()>>) {
    let (finished, running): (Vec<_>, Vec<_>) = std::mem::take(threads)
        .into_iter()
        .partition(|handle| handle.is_finished());
    *threads = running;

    for handle in finished {
        if handle.join().is_err() {
            warn!("process thread panicked before exiting");
        }
    }
}

/// First code a forked child runs: fork returns 0 here
fn enter_forked_process(task: ForkedTask<ThreadHost>) {
    let ForkedTask {
        manager,
        process,
        mut context,
    } = task;

    context.registers.retval = 0;
    context.registers.error = false;
    context.registers.pc += 4;

    let code = Session::new(&manager, &process, &context).run();
    manager.exit(process, code);
}

/// Create a root process and run `program` as it on the calling thread
///
/// The process exits with the program's return value, which is also returned.
/// A panicking program exits with [`PANIC_EXIT_CODE`].
pub fn run_root(
    manager: &ProcessManager<ThreadHost>,
    name: &str,
    program: Program,
) -> ProcessResult<ExitCode> {
    let space = manager
        .host()
        .create_address_space(DEFAULT_ADDRESS_SPACE_SIZE);
    let process = manager.create_root(name, Some(space))?;
    let frame = TrapFrame::new(program);

    let code = Session::new(manager, &process, &frame).run();
    manager.exit(process, code);
    Ok(code)
}

/// What a running simulated process can do
pub struct Session<'a> {
    manager: &'a ProcessManager<ThreadHost>,
    process: &'a Process<ThreadHost>,
    frame: &'a TrapFrame,
}

impl<'a> Session<'a> {
    pub fn new(
        manager: &'a ProcessManager<ThreadHost>,
        process: &'a Process<ThreadHost>,
        frame: &'a TrapFrame,
    ) -> Self {
        Self {
            manager,
            process,
            frame,
        }
    }

    /// Run the program; a panic ends the process with [`PANIC_EXIT_CODE`]
    fn run(&self) -> ExitCode {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.frame.program)(self))) {
            Ok(code) => code,
            Err(_) => {
                warn!(pid = self.getpid(), "program panicked");
                PANIC_EXIT_CODE
            }
        }
    }

    pub fn getpid(&self) -> Pid {
        self.manager.current_pid(self.process)
    }

    pub fn parent_pid(&self) -> Option<Pid> {
        self.process.parent_pid()
    }

    /// Fork; the child resumes into `child` with this session's registers
    pub fn fork(&self, child: Program) -> ProcessResult<Pid> {
        let frame = self.frame.with_program(child);
        self.manager.fork(self.process, &frame)
    }

    pub fn waitpid(&self, pid: Pid) -> ProcessResult<ExitCode> {
        self.manager.waitpid(self.process, pid)
    }

    pub fn registers(&self) -> Registers {
        self.frame.registers
    }

    pub fn process(&self) -> &Process<ThreadHost> {
        self.process
    }

    pub fn manager(&self) -> &ProcessManager<ThreadHost> {
        self.manager
    }
}
