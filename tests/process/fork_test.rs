/*!
 * Fork Tests
 * Resource hand-off and rollback on the threaded host
 */

use lifecycle_kernel::host::{DEFAULT_ADDRESS_SPACE_SIZE, PANIC_EXIT_CODE};
use lifecycle_kernel::{
    program, Fault, Pid, Process, ProcessError, ProcessManager, ThreadHost, TrapFrame,
};
use pretty_assertions::assert_eq;
use std::thread;
use std::time::Duration;

fn boot() -> (ProcessManager<ThreadHost>, Process<ThreadHost>) {
    let manager = ProcessManager::new(ThreadHost::new()).unwrap();
    let space = manager
        .host()
        .create_address_space(DEFAULT_ADDRESS_SPACE_SIZE);
    let init = manager.create_root("init", Some(space)).unwrap();
    (manager, init)
}

fn exiting_with(code: i32) -> TrapFrame {
    TrapFrame::new(program(move |_| code))
}

#[derive(Debug, PartialEq, Eq)]
struct Footprint {
    mark: Pid,
    free: Vec<Pid>,
    records: usize,
    containers: usize,
    spaces: usize,
}

fn footprint(manager: &ProcessManager<ThreadHost>) -> Footprint {
    Footprint {
        mark: manager.high_water_mark(),
        free: manager.free_pids(),
        records: manager.records().len(),
        containers: manager.host().live_containers(),
        spaces: manager.host().live_address_spaces(),
    }
}

#[test]
fn test_fork_returns_child_pid_and_child_exit_code() {
    let (manager, init) = boot();

    let child = manager.fork(&init, &exiting_with(42)).unwrap();
    assert_eq!(child, 2);
    assert_eq!(manager.waitpid(&init, child), Ok(42));

    let record = manager.record(child).unwrap();
    assert_eq!(record.parent_pid, init.pid());
    assert_eq!(record.exit_code(), Some(42));

    manager.exit(init, 0);
    manager.host().join_all();

    assert!(manager.records().is_empty());
    assert_eq!(manager.host().live_containers(), 0);
    assert_eq!(manager.host().live_address_spaces(), 0);
    assert_eq!(manager.stats().forks, 1);
}

#[test]
fn test_every_collaborator_failure_rolls_back() {
    for fault in [
        Fault::CreateContainer,
        Fault::CopyContext,
        Fault::CopyAddressSpace,
        Fault::SpawnThread,
    ] {
        let (manager, init) = boot();
        let before = footprint(&manager);

        manager.host().inject(fault);
        let err = manager.fork(&init, &exiting_with(0)).unwrap_err();

        assert!(
            matches!(err, ProcessError::OutOfMemory(_)),
            "{fault:?} produced {err:?}"
        );
        assert!(err.is_resource_exhausted());
        assert_eq!(footprint(&manager), before, "{fault:?} leaked state");
        assert_eq!(manager.stats().fork_failures, 1);

        // The rolled back pid is the next one handed out
        let child = manager.fork(&init, &exiting_with(1)).unwrap();
        assert_eq!(child, 2, "{fault:?}");
        assert_eq!(manager.waitpid(&init, child), Ok(1));

        manager.exit(init, 0);
        manager.host().join_all();
        assert_eq!(manager.host().live_containers(), 0);
        assert_eq!(manager.host().live_address_spaces(), 0);
        assert_eq!(manager.pids_in_use(), 0);
    }
}

#[test]
fn test_spawn_failure_leaves_no_record() {
    let (manager, init) = boot();
    manager.host().inject(Fault::SpawnThread);

    assert!(manager.fork(&init, &exiting_with(0)).is_err());
    assert!(manager.record(2).is_none());
    assert!(manager.children(init.pid()).is_empty());
    assert_eq!(
        manager.waitpid(&init, 2),
        Err(ProcessError::NoSuchProcess(2))
    );

    manager.exit(init, 0);
}

#[test]
fn test_rollback_of_recycled_pid_restores_pool() {
    let (manager, init) = boot();
    let spare = manager.create_root("spare", None).unwrap();
    let last = manager.create_root("last", None).unwrap();
    manager.exit(spare, 0);
    assert_eq!(manager.free_pids(), vec![2]);

    let before = footprint(&manager);
    manager.host().inject(Fault::SpawnThread);
    assert!(manager.fork(&init, &exiting_with(0)).is_err());
    assert_eq!(footprint(&manager), before);

    // Recycled id first, then the high-water mark
    assert_eq!(manager.fork(&init, &exiting_with(0)), Ok(2));
    assert_eq!(manager.fork(&init, &exiting_with(0)), Ok(4));

    manager.exit(last, 0);
    manager.exit(init, 0);
    manager.host().join_all();
    assert_eq!(manager.pids_in_use(), 0);
}

#[test]
fn test_child_gets_private_address_space_copy() {
    let (manager, init) = boot();
    let (tx, rx) = flume::unbounded();

    let frame = TrapFrame::new(program(move |s| {
        let space = s.process().address_space().unwrap();
        tx.send(space.bytes().len()).unwrap();
        0
    }));
    let child = manager.fork(&init, &frame).unwrap();
    manager.waitpid(&init, child).unwrap();

    assert_eq!(rx.recv().unwrap(), DEFAULT_ADDRESS_SPACE_SIZE);
    manager.exit(init, 0);
    manager.host().join_all();
    assert_eq!(manager.host().live_address_spaces(), 0);
}

#[test]
fn test_fork_without_address_space() {
    let manager = ProcessManager::new(ThreadHost::new()).unwrap();
    let init = manager.create_root("bare", None).unwrap();

    let (tx, rx) = flume::unbounded();
    let frame = TrapFrame::new(program(move |s| {
        tx.send(s.process().address_space().is_none()).unwrap();
        3
    }));

    // A copy fault can't fire when there is nothing to copy
    manager.host().inject(Fault::CopyAddressSpace);
    let child = manager.fork(&init, &frame).unwrap();
    assert_eq!(manager.waitpid(&init, child), Ok(3));
    assert!(rx.recv().unwrap());

    manager.exit(init, 0);
    manager.host().join_all();
    assert_eq!(manager.host().live_address_spaces(), 0);
}

#[test]
fn test_child_name_inherited_from_parent() {
    let (manager, init) = boot();
    let (tx, rx) = flume::unbounded();

    let frame = TrapFrame::new(program(move |s| {
        tx.send(s.process().name().to_string()).unwrap();
        0
    }));
    let child = manager.fork(&init, &frame).unwrap();
    manager.waitpid(&init, child).unwrap();

    assert_eq!(rx.recv().unwrap(), "init");
    manager.exit(init, 0);
    manager.host().join_all();
}

#[test]
fn test_panicking_child_still_exits() {
    let (manager, init) = boot();
    let frame = TrapFrame::new(program(|_| panic!("child program failed")));
    let child = manager.fork(&init, &frame).unwrap();

    // The parent waits on its own thread so a stuck wait fails the test
    let (tx, rx) = flume::bounded(1);
    let parent = manager.clone();
    thread::spawn(move || {
        let result = parent.waitpid(&init, child);
        parent.exit(init, 0);
        tx.send(result).unwrap();
    });

    let result = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("parent still blocked in waitpid");
    assert_eq!(result, Ok(PANIC_EXIT_CODE));

    manager.host().join_all();
    assert!(manager.records().is_empty());
    assert_eq!(manager.pids_in_use(), 0);
    assert_eq!(manager.host().live_containers(), 0);
    assert_eq!(manager.host().live_address_spaces(), 0);
}

#[test]
fn test_finished_threads_are_not_held() {
    const ROUNDS: usize = 200;

    let manager = ProcessManager::new(ThreadHost::new()).unwrap();
    let frame = exiting_with(0);

    for _ in 0..ROUNDS {
        let init = manager.create_root("init", None).unwrap();
        let child = manager.fork(&init, &frame).unwrap();
        assert_eq!(manager.waitpid(&init, child), Ok(0));
        manager.exit(init, 0);
    }

    // Only children still tearing down when the next one spawned remain
    let held = manager.host().held_threads();
    assert!(held < ROUNDS / 4, "{held} handles held after {ROUNDS} children");

    manager.host().join_all();
    assert_eq!(manager.host().held_threads(), 0);
    assert_eq!(manager.pids_in_use(), 0);
}
