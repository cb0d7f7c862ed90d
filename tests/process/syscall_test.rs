/*!
 * Syscall Surface Tests
 * fork/getpid/waitpid/_exit as seen from user space
 */

use super::support::queue_manager;
use lifecycle_kernel::core::errors::errno;
use lifecycle_kernel::core::limits::DEFAULT_PID_MAX;
use lifecycle_kernel::{
    program, ExitCode, Fault, ProcessManager, SyscallExecutor, SyscallResult, ThreadHost,
    TrapFrame,
};
use pretty_assertions::assert_eq;

#[test]
fn test_fork_wait_exit_round() {
    let executor = SyscallExecutor::new(queue_manager(DEFAULT_PID_MAX));
    let manager = executor.manager();
    let parent = manager.create_root("sh", None).unwrap();

    assert_eq!(executor.sys_getpid(&parent), SyscallResult::success(1u32));

    let forked = executor.sys_fork(&parent, &());
    assert_eq!(forked, SyscallResult::success(2u32));
    let child = manager.host().take(2);
    assert_eq!(executor.sys_getpid(&child), SyscallResult::success(2u32));

    executor.sys_exit(child, 7);

    let mut status: ExitCode = -1;
    let result = executor.sys_waitpid(&parent, 2, Some(&mut status), 0);
    assert_eq!(result, SyscallResult::success(2u32));
    assert_eq!(status, 7);

    executor.sys_exit(parent, 0);
    assert_eq!(executor.manager().pids_in_use(), 0);
}

#[test]
fn test_waitpid_argument_errors() {
    let executor = SyscallExecutor::new(queue_manager(DEFAULT_PID_MAX));
    let manager = executor.manager();
    let parent = manager.create_root("sh", None).unwrap();
    let other = manager.create_root("other", None).unwrap();
    let child = executor.sys_fork(&parent, &()).value().unwrap() as u32;

    let mut status: ExitCode = 0;
    let result = executor.sys_waitpid(&parent, child, Some(&mut status), 1);
    assert_eq!(result.errno(), Some(errno::EINVAL));

    let result = executor.sys_waitpid(&parent, child, None, 0);
    assert_eq!(result.errno(), Some(errno::EFAULT));

    let result = executor.sys_waitpid(&parent, 99, Some(&mut status), 0);
    assert_eq!(result.errno(), Some(errno::ESRCH));

    let result = executor.sys_waitpid(&other, child, Some(&mut status), 0);
    assert_eq!(result.errno(), Some(errno::ECHILD));

    // Rejected calls never touch the status slot
    assert_eq!(status, 0);
}

#[test]
fn test_fork_reports_pid_exhaustion() {
    let executor = SyscallExecutor::new(queue_manager(2));
    let parent = executor.manager().create_root("sh", None).unwrap();

    assert!(executor.sys_fork(&parent, &()).is_success());
    let result = executor.sys_fork(&parent, &());
    assert_eq!(result.errno(), Some(errno::EAGAIN));
}

#[test]
fn test_fork_reports_allocation_failure() {
    let manager = ProcessManager::new(ThreadHost::new()).unwrap();
    let executor = SyscallExecutor::new(manager.clone());
    let parent = manager.create_root("sh", None).unwrap();

    manager.host().inject(Fault::CopyContext);
    let result = executor.sys_fork(&parent, &TrapFrame::new(program(|_| 0)));
    assert_eq!(result.errno(), Some(errno::ENOMEM));

    match result {
        SyscallResult::Error { message, .. } => assert!(message.contains("trapframe")),
        other => panic!("expected an error, got {other:?}"),
    }

    executor.sys_exit(parent, 0);
}

#[test]
fn test_syscall_result_wire_format() {
    let json = serde_json::to_value(SyscallResult::success(5u32)).unwrap();
    assert_eq!(json, serde_json::json!({ "status": "success", "value": 5 }));

    let json = serde_json::to_value(SyscallResult::error(errno::ECHILD, "not a child")).unwrap();
    assert_eq!(json["status"], "error");
    assert_eq!(json["errno"], errno::ECHILD);
}
