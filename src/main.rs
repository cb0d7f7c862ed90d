/*!
 * Lifecycle Kernel - Main Entry Point
 *
 * Boots the process lifecycle kernel on the threaded simulation host and runs
 * an init program that forks a small process tree, waits for its children and
 * exits. Final lifecycle statistics are printed as JSON.
 */

use lifecycle_kernel::{
    init_tracing, program, run_root, ExitCode, KernelConfig, ProcessManager, Session, ThreadHost,
};
use miette::{IntoDiagnostic, Result};
use tracing::info;

/// Children init forks
const INIT_CHILDREN: u32 = 4;

/// Grandchild spawned by each child; it outlives its parent
fn worker(session: &Session<'_>) -> ExitCode {
    let me = session.getpid();
    let orphan = session.fork(program(|s| {
        info!(pid = s.getpid(), "orphan finishing");
        0
    }));
    if let Err(e) = orphan {
        info!(pid = me, error = %e, "worker could not fork");
    }
    (me % 100) as ExitCode
}

fn init(session: &Session<'_>) -> ExitCode {
    let mut children = Vec::new();
    for _ in 0..INIT_CHILDREN {
        match session.fork(program(worker)) {
            Ok(pid) => children.push(pid),
            Err(e) => info!(error = %e, "init could not fork"),
        }
    }

    for pid in children {
        match session.waitpid(pid) {
            Ok(code) => info!(pid, code, "child reaped"),
            Err(e) => info!(pid, error = %e, "waitpid failed"),
        }
    }
    0
}

fn main() -> Result<()> {
    init_tracing();

    info!("Lifecycle kernel starting...");

    let config = KernelConfig::from_env()?;
    let manager = ProcessManager::<ThreadHost>::builder()
        .with_config(config)
        .build(ThreadHost::new())?;

    let code = run_root(&manager, "init", program(init))?;
    manager.host().join_all();

    info!(code, records = manager.records().len(), "init exited");

    let stats = serde_json::to_string_pretty(&manager.stats()).into_diagnostic()?;
    println!("{stats}");
    Ok(())
}
