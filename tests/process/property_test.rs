/*!
 * Property Tests
 * Random fork/exit/wait sequences against the table and allocator invariants
 */

use super::support::{queue_manager, QueueHost};
use lifecycle_kernel::{Pid, Process, ProcessError, ProcessManager};
use proptest::prelude::*;
use std::collections::HashSet;

const PID_MAX: Pid = 8;

#[derive(Debug, Clone)]
enum Op {
    Root,
    Fork(usize),
    Exit(usize, i32),
    Wait(usize, usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        1 => Just(Op::Root),
        4 => any::<usize>().prop_map(Op::Fork),
        3 => (any::<usize>(), -5i32..5).prop_map(|(i, code)| Op::Exit(i, code)),
        2 => (any::<usize>(), any::<usize>()).prop_map(|(i, j)| Op::Wait(i, j)),
    ]
}

struct Model {
    manager: ProcessManager<QueueHost>,
    alive: Vec<Process<QueueHost>>,
}

impl Model {
    fn new() -> Self {
        Self {
            manager: queue_manager(PID_MAX),
            alive: Vec::new(),
        }
    }

    fn apply(&mut self, op: Op) -> Result<(), TestCaseError> {
        match op {
            Op::Root => match self.manager.create_root("root", None) {
                Ok(process) => self.alive.push(process),
                Err(e) => self.check_fork_failure(e)?,
            },
            Op::Fork(i) => {
                if self.alive.is_empty() {
                    return Ok(());
                }
                let parent = &self.alive[i % self.alive.len()];
                match self.manager.fork(parent, &()) {
                    Ok(pid) => {
                        let child = self.manager.host().take(pid);
                        prop_assert_eq!(child.parent_pid(), Some(parent.pid()));
                        self.alive.push(child);
                    }
                    Err(e) => self.check_fork_failure(e)?,
                }
            }
            Op::Exit(i, code) => {
                if self.alive.is_empty() {
                    return Ok(());
                }
                let process = self.alive.swap_remove(i % self.alive.len());
                self.manager.exit(process, code);
            }
            Op::Wait(i, j) => {
                let records = self.manager.records();
                if self.alive.is_empty() || records.is_empty() {
                    return Ok(());
                }
                let caller = &self.alive[i % self.alive.len()];
                let target = &records[j % records.len()];

                let is_child = target.is_child_of(caller.pid());
                if is_child && target.exit_code().is_none() {
                    // Would block: nobody else is going to run the child
                    return Ok(());
                }

                let result = self.manager.waitpid(caller, target.pid);
                if is_child {
                    prop_assert_eq!(result, Ok(target.exit_code().unwrap()));
                } else {
                    prop_assert_eq!(
                        result,
                        Err(ProcessError::NotMyChild {
                            caller: caller.pid(),
                            target: target.pid
                        })
                    );
                }
            }
        }
        self.check_invariants()
    }

    fn check_fork_failure(&self, err: ProcessError) -> Result<(), TestCaseError> {
        prop_assert_eq!(err, ProcessError::LimitReached { limit: PID_MAX });
        prop_assert_eq!(self.manager.pids_in_use(), PID_MAX as usize);
        Ok(())
    }

    fn check_invariants(&self) -> Result<(), TestCaseError> {
        let records = self.manager.records();
        let free = self.manager.free_pids();

        let record_pids: HashSet<Pid> = records.iter().map(|r| r.pid).collect();
        prop_assert_eq!(record_pids.len(), records.len(), "duplicate record");

        let alive_pids: HashSet<Pid> = self.alive.iter().map(|p| p.pid()).collect();
        prop_assert_eq!(alive_pids.len(), self.alive.len(), "duplicate live pid");

        let free_set: HashSet<Pid> = free.iter().copied().collect();
        prop_assert_eq!(free_set.len(), free.len(), "duplicate free pid");
        prop_assert!(free_set.is_disjoint(&alive_pids));
        prop_assert!(free_set.is_disjoint(&record_pids));

        for record in &records {
            // A record whose parent already exited would have been removed
            prop_assert!(!(record.child_exited && record.parent_exited));
            prop_assert_eq!(record.child_exited, !alive_pids.contains(&record.pid));
        }

        let zombies = records.iter().filter(|r| r.child_exited).count();
        prop_assert_eq!(self.manager.pids_in_use(), self.alive.len() + zombies);
        prop_assert!(self.manager.high_water_mark() <= PID_MAX + 1);
        Ok(())
    }

    fn drain(mut self) -> Result<(), TestCaseError> {
        while let Some(process) = self.alive.pop() {
            self.manager.exit(process, 0);
            self.check_invariants()?;
        }
        prop_assert!(self.manager.records().is_empty());
        prop_assert_eq!(self.manager.pids_in_use(), 0);
        prop_assert_eq!(self.manager.host().parked(), 0);
        prop_assert_eq!(self.manager.host().live_containers(), 0);
        Ok(())
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_lifecycle_invariants_hold(ops in prop::collection::vec(op(), 1..64)) {
        let mut model = Model::new();
        for op in ops {
            model.apply(op)?;
        }
        model.drain()?;
    }
}
