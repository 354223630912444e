//! Process Table
//!
//! Global record of every live or zombie process.
//!
//! # Invariants
//! - Pids are handed out in increasing order and never reused
//! - A record goes Running → Zombie once and Zombie → Reaped once; reaped
//!   records are dropped from the table
//! - A child set only shrinks through `join` or the parent's own exit
//! - Every state change happens under the table lock, and `join` re-checks
//!   the child's state under that same lock after every wakeup
//!
//! # Orphans
//! When a process exits, zombie children nobody can join any more are
//! discarded and running children are marked orphaned. An orphan (or a
//! process without a parent) is discarded the moment it exits.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;

use log::{debug, info};
use spin::Mutex;

use super::loader::Loader;
use super::process::Process;
use super::{ExitStatus, Pid, ProcessState, StartInfo};
use crate::error::{KResult, KernelError};
use crate::exception::ExceptionCause;
use crate::fs::OpenFileRegistry;
use crate::sched::Scheduler;
use crate::sync::Condvar;

/// Outcome of a successful exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitReport {
    pub pid: Pid,
    pub status: ExitStatus,
    /// Files released from the process's descriptor table.
    pub released: usize,
    /// Processes still running after this one left.
    pub running: usize,
}

#[derive(Debug)]
struct ProcessRecord {
    parent: Option<Pid>,
    children: BTreeSet<Pid>,
    state: ProcessState,
    exit_status: Option<ExitStatus>,
    process: Option<Arc<Process>>,
    orphaned: bool,
}

#[derive(Debug, Default)]
struct TableInner {
    records: BTreeMap<Pid, ProcessRecord>,
    next_pid: u32,
    running: usize,
    root: Option<Pid>,
}

impl TableInner {
    fn is_child(&self, parent: Pid, child: Pid) -> bool {
        self.records
            .get(&parent)
            .map_or(false, |r| r.children.contains(&child))
    }
}

/// The process table.
pub struct ProcessTable {
    inner: Mutex<TableInner>,
    exited: Condvar,
    loader: Arc<dyn Loader>,
    scheduler: Arc<dyn Scheduler>,
    fd_capacity: usize,
}

impl ProcessTable {
    pub fn new(loader: Arc<dyn Loader>, scheduler: Arc<dyn Scheduler>, fd_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(TableInner {
                next_pid: 1,
                ..TableInner::default()
            }),
            exited: Condvar::new(scheduler.clone()),
            loader,
            scheduler,
            fd_capacity,
        }
    }

    /// Load `name` and start it as a child of `parent`.
    ///
    /// A load failure leaves no record behind. `parent` of `None` starts a
    /// top-level process; the first one becomes the root.
    pub fn spawn(&self, parent: Option<Pid>, name: &str, args: &[String]) -> KResult<Pid> {
        let image = self.loader.load(name, args).map_err(|e| {
            debug!("[PROC] load '{}' failed: {}", name, e);
            KernelError::from(e)
        })?;

        let start = StartInfo {
            program: name.to_string(),
            entry: image.entry,
            stack_pointer: image.stack_pointer,
            argc: image.argc,
            argv: image.argv,
        };

        let pid = {
            let mut inner = self.inner.lock();
            if let Some(parent) = parent {
                match inner.records.get(&parent) {
                    Some(r) if r.state == ProcessState::Running => {}
                    _ => return Err(KernelError::NoSuchProcess),
                }
            }

            let pid = Pid(inner.next_pid);
            inner.next_pid += 1;
            let process = Arc::new(Process::new(
                pid,
                name.to_string(),
                image.space,
                self.fd_capacity,
            ));
            inner.records.insert(
                pid,
                ProcessRecord {
                    parent,
                    children: BTreeSet::new(),
                    state: ProcessState::Running,
                    exit_status: None,
                    process: Some(process),
                    orphaned: false,
                },
            );
            if let Some(parent) = parent {
                if let Some(record) = inner.records.get_mut(&parent) {
                    record.children.insert(pid);
                }
            } else if inner.root.is_none() {
                inner.root = Some(pid);
            }
            inner.running += 1;
            pid
        };

        info!("[PROC] spawned {} '{}' (parent {:?})", pid, name, parent.map(|p| p.0));
        self.scheduler.start(pid, start);
        Ok(pid)
    }

    /// Wait for `child` of `caller` to exit and reap it.
    ///
    /// Fails with `NotAChild` without blocking when `child` is not an
    /// unreaped child of `caller`.
    pub fn join(&self, caller: Pid, child: Pid) -> KResult<ExitStatus> {
        let mut inner = self.inner.lock();
        loop {
            if !inner.is_child(caller, child) {
                return Err(KernelError::NotAChild);
            }
            let state = inner.records.get(&child).map(|r| r.state);
            match state {
                Some(ProcessState::Running) => {
                    debug!("[PROC] {} waits for {}", caller, child);
                    inner = self.exited.wait(inner, &self.inner);
                }
                Some(ProcessState::Zombie) => {
                    let status = inner
                        .records
                        .remove(&child)
                        .and_then(|r| r.exit_status)
                        .ok_or(KernelError::NotAChild)?;
                    if let Some(record) = inner.records.get_mut(&caller) {
                        record.children.remove(&child);
                    }
                    debug!("[PROC] {} reaped {} ({:?})", caller, child, status);
                    return Ok(status);
                }
                _ => return Err(KernelError::NotAChild),
            }
        }
    }

    /// Terminate `pid` with `status`.
    ///
    /// Descriptors are closed first, outside the table lock, then the record
    /// turns Zombie and every joiner is woken.
    pub fn exit(&self, pid: Pid, status: ExitStatus, registry: &OpenFileRegistry) -> KResult<ExitReport> {
        let process = self.process(pid)?;
        let released = process.fds().lock().close_all(registry);

        let mut inner = self.inner.lock();
        let record = inner
            .records
            .get_mut(&pid)
            .filter(|r| r.state == ProcessState::Running)
            .ok_or(KernelError::NoSuchProcess)?;

        record.state = ProcessState::Zombie;
        record.exit_status = Some(status);
        record.process = None;
        let children = core::mem::take(&mut record.children);
        let discard = record.orphaned || record.parent.is_none();
        let parent = record.parent;

        for child in children {
            let zombie = match inner.records.get_mut(&child) {
                Some(r) if r.state == ProcessState::Zombie => true,
                Some(r) => {
                    r.orphaned = true;
                    false
                }
                None => false,
            };
            if zombie {
                inner.records.remove(&child);
                debug!("[PROC] discarded zombie {} of {}", child, pid);
            }
        }

        let parent_gone = parent.map_or(false, |p| !inner.records.contains_key(&p));
        if discard || parent_gone {
            inner.records.remove(&pid);
        }
        inner.running -= 1;
        let running = inner.running;
        drop(inner);

        self.exited.notify_all();
        info!("[PROC] {} exited with {:?}, {} still running", pid, status, running);
        Ok(ExitReport {
            pid,
            status,
            released,
            running,
        })
    }

    /// Kill `pid` after an exception.
    pub fn terminate(&self, pid: Pid, cause: ExceptionCause, registry: &OpenFileRegistry) -> KResult<ExitReport> {
        self.exit(pid, ExitStatus::Abnormal(cause), registry)
    }

    /// Handle to a running process.
    pub fn process(&self, pid: Pid) -> KResult<Arc<Process>> {
        self.inner
            .lock()
            .records
            .get(&pid)
            .and_then(|r| r.process.clone())
            .ok_or(KernelError::NoSuchProcess)
    }

    /// State of `pid`, `None` once the record is gone.
    pub fn state(&self, pid: Pid) -> Option<ProcessState> {
        self.inner.lock().records.get(&pid).map(|r| r.state)
    }

    pub fn parent(&self, pid: Pid) -> Option<Pid> {
        self.inner.lock().records.get(&pid).and_then(|r| r.parent)
    }

    /// Unreaped children of `pid`.
    pub fn children(&self, pid: Pid) -> Vec<Pid> {
        self.inner
            .lock()
            .records
            .get(&pid)
            .map(|r| r.children.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn exit_status(&self, pid: Pid) -> Option<ExitStatus> {
        self.inner.lock().records.get(&pid).and_then(|r| r.exit_status)
    }

    pub fn running_count(&self) -> usize {
        self.inner.lock().running
    }

    /// First top-level process.
    pub fn root(&self) -> Option<Pid> {
        self.inner.lock().root
    }

    /// Number of records, zombies included.
    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every record without draining and wake all joiners.
    pub(crate) fn shutdown(&self) {
        {
            let mut inner = self.inner.lock();
            inner.records.clear();
            inner.running = 0;
        }
        self.exited.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;
    use crate::fs::OpenMode;
    use crate::storage::RamFs;
    use crate::testing::{StaticLoader, YieldScheduler};

    fn table() -> (Arc<YieldScheduler>, ProcessTable, OpenFileRegistry) {
        let sched = Arc::new(YieldScheduler::default());
        let loader = Arc::new(StaticLoader::new(&["init", "child"]));
        let table = ProcessTable::new(loader, sched.clone(), 16);
        let reg = OpenFileRegistry::new(Arc::new(RamFs::new()));
        (sched, table, reg)
    }

    #[test]
    fn test_spawn_records_parent_and_root() {
        let (sched, table, _) = table();
        let init = table.spawn(None, "init", &[]).unwrap();
        let child = table.spawn(Some(init), "child", &[]).unwrap();
        assert!(child > init);
        assert_eq!(table.root(), Some(init));
        assert_eq!(table.parent(child), Some(init));
        assert_eq!(table.children(init), vec![child]);
        assert_eq!(table.running_count(), 2);
        assert_eq!(sched.started(), vec![init, child]);
    }

    #[test]
    fn test_spawn_load_failure_leaves_nothing() {
        let (sched, table, _) = table();
        let init = table.spawn(None, "init", &[]).unwrap();
        assert_eq!(
            table.spawn(Some(init), "missing", &[]),
            Err(KernelError::Load(LoadError::NotFound))
        );
        assert!(table.children(init).is_empty());
        assert_eq!(table.len(), 1);
        assert_eq!(sched.started().len(), 1);
    }

    #[test]
    fn test_join_after_exit_returns_status() {
        let (_, table, reg) = table();
        let init = table.spawn(None, "init", &[]).unwrap();
        let child = table.spawn(Some(init), "child", &[]).unwrap();
        table.exit(child, ExitStatus::Normal(7), &reg).unwrap();
        assert_eq!(table.state(child), Some(ProcessState::Zombie));
        assert_eq!(table.join(init, child), Ok(ExitStatus::Normal(7)));
        assert_eq!(table.state(child), None);
        // Already reaped.
        assert_eq!(table.join(init, child), Err(KernelError::NotAChild));
    }

    #[test]
    fn test_join_non_child_fails() {
        let (_, table, _) = table();
        let a = table.spawn(None, "init", &[]).unwrap();
        let b = table.spawn(None, "init", &[]).unwrap();
        assert_eq!(table.join(a, b), Err(KernelError::NotAChild));
        assert_eq!(table.join(a, Pid(999)), Err(KernelError::NotAChild));
    }

    #[test]
    fn test_join_blocks_until_exit() {
        let (_, table, reg) = table();
        let table = Arc::new(table);
        let init = table.spawn(None, "init", &[]).unwrap();
        let child = table.spawn(Some(init), "child", &[]).unwrap();

        let waiter = {
            let table = table.clone();
            std::thread::spawn(move || table.join(init, child))
        };
        while table.exited.waiter_count() == 0 {
            std::thread::yield_now();
        }
        table.exit(child, ExitStatus::Normal(-4), &reg).unwrap();
        assert_eq!(waiter.join().unwrap(), Ok(ExitStatus::Normal(-4)));
    }

    #[test]
    fn test_exit_closes_descriptors() {
        let (_, table, reg) = table();
        let init = table.spawn(None, "init", &[]).unwrap();
        let process = table.process(init).unwrap();
        process.fds().lock().open(&reg, "f", OpenMode::CREAT).unwrap();
        assert_eq!(reg.open_count(), 1);

        let report = table.exit(init, ExitStatus::Normal(0), &reg).unwrap();
        assert_eq!(report.released, 1);
        assert_eq!(report.running, 0);
        assert_eq!(reg.open_count(), 0);
        assert_eq!(table.process(init).err(), Some(KernelError::NoSuchProcess));
        assert_eq!(
            table.exit(init, ExitStatus::Normal(0), &reg).err(),
            Some(KernelError::NoSuchProcess)
        );
    }

    #[test]
    fn test_orphans_are_discarded() {
        let (_, table, reg) = table();
        let init = table.spawn(None, "init", &[]).unwrap();
        let parent = table.spawn(Some(init), "child", &[]).unwrap();
        let zombie = table.spawn(Some(parent), "child", &[]).unwrap();
        let orphan = table.spawn(Some(parent), "child", &[]).unwrap();

        table.exit(zombie, ExitStatus::Normal(1), &reg).unwrap();
        table.exit(parent, ExitStatus::Normal(0), &reg).unwrap();
        assert_eq!(table.state(zombie), None);
        assert_eq!(table.state(orphan), Some(ProcessState::Running));

        table.exit(orphan, ExitStatus::Normal(2), &reg).unwrap();
        assert_eq!(table.state(orphan), None);
        // The exited parent itself is still joinable by init.
        assert_eq!(table.join(init, parent), Ok(ExitStatus::Normal(0)));
    }

    #[test]
    fn test_terminate_is_abnormal() {
        let (_, table, reg) = table();
        let init = table.spawn(None, "init", &[]).unwrap();
        let child = table.spawn(Some(init), "child", &[]).unwrap();
        table.terminate(child, ExceptionCause::AddressError, &reg).unwrap();
        let status = table.join(init, child).unwrap();
        assert!(!status.is_normal());
        assert_eq!(status.code(), crate::config::ABNORMAL_EXIT_STATUS);
    }

    #[test]
    fn test_concurrent_spawns_get_unique_pids() {
        let (sched, table, _) = table();
        let table = Arc::new(table);
        let init = table.spawn(None, "init", &[]).unwrap();

        let spawners: Vec<_> = (0..8)
            .map(|_| {
                let table = table.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| table.spawn(Some(init), "child", &[]).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let pids: BTreeSet<Pid> = spawners
            .into_iter()
            .flat_map(|s| s.join().unwrap())
            .collect();

        assert_eq!(pids.len(), 400);
        assert!(!pids.contains(&init));
        assert_eq!(table.children(init).len(), 400);
        assert_eq!(table.running_count(), 401);
        assert_eq!(sched.started().len(), 401);
    }

    #[test]
    fn test_shutdown_wakes_joiners() {
        let (_, table, _) = table();
        let table = Arc::new(table);
        let init = table.spawn(None, "init", &[]).unwrap();
        let child = table.spawn(Some(init), "child", &[]).unwrap();
        let waiter = {
            let table = table.clone();
            std::thread::spawn(move || table.join(init, child))
        };
        while table.exited.waiter_count() == 0 {
            std::thread::yield_now();
        }
        table.shutdown();
        assert_eq!(waiter.join().unwrap(), Err(KernelError::NotAChild));
        assert!(table.is_empty());
    }
}
