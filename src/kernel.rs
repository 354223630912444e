//! Kernel Instance
//!
//! Owns the global tables and the collaborators they call into. One
//! [`Kernel`] is created at boot and lives until `halt`; there is no other
//! global mutable state.

use alloc::string::String;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};

use crate::config::{HaltPolicy, KernelConfig};
use crate::console::Console;
use crate::error::{KResult, KernelError};
use crate::exception::{self, ExceptionCause, TrapFrame};
use crate::fs::OpenFileRegistry;
use crate::proc::{ExitReport, ExitStatus, Loader, Pid, ProcessTable};
use crate::sched::Scheduler;
use crate::storage::FileSystem;
use crate::syscall::{self, Disposition};

pub struct Kernel {
    config: KernelConfig,
    console: Arc<dyn Console>,
    registry: OpenFileRegistry,
    processes: ProcessTable,
    scheduler: Arc<dyn Scheduler>,
    halted: AtomicBool,
}

impl Kernel {
    pub fn new(
        config: KernelConfig,
        fs: Arc<dyn FileSystem>,
        loader: Arc<dyn Loader>,
        scheduler: Arc<dyn Scheduler>,
        console: Arc<dyn Console>,
    ) -> Self {
        Self {
            config,
            console,
            registry: OpenFileRegistry::new(fs),
            processes: ProcessTable::new(loader, scheduler.clone(), config.fd_capacity),
            scheduler,
            halted: AtomicBool::new(false),
        }
    }

    /// Start a top-level process. The first one booted is the root.
    pub fn boot(&self, program: &str, args: &[String]) -> KResult<Pid> {
        if self.is_halted() {
            return Err(KernelError::PermissionDenied);
        }
        info!("[KERNEL] booting '{}'", program);
        self.processes.spawn(None, program, args)
    }

    /// Syscall entry for process `pid`.
    pub fn syscall(&self, pid: Pid, number: usize, args: [usize; 4]) -> Disposition {
        syscall::dispatch(self, pid, number, args)
    }

    /// Exception entry for process `pid`.
    pub fn handle_exception(&self, pid: Pid, cause: ExceptionCause, frame: &mut TrapFrame) -> Disposition {
        exception::handle_exception(self, pid, cause, frame)
    }

    /// End process `pid` and halt if nothing is left running.
    pub fn exit_process(&self, pid: Pid, status: ExitStatus) -> Disposition {
        self.after_exit(self.processes.exit(pid, status, &self.registry))
    }

    /// Kill `pid` after an exception.
    pub fn terminate(&self, pid: Pid, cause: ExceptionCause) -> Disposition {
        self.after_exit(self.processes.terminate(pid, cause, &self.registry))
    }

    fn after_exit(&self, result: KResult<ExitReport>) -> Disposition {
        match result {
            Ok(report) if report.running == 0 && self.config.halt_when_idle => {
                info!("[KERNEL] last process exited, halting");
                self.shutdown();
                Disposition::Halted
            }
            Ok(_) => Disposition::Exited,
            Err(_) if self.is_halted() => Disposition::Halted,
            Err(e) => Disposition::Resume(e.errno()),
        }
    }

    /// Halt on behalf of `caller`, subject to the configured policy.
    pub fn halt(&self, caller: Pid) -> KResult<()> {
        self.processes.process(caller)?;
        if self.config.halt_policy == HaltPolicy::RootOnly && self.processes.root() != Some(caller) {
            warn!("[KERNEL] {} may not halt", caller);
            return Err(KernelError::PermissionDenied);
        }
        info!("[KERNEL] halt requested by {}", caller);
        self.shutdown();
        Ok(())
    }

    /// Tear the tables down without draining and power off.
    fn shutdown(&self) {
        if self.halted.swap(true, Ordering::SeqCst) {
            return;
        }
        self.processes.shutdown();
        self.registry.clear();
        self.scheduler.halt();
    }

    #[inline]
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn console(&self) -> &dyn Console {
        self.console.as_ref()
    }

    pub fn registry(&self) -> &OpenFileRegistry {
        &self.registry
    }

    pub fn processes(&self) -> &ProcessTable {
        &self.processes
    }
}
