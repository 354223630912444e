//! Thread-backed machine for driving the kernel through its syscall
//! boundary. Every user process is a host thread running a Rust closure.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::thread::{JoinHandle, Thread};

use userprog::console::Console;
use userprog::exception::{ExceptionCause, TrapFrame};
use userprog::mm::{AddressSpace, VirtAddr, PAGE_SIZE};
use userprog::proc::{Loader, Pid, ProgramImage, StartInfo};
use userprog::sched::{Scheduler, ThreadId};
use userprog::storage::RamFs;
use userprog::syscall::numbers::*;
use userprog::{Disposition, Kernel, KernelConfig, LoadError};

/// Pages in every user address space. The last one holds the arguments.
pub const USER_PAGES: usize = 16;

/// Returned by the syscall wrappers once the process may no longer run.
pub const GONE: isize = isize::MIN;

pub type Program = Arc<dyn Fn(&mut User) + Send + Sync>;

pub fn program<F: Fn(&mut User) + Send + Sync + 'static>(f: F) -> Program {
    Arc::new(f)
}

static NEXT_THREAD: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_ID: Cell<u64> = Cell::new(0);
}

fn current_id() -> ThreadId {
    THREAD_ID.with(|id| {
        if id.get() == 0 {
            id.set(NEXT_THREAD.fetch_add(1, Ordering::Relaxed));
        }
        ThreadId(id.get())
    })
}

struct Parked {
    thread: Thread,
    permit: bool,
}

struct ProgramLoader {
    programs: HashMap<String, Program>,
}

impl Loader for ProgramLoader {
    fn load(&self, name: &str, args: &[String]) -> Result<ProgramImage, LoadError> {
        if !self.programs.contains_key(name) {
            return Err(LoadError::NotFound);
        }
        ProgramImage::new(AddressSpace::new(USER_PAGES), 0, args)
    }
}

struct HostScheduler {
    programs: HashMap<String, Program>,
    kernel: OnceLock<Weak<Kernel>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    threads: Mutex<HashMap<ThreadId, Parked>>,
    halts: AtomicUsize,
}

impl Scheduler for HostScheduler {
    fn start(&self, pid: Pid, start: StartInfo) {
        let Some(program) = self.programs.get(&start.program).cloned() else {
            return;
        };
        let Some(kernel) = self.kernel.get().and_then(Weak::upgrade) else {
            return;
        };
        let handle = std::thread::spawn(move || {
            let mut user = User::new(kernel, pid, start);
            program(&mut user);
            if !user.gone {
                user.exit(0);
            }
        });
        self.handles.lock().unwrap().push(handle);
    }

    fn current_thread(&self) -> ThreadId {
        let id = current_id();
        self.threads
            .lock()
            .unwrap()
            .entry(id)
            .or_insert_with(|| Parked {
                thread: std::thread::current(),
                permit: false,
            });
        id
    }

    fn block_current(&self) {
        let id = self.current_thread();
        loop {
            {
                let mut threads = self.threads.lock().unwrap();
                if let Some(parked) = threads.get_mut(&id) {
                    if parked.permit {
                        parked.permit = false;
                        return;
                    }
                }
            }
            std::thread::park();
        }
    }

    fn unblock(&self, thread: ThreadId) {
        if let Some(parked) = self.threads.lock().unwrap().get_mut(&thread) {
            parked.permit = true;
            parked.thread.unpark();
        }
    }

    fn halt(&self) {
        self.halts.fetch_add(1, Ordering::SeqCst);
    }
}

/// Console that records output and serves queued input.
#[derive(Default)]
pub struct TestConsole {
    output: Mutex<Vec<u8>>,
    input: Mutex<Vec<u8>>,
}

impl TestConsole {
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.output.lock().unwrap()).into_owned()
    }

    pub fn feed(&self, data: &[u8]) {
        self.input.lock().unwrap().extend_from_slice(data);
    }
}

impl Console for TestConsole {
    fn read(&self, buf: &mut [u8]) -> usize {
        let mut input = self.input.lock().unwrap();
        let n = buf.len().min(input.len());
        buf[..n].copy_from_slice(&input[..n]);
        input.drain(..n);
        n
    }

    fn write(&self, data: &[u8]) -> usize {
        self.output.lock().unwrap().extend_from_slice(data);
        data.len()
    }
}

pub struct Machine {
    pub kernel: Arc<Kernel>,
    pub fs: Arc<RamFs>,
    pub console: Arc<TestConsole>,
    sched: Arc<HostScheduler>,
}

impl Machine {
    pub fn new(config: KernelConfig, programs: &[(&str, Program)]) -> Self {
        Self::with_fs(config, Arc::new(RamFs::new()), programs)
    }

    pub fn with_fs(config: KernelConfig, fs: Arc<RamFs>, programs: &[(&str, Program)]) -> Self {
        let programs: HashMap<String, Program> = programs
            .iter()
            .map(|(name, p)| (name.to_string(), p.clone()))
            .collect();
        let sched = Arc::new(HostScheduler {
            programs: programs.clone(),
            kernel: OnceLock::new(),
            handles: Mutex::new(Vec::new()),
            threads: Mutex::new(HashMap::new()),
            halts: AtomicUsize::new(0),
        });
        let console = Arc::new(TestConsole::default());
        let kernel = Arc::new(Kernel::new(
            config,
            fs.clone(),
            Arc::new(ProgramLoader { programs }),
            sched.clone(),
            console.clone(),
        ));
        let _ = sched.kernel.set(Arc::downgrade(&kernel));
        Self {
            kernel,
            fs,
            console,
            sched,
        }
    }

    pub fn boot(&self, name: &str) -> Pid {
        self.kernel.boot(name, &[name.to_string()]).unwrap()
    }

    /// Join every process thread, re-raising the first panic.
    pub fn wait(&self) {
        loop {
            let handles: Vec<_> = self.sched.handles.lock().unwrap().drain(..).collect();
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(panic) = handle.join() {
                    std::panic::resume_unwind(panic);
                }
            }
        }
    }

    /// Boot `name` and run until every process thread finished.
    pub fn run(&self, name: &str) -> Pid {
        let pid = self.boot(name);
        self.wait();
        pid
    }

    pub fn halts(&self) -> usize {
        self.sched.halts.load(Ordering::SeqCst)
    }
}

/// The view a running program has of its machine.
pub struct User {
    pub kernel: Arc<Kernel>,
    pub pid: Pid,
    pub start: StartInfo,
    heap: usize,
    gone: bool,
}

impl User {
    fn new(kernel: Arc<Kernel>, pid: Pid, start: StartInfo) -> Self {
        Self {
            kernel,
            pid,
            start,
            heap: 0x100,
            gone: false,
        }
    }

    /// Reserve `len` bytes of user memory.
    pub fn alloc(&mut self, len: usize) -> usize {
        let addr = self.heap;
        self.heap += len.max(1);
        assert!(self.heap < (USER_PAGES - 1) * PAGE_SIZE, "user heap exhausted");
        addr
    }

    /// Copy `bytes` into fresh user memory.
    pub fn bytes(&mut self, bytes: &[u8]) -> usize {
        let addr = self.alloc(bytes.len());
        self.poke(addr, bytes);
        addr
    }

    /// Copy `s` plus a NUL terminator into fresh user memory.
    pub fn string(&mut self, s: &str) -> usize {
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        self.bytes(&bytes)
    }

    pub fn poke(&self, addr: usize, bytes: &[u8]) {
        let process = self.kernel.processes().process(self.pid).unwrap();
        process.space().lock().load(VirtAddr::new(addr), bytes).unwrap();
    }

    pub fn peek(&self, addr: usize, len: usize) -> Vec<u8> {
        let process = self.kernel.processes().process(self.pid).unwrap();
        let mut buf = vec![0u8; len];
        process.space().lock().copy_in(VirtAddr::new(addr), &mut buf).unwrap();
        buf
    }

    pub fn peek_u32(&self, addr: usize) -> u32 {
        let bytes = self.peek(addr, 4);
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Arguments the loader placed in the argument page.
    pub fn args(&self) -> Vec<String> {
        let process = self.kernel.processes().process(self.pid).unwrap();
        let space = process.space().lock();
        (0..self.start.argc)
            .map(|i| {
                let slot = VirtAddr::new(self.start.argv.as_usize() + i * 4);
                let ptr = space.read_u32(slot).unwrap() as usize;
                space.read_cstr(VirtAddr::new(ptr), 256).unwrap()
            })
            .collect()
    }

    /// Raw syscall.
    pub fn syscall(&mut self, number: usize, args: [usize; 4]) -> isize {
        match self.kernel.syscall(self.pid, number, args) {
            Disposition::Resume(value) => value,
            Disposition::Exited | Disposition::Halted => {
                self.gone = true;
                GONE
            }
        }
    }

    /// Raise a non-syscall exception.
    pub fn fault(&mut self, cause: ExceptionCause, frame: &mut TrapFrame) -> Disposition {
        let disposition = self.kernel.handle_exception(self.pid, cause, frame);
        self.gone = !matches!(disposition, Disposition::Resume(_));
        disposition
    }

    pub fn creat(&mut self, name: &str) -> isize {
        let name = self.string(name);
        self.syscall(SYS_CREAT, [name, 0, 0, 0])
    }

    pub fn open(&mut self, name: &str) -> isize {
        let name = self.string(name);
        self.syscall(SYS_OPEN, [name, 0, 0, 0])
    }

    pub fn write(&mut self, fd: isize, data: &[u8]) -> isize {
        let buf = self.bytes(data);
        self.syscall(SYS_WRITE, [fd as usize, buf, data.len(), 0])
    }

    /// Read up to `len` bytes, returning the syscall result and the bytes.
    pub fn read(&mut self, fd: isize, len: usize) -> (isize, Vec<u8>) {
        let buf = self.alloc(len);
        let n = self.syscall(SYS_READ, [fd as usize, buf, len, 0]);
        let data = if n > 0 { self.peek(buf, n as usize) } else { Vec::new() };
        (n, data)
    }

    pub fn close(&mut self, fd: isize) -> isize {
        self.syscall(SYS_CLOSE, [fd as usize, 0, 0, 0])
    }

    pub fn unlink(&mut self, name: &str) -> isize {
        let name = self.string(name);
        self.syscall(SYS_UNLINK, [name, 0, 0, 0])
    }

    pub fn exec(&mut self, name: &str, args: &[&str]) -> isize {
        let name_ptr = self.string(name);
        let ptrs: Vec<usize> = args.iter().map(|a| self.string(a)).collect();
        let mut table = Vec::new();
        for ptr in &ptrs {
            table.extend_from_slice(&(*ptr as u32).to_le_bytes());
        }
        let argv = if table.is_empty() { 0 } else { self.bytes(&table) };
        self.syscall(SYS_EXEC, [name_ptr, args.len(), argv, 0])
    }

    /// Join `pid`, returning the syscall result and the stored status.
    pub fn join(&mut self, pid: isize) -> (isize, Option<i32>) {
        let status = self.alloc(4);
        let ret = self.syscall(SYS_JOIN, [pid as usize, status, 0, 0]);
        if ret == GONE || self.gone {
            return (ret, None);
        }
        let stored = if ret >= 0 || ret == i32::MIN as isize {
            Some(self.peek_u32(status) as i32)
        } else {
            None
        };
        (ret, stored)
    }

    pub fn exit(&mut self, status: i32) -> isize {
        self.syscall(SYS_EXIT, [status as usize, 0, 0, 0])
    }

    pub fn halt(&mut self) -> isize {
        self.syscall(SYS_HALT, [0; 4])
    }
}
