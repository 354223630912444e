//! System Call Interface
//!
//! Single entry point from user mode into the kernel tables.
//!
//! # Security Model
//! - Whitelist approach: only explicitly implemented syscalls are allowed
//! - All parameters are validated before use
//! - Invalid inputs return negative errno values, never panic
//!
//! # Current Syscalls
//! - 0: halt() - power off (root process only by default)
//! - 1: exit(status) - terminate the calling process
//! - 2: exec(name, argc, argv) - spawn a child, returns its pid
//! - 3: join(pid, status_ptr) - wait for a child, returns its exit status
//! - 4: creat(name) - create or truncate a file, returns a descriptor
//! - 5: open(name) - open an existing file, returns a descriptor
//! - 6: read(fd, buf, len) - returns bytes read, 0 at end of file
//! - 7: write(fd, buf, len) - returns bytes written
//! - 8: close(fd)
//! - 9: unlink(name) - delete a file once nobody has it open

mod handler;
mod validate;

pub use handler::{dispatch, numbers, Disposition};
pub use validate::{UserBuffer, UserRange};
