//! Console Collaborator
//!
//! Descriptors 0 and 1 of every process, and the kernel logger, talk to a
//! byte-stream console supplied by the platform (a UART on hardware, a
//! buffer in tests).

use core::fmt;

/// A synchronized byte-stream console.
pub trait Console: Send + Sync {
    /// Read up to `buf.len()` bytes of input. Returns 0 when no input is
    /// available.
    fn read(&self, buf: &mut [u8]) -> usize;

    /// Write `data` to the output, returning the number of bytes accepted.
    fn write(&self, data: &[u8]) -> usize;
}

/// `fmt::Write` adapter over a console, translating `\n` to `\r\n`.
pub struct ConsoleWriter<'a>(pub &'a dyn Console);

impl fmt::Write for ConsoleWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for line in s.split_inclusive('\n') {
            match line.strip_suffix('\n') {
                Some(body) => {
                    self.0.write(body.as_bytes());
                    self.0.write(b"\r\n");
                }
                None => {
                    self.0.write(line.as_bytes());
                }
            }
        }
        Ok(())
    }
}

/// Console with no input that discards output.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullConsole;

impl Console for NullConsole {
    fn read(&self, _buf: &mut [u8]) -> usize {
        0
    }

    fn write(&self, data: &[u8]) -> usize {
        data.len()
    }
}
