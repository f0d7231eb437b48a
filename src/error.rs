//! The error taxonomy for this crate.
//!
//! There are only two failure kinds: an I/O failure (which also covers the
//! OS/libc errno cases raised by [`crate::mmap`]) and a JIT jump that would
//! not fit in a 32-bit relative displacement. Neither is used for control
//! flow inside the matching loops; a non-matching input is `Ok(false)`, not
//! an error.

use std::fmt;
use std::io;

/// Failure returned by [`crate::Scanner::new`] or [`crate::Scanner::is_match`].
#[derive(Debug)]
pub enum Error {
    /// An OS-level failure: a failed `mmap`/`mprotect`/`munmap` call, or a
    /// failure reported by the caller's [`std::io::Read`] implementation.
    Io(io::Error),
    /// The JIT emitted a jump whose displacement does not fit in a signed
    /// 32-bit integer. Only possible for NFAs with an enormous number of
    /// states; the interpreter has no equivalent limit.
    JitTooLongJump,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "{e}"),
            Error::JitTooLongJump => write!(f, "jit: jump displacement exceeds rel32 range"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::JitTooLongJump => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
