//! Executable memory mapping for the JIT backend (spec §4.6).
//!
//! Three operations, same as the original C `mmap.c`: allocate anonymous
//! read-write memory, flip an existing mapping to executable, unmap. The
//! write → exec transition is modeled as a type-state move
//! ([`RwMapping::into_exec`] consumes `self`) so that, unlike the C original
//! (which only documents "never written after flipped" as a caller
//! discipline), the type system itself makes writing to published code a
//! compile error.

use std::io;
use std::ptr::NonNull;

/// A writable-but-not-yet-executable anonymous mapping.
pub struct RwMapping {
    addr: NonNull<u8>,
    len: usize,
}

// SAFETY: the mapping owns an exclusive OS-level allocation; nothing else
// holds a pointer to it until `as_mut_slice`/`into_exec` are called.
unsafe impl Send for RwMapping {}

impl RwMapping {
    /// Allocates `len` bytes of anonymous, private, read-write memory.
    pub fn new(len: usize) -> io::Result<Self> {
        assert!(len > 0, "RwMapping::new: zero-length mapping");
        // SAFETY: standard anonymous mmap; the returned pointer is checked
        // against MAP_FAILED before use.
        let addr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_ANON | libc::MAP_PRIVATE,
                -1,
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { addr: NonNull::new(addr as *mut u8).expect("mmap returned null on success"), len })
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: `addr` is a valid, exclusively-owned mapping of `len`
        // read-write bytes for the lifetime of this `RwMapping`.
        unsafe { std::slice::from_raw_parts_mut(self.addr.as_ptr(), self.len) }
    }

    /// Flips the mapping to executable-only and returns the exec handle.
    /// Consumes `self`: there is no way back to a writable mapping short of
    /// allocating a new one, matching spec §5's "executable memory is never
    /// written after being flipped to exec".
    pub fn into_exec(self) -> io::Result<ExecMapping> {
        // SAFETY: `addr`/`len` describe the mapping allocated in `new`.
        let rc = unsafe { libc::mprotect(self.addr.as_ptr() as *mut _, self.len, libc::PROT_EXEC) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        let addr = self.addr;
        let len = self.len;
        std::mem::forget(self);
        Ok(ExecMapping { addr, len })
    }
}

impl Drop for RwMapping {
    fn drop(&mut self) {
        // SAFETY: `addr`/`len` describe a mapping owned exclusively by this value.
        unsafe {
            libc::munmap(self.addr.as_ptr() as *mut _, self.len);
        }
    }
}

/// A published, executable mapping. Read-only from Rust's point of view;
/// the only legal use of its contents is to jump into them.
pub struct ExecMapping {
    addr: NonNull<u8>,
    len: usize,
}

unsafe impl Send for ExecMapping {}

impl ExecMapping {
    pub fn entry_point(&self) -> *const u8 {
        self.addr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.len
    }
}

impl Drop for ExecMapping {
    fn drop(&mut self) {
        // SAFETY: `addr`/`len` describe a mapping owned exclusively by this value.
        unsafe {
            libc::munmap(self.addr.as_ptr() as *mut _, self.len);
        }
    }
}
