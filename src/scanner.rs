//! The public façade: picks a backend and exposes a single `is_match` entry
//! point, hiding the JIT/interpreter split from callers entirely.

use std::io::Read;

use crate::error::Error;
use crate::interpreter::InterpreterScanner;
use crate::nfa::Nfa;

#[cfg(target_arch = "x86_64")]
use crate::jit::JitScanner;

enum Backend<'n> {
    #[cfg(target_arch = "x86_64")]
    Jit(JitScanner),
    Interpreter(InterpreterScanner<'n>),
}

/// A scanner built from a single [`Nfa`], ready to match any number of
/// inputs. Picks the JIT backend when the target is amd64 and the NFA is
/// small enough to fit the register bitmap; falls back to the interpreter
/// otherwise, the same way the original runtime's `noarch` build stubs out
/// JIT support entirely.
pub struct Scanner<'n> {
    backend: Backend<'n>,
}

impl<'n> Scanner<'n> {
    /// Builds a scanner for `nfa`. Only the JIT path can fail here (a
    /// jump too long for rel32, or a failed `mmap`); the interpreter path
    /// is infallible.
    pub fn new(nfa: &'n Nfa) -> Result<Self, Error> {
        #[cfg(target_arch = "x86_64")]
        {
            if let Some(jit) = JitScanner::new(nfa)? {
                return Ok(Self { backend: Backend::Jit(jit) });
            }
        }
        Ok(Self { backend: Backend::Interpreter(InterpreterScanner::new(nfa)) })
    }

    /// Forces the interpreter backend regardless of eligibility or target
    /// architecture. Exists for differential testing between the two
    /// backends; ordinary callers should use [`Scanner::new`].
    pub fn new_interpreter(nfa: &'n Nfa) -> Self {
        Self { backend: Backend::Interpreter(InterpreterScanner::new(nfa)) }
    }

    pub fn is_match<R: Read>(&mut self, reader: &mut R) -> Result<bool, Error> {
        match &mut self.backend {
            #[cfg(target_arch = "x86_64")]
            Backend::Jit(jit) => jit.is_match(reader),
            Backend::Interpreter(interp) => interp.is_match(reader),
        }
    }

    /// Whether this scanner compiled to native code rather than falling
    /// back to the interpreter.
    pub fn is_jit(&self) -> bool {
        #[cfg(target_arch = "x86_64")]
        {
            matches!(self.backend, Backend::Jit(_))
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            false
        }
    }
}
