//! A byte-oriented NFA matching runtime with two interchangeable backends:
//! a portable bitmap interpreter and an amd64 JIT compiler that runs the
//! same algorithm as native machine code.
//!
//! Building the NFA itself — compiling a pattern into [`NfaState`]s — is
//! out of scope; callers construct an [`Nfa`] directly (by hand, or from
//! their own pattern compiler) and hand it to [`Scanner::new`].
//!
//! ```no_run
//! use nfa_runtime::{CharRange, Nfa, NfaState, Scanner};
//!
//! // matches the single byte 'a'
//! let states = vec![
//!     NfaState::new(vec![1], vec![CharRange::single(b'a')], false),
//!     NfaState::accept(),
//! ];
//! let nfa = Nfa::new(states, vec![0], 1);
//! let mut scanner = Scanner::new(&nfa).unwrap();
//! assert!(scanner.is_match(&mut "a".as_bytes()).unwrap());
//! ```

mod error;
mod interpreter;
#[cfg(target_arch = "x86_64")]
mod jit;
#[cfg(target_arch = "x86_64")]
mod mmap;
mod nfa;
mod scanner;

pub use error::Error;
pub use nfa::{CharRange, Nfa, NfaState};
pub use scanner::Scanner;
