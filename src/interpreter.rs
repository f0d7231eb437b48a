//! The portable interpreter backend: a double-buffered active-state bitmap
//! simulating the NFA one input byte at a time.
//!
//! This is the reference implementation of the wave algorithm (spec §4.1).
//! The JIT backend in [`crate::jit`] must produce the same verdict for
//! every NFA and input it accepts.

use std::io::Read;

use crate::error::Error;
use crate::nfa::Nfa;

const WORD_BITS: usize = 64;
const READ_CHUNK: usize = 8192;

fn words_for(states: usize) -> usize {
    states.div_ceil(WORD_BITS)
}

/// A flat, state-indexed bitmap over an NFA's states.
#[derive(Clone)]
struct Bitmap {
    words: Vec<u64>,
}

impl Bitmap {
    fn new(states: usize) -> Self {
        Self { words: vec![0u64; words_for(states)] }
    }

    fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    fn set(&mut self, i: usize) {
        self.words[i / WORD_BITS] |= 1u64 << (i % WORD_BITS);
    }

    fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(wi, &w)| {
            (0..WORD_BITS).filter_map(move |bi| (w & (1u64 << bi) != 0).then_some(wi * WORD_BITS + bi))
        })
    }
}

/// The interpreter scanner. Owns its two working bitmaps; does not own the
/// [`Nfa`] it was built from.
pub struct InterpreterScanner<'n> {
    nfa: &'n Nfa,
    current: Bitmap,
    next: Bitmap,
}

impl<'n> InterpreterScanner<'n> {
    pub fn new(nfa: &'n Nfa) -> Self {
        let states = nfa.states.len();
        Self { nfa, current: Bitmap::new(states), next: Bitmap::new(states) }
    }

    /// Runs the wave algorithm to completion against `reader`, returning the
    /// final verdict. See spec §4.1 for the full algorithm description.
    pub fn is_match<R: Read>(&mut self, reader: &mut R) -> Result<bool, Error> {
        self.current.clear();
        self.next.clear();

        let mut accepted_last_step = false;
        let mut has_active_states = false;
        for &src in &self.nfa.sources {
            if self.nfa.states[src].is_accept() {
                accepted_last_step = true;
            } else {
                self.current.set(src);
                has_active_states = true;
            }
        }

        let mut buf = [0u8; READ_CHUNK];
        let mut buf_len = 0usize;
        let mut buf_pos = 0usize;

        loop {
            if buf_pos >= buf_len {
                buf_len = reader.read(&mut buf)?;
                buf_pos = 0;
                if buf_len == 0 {
                    return Ok(accepted_last_step);
                }
            }

            if !has_active_states {
                return Ok(false);
            }

            let c = buf[buf_pos];
            buf_pos += 1;

            accepted_last_step = false;
            has_active_states = false;

            for i in self.current.iter_set() {
                let state = &self.nfa.states[i];
                debug_assert!(!state.is_accept(), "active bit set on accept state");
                debug_assert!(!state.is_epsilon(), "active bit set on epsilon state");

                if !state.matches(c) {
                    continue;
                }
                for &target in &state.transitions {
                    if self.nfa.states[target].is_accept() {
                        accepted_last_step = true;
                    } else {
                        self.next.set(target);
                        has_active_states = true;
                    }
                }
            }

            self.current.clear();
            std::mem::swap(&mut self.current, &mut self.next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nfa::{CharRange, NfaState};

    fn single_byte(b: u8) -> Nfa {
        let start = NfaState::new(vec![1], vec![CharRange::single(b)], false);
        let accept = NfaState::accept();
        Nfa::new(vec![start, accept], vec![0], 1)
    }

    fn empty_only() -> Nfa {
        let accept = NfaState::accept();
        Nfa::new(vec![accept], vec![0], 0)
    }

    #[test]
    fn eof_immediately_returns_accepted_last_step() {
        let nfa = empty_only();
        let mut scanner = InterpreterScanner::new(&nfa);
        assert!(scanner.is_match(&mut &b""[..]).unwrap());
    }

    #[test]
    fn eof_with_no_accept_pending_returns_false() {
        let nfa = single_byte(b'a');
        let mut scanner = InterpreterScanner::new(&nfa);
        assert!(!scanner.is_match(&mut &b""[..]).unwrap());
    }

    #[test]
    fn sink_mid_stream_returns_false_immediately() {
        let nfa = single_byte(b'a');
        let mut scanner = InterpreterScanner::new(&nfa);
        // After consuming 'a' there are no active states left; a second
        // byte must sink rather than accidentally match.
        assert!(!scanner.is_match(&mut &b"ab"[..]).unwrap());
    }

    #[test]
    fn matching_input_reaches_accept_exactly_at_eof() {
        let nfa = single_byte(b'a');
        let mut scanner = InterpreterScanner::new(&nfa);
        assert!(scanner.is_match(&mut &b"a"[..]).unwrap());
    }

    #[test]
    fn scanner_is_reusable_across_calls() {
        let nfa = single_byte(b'a');
        let mut scanner = InterpreterScanner::new(&nfa);
        assert!(scanner.is_match(&mut &b"a"[..]).unwrap());
        assert!(!scanner.is_match(&mut &b"b"[..]).unwrap());
        assert!(scanner.is_match(&mut &b"a"[..]).unwrap());
    }

    #[test]
    fn bitmap_spans_multiple_words_past_64_states() {
        let mut states: Vec<NfaState> = (0..100).map(|i| NfaState::new(vec![i + 1], vec![CharRange::single(b'q')], false)).collect();
        states.push(NfaState::accept());
        let accept = states.len() - 1;
        let nfa = Nfa::new(states, vec![0], accept);
        let mut scanner = InterpreterScanner::new(&nfa);
        let input = vec![b'q'; 100];
        assert!(scanner.is_match(&mut &input[..]).unwrap());
        assert!(!scanner.is_match(&mut &input[..99]).unwrap());
    }
}
