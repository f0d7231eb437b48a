//! The amd64 JIT backend: compiles an [`Nfa`] directly into machine code
//! that runs the same wave algorithm as [`crate::interpreter`], with the
//! active-state bitmap held in registers instead of memory.
//!
//! Only eligible NFAs ([`Nfa::fits_jit`] — at most 256 states, so the
//! bitmap fits in four 64-bit words) get a compiled scanner; callers that
//! need a guaranteed backend regardless of NFA size should go through
//! [`crate::Scanner`], which falls back to the interpreter.
//!
//! The calling convention is bespoke, not `extern "C"`: the compiled
//! function receives its register state already loaded, runs until the
//! input is exhausted or every active state has died, and returns a packed
//! `rax` with the accept verdict in `al` and a "was any state still alive"
//! flag in `ah`. [`JitScanner::is_match`] is the only caller; nothing else
//! ever sees the compiled function's real signature.

mod assembler;

use std::io::Read;

use crate::error::Error;
use crate::nfa::Nfa;
use assembler::{Assembler, Condition, Label, Reg};

const WORD_BITS: usize = 64;
const BITMAP_WORDS: usize = 4;
const MAX_STATES: usize = WORD_BITS * BITMAP_WORDS;

const CURRENT_REGS: [Reg; BITMAP_WORDS] = [Reg::R8, Reg::R9, Reg::R10, Reg::R11];
const NEXT_REGS: [Reg; BITMAP_WORDS] = [Reg::R12, Reg::R13, Reg::R14, Reg::R15];

fn word_reg(bank: &[Reg; BITMAP_WORDS], state: usize) -> (Reg, u8) {
    (bank[state / WORD_BITS], (state % WORD_BITS) as u8)
}

/// Emits the byte-match test for one state's ranges into `dl`, jumping to
/// `on_match` when the current character is accepted. Falls through when it
/// isn't. Mirrors `emit_range_code` in the original jit emitter: a run of
/// `cmp`/`jle`/`jl` range checks, complemented at the end when the state is
/// inverted.
fn emit_range_code(asm: &mut Assembler, state: &crate::nfa::NfaState, on_match: Label) {
    if state.ranges.is_empty() {
        // `any_byte`-style state: always matches (inverted with no ranges).
        debug_assert!(state.inverted_match, "epsilon state reached emit_range_code");
        asm.jmp(on_match);
        return;
    }

    let mismatch = asm.new_label();
    for range in &state.ranges {
        if range.start == range.end {
            asm.cmp_cur_char(range.start);
            if state.inverted_match {
                asm.jz(mismatch);
            } else {
                asm.jz(on_match);
            }
        } else {
            let past_range = asm.new_label();
            asm.cmp_cur_char(range.start);
            asm.jl(past_range);
            asm.cmp_cur_char(range.end);
            if state.inverted_match {
                asm.jle(mismatch);
            } else {
                asm.jle(on_match);
            }
            asm.place_label(past_range);
        }
    }
    if state.inverted_match {
        asm.jmp(on_match);
    }
    asm.place_label(mismatch);
}

/// Sets the bit for every outgoing transition of a matched state in the
/// `next` bitmap, or the accept flag if the target is the accept state.
/// Mirrors `emit_next_states_bitmask_update`.
fn emit_transition_update(asm: &mut Assembler, nfa: &Nfa, transitions: &[usize]) {
    for &target in transitions {
        if nfa.states[target].is_accept() {
            asm.set_accept_flag();
        } else {
            let (reg, bit) = word_reg(&NEXT_REGS, target);
            asm.btx_r64(reg, bit, true);
            asm.set_no_sink_flag();
        }
    }
}

/// Emits one state's full test-and-transition block. Mirrors
/// `emit_state_code`: test the state's bit in `current`, and if set, run
/// the range test followed by the transition update.
fn emit_state_code(asm: &mut Assembler, nfa: &Nfa, state_idx: usize, next_state_label: Label) {
    let state = &nfa.states[state_idx];
    if state.is_accept() {
        return;
    }

    let (reg, bit) = word_reg(&CURRENT_REGS, state_idx);
    asm.test_bit_r64(reg, bit);
    let inactive = asm.new_label();
    asm.jnc(inactive);

    let on_match = asm.new_label();
    emit_range_code(asm, state, on_match);
    asm.jmp(next_state_label);

    asm.place_label(on_match);
    emit_transition_update(asm, nfa, &state.transitions);

    asm.place_label(inactive);
}

/// Emits the whole per-byte state-stepping body: one block per state, a
/// bitmap-bank swap, and a loop back to read the next byte. Mirrors
/// `emit_code`.
fn emit_code(nfa: &Nfa) -> Result<Vec<u8>, Error> {
    let mut asm = Assembler::new();

    let read_loop = asm.new_label();
    let no_more_input = asm.new_label();
    let sunk = asm.new_label();

    for next in NEXT_REGS {
        asm.xor_r64(next, next);
    }

    asm.place_label(read_loop);
    asm.cmp_r64(Reg::Rsi, Reg::Rdi);
    asm.jz(no_more_input);
    asm.load_char();
    asm.inc_r64(Reg::Rsi);

    asm.xor_r64(Reg::Rax, Reg::Rax);
    for i in 0..nfa.states.len() {
        if nfa.states[i].is_accept() {
            continue;
        }
        let next_label = asm.new_label();
        emit_state_code(&mut asm, nfa, i, next_label);
        asm.place_label(next_label);
    }

    asm.test_no_sink_flag();
    asm.jz(sunk);

    for (cur, next) in CURRENT_REGS.iter().zip(NEXT_REGS.iter()) {
        asm.mov_r64(*cur, *next);
        asm.xor_r64(*next, *next);
    }
    asm.jmp(read_loop);

    asm.place_label(sunk);
    asm.ret();

    asm.place_label(no_more_input);
    asm.ret();

    asm.link()
}

/// A compiled scanner. Owns the executable mapping and the fixed initial
/// bitmap state it resets to on every call.
pub struct JitScanner {
    mapping: crate::mmap::ExecMapping,
    initial_bitmap: [u64; BITMAP_WORDS],
    initial_accept: bool,
}

impl JitScanner {
    /// Compiles `nfa`. Returns `None` when the NFA has too many states to
    /// fit the register bitmap ([`Nfa::fits_jit`]); callers fall back to
    /// the interpreter in that case.
    pub fn new(nfa: &Nfa) -> Result<Option<Self>, Error> {
        if !nfa.fits_jit() || nfa.states.len() > MAX_STATES {
            return Ok(None);
        }

        let code = emit_code(nfa)?;
        let mut rw = crate::mmap::RwMapping::new(code.len().max(1))?;
        rw.as_mut_slice()[..code.len()].copy_from_slice(&code);
        let mapping = rw.into_exec()?;

        let mut initial_bitmap = [0u64; BITMAP_WORDS];
        let mut initial_accept = false;
        for &src in &nfa.sources {
            if nfa.states[src].is_accept() {
                initial_accept = true;
            } else {
                initial_bitmap[src / WORD_BITS] |= 1u64 << (src % WORD_BITS);
            }
        }

        Ok(Some(Self { mapping, initial_bitmap, initial_accept }))
    }

    /// Runs the compiled scanner to completion against `reader`.
    ///
    /// `reader` is drained into an owned buffer up front: the compiled code
    /// walks a flat `[rsi, rdi)` byte range and has no way to call back into
    /// Rust to refill one, unlike the interpreter's chunked pull loop.
    pub fn is_match<R: Read>(&mut self, reader: &mut R) -> Result<bool, Error> {
        let mut input = Vec::new();
        reader.read_to_end(&mut input)?;

        if input.is_empty() {
            return Ok(self.initial_accept);
        }

        let entry = self.mapping.entry_point();
        let [mut w0, mut w1, mut w2, mut w3] = self.initial_bitmap;
        let start = input.as_ptr();
        // SAFETY: `entry` points at a mapping we compiled ourselves from a
        // validated `Nfa`; it expects exactly the register state loaded
        // below and returns without touching any memory outside
        // `[start, start + input.len())`, which is a live, initialized
        // slice for the duration of the call.
        let (al, ah): (u8, u8) = unsafe {
            let result: u64;
            std::arch::asm!(
                "call {entry}",
                entry = in(reg) entry,
                in("rsi") start,
                in("rdi") start.add(input.len()),
                inout("r8") w0,
                inout("r9") w1,
                inout("r10") w2,
                inout("r11") w3,
                lateout("r12") _,
                lateout("r13") _,
                lateout("r14") _,
                lateout("r15") _,
                lateout("rax") result,
                clobber_abi("C"),
            );
            ((result & 0xff) as u8, ((result >> 8) & 0xff) as u8)
        };
        let _ = (w0, w1, w2, w3);

        if ah == 0 && al == 0 {
            // The compiled loop only clears both flags together on an
            // exhausted-bitmap early return before any accept could fire;
            // an accept sets `al` before that path is taken.
            return Ok(false);
        }
        Ok(al != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nfa::{CharRange, NfaState};

    fn single_byte_nfa(byte: u8) -> Nfa {
        let accept = NfaState::accept();
        let start = NfaState::new(vec![1], vec![CharRange::single(byte)], false);
        Nfa::new(vec![start, accept], vec![0], 1)
    }

    #[test]
    fn compiles_small_nfa() {
        let nfa = single_byte_nfa(b'a');
        let scanner = JitScanner::new(&nfa).unwrap();
        assert!(scanner.is_some());
    }

    #[test]
    fn refuses_oversized_nfa() {
        let mut states: Vec<NfaState> = Vec::new();
        for i in 0..300 {
            states.push(NfaState::new(vec![i + 1], vec![CharRange::single(b'x')], false));
        }
        states.push(NfaState::accept());
        let last = states.len() - 1;
        let nfa = Nfa::new(states, vec![0], last);
        let scanner = JitScanner::new(&nfa).unwrap();
        assert!(scanner.is_none());
    }
}
