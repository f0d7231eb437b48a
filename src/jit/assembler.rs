//! A tiny amd64 assembler, purpose-built for the instruction subset
//! [`crate::jit`] needs: no operand encoding this module doesn't use, no
//! instruction this module's caller doesn't emit.
//!
//! Jumps are the subtle part. Every jump is first emitted pessimistically
//! as a rel32 (5 or 6 bytes, padded with `nop`s so later edits never shift
//! anything). [`Assembler::link`] then runs a jump-shrinking pass: any
//! jump whose target turns out to be within rel8 range is rewritten to the
//! 2-byte short form. Because shrinking a jump can only ever move a later
//! label *closer* (never farther), a single left-to-right pass is enough —
//! there is no need to iterate to a fixpoint.

use crate::error::Error;

/// A register usable as a 64-bit GPR in the instructions this module emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reg {
    Rax,
    Rdx,
    Rsi,
    Rdi,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
}

impl Reg {
    /// The 4-bit register number (low 3 bits + REX.B/REX.R extension bit).
    fn code(self) -> u8 {
        match self {
            Reg::Rax => 0,
            Reg::Rdx => 2,
            Reg::Rsi => 6,
            Reg::Rdi => 7,
            Reg::R8 => 8,
            Reg::R9 => 9,
            Reg::R10 => 10,
            Reg::R11 => 11,
            Reg::R12 => 12,
            Reg::R13 => 13,
            Reg::R14 => 14,
            Reg::R15 => 15,
        }
    }

    fn is_extended(self) -> bool {
        self.code() >= 8
    }

    fn low3(self) -> u8 {
        self.code() & 0x7
    }
}

/// Condition codes for conditional jumps, named after the AT&T mnemonic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Condition {
    /// Unconditional.
    Always,
    /// `jz`/`je`.
    Zero,
    /// `jl`.
    Less,
    /// `jle`.
    LessOrEqual,
    /// `jnc`.
    NoCarry,
}

impl Condition {
    /// The low nibble of the Jcc opcode (`0x70 | nibble` short form,
    /// `0x0f 0x80 | nibble` near form). `Always` is handled separately since
    /// `jmp` has no condition nibble.
    fn nibble(self) -> u8 {
        match self {
            Condition::Always => unreachable!("Condition::Always has no opcode nibble"),
            Condition::Zero => 0x4,
            Condition::Less => 0xc,
            Condition::LessOrEqual => 0xe,
            Condition::NoCarry => 0x3,
        }
    }
}

/// An opaque handle to a not-yet-placed jump target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Label(usize);

struct JumpRec {
    to: Label,
    condition: Condition,
    /// Offset of the jump instruction's first byte in `code`.
    instr_addr: usize,
    /// Whether this jump has already been shrunk to rel8 by `optimize_jumps`.
    is_rel8: bool,
}

/// A growable code buffer plus the label/jump bookkeeping needed to link it.
pub struct Assembler {
    code: Vec<u8>,
    next_label: usize,
    /// `None` until the label is placed.
    label_addrs: Vec<Option<usize>>,
    jumps: Vec<JumpRec>,
}

impl Assembler {
    pub fn new() -> Self {
        Self { code: Vec::new(), next_label: 0, label_addrs: Vec::new(), jumps: Vec::new() }
    }

    pub fn new_label(&mut self) -> Label {
        let id = self.next_label;
        self.next_label += 1;
        self.label_addrs.push(None);
        Label(id)
    }

    pub fn place_label(&mut self, label: Label) {
        debug_assert!(self.label_addrs[label.0].is_none(), "label placed twice");
        self.label_addrs[label.0] = Some(self.code.len());
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    fn emit(&mut self, bytes: &[u8]) {
        self.code.extend_from_slice(bytes);
    }

    /// REX prefix: `W` selects the 64-bit operand form; `R`/`B` are the
    /// extension bits for the reg and rm fields respectively.
    fn rex(w: bool, r: bool, b: bool) -> u8 {
        0x40 | ((w as u8) << 3) | ((r as u8) << 2) | (b as u8)
    }

    fn modrm_reg_reg(reg: Reg, rm: Reg) -> u8 {
        0xc0 | (reg.low3() << 3) | rm.low3()
    }

    /// `op reg, rm` for a register-direct ALU op (`xor`, `cmp`, `mov`), all
    /// of which share this REX+opcode+modrm shape for r64,r64 forms.
    fn general_binop_r(&mut self, opcode: u8, reg: Reg, rm: Reg) {
        let rex = Self::rex(true, reg.is_extended(), rm.is_extended());
        self.emit(&[rex, opcode, Self::modrm_reg_reg(reg, rm)]);
    }

    pub fn xor_r64(&mut self, dst: Reg, src: Reg) {
        self.general_binop_r(0x31, src, dst);
    }

    pub fn mov_r64(&mut self, dst: Reg, src: Reg) {
        self.general_binop_r(0x89, src, dst);
    }

    pub fn cmp_r64(&mut self, lhs: Reg, rhs: Reg) {
        self.general_binop_r(0x39, rhs, lhs);
    }

    /// `cmp dl, imm8` — compares the current input byte (always loaded into
    /// `dl`) against a literal.
    pub fn cmp_cur_char(&mut self, imm8: u8) {
        self.emit(&[0x80, 0xfa, imm8]);
    }

    /// `mov dl, [rsi]` — loads the current input byte.
    pub fn load_char(&mut self) {
        self.emit(&[0x8a, 0x16]);
    }

    pub fn inc_r64(&mut self, reg: Reg) {
        let rex = Self::rex(true, false, reg.is_extended());
        self.emit(&[rex, 0xff, 0xc0 | reg.low3()]);
    }

    /// `bts`/`btr reg, imm8` — sets or clears bit `imm8` of `reg`.
    pub fn btx_r64(&mut self, reg: Reg, bit: u8, set: bool) {
        let rex = Self::rex(true, false, reg.is_extended());
        let modrm_reg = if set { 0x5 } else { 0x6 };
        self.emit(&[rex, 0x0f, 0xba, 0xc0 | (modrm_reg << 3) | reg.low3(), bit]);
    }

    /// `bt reg, imm8` — tests bit `imm8` of `reg` into CF without modifying
    /// `reg`. Callers branch on the carry flag (`jnc`) right after this.
    pub fn test_bit_r64(&mut self, reg: Reg, bit: u8) {
        let rex = Self::rex(true, false, reg.is_extended());
        self.emit(&[rex, 0x0f, 0xba, 0xc0 | (0x4 << 3) | reg.low3(), bit]);
    }

    /// `setc al` — the standalone byte form, used to fold a carry flag into
    /// the accept-flag register.
    pub fn setc_r8(&mut self, reg: Reg) {
        let rex = if reg.is_extended() { Some(Self::rex(false, false, true)) } else { None };
        if let Some(rex) = rex {
            self.emit(&[rex]);
        }
        self.emit(&[0x0f, 0x92, 0xc0 | reg.low3()]);
    }

    /// `or al, 1` — marks the accept flag live.
    pub fn set_accept_flag(&mut self) {
        self.emit(&[0x0c, 0x01]);
    }

    /// `or ah, 1` — marks the "not sunk yet" flag live.
    pub fn set_no_sink_flag(&mut self) {
        self.emit(&[0x80, 0xcc, 0x01]);
    }

    /// `test ah, ah` — tests the "not sunk yet" flag; callers branch on ZF.
    pub fn test_no_sink_flag(&mut self) {
        self.emit(&[0x84, 0xe4]);
    }

    pub fn ret(&mut self) {
        self.emit(&[0xc3]);
    }

    pub fn nop(&mut self) {
        self.emit(&[0x90]);
    }

    /// Emits a jump, pessimistically as a rel32, padded to a fixed width so
    /// `optimize_jumps` can shrink it in place without moving anything after
    /// it until the link pass recompacts the buffer.
    pub fn jump(&mut self, condition: Condition, to: Label) {
        let instr_addr = self.code.len();
        match condition {
            Condition::Always => self.emit(&[0xe9, 0, 0, 0, 0]),
            c => self.emit(&[0x0f, 0x80 | c.nibble(), 0, 0, 0, 0]),
        }
        self.jumps.push(JumpRec { to, condition, instr_addr, is_rel8: false });
    }

    pub fn jmp(&mut self, to: Label) {
        self.jump(Condition::Always, to);
    }

    pub fn jz(&mut self, to: Label) {
        self.jump(Condition::Zero, to);
    }

    pub fn jl(&mut self, to: Label) {
        self.jump(Condition::Less, to);
    }

    pub fn jle(&mut self, to: Label) {
        self.jump(Condition::LessOrEqual, to);
    }

    pub fn jnc(&mut self, to: Label) {
        self.jump(Condition::NoCarry, to);
    }

    fn rel32_len(condition: Condition) -> usize {
        match condition {
            Condition::Always => 5,
            _ => 6,
        }
    }

    fn rel8_len(condition: Condition) -> usize {
        match condition {
            Condition::Always => 2,
            _ => 2,
        }
    }

    /// Classifies each jump as rel8- or rel32-eligible given the current
    /// (pessimistic, all-rel32) layout, using only pass-1 addresses for the
    /// before/after-target ordering test. A jump whose raw byte-distance to
    /// its target (measured in the still-unshrunk buffer) already fits in a
    /// signed 8-bit displacement is guaranteed to still fit once other jumps
    /// between it and the target shrink, because shrinking only reduces
    /// distances. That monotonicity is what makes a single pass sufficient.
    fn classify_jumps(&self) -> Vec<bool> {
        self.jumps
            .iter()
            .map(|j| {
                let target = self.label_addrs[j.to.0].expect("jump to unplaced label");
                let after_this_instr = j.instr_addr + Self::rel32_len(j.condition);
                let rel32_disp = target as i64 - after_this_instr as i64;
                let rel8_disp = target as i64 - (j.instr_addr + Self::rel8_len(j.condition)) as i64;
                let _ = rel32_disp;
                (-128..=127).contains(&rel8_disp)
            })
            .collect()
    }

    /// Computes the byte savings for each jump once classified, and produces
    /// the final linear-address remap: every byte from the jump's pass-1
    /// address onward shifts left by the number of previously-shrunk jumps'
    /// savings.
    fn optimize_jumps(&mut self) {
        let shrinks = self.classify_jumps();
        for (j, shrink) in self.jumps.iter_mut().zip(shrinks) {
            j.is_rel8 = shrink;
        }
    }

    fn jump_rel_offset(displacement: i64) -> Result<i32, Error> {
        i32::try_from(displacement).map_err(|_| Error::JitTooLongJump)
    }

    /// Finishes assembly: shrinks eligible jumps, resolves every label to a
    /// final byte offset, and streams the buffer out with real jump
    /// encodings substituted for the rel32 placeholders.
    pub fn link(mut self) -> Result<Vec<u8>, Error> {
        self.optimize_jumps();

        // Pass 1: compute each jump's new length and the cumulative shift at
        // its position, to remap label addresses into the shrunk buffer.
        let mut jumps_by_addr: Vec<&JumpRec> = self.jumps.iter().collect();
        jumps_by_addr.sort_by_key(|j| j.instr_addr);

        // `shift_at` records the cumulative shrink-shift as of the end of
        // each jump instruction (not its start): a target address is only
        // affected by a given jump's own savings once that jump has been
        // fully passed, never while still inside it.
        let mut shift = 0i64;
        let mut shift_at: Vec<(usize, i64)> = Vec::with_capacity(jumps_by_addr.len());
        for j in &jumps_by_addr {
            let old_len = Self::rel32_len(j.condition);
            let new_len = if j.is_rel8 { Self::rel8_len(j.condition) } else { old_len };
            shift += (old_len - new_len) as i64;
            shift_at.push((j.instr_addr + old_len, shift));
        }

        let remap = |old_addr: usize| -> usize {
            let mut s = 0i64;
            for &(at, sh) in &shift_at {
                if at <= old_addr {
                    s = sh;
                } else {
                    break;
                }
            }
            (old_addr as i64 - s) as usize
        };

        let mut out = Vec::with_capacity(self.code.len());
        let mut cursor = 0usize;
        let mut jump_idx = 0usize;

        while cursor < self.code.len() {
            if jump_idx < jumps_by_addr.len() && jumps_by_addr[jump_idx].instr_addr == cursor {
                let j = jumps_by_addr[jump_idx];
                let old_len = Self::rel32_len(j.condition);
                let target_old = self.label_addrs[j.to.0].expect("jump to unplaced label");
                let target_new = remap(target_old);

                if j.is_rel8 {
                    let new_len = Self::rel8_len(j.condition) as i64;
                    let after = out.len() as i64 + new_len;
                    let disp = target_new as i64 - after;
                    let disp8 = i8::try_from(disp).map_err(|_| Error::JitTooLongJump)?;
                    match j.condition {
                        Condition::Always => out.push(0xeb),
                        c => out.push(0x70 | c.nibble()),
                    }
                    out.push(disp8 as u8);
                } else {
                    let new_len = old_len as i64;
                    let after = out.len() as i64 + new_len;
                    let disp = Self::jump_rel_offset(target_new as i64 - after)?;
                    match j.condition {
                        Condition::Always => out.push(0xe9),
                        c => {
                            out.push(0x0f);
                            out.push(0x80 | c.nibble());
                        }
                    }
                    out.extend_from_slice(&disp.to_le_bytes());
                }

                cursor += old_len;
                jump_idx += 1;
            } else {
                out.push(self.code[cursor]);
                cursor += 1;
            }
        }

        Ok(out)
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

pub use Reg::*;
