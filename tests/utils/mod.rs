//! Small NFA builders shared by the scenario tests.

use nfa_runtime::{CharRange, Nfa, NfaState};

/// Matches exactly the single byte `b`.
pub fn single_byte(b: u8) -> Nfa {
    let start = NfaState::new(vec![1], vec![CharRange::single(b)], false);
    let accept = NfaState::accept();
    Nfa::new(vec![start, accept], vec![0], 1)
}

/// Matches one or more of `b` (`b+`): a loop state with a self-transition
/// and a transition to accept.
pub fn one_or_more(b: u8) -> Nfa {
    let start = NfaState::new(vec![0, 1], vec![CharRange::single(b)], false);
    let accept = NfaState::accept();
    Nfa::new(vec![start, accept], vec![0], 1)
}

/// Matches any single byte, via an inverted state with no ranges.
pub fn any_byte() -> Nfa {
    let start = NfaState::any_byte(vec![1]);
    let accept = NfaState::accept();
    Nfa::new(vec![start, accept], vec![0], 1)
}

/// Matches `ab` or `ac`: two active threads diverge after the first byte.
pub fn branching_after_a() -> Nfa {
    // 0: 'a' -> {1, 2}
    // 1: 'b' -> {3}
    // 2: 'c' -> {3}
    // 3: accept
    let s0 = NfaState::new(vec![1, 2], vec![CharRange::single(b'a')], false);
    let s1 = NfaState::new(vec![3], vec![CharRange::single(b'b')], false);
    let s2 = NfaState::new(vec![3], vec![CharRange::single(b'c')], false);
    let accept = NfaState::accept();
    Nfa::new(vec![s0, s1, s2, accept], vec![0], 3)
}

/// A long chain of `n` states each consuming `x`, used to exercise the JIT's
/// register-bitmap path across multiple words and to stress the jump
/// optimizer with a large code body.
pub fn chain(n: usize, b: u8) -> Nfa {
    let mut states = Vec::with_capacity(n + 1);
    for i in 0..n {
        states.push(NfaState::new(vec![i + 1], vec![CharRange::single(b)], false));
    }
    states.push(NfaState::accept());
    let accept = states.len() - 1;
    Nfa::new(states, vec![0], accept)
}

/// Matches the empty input only: the sole source is the accept state.
pub fn empty_only() -> Nfa {
    let accept = NfaState::accept();
    Nfa::new(vec![accept], vec![0], 0)
}
