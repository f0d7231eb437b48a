//! The NFA data model.
//!
//! This is the one type both backends consume. It is built by the caller
//! (NFA construction from a pattern is out of scope for this crate) and is
//! immutable for the lifetime of any [`crate::Scanner`] built from it.

/// A closed 8-bit interval `[start, end]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CharRange {
    pub start: u8,
    pub end: u8,
}

impl CharRange {
    /// Panics if `start > end` — a malformed range is a caller bug, not a
    /// recoverable condition.
    pub fn new(start: u8, end: u8) -> Self {
        assert!(start <= end, "CharRange: start must be <= end");
        Self { start, end }
    }

    /// A range matching exactly one byte.
    pub fn single(c: u8) -> Self {
        Self { start: c, end: c }
    }

    pub fn contains(&self, c: u8) -> bool {
        self.start <= c && c <= self.end
    }
}

/// One state in the NFA.
#[derive(Clone, Debug, Default)]
pub struct NfaState {
    /// Outgoing transitions, as indices into the owning [`Nfa::states`].
    pub transitions: Vec<usize>,
    /// The ranges this state's match predicate is built from.
    pub ranges: Vec<CharRange>,
    /// Whether this state matches the complement of `ranges`' union.
    pub inverted_match: bool,
}

impl NfaState {
    pub fn new(transitions: Vec<usize>, ranges: Vec<CharRange>, inverted_match: bool) -> Self {
        Self { transitions, ranges, inverted_match }
    }

    /// A non-accept state with no outgoing epsilon-ness: consumes any byte.
    pub fn any_byte(transitions: Vec<usize>) -> Self {
        Self { transitions, ranges: Vec::new(), inverted_match: true }
    }

    /// The accept state: no outgoing transitions, empty ranges.
    pub fn accept() -> Self {
        Self { transitions: Vec::new(), ranges: Vec::new(), inverted_match: false }
    }

    /// Zero outgoing transitions makes a state the accept state.
    pub fn is_accept(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Empty ranges and no inversion: matches nothing, consumes no byte.
    pub fn is_epsilon(&self) -> bool {
        self.ranges.is_empty() && !self.inverted_match
    }

    /// `c` is matched by this state's ranges, XOR `inverted_match`.
    pub fn matches(&self, c: u8) -> bool {
        let in_ranges = self.ranges.iter().any(|r| r.contains(c));
        in_ranges != self.inverted_match
    }
}

/// An immutable, caller-owned NFA.
///
/// States are identified by their position in `states`; this index is
/// stable for the lifetime of the `Nfa` because `states` is never
/// reallocated after construction (it is owned outright, not behind a
/// growable handle any scanner could observe mid-mutation).
#[derive(Clone, Debug)]
pub struct Nfa {
    pub states: Vec<NfaState>,
    /// Entry points, activated before any input byte is read. Duplicates
    /// are accepted (the active-state bitmap is a set, so they are
    /// idempotent) but discouraged.
    pub sources: Vec<usize>,
    /// Index of the unique accept state.
    pub accept: usize,
}

impl Nfa {
    /// Builds an NFA, checking the invariants from spec §3 in debug builds
    /// only (a violation is undefined behavior at the contract level, not a
    /// condition a caller can recover from at runtime).
    pub fn new(states: Vec<NfaState>, sources: Vec<usize>, accept: usize) -> Self {
        let nfa = Self { states, sources, accept };
        nfa.debug_check_invariants();
        nfa
    }

    fn debug_check_invariants(&self) {
        debug_assert!(self.accept < self.states.len(), "accept index out of range");
        debug_assert!(self.states[self.accept].is_accept(), "accept state has outgoing transitions");
        debug_assert!(self.states[self.accept].ranges.is_empty(), "accept state must be epsilon");
        for src in &self.sources {
            debug_assert!(*src < self.states.len(), "source index out of range");
        }
        for (i, state) in self.states.iter().enumerate() {
            for &t in &state.transitions {
                debug_assert!(t < self.states.len(), "transition target out of range");
            }
            if i != self.accept {
                debug_assert!(!state.is_accept(), "only the accept state may have zero transitions");
                debug_assert!(!state.is_epsilon(), "non-accept states must consume a byte");
            }
        }
    }

    /// Whether this NFA fits the JIT's register-bitmap limit (spec §3
    /// invariant 5, §4.3 "Eligibility").
    pub fn fits_jit(&self) -> bool {
        self.states.len() <= 256
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_range_contains_is_inclusive_on_both_ends() {
        let r = CharRange::new(b'a', b'z');
        assert!(r.contains(b'a'));
        assert!(r.contains(b'm'));
        assert!(r.contains(b'z'));
        assert!(!r.contains(b'A'));
        assert!(!r.contains(b'{'));
    }

    #[test]
    fn char_range_single_matches_only_that_byte() {
        let r = CharRange::single(b'x');
        assert!(r.contains(b'x'));
        assert!(!r.contains(b'y'));
    }

    #[test]
    #[should_panic]
    fn char_range_new_panics_on_inverted_bounds() {
        CharRange::new(b'z', b'a');
    }

    #[test]
    fn state_matches_is_xor_of_ranges_and_inversion() {
        let normal = NfaState::new(vec![1], vec![CharRange::single(b'a')], false);
        assert!(normal.matches(b'a'));
        assert!(!normal.matches(b'b'));

        let inverted = NfaState::new(vec![1], vec![CharRange::single(b'a')], true);
        assert!(!inverted.matches(b'a'));
        assert!(inverted.matches(b'b'));
    }

    #[test]
    fn any_byte_state_matches_every_value() {
        let s = NfaState::any_byte(vec![1]);
        for b in 0u8..=255 {
            assert!(s.matches(b));
        }
    }

    #[test]
    fn accept_state_has_no_transitions_and_is_epsilon() {
        let a = NfaState::accept();
        assert!(a.is_accept());
        assert!(a.is_epsilon());
    }

    #[test]
    fn non_accept_state_is_neither_accept_nor_epsilon() {
        let s = NfaState::new(vec![1], vec![CharRange::single(b'a')], false);
        assert!(!s.is_accept());
        assert!(!s.is_epsilon());
    }

    #[test]
    fn fits_jit_boundary_at_256_states() {
        let mut states: Vec<NfaState> = (0..256).map(|i| NfaState::new(vec![i + 1], vec![CharRange::single(b'x')], false)).collect();
        states.push(NfaState::accept());
        let accept = states.len() - 1;
        let under = Nfa::new(states, vec![0], accept);
        assert!(!under.fits_jit(), "257 states should not fit");

        let mut states: Vec<NfaState> = (0..255).map(|i| NfaState::new(vec![i + 1], vec![CharRange::single(b'x')], false)).collect();
        states.push(NfaState::accept());
        let accept = states.len() - 1;
        let exact = Nfa::new(states, vec![0], accept);
        assert!(exact.fits_jit(), "256 states should fit");
    }
}
