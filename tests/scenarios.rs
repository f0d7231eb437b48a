mod utils;

use nfa_runtime::Scanner;

fn matches(nfa: &nfa_runtime::Nfa, input: &[u8]) -> bool {
    let mut scanner = Scanner::new(nfa).unwrap();
    scanner.is_match(&mut &input[..]).unwrap()
}

#[test]
fn single_byte_matches_exactly_that_byte() {
    let nfa = utils::single_byte(b'a');
    assert!(matches(&nfa, b"a"));
    assert!(!matches(&nfa, b"b"));
    assert!(!matches(&nfa, b""));
    assert!(!matches(&nfa, b"aa"));
}

#[test]
fn one_or_more_accepts_any_run_length() {
    let nfa = utils::one_or_more(b'x');
    assert!(matches(&nfa, b"x"));
    assert!(matches(&nfa, b"xxxxx"));
    assert!(!matches(&nfa, b""));
    assert!(!matches(&nfa, b"xxy"));
}

#[test]
fn any_byte_matches_every_single_byte_value() {
    let nfa = utils::any_byte();
    for b in 0u8..=255 {
        assert!(matches(&nfa, &[b]), "byte {b} should match");
    }
    assert!(!matches(&nfa, b""));
    assert!(!matches(&nfa, b"xy"));
}

#[test]
fn nondeterministic_branch_after_shared_prefix() {
    let nfa = utils::branching_after_a();
    assert!(matches(&nfa, b"ab"));
    assert!(matches(&nfa, b"ac"));
    assert!(!matches(&nfa, b"ad"));
    assert!(!matches(&nfa, b"a"));
}

#[test]
fn empty_input_matches_only_when_source_is_accept() {
    let nfa = utils::empty_only();
    assert!(matches(&nfa, b""));
    assert!(!matches(&nfa, b"a"));
}

#[test]
fn long_chain_runs_to_completion() {
    let nfa = utils::chain(200, b'q');
    let input = vec![b'q'; 200];
    assert!(matches(&nfa, &input));
    assert!(!matches(&nfa, &input[..199]));

    let mut too_long = input.clone();
    too_long.push(b'q');
    assert!(!matches(&nfa, &too_long));
}

#[test]
fn chain_near_jit_rel8_jump_boundary() {
    // Picked to land squarely in the middle of the state-block count where
    // the jump-shrink pass has the most work to do: enough states that many
    // of the per-state jumps fall outside rel8 range in the pessimistic
    // rel32 layout and must be shrunk, but still comfortably under the
    // 256-state JIT eligibility ceiling.
    let nfa = utils::chain(120, b'z');
    let input = vec![b'z'; 120];
    assert!(matches(&nfa, &input));
}

#[cfg(target_arch = "x86_64")]
mod backend_equivalence {
    use super::utils;
    use nfa_runtime::Scanner;

    fn check_both_backends(nfa: &nfa_runtime::Nfa, input: &[u8]) {
        let mut jit = Scanner::new(nfa).unwrap();
        let mut interp = Scanner::new_interpreter(nfa);
        assert_eq!(
            jit.is_match(&mut &input[..]).unwrap(),
            interp.is_match(&mut &input[..]).unwrap(),
            "backends disagree on input {input:?}"
        );
    }

    #[test]
    fn jit_and_interpreter_agree_on_every_scenario() {
        check_both_backends(&utils::single_byte(b'a'), b"a");
        check_both_backends(&utils::single_byte(b'a'), b"b");
        check_both_backends(&utils::one_or_more(b'x'), b"xxxx");
        check_both_backends(&utils::any_byte(), b"\0");
        check_both_backends(&utils::branching_after_a(), b"ac");
        check_both_backends(&utils::empty_only(), b"");

        let chain = utils::chain(64, b'm');
        let input = vec![b'm'; 64];
        check_both_backends(&chain, &input);
        check_both_backends(&chain, &input[..63]);
    }
}
