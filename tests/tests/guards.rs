use yalr::{lexemes, AcceptActions, Grammar, ItemId, LalrBuilder, ParseResult, Parser};

const A: usize = 0;
const B: usize = 1;
const C: usize = 2;
const D: usize = 3;

fn accepts(parser: &Parser, symbols: &[usize]) -> bool {
    let mut state = parser.create_parser(AcceptActions::new(lexemes(symbols.to_vec())));
    state.parse() == ParseResult::Accept
}

fn parser_for(grammar: &mut Grammar, start: ItemId) -> Parser {
    let mut builder = LalrBuilder::new(grammar);
    builder.add_initial_state(start).unwrap();
    builder.complete_parser().unwrap();
    Parser::from_builder(&builder, None)
}

/// A guard distinguishing `aⁿ bⁿ c*` from `aⁿ b+ cⁿ`, a language no pure
/// LALR(1) grammar separates:
///
/// `MB -> a MB b | a b ; MC -> a MC c | a b+ c ; CS -> [=> MB c] MC`
fn context_sensitive() -> (Grammar, ItemId) {
    let mut grammar = Grammar::new();
    let mb = grammar.id_for_nonterminal("Matching-Bs");
    let mc = grammar.id_for_nonterminal("Matching-Cs");
    let cs = grammar.id_for_nonterminal("Context-Sensitive");

    let a = grammar.terminal(A);
    let b = grammar.terminal(B);
    let c = grammar.terminal(C);

    grammar.add_rule(mb, vec![a, mb, b]);
    grammar.add_rule(mb, vec![a, b]);

    let some_bs = grammar.repeat_one_or_more(vec![b]);
    grammar.add_rule(mc, vec![a, mc, c]);
    grammar.add_rule(mc, vec![a, some_bs, c]);

    let guard = grammar.guard(vec![mb, c]);
    grammar.add_rule(cs, vec![guard, mc]);

    (grammar, cs)
}

#[test]
fn guard_accepts_the_balanced_shape() {
    let (mut grammar, cs) = context_sensitive();
    let parser = parser_for(&mut grammar, cs);

    // aaabbbccc: the guard sees balanced a/b followed by c, then MC checks
    // the b/c balance over the same input.
    assert!(accepts(&parser, &[A, A, A, B, B, B, C, C, C]));
    assert!(accepts(&parser, &[A, B, C]));
}

#[test]
fn guard_rejects_unbalanced_shapes() {
    let (mut grammar, cs) = context_sensitive();
    let parser = parser_for(&mut grammar, cs);

    // Unbalanced in either half.
    assert!(!accepts(&parser, &[A, A, B, B, C, C, C]));
    assert!(!accepts(&parser, &[A, A, A, B, B, C, C, C]));
    assert!(!accepts(&parser, &[A, A, A, B, B, B, B, C, C, C]));
    assert!(!accepts(&parser, &[A, A, A, B, B, B, C, C]));
}

#[test]
fn guard_on_the_first_token_is_tried_before_any_shift() {
    // S -> [=> a b] Pair | a c ; Pair -> a b. Both paths start with 'a' in
    // state 0, so the guard action must rank before the shift.
    let mut grammar = Grammar::new();
    let s = grammar.id_for_nonterminal("S");
    let pair = grammar.id_for_nonterminal("Pair");
    let a = grammar.terminal(A);
    let b = grammar.terminal(B);
    let c = grammar.terminal(C);

    grammar.add_rule(pair, vec![a, b]);
    let guard = grammar.guard(vec![a, b]);
    grammar.add_rule(s, vec![guard, pair]);
    grammar.add_rule(s, vec![a, c]);

    let parser = parser_for(&mut grammar, s);

    assert!(accepts(&parser, &[A, B]));
    assert!(accepts(&parser, &[A, C]));
    assert!(!accepts(&parser, &[A]));
    assert!(!accepts(&parser, &[B]));
}

#[test]
fn recursive_guards_accept_a_single_d() {
    // MD -> [=> [=> d] d] d, a guard whose body evaluates another guard.
    let mut grammar = Grammar::new();
    let md = grammar.id_for_nonterminal("Match-D-Recursive");
    let d = grammar.terminal(D);

    let inner = grammar.guard(vec![d]);
    let outer = grammar.guard(vec![inner, d]);
    grammar.add_rule(md, vec![outer, d]);

    let parser = parser_for(&mut grammar, md);

    assert!(accepts(&parser, &[D]));
    assert!(!accepts(&parser, &[]));
    assert!(!accepts(&parser, &[C]));
}

#[test]
fn distinct_guards_are_distinct_items() {
    let mut grammar = Grammar::new();
    let d = grammar.terminal(D);
    let b = grammar.terminal(B);

    let inner = grammar.guard(vec![d]);
    let outer = grammar.guard(vec![inner, d]);
    let other = grammar.guard(vec![b]);

    assert_ne!(inner, outer);
    assert_ne!(inner, other);

    // Interning round-trips identifiers.
    let again = grammar.guard(vec![d]);
    assert_eq!(inner, again);
}

#[test]
fn a_failed_guard_falls_through_to_the_other_actions() {
    // S -> [=> a b] X | Y ; X -> a b ; Y -> a c. 'a c' only parses if the
    // failed guard lets the shift run.
    let mut grammar = Grammar::new();
    let s = grammar.id_for_nonterminal("S");
    let x = grammar.id_for_nonterminal("X");
    let y = grammar.id_for_nonterminal("Y");
    let a = grammar.terminal(A);
    let b = grammar.terminal(B);
    let c = grammar.terminal(C);

    grammar.add_rule(x, vec![a, b]);
    grammar.add_rule(y, vec![a, c]);
    let guard = grammar.guard(vec![a, b]);
    grammar.add_rule(s, vec![guard, x]);
    grammar.add_rule(s, vec![y]);

    let parser = parser_for(&mut grammar, s);

    assert!(accepts(&parser, &[A, B]));
    assert!(accepts(&parser, &[A, C]));
    assert!(!accepts(&parser, &[A, B, C]));
}
