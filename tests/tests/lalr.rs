use yalr::lr::{find_conflicts, ConflictPolicy};
use yalr::{lexemes, AcceptActions, Grammar, ItemId, LalrBuilder, ParseResult, Parser};

const EQUALS: usize = 0;
const TIMES: usize = 1;
const ID: usize = 2;

/// Grammar from example 4.46 of the dragon book:
/// `S -> L = R | R ; L -> * R | i ; R -> L`.
fn dragon446() -> (Grammar, ItemId) {
    let mut grammar = Grammar::new();
    let s = grammar.id_for_nonterminal("S");

    grammar
        .define("S")
        .nonterminal("L")
        .terminal(EQUALS)
        .nonterminal("R")
        .end();
    grammar.define("S").nonterminal("R").end();
    grammar.define("L").terminal(TIMES).nonterminal("R").end();
    grammar.define("L").terminal(ID).end();
    grammar.define("R").nonterminal("L").end();

    (grammar, s)
}

fn accepts(parser: &Parser, symbols: &[usize]) -> bool {
    let mut state = parser.create_parser(AcceptActions::new(lexemes(symbols.to_vec())));
    state.parse() == ParseResult::Accept
}

#[test]
fn dragon446_builds_ten_states_without_conflicts() {
    let (mut grammar, s) = dragon446();
    let mut builder = LalrBuilder::new(&mut grammar);
    builder.add_initial_state(s).unwrap();
    builder.complete_parser().unwrap();

    assert_eq!(builder.count_states(), 10);

    let conflicts = find_conflicts(&builder);
    assert!(conflicts.is_empty());
    assert!(ConflictPolicy::default()
        .check(&conflicts, builder.grammar())
        .is_ok());
}

#[test]
fn dragon446_accepts_and_rejects() {
    let (mut grammar, s) = dragon446();
    let mut builder = LalrBuilder::new(&mut grammar);
    builder.add_initial_state(s).unwrap();
    builder.complete_parser().unwrap();
    let parser = Parser::from_builder(&builder, None);

    // i ; * i = i
    assert!(accepts(&parser, &[ID]));
    assert!(accepts(&parser, &[TIMES, ID, EQUALS, ID]));
    assert!(accepts(&parser, &[ID, EQUALS, TIMES, ID]));

    assert!(!accepts(&parser, &[]));
    assert!(!accepts(&parser, &[EQUALS]));
    assert!(!accepts(&parser, &[ID, EQUALS]));
    assert!(!accepts(&parser, &[ID, ID]));
}

#[test]
fn empty_productions_accept_any_run_of_ids() {
    // S -> ε | S i
    let mut grammar = Grammar::new();
    let s = grammar.id_for_nonterminal("S");
    let i = grammar.terminal(ID);
    grammar.add_rule(s, vec![]);
    grammar.add_rule(s, vec![s, i]);

    let mut builder = LalrBuilder::new(&mut grammar);
    builder.add_initial_state(s).unwrap();
    builder.complete_parser().unwrap();

    assert!(find_conflicts(&builder).is_empty());

    let parser = Parser::from_builder(&builder, None);
    assert!(accepts(&parser, &[]));
    assert!(accepts(&parser, &[ID]));
    assert!(accepts(&parser, &[ID, ID]));
    assert!(accepts(&parser, &vec![ID; 30]));
    assert!(!accepts(&parser, &[TIMES]));
}

#[test]
fn building_twice_gives_structurally_identical_machines() {
    let snapshot = || {
        let (mut grammar, s) = dragon446();
        let mut builder = LalrBuilder::new(&mut grammar);
        builder.add_initial_state(s).unwrap();
        builder.complete_parser().unwrap();

        (0..builder.count_states())
            .map(|state| {
                (
                    builder.machine().transitions(state).clone(),
                    builder.actions_for_state(state),
                )
            })
            .collect::<Vec<_>>()
    };

    assert_eq!(snapshot(), snapshot());
}

#[test]
fn ebnf_sugar_parses() {
    // List -> i (, i)*, the separated-list shape via EBNF repetition.
    let mut grammar = Grammar::new();
    let list = grammar.id_for_nonterminal("List");
    let i = grammar.terminal(ID);
    let comma = grammar.terminal(3);

    let tail = grammar.repeat_zero_or_more(vec![comma, i]);
    grammar.add_rule(list, vec![i, tail]);

    let mut builder = LalrBuilder::new(&mut grammar);
    builder.add_initial_state(list).unwrap();
    builder.complete_parser().unwrap();
    let parser = Parser::from_builder(&builder, None);

    assert!(accepts(&parser, &[ID]));
    assert!(accepts(&parser, &[ID, 3, ID]));
    assert!(accepts(&parser, &[ID, 3, ID, 3, ID]));
    assert!(!accepts(&parser, &[ID, 3]));
    assert!(!accepts(&parser, &[3, ID]));
}

#[test]
fn ebnf_optional_and_alternative_parse() {
    // Decl -> ('+' | '*') i?, an alternative head and an optional tail.
    let mut grammar = Grammar::new();
    let decl = grammar.id_for_nonterminal("Decl");
    let plus = grammar.terminal(EQUALS);
    let star = grammar.terminal(TIMES);
    let i = grammar.terminal(ID);

    let head = grammar.alternative(vec![vec![plus], vec![star]]);
    let tail = grammar.optional(vec![i]);
    grammar.add_rule(decl, vec![head, tail]);

    let mut builder = LalrBuilder::new(&mut grammar);
    builder.add_initial_state(decl).unwrap();
    builder.complete_parser().unwrap();
    let parser = Parser::from_builder(&builder, None);

    assert!(accepts(&parser, &[EQUALS]));
    assert!(accepts(&parser, &[TIMES, ID]));
    assert!(accepts(&parser, &[EQUALS, ID]));
    assert!(!accepts(&parser, &[ID]));
    assert!(!accepts(&parser, &[EQUALS, ID, ID]));
}
