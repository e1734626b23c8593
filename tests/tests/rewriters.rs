use yalr::lr::rewrite::{
    Associativity, ConflictAction, ConflictAttributes, IgnoredSymbols, Lr1Rewriter,
    PrecedenceRewriter, PrecedenceTable, WeakSymbols,
};
use yalr::lr::find_conflicts;
use yalr::traits::ParseActions;
use yalr::{
    lexemes, AcceptActions, Grammar, ItemId, LalrBuilder, Lexeme, ParseResult, Parser, RuleId,
};

const IF: usize = 0;
const ELSE: usize = 1;
const X: usize = 2;
const WS: usize = 3;
const PLUS: usize = 4;
const NUM: usize = 5;
const IDENT: usize = 6;
const LANGUAGE: usize = 7;

fn accepts(parser: &Parser, symbols: &[usize]) -> bool {
    let mut state = parser.create_parser(AcceptActions::new(lexemes(symbols.to_vec())));
    state.parse() == ParseResult::Accept
}

/// `S -> if S | if S else S | x`, with a key on the `else` position.
const ELSE_KEY: usize = 1;

fn dangling_else() -> (Grammar, ItemId) {
    let mut grammar = Grammar::new();
    let s = grammar.id_for_nonterminal("S");

    grammar.define("S").terminal(IF).nonterminal("S").end();
    grammar
        .define("S")
        .terminal(IF)
        .nonterminal("S")
        .terminal(ELSE)
        .key(ELSE_KEY)
        .nonterminal("S")
        .end();
    grammar.define("S").terminal(X).end();

    (grammar, s)
}

#[test]
fn dangling_else_shifts_by_default() {
    let (mut grammar, s) = dangling_else();
    let mut builder = LalrBuilder::new(&mut grammar);
    builder.add_initial_state(s).unwrap();
    builder.complete_parser().unwrap();
    let parser = Parser::from_builder(&builder, None);

    // The table's priority order prefers the shift: the else binds to the
    // inner if.
    assert!(accepts(&parser, &[IF, IF, X, ELSE, X]));
    assert!(accepts(&parser, &[IF, X, ELSE, X]));
}

#[test]
fn a_reduce_attribute_reverses_the_default() {
    let (mut grammar, s) = dangling_else();

    let mut attributes = ConflictAttributes::new();
    attributes.set_key(ELSE_KEY, ConflictAction::Reduce);

    let mut builder = LalrBuilder::new(&mut grammar);
    builder.add_rewriter(Box::new(attributes));
    builder.add_initial_state(s).unwrap();
    builder.complete_parser().unwrap();
    let parser = Parser::from_builder(&builder, None);

    // Forcing the reduce makes a dangling else unattachable, while else-free
    // input still parses.
    assert!(accepts(&parser, &[IF, X]));
    assert!(accepts(&parser, &[X]));
    assert!(!accepts(&parser, &[IF, IF, X, ELSE, X]));
}

#[test]
fn ignored_symbols_are_skipped_anywhere() {
    // S -> x x, with WS ignored.
    let mut grammar = Grammar::new();
    let s = grammar.id_for_nonterminal("S");
    let x = grammar.terminal(X);
    let ws = grammar.terminal(WS);
    grammar.add_rule(s, vec![x, x]);

    let mut ignored = IgnoredSymbols::new();
    ignored.add_item(ws);

    let mut builder = LalrBuilder::new(&mut grammar);
    builder.add_rewriter(Box::new(ignored));
    builder.add_initial_state(s).unwrap();
    builder.complete_parser().unwrap();
    let parser = Parser::from_builder(&builder, None);

    assert!(accepts(&parser, &[X, X]));
    assert!(accepts(&parser, &[WS, X, WS, WS, X, WS]));
    assert!(!accepts(&parser, &[X, WS]));
    assert!(!accepts(&parser, &[WS, WS]));
}

#[test]
fn an_explicit_action_beats_the_ignore() {
    // S -> x WS x. The state expecting WS shifts it instead of skipping.
    let mut grammar = Grammar::new();
    let s = grammar.id_for_nonterminal("S");
    let x = grammar.terminal(X);
    let ws = grammar.terminal(WS);
    grammar.add_rule(s, vec![x, ws, x]);

    let mut ignored = IgnoredSymbols::new();
    ignored.add_item(ws);

    let mut builder = LalrBuilder::new(&mut grammar);
    builder.add_rewriter(Box::new(ignored));
    builder.add_initial_state(s).unwrap();
    builder.complete_parser().unwrap();
    let parser = Parser::from_builder(&builder, None);

    assert!(accepts(&parser, &[X, WS, X]));
    assert!(accepts(&parser, &[X, WS, WS, X]));
    assert!(!accepts(&parser, &[X, X]));
}

/// Parse actions that render the tree as an s-expression, to observe
/// associativity.
struct SexprActions<I: Iterator<Item = Lexeme>> {
    stream: I,
}

impl<I: Iterator<Item = Lexeme>> ParseActions for SexprActions<I> {
    type Node = String;

    fn read(&mut self) -> Option<Lexeme> {
        self.stream.next()
    }

    fn shift(&mut self, lexeme: Option<&Lexeme>) -> String {
        lexeme.map(|l| l.content.clone()).unwrap_or_default()
    }

    fn reduce(&mut self, _nonterminal: ItemId, _rule: RuleId, children: Vec<String>) -> String {
        if children.len() == 1 {
            children.into_iter().next().unwrap()
        } else {
            format!("({})", children.join(" "))
        }
    }
}

#[test]
fn precedence_makes_plus_left_associative() {
    // E -> E + E | n
    let mut grammar = Grammar::new();
    let e = grammar.id_for_nonterminal("E");
    let plus = grammar.terminal(PLUS);
    let num = grammar.terminal(NUM);
    grammar.add_rule(e, vec![e, plus, e]);
    grammar.add_rule(e, vec![num]);

    let mut table = PrecedenceTable::new();
    table.set(plus, 1, Associativity::Left);

    let mut builder = LalrBuilder::new(&mut grammar);
    builder.add_rewriter(Box::new(PrecedenceRewriter::new(table)));
    builder.add_initial_state(e).unwrap();
    builder.complete_parser().unwrap();

    assert!(find_conflicts(&builder).is_empty());

    let parser = Parser::from_builder(&builder, None);

    let tokens = vec![
        Lexeme::new(NUM, "a", Default::default()),
        Lexeme::new(PLUS, "+", Default::default()),
        Lexeme::new(NUM, "b", Default::default()),
        Lexeme::new(PLUS, "+", Default::default()),
        Lexeme::new(NUM, "c", Default::default()),
    ];

    let mut state = parser.create_parser(SexprActions {
        stream: tokens.into_iter(),
    });
    assert_eq!(state.parse(), ParseResult::Accept);
    assert_eq!(state.into_node().unwrap(), "((a + b) + c)");
}

#[test]
fn lr1_disambiguation_parses_the_full_lr1_language() {
    // LR(1) but not LALR(1): `S -> a A d | b B d | a B e | b A e ; A -> c ;
    // B -> c`. The LR(1) rewriter turns the merged reduce/reduce conflict
    // into weak reduces the runtime resolves with `can_reduce`.
    const A: usize = 0;
    const B: usize = 1;
    const C: usize = 2;
    const D: usize = 3;
    const E: usize = 4;

    let mut grammar = Grammar::new();
    let s = grammar.id_for_nonterminal("S");

    grammar
        .define("S")
        .terminal(A)
        .nonterminal("A")
        .terminal(D)
        .end();
    grammar
        .define("S")
        .terminal(B)
        .nonterminal("B")
        .terminal(D)
        .end();
    grammar
        .define("S")
        .terminal(A)
        .nonterminal("B")
        .terminal(E)
        .end();
    grammar
        .define("S")
        .terminal(B)
        .nonterminal("A")
        .terminal(E)
        .end();
    grammar.define("A").terminal(C).end();
    grammar.define("B").terminal(C).end();

    let mut builder = LalrBuilder::new(&mut grammar);
    builder.add_rewriter(Box::new(Lr1Rewriter::new()));
    builder.add_initial_state(s).unwrap();
    builder.complete_parser().unwrap();
    let parser = Parser::from_builder(&builder, None);

    assert!(accepts(&parser, &[A, C, D]));
    assert!(accepts(&parser, &[B, C, D]));
    assert!(accepts(&parser, &[A, C, E]));
    assert!(accepts(&parser, &[B, C, E]));
    assert!(!accepts(&parser, &[A, C, C]));
    assert!(!accepts(&parser, &[A, D]));
}

#[test]
fn weak_keywords_double_as_identifiers() {
    // Decl -> language Ident | Ident Ident. `language` is a weak keyword
    // whose strong counterpart is the identifier.
    let mut grammar = Grammar::new();
    let decl = grammar.id_for_nonterminal("Decl");
    let ident = grammar.terminal(IDENT);
    let language = grammar.terminal(LANGUAGE);

    grammar.add_rule(decl, vec![language, ident]);
    grammar.add_rule(decl, vec![ident, ident]);

    let mut weak = WeakSymbols::new();
    weak.add_symbols(ident, [language]);

    let mut builder = LalrBuilder::new(&mut grammar);
    builder.add_rewriter(Box::new(weak.clone()));
    builder.add_initial_state(decl).unwrap();
    builder.complete_parser().unwrap();
    let parser = Parser::from_builder(&builder, Some(&weak));

    // The lexer wrapper downgrades the keyword where it is not expected.
    assert_eq!(parser.tables().strong_for_weak(LANGUAGE), IDENT);
    assert_eq!(parser.tables().strong_for_weak(IDENT), IDENT);

    // `language x` uses the keyword rule; `x language` only works because
    // the keyword mirrors the identifier's actions.
    assert!(accepts(&parser, &[LANGUAGE, IDENT]));
    assert!(accepts(&parser, &[IDENT, IDENT]));
    assert!(accepts(&parser, &[IDENT, LANGUAGE]));
    assert!(!accepts(&parser, &[IDENT]));
}
