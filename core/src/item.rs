use itertools::Itertools;

use crate::grammar::Grammar;
use crate::lr::{Lr1Item, Lr1ItemSet};

/// The item's identifier in the grammar.
///
/// Identifiers are assigned by the grammar from a single monotonic pool:
/// nonterminals, terminals, sentinels and composite items all share it.
pub type ItemId = usize;

/// A symbol in a context-free grammar.
///
/// Composite (EBNF) items carry their sub-rule bodies as sequences of interned
/// item identifiers; the grammar registers the synthetic rules they expand to
/// when the item is interned. Two items with the same kind and the same
/// structural payload are the same item and share an identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Item {
    /// The empty ('epsilon') item. In FIRST sets it signals nullability.
    Empty,
    /// End-of-input sentinel.
    Eoi,
    /// End-of-guard sentinel.
    Eog,
    /// A lexical symbol, identified in the lexer's symbol space.
    Terminal(usize),
    /// A grammar symbol; the payload equals the item's interned identifier.
    Nonterminal(usize),
    /// A guard: matches when its body accepts a prefix of the remaining
    /// lookahead, without consuming anything.
    Guard(Vec<ItemId>),
    /// EBNF `?`
    Optional(Vec<ItemId>),
    /// EBNF `+`
    RepeatOneOrMore(Vec<ItemId>),
    /// EBNF `*`
    RepeatZeroOrMore(Vec<ItemId>),
    /// EBNF `(a | b | ...)`
    Alternative(Vec<Vec<ItemId>>),
}

impl Item {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Item::Terminal(_))
    }

    pub fn is_nonterminal(&self) -> bool {
        matches!(self, Item::Nonterminal(_))
    }

    pub fn is_guard(&self) -> bool {
        matches!(self, Item::Guard(_))
    }

    pub fn is_ebnf(&self) -> bool {
        matches!(
            self,
            Item::Optional(_)
                | Item::RepeatOneOrMore(_)
                | Item::RepeatZeroOrMore(_)
                | Item::Alternative(_)
        )
    }

    /// True if the item can appear in a lookahead set and drive a reduction.
    pub fn is_lookahead(&self) -> bool {
        matches!(
            self,
            Item::Terminal(_) | Item::Eoi | Item::Eog | Item::Guard(_)
        )
    }

    /// True if a transition (new state) should be generated when the dot sits
    /// on this item. The empty item never appears as a symbol by itself.
    pub fn generate_transition(&self) -> bool {
        !matches!(self, Item::Empty)
    }

    /// Adds to `state` the LR(1) items implied by an item with the dot on it.
    ///
    /// `id` is this item's identifier, `source` the LR(1) item whose dot sits
    /// on it.
    pub(crate) fn closure(
        &self,
        id: ItemId,
        source: &Lr1Item,
        state: &mut Lr1ItemSet,
        grammar: &Grammar,
    ) {
        match self {
            // The empty item can always be immediately skipped.
            Item::Empty => {
                state.insert(Lr1Item::new(
                    source.core.next(),
                    source.lookahead.clone(),
                ));
            }
            _ => {
                let follow = grammar.follow_of_dot(source);
                self.closure_with_follow(id, &follow, state, grammar);
            }
        }
    }

    /// Closure with an explicit follow set, used both directly and to build
    /// the grammar's closure templates.
    pub(crate) fn closure_with_follow(
        &self,
        id: ItemId,
        follow: &crate::ItemSet,
        state: &mut Lr1ItemSet,
        grammar: &Grammar,
    ) {
        match self {
            Item::Nonterminal(_) => {
                for &rule in grammar.rules_for_nonterminal(id) {
                    insert_closure_item(rule, follow, state, grammar);
                }
            }
            Item::Optional(_)
            | Item::RepeatOneOrMore(_)
            | Item::RepeatZeroOrMore(_)
            | Item::Alternative(_) => {
                for &rule in grammar.closure_rules(id) {
                    insert_closure_item(rule, follow, state, grammar);
                }
            }
            // Guards are parsed in their own start state, terminals and
            // sentinels imply nothing.
            _ => {}
        }
    }
}

/// Adds a new LR(1) item at offset 0 of `rule`, completing the closure as
/// necessary.
fn insert_closure_item(
    rule: crate::RuleId,
    follow: &crate::ItemSet,
    state: &mut Lr1ItemSet,
    grammar: &Grammar,
) {
    let item = Lr1Item::at_start(rule, follow.clone());
    if state.insert(item.clone()) {
        if let Some(&initial) = grammar.rule(rule).items.first() {
            if !grammar.item(initial).is_terminal() {
                grammar.cache_closure(initial, &item, state);
            }
        }
    }
}

impl std::fmt::Display for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let body = |items: &[ItemId]| items.iter().map(|id| id.to_string()).join(" ");

        match self {
            Item::Empty => write!(f, "#"),
            Item::Eoi => write!(f, "$"),
            Item::Eog => write!(f, "%"),
            Item::Terminal(sym) => write!(f, "'{}'", sym),
            Item::Nonterminal(sym) => write!(f, "<{}>", sym),
            Item::Guard(items) => write!(f, "[=> {}]", body(items)),
            Item::Optional(items) => write!(f, "({})?", body(items)),
            Item::RepeatOneOrMore(items) => write!(f, "({})+", body(items)),
            Item::RepeatZeroOrMore(items) => write!(f, "({})*", body(items)),
            Item::Alternative(rules) => {
                write!(f, "({})", rules.iter().map(|r| body(r)).join(" | "))
            }
        }
    }
}
