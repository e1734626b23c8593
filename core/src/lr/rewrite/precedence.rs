use std::collections::{BTreeMap, HashMap};

use crate::grammar::Grammar;
use crate::lr::rewrite::ActionRewriter;
use crate::lr::{Action, ActionKind, ActionSet, LalrBuilder, Lr0Item};
use crate::rule::Rule;
use crate::ItemId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Associativity {
    Left,
    Right,
    NonAssociative,
}

/// Supplies operator precedences to the precedence rewriter.
///
/// `precedence` may inspect the items that would shift the terminal in the
/// conflicted state; the slice is empty when the rewriter asks about a
/// terminal outside any particular state (to rank a rule's operator).
pub trait PrecedenceHooks {
    fn precedence(&self, terminal: ItemId, shift_items: &[Lr0Item]) -> Option<i32>;

    fn associativity(&self, terminal: ItemId, shift_items: &[Lr0Item]) -> Associativity;
}

/// Rewriter resolving shift/reduce conflicts by operator precedence.
///
/// For a conflict with exactly one shift and one reduce, the shifted
/// terminal's precedence is compared with the reduced rule's precedence (the
/// precedence of the single operator terminal in its body). The higher
/// precedence wins; on a tie the rule's associativity decides: left
/// associative reduces, right associative shifts, nonassociative leaves the
/// conflict in place.
pub struct PrecedenceRewriter<H: PrecedenceHooks> {
    hooks: H,
}

impl<H: PrecedenceHooks> PrecedenceRewriter<H> {
    pub fn new(hooks: H) -> Self {
        Self { hooks }
    }

    /// The position of the item that defines the rule's precedence: the
    /// rule's only operator terminal. Rules with several ranked terminals
    /// have no usable precedence.
    fn precedence_item_index(&self, rule: &Rule, grammar: &Grammar) -> Option<usize> {
        let mut found = None;

        for (pos, &item) in rule.items.iter().enumerate() {
            if !grammar.item(item).is_terminal() {
                continue;
            }
            if self.hooks.precedence(item, &[]).is_none() {
                continue;
            }
            if found.is_some() {
                return None;
            }
            found = Some(pos);
        }

        found
    }

    pub fn rule_precedence(&self, rule: &Rule, grammar: &Grammar) -> Option<i32> {
        let index = self.precedence_item_index(rule, grammar)?;
        self.hooks.precedence(rule.items[index], &[])
    }

    pub fn rule_associativity(&self, rule: &Rule, grammar: &Grammar) -> Associativity {
        match self.precedence_item_index(rule, grammar) {
            Some(index) => self.hooks.associativity(rule.items[index], &[]),
            None => Associativity::NonAssociative,
        }
    }
}

impl<H: PrecedenceHooks> ActionRewriter for PrecedenceRewriter<H> {
    fn rewrite_actions(&self, state: usize, actions: &mut ActionSet, builder: &LalrBuilder) {
        let grammar = builder.grammar();
        let machine_state = builder.machine().state(state);

        let mut by_token: BTreeMap<ItemId, Vec<Action>> = BTreeMap::new();
        for action in actions.iter() {
            if grammar.item(action.item).is_terminal() {
                by_token.entry(action.item).or_default().push(*action);
            }
        }

        for (token, token_actions) in by_token {
            let shifts: Vec<_> = token_actions
                .iter()
                .filter(|a| a.kind == ActionKind::Shift)
                .collect();
            let reduces: Vec<_> = token_actions
                .iter()
                .filter(|a| a.kind == ActionKind::Reduce)
                .collect();

            // Only clean single shift against single reduce is resolvable.
            if shifts.len() != 1 || reduces.len() != 1 {
                continue;
            }
            let shift = *shifts[0];
            let reduce = *reduces[0];

            let shift_items: Vec<Lr0Item> = (0..machine_state.len())
                .map(|index| machine_state.item(index))
                .filter(|core| core.dotted(grammar) == Some(token))
                .collect();

            let reduce_rule = grammar.rule(reduce.rule.expect("reduce actions carry a rule"));
            let shift_prec = self.hooks.precedence(token, &shift_items);
            let reduce_prec = self.rule_precedence(reduce_rule, grammar);

            let (Some(shift_prec), Some(reduce_prec)) = (shift_prec, reduce_prec) else {
                continue;
            };

            if shift_prec < reduce_prec {
                // a + b - c --> (a + b) - c
                actions.remove(&shift);
            } else if shift_prec > reduce_prec {
                // a + b - c --> a + (b - c)
                actions.remove(&reduce);
            } else {
                match self.rule_associativity(reduce_rule, grammar) {
                    Associativity::Right => {
                        actions.remove(&reduce);
                    }
                    Associativity::Left => {
                        actions.remove(&shift);
                    }
                    Associativity::NonAssociative => {}
                }
            }
        }
    }
}

/// Table-driven precedence hooks.
#[derive(Debug, Clone, Default)]
pub struct PrecedenceTable {
    entries: HashMap<ItemId, (i32, Associativity)>,
}

impl PrecedenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, terminal: ItemId, precedence: i32, associativity: Associativity) {
        self.entries.insert(terminal, (precedence, associativity));
    }
}

impl PrecedenceHooks for PrecedenceTable {
    fn precedence(&self, terminal: ItemId, _shift_items: &[Lr0Item]) -> Option<i32> {
        self.entries.get(&terminal).map(|entry| entry.0)
    }

    fn associativity(&self, terminal: ItemId, _shift_items: &[Lr0Item]) -> Associativity {
        self.entries
            .get(&terminal)
            .map(|entry| entry.1)
            .unwrap_or(Associativity::NonAssociative)
    }
}
