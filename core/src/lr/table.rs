use std::collections::{BTreeSet, HashMap};

use itertools::Itertools;
use prettytable::Table as PtTable;

use crate::lr::rewrite::WeakSymbols;
use crate::lr::{ActionKind, LalrBuilder};
use crate::{ItemId, RuleId};

/// One entry of a state's compact action table.
///
/// For terminal actions `symbol` is the lexer's symbol id; for nonterminal
/// actions (gotos, guards, the sentinels) it is the grammar's item id. For
/// reduce-like actions `next` indexes the tables' reduce-rule list; for every
/// other kind it is the target state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableAction {
    pub symbol: usize,
    pub kind: ActionKind,
    pub next: usize,
}

/// A reduce rule, indexed by the dense rule ids the actions carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReduceRule {
    /// The reducing item's id in the source grammar.
    pub item: ItemId,
    /// The rule's id in the source grammar.
    pub rule: RuleId,
    /// Number of stack entries the reduction pops.
    pub len: usize,
}

/// The compact tables driving the runtime parser.
///
/// Per state, terminal and nonterminal actions are kept in separate arrays
/// sorted by (symbol, action priority); lookup is a binary search on the
/// symbol followed by a linear walk of the equal-symbol run. Logically
/// immutable once built, so any number of sessions can share them.
#[derive(Debug, Clone)]
pub struct ParserTables {
    end_of_input: ItemId,
    end_of_guard: ItemId,
    terminal_actions: Vec<Vec<TableAction>>,
    nonterminal_actions: Vec<Vec<TableAction>>,
    rules: Vec<ReduceRule>,
    /// States with an action on the end-of-guard symbol, sorted.
    end_guard_states: Vec<usize>,
    /// Weak terminal → strong terminal, in the lexer's symbol space, sorted.
    weak_to_strong: Vec<(usize, usize)>,
}

impl ParserTables {
    /// Builds the tables from a completed builder.
    pub fn from_builder(builder: &LalrBuilder, weak_symbols: Option<&WeakSymbols>) -> Self {
        let grammar = builder.grammar();
        let count = builder.count_states();

        let mut dense_rules: HashMap<RuleId, usize> = HashMap::new();
        let mut rules: Vec<ReduceRule> = Vec::new();
        let mut terminal_actions = Vec::with_capacity(count);
        let mut nonterminal_actions = Vec::with_capacity(count);

        for state in 0..count {
            let mut terminals: Vec<TableAction> = Vec::new();
            let mut nonterminals: Vec<TableAction> = Vec::new();

            for action in builder.actions_for_state(state).iter() {
                let next = match action.kind {
                    ActionKind::Reduce | ActionKind::WeakReduce | ActionKind::Accept => {
                        let rule = action.rule.expect("reduce-like actions carry a rule");
                        *dense_rules.entry(rule).or_insert_with(|| {
                            rules.push(ReduceRule {
                                item: grammar.rule(rule).lhs,
                                rule,
                                len: grammar.rule(rule).len(),
                            });
                            rules.len() - 1
                        })
                    }
                    _ => action.next_state,
                };

                match grammar.item(action.item) {
                    crate::item::Item::Terminal(sym) => terminals.push(TableAction {
                        symbol: *sym,
                        kind: action.kind,
                        next,
                    }),
                    _ => nonterminals.push(TableAction {
                        symbol: action.item,
                        kind: action.kind,
                        next,
                    }),
                }
            }

            let rank = |action: &TableAction| (action.symbol, action.kind.priority(), action.next);
            terminals.sort_by_key(rank);
            nonterminals.sort_by_key(rank);

            terminal_actions.push(terminals);
            nonterminal_actions.push(nonterminals);
        }

        let eog = grammar.eog_id();
        let end_guard_states: Vec<usize> = (0..count)
            .filter(|&state| {
                nonterminal_actions[state]
                    .iter()
                    .any(|action| action.symbol == eog)
            })
            .collect();

        Self {
            end_of_input: grammar.eoi_id(),
            end_of_guard: eog,
            terminal_actions,
            nonterminal_actions,
            rules,
            end_guard_states,
            weak_to_strong: weak_symbols
                .map(|weak| weak.weak_to_strong(grammar))
                .unwrap_or_default(),
        }
    }

    pub fn count_states(&self) -> usize {
        self.terminal_actions.len()
    }

    /// The nonterminal id representing the end of input.
    pub fn end_of_input(&self) -> ItemId {
        self.end_of_input
    }

    /// The nonterminal id representing the end of a guard.
    pub fn end_of_guard(&self) -> ItemId {
        self.end_of_guard
    }

    pub fn rule(&self, id: usize) -> &ReduceRule {
        &self.rules[id]
    }

    pub fn count_rules(&self) -> usize {
        self.rules.len()
    }

    /// The actions a state has for a terminal symbol, best first.
    pub fn terminal_actions(&self, state: usize, symbol: usize) -> &[TableAction] {
        Self::find(&self.terminal_actions[state], symbol)
    }

    /// The actions a state has for a nonterminal-class item, best first.
    pub fn nonterminal_actions(&self, state: usize, symbol: usize) -> &[TableAction] {
        Self::find(&self.nonterminal_actions[state], symbol)
    }

    fn find(actions: &[TableAction], symbol: usize) -> &[TableAction] {
        let start = actions.partition_point(|action| action.symbol < symbol);
        let len = actions[start..]
            .iter()
            .take_while(|action| action.symbol == symbol)
            .count();
        &actions[start..start + len]
    }

    /// True if the state has an action on the end-of-guard symbol.
    pub fn has_end_of_guard(&self, state: usize) -> bool {
        self.end_guard_states.binary_search(&state).is_ok()
    }

    /// The strong symbol a weak terminal falls back to, or the terminal
    /// itself.
    pub fn strong_for_weak(&self, weak: usize) -> usize {
        match self.weak_to_strong.binary_search_by_key(&weak, |pair| pair.0) {
            Ok(index) => self.weak_to_strong[index].1,
            Err(_) => weak,
        }
    }
}

impl std::fmt::Display for ParserTables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let terminals: BTreeSet<usize> = self
            .terminal_actions
            .iter()
            .flatten()
            .map(|action| action.symbol)
            .collect();
        let nonterminals: BTreeSet<usize> = self
            .nonterminal_actions
            .iter()
            .flatten()
            .map(|action| action.symbol)
            .collect();

        let render = |action: &TableAction| match action.kind {
            ActionKind::Shift => format!("s{}", action.next),
            ActionKind::Ignore => "i".to_string(),
            ActionKind::Reduce => format!("r{}", action.next),
            ActionKind::WeakReduce => format!("w{}", action.next),
            ActionKind::Accept => "acc".to_string(),
            ActionKind::Goto => action.next.to_string(),
            ActionKind::Divert => format!("d{}", action.next),
            ActionKind::Guard => format!("g{}", action.next),
        };

        let mut table = PtTable::new();
        table.add_row(
            ["#".to_string()]
                .into_iter()
                .chain(terminals.iter().map(|sym| format!("'{}'", sym)))
                .chain(nonterminals.iter().map(|sym| format!("<{}>", sym)))
                .collect(),
        );

        for state in 0..self.count_states() {
            let cell = |actions: &[TableAction], symbol: usize| {
                actions
                    .iter()
                    .filter(|action| action.symbol == symbol)
                    .map(render)
                    .join("/")
            };

            table.add_row(
                [state.to_string()]
                    .into_iter()
                    .chain(
                        terminals
                            .iter()
                            .map(|&sym| cell(&self.terminal_actions[state], sym)),
                    )
                    .chain(
                        nonterminals
                            .iter()
                            .map(|&sym| cell(&self.nonterminal_actions[state], sym)),
                    )
                    .collect(),
            );
        }

        write!(f, "{}", table)
    }
}
