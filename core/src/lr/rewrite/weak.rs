use std::collections::{BTreeMap, BTreeSet};

use crate::grammar::Grammar;
use crate::item_set::ItemSet;
use crate::lr::rewrite::ActionRewriter;
use crate::lr::{ActionKind, ActionSet, LalrBuilder};
use crate::ItemId;

/// Rewriter implementing weak lexical symbols.
///
/// A weak symbol is matched by the lexer only in the contexts where the
/// parser asks for it; everywhere else its strong counterpart (typically an
/// identifier) is matched instead. In any state with actions on a strong
/// symbol, equivalent actions are added for its weak companions, provided
/// the state has none of its own. When a state has actions on both a weak
/// symbol and its strong counterpart, reduces on the weak symbol become weak
/// reduces, so the reduction only happens when the symbol really continues
/// the language.
#[derive(Debug, Clone, Default)]
pub struct WeakSymbols {
    strong_to_weak: BTreeMap<ItemId, ItemSet>,
}

impl WeakSymbols {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_map(strong_to_weak: BTreeMap<ItemId, ItemSet>) -> Self {
        Self { strong_to_weak }
    }

    /// Maps a strong symbol to companion weak symbols.
    pub fn add_symbols(&mut self, strong: ItemId, weak: impl IntoIterator<Item = ItemId>) {
        let entry = self.strong_to_weak.entry(strong).or_default();
        for item in weak {
            entry.insert(item);
        }
    }

    /// Derives the strong → weak map from the accept actions of a lexer's
    /// DFA.
    ///
    /// `accept_actions` carries, per DFA state, the lexer symbols the state
    /// accepts; `weak` the symbols declared weak. Within one state the
    /// lowest non-weak symbol id is the strong representative (the symbol
    /// the lexer actually produces) and every weak symbol sharing the state
    /// becomes one of its companions.
    pub fn add_accept_actions(
        &mut self,
        grammar: &mut Grammar,
        accept_actions: &[Vec<usize>],
        weak: &BTreeSet<usize>,
    ) {
        let mut weak_to_strong: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();

        for accepted in accept_actions {
            if accepted.is_empty() {
                continue;
            }

            let strongest = accepted
                .iter()
                .filter(|sym| !weak.contains(sym))
                .min()
                .copied();
            let used_weak: BTreeSet<usize> = accepted
                .iter()
                .filter(|sym| weak.contains(sym))
                .copied()
                .collect();

            let Some(strongest) = strongest else {
                continue;
            };
            if used_weak.is_empty() {
                continue;
            }

            for sym in used_weak {
                weak_to_strong.entry(sym).or_default().insert(strongest);
            }
        }

        for (weak_sym, strongs) in weak_to_strong {
            // A weak symbol with several strong counterparts keeps the first.
            let Some(&strong_sym) = strongs.iter().next() else {
                continue;
            };

            let strong = grammar.terminal(strong_sym);
            let weak_item = grammar.terminal(weak_sym);
            self.add_symbols(strong, [weak_item]);
        }
    }

    /// The weak → strong substitution pairs, in the lexer's symbol space,
    /// sorted by weak symbol. The lexer wrapper uses this to downgrade a weak
    /// match in states that do not accept it.
    pub fn weak_to_strong(&self, grammar: &Grammar) -> Vec<(usize, usize)> {
        let mut pairs: Vec<(usize, usize)> = Vec::new();

        for (&strong, weaks) in &self.strong_to_weak {
            let Some(strong_sym) = terminal_symbol(grammar, strong) else {
                continue;
            };

            for weak in weaks.iter() {
                if let Some(weak_sym) = terminal_symbol(grammar, weak) {
                    pairs.push((weak_sym, strong_sym));
                }
            }
        }

        pairs.sort();
        pairs.dedup_by_key(|pair| pair.0);
        pairs
    }
}

fn terminal_symbol(grammar: &Grammar, item: ItemId) -> Option<usize> {
    match grammar.item(item) {
        crate::item::Item::Terminal(sym) => Some(*sym),
        _ => None,
    }
}

impl ActionRewriter for WeakSymbols {
    fn rewrite_actions(&self, _state: usize, actions: &mut ActionSet, _builder: &LalrBuilder) {
        for (&strong, weaks) in &self.strong_to_weak {
            let strong_actions: Vec<_> = actions
                .iter()
                .filter(|action| action.item == strong)
                .copied()
                .collect();
            if strong_actions.is_empty() {
                continue;
            }

            for weak in weaks.iter() {
                let weak_actions: Vec<_> = actions
                    .iter()
                    .filter(|action| action.item == weak)
                    .copied()
                    .collect();

                if weak_actions.is_empty() {
                    // The weak symbol mirrors its strong counterpart here.
                    // Mirrored reduces are weak from the start: the reduction
                    // only makes sense if the weak symbol survives it.
                    for action in &strong_actions {
                        let mirrored = match action.kind {
                            ActionKind::Reduce => action.for_item(weak).as_weak_reduce(),
                            _ => action.for_item(weak),
                        };
                        actions.insert(mirrored);
                    }
                } else {
                    // Both are matched: the weak symbol's reduces may only
                    // fire when the symbol will be shifted afterwards.
                    for action in weak_actions {
                        if action.kind == ActionKind::Reduce {
                            actions.remove(&action);
                            actions.insert(action.as_weak_reduce());
                        }
                    }
                }
            }
        }
    }
}
