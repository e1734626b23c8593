use std::collections::BTreeSet;

use crate::lr::rewrite::ActionRewriter;
use crate::lr::{Action, ActionKind, ActionSet, LalrBuilder};
use crate::ItemId;

/// Rewriter implementing ignored symbols.
///
/// An ignored terminal is discarded by the parser unless the current state
/// has an explicit action for it. For every state, any ignored terminal that
/// is not already shifted gains an `ignore` action; reduce actions on an
/// ignored terminal become weak reduces, so the parser only reduces when the
/// symbol is genuinely part of the language at that point.
///
/// The ignored items should be terminals; ignoring other item kinds has no
/// meaning in this parser design.
#[derive(Debug, Clone, Default)]
pub struct IgnoredSymbols {
    items: BTreeSet<ItemId>,
}

impl IgnoredSymbols {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item(&mut self, item: ItemId) {
        self.items.insert(item);
    }

    pub fn items(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.items.iter().copied()
    }
}

impl ActionRewriter for IgnoredSymbols {
    fn rewrite_actions(&self, state: usize, actions: &mut ActionSet, _builder: &LalrBuilder) {
        let mut rewritten = ActionSet::new();
        let mut used: BTreeSet<ItemId> = BTreeSet::new();

        for action in actions.iter() {
            match action.kind {
                ActionKind::Reduce if self.items.contains(&action.item) => {
                    rewritten.insert(action.as_weak_reduce());
                }
                ActionKind::Shift => {
                    rewritten.insert(*action);
                    if self.items.contains(&action.item) {
                        used.insert(action.item);
                    }
                }
                ActionKind::Ignore => {
                    rewritten.insert(*action);
                    used.insert(action.item);
                }
                _ => {
                    rewritten.insert(*action);
                }
            }
        }

        for &ignored in &self.items {
            if !used.contains(&ignored) {
                rewritten.insert(Action::ignore(ignored, state));
            }
        }

        *actions = rewritten;
    }
}
