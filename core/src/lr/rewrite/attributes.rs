use std::collections::{BTreeMap, HashMap};

use crate::lr::rewrite::ActionRewriter;
use crate::lr::{Action, ActionKind, ActionSet, LalrBuilder};
use crate::ItemId;

/// How a conflict on an item should be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictAction {
    #[default]
    NotSpecified,
    Shift,
    Reduce,
    WeakReduce,
}

/// Rewriter resolving shift/reduce conflicts from per-position attributes.
///
/// Rule positions carry opaque keys; this rewriter maps keys to resolutions.
/// For every terminal with both shift and reduce actions, the keys of the
/// state's items that would shift the terminal decide the outcome: keep the
/// shifts, keep the reduce, or demote the reduce to a weak reduce.
///
/// Conflicts with more than one reduce are left alone (they are the LR(1)
/// rewriter's problem), and attributes are not propagated through EBNF
/// alternatives: only the keys sitting directly on the shifting rule
/// positions are consulted.
#[derive(Debug, Clone, Default)]
pub struct ConflictAttributes {
    keys: HashMap<usize, ConflictAction>,
}

impl ConflictAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates an opaque position key with a resolution.
    pub fn set_key(&mut self, key: usize, action: ConflictAction) {
        self.keys.insert(key, action);
    }

    fn resolution_for(&self, key: usize) -> ConflictAction {
        if key == 0 {
            return ConflictAction::NotSpecified;
        }
        self.keys.get(&key).copied().unwrap_or_default()
    }
}

impl ActionRewriter for ConflictAttributes {
    fn rewrite_actions(&self, state: usize, actions: &mut ActionSet, builder: &LalrBuilder) {
        let grammar = builder.grammar();

        let mut by_token: BTreeMap<ItemId, Vec<Action>> = BTreeMap::new();
        for action in actions.iter() {
            if grammar.item(action.item).is_terminal() {
                by_token.entry(action.item).or_default().push(*action);
            }
        }

        let machine_state = builder.machine().state(state);

        for (token, token_actions) in by_token {
            let shifts = token_actions
                .iter()
                .filter(|a| a.kind == ActionKind::Shift)
                .count();
            let reduces: Vec<_> = token_actions
                .iter()
                .filter(|a| a.kind == ActionKind::Reduce)
                .collect();

            if shifts == 0 || reduces.is_empty() || reduces.len() > 1 {
                continue;
            }

            // The attribute comes from the rule positions that shift the
            // token; when several specify one, the last wins.
            let mut resolve = ConflictAction::NotSpecified;
            for index in 0..machine_state.len() {
                let core = machine_state.item(index);
                if core.dotted(grammar) != Some(token) {
                    continue;
                }

                let key = grammar.rule(core.rule).key(core.offset);
                let specified = self.resolution_for(key);
                if specified != ConflictAction::NotSpecified {
                    resolve = specified;
                }
            }

            match resolve {
                ConflictAction::NotSpecified => {}
                ConflictAction::Shift => {
                    for action in &reduces {
                        actions.remove(action);
                    }
                }
                ConflictAction::Reduce => {
                    for action in token_actions
                        .iter()
                        .filter(|a| a.kind == ActionKind::Shift)
                    {
                        actions.remove(action);
                    }
                }
                ConflictAction::WeakReduce => {
                    for action in &reduces {
                        actions.remove(action);
                        actions.insert(action.as_weak_reduce());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::lr::conflict::{find_conflicts, ConflictKind};
    use crate::lr::LalrBuilder;

    /// The key the dangling-else fixture puts on its `else` position.
    const ELSE_KEY: usize = fixtures::DANGLING_ELSE_KEY;

    fn conflicted_state(builder: &LalrBuilder) -> (usize, ItemId) {
        let conflicts = find_conflicts(builder);
        let conflict = conflicts
            .iter()
            .find(|c| c.kind == ConflictKind::ShiftReduce)
            .expect("fixture should have a shift/reduce conflict");
        (conflict.state, conflict.token)
    }

    #[test]
    fn reduce_attribute_flips_the_default_shift() {
        // Without attributes the conflict stands (resolved in favour of
        // shift by the table's priority order).
        let (mut grammar, s) = fixtures::dangling_else();
        let mut builder = LalrBuilder::new(&mut grammar);
        builder.add_initial_state(s).unwrap();
        builder.complete_parser().unwrap();
        let (state, token) = conflicted_state(&builder);
        drop(builder);

        // With a 'reduce' attribute on the else position, the shift is
        // removed.
        let mut attributes = ConflictAttributes::new();
        attributes.set_key(ELSE_KEY, ConflictAction::Reduce);

        let mut builder = LalrBuilder::new(&mut grammar);
        builder.add_rewriter(Box::new(attributes));
        builder.add_initial_state(s).unwrap();
        builder.complete_parser().unwrap();

        let actions = builder.actions_for_state(state);
        assert!(actions
            .iter()
            .all(|a| !(a.item == token && a.kind == ActionKind::Shift)));
        assert!(actions
            .iter()
            .any(|a| a.item == token && a.kind == ActionKind::Reduce));
    }

    #[test]
    fn shift_attribute_drops_the_reduce() {
        let (mut grammar, s) = fixtures::dangling_else();

        let mut attributes = ConflictAttributes::new();
        attributes.set_key(ELSE_KEY, ConflictAction::Shift);

        let mut builder = LalrBuilder::new(&mut grammar);
        builder.add_rewriter(Box::new(attributes));
        builder.add_initial_state(s).unwrap();
        builder.complete_parser().unwrap();

        assert!(find_conflicts(&builder).is_empty());
    }

    #[test]
    fn weak_reduce_attribute_keeps_both() {
        let (mut grammar, s) = fixtures::dangling_else();

        let mut attributes = ConflictAttributes::new();
        attributes.set_key(ELSE_KEY, ConflictAction::WeakReduce);

        let mut builder = LalrBuilder::new(&mut grammar);
        builder.add_rewriter(Box::new(attributes));
        builder.add_initial_state(s).unwrap();
        builder.complete_parser().unwrap();

        let mut weak = 0;
        let mut shift = 0;
        for state in 0..builder.count_states() {
            for action in builder.actions_for_state(state).iter() {
                match action.kind {
                    ActionKind::WeakReduce => weak += 1,
                    ActionKind::Shift => shift += 1,
                    _ => {}
                }
            }
        }
        assert!(weak > 0);
        assert!(shift > 0);
    }
}
