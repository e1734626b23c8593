use std::collections::{BTreeMap, BTreeSet};

use crate::lr::rewrite::ActionRewriter;
use crate::lr::{Action, ActionKind, ActionSet, LalrBuilder};
use crate::ItemId;

/// Rewriter resolving LALR-only reduce/reduce conflicts.
///
/// Merging states by LR(0) kernel can produce reduce/reduce conflicts a
/// canonical LR(1) parser would not have. For such a conflict, the lookahead
/// sources of each reduction give the states the reduction can return to; if
/// those state sets are disjoint, only one of the reductions can ever
/// continue the parse. All but one are demoted to weak reduces and the
/// runtime's `can_reduce` probe picks the reduction whose continuation
/// actually shifts the lookahead.
///
/// Only the reduce/reduce case is handled; the shift/reduce variant of the
/// same disambiguation is not attempted.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lr1Rewriter;

impl Lr1Rewriter {
    pub fn new() -> Self {
        Self
    }
}

impl ActionRewriter for Lr1Rewriter {
    fn rewrite_actions(&self, state_id: usize, actions: &mut ActionSet, builder: &LalrBuilder) {
        let grammar = builder.grammar();

        // Reductions per terminal.
        let mut reductions: BTreeMap<ItemId, Vec<Action>> = BTreeMap::new();
        let mut has_conflict = false;

        for action in actions.iter() {
            if action.kind != ActionKind::Reduce {
                continue;
            }
            if !grammar.item(action.item).is_terminal() {
                continue;
            }

            let items = reductions.entry(action.item).or_default();
            items.push(*action);
            if items.len() >= 2 {
                has_conflict = true;
            }
        }

        if !has_conflict {
            return;
        }

        let state = builder.machine().state(state_id);

        for (token, conflicted) in reductions {
            if conflicted.len() < 2 {
                continue;
            }

            // The states each reduction returns to, per reducible item.
            let mut targets_for_item: Vec<BTreeSet<usize>> = Vec::new();

            for index in 0..state.len() {
                let core = state.item(index);
                if !core.at_end(grammar) {
                    continue;
                }
                if !state.lookahead(index).contains(token) {
                    continue;
                }

                let reducing = grammar.rule(core.rule).lhs;
                let mut targets = BTreeSet::new();

                for source in builder.find_lookahead_source(state_id, index, token) {
                    let source_core = builder.machine().state(source.state).item(source.item);

                    // Items at the end only show up via propagation; they
                    // are not somewhere a reduction can return to.
                    if source_core.at_end(grammar) {
                        continue;
                    }

                    // The source must goto on the nonterminal being reduced.
                    if source_core.dotted(grammar) != Some(reducing) {
                        continue;
                    }

                    targets.insert(source.state);
                }

                targets_for_item.push(targets);
            }

            // Resolvable when no return state is shared between reductions.
            let mut used: BTreeSet<usize> = BTreeSet::new();
            let can_resolve = targets_for_item.iter().all(|targets| {
                targets.iter().all(|&target| used.insert(target))
            });

            if can_resolve {
                for action in conflicted.iter().skip(1) {
                    actions.remove(action);
                    actions.insert(action.as_weak_reduce());
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

    #[test]
    fn lalr_only_conflict_becomes_weak_reduce() {
        let (mut grammar, s) = fixtures::lalr_only_conflict();

        let mut builder = LalrBuilder::new(&mut grammar);
        builder.add_rewriter(Box::new(Lr1Rewriter::new()));
        builder.add_initial_state(s).unwrap();
        builder.complete_parser().unwrap();

        // The reduce/reduce conflicts disappear: one reduction per token
        // stays plain, the other goes weak.
        let conflicts = find_conflicts(&builder);
        assert!(
            conflicts
                .iter()
                .all(|c| c.kind != ConflictKind::ReduceReduce),
            "{:?}",
            conflicts
        );

        let mut weak = 0;
        let mut plain = 0;
        for state in 0..builder.count_states() {
            for action in builder.actions_for_state(state).iter() {
                match action.kind {
                    ActionKind::WeakReduce => weak += 1,
                    ActionKind::Reduce => plain += 1,
                    _ => {}
                }
            }
        }
        assert!(weak > 0);
        assert!(plain > 0);
    }

    #[test]
    fn genuinely_ambiguous_reductions_are_left_alone() {
        // S -> A y | B y ; A -> x ; B -> x. Both reductions return to the
        // same state, so the conflict is real and must stay.
        let mut grammar = crate::grammar::Grammar::new();
        let s = grammar.id_for_nonterminal("S");
        let a = grammar.id_for_nonterminal("A");
        let b = grammar.id_for_nonterminal("B");
        let x = grammar.terminal(0);
        let y = grammar.terminal(1);

        grammar.add_rule(s, vec![a, y]);
        grammar.add_rule(s, vec![b, y]);
        grammar.add_rule(a, vec![x]);
        grammar.add_rule(b, vec![x]);

        let mut builder = LalrBuilder::new(&mut grammar);
        builder.add_rewriter(Box::new(Lr1Rewriter::new()));
        builder.add_initial_state(s).unwrap();
        builder.complete_parser().unwrap();

        assert!(find_conflicts(&builder)
            .iter()
            .any(|c| c.kind == ConflictKind::ReduceReduce));
    }
}
