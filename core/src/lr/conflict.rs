use std::collections::BTreeMap;
use std::collections::BTreeSet;

use itertools::Itertools;

use crate::error::ErrorKind;
use crate::grammar::Grammar;
use crate::lr::{ActionKind, LalrBuilder, Lr0Item, LrItemRef};
use crate::{ItemId, YalrResult};

/// How severe a category of conflict is considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// Per-category severities. Shift/reduce conflicts default to warnings,
/// reduce/reduce conflicts to errors; guard clashes always stay warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictPolicy {
    pub shift_reduce: Severity,
    pub reduce_reduce: Severity,
}

impl Default for ConflictPolicy {
    fn default() -> Self {
        Self {
            shift_reduce: Severity::Warning,
            reduce_reduce: Severity::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    ShiftReduce,
    ReduceReduce,
    ClashingGuards,
}

/// A conflict discovered in one state's action set.
///
/// For every reducible item the conflict also records the kernel items its
/// lookahead was generated from: the states a reduction on the token can
/// return to, which is usually what explains why the conflict exists.
#[derive(Debug, Clone)]
pub struct Conflict {
    pub state: usize,
    pub token: ItemId,
    pub kind: ConflictKind,
    /// The LR(0) kernel items that shift the token.
    pub shift_items: Vec<Lr0Item>,
    /// The items reducible under the token, with their lookahead sources.
    pub reduce_items: Vec<(Lr0Item, BTreeSet<LrItemRef>)>,
}

impl Conflict {
    pub fn display(&self, grammar: &Grammar) -> String {
        let kind = match self.kind {
            ConflictKind::ShiftReduce => "shift/reduce",
            ConflictKind::ReduceReduce => "reduce/reduce",
            ConflictKind::ClashingGuards => "clashing guards",
        };

        let mut out = format!(
            "{} conflict on {} in state {}",
            kind,
            grammar.display_item(self.token),
            self.state
        );

        for item in &self.shift_items {
            out.push_str(&format!("\n  shift  {}", item.display(grammar)));
        }
        for (item, sources) in &self.reduce_items {
            out.push_str(&format!(
                "\n  reduce {} (from {})",
                item.display(grammar),
                sources
                    .iter()
                    .map(|source| format!("{}:{}", source.state, source.item))
                    .join(", ")
            ));
        }

        out
    }
}

/// Scans every state's rewritten action set for conflicts.
///
/// The builder never aborts on a conflict; this gathers the complete list in
/// one pass so all diagnostics can be reported together.
pub fn find_conflicts(builder: &LalrBuilder) -> Vec<Conflict> {
    let grammar = builder.grammar();
    let mut conflicts = Vec::new();

    for state_id in 0..builder.count_states() {
        let actions = builder.actions_for_state(state_id);

        let mut by_token: BTreeMap<ItemId, (usize, usize, BTreeSet<usize>)> = BTreeMap::new();
        for action in actions.iter() {
            if !grammar.item(action.item).is_terminal() {
                continue;
            }

            let entry = by_token.entry(action.item).or_default();
            match action.kind {
                ActionKind::Shift => entry.0 += 1,
                ActionKind::Reduce => entry.1 += 1,
                ActionKind::Guard => {
                    entry.2.insert(action.next_state);
                }
                _ => {}
            }
        }

        for (token, (shifts, reduces, guard_starts)) in by_token {
            let kind = if shifts > 0 && reduces > 0 {
                ConflictKind::ShiftReduce
            } else if reduces > 1 {
                ConflictKind::ReduceReduce
            } else if guard_starts.len() > 1 {
                ConflictKind::ClashingGuards
            } else {
                continue;
            };

            conflicts.push(describe_conflict(builder, state_id, token, kind));
        }
    }

    conflicts
}

fn describe_conflict(
    builder: &LalrBuilder,
    state_id: usize,
    token: ItemId,
    kind: ConflictKind,
) -> Conflict {
    let grammar = builder.grammar();
    let state = builder.machine().state(state_id);

    let mut shift_items = Vec::new();
    let mut reduce_items = Vec::new();

    for index in 0..state.len() {
        let core = state.item(index);

        if core.dotted(grammar) == Some(token) {
            shift_items.push(core);
        }

        if core.at_end(grammar) && state.lookahead(index).contains(token) {
            let sources = builder.find_lookahead_source(state_id, index, token);
            reduce_items.push((core, sources));
        }
    }

    Conflict {
        state: state_id,
        token,
        kind,
        shift_items,
        reduce_items,
    }
}

impl ConflictPolicy {
    /// Promotes the gathered conflicts to an error according to this policy.
    ///
    /// The first conflict whose category is configured as an error is
    /// returned; warnings are left to the caller to render.
    pub fn check(&self, conflicts: &[Conflict], grammar: &Grammar) -> YalrResult<()> {
        for conflict in conflicts {
            let severity = match conflict.kind {
                ConflictKind::ShiftReduce => self.shift_reduce,
                ConflictKind::ReduceReduce => self.reduce_reduce,
                ConflictKind::ClashingGuards => Severity::Warning,
            };

            if severity != Severity::Error {
                continue;
            }

            let symbol = grammar.display_item(conflict.token);
            let kind = match conflict.kind {
                ConflictKind::ShiftReduce => ErrorKind::ShiftReduceConflict {
                    state: conflict.state,
                    symbol,
                },
                ConflictKind::ReduceReduce => ErrorKind::ReduceReduceConflict {
                    state: conflict.state,
                    symbol,
                },
                ConflictKind::ClashingGuards => continue,
            };
            return Err(kind.into());
        }

        Ok(())
    }
}
