use std::collections::BTreeSet;

use crate::{ItemId, RuleId};

/// The kinds of action a state can carry for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActionKind {
    /// Read the lookahead, push the next state.
    Shift,
    /// Discard the lookahead and continue.
    Ignore,
    /// Pop the rule's length, synthesize its nonterminal, follow the goto.
    Reduce,
    /// Reduce only if the lookahead would be shifted afterwards.
    WeakReduce,
    /// Like reduce, but the reduced symbol is the root: the parse succeeds.
    Accept,
    /// Post-reduction state transition on a nonterminal.
    Goto,
    /// Push the next state without consuming the lookahead.
    Divert,
    /// Evaluate the guard sub-parser; on acceptance, substitute the guard
    /// symbol as the effective lookahead.
    Guard,
}

impl ActionKind {
    /// Ranks actions in the order they should be tried when several share a
    /// symbol.
    pub fn priority(self) -> u8 {
        match self {
            // Guards are evaluated first, so the guard symbol can be
            // substituted if it matches.
            ActionKind::Guard => 0,
            // A weak reduce is always performed if its symbol will shift.
            ActionKind::WeakReduce => 1,
            ActionKind::Shift | ActionKind::Divert => 2,
            ActionKind::Reduce => 3,
            // Gotos never actually clash.
            ActionKind::Goto => 4,
            _ => 5,
        }
    }
}

/// One entry of a state's action set.
///
/// `item` is the lookahead item for shift/reduce-like actions and the
/// reached symbol for gotos; `next_state` is the transition target (the guard
/// start state for guard actions); `rule` is the reduced rule for
/// reduce-like actions and the guard's rule for guard actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Action {
    pub item: ItemId,
    pub kind: ActionKind,
    pub next_state: usize,
    pub rule: Option<RuleId>,
}

impl Action {
    pub fn shift(item: ItemId, next_state: usize) -> Self {
        Self {
            item,
            kind: ActionKind::Shift,
            next_state,
            rule: None,
        }
    }

    pub fn goto(item: ItemId, next_state: usize) -> Self {
        Self {
            item,
            kind: ActionKind::Goto,
            next_state,
            rule: None,
        }
    }

    pub fn divert(item: ItemId, next_state: usize) -> Self {
        Self {
            item,
            kind: ActionKind::Divert,
            next_state,
            rule: None,
        }
    }

    pub fn ignore(item: ItemId, state: usize) -> Self {
        Self {
            item,
            kind: ActionKind::Ignore,
            next_state: state,
            rule: None,
        }
    }

    pub fn reduce(item: ItemId, rule: RuleId) -> Self {
        Self {
            item,
            kind: ActionKind::Reduce,
            next_state: 0,
            rule: Some(rule),
        }
    }

    pub fn weak_reduce(item: ItemId, rule: RuleId) -> Self {
        Self {
            item,
            kind: ActionKind::WeakReduce,
            next_state: 0,
            rule: Some(rule),
        }
    }

    pub fn accept(item: ItemId, rule: RuleId) -> Self {
        Self {
            item,
            kind: ActionKind::Accept,
            next_state: 0,
            rule: Some(rule),
        }
    }

    pub fn guard(item: ItemId, start_state: usize, rule: RuleId) -> Self {
        Self {
            item,
            kind: ActionKind::Guard,
            next_state: start_state,
            rule: Some(rule),
        }
    }

    /// The same action retargeted at another item.
    pub fn for_item(&self, item: ItemId) -> Self {
        Self { item, ..*self }
    }

    /// A weak-reduce action reducing the same rule on the same item.
    pub fn as_weak_reduce(&self) -> Self {
        Self {
            kind: ActionKind::WeakReduce,
            ..*self
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ActionKind::Shift => write!(f, "s{}", self.next_state),
            ActionKind::Ignore => write!(f, "i"),
            ActionKind::Reduce => write!(f, "r{}", self.rule.unwrap_or(0)),
            ActionKind::WeakReduce => write!(f, "w{}", self.rule.unwrap_or(0)),
            ActionKind::Accept => write!(f, "acc"),
            ActionKind::Goto => write!(f, "{}", self.next_state),
            ActionKind::Divert => write!(f, "d{}", self.next_state),
            ActionKind::Guard => write!(f, "g{}", self.next_state),
        }
    }
}

/// A state's actions, ordered by (item, kind, target, rule) so synthesis and
/// rewriting stay deterministic.
pub type ActionSet = BTreeSet<Action>;
