use std::collections::{BTreeMap, HashMap};

use crate::item_set::ItemSet;
use crate::lr::{LalrState, Lr0Item};
use crate::ItemId;

/// The LALR state machine: states indexed by id, a deduplication map keyed by
/// state kernels, and the transition table.
#[derive(Debug, Default)]
pub struct LalrMachine {
    states: Vec<LalrState>,
    ids: HashMap<Vec<Lr0Item>, usize>,
    transitions: Vec<BTreeMap<ItemId, usize>>,
}

impl LalrMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a state, or returns the identifier of the state with the same
    /// kernel.
    pub fn add_state(&mut self, mut state: LalrState) -> usize {
        if let Some(id) = state.id() {
            return id;
        }

        let key = state.kernel_key();
        if let Some(&id) = self.ids.get(&key) {
            return id;
        }

        let id = self.states.len();
        state.set_id(id);
        self.ids.insert(key, id);
        self.states.push(state);
        self.transitions.push(BTreeMap::new());
        id
    }

    pub fn count_states(&self) -> usize {
        self.states.len()
    }

    pub fn state(&self, id: usize) -> &LalrState {
        &self.states[id]
    }

    /// The transitions leaving the specified state, keyed by item.
    pub fn transitions(&self, id: usize) -> &BTreeMap<ItemId, usize> {
        &self.transitions[id]
    }

    pub fn add_transition(&mut self, from: usize, item: ItemId, to: usize) {
        if to >= self.states.len() {
            return;
        }
        self.transitions[from].insert(item, to);
    }

    /// Merges new lookahead into the specified kernel item, ignoring the ε
    /// placeholder. Returns true when the lookahead grew.
    pub fn add_lookahead(
        &mut self,
        state: usize,
        item: usize,
        lookahead: &ItemSet,
        empty: ItemId,
    ) -> bool {
        let target = self.states[state].lookahead_mut(item);

        let mut changed = false;
        for id in lookahead.iter() {
            if id == empty {
                continue;
            }
            if target.insert(id) {
                changed = true;
            }
        }
        changed
    }
}
