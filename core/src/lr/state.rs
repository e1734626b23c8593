use std::collections::HashMap;

use itertools::Itertools;

use crate::grammar::Grammar;
use crate::item_set::ItemSet;
use crate::lr::Lr0Item;

/// A state in a LALR machine.
///
/// Holds the kernel items in insertion order, each with its own mutable
/// lookahead set. Item indices count from 0 in insertion order and are stable
/// for the lifetime of the state. Equality compares the kernel only: states
/// that differ only in lookahead must merge.
#[derive(Debug, Clone, Default)]
pub struct LalrState {
    id: Option<usize>,
    items: Vec<Lr0Item>,
    index: HashMap<Lr0Item, usize>,
    lookahead: Vec<ItemSet>,
}

impl LalrState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The state's identifier in the machine, once it has been added.
    pub fn id(&self) -> Option<usize> {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: usize) {
        self.id = Some(id);
    }

    /// Adds a kernel item, returning its index. Re-adding an item returns the
    /// existing index.
    pub fn add(&mut self, item: Lr0Item) -> usize {
        if let Some(&index) = self.index.get(&item) {
            return index;
        }

        let index = self.items.len();
        self.items.push(item);
        self.index.insert(item, index);
        self.lookahead.push(ItemSet::new());
        index
    }

    /// The index of the specified kernel item.
    pub fn find(&self, item: &Lr0Item) -> Option<usize> {
        self.index.get(item).copied()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The kernel item at the specified index.
    pub fn item(&self, index: usize) -> Lr0Item {
        self.items[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = Lr0Item> + '_ {
        self.items.iter().copied()
    }

    pub fn lookahead(&self, index: usize) -> &ItemSet {
        &self.lookahead[index]
    }

    pub fn lookahead_mut(&mut self, index: usize) -> &mut ItemSet {
        &mut self.lookahead[index]
    }

    /// The kernel in canonical order, used to deduplicate states.
    pub(crate) fn kernel_key(&self) -> Vec<Lr0Item> {
        self.items.iter().copied().sorted().collect()
    }

    pub fn display(&self, grammar: &Grammar) -> String {
        self.items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                format!("{}, {}", item.display(grammar), self.lookahead[index])
            })
            .join("\n")
    }
}

impl PartialEq for LalrState {
    fn eq(&self, other: &Self) -> bool {
        self.kernel_key() == other.kernel_key()
    }
}

impl Eq for LalrState {}
