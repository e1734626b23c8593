use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use crate::error::ErrorKind;
use crate::grammar::Grammar;
use crate::item::{Item, ItemId};
use crate::item_set::ItemSet;
use crate::lr::rewrite::ActionRewriter;
use crate::lr::{Action, ActionSet, LalrMachine, LalrState, Lr0Item, Lr1Item, Lr1ItemSet};
use crate::rule::RuleId;
use crate::YalrResult;

/// Identifies one kernel item of one state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LrItemRef {
    pub state: usize,
    pub item: usize,
}

impl LrItemRef {
    pub fn new(state: usize, item: usize) -> Self {
        Self { state, item }
    }
}

/// Builds a LALR(1) machine for a grammar.
///
/// The builder constructs the LR(0) kernel skeleton first, then generates
/// spontaneous lookaheads and propagates them to fixpoint, and finally
/// synthesizes per-state action sets, run through the registered action
/// rewriters in order.
pub struct LalrBuilder<'g> {
    grammar: &'g mut Grammar,
    machine: LalrMachine,
    initial_states: Vec<usize>,

    /// Guard rule id → the state its sub-parser starts in. Memoized so every
    /// use of the same guard shares one start state.
    states_for_guard: HashMap<RuleId, usize>,

    /// Kernel items that propagate their lookahead to other kernel items.
    propagate: BTreeMap<LrItemRef, BTreeSet<LrItemRef>>,
    /// Kernel items that spontaneously generated lookahead for others.
    spontaneous: BTreeMap<LrItemRef, BTreeSet<LrItemRef>>,
    /// The lookahead generated spontaneously along an edge.
    spontaneous_lookahead: HashMap<(LrItemRef, LrItemRef), ItemSet>,

    rewriters: Vec<Box<dyn ActionRewriter>>,
    actions: RefCell<HashMap<usize, ActionSet>>,
}

impl<'g> LalrBuilder<'g> {
    pub fn new(grammar: &'g mut Grammar) -> Self {
        Self {
            grammar,
            machine: LalrMachine::new(),
            initial_states: Vec::new(),
            states_for_guard: HashMap::new(),
            propagate: BTreeMap::new(),
            spontaneous: BTreeMap::new(),
            spontaneous_lookahead: HashMap::new(),
            rewriters: Vec::new(),
            actions: RefCell::new(HashMap::new()),
        }
    }

    pub fn grammar(&self) -> &Grammar {
        self.grammar
    }

    pub fn machine(&self) -> &LalrMachine {
        &self.machine
    }

    pub fn count_states(&self) -> usize {
        self.machine.count_states()
    }

    /// The states added by `add_initial_state`, in declaration order.
    pub fn initial_states(&self) -> &[usize] {
        &self.initial_states
    }

    /// The start state of the specified guard rule, once the machine has been
    /// built.
    pub fn state_for_guard(&self, rule: RuleId) -> Option<usize> {
        self.states_for_guard.get(&rule).copied()
    }

    /// Registers an action rewriter. Rewriters are applied in registration
    /// order to every synthesized action set.
    pub fn add_rewriter(&mut self, rewriter: Box<dyn ActionRewriter>) {
        self.rewriters.push(rewriter);
        self.actions.borrow_mut().clear();
    }

    /// Adds an initial state recognising the language produced by the
    /// specified nonterminal.
    ///
    /// Synthesizes the rule `ε → language` (reducing to the empty item is
    /// what later marks the accepting action) and creates a kernel state for
    /// it with lookahead `{$}`.
    pub fn add_initial_state(&mut self, language: ItemId) -> YalrResult<usize> {
        if !self.grammar.item(language).is_nonterminal()
            || self.grammar.rules_for_nonterminal(language).is_empty()
        {
            let name = self.grammar.display_item(language);
            return Err(ErrorKind::UndefinedNonterminal(name).into());
        }

        let empty = self.grammar.empty_id();
        let eoi = self.grammar.eoi_id();
        let rule = self.grammar.add_rule(empty, vec![language]);

        let mut state = LalrState::new();
        let index = state.add(Lr0Item::new(rule, 0));
        state.lookahead_mut(index).insert(eoi);

        let id = self.machine.add_state(state);
        self.initial_states.push(id);
        Ok(id)
    }

    /// Finishes building the machine: LR(0) skeleton, guard start states,
    /// then the lookaheads.
    pub fn complete_parser(&mut self) -> YalrResult<()> {
        if self.machine.count_states() == 0 {
            return Err(ErrorKind::NoStartSymbols.into());
        }

        let eog = self.grammar.eog_id();
        let mut queue: VecDeque<usize> = (0..self.machine.count_states()).collect();

        while let Some(state_id) = queue.pop_front() {
            let closure = {
                let grammar = &*self.grammar;
                state_closure(grammar, self.machine.state(state_id), Some(grammar.empty_id()))
            };

            // Bucket the closure by the item the dot can advance over.
            let mut successors: BTreeMap<ItemId, LalrState> = BTreeMap::new();

            for (core, _) in closure.iter() {
                let dotted = {
                    let grammar = &*self.grammar;
                    match core.dotted(grammar) {
                        Some(dotted) if grammar.item(dotted).generate_transition() => dotted,
                        _ => continue,
                    }
                };

                // A guard with the dot on it also materializes the state its
                // sub-parser starts in.
                if let Some(guard_rule) = self.grammar.guard_rule(dotted) {
                    if !self.states_for_guard.contains_key(&guard_rule) {
                        let mut guard_state = LalrState::new();
                        let index = guard_state.add(Lr0Item::new(guard_rule, 0));
                        guard_state.lookahead_mut(index).insert(eog);

                        let before = self.machine.count_states();
                        let guard_id = self.machine.add_state(guard_state);
                        if guard_id >= before {
                            queue.push_back(guard_id);
                        }
                        self.states_for_guard.insert(guard_rule, guard_id);
                    }
                }

                successors.entry(dotted).or_default().add(core.next());
            }

            for (dotted, kernel) in successors {
                let before = self.machine.count_states();
                let target = self.machine.add_state(kernel);
                self.machine.add_transition(state_id, dotted, target);

                if target >= before {
                    queue.push_back(target);
                }
            }
        }

        self.complete_lookaheads();
        Ok(())
    }

    /// Generates the spontaneous lookaheads and the propagation table, then
    /// propagates to fixpoint.
    ///
    /// Spontaneous phase: each kernel item is closed with the ε placeholder
    /// as lookahead. A closed item whose dot sits on `X` hands its computed
    /// lookahead to the advanced kernel item in the target of the `(state,
    /// X)` transition; if the placeholder survived into that lookahead, the
    /// kernel item also propagates its own lookahead there.
    fn complete_lookaheads(&mut self) {
        self.propagate.clear();
        self.spontaneous.clear();
        self.spontaneous_lookahead.clear();

        let empty = self.grammar.empty_id();
        let placeholder: ItemSet = [empty].into_iter().collect();

        for state_id in 0..self.machine.count_states() {
            for index in 0..self.machine.state(state_id).len() {
                let core = self.machine.state(state_id).item(index);

                let closure = {
                    let grammar = &*self.grammar;
                    let dotted = match core.dotted(grammar) {
                        Some(dotted) => dotted,
                        None => continue,
                    };

                    let source = Lr1Item::new(core, placeholder.clone());
                    let mut closure = Lr1ItemSet::new();
                    closure.insert(source.clone());
                    grammar.cache_closure(dotted, &source, &mut closure);
                    closure
                };

                let source_ref = LrItemRef::new(state_id, index);

                for (closed, lookahead) in closure.iter() {
                    let target = {
                        let grammar = &*self.grammar;
                        let symbol = match closed.dotted(grammar) {
                            Some(symbol) => symbol,
                            None => continue,
                        };

                        let Some(&target) = self.machine.transitions(state_id).get(&symbol)
                        else {
                            continue;
                        };

                        let advanced = closed.next();
                        match self.machine.state(target).find(&advanced) {
                            Some(index) => LrItemRef::new(target, index),
                            None => continue,
                        }
                    };

                    self.machine
                        .add_lookahead(target.state, target.item, lookahead, empty);

                    let spontaneous = lookahead.len() > 1
                        || (lookahead.len() == 1 && !lookahead.contains(empty));
                    if spontaneous {
                        self.spontaneous
                            .entry(source_ref)
                            .or_default()
                            .insert(target);

                        let mut generated = lookahead.clone();
                        generated.erase(empty);
                        self.spontaneous_lookahead
                            .entry((source_ref, target))
                            .or_default()
                            .merge(&generated);
                    }

                    // The placeholder marks lookahead that flows through from
                    // the kernel item itself.
                    if lookahead.contains(empty) {
                        self.propagate.entry(source_ref).or_default().insert(target);
                    }
                }
            }
        }

        // Propagation phase: iterate to fixpoint over the edges whose source
        // may have changed. Lookaheads only ever grow, and the lattice is
        // finite.
        let mut pending: BTreeSet<LrItemRef> = self.propagate.keys().copied().collect();

        while let Some(&source) = pending.iter().next() {
            pending.remove(&source);

            let targets = match self.propagate.get(&source) {
                Some(targets) => targets.clone(),
                None => continue,
            };
            let lookahead = self
                .machine
                .state(source.state)
                .lookahead(source.item)
                .clone();

            for target in targets {
                if self
                    .machine
                    .add_lookahead(target.state, target.item, &lookahead, empty)
                    && self.propagate.contains_key(&target)
                {
                    pending.insert(target);
                }
            }
        }
    }

    /// The action set for a state, after rewriting. Cached per state.
    pub fn actions_for_state(&self, state_id: usize) -> ActionSet {
        if let Some(cached) = self.actions.borrow().get(&state_id) {
            return cached.clone();
        }

        let grammar = &*self.grammar;
        let closure = state_closure(grammar, self.machine.state(state_id), None);
        let mut actions = ActionSet::new();

        // Guard transitions are checked with guard actions on the terminals
        // that can begin them.
        for (&item, _) in self.machine.transitions(state_id).iter() {
            if grammar.item(item).is_guard() {
                self.add_guard(item, &mut actions);
            }
        }

        for (&item, &target) in self.machine.transitions(state_id).iter() {
            let entry = grammar.item(item);
            if entry.is_terminal() || entry.is_guard() {
                actions.insert(Action::shift(item, target));
            } else {
                actions.insert(Action::goto(item, target));
            }
        }

        for (core, lookahead) in closure.iter() {
            if !core.at_end(grammar) {
                continue;
            }

            let rule = grammar.rule(core.rule);
            // Reducing to the empty item marks a start rule, reducing to a
            // guard marks guard acceptance; both finish their parse.
            let accepting = matches!(grammar.item(rule.lhs), Item::Empty | Item::Guard(_));

            for la in lookahead.iter() {
                let la_item = grammar.item(la);
                if !la_item.is_lookahead() {
                    continue;
                }

                if la_item.is_guard() {
                    self.add_guard(la, &mut actions);
                }

                let action = if accepting {
                    Action::accept(la, core.rule)
                } else {
                    Action::reduce(la, core.rule)
                };
                actions.insert(action);
            }
        }

        for rewriter in &self.rewriters {
            rewriter.rewrite_actions(state_id, &mut actions, self);
        }

        self.actions.borrow_mut().insert(state_id, actions.clone());
        actions
    }

    /// Adds guard actions for every terminal that can begin the guard.
    fn add_guard(&self, guard: ItemId, actions: &mut ActionSet) {
        let Some(rule) = self.grammar.guard_rule(guard) else {
            return;
        };
        let Some(&start) = self.states_for_guard.get(&rule) else {
            return;
        };

        for terminal in self.guard_initial(guard).iter() {
            if self.grammar.item(terminal).is_terminal() {
                actions.insert(Action::guard(terminal, start, rule));
            }
        }
    }

    /// The terminals that can begin the guard's body, with nested guards
    /// expanded to their own initial terminals.
    pub fn guard_initial(&self, guard: ItemId) -> ItemSet {
        let mut initial = ItemSet::new();
        let mut visited: HashSet<ItemId> = HashSet::new();
        let mut pending = vec![guard];

        while let Some(id) = pending.pop() {
            if !visited.insert(id) {
                continue;
            }

            let Item::Guard(body) = self.grammar.item(id) else {
                continue;
            };

            for first in self.grammar.first_for_sequence(body).iter() {
                if self.grammar.item(first).is_guard() {
                    pending.push(first);
                } else {
                    initial.insert(first);
                }
            }
        }

        initial
    }

    /// The kernel items the specified item's lookahead propagates to.
    pub fn propagations_for_item(&self, state: usize, item: usize) -> BTreeSet<LrItemRef> {
        self.propagate
            .get(&LrItemRef::new(state, item))
            .cloned()
            .unwrap_or_default()
    }

    /// The kernel items the specified item generated spontaneous lookahead
    /// for.
    pub fn spontaneous_for_item(&self, state: usize, item: usize) -> BTreeSet<LrItemRef> {
        self.spontaneous
            .get(&LrItemRef::new(state, item))
            .cloned()
            .unwrap_or_default()
    }

    /// The lookahead generated spontaneously along one edge.
    pub fn lookahead_for_spontaneous(
        &self,
        source: LrItemRef,
        target: LrItemRef,
    ) -> Option<&ItemSet> {
        self.spontaneous_lookahead.get(&(source, target))
    }

    /// The kernel items that can put `lookahead` into the lookahead set of
    /// the specified item, found by walking the spontaneous and propagation
    /// edges backwards.
    ///
    /// This is the set of states a reduction on `lookahead` can return to,
    /// which is what conflict reporting and LR(1) disambiguation need.
    pub fn find_lookahead_source(
        &self,
        state: usize,
        item: usize,
        lookahead: ItemId,
    ) -> BTreeSet<LrItemRef> {
        let mut sources = BTreeSet::new();
        let mut visited: BTreeSet<LrItemRef> = BTreeSet::new();
        let mut queue = VecDeque::from([LrItemRef::new(state, item)]);

        while let Some(next) = queue.pop_front() {
            if !visited.insert(next) {
                continue;
            }

            for (source, targets) in self.spontaneous.iter() {
                if !targets.contains(&next) {
                    continue;
                }

                let generated = self.spontaneous_lookahead.get(&(*source, next));
                if generated.is_some_and(|set| set.contains(lookahead)) {
                    sources.insert(*source);
                }
            }

            for (source, targets) in self.propagate.iter() {
                let carried = self.machine.state(source.state).lookahead(source.item);
                if !carried.contains(lookahead) {
                    continue;
                }

                if targets.contains(&next) {
                    sources.insert(*source);
                    queue.push_back(*source);
                }
            }
        }

        sources
    }
}

/// The LR(1) closure of a state's kernel.
///
/// With `placeholder` set, every kernel item is seeded with that single item
/// as lookahead instead of its stored set; the builder uses this to compute
/// the LR(0) structure without caring about real lookaheads.
pub(crate) fn state_closure(
    grammar: &Grammar,
    state: &LalrState,
    placeholder: Option<ItemId>,
) -> Lr1ItemSet {
    let mut closure = Lr1ItemSet::new();
    let mut queue: VecDeque<Lr1Item> = VecDeque::new();

    for index in 0..state.len() {
        let lookahead = match placeholder {
            Some(id) => [id].into_iter().collect(),
            None => state.lookahead(index).clone(),
        };

        let item = Lr1Item::new(state.item(index), lookahead);
        closure.insert(item.clone());
        queue.push_back(item);
    }

    while let Some(next) = queue.pop_front() {
        let dotted = match next.core.dotted(grammar) {
            Some(dotted) => dotted,
            None => continue,
        };

        let mut added = Lr1ItemSet::new();
        grammar.cache_closure(dotted, &next, &mut added);

        for item in added.iter_cloned() {
            let core = item.core;
            if closure.insert(item) {
                // Requeue with the merged lookahead so enlargements flow on.
                let merged = closure.get(&core).unwrap().clone();
                queue.push_back(Lr1Item::new(core, merged));
            }
        }
    }

    closure
}
