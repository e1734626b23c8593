use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use crate::lr::rewrite::WeakSymbols;
use crate::lr::table::{ParserTables, TableAction};
use crate::lr::{ActionKind, LalrBuilder};
use crate::token::traits::ParseActions;
use crate::token::Lexeme;
use crate::ItemId;

/// The outcome of one parsing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseResult {
    /// There is more parsing to do.
    More,
    /// The next symbol could not be recognised.
    Reject,
    /// The input was reduced to a start symbol.
    Accept,
}

/// A parser: the tables, from which any number of sessions can be created.
#[derive(Debug, Clone)]
pub struct Parser {
    tables: ParserTables,
}

impl Parser {
    pub fn new(tables: ParserTables) -> Self {
        Self { tables }
    }

    /// Builds the tables from a completed builder and wraps them.
    pub fn from_builder(builder: &LalrBuilder, weak_symbols: Option<&WeakSymbols>) -> Self {
        Self::new(ParserTables::from_builder(builder, weak_symbols))
    }

    pub fn tables(&self) -> &ParserTables {
        &self.tables
    }

    /// Creates a state, with its own session, that parses from state 0.
    pub fn create_parser<A: ParseActions>(&self, actions: A) -> ParserState<'_, A> {
        self.create_parser_at(actions, 0)
    }

    /// Creates a state starting from an arbitrary machine state.
    pub fn create_parser_at<A: ParseActions>(
        &self,
        actions: A,
        initial_state: usize,
    ) -> ParserState<'_, A> {
        let position = Rc::new(Cell::new(0));
        let session = Session {
            actions,
            lookahead: VecDeque::new(),
            base: 0,
            eof: false,
            cursors: vec![Rc::downgrade(&position)],
        };

        ParserState {
            tables: &self.tables,
            session: Rc::new(RefCell::new(session)),
            position,
            stack: vec![initial_state],
            nodes: Vec::new(),
        }
    }
}

/// A session: one stream of lexemes shared between every state forked from
/// it.
///
/// The lookahead ring keeps symbols alive while any state may still visit
/// them, and drops the prefix every live state has consumed.
struct Session<A: ParseActions> {
    actions: A,
    lookahead: VecDeque<Lexeme>,
    /// Absolute position of `lookahead[0]`.
    base: usize,
    eof: bool,
    /// The absolute positions of the states sharing this session.
    cursors: Vec<Weak<Cell<usize>>>,
}

impl<A: ParseActions> Session<A> {
    /// The lexeme at an absolute position, reading from the client as
    /// needed. The end of the input reads as `None`.
    fn look(&mut self, position: usize) -> Option<Lexeme> {
        while position >= self.base + self.lookahead.len() {
            if self.eof {
                return None;
            }
            match self.actions.read() {
                Some(lexeme) => self.lookahead.push_back(lexeme),
                None => {
                    self.eof = true;
                    return None;
                }
            }
        }

        self.lookahead.get(position - self.base).cloned()
    }

    /// Drops the symbols every live state has moved past.
    fn trim(&mut self) {
        self.cursors.retain(|cursor| cursor.upgrade().is_some());

        let min = self
            .cursors
            .iter()
            .filter_map(Weak::upgrade)
            .map(|cursor| cursor.get())
            .min();
        let Some(min) = min else {
            return;
        };

        while self.base < min {
            if self.lookahead.pop_front().is_none() {
                self.base = min;
                break;
            }
            self.base += 1;
        }
    }
}

/// One parser state: a stack plus a cursor into the session's lookahead.
///
/// States forked from one another share the session (and therefore the
/// lexeme stream); each advances independently. Dropping a state releases
/// its share of the lookahead ring.
pub struct ParserState<'t, A: ParseActions> {
    tables: &'t ParserTables,
    session: Rc<RefCell<Session<A>>>,
    position: Rc<Cell<usize>>,
    stack: Vec<usize>,
    nodes: Vec<A::Node>,
}

impl<'t, A: ParseActions> ParserState<'t, A> {
    /// The lookahead at the given offset, `None` at the end of the input.
    pub fn look(&self, offset: usize) -> Option<Lexeme> {
        self.session
            .borrow_mut()
            .look(self.position.get() + offset)
    }

    /// Throws away the current lookahead symbol.
    pub fn next(&mut self) {
        self.position.set(self.position.get() + 1);
        self.session.borrow_mut().trim();
    }

    /// A copy of this state that can be run independently against the same
    /// session.
    pub fn fork(&self) -> Self
    where
        A::Node: Clone,
    {
        let position = Rc::new(Cell::new(self.position.get()));
        self.session
            .borrow_mut()
            .cursors
            .push(Rc::downgrade(&position));

        Self {
            tables: self.tables,
            session: Rc::clone(&self.session),
            position,
            stack: self.stack.clone(),
            nodes: self.nodes.clone(),
        }
    }

    /// The machine states on the stack, bottom first.
    pub fn stack(&self) -> &[usize] {
        &self.stack
    }

    /// The client node on top of the stack.
    pub fn node(&self) -> Option<&A::Node> {
        self.nodes.last()
    }

    /// Consumes the state, returning the root node after an accept.
    pub fn into_node(mut self) -> Option<A::Node> {
        self.nodes.pop()
    }

    fn current_state(&self) -> usize {
        *self.stack.last().expect("the stack is never empty")
    }

    fn run(&self, state: usize, symbol: usize, terminal: bool) -> &'t [TableAction] {
        if terminal {
            self.tables.terminal_actions(state, symbol)
        } else {
            self.tables.nonterminal_actions(state, symbol)
        }
    }

    /// Performs a single parsing step.
    pub fn process(&mut self) -> ParseResult {
        let la = self.look(0);
        let (symbol, terminal) = match &la {
            Some(lexeme) => (lexeme.matched, true),
            // The end of the input counts as a nonterminal.
            None => (self.tables.end_of_input(), false),
        };

        let run: Vec<TableAction> = self.run(self.current_state(), symbol, terminal).to_vec();

        for action in run {
            match action.kind {
                ActionKind::WeakReduce => {
                    // Only reduce when the symbol survives the reduction.
                    if !self.can_reduce_symbol(symbol, terminal) {
                        continue;
                    }
                    self.perform(&la, action);
                    return ParseResult::More;
                }
                ActionKind::Guard => {
                    if let Some(guard_symbol) = self.check_guard(action.next, 0) {
                        if self.process_guard(&la, guard_symbol) {
                            return ParseResult::More;
                        }
                    }
                    continue;
                }
                ActionKind::Accept => return ParseResult::Accept,
                _ => {
                    if self.perform(&la, action) {
                        self.next();
                    }
                    return ParseResult::More;
                }
            }
        }

        ParseResult::Reject
    }

    /// Runs the parser until the input is accepted or rejected.
    pub fn parse(&mut self) -> ParseResult {
        loop {
            match self.process() {
                ParseResult::More => continue,
                result => return result,
            }
        }
    }

    /// Performs an action without validity checks. Returns true if the
    /// lookahead should advance.
    fn perform(&mut self, la: &Option<Lexeme>, action: TableAction) -> bool {
        match action.kind {
            ActionKind::Ignore => true,
            ActionKind::Shift => {
                self.push(action.next, la.as_ref());
                true
            }
            ActionKind::Divert => {
                self.push(action.next, la.as_ref());
                false
            }
            ActionKind::Reduce | ActionKind::WeakReduce | ActionKind::Accept => {
                self.reduce(action.next);
                false
            }
            ActionKind::Goto => {
                *self.stack.last_mut().expect("the stack is never empty") = action.next;
                false
            }
            // Guards carry no effect of their own; they only pick between
            // the other actions. See `process`.
            ActionKind::Guard => true,
        }
    }

    fn push(&mut self, state: usize, lexeme: Option<&Lexeme>) {
        let node = self.session.borrow_mut().actions.shift(lexeme);
        self.stack.push(state);
        self.nodes.push(node);
    }

    fn reduce(&mut self, dense_rule: usize) {
        let rule = *self.tables.rule(dense_rule);

        let keep = self.stack.len().saturating_sub(rule.len).max(1);
        self.stack.truncate(keep);

        let split = self.nodes.len().saturating_sub(rule.len);
        let children: Vec<A::Node> = self.nodes.drain(split..).collect();

        let state = self.current_state();
        let target = self
            .tables
            .nonterminal_actions(state, rule.item)
            .iter()
            .find(|action| action.kind == ActionKind::Goto)
            .map(|action| action.next)
            // Tables without the goto are malformed; stay put rather than
            // desync the stacks.
            .unwrap_or(state);

        let node = self
            .session
            .borrow_mut()
            .actions
            .reduce(rule.item, rule.rule, children);
        self.stack.push(target);
        self.nodes.push(node);
    }

    /// True if reducing on the lexeme leads to it being shifted.
    pub fn can_reduce_lexeme(&self, lexeme: &Lexeme) -> bool {
        self.can_reduce_symbol(lexeme.matched, true)
    }

    /// True if reducing on the nonterminal-class item leads to it being
    /// shifted.
    pub fn can_reduce_nonterminal(&self, item: ItemId) -> bool {
        self.can_reduce_symbol(item, false)
    }

    fn can_reduce_symbol(&self, symbol: usize, terminal: bool) -> bool {
        self.can_reduce_from(symbol, terminal, self.stack.clone())
    }

    /// Simulates the reduction chain for `symbol` on a shadow stack of state
    /// ids; true when the chain ends in a shift or accept of the symbol, all
    /// without consulting input beyond it.
    fn can_reduce_from(&self, symbol: usize, terminal: bool, mut stack: Vec<usize>) -> bool {
        loop {
            let state = *stack.last().expect("shadow stack is never empty");
            let run: Vec<TableAction> = self.run(state, symbol, terminal).to_vec();
            let mut advanced = false;

            for action in run {
                match action.kind {
                    ActionKind::Shift | ActionKind::Accept => return true,
                    ActionKind::Divert => {
                        stack.push(action.next);
                        advanced = true;
                        break;
                    }
                    ActionKind::WeakReduce => {
                        // Try the weak reduction on a copy; on failure, keep
                        // looking for a stronger action.
                        let mut copy = stack.clone();
                        self.fake_reduce(action.next, &mut copy);
                        if self.can_reduce_from(symbol, terminal, copy) {
                            return true;
                        }
                    }
                    ActionKind::Reduce => {
                        self.fake_reduce(action.next, &mut stack);
                        advanced = true;
                        break;
                    }
                    _ => return false,
                }
            }

            if !advanced {
                return false;
            }
        }
    }

    /// Applies a reduction to a shadow stack: pop, then follow the goto.
    fn fake_reduce(&self, dense_rule: usize, stack: &mut Vec<usize>) {
        let rule = self.tables.rule(dense_rule);

        let keep = stack.len().saturating_sub(rule.len).max(1);
        stack.truncate(keep);

        let state = *stack.last().expect("shadow stack is never empty");
        if let Some(goto) = self
            .tables
            .nonterminal_actions(state, rule.item)
            .iter()
            .find(|action| action.kind == ActionKind::Goto)
        {
            stack.push(goto.next);
        }
    }

    /// Evaluates a guard from its start state against the lookahead.
    ///
    /// Drives a minimal parser (an explicit stack of state ids, no client
    /// actions) forward from `initial_state`. Whenever a state can act on
    /// the end-of-guard symbol and the guard stack can reduce it, the
    /// effective input switches to end-of-guard; reaching an accept returns
    /// the guard symbol the accepting rule reduces to. A reject returns
    /// `None` and the caller falls through to the next action.
    fn check_guard(&self, initial_state: usize, initial_offset: usize) -> Option<ItemId> {
        let mut stack = vec![initial_state];
        let mut offset = initial_offset;

        loop {
            let la = self.look(offset);
            let state = *stack.last().expect("guard stack is never empty");

            let (mut symbol, mut terminal) = match &la {
                Some(lexeme) => (lexeme.matched, true),
                None => (self.tables.end_of_input(), false),
            };

            if self.tables.has_end_of_guard(state)
                && self.can_reduce_from(self.tables.end_of_guard(), false, stack.clone())
            {
                symbol = self.tables.end_of_guard();
                terminal = false;
            }

            let run: Vec<TableAction> = self.run(state, symbol, terminal).to_vec();
            let mut performed = false;

            for action in run {
                match action.kind {
                    ActionKind::WeakReduce => {
                        if !self.can_reduce_from(symbol, terminal, stack.clone()) {
                            continue;
                        }
                        self.fake_reduce(action.next, &mut stack);
                        performed = true;
                        break;
                    }
                    ActionKind::Reduce => {
                        self.fake_reduce(action.next, &mut stack);
                        performed = true;
                        break;
                    }
                    ActionKind::Accept => {
                        // The accepting rule reduces to the guard item.
                        return Some(self.tables.rule(action.next).item);
                    }
                    ActionKind::Guard => {
                        // Guards may invoke guards: evaluate the inner guard
                        // at the current offset, then process its symbol
                        // against the guard stack.
                        if let Some(inner) = self.check_guard(action.next, offset) {
                            if self.guard_symbol(&mut stack, inner) {
                                performed = true;
                                break;
                            }
                        }
                        continue;
                    }
                    ActionKind::Shift => {
                        stack.push(action.next);
                        offset += 1;
                        performed = true;
                        break;
                    }
                    ActionKind::Divert => {
                        stack.push(action.next);
                        performed = true;
                        break;
                    }
                    ActionKind::Ignore => {
                        offset += 1;
                        performed = true;
                        break;
                    }
                    ActionKind::Goto => {
                        *stack.last_mut().expect("guard stack is never empty") = action.next;
                        performed = true;
                        break;
                    }
                }
            }

            if !performed {
                return None;
            }
        }
    }

    /// Advances a guard stack over a matched guard symbol: reductions first,
    /// until the symbol is shifted. The input is not consumed.
    fn guard_symbol(&self, stack: &mut Vec<usize>, symbol: ItemId) -> bool {
        let state = *stack.last().expect("guard stack is never empty");
        if !self.symbol_is_viable(symbol, self.tables.nonterminal_actions(state, symbol), stack) {
            return false;
        }

        loop {
            let state = *stack.last().expect("guard stack is never empty");
            let run: Vec<TableAction> = self.tables.nonterminal_actions(state, symbol).to_vec();
            let mut acted = false;

            for action in run {
                match action.kind {
                    ActionKind::WeakReduce => {
                        if !self.can_reduce_from(symbol, false, stack.clone()) {
                            continue;
                        }
                        self.fake_reduce(action.next, stack);
                        acted = true;
                        break;
                    }
                    ActionKind::Reduce => {
                        self.fake_reduce(action.next, stack);
                        acted = true;
                        break;
                    }
                    ActionKind::Shift | ActionKind::Divert => {
                        stack.push(action.next);
                        return true;
                    }
                    ActionKind::Goto => {
                        *stack.last_mut().expect("guard stack is never empty") = action.next;
                        acted = true;
                        break;
                    }
                    ActionKind::Accept => return true,
                    _ => continue,
                }
            }

            if !acted {
                return true;
            }
        }
    }

    /// Checks that acting on the guard symbol can end in a shift before any
    /// reductions are committed.
    fn symbol_is_viable(&self, symbol: ItemId, run: &[TableAction], stack: &[usize]) -> bool {
        if run.is_empty() {
            return false;
        }

        for action in run {
            match action.kind {
                ActionKind::Shift | ActionKind::Divert => return true,
                ActionKind::Reduce | ActionKind::WeakReduce => {
                    if self.can_reduce_from(symbol, false, stack.to_vec()) {
                        return true;
                    }
                }
                _ => {}
            }
        }

        false
    }

    /// Updates the real state over a matched guard symbol.
    ///
    /// Guards are often used where the grammar is not quite LALR(1); the
    /// reductions are only committed when the guard symbol will eventually
    /// be shifted, so a failed guard path can fall through to the next
    /// action instead of corrupting the stack.
    fn process_guard(&mut self, la: &Option<Lexeme>, symbol: ItemId) -> bool {
        let state = self.current_state();
        let run = self.tables.nonterminal_actions(state, symbol);
        if !self.symbol_is_viable(symbol, run, &self.stack) {
            return false;
        }

        loop {
            let state = self.current_state();
            let run: Vec<TableAction> = self.tables.nonterminal_actions(state, symbol).to_vec();
            let mut acted = false;

            for action in run {
                match action.kind {
                    ActionKind::WeakReduce => {
                        if !self.can_reduce_symbol(symbol, false) {
                            continue;
                        }
                        if self.perform(la, action) {
                            return true;
                        }
                        acted = true;
                        break;
                    }
                    ActionKind::Guard => continue,
                    _ => {
                        // Shifting the guard symbol pushes without consuming
                        // the lookahead; `perform` reports the shift.
                        if self.perform(la, action) {
                            return true;
                        }
                        acted = true;
                        break;
                    }
                }
            }

            if !acted {
                return true;
            }
        }
    }
}
