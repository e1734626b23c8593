use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use itertools::Itertools;

use crate::item::{Item, ItemId};
use crate::item_set::ItemSet;
use crate::lr::{Lr1Item, Lr1ItemSet};
use crate::rule::{Rule, RuleBuilder, RuleId};

const NO_RULES: &[RuleId] = &[];

/// The interning arena for a context-free grammar.
///
/// Items and rules are content-addressed: interning the same structure twice
/// yields the same identifier, and `id ↔ entity` is bijective for the lifetime
/// of the grammar. Everything else in the crate refers to grammar entities by
/// identifier.
///
/// FIRST, FOLLOW and the per-item closure templates are cached lazily; the
/// caches are dropped whenever the grammar gains a new item or rule.
pub struct Grammar {
    items: Vec<Item>,
    item_ids: HashMap<Item, ItemId>,
    rules: Vec<Rule>,
    rule_ids: HashMap<Rule, RuleId>,

    /// Nonterminal item id → defining rules.
    nonterminal_rules: HashMap<ItemId, Vec<RuleId>>,
    /// EBNF / guard item id → the synthetic rules its closure expands to.
    ebnf_rules: HashMap<ItemId, Vec<RuleId>>,

    name_to_nonterminal: HashMap<String, ItemId>,
    nonterminal_to_name: HashMap<ItemId, String>,

    first_sets: RefCell<HashMap<ItemId, ItemSet>>,
    follow_sets: RefCell<HashMap<ItemId, ItemSet>>,
    closure_templates: RefCell<HashMap<ItemId, Vec<Lr1Item>>>,
    /// Items whose closure template is being built right now; re-entry falls
    /// back to the direct computation.
    closing: RefCell<HashSet<ItemId>>,
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new()
    }
}

impl Grammar {
    pub fn new() -> Self {
        let mut grammar = Self {
            items: Vec::new(),
            item_ids: HashMap::new(),
            rules: Vec::new(),
            rule_ids: HashMap::new(),
            nonterminal_rules: HashMap::new(),
            ebnf_rules: HashMap::new(),
            name_to_nonterminal: HashMap::new(),
            nonterminal_to_name: HashMap::new(),
            first_sets: RefCell::new(HashMap::new()),
            follow_sets: RefCell::new(HashMap::new()),
            closure_templates: RefCell::new(HashMap::new()),
            closing: RefCell::new(HashSet::new()),
        };

        // The sentinels are always present, in a fixed order.
        grammar.intern(Item::Empty);
        grammar.intern(Item::Eoi);
        grammar.intern(Item::Eog);
        grammar
    }

    pub fn empty_id(&self) -> ItemId {
        0
    }

    pub fn eoi_id(&self) -> ItemId {
        1
    }

    pub fn eog_id(&self) -> ItemId {
        2
    }

    /// Interns an item, returning its stable identifier.
    pub fn identifier_for_item(&mut self, item: Item) -> ItemId {
        self.intern(item)
    }

    /// The identifier of an already-interned item.
    pub fn id_of(&self, item: &Item) -> Option<ItemId> {
        self.item_ids.get(item).copied()
    }

    /// The item with the specified identifier.
    ///
    /// # Panics
    /// Panics if no item carries the identifier.
    pub fn item(&self, id: ItemId) -> &Item {
        &self.items[id]
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Interns a rule, returning its stable identifier.
    ///
    /// Identical rules (same reducing item, same item sequence) share one
    /// identifier; the position keys of the first interning win.
    pub fn identifier_for_rule(&mut self, rule: Rule) -> RuleId {
        if let Some(&id) = self.rule_ids.get(&rule) {
            return id;
        }

        let id = self.rules.len();
        self.rule_ids.insert(rule.clone(), id);
        self.rules.push(rule);
        self.clear_caches();
        id
    }

    /// The rule with the specified identifier.
    ///
    /// # Panics
    /// Panics if no rule carries the identifier.
    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id]
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Returns the nonterminal id for the specified name, declaring a fresh
    /// nonterminal if the name is new.
    ///
    /// Nonterminal ids are drawn from the same pool as item ids, so the
    /// nonterminal's symbol and its item identifier coincide.
    pub fn id_for_nonterminal(&mut self, name: &str) -> ItemId {
        if let Some(&id) = self.name_to_nonterminal.get(name) {
            return id;
        }

        let id = self.intern(Item::Nonterminal(self.items.len()));
        self.name_to_nonterminal.insert(name.to_string(), id);
        self.nonterminal_to_name.insert(id, name.to_string());
        id
    }

    pub fn nonterminal_is_defined(&self, name: &str) -> bool {
        self.name_to_nonterminal.contains_key(name)
    }

    pub fn name_for_nonterminal(&self, id: ItemId) -> Option<&str> {
        self.nonterminal_to_name.get(&id).map(String::as_str)
    }

    /// Interns the terminal matching the specified lexer symbol.
    pub fn terminal(&mut self, sym: usize) -> ItemId {
        self.intern(Item::Terminal(sym))
    }

    /// Interns a guard whose body must accept a prefix of the lookahead.
    pub fn guard(&mut self, body: Vec<ItemId>) -> ItemId {
        let id = self.intern(Item::Guard(body.clone()));
        self.register_ebnf_rules(id, vec![body]);
        id
    }

    /// Interns an EBNF `?` item.
    pub fn optional(&mut self, body: Vec<ItemId>) -> ItemId {
        let id = self.intern(Item::Optional(body.clone()));
        self.register_ebnf_rules(id, vec![vec![], body]);
        id
    }

    /// Interns an EBNF `+` item.
    pub fn repeat_one_or_more(&mut self, body: Vec<ItemId>) -> ItemId {
        let id = self.intern(Item::RepeatOneOrMore(body.clone()));
        let mut repeated = vec![id];
        repeated.extend_from_slice(&body);
        self.register_ebnf_rules(id, vec![body, repeated]);
        id
    }

    /// Interns an EBNF `*` item.
    pub fn repeat_zero_or_more(&mut self, body: Vec<ItemId>) -> ItemId {
        let id = self.intern(Item::RepeatZeroOrMore(body.clone()));
        let mut repeated = vec![id];
        repeated.extend_from_slice(&body);
        self.register_ebnf_rules(id, vec![vec![], repeated]);
        id
    }

    /// Interns an EBNF alternative.
    ///
    /// A branch that consists of a single nested alternative is inlined, so
    /// chains of alternatives collapse into one item. The worklist carries a
    /// visited set, which guarantees termination on cyclic references.
    pub fn alternative(&mut self, branches: Vec<Vec<ItemId>>) -> ItemId {
        let mut flattened: Vec<Vec<ItemId>> = Vec::new();
        let mut visited: HashSet<ItemId> = HashSet::new();
        let mut pending = branches;

        while let Some(branch) = pending.pop() {
            let inner = match branch.as_slice() {
                &[single] => match self.item(single) {
                    Item::Alternative(inner) => Some((single, inner.clone())),
                    _ => None,
                },
                _ => None,
            };

            match inner {
                Some((id, inner)) => {
                    if visited.insert(id) {
                        pending.extend(inner);
                    }
                }
                None => {
                    if !flattened.contains(&branch) {
                        flattened.push(branch);
                    }
                }
            }
        }

        flattened.sort();
        let id = self.intern(Item::Alternative(flattened.clone()));
        self.register_ebnf_rules(id, flattened);
        id
    }

    fn register_ebnf_rules(&mut self, id: ItemId, bodies: Vec<Vec<ItemId>>) {
        if self.ebnf_rules.contains_key(&id) {
            return;
        }

        let rules = bodies
            .into_iter()
            .map(|body| self.identifier_for_rule(Rule::new(id, body)))
            .collect();
        self.ebnf_rules.insert(id, rules);
    }

    /// The synthetic rules an EBNF or guard item expands to during closure.
    pub fn closure_rules(&self, id: ItemId) -> &[RuleId] {
        self.ebnf_rules
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or(NO_RULES)
    }

    /// The rule a guard item parses, when the item is a guard.
    pub fn guard_rule(&self, id: ItemId) -> Option<RuleId> {
        match self.item(id) {
            Item::Guard(_) => self.closure_rules(id).first().copied(),
            _ => None,
        }
    }

    /// Starts defining a production for the named nonterminal.
    pub fn define(&mut self, name: &str) -> RuleBuilder<'_> {
        let lhs = self.id_for_nonterminal(name);
        RuleBuilder::new(self, lhs)
    }

    /// Adds a production reducing to `lhs`.
    pub fn add_rule(&mut self, lhs: ItemId, items: Vec<ItemId>) -> RuleId {
        let keys = vec![0; items.len()];
        self.add_rule_with_keys(lhs, items, keys)
    }

    pub(crate) fn add_rule_with_keys(
        &mut self,
        lhs: ItemId,
        items: Vec<ItemId>,
        keys: Vec<usize>,
    ) -> RuleId {
        let id = self.identifier_for_rule(Rule::with_keys(lhs, items, keys));
        if self.item(lhs).is_nonterminal() {
            let defined = self.nonterminal_rules.entry(lhs).or_default();
            if !defined.contains(&id) {
                defined.push(id);
            }
        }
        id
    }

    /// The productions defining the nonterminal with the specified id.
    pub fn rules_for_nonterminal(&self, id: ItemId) -> &[RuleId] {
        self.nonterminal_rules
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or(NO_RULES)
    }

    /// Drops the FIRST/FOLLOW caches and the closure templates.
    ///
    /// Called whenever the grammar gains an item or a rule; also available to
    /// callers that mutate rules through other means.
    pub fn clear_caches(&self) {
        self.first_sets.borrow_mut().clear();
        self.follow_sets.borrow_mut().clear();
        self.closure_templates.borrow_mut().clear();
    }

    fn intern(&mut self, item: Item) -> ItemId {
        if let Some(&id) = self.item_ids.get(&item) {
            return id;
        }

        let id = self.items.len();
        self.item_ids.insert(item.clone(), id);
        self.items.push(item);
        self.clear_caches();
        id
    }

    /// The set FIRST(item): every terminal (or sentinel, or guard) that can
    /// begin a derivation of the item, plus ε when the item can derive the
    /// empty string.
    pub fn first(&self, id: ItemId) -> ItemSet {
        self.ensure_first();
        self.first_sets
            .borrow()
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    /// FIRST of a sequence of items, chaining through nullable prefixes.
    pub fn first_for_sequence(&self, items: &[ItemId]) -> ItemSet {
        self.ensure_first();
        let sets = self.first_sets.borrow();
        sequence_first(&sets, items, self.empty_id())
    }

    /// The set FOLLOW(item): every terminal that may appear immediately after
    /// the item in some sentential form. Terminals are not tracked.
    pub fn follow(&self, id: ItemId) -> ItemSet {
        self.ensure_follow();
        self.follow_sets
            .borrow()
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    /// Computes all FIRST sets to fixpoint over the rules of the grammar and
    /// the composite semantics of the EBNF items.
    fn ensure_first(&self) {
        if !self.first_sets.borrow().is_empty() {
            return;
        }

        let empty = self.empty_id();
        let mut sets: HashMap<ItemId, ItemSet> = HashMap::new();

        for (id, item) in self.items.iter().enumerate() {
            let base: ItemSet = match item {
                Item::Empty => [empty].into_iter().collect(),
                Item::Eoi | Item::Eog | Item::Terminal(_) | Item::Guard(_) => {
                    [id].into_iter().collect()
                }
                _ => ItemSet::new(),
            };
            sets.insert(id, base);
        }

        loop {
            let mut changed = false;

            for (id, item) in self.items.iter().enumerate() {
                let bodies: Vec<&[ItemId]> = match item {
                    Item::Nonterminal(_) => self
                        .rules_for_nonterminal(id)
                        .iter()
                        .map(|&rule| self.rule(rule).items.as_slice())
                        .collect(),
                    // A guard stands for itself in lookahead position; its
                    // body only matters for the guard's initial set.
                    Item::Optional(_)
                    | Item::RepeatOneOrMore(_)
                    | Item::RepeatZeroOrMore(_)
                    | Item::Alternative(_) => self
                        .closure_rules(id)
                        .iter()
                        .map(|&rule| self.rule(rule).items.as_slice())
                        .collect(),
                    _ => continue,
                };

                let mut merged = ItemSet::new();
                for body in bodies {
                    merged.merge(&sequence_first(&sets, body, empty));
                }

                if sets.get_mut(&id).unwrap().merge(&merged) {
                    changed = true;
                }
            }

            if !changed {
                break;
            }
        }

        *self.first_sets.borrow_mut() = sets;
    }

    /// Computes all FOLLOW sets in one dataflow pass over the rules: each rule
    /// contributes local FIRST relationships, and rules ending in an item
    /// propagate FOLLOW(lhs) into FOLLOW(item).
    fn ensure_follow(&self) {
        if !self.follow_sets.borrow().is_empty() {
            return;
        }

        self.ensure_first();
        let empty = self.empty_id();
        let firsts = self.first_sets.borrow();

        let mut follow: HashMap<ItemId, ItemSet> = HashMap::new();
        let mut depends: HashMap<ItemId, HashSet<ItemId>> = HashMap::new();

        for rule in self.rules.iter() {
            for (pos, &item) in rule.items.iter().enumerate() {
                if self.item(item).is_terminal() {
                    continue;
                }

                let target = follow.entry(item).or_default();

                let mut next = pos + 1;
                while next < rule.items.len() {
                    let first = &firsts[&rule.items[next]];
                    let mut stripped = first.clone();
                    stripped.erase(empty);
                    target.merge(&stripped);

                    if !first.contains(empty) {
                        break;
                    }
                    next += 1;
                }

                // Reached the end of the rule: FOLLOW(lhs) flows in too.
                if next >= rule.items.len() {
                    depends.entry(item).or_default().insert(rule.lhs);
                }
            }
        }

        loop {
            let mut changed = false;

            for (&item, sources) in depends.iter() {
                for &source in sources.iter() {
                    if source == item {
                        continue;
                    }

                    let merged = match follow.get(&source) {
                        Some(set) => set.clone(),
                        None => continue,
                    };
                    if follow.entry(item).or_default().merge(&merged) {
                        changed = true;
                    }
                }
            }

            if !changed {
                break;
            }
        }

        drop(firsts);
        *self.follow_sets.borrow_mut() = follow;
    }

    /// The follow-of-dot for a closure step: FIRST of whatever sits after the
    /// dot in `source`, with the source's own lookahead substituted for ε.
    pub(crate) fn follow_of_dot(&self, source: &Lr1Item) -> ItemSet {
        let rule = self.rule(source.core.rule);
        let len = rule.items.len();
        let empty = self.empty_id();

        if source.core.offset + 1 >= len {
            return source.lookahead.clone();
        }

        let mut pos = source.core.offset + 1;
        let mut follow = self.first(rule.items[pos]);
        pos += 1;

        while pos < len && follow.contains(empty) {
            follow.erase(empty);
            follow.merge(&self.first(rule.items[pos]));
            pos += 1;
        }

        if pos >= len && follow.contains(empty) {
            follow.erase(empty);
            follow.merge(&source.lookahead);
        }

        follow
    }

    /// Closure of the item with the dot on it, via the per-item template
    /// cache.
    ///
    /// The template is computed once with the EOI sentinel as lookahead; on
    /// use, the sentinel is substituted with the source's actual
    /// follow-of-dot. While a template is being built, re-entrant requests
    /// for the same item fall back to the direct computation.
    pub(crate) fn cache_closure(&self, id: ItemId, source: &Lr1Item, out: &mut Lr1ItemSet) {
        let item = self.item(id).clone();

        match item {
            Item::Empty => {
                item.closure(id, source, out, self);
                return;
            }
            Item::Eoi | Item::Eog | Item::Terminal(_) | Item::Guard(_) => return,
            _ => {}
        }

        if self.closing.borrow().contains(&id) {
            item.closure(id, source, out, self);
            return;
        }

        self.closing.borrow_mut().insert(id);

        let template = match self.closure_templates.borrow().get(&id) {
            Some(cached) => cached.clone(),
            None => Vec::new(),
        };

        let template = if template.is_empty() {
            let sentinel: ItemSet = [self.eoi_id()].into_iter().collect();
            let mut closed = Lr1ItemSet::new();
            item.closure_with_follow(id, &sentinel, &mut closed, self);

            let items: Vec<Lr1Item> = closed.iter_cloned().collect();
            self.closure_templates.borrow_mut().insert(id, items.clone());
            items
        } else {
            template
        };

        let follow = self.follow_of_dot(source);
        let eoi = self.eoi_id();

        for cached in template {
            if cached.lookahead.contains(eoi) {
                let mut lookahead = cached.lookahead.clone();
                lookahead.erase(eoi);
                lookahead.merge(&follow);
                out.insert(Lr1Item::new(cached.core, lookahead));
            } else {
                out.insert(cached);
            }
        }

        self.closing.borrow_mut().remove(&id);
    }

    /// Renders an item, using the nonterminal's declared name when it has
    /// one.
    pub fn display_item(&self, id: ItemId) -> String {
        match self.item(id) {
            Item::Nonterminal(_) => match self.name_for_nonterminal(id) {
                Some(name) => format!("<{}>", name),
                None => format!("<{}>", id),
            },
            item => item.to_string(),
        }
    }

    /// Renders a rule as `(id) lhs -> items`.
    pub fn display_rule(&self, id: RuleId) -> String {
        let rule = self.rule(id);
        format!(
            "({}) {} -> {}",
            id,
            self.display_item(rule.lhs),
            rule.items.iter().map(|&item| self.display_item(item)).join(" ")
        )
    }
}

/// FIRST of a sequence, chaining through nullable prefixes; ε is kept only
/// when every element of the sequence is nullable.
fn sequence_first(
    sets: &HashMap<ItemId, ItemSet>,
    items: &[ItemId],
    empty: ItemId,
) -> ItemSet {
    let mut result = ItemSet::new();

    for &item in items {
        let first = match sets.get(&item) {
            Some(set) => set,
            None => return result,
        };

        let mut stripped = first.clone();
        stripped.erase(empty);
        result.merge(&stripped);

        if !first.contains(empty) {
            return result;
        }
    }

    result.insert(empty);
    result
}
