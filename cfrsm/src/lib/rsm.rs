// Copyright (c) 2018 King's College London
// created by the Software Development Team <http://soft-dev.org/>
//
// The Universal Permissive License (UPL), Version 1.0
//
// Subject to the condition set forth below, permission is hereby granted to any person obtaining a
// copy of this software, associated documentation and/or data (collectively the "Software"), free
// of charge and under any and all copyright rights in the Software, and any and all patent rights
// owned or freely licensable by each licensor hereunder covering either (i) the unmodified
// Software as contributed to or provided by such licensor, or (ii) the Larger Works (as defined
// below), to deal in both
//
// (a) the Software, and
// (b) any piece of software and/or hardware listed in the lrgrwrks.txt file
// if one is included with the Software (each a "Larger Work" to which the Software is contributed
// by such licensors),
//
// without restriction, including without limitation the rights to copy, create derivative works
// of, display, perform, and distribute the Software and make, use, sell, offer for sale, import,
// export, have made, and have sold the Software and the Larger Work(s), and to sublicense the
// foregoing rights on either these or other terms.
//
// This license is subject to the following condition: The above copyright notice and either this
// complete permission notice or at a minimum a reference to the UPL must be included in all copies
// or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING
// BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use indexmap::IndexMap;
use num_traits::{AsPrimitive, PrimInt, Unsigned};
use vob::Vob;

use idxnewtype::{RIdx, SIdx, TIdx};
use Symbol;

/// One state of an RSM automaton. A state knows which rule owns it, whether it is that rule's
/// start state, whether it is final, and its outgoing edges. Edges are kept in insertion-ordered
/// maps so that enumeration order is the declaration order, which downstream consumers rely on
/// for reproducible tie-breaking.
#[derive(Clone, Debug)]
pub struct RsmState<StorageT> {
    rule: RIdx<StorageT>,
    is_start: bool,
    is_final: bool,
    token_edges: IndexMap<TIdx<StorageT>, Vec<SIdx<StorageT>>>,
    rule_edges: IndexMap<RIdx<StorageT>, Vec<SIdx<StorageT>>>
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> RsmState<StorageT> {
    fn new(rule: RIdx<StorageT>, is_start: bool, is_final: bool) -> Self {
        RsmState {
            rule,
            is_start,
            is_final,
            token_edges: IndexMap::new(),
            rule_edges: IndexMap::new()
        }
    }

    /// Return the index of the rule owning this state.
    pub fn rule(&self) -> RIdx<StorageT> {
        self.rule
    }

    pub fn is_start(&self) -> bool {
        self.is_start
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    /// Iterate, in declaration order, over the tokens which label at least one outgoing edge of
    /// this state.
    pub fn tokens<'a>(&'a self) -> impl Iterator<Item = TIdx<StorageT>> + 'a {
        self.token_edges.keys().cloned()
    }

    /// The successor states of this state under `tidx`, or `None` if no outgoing edge is
    /// labelled by `tidx`.
    pub fn token_targets(&self, tidx: TIdx<StorageT>) -> Option<&[SIdx<StorageT>]> {
        self.token_edges.get(&tidx).map(|v| v.as_slice())
    }

    /// Iterate over `(token, successor states)` pairs in declaration order.
    pub fn iter_token_edges<'a>(
        &'a self
    ) -> impl Iterator<Item = (TIdx<StorageT>, &'a [SIdx<StorageT>])> + 'a {
        self.token_edges.iter().map(|(&t, v)| (t, v.as_slice()))
    }

    /// Iterate over `(rule, successor states)` pairs in declaration order.
    pub fn iter_rule_edges<'a>(
        &'a self
    ) -> impl Iterator<Item = (RIdx<StorageT>, &'a [SIdx<StorageT>])> + 'a {
        self.rule_edges.iter().map(|(&r, v)| (r, v.as_slice()))
    }

    fn add_token_edge(&mut self, tidx: TIdx<StorageT>, to: SIdx<StorageT>) {
        let tgts = self.token_edges.entry(tidx).or_insert_with(Vec::new);
        if !tgts.contains(&to) {
            tgts.push(to);
        }
    }

    fn add_rule_edge(&mut self, ridx: RIdx<StorageT>, to: SIdx<StorageT>) {
        let tgts = self.rule_edges.entry(ridx).or_insert_with(Vec::new);
        if !tgts.contains(&to) {
            tgts.push(to);
        }
    }
}

/// One rule of an RSM: a name plus the index of the automaton's start state.
#[derive(Clone, Debug)]
pub struct Rule<StorageT> {
    name: String,
    start_state: SIdx<StorageT>
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> Rule<StorageT> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start_state(&self) -> SIdx<StorageT> {
        self.start_state
    }
}

/// A built, validated Recursive State Machine. `Rsm`s are immutable: all mutation happens in
/// [`RsmBuilder`](struct.RsmBuilder.html) before `build` runs its consistency checks.
#[derive(Clone, Debug)]
pub struct Rsm<StorageT> {
    states: Vec<RsmState<StorageT>>,
    rules: Vec<Rule<StorageT>>,
    token_names: Vec<String>,
    start_rule: RIdx<StorageT>
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> Rsm<StorageT>
where
    usize: AsPrimitive<StorageT>
{
    pub fn state(&self, sidx: SIdx<StorageT>) -> &RsmState<StorageT> {
        &self.states[usize::from(sidx)]
    }

    pub fn rule(&self, ridx: RIdx<StorageT>) -> &Rule<StorageT> {
        &self.rules[usize::from(ridx)]
    }

    pub fn rule_name(&self, ridx: RIdx<StorageT>) -> &str {
        self.rules[usize::from(ridx)].name()
    }

    pub fn token_name(&self, tidx: TIdx<StorageT>) -> &str {
        &self.token_names[usize::from(tidx)]
    }

    /// The start state of rule `ridx`.
    pub fn rule_start_state(&self, ridx: RIdx<StorageT>) -> SIdx<StorageT> {
        self.rules[usize::from(ridx)].start_state()
    }

    /// The rule the whole machine starts in.
    pub fn start_rule(&self) -> RIdx<StorageT> {
        self.start_rule
    }

    /// The start state of the start rule.
    pub fn start_state(&self) -> SIdx<StorageT> {
        self.rule_start_state(self.start_rule)
    }

    /// How many rules does this RSM have?
    pub fn rules_len(&self) -> RIdx<StorageT> {
        RIdx(self.rules.len().as_())
    }

    /// How many tokens does this RSM know about?
    pub fn tokens_len(&self) -> TIdx<StorageT> {
        TIdx(self.token_names.len().as_())
    }

    /// How many states does this RSM have, over all rules?
    pub fn states_len(&self) -> SIdx<StorageT> {
        SIdx(self.states.len().as_())
    }

    pub fn iter_ridxs<'a>(&'a self) -> impl Iterator<Item = RIdx<StorageT>> + 'a {
        (0..self.rules.len()).map(|i| RIdx(i.as_()))
    }

    pub fn iter_tidxs<'a>(&'a self) -> impl Iterator<Item = TIdx<StorageT>> + 'a {
        (0..self.token_names.len()).map(|i| TIdx(i.as_()))
    }
}

/// The ways in which an RSM under construction can be inconsistent.
#[derive(Debug, Eq, PartialEq)]
pub enum RsmBuildError {
    /// No rule was nominated as the machine's start rule.
    NoStartRule,
    /// An edge points at a state owned by a different rule. Automata may only call other
    /// automata through rule-labelled edges; their own transitions must stay within the rule.
    CrossRuleEdge { from_rule: String, to_rule: String },
    /// A rule owns a state which cannot be reached from the rule's start state.
    UnreachableState { rule: String }
}

impl fmt::Display for RsmBuildError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            RsmBuildError::NoStartRule => write!(f, "No start rule was set"),
            RsmBuildError::CrossRuleEdge {
                ref from_rule,
                ref to_rule
            } => write!(
                f,
                "Edge from a state of rule '{}' targets a state of rule '{}'",
                from_rule, to_rule
            ),
            RsmBuildError::UnreachableState { ref rule } => write!(
                f,
                "Rule '{}' owns a state unreachable from its start state",
                rule
            )
        }
    }
}

/// Incrementally builds an [`Rsm`](struct.Rsm.html). Rules and tokens are interned by name;
/// registering a rule creates its (unique) start state. Automata can be laid down either with
/// the low-level `state`/`token_edge`/`rule_edge` primitives or, for the common linear case,
/// with [`prod`](#method.prod), which adds one production's state chain in a single call.
pub struct RsmBuilder<StorageT> {
    states: Vec<RsmState<StorageT>>,
    rules: Vec<Rule<StorageT>>,
    token_names: Vec<String>,
    token_map: HashMap<String, TIdx<StorageT>>,
    rule_map: HashMap<String, RIdx<StorageT>>,
    start_rule: Option<RIdx<StorageT>>
}

impl RsmBuilder<u32> {
    /// Create a builder whose indices are stored as `u32`. If you need a different storage
    /// type, use [`new_with_storaget`](#method.new_with_storaget).
    pub fn new() -> Self {
        RsmBuilder::new_with_storaget()
    }
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> RsmBuilder<StorageT>
where
    usize: AsPrimitive<StorageT>
{
    pub fn new_with_storaget() -> Self {
        RsmBuilder {
            states: Vec::new(),
            rules: Vec::new(),
            token_names: Vec::new(),
            token_map: HashMap::new(),
            rule_map: HashMap::new(),
            start_rule: None
        }
    }

    /// Intern `name` as a token, returning its index. Interning the same name twice returns
    /// the same index.
    ///
    /// # Panics
    ///
    /// If `StorageT` cannot represent the new index.
    pub fn token(&mut self, name: &str) -> TIdx<StorageT> {
        if let Some(&tidx) = self.token_map.get(name) {
            return tidx;
        }
        storaget_check::<StorageT>(self.token_names.len(), "token");
        let tidx = TIdx(self.token_names.len().as_());
        self.token_names.push(name.to_string());
        self.token_map.insert(name.to_string(), tidx);
        tidx
    }

    /// Intern `name` as a rule, returning its index. The first interning creates the rule's
    /// start state.
    ///
    /// # Panics
    ///
    /// If `StorageT` cannot represent the new index.
    pub fn rule(&mut self, name: &str) -> RIdx<StorageT> {
        if let Some(&ridx) = self.rule_map.get(name) {
            return ridx;
        }
        storaget_check::<StorageT>(self.rules.len(), "rule");
        let ridx = RIdx(self.rules.len().as_());
        let start = self.new_state(ridx, true, false);
        self.rules.push(Rule {
            name: name.to_string(),
            start_state: start
        });
        self.rule_map.insert(name.to_string(), ridx);
        ridx
    }

    /// Add a fresh, non-start state to `ridx`'s automaton.
    ///
    /// # Panics
    ///
    /// If `StorageT` cannot represent the new index.
    pub fn state(&mut self, ridx: RIdx<StorageT>, is_final: bool) -> SIdx<StorageT> {
        self.new_state(ridx, false, is_final)
    }

    /// Mark an existing state as final. Needed when a rule derives the empty string, whose
    /// "production" is the start state itself.
    pub fn mark_final(&mut self, sidx: SIdx<StorageT>) {
        self.states[usize::from(sidx)].is_final = true;
    }

    pub fn token_edge(&mut self, from: SIdx<StorageT>, tidx: TIdx<StorageT>, to: SIdx<StorageT>) {
        self.states[usize::from(from)].add_token_edge(tidx, to);
    }

    pub fn rule_edge(&mut self, from: SIdx<StorageT>, ridx: RIdx<StorageT>, to: SIdx<StorageT>) {
        self.states[usize::from(from)].add_rule_edge(ridx, to);
    }

    /// Add one production to `ridx`'s automaton: a linear chain of fresh states from the
    /// rule's start state, one edge per symbol, with the last state final. An empty symbol
    /// slice marks the start state itself final (the rule derives the empty string).
    pub fn prod(&mut self, ridx: RIdx<StorageT>, syms: &[Symbol<StorageT>]) {
        let mut cur = self.rules[usize::from(ridx)].start_state;
        if syms.is_empty() {
            self.mark_final(cur);
            return;
        }
        for (i, sym) in syms.iter().enumerate() {
            let next = self.state(ridx, i == syms.len() - 1);
            match *sym {
                Symbol::Token(tidx) => self.token_edge(cur, tidx, next),
                Symbol::Rule(r) => self.rule_edge(cur, r, next)
            }
            cur = next;
        }
    }

    /// The start state of rule `ridx`, as known so far.
    pub fn rule_start(&self, ridx: RIdx<StorageT>) -> SIdx<StorageT> {
        self.rules[usize::from(ridx)].start_state
    }

    /// Nominate `ridx` as the machine's start rule.
    pub fn start(&mut self, ridx: RIdx<StorageT>) {
        self.start_rule = Some(ridx);
    }

    /// Validate the machine under construction and, if it is consistent, freeze it into an
    /// [`Rsm`](struct.Rsm.html).
    pub fn build(self) -> Result<Rsm<StorageT>, RsmBuildError> {
        let start_rule = match self.start_rule {
            Some(ridx) => ridx,
            None => return Err(RsmBuildError::NoStartRule)
        };

        // Every edge must stay within its owning automaton.
        for st in &self.states {
            let tgts = st
                .token_edges
                .values()
                .chain(st.rule_edges.values())
                .flat_map(|v| v.iter());
            for &to in tgts {
                let to_rule = self.states[usize::from(to)].rule;
                if to_rule != st.rule {
                    return Err(RsmBuildError::CrossRuleEdge {
                        from_rule: self.rules[usize::from(st.rule)].name.clone(),
                        to_rule: self.rules[usize::from(to_rule)].name.clone()
                    });
                }
            }
        }

        // Every state must be reachable from its rule's start state.
        let mut seen = Vob::new();
        seen.resize(self.states.len(), false);
        let mut todo = Vec::new();
        for rule in &self.rules {
            todo.push(rule.start_state);
        }
        while let Some(sidx) = todo.pop() {
            if seen[usize::from(sidx)] {
                continue;
            }
            seen.set(usize::from(sidx), true);
            let st = &self.states[usize::from(sidx)];
            for tgts in st.token_edges.values().chain(st.rule_edges.values()) {
                for &to in tgts {
                    if !seen[usize::from(to)] {
                        todo.push(to);
                    }
                }
            }
        }
        for (i, st) in self.states.iter().enumerate() {
            if !seen[i] {
                return Err(RsmBuildError::UnreachableState {
                    rule: self.rules[usize::from(st.rule)].name.clone()
                });
            }
        }

        Ok(Rsm {
            states: self.states,
            rules: self.rules,
            token_names: self.token_names,
            start_rule
        })
    }

    fn new_state(&mut self, ridx: RIdx<StorageT>, is_start: bool, is_final: bool) -> SIdx<StorageT> {
        storaget_check::<StorageT>(self.states.len(), "state");
        let sidx = SIdx(self.states.len().as_());
        self.states.push(RsmState::new(ridx, is_start, is_final));
        sidx
    }
}

fn storaget_check<StorageT: PrimInt + Unsigned>(len: usize, kind: &str) {
    let max = num_traits::cast::<StorageT, usize>(StorageT::max_value())
        .unwrap_or(usize::max_value());
    if len >= max {
        panic!("Cannot store more {} indices in the chosen StorageT", kind);
    }
}
