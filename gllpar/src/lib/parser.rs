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

//! The parser driver: a worklist fixpoint over descriptors. Each descriptor is handled with
//! one GLL step (pop on a final state, scan the input edges at the current vertex, descend
//! through rule-labelled RSM edges via the GSS), and acceptance is latched whenever a symbol
//! node of the start rule spans a start vertex to a final vertex. The loop serves the
//! default queue to exhaustion; in recovery mode it then serves recovery work cheapest first
//! until no work is left, and the cheapest accepted candidate wins, so a completion whose
//! true cost fell after it was queued still supersedes a dearer result found earlier. The
//! observable result is a pure function of the RSM, the input graph, and the recovery mode;
//! it does not depend on the order descriptors happen to be served in.
//!
//! The parser owns its input graph so that incremental workflows can interleave runs and
//! edits: `parse`, edit one vertex's edges through [`Parser::input_mut`], then
//! [`Parser::reparse`] that vertex.

use std::fmt;
use std::hash::Hash;

use fnv::FnvHashMap;
use indexmap::IndexSet;
use num_traits::{AsPrimitive, PrimInt, Unsigned};

use cfrsm::{RIdx, Rsm, SIdx};

use descriptors::{Descriptor, DescriptorStore};
use gss::{GssIdx, GssStore};
use input::{InputGraph, VIdx};
use recovery::RecoveryKind;
use sppf::{SppfIdx, SppfKind, SppfStore};

/// A per-rule handler for generated parsers: called with the engine and the descriptor to
/// handle in place of the generic RSM interpretation. Generated handlers drive the engine
/// through the same public primitives the interpreter uses ([`Parser::pop`],
/// [`Parser::parent_node`], [`Parser::descend`], [`Parser::add_descriptor`]), or delegate
/// wholesale to [`Parser::handle_with_rsm`].
pub type NtFn<StorageT, I> =
    for<'a, 'b, 'c> fn(&'b mut Parser<'a, StorageT, I>, &'c Descriptor<StorageT>);

/// A parse outcome: the root of the forest, if one was accepted, plus every accepting
/// `(start vertex, final vertex)` pair mapped to the minimum weight it was matched with.
pub type ParseResult = (Option<SppfIdx>, FnvHashMap<(VIdx, VIdx), u32>);

/// The ways a parse can fail outright. Note that an input simply not being in the language is
/// not one of them: that is reported as an `Ok` result with no root.
#[derive(Debug, Eq, PartialEq)]
pub enum ParserError {
    /// A generated dispatch table does not cover a rule the RSM references.
    UnknownRule(String)
}

impl fmt::Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ParserError::UnknownRule(ref name) => write!(
                f,
                "Rule '{}' is missing from the generated dispatch table",
                name
            )
        }
    }
}

/// A GLL parse in progress (or finished: the stores remain readable afterwards, and
/// [`reparse`](#method.reparse) continues from them). All state is in this struct; parsing
/// different inputs concurrently just means separate `Parser` values.
pub struct Parser<'a, StorageT: 'static + Eq + Hash, I> {
    rsm: &'a Rsm<StorageT>,
    input: I,
    recovery: RecoveryKind,
    nt_table: Option<FnvHashMap<RIdx<StorageT>, NtFn<StorageT, I>>>,
    sppf: SppfStore<StorageT>,
    gss: GssStore<StorageT>,
    descriptors: DescriptorStore<StorageT>,
    // Accepting symbol nodes in discovery order; the final root and the reachability pairs
    // are re-derived from this set so that late weight decreases are honoured.
    accepted: IndexSet<SppfIdx>,
    result: Option<SppfIdx>,
    decreased: Vec<(SppfIdx, u32)>
}

impl<'a, StorageT: 'static + Hash + PrimInt + Unsigned, I: InputGraph<StorageT>>
    Parser<'a, StorageT, I>
where
    usize: AsPrimitive<StorageT>
{
    pub fn new(rsm: &'a Rsm<StorageT>, input: I, recovery: RecoveryKind) -> Self {
        Parser {
            rsm,
            input,
            recovery,
            nt_table: None,
            sppf: SppfStore::new(),
            gss: GssStore::new(),
            descriptors: DescriptorStore::new(),
            accepted: IndexSet::new(),
            result: None,
            decreased: Vec::new()
        }
    }

    /// As [`new`](#method.new), but descriptors are dispatched through `nt_table` by the rule
    /// their RSM state belongs to, instead of being interpreted generically. Parsing reports
    /// [`ParserError::UnknownRule`](enum.ParserError.html) if the RSM leads to a rule the
    /// table does not cover.
    pub fn with_nt_table(
        rsm: &'a Rsm<StorageT>,
        input: I,
        recovery: RecoveryKind,
        nt_table: FnvHashMap<RIdx<StorageT>, NtFn<StorageT, I>>
    ) -> Self {
        let mut p = Parser::new(rsm, input, recovery);
        p.nt_table = Some(nt_table);
        p
    }

    /// Run the parse to its fixpoint. Returns the accepted root (`None` if the input is not
    /// in the language and recovery is off or vacuous) and the reachability pairs. Calling
    /// `parse` again without modifying anything returns the same result.
    pub fn parse(&mut self) -> Result<ParseResult, ParserError> {
        let start_state = self.rsm.start_state();
        let start_rule = self.rsm.start_rule();
        let starts = self.input.start_vertices().to_vec();
        for vidx in starts {
            let g = self.gss.get_or_create(start_rule, vidx, 0);
            self.add_descriptor(start_state, g, None, vidx);
        }
        self.run()
    }

    /// Reparse after `vidx`'s outgoing edges changed (through
    /// [`input_mut`](#method.input_mut)): the work previously done at `vidx` is replayed
    /// against the new edges, with the forest regions that depended on the old edges
    /// invalidated. The result is observationally the same as a cold parse of the modified
    /// graph.
    pub fn reparse(&mut self, vidx: VIdx) -> Result<ParseResult, ParserError> {
        for d in self.descriptors.drain_handled_at(vidx) {
            let w = self.gss.min_weight(d.gss())
                + d.sppf().map_or(0, |n| self.sppf.node(n).weight());
            self.descriptors.add(d, w);
        }
        self.sppf.invalidate(vidx);
        self.result = None;
        self.run()
    }

    pub fn input(&self) -> &I {
        &self.input
    }

    /// Mutable access to the input graph, for applying the localised edits
    /// [`reparse`](#method.reparse) then picks up. Edits must leave vertex identities
    /// intact.
    pub fn input_mut(&mut self) -> &mut I {
        &mut self.input
    }

    pub fn sppf(&self) -> &SppfStore<StorageT> {
        &self.sppf
    }

    pub fn gss(&self) -> &GssStore<StorageT> {
        &self.gss
    }

    /// Handle `d` by interpreting the RSM: the default per-descriptor GLL step.
    pub fn handle_with_rsm(&mut self, d: &Descriptor<StorageT>) {
        let rsm = self.rsm;
        let state = d.state();
        let gss = d.gss();
        let sppf = d.sppf();
        let pos = d.pos();
        let st = rsm.state(state);

        // A final state completes (one production of) its rule: pop the GSS node. With no
        // SPPF accumulated yet the production was empty, and the match is the zero-width
        // marker.
        if st.is_final() {
            let z = match sppf {
                Some(n) => n,
                None => self.sppf.epsilon_node(pos)
            };
            self.pop(gss, z, pos);
        }
        self.descriptors.mark_handled(d);

        // A state which is both start and final means its rule derives the empty string
        // here; that is a complete match of the rule in its own right.
        if st.is_start() && st.is_final() {
            let eps = self.sppf.epsilon_node(pos);
            let n = self.parent_node(state, None, eps);
            self.check_acceptance(n);
        }
        if let Some(n) = sppf {
            self.check_acceptance(n);
        }

        // Scan the input edges at `pos`.
        let n_edges = self.input.edges(pos).len();
        for i in 0..n_edges {
            let e = self.input.edges(pos)[i];
            match e.token() {
                None => {
                    // Epsilon edge: move through the graph, stay put in the RSM.
                    let tn = self.sppf.terminal_node(None, pos, e.head(), 0);
                    let y = self.parent_node(state, sppf, tn);
                    self.add_descriptor(state, gss, Some(y), e.head());
                }
                Some(tidx) => {
                    if let Some(tgts) = st.token_targets(tidx) {
                        for &s2 in tgts {
                            let tn = self.sppf.terminal_node(Some(tidx), pos, e.head(), 0);
                            let y = self.parent_node(s2, sppf, tn);
                            self.add_descriptor(s2, gss, Some(y), e.head());
                        }
                    }
                }
            }
        }

        if self.recovery == RecoveryKind::MinCost {
            let ses = self.input.synthetic_edges(pos, st);
            for se in ses {
                match se.token {
                    None => {
                        // Delete: walk the edge, match nothing, pay for it.
                        let tn = self.sppf.terminal_node(None, pos, se.head, se.weight);
                        let y = self.parent_node(state, sppf, tn);
                        self.add_descriptor(state, gss, Some(y), se.head);
                    }
                    Some(tidx) => {
                        if let Some(tgts) = st.token_targets(tidx) {
                            for &s2 in tgts {
                                let tn =
                                    self.sppf.terminal_node(Some(tidx), pos, se.head, se.weight);
                                let y = self.parent_node(s2, sppf, tn);
                                self.add_descriptor(s2, gss, Some(y), se.head);
                            }
                        }
                    }
                }
            }
        }

        // Descend through rule-labelled edges.
        for (ridx, tgts) in st.iter_rule_edges() {
            for &s2 in tgts {
                self.descend(ridx, s2, gss, sppf, pos);
            }
        }
    }

    /// The rule `ridx` is being invoked at `pos`; on completion, parsing resumes in
    /// `ret_state` on top of `caller`, with `bridge` holding what the caller had consumed
    /// already. If the GSS edge this creates is new and the callee already popped, the pops
    /// are replayed over it, completing calls made after the fact.
    pub fn descend(
        &mut self,
        ridx: RIdx<StorageT>,
        ret_state: SIdx<StorageT>,
        caller: GssIdx,
        bridge: Option<SppfIdx>,
        pos: VIdx
    ) {
        let bw = match bridge {
            Some(n) => self.sppf.node(n).weight(),
            None => 0
        };
        let min_w = self.gss.min_weight(caller) + bw;
        let v = self.gss.get_or_create(ridx, pos, min_w);
        if self.recovery == RecoveryKind::MinCost {
            if let Some(b) = bridge {
                self.gss.record_weight_ref(b, caller, v);
            }
        }
        if self.gss.add_edge(v, ret_state, bridge, caller) {
            for z in self.gss.popped_vec(v) {
                let y = self.parent_node(ret_state, bridge, z);
                let right = self.sppf.node(z).right_extent();
                self.add_descriptor(ret_state, caller, Some(y), right);
            }
        }
        let start = self.rsm.rule_start_state(ridx);
        self.add_descriptor(start, v, None, pos);
    }

    /// GSS node `v`'s rule matched from `v`'s position up to `pos`, with forest `z`: resume
    /// every caller recorded on `v`'s return edges.
    pub fn pop(&mut self, v: GssIdx, z: SppfIdx, pos: VIdx) {
        if self.gss.record_pop(v, z) {
            for e in self.gss.edges_vec(v) {
                let y = self.parent_node(e.ret_state(), e.bridge(), z);
                self.add_descriptor(e.ret_state(), e.target(), Some(y), pos);
            }
        }
    }

    /// The SPPF parent combinator for the state `sidx`; weight decreases it uncovers are
    /// forwarded to the GSS.
    pub fn parent_node(
        &mut self,
        sidx: SIdx<StorageT>,
        left: Option<SppfIdx>,
        right: SppfIdx
    ) -> SppfIdx {
        let rsm = self.rsm;
        let st = rsm.state(sidx);
        let p = self
            .sppf
            .parent_node(st, sidx, left, right, &mut self.decreased);
        if !self.decreased.is_empty() {
            let dec = self.decreased.drain(..).collect::<Vec<_>>();
            for (n, w) in dec {
                self.gss.on_weight_decrease(n, w);
            }
        }
        p
    }

    /// Schedule `(state, gss, sppf, pos)` unless it has already been handled. The weight
    /// routing it to a queue is the edit cost of its left context plus its own forest's cost.
    pub fn add_descriptor(
        &mut self,
        state: SIdx<StorageT>,
        gss: GssIdx,
        sppf: Option<SppfIdx>,
        pos: VIdx
    ) {
        let w = self.gss.min_weight(gss) + sppf.map_or(0, |n| self.sppf.node(n).weight());
        self.descriptors.add(Descriptor::new(state, gss, sppf, pos), w);
    }

    // Drain both queues to exhaustion. Recovery work is not cut short when a result is
    // latched: a recovery bucket's key is the weight its descriptors had when admitted, and
    // weights can fall afterwards (a GSS node's min_weight drops when a cheaper left context
    // reaches it), so a parked bucket can still hold the cheapest completion. Abandoning it
    // would let a dearer result stand over a cheaper one; instead everything is served and
    // `finish` settles the minimum over the full accepted set.
    fn run(&mut self) -> Result<ParseResult, ParserError> {
        let allow_recovery = self.recovery == RecoveryKind::MinCost;
        loop {
            let d = match self.descriptors.next(allow_recovery) {
                Some(d) => d,
                None => break
            };
            if self.descriptors.is_handled(&d) {
                continue;
            }
            self.handle(&d)?;
        }
        Ok(self.finish())
    }

    fn handle(&mut self, d: &Descriptor<StorageT>) -> Result<(), ParserError> {
        let f = match self.nt_table {
            None => None,
            Some(ref tbl) => {
                let ridx = self.rsm.state(d.state()).rule();
                match tbl.get(&ridx) {
                    Some(&f) => Some(f),
                    None => {
                        return Err(ParserError::UnknownRule(
                            self.rsm.rule_name(ridx).to_string()
                        ));
                    }
                }
            }
        };
        match f {
            Some(f) => f(self, d),
            None => self.handle_with_rsm(d)
        }
        Ok(())
    }

    fn check_acceptance(&mut self, n: SppfIdx) {
        let (ridx, left, right, weight, stale) = {
            let node = self.sppf.node(n);
            let ridx = match node.kind() {
                SppfKind::Symbol(ridx) => ridx,
                _ => return
            };
            (
                ridx,
                node.left_extent(),
                node.right_extent(),
                node.weight(),
                node.is_stale()
            )
        };
        if ridx != self.rsm.start_rule()
            || !self.input.is_start_vertex(left)
            || !self.input.is_final_vertex(right)
        {
            return;
        }
        self.accepted.insert(n);
        if stale {
            return;
        }
        let better = match self.result {
            None => true,
            Some(r) => self.sppf.node(r).weight() > weight
        };
        if better {
            self.result = Some(n);
        }
    }

    // Re-derive the root and the reachability pairs from the accepted set. Acceptances are
    // re-validated (stale candidates may have lost every derivation) and re-weighed (a
    // candidate may have become cheaper after it was first seen). The cheapest valid
    // candidate wins; discovery order breaks ties.
    fn finish(&mut self) -> ParseResult {
        let mut pairs = FnvHashMap::default();
        let mut best: Option<(SppfIdx, u32)> = None;
        let accepted = self.accepted.iter().cloned().collect::<Vec<_>>();
        for n in accepted {
            if !self.sppf.revalidate(n) {
                continue;
            }
            let (left, right, weight) = {
                let node = self.sppf.node(n);
                (node.left_extent(), node.right_extent(), node.weight())
            };
            let e = pairs.entry((left, right)).or_insert(weight);
            if *e > weight {
                *e = weight;
            }
            let better = match best {
                None => true,
                Some((_, bw)) => weight < bw
            };
            if better {
                best = Some((n, weight));
            }
        }
        self.result = best.map(|(n, _)| n);
        (self.result, pairs)
    }
}

#[cfg(test)]
mod test {
    use fnv::FnvHashMap;

    use cfrsm::{RIdx, Rsm, RsmBuilder, Symbol, TIdx};

    use descriptors::Descriptor;
    use input::{DiGraph, VIdx};
    use recovery::{collect_repairs, ParseRepair, RecoveryKind};
    use sppf::SppfKind;

    use super::{NtFn, Parser, ParserError};

    // S: '(' S ')' S | ;
    fn dyck() -> (Rsm<u32>, TIdx<u32>, TIdx<u32>) {
        let mut b = RsmBuilder::new();
        let s = b.rule("S");
        let open = b.token("(");
        let close = b.token(")");
        b.prod(
            s,
            &[
                Symbol::Token(open),
                Symbol::Rule(s),
                Symbol::Token(close),
                Symbol::Rule(s)
            ]
        );
        b.prod(s, &[]);
        b.start(s);
        (b.build().unwrap(), open, close)
    }

    // S: S S | 'a';
    fn ambig() -> (Rsm<u32>, TIdx<u32>) {
        let mut b = RsmBuilder::new();
        let s = b.rule("S");
        let a = b.token("a");
        b.prod(s, &[Symbol::Rule(s), Symbol::Rule(s)]);
        b.prod(s, &[Symbol::Token(a)]);
        b.start(s);
        (b.build().unwrap(), a)
    }

    // S: 'a' S | 'a';
    fn a_list() -> (Rsm<u32>, TIdx<u32>) {
        let mut b = RsmBuilder::new();
        let s = b.rule("S");
        let a = b.token("a");
        b.prod(s, &[Symbol::Token(a), Symbol::Rule(s)]);
        b.prod(s, &[Symbol::Token(a)]);
        b.start(s);
        (b.build().unwrap(), a)
    }

    #[test]
    fn test_dyck_acceptance() {
        let (rsm, open, close) = dyck();
        let input = DiGraph::from_tokens(&[open, open, close, open, close, close]);
        let mut p = Parser::new(&rsm, input, RecoveryKind::None);
        let (root, pairs) = p.parse().unwrap();
        let root = root.unwrap();
        {
            let n = p.sppf().node(root);
            assert_eq!(n.left_extent(), VIdx(0));
            assert_eq!(n.right_extent(), VIdx(6));
            assert_eq!(n.weight(), 0);
        }
        assert_eq!(pairs.get(&(VIdx(0), VIdx(6))), Some(&0));
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn test_dyck_rejection_without_recovery() {
        let (rsm, open, close) = dyck();
        let input = DiGraph::from_tokens(&[open, open, close]);
        let mut p = Parser::new(&rsm, input, RecoveryKind::None);
        let (root, pairs) = p.parse().unwrap();
        assert_eq!(root, None);
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_dyck_recovery_inserts_missing_close() {
        let (rsm, open, close) = dyck();
        let input = DiGraph::from_tokens(&[open, open, close]);
        let mut p = Parser::new(&rsm, input, RecoveryKind::MinCost);
        let (root, pairs) = p.parse().unwrap();
        let root = root.unwrap();
        assert_eq!(p.sppf().node(root).weight(), 1);
        assert_eq!(pairs.get(&(VIdx(0), VIdx(3))), Some(&1));
        // "(()" admits three single-edit repairs: close it at the end, or drop either '('.
        let repairs = collect_repairs(p.sppf(), root);
        assert_eq!(repairs.len(), 1);
        assert!(
            repairs[0] == ParseRepair::Insert(close, VIdx(3))
                || repairs[0] == ParseRepair::Delete(VIdx(0), VIdx(1))
                || repairs[0] == ParseRepair::Delete(VIdx(1), VIdx(2)),
            "unexpected repair {:?}",
            repairs[0]
        );
    }

    #[test]
    fn test_recovery_minimality() {
        // S: 'a' 'b' 'c';  over input "a c": exactly the 'b' is missing.
        let mut b = RsmBuilder::new();
        let s = b.rule("S");
        let a = b.token("a");
        let bb = b.token("b");
        let c = b.token("c");
        b.prod(s, &[Symbol::Token(a), Symbol::Token(bb), Symbol::Token(c)]);
        b.start(s);
        let rsm = b.build().unwrap();

        let input = DiGraph::from_tokens(&[a, c]);
        let mut p = Parser::new(&rsm, input, RecoveryKind::MinCost);
        let (root, _) = p.parse().unwrap();
        let root = root.unwrap();
        assert_eq!(p.sppf().node(root).weight(), 1);
        assert_eq!(
            collect_repairs(p.sppf(), root),
            vec![ParseRepair::Insert(bb, VIdx(1))]
        );
    }

    #[test]
    fn test_recovery_deletes_stray_token() {
        // S: 'a' 'b';  over "a c b": the stray 'c' edge is walked over for cost 1.
        let mut b = RsmBuilder::new();
        let s = b.rule("S");
        let a = b.token("a");
        let bb = b.token("b");
        let c = b.token("c");
        b.prod(s, &[Symbol::Token(a), Symbol::Token(bb)]);
        b.start(s);
        let rsm = b.build().unwrap();

        let input = DiGraph::from_tokens(&[a, c, bb]);
        let mut p = Parser::new(&rsm, input, RecoveryKind::MinCost);
        let (root, _) = p.parse().unwrap();
        let root = root.unwrap();
        assert_eq!(p.sppf().node(root).weight(), 1);
        assert_eq!(
            collect_repairs(p.sppf(), root),
            vec![ParseRepair::Delete(VIdx(1), VIdx(2))]
        );
    }

    #[test]
    fn test_recovery_weight_decrease_after_bucketing() {
        // S: 'a' X 'b';  X: 'm' 'n' | Y;  Y: 'k';  over "a z b". Completing X zero-width at
        // vertex 1 costs 2 through 'm' 'n' but 1 through Y, and the dearer derivation is
        // found first: the shared (X, 1, 1) node starts at weight 2, and work referencing it
        // is bucketed at that stale cost before the Y completion lowers it to 1. The engine
        // must still settle on the cheapest total repair (one insert plus deleting 'z').
        let mut b = RsmBuilder::new();
        let s = b.rule("S");
        let x = b.rule("X");
        let y = b.rule("Y");
        let a = b.token("a");
        let bb = b.token("b");
        let m = b.token("m");
        let n = b.token("n");
        let k = b.token("k");
        let z = b.token("z");
        b.prod(s, &[Symbol::Token(a), Symbol::Rule(x), Symbol::Token(bb)]);
        b.prod(x, &[Symbol::Token(m), Symbol::Token(n)]);
        b.prod(x, &[Symbol::Rule(y)]);
        b.prod(y, &[Symbol::Token(k)]);
        b.start(s);
        let rsm = b.build().unwrap();

        let input = DiGraph::from_tokens(&[a, z, bb]);
        let mut p = Parser::new(&rsm, input, RecoveryKind::MinCost);
        let (root, pairs) = p.parse().unwrap();
        let root = root.unwrap();
        assert_eq!(p.sppf().node(root).weight(), 2);
        assert_eq!(pairs.get(&(VIdx(0), VIdx(3))), Some(&2));

        // The decrease landed on the shared node: both derivations are packed, the cheap
        // one sets the weight.
        let x11 = p.sppf().find_symbol(x, VIdx(1), VIdx(1)).unwrap();
        assert!(p.sppf().node(x11).is_ambiguous());
        assert_eq!(p.sppf().node(x11).weight(), 1);

        // A minimum repair deletes the 'z' edge and inserts a 'k' (either side of the
        // deletion is minimal); the 'm' 'n' route would cost 3.
        let repairs = collect_repairs(p.sppf(), root);
        assert_eq!(repairs.len(), 2);
        assert!(repairs.contains(&ParseRepair::Delete(VIdx(1), VIdx(2))));
        assert!(repairs.iter().any(|r| match *r {
            ParseRepair::Insert(tidx, _) => tidx == k,
            _ => false
        }));
        assert!(!repairs.iter().any(|r| match *r {
            ParseRepair::Insert(tidx, _) => tidx == m || tidx == n,
            _ => false
        }));
    }

    #[test]
    fn test_vacuous_grammar_recovers_nothing() {
        // S has no productions: no amount of repair makes the input parse.
        let mut b = RsmBuilder::new();
        let s = b.rule("S");
        let a = b.token("a");
        b.start(s);
        let rsm = b.build().unwrap();

        let input = DiGraph::from_tokens(&[a]);
        let mut p = Parser::new(&rsm, input, RecoveryKind::MinCost);
        let (root, pairs) = p.parse().unwrap();
        assert_eq!(root, None);
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_ambiguous_packs_all_derivations() {
        let (rsm, a) = ambig();
        // Every vertex both starts and ends queries, so every substring of "aaa" is matched.
        let mut input = DiGraph::new();
        let vs = (0..4).map(|_| input.add_vertex()).collect::<Vec<_>>();
        for i in 0..3 {
            input.add_edge(vs[i], Some(a), vs[i + 1]);
        }
        for &v in &vs {
            input.mark_start(v);
            input.mark_final(v);
        }

        let mut p = Parser::new(&rsm, input, RecoveryKind::None);
        let (root, pairs) = p.parse().unwrap();
        assert!(root.is_some());
        for &(i, j) in &[(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)] {
            assert_eq!(
                pairs.get(&(VIdx(i), VIdx(j))),
                Some(&0),
                "pair {}..{}",
                i,
                j
            );
        }
        // S does not derive the empty string, so no vertex reaches itself.
        assert!(pairs.get(&(VIdx(0), VIdx(0))).is_none());

        // The full span is ambiguous: one packed child per split point, no duplicates.
        let n03 = p
            .sppf()
            .find_symbol(rsm.start_rule(), VIdx(0), VIdx(3))
            .unwrap();
        let node = p.sppf().node(n03);
        assert!(node.is_ambiguous());
        let mut pivots = node
            .packed_children()
            .iter()
            .map(|q| q.pivot())
            .collect::<Vec<_>>();
        pivots.sort();
        assert_eq!(pivots, vec![VIdx(1), VIdx(2)]);
    }

    #[test]
    fn test_left_recursion_terminates() {
        // A: A 'b' | ;
        let mut b = RsmBuilder::new();
        let a_rule = b.rule("A");
        let b_tok = b.token("b");
        b.prod(a_rule, &[Symbol::Rule(a_rule), Symbol::Token(b_tok)]);
        b.prod(a_rule, &[]);
        b.start(a_rule);
        let rsm = b.build().unwrap();

        let input = DiGraph::from_tokens(&[b_tok, b_tok]);
        let mut p = Parser::new(&rsm, input, RecoveryKind::None);
        let (root, pairs) = p.parse().unwrap();
        let root = root.unwrap();
        assert_eq!(p.sppf().node(root).right_extent(), VIdx(2));
        assert_eq!(pairs.get(&(VIdx(0), VIdx(2))), Some(&0));
    }

    #[test]
    fn test_empty_input_epsilon_grammar() {
        // S: ;  over a single vertex which is both start and final.
        let mut b = RsmBuilder::new();
        let s = b.rule("S");
        b.prod(s, &[]);
        b.start(s);
        let rsm = b.build().unwrap();

        let mut input = DiGraph::<u32>::new();
        let v0 = input.add_vertex();
        input.mark_start(v0);
        input.mark_final(v0);

        let mut p = Parser::new(&rsm, input, RecoveryKind::None);
        let (root, pairs) = p.parse().unwrap();
        let root = root.unwrap();
        {
            let n = p.sppf().node(root);
            assert_eq!((n.left_extent(), n.right_extent()), (v0, v0));
            assert_eq!(n.weight(), 0);
            // The sole derivation is the zero-width marker.
            assert_eq!(n.packed_children().len(), 1);
            let eps = p.sppf().node(n.packed_children()[0].right_child());
            match eps.kind() {
                SppfKind::Epsilon => (),
                k => panic!("expected epsilon child, got {:?}", k)
            }
        }
        assert_eq!(pairs.get(&(v0, v0)), Some(&0));
    }

    #[test]
    fn test_graph_fork_shares_one_pair() {
        // S: 'a' 'b';  over the diamond v0 =a=> {v1, v2} =b=> v3.
        let mut b = RsmBuilder::new();
        let s = b.rule("S");
        let a = b.token("a");
        let bb = b.token("b");
        b.prod(s, &[Symbol::Token(a), Symbol::Token(bb)]);
        b.start(s);
        let rsm = b.build().unwrap();

        let mut input = DiGraph::new();
        let v0 = input.add_vertex();
        let v1 = input.add_vertex();
        let v2 = input.add_vertex();
        let v3 = input.add_vertex();
        input.add_edge(v0, Some(a), v1);
        input.add_edge(v0, Some(a), v2);
        input.add_edge(v1, Some(bb), v3);
        input.add_edge(v2, Some(bb), v3);
        input.mark_start(v0);
        input.mark_final(v3);

        let mut p = Parser::new(&rsm, input, RecoveryKind::None);
        let (root, pairs) = p.parse().unwrap();
        let root = root.unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs.get(&(v0, v3)), Some(&0));
        // One packed child per path through the diamond.
        let node = p.sppf().node(root);
        assert_eq!(node.packed_children().len(), 2);
        let mut pivots = node
            .packed_children()
            .iter()
            .map(|q| q.pivot())
            .collect::<Vec<_>>();
        pivots.sort();
        assert_eq!(pivots, vec![v1, v2]);
    }

    #[test]
    fn test_epsilon_input_edges() {
        // S: 'a';  over v0 =eps=> v1 =a=> v2: the epsilon edge costs nothing and the match
        // spans the whole path.
        let mut b = RsmBuilder::new();
        let s = b.rule("S");
        let a = b.token("a");
        b.prod(s, &[Symbol::Token(a)]);
        b.start(s);
        let rsm = b.build().unwrap();

        let mut input = DiGraph::new();
        let v0 = input.add_vertex();
        let v1 = input.add_vertex();
        let v2 = input.add_vertex();
        input.add_edge(v0, None, v1);
        input.add_edge(v1, Some(a), v2);
        input.mark_start(v0);
        input.mark_final(v2);

        let mut p = Parser::new(&rsm, input, RecoveryKind::None);
        let (root, pairs) = p.parse().unwrap();
        let root = root.unwrap();
        {
            let n = p.sppf().node(root);
            assert_eq!((n.left_extent(), n.right_extent()), (v0, v2));
            assert_eq!(n.weight(), 0);
        }
        assert_eq!(pairs.get(&(v0, v2)), Some(&0));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let (rsm, open, close) = dyck();
        let input = DiGraph::from_tokens(&[open, close, open, close]);
        let mut p = Parser::new(&rsm, input, RecoveryKind::None);
        let (root1, pairs1) = p.parse().unwrap();
        let (root2, pairs2) = p.parse().unwrap();
        assert_eq!(root1, root2);
        assert_eq!(pairs1, pairs2);
    }

    #[test]
    fn test_incremental_noop_reparse() {
        let (rsm, a) = a_list();
        let input = DiGraph::from_tokens(&[a, a]);
        let mut p = Parser::new(&rsm, input, RecoveryKind::None);
        let (root1, pairs1) = p.parse().unwrap();
        let root1 = root1.unwrap();

        // Nothing changed at vertex 1; the reparse must reconstruct the same result, and
        // node sharing means it is literally the same root.
        let (root2, pairs2) = p.reparse(VIdx(1)).unwrap();
        assert_eq!(root2, Some(root1));
        assert_eq!(pairs1, pairs2);
        let n = p.sppf().node(root1);
        assert!(!n.is_stale());
        assert_eq!(n.weight(), 0);
        assert_eq!(n.packed_children().len(), 1);
    }

    #[test]
    fn test_incremental_reparse_after_removal() {
        let (rsm, a) = a_list();
        let input = DiGraph::from_tokens(&[a, a]);
        let mut p = Parser::new(&rsm, input, RecoveryKind::None);
        assert!(p.parse().unwrap().0.is_some());

        // Remove vertex 1's outgoing edge; "a" alone no longer reaches the final vertex,
        // and the reparse must agree with a cold parse of the modified graph.
        p.input_mut().set_edges(VIdx(1), Vec::new());
        let (root, pairs) = p.reparse(VIdx(1)).unwrap();
        assert_eq!(root, None);
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_incremental_reparse_sees_added_edge() {
        let (rsm, a) = a_list();
        let mut input = DiGraph::from_tokens(&[a, a]);
        let v3 = input.add_vertex();
        input.mark_final(v3);

        let mut p = Parser::new(&rsm, input, RecoveryKind::None);
        let (root1, pairs1) = p.parse().unwrap();
        assert!(root1.is_some());
        assert_eq!(pairs1.len(), 1);

        // A second 'a' edge out of vertex 1 opens a path to the other final vertex.
        p.input_mut().add_edge(VIdx(1), Some(a), v3);
        let (root2, pairs2) = p.reparse(VIdx(1)).unwrap();
        assert!(root2.is_some());
        assert_eq!(pairs2.len(), 2);
        assert_eq!(pairs2.get(&(VIdx(0), VIdx(2))), Some(&0));
        assert_eq!(pairs2.get(&(VIdx(0), v3)), Some(&0));
    }

    fn delegate(p: &mut Parser<u32, DiGraph<u32>>, d: &Descriptor<u32>) {
        p.handle_with_rsm(d);
    }

    #[test]
    fn test_generated_table_delegation() {
        let (rsm, open, close) = dyck();
        let input = DiGraph::from_tokens(&[open, close]);
        let mut tbl: FnvHashMap<RIdx<u32>, NtFn<u32, DiGraph<u32>>> = FnvHashMap::default();
        tbl.insert(rsm.start_rule(), delegate);
        let mut p = Parser::with_nt_table(&rsm, input, RecoveryKind::None, tbl);
        let (root, pairs) = p.parse().unwrap();
        assert!(root.is_some());
        assert_eq!(pairs.get(&(VIdx(0), VIdx(2))), Some(&0));
    }

    #[test]
    fn test_generated_table_coverage_error() {
        // Two rules, but the table only covers the start rule: descending into T must be
        // reported, not silently ignored.
        let mut b = RsmBuilder::new();
        let s = b.rule("S");
        let t = b.rule("T");
        let a = b.token("a");
        b.prod(s, &[Symbol::Rule(t)]);
        b.prod(t, &[Symbol::Token(a)]);
        b.start(s);
        let rsm = b.build().unwrap();

        let input = DiGraph::from_tokens(&[a]);
        let mut tbl: FnvHashMap<RIdx<u32>, NtFn<u32, DiGraph<u32>>> = FnvHashMap::default();
        tbl.insert(rsm.start_rule(), delegate);
        let mut p = Parser::with_nt_table(&rsm, input, RecoveryKind::None, tbl);
        match p.parse() {
            Err(ParserError::UnknownRule(ref name)) => assert_eq!(name, "T"),
            r => panic!("expected UnknownRule, got {:?}", r)
        }
    }

    #[test]
    fn test_multiple_start_vertices() {
        // S: 'a';  over two disjoint 'a' edges, both heads final, both tails starts.
        let mut b = RsmBuilder::new();
        let s = b.rule("S");
        let a = b.token("a");
        b.prod(s, &[Symbol::Token(a)]);
        b.start(s);
        let rsm = b.build().unwrap();

        let mut input = DiGraph::new();
        let v0 = input.add_vertex();
        let v1 = input.add_vertex();
        let v2 = input.add_vertex();
        let v3 = input.add_vertex();
        input.add_edge(v0, Some(a), v1);
        input.add_edge(v2, Some(a), v3);
        input.mark_start(v0);
        input.mark_start(v2);
        input.mark_final(v1);
        input.mark_final(v3);

        let mut p = Parser::new(&rsm, input, RecoveryKind::None);
        let (root, pairs) = p.parse().unwrap();
        assert!(root.is_some());
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs.get(&(v0, v1)), Some(&0));
        assert_eq!(pairs.get(&(v2, v3)), Some(&0));
    }
}
