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

//! The Shared Packed Parse Forest. An SPPF is a DAG which represents every derivation the
//! input admits at once: where a tree would have to commit to one alternative, an SPPF node
//! carries one *packed* child per alternative, and equal subtrees are shared rather than
//! duplicated. Nodes live in an arena and are referred to by index; every non-packed node is
//! deduplicated on creation through a table keyed by its identity tuple, so index equality is
//! node identity.
//!
//! Each node carries a weight. Outside recovery mode all weights are 0. In recovery mode a
//! node's weight is the cheapest total edit cost of any derivation below it: packed nodes sum
//! their children, their parents take the minimum over packed alternatives, and a cheaper
//! derivation discovered late lowers weights along the parent chains.
//!
//! Incremental reparsing marks forest regions *stale* instead of deleting them: node indices
//! stay valid across reparses, which is what lets a rebuilt subtree slot back into its old
//! parents. Stale regions are revalidated lazily when a result is extracted.

use std::cmp;
use std::hash::Hash;

use fnv::{FnvHashMap, FnvHashSet};
use indexmap::IndexSet;
use num_traits::{PrimInt, Unsigned};
use vob::Vob;

use cfrsm::{RIdx, RsmState, SIdx, TIdx};

use input::VIdx;

/// A type specifically for SPPF node indices.
#[derive(Clone, Copy, Debug, Hash, Eq, Ord, PartialEq, PartialOrd)]
pub struct SppfIdx(u32);

impl From<SppfIdx> for usize {
    fn from(sppf_idx: SppfIdx) -> usize {
        sppf_idx.0 as usize
    }
}

/// What a (non-packed) SPPF node stands for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SppfKind<StorageT> {
    /// A single consumed input edge; `None` is an epsilon edge or (in recovery mode, with
    /// nonzero weight) a deleted edge.
    Terminal(Option<TIdx<StorageT>>),
    /// A complete match of a rule.
    Symbol(RIdx<StorageT>),
    /// A partial match: the left part of some rule's production, up to an RSM state midway
    /// through it.
    Intermediate(SIdx<StorageT>),
    /// A zero-width match at a single vertex.
    Epsilon
}

/// One derivation alternative of its parent node: the parent's span split at `pivot` into an
/// optional left part and a right part. Multiple packed children on one parent is precisely
/// what ambiguity looks like in an SPPF.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PackedNode {
    pivot: VIdx,
    left: Option<SppfIdx>,
    right: SppfIdx,
    weight: u32
}

impl PackedNode {
    pub fn pivot(&self) -> VIdx {
        self.pivot
    }

    pub fn left_child(&self) -> Option<SppfIdx> {
        self.left
    }

    pub fn right_child(&self) -> SppfIdx {
        self.right
    }

    /// The sum of this alternative's child weights.
    pub fn weight(&self) -> u32 {
        self.weight
    }
}

#[derive(Clone, Debug)]
pub struct SppfNode<StorageT> {
    kind: SppfKind<StorageT>,
    left: VIdx,
    right: VIdx,
    weight: u32,
    stale: bool,
    packed: Vec<PackedNode>,
    packed_keys: FnvHashSet<(VIdx, Option<SppfIdx>, SppfIdx)>,
    parents: IndexSet<SppfIdx>
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> SppfNode<StorageT> {
    fn new(kind: SppfKind<StorageT>, left: VIdx, right: VIdx, weight: u32) -> Self {
        SppfNode {
            kind,
            left,
            right,
            weight,
            stale: false,
            packed: Vec::new(),
            packed_keys: FnvHashSet::default(),
            parents: IndexSet::new()
        }
    }

    pub fn kind(&self) -> SppfKind<StorageT> {
        self.kind
    }

    pub fn left_extent(&self) -> VIdx {
        self.left
    }

    pub fn right_extent(&self) -> VIdx {
        self.right
    }

    /// The minimum over this node's packed children's weights (0 outside recovery mode).
    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// Has this node been invalidated by an incremental edit and not yet re-derived?
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// This node's derivation alternatives, in discovery order. Empty for terminal and
    /// epsilon nodes.
    pub fn packed_children(&self) -> &[PackedNode] {
        &self.packed
    }

    /// Does this node have more than one derivation?
    pub fn is_ambiguous(&self) -> bool {
        self.packed.len() > 1
    }
}

/// The SPPF arena plus its deduplication tables.
#[derive(Debug)]
pub struct SppfStore<StorageT> {
    nodes: Vec<SppfNode<StorageT>>,
    terminal_ids: FnvHashMap<(Option<TIdx<StorageT>>, VIdx, VIdx, u32), SppfIdx>,
    symbol_ids: FnvHashMap<(RIdx<StorageT>, VIdx, VIdx), SppfIdx>,
    intermediate_ids: FnvHashMap<(SIdx<StorageT>, VIdx, VIdx), SppfIdx>,
    epsilon_ids: FnvHashMap<VIdx, SppfIdx>,
    // Set once the first invalidation happens; before that, result extraction can skip the
    // revalidation sweep entirely.
    stale_mode: bool
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> SppfStore<StorageT> {
    pub fn new() -> Self {
        SppfStore {
            nodes: Vec::new(),
            terminal_ids: FnvHashMap::default(),
            symbol_ids: FnvHashMap::default(),
            intermediate_ids: FnvHashMap::default(),
            epsilon_ids: FnvHashMap::default(),
            stale_mode: false
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, sppf_idx: SppfIdx) -> &SppfNode<StorageT> {
        &self.nodes[usize::from(sppf_idx)]
    }

    /// Locate or create the terminal node `(token, left, right, weight)`. Weight is part of a
    /// terminal node's identity: a deleted edge (weight 1) and an epsilon edge (weight 0) over
    /// the same span are different facts.
    pub fn terminal_node(
        &mut self,
        token: Option<TIdx<StorageT>>,
        left: VIdx,
        right: VIdx,
        weight: u32
    ) -> SppfIdx {
        if let Some(&n) = self.terminal_ids.get(&(token, left, right, weight)) {
            return n;
        }
        let n = self.push_node(SppfNode::new(SppfKind::Terminal(token), left, right, weight));
        self.terminal_ids.insert((token, left, right, weight), n);
        n
    }

    /// The zero-width match marker at `pos`; one exists per vertex.
    pub fn epsilon_node(&mut self, pos: VIdx) -> SppfIdx {
        if let Some(&n) = self.epsilon_ids.get(&pos) {
            return n;
        }
        let n = self.push_node(SppfNode::new(SppfKind::Epsilon, pos, pos, 0));
        self.epsilon_ids.insert(pos, n);
        n
    }

    /// Look a symbol node up without creating it.
    pub fn find_symbol(&self, ridx: RIdx<StorageT>, left: VIdx, right: VIdx) -> Option<SppfIdx> {
        self.symbol_ids.get(&(ridx, left, right)).cloned()
    }

    /// The GLL parent combinator. Given the RSM state reached after consuming `right`, and the
    /// part of the production consumed before it (`left`, absent at the start of a
    /// production), locate or create the node covering both and record `(left, right)` as one
    /// of its derivations. If `state` is final the parent is the symbol node of `state`'s
    /// rule, otherwise the intermediate node of `state` itself.
    ///
    /// A new derivation cheaper than everything previously known lowers the parent's weight;
    /// every node whose weight falls as a consequence is appended to `decreased` so the caller
    /// can forward the news to structures outside the forest.
    pub fn parent_node(
        &mut self,
        state: &RsmState<StorageT>,
        sidx: SIdx<StorageT>,
        left: Option<SppfIdx>,
        right: SppfIdx,
        decreased: &mut Vec<(SppfIdx, u32)>
    ) -> SppfIdx {
        let (pivot, right_ext, right_w) = {
            let r = &self.nodes[usize::from(right)];
            (r.left, r.right, r.weight)
        };
        let (left_ext, left_w) = match left {
            Some(l) => {
                let ln = &self.nodes[usize::from(l)];
                debug_assert!(ln.right == pivot, "packed children are not adjacent");
                (ln.left, ln.weight)
            }
            None => (pivot, 0)
        };
        let pw = left_w + right_w;

        let p = if state.is_final() {
            self.symbol_node(state.rule(), left_ext, right_ext, pw)
        } else {
            self.intermediate_node(sidx, left_ext, right_ext, pw)
        };

        if self.nodes[usize::from(p)]
            .packed_keys
            .insert((pivot, left, right))
        {
            self.nodes[usize::from(p)].packed.push(PackedNode {
                pivot,
                left,
                right,
                weight: pw
            });
            if let Some(l) = left {
                self.nodes[usize::from(l)].parents.insert(p);
            }
            self.nodes[usize::from(right)].parents.insert(p);
            let cur_w = self.nodes[usize::from(p)].weight;
            self.nodes[usize::from(p)].stale = false;
            if pw < cur_w {
                self.nodes[usize::from(p)].weight = pw;
                decreased.push((p, pw));
                self.propagate_decrease(p, decreased);
            }
        }
        p
    }

    /// Invalidate everything an edit to `vertex`'s outgoing edges could have falsified:
    /// terminal nodes recording a scan out of `vertex` are killed and unlinked from the
    /// deduplication table (a rescan must build fresh ones), packed nodes directly holding a
    /// killed child are pruned, and everything upward of a kill is marked stale pending
    /// revalidation. Nothing is deleted: shared indices must survive so that rebuilt subtrees
    /// reconnect to their old parents.
    pub fn invalidate(&mut self, vertex: VIdx) {
        self.stale_mode = true;

        let mut killed = Vob::new();
        killed.resize(self.nodes.len(), false);
        let mut cone = Vec::new();
        for i in 0..self.nodes.len() {
            let kill = match self.nodes[i].kind {
                SppfKind::Terminal(_) => self.nodes[i].left == vertex,
                _ => false
            };
            if kill {
                self.nodes[i].stale = true;
                killed.set(i, true);
                cone.push(SppfIdx(i as u32));
            }
        }
        self.terminal_ids.retain(|_, v| !killed[usize::from(*v)]);

        // Everything which can reach a killed node is suspect until revalidated.
        while let Some(n) = cone.pop() {
            let parents = self.nodes[usize::from(n)]
                .parents
                .iter()
                .cloned()
                .collect::<Vec<_>>();
            for p in parents {
                if !self.nodes[usize::from(p)].stale {
                    self.nodes[usize::from(p)].stale = true;
                    cone.push(p);
                }
            }
        }

        for i in 0..self.nodes.len() {
            let node = &mut self.nodes[i];
            if node.packed.is_empty() {
                continue;
            }
            node.packed.retain(|q| {
                !(q.left.map_or(false, |l| killed[usize::from(l)])
                    || killed[usize::from(q.right)])
            });
            node.packed_keys.retain(|&(_, l, r)| {
                !(l.map_or(false, |l| killed[usize::from(l)]) || killed[usize::from(r)])
            });
        }
    }

    /// Re-derive whether `root` still has a valid derivation, repairing weights and stale
    /// marks along the way. Returns `false` if every derivation below `root` was destroyed by
    /// invalidation. Cheap when no invalidation has ever happened.
    pub fn revalidate(&mut self, root: SppfIdx) -> bool {
        if !self.stale_mode {
            return true;
        }
        let mut memo = FnvHashMap::default();
        let mut on_path = FnvHashSet::default();
        self.revalidate_node(root, &mut memo, &mut on_path).is_some()
    }

    fn revalidate_node(
        &mut self,
        n: SppfIdx,
        memo: &mut FnvHashMap<SppfIdx, Option<u32>>,
        on_path: &mut FnvHashSet<SppfIdx>
    ) -> Option<u32> {
        if let Some(&res) = memo.get(&n) {
            return res;
        }
        if !on_path.insert(n) {
            // A derivation cannot pass through itself; zero-width cycles offer this node no
            // support.
            return None;
        }
        let nu = usize::from(n);
        let is_leaf = match self.nodes[nu].kind {
            SppfKind::Terminal(_) | SppfKind::Epsilon => true,
            _ => false
        };
        let res = if is_leaf {
            if self.nodes[nu].stale {
                None
            } else {
                Some(self.nodes[nu].weight)
            }
        } else {
            let packed_len = self.nodes[nu].packed.len();
            let mut min_w = None;
            for i in 0..packed_len {
                let (l, r) = {
                    let q = &self.nodes[nu].packed[i];
                    (q.left, q.right)
                };
                let lw = match l {
                    Some(l) => self.revalidate_node(l, memo, on_path),
                    None => Some(0)
                };
                let rw = self.revalidate_node(r, memo, on_path);
                if let (Some(lw), Some(rw)) = (lw, rw) {
                    let w = lw + rw;
                    self.nodes[nu].packed[i].weight = w;
                    min_w = Some(cmp::min(min_w.unwrap_or(u32::max_value()), w));
                }
            }
            if let Some(w) = min_w {
                self.nodes[nu].weight = w;
                self.nodes[nu].stale = false;
            }
            min_w
        };
        on_path.remove(&n);
        memo.insert(n, res);
        res
    }

    fn symbol_node(
        &mut self,
        ridx: RIdx<StorageT>,
        left: VIdx,
        right: VIdx,
        weight: u32
    ) -> SppfIdx {
        if let Some(&n) = self.symbol_ids.get(&(ridx, left, right)) {
            return n;
        }
        let n = self.push_node(SppfNode::new(SppfKind::Symbol(ridx), left, right, weight));
        self.symbol_ids.insert((ridx, left, right), n);
        n
    }

    fn intermediate_node(
        &mut self,
        sidx: SIdx<StorageT>,
        left: VIdx,
        right: VIdx,
        weight: u32
    ) -> SppfIdx {
        if let Some(&n) = self.intermediate_ids.get(&(sidx, left, right)) {
            return n;
        }
        let n = self.push_node(SppfNode::new(
            SppfKind::Intermediate(sidx),
            left,
            right,
            weight
        ));
        self.intermediate_ids.insert((sidx, left, right), n);
        n
    }

    // A weight fell at `start`; ripple the decrease up through parent chains. Terminates
    // because weights are non-negative and only strict decreases are pursued, even through
    // zero-width cycles.
    fn propagate_decrease(&mut self, start: SppfIdx, decreased: &mut Vec<(SppfIdx, u32)>) {
        let mut work = vec![start];
        while let Some(n) = work.pop() {
            let parents = self.nodes[usize::from(n)]
                .parents
                .iter()
                .cloned()
                .collect::<Vec<_>>();
            for p in parents {
                let pu = usize::from(p);
                let packed_len = self.nodes[pu].packed.len();
                let mut min_w = u32::max_value();
                for i in 0..packed_len {
                    let (l, r) = {
                        let q = &self.nodes[pu].packed[i];
                        (q.left, q.right)
                    };
                    let w = l.map_or(0, |l| self.nodes[usize::from(l)].weight)
                        + self.nodes[usize::from(r)].weight;
                    self.nodes[pu].packed[i].weight = w;
                    min_w = cmp::min(min_w, w);
                }
                if min_w < self.nodes[pu].weight {
                    self.nodes[pu].weight = min_w;
                    decreased.push((p, min_w));
                    work.push(p);
                }
            }
        }
    }

    fn push_node(&mut self, node: SppfNode<StorageT>) -> SppfIdx {
        assert!(self.nodes.len() < u32::max_value() as usize);
        let n = SppfIdx(self.nodes.len() as u32);
        self.nodes.push(node);
        n
    }
}

#[cfg(test)]
mod test {
    use super::SppfStore;
    use cfrsm::{Rsm, RsmBuilder, SIdx, Symbol, TIdx};
    use input::VIdx;

    // S: 'a' 'b';  returns (rsm, state after 'a', final state).
    fn ab_rsm() -> (Rsm<u32>, SIdx<u32>, SIdx<u32>) {
        let mut b = RsmBuilder::new();
        let s = b.rule("S");
        let a = b.token("a");
        let bb = b.token("b");
        b.prod(s, &[Symbol::Token(a), Symbol::Token(bb)]);
        b.start(s);
        let rsm = b.build().unwrap();
        let mid = rsm.state(rsm.start_state()).token_targets(a).unwrap()[0];
        let fin = rsm.state(mid).token_targets(bb).unwrap()[0];
        (rsm, mid, fin)
    }

    #[test]
    fn test_terminal_dedup() {
        let mut sppf = SppfStore::<u32>::new();
        let t1 = sppf.terminal_node(None, VIdx(0), VIdx(1), 0);
        let t2 = sppf.terminal_node(None, VIdx(0), VIdx(1), 0);
        assert_eq!(t1, t2);
        // Weight is part of a terminal's identity.
        let t3 = sppf.terminal_node(None, VIdx(0), VIdx(1), 1);
        assert!(t1 != t3);
        let e1 = sppf.epsilon_node(VIdx(4));
        let e2 = sppf.epsilon_node(VIdx(4));
        assert_eq!(e1, e2);
        assert!(sppf.epsilon_node(VIdx(5)) != e1);
    }

    #[test]
    fn test_parent_node_extents_and_packing() {
        let (rsm, mid, fin) = ab_rsm();
        let mut sppf = SppfStore::new();
        let mut dec = Vec::new();

        let ta = sppf.terminal_node(Some(TIdx(0)), VIdx(0), VIdx(1), 0);
        let i1 = sppf.parent_node(rsm.state(mid), mid, None, ta, &mut dec);
        {
            let n = sppf.node(i1);
            assert_eq!(n.left_extent(), VIdx(0));
            assert_eq!(n.right_extent(), VIdx(1));
            assert_eq!(n.packed_children().len(), 1);
            assert_eq!(n.packed_children()[0].pivot(), VIdx(0));
            assert_eq!(n.packed_children()[0].left_child(), None);
        }

        let tb = sppf.terminal_node(Some(TIdx(1)), VIdx(1), VIdx(2), 0);
        let root = sppf.parent_node(rsm.state(fin), fin, Some(i1), tb, &mut dec);
        let n = sppf.node(root);
        // The final state makes the parent a symbol node spanning both children.
        match n.kind() {
            super::SppfKind::Symbol(ridx) => assert_eq!(ridx, rsm.start_rule()),
            k => panic!("wrong kind {:?}", k)
        }
        assert_eq!(n.left_extent(), VIdx(0));
        assert_eq!(n.right_extent(), VIdx(2));
        assert_eq!(n.packed_children()[0].pivot(), VIdx(1));
        assert!(dec.is_empty());

        // Re-adding the same derivation packs nothing new.
        let root2 = sppf.parent_node(rsm.state(fin), fin, Some(i1), tb, &mut dec);
        assert_eq!(root, root2);
        assert_eq!(sppf.node(root).packed_children().len(), 1);
    }

    #[test]
    fn test_weight_min_and_decrease_propagation() {
        let (rsm, _, fin) = ab_rsm();
        let mut sppf = SppfStore::new();
        let mut dec = Vec::new();

        // First derivation costs 2.
        let exp = sppf.terminal_node(Some(TIdx(0)), VIdx(0), VIdx(1), 2);
        let root = sppf.parent_node(rsm.state(fin), fin, None, exp, &mut dec);
        assert_eq!(sppf.node(root).weight(), 2);
        assert!(dec.is_empty());

        // A cheaper alternative lowers the parent and reports the decrease.
        let cheap = sppf.terminal_node(Some(TIdx(1)), VIdx(0), VIdx(1), 1);
        let root2 = sppf.parent_node(rsm.state(fin), fin, None, cheap, &mut dec);
        assert_eq!(root, root2);
        assert_eq!(sppf.node(root).weight(), 1);
        assert_eq!(sppf.node(root).packed_children().len(), 2);
        assert_eq!(dec, vec![(root, 1)]);

        // Weight is the minimum, and each packed child's weight is its children's sum.
        assert_eq!(sppf.node(root).packed_children()[0].weight(), 2);
        assert_eq!(sppf.node(root).packed_children()[1].weight(), 1);
    }

    #[test]
    fn test_invalidate_and_revalidate() {
        let (rsm, mid, fin) = ab_rsm();
        let mut sppf = SppfStore::new();
        let mut dec = Vec::new();

        let ta = sppf.terminal_node(Some(TIdx(0)), VIdx(0), VIdx(1), 0);
        let i1 = sppf.parent_node(rsm.state(mid), mid, None, ta, &mut dec);
        let tb = sppf.terminal_node(Some(TIdx(1)), VIdx(1), VIdx(2), 0);
        let root = sppf.parent_node(rsm.state(fin), fin, Some(i1), tb, &mut dec);

        // Vertex 1's outgoing edges change: the 'b' scan is killed, the 'a' scan survives.
        sppf.invalidate(VIdx(1));
        assert!(sppf.node(tb).is_stale());
        assert!(!sppf.node(ta).is_stale());
        assert!(sppf.node(root).is_stale());
        // The root's packed child directly held the killed scan, so it was pruned.
        assert!(sppf.node(root).packed_children().is_empty());
        assert!(!sppf.revalidate(root));

        // A rescan of vertex 1 builds a fresh terminal node and revives the root in place.
        let tb2 = sppf.terminal_node(Some(TIdx(1)), VIdx(1), VIdx(2), 0);
        assert!(tb2 != tb);
        let root2 = sppf.parent_node(rsm.state(fin), fin, Some(i1), tb2, &mut dec);
        assert_eq!(root, root2);
        assert!(sppf.revalidate(root));
        assert!(!sppf.node(root).is_stale());
        assert_eq!(sppf.node(root).weight(), 0);
    }
}
