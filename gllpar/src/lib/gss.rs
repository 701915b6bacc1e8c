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

//! The Graph Structured Stack. Where a deterministic parser pushes a return address on a call
//! stack, GLL creates (or finds) the GSS node `(rule, call position)` and hangs an edge off it
//! back to the caller, labelled with the return RSM state and the SPPF bridging the part of the
//! caller's production consumed so far. Merging all simultaneous stacks into one graph keyed
//! this way is what stops the worklist exploding on ambiguous or left recursive grammars.
//!
//! Two pieces of bookkeeping hang off each node:
//!
//!   * the *popped set*: every SPPF node this GSS node has been popped with. When a new edge
//!     arrives at a node which already popped, the pops are replayed over the new edge, which
//!     is the retroactive completion step the GLL worst case bound rests on;
//!   * `min_weight`: in recovery mode, the cheapest known edit cost of any left context that
//!     reached this node, maintained as a running minimum and used to order recovery work.

use std::hash::Hash;

use fnv::FnvHashMap;
use indexmap::IndexSet;
use num_traits::{PrimInt, Unsigned};

use cfrsm::{RIdx, SIdx};

use input::VIdx;
use sppf::SppfIdx;

/// A type specifically for GSS node indices.
#[derive(Clone, Copy, Debug, Hash, Eq, Ord, PartialEq, PartialOrd)]
pub struct GssIdx(u32);

impl From<GssIdx> for usize {
    fn from(gss_idx: GssIdx) -> usize {
        gss_idx.0 as usize
    }
}

/// One return edge of a GSS node: when the callee completes, control resumes in `ret_state`
/// over the caller's GSS node `target`, with `bridge` holding the caller's production prefix
/// (absent when the call was the first symbol of the production).
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct GssEdge<StorageT> {
    ret_state: SIdx<StorageT>,
    bridge: Option<SppfIdx>,
    target: GssIdx
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> GssEdge<StorageT> {
    pub fn ret_state(&self) -> SIdx<StorageT> {
        self.ret_state
    }

    pub fn bridge(&self) -> Option<SppfIdx> {
        self.bridge
    }

    pub fn target(&self) -> GssIdx {
        self.target
    }
}

#[derive(Clone, Debug)]
pub struct GssNode<StorageT> {
    rule: RIdx<StorageT>,
    pos: VIdx,
    min_weight: u32,
    edges: IndexSet<GssEdge<StorageT>>,
    popped: IndexSet<SppfIdx>
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> GssNode<StorageT> {
    pub fn rule(&self) -> RIdx<StorageT> {
        self.rule
    }

    pub fn position(&self) -> VIdx {
        self.pos
    }

    /// The cheapest edit cost of any left context known to reach this node; 0 outside
    /// recovery mode.
    pub fn min_weight(&self) -> u32 {
        self.min_weight
    }

    pub fn edges<'a>(&'a self) -> impl Iterator<Item = &'a GssEdge<StorageT>> + 'a {
        self.edges.iter()
    }

    pub fn popped<'a>(&'a self) -> impl Iterator<Item = SppfIdx> + 'a {
        self.popped.iter().cloned()
    }
}

/// The GSS arena plus its deduplication table.
#[derive(Debug)]
pub struct GssStore<StorageT> {
    nodes: Vec<GssNode<StorageT>>,
    ids: FnvHashMap<(RIdx<StorageT>, VIdx), GssIdx>,
    // Recovery only: for each SPPF node used as a call bridge, the (caller, callee) GSS pairs
    // whose min_weight was derived from its weight, so that a later weight decrease on the
    // bridge can be replayed onto the callee.
    weight_refs: FnvHashMap<SppfIdx, Vec<(GssIdx, GssIdx)>>
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> GssStore<StorageT> {
    pub fn new() -> Self {
        GssStore {
            nodes: Vec::new(),
            ids: FnvHashMap::default(),
            weight_refs: FnvHashMap::default()
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, gss_idx: GssIdx) -> &GssNode<StorageT> {
        &self.nodes[usize::from(gss_idx)]
    }

    pub fn min_weight(&self, gss_idx: GssIdx) -> u32 {
        self.nodes[usize::from(gss_idx)].min_weight
    }

    /// Locate or create the GSS node `(ridx, pos)`. `weight` is the edit cost of the left
    /// context making this call; re-creation keeps the minimum ever seen.
    pub fn get_or_create(&mut self, ridx: RIdx<StorageT>, pos: VIdx, weight: u32) -> GssIdx {
        if let Some(&v) = self.ids.get(&(ridx, pos)) {
            let n = &mut self.nodes[usize::from(v)];
            if weight < n.min_weight {
                n.min_weight = weight;
            }
            return v;
        }
        assert!(self.nodes.len() < u32::max_value() as usize);
        let v = GssIdx(self.nodes.len() as u32);
        self.nodes.push(GssNode {
            rule: ridx,
            pos,
            min_weight: weight,
            edges: IndexSet::new(),
            popped: IndexSet::new()
        });
        self.ids.insert((ridx, pos), v);
        v
    }

    /// Add the return edge `v --(ret_state, bridge)--> target`. Returns `true` if the edge is
    /// new; the caller must then replay `v`'s popped set over it.
    pub fn add_edge(
        &mut self,
        v: GssIdx,
        ret_state: SIdx<StorageT>,
        bridge: Option<SppfIdx>,
        target: GssIdx
    ) -> bool {
        self.nodes[usize::from(v)].edges.insert(GssEdge {
            ret_state,
            bridge,
            target
        })
    }

    /// Snapshot of `v`'s return edges. A pop enqueues work while walking these, so the caller
    /// needs them detached from the store.
    pub fn edges_vec(&self, v: GssIdx) -> Vec<GssEdge<StorageT>> {
        self.nodes[usize::from(v)].edges.iter().cloned().collect()
    }

    /// Record that `v` was popped with SPPF node `sppf_idx`. Returns `true` the first time
    /// this pairing is seen; repeats need no replay, since edges added after the first pop
    /// perform their own retroactive completion.
    pub fn record_pop(&mut self, v: GssIdx, sppf_idx: SppfIdx) -> bool {
        self.nodes[usize::from(v)].popped.insert(sppf_idx)
    }

    /// Snapshot of the SPPF nodes `v` has popped with.
    pub fn popped_vec(&self, v: GssIdx) -> Vec<SppfIdx> {
        self.nodes[usize::from(v)].popped.iter().cloned().collect()
    }

    /// Recovery only: remember that `callee`'s `min_weight` was derived from `bridge`'s
    /// weight on behalf of `caller`.
    pub fn record_weight_ref(&mut self, bridge: SppfIdx, caller: GssIdx, callee: GssIdx) {
        self.weight_refs
            .entry(bridge)
            .or_insert_with(Vec::new)
            .push((caller, callee));
    }

    /// Recovery only: `bridge`'s weight fell to `new_weight`; lower the `min_weight` of every
    /// GSS node derived from it accordingly.
    pub fn on_weight_decrease(&mut self, bridge: SppfIdx, new_weight: u32) {
        let refs = match self.weight_refs.get(&bridge) {
            Some(refs) => refs.clone(),
            None => return
        };
        for (caller, callee) in refs {
            let cand = self.nodes[usize::from(caller)].min_weight + new_weight;
            let n = &mut self.nodes[usize::from(callee)];
            if cand < n.min_weight {
                n.min_weight = cand;
            }
        }
    }
}
