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

//! The input side of the engine: a directed graph whose edges are labelled with optional
//! tokens. A token string is the one-path special case; general graphs let the same machinery
//! answer reachability-style queries over graph databases. An edge with no token is an epsilon
//! edge: the parser may traverse it without consuming anything.

use std::hash::Hash;

use num_traits::{PrimInt, Unsigned};
use vob::Vob;

use cfrsm::{RsmState, TIdx};

/// A type specifically for input graph vertex indices.
#[derive(Clone, Copy, Debug, Hash, Eq, Ord, PartialEq, PartialOrd)]
pub struct VIdx(pub u32);

impl From<VIdx> for usize {
    fn from(vidx: VIdx) -> usize {
        vidx.0 as usize
    }
}

/// One outgoing edge of an input vertex. `token` is `None` for epsilon edges.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InputEdge<StorageT> {
    token: Option<TIdx<StorageT>>,
    head: VIdx
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> InputEdge<StorageT> {
    pub fn new(token: Option<TIdx<StorageT>>, head: VIdx) -> Self {
        InputEdge { token, head }
    }

    pub fn token(&self) -> Option<TIdx<StorageT>> {
        self.token
    }

    pub fn head(&self) -> VIdx {
        self.head
    }
}

/// An edge the input graph does not contain, but which the recovery layer is prepared to
/// pretend it does, at a price. A `token` of `None` skips over a real edge without matching it
/// (a deletion); a `token` of `Some(..)` materialises that token out of thin air without moving
/// through the graph (an insertion).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SyntheticEdge<StorageT> {
    pub token: Option<TIdx<StorageT>>,
    pub head: VIdx,
    pub weight: u32
}

/// What the engine requires of an input graph. The graph is materialised: edge enumeration may
/// be called many times per vertex and must be cheap and stable.
pub trait InputGraph<StorageT: 'static + Hash + PrimInt + Unsigned> {
    /// The vertices parsing starts from.
    fn start_vertices(&self) -> &[VIdx];

    fn is_start_vertex(&self, vidx: VIdx) -> bool;

    fn is_final_vertex(&self, vidx: VIdx) -> bool;

    /// All outgoing edges of `vidx`, in a fixed order.
    fn edges(&self, vidx: VIdx) -> &[InputEdge<StorageT>];

    /// The synthetic edit edges available at `vidx` when the parser sits in `state`. Only
    /// consulted in recovery mode. The default implementation offers, at cost 1 each, the
    /// deletion of every token-labelled edge leaving `vidx` and the insertion of every token
    /// `state` has an outgoing edge for. Implementations with non-uniform edit costs can
    /// override this.
    fn synthetic_edges(
        &self,
        vidx: VIdx,
        state: &RsmState<StorageT>
    ) -> Vec<SyntheticEdge<StorageT>> {
        let mut out = Vec::new();
        for e in self.edges(vidx) {
            if e.token().is_some() {
                out.push(SyntheticEdge {
                    token: None,
                    head: e.head(),
                    weight: 1
                });
            }
        }
        for tidx in state.tokens() {
            out.push(SyntheticEdge {
                token: Some(tidx),
                head: vidx,
                weight: 1
            });
        }
        out
    }
}

/// A straightforward adjacency-list input graph, suitable both for token strings (see
/// [`from_tokens`](#method.from_tokens)) and for hand-built graph inputs.
#[derive(Clone, Debug)]
pub struct DiGraph<StorageT> {
    edges: Vec<Vec<InputEdge<StorageT>>>,
    starts: Vec<VIdx>,
    start_set: Vob,
    final_set: Vob
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> DiGraph<StorageT> {
    pub fn new() -> Self {
        DiGraph {
            edges: Vec::new(),
            starts: Vec::new(),
            start_set: Vob::new(),
            final_set: Vob::new()
        }
    }

    /// Build the linear graph of a token string: `toks.len() + 1` vertices chained in order,
    /// with the first vertex a start vertex and the last a final vertex.
    pub fn from_tokens(toks: &[TIdx<StorageT>]) -> Self {
        let mut g = DiGraph::new();
        let mut cur = g.add_vertex();
        g.mark_start(cur);
        for &t in toks {
            let next = g.add_vertex();
            g.add_edge(cur, Some(t), next);
            cur = next;
        }
        g.mark_final(cur);
        g
    }

    pub fn add_vertex(&mut self) -> VIdx {
        assert!(self.edges.len() < u32::max_value() as usize);
        let vidx = VIdx(self.edges.len() as u32);
        self.edges.push(Vec::new());
        self.start_set.push(false);
        self.final_set.push(false);
        vidx
    }

    pub fn add_edge(&mut self, from: VIdx, token: Option<TIdx<StorageT>>, to: VIdx) {
        self.edges[usize::from(from)].push(InputEdge::new(token, to));
    }

    /// Replace every outgoing edge of `from`. This is the edit operation incremental
    /// reparsing is built around.
    pub fn set_edges(&mut self, from: VIdx, edges: Vec<InputEdge<StorageT>>) {
        self.edges[usize::from(from)] = edges;
    }

    pub fn mark_start(&mut self, vidx: VIdx) {
        if !self.start_set[usize::from(vidx)] {
            self.start_set.set(usize::from(vidx), true);
            self.starts.push(vidx);
        }
    }

    pub fn mark_final(&mut self, vidx: VIdx) {
        self.final_set.set(usize::from(vidx), true);
    }

    pub fn vertices_len(&self) -> usize {
        self.edges.len()
    }
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> InputGraph<StorageT> for DiGraph<StorageT> {
    fn start_vertices(&self) -> &[VIdx] {
        &self.starts
    }

    fn is_start_vertex(&self, vidx: VIdx) -> bool {
        self.start_set[usize::from(vidx)]
    }

    fn is_final_vertex(&self, vidx: VIdx) -> bool {
        self.final_set[usize::from(vidx)]
    }

    fn edges(&self, vidx: VIdx) -> &[InputEdge<StorageT>] {
        &self.edges[usize::from(vidx)]
    }
}
