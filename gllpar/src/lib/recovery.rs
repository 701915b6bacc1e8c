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

//! Error recovery support. The recovery machinery itself is spread over the engine: the input
//! graph offers synthetic edit edges, the SPPF accounts for their costs, and the scheduler
//! keeps dear work behind cheap work. What lives here is the user-facing part: the recovery
//! mode switch and, after a recovered parse, the translation of a minimum-weight derivation
//! back into the concrete edit sequence a user can act on.

use std::hash::Hash;

use fnv::FnvHashSet;
use num_traits::{PrimInt, Unsigned};

use cfrsm::TIdx;

use input::VIdx;
use sppf::{SppfIdx, SppfKind, SppfStore};

/// Which error recovery algorithm to use, if any.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RecoveryKind {
    /// No recovery: inputs outside the language parse to no result.
    None,
    /// Explore unit-cost token insertions and deletions until some repair of the input
    /// parses; the result is a parse of minimum total edit cost.
    MinCost
}

/// One concrete edit a recovered parse performed on the input.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParseRepair<StorageT> {
    /// Pretend token `TIdx` occurred at the vertex, consuming nothing.
    Insert(TIdx<StorageT>, VIdx),
    /// Walk the input edge between the two vertices without matching it against anything.
    Delete(VIdx, VIdx)
}

/// Read the edit sequence off a recovered parse: walk one minimum-weight derivation below
/// `root` and report, in input order, every weighted terminal it contains. For a root of
/// weight 0 the result is empty.
pub fn collect_repairs<StorageT: 'static + Hash + PrimInt + Unsigned>(
    sppf: &SppfStore<StorageT>,
    root: SppfIdx
) -> Vec<ParseRepair<StorageT>> {
    let mut out = Vec::new();
    let mut on_path = FnvHashSet::default();
    walk(sppf, root, &mut on_path, &mut out);
    out
}

fn walk<StorageT: 'static + Hash + PrimInt + Unsigned>(
    sppf: &SppfStore<StorageT>,
    n: SppfIdx,
    on_path: &mut FnvHashSet<SppfIdx>,
    out: &mut Vec<ParseRepair<StorageT>>
) {
    let node = sppf.node(n);
    match node.kind() {
        SppfKind::Terminal(token) => {
            if node.weight() > 0 {
                match token {
                    Some(tidx) => out.push(ParseRepair::Insert(tidx, node.left_extent())),
                    None => {
                        out.push(ParseRepair::Delete(node.left_extent(), node.right_extent()))
                    }
                }
            }
        }
        SppfKind::Epsilon => (),
        SppfKind::Symbol(_) | SppfKind::Intermediate(_) => {
            if !on_path.insert(n) {
                return;
            }
            // Follow a cheapest alternative; first in discovery order on a tie. Zero-width
            // cycles cannot carry the minimum, so skip alternatives leading back into the
            // current path.
            let mut chosen = None;
            for q in node.packed_children() {
                if q.weight() == node.weight()
                    && !q.left_child().map_or(false, |l| on_path.contains(&l))
                    && !on_path.contains(&q.right_child())
                {
                    chosen = Some(q);
                    break;
                }
            }
            if let Some(q) = chosen {
                if let Some(l) = q.left_child() {
                    walk(sppf, l, on_path, out);
                }
                walk(sppf, q.right_child(), on_path, out);
            }
            on_path.remove(&n);
        }
    }
}
