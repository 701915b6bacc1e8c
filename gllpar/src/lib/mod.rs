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

//! A GLL parser engine driven by a [cfrsm](../cfrsm/index.html) Recursive State Machine over a
//! directed, labelled input graph. Because the input is a graph rather than a token string, the
//! engine answers graph-shaped questions too: alongside the parse forest it reports every
//! `(start vertex, end vertex)` pair between which the start rule matches.
//!
//! The engine is a worklist fixpoint over *descriptors*, each naming a position in the RSM, a
//! Graph Structured Stack (GSS) node, an optional Shared Packed Parse Forest (SPPF) node, and an
//! input vertex. Sharing in the GSS and SPPF is what bounds the worst case cubically for
//! arbitrary context free grammars, including ambiguous and left recursive ones; see Scott and
//! Johnstone's GLL papers for the underlying algorithm.
//!
//! Two optional modes layer on top:
//!
//!   * *Error recovery* ([`RecoveryKind::MinCost`](enum.RecoveryKind.html)): when the input is
//!     not in the language, synthetic insert/delete edges (each of edit cost 1) are explored on
//!     a secondary queue, and the engine returns a parse of minimal total edit cost, in the
//!     spirit of the Corchuelo et al. family of repair algorithms.
//!   * *Incremental reparsing* ([`Parser::reparse`](parser/struct.Parser.html#method.reparse)):
//!     after a localised edit to one vertex's outgoing edges, previously handled work at that
//!     vertex is replayed and stale forest regions rebuilt, instead of parsing from scratch.
//!
//! Parse failure is not an error: `parse` returns an `Ok` result with no root. Errors are
//! reserved for malformed configurations, such as a generated dispatch table which does not
//! cover a rule the RSM uses.

extern crate cfrsm;
extern crate fnv;
extern crate indexmap;
extern crate num_traits;
extern crate vob;

mod descriptors;
mod gss;
mod input;
mod parser;
mod recovery;
mod sppf;

pub use descriptors::{Descriptor, DescriptorStore};
pub use gss::{GssEdge, GssIdx, GssNode, GssStore};
pub use input::{DiGraph, InputEdge, InputGraph, SyntheticEdge, VIdx};
pub use parser::{NtFn, ParseResult, Parser, ParserError};
pub use recovery::{collect_repairs, ParseRepair, RecoveryKind};
pub use sppf::{PackedNode, SppfIdx, SppfKind, SppfNode, SppfStore};
