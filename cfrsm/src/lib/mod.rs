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

//! A library for representing Recursive State Machines (RSMs). An RSM is a set of finite
//! automata, one per grammar rule, where edges are labelled either by tokens or by calls to
//! other rules; it is equivalent in recognising power to a context free grammar, and is the
//! form a GLL-style parser consumes directly.
//!
//! Grammar terminology is not homogeneous across tools and papers, so this library fixes the
//! following:
//!
//!   * A *token* is the name of a terminal syntactic element.
//!   * A *rule* maps a name to an automaton; a rule plays the role a nonterminal plays in a
//!     textbook CFG.
//!   * A *state* belongs to exactly one rule. Exactly one state per rule is its start state;
//!     any number of states may be final. A path from a rule's start state to a final state
//!     spells out one production of that rule.
//!
//! cfrsm makes the following guarantees about a built [`Rsm`](rsm/struct.Rsm.html):
//!
//!   * Rules are numbered from `0` to `rules_len() - 1` (inclusive).
//!   * Tokens are numbered from `0` to `tokens_len() - 1` (inclusive).
//!   * States are numbered from `0` to `states_len() - 1` (inclusive).
//!   * The `StorageT` type used to store rule, token, and state indices can be infallibly
//!     converted into `usize` (see [`TIdx`](struct.TIdx.html) and friends for more details).
//!   * Edge enumeration order on a state is the order in which the edges were declared, so
//!     downstream consumers that must tie-break deterministically can rely on it.
//!
//! For most uses, the entry point is [`RsmBuilder`](rsm/struct.RsmBuilder.html).

extern crate indexmap;
extern crate num_traits;
#[cfg(feature = "serde")]
#[macro_use]
extern crate serde;
extern crate vob;

mod idxnewtype;
pub mod rsm;

pub use idxnewtype::{RIdx, SIdx, TIdx};
pub use rsm::{Rsm, RsmBuildError, RsmBuilder, RsmState, Rule};

/// An RSM edge label, or one element of a production's right-hand side.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Symbol<StorageT> {
    Rule(RIdx<StorageT>),
    Token(TIdx<StorageT>)
}
