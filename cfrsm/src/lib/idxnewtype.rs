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

//! The index newtypes for RSM components. An `Rsm` stores its indices in a user-selectable
//! unsigned type `StorageT` (`u32` unless the user says otherwise), but it is easy to mix
//! "this is a token index" and "this is a state index" up when both are bare integers. The
//! newtypes in this module exist solely to prevent that class of bug; they are guaranteed to
//! be convertible, without loss of precision, to `usize`.

use std::mem::size_of;

use num_traits::{PrimInt, Unsigned};

macro_rules! IdxNewtype {
    ($(#[$attr:meta])* $n: ident) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Debug, Hash, Eq, Ord, PartialEq, PartialOrd)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        pub struct $n<StorageT>(pub StorageT);

        impl<StorageT: PrimInt + Unsigned> From<$n<StorageT>> for usize {
            fn from(idx: $n<StorageT>) -> usize {
                debug_assert!(size_of::<usize>() >= size_of::<StorageT>());
                num_traits::cast(idx.0).unwrap()
            }
        }

        impl<StorageT: PrimInt + Unsigned> From<$n<StorageT>> for u32 {
            fn from(idx: $n<StorageT>) -> u32 {
                debug_assert!(size_of::<u32>() >= size_of::<StorageT>());
                num_traits::cast(idx.0).unwrap()
            }
        }

        impl<StorageT: PrimInt + Unsigned> $n<StorageT> {
            pub fn as_storaget(self) -> StorageT {
                self.0
            }
        }
    }
}

IdxNewtype!(
    /// A type specifically for rule indices. A rule names one automaton of the RSM and plays
    /// the role a nonterminal plays in a CFG.
    RIdx
);

IdxNewtype!(
    /// A type specifically for RSM state indices.
    SIdx
);

IdxNewtype!(
    /// A type specifically for token indices.
    TIdx
);
