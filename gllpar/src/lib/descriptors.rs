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

//! Descriptors and their scheduler. A descriptor is one unit of pending parser work: an RSM
//! state to stand in, a GSS node to stand on, the SPPF built for the production so far, and an
//! input vertex to stand at. The scheduler keeps two queues: ordinary, cost-free work in a
//! FIFO, and recovery work in buckets served cheapest first. A bucket's key is the weight its
//! descriptors had when admitted; weights can fall afterwards, so the key is an upper bound
//! and the serving order a heuristic. Cheapest-first keeps discovery close to best-first, and
//! the driver drains every bucket, so a descriptor parked under a stale key is served late
//! rather than lost. A descriptor is only ever admitted once; the handled sets are keyed by
//! input vertex so that incremental reparsing can demote exactly the work done at an edited
//! vertex.

use std::collections::{BTreeMap, VecDeque};
use std::hash::Hash;

use fnv::{FnvHashMap, FnvHashSet};
use num_traits::{PrimInt, Unsigned};

use cfrsm::SIdx;

use gss::GssIdx;
use input::VIdx;
use sppf::SppfIdx;

/// One unit of parser work. Equality is over all four components.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct Descriptor<StorageT> {
    state: SIdx<StorageT>,
    gss: GssIdx,
    sppf: Option<SppfIdx>,
    pos: VIdx
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> Descriptor<StorageT> {
    pub fn new(state: SIdx<StorageT>, gss: GssIdx, sppf: Option<SppfIdx>, pos: VIdx) -> Self {
        Descriptor {
            state,
            gss,
            sppf,
            pos
        }
    }

    pub fn state(&self) -> SIdx<StorageT> {
        self.state
    }

    pub fn gss(&self) -> GssIdx {
        self.gss
    }

    pub fn sppf(&self) -> Option<SppfIdx> {
        self.sppf
    }

    pub fn pos(&self) -> VIdx {
        self.pos
    }
}

/// The two-queue descriptor scheduler.
#[derive(Debug)]
pub struct DescriptorStore<StorageT> {
    default_queue: VecDeque<Descriptor<StorageT>>,
    recovery_queues: BTreeMap<u32, VecDeque<Descriptor<StorageT>>>,
    handled: FnvHashMap<VIdx, FnvHashSet<Descriptor<StorageT>>>
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> DescriptorStore<StorageT> {
    pub fn new() -> Self {
        DescriptorStore {
            default_queue: VecDeque::new(),
            recovery_queues: BTreeMap::new(),
            handled: FnvHashMap::default()
        }
    }

    /// Schedule `d` unless it has already been handled. Weight 0 goes to the default FIFO;
    /// anything dearer to the recovery bucket for its weight. Returns `true` if `d` was
    /// enqueued.
    pub fn add(&mut self, d: Descriptor<StorageT>, weight: u32) -> bool {
        if self.is_handled(&d) {
            return false;
        }
        if weight == 0 {
            self.default_queue.push_back(d);
        } else {
            self.recovery_queues
                .entry(weight)
                .or_insert_with(VecDeque::new)
                .push_back(d);
        }
        true
    }

    /// The next descriptor to run: default-queue work until it dries up and then, only if the
    /// caller permits, the cheapest recovery work.
    pub fn next(&mut self, allow_recovery: bool) -> Option<Descriptor<StorageT>> {
        if let Some(d) = self.default_queue.pop_front() {
            return Some(d);
        }
        if !allow_recovery {
            return None;
        }
        let weight = match self.recovery_queues.keys().next() {
            Some(&weight) => weight,
            None => return None
        };
        let (d, empty) = {
            let q = self.recovery_queues.get_mut(&weight).unwrap();
            (q.pop_front(), q.is_empty())
        };
        if empty {
            self.recovery_queues.remove(&weight);
        }
        d
    }

    pub fn is_handled(&self, d: &Descriptor<StorageT>) -> bool {
        self.handled.get(&d.pos).map_or(false, |s| s.contains(d))
    }

    pub fn mark_handled(&mut self, d: &Descriptor<StorageT>) {
        self.handled
            .entry(d.pos)
            .or_insert_with(FnvHashSet::default)
            .insert(*d);
    }

    /// Demote everything handled at `vidx` back to pending, returning the demoted
    /// descriptors so the caller can recompute their weights and re-admit them.
    pub fn drain_handled_at(&mut self, vidx: VIdx) -> Vec<Descriptor<StorageT>> {
        match self.handled.remove(&vidx) {
            Some(set) => set.into_iter().collect(),
            None => Vec::new()
        }
    }

    /// Is any work pending at all (in either queue)?
    pub fn has_pending(&self) -> bool {
        !self.default_queue.is_empty() || !self.recovery_queues.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::{Descriptor, DescriptorStore};
    use cfrsm::SIdx;
    use gss::GssStore;
    use input::VIdx;

    fn d(state: u32, pos: u32, gss: &mut GssStore<u32>) -> Descriptor<u32> {
        let g = gss.get_or_create(::cfrsm::RIdx(0), VIdx(pos), 0);
        Descriptor::new(SIdx(state), g, None, VIdx(pos))
    }

    #[test]
    fn test_default_before_recovery() {
        let mut gss = GssStore::new();
        let mut ds = DescriptorStore::new();
        let d1 = d(0, 0, &mut gss);
        let d2 = d(1, 0, &mut gss);
        let d3 = d(2, 0, &mut gss);
        assert!(ds.add(d2, 2));
        assert!(ds.add(d1, 0));
        assert!(ds.add(d3, 1));

        // Default work first; then recovery buckets, cheapest first.
        assert_eq!(ds.next(true), Some(d1));
        assert_eq!(ds.next(true), Some(d3));
        assert_eq!(ds.next(true), Some(d2));
        assert_eq!(ds.next(true), None);
    }

    #[test]
    fn test_recovery_gated() {
        let mut gss = GssStore::new();
        let mut ds = DescriptorStore::new();
        let d1 = d(0, 0, &mut gss);
        ds.add(d1, 3);
        assert_eq!(ds.next(false), None);
        assert!(ds.has_pending());
        assert_eq!(ds.next(true), Some(d1));
        assert!(!ds.has_pending());
    }

    #[test]
    fn test_handled_blocks_readmission() {
        let mut gss = GssStore::new();
        let mut ds = DescriptorStore::new();
        let d1 = d(0, 0, &mut gss);
        ds.mark_handled(&d1);
        assert!(ds.is_handled(&d1));
        assert!(!ds.add(d1, 0));
        assert_eq!(ds.next(true), None);
    }

    #[test]
    fn test_restore_demotes_by_position() {
        let mut gss = GssStore::new();
        let mut ds = DescriptorStore::new();
        let d1 = d(0, 1, &mut gss);
        let d2 = d(1, 1, &mut gss);
        let d3 = d(2, 2, &mut gss);
        ds.mark_handled(&d1);
        ds.mark_handled(&d2);
        ds.mark_handled(&d3);

        let mut demoted = ds.drain_handled_at(VIdx(1));
        demoted.sort_by_key(|d| u32::from(d.state().as_storaget()));
        assert_eq!(demoted, vec![d1, d2]);
        assert!(!ds.is_handled(&d1));
        assert!(ds.is_handled(&d3));
        // Demoted work is admissible again.
        assert!(ds.add(d1, 0));
    }
}
