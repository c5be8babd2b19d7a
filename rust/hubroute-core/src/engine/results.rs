//! Per-search node state.
//!
//! Results live in fixed-size slabs that are only ever appended to, so a `ResultId`
//! stays valid for the life of the store. Lookup by node goes through a power-of-two
//! number of bins keyed on the low bits of the node index.

use std::ops::{Index, IndexMut};

use crate::models::{NodeIndex, SegmentIndex, NO_NODE, NO_SEGMENT};

const SLAB_FACTOR: usize = 64;

/// Handle to a result inside one `ResultStore`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResultId(u32);

impl ResultId {
    #[inline]
    pub fn position(self) -> usize { self.0 as usize }
}

/// Search state of one node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeResult {
    pub node: NodeIndex,
    /// Segment used to arrive here, `NO_SEGMENT` at the origin.
    pub segment: SegmentIndex,
    pub prev: Option<ResultId>,
    pub next: Option<ResultId>,
    pub score: f64,
    pub sortby: f64,
    pub queued: bool,
}

impl NodeResult {
    fn empty(node: NodeIndex) -> Self {
        Self { node, segment: NO_SEGMENT, prev: None, next: None, score: 0.0, sortby: 0.0, queued: false }
    }
}

#[derive(Clone, Debug)]
pub struct ResultStore {
    /// Node the search started from.
    pub start: NodeIndex,
    /// Node the search was aiming for, `NO_NODE` for outward searches.
    pub finish: NodeIndex,
    mask: u32,
    slab_size: usize,
    slabs: Vec<Vec<NodeResult>>,
    bins: Vec<Vec<ResultId>>,
    len: usize,
}

/// Highest power of two not above `hint`, at least 1.
fn bin_count(hint: usize) -> usize {
    if hint <= 1 {
        1
    } else {
        1 << (usize::BITS - 1 - hint.leading_zeros())
    }
}

impl ResultStore {
    pub fn new(bins_hint: usize) -> Self {
        let nbins = bin_count(bins_hint);
        let slab_size = nbins * SLAB_FACTOR;
        Self {
            start: NO_NODE,
            finish: NO_NODE,
            mask: (nbins - 1) as u32,
            slab_size,
            slabs: vec![Vec::with_capacity(slab_size)],
            bins: vec![Vec::new(); nbins],
            len: 0,
        }
    }

    pub fn bins(&self) -> usize { self.bins.len() }
    pub fn len(&self) -> usize { self.len }
    pub fn is_empty(&self) -> bool { self.len == 0 }

    /// Add a zeroed result for `node`. The caller has already checked it is absent.
    pub fn insert(&mut self, node: NodeIndex) -> ResultId {
        let full = self.slabs.last().map_or(true, |s| s.len() == self.slab_size);
        if full {
            self.slabs.push(Vec::with_capacity(self.slab_size));
        }
        let id = ResultId(self.len as u32);
        if let Some(slab) = self.slabs.last_mut() {
            slab.push(NodeResult::empty(node));
        }
        self.bins[(node & self.mask) as usize].push(id);
        self.len += 1;
        id
    }

    pub fn find(&self, node: NodeIndex) -> Option<ResultId> {
        self.bins[(node & self.mask) as usize].iter().rev().copied().find(|&id| self[id].node == node)
    }

    pub fn first(&self) -> Option<ResultId> {
        (self.len > 0).then_some(ResultId(0))
    }

    /// Result inserted after `id`.
    pub fn next_after(&self, id: ResultId) -> Option<ResultId> {
        let next = id.position() + 1;
        (next < self.len).then_some(ResultId(next as u32))
    }

    /// All results in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (ResultId, &NodeResult)> + '_ {
        self.slabs.iter().flatten().enumerate().map(|(i, r)| (ResultId(i as u32), r))
    }

    pub fn get(&self, id: ResultId) -> Option<&NodeResult> {
        let p = id.position();
        self.slabs.get(p / self.slab_size)?.get(p % self.slab_size)
    }

    /// Nodes from `from` onwards along the `next` links.
    pub fn forward_nodes(&self, from: ResultId) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            if out.len() > self.len {
                break;
            }
            out.push(self[id].node);
            cursor = self[id].next;
        }
        out
    }

    /// Nodes from `from` back to the origin along the `prev` links.
    pub fn backward_nodes(&self, from: ResultId) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            if out.len() > self.len {
                break;
            }
            out.push(self[id].node);
            cursor = self[id].prev;
        }
        out
    }
}

impl Index<ResultId> for ResultStore {
    type Output = NodeResult;

    fn index(&self, id: ResultId) -> &NodeResult {
        let p = id.position();
        &self.slabs[p / self.slab_size][p % self.slab_size]
    }
}

impl IndexMut<ResultId> for ResultStore {
    fn index_mut(&mut self, id: ResultId) -> &mut NodeResult {
        let p = id.position();
        &mut self.slabs[p / self.slab_size][p % self.slab_size]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bins_round_down_to_power_of_two() {
        assert_eq!(ResultStore::new(0).bins(), 1);
        assert_eq!(ResultStore::new(1).bins(), 1);
        assert_eq!(ResultStore::new(8).bins(), 8);
        assert_eq!(ResultStore::new(100).bins(), 64);
        assert_eq!(ResultStore::new(2047).bins(), 1024);
    }

    #[test]
    fn handles_stay_valid_across_slabs() {
        // one bin -> slabs of 64
        let mut store = ResultStore::new(1);
        let ids: Vec<_> = (0..200u32).map(|n| store.insert(n * 3)).collect();
        store[ids[5]].score = 42.0;
        assert_eq!(store.len(), 200);
        assert_eq!(store.find(15), Some(ids[5]));
        assert_eq!(store[ids[5]].score, 42.0);
        assert_eq!(store.find(597), Some(ids[199]));
        assert_eq!(store.find(1), None);
        assert_eq!(store.get(ids[199]).map(|r| r.node), Some(597));
    }

    #[test]
    fn iteration_follows_insertion_order() {
        let mut store = ResultStore::new(4);
        for n in [9, 2, 7, 4] {
            store.insert(n);
        }
        let nodes: Vec<_> = store.iter().map(|(_, r)| r.node).collect();
        assert_eq!(nodes, vec![9, 2, 7, 4]);

        let mut walked = Vec::new();
        let mut cursor = store.first();
        while let Some(id) = cursor {
            walked.push(store[id].node);
            cursor = store.next_after(id);
        }
        assert_eq!(walked, nodes);
    }

    #[test]
    fn new_results_are_zeroed() {
        let mut store = ResultStore::new(8);
        let id = store.insert(12);
        let r = store[id];
        assert_eq!((r.segment, r.prev, r.next, r.score, r.queued), (NO_SEGMENT, None, None, 0.0, false));
    }
}
