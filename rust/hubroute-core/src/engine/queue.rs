use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::results::{ResultId, ResultStore};

#[derive(Clone, Copy, Debug)]
pub struct Key {
    pub sortby: f64,
    pub seq: u64,
    pub id: ResultId,
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool { self.cmp(other) == Ordering::Equal }
}
impl Eq for Key {}
impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}
impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed so the heap pops the smallest key, earliest push first
        other.sortby.total_cmp(&self.sortby).then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Min-queue of results keyed on `sortby`, equal keys in push order.
///
/// A result may be pushed again after it improves; older entries are dropped on pop
/// because their key no longer matches the result.
#[derive(Debug, Default)]
pub struct ResultQueue {
    heap: BinaryHeap<Key>,
    seq: u64,
}

impl ResultQueue {
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, store: &mut ResultStore, id: ResultId) {
        let r = &mut store[id];
        r.queued = true;
        self.seq += 1;
        self.heap.push(Key { sortby: r.sortby, seq: self.seq, id });
    }

    pub fn pop(&mut self, store: &mut ResultStore) -> Option<ResultId> {
        while let Some(key) = self.heap.pop() {
            let r = &mut store[key.id];
            // superseded by a later push or already popped
            if !r.queued || r.sortby.total_cmp(&key.sortby) != Ordering::Equal {
                continue;
            }
            r.queued = false;
            return Some(key.id);
        }
        None
    }

    /// Entries held, stale ones included.
    pub fn len(&self) -> usize { self.heap.len() }
    pub fn is_empty(&self) -> bool { self.heap.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued(store: &mut ResultStore, q: &mut ResultQueue, node: u32, sortby: f64) -> ResultId {
        let id = store.insert(node);
        store[id].sortby = sortby;
        q.push(store, id);
        id
    }

    #[test]
    fn pops_smallest_first_ties_in_push_order() {
        let mut store = ResultStore::new(8);
        let mut q = ResultQueue::new();
        let a = queued(&mut store, &mut q, 1, 5.0);
        let b = queued(&mut store, &mut q, 2, 1.0);
        let c = queued(&mut store, &mut q, 3, 5.0);
        assert_eq!(q.pop(&mut store), Some(b));
        assert_eq!(q.pop(&mut store), Some(a));
        assert_eq!(q.pop(&mut store), Some(c));
        assert_eq!(q.pop(&mut store), None);
        assert!(!store[a].queued);
    }

    #[test]
    fn improved_results_pop_once_at_new_key() {
        let mut store = ResultStore::new(8);
        let mut q = ResultQueue::new();
        let a = queued(&mut store, &mut q, 1, 9.0);
        let b = queued(&mut store, &mut q, 2, 4.0);
        store[a].sortby = 2.0;
        q.push(&mut store, a);
        assert_eq!(q.len(), 3);
        assert_eq!(q.pop(&mut store), Some(a));
        assert_eq!(q.pop(&mut store), Some(b));
        assert_eq!(q.pop(&mut store), None);
    }

    #[test]
    fn repushed_after_pop_is_served_again() {
        let mut store = ResultStore::new(8);
        let mut q = ResultQueue::new();
        let a = queued(&mut store, &mut q, 1, 3.0);
        assert_eq!(q.pop(&mut store), Some(a));
        store[a].sortby = 1.0;
        q.push(&mut store, a);
        assert_eq!(q.pop(&mut store), Some(a));
        assert!(q.is_empty());
    }
}
