//! PendingHeap - min-heap of events keyed by scheduled time
//!
//! Plain data structure with no locking; [`super::DelayScheduler`] wraps it.
//! Entries carry an insertion sequence number so that equal scheduled times
//! pop in the order they were pushed.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug)]
struct HeapEntry<E> {
    due_ns: u64,
    seq: u64,
    item: E,
}

impl<E> PartialEq for HeapEntry<E> {
    fn eq(&self, other: &Self) -> bool {
        self.due_ns == other.due_ns && self.seq == other.seq
    }
}

impl<E> Eq for HeapEntry<E> {}

impl<E> Ord for HeapEntry<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (BinaryHeap is max-heap by default)
        other.due_ns.cmp(&self.due_ns).then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<E> PartialOrd for HeapEntry<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap of items ordered by due time, then insertion order
///
/// # Example
///
/// ```
/// use bidstream_core::scheduler::PendingHeap;
///
/// let mut heap = PendingHeap::new();
/// heap.push(2_000, "late");
/// heap.push(1_000, "early");
///
/// assert_eq!(heap.pop_due(500), None);
/// assert_eq!(heap.pop_due(1_500), Some("early"));
/// assert_eq!(heap.peek_due_time(), Some(2_000));
/// ```
#[derive(Debug)]
pub struct PendingHeap<E> {
    heap: BinaryHeap<HeapEntry<E>>,
    next_seq: u64,
}

impl<E> PendingHeap<E> {
    pub fn new() -> Self {
        Self { heap: BinaryHeap::new(), next_seq: 0 }
    }

    /// Add an item due at `due_ns`; returns `true` if it is now the earliest
    pub fn push(&mut self, due_ns: u64, item: E) -> bool {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(HeapEntry { due_ns, seq, item });
        self.heap.peek().is_some_and(|top| top.seq == seq)
    }

    /// Remove the earliest item regardless of its due time
    pub fn pop(&mut self) -> Option<E> {
        self.heap.pop().map(|entry| entry.item)
    }

    /// Remove the earliest item if it is due at or before `now_ns`
    ///
    /// Nothing else in the heap can be due when the top is not.
    pub fn pop_due(&mut self, now_ns: u64) -> Option<E> {
        match self.heap.peek() {
            Some(entry) if entry.due_ns <= now_ns => self.pop(),
            _ => None,
        }
    }

    pub fn peek(&self) -> Option<&E> {
        self.heap.peek().map(|entry| &entry.item)
    }

    /// Due time of the earliest item
    pub fn peek_due_time(&self) -> Option<u64> {
        self.heap.peek().map(|entry| entry.due_ns)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drop every pending item, returning how many there were
    pub fn clear(&mut self) -> usize {
        let count = self.heap.len();
        self.heap.clear();
        count
    }
}

impl<E> Default for PendingHeap<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_heap_ordering() {
        let mut heap = PendingHeap::new();

        heap.push(3_000, 'c');
        heap.push(1_000, 'a');
        heap.push(2_000, 'b');

        assert_eq!(heap.pop(), Some('a'));
        assert_eq!(heap.pop(), Some('b'));
        assert_eq!(heap.pop(), Some('c'));
        assert_eq!(heap.pop(), None);
    }

    #[test]
    fn test_equal_times_pop_in_insertion_order() {
        let mut heap = PendingHeap::new();
        for i in 0..100 {
            heap.push(5_000, i);
        }
        let order: Vec<i32> = std::iter::from_fn(|| heap.pop()).collect();
        assert_eq!(order, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_push_reports_new_earliest() {
        let mut heap = PendingHeap::new();
        assert!(heap.push(2_000, 1));
        assert!(!heap.push(3_000, 2));
        assert!(!heap.push(2_000, 3), "Tie with the current earliest is not earlier");
        assert!(heap.push(1_000, 4));
    }

    #[test]
    fn test_pop_due_respects_time() {
        let mut heap = PendingHeap::new();
        heap.push(1_000, "a");
        heap.push(2_000, "b");

        assert_eq!(heap.pop_due(999), None);
        assert_eq!(heap.pop_due(1_000), Some("a"));
        assert_eq!(heap.pop_due(1_999), None);
        assert_eq!(heap.len(), 1);
        assert_eq!(heap.pop_due(u64::MAX), Some("b"));
        assert!(heap.is_empty());
    }

    #[test]
    fn test_empty_heap() {
        let mut heap: PendingHeap<u8> = PendingHeap::default();
        assert!(heap.peek().is_none());
        assert!(heap.peek_due_time().is_none());
        assert!(heap.pop().is_none());
        assert!(heap.pop_due(u64::MAX).is_none());
        assert_eq!(heap.clear(), 0);
    }
}
