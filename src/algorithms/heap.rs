//! Indexed binary min-heap with decrease-key
//!
//! Keys are `f64` priorities compared with `total_cmp`; ties break on the
//! smaller node index so peeling order is deterministic.

const ABSENT: usize = usize::MAX;

#[derive(Debug, Clone)]
pub(crate) struct IndexedMinHeap {
    heap: Vec<u32>,
    position: Vec<usize>,
    keys: Vec<f64>,
}

impl IndexedMinHeap {
    /// Build a heap over `entries` for a universe of `capacity` node indices
    pub(crate) fn from_entries(
        capacity: usize,
        entries: impl IntoIterator<Item = (u32, f64)>,
    ) -> Self {
        let mut heap = Vec::new();
        let mut position = vec![ABSENT; capacity];
        let mut keys = vec![0.0; capacity];
        for (node, key) in entries {
            let idx = node as usize;
            if position[idx] != ABSENT {
                continue;
            }
            position[idx] = heap.len();
            keys[idx] = key;
            heap.push(node);
        }

        let mut this = Self {
            heap,
            position,
            keys,
        };
        for slot in (0..this.heap.len() / 2).rev() {
            this.sift_down(slot);
        }
        this
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub(crate) fn contains(&self, node: u32) -> bool {
        self.position
            .get(node as usize)
            .is_some_and(|&slot| slot != ABSENT)
    }

    #[cfg(test)]
    pub(crate) fn key(&self, node: u32) -> Option<f64> {
        self.contains(node).then(|| self.keys[node as usize])
    }

    /// Remove and return the minimum `(node, key)`
    pub(crate) fn pop(&mut self) -> Option<(u32, f64)> {
        let last = self.heap.len().checked_sub(1)?;
        self.swap(0, last);
        let node = self.heap.pop()?;
        self.position[node as usize] = ABSENT;
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        Some((node, self.keys[node as usize]))
    }

    /// Lower the key of a queued node; larger keys and absent nodes are ignored
    pub(crate) fn decrease_key(&mut self, node: u32, key: f64) {
        if !self.contains(node) {
            return;
        }
        let idx = node as usize;
        if key.total_cmp(&self.keys[idx]).is_ge() {
            return;
        }
        self.keys[idx] = key;
        self.sift_up(self.position[idx]);
    }

    fn less(&self, a: u32, b: u32) -> bool {
        self.keys[a as usize]
            .total_cmp(&self.keys[b as usize])
            .then(a.cmp(&b))
            .is_lt()
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.heap.swap(i, j);
        self.position[self.heap[i] as usize] = i;
        self.position[self.heap[j] as usize] = j;
    }

    fn sift_up(&mut self, mut slot: usize) {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if !self.less(self.heap[slot], self.heap[parent]) {
                break;
            }
            self.swap(slot, parent);
            slot = parent;
        }
    }

    fn sift_down(&mut self, mut slot: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * slot + 1;
            let right = left + 1;
            let mut smallest = slot;
            if left < len && self.less(self.heap[left], self.heap[smallest]) {
                smallest = left;
            }
            if right < len && self.less(self.heap[right], self.heap[smallest]) {
                smallest = right;
            }
            if smallest == slot {
                break;
            }
            self.swap(slot, smallest);
            slot = smallest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pops_in_key_order() {
        let entries = [(0, 3.0), (1, 1.0), (2, 2.0), (3, 0.5), (4, 4.0)];
        let mut heap = IndexedMinHeap::from_entries(5, entries);
        let order: Vec<u32> = std::iter::from_fn(|| heap.pop().map(|(node, _)| node)).collect();
        assert_eq!(order, vec![3, 1, 2, 0, 4]);
    }

    #[test]
    fn test_ties_break_on_index() {
        let mut heap = IndexedMinHeap::from_entries(3, [(2, 1.0), (0, 1.0), (1, 1.0)]);
        assert_eq!(heap.pop(), Some((0, 1.0)));
        assert_eq!(heap.pop(), Some((1, 1.0)));
        assert_eq!(heap.pop(), Some((2, 1.0)));
        assert_eq!(heap.pop(), None);
    }

    #[test]
    fn test_decrease_key_reorders() {
        let mut heap = IndexedMinHeap::from_entries(3, [(0, 5.0), (1, 6.0), (2, 7.0)]);
        heap.decrease_key(2, 1.0);
        heap.decrease_key(1, 9.0); // increase is ignored
        assert_eq!(heap.key(1), Some(6.0));
        assert_eq!(heap.pop(), Some((2, 1.0)));
        assert_eq!(heap.len(), 2);
        assert!(!heap.contains(2));
        heap.decrease_key(2, 0.0); // absent node is ignored
        assert_eq!(heap.pop(), Some((0, 5.0)));
    }

    #[test]
    fn test_partial_universe() {
        let mut heap = IndexedMinHeap::from_entries(10, [(7, 2.0), (3, 1.0)]);
        assert!(heap.contains(7));
        assert!(!heap.contains(4));
        assert!(!heap.contains(42));
        assert_eq!(heap.pop(), Some((3, 1.0)));
        assert_eq!(heap.pop(), Some((7, 2.0)));
        assert!(heap.is_empty());
    }
}
