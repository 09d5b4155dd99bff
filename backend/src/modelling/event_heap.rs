//! Min-heap of scheduled events

use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Min-heap: `first()` is the smallest element
///
/// Two heaps are equal when they hold the same multiset of elements,
/// whatever order they were pushed in.
///
/// # Example
/// ```
/// use decision_simulator_core_rs::modelling::EventHeap;
///
/// let mut heap = EventHeap::new();
/// heap.push((105, "repair done"));
/// heap.push((8, "arrival"));
/// heap.push((23, "departure"));
///
/// assert_eq!(heap.first(), Some(&(8, "arrival")));
/// assert_eq!(heap.pop(), Some((8, "arrival")));
/// assert_eq!(heap.first(), Some(&(23, "departure")));
/// ```
#[derive(Debug, Clone)]
pub struct EventHeap<T: Ord> {
    heap: BinaryHeap<Reverse<T>>,
}

impl<T: Ord> Default for EventHeap<T> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }
}

impl<T: Ord> EventHeap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: T) {
        self.heap.push(Reverse(event));
    }

    /// Smallest element
    pub fn first(&self) -> Option<&T> {
        self.heap.peek().map(|Reverse(event)| event)
    }

    /// Remove and return the smallest element
    pub fn pop(&mut self) -> Option<T> {
        self.heap.pop().map(|Reverse(event)| event)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// All elements, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.heap.iter().map(|Reverse(event)| event)
    }

    fn sorted(&self) -> Vec<&T> {
        let mut items: Vec<&T> = self.iter().collect();
        items.sort();
        items
    }
}

impl<T: Ord> PartialEq for EventHeap<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.sorted() == other.sorted()
    }
}

impl<T: Ord> Eq for EventHeap<T> {}

impl<T: Ord> FromIterator<T> for EventHeap<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            heap: iter.into_iter().map(Reverse).collect(),
        }
    }
}

impl<T: Ord> Extend<T> for EventHeap<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.heap.extend(iter.into_iter().map(Reverse));
    }
}
