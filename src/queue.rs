//! Binary min-heap priority queue.

use std::cmp::Ordering;
use std::error::Error;
use std::fmt;
use std::fmt::Display;

use crate::compare::Comparator;

/// Smallest physical capacity the queue is ever resized to.
pub const MIN_CAPACITY: usize = 4;

/// Priority queue error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The queue has no items.
    Empty,
}

impl Error for QueueError {}

impl Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::Empty => write!(f, "empty queue"),
        }
    }
}

/// Unbounded priority queue based on a binary min-heap.
///
/// Items are ordered by the injected comparator, the smallest one is dequeued first.
/// Items the comparator reports as equal are dequeued in unspecified order.
///
/// The backing array is doubled once the queue becomes half full and halved once the queue
/// occupancy drops to one eighth, so that after shrinking the items still occupy a quarter of it.
pub struct PriorityQueue<T, C> {
    items: Vec<T>,
    capacity: usize,
    compare: C,
}

impl<T, C> PriorityQueue<T, C>
where
    C: Comparator<T>,
{
    /// Creates an empty queue.
    pub fn new(compare: C) -> Self {
        Self::with_capacity(compare, MIN_CAPACITY)
    }

    /// Creates an empty queue with the given initial capacity.
    /// Capacity lower than [`MIN_CAPACITY`] is raised to it.
    pub fn with_capacity(compare: C, capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY);

        PriorityQueue {
            items: Vec::with_capacity(capacity),
            capacity,
            compare,
        }
    }

    /// Creates a queue holding all the items of `source`.
    ///
    /// The heap is built bottom-up in linear time. The queue is left full,
    /// since a queue built from a sequence is usually drained rather than extended.
    pub fn from_source<I>(source: I, compare: C) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let items = Vec::from_iter(source);
        let capacity = items.len().max(MIN_CAPACITY);

        let mut queue = PriorityQueue {
            items,
            capacity,
            compare,
        };
        queue.heapify();

        return queue;
    }

    /// Number of items in the queue.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Checks if the queue holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Size of the backing array.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Adds an item to the queue.
    pub fn enqueue(&mut self, item: T) {
        self.items.push(item);
        self.sift_up(self.items.len() - 1);

        if self.items.len() >= self.capacity / 2 {
            self.resize(self.capacity * 2);
        }
    }

    /// Removes and returns the smallest item.
    ///
    /// Returns [`QueueError::Empty`] if the queue has no items.
    pub fn dequeue(&mut self) -> Result<T, QueueError> {
        if self.items.is_empty() {
            return Err(QueueError::Empty);
        }

        let min = self.items.swap_remove(0);
        self.sift_down(0);

        if self.items.len() <= self.capacity / 8 {
            let capacity = (self.capacity / 2).max(MIN_CAPACITY);
            if capacity < self.capacity {
                self.resize(capacity);
            }
        }

        return Ok(min);
    }

    /// Returns the smallest item without removing it.
    ///
    /// Returns [`QueueError::Empty`] if the queue has no items.
    pub fn peek(&self) -> Result<&T, QueueError> {
        self.items.first().ok_or(QueueError::Empty)
    }

    fn heapify(&mut self) {
        for idx in (0..self.items.len() / 2).rev() {
            self.sift_down(idx);
        }
    }

    fn sift_up(&mut self, mut child: usize) {
        while child > 0 {
            let parent = (child - 1) / 2;
            if self.compare(parent, child) != Ordering::Greater {
                break;
            }
            self.items.swap(parent, child);
            child = parent;
        }
    }

    fn sift_down(&mut self, mut parent: usize) {
        let len = self.items.len();

        loop {
            let mut child = parent * 2 + 1;
            if child >= len {
                break;
            }
            if child + 1 < len && self.compare(child + 1, child) == Ordering::Less {
                child += 1;
            }
            if self.compare(child, parent) != Ordering::Less {
                break;
            }
            self.items.swap(parent, child);
            parent = child;
        }
    }

    fn compare(&self, a: usize, b: usize) -> Ordering {
        self.compare.compare(&self.items[a], &self.items[b])
    }

    fn resize(&mut self, capacity: usize) {
        if capacity > self.items.capacity() {
            self.items.reserve_exact(capacity - self.items.len());
        } else {
            self.items.shrink_to(capacity);
        }
        self.capacity = capacity;
    }
}
