//! Binary heap merger.

use std::cmp::Ordering;
use std::error::Error;
use std::mem;

use crate::compare::Comparator;
use crate::queue::PriorityQueue;

/// Sorted input positioned at its current item.
struct Cursor<T, I> {
    current: T,
    source: I,
}

impl<T, E, I> Cursor<T, I>
where
    I: Iterator<Item = Result<T, E>>,
{
    /// Positions a cursor at the first item of the source. Returns [`None`] for an empty source.
    fn open(mut source: I) -> Option<Result<Self, E>> {
        match source.next()? {
            Ok(current) => Some(Ok(Cursor { current, source })),
            Err(err) => Some(Err(err)),
        }
    }

    /// Takes the current item moving the cursor to the next one.
    fn advance(self) -> (T, Option<Result<Self, E>>) {
        let Cursor { current, source } = self;
        (current, Cursor::open(source))
    }
}

/// Orders cursors by their current items.
struct CursorComparator<C> {
    compare: C,
}

impl<T, I, C> Comparator<Cursor<T, I>> for CursorComparator<C>
where
    C: Comparator<T>,
{
    fn compare(&self, a: &Cursor<T, I>, b: &Cursor<T, I>) -> Ordering {
        self.compare.compare(&a.current, &b.current)
    }
}

enum MergeState<T, I, C> {
    /// Inputs are not read yet.
    Pending { sources: Vec<I>, compare: C },
    /// Queue holds every cursor that still has an item.
    Merging(PriorityQueue<Cursor<T, I>, CursorComparator<C>>),
    Done,
}

/// Binary heap merger implementation.
/// Merges multiple sorted inputs into a single sorted output.
/// Time complexity is *m* \* log(*n*) in worst case where *m* is the number of items,
/// *n* is the number of chunks (inputs).
///
/// The merger is lazy: inputs are not touched until the first item is requested and no more than
/// one item per input is held at once. Items of the same input keep their relative order, equal items
/// of different inputs are emitted in unspecified order.
///
/// An input error is yielded right after the item that was taken before it, then the merger stops.
pub struct BinaryHeapMerger<T, E, I, C>
where
    E: Error,
    I: Iterator<Item = Result<T, E>>,
    C: Comparator<T>,
{
    state: MergeState<T, I, C>,
    error: Option<E>,
}

impl<T, E, I, C> BinaryHeapMerger<T, E, I, C>
where
    E: Error,
    I: Iterator<Item = Result<T, E>>,
    C: Comparator<T>,
{
    /// Creates an instance of a binary heap merger using chunks as inputs.
    /// Chunk items should be sorted according to `compare` otherwise the result is undefined.
    ///
    /// # Arguments
    /// * `chunks` - Chunks to be merged in a single sorted one
    /// * `compare` - Function to be used to compare items
    pub fn new<S>(chunks: S, compare: C) -> Self
    where
        S: IntoIterator,
        S::Item: IntoIterator<IntoIter = I>,
    {
        let sources = Vec::from_iter(chunks.into_iter().map(|c| c.into_iter()));

        return BinaryHeapMerger {
            state: MergeState::Pending { sources, compare },
            error: None,
        };
    }

    fn init(sources: Vec<I>, compare: C) -> Result<PriorityQueue<Cursor<T, I>, CursorComparator<C>>, E> {
        let mut cursors = Vec::with_capacity(sources.len());
        for source in sources {
            if let Some(cursor) = Cursor::open(source) {
                cursors.push(cursor?);
            }
        }

        return Ok(PriorityQueue::from_source(cursors, CursorComparator { compare }));
    }
}

impl<T, E, I, C> Iterator for BinaryHeapMerger<T, E, I, C>
where
    E: Error,
    I: Iterator<Item = Result<T, E>>,
    C: Comparator<T>,
{
    type Item = Result<T, E>;

    /// Returns the next item from the inputs in ascending order.
    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.error.take() {
            self.state = MergeState::Done;
            return Some(Err(err));
        }

        if let MergeState::Pending { .. } = self.state {
            if let MergeState::Pending { sources, compare } = mem::replace(&mut self.state, MergeState::Done) {
                match Self::init(sources, compare) {
                    Ok(queue) => self.state = MergeState::Merging(queue),
                    Err(err) => return Some(Err(err)),
                }
            }
        }

        let queue = match &mut self.state {
            MergeState::Merging(queue) => queue,
            _ => return None,
        };

        let cursor = match queue.dequeue() {
            Ok(cursor) => cursor,
            Err(_) => {
                // all inputs are exhausted
                self.state = MergeState::Done;
                return None;
            }
        };

        let (item, cursor) = cursor.advance();
        match cursor {
            Some(Ok(cursor)) => queue.enqueue(cursor),
            Some(Err(err)) => self.error = Some(err),
            None => {}
        }

        return Some(Ok(item));
    }
}
