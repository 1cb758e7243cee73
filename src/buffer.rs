//! Limited run buffer.

use rayon;
use rayon::slice::ParallelSliceMut;

use crate::compare::Comparator;

/// In-memory buffer collecting the items of a single run.
/// The buffer is limited by items count.
pub struct RunBuffer<T> {
    limit: usize,
    inner: Vec<T>,
}

impl<T> RunBuffer<T> {
    /// Creates an empty buffer holding at most `limit` items.
    pub fn new(limit: usize) -> Self {
        RunBuffer {
            limit,
            inner: Vec::new(),
        }
    }

    /// Adds a new element to the buffer.
    pub fn push(&mut self, item: T) {
        self.inner.push(item);
    }

    /// Returns buffer length
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Checks if the buffer holds no items.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Checks if the buffer reached the limit.
    pub fn is_full(&self) -> bool {
        self.inner.len() >= self.limit
    }

    /// Sorts the buffer items. Sorting is performed in the thread pool if it is provided.
    pub fn sort_by<C>(&mut self, compare: &C, thread_pool: Option<&rayon::ThreadPool>)
    where
        T: Send,
        C: Comparator<T> + Sync,
    {
        match thread_pool {
            Some(thread_pool) => thread_pool.install(|| {
                self.inner.par_sort_by(|a, b| compare.compare(a, b));
            }),
            None => self.inner.sort_by(|a, b| compare.compare(a, b)),
        }
    }
}

impl<T> IntoIterator for RunBuffer<T> {
    type Item = T;
    type IntoIter = <Vec<T> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}
