//! In-memory run storage.

use std::cell::Cell;
use std::convert::Infallible;
use std::marker::PhantomData;
use std::vec;

use super::RunStorage;

/// Run kept in memory.
#[derive(Debug)]
pub struct MemoryRun<T> {
    items: Vec<T>,
}

impl<T> MemoryRun<T> {
    /// Number of items in the run.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Checks if the run holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Stores runs in memory. Suitable for tests and inputs that fit in memory anyway.
/// Counts persisted and streamed runs.
pub struct MemoryRunStorage<T> {
    persisted: Cell<usize>,
    streamed: Cell<usize>,

    item_type: PhantomData<T>,
}

impl<T> MemoryRunStorage<T> {
    pub fn new() -> Self {
        MemoryRunStorage {
            persisted: Cell::new(0),
            streamed: Cell::new(0),
            item_type: PhantomData,
        }
    }

    /// Number of runs persisted so far.
    pub fn persisted(&self) -> usize {
        self.persisted.get()
    }

    /// Number of runs streamed so far.
    pub fn streamed(&self) -> usize {
        self.streamed.get()
    }
}

impl<T> Default for MemoryRunStorage<T> {
    fn default() -> Self {
        MemoryRunStorage::new()
    }
}

impl<T> RunStorage<T> for MemoryRunStorage<T> {
    type Handle = MemoryRun<T>;
    type Stream = MemoryRunReader<T>;
    type Error = Infallible;

    fn persist<I>(&self, items: I) -> Result<Self::Handle, Self::Error>
    where
        I: IntoIterator<Item = Result<T, Self::Error>>,
    {
        let items: Result<Vec<T>, Self::Error> = items.into_iter().collect();
        self.persisted.set(self.persisted.get() + 1);

        return Ok(MemoryRun { items: items? });
    }

    fn stream(&self, handle: Self::Handle) -> Result<Self::Stream, Self::Error> {
        self.streamed.set(self.streamed.get() + 1);

        return Ok(MemoryRunReader {
            items: handle.items.into_iter(),
        });
    }
}

/// In-memory run reader.
pub struct MemoryRunReader<T> {
    items: vec::IntoIter<T>,
}

impl<T> Iterator for MemoryRunReader<T> {
    type Item = Result<T, Infallible>;

    fn next(&mut self) -> Option<Self::Item> {
        self.items.next().map(Ok)
    }
}
