//! External sorter.

use log;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::iter;
use std::marker::PhantomData;

use crate::buffer::RunBuffer;
use crate::compare::Comparator;
use crate::merger::BinaryHeapMerger;
use crate::storage::RunStorage;

/// Default number of items sorted in memory at once.
pub const DEFAULT_CAPACITY: usize = 100_000;
/// Default number of runs merged in one pass.
pub const DEFAULT_MERGE_COUNT: usize = 100;

/// Sorter configuration error.
#[derive(Debug)]
pub enum ConfigError {
    /// Run capacity is less than 1.
    InvalidCapacity(usize),
    /// Merge count is less than 2.
    InvalidMergeCount(usize),
    /// Workers thread pool initialization error.
    ThreadPoolBuildError(rayon::ThreadPoolBuildError),
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            ConfigError::ThreadPoolBuildError(err) => Some(err),
            _ => None,
        }
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            ConfigError::InvalidCapacity(value) => write!(f, "run capacity must be at least 1, got {}", value),
            ConfigError::InvalidMergeCount(value) => write!(f, "merge count must be at least 2, got {}", value),
            ConfigError::ThreadPoolBuildError(err) => write!(f, "thread pool initialization failed: {}", err),
        }
    }
}

/// Sorting error.
#[derive(Debug)]
pub enum SortError<S: Error, I: Error> {
    /// Run storage error.
    StorageError(S),
    /// Input data stream error
    InputError(I),
}

impl<S, I> Error for SortError<S, I>
where
    S: Error + 'static,
    I: Error + 'static,
{
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(match &self {
            SortError::StorageError(err) => err,
            SortError::InputError(err) => err,
        })
    }
}

impl<S: Error, I: Error> Display for SortError<S, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::StorageError(err) => write!(f, "run storage error: {}", err),
            SortError::InputError(err) => write!(f, "input data stream error: {}", err),
        }
    }
}

/// External sorter builder. Provides methods for [`ExternalSorter`] initialization.
#[derive(Debug, Clone)]
pub struct ExternalSorterBuilder {
    /// Maximum number of items sorted in memory at once.
    capacity: usize,
    /// Maximum number of runs merged in one pass.
    merge_count: usize,
    /// Number of threads to be used to sort data in parallel.
    threads_number: Option<usize>,
}

impl ExternalSorterBuilder {
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        ExternalSorterBuilder::default()
    }

    /// Builds an [`ExternalSorter`] instance using provided configuration.
    ///
    /// # Arguments
    /// * `storage` - Storage sorted runs are persisted to
    /// * `compare` - Comparator used to order items
    pub fn build<T, S, C>(self, storage: S, compare: C) -> Result<ExternalSorter<T, S, C>, ConfigError>
    where
        T: Send,
        S: RunStorage<T>,
        C: Comparator<T> + Clone + Sync,
    {
        ExternalSorter::new(storage, compare, self.capacity, self.merge_count, self.threads_number)
    }

    /// Sets maximum number of items sorted in memory at once.
    pub fn with_capacity(mut self, capacity: usize) -> ExternalSorterBuilder {
        self.capacity = capacity;
        return self;
    }

    /// Sets maximum number of runs merged together in one pass.
    pub fn with_merge_count(mut self, merge_count: usize) -> ExternalSorterBuilder {
        self.merge_count = merge_count;
        return self;
    }

    /// Sets number of threads to be used to sort run data in parallel.
    /// Runs are sorted in the calling thread unless it is set.
    pub fn with_threads_number(mut self, threads_number: usize) -> ExternalSorterBuilder {
        self.threads_number = Some(threads_number);
        return self;
    }
}

impl Default for ExternalSorterBuilder {
    fn default() -> Self {
        ExternalSorterBuilder {
            capacity: DEFAULT_CAPACITY,
            merge_count: DEFAULT_MERGE_COUNT,
            threads_number: None,
        }
    }
}

/// External sorter.
///
/// Splits the input into runs of at most `capacity` items, sorts every run in memory and persists it
/// to the storage. Then merges groups of at most `merge_count` runs into single runs pass by pass
/// until only one run is left.
pub struct ExternalSorter<T, S, C>
where
    T: Send,
    S: RunStorage<T>,
    C: Comparator<T> + Clone + Sync,
{
    /// Sorted runs storage.
    storage: S,
    /// Items comparator.
    compare: C,
    /// Maximum number of items sorted in memory at once.
    capacity: usize,
    /// Maximum number of runs merged in one pass.
    merge_count: usize,
    /// Sorting thread pool.
    thread_pool: Option<rayon::ThreadPool>,

    /// Input item type.
    item_type: PhantomData<T>,
}

impl<T, S, C> ExternalSorter<T, S, C>
where
    T: Send,
    S: RunStorage<T>,
    C: Comparator<T> + Clone + Sync,
{
    /// Creates a new external sorter instance.
    ///
    /// # Arguments
    /// * `storage` - Storage sorted runs are persisted to.
    /// * `compare` - Comparator used to order items.
    /// * `capacity` - Maximum number of items sorted in memory at once, at least 1.
    /// * `merge_count` - Maximum number of runs merged together in one pass, at least 2.
    /// * `threads_number` - Number of threads to be used to sort runs in parallel. If the parameter is [`None`]
    ///   runs are sorted in the calling thread.
    pub fn new(
        storage: S,
        compare: C,
        capacity: usize,
        merge_count: usize,
        threads_number: Option<usize>,
    ) -> Result<Self, ConfigError> {
        if capacity < 1 {
            return Err(ConfigError::InvalidCapacity(capacity));
        }
        if merge_count < 2 {
            return Err(ConfigError::InvalidMergeCount(merge_count));
        }

        return Ok(ExternalSorter {
            storage,
            compare,
            capacity,
            merge_count,
            thread_pool: Self::init_thread_pool(threads_number)?,
            item_type: PhantomData,
        });
    }

    fn init_thread_pool(threads_number: Option<usize>) -> Result<Option<rayon::ThreadPool>, ConfigError> {
        let threads_number = match threads_number {
            Some(threads_number) => threads_number,
            None => return Ok(None),
        };

        log::info!("initializing thread-pool (threads: {})", threads_number);
        let thread_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads_number)
            .build()
            .map_err(|err| ConfigError::ThreadPoolBuildError(err))?;

        return Ok(Some(thread_pool));
    }

    /// Storage the sorted runs are persisted to.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Maximum number of items sorted in memory at once.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Maximum number of runs merged together in one pass.
    pub fn merge_count(&self) -> usize {
        self.merge_count
    }

    /// Sorts data from the input.
    /// Returns a handle of the persisted run holding all the input items in sorted order.
    ///
    /// # Arguments
    /// * `input` - Input stream data to be fetched from
    pub fn sort<I, E>(&self, input: I) -> Result<S::Handle, SortError<S::Error, E>>
    where
        I: IntoIterator<Item = Result<T, E>>,
        E: Error,
    {
        let (first, rest) = self.split(input)?;
        log::debug!("external sort preparation done (runs: {})", rest.len() + 1);

        let result = match self.merge(first, rest) {
            Ok(result) => result,
            Err(err) => return Err(SortError::StorageError(err)),
        };
        log::debug!("external sort done");

        return Ok(result);
    }

    /// Sorts data from the input.
    /// Returns an iterator that can be used to get sorted data stream.
    ///
    /// # Arguments
    /// * `input` - Input stream data to be fetched from
    pub fn sort_stream<I, E>(&self, input: I) -> Result<S::Stream, SortError<S::Error, E>>
    where
        I: IntoIterator<Item = Result<T, E>>,
        E: Error,
    {
        let result = self.sort(input)?;
        self.storage.stream(result).map_err(SortError::StorageError)
    }

    /// Splits the input into sorted runs. An empty input still results in a single empty run.
    fn split<I, E>(&self, input: I) -> Result<(S::Handle, Vec<S::Handle>), SortError<S::Error, E>>
    where
        I: IntoIterator<Item = Result<T, E>>,
        E: Error,
    {
        let mut input = input.into_iter();

        let first = self.create_run::<E>(self.fill_buffer(&mut input)?)?;
        let mut rest = Vec::new();
        loop {
            let run_buf = self.fill_buffer(&mut input)?;
            if run_buf.is_empty() {
                break;
            }
            rest.push(self.create_run::<E>(run_buf)?);
        }

        return Ok((first, rest));
    }

    fn fill_buffer<I, E>(&self, input: &mut I) -> Result<RunBuffer<T>, SortError<S::Error, E>>
    where
        I: Iterator<Item = Result<T, E>>,
        E: Error,
    {
        let mut run_buf = RunBuffer::new(self.capacity);
        while !run_buf.is_full() {
            match input.next() {
                Some(Ok(item)) => run_buf.push(item),
                Some(Err(err)) => return Err(SortError::InputError(err)),
                None => break,
            }
        }

        return Ok(run_buf);
    }

    fn create_run<E: Error>(&self, mut buffer: RunBuffer<T>) -> Result<S::Handle, SortError<S::Error, E>> {
        log::debug!("sorting run data (items: {}) ...", buffer.len());
        buffer.sort_by(&self.compare, self.thread_pool.as_ref());

        log::debug!("saving run data");
        self.storage
            .persist(buffer.into_iter().map(Ok))
            .map_err(SortError::StorageError)
    }

    fn merge(&self, mut first: S::Handle, mut rest: Vec<S::Handle>) -> Result<S::Handle, S::Error> {
        let mut pass = 0;

        while !rest.is_empty() {
            pass += 1;
            log::debug!("merge pass {} (runs: {})", pass, rest.len() + 1);

            let mut merged = Vec::with_capacity(rest.len() / self.merge_count);
            let mut pending = iter::once(first).chain(rest);

            // the first group holds at least two runs as merge_count is at least 2
            first = self.merge_group(Vec::from_iter(pending.by_ref().take(self.merge_count)))?;
            loop {
                let group = Vec::from_iter(pending.by_ref().take(self.merge_count));
                match group.len() {
                    0 => break,
                    // a single run is carried to the next pass as is
                    1 => merged.extend(group),
                    _ => merged.push(self.merge_group(group)?),
                }
            }

            rest = merged;
        }

        return Ok(first);
    }

    fn merge_group(&self, group: Vec<S::Handle>) -> Result<S::Handle, S::Error> {
        let streams = group
            .into_iter()
            .map(|run| self.storage.stream(run))
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!("merging {} runs", streams.len());
        self.storage.persist(BinaryHeapMerger::new(streams, self.compare.clone()))
    }
}

#[cfg(test)]
mod test {
    use std::cell::{Cell, RefCell};
    use std::io;

    use rand::seq::SliceRandom;
    use rand::Rng;
    use rstest::*;

    use super::{ConfigError, ExternalSorter, ExternalSorterBuilder, SortError};
    use crate::compare::{Comparator, NaturalOrder, NumberedLineComparator};
    use crate::storage::{MemoryRun, MemoryRunStorage, RmpRunStorage, RunStorage, RunStorageError, TextRunStorage};

    /// Memory storage recording every persisted run.
    struct RecordingStorage {
        inner: MemoryRunStorage<i32>,
        runs: RefCell<Vec<Vec<i32>>>,
    }

    impl RecordingStorage {
        fn new() -> Self {
            RecordingStorage {
                inner: MemoryRunStorage::new(),
                runs: RefCell::new(Vec::new()),
            }
        }
    }

    impl RunStorage<i32> for RecordingStorage {
        type Handle = MemoryRun<i32>;
        type Stream = <MemoryRunStorage<i32> as RunStorage<i32>>::Stream;
        type Error = std::convert::Infallible;

        fn persist<I>(&self, items: I) -> Result<Self::Handle, Self::Error>
        where
            I: IntoIterator<Item = Result<i32, Self::Error>>,
        {
            let items: Result<Vec<i32>, _> = items.into_iter().collect();
            let items = items?;
            self.runs.borrow_mut().push(items.clone());
            self.inner.persist(items.into_iter().map(Ok))
        }

        fn stream(&self, handle: Self::Handle) -> Result<Self::Stream, Self::Error> {
            self.inner.stream(handle)
        }
    }

    /// Storage failing to persist after a number of runs.
    struct FailingStorage {
        inner: MemoryRunStorage<i32>,
        persist_limit: usize,
        streamed: Cell<usize>,
    }

    impl RunStorage<i32> for FailingStorage {
        type Handle = MemoryRun<i32>;
        type Stream = std::vec::IntoIter<Result<i32, io::Error>>;
        type Error = io::Error;

        fn persist<I>(&self, items: I) -> Result<Self::Handle, Self::Error>
        where
            I: IntoIterator<Item = Result<i32, Self::Error>>,
        {
            let items: Vec<i32> = items.into_iter().collect::<Result<_, _>>()?;
            if self.inner.persisted() >= self.persist_limit {
                return Err(io::Error::new(io::ErrorKind::Other, "storage is full"));
            }
            Ok(self.inner.persist(items.into_iter().map(Ok)).unwrap())
        }

        fn stream(&self, handle: Self::Handle) -> Result<Self::Stream, Self::Error> {
            self.streamed.set(self.streamed.get() + 1);
            let items = Vec::from_iter(self.inner.stream(handle).unwrap().map(|item| Ok(item.unwrap())));
            Ok(items.into_iter())
        }
    }

    fn memory_sorter(capacity: usize, merge_count: usize) -> ExternalSorter<i32, MemoryRunStorage<i32>, NaturalOrder> {
        ExternalSorterBuilder::new()
            .with_capacity(capacity)
            .with_merge_count(merge_count)
            .build(MemoryRunStorage::new(), NaturalOrder)
            .unwrap()
    }

    fn sorted<S: RunStorage<i32>, C: Comparator<i32> + Clone + Sync>(
        sorter: &ExternalSorter<i32, S, C>,
        input: Vec<i32>,
    ) -> Vec<i32> {
        let input = input.into_iter().map(Ok::<_, io::Error>);
        let result: Result<Vec<i32>, _> = sorter.sort_stream(input).unwrap().collect();
        result.unwrap()
    }

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir_in("./").unwrap()
    }

    #[test]
    fn test_concrete_scenario() {
        let sorter = ExternalSorterBuilder::new()
            .with_capacity(2)
            .with_merge_count(2)
            .build(RecordingStorage::new(), NaturalOrder)
            .unwrap();

        assert_eq!(sorted(&sorter, vec![5, 3, 3, 1, 4]), vec![1, 3, 3, 4, 5]);

        let runs = sorter.storage().runs.borrow();
        assert_eq!(
            *runs,
            vec![
                vec![3, 5],
                vec![1, 3],
                vec![4],
                vec![1, 3, 3, 5],
                vec![1, 3, 3, 4, 5]
            ]
        );
    }

    #[rstest]
    #[case(1, 2)]
    #[case(4, 4)]
    fn test_empty_input(#[case] capacity: usize, #[case] merge_count: usize) {
        let sorter = memory_sorter(capacity, merge_count);

        assert_eq!(sorted(&sorter, vec![]), Vec::<i32>::new());
        assert_eq!(sorter.storage().persisted(), 1);
        assert_eq!(sorter.storage().streamed(), 1);
    }

    #[test]
    fn test_input_fitting_in_memory() {
        let sorter = memory_sorter(10, 2);

        assert_eq!(sorted(&sorter, vec![3, 1, 2]), vec![1, 2, 3]);
        assert_eq!(sorter.storage().persisted(), 1);
        // only the final run is streamed back
        assert_eq!(sorter.storage().streamed(), 1);
    }

    #[rstest]
    #[case(vec![2, 1, 4, 3], 2)]
    #[case(vec![2, 1, 4, 3, 6, 5], 3)]
    fn test_input_filling_whole_runs(#[case] input: Vec<i32>, #[case] runs: usize) {
        let sorter = memory_sorter(2, 100);
        let mut expected = input.clone();
        expected.sort();

        assert_eq!(sorted(&sorter, input), expected);
        // no trailing empty run
        assert_eq!(sorter.storage().persisted(), runs + 1);
        assert_eq!(sorter.storage().streamed(), runs + 1);
    }

    #[test]
    fn test_merge_passes() {
        let sorter = memory_sorter(1, 3);

        // 7 runs -> 3 runs (the last one carried as is) -> 1 run
        assert_eq!(sorted(&sorter, vec![6, 0, 5, 1, 4, 2, 3]), Vec::from_iter(0..7));
        assert_eq!(sorter.storage().persisted(), 7 + 2 + 1);
        assert_eq!(sorter.storage().streamed(), 6 + 3 + 1);
    }

    #[rstest]
    #[case(1, 2)]
    #[case(1, 100)]
    #[case(3, 2)]
    #[case(7, 3)]
    #[case(16, 5)]
    #[case(1000, 2)]
    fn test_insensitive_to_configuration(#[case] capacity: usize, #[case] merge_count: usize) {
        let mut rng = rand::thread_rng();
        let input = Vec::from_iter((0..500).map(|_| rng.gen_range(-100..100)));
        let mut expected = input.clone();
        expected.sort();

        assert_eq!(sorted(&memory_sorter(capacity, merge_count), input), expected);
    }

    #[test]
    fn test_sorted_input_is_unchanged() {
        let input = Vec::from_iter((0..50).map(|x| x / 3));
        assert_eq!(sorted(&memory_sorter(1, 2), input.clone()), input);
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn test_external_sorter(tmp_dir: tempfile::TempDir, #[case] reversed: bool) {
        let input_sorted = 0..100;

        let mut input_shuffled = Vec::from_iter(input_sorted.clone());
        input_shuffled.shuffle(&mut rand::thread_rng());

        let input: Vec<Result<i32, io::Error>> = Vec::from_iter(input_shuffled.into_iter().map(|item| Ok(item)));

        let compare = if reversed {
            |a: &i32, b: &i32| a.cmp(b).reverse()
        } else {
            |a: &i32, b: &i32| a.cmp(b)
        };

        let sorter = ExternalSorterBuilder::new()
            .with_capacity(8)
            .with_merge_count(3)
            .with_threads_number(2)
            .build(RmpRunStorage::new(Some(tmp_dir.path()), None).unwrap(), compare)
            .unwrap();

        let result = sorter.sort_stream(input).unwrap();

        let actual_result: Result<Vec<i32>, _> = result.collect();
        let actual_result = actual_result.unwrap();
        let expected_result = if reversed {
            Vec::from_iter(input_sorted.clone().rev())
        } else {
            Vec::from_iter(input_sorted.clone())
        };

        assert_eq!(actual_result, expected_result)
    }

    #[rstest]
    fn test_external_sorter_numbered_lines(tmp_dir: tempfile::TempDir) {
        let input = vec![
            "415.Apple",
            "30432.Something something something",
            "1.Apple",
            "32.Cherry is the best",
            "2.Banana is yellow",
            "7.apple",
        ];
        let input = input.into_iter().map(|line| Ok::<_, io::Error>(line.to_string()));

        let sorter = ExternalSorterBuilder::new()
            .with_capacity(2)
            .with_merge_count(2)
            .build(TextRunStorage::new(Some(tmp_dir.path())).unwrap(), NumberedLineComparator)
            .unwrap();

        let result: Result<Vec<String>, RunStorageError> = sorter.sort_stream(input).unwrap().collect();
        assert_eq!(
            result.unwrap(),
            vec![
                "1.Apple",
                "7.apple",
                "415.Apple",
                "2.Banana is yellow",
                "32.Cherry is the best",
                "30432.Something something something",
            ]
        );
        // every intermediate run file is removed once merged
        assert_eq!(std::fs::read_dir(sorter.storage().path()).unwrap().count(), 0);
    }

    #[rstest]
    fn test_numbered_lines_with_unparsable_prefixes(tmp_dir: tempfile::TempDir) {
        let input = vec!["1x.a", "99999999999999999999.a", "2.a", "x.a", "10.a"];
        let input = input.into_iter().map(|line| Ok::<_, io::Error>(line.to_string()));

        let sorter = ExternalSorterBuilder::new()
            .with_capacity(1)
            .with_merge_count(2)
            .build(TextRunStorage::new(Some(tmp_dir.path())).unwrap(), NumberedLineComparator)
            .unwrap();

        let result: Result<Vec<String>, RunStorageError> = sorter.sort_stream(input).unwrap().collect();
        assert_eq!(
            result.unwrap(),
            vec!["2.a", "10.a", "1x.a", "99999999999999999999.a", "x.a"]
        );
    }

    #[rstest]
    #[case(0, 2, "run capacity must be at least 1, got 0")]
    #[case(1, 1, "merge count must be at least 2, got 1")]
    #[case(1, 0, "merge count must be at least 2, got 0")]
    fn test_invalid_configuration(#[case] capacity: usize, #[case] merge_count: usize, #[case] message: &str) {
        let result = ExternalSorterBuilder::new()
            .with_capacity(capacity)
            .with_merge_count(merge_count)
            .build(MemoryRunStorage::<i32>::new(), NaturalOrder);

        match result {
            Err(err @ ConfigError::InvalidCapacity(_)) | Err(err @ ConfigError::InvalidMergeCount(_)) => {
                assert_eq!(err.to_string(), message)
            }
            _ => panic!("configuration error expected"),
        }
    }

    #[test]
    fn test_input_error() {
        let sorter = memory_sorter(2, 2);
        let input = vec![Ok(1), Ok(2), Ok(3), Err(io::Error::new(io::ErrorKind::Other, "broken input"))];

        match sorter.sort(input) {
            Err(SortError::InputError(err)) => assert_eq!(err.to_string(), "broken input"),
            _ => panic!("input error expected"),
        }
    }

    #[rstest]
    #[case(0)]
    #[case(2)]
    #[case(3)]
    fn test_storage_error(#[case] persist_limit: usize) {
        let storage = FailingStorage {
            inner: MemoryRunStorage::new(),
            persist_limit,
            streamed: Cell::new(0),
        };
        let sorter = ExternalSorterBuilder::new()
            .with_capacity(1)
            .with_merge_count(2)
            .build(storage, NaturalOrder)
            .unwrap();

        let input = vec![3, 2, 1].into_iter().map(Ok::<_, io::Error>);
        match sorter.sort(input) {
            Err(err @ SortError::StorageError(_)) => {
                assert_eq!(err.to_string(), "run storage error: storage is full")
            }
            _ => panic!("storage error expected"),
        }
        // split phase failures never read runs back
        if persist_limit < 3 {
            assert_eq!(sorter.storage().streamed.get(), 0);
        }
    }

    #[test]
    fn test_builder_defaults() {
        let sorter = ExternalSorterBuilder::new()
            .build(MemoryRunStorage::<i32>::new(), NaturalOrder)
            .unwrap();

        assert_eq!(sorter.capacity(), super::DEFAULT_CAPACITY);
        assert_eq!(sorter.merge_count(), super::DEFAULT_MERGE_COUNT);
    }
}
