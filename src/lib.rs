//! `ext-merge-sort` is a rust external merge sort implementation.
//!
//! External sorting is a class of sorting algorithms that can handle massive amounts of data. External sorting
//! is required when the data being sorted do not fit into the main memory (RAM) of a computer and instead must be
//! resided in slower external memory, usually a hard disk drive. During the first pass the input is split into
//! runs that fit in RAM, every run is sorted and persisted. Then groups of runs are merged together pass by pass
//! until a single sorted run is left. For more information see
//! [External Sorting](https://en.wikipedia.org/wiki/External_sorting).
//!
//! # Overview
//!
//! `ext-merge-sort` supports the following features:
//!
//! * **Bounded memory:**
//!   no more than `capacity` items are sorted in memory at once and the merge holds a single item per merged run.
//! * **Configurable fan-in:**
//!   the number of runs merged in one pass is limited by `merge_count`, trading the number of open runs
//!   for the number of passes.
//! * **Storage agnostic:**
//!   runs are persisted through the [`RunStorage`] trait. MessagePack files, text files and in-memory storages
//!   are provided, otherwise you can implement your own.
//! * **Custom ordering:**
//!   items are ordered by a [`Comparator`], which can be any `Fn(&T, &T) -> Ordering`.
//! * **Multithreading support:**
//!   runs can be sorted in a dedicated thread pool.
//!
//! # Example
//!
//! ```no_run
//! use std::fs;
//! use std::io::{self, prelude::*};
//! use std::path;
//!
//! use ext_merge_sort::{ExternalSorterBuilder, NumberedLineComparator, TextRunStorage};
//!
//! fn main() {
//!     let input_reader = io::BufReader::new(fs::File::open("input.txt").unwrap());
//!     let mut output_writer = io::BufWriter::new(fs::File::create("output.txt").unwrap());
//!
//!     let storage = TextRunStorage::<String>::new(Some(path::Path::new("./"))).unwrap();
//!     let sorter = ExternalSorterBuilder::new()
//!         .with_capacity(1000)
//!         .with_merge_count(100)
//!         .build(storage, NumberedLineComparator)
//!         .unwrap();
//!
//!     let sorted = sorter.sort_stream(input_reader.lines()).unwrap();
//!
//!     for item in sorted.map(Result::unwrap) {
//!         output_writer.write_all(format!("{}\n", item).as_bytes()).unwrap();
//!     }
//!     output_writer.flush().unwrap();
//! }
//! ```

pub mod buffer;
pub mod compare;
pub mod merger;
pub mod queue;
pub mod sort;
pub mod storage;

pub use buffer::RunBuffer;
pub use compare::{Comparator, NaturalOrder, NumberedLineComparator, Reversed};
pub use merger::BinaryHeapMerger;
pub use queue::{PriorityQueue, QueueError};
pub use sort::{ConfigError, ExternalSorter, ExternalSorterBuilder, SortError};
pub use storage::{MemoryRunStorage, RmpRunStorage, RunStorage, RunStorageError, TextRunStorage};
