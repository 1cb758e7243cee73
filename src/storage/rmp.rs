//! MessagePack file run storage.

use std::fs;
use std::io::{self, prelude::*};
use std::marker::PhantomData;
use std::path::Path;

use super::{init_tmp_directory, RunStorage, RunStorageError};

/// Run stored in an anonymous temporary file.
/// The file is removed by the OS once the handle or the stream created from it is dropped.
pub struct RmpRun {
    file: fs::File,
    len: u64,
}

/// RMP (Rust MessagePack) run storage implementation.
/// It uses MessagePack as a data serialization format.
/// For more information see https://msgpack.org/.
pub struct RmpRunStorage<T> {
    /// Directory to be used to store temporary data.
    tmp_dir: tempfile::TempDir,
    /// Run file read/write buffer size.
    rw_buf_size: Option<usize>,

    item_type: PhantomData<T>,
}

impl<T> RmpRunStorage<T> {
    /// Creates a new storage instance.
    ///
    /// # Arguments
    /// * `tmp_path` - Directory to be used to store temporary data. If paramater is [`None`] default OS temporary
    ///   directory will be used.
    /// * `rw_buf_size` - Run files read/write buffer size.
    pub fn new(tmp_path: Option<&Path>, rw_buf_size: Option<usize>) -> Result<Self, RunStorageError> {
        return Ok(RmpRunStorage {
            tmp_dir: init_tmp_directory(tmp_path)?,
            rw_buf_size,
            item_type: PhantomData,
        });
    }

    /// Directory run files are created in.
    pub fn path(&self) -> &Path {
        self.tmp_dir.path()
    }
}

impl<T> RunStorage<T> for RmpRunStorage<T>
where
    T: serde::ser::Serialize + serde::de::DeserializeOwned,
{
    type Handle = RmpRun;
    type Stream = RmpRunReader<T>;
    type Error = RunStorageError;

    fn persist<I>(&self, items: I) -> Result<Self::Handle, Self::Error>
    where
        I: IntoIterator<Item = Result<T, Self::Error>>,
    {
        let tmp_file = tempfile::tempfile_in(&self.tmp_dir)?;

        let mut run_writer = match self.rw_buf_size {
            Some(buf_size) => io::BufWriter::with_capacity(buf_size, tmp_file.try_clone()?),
            None => io::BufWriter::new(tmp_file.try_clone()?),
        };

        for item in items.into_iter() {
            rmp_serde::encode::write(&mut run_writer, &item?)?;
        }
        run_writer.flush()?;

        let len = tmp_file.metadata()?.len();
        log::debug!("run of {} bytes saved", len);

        return Ok(RmpRun { file: tmp_file, len });
    }

    fn stream(&self, handle: Self::Handle) -> Result<Self::Stream, Self::Error> {
        let RmpRun { mut file, len } = handle;
        file.rewind()?;

        let run_reader = match self.rw_buf_size {
            Some(buf_size) => io::BufReader::with_capacity(buf_size, file),
            None => io::BufReader::new(file),
        };

        return Ok(RmpRunReader {
            reader: Some(run_reader.take(len)),
            item_type: PhantomData,
        });
    }
}

/// MessagePack run reader.
pub struct RmpRunReader<T> {
    reader: Option<io::Take<io::BufReader<fs::File>>>,

    item_type: PhantomData<T>,
}

impl<T> Iterator for RmpRunReader<T>
where
    T: serde::de::DeserializeOwned,
{
    type Item = Result<T, RunStorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        let reader = self.reader.as_mut()?;

        if reader.limit() == 0 {
            // release the file as soon as the run is drained
            self.reader = None;
            return None;
        }

        match rmp_serde::decode::from_read(reader) {
            Ok(result) => Some(Ok(result)),
            Err(err) => {
                self.reader = None;
                Some(Err(RunStorageError::from(err)))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use rstest::*;
    use serde::{Deserialize, Serialize};

    use super::RmpRunStorage;
    use crate::storage::{RunStorage, RunStorageError};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Person {
        name: String,
        age: u8,
    }

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir_in("./").unwrap()
    }

    #[rstest]
    #[case(None)]
    #[case(Some(16))]
    fn test_rmp_run(tmp_dir: tempfile::TempDir, #[case] rw_buf_size: Option<usize>) {
        let storage = RmpRunStorage::new(Some(tmp_dir.path()), rw_buf_size).unwrap();
        let saved = Vec::from_iter(0..100);

        let run = storage.persist(saved.clone().into_iter().map(Ok)).unwrap();

        let restored: Result<Vec<i32>, RunStorageError> = storage.stream(run).unwrap().collect();
        let restored = restored.unwrap();

        assert_eq!(restored, saved);
    }

    #[rstest]
    fn test_rmp_run_custom_type(tmp_dir: tempfile::TempDir) {
        let storage = RmpRunStorage::new(Some(tmp_dir.path()), None).unwrap();
        let saved = vec![
            Person { name: "Alice".to_string(), age: 31 },
            Person { name: "Bob".to_string(), age: 27 },
        ];

        let run = storage.persist(saved.clone().into_iter().map(Ok)).unwrap();
        let mut stream = storage.stream(run).unwrap();

        assert_eq!(stream.next().unwrap().unwrap(), saved[0]);
        assert_eq!(stream.next().unwrap().unwrap(), saved[1]);
        assert!(stream.next().is_none());
        assert!(stream.next().is_none());
    }

    #[rstest]
    fn test_rmp_empty_run(tmp_dir: tempfile::TempDir) {
        let storage = RmpRunStorage::<u64>::new(Some(tmp_dir.path()), None).unwrap();

        let run = storage.persist(Vec::new()).unwrap();
        assert_eq!(storage.stream(run).unwrap().count(), 0);
    }

    #[rstest]
    fn test_rmp_persist_stops_on_error(tmp_dir: tempfile::TempDir) {
        let storage = RmpRunStorage::<u64>::new(Some(tmp_dir.path()), None).unwrap();

        let items = vec![Ok(1), Err(RunStorageError::ParseError("broken".to_string())), Ok(2)];
        match storage.persist(items) {
            Err(RunStorageError::ParseError(err)) => assert_eq!(err, "broken"),
            _ => panic!("parse error expected"),
        }
    }

    #[rstest]
    fn test_rmp_storage_cleanup(tmp_dir: tempfile::TempDir) {
        let storage = RmpRunStorage::<u64>::new(Some(tmp_dir.path()), None).unwrap();
        let storage_path = storage.path().to_path_buf();

        let run = storage.persist((0..10).map(Ok)).unwrap();
        assert!(storage_path.exists());
        // run files are anonymous
        assert_eq!(fs::read_dir(&storage_path).unwrap().count(), 0);

        drop(run);
        drop(storage);
        assert!(!storage_path.exists());
    }
}
