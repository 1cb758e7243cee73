//! Text file run storage.

use std::fmt::Display;
use std::fs;
use std::io::{self, prelude::*};
use std::marker::PhantomData;
use std::path::Path;
use std::str::FromStr;

use super::{init_tmp_directory, RunStorage, RunStorageError};

/// Run stored in a named temporary file, one record per line.
pub struct TextRun {
    path: tempfile::TempPath,
}

impl TextRun {
    /// Path to the run file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Stores runs as newline-delimited text files.
///
/// Records are written using their [`Display`] implementation and read back using [`FromStr`].
/// A record rendered with a line break (`\n` or `\r`) is rejected with [`RunStorageError::InvalidRecord`].
/// A run file is deleted as soon as its stream is exhausted, or when the stream or the handle is dropped.
pub struct TextRunStorage<T> {
    tmp_dir: tempfile::TempDir,

    item_type: PhantomData<T>,
}

impl<T> TextRunStorage<T> {
    /// Creates a new storage instance keeping run files in a temporary directory created in `tmp_path`
    /// (default OS temporary directory if [`None`]).
    pub fn new(tmp_path: Option<&Path>) -> Result<Self, RunStorageError> {
        return Ok(TextRunStorage {
            tmp_dir: init_tmp_directory(tmp_path)?,
            item_type: PhantomData,
        });
    }

    /// Directory run files are created in.
    pub fn path(&self) -> &Path {
        self.tmp_dir.path()
    }
}

impl<T> RunStorage<T> for TextRunStorage<T>
where
    T: Display + FromStr,
    T::Err: Display,
{
    type Handle = TextRun;
    type Stream = TextRunReader<T>;
    type Error = RunStorageError;

    fn persist<I>(&self, items: I) -> Result<Self::Handle, Self::Error>
    where
        I: IntoIterator<Item = Result<T, Self::Error>>,
    {
        let tmp_file = tempfile::NamedTempFile::new_in(&self.tmp_dir)?;

        let mut run_writer = io::BufWriter::new(tmp_file.as_file());
        for item in items.into_iter() {
            let record = item?.to_string();
            if record.contains(|c: char| c == '\n' || c == '\r') {
                return Err(RunStorageError::InvalidRecord(record));
            }
            writeln!(run_writer, "{}", record)?;
        }
        run_writer.flush()?;
        drop(run_writer);

        log::debug!("run saved to {}", tmp_file.path().display());

        return Ok(TextRun {
            path: tmp_file.into_temp_path(),
        });
    }

    fn stream(&self, handle: Self::Handle) -> Result<Self::Stream, Self::Error> {
        let file = fs::File::open(&handle.path)?;

        return Ok(TextRunReader {
            inner: Some((io::BufReader::new(file).lines(), handle.path)),
            item_type: PhantomData,
        });
    }
}

/// Text run reader. Deletes the run file once all the lines are read.
pub struct TextRunReader<T> {
    inner: Option<(io::Lines<io::BufReader<fs::File>>, tempfile::TempPath)>,

    item_type: PhantomData<T>,
}

impl<T> Iterator for TextRunReader<T>
where
    T: FromStr,
    T::Err: Display,
{
    type Item = Result<T, RunStorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        let (lines, _) = self.inner.as_mut()?;

        match lines.next() {
            Some(Ok(line)) => Some(T::from_str(&line).map_err(|err| RunStorageError::ParseError(err.to_string()))),
            Some(Err(err)) => Some(Err(RunStorageError::IO(err))),
            None => {
                let (lines, path) = self.inner.take()?;
                drop(lines);
                match path.close() {
                    Ok(()) => None,
                    Err(err) => Some(Err(RunStorageError::IO(err))),
                }
            }
        }
    }
}
