//! The pull-based batch contract
//!
//! Operators above the core pull [`Batch`]es from a [`Puller`]. Format
//! readers and writers expose the simpler one-value-at-a-time
//! [`ValueReader`] and [`ValueWriter`]; [`ReaderPuller`] adapts the former
//! into the batch world.

use crate::error::Result;
use crate::value::Value;

/// Default number of values a [`ReaderPuller`] gathers per batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// An ordered group of values pulled together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    values: Vec<Value>,
}

impl Batch {
    /// Wrap a vector of values.
    pub fn new(values: Vec<Value>) -> Self {
        Batch { values }
    }

    /// The values.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Take the values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the batch holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A source of batches.
pub trait Puller {
    /// Pull the next batch, or `None` at end of stream.
    ///
    /// A consumer that needs no more input passes `done = true`; the puller
    /// releases its input and returns `None`.
    fn pull(&mut self, done: bool) -> Result<Option<Batch>>;
}

/// A source of single values.
pub trait ValueReader {
    /// Read the next value, or `None` at end of stream.
    fn read(&mut self) -> Result<Option<Value>>;
}

/// A sink of single values.
pub trait ValueWriter {
    /// Write one value.
    fn write(&mut self, value: &Value) -> Result<()>;
}

impl<R: ValueReader + ?Sized> ValueReader for &mut R {
    fn read(&mut self) -> Result<Option<Value>> {
        (**self).read()
    }
}

impl<R: ValueReader + ?Sized> ValueReader for Box<R> {
    fn read(&mut self) -> Result<Option<Value>> {
        (**self).read()
    }
}

impl<W: ValueWriter + ?Sized> ValueWriter for &mut W {
    fn write(&mut self, value: &Value) -> Result<()> {
        (**self).write(value)
    }
}

impl<W: ValueWriter + ?Sized> ValueWriter for Box<W> {
    fn write(&mut self, value: &Value) -> Result<()> {
        (**self).write(value)
    }
}

impl ValueWriter for Vec<Value> {
    fn write(&mut self, value: &Value) -> Result<()> {
        self.push(value.clone());
        Ok(())
    }
}

/// A [`ValueReader`] over an iterator of values.
#[derive(Debug, Clone)]
pub struct IterReader<I>(pub I);

impl<I: Iterator<Item = Value>> ValueReader for IterReader<I> {
    fn read(&mut self) -> Result<Option<Value>> {
        Ok(self.0.next())
    }
}

/// Gathers values from a [`ValueReader`] into batches.
#[derive(Debug)]
pub struct ReaderPuller<R> {
    reader: Option<R>,
    batch_size: usize,
}

impl<R: ValueReader> ReaderPuller<R> {
    /// Batch `reader` with the default batch size.
    pub fn new(reader: R) -> Self {
        Self::with_batch_size(reader, DEFAULT_BATCH_SIZE)
    }

    /// Batch `reader` into batches of at most `batch_size` values.
    pub fn with_batch_size(reader: R, batch_size: usize) -> Self {
        ReaderPuller {
            reader: Some(reader),
            batch_size: batch_size.max(1),
        }
    }
}

impl<R: ValueReader> Puller for ReaderPuller<R> {
    fn pull(&mut self, done: bool) -> Result<Option<Batch>> {
        if done {
            self.reader = None;
            return Ok(None);
        }
        let reader = match self.reader.as_mut() {
            Some(r) => r,
            None => return Ok(None),
        };
        let mut values = Vec::with_capacity(self.batch_size);
        while values.len() < self.batch_size {
            match reader.read()? {
                Some(v) => values.push(v),
                None => {
                    self.reader = None;
                    break;
                }
            }
        }
        if values.is_empty() {
            return Ok(None);
        }
        Ok(Some(Batch::new(values)))
    }
}

/// Copy every value from `reader` to `writer`, returning the count.
pub fn copy<W, R>(writer: &mut W, reader: &mut R) -> Result<u64>
where
    W: ValueWriter + ?Sized,
    R: ValueReader + ?Sized,
{
    let mut n = 0;
    while let Some(v) = reader.read()? {
        writer.write(&v)?;
        n += 1;
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(n: i64) -> IterReader<std::vec::IntoIter<Value>> {
        IterReader((0..n).map(Value::int64).collect::<Vec<_>>().into_iter())
    }

    #[test]
    fn test_reader_puller_batches() {
        let mut p = ReaderPuller::with_batch_size(ints(5), 2);
        let sizes: Vec<usize> = std::iter::from_fn(|| p.pull(false).unwrap().map(|b| b.len())).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert!(p.pull(false).unwrap().is_none());
    }

    #[test]
    fn test_done_stops_pulling() {
        let mut p = ReaderPuller::with_batch_size(ints(5), 2);
        assert!(p.pull(false).unwrap().is_some());
        assert!(p.pull(true).unwrap().is_none());
        assert!(p.pull(false).unwrap().is_none());
    }

    #[test]
    fn test_empty_reader() {
        let mut p = ReaderPuller::new(ints(0));
        assert!(p.pull(false).unwrap().is_none());
    }

    #[test]
    fn test_copy() {
        let mut out: Vec<Value> = Vec::new();
        let n = copy(&mut out, &mut ints(3)).unwrap();
        assert_eq!(n, 3);
        assert_eq!(out[2], Value::int64(2));
    }
}
