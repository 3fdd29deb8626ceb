//! Iterator over the elements of a container body.

use super::{read_element, tag_length, uvarint};
use crate::error::{Error, Result};

/// Yields the elements of a container body in declaration order.
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    buf: &'a [u8],
}

impl<'a> Iter<'a> {
    /// Iterate the elements of `body`.
    pub fn new(body: &'a [u8]) -> Self {
        Iter { buf: body }
    }

    /// Whether the body is exhausted.
    pub fn done(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> &'a [u8] {
        self.buf
    }

    /// Decode the next element.
    ///
    /// Returns `BadValue` when the body is exhausted or malformed, so a
    /// container with fewer elements than its type requires is reported
    /// rather than panicking.
    pub fn try_next(&mut self) -> Result<Option<&'a [u8]>> {
        if self.buf.is_empty() {
            return Err(Error::BadValue("container body exhausted".into()));
        }
        let (body, n) = read_element(self.buf)?;
        self.buf = &self.buf[n..];
        Ok(body)
    }

    /// Decode the next element of a body already known to be well formed.
    ///
    /// # Panics
    ///
    /// Panics when called past the end of the body or on a malformed body.
    /// Use `try_next` on untrusted input.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&'a [u8]> {
        match self.try_next() {
            Ok(body) => body,
            Err(e) => panic!("zcode iterator misuse: {}", e),
        }
    }

    /// Return the next element whole, tag and length included.
    ///
    /// Used when elements are compared or copied as units (set and map
    /// normalization).
    pub fn next_tag_and_body(&mut self) -> Result<&'a [u8]> {
        if self.buf.is_empty() {
            return Err(Error::BadValue("container body exhausted".into()));
        }
        let (tag, n) =
            uvarint(self.buf).ok_or_else(|| Error::BadValue("bad element tag".into()))?;
        let len = tag_length(tag)?.unwrap_or(0);
        let end = n
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| Error::BadValue("element overruns container".into()))?;
        let (elem, rest) = self.buf.split_at(end);
        self.buf = rest;
        Ok(elem)
    }

    /// Count the remaining elements, validating each.
    pub fn count_remaining(&self) -> Result<usize> {
        let mut it = self.clone();
        let mut n = 0;
        while !it.done() {
            it.next_tag_and_body()?;
            n += 1;
        }
        Ok(n)
    }
}
