//! Incremental construction of zcode bodies.

use super::varint::{put_uvarint, uvarint_len};
use super::{append, encode_element, read_element, to_tag};
use crate::error::Result;
use smallvec::SmallVec;

/// Bytes reserved for a container's tag when the container is opened.
///
/// Covers payloads below 2^34 bytes; larger containers splice in a wider tag.
const CONTAINER_TAG_RESERVE: usize = 5;

/// Builds a zcode body from elements and nested containers.
///
/// `begin_container` reserves a tag placeholder and records its offset;
/// `end_container` backfills the tag with the container's payload length and
/// shifts the payload left when the tag is narrower than the reservation.
#[derive(Debug, Default, Clone)]
pub struct Builder {
    bytes: Vec<u8>,
    containers: SmallVec<[usize; 8]>,
    last_closed: Option<usize>,
}

impl Builder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder whose buffer has room for `cap` bytes.
    pub fn with_capacity(cap: usize) -> Self {
        Builder {
            bytes: Vec::with_capacity(cap),
            ..Self::default()
        }
    }

    /// Write one element.
    pub fn append(&mut self, body: Option<&[u8]>) {
        append(&mut self.bytes, body);
        self.last_closed = None;
    }

    /// Write an already tagged element verbatim.
    pub fn append_tagged(&mut self, element: &[u8]) {
        self.bytes.extend_from_slice(element);
        self.last_closed = None;
    }

    /// Open a nested container.
    pub fn begin_container(&mut self) {
        self.containers.push(self.bytes.len());
        self.bytes
            .resize(self.bytes.len() + CONTAINER_TAG_RESERVE, 0);
        self.last_closed = None;
    }

    /// Close the most recently opened container.
    ///
    /// # Panics
    ///
    /// Panics when no container is open.
    pub fn end_container(&mut self) {
        let off = self
            .containers
            .pop()
            .expect("zcode builder: end_container without begin_container");
        let body_start = off + CONTAINER_TAG_RESERVE;
        let body_len = self.bytes.len() - body_start;
        let tag = to_tag(body_len);
        let n = uvarint_len(tag);
        if n <= CONTAINER_TAG_RESERVE {
            put_uvarint(&mut self.bytes[off..], tag);
            self.bytes.copy_within(body_start.., off + n);
            self.bytes.truncate(off + n + body_len);
        } else {
            let mut wide = Vec::with_capacity(n);
            super::append_uvarint(&mut wide, tag);
            self.bytes.splice(off..body_start, wide);
        }
        self.last_closed = Some(off);
    }

    /// Replace the body of the most recently closed container with
    /// `transform(body)`.
    ///
    /// Used for set and map normalization. On error the builder is left
    /// unchanged.
    ///
    /// # Panics
    ///
    /// Panics when the last operation was not `end_container`.
    pub fn transform_container<F>(&mut self, transform: F) -> Result<()>
    where
        F: FnOnce(&[u8]) -> Result<Vec<u8>>,
    {
        let off = self
            .last_closed
            .expect("zcode builder: transform_container without a closed container");
        let (body, n) = read_element(&self.bytes[off..])?;
        debug_assert_eq!(off + n, self.bytes.len());
        let replaced = transform(body.unwrap_or_default())?;
        self.bytes.truncate(off);
        self.bytes.extend_from_slice(&encode_element(Some(&replaced)));
        Ok(())
    }

    /// Number of containers currently open.
    pub fn depth(&self) -> usize {
        self.containers.len()
    }

    /// The body built so far.
    ///
    /// Meaningful only when every opened container has been closed.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Take the built body, leaving the builder empty.
    ///
    /// # Panics
    ///
    /// Panics when containers are still open.
    pub fn take(&mut self) -> Vec<u8> {
        assert!(
            self.containers.is_empty(),
            "zcode builder: take with open containers"
        );
        self.last_closed = None;
        std::mem::take(&mut self.bytes)
    }

    /// Clear both the buffer and the container stack.
    pub fn reset(&mut self) {
        self.bytes.clear();
        self.containers.clear();
        self.last_closed = None;
    }

    /// Length of the body built so far.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
