//! Arenas and 16-byte value handles
//!
//! An [`Arena`] owns flat slabs for a batch of values: the types it has
//! seen, one contiguous byte buffer, and a table of packed
//! `(offset, length)` slots. An [`ArenaValue`] is a `Copy` handle into an
//! arena, or carries a short `bytes`/`string` payload inline and touches no
//! arena at all.
//!
//! ```text
//! byte 0         bytes 1..16
//! +------------+-------------------------------------------------+
//! | form | len | inline payload (up to 15 bytes)                 |
//! +------------+-------------------------------------------------+
//! | form |     | id lo (3) | type index (4) | slot (4) | id hi (4) |
//! +------------+-------------------------------------------------+
//! ```
//!
//! The arena ID is 56 bits, so a handle outliving its arena is caught even
//! after billions of arenas have been created.
//!
//! Arena-backed handles come in two forms. A *bytes* slot points into the
//! byte buffer (`offset == u32::MAX` marks null). A *values* slot points at
//! a run of child handles in a sibling table; its body is synthesized on
//! demand, which is how a union value is built from a concrete-typed child
//! without re-serializing it.
//!
//! Arenas are not shared mutably. [`Arena::into_shared`] freezes an arena
//! behind an `Arc`: clones act as `ref`, drops as `unref`, and the last drop
//! returns the slabs (truncated, capacity kept) to the pool the arena came
//! from.

use crate::coding;
use crate::error::{Error, Result};
use crate::types::Type;
use crate::value::Value;
use crate::zcode::{self, normalize_map, normalize_set};
use bytes::Bytes;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::borrow::Cow;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const FORM_SLOT: u8 = 0;
const FORM_VALUES: u8 = 1;
const FORM_INLINE_BYTES: u8 = 2;
const FORM_INLINE_STRING: u8 = 3;

/// Longest payload stored inline in a handle.
pub const MAX_INLINE: usize = 15;

const NULL_SLOT: u64 = u64::MAX;
/// Arena IDs are 56 bits, split over handle bytes 1..4 and 12..16.
const ARENA_ID_MASK: u64 = (1 << 56) - 1;
const MAX_POOLED: usize = 64;

static NEXT_ARENA_ID: AtomicU64 = AtomicU64::new(1);

/// A 16-byte value handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArenaValue([u8; 16]);

const _: () = assert!(std::mem::size_of::<ArenaValue>() == 16);

impl ArenaValue {
    fn form(&self) -> u8 {
        self.0[0] >> 6
    }

    fn inline_len(&self) -> usize {
        usize::from(self.0[0] & 0x0f)
    }

    fn inline(form: u8, payload: &[u8]) -> Self {
        debug_assert!(payload.len() <= MAX_INLINE);
        let mut h = [0u8; 16];
        h[0] = (form << 6) | payload.len() as u8;
        h[1..1 + payload.len()].copy_from_slice(payload);
        ArenaValue(h)
    }

    fn slot(form: u8, arena: u64, type_index: u32, slot: u32) -> Self {
        let mut h = [0u8; 16];
        let arena = arena.to_le_bytes();
        h[0] = form << 6;
        h[1..4].copy_from_slice(&arena[..3]);
        h[4..8].copy_from_slice(&type_index.to_le_bytes());
        h[8..12].copy_from_slice(&slot.to_le_bytes());
        h[12..16].copy_from_slice(&arena[3..7]);
        ArenaValue(h)
    }

    fn arena_id(&self) -> u64 {
        let h = &self.0;
        u64::from_le_bytes([h[1], h[2], h[3], h[12], h[13], h[14], h[15], 0])
    }

    fn type_index(&self) -> usize {
        u32::from_le_bytes([self.0[4], self.0[5], self.0[6], self.0[7]]) as usize
    }

    fn slot_index(&self) -> usize {
        u32::from_le_bytes([self.0[8], self.0[9], self.0[10], self.0[11]]) as usize
    }

    /// Whether the payload lives in the handle itself.
    pub fn is_inline(&self) -> bool {
        matches!(self.form(), FORM_INLINE_BYTES | FORM_INLINE_STRING)
    }
}

#[derive(Default)]
struct Slabs {
    by_id: Vec<Type>,
    type_index: FxHashMap<Type, u32>,
    bytes: Vec<u8>,
    offsets_and_lengths: Vec<u64>,
    values: Vec<ArenaValue>,
}

impl Slabs {
    fn clear(&mut self) {
        self.by_id.clear();
        self.type_index.clear();
        self.bytes.clear();
        self.offsets_and_lengths.clear();
        self.values.clear();
    }
}

/// A pool of released arena slabs.
///
/// Cloning shares the pool. [`ArenaPool::local`] is the calling thread's
/// pool.
#[derive(Clone, Default)]
pub struct ArenaPool {
    free: Arc<Mutex<Vec<Slabs>>>,
}

thread_local! {
    static LOCAL_POOL: ArenaPool = ArenaPool::new();
}

impl ArenaPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// The calling thread's pool.
    pub fn local() -> Self {
        LOCAL_POOL.with(ArenaPool::clone)
    }

    /// Take an arena from the pool, reusing released slabs when available.
    pub fn arena(&self) -> Arena {
        let slabs = self.free.lock().pop().unwrap_or_default();
        Arena {
            id: NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed) & ARENA_ID_MASK,
            slabs,
            pool: self.clone(),
        }
    }

    /// Number of released slab sets waiting for reuse.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    fn put(&self, mut slabs: Slabs) {
        slabs.clear();
        let mut free = self.free.lock();
        if free.len() < MAX_POOLED {
            free.push(slabs);
        }
    }
}

/// Flat storage for a batch of values.
pub struct Arena {
    id: u64,
    slabs: Slabs,
    pool: ArenaPool,
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("id", &self.id)
            .field("slots", &self.slabs.offsets_and_lengths.len())
            .field("bytes", &self.slabs.bytes.len())
            .finish()
    }
}

impl Default for Arena {
    fn default() -> Self {
        Arena::new()
    }
}

impl Arena {
    /// Take an arena from the calling thread's pool.
    pub fn new() -> Self {
        ArenaPool::local().arena()
    }

    /// Number of arena-backed slots.
    pub fn len(&self) -> usize {
        self.slabs.offsets_and_lengths.len()
    }

    /// Whether no arena-backed slot has been allocated.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every value, keeping the slabs' capacity.
    pub fn reset(&mut self) {
        self.slabs.clear();
    }

    /// Freeze the arena for sharing. Clones of the result are references.
    pub fn into_shared(self) -> SharedArena {
        SharedArena(Arc::new(self))
    }

    fn type_index(&mut self, typ: &Type) -> u32 {
        if let Some(&i) = self.slabs.type_index.get(typ) {
            return i;
        }
        let i = u32::try_from(self.slabs.by_id.len()).expect("arena: type index overflow");
        self.slabs.by_id.push(typ.clone());
        self.slabs.type_index.insert(typ.clone(), i);
        i
    }

    fn push_slot(&mut self, form: u8, typ: &Type, entry: u64) -> ArenaValue {
        let tix = self.type_index(typ);
        let slot = u32::try_from(self.slabs.offsets_and_lengths.len())
            .expect("arena: slot index overflow");
        self.slabs.offsets_and_lengths.push(entry);
        ArenaValue::slot(form, self.id, tix, slot)
    }

    /// Append raw bytes to the arena's buffer, returning their offset.
    ///
    /// Pair with [`new_from_offset_and_length`](Arena::new_from_offset_and_length).
    pub fn append_bytes(&mut self, b: &[u8]) -> u32 {
        let off = u32::try_from(self.slabs.bytes.len())
            .ok()
            .filter(|off| u64::from(*off) + b.len() as u64 <= u64::from(u32::MAX))
            .expect("arena: byte offset exceeds 32 bits");
        self.slabs.bytes.extend_from_slice(b);
        off
    }

    /// Add a value by copying its body.
    ///
    /// Short `bytes` and `string` values are stored inline in the handle.
    pub fn new_value(&mut self, typ: &Type, body: Option<&[u8]>) -> ArenaValue {
        if let (Type::Primitive(p), Some(b)) = (typ, body) {
            if b.len() <= MAX_INLINE {
                if *p == crate::PrimitiveType::Bytes {
                    return ArenaValue::inline(FORM_INLINE_BYTES, b);
                }
                if *p == crate::PrimitiveType::String {
                    return ArenaValue::inline(FORM_INLINE_STRING, b);
                }
            }
        }
        let entry = match body {
            None => NULL_SLOT,
            Some(b) => {
                let off = self.append_bytes(b);
                (u64::from(off) << 32) | b.len() as u64
            }
        };
        self.push_slot(FORM_SLOT, typ, entry)
    }

    /// Add a value whose body already sits in the arena's buffer.
    ///
    /// # Panics
    ///
    /// Panics when the range lies outside the buffer.
    pub fn new_from_offset_and_length(&mut self, typ: &Type, offset: u32, length: u32) -> ArenaValue {
        assert!(
            u64::from(offset) + u64::from(length) <= self.slabs.bytes.len() as u64,
            "arena: range {}+{} outside buffer of {} bytes",
            offset,
            length,
            self.slabs.bytes.len()
        );
        assert!(offset != u32::MAX, "arena: offset collides with null sentinel");
        self.push_slot(FORM_SLOT, typ, (u64::from(offset) << 32) | u64::from(length))
    }

    /// Add a container value whose body is assembled from child handles.
    ///
    /// For a union type `children` is the single member value and the
    /// selector is derived from its type; for an error type it is the single
    /// payload. Records need one child per field; maps alternate keys and
    /// values.
    pub fn new_from_values(&mut self, typ: &Type, children: &[ArenaValue]) -> Result<ArenaValue> {
        for c in children {
            if !c.is_inline() && c.arena_id() != self.id {
                return Err(Error::BadValue("child value belongs to another arena".into()));
            }
        }
        match typ.under() {
            Type::Union(u) => {
                let [child] = children else {
                    return Err(Error::TypeMismatch(format!(
                        "union needs one child, got {}",
                        children.len()
                    )));
                };
                let ctyp = self.type_of(child);
                if u.selector(&ctyp).is_none() {
                    return Err(Error::TypeMismatch(format!(
                        "{} is not a member of {}",
                        ctyp, typ
                    )));
                }
            }
            Type::Error(_) if children.len() != 1 => {
                return Err(Error::TypeMismatch("error value needs one child".into()));
            }
            Type::Record(r) if children.len() != r.fields.len() => {
                return Err(Error::TypeMismatch(format!(
                    "record {} has {} fields, got {} values",
                    typ,
                    r.fields.len(),
                    children.len()
                )));
            }
            Type::Map(_) if children.len() % 2 != 0 => {
                return Err(Error::TypeMismatch("map needs key/value pairs".into()));
            }
            Type::Error(_) | Type::Record(_) | Type::Map(_) | Type::Array(_) | Type::Set(_) => {}
            _ => {
                return Err(Error::TypeMismatch(format!(
                    "{} is not a container type",
                    typ
                )))
            }
        }
        let start = u32::try_from(self.slabs.values.len()).expect("arena: values slab overflow");
        self.slabs.values.extend_from_slice(children);
        let entry = (u64::from(start) << 32) | children.len() as u64;
        Ok(self.push_slot(FORM_VALUES, typ, entry))
    }

    /// The type of a handle.
    ///
    /// # Panics
    ///
    /// Panics when the handle belongs to a different arena.
    pub fn type_of(&self, v: &ArenaValue) -> Type {
        match v.form() {
            FORM_INLINE_BYTES => Type::BYTES,
            FORM_INLINE_STRING => Type::STRING,
            _ => {
                self.check_owner(v);
                self.slabs.by_id[v.type_index()].clone()
            }
        }
    }

    fn check_owner(&self, v: &ArenaValue) {
        assert_eq!(
            v.arena_id(),
            self.id,
            "arena: handle from arena {} used with arena {}",
            v.arena_id(),
            self.id
        );
    }

    /// The body of a handle, or `None` for null.
    ///
    /// Values-form slots are assembled on demand; set and map bodies come
    /// back normalized.
    pub fn bytes<'a>(&'a self, v: &'a ArenaValue) -> Option<Cow<'a, [u8]>> {
        match v.form() {
            FORM_INLINE_BYTES | FORM_INLINE_STRING => {
                Some(Cow::Borrowed(&v.0[1..1 + v.inline_len()]))
            }
            FORM_SLOT => {
                self.check_owner(v);
                let entry = self.slabs.offsets_and_lengths[v.slot_index()];
                if entry == NULL_SLOT {
                    return None;
                }
                let off = (entry >> 32) as usize;
                let len = (entry & 0xffff_ffff) as usize;
                Some(Cow::Borrowed(&self.slabs.bytes[off..off + len]))
            }
            _ => {
                self.check_owner(v);
                let entry = self.slabs.offsets_and_lengths[v.slot_index()];
                let start = (entry >> 32) as usize;
                let count = (entry & 0xffff_ffff) as usize;
                let children = &self.slabs.values[start..start + count];
                Some(self.assemble(&self.slabs.by_id[v.type_index()], children))
            }
        }
    }

    fn assemble<'a>(&'a self, typ: &Type, children: &'a [ArenaValue]) -> Cow<'a, [u8]> {
        match typ.under() {
            Type::Union(u) => {
                let child = &children[0];
                let sel = u
                    .selector(&self.type_of(child))
                    .expect("arena: union member checked at construction");
                let mut out = Vec::new();
                zcode::append(&mut out, Some(&coding::encode_uint(sel as u64)[..]));
                zcode::append(&mut out, self.bytes(child).as_deref());
                Cow::Owned(out)
            }
            Type::Error(_) => match self.bytes(&children[0]) {
                Some(b) => b,
                None => Cow::Borrowed(&[]),
            },
            under => {
                let mut out = Vec::new();
                for c in children {
                    zcode::append(&mut out, self.bytes(c).as_deref());
                }
                let normalized = match under {
                    Type::Set(_) => normalize_set(&out).ok(),
                    Type::Map(_) => normalize_map(&out).ok(),
                    _ => None,
                };
                Cow::Owned(normalized.unwrap_or(out))
            }
        }
    }

    /// Copy a handle out as a self-contained [`Value`].
    pub fn value(&self, v: &ArenaValue) -> Value {
        Value::new(
            self.type_of(v),
            self.bytes(v).map(|b| Bytes::copy_from_slice(&b)),
        )
    }

    /// Copy a handle into another arena.
    pub fn clone_to(&self, v: &ArenaValue, dst: &mut Arena) -> ArenaValue {
        if v.is_inline() {
            return *v;
        }
        let typ = self.type_of(v);
        let body = self.bytes(v);
        dst.new_value(&typ, body.as_deref())
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        self.pool.put(std::mem::take(&mut self.slabs));
    }
}

/// A reference-counted, frozen arena.
///
/// Cloning takes a reference; dropping the last reference returns the
/// arena's slabs to its pool.
#[derive(Debug, Clone)]
pub struct SharedArena(Arc<Arena>);

impl SharedArena {
    /// Number of live references.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Recover the arena for mutation when this is the only reference.
    pub fn try_unwrap(self) -> std::result::Result<Arena, SharedArena> {
        Arc::try_unwrap(self.0).map_err(SharedArena)
    }
}

impl Deref for SharedArena {
    type Target = Arena;

    fn deref(&self) -> &Arena {
        &self.0
    }
}
