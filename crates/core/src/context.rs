//! The type context
//!
//! A `Context` deduplicates types and assigns each complex type a stable ID
//! (from 23 upward) for the lifetime of the context. Interning is keyed by
//! the canonical type-value, so two lookups of structurally equal types
//! return the same reference.
//!
//! ## Locking
//!
//! All state sits behind one `parking_lot::RwLock`. Lookups try the
//! `to_type` map under the shared lock first; a miss validates the candidate
//! without holding any lock, then takes the exclusive lock and re-checks the
//! map before installing. Two threads racing to intern the same novel type
//! both end up with the reference installed by whichever got the exclusive
//! lock first.
//!
//! Decoding a type-value (`lookup_by_value`) never holds the lock across the
//! recursion: every sub-type is interned through the same lookup methods.

use crate::config::ContextConfig;
use crate::error::{Error, Result, TypeValueError};
use crate::types::{
    compare_types, Field, PrimitiveType, Type, TypeArray, TypeEnum, TypeError, TypeMap,
    TypeNamed, TypeRecord, TypeUnion, ID_FIRST_COMPLEX, ID_RESERVED,
};
use crate::typevalue::{
    encode_type_value, Cursor, Encoder, TAG_ARRAY, TAG_ENUM, TAG_ERROR, TAG_MAP, TAG_NAME_DEF,
    TAG_NAME_REF, TAG_RECORD, TAG_SET, TAG_UNION,
};
use crate::value::Value;
use bytes::Bytes;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Default)]
struct Inner {
    by_id: Vec<Type>,
    to_type: FxHashMap<Bytes, Type>,
    to_value: FxHashMap<Type, Bytes>,
    typedefs: FxHashMap<String, Type>,
    string_error: Option<Type>,
    missing: Option<Value>,
    quiet: Option<Value>,
}

/// A registry of interned types.
///
/// Shared between threads by reference (typically in an `Arc`). Types from
/// one context are meaningful only to that context; use
/// [`translate`](Context::translate) to move a type across.
pub struct Context {
    config: ContextConfig,
    inner: RwLock<Inner>,
}

impl Default for Context {
    fn default() -> Self {
        Context::new()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("types", &self.inner.read().by_id.len())
            .finish()
    }
}

impl Context {
    /// Create an empty context with default caps.
    pub fn new() -> Self {
        Context {
            config: ContextConfig::default(),
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Create an empty context with the given caps.
    pub fn with_config(config: ContextConfig) -> Result<Self> {
        config.validate()?;
        Ok(Context {
            config,
            inner: RwLock::new(Inner::default()),
        })
    }

    /// The configuration in effect.
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Number of complex types interned so far.
    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    /// Whether no complex type has been interned.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cached(&self, tv: &[u8]) -> Option<Type> {
        self.inner.read().to_type.get(tv).cloned()
    }

    /// Install the type built by `make` under `tv` unless another thread got
    /// there first.
    fn install(&self, tv: Vec<u8>, make: impl FnOnce(u32) -> Type) -> Type {
        let mut inner = self.inner.write();
        if let Some(t) = inner.to_type.get(tv.as_slice()) {
            return t.clone();
        }
        let id = u32::try_from(inner.by_id.len())
            .ok()
            .and_then(|n| n.checked_add(ID_FIRST_COMPLEX))
            .expect("type context: type ID space exhausted");
        let typ = make(id);
        let tv = Bytes::from(tv);
        inner.by_id.push(typ.clone());
        inner.to_type.insert(tv.clone(), typ.clone());
        inner.to_value.insert(typ.clone(), tv);
        trace!(target: "zed::types", id, typ = %typ, "interned type");
        typ
    }

    /// Intern a record type.
    ///
    /// Returns `DuplicateField` when two fields share a name.
    pub fn lookup_type_record(&self, fields: Vec<Field>) -> Result<Type> {
        check_cap("record field", fields.len(), self.config.max_record_fields)?;
        let mut enc = Encoder::new();
        enc.record(&fields);
        let tv = enc.finish();
        if let Some(t) = self.cached(&tv) {
            return Ok(t);
        }
        let mut names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        names.sort_unstable();
        if let Some(w) = names.windows(2).find(|w| w[0] == w[1]) {
            return Err(Error::DuplicateField(w[0].to_string()));
        }
        Ok(self.install(tv, |id| Type::Record(Arc::new(TypeRecord { id, fields }))))
    }

    /// Intern an array type.
    pub fn lookup_type_array(&self, inner: Type) -> Type {
        let mut enc = Encoder::new();
        enc.array(&inner);
        let tv = enc.finish();
        if let Some(t) = self.cached(&tv) {
            return t;
        }
        self.install(tv, |id| Type::Array(Arc::new(TypeArray { id, typ: inner })))
    }

    /// Intern a set type.
    pub fn lookup_type_set(&self, inner: Type) -> Type {
        let mut enc = Encoder::new();
        enc.set(&inner);
        let tv = enc.finish();
        if let Some(t) = self.cached(&tv) {
            return t;
        }
        self.install(tv, |id| Type::Set(Arc::new(TypeArray { id, typ: inner })))
    }

    /// Intern a map type.
    pub fn lookup_type_map(&self, key: Type, value: Type) -> Type {
        let mut enc = Encoder::new();
        enc.map(&key, &value);
        let tv = enc.finish();
        if let Some(t) = self.cached(&tv) {
            return t;
        }
        self.install(tv, |id| Type::Map(Arc::new(TypeMap { id, key, value })))
    }

    /// Intern a union type.
    ///
    /// Members are sorted by [`compare_types`] and de-duplicated first, so
    /// any permutation of the same members yields the same type.
    pub fn lookup_type_union(&self, mut types: Vec<Type>) -> Result<Type> {
        types.sort_by(compare_types);
        types.dedup();
        if types.is_empty() {
            return Err(TypeValueError::EmptyUnion.into());
        }
        check_cap("union member", types.len(), self.config.max_union_types)?;
        let mut enc = Encoder::new();
        enc.union(&types);
        let tv = enc.finish();
        if let Some(t) = self.cached(&tv) {
            return Ok(t);
        }
        Ok(self.install(tv, |id| Type::Union(Arc::new(TypeUnion { id, types }))))
    }

    /// Intern an enum type.
    pub fn lookup_type_enum(&self, symbols: Vec<String>) -> Result<Type> {
        check_cap("enum symbol", symbols.len(), self.config.max_enum_symbols)?;
        let mut enc = Encoder::new();
        enc.enumeration(&symbols);
        let tv = enc.finish();
        if let Some(t) = self.cached(&tv) {
            return Ok(t);
        }
        Ok(self.install(tv, |id| Type::Enum(Arc::new(TypeEnum { id, symbols }))))
    }

    /// Intern a named type and bind `name` to it.
    ///
    /// The binding replaces any earlier binding of `name` in this context.
    /// Empty names and primitive type names are rejected.
    pub fn lookup_type_named(&self, name: &str, inner: Type) -> Result<Type> {
        if name.is_empty() || PrimitiveType::from_name(name).is_some() {
            return Err(TypeValueError::BadName(name.to_string()).into());
        }
        let mut enc = Encoder::new();
        enc.named(name, &inner);
        let tv = enc.finish();
        let typ = match self.cached(&tv) {
            Some(t) => t,
            None => self.install(tv, |id| {
                Type::Named(Arc::new(TypeNamed {
                    id,
                    name: name.to_string(),
                    typ: inner,
                }))
            }),
        };
        self.inner
            .write()
            .typedefs
            .insert(name.to_string(), typ.clone());
        Ok(typ)
    }

    /// Intern an error type.
    pub fn lookup_type_error(&self, inner: Type) -> Type {
        let mut enc = Encoder::new();
        enc.error(&inner);
        let tv = enc.finish();
        if let Some(t) = self.cached(&tv) {
            return t;
        }
        self.install(tv, |id| Type::Error(Arc::new(TypeError { id, typ: inner })))
    }

    /// The current binding of a named type.
    pub fn lookup_type_def(&self, name: &str) -> Option<Type> {
        self.inner.read().typedefs.get(name).cloned()
    }

    /// The type with the given ID.
    pub fn lookup_type(&self, id: u32) -> Result<Type> {
        if id < ID_FIRST_COMPLEX {
            return u8::try_from(id)
                .ok()
                .and_then(PrimitiveType::from_id)
                .map(Type::Primitive)
                .ok_or_else(|| Error::out_of_range("type ID", id));
        }
        self.inner
            .read()
            .by_id
            .get((id - ID_FIRST_COMPLEX) as usize)
            .cloned()
            .ok_or_else(|| Error::out_of_range("type ID", id))
    }

    /// The record type with the given ID.
    pub fn lookup_record_type(&self, id: u32) -> Result<Arc<TypeRecord>> {
        let typ = self.lookup_type(id)?;
        typ.record()
            .cloned()
            .ok_or_else(|| Error::TypeMismatch(format!("type {} is not a record: {}", id, typ)))
    }

    /// The canonical type-value of `typ`.
    pub fn type_value(&self, typ: &Type) -> Bytes {
        if let Type::Primitive(p) = typ {
            return Bytes::from(vec![p.id()]);
        }
        if let Some(tv) = self.inner.read().to_value.get(typ) {
            return tv.clone();
        }
        Bytes::from(encode_type_value(typ))
    }

    /// Intern the type a type-value describes.
    ///
    /// The whole input must be consumed.
    pub fn lookup_by_value(&self, tv: &[u8]) -> Result<Type> {
        // A cache hit is final only when there are no names to rebind.
        if let Some(t) = self.cached(tv) {
            if !has_named(&t) {
                return Ok(t);
            }
        }
        let (typ, rest) = self.decode_type_value(tv)?;
        if !rest.is_empty() {
            return Err(TypeValueError::TrailingBytes(rest.len()).into());
        }
        Ok(typ)
    }

    /// Decode one type-value from the front of `buf`, interning every type
    /// it mentions, and return the remaining bytes.
    ///
    /// Each `NameDef` rebinds its name in this context.
    pub fn decode_type_value<'a>(&self, buf: &'a [u8]) -> Result<(Type, &'a [u8])> {
        let mut cur = Cursor::new(buf);
        let mut local = FxHashMap::default();
        let typ = self.decode(&mut cur, &mut local, 0)?;
        Ok((typ, cur.buf))
    }

    fn decode(
        &self,
        cur: &mut Cursor<'_>,
        local: &mut FxHashMap<String, Type>,
        depth: usize,
    ) -> Result<Type> {
        if depth > self.config.max_decode_depth {
            return Err(TypeValueError::DepthLimit(self.config.max_decode_depth).into());
        }
        let tag = cur.byte()?;
        let typ = match tag {
            ID_RESERVED => return Err(TypeValueError::ReservedPrimitive(tag).into()),
            0..=22 => Type::Primitive(
                PrimitiveType::from_id(tag).ok_or(TypeValueError::ReservedPrimitive(tag))?,
            ),
            TAG_NAME_DEF => {
                let name = cur.string()?;
                let inner = self.decode(cur, local, depth + 1)?;
                let typ = self.lookup_type_named(name, inner)?;
                local.insert(name.to_string(), typ.clone());
                typ
            }
            TAG_NAME_REF => {
                let name = cur.string()?;
                match local.get(name) {
                    Some(t) => t.clone(),
                    None => self
                        .lookup_type_def(name)
                        .ok_or_else(|| TypeValueError::Unresolved(name.to_string()))?,
                }
            }
            TAG_RECORD => {
                let n = cur.count("record field", self.config.max_record_fields)?;
                let mut fields = Vec::with_capacity(n.min(cur.buf.len()));
                for _ in 0..n {
                    let name = cur.string()?.to_string();
                    let typ = self.decode(cur, local, depth + 1)?;
                    fields.push(Field { name, typ });
                }
                self.lookup_type_record(fields)?
            }
            TAG_ARRAY => {
                let inner = self.decode(cur, local, depth + 1)?;
                self.lookup_type_array(inner)
            }
            TAG_SET => {
                let inner = self.decode(cur, local, depth + 1)?;
                self.lookup_type_set(inner)
            }
            TAG_UNION => {
                let n = cur.count("union member", self.config.max_union_types)?;
                let mut types = Vec::with_capacity(n.min(cur.buf.len()));
                for _ in 0..n {
                    types.push(self.decode(cur, local, depth + 1)?);
                }
                self.lookup_type_union(types)?
            }
            TAG_ENUM => {
                let n = cur.count("enum symbol", self.config.max_enum_symbols)?;
                let mut symbols = Vec::with_capacity(n.min(cur.buf.len()));
                for _ in 0..n {
                    symbols.push(cur.string()?.to_string());
                }
                self.lookup_type_enum(symbols)?
            }
            TAG_MAP => {
                let key = self.decode(cur, local, depth + 1)?;
                let value = self.decode(cur, local, depth + 1)?;
                self.lookup_type_map(key, value)
            }
            TAG_ERROR => {
                let inner = self.decode(cur, local, depth + 1)?;
                self.lookup_type_error(inner)
            }
            other => return Err(TypeValueError::UnknownTag(other).into()),
        };
        Ok(typ)
    }

    /// Re-intern a type from another context in this one.
    pub fn translate(&self, external: &Type) -> Result<Type> {
        if let Type::Primitive(_) = external {
            return Ok(external.clone());
        }
        self.lookup_by_value(&encode_type_value(external))
    }

    /// The `error(string)` type.
    pub fn string_error_type(&self) -> Type {
        if let Some(t) = &self.inner.read().string_error {
            return t.clone();
        }
        let typ = self.lookup_type_error(Type::STRING);
        self.inner
            .write()
            .string_error
            .get_or_insert(typ)
            .clone()
    }

    /// An `error(string)` value carrying `message`.
    pub fn new_error(&self, message: &str) -> Value {
        Value::new(
            self.string_error_type(),
            Some(Bytes::copy_from_slice(message.as_bytes())),
        )
    }

    /// The sentinel `error("missing")` value.
    pub fn missing(&self) -> Value {
        if let Some(v) = &self.inner.read().missing {
            return v.clone();
        }
        let v = self.new_error("missing");
        self.inner.write().missing.get_or_insert(v).clone()
    }

    /// The sentinel `error("quiet")` value.
    pub fn quiet(&self) -> Value {
        if let Some(v) = &self.inner.read().quiet {
            return v.clone();
        }
        let v = self.new_error("quiet");
        self.inner.write().quiet.get_or_insert(v).clone()
    }

    /// Drop every interned type.
    ///
    /// Types handed out before the reset stay valid as values but no longer
    /// belong to this context.
    pub fn reset(&mut self) {
        let inner = self.inner.get_mut();
        debug!(target: "zed::types", types = inner.by_id.len(), "resetting type context");
        *inner = Inner::default();
    }
}

fn check_cap(what: &'static str, count: usize, limit: usize) -> Result<()> {
    if count > limit {
        return Err(TypeValueError::CapExceeded {
            what,
            count: count as u64,
            limit,
        }
        .into());
    }
    Ok(())
}

fn has_named(typ: &Type) -> bool {
    match typ {
        Type::Named(_) => true,
        Type::Primitive(_) | Type::Enum(_) => false,
        Type::Record(r) => r.fields.iter().any(|f| has_named(&f.typ)),
        Type::Array(a) | Type::Set(a) => has_named(&a.typ),
        Type::Map(m) => has_named(&m.key) || has_named(&m.value),
        Type::Union(u) => u.types.iter().any(has_named),
        Type::Error(e) => has_named(&e.typ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typevalue::encode_type_value;

    fn rec(ctx: &Context, fields: &[(&str, Type)]) -> Type {
        ctx.lookup_type_record(
            fields
                .iter()
                .map(|(n, t)| Field::new(*n, t.clone()))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_record_dedup() {
        let ctx = Context::new();
        let a = rec(&ctx, &[("x", Type::INT64)]);
        let b = rec(&ctx, &[("x", Type::INT64)]);
        assert_eq!(a, b);
        assert_eq!(a.id(), 23);
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let ctx = Context::new();
        let err = ctx
            .lookup_type_record(vec![Field::new("f", Type::INT64), Field::new("f", Type::STRING)])
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateField(ref f) if f == "f"));
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_union_members_sorted() {
        let ctx = Context::new();
        let a = ctx
            .lookup_type_union(vec![Type::STRING, Type::INT64])
            .unwrap();
        let b = ctx
            .lookup_type_union(vec![Type::STRING, Type::INT64])
            .unwrap();
        let c = ctx
            .lookup_type_union(vec![Type::INT64, Type::STRING])
            .unwrap();
        assert_eq!(a.id(), b.id());
        assert_eq!(a.id(), c.id());
        match &a {
            Type::Union(u) => assert_eq!(u.types, vec![Type::INT64, Type::STRING]),
            other => panic!("not a union: {}", other),
        }
    }

    #[test]
    fn test_union_dedup_and_empty() {
        let ctx = Context::new();
        let u = ctx
            .lookup_type_union(vec![Type::INT64, Type::INT64])
            .unwrap();
        assert_eq!(u.to_string(), "(int64)");
        assert!(matches!(
            ctx.lookup_type_union(vec![]),
            Err(Error::BadTypeValue(TypeValueError::EmptyUnion))
        ));
    }

    #[test]
    fn test_named_binding() {
        let ctx = Context::new();
        let a = ctx.lookup_type_named("port", Type::INT64).unwrap();
        assert_eq!(a.id(), 7);
        assert_eq!(ctx.lookup_type_def("port"), Some(a.clone()));
        let b = ctx.lookup_type_named("port", Type::STRING).unwrap();
        assert_eq!(ctx.lookup_type_def("port"), Some(b));
        // rebinding to the original returns the original reference
        let again = ctx.lookup_type_named("port", Type::INT64).unwrap();
        assert_eq!(again, a);
        assert_eq!(ctx.lookup_type_def("port"), Some(a));
    }

    #[test]
    fn test_named_rejects_bad_names() {
        let ctx = Context::new();
        assert!(ctx.lookup_type_named("", Type::INT64).is_err());
        assert!(matches!(
            ctx.lookup_type_named("string", Type::INT64),
            Err(Error::BadTypeValue(TypeValueError::BadName(_)))
        ));
    }

    #[test]
    fn test_lookup_type_by_id() {
        let ctx = Context::new();
        let r = rec(&ctx, &[("x", Type::INT64)]);
        assert_eq!(ctx.lookup_type(r.id()).unwrap(), r);
        assert_eq!(ctx.lookup_type(16).unwrap(), Type::STRING);
        assert!(matches!(
            ctx.lookup_type(17),
            Err(Error::OutOfRange { .. })
        ));
        assert!(matches!(
            ctx.lookup_type(99),
            Err(Error::OutOfRange { index: 99, .. })
        ));
        assert_eq!(ctx.lookup_record_type(r.id()).unwrap().fields.len(), 1);
        assert!(ctx.lookup_record_type(7).is_err());
    }

    #[test]
    fn test_cross_context_round_trip() {
        let a = Context::new();
        let port = a.lookup_type_named("port", Type::Primitive(PrimitiveType::Uint16)).unwrap();
        let inner = rec(&a, &[("p", port.clone()), ("q", port)]);
        let arr = a.lookup_type_array(inner.clone());
        let set = a.lookup_type_set(Type::STRING);
        let map = a.lookup_type_map(Type::STRING, arr);
        let en = a.lookup_type_enum(vec!["x".into(), "y".into()]).unwrap();
        let err = a.lookup_type_error(Type::STRING);
        let union = a.lookup_type_union(vec![map, set, en, err]).unwrap();
        let top = rec(&a, &[("u", union), ("r", inner)]);

        let b = Context::new();
        // shift IDs in b so they cannot line up by accident
        b.lookup_type_array(Type::BOOL);
        let tv = encode_type_value(&top);
        let top_b = b.lookup_by_value(&tv).unwrap();
        assert_eq!(encode_type_value(&top_b), tv);
        assert_eq!(top_b.to_string(), top.to_string());
        assert_ne!(top_b.id(), top.id());
        assert!(b.lookup_type_def("port").is_some());
        assert_eq!(b.translate(&top).unwrap(), top_b);
    }

    #[test]
    fn test_type_value_cached() {
        let ctx = Context::new();
        let r = rec(&ctx, &[("x", Type::INT64)]);
        assert_eq!(&ctx.type_value(&r)[..], &encode_type_value(&r)[..]);
        assert_eq!(&ctx.type_value(&Type::STRING)[..], &[16]);
    }

    #[test]
    fn test_cached_lookup_by_value_rebinds_names() {
        let ctx = Context::new();
        let port = ctx.lookup_type_named("port", Type::INT64).unwrap();
        let r = rec(&ctx, &[("p", port.clone())]);
        let tv = encode_type_value(&r);
        ctx.lookup_type_named("port", Type::STRING).unwrap();
        assert_ne!(ctx.lookup_type_def("port"), Some(port.clone()));

        // the type-value is cached, and decoding it still rebinds "port"
        assert_eq!(ctx.lookup_by_value(&tv).unwrap(), r);
        assert_eq!(ctx.lookup_type_def("port"), Some(port.clone()));
        let (decoded, _) = ctx.decode_type_value(&tv).unwrap();
        assert_eq!(decoded, r);

        let plain = rec(&ctx, &[("x", Type::INT64)]);
        assert_eq!(ctx.lookup_by_value(&encode_type_value(&plain)).unwrap(), plain);
        assert_eq!(ctx.lookup_type_def("port"), Some(port));
    }

    #[test]
    fn test_name_ref_falls_back_to_typedefs() {
        let ctx = Context::new();
        let port = ctx.lookup_type_named("port", Type::INT64).unwrap();
        let tv = [TAG_ARRAY, TAG_NAME_REF, 4, b'p', b'o', b'r', b't'];
        let arr = ctx.lookup_by_value(&tv).unwrap();
        assert_eq!(arr, ctx.lookup_type_array(port));

        let fresh = Context::new();
        assert!(matches!(
            fresh.lookup_by_value(&tv),
            Err(Error::BadTypeValue(TypeValueError::Unresolved(_)))
        ));
    }

    #[test]
    fn test_decode_rejects_malformed() {
        let ctx = Context::new();
        for bad in [
            &[][..],
            &[ID_RESERVED][..],
            &[99][..],
            &[TAG_RECORD][..],
            &[TAG_RECORD, 1, 5, b'x'][..],
            &[TAG_ENUM, 1, 1, 0xff][..],
            &[7, 7][..],
        ] {
            assert!(
                matches!(ctx.lookup_by_value(bad), Err(Error::BadTypeValue(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_decode_returns_rest() {
        let ctx = Context::new();
        let (t, rest) = ctx.decode_type_value(&[TAG_ARRAY, 7, 16, 9]).unwrap();
        assert_eq!(t.to_string(), "[int64]");
        assert_eq!(rest, &[16, 9]);
    }

    #[test]
    fn test_depth_limit() {
        let ctx = Context::with_config(ContextConfig::for_testing()).unwrap();
        let mut tv = vec![TAG_ARRAY; 1000];
        tv.push(7);
        assert!(matches!(
            ctx.lookup_by_value(&tv),
            Err(Error::BadTypeValue(TypeValueError::DepthLimit(16)))
        ));
        let mut ok = vec![TAG_ARRAY; 10];
        ok.push(7);
        assert!(ctx.lookup_by_value(&ok).is_ok());
    }

    #[test]
    fn test_caps_enforced() {
        let ctx = Context::with_config(ContextConfig::for_testing()).unwrap();
        let symbols: Vec<String> = (0..65).map(|i| format!("s{}", i)).collect();
        assert!(matches!(
            ctx.lookup_type_enum(symbols),
            Err(Error::BadTypeValue(TypeValueError::CapExceeded { .. }))
        ));
        let tv = [TAG_RECORD, 0xff, 0xff, 0x03];
        assert!(matches!(
            ctx.lookup_by_value(&tv),
            Err(Error::BadTypeValue(TypeValueError::CapExceeded { .. }))
        ));
    }

    #[test]
    fn test_sentinels_and_errors() {
        let ctx = Context::new();
        let missing = ctx.missing();
        assert_eq!(missing, ctx.missing());
        assert_eq!(missing.typ(), &ctx.string_error_type());
        assert_eq!(missing.to_string(), "error(\"missing\")");
        assert_ne!(ctx.quiet(), missing);
        assert_eq!(ctx.new_error("boom").bytes(), Some(&b"boom"[..]));
    }

    #[test]
    fn test_reset() {
        let mut ctx = Context::new();
        rec(&ctx, &[("x", Type::INT64)]);
        ctx.lookup_type_named("n", Type::INT64).unwrap();
        ctx.missing();
        ctx.reset();
        assert!(ctx.is_empty());
        assert!(ctx.lookup_type_def("n").is_none());
        let r = rec(&ctx, &[("y", Type::INT64)]);
        assert_eq!(r.id(), 23);
    }

    #[test]
    fn test_concurrent_interning() {
        let ctx = Arc::new(Context::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ctx = Arc::clone(&ctx);
                std::thread::spawn(move || {
                    (0..50)
                        .map(|i| {
                            ctx.lookup_type_record(vec![Field::new(format!("f{}", i), Type::INT64)])
                                .unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let results: Vec<Vec<Type>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for r in &results[1..] {
            assert_eq!(r, &results[0]);
        }
        assert_eq!(ctx.len(), 50);
    }
}
