//! Serde serializer producing [`Value`]s.

use crate::coding;
use crate::error::{Error, Result};
use crate::types::{Field, PrimitiveType, Type};
use crate::value::Value;
use crate::zcode::{normalize_map, Builder};
use crate::Context;
use serde::ser::{self, Serialize};

/// Serializes Rust data into values interned in a [`Context`].
#[derive(Clone, Copy)]
pub struct Serializer<'c> {
    ctx: &'c Context,
}

impl<'c> Serializer<'c> {
    /// Serialize into types interned in `ctx`.
    pub fn new(ctx: &'c Context) -> Self {
        Serializer { ctx }
    }
}

/// The element type for a group of values: the one non-null type they
/// share, a union of their distinct non-null types, or `null` when every
/// value is an untyped null.
fn unify<'a>(ctx: &Context, types: impl Iterator<Item = &'a Type>) -> Result<Type> {
    let mut distinct: Vec<Type> = Vec::new();
    for t in types {
        if *t != Type::NULL && !distinct.contains(t) {
            distinct.push(t.clone());
        }
    }
    match distinct.len() {
        0 => Ok(Type::NULL),
        1 => Ok(distinct.remove(0)),
        _ => ctx.lookup_type_union(distinct),
    }
}

/// Append `v` as an element of type `target`, wrapping it in a union body
/// when `target` is a union it belongs to.
fn append_as(b: &mut Builder, target: &Type, v: &Value) -> Result<()> {
    if v.typ() == target {
        b.append(v.bytes());
        return Ok(());
    }
    if *v.typ() == Type::NULL {
        b.append(None);
        return Ok(());
    }
    if let Type::Union(u) = target {
        if let Some(sel) = u.selector(v.typ()) {
            b.begin_container();
            b.append(Some(&coding::encode_uint(sel as u64)[..]));
            b.append(v.bytes());
            b.end_container();
            return Ok(());
        }
    }
    Err(Error::TypeMismatch(format!(
        "cannot place {} value in {}",
        v.typ(),
        target
    )))
}

fn record_value(ctx: &Context, fields: Vec<(String, Value)>) -> Result<Value> {
    let mut b = Builder::new();
    let mut types = Vec::with_capacity(fields.len());
    for (name, v) in fields {
        b.append(v.bytes());
        types.push(Field::new(name, v.typ().clone()));
    }
    let typ = ctx.lookup_type_record(types)?;
    Ok(Value::new(typ, Some(b.take().into())))
}

fn array_value(ctx: &Context, values: Vec<Value>) -> Result<Value> {
    let elem = unify(ctx, values.iter().map(Value::typ))?;
    let mut b = Builder::new();
    for v in &values {
        append_as(&mut b, &elem, v)?;
    }
    Ok(Value::new(
        ctx.lookup_type_array(elem),
        Some(b.take().into()),
    ))
}

impl<'c> ser::Serializer for Serializer<'c> {
    type Ok = Value;
    type Error = Error;

    type SerializeSeq = SeqSerializer<'c>;
    type SerializeTuple = SeqSerializer<'c>;
    type SerializeTupleStruct = SeqSerializer<'c>;
    type SerializeTupleVariant = TupleVariantSerializer<'c>;
    type SerializeMap = MapSerializer<'c>;
    type SerializeStruct = StructSerializer<'c>;
    type SerializeStructVariant = StructVariantSerializer<'c>;

    fn serialize_bool(self, v: bool) -> Result<Value> {
        Ok(Value::bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value> {
        Ok(Value::int(PrimitiveType::Int8, i64::from(v)))
    }

    fn serialize_i16(self, v: i16) -> Result<Value> {
        Ok(Value::int(PrimitiveType::Int16, i64::from(v)))
    }

    fn serialize_i32(self, v: i32) -> Result<Value> {
        Ok(Value::int(PrimitiveType::Int32, i64::from(v)))
    }

    fn serialize_i64(self, v: i64) -> Result<Value> {
        Ok(Value::int64(v))
    }

    fn serialize_u8(self, v: u8) -> Result<Value> {
        Ok(Value::uint(PrimitiveType::Uint8, u64::from(v)))
    }

    fn serialize_u16(self, v: u16) -> Result<Value> {
        Ok(Value::uint(PrimitiveType::Uint16, u64::from(v)))
    }

    fn serialize_u32(self, v: u32) -> Result<Value> {
        Ok(Value::uint(PrimitiveType::Uint32, u64::from(v)))
    }

    fn serialize_u64(self, v: u64) -> Result<Value> {
        Ok(Value::uint64(v))
    }

    fn serialize_f32(self, v: f32) -> Result<Value> {
        Ok(Value::float32(v))
    }

    fn serialize_f64(self, v: f64) -> Result<Value> {
        Ok(Value::float64(v))
    }

    fn serialize_char(self, v: char) -> Result<Value> {
        Ok(Value::string(v.encode_utf8(&mut [0u8; 4])))
    }

    fn serialize_str(self, v: &str) -> Result<Value> {
        Ok(Value::string(v))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value> {
        Ok(Value::from_bytes(v))
    }

    fn serialize_none(self) -> Result<Value> {
        Ok(Value::null_value())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Value> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value> {
        Ok(Value::null_value())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value> {
        Ok(Value::null_value())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<Value> {
        Ok(Value::string(variant))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Value> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value> {
        let inner = value.serialize(self)?;
        record_value(self.ctx, vec![(variant.to_string(), inner)])
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqSerializer<'c>> {
        Ok(SeqSerializer {
            ser: self,
            values: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqSerializer<'c>> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SeqSerializer<'c>> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<TupleVariantSerializer<'c>> {
        Ok(TupleVariantSerializer {
            variant,
            seq: self.serialize_seq(Some(len))?,
        })
    }

    fn serialize_map(self, len: Option<usize>) -> Result<MapSerializer<'c>> {
        Ok(MapSerializer {
            ser: self,
            keys: Vec::with_capacity(len.unwrap_or(0)),
            values: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<StructSerializer<'c>> {
        Ok(StructSerializer {
            ser: self,
            fields: Vec::with_capacity(len),
        })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<StructVariantSerializer<'c>> {
        Ok(StructVariantSerializer {
            variant,
            inner: self.serialize_struct(variant, len)?,
        })
    }
}

/// Collects sequence elements into an array value.
pub struct SeqSerializer<'c> {
    ser: Serializer<'c>,
    values: Vec<Value>,
}

impl<'c> SeqSerializer<'c> {
    fn push<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.values.push(value.serialize(self.ser)?);
        Ok(())
    }

    fn finish(self) -> Result<Value> {
        array_value(self.ser.ctx, self.values)
    }
}

impl ser::SerializeSeq for SeqSerializer<'_> {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.push(value)
    }

    fn end(self) -> Result<Value> {
        self.finish()
    }
}

impl ser::SerializeTuple for SeqSerializer<'_> {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.push(value)
    }

    fn end(self) -> Result<Value> {
        self.finish()
    }
}

impl ser::SerializeTupleStruct for SeqSerializer<'_> {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.push(value)
    }

    fn end(self) -> Result<Value> {
        self.finish()
    }
}

/// Serializes `Variant(a, b)` as `{Variant:[a,b]}`.
pub struct TupleVariantSerializer<'c> {
    variant: &'static str,
    seq: SeqSerializer<'c>,
}

impl ser::SerializeTupleVariant for TupleVariantSerializer<'_> {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.seq.push(value)
    }

    fn end(self) -> Result<Value> {
        let ctx = self.seq.ser.ctx;
        let inner = self.seq.finish()?;
        record_value(ctx, vec![(self.variant.to_string(), inner)])
    }
}

/// Collects map entries into a normalized map value.
pub struct MapSerializer<'c> {
    ser: Serializer<'c>,
    keys: Vec<Value>,
    values: Vec<Value>,
}

impl ser::SerializeMap for MapSerializer<'_> {
    type Ok = Value;
    type Error = Error;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<()> {
        self.keys.push(key.serialize(self.ser)?);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.values.push(value.serialize(self.ser)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        let ctx = self.ser.ctx;
        if self.keys.len() != self.values.len() {
            return Err(Error::Marshal("map key without a value".into()));
        }
        let key_type = unify(ctx, self.keys.iter().map(Value::typ))?;
        let value_type = unify(ctx, self.values.iter().map(Value::typ))?;
        let mut b = Builder::new();
        for (k, v) in self.keys.iter().zip(&self.values) {
            append_as(&mut b, &key_type, k)?;
            append_as(&mut b, &value_type, v)?;
        }
        let body = normalize_map(&b.take())?;
        Ok(Value::new(
            ctx.lookup_type_map(key_type, value_type),
            Some(body.into()),
        ))
    }
}

/// Collects struct fields into a record value.
pub struct StructSerializer<'c> {
    ser: Serializer<'c>,
    fields: Vec<(String, Value)>,
}

impl ser::SerializeStruct for StructSerializer<'_> {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        self.fields
            .push((key.to_string(), value.serialize(self.ser)?));
        Ok(())
    }

    fn end(self) -> Result<Value> {
        record_value(self.ser.ctx, self.fields)
    }
}

/// Serializes `Variant { .. }` as `{Variant:{..}}`.
pub struct StructVariantSerializer<'c> {
    variant: &'static str,
    inner: StructSerializer<'c>,
}

impl ser::SerializeStructVariant for StructVariantSerializer<'_> {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        ser::SerializeStruct::serialize_field(&mut self.inner, key, value)
    }

    fn end(self) -> Result<Value> {
        let ctx = self.inner.ser.ctx;
        let inner = ser::SerializeStruct::end(self.inner)?;
        record_value(ctx, vec![(self.variant.to_string(), inner)])
    }
}
