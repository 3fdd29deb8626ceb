//! Serde deserializer reading Rust data out of a [`Value`].

use crate::coding;
use crate::error::{Error, Result};
use crate::types::{Field, PrimitiveType, Type};
use crate::value::{union_parts, Value};
use crate::zcode::Iter;
use serde::de::value::BorrowedStrDeserializer;
use serde::de::{self, DeserializeSeed, Visitor};

/// Deserializes from a typed value body borrowed from a [`Value`].
#[derive(Clone, Copy)]
pub struct Deserializer<'de> {
    typ: &'de Type,
    body: Option<&'de [u8]>,
}

impl<'de> Deserializer<'de> {
    /// Deserialize from `value`.
    pub fn new(value: &'de Value) -> Self {
        Deserializer {
            typ: value.typ(),
            body: value.bytes(),
        }
    }

    /// Look through named types and union wrappers to the concrete member.
    fn resolve(self) -> Result<Self> {
        let mut d = self;
        loop {
            match (d.typ, d.body) {
                (Type::Named(n), body) => d = Deserializer { typ: &n.typ, body },
                (Type::Union(u), Some(body)) => {
                    let (typ, body) = union_parts(&u.types, body)?;
                    d = Deserializer { typ, body };
                }
                _ => return Ok(d),
            }
        }
    }

    fn mismatch(&self, want: &str) -> Error {
        Error::TypeMismatch(format!("expected {want}, found {}", self.typ))
    }
}

fn utf8(body: &[u8]) -> Result<&str> {
    std::str::from_utf8(body).map_err(|_| Error::BadValue("invalid UTF-8 in string".into()))
}

impl<'de> de::Deserializer<'de> for Deserializer<'de> {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let d = self.resolve()?;
        let body = match d.body {
            Some(body) => body,
            None => return visitor.visit_unit(),
        };
        match d.typ {
            Type::Primitive(p) => match *p {
                p if p.is_unsigned() => visitor.visit_u64(coding::decode_uint(body)?),
                p if p.is_signed() => visitor.visit_i64(coding::decode_int(body)?),
                PrimitiveType::Float16 => visitor.visit_f32(coding::decode_float16(body)?),
                PrimitiveType::Float32 => visitor.visit_f32(coding::decode_float32(body)?),
                PrimitiveType::Float64 => visitor.visit_f64(coding::decode_float64(body)?),
                PrimitiveType::Bool => visitor.visit_bool(coding::decode_bool(body)?),
                PrimitiveType::String | PrimitiveType::Error => {
                    visitor.visit_borrowed_str(utf8(body)?)
                }
                PrimitiveType::Ip => visitor.visit_string(coding::decode_ip(body)?.to_string()),
                PrimitiveType::Net => {
                    let (ip, prefix) = coding::decode_net(body)?;
                    visitor.visit_string(format!("{ip}/{prefix}"))
                }
                PrimitiveType::Null => visitor.visit_unit(),
                _ => visitor.visit_borrowed_bytes(body),
            },
            Type::Record(r) => visitor.visit_map(RecordAccess {
                fields: r.fields.iter(),
                it: Iter::new(body),
                pending: None,
            }),
            Type::Array(a) | Type::Set(a) => visitor.visit_seq(ElementAccess {
                typ: &a.typ,
                it: Iter::new(body),
            }),
            Type::Map(m) => visitor.visit_map(MapAccess {
                key: &m.key,
                value: &m.value,
                it: Iter::new(body),
            }),
            Type::Enum(e) => {
                let sel = coding::decode_uint(body)?;
                let symbol = e
                    .symbols
                    .get(sel as usize)
                    .ok_or_else(|| Error::out_of_range("enum selector", sel))?;
                visitor.visit_borrowed_str(symbol)
            }
            Type::Error(e) => Deserializer {
                typ: &e.typ,
                body: Some(body),
            }
            .deserialize_any(visitor),
            Type::Named(_) | Type::Union(_) => Err(d.mismatch("a concrete type")),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let d = self.resolve()?;
        if d.body.is_none() || d.typ.is_null() {
            return visitor.visit_none();
        }
        visitor.visit_some(d)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        let d = self.resolve()?;
        let body = d.body.ok_or_else(|| d.mismatch("an enum variant"))?;
        match d.typ {
            Type::Primitive(PrimitiveType::String) => {
                visitor.visit_enum(UnitVariant(utf8(body)?))
            }
            Type::Enum(e) => {
                let sel = coding::decode_uint(body)?;
                let symbol = e
                    .symbols
                    .get(sel as usize)
                    .ok_or_else(|| Error::out_of_range("enum selector", sel))?;
                visitor.visit_enum(UnitVariant(symbol))
            }
            Type::Record(r) if r.fields.len() == 1 => {
                let field = &r.fields[0];
                let inner = Iter::new(body).try_next()?;
                visitor.visit_enum(VariantRecord {
                    name: &field.name,
                    value: Deserializer {
                        typ: &field.typ,
                        body: inner,
                    },
                })
            }
            _ => Err(d.mismatch("a string or single-field record")),
        }
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map struct
        identifier ignored_any
    }
}

struct RecordAccess<'de> {
    fields: std::slice::Iter<'de, Field>,
    it: Iter<'de>,
    pending: Option<&'de Field>,
}

impl<'de> de::MapAccess<'de> for RecordAccess<'de> {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        let field = match self.fields.next() {
            Some(f) => f,
            None => return Ok(None),
        };
        self.pending = Some(field);
        seed.deserialize(BorrowedStrDeserializer::<Error>::new(&field.name))
            .map(Some)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value> {
        let field = self
            .pending
            .take()
            .ok_or_else(|| Error::Marshal("record value requested before its key".into()))?;
        let body = self.it.try_next()?;
        seed.deserialize(Deserializer {
            typ: &field.typ,
            body,
        })
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.fields.len())
    }
}

struct ElementAccess<'de> {
    typ: &'de Type,
    it: Iter<'de>,
}

impl<'de> de::SeqAccess<'de> for ElementAccess<'de> {
    type Error = Error;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>> {
        if self.it.done() {
            return Ok(None);
        }
        let body = self.it.try_next()?;
        seed.deserialize(Deserializer {
            typ: self.typ,
            body,
        })
        .map(Some)
    }
}

struct MapAccess<'de> {
    key: &'de Type,
    value: &'de Type,
    it: Iter<'de>,
}

impl<'de> de::MapAccess<'de> for MapAccess<'de> {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        if self.it.done() {
            return Ok(None);
        }
        let body = self.it.try_next()?;
        seed.deserialize(Deserializer {
            typ: self.key,
            body,
        })
        .map(Some)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value> {
        if self.it.done() {
            return Err(Error::BadValue("map key without a value".into()));
        }
        let body = self.it.try_next()?;
        seed.deserialize(Deserializer {
            typ: self.value,
            body,
        })
    }
}

/// A variant carried as a bare string or enum symbol.
struct UnitVariant<'de>(&'de str);

impl<'de> de::EnumAccess<'de> for UnitVariant<'de> {
    type Error = Error;
    type Variant = Self;

    fn variant_seed<V: DeserializeSeed<'de>>(self, seed: V) -> Result<(V::Value, Self)> {
        let variant = seed.deserialize(BorrowedStrDeserializer::<Error>::new(self.0))?;
        Ok((variant, self))
    }
}

impl<'de> de::VariantAccess<'de> for UnitVariant<'de> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        Ok(())
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, _seed: T) -> Result<T::Value> {
        Err(Error::TypeMismatch(format!(
            "variant {} carries no value",
            self.0
        )))
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, _visitor: V) -> Result<V::Value> {
        Err(Error::TypeMismatch(format!(
            "variant {} carries no value",
            self.0
        )))
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value> {
        Err(Error::TypeMismatch(format!(
            "variant {} carries no value",
            self.0
        )))
    }
}

/// A variant carried as `{Variant: value}`.
struct VariantRecord<'de> {
    name: &'de str,
    value: Deserializer<'de>,
}

impl<'de> de::EnumAccess<'de> for VariantRecord<'de> {
    type Error = Error;
    type Variant = Deserializer<'de>;

    fn variant_seed<V: DeserializeSeed<'de>>(
        self,
        seed: V,
    ) -> Result<(V::Value, Deserializer<'de>)> {
        let variant = seed.deserialize(BorrowedStrDeserializer::<Error>::new(self.name))?;
        Ok((variant, self.value))
    }
}

impl<'de> de::VariantAccess<'de> for Deserializer<'de> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        Ok(())
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value> {
        seed.deserialize(self)
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        de::Deserializer::deserialize_seq(self, visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        de::Deserializer::deserialize_map(self, visitor)
    }
}
