//! The Zed type system
//!
//! A [`Type`] is either a primitive (a fixed ID in `[0, 23)`) or a reference
//! to a complex type interned by a [`Context`](crate::Context). Complex types
//! compare by identity: two references are equal iff they point at the same
//! interned type, which within one context is equivalent to their canonical
//! type-values being byte-identical.

mod fmt;
mod order;

pub(crate) use fmt::write_name;
pub use order::compare_types;

use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// First ID available to complex types.
pub const ID_FIRST_COMPLEX: u32 = 23;

/// Primitive types, numbered by their fixed IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PrimitiveType {
    /// 8-bit unsigned integer
    Uint8 = 0,
    /// 16-bit unsigned integer
    Uint16 = 1,
    /// 32-bit unsigned integer
    Uint32 = 2,
    /// 64-bit unsigned integer
    Uint64 = 3,
    /// 8-bit signed integer
    Int8 = 4,
    /// 16-bit signed integer
    Int16 = 5,
    /// 32-bit signed integer
    Int32 = 6,
    /// 64-bit signed integer
    Int64 = 7,
    /// Nanosecond duration
    Duration = 8,
    /// Nanoseconds since the Unix epoch
    Time = 9,
    /// Half-precision float
    Float16 = 10,
    /// Single-precision float
    Float32 = 11,
    /// Double-precision float
    Float64 = 12,
    /// Decimal (opaque bytes)
    Decimal = 13,
    /// Boolean
    Bool = 14,
    /// Byte string
    Bytes = 15,
    /// UTF-8 string
    String = 16,
    /// IPv4 or IPv6 address
    Ip = 18,
    /// IP network
    Net = 19,
    /// Type value
    Type = 20,
    /// Error primitive
    Error = 21,
    /// Null
    Null = 22,
}

/// The retired primitive ID. Every lookup rejects it.
pub const ID_RESERVED: u8 = 17;

const PRIMITIVES: [PrimitiveType; 22] = [
    PrimitiveType::Uint8,
    PrimitiveType::Uint16,
    PrimitiveType::Uint32,
    PrimitiveType::Uint64,
    PrimitiveType::Int8,
    PrimitiveType::Int16,
    PrimitiveType::Int32,
    PrimitiveType::Int64,
    PrimitiveType::Duration,
    PrimitiveType::Time,
    PrimitiveType::Float16,
    PrimitiveType::Float32,
    PrimitiveType::Float64,
    PrimitiveType::Decimal,
    PrimitiveType::Bool,
    PrimitiveType::Bytes,
    PrimitiveType::String,
    PrimitiveType::Ip,
    PrimitiveType::Net,
    PrimitiveType::Type,
    PrimitiveType::Error,
    PrimitiveType::Null,
];

impl PrimitiveType {
    /// The fixed ID.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Primitive for an ID, or `None` for the reserved ID and IDs ≥ 23.
    pub fn from_id(id: u8) -> Option<Self> {
        PRIMITIVES.iter().copied().find(|p| p.id() == id)
    }

    /// Primitive with the given name.
    pub fn from_name(name: &str) -> Option<Self> {
        PRIMITIVES.iter().copied().find(|p| p.name() == name)
    }

    /// Every primitive in ID order.
    pub fn all() -> &'static [PrimitiveType] {
        &PRIMITIVES
    }

    /// The textual name.
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::Uint8 => "uint8",
            PrimitiveType::Uint16 => "uint16",
            PrimitiveType::Uint32 => "uint32",
            PrimitiveType::Uint64 => "uint64",
            PrimitiveType::Int8 => "int8",
            PrimitiveType::Int16 => "int16",
            PrimitiveType::Int32 => "int32",
            PrimitiveType::Int64 => "int64",
            PrimitiveType::Duration => "duration",
            PrimitiveType::Time => "time",
            PrimitiveType::Float16 => "float16",
            PrimitiveType::Float32 => "float32",
            PrimitiveType::Float64 => "float64",
            PrimitiveType::Decimal => "decimal",
            PrimitiveType::Bool => "bool",
            PrimitiveType::Bytes => "bytes",
            PrimitiveType::String => "string",
            PrimitiveType::Ip => "ip",
            PrimitiveType::Net => "net",
            PrimitiveType::Type => "type",
            PrimitiveType::Error => "error",
            PrimitiveType::Null => "null",
        }
    }

    /// Whether the body is an unsigned integer encoding.
    pub fn is_unsigned(self) -> bool {
        self.id() <= 3
    }

    /// Whether the body is a zig-zag signed integer encoding.
    pub fn is_signed(self) -> bool {
        (4..=9).contains(&self.id())
    }

    /// Whether the type is a float.
    pub fn is_float(self) -> bool {
        (10..=12).contains(&self.id())
    }
}

/// The kind of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// A primitive type
    Primitive,
    /// A record
    Record,
    /// An array
    Array,
    /// A set
    Set,
    /// A map
    Map,
    /// A union
    Union,
    /// An enum
    Enum,
    /// A named alias
    Named,
    /// An error wrapper
    Error,
}

/// A record field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    /// Field name, unique within its record
    pub name: String,
    /// Field type
    pub typ: Type,
}

impl Field {
    /// Create a field.
    pub fn new(name: impl Into<String>, typ: Type) -> Self {
        Field {
            name: name.into(),
            typ,
        }
    }
}

/// An interned record type.
#[derive(Debug)]
pub struct TypeRecord {
    pub(crate) id: u32,
    /// Fields in declaration order
    pub fields: Vec<Field>,
}

impl TypeRecord {
    /// Context ID.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Position of the named field.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// The named field.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// An interned array or set type.
#[derive(Debug)]
pub struct TypeArray {
    pub(crate) id: u32,
    /// Element type
    pub typ: Type,
}

/// An interned map type.
#[derive(Debug)]
pub struct TypeMap {
    pub(crate) id: u32,
    /// Key type
    pub key: Type,
    /// Value type
    pub value: Type,
}

/// An interned union type.
#[derive(Debug)]
pub struct TypeUnion {
    pub(crate) id: u32,
    /// Members sorted by [`compare_types`], without duplicates
    pub types: Vec<Type>,
}

impl TypeUnion {
    /// Selector of `typ` within this union.
    pub fn selector(&self, typ: &Type) -> Option<usize> {
        self.types.iter().position(|t| t == typ)
    }
}

/// An interned enum type.
#[derive(Debug)]
pub struct TypeEnum {
    pub(crate) id: u32,
    /// Symbols in declaration order
    pub symbols: Vec<String>,
}

/// An interned named type.
#[derive(Debug)]
pub struct TypeNamed {
    pub(crate) id: u32,
    /// The name
    pub name: String,
    /// The wrapped type
    pub typ: Type,
}

/// An interned error type.
#[derive(Debug)]
pub struct TypeError {
    pub(crate) id: u32,
    /// The error payload type
    pub typ: Type,
}

/// A type reference.
///
/// Cloning is cheap. Complex types are shared with the context that
/// interned them.
#[derive(Debug, Clone)]
pub enum Type {
    /// A primitive
    Primitive(PrimitiveType),
    /// A record
    Record(Arc<TypeRecord>),
    /// An array
    Array(Arc<TypeArray>),
    /// A set
    Set(Arc<TypeArray>),
    /// A map
    Map(Arc<TypeMap>),
    /// A union
    Union(Arc<TypeUnion>),
    /// An enum
    Enum(Arc<TypeEnum>),
    /// A named alias
    Named(Arc<TypeNamed>),
    /// An error wrapper
    Error(Arc<TypeError>),
}

impl Type {
    /// The `null` type.
    pub const NULL: Type = Type::Primitive(PrimitiveType::Null);
    /// The `string` type.
    pub const STRING: Type = Type::Primitive(PrimitiveType::String);
    /// The `int64` type.
    pub const INT64: Type = Type::Primitive(PrimitiveType::Int64);
    /// The `uint64` type.
    pub const UINT64: Type = Type::Primitive(PrimitiveType::Uint64);
    /// The `float64` type.
    pub const FLOAT64: Type = Type::Primitive(PrimitiveType::Float64);
    /// The `bool` type.
    pub const BOOL: Type = Type::Primitive(PrimitiveType::Bool);
    /// The `bytes` type.
    pub const BYTES: Type = Type::Primitive(PrimitiveType::Bytes);

    /// The encoding ID. A named type reports its inner type's ID.
    pub fn id(&self) -> u32 {
        match self {
            Type::Named(n) => n.typ.id(),
            other => other.context_id(),
        }
    }

    /// The ID under which this reference is registered in its context.
    pub fn context_id(&self) -> u32 {
        match self {
            Type::Primitive(p) => u32::from(p.id()),
            Type::Record(t) => t.id,
            Type::Array(t) | Type::Set(t) => t.id,
            Type::Map(t) => t.id,
            Type::Union(t) => t.id,
            Type::Enum(t) => t.id,
            Type::Named(t) => t.id,
            Type::Error(t) => t.id,
        }
    }

    /// The kind.
    pub fn kind(&self) -> Kind {
        match self {
            Type::Primitive(_) => Kind::Primitive,
            Type::Record(_) => Kind::Record,
            Type::Array(_) => Kind::Array,
            Type::Set(_) => Kind::Set,
            Type::Map(_) => Kind::Map,
            Type::Union(_) => Kind::Union,
            Type::Enum(_) => Kind::Enum,
            Type::Named(_) => Kind::Named,
            Type::Error(_) => Kind::Error,
        }
    }

    /// Strip named wrappers.
    pub fn under(&self) -> &Type {
        let mut t = self;
        while let Type::Named(n) = t {
            t = &n.typ;
        }
        t
    }

    /// The primitive beneath any named wrappers.
    pub fn primitive(&self) -> Option<PrimitiveType> {
        match self.under() {
            Type::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    /// The record beneath any named wrappers.
    pub fn record(&self) -> Option<&Arc<TypeRecord>> {
        match self.under() {
            Type::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Whether this is a primitive type.
    pub fn is_primitive(&self) -> bool {
        matches!(self, Type::Primitive(_))
    }

    /// Whether this is the `null` type.
    pub fn is_null(&self) -> bool {
        matches!(self.under(), Type::Primitive(PrimitiveType::Null))
    }

    /// Whether values of this type are containers of elements.
    pub fn is_container(&self) -> bool {
        matches!(
            self.under(),
            Type::Record(_) | Type::Array(_) | Type::Set(_) | Type::Map(_) | Type::Union(_)
        ) || matches!(self.under(), Type::Error(e) if e.typ.is_container())
    }

    fn addr(&self) -> usize {
        match self {
            Type::Primitive(p) => usize::from(p.id()),
            Type::Record(t) => Arc::as_ptr(t) as usize,
            Type::Array(t) | Type::Set(t) => Arc::as_ptr(t) as usize,
            Type::Map(t) => Arc::as_ptr(t) as usize,
            Type::Union(t) => Arc::as_ptr(t) as usize,
            Type::Enum(t) => Arc::as_ptr(t) as usize,
            Type::Named(t) => Arc::as_ptr(t) as usize,
            Type::Error(t) => Arc::as_ptr(t) as usize,
        }
    }
}

impl From<PrimitiveType> for Type {
    fn from(p: PrimitiveType) -> Self {
        Type::Primitive(p)
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::Primitive(a), Type::Primitive(b)) => a == b,
            (Type::Record(a), Type::Record(b)) => Arc::ptr_eq(a, b),
            (Type::Array(a), Type::Array(b)) | (Type::Set(a), Type::Set(b)) => Arc::ptr_eq(a, b),
            (Type::Map(a), Type::Map(b)) => Arc::ptr_eq(a, b),
            (Type::Union(a), Type::Union(b)) => Arc::ptr_eq(a, b),
            (Type::Enum(a), Type::Enum(b)) => Arc::ptr_eq(a, b),
            (Type::Named(a), Type::Named(b)) => Arc::ptr_eq(a, b),
            (Type::Error(a), Type::Error(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        self.addr().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_ids_and_names() {
        assert_eq!(PrimitiveType::Uint8.id(), 0);
        assert_eq!(PrimitiveType::String.id(), 16);
        assert_eq!(PrimitiveType::Null.id(), 22);
        assert_eq!(PrimitiveType::from_id(ID_RESERVED), None);
        assert_eq!(PrimitiveType::from_id(23), None);
        for p in PrimitiveType::all() {
            assert_eq!(PrimitiveType::from_id(p.id()), Some(*p));
            assert_eq!(PrimitiveType::from_name(p.name()), Some(*p));
        }
    }

    #[test]
    fn test_primitive_classes() {
        assert!(PrimitiveType::Uint32.is_unsigned());
        assert!(PrimitiveType::Time.is_signed());
        assert!(!PrimitiveType::Float16.is_signed());
        assert!(PrimitiveType::Float16.is_float());
    }

    #[test]
    fn test_named_id_is_inner_id() {
        let named = Type::Named(Arc::new(TypeNamed {
            id: 30,
            name: "port".into(),
            typ: Type::Primitive(PrimitiveType::Uint16),
        }));
        assert_eq!(named.id(), 1);
        assert_eq!(named.context_id(), 30);
        assert_eq!(named.under(), &Type::Primitive(PrimitiveType::Uint16));
    }

    #[test]
    fn test_identity_equality() {
        let a = Type::Array(Arc::new(TypeArray {
            id: 23,
            typ: Type::INT64,
        }));
        let b = Type::Array(Arc::new(TypeArray {
            id: 23,
            typ: Type::INT64,
        }));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
