use super::{Field, Type};
use std::cmp::Ordering;

fn rank(t: &Type) -> u8 {
    match t {
        Type::Primitive(_) => 0,
        Type::Record(_) => 1,
        Type::Array(_) => 2,
        Type::Set(_) => 3,
        Type::Map(_) => 4,
        Type::Union(_) => 5,
        Type::Enum(_) => 6,
        Type::Named(_) => 7,
        Type::Error(_) => 8,
    }
}

/// Total order on types, used to sort union members.
///
/// Kinds are ordered primitive < record < array < set < map < union < enum <
/// named < error; ties are broken structurally, so the order does not depend
/// on context IDs.
pub fn compare_types(a: &Type, b: &Type) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    rank(a).cmp(&rank(b)).then_with(|| match (a, b) {
        (Type::Primitive(x), Type::Primitive(y)) => x.id().cmp(&y.id()),
        (Type::Record(x), Type::Record(y)) => compare_fields(&x.fields, &y.fields),
        (Type::Array(x), Type::Array(y)) | (Type::Set(x), Type::Set(y)) => {
            compare_types(&x.typ, &y.typ)
        }
        (Type::Map(x), Type::Map(y)) => {
            compare_types(&x.key, &y.key).then_with(|| compare_types(&x.value, &y.value))
        }
        (Type::Union(x), Type::Union(y)) => compare_lists(&x.types, &y.types),
        (Type::Enum(x), Type::Enum(y)) => x.symbols.cmp(&y.symbols),
        (Type::Named(x), Type::Named(y)) => x
            .name
            .cmp(&y.name)
            .then_with(|| compare_types(&x.typ, &y.typ)),
        (Type::Error(x), Type::Error(y)) => compare_types(&x.typ, &y.typ),
        _ => Ordering::Equal,
    })
}

fn compare_lists(a: &[Type], b: &[Type]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        match compare_types(x, y) {
            Ordering::Equal => {}
            ord => return ord,
        }
    }
    a.len().cmp(&b.len())
}

fn compare_fields(a: &[Field], b: &[Field]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        match x.name.cmp(&y.name).then_with(|| compare_types(&x.typ, &y.typ)) {
            Ordering::Equal => {}
            ord => return ord,
        }
    }
    a.len().cmp(&b.len())
}
