use super::{PrimitiveType, Type};
use std::fmt;

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(p) => write!(f, "{}", p),
            Type::Record(r) => {
                f.write_str("{")?;
                for (i, field) in r.fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write_name(f, &field.name)?;
                    write!(f, ":{}", field.typ)?;
                }
                f.write_str("}")
            }
            Type::Array(a) => write!(f, "[{}]", a.typ),
            Type::Set(s) => write!(f, "|[{}]|", s.typ),
            Type::Map(m) => write!(f, "|{{{}:{}}}|", m.key, m.value),
            Type::Union(u) => {
                f.write_str("(")?;
                for (i, t) in u.types.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", t)?;
                }
                f.write_str(")")
            }
            Type::Enum(e) => {
                f.write_str("enum(")?;
                for (i, s) in e.symbols.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write_name(f, s)?;
                }
                f.write_str(")")
            }
            Type::Named(n) => {
                write_name(f, &n.name)?;
                write!(f, "=({})", n.typ)
            }
            Type::Error(e) => write!(f, "error({})", e.typ),
        }
    }
}

/// Write an identifier bare, or quoted when it is not a plain identifier.
pub(crate) fn write_name(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    if is_identifier(name) {
        f.write_str(name)
    } else {
        write!(f, "{:?}", name)
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}
