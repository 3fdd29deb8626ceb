//! Build nested records from field paths
//!
//! Given paths such as `a.b`, `c`, `a.d` and one leaf value per path, a
//! [`RecordBuilder`] produces `{a:{b:..,d:..},c:..}`. Fields are grouped by
//! first appearance, so paths may arrive in any order. Column readers use it
//! to reassemble projections, and the cut reader to emit multi-path records.

use crate::error::{Error, Result};
use crate::path::FieldPath;
use crate::types::{Field, Type};
use crate::value::Value;
use crate::zcode::Builder;
use crate::Context;

#[derive(Debug, Clone)]
enum Node {
    Leaf(usize),
    Record(Vec<(String, Node)>),
}

/// Builds record values with a fixed shape from leaf values.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    fields: Vec<(String, Node)>,
    paths: Vec<FieldPath>,
}

impl RecordBuilder {
    /// Plan the record shape for `paths`.
    ///
    /// Returns `DuplicateField` for a repeated path or for a path that is a
    /// prefix of another (`a` together with `a.b`).
    pub fn new(paths: &[FieldPath]) -> Result<Self> {
        let mut fields = Vec::new();
        for (leaf, path) in paths.iter().enumerate() {
            insert(&mut fields, path, path.components(), leaf)?;
        }
        Ok(RecordBuilder {
            fields,
            paths: paths.to_vec(),
        })
    }

    /// The paths, in leaf order.
    pub fn paths(&self) -> &[FieldPath] {
        &self.paths
    }

    /// The record type for the given leaf types.
    pub fn build_type(&self, ctx: &Context, leaf_types: &[Type]) -> Result<Type> {
        self.check_arity(leaf_types.len())?;
        build_type(ctx, &self.fields, leaf_types)
    }

    /// Assemble a record body from leaf bodies.
    pub fn build_body(&self, leaves: &[Option<&[u8]>]) -> Result<Vec<u8>> {
        self.check_arity(leaves.len())?;
        let mut b = Builder::new();
        build_body(&mut b, &self.fields, leaves);
        Ok(b.take())
    }

    /// Assemble a record value from leaf values.
    pub fn build(&self, ctx: &Context, leaves: &[Value]) -> Result<Value> {
        let types: Vec<Type> = leaves.iter().map(|v| v.typ().clone()).collect();
        let typ = self.build_type(ctx, &types)?;
        let bodies: Vec<Option<&[u8]>> = leaves.iter().map(Value::bytes).collect();
        let body = self.build_body(&bodies)?;
        Ok(Value::new(typ, Some(body.into())))
    }

    fn check_arity(&self, n: usize) -> Result<()> {
        if n != self.paths.len() {
            return Err(Error::TypeMismatch(format!(
                "record builder expects {} leaves, got {}",
                self.paths.len(),
                n
            )));
        }
        Ok(())
    }
}

fn insert(
    level: &mut Vec<(String, Node)>,
    path: &FieldPath,
    rest: &[String],
    leaf: usize,
) -> Result<()> {
    let (name, tail) = rest
        .split_first()
        .ok_or_else(|| Error::BadValue("record builder given an empty path".into()))?;
    let existing = level.iter().position(|(n, _)| n == name);
    match (existing, tail.is_empty()) {
        (None, true) => level.push((name.clone(), Node::Leaf(leaf))),
        (None, false) => {
            let mut children = Vec::new();
            insert(&mut children, path, tail, leaf)?;
            level.push((name.clone(), Node::Record(children)));
        }
        (Some(i), false) => match &mut level[i].1 {
            Node::Record(children) => insert(children, path, tail, leaf)?,
            Node::Leaf(_) => return Err(Error::DuplicateField(path.to_string())),
        },
        (Some(_), true) => return Err(Error::DuplicateField(path.to_string())),
    }
    Ok(())
}

fn build_type(ctx: &Context, level: &[(String, Node)], leaf_types: &[Type]) -> Result<Type> {
    let mut fields = Vec::with_capacity(level.len());
    for (name, node) in level {
        let typ = match node {
            Node::Leaf(i) => leaf_types[*i].clone(),
            Node::Record(children) => build_type(ctx, children, leaf_types)?,
        };
        fields.push(Field::new(name.clone(), typ));
    }
    ctx.lookup_type_record(fields)
}

fn build_body(b: &mut Builder, level: &[(String, Node)], leaves: &[Option<&[u8]>]) {
    for (_, node) in level {
        match node {
            Node::Leaf(i) => b.append(leaves[*i]),
            Node::Record(children) => {
                b.begin_container();
                build_body(b, children, leaves);
                b.end_container();
            }
        }
    }
}
