//! Core types for type synthesis: type nodes, declared names and options.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use url::Url;

use crate::expr::Expr;
use crate::schema::{Schema, SchemaIdentity};

/// Default recursion limit for nested schemas.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Built-in types a schema can map to without a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Builtin {
    Int8,
    Int16,
    Int32,
    UInt8,
    UInt16,
    UInt32,
    /// Integer of unbounded width.
    Integer,
    Number,
    String,
    Uri,
    Boolean,
    Any,
    /// Uninhabited: no value is valid.
    Nothing,
    /// A reference that could not be resolved.
    Unknown,
    /// The whole current document, reached through a self-reference.
    Module,
    /// An object with no usable shape.
    Record,
}

/// Fixed-width integers, narrowest unsigned first, by inclusive range.
const INTEGER_WIDTHS: &[(Builtin, i64, i64)] = &[
    (Builtin::UInt32, 0, 4_294_967_295),
    (Builtin::UInt16, 0, 65_535),
    (Builtin::UInt8, 0, 255),
    (Builtin::Int32, -2_147_483_648, 2_147_483_647),
    (Builtin::Int16, -32_768, 32_767),
    (Builtin::Int8, -128, 127),
];

impl Builtin {
    /// The fixed-width integer whose range is exactly `[min, max]`.
    pub fn for_integer_range(min: f64, max: f64) -> Option<Builtin> {
        INTEGER_WIDTHS
            .iter()
            .find(|(_, lo, hi)| *lo as f64 == min && *hi as f64 == max)
            .map(|(builtin, _, _)| *builtin)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Int8 => "Int8",
            Builtin::Int16 => "Int16",
            Builtin::Int32 => "Int32",
            Builtin::UInt8 => "UInt8",
            Builtin::UInt16 => "UInt16",
            Builtin::UInt32 => "UInt32",
            Builtin::Integer => "Integer",
            Builtin::Number => "Number",
            Builtin::String => "String",
            Builtin::Uri => "Uri",
            Builtin::Boolean => "Boolean",
            Builtin::Any => "Any",
            Builtin::Nothing => "Nothing",
            Builtin::Unknown => "Unknown",
            Builtin::Module => "Module",
            Builtin::Record => "Record",
        }
    }
}

/// The synthesized static type of a schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TypeNode {
    Builtin {
        builtin: Builtin,
    },
    Nullable {
        inner: Box<TypeNode>,
    },
    /// Order-preserving, free of duplicates.
    Union {
        members: Vec<TypeNode>,
    },
    /// Exactly one string value.
    Literal {
        value: String,
    },
    /// A previously declared class or typealias.
    Named {
        name: String,
        /// Set when the declaration lives outside the current namespace.
        #[serde(skip_serializing_if = "Option::is_none")]
        namespace: Option<String>,
    },
    Sequence {
        item: Box<TypeNode>,
    },
    Mapping {
        key: Box<TypeNode>,
        value: Box<TypeNode>,
    },
    /// `base`, restricted by every constraint.
    Constrained {
        base: Box<TypeNode>,
        constraints: Vec<Expr>,
    },
}

impl From<Builtin> for TypeNode {
    fn from(builtin: Builtin) -> Self {
        TypeNode::Builtin { builtin }
    }
}

impl TypeNode {
    pub fn literal(value: impl Into<String>) -> Self {
        TypeNode::Literal {
            value: value.into(),
        }
    }

    pub fn sequence(item: TypeNode) -> Self {
        TypeNode::Sequence {
            item: Box::new(item),
        }
    }

    pub fn mapping(key: TypeNode, value: TypeNode) -> Self {
        TypeNode::Mapping {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    /// Wrap in nullability, once.
    pub fn nullable(inner: TypeNode) -> Self {
        match inner {
            TypeNode::Nullable { .. } => inner,
            other => TypeNode::Nullable {
                inner: Box::new(other),
            },
        }
    }

    /// Union of `members`: nested unions are flattened, duplicates dropped
    /// (first occurrence wins) and a single member is returned unwrapped.
    pub fn union(members: impl IntoIterator<Item = TypeNode>) -> Self {
        let mut flat: Vec<TypeNode> = Vec::new();
        for member in members {
            let nested = match member {
                TypeNode::Union { members } => members,
                other => vec![other],
            };
            for member in nested {
                if !flat.contains(&member) {
                    flat.push(member);
                }
            }
        }
        match flat.len() {
            0 => Builtin::Nothing.into(),
            1 => flat.remove(0),
            _ => TypeNode::Union { members: flat },
        }
    }

    /// Attach constraints; without any, the base is returned as is.
    pub fn constrained(base: TypeNode, constraints: Vec<Expr>) -> Self {
        if constraints.is_empty() {
            return base;
        }
        TypeNode::Constrained {
            base: Box::new(base),
            constraints,
        }
    }

    /// The builtin this node is, if it is a plain builtin.
    pub fn as_builtin(&self) -> Option<Builtin> {
        match self {
            TypeNode::Builtin { builtin } => Some(*builtin),
            _ => None,
        }
    }

    /// Constraints attached at the top level.
    pub fn constraints(&self) -> &[Expr] {
        match self {
            TypeNode::Constrained { constraints, .. } => constraints,
            _ => &[],
        }
    }

    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeNode::Union { .. } | TypeNode::Constrained { .. } => write!(f, "({})", self),
            _ => write!(f, "{}", self),
        }
    }
}

impl fmt::Display for TypeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeNode::Builtin { builtin } => f.write_str(builtin.name()),
            TypeNode::Nullable { inner } => {
                inner.fmt_nested(f)?;
                f.write_str("?")
            }
            TypeNode::Union { members } => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    member.fmt_nested(f)?;
                }
                Ok(())
            }
            TypeNode::Literal { value } => write!(f, "{:?}", value),
            TypeNode::Named { name, namespace } => match namespace {
                Some(namespace) => write!(f, "{}.{}", namespace, name),
                None => f.write_str(name),
            },
            TypeNode::Sequence { item } => write!(f, "List<{}>", item),
            TypeNode::Mapping { key, value } => write!(f, "Map<{}, {}>", key, value),
            TypeNode::Constrained { base, constraints } => {
                base.fmt_nested(f)?;
                f.write_str(" where ")?;
                for (i, constraint) in constraints.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", constraint)?;
                }
                Ok(())
            }
        }
    }
}

/// A name the declaration generator has already assigned to a schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DeclaredName {
    pub name: String,
    pub namespace: String,
}

impl DeclaredName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

/// Read access to the type-name table.
pub trait TypeNames {
    fn lookup(&self, identity: &SchemaIdentity) -> Option<DeclaredName>;

    /// `true` when no schema is named, so callers can skip computing
    /// identities.
    fn is_empty(&self) -> bool {
        false
    }
}

/// In-memory type-name table.
#[derive(Debug, Clone, Default)]
pub struct TypeNameTable {
    names: HashMap<SchemaIdentity, DeclaredName>,
}

impl TypeNameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, identity: SchemaIdentity, name: DeclaredName) {
        self.names.insert(identity, name);
    }

    /// Name the schema a reference URI points at.
    pub fn insert_reference(&mut self, uri: &Url, name: DeclaredName) {
        self.insert(SchemaIdentity::reference(uri), name);
    }

    /// Name every schema structurally equal to `schema`.
    pub fn insert_schema(&mut self, schema: &Schema, name: DeclaredName) {
        self.insert(SchemaIdentity::structural(schema), name);
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl TypeNames for TypeNameTable {
    fn lookup(&self, identity: &SchemaIdentity) -> Option<DeclaredName> {
        self.names.get(identity).cloned()
    }

    fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Options for type synthesis.
#[derive(Debug, Clone)]
pub struct SynthOptions {
    /// Namespace the generated code lives in. Declared names from any other
    /// namespace are emitted qualified.
    pub namespace: String,
    /// Nesting depth at which synthesis gives up with an unknown type.
    pub max_depth: usize,
}

impl Default for SynthOptions {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl SynthOptions {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    /// Set the recursion limit.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integer_ranges_map_to_widths() {
        assert_eq!(Builtin::for_integer_range(0.0, 255.0), Some(Builtin::UInt8));
        assert_eq!(Builtin::for_integer_range(-128.0, 127.0), Some(Builtin::Int8));
        assert_eq!(
            Builtin::for_integer_range(0.0, 4_294_967_295.0),
            Some(Builtin::UInt32)
        );
        assert_eq!(Builtin::for_integer_range(0.0, 254.0), None);
    }

    #[test]
    fn union_flattens_and_dedupes() {
        let union = TypeNode::union([
            Builtin::String.into(),
            TypeNode::union([Builtin::Integer.into(), Builtin::String.into()]),
            Builtin::Integer.into(),
        ]);
        assert_eq!(
            union,
            TypeNode::Union {
                members: vec![Builtin::String.into(), Builtin::Integer.into()]
            }
        );
        assert_eq!(TypeNode::union([Builtin::Any.into()]), Builtin::Any.into());
        assert_eq!(TypeNode::union([]), Builtin::Nothing.into());
    }

    #[test]
    fn nullable_wraps_once() {
        let once = TypeNode::nullable(Builtin::String.into());
        assert_eq!(TypeNode::nullable(once.clone()), once);
    }

    #[test]
    fn constrained_without_constraints_is_base() {
        assert_eq!(
            TypeNode::constrained(Builtin::Integer.into(), vec![]),
            Builtin::Integer.into()
        );
    }

    #[test]
    fn display() {
        let ty = TypeNode::nullable(TypeNode::union([
            TypeNode::literal("a"),
            TypeNode::sequence(Builtin::UInt8.into()),
        ]));
        assert_eq!(ty.to_string(), r#"("a" | List<UInt8>)?"#);

        let named = TypeNode::Named {
            name: "Pet".into(),
            namespace: Some("zoo".into()),
        };
        assert_eq!(TypeNode::mapping(Builtin::String.into(), named).to_string(), "Map<String, zoo.Pet>");

        let ty = TypeNode::constrained(
            Builtin::Integer.into(),
            vec![Expr::this().member("isEven"), Expr::this().member("isPositive")],
        );
        assert_eq!(ty.to_string(), "Integer where this.isEven, this.isPositive");
    }

    #[test]
    fn serializes_tagged() {
        assert_eq!(
            serde_json::to_value(TypeNode::sequence(Builtin::UInt8.into())).unwrap(),
            json!({ "kind": "sequence", "item": { "kind": "builtin", "builtin": "uInt8" } })
        );
    }

    #[test]
    fn table_lookup_by_identity() {
        let mut table = TypeNameTable::new();
        let uri = Url::parse("memory:///schema.json#/$defs/Pet").unwrap();
        table.insert_reference(&uri, DeclaredName::new("zoo", "Pet"));
        assert_eq!(
            table.lookup(&SchemaIdentity::reference(&uri)),
            Some(DeclaredName::new("zoo", "Pet"))
        );
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn options_builder() {
        let opts = SynthOptions::new("api").max_depth(4);
        assert_eq!(opts.namespace, "api");
        assert_eq!(opts.max_depth, 4);
    }
}
