//! Type synthesis: schema in, type node out.
//!
//! [`Synthesizer::type_of`] walks a schema top-down. References are
//! resolved and inlined, `allOf` is collated, and what is left is
//! classified once into a [`Shape`]. The shape picks the narrowest builtin
//! type, and [`constraints_for`] supplies whatever the type alone does not
//! express.
//!
//! Synthesis never fails on bad references: those degrade to
//! [`Builtin::Unknown`] and leave a [`Diagnostic`] behind. The only hard
//! error is a [`MergeConflict`].

use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::constraints::{constraints_for, inclusive_maximum, inclusive_minimum, matches};
use crate::error::{MergeConflict, SynthError};
use crate::loader::{Document, DocumentSource};
use crate::merge::{collate, inline_reference};
use crate::resolver::{Diagnostic, Resolver};
use crate::schema::{InstanceType, Items, Schema, SchemaIdentity, SchemaObject, TypeSet};
use crate::types::{Builtin, SynthOptions, TypeNames, TypeNode};

/// The one category a schema is treated as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Union,
    Number,
    String,
    Boolean,
    Array,
    Object,
    Any,
}

impl Shape {
    /// Classify a schema with `allOf` already collated and `null` already
    /// split off. The first matching category wins.
    pub fn classify(schema: &SchemaObject) -> Shape {
        let multi_type = schema.type_.as_ref().is_some_and(|set| set.len() > 1);
        if schema.one_of.is_some() || schema.any_of.is_some() || multi_type {
            return Shape::Union;
        }

        let literals = schema.literal_values().filter(|values| !values.is_empty());
        let all_literals = |kind: fn(&Value) -> bool| {
            literals
                .as_ref()
                .is_some_and(|values| values.iter().all(|value| kind(*value)))
        };

        if schema.declares(InstanceType::Number)
            || schema.declares(InstanceType::Integer)
            || all_literals(Value::is_number)
        {
            Shape::Number
        } else if schema.declares(InstanceType::String) || all_literals(Value::is_string) {
            Shape::String
        } else if schema.declares(InstanceType::Boolean) || all_literals(Value::is_boolean) {
            Shape::Boolean
        } else if schema.declares(InstanceType::Array) || schema.items.is_some() {
            Shape::Array
        } else if schema.declares(InstanceType::Object)
            || schema.properties.is_some()
            || schema.pattern_properties.is_some()
            || schema.additional_properties.is_some()
        {
            Shape::Object
        } else {
            Shape::Any
        }
    }
}

/// Synthesizes type nodes for schemas of one document.
pub struct Synthesizer<'a> {
    resolver: Resolver<'a>,
    document: &'a Document,
    names: &'a dyn TypeNames,
    options: SynthOptions,
    depth: usize,
}

impl<'a> Synthesizer<'a> {
    pub fn new(
        document: &'a Document,
        source: &'a dyn DocumentSource,
        names: &'a dyn TypeNames,
        options: SynthOptions,
    ) -> Self {
        Self {
            resolver: Resolver::new(source),
            document,
            names,
            options,
            depth: 0,
        }
    }

    /// Diagnostics recorded so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.resolver.diagnostics()
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.resolver.take_diagnostics()
    }

    /// The type of values `schema` accepts.
    ///
    /// # Errors
    ///
    /// Returns `MergeConflict` if an `allOf` reachable from `schema` has no
    /// merged form.
    pub fn type_of(&mut self, schema: &Schema) -> Result<TypeNode, MergeConflict> {
        self.synthesize(schema, None, true)
    }

    /// Like [`type_of`](Self::type_of), but never answers with the name
    /// `schema` itself is declared under. Nested schemas are still looked up.
    pub fn definition_of(&mut self, schema: &Schema) -> Result<TypeNode, MergeConflict> {
        self.synthesize(schema, None, false)
    }

    /// The type of the schema `reference` points at, resolved against the
    /// document.
    pub fn type_of_reference(&mut self, reference: &str) -> Result<TypeNode, MergeConflict> {
        let alias = Schema::from(SchemaObject {
            reference: Some(reference.to_string()),
            ..SchemaObject::default()
        });
        self.type_of(&alias)
    }

    fn synthesize(
        &mut self,
        schema: &Schema,
        origin: Option<&Url>,
        lookup: bool,
    ) -> Result<TypeNode, MergeConflict> {
        if self.depth >= self.options.max_depth {
            self.resolver.report(Diagnostic::new(
                "S001",
                origin.map(Url::to_string).unwrap_or_default(),
                format!("schema nesting deeper than {}", self.options.max_depth),
            ));
            return Ok(Builtin::Unknown.into());
        }
        self.depth += 1;
        let ty = self.synthesize_at_depth(schema, origin, lookup);
        self.depth -= 1;
        ty
    }

    fn synthesize_at_depth(
        &mut self,
        schema: &Schema,
        origin: Option<&Url>,
        lookup: bool,
    ) -> Result<TypeNode, MergeConflict> {
        let object = match schema {
            Schema::Bool(true) => return Ok(Builtin::Any.into()),
            Schema::Bool(false) => return Ok(Builtin::Nothing.into()),
            Schema::Object(object) => object,
        };

        if object.reference.is_some() {
            let Some(resolved) = self.resolver.resolve(self.document, object) else {
                return Ok(Builtin::Unknown.into());
            };
            if self.is_document_root(&resolved.uri) {
                return Ok(Builtin::Module.into());
            }
            let origin = object.is_annotation_only().then_some(resolved.uri);
            let inlined = inline_reference(&mut self.resolver, self.document, object, resolved.schema)?;
            return self.synthesize(&inlined, origin.as_ref(), lookup);
        }

        if lookup {
            if let Some(named) = self.lookup(schema, origin) {
                return Ok(named);
            }
        }

        if object.all_of.as_ref().is_some_and(|branches| !branches.is_empty()) {
            let collated = collate(&mut self.resolver, self.document, object)?;
            return self.synthesize(&collated, None, lookup);
        }

        if is_null_only(object) {
            return Ok(TypeNode::nullable(Builtin::Nothing.into()));
        }
        if let Some(rest) = without_null(object) {
            let inner = self.synthesize(&Schema::from(rest), None, true)?;
            return Ok(TypeNode::nullable(inner));
        }

        let shape = Shape::classify(object);
        let (effective, base) = match shape {
            Shape::Union => return self.union_of(object),
            Shape::Number => number_type(object),
            Shape::String => string_type(object),
            Shape::Boolean => ((**object).clone(), Builtin::Boolean.into()),
            Shape::Array => ((**object).clone(), self.array_type(object)?),
            Shape::Object => ((**object).clone(), self.object_type(object)?),
            Shape::Any => ((**object).clone(), Builtin::Any.into()),
        };
        let constraints = constraints_for(
            &mut self.resolver,
            self.document,
            &effective,
            shape,
            self.options.max_depth,
        )?;
        Ok(TypeNode::constrained(base, constraints))
    }

    fn is_document_root(&self, uri: &Url) -> bool {
        self.document.contains(uri) && uri.fragment().map_or(true, str::is_empty)
    }

    /// Declared name for the schema, by reference target first.
    fn lookup(&self, schema: &Schema, origin: Option<&Url>) -> Option<TypeNode> {
        if self.names.is_empty() {
            return None;
        }
        let declared = origin
            .and_then(|uri| self.names.lookup(&SchemaIdentity::reference(uri)))
            .or_else(|| self.names.lookup(&SchemaIdentity::structural(schema)))?;
        let namespace = (declared.namespace != self.options.namespace).then_some(declared.namespace);
        Some(TypeNode::Named {
            name: declared.name,
            namespace,
        })
    }

    fn array_type(&mut self, object: &SchemaObject) -> Result<TypeNode, MergeConflict> {
        let item = match &object.items {
            Some(Items::Single(item)) => self.synthesize(item, None, true)?,
            Some(Items::Tuple(_)) | None => Builtin::Any.into(),
        };
        Ok(TypeNode::sequence(item))
    }

    fn object_type(&mut self, object: &SchemaObject) -> Result<TypeNode, MergeConflict> {
        if let Some(patterns) = &object.pattern_properties {
            if patterns.len() == 1 {
                if let Some((pattern, value)) = patterns.first() {
                    let key = TypeNode::constrained(Builtin::String.into(), vec![matches(pattern)]);
                    let value = self.synthesize(value, None, true)?;
                    return Ok(TypeNode::mapping(key, value));
                }
            }
        }
        match &object.additional_properties {
            Some(Schema::Bool(true)) => Ok(TypeNode::mapping(
                Builtin::String.into(),
                Builtin::Any.into(),
            )),
            Some(value) => {
                let value = self.synthesize(value, None, true)?;
                Ok(TypeNode::mapping(Builtin::String.into(), value))
            }
            None => Ok(Builtin::Record.into()),
        }
    }

    /// Union over a multi-type list or over `oneOf`/`anyOf` members.
    ///
    /// For a type list each alternative is synthesized from the bare type
    /// name; the parent's other keywords may not hold for every branch.
    fn union_of(&mut self, object: &SchemaObject) -> Result<TypeNode, MergeConflict> {
        if let Some(TypeSet::Many(types)) = &object.type_ {
            let mut members = Vec::with_capacity(types.len());
            for ty in types {
                let alternative = Schema::from(SchemaObject {
                    type_: Some(TypeSet::Single(*ty)),
                    ..SchemaObject::default()
                });
                members.push(self.synthesize(&alternative, None, true)?);
            }
            return Ok(TypeNode::union(members));
        }

        let alternatives = object.one_of.iter().chain(object.any_of.iter()).flatten();
        let mut members = Vec::new();
        for alternative in alternatives {
            members.push(self.synthesize(alternative, None, true)?);
        }
        Ok(TypeNode::union(members))
    }
}

fn is_null_only(object: &SchemaObject) -> bool {
    if let Some(set) = &object.type_ {
        if set.types() == [InstanceType::Null] {
            return true;
        }
    }
    object
        .literal_values()
        .is_some_and(|values| !values.is_empty() && values.iter().all(|value| value.is_null()))
}

/// The schema with `null` removed from its type list and literal values,
/// if either admitted `null` next to something else.
fn without_null(object: &SchemaObject) -> Option<SchemaObject> {
    let typed_null = object
        .type_
        .as_ref()
        .is_some_and(|set| set.len() > 1 && set.contains(InstanceType::Null));
    let literal_null = object.const_.is_none()
        && object
            .enum_
            .as_ref()
            .is_some_and(|values| values.len() > 1 && values.contains(&Value::Null));
    if !typed_null && !literal_null {
        return None;
    }

    let type_ = match &object.type_ {
        Some(set) if typed_null => TypeSet::from_types(
            set.types()
                .iter()
                .copied()
                .filter(|ty| *ty != InstanceType::Null)
                .collect(),
        ),
        other => other.clone(),
    };
    let enum_ = object.enum_.as_ref().map(|values| {
        values
            .iter()
            .filter(|value| !value.is_null())
            .cloned()
            .collect()
    });
    Some(SchemaObject {
        type_,
        enum_,
        ..object.clone()
    })
}

/// Integers whose bounds match a fixed width become that width, and the
/// bounds it implies are dropped.
fn number_type(object: &SchemaObject) -> (SchemaObject, TypeNode) {
    if !object.is_integral() {
        return (object.clone(), Builtin::Number.into());
    }
    let width = match (inclusive_minimum(object), inclusive_maximum(object)) {
        (Some(lo), Some(hi)) => Builtin::for_integer_range(lo, hi),
        _ => None,
    };
    match width {
        Some(width) => {
            let stripped = SchemaObject {
                minimum: None,
                maximum: None,
                exclusive_minimum: None,
                exclusive_maximum: None,
                multiple_of: object.multiple_of.filter(|m| *m != 1.0),
                ..object.clone()
            };
            (stripped, width.into())
        }
        None => (object.clone(), Builtin::Integer.into()),
    }
}

/// String literals collapse into literal types; `format: uri` is a builtin.
fn string_type(object: &SchemaObject) -> (SchemaObject, TypeNode) {
    let strings: Option<Vec<&str>> = object
        .literal_values()
        .filter(|values| !values.is_empty())
        .and_then(|values| values.into_iter().map(Value::as_str).collect());
    if let Some(strings) = strings {
        let literals = TypeNode::union(strings.into_iter().map(TypeNode::literal));
        let stripped = SchemaObject {
            const_: None,
            enum_: None,
            ..object.clone()
        };
        return (stripped, literals);
    }
    if object.format.as_deref() == Some("uri") {
        return (object.clone(), Builtin::Uri.into());
    }
    (object.clone(), Builtin::String.into())
}

/// Outcome of synthesizing a whole document.
#[derive(Debug, Clone, Serialize)]
pub struct Synthesis {
    #[serde(rename = "type")]
    pub ty: TypeNode,
    pub diagnostics: Vec<Diagnostic>,
}

/// Synthesize the type of `document`'s root schema.
///
/// # Errors
///
/// Returns `SynthError::Load` if the root is not a schema, or
/// `SynthError::Conflict` if an `allOf` cannot be merged.
pub fn synthesize(
    document: &Document,
    source: &dyn DocumentSource,
    names: &dyn TypeNames,
    options: SynthOptions,
) -> Result<Synthesis, SynthError> {
    let root = document.root_schema()?;
    let mut synthesizer = Synthesizer::new(document, source, names, options);
    let ty = synthesizer.type_of(&root)?;
    Ok(Synthesis {
        ty,
        diagnostics: synthesizer.take_diagnostics(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;
    use crate::loader::MemorySource;
    use crate::types::{DeclaredName, TypeNameTable};
    use serde_json::json;

    fn synth_with(value: Value, names: &TypeNameTable, options: SynthOptions) -> Synthesis {
        let document = Document::from_value(value);
        let source = MemorySource::new();
        synthesize(&document, &source, names, options).unwrap()
    }

    fn synth(value: Value) -> Synthesis {
        synth_with(value, &TypeNameTable::new(), SynthOptions::default())
    }

    fn type_string(value: Value) -> String {
        synth(value).ty.to_string()
    }

    #[test]
    fn classify_shapes() {
        let classify = |value: Value| Shape::classify(&serde_json::from_value(value).unwrap());
        assert_eq!(classify(json!({ "type": ["string", "integer"] })), Shape::Union);
        assert_eq!(classify(json!({ "oneOf": [] })), Shape::Union);
        assert_eq!(classify(json!({ "enum": [1, 2.5] })), Shape::Number);
        assert_eq!(classify(json!({ "const": "a" })), Shape::String);
        assert_eq!(classify(json!({ "enum": [true] })), Shape::Boolean);
        assert_eq!(classify(json!({ "items": true })), Shape::Array);
        assert_eq!(classify(json!({ "patternProperties": {} })), Shape::Object);
        assert_eq!(classify(json!({ "enum": [1, "a"] })), Shape::Any);
        assert_eq!(classify(json!({})), Shape::Any);
    }

    #[test]
    fn boolean_schemas() {
        assert_eq!(type_string(json!(true)), "Any");
        assert_eq!(type_string(json!(false)), "Nothing");
    }

    #[test]
    fn integer_widths() {
        assert_eq!(type_string(json!({ "type": "integer", "minimum": 0, "maximum": 255 })), "UInt8");
        assert_eq!(
            type_string(json!({ "type": "integer", "minimum": -32768, "maximum": 32767, "multipleOf": 1 })),
            "Int16"
        );
        assert_eq!(
            type_string(json!({ "type": "integer", "minimum": 0, "exclusiveMaximum": 65536 })),
            "UInt16"
        );
        assert_eq!(
            type_string(json!({ "type": "integer", "minimum": 0, "maximum": 254 })),
            "Integer where this.isBetween(0, 254)"
        );
        assert_eq!(
            type_string(json!({ "type": "integer", "minimum": 0, "maximum": 255, "multipleOf": 5 })),
            "UInt8 where this % 5 == 0"
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(type_string(json!({ "type": "number" })), "Number");
        assert_eq!(type_string(json!({ "type": "number", "multipleOf": 3 })), "Integer where this % 3 == 0");
    }

    #[test]
    fn strings() {
        assert_eq!(type_string(json!({ "enum": ["a"] })), r#""a""#);
        assert_eq!(type_string(json!({ "enum": ["a", "b"] })), r#""a" | "b""#);
        assert_eq!(type_string(json!({ "type": "string", "format": "uri" })), "Uri");
        assert_eq!(
            type_string(json!({ "type": "string", "minLength": 1 })),
            "String where !this.isEmpty"
        );
    }

    #[test]
    fn booleans() {
        assert_eq!(type_string(json!({ "enum": [true, false] })), "Boolean");
        assert_eq!(type_string(json!({ "const": true })), "Boolean where this == true");
    }

    #[test]
    fn nullability() {
        assert_eq!(type_string(json!({ "type": ["string", "null"] })), "String?");
        assert_eq!(type_string(json!({ "type": "null" })), "Nothing?");
        assert_eq!(type_string(json!({ "const": null })), "Nothing?");
        assert_eq!(type_string(json!({ "enum": ["a", null, "b"] })), r#"("a" | "b")?"#);
        assert_eq!(
            type_string(json!({ "type": ["integer", "string", "null"] })),
            "(Integer | String)?"
        );
    }

    #[test]
    fn arrays() {
        assert_eq!(
            type_string(json!({ "type": "array", "items": { "type": "integer", "minimum": -128, "maximum": 127 } })),
            "List<Int8>"
        );
        assert_eq!(type_string(json!({ "type": "array" })), "List<Any>");
        assert_eq!(type_string(json!({ "items": [{ "type": "string" }] })), "List<Any>");
        assert_eq!(
            type_string(json!({ "type": "array", "items": true, "minItems": 1 })),
            "List<Any> where !this.isEmpty"
        );
    }

    #[test]
    fn objects() {
        assert_eq!(type_string(json!({ "type": "object" })), "Record");
        assert_eq!(
            type_string(json!({ "additionalProperties": { "type": "boolean" } })),
            "Map<String, Boolean>"
        );
        assert_eq!(type_string(json!({ "additionalProperties": true })), "Map<String, Any>");
        assert_eq!(
            type_string(json!({ "patternProperties": { "^x-": { "type": "string" } } })),
            r#"Map<String where this.matches(Regex("^x-")), String>"#
        );
    }

    #[test]
    fn unions_drop_parent_constraints() {
        assert_eq!(
            type_string(json!({ "type": ["string", "integer"], "minLength": 3 })),
            "String | Integer"
        );
        assert_eq!(
            type_string(json!({ "oneOf": [{ "type": "string" }, { "type": "string" }, { "type": "boolean" }] })),
            "String | Boolean"
        );
    }

    #[test]
    fn references() {
        let schema = json!({
            "type": "array",
            "items": { "$ref": "#/$defs/port" },
            "$defs": { "port": { "type": "integer", "minimum": 0, "maximum": 65535 } }
        });
        assert_eq!(type_string(schema), "List<UInt16>");
    }

    #[test]
    fn sibling_keywords_apply() {
        let schema = json!({
            "items": { "$ref": "#/$defs/word", "maxLength": 8 },
            "$defs": { "word": { "type": "string", "minLength": 2 } }
        });
        assert_eq!(type_string(schema), "List<String where this.length.isBetween(2, 8)>");
    }

    #[test]
    fn unresolved_reference_is_unknown() {
        let result = synth(json!({ "$ref": "#/missing" }));
        assert_eq!(result.ty, Builtin::Unknown.into());
        assert_eq!(result.diagnostics.len(), 1);
    }

    #[test]
    fn self_reference_to_root_is_module() {
        let result = synth(json!({ "type": "array", "items": { "$ref": "#" } }));
        assert_eq!(result.ty.to_string(), "List<Module>");
    }

    #[test]
    fn declared_names() {
        let mut names = TypeNameTable::new();
        let pet = Url::parse("memory:///schema.json#/$defs/pet").unwrap();
        names.insert_reference(&pet, DeclaredName::new("zoo", "Pet"));
        names.insert_schema(
            &Schema::from_value(json!({ "type": "string", "format": "date" })).unwrap(),
            DeclaredName::new("api", "Date"),
        );

        let schema = json!({
            "oneOf": [
                { "$ref": "#/$defs/pet", "description": "a pet" },
                { "type": "string", "format": "date" }
            ],
            "$defs": { "pet": { "type": "object" } }
        });
        let result = synth_with(schema, &names, SynthOptions::new("api"));
        assert_eq!(result.ty.to_string(), "zoo.Pet | Date");
    }

    #[test]
    fn definition_skips_own_name() {
        let value = json!({ "type": "string", "format": "date" });
        let schema = Schema::from_value(value.clone()).unwrap();
        let mut names = TypeNameTable::new();
        names.insert_schema(&schema, DeclaredName::new("", "Date"));

        let document = Document::from_value(value);
        let source = MemorySource::new();
        let mut synthesizer = Synthesizer::new(&document, &source, &names, SynthOptions::default());
        assert_eq!(synthesizer.type_of(&schema).unwrap().to_string(), "Date");
        assert_eq!(synthesizer.definition_of(&schema).unwrap(), Builtin::String.into());
    }

    #[test]
    fn all_of_is_collated_before_narrowing() {
        let schema = json!({
            "allOf": [
                { "type": "integer", "minimum": 0 },
                { "maximum": 255 }
            ]
        });
        assert_eq!(type_string(schema), "UInt8");
    }

    #[test]
    fn all_of_conflict_is_an_error() {
        let document = Document::from_value(json!({
            "allOf": [{ "type": "string" }, { "type": "integer" }]
        }));
        let source = MemorySource::new();
        let names = TypeNameTable::new();
        let err = synthesize(&document, &source, &names, SynthOptions::default()).unwrap_err();
        assert!(matches!(err, SynthError::Conflict(ref c) if c.field == "type"));
    }

    #[test]
    fn recursion_is_bounded() {
        let schema = json!({
            "$ref": "#/$defs/node",
            "$defs": { "node": { "type": "array", "items": { "$ref": "#/$defs/node" } } }
        });
        let result = synth_with(schema, &TypeNameTable::new(), SynthOptions::default().max_depth(8));
        assert!(result.ty.to_string().contains("Unknown"));
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].code, "S001");
    }

    #[test]
    fn not_constraints_attach() {
        let result = synth(json!({ "type": "number", "not": { "minimum": 0 } }));
        assert_eq!(
            result.ty,
            TypeNode::constrained(
                Builtin::Number.into(),
                vec![Expr::this().member("isPositive").negate()]
            )
        );
    }

    struct NoNames;

    impl TypeNames for NoNames {
        fn lookup(&self, _: &SchemaIdentity) -> Option<DeclaredName> {
            panic!("an empty table is never consulted");
        }

        fn is_empty(&self) -> bool {
            true
        }
    }

    #[test]
    fn empty_name_table_is_skipped() {
        let document = Document::from_value(json!({
            "type": "array",
            "items": { "type": "object", "additionalProperties": { "type": "string" } }
        }));
        let result =
            synthesize(&document, &MemorySource::new(), &NoNames, SynthOptions::default()).unwrap();
        assert_eq!(result.ty.to_string(), "List<Map<String, String>>");
    }
}
