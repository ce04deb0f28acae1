//! JSON Schema value model.
//!
//! A [`Schema`] is either a boolean schema or a [`SchemaObject`] record of the
//! keywords this crate understands. Every other sibling key is kept in the
//! record's `extra` bag so nothing is lost when a schema is merged or
//! re-serialized.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use url::Url;

/// Returns the JSON type name for diagnostics.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A schema node: `true`, `false`, or a keyword record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Schema {
    Bool(bool),
    Object(Box<SchemaObject>),
}

impl Default for Schema {
    fn default() -> Self {
        Schema::Bool(true)
    }
}

impl From<SchemaObject> for Schema {
    fn from(object: SchemaObject) -> Self {
        Schema::Object(Box::new(object))
    }
}

impl Schema {
    /// Interpret a JSON value as a schema.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn as_object(&self) -> Option<&SchemaObject> {
        match self {
            Schema::Object(object) => Some(object),
            Schema::Bool(_) => None,
        }
    }
}

/// JSON Schema primitive type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceType {
    Null,
    Boolean,
    Object,
    Array,
    Number,
    String,
    Integer,
}

impl InstanceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceType::Null => "null",
            InstanceType::Boolean => "boolean",
            InstanceType::Object => "object",
            InstanceType::Array => "array",
            InstanceType::Number => "number",
            InstanceType::String => "string",
            InstanceType::Integer => "integer",
        }
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawTypeSet {
    Single(InstanceType),
    Many(Vec<InstanceType>),
}

/// The `type` keyword: a single name or a non-empty list of distinct names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTypeSet", into = "RawTypeSet")]
pub enum TypeSet {
    Single(InstanceType),
    Many(Vec<InstanceType>),
}

impl TryFrom<RawTypeSet> for TypeSet {
    type Error = String;

    fn try_from(raw: RawTypeSet) -> Result<Self, Self::Error> {
        match raw {
            RawTypeSet::Single(single) => Ok(TypeSet::Single(single)),
            RawTypeSet::Many(many) => {
                if many.is_empty() {
                    return Err("type list must not be empty".to_string());
                }
                for (i, name) in many.iter().enumerate() {
                    if many[..i].contains(name) {
                        return Err(format!("duplicate type name \"{}\"", name));
                    }
                }
                Ok(TypeSet::Many(many))
            }
        }
    }
}

impl From<TypeSet> for RawTypeSet {
    fn from(set: TypeSet) -> Self {
        match set {
            TypeSet::Single(single) => RawTypeSet::Single(single),
            TypeSet::Many(many) => RawTypeSet::Many(many),
        }
    }
}

impl TypeSet {
    /// Build a set from a list, collapsing a one-element list.
    pub fn from_types(types: Vec<InstanceType>) -> Option<Self> {
        match types.len() {
            0 => None,
            1 => Some(TypeSet::Single(types[0])),
            _ => Some(TypeSet::Many(types)),
        }
    }

    pub fn types(&self) -> &[InstanceType] {
        match self {
            TypeSet::Single(single) => std::slice::from_ref(single),
            TypeSet::Many(many) => many,
        }
    }

    pub fn contains(&self, ty: InstanceType) -> bool {
        self.types().contains(&ty)
    }

    pub fn len(&self) -> usize {
        self.types().len()
    }

    pub fn is_empty(&self) -> bool {
        self.types().is_empty()
    }
}

/// The `items` keyword: one schema for every element, or a positional tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Items {
    Single(Schema),
    Tuple(Vec<Schema>),
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// A structured schema record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchemaObject {
    // Identity
    #[serde(rename = "$id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub meta_schema: Option<String>,

    // Metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_only: Option<bool>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<TypeSet>,

    // Numbers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<f64>,

    // Strings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    // Arrays
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Items>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_items: Option<Schema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_items: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contains: Option<Schema>,

    // Objects
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, Schema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern_properties: Option<IndexMap<String, Schema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Schema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_names: Option<Schema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_properties: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_properties: Option<u64>,

    // Value restriction
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_: Option<Vec<Value>>,
    #[serde(
        rename = "const",
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub const_: Option<Value>,

    // Combinators
    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<Schema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<Schema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_of: Option<Vec<Schema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not: Option<Schema>,

    /// Keys this model does not name (`$defs`, vendor extensions, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SchemaObject {
    /// The allowed literal values from `const` or `enum`, `const` first.
    pub fn literal_values(&self) -> Option<Vec<&Value>> {
        if let Some(value) = &self.const_ {
            return Some(vec![value]);
        }
        self.enum_.as_ref().map(|values| values.iter().collect())
    }

    /// True if `type` names this primitive.
    pub fn declares(&self, ty: InstanceType) -> bool {
        self.type_.as_ref().is_some_and(|set| set.contains(ty))
    }

    /// Integer-valued: `type: "integer"` or a whole-number `multipleOf`.
    pub fn is_integral(&self) -> bool {
        let declared = self.declares(InstanceType::Integer) && !self.declares(InstanceType::Number);
        declared || self.multiple_of.is_some_and(|m| m.fract() == 0.0)
    }

    /// A copy without the `$ref` keyword.
    pub fn without_ref(&self) -> SchemaObject {
        SchemaObject {
            reference: None,
            ..self.clone()
        }
    }

    /// True if nothing but identity and metadata keywords are set.
    pub fn is_annotation_only(&self) -> bool {
        let stripped = SchemaObject {
            id: None,
            reference: None,
            meta_schema: None,
            title: None,
            description: None,
            default: None,
            examples: None,
            deprecated: None,
            read_only: None,
            write_only: None,
            extra: self
                .extra
                .iter()
                .filter(|(key, _)| !matches!(key.as_str(), "$comment" | "$defs" | "definitions"))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            ..self.clone()
        };
        stripped == SchemaObject::default()
    }
}

/// Stable identity of a schema, used as the type-name table key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SchemaIdentity {
    /// Absolute URI of a `$ref` target, fragment included.
    Reference(String),
    /// Canonical JSON text of the schema value.
    Structural(String),
}

impl SchemaIdentity {
    pub fn reference(uri: &Url) -> Self {
        SchemaIdentity::Reference(uri.as_str().to_string())
    }

    pub fn structural(schema: &Schema) -> Self {
        SchemaIdentity::Structural(serde_json::to_string(schema).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> SchemaObject {
        match Schema::from_value(value).unwrap() {
            Schema::Object(object) => *object,
            Schema::Bool(b) => panic!("expected object schema, got {}", b),
        }
    }

    #[test]
    fn boolean_schemas() {
        assert_eq!(Schema::from_value(json!(true)).unwrap(), Schema::Bool(true));
        assert_eq!(Schema::from_value(json!(false)).unwrap(), Schema::Bool(false));
    }

    #[test]
    fn parses_keywords_by_kind() {
        let schema = object(json!({
            "type": "integer",
            "minimum": 0,
            "exclusiveMaximum": 10,
            "multipleOf": 2
        }));
        assert_eq!(schema.type_, Some(TypeSet::Single(InstanceType::Integer)));
        assert_eq!(schema.minimum, Some(0.0));
        assert_eq!(schema.exclusive_maximum, Some(10.0));
        assert!(schema.is_integral());
    }

    #[test]
    fn unknown_keys_land_in_extra() {
        let schema = object(json!({
            "$ref": "#/$defs/a",
            "x-kind": "money",
            "$defs": { "a": { "type": "string" } }
        }));
        assert_eq!(schema.reference.as_deref(), Some("#/$defs/a"));
        assert_eq!(schema.extra["x-kind"], json!("money"));
        assert!(schema.extra.contains_key("$defs"));
    }

    #[test]
    fn const_null_is_present() {
        let schema = object(json!({ "const": null }));
        assert_eq!(schema.const_, Some(Value::Null));
        let schema = object(json!({}));
        assert_eq!(schema.const_, None);
    }

    #[test]
    fn type_list_must_be_distinct_and_non_empty() {
        assert!(Schema::from_value(json!({ "type": [] })).is_err());
        assert!(Schema::from_value(json!({ "type": ["string", "string"] })).is_err());
        let schema = object(json!({ "type": ["string", "null"] }));
        assert_eq!(
            schema.type_.unwrap().types(),
            &[InstanceType::String, InstanceType::Null]
        );
    }

    #[test]
    fn items_single_and_tuple() {
        let schema = object(json!({ "items": { "type": "string" } }));
        assert!(matches!(schema.items, Some(Items::Single(_))));
        let schema = object(json!({ "items": [{ "type": "string" }, true] }));
        assert!(matches!(schema.items, Some(Items::Tuple(ref t)) if t.len() == 2));
    }

    #[test]
    fn serializes_back_to_the_same_json() {
        let value = json!({
            "type": "object",
            "properties": { "b": { "type": "string" }, "a": true },
            "required": ["b"],
            "x-extra": 1
        });
        let schema = Schema::from_value(value.clone()).unwrap();
        assert_eq!(schema.to_value(), value);
    }

    #[test]
    fn annotation_only_detection() {
        assert!(object(json!({ "title": "T", "description": "d" })).is_annotation_only());
        assert!(!object(json!({ "title": "T", "minimum": 1 })).is_annotation_only());
        assert!(!object(json!({ "x-unknown": 1 })).is_annotation_only());
    }

    #[test]
    fn structural_identity_is_stable() {
        let a = Schema::from_value(json!({ "type": "string", "minLength": 1 })).unwrap();
        let b = Schema::from_value(json!({ "type": "string", "minLength": 1 })).unwrap();
        assert_eq!(SchemaIdentity::structural(&a), SchemaIdentity::structural(&b));
    }
}
