//! `allOf` collation.
//!
//! Folds every `allOf` branch into one effective schema. Each branch is
//! ref-resolved and collated first, then merged field by field. Keywords
//! with no merge rule keep the left value if set, else the right one.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::MergeConflict;
use crate::loader::Document;
use crate::resolver::{Diagnostic, Resolver};
use crate::schema::{Items, Schema, SchemaObject};

/// Nesting limit for branches that keep pulling in more references.
const MAX_MERGE_DEPTH: usize = 64;

/// Marker placed between two merged titles or descriptions.
pub const TEXT_SEPARATOR: &str = "\n---\n";

/// Collate `schema`'s `allOf` branches with the rest of its keywords.
///
/// Branches whose `$ref` cannot be resolved are reported and skipped.
///
/// # Errors
///
/// Returns `MergeConflict` if two branches disagree on a keyword that has
/// no merged form.
pub fn collate(
    resolver: &mut Resolver<'_>,
    document: &Document,
    schema: &SchemaObject,
) -> Result<Schema, MergeConflict> {
    Merger::new(resolver, document).collate(schema)
}

/// Merge two schemas as if they were the branches of one `allOf`.
pub fn merge(
    resolver: &mut Resolver<'_>,
    document: &Document,
    left: Schema,
    right: Schema,
) -> Result<Schema, MergeConflict> {
    Merger::new(resolver, document).collate(&SchemaObject {
        all_of: Some(vec![left, right]),
        ..SchemaObject::default()
    })
}

/// Merge a resolved `$ref` target into the schema that referenced it.
///
/// Keywords next to the `$ref` keep applying.
pub fn inline_reference(
    resolver: &mut Resolver<'_>,
    document: &Document,
    schema: &SchemaObject,
    target: Schema,
) -> Result<Schema, MergeConflict> {
    Merger::new(resolver, document).merge(Schema::from(schema.without_ref()), target)
}

struct Merger<'a, 's> {
    resolver: &'a mut Resolver<'s>,
    document: &'a Document,
    depth: usize,
}

impl<'a, 's> Merger<'a, 's> {
    fn new(resolver: &'a mut Resolver<'s>, document: &'a Document) -> Self {
        Self {
            resolver,
            document,
            depth: 0,
        }
    }

    fn collate(&mut self, schema: &SchemaObject) -> Result<Schema, MergeConflict> {
        let branches = schema.all_of.clone().unwrap_or_default();
        debug!(branches = branches.len(), "collating allOf");

        let base = Schema::from(SchemaObject {
            all_of: None,
            ..schema.clone()
        });
        let mut merged = match self.prepare(base)? {
            Some(base) => base,
            None => Schema::from(SchemaObject::default()),
        };
        for branch in branches {
            if let Some(branch) = self.prepare(branch)? {
                merged = self.merge(merged, branch)?;
            }
        }
        Ok(merged)
    }

    /// Resolve a branch's `$ref` and collate its own `allOf`.
    fn prepare(&mut self, schema: Schema) -> Result<Option<Schema>, MergeConflict> {
        let Schema::Object(object) = schema else {
            return Ok(Some(schema));
        };

        if self.depth >= MAX_MERGE_DEPTH {
            self.resolver.report(Diagnostic::new(
                "M001",
                object.reference.clone().unwrap_or_default(),
                format!("allOf nesting deeper than {}", MAX_MERGE_DEPTH),
            ));
            return Ok(None);
        }

        if object.reference.is_some() {
            let Some(resolved) = self.resolver.resolve(self.document, &object) else {
                return Ok(None);
            };
            self.depth += 1;
            let inlined = self.merge(Schema::from(object.without_ref()), resolved.schema);
            let prepared = inlined.and_then(|inlined| self.prepare(inlined));
            self.depth -= 1;
            return prepared;
        }

        if object.all_of.as_ref().is_some_and(|branches| !branches.is_empty()) {
            self.depth += 1;
            let collated = self.collate(&object);
            self.depth -= 1;
            return collated.map(Some);
        }

        Ok(Some(Schema::Object(object)))
    }

    fn merge(&mut self, left: Schema, right: Schema) -> Result<Schema, MergeConflict> {
        match (left, right) {
            (Schema::Bool(false), _) | (_, Schema::Bool(false)) => Ok(Schema::Bool(false)),
            (Schema::Bool(true), other) | (other, Schema::Bool(true)) => Ok(other),
            (Schema::Object(l), Schema::Object(r)) => {
                self.merge_objects(*l, *r).map(Schema::from)
            }
        }
    }

    /// Collate two schemas as a synthetic two-branch `allOf`.
    fn collate_pair(&mut self, left: Schema, right: Schema) -> Result<Schema, MergeConflict> {
        self.depth += 1;
        let collated = self.collate(&SchemaObject {
            all_of: Some(vec![left, right]),
            ..SchemaObject::default()
        });
        self.depth -= 1;
        collated
    }

    /// Sub-schema keywords: boolean schemas are OR-ed, records collated.
    fn merge_subschema(
        &mut self,
        field: &'static str,
        left: Option<Schema>,
        right: Option<Schema>,
    ) -> Result<Option<Schema>, MergeConflict> {
        match (left, right) {
            (Some(Schema::Bool(a)), Some(Schema::Bool(b))) => Ok(Some(Schema::Bool(a || b))),
            (Some(a @ Schema::Object(_)), Some(b @ Schema::Object(_))) => {
                self.collate_pair(a, b).map(Some)
            }
            (Some(a), Some(b)) => Err(MergeConflict::new(field, a.to_value(), b.to_value())),
            (a, b) => Ok(a.or(b)),
        }
    }

    fn merge_items(
        &mut self,
        left: Option<Items>,
        right: Option<Items>,
    ) -> Result<Option<Items>, MergeConflict> {
        match (left, right) {
            (Some(Items::Single(a)), Some(Items::Single(b))) => Ok(self
                .merge_subschema("items", Some(a), Some(b))?
                .map(Items::Single)),
            (a, b) => Ok(a.or(b)),
        }
    }

    fn merge_properties(
        &mut self,
        left: Option<IndexMap<String, Schema>>,
        right: Option<IndexMap<String, Schema>>,
    ) -> Result<Option<IndexMap<String, Schema>>, MergeConflict> {
        match (left, right) {
            (Some(mut merged), Some(right)) => {
                for (name, schema) in right {
                    let combined = match merged.get(&name) {
                        Some(existing) => self.collate_pair(existing.clone(), schema)?,
                        None => schema,
                    };
                    merged.insert(name, combined);
                }
                Ok(Some(merged))
            }
            (a, b) => Ok(a.or(b)),
        }
    }

    fn merge_objects(
        &mut self,
        l: SchemaObject,
        r: SchemaObject,
    ) -> Result<SchemaObject, MergeConflict> {
        let mut extra = l.extra;
        for (key, value) in r.extra {
            extra.entry(key).or_insert(value);
        }

        Ok(SchemaObject {
            id: l.id.or(r.id),
            reference: l.reference.or(r.reference),
            meta_schema: l.meta_schema.or(r.meta_schema),

            title: join_text(l.title, r.title),
            description: join_text(l.description, r.description),
            default: l.default.or(r.default),
            examples: l.examples.or(r.examples),
            deprecated: agree_or_null("deprecated", l.deprecated, r.deprecated)?,
            read_only: agree_or_null("readOnly", l.read_only, r.read_only)?,
            write_only: agree_or_null("writeOnly", l.write_only, r.write_only)?,

            type_: conflict_if_differ("type", l.type_, r.type_)?,

            minimum: greater(l.minimum, r.minimum),
            maximum: lesser(l.maximum, r.maximum),
            exclusive_minimum: greater(l.exclusive_minimum, r.exclusive_minimum),
            exclusive_maximum: lesser(l.exclusive_maximum, r.exclusive_maximum),
            multiple_of: lcm(l.multiple_of, r.multiple_of)?,

            min_length: greater(l.min_length, r.min_length),
            max_length: lesser(l.max_length, r.max_length),
            pattern: alternate(l.pattern, r.pattern),
            format: conflict_if_differ("format", l.format, r.format)?,

            items: self.merge_items(l.items, r.items)?,
            additional_items: self.merge_subschema(
                "additionalItems",
                l.additional_items,
                r.additional_items,
            )?,
            min_items: greater(l.min_items, r.min_items),
            max_items: lesser(l.max_items, r.max_items),
            unique_items: match (l.unique_items, r.unique_items) {
                (Some(a), Some(b)) => Some(a || b),
                (a, b) => a.or(b),
            },
            contains: l.contains.or(r.contains),

            properties: self.merge_properties(l.properties, r.properties)?,
            pattern_properties: self
                .merge_properties(l.pattern_properties, r.pattern_properties)?,
            additional_properties: self.merge_subschema(
                "additionalProperties",
                l.additional_properties,
                r.additional_properties,
            )?,
            required: union(l.required, r.required),
            property_names: self.merge_subschema(
                "propertyNames",
                l.property_names,
                r.property_names,
            )?,
            min_properties: greater(l.min_properties, r.min_properties),
            max_properties: lesser(l.max_properties, r.max_properties),

            enum_: intersect("enum", l.enum_, r.enum_)?,
            const_: conflict_if_differ("const", l.const_, r.const_)?,

            one_of: intersect("oneOf", l.one_of, r.one_of)?,
            any_of: intersect("anyOf", l.any_of, r.any_of)?,
            all_of: l.all_of.or(r.all_of),
            not: self.merge_subschema("not", l.not, r.not)?,

            extra,
        })
    }
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn conflict_if_differ<T: PartialEq + Serialize>(
    field: &'static str,
    left: Option<T>,
    right: Option<T>,
) -> Result<Option<T>, MergeConflict> {
    match (left, right) {
        (Some(a), Some(b)) if a != b => Err(MergeConflict::new(field, to_json(&a), to_json(&b))),
        (a, b) => Ok(a.or(b)),
    }
}

fn agree_or_null(
    field: &'static str,
    left: Option<bool>,
    right: Option<bool>,
) -> Result<Option<bool>, MergeConflict> {
    match (left, right) {
        (Some(a), Some(b)) if a == b => Ok(Some(a)),
        (Some(a), Some(b)) => Err(MergeConflict::new(field, a, b)),
        _ => Ok(None),
    }
}

fn greater<T: PartialOrd>(left: Option<T>, right: Option<T>) -> Option<T> {
    match (left, right) {
        (Some(a), Some(b)) => Some(if b > a { b } else { a }),
        (a, b) => a.or(b),
    }
}

fn lesser<T: PartialOrd>(left: Option<T>, right: Option<T>) -> Option<T> {
    match (left, right) {
        (Some(a), Some(b)) => Some(if b < a { b } else { a }),
        (a, b) => a.or(b),
    }
}

fn join_text(left: Option<String>, right: Option<String>) -> Option<String> {
    match (left, right) {
        (Some(a), Some(b)) if a != b => Some(format!("{}{}{}", a, TEXT_SEPARATOR, b)),
        (a, b) => a.or(b),
    }
}

fn alternate(left: Option<String>, right: Option<String>) -> Option<String> {
    match (left, right) {
        (Some(a), Some(b)) if a != b => Some(format!("(?:{})|(?:{})", a, b)),
        (a, b) => a.or(b),
    }
}

fn union(left: Option<Vec<String>>, right: Option<Vec<String>>) -> Option<Vec<String>> {
    match (left, right) {
        (Some(mut merged), Some(right)) => {
            for name in right {
                if !merged.contains(&name) {
                    merged.push(name);
                }
            }
            Some(merged)
        }
        (a, b) => a.or(b),
    }
}

fn intersect<T: PartialEq + Serialize>(
    field: &'static str,
    left: Option<Vec<T>>,
    right: Option<Vec<T>>,
) -> Result<Option<Vec<T>>, MergeConflict> {
    match (left, right) {
        (Some(a), Some(b)) => {
            let left_json = to_json(&a);
            let common: Vec<T> = a.into_iter().filter(|item| b.contains(item)).collect();
            if common.is_empty() {
                return Err(MergeConflict::new(field, left_json, to_json(&b)));
            }
            Ok(Some(common))
        }
        (a, b) => Ok(a.or(b)),
    }
}

/// Integers up to 2^53 round-trip through `f64` exactly.
const MAX_EXACT_INTEGER: u64 = 1 << 53;

fn lcm(left: Option<f64>, right: Option<f64>) -> Result<Option<f64>, MergeConflict> {
    match (left, right) {
        (Some(a), Some(b)) if a == b => Ok(Some(a)),
        (Some(a), Some(b)) => match (exact_integer(a), exact_integer(b)) {
            (Some(x), Some(y)) => (x / gcd(x, y))
                .checked_mul(y)
                .filter(|product| *product <= MAX_EXACT_INTEGER)
                .map(|product| Some(product as f64))
                .ok_or_else(|| MergeConflict::new("multipleOf", a, b)),
            _ => Err(MergeConflict::new("multipleOf", a, b)),
        },
        (a, b) => Ok(a.or(b)),
    }
}

fn exact_integer(value: f64) -> Option<u64> {
    (value.fract() == 0.0 && value > 0.0 && value <= MAX_EXACT_INTEGER as f64)
        .then_some(value as u64)
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}
