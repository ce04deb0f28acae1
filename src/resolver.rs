//! `$ref` resolution.
//!
//! References are resolved against the referencing document's base URI.
//! Same-document pointers walk the in-memory root; anything else is read
//! through a [`DocumentSource`], parsed, and walked. Every failure is
//! recorded as a [`Diagnostic`] and reported as `None`, never as an error.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

use crate::loader::{Document, DocumentSource};
use crate::pointer::{parse_fragment, walk};
use crate::schema::{Schema, SchemaObject};

/// Longest chain of alias references followed before giving up.
const MAX_ALIAS_HOPS: usize = 32;

/// Keys whose values are instance data, not schemas.
const LITERAL_KEYS: &[&str] = &["const", "enum", "default", "examples"];

/// A recoverable resolution failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub code: &'static str,
    /// The reference (or schema location) being resolved.
    pub reference: String,
    pub message: String,
    /// The value resolution was attempted against, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Diagnostic {
    pub fn new(code: &'static str, reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            reference: reference.into(),
            message: message.into(),
            value: None,
        }
    }

    fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.reference, self.message)
    }
}

/// A successfully resolved reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub schema: Schema,
    /// Absolute URI of the target, fragment included.
    pub uri: Url,
}

/// Resolves references and collects diagnostics along the way.
pub struct Resolver<'s> {
    source: &'s dyn DocumentSource,
    diagnostics: Vec<Diagnostic>,
}

impl<'s> Resolver<'s> {
    pub fn new(source: &'s dyn DocumentSource) -> Self {
        Self {
            source,
            diagnostics: Vec::new(),
        }
    }

    /// Diagnostics recorded so far, oldest first.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Record a diagnostic and emit it as a warning.
    pub fn report(&mut self, diagnostic: Diagnostic) {
        warn!(
            code = diagnostic.code,
            reference = %diagnostic.reference,
            "{}",
            diagnostic.message
        );
        self.diagnostics.push(diagnostic);
    }

    /// Resolve the `$ref` of `schema` against `document`.
    ///
    /// Returns `None` if the schema has no reference or it cannot be resolved.
    pub fn resolve(&mut self, document: &Document, schema: &SchemaObject) -> Option<Resolved> {
        let reference = schema.reference.as_deref()?;
        self.resolve_reference(document, reference)
    }

    /// Resolve a reference string against `document`.
    ///
    /// Targets that are nothing but another `$ref` (plus annotations) are
    /// followed to the end of the chain. A target that carries other keywords
    /// next to its own `$ref` is returned as is.
    pub fn resolve_reference(&mut self, document: &Document, reference: &str) -> Option<Resolved> {
        let mut resolved = self.resolve_once(document, reference)?;
        for _ in 0..MAX_ALIAS_HOPS {
            let next = match &resolved.schema {
                Schema::Object(object) if object.is_annotation_only() => {
                    match object.reference.as_deref() {
                        Some(next) => next.to_string(),
                        None => return Some(resolved),
                    }
                }
                _ => return Some(resolved),
            };
            resolved = self.resolve_once(document, &next)?;
        }
        self.report(Diagnostic::new(
            "R007",
            reference,
            format!("reference chain longer than {} hops", MAX_ALIAS_HOPS),
        ));
        None
    }

    fn resolve_once(&mut self, document: &Document, reference: &str) -> Option<Resolved> {
        let uri = match document.join(reference) {
            Ok(uri) => uri,
            Err(e) => {
                self.report(Diagnostic::new("R001", reference, e.to_string()));
                return None;
            }
        };

        let segments = match parse_fragment(uri.fragment().unwrap_or("")) {
            Ok(segments) => segments,
            Err(e) => {
                self.report(Diagnostic::new("R002", reference, e.to_string()));
                return None;
            }
        };

        let value = if document.contains(&uri) {
            match walk(document.root(), &segments) {
                Ok(target) => target.clone(),
                Err(e) => {
                    self.report(
                        Diagnostic::new("R005", reference, e.message).with_value(e.cursor),
                    );
                    return None;
                }
            }
        } else {
            debug!(uri = %uri, "resolving cross-document reference");
            let bytes = match self.source.read_document(&uri) {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.report(Diagnostic::new("R003", reference, e.to_string()));
                    return None;
                }
            };
            let external = match Document::parse(uri.clone(), &bytes) {
                Ok(external) => external,
                Err(e) => {
                    self.report(Diagnostic::new("R004", reference, e.to_string()));
                    return None;
                }
            };
            match walk(external.root(), &segments) {
                Ok(target) => absolutize_refs(target.clone(), &external),
                Err(e) => {
                    self.report(
                        Diagnostic::new("R005", reference, e.message).with_value(e.cursor),
                    );
                    return None;
                }
            }
        };

        match Schema::from_value(value.clone()) {
            Ok(schema) => Some(Resolved { schema, uri }),
            Err(e) => {
                self.report(
                    Diagnostic::new("R006", reference, format!("target is not a schema: {}", e))
                        .with_value(value),
                );
                None
            }
        }
    }
}

/// Rewrite every relative `$ref` in `value` into an absolute URI against
/// `document`, so the value can be inlined anywhere.
pub fn absolutize_refs(value: Value, document: &Document) -> Value {
    match value {
        Value::Object(map) => {
            let rewritten: Map<String, Value> = map
                .into_iter()
                .map(|(key, child)| {
                    let child = match (key.as_str(), child) {
                        ("$ref", Value::String(reference)) => Value::String(
                            document
                                .join(&reference)
                                .map(|uri| uri.to_string())
                                .unwrap_or(reference),
                        ),
                        (k, literal) if LITERAL_KEYS.contains(&k) => literal,
                        (_, other) => absolutize_refs(other, document),
                    };
                    (key, child)
                })
                .collect();
            Value::Object(rewritten)
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| absolutize_refs(item, document))
                .collect(),
        ),
        other => other,
    }
}
