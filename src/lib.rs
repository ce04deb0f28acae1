//! JSON Schema type synthesis
//!
//! Maps JSON Schema documents (draft 6 and later) onto static types plus the
//! runtime constraints those types cannot express.
//!
//! The pipeline has four parts:
//!
//! - [`Resolver`] follows `$ref` pointers, within a document or across
//!   documents read through a [`DocumentSource`].
//! - [`collate`] merges `allOf` branches into one effective schema, failing
//!   with [`MergeConflict`] when the branches cannot all hold.
//! - [`constraints_for`] turns the keywords a type leaves open into
//!   predicates over `this`.
//! - [`Synthesizer`] drives the other three and picks the narrowest type.
//!
//! # Example
//!
//! ```
//! use schema_synth::{synthesize, Document, MemorySource, SynthOptions, TypeNameTable};
//! use serde_json::json;
//!
//! let document = Document::from_value(json!({
//!     "type": "array",
//!     "items": { "$ref": "#/$defs/port" },
//!     "minItems": 1,
//!     "$defs": {
//!         "port": { "type": "integer", "minimum": 0, "maximum": 65535 }
//!     }
//! }));
//!
//! let result = synthesize(
//!     &document,
//!     &MemorySource::new(),
//!     &TypeNameTable::new(),
//!     SynthOptions::default(),
//! )
//! .unwrap();
//!
//! assert_eq!(result.ty.to_string(), "List<UInt16> where !this.isEmpty");
//! assert!(result.diagnostics.is_empty());
//! ```
//!
//! # Degradation
//!
//! | Failure | Result |
//! |---------|--------|
//! | `$ref` cannot be resolved | `Unknown` type, one diagnostic |
//! | external document missing or unparsable | `Unknown` type, one diagnostic |
//! | nesting deeper than `max_depth` | `Unknown` type, one diagnostic |
//! | `allOf` branches disagree | `Err(MergeConflict)` |

mod constraints;
mod error;
mod expr;
mod loader;
mod merge;
mod pointer;
mod resolver;
mod schema;
mod synth;
mod types;

pub use constraints::constraints_for;
pub use error::{LoadError, MergeConflict, SynthError};
pub use expr::{BinOp, Expr};
pub use loader::{
    is_url, load_document, load_document_auto, load_document_str, parse_schema, DefaultSource,
    Document, DocumentSource, FileSource, MemorySource, DEFAULT_BASE_URI,
};
pub use merge::{collate, inline_reference, merge, TEXT_SEPARATOR};
pub use pointer::{parse_fragment, to_fragment, walk, PointerError, Segment, WalkError};
pub use resolver::{absolutize_refs, Diagnostic, Resolved, Resolver};
pub use schema::{
    json_type_name, InstanceType, Items, Schema, SchemaIdentity, SchemaObject, TypeSet,
};
pub use synth::{synthesize, Shape, Synthesis, Synthesizer};
pub use types::{
    Builtin, DeclaredName, SynthOptions, TypeNameTable, TypeNames, TypeNode, DEFAULT_MAX_DEPTH,
};

#[cfg(feature = "remote")]
pub use loader::{fetch_url, HttpSource};
