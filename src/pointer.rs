//! JSON Pointer (RFC 6901) fragments.
//!
//! Fragments are percent-decoded before `~1`/`~0` unescaping, so a pointer
//! copied out of a URI and one written by hand decode to the same segments.

use std::fmt;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use serde_json::Value;

/// Characters percent-encoded when a segment is written into a URI fragment.
const FRAGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'[')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// One reference token of a JSON Pointer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Index(usize),
    Key(String),
}

impl Segment {
    /// Classify a decoded token. Only canonical digit strings are indices.
    ///
    /// A pointer does not record whether a token was meant as a key, so
    /// `Key("5")` encodes to the same text as `Index(5)` and decodes as the
    /// index. [`walk`] falls back to a key lookup on objects, so both still
    /// reach the same value.
    pub fn from_token(token: String) -> Self {
        let canonical = token == "0" || (!token.starts_with('0') && !token.is_empty());
        if canonical && token.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = token.parse() {
                return Segment::Index(index);
            }
        }
        Segment::Key(token)
    }

    fn as_key(&self) -> std::borrow::Cow<'_, str> {
        match self {
            Segment::Index(index) => index.to_string().into(),
            Segment::Key(key) => key.as_str().into(),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_key())
    }
}

impl From<&str> for Segment {
    fn from(key: &str) -> Self {
        Segment::Key(key.to_string())
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        Segment::Index(index)
    }
}

/// Error decoding a fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerError {
    /// The fragment is non-empty but does not start with `/`.
    NotAPointer(String),
    /// A token is not valid UTF-8 after percent-decoding.
    InvalidEncoding(String),
}

impl fmt::Display for PointerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointerError::NotAPointer(fragment) => {
                write!(f, "fragment \"{}\" is not a JSON Pointer", fragment)
            }
            PointerError::InvalidEncoding(token) => {
                write!(f, "token \"{}\" is not valid UTF-8", token)
            }
        }
    }
}

/// Decode a URI fragment (with or without the leading `#`) into segments.
///
/// The empty fragment and `#` both address the document root.
pub fn parse_fragment(fragment: &str) -> Result<Vec<Segment>, PointerError> {
    let pointer = fragment.strip_prefix('#').unwrap_or(fragment);
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = pointer.strip_prefix('/') else {
        return Err(PointerError::NotAPointer(fragment.to_string()));
    };

    rest.split('/')
        .map(|raw| {
            let decoded = percent_decode_str(raw)
                .decode_utf8()
                .map_err(|_| PointerError::InvalidEncoding(raw.to_string()))?;
            Ok(Segment::from_token(
                decoded.replace("~1", "/").replace("~0", "~"),
            ))
        })
        .collect()
}

/// Encode segments as a fragment, including the leading `#`.
pub fn to_fragment(segments: &[Segment]) -> String {
    let mut out = String::from("#");
    for segment in segments {
        out.push('/');
        let escaped = segment.as_key().replace('~', "~0").replace('/', "~1");
        out.extend(utf8_percent_encode(&escaped, FRAGMENT));
    }
    out
}

/// Why a pointer walk stopped.
#[derive(Debug, Clone, PartialEq)]
pub struct WalkError {
    /// Segments consumed before the failure, the failing one last.
    pub at: Vec<Segment>,
    /// The value the failing segment was applied to.
    pub cursor: Value,
    pub message: String,
}

/// Walk `segments` from `root`, returning the addressed value.
///
/// An index addresses an array element; on a record it is looked up as the
/// key of the same text. Any other mismatch fails without a partial result.
pub fn walk<'v>(root: &'v Value, segments: &[Segment]) -> Result<&'v Value, WalkError> {
    let mut cursor = root;
    for (depth, segment) in segments.iter().enumerate() {
        let next = match (segment, cursor) {
            (Segment::Index(index), Value::Array(items)) => items.get(*index).ok_or_else(|| {
                format!("index {} out of bounds (length {})", index, items.len())
            }),
            (Segment::Index(_), Value::Object(map)) | (Segment::Key(_), Value::Object(map)) => map
                .get(segment.as_key().as_ref())
                .ok_or_else(|| format!("no property \"{}\"", segment)),
            (Segment::Index(index), other) => Err(format!(
                "cannot index {} with {}",
                crate::schema::json_type_name(other),
                index
            )),
            (Segment::Key(key), other) => Err(format!(
                "cannot look up \"{}\" in {}",
                key,
                crate::schema::json_type_name(other)
            )),
        };
        cursor = next.map_err(|message| WalkError {
            at: segments[..=depth].to_vec(),
            cursor: cursor.clone(),
            message,
        })?;
    }
    Ok(cursor)
}
