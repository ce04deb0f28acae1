//! Schema documents and the sources they are read from.
//!
//! Handles loading documents from files, strings, memory and HTTP URLs.
//! Fetching is single-shot and uncached: every call reads the source again.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use url::{Position, Url};

use crate::error::LoadError;
use crate::schema::Schema;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Base URI given to documents that were not read from anywhere.
pub const DEFAULT_BASE_URI: &str = "memory:///schema.json";

/// Reads raw document bytes by absolute URI.
///
/// A missing document is an ordinary outcome: the resolver turns any error
/// into a diagnostic and carries on.
pub trait DocumentSource {
    fn read_document(&self, uri: &Url) -> Result<Vec<u8>, LoadError>;
}

/// Reads `file:` URIs from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSource;

impl DocumentSource for FileSource {
    fn read_document(&self, uri: &Url) -> Result<Vec<u8>, LoadError> {
        if uri.scheme() != "file" {
            return Err(unsupported(uri));
        }
        let path = uri.to_file_path().map_err(|_| LoadError::NotFound {
            uri: uri.to_string(),
        })?;
        read_file(&path)
    }
}

/// Reads `http:` and `https:` URIs with a blocking client.
///
/// Requires the `remote` feature (enabled by default).
#[cfg(feature = "remote")]
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpSource;

#[cfg(feature = "remote")]
impl DocumentSource for HttpSource {
    fn read_document(&self, uri: &Url) -> Result<Vec<u8>, LoadError> {
        if !is_url(uri.as_str()) {
            return Err(unsupported(uri));
        }
        fetch_url(&uri[..Position::AfterQuery])
    }
}

/// Dispatches on the URI scheme: files locally, http(s) over the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSource;

impl DocumentSource for DefaultSource {
    fn read_document(&self, uri: &Url) -> Result<Vec<u8>, LoadError> {
        match uri.scheme() {
            "file" => FileSource.read_document(uri),
            #[cfg(feature = "remote")]
            "http" | "https" => HttpSource.read_document(uri),
            _ => Err(unsupported(uri)),
        }
    }
}

/// Documents held in memory, keyed by URI without fragment.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    documents: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, uri: &Url, contents: impl Into<Vec<u8>>) {
        self.documents
            .insert(uri[..Position::AfterQuery].to_string(), contents.into());
    }

    /// Builder form of [`MemorySource::insert`].
    pub fn with_document(mut self, uri: &Url, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(uri, contents);
        self
    }
}

impl DocumentSource for MemorySource {
    fn read_document(&self, uri: &Url) -> Result<Vec<u8>, LoadError> {
        self.documents
            .get(&uri[..Position::AfterQuery])
            .cloned()
            .ok_or_else(|| LoadError::NotFound {
                uri: uri.to_string(),
            })
    }
}

fn unsupported(uri: &Url) -> LoadError {
    LoadError::UnsupportedScheme {
        uri: uri.to_string(),
        scheme: uri.scheme().to_string(),
    }
}

/// A parsed schema document and the URIs it answers to.
#[derive(Debug, Clone)]
pub struct Document {
    retrieval: Url,
    base: Url,
    root: Arc<Value>,
}

impl Document {
    /// Wrap a parsed value read from `uri`.
    ///
    /// An absolute root `$id` becomes the base for relative references; the
    /// retrieval URI still identifies the document.
    pub fn new(uri: Url, root: Value) -> Self {
        let retrieval = without_fragment(&uri);
        let base = root
            .get("$id")
            .and_then(Value::as_str)
            .and_then(|id| retrieval.join(id).ok())
            .map(|id| without_fragment(&id))
            .unwrap_or_else(|| retrieval.clone());
        Self {
            retrieval,
            base,
            root: Arc::new(root),
        }
    }

    /// Wrap a value that was never read from a URI.
    pub fn from_value(root: Value) -> Self {
        let uri = Url::parse(DEFAULT_BASE_URI).expect("default base URI is valid");
        Self::new(uri, root)
    }

    /// Parse raw bytes read from `uri`.
    pub fn parse(uri: Url, bytes: &[u8]) -> Result<Self, LoadError> {
        Ok(Self::new(uri, parse_schema(bytes)?))
    }

    /// URI the document was read from, without fragment.
    pub fn uri(&self) -> &Url {
        &self.retrieval
    }

    /// Base URI relative references are resolved against.
    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// The root interpreted as a schema.
    pub fn root_schema(&self) -> Result<Schema, LoadError> {
        Schema::from_value(self.root().clone()).map_err(|e| LoadError::InvalidDocument {
            message: e.to_string(),
        })
    }

    /// Resolve a reference string against this document's base.
    pub fn join(&self, reference: &str) -> Result<Url, LoadError> {
        self.base
            .join(reference)
            .map_err(|source| LoadError::InvalidUri {
                uri: reference.to_string(),
                source,
            })
    }

    /// True if `uri` addresses this document: same scheme, authority and
    /// path as the retrieval or base URI. Fragments are ignored.
    pub fn contains(&self, uri: &Url) -> bool {
        same_resource(uri, &self.retrieval) || same_resource(uri, &self.base)
    }
}

fn same_resource(a: &Url, b: &Url) -> bool {
    a[..Position::AfterPath] == b[..Position::AfterPath]
}

fn without_fragment(uri: &Url) -> Url {
    let mut uri = uri.clone();
    uri.set_fragment(None);
    uri
}

/// Parse document bytes as JSON, falling back to YAML.
///
/// # Errors
///
/// Returns `LoadError::InvalidDocument` if the bytes are neither.
pub fn parse_schema(bytes: &[u8]) -> Result<Value, LoadError> {
    match serde_json::from_slice(bytes) {
        Ok(value) => Ok(value),
        Err(json_error) => {
            let looks_like_json = bytes
                .iter()
                .find(|b| !b.is_ascii_whitespace())
                .is_some_and(|b| *b == b'{' || *b == b'[');
            if looks_like_json {
                return Err(LoadError::InvalidDocument {
                    message: json_error.to_string(),
                });
            }
            serde_norway::from_slice(bytes).map_err(|e| LoadError::InvalidDocument {
                message: e.to_string(),
            })
        }
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    debug!(path = %path.display(), "reading schema document");
    std::fs::read(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })
}

/// Fetch a document from an HTTP/HTTPS URL.
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails or the server
/// answers with an error status.
#[cfg(feature = "remote")]
pub fn fetch_url(url: &str) -> Result<Vec<u8>, LoadError> {
    let network = |source| LoadError::NetworkError {
        url: url.to_string(),
        source,
    };

    debug!(url, "fetching schema document");
    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network)?;

    let response = client.get(url).send().map_err(network)?;

    // Check for HTTP errors before reading the body
    let response = response.error_for_status().map_err(network)?;

    response
        .bytes()
        .map(|body| body.to_vec())
        .map_err(network)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load a document from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidDocument` if it isn't JSON or YAML.
pub fn load_document(path: &Path) -> Result<Document, LoadError> {
    let bytes = read_file(path)?;
    let absolute = path.canonicalize().map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    let uri = Url::from_file_path(&absolute).map_err(|_| LoadError::FileNotFound {
        path: absolute.clone(),
    })?;
    Document::parse(uri, &bytes)
}

/// Load a document from a file path or URL.
///
/// Automatically detects whether the source is a URL or file path.
/// URL loading requires the `remote` feature.
pub fn load_document_auto(source: &str) -> Result<Document, LoadError> {
    if is_url(source) {
        let uri = Url::parse(source).map_err(|e| LoadError::InvalidUri {
            uri: source.to_string(),
            source: e,
        })?;
        let bytes = DefaultSource.read_document(&uri)?;
        Document::parse(uri, &bytes)
    } else {
        load_document(Path::new(source))
    }
}

/// Load a document from a JSON or YAML string.
pub fn load_document_str(content: &str) -> Result<Document, LoadError> {
    Ok(Document::from_value(parse_schema(content.as_bytes())?))
}
