//! HTTP transport port definition.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Request headers keyed by lowercase name.
pub type Headers = BTreeMap<String, String>;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// Whether the transport may serve or store the response in its own cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CachePolicy {
    /// Transport defaults apply.
    #[default]
    Default,
    /// Any transport-level cache must be bypassed.
    Bypass,
}

/// File part of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartUpload {
    /// Raw file bytes.
    pub file: Bytes,
    /// File name sent with the part.
    pub file_name: String,
    /// Form field the file is attached to.
    pub field_name: String,
    /// MIME type of the file.
    pub mime_type: String,
    /// Extra text fields sent alongside the file.
    pub fields: Vec<(String, String)>,
}

impl MultipartUpload {
    /// Default form field for uploaded files.
    pub const DEFAULT_FIELD: &'static str = "image";
    /// Default MIME type for uploaded files.
    pub const DEFAULT_MIME: &'static str = "image/jpeg";

    /// Creates an upload with the default field name and MIME type.
    #[must_use]
    pub fn new(file: impl Into<Bytes>, file_name: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            file_name: file_name.into(),
            field_name: Self::DEFAULT_FIELD.to_string(),
            mime_type: Self::DEFAULT_MIME.to_string(),
            fields: Vec::new(),
        }
    }

    /// Sets the form field the file is attached to.
    #[must_use]
    pub fn field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = name.into();
        self
    }

    /// Sets the MIME type.
    #[must_use]
    pub fn mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = mime.into();
        self
    }

    /// Adds an extra text field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }
}

/// Request body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// Serialized JSON document.
    Json(Bytes),
    /// Multipart form.
    Multipart(MultipartUpload),
}

/// A fully built request handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method.
    pub method: HttpMethod,
    /// Absolute URL.
    pub url: String,
    /// Headers keyed by lowercase name.
    pub headers: Headers,
    /// Body.
    pub body: RequestBody,
    /// Transport cache policy.
    pub cache_policy: CachePolicy,
}

impl HttpRequest {
    /// Creates a request without headers or body.
    #[must_use]
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            body: RequestBody::Empty,
            cache_policy: CachePolicy::Default,
        }
    }

    /// Returns a header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Raw response returned by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Numeric status code.
    pub status: u16,
    /// Raw body.
    pub body: Bytes,
}

impl HttpResponse {
    /// Creates response.
    #[must_use]
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Failure to obtain any response.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Request timed out.
    #[error("request timed out")]
    Timeout,
    /// Connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),
    /// Request could not be built from the given parts.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Any other transport failure.
    #[error("network call failed: {0}")]
    Other(String),
}

/// Port for executing HTTP requests.
/// Implementations must be thread-safe.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends the request and returns status and body.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}
