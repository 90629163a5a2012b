//! Request descriptors and query serialization
//!
//! A `RequestDescriptor` captures everything needed to issue one fetch: URL,
//! method, headers, JSON body, query parameters and an optional bearer token.
//! The effective URL (URL plus serialized query parameters) doubles as the
//! cache key, so query serialization must be deterministic.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::transport::TransportRequest;

/// Errors raised while turning a descriptor into a request, before any I/O
#[derive(Debug, Error, PartialEq)]
pub enum RequestError {
    /// The URL could not be parsed
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The HTTP method is not one we know how to send
    #[error("Unsupported HTTP method: '{0}'")]
    UnsupportedMethod(String),

    /// A header name or value is not valid HTTP
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

/// HTTP methods supported by the fetcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Method {
    /// Returns the method as it appears on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = RequestError;

    /// Parses a method name, case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            _ => Err(RequestError::UnsupportedMethod(s.to_string())),
        }
    }
}

/// A primitive query parameter value
///
/// Deserializes from a bare JSON scalar, so `{"a": 1, "b": "x"}` maps to
/// `Int(1)` and `Str("x")`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Bool(b) => write!(f, "{}", b),
            QueryValue::Int(i) => write!(f, "{}", i),
            QueryValue::Float(x) => write!(f, "{}", x),
            QueryValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        QueryValue::Bool(value)
    }
}

impl From<i32> for QueryValue {
    fn from(value: i32) -> Self {
        QueryValue::Int(value.into())
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        QueryValue::Int(value)
    }
}

impl From<u32> for QueryValue {
    fn from(value: u32) -> Self {
        QueryValue::Int(value.into())
    }
}

impl From<f64> for QueryValue {
    fn from(value: f64) -> Self {
        QueryValue::Float(value)
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Str(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Str(value)
    }
}

/// Everything needed to issue a single fetch
///
/// Descriptors are plain values: build one, hand it to the fetcher, and it is
/// never mutated afterwards. Query parameters are kept sorted by key so that
/// the same parameter set always produces the same effective URL.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestDescriptor {
    /// Base URL, possibly already carrying a query string
    pub url: String,
    /// HTTP method
    pub method: Method,
    /// Caller-supplied headers, in insertion order
    pub headers: Vec<(String, String)>,
    /// JSON body, if any
    pub body: Option<Value>,
    /// Query parameters appended to the URL
    pub query_params: BTreeMap<String, QueryValue>,
    /// Bearer token for the Authorization header
    pub auth_token: Option<String>,
}

impl RequestDescriptor {
    /// Creates a GET descriptor for the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.query_params.insert(key.into(), value.into());
        self
    }

    pub fn json_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Builds the URL actually requested, which is also the cache key
    ///
    /// Query parameters are appended in sorted key order, form-urlencoded,
    /// after any query the base URL already carries and before its fragment.
    ///
    /// # Returns
    /// * `Ok(String)` - The normalized URL with the serialized query appended
    /// * `Err(RequestError::InvalidUrl)` - If the base URL does not parse
    pub fn effective_url(&self) -> Result<String, RequestError> {
        let mut url = Url::parse(&self.url).map_err(|e| RequestError::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;

        if !self.query_params.is_empty() {
            url.query_pairs_mut().extend_pairs(
                self.query_params
                    .iter()
                    .map(|(key, value)| (key, value.to_string())),
            );
        }

        Ok(url.into())
    }

    /// Assembles the final header list
    ///
    /// Adds `Content-Type` when a body is present and the caller did not set
    /// one, and `Authorization: Bearer <token>` when a token is present. The
    /// token replaces any caller-supplied Authorization header.
    pub fn effective_headers(&self, default_content_type: &str) -> Vec<(String, String)> {
        let mut headers: Vec<(String, String)> = self
            .headers
            .iter()
            .filter(|(name, _)| {
                self.auth_token.is_none() || !name.eq_ignore_ascii_case(AUTHORIZATION.as_str())
            })
            .cloned()
            .collect();

        let has_content_type = headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()));
        if self.body.is_some() && !has_content_type {
            headers.push((
                CONTENT_TYPE.as_str().to_string(),
                default_content_type.to_string(),
            ));
        }

        if let Some(ref token) = self.auth_token {
            headers.push((
                AUTHORIZATION.as_str().to_string(),
                format!("Bearer {}", token),
            ));
        }

        headers
    }

    /// Validates the descriptor and converts it into a transport request
    pub fn to_transport_request(
        &self,
        default_content_type: &str,
    ) -> Result<TransportRequest, RequestError> {
        let url = self.effective_url()?;
        let headers = self.effective_headers(default_content_type);

        for (name, value) in &headers {
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| RequestError::InvalidHeader(format!("bad name '{}'", name)))?;
            HeaderValue::from_str(value)
                .map_err(|_| RequestError::InvalidHeader(format!("bad value for '{}'", name)))?;
        }

        Ok(TransportRequest {
            method: self.method,
            url,
            headers,
            body: self.body.as_ref().map(Value::to_string),
        })
    }
}
