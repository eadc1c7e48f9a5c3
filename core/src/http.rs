//! HTTP request/response types and the request builder.
//!
//! # Design
//! Requests and responses are plain data. The client builds an `HttpRequest`
//! and hands it to a [`Transport`](crate::transport::Transport), which returns
//! an `HttpResponse`. Nothing in this module touches the network, so the
//! header rules can be checked without a server.
//!
//! All fields use owned types (`String`, `Vec`) so a request can be moved into
//! an async transport without lifetime concerns.

use std::fmt;
use std::str::FromStr;

pub const AUTHORIZATION: &str = "Authorization";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const APPLICATION_JSON: &str = "application/json";

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// POST and PUT carry a JSON body and get a `Content-Type` header.
    pub fn sends_json(self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a method name is not one of the supported verbs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported HTTP method: {0}")]
pub struct UnknownMethod(pub String);

impl FromStr for HttpMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// Case-insensitive header lookup. Returns the first matching value.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// An HTTP response described as plain data.
///
/// Only the status and body are kept; the envelope in the body decides the
/// outcome of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Assembles an `HttpRequest` for one call.
///
/// Headers added with [`header`](Self::header) win over the injected
/// `Authorization` and `Content-Type` defaults.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    url: String,
    method: HttpMethod,
    headers: Vec<(String, String)>,
    body: Option<String>,
    token: Option<String>,
}

impl RequestBuilder {
    pub fn new(base_url: &str, path: &str) -> Self {
        Self {
            url: format!("{base_url}{path}"),
            method: HttpMethod::default(),
            headers: Vec::new(),
            body: None,
            token: None,
        }
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// An empty token is treated as no token.
    pub fn bearer(mut self, token: &str) -> Self {
        self.token = (!token.is_empty()).then(|| token.to_string());
        self
    }

    /// Adds a header unless one with the same name (ignoring case) is already set.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        if find_header(&self.headers, &name).is_none() {
            self.headers.push((name, value.into()));
        }
        self
    }

    pub fn build(self) -> HttpRequest {
        let method = self.method;
        let mut builder = self;
        if let Some(token) = builder.token.take() {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        if method.sends_json() {
            builder = builder.header(CONTENT_TYPE, APPLICATION_JSON);
        }
        HttpRequest {
            method,
            url: builder.url,
            headers: builder.headers,
            body: builder.body,
        }
    }
}
