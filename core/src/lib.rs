//! Async client for the Kaitaku REST API.
//!
//! # Overview
//! Every response is wrapped in a `{status, data | code, error}` envelope.
//! The client builds authenticated requests, hands them to a `Transport`,
//! unwraps the envelope, rewrites snake_case keys to camelCase and maps every
//! failure into one `ApiError` shape.
//!
//! # Design
//! - `KaitakuClient` is immutable: base URL, token and transport are fixed at
//!   construction, so concurrent calls share nothing mutable.
//! - The network sits behind the `Transport` trait. `ReqwestTransport` is the
//!   default; tests substitute their own.
//! - Request building, envelope validation and key normalization are plain
//!   functions over data and are tested without a server.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod case;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod http;
pub mod transport;
pub mod types;

pub use case::{camelize_keys, snake_to_camel};
pub use client::KaitakuClient;
pub use config::ClientConfig;
pub use envelope::{parse_envelope, Envelope};
pub use error::{ApiError, ConfigError, ErrorKind, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, RequestBuilder};
pub use transport::{ReqwestTransport, Transport};
pub use types::{Auth, Category, Comment, CommentVote, LoginRequest, NewComment, Project, SignUpRequest};
