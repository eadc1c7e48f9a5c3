//! Request pipeline and public endpoints for the Kaitaku API.
//!
//! # Design
//! `KaitakuClient` holds only the base URL, the bearer token and a
//! `Transport`, and carries no mutable state between calls. Every call goes
//! through the same steps: build an `HttpRequest`, send it, validate the
//! envelope, camelize `data`, deserialize the DTO. Each step returns
//! `Result<_, ApiError>`, so an envelope error travels up unchanged and a
//! transport or decode failure is converted exactly once.
//!
//! Endpoint methods resolve to `None` / an empty list without sending
//! anything when a required identifier or the token is empty. Identifiers
//! are percent-encoded before they are placed in a path or query string.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::case::camelize_keys;
use crate::config::ClientConfig;
use crate::envelope::parse_envelope;
use crate::error::{ApiError, ConfigError};
use crate::http::{HttpMethod, HttpRequest, RequestBuilder, AUTHORIZATION};
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{Auth, Comment, CommentVote, LoginRequest, NewComment, Project, SignUpRequest};

const NO_BODY: Option<&Value> = None;

/// Async client for the Kaitaku API.
///
/// Generic over the transport for testability.
#[derive(Debug, Clone)]
pub struct KaitakuClient<T: Transport = ReqwestTransport> {
    base_url: String,
    token: String,
    transport: T,
}

impl KaitakuClient<ReqwestTransport> {
    /// Fails when `base_url` is empty. An empty `token` is allowed.
    pub fn new(base_url: &str, token: &str) -> Result<Self, ConfigError> {
        Ok(Self::with_transport(
            ClientConfig::new(base_url, token)?,
            ReqwestTransport::new(),
        ))
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::with_transport(ClientConfig::from_env()?, ReqwestTransport::new()))
    }
}

impl<T: Transport> KaitakuClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self {
            base_url: config.base_url,
            token: config.token,
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// A copy of this client bound to another token, e.g. the one returned
    /// by [`sign_up`](Self::sign_up).
    pub fn with_token(&self, token: &str) -> Self
    where
        T: Clone,
    {
        Self {
            base_url: self.base_url.clone(),
            token: token.to_string(),
            transport: self.transport.clone(),
        }
    }

    /// Registers a new user.
    pub async fn sign_up(&self, email: &str, name: &str) -> Result<Auth, ApiError> {
        let body = SignUpRequest {
            email: email.to_string(),
            name: name.to_string(),
        };
        self.call(HttpMethod::Post, "/signup", Some(&body), &self.token).await
    }

    pub async fn login(&self, email: &str) -> Result<Auth, ApiError> {
        let body = LoginRequest {
            email: email.to_string(),
        };
        self.call(HttpMethod::Post, "/signin", Some(&body), &self.token).await
    }

    pub async fn get_project(&self, project_id: &str, token: &str) -> Result<Option<Project>, ApiError> {
        if any_missing(&[project_id, token]) {
            tracing::debug!("get_project skipped: missing project id or token");
            return Ok(None);
        }
        let path = format!("/project/{}", urlencoding::encode(project_id));
        self.call(HttpMethod::Get, &path, NO_BODY, token).await
    }

    /// Lists the comments of a category as seen by `user_id`.
    pub async fn list_comment(
        &self,
        project_id: &str,
        category_id: &str,
        user_id: &str,
        token: &str,
    ) -> Result<Vec<Comment>, ApiError> {
        if any_missing(&[project_id, category_id, user_id, token]) {
            tracing::debug!("list_comment skipped: missing identifier or token");
            return Ok(Vec::new());
        }
        let path = comments_path(project_id, category_id, user_id);
        let comments: Option<Vec<Comment>> = self.call(HttpMethod::Get, &path, NO_BODY, token).await?;
        Ok(comments.unwrap_or_default())
    }

    pub async fn create_comment(
        &self,
        project_id: &str,
        category_id: &str,
        user_id: &str,
        comment: &str,
        token: &str,
    ) -> Result<Option<Comment>, ApiError> {
        if any_missing(&[project_id, category_id, user_id, token]) {
            tracing::debug!("create_comment skipped: missing identifier or token");
            return Ok(None);
        }
        let body = NewComment {
            comment: comment.to_string(),
            user_id: user_id.to_string(),
        };
        let path = comments_path(project_id, category_id, user_id);
        self.call(HttpMethod::Post, &path, Some(&body), token).await
    }

    /// Sets or clears `user_id`'s upvote on a comment.
    pub async fn update_comment(
        &self,
        project_id: &str,
        category_id: &str,
        comment_id: &str,
        user_id: &str,
        upvoted: bool,
        token: &str,
    ) -> Result<Option<Comment>, ApiError> {
        if any_missing(&[project_id, category_id, comment_id, user_id, token]) {
            tracing::debug!("update_comment skipped: missing identifier or token");
            return Ok(None);
        }
        let body = CommentVote {
            upvoted,
            user_id: user_id.to_string(),
        };
        let path = format!(
            "{}/{}",
            category_path(project_id, category_id),
            urlencoding::encode(comment_id)
        );
        self.call(HttpMethod::Put, &path, Some(&body), token).await
    }

    /// Calls an arbitrary endpoint with the instance token and deserializes
    /// the camelized `data` into `R`.
    pub async fn request<B, R>(&self, method: HttpMethod, path: &str, body: Option<&B>) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        self.call(method, path, body, &self.token).await
    }

    /// Like [`request`](Self::request) but returns the camelized JSON as-is.
    pub async fn request_value<B>(&self, method: HttpMethod, path: &str, body: Option<&B>) -> Result<Value, ApiError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let request = self.build_request(method, path, body, &self.token)?;
        self.send(request).await
    }

    /// A builder for `path` that already carries the instance token.
    ///
    /// Headers set on the builder are kept as given, so a caller can supply
    /// its own `Authorization` or `Content-Type`. Send the result with
    /// [`send`](Self::send).
    pub fn request_builder(&self, method: HttpMethod, path: &str) -> RequestBuilder {
        RequestBuilder::new(&self.base_url, path)
            .method(method)
            .bearer(&self.token)
    }

    /// Builds the request for `path` without sending it.
    ///
    /// `token` is used for the `Authorization` header; pass `""` for none.
    pub fn build_request<B>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
        token: &str,
    ) -> Result<HttpRequest, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let mut builder = RequestBuilder::new(&self.base_url, path).method(method).bearer(token);
        if let Some(body) = body {
            builder = builder.body(serde_json::to_string(body).map_err(ApiError::encode)?);
        }
        Ok(builder.build())
    }

    async fn call<B, R>(&self, method: HttpMethod, path: &str, body: Option<&B>, token: &str) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let request = self.build_request(method, path, body, token)?;
        let data = self.send(request).await?;
        let parsed: R = serde_json::from_value(data).inspect_err(|e| {
            tracing::warn!(path, error = %e, "response data did not match the expected type");
        })?;
        Ok(parsed)
    }

    /// Sends a prepared request and returns the camelized `data` of an `OK`
    /// envelope. The request's headers are sent unchanged.
    pub async fn send(&self, request: HttpRequest) -> Result<Value, ApiError> {
        tracing::debug!(
            method = %request.method,
            url = %request.url,
            authorized = request.header(AUTHORIZATION).is_some(),
            "sending request"
        );
        let url = request.url.clone();

        let response = self.transport.send(request).await.map_err(|e| {
            tracing::warn!(url = %url, error = %e, "transport failure");
            ApiError::from(e)
        })?;
        tracing::debug!(url = %url, status = response.status, "received response");

        let data = parse_envelope(&response).inspect_err(|e| {
            tracing::warn!(
                url = %url,
                status = %e.app_status_code,
                code = %e.response_code,
                "request failed: {}",
                e.response_error
            );
        })?;
        Ok(camelize_keys(data))
    }
}

fn any_missing(args: &[&str]) -> bool {
    args.iter().any(|arg| arg.is_empty())
}

fn category_path(project_id: &str, category_id: &str) -> String {
    format!(
        "/project/{}/category/{}/comment",
        urlencoding::encode(project_id),
        urlencoding::encode(category_id)
    )
}

fn comments_path(project_id: &str, category_id: &str, user_id: &str) -> String {
    format!(
        "{}?user_id={}",
        category_path(project_id, category_id),
        urlencoding::encode(user_id)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DECODE_ERROR, TRANSPORT_ERROR, UNKNOWN_STATUS};
    use crate::http::{APPLICATION_JSON, CONTENT_TYPE};
    use crate::transport::mock::MockTransport;
    use serde_json::json;

    const BASE: &str = "http://localhost:3000";

    fn client(transport: &MockTransport, token: &str) -> KaitakuClient<MockTransport> {
        KaitakuClient::with_transport(ClientConfig::new(BASE, token).unwrap(), transport.clone())
    }

    fn body_json(request: &HttpRequest) -> Value {
        serde_json::from_str(request.body.as_deref().unwrap()).unwrap()
    }

    #[test]
    fn new_rejects_empty_base_url() {
        assert!(matches!(KaitakuClient::new("", "tok"), Err(ConfigError::MissingBaseUrl)));
        assert!(matches!(KaitakuClient::new("", ""), Err(ConfigError::MissingBaseUrl)));
    }

    #[test]
    fn new_accepts_empty_token() {
        let client = KaitakuClient::new("https://example.com/", "").unwrap();
        assert_eq!(client.base_url(), "https://example.com");
        assert_eq!(client.token(), "");
    }

    #[tokio::test]
    async fn sign_up_sends_expected_request() {
        let transport = MockTransport::new().respond_json(json!({
            "status": "OK",
            "data": {"id": "authid", "name": "name", "token": "tok"}
        }));
        let auth = client(&transport, "token").sign_up("e", "n").await.unwrap();
        assert_eq!(
            auth,
            Auth {
                id: "authid".to_string(),
                name: "name".to_string(),
                token: "tok".to_string(),
                extra: Default::default(),
            }
        );

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        let req = &requests[0];
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:3000/signup");
        assert_eq!(req.header(AUTHORIZATION), Some("Bearer token"));
        assert_eq!(req.header(CONTENT_TYPE), Some(APPLICATION_JSON));
        assert_eq!(body_json(req), json!({"email": "e", "name": "n"}));
    }

    #[tokio::test]
    async fn login_without_token_still_sends_json() {
        let transport = MockTransport::new().respond_json(json!({
            "status": "OK",
            "data": {"id": "a", "name": "b", "token": "c"}
        }));
        client(&transport, "").login("e@example.com").await.unwrap();
        let req = &transport.requests()[0];
        assert_eq!(req.url, "http://localhost:3000/signin");
        assert_eq!(req.header(AUTHORIZATION), None);
        assert_eq!(req.header(CONTENT_TYPE), Some(APPLICATION_JSON));
        assert_eq!(body_json(req), json!({"email": "e@example.com"}));
    }

    #[tokio::test]
    async fn application_error_is_returned_verbatim() {
        let transport = MockTransport::new().respond(
            400,
            r#"{"status":"Invalid Request","code":"INVALID_EMAIL_ALREADY_REGISTERED","error":"email already registered"}"#,
        );
        let err = client(&transport, "").sign_up("e", "n").await.unwrap_err();
        assert_eq!(err.app_status_code, "Invalid Request");
        assert_eq!(err.response_code, "INVALID_EMAIL_ALREADY_REGISTERED");
        assert_eq!(err.response_error, "email already registered");
    }

    #[tokio::test]
    async fn transport_failure_becomes_api_error() {
        let transport = MockTransport::new().fail("connection refused");
        let err = client(&transport, "tok").get_project("p1", "tok").await.unwrap_err();
        assert_eq!(err.app_status_code, UNKNOWN_STATUS);
        assert_eq!(err.response_code, TRANSPORT_ERROR);
        assert!(err.response_error.contains("connection refused"));
    }

    #[tokio::test]
    async fn invalid_json_body_becomes_api_error() {
        let transport = MockTransport::new().respond(200, "not json");
        let err = client(&transport, "tok").get_project("p1", "tok").await.unwrap_err();
        assert_eq!(err.response_code, DECODE_ERROR);
    }

    #[tokio::test]
    async fn mismatched_data_becomes_decode_error() {
        let transport = MockTransport::new().respond_json(json!({"status": "OK", "data": {"name": "x"}}));
        let err = client(&transport, "").login("e").await.unwrap_err();
        assert_eq!(err.app_status_code, UNKNOWN_STATUS);
        assert_eq!(err.response_code, DECODE_ERROR);
    }

    #[tokio::test]
    async fn project_keys_are_camelized() {
        let transport = MockTransport::new().respond_json(json!({
            "status": "OK",
            "data": {
                "id": "p1",
                "name": "Demo",
                "owner_id": "u1",
                "categories": [{"id": "c1", "name": "General"}]
            }
        }));
        let project = client(&transport, "").get_project("p1", "tok").await.unwrap().unwrap();
        assert_eq!(project.owner_id.as_deref(), Some("u1"));
        assert_eq!(project.categories.map(|c| c.len()), Some(1));

        let req = &transport.requests()[0];
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:3000/project/p1");
        assert_eq!(req.header(AUTHORIZATION), Some("Bearer tok"));
        assert_eq!(req.header(CONTENT_TYPE), None);
        assert!(req.body.is_none());
    }

    #[tokio::test]
    async fn per_call_token_overrides_instance_token() {
        let transport = MockTransport::new().respond_json(json!({"status": "OK", "data": []}));
        client(&transport, "instance")
            .list_comment("p1", "c1", "u1", "call")
            .await
            .unwrap();
        assert_eq!(transport.requests()[0].header(AUTHORIZATION), Some("Bearer call"));
    }

    #[tokio::test]
    async fn list_comment_builds_query_and_parses_list() {
        let transport = MockTransport::new().respond_json(json!({
            "status": "OK",
            "data": [
                {"id": "m1", "comment": "hi", "user_id": "u1", "upvotes": 1, "upvoted": true},
                {"id": "m2", "comment": "yo", "user_id": "u2"}
            ]
        }));
        let comments = client(&transport, "").list_comment("p1", "c1", "u1", "tok").await.unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].user_id.as_deref(), Some("u1"));
        assert_eq!(comments[0].upvoted, Some(true));
        assert_eq!(comments[1].upvoted, None);
        assert_eq!(
            transport.requests()[0].url,
            "http://localhost:3000/project/p1/category/c1/comment?user_id=u1"
        );
    }

    #[tokio::test]
    async fn list_comment_with_null_data_is_empty() {
        let transport = MockTransport::new().respond_json(json!({"status": "OK", "data": null}));
        let comments = client(&transport, "").list_comment("p1", "c1", "u1", "tok").await.unwrap();
        assert!(comments.is_empty());
    }

    #[tokio::test]
    async fn create_comment_posts_snake_case_body() {
        let transport = MockTransport::new().respond_json(json!({
            "status": "OK",
            "data": {"id": "m1", "comment": "hello", "user_id": "u1", "category_id": "c1"}
        }));
        let comment = client(&transport, "")
            .create_comment("p1", "c1", "u1", "hello", "tok")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(comment.category_id.as_deref(), Some("c1"));

        let req = &transport.requests()[0];
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:3000/project/p1/category/c1/comment?user_id=u1");
        assert_eq!(body_json(req), json!({"comment": "hello", "user_id": "u1"}));
        assert_eq!(req.header(CONTENT_TYPE), Some(APPLICATION_JSON));
    }

    #[tokio::test]
    async fn update_comment_puts_vote() {
        let transport = MockTransport::new().respond_json(json!({"status": "OK", "data": null}));
        let updated = client(&transport, "")
            .update_comment("p1", "c1", "m1", "u1", true, "tok")
            .await
            .unwrap();
        assert!(updated.is_none());

        let req = &transport.requests()[0];
        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(req.url, "http://localhost:3000/project/p1/category/c1/comment/m1");
        assert_eq!(body_json(req), json!({"upvoted": true, "user_id": "u1"}));
    }

    #[tokio::test]
    async fn missing_arguments_soft_fail_without_network() {
        let transport = MockTransport::new();
        let c = client(&transport, "tok");

        assert!(c.get_project("", "tok").await.unwrap().is_none());
        assert!(c.get_project("p1", "").await.unwrap().is_none());

        for args in [["", "c1", "u1", "tok"], ["p1", "", "u1", "tok"], ["p1", "c1", "", "tok"], ["p1", "c1", "u1", ""]] {
            let [p, cat, u, t] = args;
            assert!(c.list_comment(p, cat, u, t).await.unwrap().is_empty());
            assert!(c.create_comment(p, cat, u, "text", t).await.unwrap().is_none());
            assert!(c.update_comment(p, cat, "m1", u, true, t).await.unwrap().is_none());
        }
        assert!(c.update_comment("p1", "c1", "", "u1", true, "tok").await.unwrap().is_none());

        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn with_token_rebinds_instance_token() {
        let transport = MockTransport::new().respond_json(json!({"status": "OK", "data": {"ok_flag": true}}));
        let c = client(&transport, "").with_token("fresh");
        let value = c.request_value(HttpMethod::Get, "/health", NO_BODY).await.unwrap();
        assert_eq!(value, json!({"okFlag": true}));
        assert_eq!(transport.requests()[0].header(AUTHORIZATION), Some("Bearer fresh"));
    }

    #[tokio::test]
    async fn concurrent_calls_are_independent() {
        let transport = MockTransport::new()
            .respond_json(json!({"status": "OK", "data": {"n": 1}}))
            .respond_json(json!({"status": "OK", "data": {"n": 2}}));
        let c = client(&transport, "tok");
        let (a, b) = tokio::join!(
            c.request_value(HttpMethod::Get, "/a", NO_BODY),
            c.request_value(HttpMethod::Get, "/b", NO_BODY)
        );
        let mut ns = vec![a.unwrap()["n"].as_i64().unwrap(), b.unwrap()["n"].as_i64().unwrap()];
        ns.sort_unstable();
        assert_eq!(ns, vec![1, 2]);
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn project_keeps_unmodeled_nested_fields() {
        let transport = MockTransport::new().respond_json(json!({
            "status": "OK",
            "data": {"id": "p1", "created_at": "2020", "owner": {"user_id": "u"}}
        }));
        let project = client(&transport, "").get_project("p1", "tok").await.unwrap().unwrap();
        assert_eq!(
            serde_json::to_value(&project).unwrap(),
            json!({"id": "p1", "createdAt": "2020", "owner": {"userId": "u"}})
        );
    }

    #[tokio::test]
    async fn identifiers_are_percent_encoded() {
        let transport = MockTransport::new()
            .respond_json(json!({"status": "OK", "data": []}))
            .respond_json(json!({"status": "OK", "data": null}))
            .respond_json(json!({"status": "OK", "data": null}));
        let c = client(&transport, "");
        c.list_comment("p/../x", "c1", "u1&admin=1", "tok").await.unwrap();
        c.get_project("a b", "tok").await.unwrap();
        c.update_comment("p1", "c?1", "m#1", "u1", false, "tok").await.unwrap();

        let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(
            urls,
            vec![
                "http://localhost:3000/project/p%2F..%2Fx/category/c1/comment?user_id=u1%26admin%3D1",
                "http://localhost:3000/project/a%20b",
                "http://localhost:3000/project/p1/category/c%3F1/comment/m%231",
            ]
        );
    }

    #[tokio::test]
    async fn caller_supplied_headers_reach_the_transport() {
        let transport = MockTransport::new().respond_json(json!({"status": "OK", "data": {"user_id": "u1"}}));
        let c = client(&transport, "tok");
        let request = c
            .request_builder(HttpMethod::Post, "/import")
            .header("Authorization", "Basic abc")
            .header("Content-Type", "text/plain")
            .body("raw")
            .build();
        let data = c.send(request).await.unwrap();
        assert_eq!(data, json!({"userId": "u1"}));

        let req = &transport.requests()[0];
        assert_eq!(req.url, "http://localhost:3000/import");
        assert_eq!(req.headers.len(), 2);
        assert_eq!(req.header(AUTHORIZATION), Some("Basic abc"));
        assert_eq!(req.header(CONTENT_TYPE), Some("text/plain"));
        assert_eq!(req.body.as_deref(), Some("raw"));
    }

    #[tokio::test]
    async fn request_builder_uses_instance_token() {
        let transport = MockTransport::new().respond_json(json!({"status": "OK", "data": null}));
        let c = client(&transport, "tok");
        c.send(c.request_builder(HttpMethod::Get, "/ping").build()).await.unwrap();
        assert_eq!(transport.requests()[0].header(AUTHORIZATION), Some("Bearer tok"));
    }

    #[test]
    fn build_request_serializes_body() {
        let transport = MockTransport::new();
        let req = client(&transport, "")
            .build_request(HttpMethod::Post, "/signin", Some(&json!({"email": "e"})), "")
            .unwrap();
        assert_eq!(req.body.as_deref(), Some(r#"{"email":"e"}"#));
        assert_eq!(req.header(AUTHORIZATION), None);
    }
}
