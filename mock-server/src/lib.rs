//! In-memory implementation of the Kaitaku API, used by integration tests and
//! for local development.
//!
//! Every response uses the `{status, data}` / `{status, code, error}` envelope
//! with snake_case keys, matching the real service.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const DEMO_PROJECT_ID: &str = "demo-project";
pub const DEMO_CATEGORY_ID: &str = "general";

#[derive(Clone, Debug, Serialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub token: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub categories: Vec<Category>,
}

#[derive(Clone, Debug)]
pub struct Comment {
    pub id: String,
    pub project_id: String,
    pub category_id: String,
    pub user_id: String,
    pub comment: String,
    pub voters: BTreeSet<String>,
}

impl Comment {
    /// Wire view of the comment as seen by `viewer`.
    fn view(&self, viewer: &str) -> Value {
        json!({
            "id": self.id,
            "project_id": self.project_id,
            "category_id": self.category_id,
            "user_id": self.user_id,
            "comment": self.comment,
            "upvotes": self.voters.len(),
            "upvoted": self.voters.contains(viewer),
        })
    }
}

#[derive(Debug, Default)]
pub struct Store {
    pub users: HashMap<String, User>,
    pub projects: HashMap<String, Project>,
    pub comments: Vec<Comment>,
}

impl Store {
    /// A store holding one project with a single category.
    pub fn seeded() -> Self {
        let mut store = Self::default();
        store.projects.insert(
            DEMO_PROJECT_ID.to_string(),
            Project {
                id: DEMO_PROJECT_ID.to_string(),
                name: "Demo".to_string(),
                owner_id: "system".to_string(),
                categories: vec![Category {
                    id: DEMO_CATEGORY_ID.to_string(),
                    name: "General".to_string(),
                }],
            },
        );
        store
    }

    fn user_by_token(&self, token: &str) -> Option<&User> {
        self.users.values().find(|u| u.token == token)
    }
}

pub type Db = Arc<RwLock<Store>>;

/// An error envelope plus the HTTP status it is sent with.
#[derive(Debug)]
pub struct Failure {
    http: StatusCode,
    status: &'static str,
    code: &'static str,
    error: String,
}

impl Failure {
    fn new(http: StatusCode, status: &'static str, code: &'static str, error: impl Into<String>) -> Self {
        Self {
            http,
            status,
            code,
            error: error.into(),
        }
    }

    fn invalid(code: &'static str, error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Invalid Request", code, error)
    }

    fn not_found(code: &'static str, error: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not Found", code, error)
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        tracing::debug!(code = self.code, "request rejected: {}", self.error);
        let body = json!({ "status": self.status, "code": self.code, "error": self.error });
        (self.http, Json(body)).into_response()
    }
}

impl From<JsonRejection> for Failure {
    fn from(rejection: JsonRejection) -> Self {
        Self::invalid("INVALID_BODY", rejection.body_text())
    }
}

fn ok(data: impl Serialize) -> Json<Value> {
    Json(json!({ "status": "OK", "data": data }))
}

type ApiResult = Result<Json<Value>, Failure>;

#[derive(Deserialize)]
pub struct SignUp {
    pub email: String,
    pub name: String,
}

#[derive(Deserialize)]
pub struct SignIn {
    pub email: String,
}

#[derive(Deserialize)]
pub struct NewComment {
    pub comment: String,
    pub user_id: String,
}

#[derive(Deserialize)]
pub struct Vote {
    pub upvoted: bool,
    pub user_id: String,
}

#[derive(Deserialize)]
pub struct UserQuery {
    pub user_id: Option<String>,
}

pub fn app() -> Router {
    app_with_store(Store::seeded())
}

pub fn app_with_store(store: Store) -> Router {
    let db: Db = Arc::new(RwLock::new(store));
    Router::new()
        .route("/signup", post(sign_up))
        .route("/signin", post(sign_in))
        .route("/project/{project_id}", get(get_project))
        .route(
            "/project/{project_id}/category/{category_id}/comment",
            get(list_comments).post(create_comment),
        )
        .route(
            "/project/{project_id}/category/{category_id}/comment/{comment_id}",
            put(update_comment),
        )
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn auth_payload(user: &User) -> Value {
    json!({ "id": user.id, "name": user.name, "token": user.token })
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn authorize<'a>(store: &'a Store, headers: &HeaderMap) -> Result<&'a User, Failure> {
    bearer(headers)
        .and_then(|token| store.user_by_token(token))
        .ok_or_else(|| Failure::new(StatusCode::UNAUTHORIZED, "Unauthorized", "INVALID_TOKEN", "invalid or missing token"))
}

fn find_category(store: &Store, project_id: &str, category_id: &str) -> Result<(), Failure> {
    let project = store
        .projects
        .get(project_id)
        .ok_or_else(|| Failure::not_found("PROJECT_NOT_FOUND", "project not found"))?;
    if project.categories.iter().any(|c| c.id == category_id) {
        Ok(())
    } else {
        Err(Failure::not_found("CATEGORY_NOT_FOUND", "category not found"))
    }
}

async fn sign_up(State(db): State<Db>, payload: Result<Json<SignUp>, JsonRejection>) -> ApiResult {
    let Json(input) = payload?;
    if input.email.is_empty() {
        return Err(Failure::invalid("INVALID_EMAIL", "email is required"));
    }
    let mut store = db.write().await;
    if store.users.contains_key(&input.email) {
        return Err(Failure::invalid("INVALID_EMAIL_ALREADY_REGISTERED", "email already registered"));
    }
    let user = User {
        id: Uuid::new_v4().to_string(),
        name: input.name,
        email: input.email.clone(),
        token: Uuid::new_v4().simple().to_string(),
    };
    tracing::info!(user_id = %user.id, "user signed up");
    let data = auth_payload(&user);
    store.users.insert(input.email, user);
    Ok(ok(data))
}

async fn sign_in(State(db): State<Db>, payload: Result<Json<SignIn>, JsonRejection>) -> ApiResult {
    let Json(input) = payload?;
    let store = db.read().await;
    let user = store
        .users
        .get(&input.email)
        .ok_or_else(|| Failure::not_found("USER_NOT_FOUND", "user not found"))?;
    tracing::info!(user_id = %user.id, "user signed in");
    Ok(ok(auth_payload(user)))
}

async fn get_project(State(db): State<Db>, Path(project_id): Path<String>, headers: HeaderMap) -> ApiResult {
    let store = db.read().await;
    authorize(&store, &headers)?;
    let project = store
        .projects
        .get(&project_id)
        .ok_or_else(|| Failure::not_found("PROJECT_NOT_FOUND", "project not found"))?;
    Ok(ok(project))
}

async fn list_comments(
    State(db): State<Db>,
    Path((project_id, category_id)): Path<(String, String)>,
    Query(query): Query<UserQuery>,
    headers: HeaderMap,
) -> ApiResult {
    let store = db.read().await;
    authorize(&store, &headers)?;
    find_category(&store, &project_id, &category_id)?;
    let viewer = query.user_id.unwrap_or_default();
    let comments: Vec<Value> = store
        .comments
        .iter()
        .filter(|c| c.project_id == project_id && c.category_id == category_id)
        .map(|c| c.view(&viewer))
        .collect();
    Ok(ok(comments))
}

async fn create_comment(
    State(db): State<Db>,
    Path((project_id, category_id)): Path<(String, String)>,
    headers: HeaderMap,
    payload: Result<Json<NewComment>, JsonRejection>,
) -> ApiResult {
    let Json(input) = payload?;
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    find_category(&store, &project_id, &category_id)?;
    if input.comment.trim().is_empty() {
        return Err(Failure::invalid("INVALID_COMMENT", "comment is required"));
    }
    let comment = Comment {
        id: Uuid::new_v4().to_string(),
        project_id,
        category_id,
        user_id: input.user_id,
        comment: input.comment,
        voters: BTreeSet::new(),
    };
    tracing::info!(comment_id = %comment.id, "comment created");
    let data = comment.view(&comment.user_id);
    store.comments.push(comment);
    Ok(ok(data))
}

async fn update_comment(
    State(db): State<Db>,
    Path((project_id, category_id, comment_id)): Path<(String, String, String)>,
    headers: HeaderMap,
    payload: Result<Json<Vote>, JsonRejection>,
) -> ApiResult {
    let Json(input) = payload?;
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    find_category(&store, &project_id, &category_id)?;
    let comment = store
        .comments
        .iter_mut()
        .find(|c| c.id == comment_id && c.project_id == project_id && c.category_id == category_id)
        .ok_or_else(|| Failure::not_found("COMMENT_NOT_FOUND", "comment not found"))?;
    if input.upvoted {
        comment.voters.insert(input.user_id.clone());
    } else {
        comment.voters.remove(&input.user_id);
    }
    tracing::debug!(comment_id = %comment.id, upvotes = comment.voters.len(), "comment vote updated");
    Ok(ok(comment.view(&input.user_id)))
}
