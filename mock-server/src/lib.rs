//! In-memory stand-in for the PocketBase records and auth API.
//!
//! Records are schemaless JSON objects kept in insertion order per
//! collection. `_superusers` and `users` are auth collections seeded with one
//! account each. Mails the real server would send (verification, password
//! reset, email change) are appended to `Backend::outbox` instead.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Multipart, Path, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const SUPERUSERS: &str = "_superusers";
pub const USERS: &str = "users";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin-password-123";
pub const USER_EMAIL: &str = "user@example.com";
pub const USER_PASSWORD: &str = "user-password-123";
/// Only OAuth2 code accepted by the `mock` provider.
pub const OAUTH2_CODE: &str = "mock-code";

const DEFAULT_PER_PAGE: usize = 30;
const MAX_PER_PAGE: usize = 1000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MailKind {
    Verification,
    PasswordReset,
    EmailChange { new_email: String },
}

/// A token the server would have mailed to `email`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Mail {
    pub kind: MailKind,
    pub email: String,
    pub token: String,
}

#[derive(Clone, Debug)]
struct Session {
    collection: String,
    record_id: String,
}

#[derive(Debug, Default)]
pub struct Backend {
    collections: HashMap<String, Vec<Map<String, Value>>>,
    passwords: HashMap<String, String>,
    sessions: HashMap<String, Session>,
    pub outbox: Vec<Mail>,
    seq: u64,
}

impl Backend {
    pub fn seeded() -> Self {
        let mut backend = Backend::default();
        backend.insert_auth_record(SUPERUSERS, ADMIN_EMAIL, ADMIN_PASSWORD);
        backend.insert_auth_record(USERS, USER_EMAIL, USER_PASSWORD);
        backend
    }

    /// Last mail of `kind` sent to `email`.
    pub fn last_mail(&self, email: &str, kind: &MailKind) -> Option<&Mail> {
        self.outbox
            .iter()
            .rev()
            .find(|m| m.email == email && &m.kind == kind)
    }

    pub fn record_count(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, Vec::len)
    }

    fn insert_auth_record(&mut self, collection: &str, email: &str, password: &str) -> String {
        let mut record = Map::new();
        record.insert("email".to_string(), json!(email));
        record.insert("emailVisibility".to_string(), json!(false));
        record.insert("verified".to_string(), json!(false));
        let record = self.insert(collection, record);
        let id = record["id"].as_str().unwrap_or_default().to_string();
        self.passwords.insert(id.clone(), password.to_string());
        id
    }

    fn insert(&mut self, collection: &str, mut record: Map<String, Value>) -> Map<String, Value> {
        let stamp = self.next_timestamp();
        let id = match record.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => new_id(),
        };
        record.insert("id".to_string(), json!(id));
        record.insert("collectionId".to_string(), json!(collection_id(collection)));
        record.insert("collectionName".to_string(), json!(collection));
        record.insert("created".to_string(), json!(stamp));
        record.insert("updated".to_string(), json!(stamp));
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push(record.clone());
        record
    }

    fn find(&self, collection: &str, id: &str) -> Option<&Map<String, Value>> {
        self.collections
            .get(collection)?
            .iter()
            .find(|r| r.get("id").and_then(Value::as_str) == Some(id))
    }

    fn find_mut(&mut self, collection: &str, id: &str) -> Option<&mut Map<String, Value>> {
        self.collections
            .get_mut(collection)?
            .iter_mut()
            .find(|r| r.get("id").and_then(Value::as_str) == Some(id))
    }

    fn find_by_email(&self, collection: &str, email: &str) -> Option<&Map<String, Value>> {
        self.collections
            .get(collection)?
            .iter()
            .find(|r| r.get("email").and_then(Value::as_str) == Some(email))
    }

    fn issue_session(&mut self, collection: &str, record_id: &str) -> String {
        let token = format!("tok-{}", Uuid::new_v4().simple());
        self.sessions.insert(
            token.clone(),
            Session {
                collection: collection.to_string(),
                record_id: record_id.to_string(),
            },
        );
        token
    }

    fn session(&self, headers: &HeaderMap) -> Option<&Session> {
        let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        let token = raw.strip_prefix("Bearer ").unwrap_or(raw);
        self.sessions.get(token)
    }

    fn is_superuser(&self, headers: &HeaderMap) -> bool {
        self.session(headers)
            .is_some_and(|s| s.collection == SUPERUSERS)
    }

    fn mail(&mut self, kind: MailKind, email: &str) {
        self.outbox.push(Mail {
            kind,
            email: email.to_string(),
            token: format!("mail-{}", Uuid::new_v4().simple()),
        });
    }

    fn take_mail(&mut self, token: &str, matches: impl Fn(&MailKind) -> bool) -> Option<Mail> {
        let pos = self
            .outbox
            .iter()
            .position(|m| m.token == token && matches(&m.kind))?;
        Some(self.outbox.remove(pos))
    }

    fn next_timestamp(&mut self) -> String {
        self.seq += 1;
        format!(
            "2024-01-01 {:02}:{:02}:{:02}.000Z",
            (self.seq / 3600) % 24,
            (self.seq / 60) % 60,
            self.seq % 60
        )
    }
}

pub type Db = Arc<RwLock<Backend>>;

pub fn new_db() -> Db {
    Arc::new(RwLock::new(Backend::seeded()))
}

pub fn app() -> Router {
    app_with_db(new_db())
}

pub fn app_with_db(db: Db) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route(
            "/api/collections/{collection}/records",
            get(list_records).post(create_record),
        )
        .route(
            "/api/collections/{collection}/records/{id}",
            get(view_record).patch(update_record).delete(delete_record),
        )
        .route("/api/collections/{collection}/auth-methods", get(auth_methods))
        .route(
            "/api/collections/{collection}/auth-with-password",
            post(auth_with_password),
        )
        .route(
            "/api/collections/{collection}/auth-with-oauth2",
            post(auth_with_oauth2),
        )
        .route("/api/collections/{collection}/auth-refresh", post(auth_refresh))
        .route(
            "/api/collections/{collection}/request-verification",
            post(request_verification),
        )
        .route(
            "/api/collections/{collection}/confirm-verification",
            post(confirm_verification),
        )
        .route(
            "/api/collections/{collection}/request-password-reset",
            post(request_password_reset),
        )
        .route(
            "/api/collections/{collection}/confirm-password-reset",
            post(confirm_password_reset),
        )
        .route(
            "/api/collections/{collection}/request-email-change",
            post(request_email_change),
        )
        .route(
            "/api/collections/{collection}/confirm-email-change",
            post(confirm_email_change),
        )
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with_db(listener, new_db()).await
}

pub async fn run_with_db(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_db(db)).await
}

type HandlerResult = Result<Response, Response>;

fn failure(status: StatusCode, message: &str, data: Value) -> Response {
    (
        status,
        Json(json!({"code": status.as_u16(), "message": message, "data": data})),
    )
        .into_response()
}

fn not_found() -> Response {
    failure(
        StatusCode::NOT_FOUND,
        "The requested resource wasn't found.",
        json!({}),
    )
}

fn bad_request(message: &str) -> Response {
    failure(StatusCode::BAD_REQUEST, message, json!({}))
}

fn unauthorized() -> Response {
    failure(
        StatusCode::UNAUTHORIZED,
        "The request requires valid record authorization token.",
        json!({}),
    )
}

fn is_auth_collection(collection: &str) -> bool {
    collection == SUPERUSERS || collection == USERS
}

fn collection_id(collection: &str) -> String {
    format!("pbc_{collection}")
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()[..15].to_string()
}

/// Public view of a record: no password, optional field projection.
fn render(record: &Map<String, Value>, fields: Option<&str>) -> Value {
    let mut out = record.clone();
    out.remove("password");
    if let Some(fields) = fields.filter(|f| !f.is_empty()) {
        let keep: Vec<&str> = fields.split(',').map(str::trim).collect();
        out.retain(|k, _| keep.contains(&k.as_str()));
    }
    Value::Object(out)
}

/// Superusers are only visible to superusers.
fn guard_collection(backend: &Backend, collection: &str, headers: &HeaderMap) -> Result<(), Response> {
    if collection == SUPERUSERS && !backend.is_superuser(headers) {
        return Err(failure(
            StatusCode::FORBIDDEN,
            "Only superusers can perform this action.",
            json!({}),
        ));
    }
    Ok(())
}

/// Fields of a multipart or JSON body, as strings.
async fn form_fields(request: Request) -> Result<HashMap<String, String>, Response> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    let mut fields = HashMap::new();
    if is_multipart {
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|_| bad_request("Failed to read the submitted form data."))?;
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|_| bad_request("Failed to read the submitted form data."))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let value = field
                .text()
                .await
                .map_err(|_| bad_request("Failed to read the submitted form data."))?;
            fields.insert(name, value);
        }
    } else {
        let Json(body) = Json::<Map<String, Value>>::from_request(request, &())
            .await
            .map_err(|_| bad_request("Failed to load the submitted data due to invalid formatting."))?;
        for (key, value) in body {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            fields.insert(key, value);
        }
    }
    Ok(fields)
}

fn field<'a>(fields: &'a HashMap<String, String>, name: &str) -> &'a str {
    fields.get(name).map(String::as_str).unwrap_or_default()
}

async fn health() -> Json<Value> {
    Json(json!({"code": 200, "message": "API is healthy.", "data": {}}))
}

// --- records ---

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub fields: Option<String>,
    pub expand: Option<String>,
}

/// `field = 'value'` equality, the only filter form the mock understands.
fn parse_filter(filter: &str) -> Option<(String, Value)> {
    let (field, value) = filter.split_once('=')?;
    let field = field.trim();
    let value = value.trim();
    if field.is_empty() || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    let value = if let Some(s) = value
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
        .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')))
    {
        json!(s)
    } else {
        serde_json::from_str::<Value>(value).ok()?
    };
    Some((field.to_string(), value))
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

async fn list_records(
    State(db): State<Db>,
    Path(collection): Path<String>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> HandlerResult {
    let backend = db.read().await;
    guard_collection(&backend, &collection, &headers)?;

    let mut records: Vec<&Map<String, Value>> = backend
        .collections
        .get(&collection)
        .map(|c| c.iter().collect())
        .unwrap_or_default();

    if let Some(filter) = query.filter.as_deref().filter(|f| !f.is_empty()) {
        let (field, value) = parse_filter(filter).ok_or_else(|| {
            bad_request("Something went wrong while processing your request. Invalid filter.")
        })?;
        records.retain(|r| r.get(&field) == Some(&value));
    }

    if let Some(sort) = query.sort.as_deref().filter(|s| !s.is_empty()) {
        let keys: Vec<(bool, &str)> = sort
            .split(',')
            .map(str::trim)
            .map(|k| match k.strip_prefix('-') {
                Some(k) => (true, k),
                None => (false, k.strip_prefix('+').unwrap_or(k)),
            })
            .collect();
        records.sort_by(|a, b| {
            for (desc, key) in &keys {
                let ord = compare(a.get(*key), b.get(*key));
                let ord = if *desc { ord.reverse() } else { ord };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }

    let per_page = query
        .per_page
        .filter(|p| *p > 0)
        .unwrap_or(DEFAULT_PER_PAGE)
        .min(MAX_PER_PAGE);
    let page = query.page.filter(|p| *p > 0).unwrap_or(1);
    let total_items = records.len();
    let total_pages = total_items.div_ceil(per_page);
    let items: Vec<Value> = records
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .map(|r| render(r, query.fields.as_deref()))
        .collect();

    Ok(Json(json!({
        "page": page,
        "perPage": per_page,
        "totalItems": total_items,
        "totalPages": total_pages,
        "items": items,
    }))
    .into_response())
}

async fn create_record(
    State(db): State<Db>,
    Path(collection): Path<String>,
    headers: HeaderMap,
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> HandlerResult {
    let Ok(Json(mut input)) = body else {
        return Err(bad_request(
            "Failed to load the submitted data due to invalid formatting.",
        ));
    };
    let mut backend = db.write().await;
    guard_collection(&backend, &collection, &headers)?;
    for key in ["collectionId", "collectionName", "created", "updated"] {
        input.remove(key);
    }
    let password = input.remove("password");
    input.remove("passwordConfirm");

    let record = backend.insert(&collection, input);
    if is_auth_collection(&collection) {
        if let (Some(id), Some(Value::String(password))) = (record["id"].as_str(), password) {
            backend.passwords.insert(id.to_string(), password);
        }
    }
    Ok(Json(render(&record, None)).into_response())
}

async fn view_record(
    State(db): State<Db>,
    Path((collection, id)): Path<(String, String)>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> HandlerResult {
    let backend = db.read().await;
    guard_collection(&backend, &collection, &headers)?;
    let record = backend.find(&collection, &id).ok_or_else(not_found)?;
    Ok(Json(render(record, query.fields.as_deref())).into_response())
}

async fn update_record(
    State(db): State<Db>,
    Path((collection, id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> HandlerResult {
    let Ok(Json(input)) = body else {
        return Err(bad_request(
            "Failed to load the submitted data due to invalid formatting.",
        ));
    };
    let mut backend = db.write().await;
    guard_collection(&backend, &collection, &headers)?;
    let stamp = backend.next_timestamp();
    let record = backend.find_mut(&collection, &id).ok_or_else(not_found)?;
    for (key, value) in input {
        if matches!(
            key.as_str(),
            "id" | "collectionId" | "collectionName" | "created" | "updated"
        ) {
            continue;
        }
        record.insert(key, value);
    }
    record.insert("updated".to_string(), json!(stamp));
    Ok(Json(render(record, None)).into_response())
}

async fn delete_record(
    State(db): State<Db>,
    Path((collection, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> HandlerResult {
    let mut backend = db.write().await;
    guard_collection(&backend, &collection, &headers)?;
    let records = backend.collections.get_mut(&collection).ok_or_else(not_found)?;
    let pos = records
        .iter()
        .position(|r| r.get("id").and_then(Value::as_str) == Some(id.as_str()))
        .ok_or_else(not_found)?;
    records.remove(pos);
    backend.passwords.remove(&id);
    Ok(StatusCode::NO_CONTENT.into_response())
}

// --- auth ---

fn require_auth_collection(collection: &str) -> Result<(), Response> {
    if is_auth_collection(collection) {
        Ok(())
    } else {
        Err(not_found())
    }
}

async fn auth_methods(Path(collection): Path<String>) -> HandlerResult {
    require_auth_collection(&collection)?;
    Ok(Json(json!({
        "password": {"enabled": true, "identityFields": ["email"]},
        "oauth2": {
            "enabled": collection == USERS,
            "providers": [{
                "name": "mock",
                "displayName": "Mock",
                "state": "state-123",
                "authURL": "http://oauth.invalid/authorize?state=state-123",
                "codeVerifier": "verifier-123",
                "codeChallenge": "challenge-123",
                "codeChallengeMethod": "S256"
            }]
        },
        "mfa": {"enabled": false, "duration": 0},
        "otp": {"enabled": false, "duration": 0}
    }))
    .into_response())
}

fn auth_payload(backend: &mut Backend, collection: &str, record_id: &str) -> Value {
    let token = backend.issue_session(collection, record_id);
    let record = backend
        .find(collection, record_id)
        .map(|r| render(r, None))
        .unwrap_or(Value::Null);
    json!({"token": token, "record": record})
}

async fn auth_with_password(
    State(db): State<Db>,
    Path(collection): Path<String>,
    request: Request,
) -> HandlerResult {
    require_auth_collection(&collection)?;
    let fields = form_fields(request).await?;
    let mut backend = db.write().await;

    let record_id = backend
        .find_by_email(&collection, field(&fields, "identity"))
        .and_then(|r| r.get("id").and_then(Value::as_str))
        .map(str::to_string);
    let authenticated = record_id.filter(|id| {
        backend.passwords.get(id).map(String::as_str) == Some(field(&fields, "password"))
    });
    let Some(record_id) = authenticated else {
        return Err(bad_request("Failed to authenticate."));
    };
    Ok(Json(auth_payload(&mut backend, &collection, &record_id)).into_response())
}

async fn auth_with_oauth2(
    State(db): State<Db>,
    Path(collection): Path<String>,
    request: Request,
) -> HandlerResult {
    require_auth_collection(&collection)?;
    let fields = form_fields(request).await?;
    if field(&fields, "provider") != "mock" || field(&fields, "code") != OAUTH2_CODE {
        return Err(bad_request("Failed to authenticate."));
    }
    let mut backend = db.write().await;
    let record_id = backend
        .find_by_email(&collection, USER_EMAIL)
        .and_then(|r| r.get("id").and_then(Value::as_str))
        .map(str::to_string)
        .ok_or_else(|| bad_request("Failed to authenticate."))?;
    let mut payload = auth_payload(&mut backend, &collection, &record_id);
    payload["meta"] = json!({"name": "Mock User", "email": USER_EMAIL, "isNew": false});
    Ok(Json(payload).into_response())
}

async fn auth_refresh(
    State(db): State<Db>,
    Path(collection): Path<String>,
    headers: HeaderMap,
) -> HandlerResult {
    require_auth_collection(&collection)?;
    let mut backend = db.write().await;
    let session = backend
        .session(&headers)
        .filter(|s| s.collection == collection)
        .cloned()
        .ok_or_else(unauthorized)?;
    Ok(Json(auth_payload(&mut backend, &collection, &session.record_id)).into_response())
}

async fn request_verification(
    State(db): State<Db>,
    Path(collection): Path<String>,
    request: Request,
) -> HandlerResult {
    require_auth_collection(&collection)?;
    let fields = form_fields(request).await?;
    let email = field(&fields, "email");
    let mut backend = db.write().await;
    if backend.find_by_email(&collection, email).is_some() {
        backend.mail(MailKind::Verification, email);
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn confirm_verification(
    State(db): State<Db>,
    Path(collection): Path<String>,
    request: Request,
) -> HandlerResult {
    require_auth_collection(&collection)?;
    let fields = form_fields(request).await?;
    let mut backend = db.write().await;
    let mail = backend
        .take_mail(field(&fields, "token"), |k| *k == MailKind::Verification)
        .ok_or_else(|| bad_request("Invalid or expired verification token."))?;
    let id = backend
        .find_by_email(&collection, &mail.email)
        .and_then(|r| r.get("id").and_then(Value::as_str))
        .map(str::to_string)
        .ok_or_else(|| bad_request("Invalid or expired verification token."))?;
    if let Some(record) = backend.find_mut(&collection, &id) {
        record.insert("verified".to_string(), json!(true));
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn request_password_reset(
    State(db): State<Db>,
    Path(collection): Path<String>,
    request: Request,
) -> HandlerResult {
    require_auth_collection(&collection)?;
    let fields = form_fields(request).await?;
    let email = field(&fields, "email");
    let mut backend = db.write().await;
    if backend.find_by_email(&collection, email).is_some() {
        backend.mail(MailKind::PasswordReset, email);
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn confirm_password_reset(
    State(db): State<Db>,
    Path(collection): Path<String>,
    request: Request,
) -> HandlerResult {
    require_auth_collection(&collection)?;
    let fields = form_fields(request).await?;
    let password = field(&fields, "password");
    if password != field(&fields, "passwordConfirm") {
        return Err(failure(
            StatusCode::BAD_REQUEST,
            "Failed to load the submitted data due to invalid formatting.",
            json!({"passwordConfirm": {"code": "validation_values_mismatch", "message": "Values don't match."}}),
        ));
    }
    let mut backend = db.write().await;
    let mail = backend
        .take_mail(field(&fields, "token"), |k| *k == MailKind::PasswordReset)
        .ok_or_else(|| bad_request("Invalid or expired password reset token."))?;
    let id = backend
        .find_by_email(&collection, &mail.email)
        .and_then(|r| r.get("id").and_then(Value::as_str))
        .map(str::to_string)
        .ok_or_else(|| bad_request("Invalid or expired password reset token."))?;
    backend.passwords.insert(id, password.to_string());
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn request_email_change(
    State(db): State<Db>,
    Path(collection): Path<String>,
    headers: HeaderMap,
    request: Request,
) -> HandlerResult {
    require_auth_collection(&collection)?;
    let fields = form_fields(request).await?;
    let mut backend = db.write().await;
    let session = backend
        .session(&headers)
        .filter(|s| s.collection == collection)
        .cloned()
        .ok_or_else(unauthorized)?;
    let email = backend
        .find(&collection, &session.record_id)
        .and_then(|r| r.get("email").and_then(Value::as_str))
        .map(str::to_string)
        .ok_or_else(unauthorized)?;
    let new_email = field(&fields, "newEmail").to_string();
    if new_email.is_empty() {
        return Err(bad_request("Missing new email."));
    }
    backend.mail(MailKind::EmailChange { new_email }, &email);
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn confirm_email_change(
    State(db): State<Db>,
    Path(collection): Path<String>,
    request: Request,
) -> HandlerResult {
    require_auth_collection(&collection)?;
    let fields = form_fields(request).await?;
    let mut backend = db.write().await;
    let mail = backend
        .take_mail(field(&fields, "token"), |k| {
            matches!(k, MailKind::EmailChange { .. })
        })
        .ok_or_else(|| bad_request("Invalid or expired email change token."))?;
    let MailKind::EmailChange { new_email } = mail.kind else {
        return Err(bad_request("Invalid or expired email change token."));
    };
    let id = backend
        .find_by_email(&collection, &mail.email)
        .and_then(|r| r.get("id").and_then(Value::as_str))
        .map(str::to_string)
        .ok_or_else(|| bad_request("Invalid or expired email change token."))?;
    if backend.passwords.get(&id).map(String::as_str) != Some(field(&fields, "password")) {
        return Err(bad_request("Invalid password."));
    }
    if let Some(record) = backend.find_mut(&collection, &id) {
        record.insert("email".to_string(), json!(new_email));
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_backend_has_auth_accounts() {
        let backend = Backend::seeded();
        assert_eq!(backend.record_count(SUPERUSERS), 1);
        assert_eq!(backend.record_count(USERS), 1);
        let user = backend.find_by_email(USERS, USER_EMAIL).unwrap();
        assert_eq!(user["collectionName"], USERS);
        assert_eq!(user["verified"], false);
    }

    #[test]
    fn parse_filter_accepts_quoted_and_literal_values() {
        assert_eq!(
            parse_filter("title = 'hello'"),
            Some(("title".to_string(), json!("hello")))
        );
        assert_eq!(
            parse_filter(r#"title="a b""#),
            Some(("title".to_string(), json!("a b")))
        );
        assert_eq!(
            parse_filter("count = 3"),
            Some(("count".to_string(), json!(3)))
        );
        assert_eq!(parse_filter("done = true"), Some(("done".to_string(), json!(true))));
    }

    #[test]
    fn parse_filter_rejects_garbage() {
        assert_eq!(parse_filter("???"), None);
        assert_eq!(parse_filter("a b = 1"), None);
        assert_eq!(parse_filter("x = unquoted"), None);
    }

    #[test]
    fn render_hides_password_and_projects_fields() {
        let mut record = Map::new();
        record.insert("id".to_string(), json!("r1"));
        record.insert("title".to_string(), json!("t"));
        record.insert("password".to_string(), json!("p"));
        assert_eq!(render(&record, None), json!({"id": "r1", "title": "t"}));
        assert_eq!(render(&record, Some("id")), json!({"id": "r1"}));
    }

    #[test]
    fn timestamps_increase() {
        let mut backend = Backend::default();
        let a = backend.next_timestamp();
        let b = backend.next_timestamp();
        assert!(b > a);
    }
}
