//! Request handlers for the HTTP endpoints.
//!
//! Handlers work on [`ApiRequest`] / [`ApiResponse`] rather than on the
//! transport types, so routing and auth are testable without a socket.

use crate::auth::{bearer_token, TokenValidator};
use crate::error::{ServerError, ServerResult};
use litevault_core::{CoreError, StatementKind, Vault};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Characters of the log file returned by `/logs`.
pub const LOG_TAIL_CHARS: usize = 10_000;

/// HTTP methods the API distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// Anything else.
    Other,
}

/// A decoded HTTP request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// Request method.
    pub method: ApiMethod,
    /// Path without query string.
    pub path: String,
    /// Raw `Authorization` header, if any.
    pub authorization: Option<String>,
    /// Request body.
    pub body: Vec<u8>,
}

impl ApiRequest {
    /// Creates a request with an empty body and no credentials.
    pub fn new(method: ApiMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            authorization: None,
            body: Vec::new(),
        }
    }

    /// Attaches a bearer token.
    #[must_use]
    pub fn with_bearer(mut self, token: &str) -> Self {
        self.authorization = Some(format!("Bearer {token}"));
        self
    }

    /// Attaches a JSON body.
    #[must_use]
    pub fn with_json(mut self, body: &Value) -> Self {
        self.body = body.to_string().into_bytes();
        self
    }
}

/// Response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// `application/json`
    Json(Value),
    /// `text/plain`
    Text(String),
}

/// A response ready to be written to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Body.
    pub body: ResponseBody,
}

impl ApiResponse {
    /// JSON response with the given status.
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: ResponseBody::Json(body),
        }
    }

    /// Plain-text 200 response.
    pub fn text(body: String) -> Self {
        Self {
            status: 200,
            body: ResponseBody::Text(body),
        }
    }

    /// Error response `{ "error": message }`.
    pub fn from_error(err: &ServerError) -> Self {
        Self::json(err.status_code(), json!({ "error": error_message(err) }))
    }

    /// Returns the JSON body, if this is a JSON response.
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }
}

/// Client-facing message: request errors carry their own text and SQL
/// errors are passed through verbatim.
fn error_message(err: &ServerError) -> String {
    match err {
        ServerError::InvalidRequest(message)
        | ServerError::AuthenticationFailed(message)
        | ServerError::NotAuthorized(message)
        | ServerError::NotFound(message) => message.clone(),
        ServerError::Core(CoreError::SqlExecution(e)) => e.to_string(),
        other => other.to_string(),
    }
}

#[derive(Deserialize)]
struct LoginBody {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
struct QueryBody {
    sql: Option<String>,
}

/// Dispatches API requests to the vault.
pub struct RequestHandler {
    vault: Arc<Vault>,
    tokens: TokenValidator,
    log_path: Option<PathBuf>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(vault: Arc<Vault>, tokens: TokenValidator, log_path: Option<PathBuf>) -> Self {
        Self {
            vault,
            tokens,
            log_path,
        }
    }

    /// Routes and handles one request. Never fails: errors become
    /// error responses.
    pub fn handle(&self, request: &ApiRequest) -> ApiResponse {
        match self.route(request) {
            Ok(response) => response,
            Err(err) => {
                if err.is_server_error() {
                    error!(path = %request.path, error = %err, "request failed");
                } else {
                    warn!(path = %request.path, error = %err, "request rejected");
                }
                ApiResponse::from_error(&err)
            }
        }
    }

    fn route(&self, request: &ApiRequest) -> ServerResult<ApiResponse> {
        use ApiMethod::{Get, Post};

        match (request.method, request.path.as_str()) {
            (Post, "/login") => self.handle_login(request),
            (Get, "/health") => Ok(self.handle_health()),
            (Post, "/query") => {
                self.authorize(request)?;
                self.handle_query(request)
            }
            (Post, "/init") => {
                self.authorize(request)?;
                self.handle_init()
            }
            (Post, "/backup") => {
                self.authorize(request)?;
                self.handle_backup()
            }
            (Post, "/restore") => {
                self.authorize(request)?;
                self.handle_restore()
            }
            (Get, "/sync-state" | "/conflict") => {
                self.authorize(request)?;
                self.handle_sync_state()
            }
            (Get, "/status") => {
                self.authorize(request)?;
                self.handle_status()
            }
            (Get, "/logs") => {
                self.authorize(request)?;
                self.handle_logs()
            }
            (
                _,
                "/login" | "/health" | "/query" | "/init" | "/backup" | "/restore" | "/sync-state"
                | "/conflict" | "/status" | "/logs",
            ) => Err(ServerError::MethodNotAllowed(request.path.clone())),
            _ => Err(ServerError::NotFound(request.path.clone())),
        }
    }

    /// Checks the bearer token and returns the caller's username.
    fn authorize(&self, request: &ApiRequest) -> ServerResult<String> {
        let token = request
            .authorization
            .as_deref()
            .and_then(bearer_token)
            .ok_or_else(|| ServerError::NotAuthorized("Missing or invalid token".into()))?;
        self.tokens.validate_token(token)
    }

    fn handle_login(&self, request: &ApiRequest) -> ServerResult<ApiResponse> {
        let body: LoginBody = parse_json(&request.body)?;
        let (Some(username), Some(password)) = (body.username, body.password) else {
            return Err(ServerError::InvalidRequest(
                "Missing username or password".into(),
            ));
        };

        if !self.vault.verify_credentials(&username, &password)? {
            return Err(ServerError::AuthenticationFailed(
                "Invalid credentials".into(),
            ));
        }

        let token = self.tokens.create_token(&username)?;
        info!(%username, "login succeeded");
        Ok(ApiResponse::json(200, json!({ "token": token })))
    }

    fn handle_health(&self) -> ApiResponse {
        if self.vault.is_healthy() {
            ApiResponse::json(200, json!({ "status": "ok" }))
        } else {
            ApiResponse::json(500, json!({ "status": "error" }))
        }
    }

    fn handle_query(&self, request: &ApiRequest) -> ServerResult<ApiResponse> {
        let body: QueryBody = parse_json(&request.body)?;
        let sql = body
            .sql
            .filter(|sql| !sql.trim().is_empty())
            .ok_or_else(|| ServerError::InvalidRequest("Missing SQL query".into()))?;

        match StatementKind::classify(&sql) {
            StatementKind::Write => {
                let outcome = self.vault.execute_write(&sql)?;
                Ok(ApiResponse::json(
                    200,
                    json!({
                        "status": "success",
                        "hash": outcome.fingerprint,
                        "changed": outcome.changed,
                        "rows_affected": outcome.rows_affected,
                    }),
                ))
            }
            StatementKind::Read => {
                let rows = self.vault.execute_read(&sql)?;
                Ok(ApiResponse::json(
                    200,
                    json!({ "columns": rows.columns, "result": rows.rows }),
                ))
            }
        }
    }

    fn handle_init(&self) -> ServerResult<ApiResponse> {
        let report = self.vault.ensure_available()?;
        Ok(ApiResponse::json(200, to_json(&report)?))
    }

    fn handle_backup(&self) -> ServerResult<ApiResponse> {
        let outcome = self.vault.backup_now()?;
        Ok(ApiResponse::json(
            200,
            json!({
                "status": "backup complete",
                "hash": outcome.fingerprint,
                "remote_synced": outcome.remote_synced,
            }),
        ))
    }

    fn handle_restore(&self) -> ServerResult<ApiResponse> {
        if self.vault.restore_now()? {
            Ok(ApiResponse::json(
                200,
                json!({ "status": "restored from backup" }),
            ))
        } else {
            Err(ServerError::NotFound("No backup available".into()))
        }
    }

    fn handle_sync_state(&self) -> ServerResult<ApiResponse> {
        let state = self.vault.current_sync_state()?;
        Ok(ApiResponse::json(
            200,
            json!({
                "last_hash": state.fingerprint,
                "last_timestamp": state.timestamp,
            }),
        ))
    }

    fn handle_status(&self) -> ServerResult<ApiResponse> {
        let status = self.vault.status()?;
        Ok(ApiResponse::json(200, to_json(&status)?))
    }

    fn handle_logs(&self) -> ServerResult<ApiResponse> {
        let path = self
            .log_path
            .as_ref()
            .ok_or_else(|| ServerError::NotFound("Log file not configured".into()))?;
        let content = match fs::read(path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ServerError::NotFound("Log file not found".into()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(ApiResponse::text(tail_chars(&content, LOG_TAIL_CHARS).to_string()))
    }
}

/// Returns the last `max` characters of `text`.
pub fn tail_chars(text: &str, max: usize) -> &str {
    let count = text.chars().count();
    if count <= max {
        return text;
    }
    match text.char_indices().nth(count - max) {
        Some((start, _)) => &text[start..],
        None => text,
    }
}

fn parse_json<T: for<'de> Deserialize<'de>>(body: &[u8]) -> ServerResult<T> {
    serde_json::from_slice(body).map_err(|e| ServerError::InvalidRequest(format!("Invalid JSON body: {e}")))
}

fn to_json<T: serde::Serialize>(value: &T) -> ServerResult<Value> {
    serde_json::to_value(value).map_err(|e| ServerError::Internal(e.to_string()))
}
