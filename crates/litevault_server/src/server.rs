//! Thread-per-request HTTP server.
//!
//! A fixed pool of worker threads pulls requests off one `tiny_http`
//! listener. Each worker handles its request to completion, blocking on
//! the vault lock, SQLite and remote calls as needed.

use crate::auth::{AuthConfig, TokenValidator};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{ApiMethod, ApiRequest, ApiResponse, RequestHandler, ResponseBody};
use litevault_core::{RecoveryReport, Vault};
use parking_lot::Mutex;
use std::io::Read;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tiny_http::{Header, Method, Request, Response, Server};
use tracing::{debug, error, info, warn};

/// Brings the vault into a servable state.
///
/// Runs the recovery cascade, makes sure the credential table exists and
/// creates the configured administrator if it is missing.
///
/// # Errors
///
/// Returns an error if recovery hits a local I/O failure or the
/// credential writes fail.
pub fn prepare_vault(vault: &Vault, config: &ServerConfig) -> ServerResult<RecoveryReport> {
    let report = vault.ensure_available()?;
    vault.ensure_credential_table()?;
    if let Some(admin) = &config.admin {
        if vault.ensure_user(&admin.username, &admin.password)? {
            info!(username = %admin.username, "administrator created");
        }
    }
    Ok(report)
}

/// The HTTP server.
///
/// # Example
///
/// ```rust,no_run
/// use litevault_core::{Vault, VaultConfig};
/// use litevault_remote::DisabledObjectStore;
/// use litevault_server::{ServerConfig, VaultServer};
/// use std::sync::Arc;
///
/// let vault = Arc::new(Vault::open(VaultConfig::new("data/app.sqlite"), Arc::new(DisabledObjectStore))?);
/// let config = ServerConfig::new("127.0.0.1:5000".parse()?, b"change-me".to_vec());
/// let server = VaultServer::bind(config, vault)?;
/// server.spawn()?.wait();
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct VaultServer {
    config: ServerConfig,
    server: Arc<Server>,
    handler: Arc<RequestHandler>,
}

impl VaultServer {
    /// Prepares the vault and binds the listener.
    ///
    /// # Errors
    ///
    /// Returns an error if preparing the vault fails or the address
    /// cannot be bound.
    pub fn bind(config: ServerConfig, vault: Arc<Vault>) -> ServerResult<Self> {
        let report = prepare_vault(&vault, &config)?;
        debug!(outcome = ?report.outcome, "vault prepared");

        let tokens = TokenValidator::new(
            AuthConfig::new(config.auth_secret.clone()).with_expiry(config.token_expiry),
        );
        let handler = RequestHandler::new(vault, tokens, config.log_path.clone());
        let server = Server::http(config.bind_addr)
            .map_err(|e| ServerError::Internal(format!("cannot bind {}: {e}", config.bind_addr)))?;

        Ok(Self {
            config,
            server: Arc::new(server),
            handler: Arc::new(handler),
        })
    }

    /// Returns the bound address (useful when binding port 0).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Starts the worker threads.
    ///
    /// # Errors
    ///
    /// Returns an error if a worker thread cannot be spawned.
    pub fn spawn(self) -> ServerResult<ServerHandle> {
        let stopping = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::with_capacity(self.config.workers);

        for index in 0..self.config.workers {
            let server = Arc::clone(&self.server);
            let handler = Arc::clone(&self.handler);
            let stopping = Arc::clone(&stopping);
            let max_body = self.config.max_body_bytes;
            let worker = thread::Builder::new()
                .name(format!("litevault-http-{index}"))
                .spawn(move || worker_loop(&server, &handler, &stopping, max_body))?;
            workers.push(worker);
        }

        info!(addr = ?self.local_addr(), workers = workers.len(), "server listening");
        Ok(ServerHandle {
            server: self.server,
            stopping,
            workers: Mutex::new(workers),
        })
    }
}

/// Running server; stops the workers on [`shutdown`](Self::shutdown).
pub struct ServerHandle {
    server: Arc<Server>,
    stopping: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ServerHandle {
    /// Returns the bound address.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Stops accepting requests and joins every worker. Requests already
    /// being handled run to completion.
    pub fn shutdown(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for _ in &workers {
            self.server.unblock();
        }
        for worker in workers {
            if worker.join().is_err() {
                error!("server worker panicked");
            }
        }
        info!("server stopped");
    }

    /// Blocks until every worker has exited.
    pub fn wait(&self) {
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for worker in workers {
            if worker.join().is_err() {
                error!("server worker panicked");
            }
        }
    }
}

fn worker_loop(server: &Server, handler: &RequestHandler, stopping: &AtomicBool, max_body: usize) {
    loop {
        match server.recv() {
            Ok(request) => serve(request, handler, max_body),
            Err(e) => {
                if stopping.load(Ordering::SeqCst) {
                    break;
                }
                warn!(error = %e, "failed to receive request");
            }
        }
    }
}

fn serve(mut request: Request, handler: &RequestHandler, max_body: usize) {
    let method = match request.method() {
        Method::Get => ApiMethod::Get,
        Method::Post => ApiMethod::Post,
        _ => ApiMethod::Other,
    };
    let path = request
        .url()
        .split('?')
        .next()
        .unwrap_or_default()
        .to_string();
    let authorization = request
        .headers()
        .iter()
        .find(|header| header.field.equiv("Authorization"))
        .map(|header| header.value.as_str().to_string());

    let response = match read_body(&mut request, max_body) {
        Ok(body) => handler.handle(&ApiRequest {
            method,
            path: path.clone(),
            authorization,
            body,
        }),
        Err(err) => ApiResponse::from_error(&err),
    };

    info!(method = ?method, %path, status = response.status, "request handled");
    if let Err(e) = request.respond(into_http(response)) {
        warn!(error = %e, %path, "failed to write response");
    }
}

fn read_body(request: &mut Request, max_body: usize) -> ServerResult<Vec<u8>> {
    let mut body = Vec::new();
    request
        .as_reader()
        .take(max_body as u64 + 1)
        .read_to_end(&mut body)?;
    if body.len() > max_body {
        return Err(ServerError::PayloadTooLarge(max_body));
    }
    Ok(body)
}

fn into_http(response: ApiResponse) -> Response<std::io::Cursor<Vec<u8>>> {
    let (text, content_type) = match response.body {
        ResponseBody::Json(value) => (value.to_string(), "application/json"),
        ResponseBody::Text(text) => (text, "text/plain; charset=utf-8"),
    };
    let mut http = Response::from_string(text).with_status_code(response.status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes()) {
        http = http.with_header(header);
    }
    http
}
