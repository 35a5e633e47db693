//! Serve command implementation.

use super::VaultOptions;
use litevault_server::{ServerConfig, VaultServer};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Options specific to `serve`.
pub struct ServeOptions {
    /// Listen address.
    pub bind: SocketAddr,
    /// Token signing secret.
    pub secret: String,
    /// Administrator username and password.
    pub admin: Option<(String, String)>,
    /// Worker threads.
    pub workers: usize,
    /// Token lifetime.
    pub token_expiry_secs: u64,
    /// Log file exposed by `/logs`.
    pub log_path: Option<PathBuf>,
}

/// Runs the serve command. Blocks until the server stops.
pub fn run(options: &VaultOptions, serve: ServeOptions) -> Result<(), Box<dyn std::error::Error>> {
    if serve.secret.len() < 16 {
        return Err("token secret must be at least 16 bytes".into());
    }

    let vault = Arc::new(options.open()?);

    let mut config = ServerConfig::new(serve.bind, serve.secret.into_bytes())
        .with_workers(serve.workers)
        .with_token_expiry(Duration::from_secs(serve.token_expiry_secs));
    if let Some(path) = serve.log_path {
        config = config.with_log_path(path);
    }
    if let Some((username, password)) = serve.admin {
        config = config.with_admin(username, password);
    }

    let server = VaultServer::bind(config, vault)?;
    if let Some(addr) = server.local_addr() {
        println!("Serving {} on http://{}", options.db_path.display(), addr);
    }
    server.spawn()?.wait();
    Ok(())
}
