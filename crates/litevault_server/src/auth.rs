//! Bearer token authentication.
//!
//! Tokens are issued by `/login` and signed with HMAC-SHA256.
//!
//! ## Token Format
//!
//! Tokens are composed of:
//! - 8 bytes: expiry (Unix seconds, big-endian)
//! - N bytes: username (UTF-8)
//! - 32 bytes: HMAC-SHA256 signature over the preceding bytes
//!
//! The whole token is base64url-encoded (no padding) for transport.

use crate::error::{ServerError, ServerResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

const EXPIRY_LEN: usize = 8;
const SIGNATURE_LEN: usize = 32;

/// Authentication configuration.
#[derive(Clone)]
pub struct AuthConfig {
    /// Secret key for HMAC.
    pub secret: Vec<u8>,
    /// Token expiration duration.
    pub token_expiry: Duration,
}

impl AuthConfig {
    /// Creates a new auth configuration with a one hour expiry.
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            secret,
            token_expiry: crate::config::DEFAULT_TOKEN_EXPIRY,
        }
    }

    /// Sets the token expiration duration.
    #[must_use]
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }
}

/// Issues and checks bearer tokens.
#[derive(Clone)]
pub struct TokenValidator {
    config: AuthConfig,
}

impl TokenValidator {
    /// Creates a new token validator.
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Creates a token for `username` that expires after the configured
    /// lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Internal`] if the signing key is rejected.
    pub fn create_token(&self, username: &str) -> ServerResult<String> {
        let expiry = unix_seconds().saturating_add(self.config.token_expiry.as_secs());

        let mut data = Vec::with_capacity(EXPIRY_LEN + username.len() + SIGNATURE_LEN);
        data.extend_from_slice(&expiry.to_be_bytes());
        data.extend_from_slice(username.as_bytes());

        let signature = self.mac()?.chain_update(&data).finalize().into_bytes();
        data.extend_from_slice(&signature);
        Ok(URL_SAFE_NO_PAD.encode(data))
    }

    /// Validates a token and returns the username it was issued to.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NotAuthorized`] if the token is malformed,
    /// tampered with or expired.
    pub fn validate_token(&self, token: &str) -> ServerResult<String> {
        let raw = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| ServerError::NotAuthorized("Malformed token".into()))?;
        if raw.len() < EXPIRY_LEN + SIGNATURE_LEN {
            return Err(ServerError::NotAuthorized("Invalid token length".into()));
        }

        let (data, signature) = raw.split_at(raw.len() - SIGNATURE_LEN);
        self.mac()?
            .chain_update(data)
            .verify_slice(signature)
            .map_err(|_| ServerError::NotAuthorized("Invalid signature".into()))?;

        let (expiry_bytes, username) = data.split_at(EXPIRY_LEN);
        let mut expiry = [0u8; EXPIRY_LEN];
        expiry.copy_from_slice(expiry_bytes);
        if unix_seconds() >= u64::from_be_bytes(expiry) {
            return Err(ServerError::NotAuthorized("Token expired".into()));
        }

        String::from_utf8(username.to_vec())
            .map_err(|_| ServerError::NotAuthorized("Malformed token".into()))
    }

    fn mac(&self) -> ServerResult<HmacSha256> {
        HmacSha256::new_from_slice(&self.config.secret)
            .map_err(|e| ServerError::Internal(format!("invalid signing key: {e}")))
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let token = header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> TokenValidator {
        TokenValidator::new(AuthConfig::new(b"test-secret-key-32-bytes-long!!".to_vec()))
    }

    #[test]
    fn create_and_validate_token() {
        let validator = validator();
        let token = validator.create_token("admin").unwrap();

        assert_eq!(validator.validate_token(&token).unwrap(), "admin");
    }

    #[test]
    fn reject_other_secret() {
        let token = validator().create_token("admin").unwrap();
        let other = TokenValidator::new(AuthConfig::new(b"another-secret".to_vec()));

        assert!(other.validate_token(&token).is_err());
    }

    #[test]
    fn reject_tampered_token() {
        let validator = validator();
        let token = validator.create_token("admin").unwrap();
        let mut raw = URL_SAFE_NO_PAD.decode(&token).unwrap();
        raw[EXPIRY_LEN] ^= 0x20; // "admin" -> "Admin"
        let forged = URL_SAFE_NO_PAD.encode(raw);

        assert!(validator.validate_token(&forged).is_err());
    }

    #[test]
    fn reject_expired_token() {
        let validator = TokenValidator::new(
            AuthConfig::new(b"test-secret-key-32-bytes-long!!".to_vec())
                .with_expiry(Duration::from_secs(0)),
        );
        let token = validator.create_token("admin").unwrap();

        assert!(matches!(
            validator.validate_token(&token),
            Err(ServerError::NotAuthorized(_))
        ));
    }

    #[test]
    fn reject_garbage() {
        assert!(validator().validate_token("not base64 !!").is_err());
        assert!(validator().validate_token("AAAA").is_err());
    }

    #[test]
    fn bearer_header_parsing() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic abc"), None);
    }
}
