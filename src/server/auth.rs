//! Bearer token authentication for the post API.
//!
//! Tokens carry the caller's user id and display name, signed with
//! HMAC-SHA256 over the serialized claims:
//!
//! ```text
//! token = hex(claims_json) "." hex(HMAC-SHA256(secret_key, claims_json))
//! ```
//!
//! Clients send `Authorization: Bearer <token>`. Protected handlers take an
//! [`AuthUser`] argument, so a handler cannot run without verified claims.
//!
//! # Example
//!
//! ```rust
//! use petpack::server::auth::TokenAuth;
//! use std::time::Duration;
//!
//! let auth = TokenAuth::new("my-secret-key");
//! let (token, _expiry) = auth.issue("user-1", "rex", Duration::from_secs(3600));
//!
//! let claims = auth.verify(&token).unwrap();
//! assert_eq!(claims.user_id, "user-1");
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use super::handlers::ErrorResponse;

// =============================================================================
// Types
// =============================================================================

/// HMAC-SHA256 type alias
type HmacSha256 = Hmac<Sha256>;

/// Claims carried by a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaims {
    /// Id of the user, stored as the `creator` of their posts
    #[serde(rename = "userId")]
    pub user_id: String,

    /// Display name, stored as `creatorUsername`
    #[serde(rename = "userName")]
    pub user_name: String,

    /// Expiry (Unix epoch seconds)
    pub exp: u64,
}

/// Verified caller identity handed to protected handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
    pub user_name: String,
}

impl From<UserClaims> for AuthUser {
    fn from(claims: UserClaims) -> Self {
        Self {
            user_id: claims.user_id,
            user_name: claims.user_name,
        }
    }
}

/// Authentication error types.
#[derive(Debug, Clone)]
pub enum AuthError {
    /// No bearer token in the Authorization header
    MissingToken,

    /// Token is not `<hex>.<hex>` or the claims are not valid JSON
    MalformedToken,

    /// Signature does not match the claims
    InvalidSignature,

    /// Token has expired
    Expired {
        /// When the token expired
        expired_at: u64,
        /// Current time
        current_time: u64,
    },
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "Missing bearer token"),
            AuthError::MalformedToken => write!(f, "Malformed token"),
            AuthError::InvalidSignature => write!(f, "Invalid token signature"),
            AuthError::Expired {
                expired_at,
                current_time,
            } => write!(
                f,
                "Token expired at {} (current time: {})",
                expired_at, current_time
            ),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = StatusCode::UNAUTHORIZED;
        let error_type = match &self {
            AuthError::MissingToken => "missing_token",
            AuthError::MalformedToken | AuthError::InvalidSignature => "invalid_token",
            AuthError::Expired { .. } => "token_expired",
        };
        let message = self.to_string();

        // A bad signature could indicate tampering
        match &self {
            AuthError::InvalidSignature => {
                warn!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Authentication failed: {}",
                    message
                );
            }
            _ => {
                debug!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Authentication failed: {}",
                    message
                );
            }
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Token Authentication
// =============================================================================

/// Issues and verifies HMAC-SHA256 signed bearer tokens.
#[derive(Clone)]
pub struct TokenAuth {
    /// Secret key for HMAC computation
    secret_key: Vec<u8>,
}

impl TokenAuth {
    /// Create a new authenticator with the given secret key.
    ///
    /// The key should be at least 32 bytes for security.
    pub fn new(secret_key: impl AsRef<[u8]>) -> Self {
        Self {
            secret_key: secret_key.as_ref().to_vec(),
        }
    }

    /// Issue a token valid for `ttl`.
    ///
    /// Returns the token and its expiry timestamp (Unix epoch seconds).
    pub fn issue(&self, user_id: &str, user_name: &str, ttl: Duration) -> (String, u64) {
        let expiry = unix_now() + ttl.as_secs();
        let claims = UserClaims {
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
            exp: expiry,
        };
        (self.issue_claims(&claims), expiry)
    }

    /// Issue a token for explicit claims.
    pub fn issue_claims(&self, claims: &UserClaims) -> String {
        // Serializing a struct of strings and integers cannot fail
        let payload = serde_json::to_vec(claims).unwrap_or_default();
        format!(
            "{}.{}",
            hex::encode(&payload),
            hex::encode(self.compute_signature(&payload))
        )
    }

    /// Verify a token and return its claims.
    ///
    /// The signature is checked before the claims are parsed, and compared in
    /// constant time.
    pub fn verify(&self, token: &str) -> Result<UserClaims, AuthError> {
        let (payload_hex, signature_hex) =
            token.split_once('.').ok_or(AuthError::MalformedToken)?;
        if payload_hex.is_empty() || signature_hex.is_empty() {
            return Err(AuthError::MalformedToken);
        }

        let payload = hex::decode(payload_hex).map_err(|_| AuthError::MalformedToken)?;
        let provided_sig = hex::decode(signature_hex).map_err(|_| AuthError::MalformedToken)?;

        let expected_sig = self.compute_signature(&payload);
        if !bool::from(provided_sig.ct_eq(&expected_sig)) {
            return Err(AuthError::InvalidSignature);
        }

        let claims: UserClaims =
            serde_json::from_slice(&payload).map_err(|_| AuthError::MalformedToken)?;

        let current_time = unix_now();
        if current_time > claims.exp {
            return Err(AuthError::Expired {
                expired_at: claims.exp,
                current_time,
            });
        }

        Ok(claims)
    }

    fn compute_signature(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret_key).expect("HMAC can take key of any size");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

// =============================================================================
// Axum Extractor
// =============================================================================

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenAuth: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .ok_or(AuthError::MissingToken)?;

        let auth = TokenAuth::from_ref(state);
        let claims = auth.verify(token)?;

        Ok(claims.into())
    }
}

// =============================================================================
// Tests
// =============================================================================
