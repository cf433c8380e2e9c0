//! Authentication service - password hashing and JWT issuing.
//!
//! This service handles:
//! - bcrypt password hashing and verification
//! - Issuing access/refresh token pairs (HS256)
//! - Decoding tokens and checking their kind
//!
//! # Token Kinds
//!
//! Access tokens authorize API calls; refresh tokens are only accepted by
//! `POST /api/auth/refresh`. Each kind is rejected where the other is expected.

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::AuthConfig,
    error::AppError,
    models::user::{TokenResponse, User},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims shared by both token kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i64,
    pub email: String,
    pub role: String,
    pub kind: TokenKind,
    /// Unique token id, so two tokens issued in the same second differ
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

/// Run bcrypt work on the blocking thread pool.
async fn blocking<T, F>(work: F) -> Result<T, AppError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(format!("bcrypt task failed: {e}")))
}

pub async fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    let password = password.to_owned();
    Ok(blocking(move || bcrypt::hash(password.as_bytes(), cost)).await??)
}

/// Check a password against a stored hash.
///
/// A malformed hash counts as a mismatch.
pub async fn verify_password(password: &str, hash: &str) -> bool {
    let password = password.to_owned();
    let hash = hash.to_owned();

    match blocking(move || bcrypt::verify(password.as_bytes(), &hash)).await {
        Ok(Ok(valid)) => valid,
        Ok(Err(e)) => {
            tracing::warn!("Stored password hash could not be verified: {}", e);
            false
        }
        Err(e) => {
            tracing::error!("{}", e);
            false
        }
    }
}

/// Reject a login for an email with no account.
///
/// Hashes the supplied password first so the response takes as long as a
/// failed check against a real account.
pub async fn reject_unknown_user(password: &str, cost: u32) -> AppError {
    if let Err(e) = hash_password(password, cost).await {
        tracing::warn!("Login padding hash failed: {}", e);
    }
    AppError::InvalidCredentials
}

fn issue_token(
    user: &User,
    kind: TokenKind,
    ttl_secs: i64,
    config: &AuthConfig,
) -> Result<String, AppError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        role: user.role.clone(),
        kind,
        jti: Uuid::new_v4(),
        iat: now,
        exp: now + ttl_secs,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))
}

/// Issue a fresh access/refresh pair for `user`.
pub fn issue_tokens(user: &User, config: &AuthConfig) -> Result<TokenResponse, AppError> {
    Ok(TokenResponse {
        access_token: issue_token(user, TokenKind::Access, config.access_token_ttl_secs, config)?,
        refresh_token: issue_token(
            user,
            TokenKind::Refresh,
            config.refresh_token_ttl_secs,
            config,
        )?,
        token_type: "Bearer".to_string(),
        expires_in: config.access_token_ttl_secs,
    })
}

/// Decode `token` and require it to be of `kind`.
///
/// # Errors
///
/// `AppError::Unauthorized` if the signature, expiry, or kind is wrong.
pub fn decode_token(
    token: &str,
    kind: TokenKind,
    config: &AuthConfig,
) -> Result<Claims, AppError> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!("Rejected token: {}", e);
        AppError::Unauthorized
    })?
    .claims;

    if claims.kind != kind {
        return Err(AppError::Unauthorized);
    }
    Ok(claims)
}
