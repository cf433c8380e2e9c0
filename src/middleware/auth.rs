//! Bearer token authorization middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the token from the Authorization header
//! 2. Verify it is a valid, unexpired access token
//! 3. Check the role claim against the role the route requires
//! 4. Inject authentication context into the request
//!
//! Rejected requests never reach the route handler.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{
    error::AppError,
    models::user::USER_ROLE,
    services::auth_service::{self, TokenKind},
    state::AppState,
};

/// Authentication context attached to authorized requests.
///
/// This struct is inserted into the request's extension map and can be
/// extracted by route handlers to know who made the request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// ID of the authenticated user
    ///
    /// Used to scope database queries to the caller's own rows
    pub user_id: i64,

    pub email: String,
}

/// Admit only callers holding the "user" role.
///
/// Used with `axum::middleware::from_fn_with_state`.
pub async fn require_user(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    authorize(&state, USER_ROLE, request, next).await
}

/// Token authorization for a route requiring `role`.
///
/// # Headers
///
/// Expected header format:
/// ```text
/// Authorization: Bearer eyJhbGciOi...
/// ```
///
/// # Returns
///
/// - `Ok(Response)` from the next handler when the token carries `role`
/// - `Err(AppError::Unauthorized)` when the header is missing or the token is invalid (401)
/// - `Err(AppError::Forbidden)` when the token is valid but the role differs (403)
pub async fn authorize(
    state: &AppState,
    role: &'static str,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    let claims = auth_service::decode_token(token, TokenKind::Access, &state.auth)?;

    if claims.role != role {
        tracing::warn!(
            user_id = claims.sub,
            role = %claims.role,
            required = role,
            "Role check failed"
        );
        return Err(AppError::Forbidden(role));
    }

    request.extensions_mut().insert(AuthContext {
        user_id: claims.sub,
        email: claims.email,
    });

    Ok(next.run(request).await)
}
