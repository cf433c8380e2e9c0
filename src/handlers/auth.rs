//! Account signup and token HTTP handlers.
//!
//! This module implements the authentication endpoints:
//! - POST /api/auth/signup - Register a new user
//! - POST /api/auth/login - Exchange credentials for tokens
//! - POST /api/auth/refresh - Exchange a refresh token for a new pair

use axum::{Json, extract::State, http::StatusCode};

use crate::{
    error::AppError,
    models::user::{
        LoginRequest, NewUser, RefreshRequest, SignupRequest, TokenResponse, USER_ROLE,
        UserResponse,
    },
    services::auth_service::{self, TokenKind},
    state::AppState,
};

const MIN_PASSWORD_LEN: usize = 8;

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Register a new user.
///
/// # Endpoint
///
/// `POST /api/auth/signup`
///
/// # Request Body
///
/// ```json
/// {
///   "name": "Ada",
///   "email": "ada@example.com",
///   "password": "correct horse"
/// }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: Returns the created user
/// - **Error (400)**: Empty name, malformed email, or password shorter than 8 characters
/// - **Error (409)**: Email already registered
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let name = request.name.trim();
    let email = normalize_email(&request.email);

    if name.is_empty() {
        return Err(AppError::InvalidRequest("Name is required".to_string()));
    }
    if !email.contains('@') {
        return Err(AppError::InvalidRequest("Email is invalid".to_string()));
    }
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::InvalidRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let password_hash =
        auth_service::hash_password(&request.password, state.auth.bcrypt_cost).await?;

    let user = state
        .db
        .create_user(NewUser {
            name: name.to_string(),
            email,
            password_hash,
            role: USER_ROLE.to_string(),
        })
        .await?;

    tracing::info!(user_id = user.id, "User signed up");
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Authenticate with email and password.
///
/// # Endpoint
///
/// `POST /api/auth/login`
///
/// # Response
///
/// - **Success (200 OK)**: Access/refresh token pair
/// - **Error (401)**: Unknown email or wrong password (indistinguishable)
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let Some(user) = state
        .db
        .get_user_by_email(&normalize_email(&request.email))
        .await?
    else {
        return Err(
            auth_service::reject_unknown_user(&request.password, state.auth.bcrypt_cost).await,
        );
    };

    if !auth_service::verify_password(&request.password, &user.password_hash).await {
        return Err(AppError::InvalidCredentials);
    }

    Ok(Json(auth_service::issue_tokens(&user, &state.auth)?))
}

/// Exchange a refresh token for a new token pair.
///
/// # Endpoint
///
/// `POST /api/auth/refresh`
///
/// The user is re-read so the new tokens carry the current email and role.
///
/// # Response
///
/// - **Success (200 OK)**: Fresh access/refresh token pair
/// - **Error (401)**: Invalid or expired refresh token, or the user no longer exists
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let claims =
        auth_service::decode_token(&request.refresh_token, TokenKind::Refresh, &state.auth)?;

    let user = state
        .db
        .get_user(claims.sub)
        .await?
        .ok_or(AppError::Unauthorized)?;

    Ok(Json(auth_service::issue_tokens(&user, &state.auth)?))
}
