use axum::extract::State;
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{validate_email, validate_password, validate_username};
use crate::auth::password::{hash_password_blocking, verify_password_blocking};
use crate::auth::reset::{digest_reset_token, generate_reset_token};
use crate::auth::{create_token, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::extract::Json;
use crate::models::{AccountResponse, NewUser, User, UserType};
use crate::schema::users;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub user_type: Option<UserType>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: AccountResponse,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn issue(state: &AppState, user: User) -> ApiResult<AuthResponse> {
    let token = create_token(
        user.id,
        user.user_type,
        &state.config.jwt_secret,
        state.config.token_ttl_hours,
    )?;
    Ok(AuthResponse {
        token,
        user: user.into(),
    })
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let username = req.username.trim();
    let email = normalize_email(&req.email);
    validate_username(username)?;
    validate_email(&email)?;
    validate_password(&req.password)?;
    let user_type = req.user_type.unwrap_or(UserType::User);
    if user_type == UserType::Admin {
        return Err(ApiError::forbidden("Admin accounts cannot be self-registered"));
    }

    let password_hash = hash_password_blocking(req.password).await?;
    let mut conn = state.pool.get().await?;
    let user: User = diesel::insert_into(users::table)
        .values(NewUser {
            username,
            email: &email,
            password_hash: &password_hash,
            user_type,
        })
        .returning(User::as_returning())
        .get_result(&mut conn)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Conflict(_) => ApiError::conflict("Username or email is already registered"),
            other => other,
        })?;

    log::info!("Registered {} account {} ({})", user.user_type, user.id, user.username);
    Ok((StatusCode::CREATED, Json(issue(&state, user)?)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let email = normalize_email(&req.email);
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let mut conn = state.pool.get().await?;
    let user: Option<User> = users::table
        .filter(users::email.eq(&email))
        .select(User::as_select())
        .first(&mut conn)
        .await
        .optional()?;
    drop(conn);

    let invalid = || ApiError::unauthorized("Invalid email or password");
    let user = user.ok_or_else(invalid)?;
    if !verify_password_blocking(req.password, user.password_hash.clone()).await {
        log::warn!("Failed login for user {}", user.id);
        return Err(invalid());
    }

    log::info!("User {} logged in", user.id);
    Ok(Json(issue(&state, user)?))
}

pub async fn me(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<AccountResponse>> {
    let mut conn = state.pool.get().await?;
    let account: User = users::table
        .find(user.id)
        .select(User::as_select())
        .first(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(account.into()))
}

async fn store_reset_token(state: &AppState, email: &str) -> ApiResult<()> {
    let mut conn = state.pool.get().await?;
    let issued = generate_reset_token();
    let expiry = Utc::now() + Duration::minutes(state.config.reset_token_ttl_minutes);
    let updated = diesel::update(users::table.filter(users::email.eq(email)))
        .set((
            users::reset_token.eq(&issued.digest),
            users::reset_token_expiry.eq(expiry),
        ))
        .execute(&mut conn)
        .await?;

    if updated > 0 {
        log::info!("Issued password reset token for {}", email);
        log::debug!("Password reset token for {}: {}", email, issued.token);
    } else {
        log::info!("Password reset requested for unknown email");
    }
    Ok(())
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<Value>> {
    let email = normalize_email(&req.email);
    if validate_email(&email).is_ok() {
        store_reset_token(&state, &email).await?;
    } else {
        log::info!("Password reset requested for a malformed email");
    }

    // Same answer whether or not the email is registered.
    Ok(Json(json!({
        "message": "If that email is registered, a reset link has been sent"
    })))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<Json<Value>> {
    if req.token.trim().is_empty() {
        return Err(ApiError::bad_request("Reset token is required"));
    }
    validate_password(&req.password)?;

    let digest = digest_reset_token(&req.token);
    let mut conn = state.pool.get().await?;
    let user_id: Option<i32> = users::table
        .filter(users::reset_token.eq(&digest))
        .filter(users::reset_token_expiry.gt(Utc::now()))
        .select(users::id)
        .first(&mut conn)
        .await
        .optional()?;
    let user_id = user_id.ok_or_else(|| ApiError::bad_request("Reset token is invalid or expired"))?;

    let password_hash = hash_password_blocking(req.password).await?;
    diesel::update(users::table.find(user_id))
        .set((
            users::password_hash.eq(&password_hash),
            users::reset_token.eq(None::<String>),
            users::reset_token_expiry.eq(None::<chrono::DateTime<Utc>>),
        ))
        .execute(&mut conn)
        .await?;

    log::info!("Password reset for user {}", user_id);
    Ok(Json(json!({ "message": "Password has been reset" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_compared_case_insensitively() {
        assert_eq!(normalize_email("  Agent@Example.COM "), "agent@example.com");
    }
}
