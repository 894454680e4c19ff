use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;

use super::auth::normalize_email;
use super::{clean_optional, validate_email, validate_password, validate_username};
use crate::auth::password::{hash_password_blocking, verify_password_blocking};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path, Query};
use crate::media::image_response;
use crate::models::{AccountResponse, PublicProfile, RealtorListing, User, UserChanges};
use crate::pagination::{PageParams, Paginated};
use crate::queries;
use crate::schema::users;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub phone_number: Option<String>,
}

impl UpdateProfileRequest {
    pub fn into_changes(self) -> ApiResult<UserChanges> {
        let username = clean_optional(self.username);
        if let Some(username) = &username {
            validate_username(username)?;
        }
        let email = clean_optional(self.email).map(|e| normalize_email(&e));
        if let Some(email) = &email {
            validate_email(email)?;
        }
        let phone_number = clean_optional(self.phone_number);
        if let Some(phone) = &phone_number {
            let valid = phone.len() <= 30
                && phone
                    .chars()
                    .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')' | '.'));
            if !valid {
                return Err(ApiError::bad_request("Phone number is invalid"));
            }
        }
        let changes = UserChanges {
            username,
            email,
            bio: self.bio.map(|b| b.trim().to_string()),
            phone_number,
        };
        if changes.is_empty() {
            return Err(ApiError::bad_request("Nothing to update"));
        }
        Ok(changes)
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

async fn load_user(state: &AppState, id: i32) -> ApiResult<User> {
    let mut conn = state.pool.get().await?;
    users::table
        .find(id)
        .select(User::as_select())
        .first(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Json<PublicProfile>> {
    Ok(Json(load_user(&state, id).await?.into()))
}

pub async fn update_me(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<AccountResponse>> {
    let changes = req.into_changes()?;
    let mut conn = state.pool.get().await?;
    let updated: User = diesel::update(users::table.find(user.id))
        .set(&changes)
        .returning(User::as_returning())
        .get_result(&mut conn)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Conflict(_) => ApiError::conflict("Username or email is already taken"),
            ApiError::NotFound(_) => ApiError::not_found("User not found"),
            other => other,
        })?;

    log::info!("User {} updated their profile", user.id);
    Ok(Json(updated.into()))
}

pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    validate_password(&req.new_password)?;
    let account = load_user(&state, user.id).await?;
    if !verify_password_blocking(req.current_password, account.password_hash).await {
        return Err(ApiError::unauthorized("Current password is incorrect"));
    }

    let password_hash = hash_password_blocking(req.new_password).await?;
    let mut conn = state.pool.get().await?;
    diesel::update(users::table.find(user.id))
        .set(users::password_hash.eq(&password_hash))
        .execute(&mut conn)
        .await?;

    log::info!("User {} changed their password", user.id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn profile_picture(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Response> {
    let mut conn = state.pool.get().await?;
    let picture: Option<Option<Vec<u8>>> = users::table
        .find(id)
        .select(users::profile_picture)
        .first(&mut conn)
        .await
        .optional()?;
    match picture {
        Some(Some(bytes)) => Ok(image_response(bytes)),
        Some(None) => Err(ApiError::not_found("User has no profile picture")),
        None => Err(ApiError::not_found("User not found")),
    }
}

pub async fn list_realtors(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Paginated<RealtorListing>>> {
    let mut conn = state.pool.get().await?;
    let (items, total) = queries::users::realtor_page(&mut conn, page.limit(), page.offset()).await?;
    Ok(Json(page.into_page(items, total)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_update_is_rejected() {
        let req = UpdateProfileRequest {
            username: Some("   ".into()),
            ..UpdateProfileRequest::default()
        };
        assert!(req.into_changes().is_err());
    }

    #[test]
    fn update_normalizes_fields() {
        let req = UpdateProfileRequest {
            email: Some(" Agent@Example.com ".into()),
            bio: Some("  Downtown specialist  ".into()),
            phone_number: Some("+1 (512) 555-0100".into()),
            ..UpdateProfileRequest::default()
        };
        let changes = req.into_changes().unwrap();
        assert_eq!(changes.email.as_deref(), Some("agent@example.com"));
        assert_eq!(changes.bio.as_deref(), Some("Downtown specialist"));
        assert!(changes.username.is_none());
    }

    #[test]
    fn phone_numbers_are_checked() {
        let req = UpdateProfileRequest {
            phone_number: Some("call me maybe".into()),
            ..UpdateProfileRequest::default()
        };
        assert!(req.into_changes().is_err());
    }
}
