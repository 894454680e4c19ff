use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use axum::Extension;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::models::UserType;
use crate::AppState;

pub mod password;
pub mod reset;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingHeader,
    #[error("Invalid Authorization header format")]
    InvalidHeader,
    #[error("Invalid or expired token")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("Password hashing failed: {0}")]
    Hash(String),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Hash(detail) => ApiError::internal(detail),
            other => ApiError::unauthorized(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: UserType,
    pub exp: usize,
}

/// The caller, as established by [`authenticate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i32,
    pub user_type: UserType,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.user_type == UserType::Admin
    }

    /// Owners and admins may change a resource.
    pub fn can_manage(&self, owner_id: i32) -> bool {
        self.id == owner_id || self.is_admin()
    }

    pub fn require_lister(&self) -> Result<(), ApiError> {
        if self.user_type.can_list_properties() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Only realtors can manage listings"))
        }
    }
}

/// Handlers take `AuthUser` as an argument to require a signed-in caller.
/// Routes behind [`authenticate`] reuse the user it already validated.
#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(*user);
        }
        let token = bearer_token(&parts.headers)?;
        Ok(validate_token(token, &state.config.jwt_secret)?)
    }
}

pub fn create_token(
    user_id: i32,
    user_type: UserType,
    jwt_secret: &str,
    ttl_hours: i64,
) -> Result<String, AuthError> {
    let expiration = (Utc::now() + Duration::hours(ttl_hours)).timestamp().max(0) as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        role: user_type,
        exp: expiration,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )?;
    Ok(token)
}

pub fn validate_token(token: &str, jwt_secret: &str) -> Result<AuthUser, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )?;
    let id = token_data
        .claims
        .sub
        .parse()
        .map_err(|_| AuthError::InvalidHeader)?;
    Ok(AuthUser {
        id,
        user_type: token_data.claims.role,
    })
}

pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?;
    value
        .to_str()
        .map_err(|_| AuthError::InvalidHeader)?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::InvalidHeader)
}

/// Validates the bearer token and stores the caller as an [`AuthUser`]
/// request extension.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())?;
    let user = validate_token(token, &state.config.jwt_secret)?;
    log::debug!("Authenticated user {} ({})", user.id, user.user_type);
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

pub async fn require_admin(
    Extension(user): Extension<AuthUser>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !user.is_admin() {
        return Err(ApiError::forbidden("Admin access required"));
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use rstest::rstest;

    const SECRET: &str = "test-secret";

    #[test]
    fn token_round_trip_keeps_id_and_role() {
        let token = create_token(42, UserType::Realtor, SECRET, 1).unwrap();
        let user = validate_token(&token, SECRET).unwrap();
        assert_eq!(user, AuthUser { id: 42, user_type: UserType::Realtor });
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let token = create_token(1, UserType::Admin, "other-secret", 1).unwrap();
        assert!(matches!(
            validate_token(&token, SECRET),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = create_token(1, UserType::User, SECRET, -2).unwrap();
        assert!(validate_token(&token, SECRET).is_err());
    }

    #[test]
    fn unsigned_base64_blob_is_rejected() {
        // {"id":1,"user_type":"Admin"} encoded the way a browser would stash it.
        let forged = "eyJpZCI6MSwidXNlcl90eXBlIjoiQWRtaW4ifQ==";
        assert!(validate_token(forged, SECRET).is_err());
    }

    #[rstest]
    #[case(None, false)]
    #[case(Some("Token abc"), false)]
    #[case(Some("Bearer "), false)]
    #[case(Some("Bearer abc.def.ghi"), true)]
    fn bearer_token_requires_the_bearer_scheme(#[case] value: Option<&str>, #[case] ok: bool) {
        let mut headers = HeaderMap::new();
        if let Some(value) = value {
            headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        }
        assert_eq!(bearer_token(&headers).is_ok(), ok);
    }

    #[rstest]
    #[case(UserType::User, 7, true)]
    #[case(UserType::User, 8, false)]
    #[case(UserType::Realtor, 8, false)]
    #[case(UserType::Admin, 8, true)]
    fn owners_and_admins_can_manage(#[case] user_type: UserType, #[case] owner: i32, #[case] expected: bool) {
        let user = AuthUser { id: 7, user_type };
        assert_eq!(user.can_manage(owner), expected);
    }

    #[test]
    fn plain_users_cannot_list() {
        let user = AuthUser { id: 1, user_type: UserType::User };
        assert!(user.require_lister().is_err());
    }
}
