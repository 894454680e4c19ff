use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::UserType;
use crate::schema::users;

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub user_type: UserType,
    pub profile_picture: Option<Vec<u8>>,
    pub bio: Option<String>,
    pub phone_number: Option<String>,
    pub reset_token: Option<String>,
    pub reset_token_expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub user_type: UserType,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = users)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub phone_number: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.bio.is_none()
            && self.phone_number.is_none()
    }
}

/// What the account owner sees about themself.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub user_type: UserType,
    pub bio: Option<String>,
    pub phone_number: Option<String>,
    pub has_profile_picture: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for AccountResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            user_type: user.user_type,
            bio: user.bio,
            phone_number: user.phone_number,
            has_profile_picture: user.profile_picture.is_some(),
            created_at: user.created_at,
        }
    }
}

/// What anyone can see about a user.
#[derive(Debug, Serialize)]
pub struct PublicProfile {
    pub id: i32,
    pub username: String,
    pub user_type: UserType,
    pub bio: Option<String>,
    pub phone_number: Option<String>,
    pub has_profile_picture: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for PublicProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            user_type: user.user_type,
            bio: user.bio,
            phone_number: user.phone_number,
            has_profile_picture: user.profile_picture.is_some(),
            created_at: user.created_at,
        }
    }
}

/// Realtor card shown on listings and in the realtor directory.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable)]
pub struct RealtorSummary {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub phone_number: Option<String>,
}

#[derive(Debug, Serialize, QueryableByName)]
pub struct RealtorListing {
    #[diesel(sql_type = diesel::sql_types::Integer)]
    pub id: i32,
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub username: String,
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    pub bio: Option<String>,
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    pub phone_number: Option<String>,
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Double>)]
    pub average_rating: Option<f64>,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub review_count: i64,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub listing_count: i64,
}
