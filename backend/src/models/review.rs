use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::reviews;

#[derive(Debug, Clone, Serialize, Queryable, Selectable)]
#[diesel(table_name = reviews)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Review {
    pub id: i32,
    pub user_id: i32,
    pub realtor_id: i32,
    pub rating: i16,
    pub review_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = reviews)]
pub struct NewReview<'a> {
    pub user_id: i32,
    pub realtor_id: i32,
    pub rating: i16,
    pub review_text: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct ReviewWithAuthor {
    #[serde(flatten)]
    pub review: Review,
    pub reviewer_username: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct RatingSummary {
    pub average_rating: Option<f64>,
    pub review_count: i64,
}
