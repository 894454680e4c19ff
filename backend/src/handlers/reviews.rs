use axum::extract::State;
use axum::http::StatusCode;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

use super::clean_optional;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path, Query};
use crate::models::{NewReview, RatingSummary, Review, ReviewWithAuthor, UserType};
use crate::pagination::{PageParams, Paginated};
use crate::queries::reviews::review_page;
use crate::queries::users::{rating_summary, user_type_of};
use crate::schema::reviews;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub rating: i16,
    pub review_text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RealtorReviews {
    #[serde(flatten)]
    pub reviews: Paginated<ReviewWithAuthor>,
    #[serde(flatten)]
    pub summary: RatingSummary,
}

impl CreateReviewRequest {
    pub fn validate(&self, author_id: i32, realtor_id: i32) -> ApiResult<()> {
        if !(1..=5).contains(&self.rating) {
            return Err(ApiError::bad_request("Rating must be between 1 and 5"));
        }
        if author_id == realtor_id {
            return Err(ApiError::bad_request("You cannot review yourself"));
        }
        Ok(())
    }
}

async fn require_realtor(conn: &mut AsyncPgConnection, realtor_id: i32) -> ApiResult<()> {
    match user_type_of(conn, realtor_id).await? {
        Some(UserType::Realtor) => Ok(()),
        _ => Err(ApiError::not_found("Realtor not found")),
    }
}

pub async fn list_reviews(
    State(state): State<AppState>,
    Path(realtor_id): Path<i32>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<RealtorReviews>> {
    let mut conn = state.pool.get().await?;
    require_realtor(&mut conn, realtor_id).await?;
    let (items, total) = review_page(&mut conn, Some(realtor_id), page.limit(), page.offset()).await?;
    let summary = rating_summary(&mut conn, realtor_id).await?;
    Ok(Json(RealtorReviews {
        reviews: page.into_page(items, total),
        summary,
    }))
}

pub async fn create_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(realtor_id): Path<i32>,
    Json(req): Json<CreateReviewRequest>,
) -> ApiResult<(StatusCode, Json<Review>)> {
    req.validate(user.id, realtor_id)?;
    let review_text = clean_optional(req.review_text);

    let mut conn = state.pool.get().await?;
    require_realtor(&mut conn, realtor_id).await?;
    let review = diesel::insert_into(reviews::table)
        .values(NewReview {
            user_id: user.id,
            realtor_id,
            rating: req.rating,
            review_text: review_text.as_deref(),
        })
        .returning(Review::as_returning())
        .get_result(&mut conn)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Conflict(_) => ApiError::conflict("You have already reviewed this realtor"),
            other => other,
        })?;

    log::info!("User {} reviewed realtor {} ({} stars)", user.id, realtor_id, review.rating);
    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn delete_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<StatusCode> {
    let mut conn = state.pool.get().await?;
    let author_id: i32 = reviews::table
        .find(id)
        .select(reviews::user_id)
        .first(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("Review not found"))?;
    if !user.can_manage(author_id) {
        return Err(ApiError::forbidden("You can only delete your own reviews"));
    }

    diesel::delete(reviews::table.find(id))
        .execute(&mut conn)
        .await?;
    log::info!("User {} deleted review {}", user.id, id);
    Ok(StatusCode::NO_CONTENT)
}
