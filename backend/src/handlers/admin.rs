use std::collections::BTreeMap;

use axum::extract::State;
use axum::http::StatusCode;
use diesel::dsl::count_star;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path, Query};
use crate::models::{AccountResponse, PropertyStatus, PropertySummary, ReviewWithAuthor, User, UserType};
use crate::pagination::{PageParams, Paginated};
use crate::queries::properties::{delete_properties, escape_like, search_page, PropertySearch};
use crate::queries::reviews::review_page;
use crate::queries::users::delete_user_cascade;
use crate::schema::{messages, properties, reviews, users};
use crate::AppState;

pub const MAX_BULK_DELETE: usize = 500;

#[derive(Debug, Serialize)]
pub struct Stats {
    pub users: BTreeMap<&'static str, i64>,
    pub properties: BTreeMap<&'static str, i64>,
    pub total_users: i64,
    pub total_properties: i64,
    pub total_messages: i64,
    pub total_reviews: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserFilter {
    pub user_type: Option<UserType>,
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserTypeRequest {
    pub user_type: UserType,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<i32>,
}

impl UserFilter {
    fn query(&self) -> users::BoxedQuery<'static, Pg> {
        let mut query = users::table.into_boxed();
        if let Some(user_type) = self.user_type {
            query = query.filter(users::user_type.eq(user_type));
        }
        if let Some(q) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let pattern = format!("%{}%", escape_like(q));
            query = query.filter(
                users::username
                    .ilike(pattern.clone())
                    .or(users::email.ilike(pattern)),
            );
        }
        query
    }
}

impl BulkDeleteRequest {
    /// Sorted, de-duplicated ids.
    pub fn ids(&self) -> ApiResult<Vec<i32>> {
        let mut ids = self.ids.clone();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Err(ApiError::bad_request("No property ids given"));
        }
        if ids.len() > MAX_BULK_DELETE {
            return Err(ApiError::bad_request(format!(
                "At most {} properties can be deleted at once",
                MAX_BULK_DELETE
            )));
        }
        Ok(ids)
    }
}

/// Counts for every known variant, zero when a variant has no rows.
fn tally<T: Copy>(all: &[T], label: fn(T) -> &'static str, rows: Vec<(T, i64)>) -> BTreeMap<&'static str, i64> {
    let mut counts: BTreeMap<&'static str, i64> = all.iter().map(|v| (label(*v), 0)).collect();
    for (variant, count) in rows {
        counts.insert(label(variant), count);
    }
    counts
}

pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<Stats>> {
    let mut conn = state.pool.get().await?;
    let user_rows: Vec<(UserType, i64)> = users::table
        .group_by(users::user_type)
        .select((users::user_type, count_star()))
        .load(&mut conn)
        .await?;
    let property_rows: Vec<(PropertyStatus, i64)> = properties::table
        .group_by(properties::status)
        .select((properties::status, count_star()))
        .load(&mut conn)
        .await?;
    let total_messages: i64 = messages::table.count().get_result(&mut conn).await?;
    let total_reviews: i64 = reviews::table.count().get_result(&mut conn).await?;

    let total_users = user_rows.iter().map(|(_, n)| n).sum();
    let total_properties = property_rows.iter().map(|(_, n)| n).sum();
    Ok(Json(Stats {
        users: tally(UserType::ALL, UserType::as_str, user_rows),
        properties: tally(PropertyStatus::ALL, PropertyStatus::as_str, property_rows),
        total_users,
        total_properties,
        total_messages,
        total_reviews,
    }))
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
    Query(filter): Query<UserFilter>,
) -> ApiResult<Json<Paginated<AccountResponse>>> {
    let mut conn = state.pool.get().await?;
    let total: i64 = filter.query().count().get_result(&mut conn).await?;
    let rows: Vec<User> = filter
        .query()
        .order(users::id.asc())
        .select(User::as_select())
        .limit(page.limit())
        .offset(page.offset())
        .load(&mut conn)
        .await?;
    Ok(Json(page.into_page(rows, total).map(AccountResponse::from)))
}

pub async fn update_user_type(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(id): Path<i32>,
    Json(req): Json<UserTypeRequest>,
) -> ApiResult<Json<AccountResponse>> {
    if id == admin.id && req.user_type != UserType::Admin {
        return Err(ApiError::bad_request("You cannot remove your own admin role"));
    }
    let mut conn = state.pool.get().await?;
    let user: User = diesel::update(users::table.find(id))
        .set(users::user_type.eq(req.user_type))
        .returning(User::as_returning())
        .get_result(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    log::info!("Admin {} changed user {} to {}", admin.id, id, req.user_type);
    Ok(Json(user.into()))
}

pub async fn delete_user(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<StatusCode> {
    if id == admin.id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }
    let mut conn = state.pool.get().await?;
    let listings = conn
        .transaction::<_, ApiError, _>(|conn| {
            async move {
                let found: Option<i32> = users::table
                    .find(id)
                    .select(users::id)
                    .for_update()
                    .first(conn)
                    .await
                    .optional()?;
                if found.is_none() {
                    return Err(ApiError::not_found("User not found"));
                }
                Ok(delete_user_cascade(conn, id).await?)
            }
            .scope_boxed()
        })
        .await?;

    log::info!("Admin {} deleted user {} and {} listings", admin.id, id, listings);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_properties(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
    Query(search): Query<PropertySearch>,
) -> ApiResult<Json<Paginated<PropertySummary>>> {
    search.validate()?;
    let mut conn = state.pool.get().await?;
    let (items, total) = search_page(&mut conn, &search, page.limit(), page.offset()).await?;
    Ok(Json(page.into_page(items, total)))
}

pub async fn bulk_delete_properties(
    State(state): State<AppState>,
    admin: AuthUser,
    Json(req): Json<BulkDeleteRequest>,
) -> ApiResult<Json<Value>> {
    let ids = req.ids()?;
    let mut conn = state.pool.get().await?;
    let deleted = conn
        .transaction::<_, ApiError, _>(|conn| {
            async move {
                let deleted = delete_properties(conn, &ids).await?;
                if deleted != ids.len() {
                    return Err(ApiError::not_found(format!(
                        "{} of {} properties were not found",
                        ids.len() - deleted,
                        ids.len()
                    )));
                }
                Ok(deleted)
            }
            .scope_boxed()
        })
        .await?;

    log::info!("Admin {} bulk-deleted {} properties", admin.id, deleted);
    Ok(Json(json!({ "deleted": deleted })))
}

pub async fn list_reviews(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Paginated<ReviewWithAuthor>>> {
    let mut conn = state.pool.get().await?;
    let (items, total) = review_page(&mut conn, None, page.limit(), page.offset()).await?;
    Ok(Json(page.into_page(items, total)))
}
