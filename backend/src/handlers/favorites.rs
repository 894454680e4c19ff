use axum::extract::State;
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path, Query};
use crate::models::{FavoriteState, NewFavorite, Property, PropertySummary};
use crate::pagination::{PageParams, Paginated};
use crate::queries::properties::{attach_primary_images, find_property};
use crate::schema::{properties, user_favorites};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct FavoriteRequest {
    pub property_id: i32,
}

async fn insert_favorite(conn: &mut AsyncPgConnection, user_id: i32, property_id: i32) -> ApiResult<()> {
    find_property(conn, property_id).await?;
    diesel::insert_into(user_favorites::table)
        .values(NewFavorite { user_id, property_id })
        .on_conflict_do_nothing()
        .execute(conn)
        .await?;
    Ok(())
}

async fn delete_favorite(conn: &mut AsyncPgConnection, user_id: i32, property_id: i32) -> QueryResult<usize> {
    diesel::delete(
        user_favorites::table
            .filter(user_favorites::user_id.eq(user_id))
            .filter(user_favorites::property_id.eq(property_id)),
    )
    .execute(conn)
    .await
}

pub async fn list_favorites(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Paginated<PropertySummary>>> {
    let mut conn = state.pool.get().await?;
    let total: i64 = user_favorites::table
        .filter(user_favorites::user_id.eq(user.id))
        .count()
        .get_result(&mut conn)
        .await?;
    let rows: Vec<Property> = user_favorites::table
        .inner_join(properties::table)
        .filter(user_favorites::user_id.eq(user.id))
        .order((user_favorites::created_at.desc(), properties::id.desc()))
        .select(Property::as_select())
        .limit(page.limit())
        .offset(page.offset())
        .load(&mut conn)
        .await?;
    let items = attach_primary_images(&mut conn, rows).await?;
    Ok(Json(page.into_page(items, total)))
}

pub async fn add_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<FavoriteRequest>,
) -> ApiResult<Json<FavoriteState>> {
    let mut conn = state.pool.get().await?;
    insert_favorite(&mut conn, user.id, req.property_id).await?;
    log::info!("User {} favorited property {}", user.id, req.property_id);
    Ok(Json(FavoriteState {
        property_id: req.property_id,
        favorited: true,
    }))
}

pub async fn remove_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(property_id): Path<i32>,
) -> ApiResult<Json<FavoriteState>> {
    let mut conn = state.pool.get().await?;
    let removed = delete_favorite(&mut conn, user.id, property_id).await?;
    if removed > 0 {
        log::info!("User {} unfavorited property {}", user.id, property_id);
    }
    Ok(Json(FavoriteState {
        property_id,
        favorited: false,
    }))
}

pub async fn toggle_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(property_id): Path<i32>,
) -> ApiResult<Json<FavoriteState>> {
    let mut conn = state.pool.get().await?;
    let favorited = conn
        .transaction::<_, ApiError, _>(|conn| {
            async move {
                if delete_favorite(conn, user.id, property_id).await? > 0 {
                    return Ok(false);
                }
                insert_favorite(conn, user.id, property_id).await?;
                Ok(true)
            }
            .scope_boxed()
        })
        .await?;

    log::info!("User {} toggled property {} to {}", user.id, property_id, favorited);
    Ok(Json(FavoriteState {
        property_id,
        favorited,
    }))
}

pub async fn favorite_state(
    State(state): State<AppState>,
    user: AuthUser,
    Path(property_id): Path<i32>,
) -> ApiResult<Json<FavoriteState>> {
    let mut conn = state.pool.get().await?;
    let favorited: bool = diesel::select(exists(
        user_favorites::table
            .filter(user_favorites::user_id.eq(user.id))
            .filter(user_favorites::property_id.eq(property_id)),
    ))
    .get_result(&mut conn)
    .await?;
    Ok(Json(FavoriteState {
        property_id,
        favorited,
    }))
}
