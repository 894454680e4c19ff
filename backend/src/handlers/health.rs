use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use diesel::sql_types::Integer;
use diesel_async::RunQueryDsl;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Health {
    pub status: &'static str,
    pub database: &'static str,
}

async fn database_up(state: &AppState) -> bool {
    let mut conn = match state.pool.get().await {
        Ok(conn) => conn,
        Err(e) => {
            log::warn!("Health check could not get a connection: {}", e);
            return false;
        }
    };
    match diesel::select(diesel::dsl::sql::<Integer>("1"))
        .get_result::<i32>(&mut conn)
        .await
    {
        Ok(_) => true,
        Err(e) => {
            log::warn!("Health check query failed: {}", e);
            false
        }
    }
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Health>) {
    if database_up(&state).await {
        (
            StatusCode::OK,
            Json(Health {
                status: "ok",
                database: "up",
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(Health {
                status: "ok",
                database: "down",
            }),
        )
    }
}
