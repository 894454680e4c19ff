use axum::extract::State;
use axum::http::StatusCode;
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path, Query};
use crate::models::{Conversation, Message, NewMessage};
use crate::pagination::{PageParams, Paginated};
use crate::queries;
use crate::schema::{messages, properties, users};
use crate::AppState;

pub const MAX_MESSAGE_LEN: usize = 5000;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub receiver_id: i32,
    pub property_id: Option<i32>,
    pub message_text: String,
}

impl SendMessageRequest {
    /// Checks the request for the given sender and returns the trimmed text.
    pub fn validate(&self, sender_id: i32) -> ApiResult<&str> {
        let text = self.message_text.trim();
        if text.is_empty() {
            return Err(ApiError::bad_request("Message text is required"));
        }
        if text.chars().count() > MAX_MESSAGE_LEN {
            return Err(ApiError::bad_request(format!(
                "Message text must be at most {} characters",
                MAX_MESSAGE_LEN
            )));
        }
        if self.receiver_id == sender_id {
            return Err(ApiError::bad_request("You cannot message yourself"));
        }
        Ok(text)
    }
}

pub async fn send_message(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    let text = req.validate(user.id)?;
    let mut conn = state.pool.get().await?;

    let receiver_exists: bool = diesel::select(exists(users::table.find(req.receiver_id)))
        .get_result(&mut conn)
        .await?;
    if !receiver_exists {
        return Err(ApiError::not_found("Recipient not found"));
    }
    if let Some(property_id) = req.property_id {
        let property_exists: bool = diesel::select(exists(properties::table.find(property_id)))
            .get_result(&mut conn)
            .await?;
        if !property_exists {
            return Err(ApiError::not_found("Property not found"));
        }
    }

    let message = diesel::insert_into(messages::table)
        .values(NewMessage {
            sender_id: user.id,
            receiver_id: req.receiver_id,
            property_id: req.property_id,
            message_text: text,
        })
        .returning(Message::as_returning())
        .get_result(&mut conn)
        .await?;

    log::info!("User {} sent message {} to {}", user.id, message.id, req.receiver_id);
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Paginated<Conversation>>> {
    let mut conn = state.pool.get().await?;
    let total = queries::messages::conversation_count(&mut conn, user.id).await?;
    let rows = queries::messages::conversations(&mut conn, user.id, page.limit(), page.offset()).await?;
    Ok(Json(
        page.into_page(rows, total)
            .map(|row| Conversation::from_row(user.id, row)),
    ))
}

pub async fn conversation_messages(
    State(state): State<AppState>,
    user: AuthUser,
    Path(other_id): Path<i32>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Paginated<Message>>> {
    let between = messages::sender_id
        .eq(user.id)
        .and(messages::receiver_id.eq(other_id))
        .or(messages::sender_id.eq(other_id).and(messages::receiver_id.eq(user.id)));

    let mut conn = state.pool.get().await?;
    let total: i64 = messages::table
        .filter(between.clone())
        .count()
        .get_result(&mut conn)
        .await?;
    let items = messages::table
        .filter(between)
        .order((messages::created_at.desc(), messages::id.desc()))
        .select(Message::as_select())
        .limit(page.limit())
        .offset(page.offset())
        .load(&mut conn)
        .await?;
    Ok(Json(page.into_page(items, total)))
}

pub async fn mark_conversation_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(other_id): Path<i32>,
) -> ApiResult<Json<Value>> {
    let mut conn = state.pool.get().await?;
    let updated = diesel::update(
        messages::table
            .filter(messages::sender_id.eq(other_id))
            .filter(messages::receiver_id.eq(user.id))
            .filter(messages::is_read.eq(false)),
    )
    .set(messages::is_read.eq(true))
    .execute(&mut conn)
    .await?;

    log::debug!("User {} read {} messages from {}", user.id, updated, other_id);
    Ok(Json(json!({ "updated": updated })))
}

pub async fn mark_message_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<Message>> {
    let mut conn = state.pool.get().await?;
    let receiver_id: i32 = messages::table
        .find(id)
        .select(messages::receiver_id)
        .first(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("Message not found"))?;
    if receiver_id != user.id {
        return Err(ApiError::forbidden("Only the recipient can mark a message as read"));
    }

    let message = diesel::update(messages::table.find(id))
        .set(messages::is_read.eq(true))
        .returning(Message::as_returning())
        .get_result(&mut conn)
        .await?;
    Ok(Json(message))
}

pub async fn unread_count(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Value>> {
    let mut conn = state.pool.get().await?;
    let count: i64 = messages::table
        .filter(messages::receiver_id.eq(user.id))
        .filter(messages::is_read.eq(false))
        .count()
        .get_result(&mut conn)
        .await?;
    Ok(Json(json!({ "count": count })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn request(receiver_id: i32, text: &str) -> SendMessageRequest {
        SendMessageRequest {
            receiver_id,
            property_id: None,
            message_text: text.to_string(),
        }
    }

    #[test]
    fn text_is_trimmed() {
        let req = request(2, "  Is the loft still available?  ");
        assert_eq!(req.validate(1).unwrap(), "Is the loft still available?");
    }

    #[rstest]
    #[case(request(2, "   "))]
    #[case(request(2, &"a".repeat(MAX_MESSAGE_LEN + 1)))]
    #[case(request(1, "hello me"))]
    fn bad_messages_are_rejected(#[case] req: SendMessageRequest) {
        assert!(matches!(req.validate(1), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn longest_allowed_message_passes() {
        let req = request(2, &"a".repeat(MAX_MESSAGE_LEN));
        assert!(req.validate(1).is_ok());
    }
}
