use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Bool, Integer, Nullable, Text, Timestamptz};
use serde::Serialize;

use crate::schema::messages;

#[derive(Debug, Clone, Serialize, Queryable, Selectable)]
#[diesel(table_name = messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Message {
    pub id: i32,
    pub sender_id: i32,
    pub receiver_id: i32,
    pub property_id: Option<i32>,
    pub message_text: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = messages)]
pub struct NewMessage<'a> {
    pub sender_id: i32,
    pub receiver_id: i32,
    pub property_id: Option<i32>,
    pub message_text: &'a str,
}

/// Identifies the conversation between two users independent of direction.
pub fn conversation_key(a: i32, b: i32) -> String {
    format!("{}-{}", a.min(b), a.max(b))
}

/// One row of the conversation list query: the latest message per
/// counterpart and how many of the counterpart's messages are unread.
#[derive(Debug, QueryableByName)]
pub struct ConversationRow {
    #[diesel(sql_type = Integer)]
    pub other_user_id: i32,
    #[diesel(sql_type = Text)]
    pub other_username: String,
    #[diesel(sql_type = Integer)]
    pub message_id: i32,
    #[diesel(sql_type = Integer)]
    pub sender_id: i32,
    #[diesel(sql_type = Nullable<Integer>)]
    pub property_id: Option<i32>,
    #[diesel(sql_type = Text)]
    pub message_text: String,
    #[diesel(sql_type = Bool)]
    pub is_read: bool,
    #[diesel(sql_type = Timestamptz)]
    pub created_at: DateTime<Utc>,
    #[diesel(sql_type = BigInt)]
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
pub struct LastMessage {
    pub id: i32,
    pub sender_id: i32,
    pub property_id: Option<i32>,
    pub message_text: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct Conversation {
    pub conversation_key: String,
    pub other_user_id: i32,
    pub other_username: String,
    pub last_message: LastMessage,
    pub unread_count: i64,
}

impl Conversation {
    pub fn from_row(user_id: i32, row: ConversationRow) -> Self {
        Self {
            conversation_key: conversation_key(user_id, row.other_user_id),
            other_user_id: row.other_user_id,
            other_username: row.other_username,
            last_message: LastMessage {
                id: row.message_id,
                sender_id: row.sender_id,
                property_id: row.property_id,
                message_text: row.message_text,
                is_read: row.is_read,
                created_at: row.created_at,
            },
            unread_count: row.unread_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(3, 9, "3-9")]
    #[case(9, 3, "3-9")]
    #[case(12, 2, "2-12")]
    fn conversation_key_is_order_independent(#[case] a: i32, #[case] b: i32, #[case] expected: &str) {
        assert_eq!(conversation_key(a, b), expected);
    }

    #[test]
    fn conversation_from_row_keys_on_both_participants() {
        let row = ConversationRow {
            other_user_id: 4,
            other_username: "dana".into(),
            message_id: 77,
            sender_id: 4,
            property_id: Some(12),
            message_text: "Is it still available?".into(),
            is_read: false,
            created_at: Utc::now(),
            unread_count: 2,
        };
        let conversation = Conversation::from_row(11, row);
        assert_eq!(conversation.conversation_key, "4-11");
        assert_eq!(conversation.last_message.id, 77);
        assert_eq!(conversation.unread_count, 2);
    }
}
