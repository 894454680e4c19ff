use diesel::prelude::*;
use diesel::sql_types::{BigInt, Integer};
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::models::ConversationRow;

#[derive(Debug, QueryableByName)]
struct CountRow {
    #[diesel(sql_type = BigInt)]
    count: i64,
}

/// Latest message per counterpart, with the number of that counterpart's
/// messages the user has not read yet.
const CONVERSATIONS_SQL: &str = r#"
SELECT latest.other_user_id,
       u.username AS other_username,
       latest.message_id,
       latest.sender_id,
       latest.property_id,
       latest.message_text,
       latest.is_read,
       latest.created_at,
       (SELECT COUNT(*)
          FROM messages unread
         WHERE unread.sender_id = latest.other_user_id
           AND unread.receiver_id = $1
           AND unread.is_read = FALSE) AS unread_count
  FROM (
        SELECT DISTINCT ON (other_user_id)
               CASE WHEN m.sender_id = $1 THEN m.receiver_id ELSE m.sender_id END AS other_user_id,
               m.id AS message_id,
               m.sender_id,
               m.property_id,
               m.message_text,
               m.is_read,
               m.created_at
          FROM messages m
         WHERE m.sender_id = $1 OR m.receiver_id = $1
         ORDER BY other_user_id, m.created_at DESC, m.id DESC
       ) latest
  JOIN users u ON u.id = latest.other_user_id
 ORDER BY latest.created_at DESC, latest.message_id DESC
 LIMIT $2 OFFSET $3
"#;

const CONVERSATION_COUNT_SQL: &str = r#"
SELECT COUNT(DISTINCT CASE WHEN sender_id = $1 THEN receiver_id ELSE sender_id END) AS count
  FROM messages
 WHERE sender_id = $1 OR receiver_id = $1
"#;

pub async fn conversations(
    conn: &mut AsyncPgConnection,
    user_id: i32,
    limit: i64,
    offset: i64,
) -> QueryResult<Vec<ConversationRow>> {
    diesel::sql_query(CONVERSATIONS_SQL)
        .bind::<Integer, _>(user_id)
        .bind::<BigInt, _>(limit)
        .bind::<BigInt, _>(offset)
        .load(conn)
        .await
}

pub async fn conversation_count(conn: &mut AsyncPgConnection, user_id: i32) -> QueryResult<i64> {
    let row: CountRow = diesel::sql_query(CONVERSATION_COUNT_SQL)
        .bind::<Integer, _>(user_id)
        .get_result(conn)
        .await?;
    Ok(row.count)
}
