use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::models::{Review, ReviewWithAuthor};
use crate::schema::{reviews, users};

/// One page of reviews with their authors, newest first. `realtor_id`
/// narrows the page to reviews about one realtor.
pub async fn review_page(
    conn: &mut AsyncPgConnection,
    realtor_id: Option<i32>,
    limit: i64,
    offset: i64,
) -> QueryResult<(Vec<ReviewWithAuthor>, i64)> {
    let mut count = reviews::table.into_boxed();
    let mut page = reviews::table
        .inner_join(users::table.on(users::id.eq(reviews::user_id)))
        .into_boxed();
    if let Some(realtor_id) = realtor_id {
        count = count.filter(reviews::realtor_id.eq(realtor_id));
        page = page.filter(reviews::realtor_id.eq(realtor_id));
    }

    let total: i64 = count.count().get_result(conn).await?;
    let rows: Vec<(Review, String)> = page
        .order((reviews::created_at.desc(), reviews::id.desc()))
        .select((Review::as_select(), users::username))
        .limit(limit)
        .offset(offset)
        .load(conn)
        .await?;
    let items = rows
        .into_iter()
        .map(|(review, reviewer_username)| ReviewWithAuthor {
            review,
            reviewer_username,
        })
        .collect();
    Ok((items, total))
}
