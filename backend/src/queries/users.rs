use diesel::prelude::*;
use diesel::sql_types::{BigInt, Double, Integer, Nullable};
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use super::properties::delete_properties;
use crate::models::{RatingSummary, RealtorListing, UserType};
use crate::schema::{messages, properties, reviews, user_favorites, users};

const REALTORS_SQL: &str = r#"
SELECT u.id,
       u.username,
       u.bio,
       u.phone_number,
       (SELECT AVG(r.rating)::float8 FROM reviews r WHERE r.realtor_id = u.id) AS average_rating,
       (SELECT COUNT(*) FROM reviews r WHERE r.realtor_id = u.id) AS review_count,
       (SELECT COUNT(*) FROM properties p WHERE p.realtor_id = u.id) AS listing_count
  FROM users u
 WHERE u.user_type = 'Realtor'
 ORDER BY u.username
 LIMIT $1 OFFSET $2
"#;

const RATING_SQL: &str = r#"
SELECT AVG(rating)::float8 AS average_rating, COUNT(*) AS review_count
  FROM reviews
 WHERE realtor_id = $1
"#;

#[derive(Debug, QueryableByName)]
struct RatingRow {
    #[diesel(sql_type = Nullable<Double>)]
    average_rating: Option<f64>,
    #[diesel(sql_type = BigInt)]
    review_count: i64,
}

pub async fn realtor_page(
    conn: &mut AsyncPgConnection,
    limit: i64,
    offset: i64,
) -> QueryResult<(Vec<RealtorListing>, i64)> {
    let total: i64 = users::table
        .filter(users::user_type.eq(UserType::Realtor))
        .count()
        .get_result(conn)
        .await?;
    let items = diesel::sql_query(REALTORS_SQL)
        .bind::<BigInt, _>(limit)
        .bind::<BigInt, _>(offset)
        .load(conn)
        .await?;
    Ok((items, total))
}

pub async fn rating_summary(conn: &mut AsyncPgConnection, realtor_id: i32) -> QueryResult<RatingSummary> {
    let row: RatingRow = diesel::sql_query(RATING_SQL)
        .bind::<Integer, _>(realtor_id)
        .get_result(conn)
        .await?;
    Ok(RatingSummary {
        average_rating: row.average_rating,
        review_count: row.review_count,
    })
}

pub async fn user_type_of(conn: &mut AsyncPgConnection, user_id: i32) -> QueryResult<Option<UserType>> {
    users::table
        .find(user_id)
        .select(users::user_type)
        .first(conn)
        .await
        .optional()
}

/// Removes a user and everything that references them. Must run inside a
/// transaction; returns the number of listings removed with the user.
pub async fn delete_user_cascade(conn: &mut AsyncPgConnection, user_id: i32) -> QueryResult<usize> {
    diesel::delete(user_favorites::table.filter(user_favorites::user_id.eq(user_id)))
        .execute(conn)
        .await?;

    let listing_ids: Vec<i32> = properties::table
        .filter(properties::realtor_id.eq(user_id))
        .select(properties::id)
        .load(conn)
        .await?;

    diesel::delete(
        messages::table.filter(
            messages::sender_id
                .eq(user_id)
                .or(messages::receiver_id.eq(user_id)),
        ),
    )
    .execute(conn)
    .await?;

    diesel::delete(
        reviews::table.filter(reviews::user_id.eq(user_id).or(reviews::realtor_id.eq(user_id))),
    )
    .execute(conn)
    .await?;

    let removed = delete_properties(conn, &listing_ids).await?;

    diesel::delete(users::table.find(user_id))
        .execute(conn)
        .await?;
    Ok(removed)
}
