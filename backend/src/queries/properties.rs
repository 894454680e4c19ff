use std::collections::HashMap;

use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::models::{
    PriceType, Property, PropertyDetail, PropertyFeature, PropertyStatus, PropertySummary,
    RealtorSummary,
};
use crate::schema::{messages, properties, property_features, property_images, user_favorites, users};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    PriceAsc,
    PriceDesc,
}

/// Listing search filters taken from the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertySearch {
    pub q: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub price_type: Option<PriceType>,
    pub property_type: Option<String>,
    pub status: Option<PropertyStatus>,
    pub realtor_id: Option<i32>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub min_bedrooms: Option<i32>,
    pub min_bathrooms: Option<i32>,
    pub min_area: Option<i32>,
    pub max_area: Option<i32>,
    pub sort: Option<SortOrder>,
}

impl PropertySearch {
    pub fn validate(&self) -> ApiResult<()> {
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(ApiError::bad_request("min_price must not exceed max_price"));
            }
        }
        if let (Some(min), Some(max)) = (self.min_area, self.max_area) {
            if min > max {
                return Err(ApiError::bad_request("min_area must not exceed max_area"));
            }
        }
        Ok(())
    }
}

/// Escapes `%`, `_` and `\` so user text matches literally inside ILIKE.
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Builds the filtered listing query. Called once for the page and once for
/// the total count.
pub fn filtered(search: &PropertySearch) -> properties::BoxedQuery<'static, Pg> {
    let mut query = properties::table.into_boxed();

    if let Some(q) = non_blank(&search.q) {
        let pattern = format!("%{}%", escape_like(q));
        query = query.filter(
            properties::title
                .ilike(pattern.clone())
                .or(properties::address.ilike(pattern.clone()))
                .or(properties::city.ilike(pattern.clone()))
                .or(properties::description.ilike(pattern)),
        );
    }
    if let Some(city) = non_blank(&search.city) {
        query = query.filter(properties::city.ilike(escape_like(city)));
    }
    if let Some(state) = non_blank(&search.state) {
        query = query.filter(properties::state.ilike(escape_like(state)));
    }
    if let Some(zip_code) = non_blank(&search.zip_code) {
        query = query.filter(properties::zip_code.eq(zip_code.to_string()));
    }
    if let Some(price_type) = search.price_type {
        query = query.filter(properties::price_type.eq(price_type));
    }
    if let Some(property_type) = non_blank(&search.property_type) {
        query = query.filter(properties::property_type.ilike(escape_like(property_type)));
    }
    if let Some(status) = search.status {
        query = query.filter(properties::status.eq(status));
    }
    if let Some(realtor_id) = search.realtor_id {
        query = query.filter(properties::realtor_id.eq(realtor_id));
    }
    if let Some(min_price) = search.min_price {
        query = query.filter(properties::price.ge(min_price));
    }
    if let Some(max_price) = search.max_price {
        query = query.filter(properties::price.le(max_price));
    }
    if let Some(min_bedrooms) = search.min_bedrooms {
        query = query.filter(properties::bedrooms.ge(min_bedrooms));
    }
    if let Some(min_bathrooms) = search.min_bathrooms {
        query = query.filter(properties::bathrooms.ge(min_bathrooms));
    }
    if let Some(min_area) = search.min_area {
        query = query.filter(properties::area.ge(min_area));
    }
    if let Some(max_area) = search.max_area {
        query = query.filter(properties::area.le(max_area));
    }
    query
}

pub fn sorted(
    query: properties::BoxedQuery<'static, Pg>,
    sort: SortOrder,
) -> properties::BoxedQuery<'static, Pg> {
    match sort {
        SortOrder::Newest => query.order((properties::created_at.desc(), properties::id.desc())),
        SortOrder::Oldest => query.order((properties::created_at.asc(), properties::id.asc())),
        SortOrder::PriceAsc => query.order((properties::price.asc(), properties::id.asc())),
        SortOrder::PriceDesc => query.order((properties::price.desc(), properties::id.desc())),
    }
}

/// Runs a filtered search and returns one page plus the total match count.
pub async fn search_page(
    conn: &mut AsyncPgConnection,
    search: &PropertySearch,
    limit: i64,
    offset: i64,
) -> ApiResult<(Vec<PropertySummary>, i64)> {
    let total: i64 = filtered(search).count().get_result(conn).await?;
    let rows: Vec<Property> = sorted(filtered(search), search.sort.unwrap_or_default())
        .select(Property::as_select())
        .limit(limit)
        .offset(offset)
        .load(conn)
        .await?;
    let items = attach_primary_images(conn, rows).await?;
    Ok((items, total))
}

/// Looks up the primary image (or the first image) for each property.
pub async fn primary_image_ids(
    conn: &mut AsyncPgConnection,
    property_ids: &[i32],
) -> QueryResult<HashMap<i32, i32>> {
    if property_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(i32, i32)> = property_images::table
        .filter(property_images::property_id.eq_any(property_ids))
        .select((property_images::property_id, property_images::id))
        .order((
            property_images::property_id.asc(),
            property_images::is_primary.desc(),
            property_images::id.asc(),
        ))
        .load(conn)
        .await?;

    let mut primary = HashMap::new();
    for (property_id, image_id) in rows {
        primary.entry(property_id).or_insert(image_id);
    }
    Ok(primary)
}

pub async fn attach_primary_images(
    conn: &mut AsyncPgConnection,
    rows: Vec<Property>,
) -> QueryResult<Vec<PropertySummary>> {
    let ids: Vec<i32> = rows.iter().map(|p| p.id).collect();
    let primary = primary_image_ids(conn, &ids).await?;
    Ok(rows
        .into_iter()
        .map(|property| PropertySummary {
            primary_image_id: primary.get(&property.id).copied(),
            property,
        })
        .collect())
}

pub async fn find_property(conn: &mut AsyncPgConnection, id: i32) -> ApiResult<Property> {
    properties::table
        .find(id)
        .select(Property::as_select())
        .first(conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("Property not found"))
}

pub async fn load_detail(conn: &mut AsyncPgConnection, id: i32) -> ApiResult<PropertyDetail> {
    let property = find_property(conn, id).await?;
    let features = property_features::table
        .filter(property_features::property_id.eq(id))
        .select(PropertyFeature::as_select())
        .order(property_features::id.asc())
        .load(conn)
        .await?;
    let image_ids = property_images::table
        .filter(property_images::property_id.eq(id))
        .select(property_images::id)
        .order((property_images::is_primary.desc(), property_images::id.asc()))
        .load::<i32>(conn)
        .await?;
    let realtor = users::table
        .find(property.realtor_id)
        .select((users::id, users::username, users::email, users::phone_number))
        .first::<RealtorSummary>(conn)
        .await?;

    Ok(PropertyDetail {
        property,
        features,
        image_ids,
        realtor,
    })
}

/// Deletes properties and everything hanging off them. Messages about the
/// properties are kept and detached. Must run inside a transaction.
pub async fn delete_properties(conn: &mut AsyncPgConnection, ids: &[i32]) -> QueryResult<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    diesel::delete(user_favorites::table.filter(user_favorites::property_id.eq_any(ids)))
        .execute(conn)
        .await?;
    diesel::delete(property_images::table.filter(property_images::property_id.eq_any(ids)))
        .execute(conn)
        .await?;
    diesel::delete(property_features::table.filter(property_features::property_id.eq_any(ids)))
        .execute(conn)
        .await?;
    diesel::update(messages::table.filter(messages::property_id.eq_any(ids)))
        .set(messages::property_id.eq(None::<i32>))
        .execute(conn)
        .await?;
    diesel::delete(properties::table.filter(properties::id.eq_any(ids)))
        .execute(conn)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::debug_query;
    use rstest::rstest;

    #[rstest]
    #[case("garden", "garden")]
    #[case("100%", "100\\%")]
    #[case("semi_detached", "semi\\_detached")]
    #[case("back\\slash", "back\\\\slash")]
    fn like_wildcards_are_escaped(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(escape_like(input), expected);
    }

    #[rstest]
    #[case(Some(500), Some(100), None, None, false)]
    #[case(Some(100), Some(500), None, None, true)]
    #[case(None, None, Some(90), Some(40), false)]
    #[case(Some(100), Some(100), Some(40), Some(40), true)]
    fn ranges_must_be_ordered(
        #[case] min_price: Option<i64>,
        #[case] max_price: Option<i64>,
        #[case] min_area: Option<i32>,
        #[case] max_area: Option<i32>,
        #[case] ok: bool,
    ) {
        let search = PropertySearch {
            min_price,
            max_price,
            min_area,
            max_area,
            ..PropertySearch::default()
        };
        assert_eq!(search.validate().is_ok(), ok);
    }

    #[test]
    fn empty_search_has_no_where_clause() {
        let sql = debug_query::<Pg, _>(&filtered(&PropertySearch::default())).to_string();
        assert!(!sql.contains("WHERE"), "{sql}");
    }

    #[test]
    fn filters_become_where_clauses() {
        let search = PropertySearch {
            q: Some("  loft ".into()),
            city: Some("Austin".into()),
            price_type: Some(PriceType::Rent),
            status: Some(PropertyStatus::OffMarket),
            min_bedrooms: Some(2),
            max_price: Some(3000),
            ..PropertySearch::default()
        };
        let sql = debug_query::<Pg, _>(&filtered(&search)).to_string();
        assert!(sql.contains("ILIKE"), "{sql}");
        assert!(sql.contains("\"properties\".\"price_type\" = $"), "{sql}");
        assert!(sql.contains("\"properties\".\"bedrooms\" >= $"), "{sql}");
        assert!(sql.contains("\"properties\".\"price\" <= $"), "{sql}");
        assert!(sql.contains("%loft%"), "{sql}");
    }

    #[test]
    fn blank_text_filters_are_ignored() {
        let search = PropertySearch {
            q: Some("   ".into()),
            city: Some(String::new()),
            ..PropertySearch::default()
        };
        let sql = debug_query::<Pg, _>(&filtered(&search)).to_string();
        assert!(!sql.contains("WHERE"), "{sql}");
    }

    #[rstest]
    #[case(SortOrder::Newest, "\"properties\".\"created_at\" DESC")]
    #[case(SortOrder::Oldest, "\"properties\".\"created_at\" ASC")]
    #[case(SortOrder::PriceAsc, "\"properties\".\"price\" ASC")]
    #[case(SortOrder::PriceDesc, "\"properties\".\"price\" DESC")]
    fn sort_orders_render(#[case] sort: SortOrder, #[case] expected: &str) {
        let query = sorted(filtered(&PropertySearch::default()), sort);
        let sql = debug_query::<Pg, _>(&query).to_string();
        assert!(sql.contains(expected), "{sql}");
    }

    #[test]
    fn sort_parses_from_query_string_values() {
        let parsed: SortOrder = serde_json::from_str("\"price_desc\"").unwrap();
        assert_eq!(parsed, SortOrder::PriceDesc);
    }
}
