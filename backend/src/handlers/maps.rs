use axum::extract::State;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Query};
use crate::geocoding::GeocodedLocation;
use crate::models::{MapMarker, Property, PropertyStatus};
use crate::queries::properties::primary_image_ids;
use crate::schema::properties;
use crate::AppState;

pub const MAX_MARKERS: i64 = 500;

/// Visible map area. `west > east` means the box crosses the antimeridian.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Bounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
    pub status: Option<PropertyStatus>,
}

#[derive(Debug, Deserialize)]
pub struct GeocodeQuery {
    pub address: String,
}

impl Bounds {
    pub fn validate(&self) -> ApiResult<()> {
        let lat_ok = |v: f64| (-90.0..=90.0).contains(&v);
        let lng_ok = |v: f64| (-180.0..=180.0).contains(&v);
        if !lat_ok(self.north) || !lat_ok(self.south) {
            return Err(ApiError::bad_request("Latitude must be between -90 and 90"));
        }
        if !lng_ok(self.east) || !lng_ok(self.west) {
            return Err(ApiError::bad_request("Longitude must be between -180 and 180"));
        }
        if self.south > self.north {
            return Err(ApiError::bad_request("south must not exceed north"));
        }
        Ok(())
    }

    pub fn crosses_antimeridian(&self) -> bool {
        self.west > self.east
    }

    fn query(&self) -> properties::BoxedQuery<'static, Pg> {
        let mut query = properties::table
            .filter(properties::latitude.between(self.south, self.north))
            .into_boxed();
        query = if self.crosses_antimeridian() {
            query.filter(
                properties::longitude
                    .ge(self.west)
                    .or(properties::longitude.le(self.east)),
            )
        } else {
            query.filter(properties::longitude.between(self.west, self.east))
        };
        if let Some(status) = self.status {
            query = query.filter(properties::status.eq(status));
        }
        query
            .order((properties::created_at.desc(), properties::id.desc()))
            .limit(MAX_MARKERS)
    }
}

fn marker(property: Property, primary_image_id: Option<i32>) -> Option<MapMarker> {
    Some(MapMarker {
        latitude: property.latitude?,
        longitude: property.longitude?,
        id: property.id,
        title: property.title,
        price: property.price,
        price_type: property.price_type,
        status: property.status,
        primary_image_id,
    })
}

pub async fn properties_in_bounds(
    State(state): State<AppState>,
    Query(bounds): Query<Bounds>,
) -> ApiResult<Json<Vec<MapMarker>>> {
    bounds.validate()?;
    let mut conn = state.pool.get().await?;
    let rows: Vec<Property> = bounds
        .query()
        .select(Property::as_select())
        .load(&mut conn)
        .await?;
    let ids: Vec<i32> = rows.iter().map(|p| p.id).collect();
    let primary = primary_image_ids(&mut conn, &ids).await?;

    let markers: Vec<MapMarker> = rows
        .into_iter()
        .filter_map(|p| {
            let image = primary.get(&p.id).copied();
            marker(p, image)
        })
        .collect();
    log::debug!("Map query returned {} markers", markers.len());
    Ok(Json(markers))
}

pub async fn geocode(
    State(state): State<AppState>,
    Query(query): Query<GeocodeQuery>,
) -> ApiResult<Json<GeocodedLocation>> {
    Ok(Json(state.geocoder.geocode(&query.address).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::debug_query;
    use rstest::rstest;

    fn bounds(north: f64, south: f64, east: f64, west: f64) -> Bounds {
        Bounds {
            north,
            south,
            east,
            west,
            status: None,
        }
    }

    #[rstest]
    #[case(bounds(31.0, 30.0, -97.0, -98.0), true)]
    #[case(bounds(30.0, 31.0, -97.0, -98.0), false)]
    #[case(bounds(91.0, 30.0, -97.0, -98.0), false)]
    #[case(bounds(31.0, 30.0, 181.0, -98.0), false)]
    #[case(bounds(31.0, 30.0, -170.0, 170.0), true)]
    #[case(bounds(f64::NAN, 30.0, -97.0, -98.0), false)]
    fn bounds_validation(#[case] b: Bounds, #[case] ok: bool) {
        assert_eq!(b.validate().is_ok(), ok);
    }

    #[test]
    fn regular_box_uses_between() {
        let sql = debug_query::<Pg, _>(&bounds(31.0, 30.0, -97.0, -98.0).query()).to_string();
        assert!(sql.contains("\"properties\".\"longitude\" BETWEEN"), "{sql}");
        assert!(sql.contains("LIMIT"), "{sql}");
    }

    #[test]
    fn antimeridian_box_wraps_around() {
        let b = bounds(10.0, -10.0, -170.0, 170.0);
        assert!(b.crosses_antimeridian());
        let sql = debug_query::<Pg, _>(&b.query()).to_string();
        assert!(sql.contains("\"properties\".\"longitude\" >= $"), "{sql}");
        assert!(sql.contains(" OR "), "{sql}");
    }
}
