use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use chrono::{Datelike, Utc};
use diesel::dsl;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::Deserialize;

use super::{check_len, clean_optional};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path, Query};
use crate::geocoding::GeocodingClient;
use crate::media::image_response;
use crate::models::{
    FeatureInput, NewProperty, NewPropertyFeature, PriceType, Property, PropertyChanges,
    PropertyDetail, PropertyStatus, PropertySummary,
};
use crate::pagination::{PageParams, Paginated};
use crate::queries::properties::{delete_properties, load_detail, search_page, PropertySearch};
use crate::schema::{properties, property_features, property_images};
use crate::AppState;

const MIN_YEAR_BUILT: i32 = 1800;
const TITLE_MAX: usize = 200;
const ADDRESS_MAX: usize = 255;
const PLACE_MAX: usize = 100;
const ZIP_CODE_MAX: usize = 20;
const PROPERTY_TYPE_MAX: usize = 50;
const FEATURE_NAME_MAX: usize = 100;
const FEATURE_VALUE_MAX: usize = 255;

#[derive(Debug, Deserialize)]
pub struct CreatePropertyRequest {
    pub title: String,
    pub description: Option<String>,
    pub price: i64,
    pub price_type: PriceType,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    #[serde(default)]
    pub bedrooms: i32,
    #[serde(default)]
    pub bathrooms: i32,
    pub area: Option<i32>,
    pub property_type: String,
    pub year_built: Option<i32>,
    pub status: Option<PropertyStatus>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub features: Vec<FeatureInput>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePropertyRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub price_type: Option<PriceType>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub area: Option<i32>,
    pub property_type: Option<String>,
    pub year_built: Option<i32>,
    pub status: Option<PropertyStatus>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub features: Option<Vec<FeatureInput>>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: PropertyStatus,
}

/// Numeric fields shared by create and update.
#[derive(Debug, Default)]
struct Measurements {
    price: Option<i64>,
    bedrooms: Option<i32>,
    bathrooms: Option<i32>,
    area: Option<i32>,
    year_built: Option<i32>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl Measurements {
    fn validate(&self) -> ApiResult<()> {
        if self.price.is_some_and(|p| p <= 0) {
            return Err(ApiError::bad_request("Price must be greater than zero"));
        }
        if self.bedrooms.is_some_and(|b| b < 0) || self.bathrooms.is_some_and(|b| b < 0) {
            return Err(ApiError::bad_request("Bedrooms and bathrooms must not be negative"));
        }
        if self.area.is_some_and(|a| a <= 0) {
            return Err(ApiError::bad_request("Area must be greater than zero"));
        }
        let latest_year = Utc::now().year() + 5;
        if let Some(year) = self.year_built {
            if !(MIN_YEAR_BUILT..=latest_year).contains(&year) {
                return Err(ApiError::bad_request(format!(
                    "Year built must be between {} and {}",
                    MIN_YEAR_BUILT, latest_year
                )));
            }
        }
        if self.latitude.is_some_and(|lat| !(-90.0..=90.0).contains(&lat)) {
            return Err(ApiError::bad_request("Latitude must be between -90 and 90"));
        }
        if self.longitude.is_some_and(|lng| !(-180.0..=180.0).contains(&lng)) {
            return Err(ApiError::bad_request("Longitude must be between -180 and 180"));
        }
        Ok(())
    }
}

fn limited(value: String, field: &str, max: usize) -> ApiResult<String> {
    let value = value.trim().to_string();
    check_len(&value, field, max)?;
    Ok(value)
}

fn required(value: String, field: &str, max: usize) -> ApiResult<String> {
    let value = limited(value, field, max)?;
    if value.is_empty() {
        return Err(ApiError::bad_request(format!("{} is required", field)));
    }
    Ok(value)
}

fn clean_features(features: Vec<FeatureInput>) -> ApiResult<Vec<FeatureInput>> {
    features
        .into_iter()
        .map(|feature| {
            Ok(FeatureInput {
                name: required(feature.name, "Feature name", FEATURE_NAME_MAX)?,
                value: limited(feature.value, "Feature value", FEATURE_VALUE_MAX)?,
            })
        })
        .collect()
}

fn paired_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> ApiResult<()> {
    if latitude.is_some() != longitude.is_some() {
        return Err(ApiError::bad_request("Latitude and longitude must be given together"));
    }
    Ok(())
}

impl CreatePropertyRequest {
    /// Validates the request and splits it into the row and its features.
    pub fn into_new_property(self, realtor_id: i32) -> ApiResult<(NewProperty, Vec<FeatureInput>)> {
        Measurements {
            price: Some(self.price),
            bedrooms: Some(self.bedrooms),
            bathrooms: Some(self.bathrooms),
            area: self.area,
            year_built: self.year_built,
            latitude: self.latitude,
            longitude: self.longitude,
        }
        .validate()?;
        paired_coordinates(self.latitude, self.longitude)?;

        let property = NewProperty {
            title: required(self.title, "Title", TITLE_MAX)?,
            description: clean_optional(self.description),
            price: self.price,
            price_type: self.price_type,
            address: required(self.address, "Address", ADDRESS_MAX)?,
            city: limited(self.city, "City", PLACE_MAX)?,
            state: limited(self.state, "State", PLACE_MAX)?,
            zip_code: limited(self.zip_code, "Zip code", ZIP_CODE_MAX)?,
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            area: self.area,
            property_type: required(self.property_type, "Property type", PROPERTY_TYPE_MAX)?,
            year_built: self.year_built,
            status: self.status.unwrap_or(PropertyStatus::Available),
            latitude: self.latitude,
            longitude: self.longitude,
            realtor_id,
        };
        Ok((property, clean_features(self.features)?))
    }
}

impl UpdatePropertyRequest {
    pub fn into_changes(self) -> ApiResult<(PropertyChanges, Option<Vec<FeatureInput>>)> {
        Measurements {
            price: self.price,
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            area: self.area,
            year_built: self.year_built,
            latitude: self.latitude,
            longitude: self.longitude,
        }
        .validate()?;
        paired_coordinates(self.latitude, self.longitude)?;

        let changes = PropertyChanges {
            title: self.title.map(|t| required(t, "Title", TITLE_MAX)).transpose()?,
            description: self.description.map(|d| d.trim().to_string()),
            price: self.price,
            price_type: self.price_type,
            address: self
                .address
                .map(|a| required(a, "Address", ADDRESS_MAX))
                .transpose()?,
            city: self.city.map(|c| limited(c, "City", PLACE_MAX)).transpose()?,
            state: self.state.map(|s| limited(s, "State", PLACE_MAX)).transpose()?,
            zip_code: self
                .zip_code
                .map(|z| limited(z, "Zip code", ZIP_CODE_MAX))
                .transpose()?,
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            area: self.area,
            property_type: self
                .property_type
                .map(|t| required(t, "Property type", PROPERTY_TYPE_MAX))
                .transpose()?,
            year_built: self.year_built,
            status: self.status,
            latitude: self.latitude,
            longitude: self.longitude,
        };
        let features = self.features.map(clean_features).transpose()?;
        if changes.is_empty() && features.is_none() {
            return Err(ApiError::bad_request("Nothing to update"));
        }
        Ok((changes, features))
    }
}

/// Fills in missing coordinates from the address. A failed lookup leaves
/// the listing without coordinates.
async fn fill_coordinates(geocoder: &GeocodingClient, property: &mut NewProperty) {
    if property.latitude.is_some() || !geocoder.is_enabled() {
        return;
    }
    let address = format!(
        "{}, {}, {} {}",
        property.address, property.city, property.state, property.zip_code
    );
    match geocoder.geocode(&address).await {
        Ok(location) => {
            property.latitude = Some(location.latitude);
            property.longitude = Some(location.longitude);
        }
        Err(e) => log::warn!("Could not geocode {:?}: {}", address, e),
    }
}

async fn replace_features(
    conn: &mut AsyncPgConnection,
    property_id: i32,
    features: &[FeatureInput],
) -> QueryResult<()> {
    diesel::delete(property_features::table.filter(property_features::property_id.eq(property_id)))
        .execute(conn)
        .await?;
    if features.is_empty() {
        return Ok(());
    }
    let rows: Vec<NewPropertyFeature> = features
        .iter()
        .map(|f| NewPropertyFeature {
            property_id,
            feature_name: &f.name,
            feature_value: &f.value,
        })
        .collect();
    diesel::insert_into(property_features::table)
        .values(&rows)
        .execute(conn)
        .await?;
    Ok(())
}

type LockedOwner = dsl::ForUpdate<dsl::Select<dsl::Find<properties::table, i32>, properties::realtor_id>>;

fn locked_owner(id: i32) -> LockedOwner {
    properties::table
        .find(id)
        .select(properties::realtor_id)
        .for_update()
}

/// Locks a listing's row for the rest of the transaction and checks that
/// the caller may change it.
async fn lock_owned_property(conn: &mut AsyncPgConnection, user: &AuthUser, id: i32) -> ApiResult<()> {
    let realtor_id: i32 = locked_owner(id)
        .first(conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("Property not found"))?;
    if !user.can_manage(realtor_id) {
        return Err(ApiError::forbidden("You can only manage your own listings"));
    }
    Ok(())
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

pub async fn my_properties(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<PageParams>,
    Query(search): Query<PropertySearch>,
) -> ApiResult<Json<Paginated<PropertySummary>>> {
    user.require_lister()?;
    let search = PropertySearch {
        realtor_id: Some(user.id),
        ..search
    };
    search.validate()?;
    let mut conn = state.pool.get().await?;
    let (items, total) = search_page(&mut conn, &search, page.limit(), page.offset()).await?;
    Ok(Json(page.into_page(items, total)))
}

pub async fn get_property(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Json<PropertyDetail>> {
    let mut conn = state.pool.get().await?;
    Ok(Json(load_detail(&mut conn, id).await?))
}

pub async fn create_property(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreatePropertyRequest>,
) -> ApiResult<(StatusCode, Json<PropertyDetail>)> {
    user.require_lister()?;
    let (mut new_property, features) = req.into_new_property(user.id)?;
    fill_coordinates(&state.geocoder, &mut new_property).await;

    let mut conn = state.pool.get().await?;
    let detail = conn
        .transaction::<_, ApiError, _>(|conn| {
            async move {
                let property_id: i32 = diesel::insert_into(properties::table)
                    .values(&new_property)
                    .returning(properties::id)
                    .get_result(conn)
                    .await?;
                replace_features(conn, property_id, &features).await?;
                load_detail(conn, property_id).await
            }
            .scope_boxed()
        })
        .await?;

    log::info!("User {} listed property {}", user.id, detail.property.id);
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn update_property(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
    Json(req): Json<UpdatePropertyRequest>,
) -> ApiResult<Json<PropertyDetail>> {
    let (changes, features) = req.into_changes()?;
    let mut conn = state.pool.get().await?;
    let detail = conn
        .transaction::<_, ApiError, _>(|conn| {
            async move {
                lock_owned_property(conn, &user, id).await?;
                if !changes.is_empty() {
                    diesel::update(properties::table.find(id))
                        .set(&changes)
                        .execute(conn)
                        .await?;
                }
                if let Some(features) = &features {
                    replace_features(conn, id, features).await?;
                }
                load_detail(conn, id).await
            }
            .scope_boxed()
        })
        .await?;

    log::info!("User {} updated property {}", user.id, id);
    Ok(Json(detail))
}

pub async fn update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
    Json(req): Json<StatusRequest>,
) -> ApiResult<Json<Property>> {
    let status = req.status;
    let mut conn = state.pool.get().await?;
    let property = conn
        .transaction::<_, ApiError, _>(|conn| {
            async move {
                lock_owned_property(conn, &user, id).await?;
                Ok(diesel::update(properties::table.find(id))
                    .set(properties::status.eq(status))
                    .returning(Property::as_returning())
                    .get_result(conn)
                    .await?)
            }
            .scope_boxed()
        })
        .await?;

    log::info!("Property {} is now {}", id, status);
    Ok(Json(property))
}

pub async fn delete_property(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<StatusCode> {
    let mut conn = state.pool.get().await?;
    conn.transaction::<_, ApiError, _>(|conn| {
        async move {
            lock_owned_property(conn, &user, id).await?;
            Ok(delete_properties(conn, &[id]).await?)
        }
        .scope_boxed()
    })
    .await?;

    log::info!("User {} deleted property {}", user.id, id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn property_image(
    State(state): State<AppState>,
    Path((id, image_id)): Path<(i32, i32)>,
) -> ApiResult<Response> {
    let mut conn = state.pool.get().await?;
    let bytes: Vec<u8> = property_images::table
        .filter(property_images::id.eq(image_id))
        .filter(property_images::property_id.eq(id))
        .select(property_images::image_data)
        .first(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("Image not found"))?;
    Ok(image_response(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn create_request(overrides: serde_json::Value) -> CreatePropertyRequest {
        let mut body = json!({
            "title": "Sunny loft",
            "price": 350000,
            "price_type": "Sale",
            "address": "12 Main St",
            "city": "Austin",
            "state": "TX",
            "zip_code": "78701",
            "bedrooms": 2,
            "bathrooms": 1,
            "property_type": "Apartment",
            "features": [{"name": " Parking ", "value": "Garage"}]
        });
        if let (Some(body), Some(overrides)) = (body.as_object_mut(), overrides.as_object()) {
            for (key, value) in overrides {
                body.insert(key.clone(), value.clone());
            }
        }
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn valid_listing_defaults_to_available() {
        let (property, features) = create_request(json!({})).into_new_property(7).unwrap();
        assert_eq!(property.status, PropertyStatus::Available);
        assert_eq!(property.realtor_id, 7);
        assert_eq!(features[0].name, "Parking");
    }

    #[rstest]
    #[case(json!({"title": "  "}))]
    #[case(json!({"address": ""}))]
    #[case(json!({"price": 0}))]
    #[case(json!({"bedrooms": -1}))]
    #[case(json!({"area": 0}))]
    #[case(json!({"year_built": 1700}))]
    #[case(json!({"latitude": 91.0, "longitude": 0.0}))]
    #[case(json!({"latitude": 10.0, "longitude": -181.0}))]
    #[case(json!({"latitude": 10.0}))]
    #[case(json!({"features": [{"name": " ", "value": "x"}]}))]
    #[case(json!({"title": "t".repeat(201)}))]
    #[case(json!({"address": "a".repeat(256)}))]
    #[case(json!({"city": "c".repeat(101)}))]
    #[case(json!({"zip_code": "9".repeat(21)}))]
    #[case(json!({"property_type": "p".repeat(51)}))]
    #[case(json!({"features": [{"name": "n".repeat(101), "value": "x"}]}))]
    #[case(json!({"features": [{"name": "View", "value": "v".repeat(256)}]}))]
    fn invalid_listings_are_rejected(#[case] overrides: serde_json::Value) {
        let result = create_request(overrides).into_new_property(1);
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn longest_allowed_values_are_accepted() {
        let overrides = json!({
            "title": "t".repeat(200),
            "zip_code": "9".repeat(20),
            "features": [{"name": "n".repeat(100), "value": "v".repeat(255)}]
        });
        assert!(create_request(overrides).into_new_property(1).is_ok());
    }

    #[test]
    fn empty_update_is_rejected() {
        let result = UpdatePropertyRequest::default().into_changes();
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn feature_only_update_is_accepted() {
        let req = UpdatePropertyRequest {
            features: Some(vec![]),
            ..UpdatePropertyRequest::default()
        };
        let (changes, features) = req.into_changes().unwrap();
        assert!(changes.is_empty());
        assert_eq!(features, Some(vec![]));
    }

    #[test]
    fn update_checks_ranges() {
        let req = UpdatePropertyRequest {
            price: Some(-5),
            ..UpdatePropertyRequest::default()
        };
        assert!(req.into_changes().is_err());
    }

    #[rstest]
    #[case(Some(30.2), None)]
    #[case(None, Some(-97.7))]
    fn update_needs_both_coordinates(#[case] latitude: Option<f64>, #[case] longitude: Option<f64>) {
        let req = UpdatePropertyRequest {
            latitude,
            longitude,
            ..UpdatePropertyRequest::default()
        };
        assert!(matches!(req.into_changes(), Err(ApiError::BadRequest(_))));
    }

    #[rstest]
    #[case(UpdatePropertyRequest { title: Some("t".repeat(201)), ..UpdatePropertyRequest::default() })]
    #[case(UpdatePropertyRequest { state: Some("s".repeat(101)), ..UpdatePropertyRequest::default() })]
    #[case(UpdatePropertyRequest {
        features: Some(vec![FeatureInput { name: "n".repeat(101), value: String::new() }]),
        ..UpdatePropertyRequest::default()
    })]
    fn update_checks_lengths(#[case] req: UpdatePropertyRequest) {
        assert!(matches!(req.into_changes(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn ownership_check_locks_the_row() {
        let sql = diesel::debug_query::<diesel::pg::Pg, _>(&locked_owner(4)).to_string();
        assert!(sql.contains("\"properties\".\"realtor_id\""), "{sql}");
        assert!(sql.contains("FOR UPDATE"), "{sql}");
    }

    #[tokio::test]
    async fn listings_with_coordinates_skip_geocoding() {
        let geocoder = GeocodingClient::new("http://127.0.0.1:9", Some("key".into())).unwrap();
        let (mut property, _) = create_request(json!({"latitude": 30.2, "longitude": -97.7}))
            .into_new_property(1)
            .unwrap();
        fill_coordinates(&geocoder, &mut property).await;
        assert_eq!(property.latitude, Some(30.2));
    }

    #[tokio::test]
    async fn geocoding_failure_keeps_listing_without_coordinates() {
        let geocoder = GeocodingClient::new("http://127.0.0.1:9", Some("key".into())).unwrap();
        let (mut property, _) = create_request(json!({})).into_new_property(1).unwrap();
        fill_coordinates(&geocoder, &mut property).await;
        assert!(property.latitude.is_none());
        assert!(property.longitude.is_none());
    }
}
