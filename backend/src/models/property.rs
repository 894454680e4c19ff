use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::{PriceType, PropertyStatus, RealtorSummary};
use crate::schema::{properties, property_features};

#[derive(Debug, Clone, Serialize, Queryable, Selectable)]
#[diesel(table_name = properties)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Property {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub price: i64,
    pub price_type: PriceType,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub area: Option<i32>,
    pub property_type: String,
    pub year_built: Option<i32>,
    pub status: PropertyStatus,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub realtor_id: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = properties)]
pub struct NewProperty {
    pub title: String,
    pub description: Option<String>,
    pub price: i64,
    pub price_type: PriceType,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub area: Option<i32>,
    pub property_type: String,
    pub year_built: Option<i32>,
    pub status: PropertyStatus,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub realtor_id: i32,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = properties)]
pub struct PropertyChanges {
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
}

impl PropertyChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.price_type.is_none()
            && self.address.is_none()
            && self.city.is_none()
            && self.state.is_none()
            && self.zip_code.is_none()
            && self.bedrooms.is_none()
            && self.bathrooms.is_none()
            && self.area.is_none()
            && self.property_type.is_none()
            && self.year_built.is_none()
            && self.status.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Queryable, Selectable)]
#[diesel(table_name = property_features)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PropertyFeature {
    pub id: i32,
    pub property_id: i32,
    pub feature_name: String,
    pub feature_value: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = property_features)]
pub struct NewPropertyFeature<'a> {
    pub property_id: i32,
    pub feature_name: &'a str,
    pub feature_value: &'a str,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureInput {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct PropertySummary {
    #[serde(flatten)]
    pub property: Property,
    pub primary_image_id: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct PropertyDetail {
    #[serde(flatten)]
    pub property: Property,
    pub features: Vec<PropertyFeature>,
    pub image_ids: Vec<i32>,
    pub realtor: RealtorSummary,
}

#[derive(Debug, Serialize)]
pub struct MapMarker {
    pub id: i32,
    pub title: String,
    pub price: i64,
    pub price_type: PriceType,
    pub status: PropertyStatus,
    pub latitude: f64,
    pub longitude: f64,
    pub primary_image_id: Option<i32>,
}
