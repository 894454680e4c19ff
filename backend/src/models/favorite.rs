use diesel::prelude::*;
use serde::Serialize;

use crate::schema::user_favorites;

#[derive(Debug, Insertable)]
#[diesel(table_name = user_favorites)]
pub struct NewFavorite {
    pub user_id: i32,
    pub property_id: i32,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct FavoriteState {
    pub property_id: i32,
    pub favorited: bool,
}
