use std::sync::Arc;

use axum::routing::{delete, get, patch, post, put};
use axum::{middleware, Router};

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod geocoding;
pub mod handlers;
pub mod media;
pub mod models;
pub mod pagination;
pub mod queries;
pub mod schema;

use config::AppConfig;
use db::DbPool;
use geocoding::GeocodingClient;
use handlers::{admin, favorites, health, maps, messages, properties, reviews, users};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pool: DbPool,
    pub geocoder: GeocodingClient,
}

impl AppState {
    pub fn new(config: AppConfig, pool: DbPool, geocoder: GeocodingClient) -> Self {
        Self {
            config: Arc::new(config),
            pool,
            geocoder,
        }
    }
}

pub fn app(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/me", get(handlers::auth::me))
        .route("/forgot-password", post(handlers::auth::forgot_password))
        .route("/reset-password", post(handlers::auth::reset_password));

    let user_routes = Router::new()
        .route("/me", put(users::update_me))
        .route("/me/password", put(users::change_password))
        .route("/:id", get(users::get_user))
        .route("/:id/profile-picture", get(users::profile_picture));

    let property_routes = Router::new()
        .route("/", get(properties::list_properties).post(properties::create_property))
        .route("/mine", get(properties::my_properties))
        .route(
            "/:id",
            get(properties::get_property)
                .put(properties::update_property)
                .delete(properties::delete_property),
        )
        .route("/:id/status", patch(properties::update_status))
        .route("/:id/images/:image_id", get(properties::property_image));

    let favorite_routes = Router::new()
        .route("/", get(favorites::list_favorites).post(favorites::add_favorite))
        .route(
            "/:property_id",
            get(favorites::favorite_state).delete(favorites::remove_favorite),
        )
        .route("/:property_id/toggle", post(favorites::toggle_favorite));

    let message_routes = Router::new()
        .route("/", post(messages::send_message))
        .route("/conversations", get(messages::list_conversations))
        .route("/conversations/:user_id", get(messages::conversation_messages))
        .route("/conversations/:user_id/read", post(messages::mark_conversation_read))
        .route("/:id/read", patch(messages::mark_message_read))
        .route("/unread-count", get(messages::unread_count));

    let realtor_routes = Router::new()
        .route("/", get(users::list_realtors))
        .route(
            "/:id/reviews",
            get(reviews::list_reviews).post(reviews::create_review),
        );

    let admin_routes = Router::new()
        .route("/stats", get(admin::stats))
        .route("/users", get(admin::list_users))
        .route(
            "/users/:id",
            patch(admin::update_user_type).delete(admin::delete_user),
        )
        .route("/properties", get(admin::list_properties))
        .route("/properties/bulk-delete", post(admin::bulk_delete_properties))
        .route("/reviews", get(admin::list_reviews))
        .route_layer(middleware::from_fn(auth::require_admin))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::authenticate,
        ));

    let map_routes = Router::new()
        .route("/properties", get(maps::properties_in_bounds))
        .route("/geocode", get(maps::geocode));

    let api = Router::new()
        .route("/health", get(health::health))
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/realtors", realtor_routes)
        .nest("/properties", property_routes)
        .nest("/favorites", favorite_routes)
        .nest("/messages", message_routes)
        .route("/reviews/:id", delete(reviews::delete_review))
        .nest("/admin", admin_routes)
        .nest("/maps", map_routes);

    Router::new()
        .route("/", get(|| async { "Hello, Real Estate Listings!" }))
        .nest("/api", api)
        .with_state(state)
}
