use listings_backend::config::AppConfig;
use listings_backend::db::{prepare_database, DbPool};
use listings_backend::geocoding::GeocodingClient;
use listings_backend::{app, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let config = AppConfig::load()?;
    log::info!("Loaded config: {:?}", config);

    let database_url = config.database_url.clone();
    tokio::task::spawn_blocking(move || prepare_database(&database_url)).await??;

    let pool = DbPool::connect(&config.database_url, config.db_pool_size).await?;
    let geocoder = GeocodingClient::from_config(&config)?;
    if !geocoder.is_enabled() {
        log::warn!("GEOCODING_API_KEY not set, address lookups are disabled");
    }

    let addr = format!("{}:{}", config.host, config.port);
    log::info!("Starting server on {}", addr);

    let state = AppState::new(config, pool, geocoder);
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, app(state).into_make_service()).await?;

    Ok(())
}
