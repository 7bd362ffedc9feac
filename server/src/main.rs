use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use ticketing_server::config::{Config, StoreBackend};
use ticketing_server::models::Category;
use ticketing_server::routes::create_routes;
use ticketing_server::services::AnyNotifier;
use ticketing_server::state::AppState;
use ticketing_server::store::{AnyStore, InMemoryTicketStore, PgTicketStore};

const DEFAULT_LOG_FILTER: &str = "ticketing_server=debug,tower_http=info";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = Config::from_env();

    let store = match config.store_backend {
        StoreBackend::Postgres => {
            let store = PgTicketStore::connect(&config.database_url, config.max_connections).await?;
            tracing::info!("Successfully connected to database");

            store.migrate().await?;
            tracing::info!("Migrations run successfully");
            AnyStore::Postgres(store)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, data is lost on shutdown");
            AnyStore::Memory(InMemoryTicketStore::with_categories(Category::defaults()))
        }
    };

    let notifier = AnyNotifier::from_settings(config.email.as_ref())?;
    if matches!(notifier, AnyNotifier::Log(_)) {
        tracing::info!("SMTP not configured, confirmation emails will only be logged");
    }

    let app = create_routes(AppState::new(store, notifier), &config);

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server running at http://{}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
