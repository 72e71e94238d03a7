use std::sync::Arc;

use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use cinema_server::config::Config;
use cinema_server::db;
use cinema_server::routes::create_routes;
use cinema_server::services::payment::{InvoiceClient, PaymentProvider};
use cinema_server::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    let pool = db::connect(&config.database).await?;
    tracing::info!("Successfully connected to database");

    db::MIGRATOR.run(&pool).await?;
    tracing::info!("Migrations run successfully");

    let payments: Option<Arc<dyn PaymentProvider>> = match config.payment.api_key {
        Some(_) => {
            let client = InvoiceClient::new(&config.payment)?;
            Some(Arc::new(client) as Arc<dyn PaymentProvider>)
        }
        None => {
            tracing::warn!("PAYMENT_API_KEY not set, bookings will be created without payment links");
            None
        }
    };
    if config.payment.webhook_token.is_none() {
        tracing::warn!("PAYMENT_WEBHOOK_TOKEN not set, every payment callback will be rejected");
    }

    let state = AppState::new(pool, payments, config.payment.webhook_token.clone());
    let app = create_routes(state, &config);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server running at http://{}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
