use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{web, App, HttpServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mockpay_gateway::config::GatewayConfig;
use mockpay_gateway::cors::build_cors;
use mockpay_gateway::routes;
use mockpay_gateway::state::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(
                "Invalid configuration: {e}. \
                 Set PAYMENT_WEBHOOK_SECRET to a secure random value (e.g. `openssl rand -hex 32`)."
            );
            std::process::exit(1);
        }
    };
    tracing::debug!(?config, "configuration loaded");

    let state = match AppState::from_config(&config) {
        Ok(state) => web::Data::new(state),
        Err(e) => {
            tracing::error!("Failed to build webhook HTTP client: {e}");
            std::process::exit(1);
        }
    };

    let port = config.port;
    let cors_origins = config.allowed_origins.clone();

    tracing::info!("mockpay gateway listening on port {port}");
    tracing::info!(
        "Webhook policy: {} attempts, base delay {:?}, timeout {:?}",
        config.retry.total_attempts(),
        config.retry.retry_delay,
        config.retry.timeout
    );
    tracing::info!("Settlement delay: {:?}", config.settlement_delay);
    tracing::info!("Rate limit: {} req/min per IP", config.rate_limit_rpm);
    tracing::info!("  POST http://localhost:{port}/api/v2/payments");
    tracing::info!("  POST http://localhost:{port}/api/v2/confirm-payment");

    let governor_conf = match GovernorConfigBuilder::default()
        .requests_per_minute(config.rate_limit_rpm)
        .finish()
    {
        Some(conf) => conf,
        None => {
            tracing::error!("Invalid rate limiter configuration (RATE_LIMIT_RPM={})", config.rate_limit_rpm);
            std::process::exit(1);
        }
    };

    HttpServer::new(move || {
        App::new()
            .wrap(build_cors(&cors_origins))
            .wrap(Governor::new(&governor_conf))
            .app_data(state.clone())
            .configure(routes::configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
