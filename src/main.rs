use {
    promo_ledger::adapters::shopify::ShopifyPublisher,
    sqlx::postgres::PgPoolOptions,
    std::{env, sync::Arc, time::Duration},
    tokio::signal,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    dotenvy::dotenv().ok();
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let order_secret = env::var("WEBHOOK_SECRET_ORDER_CREATED")
        .expect("WEBHOOK_SECRET_ORDER_CREATED must be set");
    let uninstall_secret = env::var("WEBHOOK_SECRET_APP_UNINSTALLED")
        .expect("WEBHOOK_SECRET_APP_UNINSTALLED must be set");
    let api_version = env::var("SHOPIFY_API_VERSION").unwrap_or_else(|_| "2025-07".into());

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&database_url)
        .await
        .expect("failed to connect to database");

    let publisher = ShopifyPublisher::new(api_version, Duration::from_secs(10))
        .expect("failed to build platform client");

    let state = promo_ledger::AppState {
        pool,
        publisher: Arc::new(publisher),
        webhook_secrets: promo_ledger::WebhookSecrets {
            order_created: order_secret.into(),
            app_uninstalled: uninstall_secret.into(),
        },
    };

    let app = promo_ledger::app(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
    tracing::info!("listening on 0.0.0.0:3000");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
