pub mod adapters;
pub mod domain;
pub mod infra;
pub mod services;

use {
    crate::domain::publisher::DiscountPublisher,
    axum::{
        Router,
        extract::DefaultBodyLimit,
        routing::{get, post},
    },
    std::{sync::Arc, time::Duration},
    tower_http::timeout::TimeoutLayer,
};

/// Per-topic webhook secrets. The platform signs each topic's deliveries
/// with its own shared secret.
#[derive(Clone)]
pub struct WebhookSecrets {
    pub order_created: Arc<str>,
    pub app_uninstalled: Arc<str>,
}

#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub publisher: Arc<dyn DiscountPublisher>,
    pub webhook_secrets: WebhookSecrets,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "ok" }))
        .route(
            "/discounts",
            post(adapters::routes::issue_discount).get(adapters::routes::list_discounts),
        )
        .route("/discounts/unsynced", get(adapters::routes::list_unsynced))
        .route("/discounts/sync-ack", post(adapters::routes::sync_ack))
        .route(
            "/webhooks/order-created",
            post(adapters::routes::order_created),
        )
        .route(
            "/webhooks/app-uninstalled",
            post(adapters::routes::app_uninstalled),
        )
        // 256 KB: order webhooks carry line items and run bigger than
        // issuance bodies.
        .layer(DefaultBodyLimit::max(256 * 1024))
        .layer(TimeoutLayer::new(Duration::from_secs(15)))
        .with_state(state)
}
