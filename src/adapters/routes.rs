use {
    crate::{
        AppState,
        adapters::api_errors::ApiError,
        domain::{
            discount::DiscountSummary,
            error::{FieldError, PromoError},
            id::ShopDomain,
            request::IssuePayload,
            webhook::{self, OrderEvent},
        },
        infra::postgres::discount_repo::{self, SyncAck},
        services::{
            issuance,
            reconcile::{self, ReconcileResult, UninstallResult},
        },
    },
    axum::{
        Json,
        body::Bytes,
        extract::{Query, State},
        http::{HeaderMap, StatusCode},
    },
    chrono::Utc,
    serde::Deserialize,
};

pub const SIGNATURE_HEADER: &str = "X-Shopify-Hmac-Sha256";
pub const SHOP_DOMAIN_HEADER: &str = "X-Shopify-Shop-Domain";

#[tracing::instrument(
    name = "issue_discount",
    skip_all,
    fields(shop = tracing::field::Empty, user = tracing::field::Empty)
)]
pub async fn issue_discount(
    State(state): State<AppState>,
    Json(payload): Json<IssuePayload>,
) -> Result<(StatusCode, Json<DiscountSummary>), ApiError> {
    tracing::Span::current()
        .record(
            "shop",
            tracing::field::display(payload.shop.as_deref().unwrap_or("")),
        )
        .record(
            "user",
            tracing::field::display(payload.user_id.as_deref().unwrap_or("")),
        );

    let record = issuance::issue_discount(&state.pool, state.publisher.as_ref(), &payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(DiscountSummary::from_record(record, Utc::now())),
    ))
}

#[derive(Deserialize)]
pub struct ListParams {
    shop: String,
}

pub async fn list_discounts(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<DiscountSummary>>, ApiError> {
    let domain = ShopDomain::new(params.shop)?;
    let records = discount_repo::list_by_shop(&state.pool, domain.as_str()).await?;
    let now = Utc::now();
    Ok(Json(
        records
            .into_iter()
            .map(|r| DiscountSummary::from_record(r, now))
            .collect(),
    ))
}

/// Redemptions an external reporting system has not pulled yet.
pub async fn list_unsynced(
    State(state): State<AppState>,
) -> Result<Json<Vec<DiscountSummary>>, ApiError> {
    let records = discount_repo::list_unsynced_redeemed(&state.pool).await?;
    let now = Utc::now();
    Ok(Json(
        records
            .into_iter()
            .map(|r| DiscountSummary::from_record(r, now))
            .collect(),
    ))
}

#[derive(Deserialize)]
pub struct SyncAckBody {
    code: String,
}

pub async fn sync_ack(
    State(state): State<AppState>,
    Json(body): Json<SyncAckBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match discount_repo::mark_synced(&state.pool, &body.code).await? {
        SyncAck::Acked(id) => Ok(Json(serde_json::json!({"status": "acked", "id": id}))),
        SyncAck::AlreadyAcked(id) => {
            Ok(Json(serde_json::json!({"status": "already_acked", "id": id})))
        }
        SyncAck::NotRedeemed(_) => Err(PromoError::Validation(vec![FieldError::new(
            "code",
            "code has no redemption to acknowledge",
        )])
        .into()),
        SyncAck::Unknown => Err(PromoError::NotFound(format!("code {}", body.code)).into()),
    }
}

#[tracing::instrument(
    name = "order_created",
    skip_all,
    fields(shop = tracing::field::Empty, order = tracing::field::Empty)
)]
pub async fn order_created(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let shop = verify(&headers, &body, &state.webhook_secrets.order_created)?;
    tracing::Span::current().record("shop", tracing::field::display(&shop));

    // The body is only trusted after the signature check. A verified body
    // that still fails to parse is dropped, not retried.
    let event: OrderEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "verified order event did not parse, dropping");
            return Ok(Json(serde_json::json!({"status": "ignored"})));
        }
    };
    tracing::Span::current().record("order", tracing::field::display(event.id));

    match reconcile::reconcile_order(&state.pool, &shop, &event).await? {
        ReconcileResult::Redeemed(_) => Ok(Json(serde_json::json!({"status": "redeemed"}))),
        ReconcileResult::AlreadyRedeemed(_) => {
            Ok(Json(serde_json::json!({"status": "duplicate"})))
        }
        ReconcileResult::UnknownCode => Ok(Json(serde_json::json!({"status": "ignored"}))),
        ReconcileResult::NoCode => Ok(Json(serde_json::json!({"status": "no_code"}))),
    }
}

#[tracing::instrument(name = "app_uninstalled", skip_all, fields(shop = tracing::field::Empty))]
pub async fn app_uninstalled(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let shop = verify(&headers, &body, &state.webhook_secrets.app_uninstalled)?;
    tracing::Span::current().record("shop", tracing::field::display(&shop));

    match reconcile::handle_app_uninstalled(&state.pool, &shop).await? {
        UninstallResult::Uninstalled {
            discounts_deactivated,
        } => Ok(Json(serde_json::json!({
            "status": "uninstalled",
            "discounts_deactivated": discounts_deactivated,
        }))),
        UninstallResult::UnknownShop => Ok(Json(serde_json::json!({"status": "ignored"}))),
    }
}

/// Signature check over the exact raw bytes, then shop attribution from the
/// platform's header. Both fail closed.
fn verify(headers: &HeaderMap, body: &[u8], secret: &str) -> Result<String, PromoError> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    webhook::verify_signature(secret, body, signature)?;

    let shop = headers
        .get(SHOP_DOMAIN_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| PromoError::Unauthorized("missing shop domain header".into()))?;
    Ok(shop.to_string())
}
