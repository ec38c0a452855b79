use {
    crate::domain::error::PromoError,
    crate::domain::webhook::OrderEvent,
    crate::infra::postgres::discount_repo::{self, RedemptionOutcome},
    crate::infra::postgres::shop_repo,
    chrono::Utc,
    sqlx::PgPool,
    uuid::Uuid,
};

#[derive(Debug)]
pub enum ReconcileResult {
    /// Order used no discount code. Nothing to do.
    NoCode,
    /// Code is not in our ledger, foreign or mistyped. Nothing to do.
    UnknownCode,
    /// First delivery: redemption recorded.
    Redeemed(Uuid),
    /// Redelivery: redemption was already recorded.
    AlreadyRedeemed(Uuid),
}

/// Apply a verified order-created event to the ledger.
///
/// Only the first applied code counts. The write is idempotent under
/// webhook redelivery; the second delivery for the same order is a no-op.
pub async fn reconcile_order(
    pool: &PgPool,
    shop_domain: &str,
    event: &OrderEvent,
) -> Result<ReconcileResult, PromoError> {
    let Some(applied) = event.discount_codes.first() else {
        return Ok(ReconcileResult::NoCode);
    };

    let redeemed_at = event.created_at.unwrap_or_else(Utc::now);
    let order_id = event.id.to_string();
    let outcome = discount_repo::record_redemption(
        pool,
        shop_domain,
        &applied.code,
        &order_id,
        event.price_cents(),
        redeemed_at,
    )
    .await?;

    Ok(match outcome {
        RedemptionOutcome::Applied(id) => {
            tracing::info!(
                shop = %shop_domain,
                code = %applied.code,
                order = %order_id,
                "redemption recorded"
            );
            ReconcileResult::Redeemed(id)
        }
        RedemptionOutcome::AlreadyRedeemed(id) => {
            tracing::debug!(
                shop = %shop_domain,
                code = %applied.code,
                order = %order_id,
                "redemption already recorded"
            );
            ReconcileResult::AlreadyRedeemed(id)
        }
        RedemptionOutcome::Unknown => ReconcileResult::UnknownCode,
    })
}

#[derive(Debug)]
pub enum UninstallResult {
    /// Shop was never installed here.
    UnknownShop,
    /// Credential cleared; count of discounts deactivated by this delivery.
    Uninstalled { discounts_deactivated: u64 },
}

/// Revoke the shop's credential and deactivate its remaining discounts in
/// one transaction. Redelivery finds nothing left to deactivate.
pub async fn handle_app_uninstalled(
    pool: &PgPool,
    shop_domain: &str,
) -> Result<UninstallResult, PromoError> {
    let mut tx = pool.begin().await?;

    let known = shop_repo::revoke_credential(&mut tx, shop_domain).await?;
    if !known {
        tx.commit().await?;
        return Ok(UninstallResult::UnknownShop);
    }

    let discounts_deactivated =
        discount_repo::deactivate_shop_discounts(&mut tx, shop_domain).await?;
    tx.commit().await?;

    tracing::info!(
        shop = %shop_domain,
        deactivated = discounts_deactivated,
        "shop uninstalled, credential revoked"
    );
    Ok(UninstallResult::Uninstalled {
        discounts_deactivated,
    })
}
