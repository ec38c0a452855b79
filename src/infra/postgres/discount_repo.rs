use {
    crate::domain::discount::{DiscountRecord, NewDiscount},
    crate::domain::eligibility::LedgerSnapshot,
    crate::domain::error::PromoError,
    crate::domain::shop::DiscountKind,
    chrono::{DateTime, Utc},
    sqlx::PgPool,
    uuid::Uuid,
};

#[derive(sqlx::FromRow)]
struct DiscountRow {
    id: Uuid,
    shop_domain: String,
    user_id: String,
    email: String,
    code: String,
    kind: String,
    magnitude: f64,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    synced: bool,
    redeemed_at: Option<DateTime<Utc>>,
    order_id: Option<String>,
    order_amount: Option<i64>,
    active: bool,
}

impl TryFrom<DiscountRow> for DiscountRecord {
    type Error = PromoError;

    fn try_from(row: DiscountRow) -> Result<Self, Self::Error> {
        let kind = DiscountKind::try_from(row.kind.as_str())
            .map_err(|msg| PromoError::Database(sqlx::Error::Decode(msg.into())))?;
        Ok(DiscountRecord {
            id: row.id,
            shop_domain: row.shop_domain,
            user_id: row.user_id,
            email: row.email,
            code: row.code,
            kind,
            magnitude: row.magnitude,
            created_at: row.created_at,
            expires_at: row.expires_at,
            synced: row.synced,
            redeemed_at: row.redeemed_at,
            order_id: row.order_id,
            order_amount: row.order_amount,
            active: row.active,
        })
    }
}

/// One read feeding the eligibility gates: does this user already hold an
/// active code, and how many codes has the shop issued in total.
pub async fn ledger_snapshot(
    pool: &PgPool,
    shop_domain: &str,
    user_id: &str,
) -> Result<LedgerSnapshot, PromoError> {
    let (has_active, issued_count) = sqlx::query_as::<_, (bool, i64)>(
        r#"
        SELECT
            EXISTS (
                SELECT 1 FROM discounts
                WHERE shop_domain = $1 AND user_id = $2 AND active
            ),
            (SELECT count(*) FROM discounts WHERE shop_domain = $1)
        "#,
    )
    .bind(shop_domain)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(LedgerSnapshot {
        has_active,
        issued_count,
    })
}

/// Insert a freshly issued discount. The unique indexes are the authority on
/// duplicates: `discounts_code_key` turns into `ConflictCode` (caller
/// regenerates once), `discounts_one_active_per_user` into `Conflict` (the
/// concurrent request for the same user won).
pub async fn insert_discount(pool: &PgPool, discount: &NewDiscount) -> Result<(), PromoError> {
    sqlx::query(
        r#"
        INSERT INTO discounts
            (id, shop_domain, user_id, email, code, kind, magnitude, created_at, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(discount.id)
    .bind(&discount.shop_domain)
    .bind(&discount.user_id)
    .bind(&discount.email)
    .bind(&discount.code)
    .bind(discount.kind.as_str())
    .bind(discount.magnitude)
    .bind(discount.created_at)
    .bind(discount.expires_at)
    .execute(pool)
    .await
    .map_err(map_unique_violation)?;

    Ok(())
}

fn map_unique_violation(e: sqlx::Error) -> PromoError {
    let constraint = match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            db.constraint().map(str::to_string)
        }
        _ => return PromoError::Database(e),
    };
    match constraint.as_deref() {
        Some("discounts_code_key") => PromoError::ConflictCode,
        Some("discounts_one_active_per_user") => PromoError::Conflict,
        _ => PromoError::Database(e),
    }
}

pub async fn find_by_code(pool: &PgPool, code: &str) -> Result<Option<DiscountRecord>, PromoError> {
    let row = sqlx::query_as::<_, DiscountRow>(
        r#"
        SELECT id, shop_domain, user_id, email, code, kind, magnitude,
               created_at, expires_at, synced, redeemed_at, order_id, order_amount, active
        FROM discounts
        WHERE code = $1
        "#,
    )
    .bind(code)
    .fetch_optional(pool)
    .await?;

    row.map(DiscountRecord::try_from).transpose()
}

pub async fn list_by_shop(
    pool: &PgPool,
    shop_domain: &str,
) -> Result<Vec<DiscountRecord>, PromoError> {
    let rows = sqlx::query_as::<_, DiscountRow>(
        r#"
        SELECT id, shop_domain, user_id, email, code, kind, magnitude,
               created_at, expires_at, synced, redeemed_at, order_id, order_amount, active
        FROM discounts
        WHERE shop_domain = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(shop_domain)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(DiscountRecord::try_from).collect()
}

/// Redeemed rows an external reporting system has not acknowledged yet.
pub async fn list_unsynced_redeemed(pool: &PgPool) -> Result<Vec<DiscountRecord>, PromoError> {
    let rows = sqlx::query_as::<_, DiscountRow>(
        r#"
        SELECT id, shop_domain, user_id, email, code, kind, magnitude,
               created_at, expires_at, synced, redeemed_at, order_id, order_amount, active
        FROM discounts
        WHERE redeemed_at IS NOT NULL AND NOT synced
        ORDER BY redeemed_at
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(DiscountRecord::try_from).collect()
}

#[derive(Debug)]
pub enum RedemptionOutcome {
    /// Redemption fields written by this call.
    Applied(Uuid),
    /// Row already carried a redemption. Webhook redelivery.
    AlreadyRedeemed(Uuid),
    /// No active ledger row for this (shop, code).
    Unknown,
}

/// Idempotent redemption write. Only the first call for a code sets the
/// fields; later deliveries observe the earlier write and change nothing.
/// The shop filter keeps one shop's webhook from redeeming another's code,
/// and only an active row is redeemable, so a code deactivated by uninstall
/// housekeeping reads as unknown.
pub async fn record_redemption(
    pool: &PgPool,
    shop_domain: &str,
    code: &str,
    order_id: &str,
    order_amount: Option<i64>,
    redeemed_at: DateTime<Utc>,
) -> Result<RedemptionOutcome, PromoError> {
    let updated = sqlx::query_scalar::<_, Uuid>(
        r#"
        UPDATE discounts
        SET redeemed_at = $3, order_id = $4, order_amount = $5, active = false
        WHERE shop_domain = $1 AND code = $2 AND active AND redeemed_at IS NULL
        RETURNING id
        "#,
    )
    .bind(shop_domain)
    .bind(code)
    .bind(redeemed_at)
    .bind(order_id)
    .bind(order_amount)
    .fetch_optional(pool)
    .await?;

    if let Some(id) = updated {
        return Ok(RedemptionOutcome::Applied(id));
    }

    // Distinguish a redelivery (row redeemed earlier) from a row the guard
    // excluded. A deactivated, never-redeemed row is not redeemable.
    let existing = sqlx::query_as::<_, (Uuid, Option<DateTime<Utc>>)>(
        "SELECT id, redeemed_at FROM discounts WHERE shop_domain = $1 AND code = $2",
    )
    .bind(shop_domain)
    .bind(code)
    .fetch_optional(pool)
    .await?;

    Ok(match existing {
        Some((id, Some(_))) => RedemptionOutcome::AlreadyRedeemed(id),
        Some((_, None)) | None => RedemptionOutcome::Unknown,
    })
}

#[derive(Debug)]
pub enum SyncAck {
    /// Sync flag set by this call.
    Acked(Uuid),
    /// Flag was already set. Ack redelivery.
    AlreadyAcked(Uuid),
    /// Code exists but carries no redemption to acknowledge.
    NotRedeemed(Uuid),
    /// No ledger row for this code.
    Unknown,
}

/// Acknowledge that a redemption was exported downstream. Locks the row so
/// the read and the flag write are one atomic step.
pub async fn mark_synced(pool: &PgPool, code: &str) -> Result<SyncAck, PromoError> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, (Uuid, bool, Option<DateTime<Utc>>)>(
        "SELECT id, synced, redeemed_at FROM discounts WHERE code = $1 FOR UPDATE",
    )
    .bind(code)
    .fetch_optional(&mut *tx)
    .await?;

    let ack = match row {
        None => SyncAck::Unknown,
        Some((id, _, None)) => SyncAck::NotRedeemed(id),
        Some((id, true, Some(_))) => SyncAck::AlreadyAcked(id),
        Some((id, false, Some(_))) => {
            sqlx::query("UPDATE discounts SET synced = true WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            SyncAck::Acked(id)
        }
    };

    tx.commit().await?;
    Ok(ack)
}

/// Soft-deactivate every live discount a shop still has. Runs inside the
/// uninstall transaction.
pub async fn deactivate_shop_discounts(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    shop_domain: &str,
) -> Result<u64, PromoError> {
    let result = sqlx::query("UPDATE discounts SET active = false WHERE shop_domain = $1 AND active")
        .bind(shop_domain)
        .execute(&mut **tx)
        .await?;

    Ok(result.rows_affected())
}
