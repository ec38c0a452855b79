use {
    crate::domain::error::PromoError,
    crate::domain::shop::{DiscountKind, Shop, ShopConfig},
    chrono::{DateTime, Utc},
    sqlx::PgPool,
};

#[derive(sqlx::FromRow)]
struct ShopRow {
    domain: String,
    access_token: Option<String>,
    installed: bool,
    installed_at: DateTime<Utc>,
    uninstalled_at: Option<DateTime<Utc>>,
}

impl From<ShopRow> for Shop {
    fn from(row: ShopRow) -> Self {
        Shop {
            domain: row.domain,
            access_token: row.access_token,
            installed: row.installed,
            installed_at: row.installed_at,
            uninstalled_at: row.uninstalled_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ConfigRow {
    shop_domain: String,
    kind: String,
    magnitude: f64,
    expiry_days: i32,
    quota: Option<i32>,
    one_time_use: bool,
    countries: Vec<String>,
    member_types: Vec<String>,
    collections: Vec<String>,
}

impl TryFrom<ConfigRow> for ShopConfig {
    type Error = PromoError;

    fn try_from(row: ConfigRow) -> Result<Self, Self::Error> {
        let kind = DiscountKind::try_from(row.kind.as_str())
            .map_err(|msg| PromoError::Database(sqlx::Error::Decode(msg.into())))?;
        Ok(ShopConfig {
            shop_domain: row.shop_domain,
            kind,
            magnitude: row.magnitude,
            expiry_days: i64::from(row.expiry_days),
            quota: row.quota.map(i64::from),
            one_time_use: row.one_time_use,
            countries: row.countries,
            member_types: row.member_types,
            collections: row.collections,
        })
    }
}

pub async fn find_shop(pool: &PgPool, domain: &str) -> Result<Option<Shop>, PromoError> {
    let row = sqlx::query_as::<_, ShopRow>(
        "SELECT domain, access_token, installed, installed_at, uninstalled_at FROM shops WHERE domain = $1",
    )
    .bind(domain)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Shop::from))
}

/// The per-shop discount configuration, if the settings collaborator wrote
/// one. Callers fall back to [`ShopConfig::defaults`] when it is absent.
pub async fn find_config(pool: &PgPool, domain: &str) -> Result<Option<ShopConfig>, PromoError> {
    let row = sqlx::query_as::<_, ConfigRow>(
        r#"
        SELECT shop_domain, kind, magnitude, expiry_days, quota,
               one_time_use, countries, member_types, collections
        FROM shop_configs
        WHERE shop_domain = $1
        "#,
    )
    .bind(domain)
    .fetch_optional(pool)
    .await?;

    row.map(ShopConfig::try_from).transpose()
}

/// Clear the platform credential and flag the shop uninstalled. Idempotent
/// under webhook redelivery; the first uninstall timestamp is preserved.
/// Returns false when the shop was never installed here.
pub async fn revoke_credential(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    domain: &str,
) -> Result<bool, PromoError> {
    let result = sqlx::query(
        r#"
        UPDATE shops
        SET access_token = NULL,
            installed = false,
            uninstalled_at = COALESCE(uninstalled_at, now())
        WHERE domain = $1
        "#,
    )
    .bind(domain)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() > 0)
}
