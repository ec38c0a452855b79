use {
    crate::domain::code::generate_code,
    crate::domain::discount::{DiscountRecord, NewDiscount},
    crate::domain::eligibility::check_eligibility,
    crate::domain::error::{FieldError, PromoError},
    crate::domain::id::ShopDomain,
    crate::domain::publisher::{DiscountPublisher, PlatformDiscount, PublishedDiscount},
    crate::domain::request::{IssuePayload, normalize},
    crate::domain::shop::{Shop, ShopConfig},
    crate::infra::postgres::{discount_repo, shop_repo},
    chrono::Utc,
    sqlx::PgPool,
};

/// Run the full issuance path: validate, gate, generate, publish, persist.
///
/// The ledger write happens only after the platform accepted the discount,
/// so a publish failure leaves no orphaned row. A code collision at insert
/// regenerates and republishes exactly once.
pub async fn issue_discount(
    pool: &PgPool,
    publisher: &dyn DiscountPublisher,
    payload: &IssuePayload,
) -> Result<DiscountRecord, PromoError> {
    // 1. Resolve the shop so validation can apply its configuration. A
    //    missing or malformed shop field falls through to normalize(),
    //    which reports every violated field at once.
    let (shop, config) = load_shop_context(pool, payload).await?;
    let request = normalize(payload, &config)?;
    let Some(shop) = shop else {
        return Err(PromoError::Validation(vec![FieldError::new(
            "shop",
            "shop identifier is required",
        )]));
    };
    // Uninstalled shops have no credential; stop before any platform call.
    shop.credential()?;

    // 2. Gate on the current ledger. This read is advisory; the partial
    //    unique index settles concurrent duplicates at insert time.
    let snapshot = discount_repo::ledger_snapshot(pool, &shop.domain, &request.user_id).await?;
    check_eligibility(&request, &config, snapshot)?;

    // 3. Translate collection handles into platform ids. An unresolvable
    //    handle is logged and skipped, never fatal.
    let collection_ids = resolve_collections(publisher, &shop, &request.collections).await;

    // 4. Generate, publish, persist.
    let mut attempt = 0;
    loop {
        attempt += 1;
        let now = Utc::now();
        let mut draft = NewDiscount::from_request(&request, generate_code(&request.display_name), now);
        let definition = PlatformDiscount::new(
            &request,
            &draft.code,
            draft.created_at,
            draft.expires_at,
            collection_ids.clone(),
        );
        let PublishedDiscount { code, external_id } = publisher.publish(&shop, &definition).await?;
        // The ledger stores the code the platform confirmed, which may
        // differ from the one we asked for.
        draft.code = code;

        match discount_repo::insert_discount(pool, &draft).await {
            Ok(()) => {
                tracing::info!(
                    shop = %draft.shop_domain,
                    user = %draft.user_id,
                    code = %draft.code,
                    external_id = external_id.as_deref().unwrap_or(""),
                    "discount issued"
                );
                return Ok(draft.into_record());
            }
            Err(PromoError::ConflictCode) if attempt == 1 => {
                tracing::warn!(code = %draft.code, "code already in ledger, regenerating once");
            }
            Err(e) => return Err(e),
        }
    }
}

/// Look up the shop row and its configuration. `None` for the shop means the
/// payload had no usable shop field; normalize() will turn that into the
/// full validation error list. A well-formed but unknown domain is NotFound.
async fn load_shop_context(
    pool: &PgPool,
    payload: &IssuePayload,
) -> Result<(Option<Shop>, ShopConfig), PromoError> {
    let domain = payload
        .shop
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ShopDomain::new)
        .and_then(Result::ok);

    let Some(domain) = domain else {
        return Ok((None, ShopConfig::defaults("")));
    };

    let shop = shop_repo::find_shop(pool, domain.as_str())
        .await?
        .ok_or_else(|| PromoError::NotFound(format!("unknown shop {domain}")))?;
    let config = match shop_repo::find_config(pool, domain.as_str()).await? {
        Some(config) => config,
        None => ShopConfig::defaults(domain.as_str()),
    };
    Ok((Some(shop), config))
}

async fn resolve_collections(
    publisher: &dyn DiscountPublisher,
    shop: &Shop,
    handles: &[String],
) -> Vec<String> {
    let mut ids = Vec::with_capacity(handles.len());
    for handle in handles {
        match publisher.resolve_collection(shop, handle).await {
            Ok(id) => ids.push(id),
            Err(e) => {
                tracing::warn!(
                    shop = %shop.domain,
                    handle = %handle,
                    error = %e,
                    "collection handle not resolved, skipping"
                );
            }
        }
    }
    ids
}
