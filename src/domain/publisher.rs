use {
    super::error::PromoError,
    super::request::IssueRequest,
    super::shop::{DiscountKind, Shop},
    chrono::{DateTime, Utc},
    std::{future::Future, pin::Pin},
};

/// What the issuance pipeline hands to the platform adapter.
#[derive(Debug, Clone)]
pub struct PlatformDiscount {
    pub code: String,
    pub title: String,
    pub kind: DiscountKind,
    pub magnitude: f64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub one_time_use: bool,
    pub collection_ids: Vec<String>,
}

impl PlatformDiscount {
    pub fn new(
        request: &IssueRequest,
        code: &str,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        collection_ids: Vec<String>,
    ) -> Self {
        Self {
            code: code.to_string(),
            title: format!("Promo {code}"),
            kind: request.kind,
            magnitude: request.magnitude,
            starts_at,
            ends_at,
            one_time_use: request.one_time_use,
            collection_ids,
        }
    }
}

/// What the platform confirmed after creating the discount. The confirmed
/// code is authoritative for the ledger row.
#[derive(Debug, Clone)]
pub struct PublishedDiscount {
    pub code: String,
    pub external_id: Option<String>,
}

pub trait DiscountPublisher: Send + Sync {
    /// Turn a collection handle into the platform's node id. Unresolvable
    /// handles are the caller's problem; the adapter just reports them.
    fn resolve_collection<'a>(
        &'a self,
        shop: &'a Shop,
        handle: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, PromoError>> + Send + 'a>>;

    fn publish<'a>(
        &'a self,
        shop: &'a Shop,
        discount: &'a PlatformDiscount,
    ) -> Pin<Box<dyn Future<Output = Result<PublishedDiscount, PromoError>> + Send + 'a>>;
}
