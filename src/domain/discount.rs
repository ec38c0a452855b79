use {
    super::request::IssueRequest,
    super::shop::DiscountKind,
    chrono::{DateTime, Duration, Utc},
    serde::Serialize,
    std::fmt,
    uuid::Uuid,
};

/// Lifecycle state of a ledger entry. `Redeemed` and `Expired` are both
/// terminal; `Expired` is derived at read time from the clock, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountState {
    Issued,
    Redeemed,
    Expired,
}

impl DiscountState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issued => "issued",
            Self::Redeemed => "redeemed",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for DiscountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One issued discount as persisted in the ledger.
#[derive(Debug, Clone, Serialize)]
pub struct DiscountRecord {
    pub id: Uuid,
    pub shop_domain: String,
    pub user_id: String,
    pub email: String,
    pub code: String,
    pub kind: DiscountKind,
    pub magnitude: f64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub synced: bool,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub order_id: Option<String>,
    pub order_amount: Option<i64>,
    pub active: bool,
}

impl DiscountRecord {
    /// Redemption wins over expiry: a code redeemed just before its window
    /// closed stays `Redeemed` forever.
    pub fn state(&self, now: DateTime<Utc>) -> DiscountState {
        if self.redeemed_at.is_some() {
            DiscountState::Redeemed
        } else if now > self.expires_at {
            DiscountState::Expired
        } else {
            DiscountState::Issued
        }
    }
}

/// Insert payload for the ledger. The id is generated here, not in Postgres,
/// via `Uuid::now_v7()`.
#[derive(Debug, Clone)]
pub struct NewDiscount {
    pub id: Uuid,
    pub shop_domain: String,
    pub user_id: String,
    pub email: String,
    pub code: String,
    pub kind: DiscountKind,
    pub magnitude: f64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl NewDiscount {
    /// `code` is the platform-confirmed code, which may differ from the one
    /// this service asked for.
    pub fn from_request(req: &IssueRequest, code: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            shop_domain: req.shop.as_str().to_string(),
            user_id: req.user_id.clone(),
            email: req.email.clone(),
            code,
            kind: req.kind,
            magnitude: req.magnitude,
            created_at: now,
            expires_at: now + Duration::days(req.expiry_days),
        }
    }

    pub fn into_record(self) -> DiscountRecord {
        DiscountRecord {
            id: self.id,
            shop_domain: self.shop_domain,
            user_id: self.user_id,
            email: self.email,
            code: self.code,
            kind: self.kind,
            magnitude: self.magnitude,
            created_at: self.created_at,
            expires_at: self.expires_at,
            synced: false,
            redeemed_at: None,
            order_id: None,
            order_amount: None,
            active: true,
        }
    }
}

/// Response shape for issuance and reporting endpoints: the record plus its
/// derived state at the time of the read.
#[derive(Debug, Clone, Serialize)]
pub struct DiscountSummary {
    #[serde(flatten)]
    pub record: DiscountRecord,
    pub state: DiscountState,
}

impl DiscountSummary {
    pub fn from_record(record: DiscountRecord, now: DateTime<Utc>) -> Self {
        let state = record.state(now);
        Self { record, state }
    }
}
