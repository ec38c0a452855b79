use {
    super::error::PromoError,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// What a discount takes off: a percentage of the order or a fixed amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    Percentage,
    Fixed,
}

impl DiscountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Percentage => "percentage",
            Self::Fixed => "fixed",
        }
    }
}

impl fmt::Display for DiscountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for DiscountKind {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "percentage" => Ok(Self::Percentage),
            "fixed" => Ok(Self::Fixed),
            other => Err(format!("unknown discount kind: {other}")),
        }
    }
}

/// Merchant tenant record. Owned by the installation collaborator; the core
/// reads it for the platform credential and clears that credential on the
/// `app-uninstalled` webhook.
#[derive(Debug, Clone)]
pub struct Shop {
    pub domain: String,
    pub access_token: Option<String>,
    pub installed: bool,
    pub installed_at: DateTime<Utc>,
    pub uninstalled_at: Option<DateTime<Utc>>,
}

impl Shop {
    /// The credential needed to talk to the platform on this shop's behalf.
    pub fn credential(&self) -> Result<&str, PromoError> {
        if !self.installed {
            return Err(PromoError::NotFound(format!(
                "shop {} is not installed",
                self.domain
            )));
        }
        self.access_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                PromoError::NotFound(format!("shop {} has no platform credential", self.domain))
            })
    }
}

/// Per-shop issuance defaults and restrictions. Mutated by the external
/// settings subsystem; read-only here. Absent rows fall back to `defaults`.
#[derive(Debug, Clone)]
pub struct ShopConfig {
    pub shop_domain: String,
    pub kind: DiscountKind,
    pub magnitude: f64,
    pub expiry_days: i64,
    pub quota: Option<i64>,
    pub one_time_use: bool,
    /// Country allow-list; empty means no restriction.
    pub countries: Vec<String>,
    /// Member-category allow-list; empty means no restriction.
    pub member_types: Vec<String>,
    /// Product-collection handles the discount is limited to.
    pub collections: Vec<String>,
}

impl ShopConfig {
    pub const DEFAULT_MAGNITUDE: f64 = 10.0;
    pub const DEFAULT_EXPIRY_DAYS: i64 = 30;

    pub fn defaults(shop_domain: impl Into<String>) -> Self {
        Self {
            shop_domain: shop_domain.into(),
            kind: DiscountKind::Percentage,
            magnitude: Self::DEFAULT_MAGNITUDE,
            expiry_days: Self::DEFAULT_EXPIRY_DAYS,
            quota: None,
            one_time_use: true,
            countries: Vec::new(),
            member_types: Vec::new(),
            collections: Vec::new(),
        }
    }
}
