use {
    super::error::{FieldError, PromoError},
    super::id::ShopDomain,
    super::shop::{DiscountKind, ShopConfig},
    serde::Deserialize,
};

/// Raw issuance body as it arrives on the wire. Numeric and list fields stay
/// loosely typed (`serde_json::Value`) so one bad field produces a field
/// error instead of failing the whole deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IssuePayload {
    pub shop: Option<String>,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub magnitude: Option<serde_json::Value>,
    pub expiry_days: Option<serde_json::Value>,
    pub quota: Option<serde_json::Value>,
    pub one_time_use: Option<serde_json::Value>,
    pub collections: Option<serde_json::Value>,
    pub countries: Option<serde_json::Value>,
    pub member_types: Option<serde_json::Value>,
}

/// Fully normalized issuance request: every optional field resolved against
/// the shop configuration, every bound checked. The only way to get one is
/// [`normalize`], so downstream code never re-validates.
#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub shop: ShopDomain,
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    pub kind: DiscountKind,
    pub magnitude: f64,
    pub expiry_days: i64,
    pub quota: Option<i64>,
    pub one_time_use: bool,
    pub collections: Vec<String>,
    pub countries: Vec<String>,
    pub member_types: Vec<String>,
}

pub const MIN_EXPIRY_DAYS: i64 = 1;
pub const MAX_EXPIRY_DAYS: i64 = 365;

/// Validate and normalize a raw payload against the shop configuration.
///
/// Collects every violated field so a rejected request lists all of its
/// problems, not just the first. Absent optional fields fall back to the
/// configuration, then to hard defaults. List fields coerce to empty when
/// they are not arrays; that is never an error.
pub fn normalize(payload: &IssuePayload, config: &ShopConfig) -> Result<IssueRequest, PromoError> {
    let mut errors = Vec::new();

    let shop = match trimmed(&payload.shop) {
        None => {
            errors.push(FieldError::new("shop", "shop identifier is required"));
            None
        }
        Some(raw) => match ShopDomain::new(raw) {
            Ok(domain) => Some(domain),
            Err(PromoError::Validation(mut fields)) => {
                errors.append(&mut fields);
                None
            }
            Err(_) => {
                errors.push(FieldError::new("shop", "invalid shop domain"));
                None
            }
        },
    };

    let user_id = trimmed(&payload.user_id).map(str::to_string);
    if user_id.is_none() {
        errors.push(FieldError::new("user_id", "user identifier is required"));
    }

    let email = trimmed(&payload.email).map(str::to_string);
    if email.is_none() {
        errors.push(FieldError::new("email", "contact address is required"));
    }

    let kind = config.kind;

    let magnitude = match &payload.magnitude {
        None | Some(serde_json::Value::Null) => Some(config.magnitude),
        Some(value) => match value.as_f64() {
            Some(m) => Some(m),
            None => {
                errors.push(FieldError::new("magnitude", "must be a number"));
                None
            }
        },
    };
    if let Some(m) = magnitude
        && let Some(msg) = magnitude_violation(kind, m)
    {
        errors.push(FieldError::new("magnitude", msg));
    }

    let expiry_days = match &payload.expiry_days {
        None | Some(serde_json::Value::Null) => Some(config.expiry_days),
        Some(value) => match value.as_i64() {
            Some(d) => Some(d),
            None => {
                errors.push(FieldError::new("expiry_days", "must be an integer"));
                None
            }
        },
    };
    if let Some(d) = expiry_days
        && !(MIN_EXPIRY_DAYS..=MAX_EXPIRY_DAYS).contains(&d)
    {
        errors.push(FieldError::new(
            "expiry_days",
            format!("must be between {MIN_EXPIRY_DAYS} and {MAX_EXPIRY_DAYS} days"),
        ));
    }

    let quota = match &payload.quota {
        None | Some(serde_json::Value::Null) => config.quota,
        Some(value) => match value.as_i64() {
            Some(q) if q >= 1 => Some(q),
            _ => {
                errors.push(FieldError::new("quota", "must be an integer of at least 1"));
                config.quota
            }
        },
    };

    let one_time_use = payload
        .one_time_use
        .as_ref()
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(config.one_time_use);

    // The request's countries/member types describe the requesting user and
    // default to empty; collections are a restriction with a config default.
    let countries = string_list(&payload.countries).unwrap_or_default();
    let member_types = string_list(&payload.member_types).unwrap_or_default();
    let collections =
        string_list(&payload.collections).unwrap_or_else(|| config.collections.clone());

    if !errors.is_empty() {
        return Err(PromoError::Validation(errors));
    }

    // All required pieces are present once the error list is empty.
    let (Some(shop), Some(user_id), Some(email), Some(magnitude), Some(expiry_days)) =
        (shop, user_id, email, magnitude, expiry_days)
    else {
        return Err(PromoError::Validation(vec![FieldError::new(
            "payload",
            "incomplete request",
        )]));
    };

    Ok(IssueRequest {
        shop,
        user_id,
        email,
        display_name: trimmed(&payload.display_name).unwrap_or_default().to_string(),
        kind,
        magnitude,
        expiry_days,
        quota,
        one_time_use,
        collections,
        countries,
        member_types,
    })
}

fn trimmed(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn magnitude_violation(kind: DiscountKind, magnitude: f64) -> Option<&'static str> {
    if !magnitude.is_finite() || magnitude <= 0.0 {
        return Some("must be greater than zero");
    }
    if kind == DiscountKind::Percentage && magnitude > 100.0 {
        return Some("percentage cannot exceed 100");
    }
    None
}

/// `None` means the field was absent and the caller picks the fallback.
/// Non-array values coerce to an empty list rather than erroring.
fn string_list(value: &Option<serde_json::Value>) -> Option<Vec<String>> {
    match value {
        None => None,
        Some(serde_json::Value::Array(items)) => Some(
            items
                .iter()
                .filter_map(serde_json::Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        Some(_) => Some(Vec::new()),
    }
}
