use {
    super::error::PromoError,
    base64::{Engine, engine::general_purpose::STANDARD as BASE64},
    hmac::{Hmac, Mac},
    serde::Deserialize,
    sha2::Sha256,
    subtle::ConstantTimeEq,
};

type HmacSha256 = Hmac<Sha256>;

/// Compute the base64 HMAC-SHA256 signature the platform would attach to
/// `body`. The inverse of [`verify_signature`]; also handy for local tooling.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        // HMAC accepts keys of any length.
        Err(_) => return String::new(),
    };
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}

/// Check a webhook signature against the exact raw body bytes.
///
/// Fails closed: a missing, undecodable, or mismatched signature is always
/// `Unauthorized`. The comparison is constant-time.
pub fn verify_signature(
    secret: &str,
    body: &[u8],
    signature: Option<&str>,
) -> Result<(), PromoError> {
    let signature =
        signature.ok_or_else(|| PromoError::Unauthorized("missing signature header".into()))?;
    let claimed = BASE64
        .decode(signature.trim())
        .map_err(|_| PromoError::Unauthorized("signature is not valid base64".into()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| PromoError::Unauthorized("signature check failed".into()))?;
    mac.update(body);
    let expected = mac.finalize().into_bytes();

    if expected.ct_eq(&claimed).into() {
        Ok(())
    } else {
        Err(PromoError::Unauthorized("signature mismatch".into()))
    }
}

/// Order-created event body, reduced to the fields reconciliation reads.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderEvent {
    pub id: i64,
    #[serde(default)]
    pub total_price: Option<String>,
    #[serde(default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub discount_codes: Vec<DiscountCodeUse>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscountCodeUse {
    pub code: String,
}

impl OrderEvent {
    pub fn price_cents(&self) -> Option<i64> {
        self.total_price.as_deref().and_then(parse_price_cents)
    }
}

/// Parse a decimal money string (`"42.50"`) into cents. Fractions beyond two
/// digits are truncated; anything non-numeric, or a value outside the i64
/// cent range, is `None`.
pub fn parse_price_cents(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let (units, frac) = raw.split_once('.').unwrap_or((raw, ""));
    let negative = units.starts_with('-');
    let units: i64 = units.parse().ok()?;
    let cents = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().ok()? * 10,
        _ => frac.get(..2)?.parse::<i64>().ok()?,
    };
    let base = units.checked_mul(100)?;
    if negative {
        base.checked_sub(cents)
    } else {
        base.checked_add(cents)
    }
}
