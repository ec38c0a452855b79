use derive_more::Display;
use serde::{Deserialize, Serialize};

use super::error::{FieldError, PromoError};

/// Merchant tenant identifier: the shop's stable platform domain
/// (`my-store.myshopify.com`). Everything in the ledger hangs off it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShopDomain(String);

impl ShopDomain {
    pub fn new(domain: impl Into<String>) -> Result<Self, PromoError> {
        let domain = domain.into();
        let trimmed = domain.trim();
        if trimmed.is_empty() || trimmed.contains(char::is_whitespace) || !trimmed.contains('.') {
            return Err(PromoError::Validation(vec![FieldError::new(
                "shop",
                format!("not a shop domain: {domain:?}"),
            )]));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_platform_domains() {
        let d = ShopDomain::new("my-store.myshopify.com").unwrap();
        assert_eq!(d.as_str(), "my-store.myshopify.com");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let d = ShopDomain::new("  my-store.myshopify.com ").unwrap();
        assert_eq!(d.as_str(), "my-store.myshopify.com");
    }

    #[test]
    fn rejects_empty_and_malformed() {
        assert!(ShopDomain::new("").is_err());
        assert!(ShopDomain::new("   ").is_err());
        assert!(ShopDomain::new("no-dot").is_err());
        assert!(ShopDomain::new("two words.com").is_err());
    }
}
