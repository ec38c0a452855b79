use {
    super::error::PromoError,
    super::request::IssueRequest,
    super::shop::ShopConfig,
};

/// What the ledger currently says before issuance: whether the (shop, user)
/// pair already holds an active discount, and how many discounts the shop has
/// issued in total. Read in a single query; the partial unique index remains
/// the authority on duplicates, this snapshot only produces the friendly
/// early rejection.
#[derive(Debug, Clone, Copy, Default)]
pub struct LedgerSnapshot {
    pub has_active: bool,
    pub issued_count: i64,
}

/// Run the eligibility gates in order: country, member type, duplicate,
/// quota. The first failed gate decides the error; later gates are not
/// consulted.
pub fn check_eligibility(
    request: &IssueRequest,
    config: &ShopConfig,
    snapshot: LedgerSnapshot,
) -> Result<(), PromoError> {
    if !config.countries.is_empty() && !intersects(&request.countries, &config.countries) {
        return Err(PromoError::NotEligible(
            "user country is not covered by this promotion".into(),
        ));
    }

    if !config.member_types.is_empty() && !intersects(&request.member_types, &config.member_types)
    {
        return Err(PromoError::NotEligible(
            "user membership tier is not covered by this promotion".into(),
        ));
    }

    if snapshot.has_active {
        return Err(PromoError::Conflict);
    }

    let quota = request.quota.or(config.quota);
    if let Some(quota) = quota
        && snapshot.issued_count >= quota
    {
        return Err(PromoError::QuotaExceeded);
    }

    Ok(())
}

fn intersects(user: &[String], allowed: &[String]) -> bool {
    user.iter()
        .any(|u| allowed.iter().any(|a| a.eq_ignore_ascii_case(u)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{id::ShopDomain, shop::DiscountKind};

    fn request() -> IssueRequest {
        IssueRequest {
            shop: ShopDomain::new("a.myshopify.com").unwrap(),
            user_id: "u1".into(),
            email: "u1@example.com".into(),
            display_name: String::new(),
            kind: DiscountKind::Percentage,
            magnitude: 10.0,
            expiry_days: 30,
            quota: None,
            one_time_use: true,
            collections: Vec::new(),
            countries: Vec::new(),
            member_types: Vec::new(),
        }
    }

    fn config() -> ShopConfig {
        ShopConfig::defaults("a.myshopify.com")
    }

    #[test]
    fn unrestricted_config_accepts_anyone() {
        assert!(check_eligibility(&request(), &config(), LedgerSnapshot::default()).is_ok());
    }

    #[test]
    fn country_gate_rejects_without_overlap() {
        let mut cfg = config();
        cfg.countries = vec!["DE".into(), "AT".into()];

        let mut req = request();
        req.countries = vec!["FR".into()];
        assert!(matches!(
            check_eligibility(&req, &cfg, LedgerSnapshot::default()),
            Err(PromoError::NotEligible(_))
        ));

        req.countries = vec!["de".into()];
        assert!(check_eligibility(&req, &cfg, LedgerSnapshot::default()).is_ok());
    }

    #[test]
    fn restricted_config_rejects_user_with_no_attributes() {
        let mut cfg = config();
        cfg.member_types = vec!["gold".into()];
        assert!(matches!(
            check_eligibility(&request(), &cfg, LedgerSnapshot::default()),
            Err(PromoError::NotEligible(_))
        ));
    }

    #[test]
    fn duplicate_gate_fires_before_quota() {
        let mut cfg = config();
        cfg.quota = Some(1);
        let snapshot = LedgerSnapshot {
            has_active: true,
            issued_count: 5,
        };
        assert!(matches!(
            check_eligibility(&request(), &cfg, snapshot),
            Err(PromoError::Conflict)
        ));
    }

    #[test]
    fn quota_counts_inactive_codes_too() {
        let mut cfg = config();
        cfg.quota = Some(3);
        let snapshot = LedgerSnapshot {
            has_active: false,
            issued_count: 3,
        };
        assert!(matches!(
            check_eligibility(&request(), &cfg, snapshot),
            Err(PromoError::QuotaExceeded)
        ));
    }

    #[test]
    fn request_quota_overrides_config_quota() {
        let mut cfg = config();
        cfg.quota = Some(10);
        let mut req = request();
        req.quota = Some(2);
        let snapshot = LedgerSnapshot {
            has_active: false,
            issued_count: 2,
        };
        assert!(matches!(
            check_eligibility(&req, &cfg, snapshot),
            Err(PromoError::QuotaExceeded)
        ));
    }

    #[test]
    fn no_quota_means_unlimited() {
        let snapshot = LedgerSnapshot {
            has_active: false,
            issued_count: 10_000,
        };
        assert!(check_eligibility(&request(), &config(), snapshot).is_ok());
    }
}
