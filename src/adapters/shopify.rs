use {
    crate::domain::{
        error::{PlatformUserError, PromoError},
        publisher::{DiscountPublisher, PlatformDiscount, PublishedDiscount},
        shop::{DiscountKind, Shop},
    },
    serde_json::json,
    std::{future::Future, pin::Pin, time::Duration},
};

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

const COLLECTION_BY_HANDLE: &str = r#"
query CollectionByHandle($handle: String!) {
  collectionByHandle(handle: $handle) { id }
}
"#;

const DISCOUNT_CREATE: &str = r#"
mutation CreateDiscount($basicCodeDiscount: DiscountCodeBasicInput!) {
  discountCodeBasicCreate(basicCodeDiscount: $basicCodeDiscount) {
    codeDiscountNode {
      id
      codeDiscount {
        ... on DiscountCodeBasic { codes(first: 1) { nodes { code } } }
      }
    }
    userErrors { field message }
  }
}
"#;

/// Discount publisher backed by the Shopify GraphQL Admin API. One client is
/// shared across shops; the per-shop credential rides on each request.
pub struct ShopifyPublisher {
    client: reqwest::Client,
    api_version: String,
}

impl ShopifyPublisher {
    /// `timeout` bounds every platform call; on expiry the caller sees
    /// `ExternalUnavailable` and no ledger write has happened.
    pub fn new(api_version: impl Into<String>, timeout: Duration) -> Result<Self, PromoError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PromoError::ExternalUnavailable(format!("http client: {e}")))?;
        Ok(Self {
            client,
            api_version: api_version.into(),
        })
    }

    fn graphql_url(&self, shop: &Shop) -> String {
        format!(
            "https://{}/admin/api/{}/graphql.json",
            shop.domain, self.api_version
        )
    }

    async fn graphql(
        &self,
        shop: &Shop,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<serde_json::Value, PromoError> {
        let token = shop.credential()?;
        let response = self
            .client
            .post(self.graphql_url(shop))
            .header(ACCESS_TOKEN_HEADER, token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| PromoError::ExternalUnavailable(format!("platform request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PromoError::ExternalUnavailable(format!(
                "platform returned {status}"
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PromoError::ExternalUnavailable(format!("platform response: {e}")))?;

        // Top-level errors mean the mutation never ran (auth, throttling,
        // malformed query). Field-level userErrors are handled per call.
        if let Some(errors) = body.get("errors").filter(|e| !e.is_null()) {
            return Err(PromoError::ExternalUnavailable(format!(
                "platform errors: {errors}"
            )));
        }
        Ok(body)
    }

    async fn resolve_collection_inner(
        &self,
        shop: &Shop,
        handle: &str,
    ) -> Result<String, PromoError> {
        let body = self
            .graphql(shop, COLLECTION_BY_HANDLE, json!({ "handle": handle }))
            .await?;
        body.pointer("/data/collectionByHandle/id")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| PromoError::NotFound(format!("collection handle {handle}")))
    }

    async fn publish_inner(
        &self,
        shop: &Shop,
        discount: &PlatformDiscount,
    ) -> Result<PublishedDiscount, PromoError> {
        let body = self
            .graphql(shop, DISCOUNT_CREATE, discount_variables(discount))
            .await?;
        let payload = body
            .pointer("/data/discountCodeBasicCreate")
            .ok_or_else(|| PromoError::ExternalUnavailable("malformed platform response".into()))?;
        extract_published(payload, &discount.code)
    }
}

impl DiscountPublisher for ShopifyPublisher {
    fn resolve_collection<'a>(
        &'a self,
        shop: &'a Shop,
        handle: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, PromoError>> + Send + 'a>> {
        Box::pin(async move { self.resolve_collection_inner(shop, handle).await })
    }

    fn publish<'a>(
        &'a self,
        shop: &'a Shop,
        discount: &'a PlatformDiscount,
    ) -> Pin<Box<dyn Future<Output = Result<PublishedDiscount, PromoError>> + Send + 'a>> {
        Box::pin(async move { self.publish_inner(shop, discount).await })
    }
}

/// Build the `discountCodeBasicCreate` variables. Percentage magnitude is
/// sent as a fraction of 1 (20% becomes 0.2), the convention of the GraphQL
/// Admin API.
fn discount_variables(discount: &PlatformDiscount) -> serde_json::Value {
    let value = match discount.kind {
        DiscountKind::Percentage => json!({ "percentage": discount.magnitude / 100.0 }),
        DiscountKind::Fixed => json!({
            "discountAmount": { "amount": discount.magnitude, "appliesOnEachItem": false }
        }),
    };
    let items = if discount.collection_ids.is_empty() {
        json!({ "all": true })
    } else {
        json!({ "collections": { "add": discount.collection_ids } })
    };

    let mut basic = json!({
        "title": discount.title,
        "code": discount.code,
        "startsAt": discount.starts_at.to_rfc3339(),
        "endsAt": discount.ends_at.to_rfc3339(),
        "customerSelection": { "all": true },
        "customerGets": { "value": value, "items": items },
    });
    if discount.one_time_use {
        basic["usageLimit"] = json!(1);
        basic["appliesOncePerCustomer"] = json!(true);
    }
    json!({ "basicCodeDiscount": basic })
}

/// Pull the confirmed code out of a `discountCodeBasicCreate` payload, or
/// the platform's field-level rejections. A missing confirmed code falls
/// back to the requested one.
fn extract_published(
    payload: &serde_json::Value,
    requested_code: &str,
) -> Result<PublishedDiscount, PromoError> {
    let user_errors = parse_user_errors(payload.get("userErrors"));
    if !user_errors.is_empty() {
        return Err(PromoError::ExternalRejected(user_errors));
    }

    let node = payload.get("codeDiscountNode");
    let confirmed = node
        .and_then(|n| n.pointer("/codeDiscount/codes/nodes/0/code"))
        .and_then(serde_json::Value::as_str)
        .unwrap_or(requested_code);
    let external_id = node
        .and_then(|n| n.get("id"))
        .and_then(serde_json::Value::as_str)
        .map(str::to_string);

    Ok(PublishedDiscount {
        code: confirmed.to_string(),
        external_id,
    })
}

// userErrors entries sometimes carry "field": null; tolerate that instead
// of dropping the message.
fn parse_user_errors(value: Option<&serde_json::Value>) -> Vec<PlatformUserError> {
    let Some(entries) = value.and_then(serde_json::Value::as_array) else {
        return Vec::new();
    };
    entries
        .iter()
        .map(|e| PlatformUserError {
            field: e
                .get("field")
                .and_then(serde_json::Value::as_array)
                .map(|parts| {
                    parts
                        .iter()
                        .filter_map(|p| p.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default(),
            message: e
                .get("message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unspecified platform error")
                .to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{id::ShopDomain, request::IssueRequest};
    use chrono::{Duration as ChronoDuration, Utc};

    fn request(kind: DiscountKind, magnitude: f64, one_time_use: bool) -> IssueRequest {
        IssueRequest {
            shop: ShopDomain::new("a.myshopify.com").unwrap(),
            user_id: "u1".into(),
            email: "u1@example.com".into(),
            display_name: "Ada Lovelace".into(),
            kind,
            magnitude,
            expiry_days: 30,
            quota: None,
            one_time_use,
            collections: Vec::new(),
            countries: Vec::new(),
            member_types: Vec::new(),
        }
    }

    fn definition(kind: DiscountKind, magnitude: f64, one_time_use: bool, collections: Vec<String>) -> PlatformDiscount {
        let now = Utc::now();
        PlatformDiscount::new(
            &request(kind, magnitude, one_time_use),
            "PROMO-AL-00FF00FF",
            now,
            now + ChronoDuration::days(30),
            collections,
        )
    }

    #[test]
    fn percentage_goes_out_as_a_fraction() {
        let vars = discount_variables(&definition(DiscountKind::Percentage, 20.0, true, vec![]));
        let basic = &vars["basicCodeDiscount"];
        assert_eq!(basic["customerGets"]["value"]["percentage"], json!(0.2));
        assert_eq!(basic["usageLimit"], json!(1));
        assert_eq!(basic["appliesOncePerCustomer"], json!(true));
        assert_eq!(basic["customerGets"]["items"], json!({ "all": true }));
    }

    #[test]
    fn fixed_amount_and_reusable_code() {
        let vars = discount_variables(&definition(DiscountKind::Fixed, 15.0, false, vec![]));
        let basic = &vars["basicCodeDiscount"];
        assert_eq!(
            basic["customerGets"]["value"]["discountAmount"]["amount"],
            json!(15.0)
        );
        assert!(basic.get("usageLimit").is_none());
    }

    #[test]
    fn collection_restrictions_are_added() {
        let vars = discount_variables(&definition(
            DiscountKind::Percentage,
            10.0,
            true,
            vec!["gid://shopify/Collection/1".into()],
        ));
        assert_eq!(
            vars["basicCodeDiscount"]["customerGets"]["items"]["collections"]["add"],
            json!(["gid://shopify/Collection/1"])
        );
    }

    #[test]
    fn user_errors_become_external_rejected() {
        let payload = json!({
            "codeDiscountNode": null,
            "userErrors": [
                { "field": ["basicCodeDiscount", "title"], "message": "Title can't be blank" },
                { "field": null, "message": "Code is invalid" }
            ]
        });
        let err = extract_published(&payload, "PROMO-AL-00FF00FF").unwrap_err();
        match err {
            PromoError::ExternalRejected(errors) => {
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[0].field, vec!["basicCodeDiscount", "title"]);
                assert!(errors[1].field.is_empty());
            }
            other => panic!("expected ExternalRejected, got {other:?}"),
        }
    }

    #[test]
    fn confirmed_code_wins_over_requested() {
        let payload = json!({
            "codeDiscountNode": {
                "id": "gid://shopify/DiscountCodeNode/42",
                "codeDiscount": { "codes": { "nodes": [ { "code": "PROMO-AL-NORMALIZED" } ] } }
            },
            "userErrors": []
        });
        let published = extract_published(&payload, "PROMO-AL-00FF00FF").unwrap();
        assert_eq!(published.code, "PROMO-AL-NORMALIZED");
        assert_eq!(
            published.external_id.as_deref(),
            Some("gid://shopify/DiscountCodeNode/42")
        );
    }

    #[test]
    fn missing_confirmed_code_falls_back_to_requested() {
        let payload = json!({ "codeDiscountNode": { "id": "gid://x/1" }, "userErrors": [] });
        let published = extract_published(&payload, "PROMO-AL-00FF00FF").unwrap();
        assert_eq!(published.code, "PROMO-AL-00FF00FF");
    }
}
