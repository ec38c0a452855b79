mod common;

use chrono::Utc;
use common::*;
use promo_ledger::domain::error::PromoError;
use promo_ledger::domain::webhook::{DiscountCodeUse, OrderEvent};
use promo_ledger::infra::postgres::discount_repo;
use promo_ledger::services::issuance::issue_discount;
use promo_ledger::services::reconcile::{self, ReconcileResult};

// ── 38. concurrent_issuance_single_winner ──────────────────────────────────
// Eight simultaneous requests for the same (shop, user). The advisory gate
// cannot see in-flight peers; the partial unique index settles it. Exactly
// one insert wins, every other request reports a duplicate.

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_issuance_single_winner() {
    let pool = setup_pool("promo_ledger_test_concurrency").await;
    let shop = "t38-race.myshopify.com";
    seed_shop(&pool, shop).await;
    let publisher = FakePublisher::ok();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pool = pool.clone();
        let publisher = publisher.clone();
        let payload = make_payload(shop, "alice");
        handles.push(tokio::spawn(async move {
            issue_discount(&pool, publisher.as_ref(), &payload).await
        }));
    }

    let mut issued = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.expect("task should not panic") {
            Ok(_) => issued += 1,
            Err(PromoError::Conflict) => conflicts += 1,
            Err(other) => panic!("unexpected outcome: {other:?}"),
        }
    }

    assert_eq!(issued, 1, "exactly one request may win");
    assert_eq!(conflicts, 7);
    assert_eq!(count_discounts(&pool, shop).await, 1);
}

// ── 39. concurrent_redelivery_single_redemption ────────────────────────────
// The platform redelivers the same order event while the first delivery is
// still in flight. The conditional update applies once; every other
// delivery observes the existing redemption.

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_redelivery_single_redemption() {
    let pool = setup_pool("promo_ledger_test_concurrency").await;
    let shop = "t39-storm.myshopify.com";
    seed_shop(&pool, shop).await;
    discount_repo::insert_discount(&pool, &make_discount(shop, "bob", "PROMO-BB-39000001"))
        .await
        .expect("insert should succeed");

    let event = OrderEvent {
        id: 390001,
        total_price: Some("19.99".into()),
        created_at: Some(Utc::now()),
        discount_codes: vec![DiscountCodeUse {
            code: "PROMO-BB-39000001".into(),
        }],
    };

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pool = pool.clone();
        let event = event.clone();
        let shop = shop.to_string();
        handles.push(tokio::spawn(async move {
            reconcile::reconcile_order(&pool, &shop, &event).await
        }));
    }

    let mut applied = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.expect("task should not panic") {
            Ok(ReconcileResult::Redeemed(_)) => applied += 1,
            Ok(ReconcileResult::AlreadyRedeemed(_)) => duplicates += 1,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    assert_eq!(applied, 1, "redemption must be recorded exactly once");
    assert_eq!(duplicates, 7);

    let row = get_discount(&pool, "PROMO-BB-39000001")
        .await
        .expect("row should exist");
    assert_eq!(row.order_id.as_deref(), Some("390001"));
    assert_eq!(row.order_amount, Some(1999));
}

// ── 40. concurrent_distinct_users_all_succeed ──────────────────────────────
// The single-winner rule is per (shop, user); unrelated users racing each
// other must all get codes.

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_distinct_users_all_succeed() {
    let pool = setup_pool("promo_ledger_test_concurrency").await;
    let shop = "t40-crowd.myshopify.com";
    seed_shop(&pool, shop).await;
    let publisher = FakePublisher::ok();

    let users = ["carol", "dave", "erin", "frank", "grace", "heidi"];
    let mut handles = Vec::new();
    for user in users {
        let pool = pool.clone();
        let publisher = publisher.clone();
        let payload = make_payload(shop, user);
        handles.push(tokio::spawn(async move {
            issue_discount(&pool, publisher.as_ref(), &payload).await
        }));
    }

    for handle in handles {
        handle
            .await
            .expect("task should not panic")
            .expect("every distinct user should get a code");
    }

    assert_eq!(count_discounts(&pool, shop).await, users.len() as i64);
    assert_eq!(publisher.publish_count(), users.len());
}
