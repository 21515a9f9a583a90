//! Integration tests for merchant analytics aggregation
//!
//! Subscriptions recorded on the ledger feed per-product analytics rows;
//! the analytics module folds those rows into dashboard figures. These
//! tests run real subscriptions through the write path and check the
//! aggregation end to end, plus the pure helpers on constructed rows.

use substream_core_rs::analytics::{
    any_growing, chart_series, growth_classification, merchant_summary, total_active_subscribers,
    total_revenue, GrowthTrend,
};
use substream_core_rs::ledger::memory::MemoryLedger;
use substream_core_rs::{
    from_smallest_unit, ConfirmationOutcome, ConfirmationWatcher, LedgerReader, LedgerWriter,
    ProductAnalytics, Role, WriteOperation,
};

/// Helper to run approve + subscribe for one buyer against the ledger
fn subscribe(ledger: &mut MemoryLedger, buyer: &str, product_id: u64, price: i64) {
    ledger.connect(buyer);

    let approval = ledger
        .submit(&WriteOperation::Approve {
            spender: ledger.marketplace_address().to_string(),
            amount: price,
        })
        .unwrap();
    assert_eq!(ledger.poll(&approval), Some(ConfirmationOutcome::Confirmed));

    let subscription = ledger
        .submit(&WriteOperation::Subscribe { product_id })
        .unwrap();
    assert_eq!(
        ledger.poll(&subscription),
        Some(ConfirmationOutcome::Confirmed)
    );
}

/// Helper to build an analytics row without going through the ledger
fn record(product_id: u64, active_subscribers: u64, revenue: i64) -> ProductAnalytics {
    ProductAnalytics {
        product_id,
        active_subscribers,
        total_revenue: revenue,
        total_historical_subscribers: active_subscribers,
        ..ProductAnalytics::default()
    }
}

#[test]
fn test_ledger_subscriptions_roll_up_into_merchant_figures() {
    let mut ledger = MemoryLedger::new();
    ledger.register_account("0xalice", Role::Buyer);
    ledger.register_account("0xbob", Role::Buyer);
    ledger.register_account("0xmerchant", Role::Merchant);

    let news = ledger.add_product("0xmerchant", "News", 19_990_000, 30); // 19.99 USDC
    let music = ledger.add_product("0xmerchant", "Music", 5_000_000, 30); // 5 USDC

    // Two subscribers on News, one on Music
    subscribe(&mut ledger, "0xalice", news, 19_990_000);
    subscribe(&mut ledger, "0xbob", news, 19_990_000);
    subscribe(&mut ledger, "0xalice", music, 5_000_000);

    let rows = ledger.get_merchant_analytics("0xmerchant").unwrap();
    assert_eq!(rows.len(), 2);

    // Per-product rows carry what the ledger recorded
    let news_row = rows.iter().find(|r| r.product_id == news).unwrap();
    assert_eq!(news_row.active_subscribers, 2);
    assert_eq!(news_row.total_revenue, 39_980_000);
    assert_eq!(news_row.subscriber_addresses.len(), 2);

    // The fold across products
    assert_eq!(total_revenue(&rows), 44_980_000);
    assert_eq!(total_active_subscribers(&rows), 3);
    assert!(any_growing(&rows));

    let summary = merchant_summary(&rows);
    assert_eq!(summary.total_revenue, 44_980_000);
    assert_eq!(summary.active_subscribers, 3);
    assert_eq!(summary.products, 2);
    assert!(summary.any_growing);
}

#[test]
fn test_merchant_with_no_subscribers_reads_as_declining() {
    let mut ledger = MemoryLedger::new();
    ledger.register_account("0xmerchant", Role::Merchant);
    ledger.add_product("0xmerchant", "News", 19_990_000, 30);

    let rows = ledger.get_merchant_analytics("0xmerchant").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].active_subscribers, 0);
    assert_eq!(rows[0].total_revenue, 0);

    assert_eq!(growth_classification(&rows[0]), GrowthTrend::Declining);
    assert!(!any_growing(&rows));

    let summary = merchant_summary(&rows);
    assert_eq!(summary.total_revenue, 0);
    assert_eq!(summary.active_subscribers, 0);
    assert!(!summary.any_growing);
}

#[test]
fn test_analytics_only_cover_the_queried_merchant() {
    let mut ledger = MemoryLedger::new();
    ledger.register_account("0xalice", Role::Buyer);
    ledger.register_account("0xmerchant", Role::Merchant);
    ledger.register_account("0xrival", Role::Merchant);

    let mine = ledger.add_product("0xmerchant", "News", 10_000_000, 30);
    ledger.add_product("0xrival", "Video", 30_000_000, 30);

    subscribe(&mut ledger, "0xalice", mine, 10_000_000);

    let rows = ledger.get_merchant_analytics("0xmerchant").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].product_id, mine);
    assert_eq!(total_revenue(&rows), 10_000_000);
}

#[test]
fn test_totals_sum_across_rows() {
    let rows = vec![
        record(1, 4, 80_000_000),
        record(2, 0, 0),
        record(3, 1, 19_990_000),
    ];

    assert_eq!(total_revenue(&rows), 99_990_000);
    assert_eq!(total_active_subscribers(&rows), 5);
    assert_eq!(total_revenue(&[]), 0);
    assert_eq!(total_active_subscribers(&[]), 0);
}

#[test]
fn test_growth_follows_active_subscriber_count() {
    assert_eq!(
        growth_classification(&record(1, 3, 60_000_000)),
        GrowthTrend::Growing
    );
    assert_eq!(
        growth_classification(&record(2, 0, 60_000_000)),
        GrowthTrend::Declining
    );
    assert!(GrowthTrend::Growing.is_growing());
    assert_eq!(GrowthTrend::Declining.label(), "Declining");
}

#[test]
fn test_chart_series_keeps_row_order_and_display_units() {
    let rows = vec![
        record(7, 2, 39_980_000),
        record(3, 1, 5_000_000),
        record(9, 0, 0),
    ];

    let points = chart_series(&rows);
    assert_eq!(points.len(), 3);

    // Labels follow the ledger row order, not sorted IDs
    assert_eq!(points[0].label, "Product 7");
    assert_eq!(points[1].label, "Product 3");
    assert_eq!(points[2].label, "Product 9");

    // Revenue is converted to display units
    assert_eq!(points[0].revenue, from_smallest_unit(39_980_000));
    assert_eq!(points[1].revenue, 5.0);
    assert_eq!(points[2].revenue, 0.0);
}
