//! Integration tests for the create-product flow
//!
//! Listing a product starts from a form draft: a name, a decimal price
//! string, and a duration in days. The draft is parsed locally into exact
//! contract units before anything is submitted; whether the sender is
//! allowed to list is the ledger's decision at confirmation time.

use substream_core_rs::ledger::memory::MemoryLedger;
use substream_core_rs::{
    DraftError, EngineConfig, FlowEngine, FlowError, FlowEvent, FlowKind, FlowProgress, FlowStep,
    Notice, ProductDraft, QueryKind, Role, WriteOperation,
};

fn merchant_config(address: &str) -> EngineConfig {
    EngineConfig {
        address: Some(address.to_string()),
        dashboard_role: Role::Merchant,
        marketplace_address: "0xmarketplace".to_string(),
    }
}

/// Helper for a connected ledger with a registered merchant
fn merchant_ledger() -> MemoryLedger {
    let mut ledger = MemoryLedger::new();
    ledger.connect("0xmerchant");
    ledger.register_account("0xmerchant", Role::Merchant);
    ledger
}

/// Helper for the draft a merchant would type into the listing form
fn news_draft() -> ProductDraft {
    ProductDraft {
        name: "Premium News".to_string(),
        price: "19.99".to_string(),
        duration: "30".to_string(),
    }
}

#[test]
fn test_draft_parses_to_exact_contract_units() {
    let mut ledger = merchant_ledger();
    ledger.hold_confirmations();
    let mut engine = FlowEngine::new(merchant_config("0xmerchant"), Box::new(ledger)).unwrap();

    let progress = engine.begin_create_product(&news_draft()).unwrap();
    assert!(matches!(
        progress,
        FlowProgress::Submitted {
            step: FlowStep::CreateProduct,
            ..
        }
    ));

    // "19.99" and "30" became units and days before submission
    let pending = engine.pending_transaction().unwrap();
    assert_eq!(
        pending.operation(),
        &WriteOperation::CreateProduct {
            name: "Premium News".to_string(),
            price: 19_990_000,
            duration_days: 30,
        }
    );
}

#[test]
fn test_create_product_happy_path() {
    let ledger = merchant_ledger();
    let mut engine = FlowEngine::new(merchant_config("0xmerchant"), Box::new(ledger)).unwrap();

    engine.begin_create_product(&news_draft()).unwrap();
    let progress = engine.poll_confirmations().unwrap();
    match progress {
        FlowProgress::Completed { flow, refreshed } => {
            assert_eq!(flow, FlowKind::CreateProduct);
            assert_eq!(
                refreshed,
                vec![QueryKind::MerchantProducts, QueryKind::MerchantAnalytics]
            );
        }
        other => panic!("expected completion, got {:?}", other),
    }

    assert!(engine.is_idle());
    assert_eq!(engine.drain_notices(), vec![Notice::ProductCreated]);

    // The merchant caches were refreshed with the new listing
    let product_ids = engine.reads().merchant_products().value().unwrap();
    assert_eq!(product_ids.len(), 1);
    let analytics = engine.reads().merchant_analytics().value().unwrap();
    assert_eq!(analytics.len(), 1);
    assert_eq!(analytics[0].active_subscribers, 0);

    // The listing is visible on the public product list
    engine.refresh(QueryKind::AllProducts);
    let products = engine.reads().all_products().value().unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].name(), "Premium News");
    assert_eq!(products[0].price(), 19_990_000);
    assert_eq!(products[0].duration_days(), 30);
    assert_eq!(products[0].merchant(), "0xmerchant");
    assert!(products[0].active());
    assert_eq!(products[0].formatted_price(), "19.99 USDC");
}

#[test]
fn test_unusable_drafts_never_reach_the_ledger() {
    let ledger = merchant_ledger();
    let mut engine = FlowEngine::new(merchant_config("0xmerchant"), Box::new(ledger)).unwrap();

    let blank_name = ProductDraft {
        name: "   ".to_string(),
        ..news_draft()
    };
    assert_eq!(
        engine.begin_create_product(&blank_name),
        Err(FlowError::InvalidDraft(DraftError::EmptyName))
    );

    let free = ProductDraft {
        price: "0".to_string(),
        ..news_draft()
    };
    assert_eq!(
        engine.begin_create_product(&free),
        Err(FlowError::InvalidDraft(DraftError::ZeroPrice))
    );

    let garbled_price = ProductDraft {
        price: "19,99".to_string(),
        ..news_draft()
    };
    assert!(matches!(
        engine.begin_create_product(&garbled_price),
        Err(FlowError::InvalidDraft(DraftError::InvalidPrice(_)))
    ));

    let zero_days = ProductDraft {
        duration: "0".to_string(),
        ..news_draft()
    };
    assert_eq!(
        engine.begin_create_product(&zero_days),
        Err(FlowError::InvalidDraft(DraftError::ZeroDuration))
    );

    let garbled_days = ProductDraft {
        duration: "a month".to_string(),
        ..news_draft()
    };
    assert!(matches!(
        engine.begin_create_product(&garbled_days),
        Err(FlowError::InvalidDraft(DraftError::InvalidDuration { .. }))
    ));

    // None of the rejected drafts touched the ledger or the flow state
    assert!(engine.event_log().is_empty());
    assert!(engine.is_idle());
    assert!(engine.notices().is_empty());
}

#[test]
fn test_price_strings_floor_to_six_decimals() {
    let draft = ProductDraft {
        price: "9.9999999".to_string(),
        ..news_draft()
    };
    let parsed = draft.parse().unwrap();
    assert_eq!(parsed.price, 9_999_999);
    assert_eq!(parsed.duration_days, 30);
    assert_eq!(parsed.name, "Premium News");
}

#[test]
fn test_buyer_cannot_list_products() {
    // The client submits in good faith; the marketplace rejects the sender
    let mut ledger = MemoryLedger::new();
    ledger.connect("0xbuyer");
    ledger.register_account("0xbuyer", Role::Buyer);
    let mut engine = FlowEngine::new(merchant_config("0xbuyer"), Box::new(ledger)).unwrap();

    engine.begin_create_product(&news_draft()).unwrap();
    let progress = engine.poll_confirmations().unwrap();
    assert_eq!(
        progress,
        FlowProgress::Failed {
            flow: FlowKind::CreateProduct,
            step: FlowStep::CreateProduct,
        }
    );

    assert_eq!(
        engine.drain_notices(),
        vec![Notice::ActionFailed {
            action: "createProduct"
        }]
    );
    assert!(engine.event_log().events().iter().any(|e| matches!(
        e,
        FlowEvent::ConfirmationFailed {
            reason: Some(reason),
            ..
        } if reason == "sender is not a merchant"
    )));

    // Nothing was listed
    engine.refresh(QueryKind::AllProducts);
    assert!(engine.reads().all_products().value().unwrap().is_empty());
}

#[test]
fn test_analytics_read_failure_does_not_abort_the_listing() {
    let mut ledger = merchant_ledger();
    ledger.set_read_error(QueryKind::MerchantAnalytics, "indexer down");
    let mut engine = FlowEngine::new(merchant_config("0xmerchant"), Box::new(ledger)).unwrap();

    engine.begin_create_product(&news_draft()).unwrap();
    let progress = engine.poll_confirmations().unwrap();
    assert!(matches!(progress, FlowProgress::Completed { .. }));

    // The flow succeeded and the product cache refreshed
    assert_eq!(engine.drain_notices(), vec![Notice::ProductCreated]);
    assert_eq!(engine.reads().merchant_products().value().unwrap().len(), 1);

    // The analytics query recorded its failure without anything to show
    assert!(engine.reads().merchant_analytics().value().is_none());
    assert_eq!(
        engine.reads().merchant_analytics().error(),
        Some("Ledger unreachable: indexer down")
    );
    assert_eq!(engine.event_log().events_of_type("ReadFailed").len(), 1);
}
