//! Per-product analytics record
//!
//! The ledger keeps one analytics record per product, updated on every
//! confirmed subscription. The client never derives these numbers itself;
//! it reads them and aggregates them (see the `analytics` module).
//!
//! CRITICAL: All money values are i64 (smallest settlement units)

use serde::{Deserialize, Serialize};

/// Analytics for a single product as stored on the ledger
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProductAnalytics {
    /// Product the record belongs to
    pub product_id: u64,

    /// Number of currently active subscribers
    pub active_subscribers: u64,

    /// Lifetime revenue in smallest settlement units
    pub total_revenue: i64,

    /// Number of subscribers ever, including lapsed ones
    pub total_historical_subscribers: u64,

    /// Addresses of subscribers (ledger order)
    pub subscriber_addresses: Vec<String>,

    /// Ledger timestamp of the most recent subscription
    pub last_subscription_date: u64,
}

impl ProductAnalytics {
    /// Fresh record for a just-created product
    pub fn new(product_id: u64) -> Self {
        Self {
            product_id,
            ..Default::default()
        }
    }

    /// Roll a confirmed subscription into the record
    pub(crate) fn record_subscription(&mut self, subscriber: &str, amount: i64, date: u64) {
        self.active_subscribers += 1;
        self.total_historical_subscribers += 1;
        self.total_revenue += amount;
        self.subscriber_addresses.push(subscriber.to_string());
        self.last_subscription_date = date;
    }
}
