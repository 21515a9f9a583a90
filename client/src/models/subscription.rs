//! Subscription model
//!
//! Mirrors the per-user subscription data the ledger returns as a pair:
//! the list of currently active product IDs alongside the full subscription
//! records. `UserSubscriptions` keeps that shape so the read cache stores
//! exactly what one query returned.

use serde::{Deserialize, Serialize};

/// A single subscription record as stored on the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    /// Product this subscription is for
    product_id: u64,

    /// Ledger timestamp when the subscription started
    start_date: u64,

    /// Ledger timestamp when the subscription lapses
    end_date: u64,

    /// Whether the subscription is currently active
    active: bool,

    /// Ledger timestamp of the most recent payment
    last_payment_date: u64,

    /// Amount of the most recent payment in smallest settlement units
    last_payment_amount: i64,
}

impl Subscription {
    pub fn new(
        product_id: u64,
        start_date: u64,
        end_date: u64,
        last_payment_amount: i64,
    ) -> Self {
        Self {
            product_id,
            start_date,
            end_date,
            active: true,
            last_payment_date: start_date,
            last_payment_amount,
        }
    }

    /// Get the subscribed product ID
    pub fn product_id(&self) -> u64 {
        self.product_id
    }

    /// Get the ledger timestamp the subscription started
    pub fn start_date(&self) -> u64 {
        self.start_date
    }

    /// Get the ledger timestamp the subscription lapses
    pub fn end_date(&self) -> u64 {
        self.end_date
    }

    /// Check whether the subscription is active
    pub fn active(&self) -> bool {
        self.active
    }

    /// Get the ledger timestamp of the most recent payment
    pub fn last_payment_date(&self) -> u64 {
        self.last_payment_date
    }

    /// Get the most recent payment amount in smallest settlement units
    pub fn last_payment_amount(&self) -> i64 {
        self.last_payment_amount
    }
}

/// One user's subscription state: active product IDs plus full records,
/// the exact pair returned by the subscriptions read query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserSubscriptions {
    /// Product IDs with a currently active subscription
    active_product_ids: Vec<u64>,

    /// All subscription records held by the user
    subscriptions: Vec<Subscription>,
}

impl UserSubscriptions {
    pub fn new(active_product_ids: Vec<u64>, subscriptions: Vec<Subscription>) -> Self {
        Self {
            active_product_ids,
            subscriptions,
        }
    }

    /// Empty state for a user with no subscriptions
    pub fn empty() -> Self {
        Self::default()
    }

    /// Get the active product IDs
    pub fn active_product_ids(&self) -> &[u64] {
        &self.active_product_ids
    }

    /// Get all subscription records
    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    /// Check whether the user holds an active subscription to a product
    ///
    /// # Example
    /// ```
    /// use substream_core_rs::models::subscription::UserSubscriptions;
    ///
    /// let subs = UserSubscriptions::new(vec![3, 7], vec![]);
    /// assert!(subs.is_subscribed(7));
    /// assert!(!subs.is_subscribed(4));
    /// ```
    pub fn is_subscribed(&self, product_id: u64) -> bool {
        self.active_product_ids.contains(&product_id)
    }
}
