//! Ledger client contracts
//!
//! The marketplace state of record lives in an external ledger contract.
//! This module defines the three seams the rest of the client talks
//! through:
//!
//! - **`LedgerReader`**: idempotent typed queries, one method per contract
//!   read. Results land in [`ReadState`] as cached values with a loading
//!   flag and an error slot.
//! - **`LedgerWriter`**: submits a [`WriteOperation`] and returns an opaque
//!   [`SubmissionHandle`] on acceptance. Acceptance is not success; it only
//!   means the ledger took the operation.
//! - **`ConfirmationWatcher`**: polled with a handle until it yields exactly
//!   one terminal [`ConfirmationOutcome`] for it.
//!
//! [`LedgerConnector`] bundles the three so the flow engine can own a single
//! boxed connection. The deterministic in-memory implementation used by the
//! integration tests lives in [`memory`].

use crate::models::account::UserRecord;
use crate::models::analytics::ProductAnalytics;
use crate::models::product::Product;
use crate::models::subscription::UserSubscriptions;
use crate::models::transaction::WriteOperation;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod memory;

/// Names the cacheable read queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryKind {
    /// The connected user's account record
    User,

    /// The connected user's subscriptions
    UserSubscriptions,

    /// Every product listed on the marketplace
    AllProducts,

    /// Product IDs listed by the connected merchant
    MerchantProducts,

    /// Per-product analytics for the connected merchant
    MerchantAnalytics,
}

impl QueryKind {
    /// Contract-side name of the query
    pub fn name(&self) -> &'static str {
        match self {
            QueryKind::User => "getUser",
            QueryKind::UserSubscriptions => "getUserSubscriptions",
            QueryKind::AllProducts => "getAllProducts",
            QueryKind::MerchantProducts => "getMerchantProducts",
            QueryKind::MerchantAnalytics => "getMerchantAnalytics",
        }
    }
}

/// Errors a read query can surface
#[derive(Debug, Error, PartialEq)]
pub enum ReadError {
    #[error("Ledger unreachable: {0}")]
    Unreachable(String),

    #[error("Query returned malformed data: {0}")]
    Malformed(String),
}

/// Errors a write submission can surface synchronously
#[derive(Debug, Error, PartialEq)]
pub enum SubmitError {
    #[error("No signer connected")]
    NoSigner,

    #[error("Submission rejected: {0}")]
    Rejected(String),

    #[error("Ledger unreachable: {0}")]
    Unreachable(String),
}

/// Opaque receipt for an accepted write submission.
///
/// The handle identifies the in-flight operation to the confirmation
/// watcher. Nothing about its contents is interpreted by the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubmissionHandle(String);

impl SubmissionHandle {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubmissionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Terminal outcome of a watched submission.
///
/// Each handle resolves to exactly one of these. `TimedOut` means the watch
/// was abandoned without learning the outcome; the operation may still land
/// on the ledger later.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmationOutcome {
    /// The operation executed and its state changes are visible
    Confirmed,

    /// The operation failed on the ledger
    Failed {
        /// Diagnostic reason when the watcher has one. Carried into the
        /// event log only; user-facing reporting stays generic.
        reason: Option<String>,
    },

    /// The watch gave up before a terminal outcome arrived
    TimedOut,
}

/// Cached result of one read query.
///
/// `value` keeps the last successful result. A failed refresh records the
/// error but leaves the stale value in place, so the host can keep
/// rendering the old data alongside the error.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedQuery<T> {
    value: Option<T>,
    is_loading: bool,
    error: Option<String>,
}

impl<T> Default for CachedQuery<T> {
    fn default() -> Self {
        Self {
            value: None,
            is_loading: false,
            error: None,
        }
    }
}

impl<T> CachedQuery<T> {
    /// Empty slot: never fetched, not loading, no error
    pub fn empty() -> Self {
        Self::default()
    }

    /// Last successful result, if any
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Whether a refresh is in progress
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Error from the most recent refresh, if it failed
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub(crate) fn begin(&mut self) {
        self.is_loading = true;
    }

    pub(crate) fn complete(&mut self, value: T) {
        self.value = Some(value);
        self.is_loading = false;
        self.error = None;
    }

    pub(crate) fn fail(&mut self, error: String) {
        self.is_loading = false;
        self.error = Some(error);
    }
}

/// Cached read state, one slot per query.
///
/// The user slot is doubly optional: the outer `Option` is "has this query
/// ever completed", the inner one is "does an account record exist". The
/// distinction drives the at-most-once auto-registration hook.
#[derive(Debug, Clone, Default)]
pub struct ReadState {
    user: CachedQuery<Option<UserRecord>>,
    subscriptions: CachedQuery<UserSubscriptions>,
    all_products: CachedQuery<Vec<Product>>,
    merchant_products: CachedQuery<Vec<u64>>,
    merchant_analytics: CachedQuery<Vec<ProductAnalytics>>,
}

impl ReadState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The connected user's account record query
    pub fn user(&self) -> &CachedQuery<Option<UserRecord>> {
        &self.user
    }

    /// The connected user's subscriptions query
    pub fn subscriptions(&self) -> &CachedQuery<UserSubscriptions> {
        &self.subscriptions
    }

    /// The all-products query
    pub fn all_products(&self) -> &CachedQuery<Vec<Product>> {
        &self.all_products
    }

    /// The merchant's product ID query
    pub fn merchant_products(&self) -> &CachedQuery<Vec<u64>> {
        &self.merchant_products
    }

    /// The merchant's analytics query
    pub fn merchant_analytics(&self) -> &CachedQuery<Vec<ProductAnalytics>> {
        &self.merchant_analytics
    }

    pub(crate) fn user_mut(&mut self) -> &mut CachedQuery<Option<UserRecord>> {
        &mut self.user
    }

    pub(crate) fn subscriptions_mut(&mut self) -> &mut CachedQuery<UserSubscriptions> {
        &mut self.subscriptions
    }

    pub(crate) fn all_products_mut(&mut self) -> &mut CachedQuery<Vec<Product>> {
        &mut self.all_products
    }

    pub(crate) fn merchant_products_mut(&mut self) -> &mut CachedQuery<Vec<u64>> {
        &mut self.merchant_products
    }

    pub(crate) fn merchant_analytics_mut(&mut self) -> &mut CachedQuery<Vec<ProductAnalytics>> {
        &mut self.merchant_analytics
    }
}

/// Typed read interface over the ledger contract.
///
/// Every method is idempotent: reads never change ledger state, and a
/// failed read can always be retried.
pub trait LedgerReader {
    /// Fetch the account record for an address. `Ok(None)` means the
    /// address has never registered.
    fn get_user(&self, address: &str) -> Result<Option<UserRecord>, ReadError>;

    /// Fetch a user's subscription state
    fn get_user_subscriptions(&self, address: &str) -> Result<UserSubscriptions, ReadError>;

    /// Fetch every product listed on the marketplace
    fn get_all_products(&self) -> Result<Vec<Product>, ReadError>;

    /// Fetch the product IDs listed by a merchant
    fn get_merchant_products(&self, merchant: &str) -> Result<Vec<u64>, ReadError>;

    /// Fetch per-product analytics for a merchant's listings
    fn get_merchant_analytics(&self, merchant: &str) -> Result<Vec<ProductAnalytics>, ReadError>;

    /// Convert a USD amount (smallest units) into settlement-token units
    /// at the ledger's current rate
    fn convert_usd_to_usdc(&self, amount: i64) -> Result<i64, ReadError>;
}

/// Write interface over the ledger contract.
///
/// `submit` hands an operation to the connected signer. Success means the
/// ledger accepted the submission and returned a handle to watch, nothing
/// more; the operation itself resolves later through the watcher.
pub trait LedgerWriter {
    fn submit(&mut self, operation: &WriteOperation) -> Result<SubmissionHandle, SubmitError>;
}

/// Confirmation watch interface.
///
/// `poll` returns `None` while the submission is still pending. Once it
/// returns a terminal [`ConfirmationOutcome`] for a handle, that handle is
/// spent: later polls return `None`.
pub trait ConfirmationWatcher {
    fn poll(&mut self, handle: &SubmissionHandle) -> Option<ConfirmationOutcome>;
}

/// A full ledger connection: reads, writes, and confirmation watching.
pub trait LedgerConnector: LedgerReader + LedgerWriter + ConfirmationWatcher {}

impl<T: LedgerReader + LedgerWriter + ConfirmationWatcher> LedgerConnector for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_kind_names() {
        assert_eq!(QueryKind::User.name(), "getUser");
        assert_eq!(QueryKind::UserSubscriptions.name(), "getUserSubscriptions");
        assert_eq!(QueryKind::AllProducts.name(), "getAllProducts");
        assert_eq!(QueryKind::MerchantProducts.name(), "getMerchantProducts");
        assert_eq!(QueryKind::MerchantAnalytics.name(), "getMerchantAnalytics");
    }

    #[test]
    fn test_cached_query_lifecycle() {
        let mut query: CachedQuery<Vec<u64>> = CachedQuery::empty();
        assert_eq!(query.value(), None);
        assert!(!query.is_loading());
        assert_eq!(query.error(), None);

        query.begin();
        assert!(query.is_loading());

        query.complete(vec![1, 2]);
        assert!(!query.is_loading());
        assert_eq!(query.value(), Some(&vec![1, 2]));
        assert_eq!(query.error(), None);
    }

    #[test]
    fn test_cached_query_failure_keeps_stale_value() {
        let mut query: CachedQuery<Vec<u64>> = CachedQuery::empty();
        query.complete(vec![7]);

        query.begin();
        query.fail("ledger unreachable".to_string());

        assert_eq!(query.value(), Some(&vec![7]));
        assert_eq!(query.error(), Some("ledger unreachable"));
        assert!(!query.is_loading());
    }

    #[test]
    fn test_completing_after_failure_clears_error() {
        let mut query: CachedQuery<u64> = CachedQuery::empty();
        query.fail("boom".to_string());
        query.complete(42);

        assert_eq!(query.value(), Some(&42));
        assert_eq!(query.error(), None);
    }

    #[test]
    fn test_submission_handle_display() {
        let handle = SubmissionHandle::new("0xabc123");
        assert_eq!(handle.as_str(), "0xabc123");
        assert_eq!(handle.to_string(), "0xabc123");
    }
}
