//! Deterministic in-memory ledger
//!
//! MemoryLedger implements all three ledger contracts against plain maps,
//! mirroring the marketplace contract rules: registration is once per
//! address, subscribing consumes settlement-token allowance, and only
//! merchants can list products.
//!
//! Behavior is scriptable for tests, and all scripting happens before the
//! ledger is handed to the engine:
//! - `fail_next_submission` rejects the next submit call
//! - `script_outcome` queues terminal outcomes consumed in FIFO order
//! - `hold_confirmations` leaves submissions pending until scripted or
//!   timed out
//! - `with_confirmation_timeout` bounds how many unanswered polls a
//!   submission survives
//!
//! # Example
//!
//! ```rust
//! use substream_core_rs::ledger::memory::MemoryLedger;
//! use substream_core_rs::ledger::{ConfirmationOutcome, ConfirmationWatcher, LedgerReader, LedgerWriter};
//! use substream_core_rs::models::{Role, WriteOperation};
//!
//! let mut ledger = MemoryLedger::new();
//! ledger.connect("0xbuyer");
//!
//! let handle = ledger
//!     .submit(&WriteOperation::RegisterUser { role: Role::Buyer })
//!     .unwrap();
//! assert_eq!(ledger.poll(&handle), Some(ConfirmationOutcome::Confirmed));
//! assert!(ledger.get_user("0xbuyer").unwrap().is_some());
//! ```

use crate::ledger::{
    ConfirmationOutcome, ConfirmationWatcher, LedgerReader, LedgerWriter, QueryKind, ReadError,
    SubmissionHandle, SubmitError,
};
use crate::models::account::{Role, UserRecord};
use crate::models::analytics::ProductAnalytics;
use crate::models::product::Product;
use crate::models::subscription::{Subscription, UserSubscriptions};
use crate::models::transaction::WriteOperation;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, VecDeque};

const SECONDS_PER_DAY: u64 = 86_400;

/// A submission the watcher has not yet resolved
#[derive(Debug, Clone)]
struct PendingEntry {
    sender: String,
    operation: WriteOperation,
    polls: u32,
}

/// In-memory ledger with marketplace contract semantics
#[derive(Debug, Clone)]
pub struct MemoryLedger {
    /// Connected signer, if any
    connected: Option<String>,

    /// Registered accounts by address
    users: HashMap<String, UserRecord>,

    /// Listed products by ID (ordered, so reads are deterministic)
    products: BTreeMap<u64, Product>,

    /// Purchased subscriptions by subscriber address
    subscriptions: HashMap<String, Vec<Subscription>>,

    /// Per-product analytics
    analytics: HashMap<u64, ProductAnalytics>,

    /// Settlement-token allowances keyed by (owner, spender)
    allowances: HashMap<(String, String), i64>,

    /// Address of the marketplace contract (the spender for approvals)
    marketplace_address: String,

    /// USD-to-settlement-unit conversion as a ratio
    conversion_num: i64,
    conversion_den: i64,

    /// Scripted read failures by query
    read_errors: HashMap<QueryKind, String>,

    /// Logical timestamp, advanced once per applied operation
    clock: u64,

    /// Next product ID to assign
    next_product_id: u64,

    /// Unresolved submissions keyed by handle
    pending: HashMap<String, PendingEntry>,

    /// Scripted terminal outcomes, consumed FIFO before any other resolution
    scripted_outcomes: VecDeque<ConfirmationOutcome>,

    /// When true, unscripted polls confirm immediately
    auto_resolve: bool,

    /// Unanswered polls a submission survives before reporting TimedOut
    confirmation_timeout: Option<u32>,

    /// Message to reject the next submission with
    fail_next_submission: Option<String>,

    /// Submission counter folded into handle derivation
    nonce: u64,
}

impl MemoryLedger {
    /// Create an empty ledger with default settings
    pub fn new() -> Self {
        Self {
            connected: None,
            users: HashMap::new(),
            products: BTreeMap::new(),
            subscriptions: HashMap::new(),
            analytics: HashMap::new(),
            allowances: HashMap::new(),
            marketplace_address: "0xmarketplace".to_string(),
            conversion_num: 1,
            conversion_den: 1,
            read_errors: HashMap::new(),
            clock: 0,
            next_product_id: 1,
            pending: HashMap::new(),
            scripted_outcomes: VecDeque::new(),
            auto_resolve: true,
            confirmation_timeout: None,
            fail_next_submission: None,
            nonce: 0,
        }
    }

    /// Bound how many unanswered polls a submission survives.
    ///
    /// Only reachable when confirmations are held: the Nth poll for a
    /// still-pending submission reports `TimedOut` and spends the handle.
    pub fn with_confirmation_timeout(mut self, max_polls: u32) -> Self {
        self.confirmation_timeout = Some(max_polls);
        self
    }

    // ========================================================================
    // Connection
    // ========================================================================

    /// Connect a signer address. Submissions are attributed to it.
    pub fn connect(&mut self, address: impl Into<String>) {
        self.connected = Some(address.into());
    }

    /// Get the connected signer, if any
    pub fn connected(&self) -> Option<&str> {
        self.connected.as_deref()
    }

    /// Get the marketplace contract address (the approval spender)
    pub fn marketplace_address(&self) -> &str {
        &self.marketplace_address
    }

    // ========================================================================
    // Fixtures
    // ========================================================================

    /// Seed a registered account directly, bypassing the write path
    pub fn register_account(&mut self, address: impl Into<String>, role: Role) {
        let address = address.into();
        self.users
            .insert(address.clone(), UserRecord::new(address, role));
    }

    /// Seed a listed product directly, bypassing the write path
    ///
    /// # Returns
    /// The assigned product ID
    pub fn add_product(
        &mut self,
        merchant: impl Into<String>,
        name: impl Into<String>,
        price: i64,
        duration_days: u64,
    ) -> u64 {
        let product_id = self.next_product_id;
        self.next_product_id += 1;
        self.products.insert(
            product_id,
            Product::new(product_id, merchant.into(), name.into(), price, duration_days),
        );
        self.analytics
            .insert(product_id, ProductAnalytics::new(product_id));
        product_id
    }

    /// Delist a product
    ///
    /// # Returns
    /// false when no product has that ID
    pub fn deactivate_product(&mut self, product_id: u64) -> bool {
        match self.products.get_mut(&product_id) {
            Some(product) => {
                product.set_active(false);
                true
            }
            None => false,
        }
    }

    /// Set the USD-to-settlement-unit conversion ratio.
    ///
    /// A zero denominator makes `convert_usd_to_usdc` fail, which tests use
    /// to exercise conversion errors.
    pub fn set_conversion_rate(&mut self, numerator: i64, denominator: i64) {
        self.conversion_num = numerator;
        self.conversion_den = denominator;
    }

    /// Get the remaining allowance for (owner, spender)
    pub fn allowance(&self, owner: &str, spender: &str) -> i64 {
        self.allowances
            .get(&(owner.to_string(), spender.to_string()))
            .copied()
            .unwrap_or(0)
    }

    // ========================================================================
    // Scripting
    // ========================================================================

    /// Reject the next submission with the given message
    pub fn fail_next_submission(&mut self, message: impl Into<String>) {
        self.fail_next_submission = Some(message.into());
    }

    /// Queue a terminal outcome. Scripted outcomes are consumed FIFO and
    /// take precedence over automatic confirmation.
    pub fn script_outcome(&mut self, outcome: ConfirmationOutcome) {
        self.scripted_outcomes.push_back(outcome);
    }

    /// Stop resolving submissions automatically. Polls return nothing until
    /// a scripted outcome is queued or the confirmation timeout elapses.
    pub fn hold_confirmations(&mut self) {
        self.auto_resolve = false;
    }

    /// Make one query fail until cleared. The error surfaces on every
    /// refresh of that query; other queries are unaffected.
    pub fn set_read_error(&mut self, query: QueryKind, message: impl Into<String>) {
        self.read_errors.insert(query, message.into());
    }

    /// Let a query succeed again
    pub fn clear_read_error(&mut self, query: QueryKind) {
        self.read_errors.remove(&query);
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn read_guard(&self, query: QueryKind) -> Result<(), ReadError> {
        match self.read_errors.get(&query) {
            Some(message) => Err(ReadError::Unreachable(message.clone())),
            None => Ok(()),
        }
    }

    fn resolve_confirmed(&mut self, entry: &PendingEntry) -> ConfirmationOutcome {
        match self.apply(&entry.sender, &entry.operation) {
            Ok(()) => ConfirmationOutcome::Confirmed,
            Err(reason) => ConfirmationOutcome::Failed {
                reason: Some(reason),
            },
        }
    }

    /// Execute a confirmed operation against ledger state.
    ///
    /// Enforces the marketplace contract rules. An Err here becomes a
    /// Failed outcome with the message as its reason.
    fn apply(&mut self, sender: &str, operation: &WriteOperation) -> Result<(), String> {
        self.clock += 1;

        match operation {
            WriteOperation::RegisterUser { role } => {
                if !role.is_set() {
                    return Err("role must be buyer or merchant".to_string());
                }
                if self.users.contains_key(sender) {
                    return Err("address already registered".to_string());
                }
                self.users
                    .insert(sender.to_string(), UserRecord::new(sender.to_string(), *role));
                Ok(())
            }

            WriteOperation::Approve { spender, amount } => {
                if *amount < 0 {
                    return Err("allowance must not be negative".to_string());
                }
                self.allowances
                    .insert((sender.to_string(), spender.clone()), *amount);
                Ok(())
            }

            WriteOperation::Subscribe { product_id } => {
                let (price, duration_days) = match self.products.get(product_id) {
                    None => return Err(format!("unknown product {product_id}")),
                    Some(p) if !p.active() => {
                        return Err(format!("product {product_id} is inactive"))
                    }
                    Some(p) => (p.price(), p.duration_days()),
                };

                let user = self
                    .users
                    .get_mut(sender)
                    .ok_or_else(|| "sender not registered".to_string())?;
                if user.active_subscriptions().contains(product_id) {
                    return Err(format!("already subscribed to product {product_id}"));
                }

                let key = (sender.to_string(), self.marketplace_address.clone());
                let allowance = self.allowances.get(&key).copied().unwrap_or(0);
                if allowance < price {
                    return Err("insufficient allowance".to_string());
                }
                self.allowances.insert(key, allowance - price);

                let start = self.clock;
                let end = start + duration_days * SECONDS_PER_DAY;
                self.subscriptions
                    .entry(sender.to_string())
                    .or_default()
                    .push(Subscription::new(*product_id, start, end, price));
                user.add_subscription(*product_id);
                self.analytics
                    .entry(*product_id)
                    .or_insert_with(|| ProductAnalytics::new(*product_id))
                    .record_subscription(sender, price, start);
                Ok(())
            }

            WriteOperation::CreateProduct {
                name,
                price,
                duration_days,
            } => {
                match self.users.get(sender) {
                    Some(user) if user.role() == Role::Merchant => {}
                    Some(_) => return Err("sender is not a merchant".to_string()),
                    None => return Err("sender not registered".to_string()),
                }
                if *price <= 0 {
                    return Err("price must be positive".to_string());
                }
                if *duration_days == 0 {
                    return Err("duration must be at least one day".to_string());
                }

                let product_id = self.next_product_id;
                self.next_product_id += 1;
                self.products.insert(
                    product_id,
                    Product::new(
                        product_id,
                        sender.to_string(),
                        name.clone(),
                        *price,
                        *duration_days,
                    ),
                );
                self.analytics
                    .insert(product_id, ProductAnalytics::new(product_id));
                Ok(())
            }
        }
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerReader for MemoryLedger {
    fn get_user(&self, address: &str) -> Result<Option<UserRecord>, ReadError> {
        self.read_guard(QueryKind::User)?;
        Ok(self.users.get(address).cloned())
    }

    fn get_user_subscriptions(&self, address: &str) -> Result<UserSubscriptions, ReadError> {
        self.read_guard(QueryKind::UserSubscriptions)?;
        let active = match self.users.get(address) {
            Some(user) => user.active_subscriptions().to_vec(),
            None => return Ok(UserSubscriptions::empty()),
        };
        let subscriptions = self.subscriptions.get(address).cloned().unwrap_or_default();
        Ok(UserSubscriptions::new(active, subscriptions))
    }

    fn get_all_products(&self) -> Result<Vec<Product>, ReadError> {
        self.read_guard(QueryKind::AllProducts)?;
        Ok(self.products.values().cloned().collect())
    }

    fn get_merchant_products(&self, merchant: &str) -> Result<Vec<u64>, ReadError> {
        self.read_guard(QueryKind::MerchantProducts)?;
        Ok(self
            .products
            .values()
            .filter(|p| p.merchant() == merchant)
            .map(|p| p.product_id())
            .collect())
    }

    fn get_merchant_analytics(&self, merchant: &str) -> Result<Vec<ProductAnalytics>, ReadError> {
        self.read_guard(QueryKind::MerchantAnalytics)?;
        Ok(self
            .products
            .values()
            .filter(|p| p.merchant() == merchant)
            .filter_map(|p| self.analytics.get(&p.product_id()).cloned())
            .collect())
    }

    fn convert_usd_to_usdc(&self, amount: i64) -> Result<i64, ReadError> {
        if self.conversion_den == 0 {
            return Err(ReadError::Malformed(
                "conversion rate divides by zero".to_string(),
            ));
        }
        let widened = amount as i128 * self.conversion_num as i128 / self.conversion_den as i128;
        i64::try_from(widened)
            .map_err(|_| ReadError::Malformed("conversion result out of range".to_string()))
    }
}

impl LedgerWriter for MemoryLedger {
    fn submit(&mut self, operation: &WriteOperation) -> Result<SubmissionHandle, SubmitError> {
        if let Some(message) = self.fail_next_submission.take() {
            return Err(SubmitError::Rejected(message));
        }
        let sender = self.connected.clone().ok_or(SubmitError::NoSigner)?;

        self.nonce += 1;
        let encoded = serde_json::to_string(operation)
            .map_err(|e| SubmitError::Rejected(format!("unserializable operation: {e}")))?;
        let mut hasher = Sha256::new();
        hasher.update(sender.as_bytes());
        hasher.update(self.nonce.to_be_bytes());
        hasher.update(encoded.as_bytes());
        let handle = format!("0x{:x}", hasher.finalize());

        self.pending.insert(
            handle.clone(),
            PendingEntry {
                sender,
                operation: operation.clone(),
                polls: 0,
            },
        );
        Ok(SubmissionHandle::new(handle))
    }
}

impl ConfirmationWatcher for MemoryLedger {
    fn poll(&mut self, handle: &SubmissionHandle) -> Option<ConfirmationOutcome> {
        let mut entry = self.pending.remove(handle.as_str())?;
        entry.polls += 1;

        if let Some(outcome) = self.scripted_outcomes.pop_front() {
            if outcome == ConfirmationOutcome::Confirmed {
                return Some(self.resolve_confirmed(&entry));
            }
            return Some(outcome);
        }

        if self.auto_resolve {
            return Some(self.resolve_confirmed(&entry));
        }

        if let Some(limit) = self.confirmation_timeout {
            if entry.polls >= limit {
                return Some(ConfirmationOutcome::TimedOut);
            }
        }

        self.pending.insert(handle.as_str().to_string(), entry);
        None
    }
}
