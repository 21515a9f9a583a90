//! Flow Engine
//!
//! Single-threaded orchestration of the marketplace write flows:
//! - Registration (registerUser, one step, auto-triggered for new users)
//! - Subscribe (approve then subscribe, strictly ordered)
//! - CreateProduct (createProduct, one step)
//!
//! # Architecture
//!
//! Every flow drives the same explicit state machine:
//!
//! ```text
//! Idle
//!   -> Submitting { flow, step }            (synchronous, inside begin_*)
//!   -> AwaitingConfirmation { flow, step }  (ledger accepted the step)
//!   -> next step, or back to Idle           (terminal outcome arrived)
//! ```
//!
//! At most one write is in flight at a time; a second `begin_*` call while
//! one is pending is rejected before anything reaches the ledger. A failed
//! step resets the engine to Idle and surfaces a generic notice. There is
//! no automatic retry.
//!
//! Confirmation outcomes arrive through the named handlers `on_confirmed`,
//! `on_failed`, and `on_timed_out`, or by letting `poll_confirmations` ask
//! the ledger's watcher directly. Read refreshes never touch the write
//! state machine: a failing query leaves its stale cached value in place
//! and the flow keeps going.
//!
//! # Example
//!
//! ```rust
//! use substream_core_rs::ledger::memory::MemoryLedger;
//! use substream_core_rs::models::Role;
//! use substream_core_rs::orchestrator::{EngineConfig, FlowEngine, FlowProgress};
//!
//! let mut ledger = MemoryLedger::new();
//! ledger.connect("0xbuyer");
//! ledger.register_account("0xbuyer", Role::Buyer);
//! let product_id = ledger.add_product("0xmerchant", "News", 19_990_000, 30);
//!
//! let config = EngineConfig {
//!     address: Some("0xbuyer".to_string()),
//!     dashboard_role: Role::Buyer,
//!     marketplace_address: ledger.marketplace_address().to_string(),
//! };
//! let mut engine = FlowEngine::new(config, Box::new(ledger)).unwrap();
//! engine.refresh_all();
//!
//! engine.begin_subscribe(product_id).unwrap();
//!
//! // First poll confirms the approval and submits the subscribe step
//! let progress = engine.poll_confirmations();
//! assert!(matches!(progress, Some(FlowProgress::Advanced { .. })));
//!
//! // Second poll confirms the subscription and refreshes the caches
//! let progress = engine.poll_confirmations();
//! assert!(matches!(progress, Some(FlowProgress::Completed { .. })));
//!
//! let subs = engine.reads().subscriptions().value().unwrap();
//! assert!(subs.is_subscribed(product_id));
//! ```

use crate::ledger::{
    ConfirmationOutcome, LedgerConnector, QueryKind, ReadError, ReadState, SubmissionHandle,
};
use crate::models::account::Role;
use crate::models::event::{EventLog, FlowEvent};
use crate::models::product::{DraftError, ProductDraft};
use crate::models::transaction::{PendingTransaction, WriteOperation};
use std::mem;
use thiserror::Error;

// ============================================================================
// Configuration
// ============================================================================

/// Flow engine configuration
///
/// # Fields
///
/// * `address` - Connected wallet address, if a wallet is connected
/// * `dashboard_role` - Role this session registers new users under
/// * `marketplace_address` - Marketplace contract address (approval spender)
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Connected wallet address (None = browsing without a wallet)
    pub address: Option<String>,

    /// Role used when auto-registration submits for a fresh address
    pub dashboard_role: Role,

    /// Address of the marketplace contract, the spender on approvals
    pub marketplace_address: String,
}

// ============================================================================
// Flow State Machine Types
// ============================================================================

/// One submittable step of a flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStep {
    /// registerUser on the marketplace
    Register,

    /// approve on the settlement token
    Approve,

    /// subscribe on the marketplace
    Subscribe,

    /// createProduct on the marketplace
    CreateProduct,
}

impl FlowStep {
    /// Contract-side name of the action this step performs
    pub fn action(&self) -> &'static str {
        match self {
            FlowStep::Register => "registerUser",
            FlowStep::Approve => "approve",
            FlowStep::Subscribe => "subscribe",
            FlowStep::CreateProduct => "createProduct",
        }
    }
}

/// Which flow is being run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    /// Register the connected address with a role
    Registration { role: Role },

    /// Approve then subscribe to a product
    Subscribe { product_id: u64 },

    /// List a new product
    CreateProduct,
}

impl FlowKind {
    /// Short name for display and logs
    pub fn name(&self) -> &'static str {
        match self {
            FlowKind::Registration { .. } => "registration",
            FlowKind::Subscribe { .. } => "subscribe",
            FlowKind::CreateProduct => "create_product",
        }
    }

    /// The step and operation that follow a completed step, if any.
    ///
    /// Only the subscribe flow has a second step: the marketplace
    /// subscribe is submitted strictly after the approval confirmed.
    fn next_operation(&self, completed: FlowStep) -> Option<(FlowStep, WriteOperation)> {
        match (self, completed) {
            (FlowKind::Subscribe { product_id }, FlowStep::Approve) => Some((
                FlowStep::Subscribe,
                WriteOperation::Subscribe {
                    product_id: *product_id,
                },
            )),
            _ => None,
        }
    }

    /// Queries to refresh after this flow completes
    pub fn refresh_set(&self) -> Vec<QueryKind> {
        match self {
            FlowKind::Registration { .. } => vec![QueryKind::User],
            FlowKind::Subscribe { .. } => vec![
                QueryKind::User,
                QueryKind::UserSubscriptions,
                QueryKind::AllProducts,
            ],
            FlowKind::CreateProduct => vec![
                QueryKind::MerchantProducts,
                QueryKind::MerchantAnalytics,
            ],
        }
    }
}

/// Where the engine currently is in a flow.
///
/// `Submitting` is only observable from inside a `begin_*` call; by the
/// time the call returns, the engine is either awaiting confirmation or
/// back at Idle.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowState {
    /// No flow running
    Idle,

    /// A step is being handed to the ledger
    Submitting { flow: FlowKind, step: FlowStep },

    /// A step was accepted and its outcome is pending
    AwaitingConfirmation {
        flow: FlowKind,
        step: FlowStep,
        handle: SubmissionHandle,
    },
}

impl FlowState {
    /// Check whether a new flow may start
    pub fn is_idle(&self) -> bool {
        matches!(self, FlowState::Idle)
    }
}

/// What one engine call moved the flow to
#[derive(Debug, Clone, PartialEq)]
pub enum FlowProgress {
    /// A step was accepted by the ledger and awaits confirmation
    Submitted {
        step: FlowStep,
        handle: SubmissionHandle,
    },

    /// A step confirmed and the next step was accepted
    Advanced {
        completed: FlowStep,
        next: FlowStep,
        handle: SubmissionHandle,
    },

    /// The final step confirmed; affected read caches were refreshed
    Completed {
        flow: FlowKind,
        refreshed: Vec<QueryKind>,
    },

    /// A step was rejected or failed; the engine is back at Idle
    Failed { flow: FlowKind, step: FlowStep },

    /// A step outran the confirmation window; the engine is back at Idle
    TimedOut { flow: FlowKind, step: FlowStep },
}

// ============================================================================
// Notices
// ============================================================================

/// User-facing notification raised by the engine.
///
/// Failure notices are deliberately generic: the underlying reason goes to
/// the event log, not to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Registration flow completed
    Registered,

    /// The approval step of a subscribe flow confirmed
    UsdcApproved,

    /// Subscribe flow completed
    Subscribed,

    /// CreateProduct flow completed
    ProductCreated,

    /// A flow step was rejected or failed
    ActionFailed { action: &'static str },

    /// A flow step timed out awaiting confirmation
    ActionTimedOut { action: &'static str },
}

impl Notice {
    /// Display message for the notice
    pub fn message(&self) -> &'static str {
        match self {
            Notice::Registered => "Registration successful!",
            Notice::UsdcApproved => "USDC approved successfully!",
            Notice::Subscribed => "Subscribed successfully!",
            Notice::ProductCreated => "Product created successfully!",
            Notice::ActionFailed { .. } => "Transaction failed. Please try again.",
            Notice::ActionTimedOut { .. } => "Transaction timed out. Please try again.",
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Why a flow could not start or a handler could not run.
///
/// These are precondition failures: when a `begin_*` call returns an error,
/// nothing was submitted and no state changed.
#[derive(Debug, Error, PartialEq)]
pub enum FlowError {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("No wallet connected")]
    NotConnected,

    #[error("A transaction is already in flight")]
    FlowInFlight,

    #[error("Role must be buyer or merchant")]
    InvalidRole,

    #[error("Address is already registered")]
    AlreadyRegistered,

    #[error("Registration was already attempted this session")]
    RegistrationAlreadyAttempted,

    #[error("Product list has not loaded yet")]
    ProductsNotLoaded,

    #[error("Unknown product: {product_id}")]
    UnknownProduct { product_id: u64 },

    #[error("Product {product_id} is no longer available")]
    InactiveProduct { product_id: u64 },

    #[error("Already subscribed to product {product_id}")]
    AlreadySubscribed { product_id: u64 },

    #[error("Invalid product draft: {0}")]
    InvalidDraft(#[from] DraftError),

    #[error("Price conversion failed: {0}")]
    Conversion(ReadError),

    #[error("No transaction is awaiting confirmation")]
    NoPendingTransaction,

    #[error("Handle does not match the in-flight transaction: {handle}")]
    UnknownHandle { handle: String },
}

// ============================================================================
// Flow Engine
// ============================================================================

/// Orchestrates reads, writes, and confirmations against one ledger
/// connection.
///
/// The engine owns:
/// - The read cache (one [`crate::ledger::CachedQuery`] per query)
/// - The write state machine (at most one pending transaction)
/// - The notice queue (user-facing notifications, drained by the host)
/// - The event log (everything that happened, in order)
pub struct FlowEngine {
    /// Session configuration
    config: EngineConfig,

    /// The ledger connection (reader, writer, and watcher)
    ledger: Box<dyn LedgerConnector>,

    /// Cached read results
    reads: ReadState,

    /// Write state machine position
    flow_state: FlowState,

    /// The in-flight transaction, if any
    pending: Option<PendingTransaction>,

    /// Latch: arms when a registration is submitted, never disarms.
    /// A failed registration is not retried within the session.
    registration_submitted: bool,

    /// Notices queued for the host to display
    notices: Vec<Notice>,

    /// Ordered record of everything the engine did
    event_log: EventLog,

    /// Next event sequence number
    next_seq: u64,
}

impl FlowEngine {
    /// Create a new engine over a ledger connection
    ///
    /// # Arguments
    ///
    /// * `config` - Session configuration (wallet, role, marketplace)
    /// * `ledger` - The ledger connection the engine will own
    ///
    /// # Returns
    ///
    /// * `Ok(FlowEngine)` - Engine at Idle with empty caches
    /// * `Err(FlowError::InvalidConfig)` - Configuration validation failed
    pub fn new(config: EngineConfig, ledger: Box<dyn LedgerConnector>) -> Result<Self, FlowError> {
        Self::validate_config(&config)?;

        Ok(Self {
            config,
            ledger,
            reads: ReadState::new(),
            flow_state: FlowState::Idle,
            pending: None,
            registration_submitted: false,
            notices: Vec::new(),
            event_log: EventLog::new(),
            next_seq: 1,
        })
    }

    /// Validate configuration
    fn validate_config(config: &EngineConfig) -> Result<(), FlowError> {
        if config.marketplace_address.trim().is_empty() {
            return Err(FlowError::InvalidConfig(
                "marketplace_address must not be empty".to_string(),
            ));
        }

        if !config.dashboard_role.is_set() {
            return Err(FlowError::InvalidConfig(
                "dashboard_role must be buyer or merchant".to_string(),
            ));
        }

        if let Some(address) = &config.address {
            if address.trim().is_empty() {
                return Err(FlowError::InvalidConfig(
                    "address must not be empty when present".to_string(),
                ));
            }
        }

        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Get the session configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get the cached read results
    pub fn reads(&self) -> &ReadState {
        &self.reads
    }

    /// Get the current flow state
    pub fn flow_state(&self) -> &FlowState {
        &self.flow_state
    }

    /// Get the in-flight transaction, if any
    pub fn pending_transaction(&self) -> Option<&PendingTransaction> {
        self.pending.as_ref()
    }

    /// Check whether a new flow may start
    pub fn is_idle(&self) -> bool {
        self.flow_state.is_idle()
    }

    /// Check whether a wallet address is present in the configuration
    pub fn is_connected(&self) -> bool {
        self.config.address.is_some()
    }

    /// Check whether a registration was already submitted this session
    pub fn registration_attempted(&self) -> bool {
        self.registration_submitted
    }

    /// Get the queued notices without consuming them
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Take the queued notices, leaving the queue empty
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        mem::take(&mut self.notices)
    }

    /// Get total events logged
    pub fn event_count(&self) -> usize {
        self.event_log.len()
    }

    /// Get reference to the event log
    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    // ========================================================================
    // Event Logging
    // ========================================================================

    /// Log an event to the event log
    fn log_event(&mut self, event: FlowEvent) {
        self.event_log.log(event);
    }

    /// Claim the next event sequence number
    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Refresh one cached query from the ledger.
    ///
    /// A successful refresh replaces the cached value. A failed refresh
    /// records the error but keeps the stale value, and never disturbs a
    /// flow in progress. Queries about the connected user are skipped
    /// entirely when no wallet is connected.
    ///
    /// Refreshing the user query is also what arms auto-registration: when
    /// the ledger positively reports that the connected address has no
    /// account, the engine submits a registration for the configured
    /// dashboard role, at most once per session.
    pub fn refresh(&mut self, query: QueryKind) {
        match query {
            QueryKind::User => {
                let Some(address) = self.config.address.clone() else {
                    return;
                };
                self.reads.user_mut().begin();
                match self.ledger.get_user(&address) {
                    Ok(user) => {
                        self.reads.user_mut().complete(user);
                        let seq = self.bump_seq();
                        self.log_event(FlowEvent::ReadCompleted { seq, query });
                        self.maybe_auto_register();
                    }
                    Err(e) => {
                        let error = e.to_string();
                        self.reads.user_mut().fail(error.clone());
                        let seq = self.bump_seq();
                        self.log_event(FlowEvent::ReadFailed { seq, query, error });
                    }
                }
            }

            QueryKind::UserSubscriptions => {
                let Some(address) = self.config.address.clone() else {
                    return;
                };
                self.reads.subscriptions_mut().begin();
                match self.ledger.get_user_subscriptions(&address) {
                    Ok(subs) => {
                        self.reads.subscriptions_mut().complete(subs);
                        let seq = self.bump_seq();
                        self.log_event(FlowEvent::ReadCompleted { seq, query });
                    }
                    Err(e) => {
                        let error = e.to_string();
                        self.reads.subscriptions_mut().fail(error.clone());
                        let seq = self.bump_seq();
                        self.log_event(FlowEvent::ReadFailed { seq, query, error });
                    }
                }
            }

            QueryKind::AllProducts => {
                self.reads.all_products_mut().begin();
                match self.ledger.get_all_products() {
                    Ok(products) => {
                        self.reads.all_products_mut().complete(products);
                        let seq = self.bump_seq();
                        self.log_event(FlowEvent::ReadCompleted { seq, query });
                    }
                    Err(e) => {
                        let error = e.to_string();
                        self.reads.all_products_mut().fail(error.clone());
                        let seq = self.bump_seq();
                        self.log_event(FlowEvent::ReadFailed { seq, query, error });
                    }
                }
            }

            QueryKind::MerchantProducts => {
                let Some(address) = self.config.address.clone() else {
                    return;
                };
                self.reads.merchant_products_mut().begin();
                match self.ledger.get_merchant_products(&address) {
                    Ok(ids) => {
                        self.reads.merchant_products_mut().complete(ids);
                        let seq = self.bump_seq();
                        self.log_event(FlowEvent::ReadCompleted { seq, query });
                    }
                    Err(e) => {
                        let error = e.to_string();
                        self.reads.merchant_products_mut().fail(error.clone());
                        let seq = self.bump_seq();
                        self.log_event(FlowEvent::ReadFailed { seq, query, error });
                    }
                }
            }

            QueryKind::MerchantAnalytics => {
                let Some(address) = self.config.address.clone() else {
                    return;
                };
                self.reads.merchant_analytics_mut().begin();
                match self.ledger.get_merchant_analytics(&address) {
                    Ok(analytics) => {
                        self.reads.merchant_analytics_mut().complete(analytics);
                        let seq = self.bump_seq();
                        self.log_event(FlowEvent::ReadCompleted { seq, query });
                    }
                    Err(e) => {
                        let error = e.to_string();
                        self.reads.merchant_analytics_mut().fail(error.clone());
                        let seq = self.bump_seq();
                        self.log_event(FlowEvent::ReadFailed { seq, query, error });
                    }
                }
            }
        }
    }

    /// Refresh every cached query
    pub fn refresh_all(&mut self) {
        self.refresh(QueryKind::User);
        self.refresh(QueryKind::UserSubscriptions);
        self.refresh(QueryKind::AllProducts);
        self.refresh(QueryKind::MerchantProducts);
        self.refresh(QueryKind::MerchantAnalytics);
    }

    /// Submit a registration for a fresh address, at most once per session.
    ///
    /// Requires: latch clear, engine idle, wallet connected, and the user
    /// query has positively answered "no account". A stale or errored user
    /// cache never triggers this.
    fn maybe_auto_register(&mut self) {
        if self.registration_submitted || !self.flow_state.is_idle() {
            return;
        }
        if self.config.address.is_none() {
            return;
        }
        if !matches!(self.reads.user().value(), Some(None)) {
            return;
        }

        let role = self.config.dashboard_role;
        self.registration_submitted = true;
        self.submit_step(
            FlowKind::Registration { role },
            FlowStep::Register,
            WriteOperation::RegisterUser { role },
        );
    }

    // ========================================================================
    // Flow Entry Points
    // ========================================================================

    fn ensure_connected(&self) -> Result<(), FlowError> {
        if self.config.address.is_none() {
            return Err(FlowError::NotConnected);
        }
        Ok(())
    }

    fn ensure_idle(&self) -> Result<(), FlowError> {
        if !self.flow_state.is_idle() {
            return Err(FlowError::FlowInFlight);
        }
        Ok(())
    }

    /// Start a registration flow for the connected address.
    ///
    /// Auto-registration covers the common case; this entry point exists
    /// for hosts that let the user pick a role explicitly. Either path
    /// arms the same once-per-session latch.
    ///
    /// # Returns
    ///
    /// * `Ok(FlowProgress)` - The registration was handed to the ledger
    ///   (`Submitted`), or it was rejected and the engine reset (`Failed`)
    /// * `Err(FlowError)` - A precondition failed and nothing was submitted
    pub fn begin_register(&mut self, role: Role) -> Result<FlowProgress, FlowError> {
        self.ensure_connected()?;
        self.ensure_idle()?;

        if !role.is_set() {
            return Err(FlowError::InvalidRole);
        }
        if matches!(self.reads.user().value(), Some(Some(_))) {
            return Err(FlowError::AlreadyRegistered);
        }
        if self.registration_submitted {
            return Err(FlowError::RegistrationAlreadyAttempted);
        }

        self.registration_submitted = true;
        Ok(self.submit_step(
            FlowKind::Registration { role },
            FlowStep::Register,
            WriteOperation::RegisterUser { role },
        ))
    }

    /// Start a subscribe flow: approve the price, then subscribe.
    ///
    /// The approval amount is the product's price converted to settlement
    /// units. The marketplace subscribe step is submitted only after the
    /// approval confirms.
    ///
    /// # Arguments
    ///
    /// * `product_id` - The product to subscribe to, which must be present
    ///   and active in the cached product list
    ///
    /// # Returns
    ///
    /// * `Ok(FlowProgress)` - The approval was handed to the ledger
    ///   (`Submitted`), or it was rejected and the engine reset (`Failed`)
    /// * `Err(FlowError)` - A precondition failed and nothing was submitted
    pub fn begin_subscribe(&mut self, product_id: u64) -> Result<FlowProgress, FlowError> {
        self.ensure_connected()?;
        self.ensure_idle()?;

        // Guard against the cached product list
        let price = {
            let products = self
                .reads
                .all_products()
                .value()
                .ok_or(FlowError::ProductsNotLoaded)?;
            let product = products
                .iter()
                .find(|p| p.product_id() == product_id)
                .ok_or(FlowError::UnknownProduct { product_id })?;
            if !product.active() {
                return Err(FlowError::InactiveProduct { product_id });
            }
            product.price()
        };

        if let Some(subs) = self.reads.subscriptions().value() {
            if subs.is_subscribed(product_id) {
                return Err(FlowError::AlreadySubscribed { product_id });
            }
        }

        // The approval covers exactly one period's payment
        let amount = self
            .ledger
            .convert_usd_to_usdc(price)
            .map_err(FlowError::Conversion)?;

        let spender = self.config.marketplace_address.clone();
        Ok(self.submit_step(
            FlowKind::Subscribe { product_id },
            FlowStep::Approve,
            WriteOperation::Approve { spender, amount },
        ))
    }

    /// Start a create-product flow from a form draft.
    ///
    /// The draft is parsed locally (name, decimal price string, duration in
    /// days); whether the sender may list products is the ledger's call.
    ///
    /// # Returns
    ///
    /// * `Ok(FlowProgress)` - The listing was handed to the ledger
    ///   (`Submitted`), or it was rejected and the engine reset (`Failed`)
    /// * `Err(FlowError)` - A precondition failed and nothing was submitted
    pub fn begin_create_product(&mut self, draft: &ProductDraft) -> Result<FlowProgress, FlowError> {
        self.ensure_connected()?;
        self.ensure_idle()?;

        let new_product = draft.parse()?;
        Ok(self.submit_step(
            FlowKind::CreateProduct,
            FlowStep::CreateProduct,
            WriteOperation::CreateProduct {
                name: new_product.name,
                price: new_product.price,
                duration_days: new_product.duration_days,
            },
        ))
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Hand one step to the ledger and record what happened.
    ///
    /// On acceptance the engine moves to AwaitingConfirmation. On rejection
    /// the whole flow fails: generic notice, event log entries, Idle.
    fn submit_step(
        &mut self,
        flow: FlowKind,
        step: FlowStep,
        operation: WriteOperation,
    ) -> FlowProgress {
        self.flow_state = FlowState::Submitting { flow, step };

        match self.ledger.submit(&operation) {
            Ok(handle) => {
                self.pending = Some(PendingTransaction::new(operation, handle.clone()));
                let seq = self.bump_seq();
                self.log_event(FlowEvent::Submitted {
                    seq,
                    step,
                    handle: handle.clone(),
                });
                self.flow_state = FlowState::AwaitingConfirmation {
                    flow,
                    step,
                    handle: handle.clone(),
                };
                FlowProgress::Submitted { step, handle }
            }
            Err(error) => {
                let seq = self.bump_seq();
                self.log_event(FlowEvent::SubmissionRejected {
                    seq,
                    step,
                    error: error.to_string(),
                });
                self.notices.push(Notice::ActionFailed {
                    action: step.action(),
                });
                self.pending = None;
                self.flow_state = FlowState::Idle;
                let seq = self.bump_seq();
                self.log_event(FlowEvent::FlowFailed { seq, flow, step });
                FlowProgress::Failed { flow, step }
            }
        }
    }

    // ========================================================================
    // Confirmation Handlers
    // ========================================================================

    /// Fold the awaiting state back to Idle and return what was in flight.
    ///
    /// On a handle mismatch the previous state is restored untouched.
    fn take_awaiting(&mut self, handle: &SubmissionHandle) -> Result<(FlowKind, FlowStep), FlowError> {
        match mem::replace(&mut self.flow_state, FlowState::Idle) {
            FlowState::AwaitingConfirmation {
                flow,
                step,
                handle: expected,
            } => {
                if &expected != handle {
                    self.flow_state = FlowState::AwaitingConfirmation {
                        flow,
                        step,
                        handle: expected,
                    };
                    return Err(FlowError::UnknownHandle {
                        handle: handle.to_string(),
                    });
                }
                Ok((flow, step))
            }
            previous => {
                self.flow_state = previous;
                Err(FlowError::NoPendingTransaction)
            }
        }
    }

    /// Handle a confirmed outcome for the in-flight step.
    ///
    /// Advances multi-step flows to their next submission; completes the
    /// flow otherwise, refreshing the read caches it affects.
    pub fn on_confirmed(&mut self, handle: &SubmissionHandle) -> Result<FlowProgress, FlowError> {
        let (flow, step) = self.take_awaiting(handle)?;
        Ok(self.after_confirmed(flow, step, handle.clone()))
    }

    /// Handle a failed outcome for the in-flight step.
    ///
    /// The reason, when the watcher reports one, goes to the event log
    /// only. The user-facing notice stays generic.
    pub fn on_failed(
        &mut self,
        handle: &SubmissionHandle,
        reason: Option<String>,
    ) -> Result<FlowProgress, FlowError> {
        let (flow, step) = self.take_awaiting(handle)?;
        Ok(self.after_failed(flow, step, handle.clone(), reason))
    }

    /// Handle a timed-out watch for the in-flight step
    pub fn on_timed_out(&mut self, handle: &SubmissionHandle) -> Result<FlowProgress, FlowError> {
        let (flow, step) = self.take_awaiting(handle)?;
        Ok(self.after_timed_out(flow, step, handle.clone()))
    }

    /// Ask the ledger's watcher about the in-flight step and dispatch the
    /// outcome, if one arrived.
    ///
    /// # Returns
    ///
    /// * `None` - No flow in flight, or no terminal outcome yet
    /// * `Some(FlowProgress)` - The outcome arrived and was handled
    pub fn poll_confirmations(&mut self) -> Option<FlowProgress> {
        let handle = match &self.flow_state {
            FlowState::AwaitingConfirmation { handle, .. } => handle.clone(),
            _ => return None,
        };

        let outcome = self.ledger.poll(&handle)?;
        let progress = match outcome {
            ConfirmationOutcome::Confirmed => self.on_confirmed(&handle),
            ConfirmationOutcome::Failed { reason } => self.on_failed(&handle, reason),
            ConfirmationOutcome::TimedOut => self.on_timed_out(&handle),
        };
        // The state was verified before dispatch, so the handlers cannot
        // miss; collapse the impossible error branch.
        progress.ok()
    }

    fn after_confirmed(
        &mut self,
        flow: FlowKind,
        step: FlowStep,
        handle: SubmissionHandle,
    ) -> FlowProgress {
        let seq = self.bump_seq();
        self.log_event(FlowEvent::Confirmed { seq, step, handle });
        if let Some(mut tx) = self.pending.take() {
            let _ = tx.confirm();
        }

        // Multi-step flows move straight to the next submission
        if let Some((next, operation)) = flow.next_operation(step) {
            if step == FlowStep::Approve {
                self.notices.push(Notice::UsdcApproved);
            }
            return match self.submit_step(flow, next, operation) {
                FlowProgress::Submitted {
                    step: submitted,
                    handle,
                } => FlowProgress::Advanced {
                    completed: step,
                    next: submitted,
                    handle,
                },
                other => other,
            };
        }

        // Terminal step: notify, refresh affected caches, close the flow
        self.notices.push(match flow {
            FlowKind::Registration { .. } => Notice::Registered,
            FlowKind::Subscribe { .. } => Notice::Subscribed,
            FlowKind::CreateProduct => Notice::ProductCreated,
        });

        let refreshed = flow.refresh_set();
        for query in &refreshed {
            self.refresh(*query);
        }

        let seq = self.bump_seq();
        self.log_event(FlowEvent::FlowSucceeded {
            seq,
            flow,
            refreshed: refreshed.clone(),
        });
        FlowProgress::Completed { flow, refreshed }
    }

    fn after_failed(
        &mut self,
        flow: FlowKind,
        step: FlowStep,
        handle: SubmissionHandle,
        reason: Option<String>,
    ) -> FlowProgress {
        let seq = self.bump_seq();
        self.log_event(FlowEvent::ConfirmationFailed {
            seq,
            step,
            handle,
            reason,
        });
        if let Some(mut tx) = self.pending.take() {
            let _ = tx.fail();
        }

        self.notices.push(Notice::ActionFailed {
            action: step.action(),
        });
        let seq = self.bump_seq();
        self.log_event(FlowEvent::FlowFailed { seq, flow, step });
        FlowProgress::Failed { flow, step }
    }

    fn after_timed_out(
        &mut self,
        flow: FlowKind,
        step: FlowStep,
        handle: SubmissionHandle,
    ) -> FlowProgress {
        let seq = self.bump_seq();
        self.log_event(FlowEvent::ConfirmationTimedOut { seq, step, handle });
        if let Some(mut tx) = self.pending.take() {
            let _ = tx.fail();
        }

        self.notices.push(Notice::ActionTimedOut {
            action: step.action(),
        });
        let seq = self.bump_seq();
        self.log_event(FlowEvent::FlowFailed { seq, flow, step });
        FlowProgress::TimedOut { flow, step }
    }
}
