//! SubStream Client Core - Rust Engine
//!
//! Transaction orchestration layer for a subscription marketplace settled
//! on an external ledger. Owns the read caches, the write state machine,
//! and the event log between a host UI and the ledger connection.
//!
//! # Architecture
//!
//! - **core**: Fixed-point money parsing and formatting
//! - **models**: Domain types (UserRecord, Product, Subscription, events)
//! - **ledger**: Reader/writer/watcher contracts and the in-memory ledger
//! - **orchestrator**: The flow engine (registration, subscribe, listing)
//! - **analytics**: Pure aggregation for the merchant dashboard
//!
//! # Critical Invariants
//!
//! 1. All money values are i64 (smallest settlement units, 6 decimals)
//! 2. At most one write is in flight at a time
//! 3. Each submission handle resolves to exactly one terminal outcome
//! 4. A subscribe flow never submits before its approval confirmed

// Module declarations
pub mod analytics;
pub mod core;
pub mod ledger;
pub mod models;
pub mod orchestrator;

// Re-exports for convenience
pub use crate::analytics::{merchant_summary, ChartPoint, GrowthTrend, MerchantSummary};
pub use crate::core::money::{format_usdc, from_smallest_unit, to_smallest_unit, MoneyError};
pub use crate::ledger::{
    CachedQuery, ConfirmationOutcome, ConfirmationWatcher, LedgerConnector, LedgerReader,
    LedgerWriter, QueryKind, ReadError, ReadState, SubmissionHandle, SubmitError,
};
pub use crate::models::{
    account::{Role, UserRecord},
    analytics::ProductAnalytics,
    event::{EventLog, FlowEvent},
    product::{DraftError, NewProduct, Product, ProductDraft},
    subscription::{Subscription, UserSubscriptions},
    transaction::{PendingTransaction, TransactionError, TxStatus, WriteOperation},
};
pub use crate::orchestrator::{
    EngineConfig, FlowEngine, FlowError, FlowKind, FlowProgress, FlowState, FlowStep, Notice,
};
