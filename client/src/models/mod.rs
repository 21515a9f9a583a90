//! Domain models for the subscription marketplace client

pub mod account;
pub mod analytics;
pub mod event;
pub mod product;
pub mod subscription;
pub mod transaction;

// Re-exports
pub use account::{Role, UserRecord};
pub use analytics::ProductAnalytics;
pub use event::{EventLog, FlowEvent};
pub use product::{DraftError, NewProduct, Product, ProductDraft};
pub use subscription::{Subscription, UserSubscriptions};
pub use transaction::{
    ContractTarget, PendingTransaction, TransactionError, TxStatus, WriteOperation,
};
