//! Pending transaction model
//!
//! Represents one in-flight write against the ledger.
//! Each pending transaction has:
//! - A local UUID (for client-side bookkeeping, never sent anywhere)
//! - The opaque submission handle the ledger returned
//! - The typed operation that was submitted
//! - A status (Submitted, Confirmed, Failed)
//!
//! The flow engine holds at most one of these at a time: a second
//! submission attempt while one is in flight is rejected before it reaches
//! the ledger.
//!
//! CRITICAL: All money values are i64 (smallest settlement units)

use crate::ledger::SubmissionHandle;
use crate::models::account::Role;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which deployed contract a write operation targets.
///
/// Spend authorization happens on the settlement-token contract (with the
/// marketplace as spender); everything else goes to the marketplace
/// contract itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractTarget {
    /// The marketplace contract
    Marketplace,

    /// The settlement-token (USDC) contract
    SettlementToken,
}

/// A typed ledger write operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WriteOperation {
    /// Register the sender with a role (wire codes: 1 = buyer, 2 = merchant)
    RegisterUser { role: Role },

    /// Authorize `spender` to move `amount` settlement-token units on the
    /// sender's behalf
    Approve { spender: String, amount: i64 },

    /// Purchase a subscription to a product
    Subscribe { product_id: u64 },

    /// List a new product
    CreateProduct {
        name: String,
        /// Price in smallest settlement units
        price: i64,
        duration_days: u64,
    },
}

impl WriteOperation {
    /// Contract-side name of the operation
    pub fn name(&self) -> &'static str {
        match self {
            WriteOperation::RegisterUser { .. } => "registerUser",
            WriteOperation::Approve { .. } => "approve",
            WriteOperation::Subscribe { .. } => "subscribe",
            WriteOperation::CreateProduct { .. } => "createProduct",
        }
    }

    /// Which deployed contract receives this operation
    pub fn target(&self) -> ContractTarget {
        match self {
            WriteOperation::Approve { .. } => ContractTarget::SettlementToken,
            _ => ContractTarget::Marketplace,
        }
    }
}

/// Lifecycle status of a pending transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    /// Accepted by the ledger, awaiting a terminal outcome
    Submitted,

    /// Confirmed on the ledger
    Confirmed,

    /// Failed on the ledger
    Failed,
}

/// Errors that can occur during status transitions
#[derive(Debug, Error, PartialEq)]
pub enum TransactionError {
    #[error("Transaction already confirmed")]
    AlreadyConfirmed,

    #[error("Transaction already failed")]
    AlreadyFailed,
}

/// One in-flight write against the ledger
///
/// # Example
/// ```
/// use substream_core_rs::ledger::SubmissionHandle;
/// use substream_core_rs::models::transaction::{PendingTransaction, TxStatus, WriteOperation};
///
/// let mut tx = PendingTransaction::new(
///     WriteOperation::Subscribe { product_id: 3 },
///     SubmissionHandle::new("0xabc"),
/// );
/// assert_eq!(tx.status(), TxStatus::Submitted);
///
/// tx.confirm().unwrap();
/// assert_eq!(tx.status(), TxStatus::Confirmed);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTransaction {
    /// Local identifier (UUID)
    id: String,

    /// Opaque handle returned at submission
    handle: SubmissionHandle,

    /// The operation that was submitted
    operation: WriteOperation,

    /// Current status
    status: TxStatus,
}

impl PendingTransaction {
    /// Record a freshly accepted submission
    pub fn new(operation: WriteOperation, handle: SubmissionHandle) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            handle,
            operation,
            status: TxStatus::Submitted,
        }
    }

    /// Get the local identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the submission handle
    pub fn handle(&self) -> &SubmissionHandle {
        &self.handle
    }

    /// Get the submitted operation
    pub fn operation(&self) -> &WriteOperation {
        &self.operation
    }

    /// Get the current status
    pub fn status(&self) -> TxStatus {
        self.status
    }

    /// Check whether the transaction is still awaiting its outcome
    pub fn is_in_flight(&self) -> bool {
        self.status == TxStatus::Submitted
    }

    /// Mark the transaction confirmed (idempotent)
    ///
    /// # Returns
    /// - Ok(()) if newly confirmed or already confirmed
    /// - Err(TransactionError::AlreadyFailed) if it already failed
    pub fn confirm(&mut self) -> Result<(), TransactionError> {
        match self.status {
            TxStatus::Submitted | TxStatus::Confirmed => {
                self.status = TxStatus::Confirmed;
                Ok(())
            }
            TxStatus::Failed => Err(TransactionError::AlreadyFailed),
        }
    }

    /// Mark the transaction failed (idempotent)
    ///
    /// # Returns
    /// - Ok(()) if newly failed or already failed
    /// - Err(TransactionError::AlreadyConfirmed) if it already confirmed
    pub fn fail(&mut self) -> Result<(), TransactionError> {
        match self.status {
            TxStatus::Submitted | TxStatus::Failed => {
                self.status = TxStatus::Failed;
                Ok(())
            }
            TxStatus::Confirmed => Err(TransactionError::AlreadyConfirmed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(operation: WriteOperation) -> PendingTransaction {
        PendingTransaction::new(operation, SubmissionHandle::new("0xhandle"))
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(
            WriteOperation::RegisterUser { role: Role::Buyer }.name(),
            "registerUser"
        );
        assert_eq!(
            WriteOperation::Approve {
                spender: "0xM".to_string(),
                amount: 1
            }
            .name(),
            "approve"
        );
        assert_eq!(
            WriteOperation::Subscribe { product_id: 1 }.name(),
            "subscribe"
        );
        assert_eq!(
            WriteOperation::CreateProduct {
                name: "X".to_string(),
                price: 1,
                duration_days: 1
            }
            .name(),
            "createProduct"
        );
    }

    #[test]
    fn test_approve_targets_settlement_token() {
        let approve = WriteOperation::Approve {
            spender: "0xM".to_string(),
            amount: 19_990_000,
        };
        assert_eq!(approve.target(), ContractTarget::SettlementToken);

        let subscribe = WriteOperation::Subscribe { product_id: 3 };
        assert_eq!(subscribe.target(), ContractTarget::Marketplace);

        let register = WriteOperation::RegisterUser { role: Role::Buyer };
        assert_eq!(register.target(), ContractTarget::Marketplace);
    }

    #[test]
    fn test_new_transaction_is_in_flight() {
        let tx = pending(WriteOperation::Subscribe { product_id: 1 });

        assert_eq!(tx.status(), TxStatus::Submitted);
        assert!(tx.is_in_flight());
        assert_eq!(tx.handle().as_str(), "0xhandle");
    }

    #[test]
    fn test_local_ids_are_unique() {
        let a = pending(WriteOperation::Subscribe { product_id: 1 });
        let b = pending(WriteOperation::Subscribe { product_id: 1 });
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_confirm_is_idempotent() {
        let mut tx = pending(WriteOperation::Subscribe { product_id: 1 });

        tx.confirm().unwrap();
        assert_eq!(tx.status(), TxStatus::Confirmed);

        // Confirming again keeps the status and succeeds
        tx.confirm().unwrap();
        assert_eq!(tx.status(), TxStatus::Confirmed);
    }

    #[test]
    fn test_fail_is_idempotent() {
        let mut tx = pending(WriteOperation::Subscribe { product_id: 1 });

        tx.fail().unwrap();
        assert_eq!(tx.status(), TxStatus::Failed);

        tx.fail().unwrap();
        assert_eq!(tx.status(), TxStatus::Failed);
    }

    #[test]
    fn test_terminal_statuses_cannot_cross() {
        let mut confirmed = pending(WriteOperation::Subscribe { product_id: 1 });
        confirmed.confirm().unwrap();
        assert_eq!(confirmed.fail(), Err(TransactionError::AlreadyConfirmed));

        let mut failed = pending(WriteOperation::Subscribe { product_id: 1 });
        failed.fail().unwrap();
        assert_eq!(failed.confirm(), Err(TransactionError::AlreadyFailed));
    }
}
