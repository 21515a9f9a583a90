//! Account model
//!
//! Mirrors the on-ledger user record:
//! - Address (the wallet identity the record is keyed by)
//! - Numeric role with fixed wire codes (0 = unset, 1 = buyer, 2 = merchant)
//! - Active flag
//! - Ordered lists of active and historical subscription product IDs
//!
//! The record is read-only from the client's perspective: it only changes
//! through ledger-confirmed write operations, never by local mutation.

use serde::{Deserialize, Serialize};

/// Account role with fixed wire encoding.
///
/// The ledger contract stores roles as small integers. Zero is reserved for
/// "unset" and is never a valid registration argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// No role assigned (wire code 0, reserved)
    Unset,

    /// Buyer: browses products and purchases subscriptions (wire code 1)
    Buyer,

    /// Merchant: creates products and views analytics (wire code 2)
    Merchant,
}

impl Role {
    /// Get the wire code sent to the ledger
    ///
    /// # Example
    /// ```
    /// use substream_core_rs::models::account::Role;
    ///
    /// assert_eq!(Role::Buyer.wire_code(), 1);
    /// assert_eq!(Role::Merchant.wire_code(), 2);
    /// ```
    pub fn wire_code(&self) -> u8 {
        match self {
            Role::Unset => 0,
            Role::Buyer => 1,
            Role::Merchant => 2,
        }
    }

    /// Decode a wire code read from the ledger
    ///
    /// Returns `None` for codes outside the fixed mapping.
    pub fn from_wire(code: u8) -> Option<Role> {
        match code {
            0 => Some(Role::Unset),
            1 => Some(Role::Buyer),
            2 => Some(Role::Merchant),
            _ => None,
        }
    }

    /// Check whether the role has been assigned
    pub fn is_set(&self) -> bool {
        !matches!(self, Role::Unset)
    }
}

/// On-ledger user record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Wallet address the record is keyed by
    address: String,

    /// Assigned role (immutable once set)
    role: Role,

    /// Whether the account is active
    is_active: bool,

    /// Product IDs of currently active subscriptions (ledger order)
    active_subscriptions: Vec<u64>,

    /// Product IDs of all subscriptions ever held (ledger order)
    subscription_history: Vec<u64>,
}

impl UserRecord {
    /// Create a fresh record as the ledger would after registration
    pub fn new(address: String, role: Role) -> Self {
        Self {
            address,
            role,
            is_active: true,
            active_subscriptions: Vec::new(),
            subscription_history: Vec::new(),
        }
    }

    /// Get the wallet address
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Get the assigned role
    pub fn role(&self) -> Role {
        self.role
    }

    /// Check whether the account is active
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Get product IDs of active subscriptions
    pub fn active_subscriptions(&self) -> &[u64] {
        &self.active_subscriptions
    }

    /// Get product IDs of all subscriptions ever held
    pub fn subscription_history(&self) -> &[u64] {
        &self.subscription_history
    }

    /// Record a confirmed subscription purchase
    pub(crate) fn add_subscription(&mut self, product_id: u64) {
        if !self.active_subscriptions.contains(&product_id) {
            self.active_subscriptions.push(product_id);
        }
        self.subscription_history.push(product_id);
    }
}

/// Shorten a wallet address for display: first six characters, an ellipsis,
/// then the last four (`0x1234...abcd`). Addresses too short to truncate
/// are returned unchanged.
pub fn short_address(address: &str) -> String {
    if address.len() <= 10 {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_codes_are_fixed() {
        assert_eq!(Role::Unset.wire_code(), 0);
        assert_eq!(Role::Buyer.wire_code(), 1);
        assert_eq!(Role::Merchant.wire_code(), 2);
    }

    #[test]
    fn test_role_round_trips_through_wire() {
        for role in [Role::Unset, Role::Buyer, Role::Merchant] {
            assert_eq!(Role::from_wire(role.wire_code()), Some(role));
        }
        assert_eq!(Role::from_wire(3), None);
    }

    #[test]
    fn test_role_is_set() {
        assert!(!Role::Unset.is_set());
        assert!(Role::Buyer.is_set());
        assert!(Role::Merchant.is_set());
    }

    #[test]
    fn test_new_record_starts_active_with_no_subscriptions() {
        let record = UserRecord::new("0xA".to_string(), Role::Buyer);

        assert_eq!(record.address(), "0xA");
        assert_eq!(record.role(), Role::Buyer);
        assert!(record.is_active());
        assert!(record.active_subscriptions().is_empty());
        assert!(record.subscription_history().is_empty());
    }

    #[test]
    fn test_add_subscription_updates_both_lists() {
        let mut record = UserRecord::new("0xA".to_string(), Role::Buyer);

        record.add_subscription(7);
        assert_eq!(record.active_subscriptions(), &[7]);
        assert_eq!(record.subscription_history(), &[7]);

        // Re-subscribing keeps the active list deduplicated but
        // appends to history
        record.add_subscription(7);
        assert_eq!(record.active_subscriptions(), &[7]);
        assert_eq!(record.subscription_history(), &[7, 7]);
    }

    #[test]
    fn test_short_address_truncates_long_addresses() {
        assert_eq!(
            short_address("0x12345678901234567890abcd"),
            "0x1234...abcd"
        );
    }

    #[test]
    fn test_short_address_keeps_short_strings() {
        assert_eq!(short_address("0xABC"), "0xABC");
    }
}
