//! Product model
//!
//! A product is a subscription offering listed by a merchant:
//! - Numeric product ID assigned by the ledger
//! - Display name
//! - Price in smallest settlement units (i64, six decimals)
//! - Subscription duration in whole days
//! - Listing merchant and active flag
//!
//! `ProductDraft` is the raw merchant form input. It is validated and
//! converted exactly once, at the boundary, before a create-product write is
//! submitted. Everything past that boundary works with typed values.

use crate::core::money::{self, MoneyError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// On-ledger product listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Ledger-assigned product ID
    product_id: u64,

    /// Listing merchant's wallet address
    merchant: String,

    /// Display name
    name: String,

    /// Subscription price in smallest settlement units
    price: i64,

    /// Subscription duration in whole days
    duration_days: u64,

    /// Whether the product can currently be subscribed to
    active: bool,
}

impl Product {
    /// Create a product record as the ledger would after a confirmed
    /// create-product write
    pub fn new(
        product_id: u64,
        merchant: String,
        name: String,
        price: i64,
        duration_days: u64,
    ) -> Self {
        Self {
            product_id,
            merchant,
            name,
            price,
            duration_days,
            active: true,
        }
    }

    /// Get the ledger-assigned product ID
    pub fn product_id(&self) -> u64 {
        self.product_id
    }

    /// Get the listing merchant's address
    pub fn merchant(&self) -> &str {
        &self.merchant
    }

    /// Get the display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the price in smallest settlement units
    pub fn price(&self) -> i64 {
        self.price
    }

    /// Get the subscription duration in days
    pub fn duration_days(&self) -> u64 {
        self.duration_days
    }

    /// Check whether the product can be subscribed to
    pub fn active(&self) -> bool {
        self.active
    }

    /// Render the price for display, e.g. `"19.99 USDC"`
    pub fn formatted_price(&self) -> String {
        money::format_usdc(self.price)
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}

/// Errors that can occur while validating a product draft
#[derive(Debug, Error, PartialEq)]
pub enum DraftError {
    #[error("Product name must not be empty")]
    EmptyName,

    #[error("Invalid price: {0}")]
    InvalidPrice(#[from] MoneyError),

    #[error("Price must be greater than zero")]
    ZeroPrice,

    #[error("Invalid duration: {input}")]
    InvalidDuration { input: String },

    #[error("Duration must be at least one day")]
    ZeroDuration,
}

/// Raw merchant form input for a new product.
///
/// Field contents are the literal strings the merchant typed. Nothing here
/// is validated until [`ProductDraft::parse`] runs.
///
/// # Example
/// ```
/// use substream_core_rs::models::product::ProductDraft;
///
/// let draft = ProductDraft {
///     name: "X".to_string(),
///     price: "19.99".to_string(),
///     duration: "30".to_string(),
/// };
///
/// let new_product = draft.parse().unwrap();
/// assert_eq!(new_product.price, 19_990_000);
/// assert_eq!(new_product.duration_days, 30);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDraft {
    /// Product name as typed
    pub name: String,

    /// Price as typed, e.g. "19.99"
    pub price: String,

    /// Duration in days as typed, e.g. "30"
    pub duration: String,
}

impl Default for ProductDraft {
    fn default() -> Self {
        // Fresh form starts with a 30-day duration prefilled
        Self {
            name: String::new(),
            price: String::new(),
            duration: "30".to_string(),
        }
    }
}

/// Validated create-product arguments
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    /// Product name, trimmed
    pub name: String,

    /// Price in smallest settlement units, `floor(entered * 1_000_000)`
    pub price: i64,

    /// Duration in whole days
    pub duration_days: u64,
}

impl ProductDraft {
    /// Validate the draft and convert it into typed write arguments.
    ///
    /// The price string is converted with [`money::to_smallest_unit`],
    /// so `"19.99"` becomes `19_990_000`. The duration must parse as a
    /// positive whole number of days.
    pub fn parse(&self) -> Result<NewProduct, DraftError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DraftError::EmptyName);
        }

        let price = money::to_smallest_unit(&self.price)?;
        if price <= 0 {
            return Err(DraftError::ZeroPrice);
        }

        let duration_days: u64 =
            self.duration
                .trim()
                .parse()
                .map_err(|_| DraftError::InvalidDuration {
                    input: self.duration.clone(),
                })?;
        if duration_days == 0 {
            return Err(DraftError::ZeroDuration);
        }

        Ok(NewProduct {
            name: name.to_string(),
            price,
            duration_days,
        })
    }
}
