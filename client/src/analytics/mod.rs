//! Merchant analytics aggregation
//!
//! Pure functions over per-product analytics records. Nothing here reads
//! the ledger or mutates engine state: callers pass the cached analytics
//! slice and get derived numbers back, so the same inputs always produce
//! the same dashboard.
//!
//! All revenue values stay in smallest settlement units (i64) except at
//! the chart boundary, where they are converted to whole-token floats for
//! display.

use crate::core::money::from_smallest_unit;
use crate::models::analytics::ProductAnalytics;
use serde::Serialize;

/// Growth badge for one product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GrowthTrend {
    Growing,
    Declining,
}

impl GrowthTrend {
    pub fn is_growing(&self) -> bool {
        matches!(self, GrowthTrend::Growing)
    }

    /// Badge text shown next to the product
    pub fn label(&self) -> &'static str {
        match self {
            GrowthTrend::Growing => "Growing",
            GrowthTrend::Declining => "Declining",
        }
    }
}

/// One bar of the revenue chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    /// Axis label ("Product {id}")
    pub label: String,

    /// Revenue in whole tokens, for display only
    pub revenue: f64,
}

/// Headline numbers for the merchant dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MerchantSummary {
    /// Lifetime revenue across all products (smallest units)
    pub total_revenue: i64,

    /// Current subscribers across all products
    pub active_subscribers: u64,

    /// Number of listed products
    pub products: usize,

    /// Whether any product currently has subscribers
    pub any_growing: bool,
}

/// Sum lifetime revenue across products (smallest units)
pub fn total_revenue(products: &[ProductAnalytics]) -> i64 {
    products.iter().map(|p| p.total_revenue).sum()
}

/// Sum current subscribers across products
pub fn total_active_subscribers(products: &[ProductAnalytics]) -> u64 {
    products.iter().map(|p| p.active_subscribers).sum()
}

/// Classify one product: growing while it holds any active subscriber
pub fn growth_classification(product: &ProductAnalytics) -> GrowthTrend {
    if product.active_subscribers > 0 {
        GrowthTrend::Growing
    } else {
        GrowthTrend::Declining
    }
}

/// Check whether any product is currently growing
pub fn any_growing(products: &[ProductAnalytics]) -> bool {
    products
        .iter()
        .any(|p| growth_classification(p).is_growing())
}

/// Build the revenue chart series, one point per product in input order
pub fn chart_series(products: &[ProductAnalytics]) -> Vec<ChartPoint> {
    products
        .iter()
        .map(|p| ChartPoint {
            label: format!("Product {}", p.product_id),
            revenue: from_smallest_unit(p.total_revenue),
        })
        .collect()
}

/// Aggregate the headline numbers in one pass over the cached slice
///
/// # Example
/// ```
/// use substream_core_rs::analytics::merchant_summary;
/// use substream_core_rs::models::ProductAnalytics;
///
/// let mut news = ProductAnalytics::new(1);
/// news.total_revenue = 39_980_000;
/// news.active_subscribers = 2;
///
/// let summary = merchant_summary(&[news, ProductAnalytics::new(2)]);
/// assert_eq!(summary.total_revenue, 39_980_000);
/// assert_eq!(summary.active_subscribers, 2);
/// assert_eq!(summary.products, 2);
/// assert!(summary.any_growing);
/// ```
pub fn merchant_summary(products: &[ProductAnalytics]) -> MerchantSummary {
    MerchantSummary {
        total_revenue: total_revenue(products),
        active_subscribers: total_active_subscribers(products),
        products: products.len(),
        any_growing: any_growing(products),
    }
}
