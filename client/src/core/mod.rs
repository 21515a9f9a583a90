//! Foundational helpers shared across the client core.

pub mod money;
