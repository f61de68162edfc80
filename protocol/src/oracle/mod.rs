//! # Oracle Module: External Price Quotes
//!
//! ```text
//! feed.rs    : PriceFeed trait, RawQuote, FixedPriceFeed
//! adapter.rs : PriceOracleAdapter: validation, normalization, conversion
//! ```
//!
//! Quotes are fetched fresh on every use and never persisted.

pub mod adapter;
pub mod feed;

use thiserror::Error;

pub use adapter::{normalize_price, quote_value, PriceOracleAdapter, PriceQuote};
pub use feed::{FixedPriceFeed, PriceFeed, RawQuote};

/// Errors produced while reading or validating a price.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// The quote is too old, or its update never completed.
    #[error("stale quote: {0}")]
    Stale(String),

    /// The quote is not a usable positive price.
    #[error("invalid quote: {0}")]
    Invalid(String),

    /// The upstream feed could not be read at all.
    #[error("feed unavailable: {0}")]
    Unavailable(String),

    /// Scaling or conversion overflowed.
    #[error("price arithmetic overflow")]
    Overflow,
}
