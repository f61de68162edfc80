//! # Price Oracle Adapter
//!
//! Turns a raw upstream quote into a trusted, normalized price. A quote is
//! accepted only if all of the following hold:
//!
//! 1. the update that produced it completed (`completed_seq >= started_seq`);
//! 2. it is no older than the configured staleness window, and not dated
//!    further into the future than [`MAX_CLOCK_SKEW`];
//! 3. its answer is strictly positive, before and after normalization.
//!
//! Normalization rescales the answer to [`PRICE_DECIMALS`]. Feeds with more
//! decimals are truncated, never rounded up: the adapter may understate a
//! value but must never overstate it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::feed::{PriceFeed, RawQuote};
use super::OracleError;
use crate::config::{MAX_CLOCK_SKEW, NATIVE_UNIT, PRICE_DECIMALS};
use crate::ledger::Amount;

/// A validated quote at the 8-decimal price scale.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Normalized price, strictly positive.
    pub price: u128,
    /// When the upstream observed this price.
    pub observed_at: DateTime<Utc>,
    /// Round in which the update started.
    pub started_seq: u64,
    /// Round in which the update completed.
    pub completed_seq: u64,
}

/// Reads, validates and normalizes prices from a [`PriceFeed`].
#[derive(Clone)]
pub struct PriceOracleAdapter {
    feed: Arc<dyn PriceFeed>,
    max_staleness: Duration,
}

impl std::fmt::Debug for PriceOracleAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceOracleAdapter")
            .field("feed", &self.feed.description())
            .field("max_staleness", &self.max_staleness)
            .finish()
    }
}

impl PriceOracleAdapter {
    /// Wraps `feed`, rejecting quotes older than `max_staleness`.
    pub fn new(feed: Arc<dyn PriceFeed>, max_staleness: Duration) -> Self {
        Self {
            feed,
            max_staleness,
        }
    }

    /// Swaps the upstream feed, returning the previous one.
    pub fn set_feed(&mut self, feed: Arc<dyn PriceFeed>) -> Arc<dyn PriceFeed> {
        std::mem::replace(&mut self.feed, feed)
    }

    /// Label of the current upstream feed.
    pub fn feed_description(&self) -> String {
        self.feed.description()
    }

    /// The configured staleness window.
    pub fn max_staleness(&self) -> Duration {
        self.max_staleness
    }

    /// Reads and validates the latest quote against the wall clock.
    pub fn latest_quote(&self) -> Result<PriceQuote, OracleError> {
        self.latest_quote_at(Utc::now())
    }

    /// Reads and validates the latest quote as of `now`.
    pub fn latest_quote_at(&self, now: DateTime<Utc>) -> Result<PriceQuote, OracleError> {
        let raw = self.feed.latest_quote()?;
        let quote = self.validate(raw, now)?;
        debug!(
            price = %quote.price,
            completed_seq = quote.completed_seq,
            feed = %self.feed.description(),
            "price quote accepted"
        );
        Ok(quote)
    }

    /// Latest normalized price.
    pub fn latest_price(&self) -> Result<u128, OracleError> {
        self.latest_quote().map(|q| q.price)
    }

    /// Latest normalized price as of `now`.
    pub fn latest_price_at(&self, now: DateTime<Utc>) -> Result<u128, OracleError> {
        self.latest_quote_at(now).map(|q| q.price)
    }

    /// Quote-currency value of `native_amount` at the latest price.
    pub fn convert_to_quote(&self, native_amount: Amount) -> Result<u128, OracleError> {
        self.convert_to_quote_at(native_amount, Utc::now())
    }

    /// Quote-currency value of `native_amount` at the price valid at `now`.
    pub fn convert_to_quote_at(
        &self,
        native_amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<u128, OracleError> {
        let price = self.latest_price_at(now)?;
        quote_value(native_amount, price)
    }

    fn validate(&self, raw: RawQuote, now: DateTime<Utc>) -> Result<PriceQuote, OracleError> {
        if raw.completed_seq < raw.started_seq {
            return Err(OracleError::Stale(format!(
                "update started in round {} but last completed in round {}",
                raw.started_seq, raw.completed_seq
            )));
        }

        match (now - raw.observed_at).to_std() {
            Ok(age) if age > self.max_staleness => {
                return Err(OracleError::Stale(format!(
                    "quote is {}s old, window is {}s",
                    age.as_secs(),
                    self.max_staleness.as_secs()
                )));
            }
            Ok(_) => {}
            Err(_) => {
                // Negative age: the quote claims to come from the future.
                let ahead = (raw.observed_at - now).to_std().unwrap_or(Duration::MAX);
                if ahead > MAX_CLOCK_SKEW {
                    return Err(OracleError::Invalid(format!(
                        "quote is dated {}ms in the future",
                        ahead.as_millis()
                    )));
                }
            }
        }

        if raw.answer <= 0 {
            return Err(OracleError::Invalid(format!(
                "answer must be positive, got {}",
                raw.answer
            )));
        }

        let price = normalize_price(raw.answer.unsigned_abs(), raw.decimals)?;
        Ok(PriceQuote {
            price,
            observed_at: raw.observed_at,
            started_seq: raw.started_seq,
            completed_seq: raw.completed_seq,
        })
    }
}

/// Rescales `answer` from `decimals` to [`PRICE_DECIMALS`].
///
/// # Errors
///
/// [`OracleError::Invalid`] if the result is zero (a tiny price truncated
/// away, or a scale so large that nothing survives), and
/// [`OracleError::Overflow`] if scaling up does not fit.
pub fn normalize_price(answer: u128, decimals: u8) -> Result<u128, OracleError> {
    let target = PRICE_DECIMALS as u32;
    let source = decimals as u32;

    let price = if source == target {
        answer
    } else if source > target {
        // 10^39 no longer fits in u128; anything divided by it is zero.
        match 10u128.checked_pow(source - target) {
            Some(divisor) => answer / divisor,
            None => 0,
        }
    } else {
        10u128
            .checked_pow(target - source)
            .and_then(|factor| answer.checked_mul(factor))
            .ok_or(OracleError::Overflow)?
    };

    if price == 0 {
        return Err(OracleError::Invalid(format!(
            "answer {} at {} decimals normalizes to zero",
            answer, decimals
        )));
    }
    Ok(price)
}

/// `native_amount * price / 10^18`, truncating.
pub fn quote_value(native_amount: Amount, price: u128) -> Result<u128, OracleError> {
    native_amount
        .checked_mul(price)
        .map(|scaled| scaled / NATIVE_UNIT)
        .ok_or(OracleError::Overflow)
}
