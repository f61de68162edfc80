//! Upstream price feeds.
//!
//! A [`PriceFeed`] exposes a single "latest quote" read. The quote is
//! reported exactly as the upstream publishes it: a signed answer with its
//! own decimal scale, a timestamp, and the round sequence numbers used to
//! detect an update that started but never completed. Validation and
//! normalization happen in [`super::adapter`], never here.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::OracleError;

/// A quote exactly as the upstream feed reports it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawQuote {
    /// Signed price answer at `decimals` decimal places. Upstream feeds are
    /// free to report zero or negative answers; the adapter rejects them.
    pub answer: i128,
    /// Decimal scale of `answer`.
    pub decimals: u8,
    /// When the upstream observed this price.
    pub observed_at: DateTime<Utc>,
    /// Sequence number of the round in which the update started.
    pub started_seq: u64,
    /// Sequence number of the round in which the update completed.
    pub completed_seq: u64,
}

impl RawQuote {
    /// A quote whose update started and completed in the same round.
    pub fn settled(answer: i128, decimals: u8, observed_at: DateTime<Utc>, seq: u64) -> Self {
        Self {
            answer,
            decimals,
            observed_at,
            started_seq: seq,
            completed_seq: seq,
        }
    }
}

/// Source of the latest raw price quote.
pub trait PriceFeed: Send + Sync {
    /// Reads the latest quote.
    fn latest_quote(&self) -> Result<RawQuote, OracleError>;

    /// Human-readable label for logs and change notifications.
    fn description(&self) -> String {
        "price feed".to_string()
    }
}

/// A feed that reports whatever quote was last pushed into it.
///
/// Used by the operator node when replaying scenarios and by tests that
/// need to move the price or age the quote between calls.
#[derive(Debug)]
pub struct FixedPriceFeed {
    label: String,
    quote: RwLock<RawQuote>,
}

impl FixedPriceFeed {
    /// Creates a feed reporting `quote`.
    pub fn new(label: impl Into<String>, quote: RawQuote) -> Self {
        Self {
            label: label.into(),
            quote: RwLock::new(quote),
        }
    }

    /// Replaces the reported quote wholesale.
    pub fn set_quote(&self, quote: RawQuote) {
        *self.quote.write() = quote;
    }

    /// Publishes a new answer in a fresh, completed round.
    pub fn push_answer(&self, answer: i128, observed_at: DateTime<Utc>) {
        let mut quote = self.quote.write();
        let seq = quote.completed_seq.max(quote.started_seq) + 1;
        quote.answer = answer;
        quote.observed_at = observed_at;
        quote.started_seq = seq;
        quote.completed_seq = seq;
    }

    /// Returns a copy of the currently reported quote.
    pub fn current(&self) -> RawQuote {
        self.quote.read().clone()
    }
}

impl PriceFeed for FixedPriceFeed {
    fn latest_quote(&self) -> Result<RawQuote, OracleError> {
        Ok(self.current())
    }

    fn description(&self) -> String {
        self.label.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_answer_opens_new_round() {
        let now = Utc::now();
        let feed = FixedPriceFeed::new("NATIVE/USD", RawQuote::settled(100, 8, now, 7));
        feed.push_answer(200, now);

        let quote = feed.latest_quote().unwrap();
        assert_eq!(quote.answer, 200);
        assert_eq!(quote.started_seq, 8);
        assert_eq!(quote.completed_seq, 8);
        assert_eq!(feed.description(), "NATIVE/USD");
    }

    #[test]
    fn quote_serialization_roundtrip() {
        let quote = RawQuote::settled(250_000_000_000, 8, Utc::now(), 1);
        let json = serde_json::to_string(&quote).unwrap();
        let back: RawQuote = serde_json::from_str(&json).unwrap();
        assert_eq!(back, quote);
    }
}
