//! # Ledger Configuration & Constants
//!
//! Every magic number in Strongbox lives here. If you're hardcoding a
//! constant somewhere else, you're doing it wrong.
//!
//! The constants feed the defaults of [`VaultConfig`], which is fixed at
//! vault construction. Only the native capacity can change afterwards, and
//! only through an administrator call.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ledger::{Amount, Capacity};

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// The library version string reported by tooling.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Decimal Scales
// ---------------------------------------------------------------------------

/// Decimal places of every normalized price. Feeds reporting more decimals
/// are truncated down to this scale; feeds reporting fewer are scaled up.
pub const PRICE_DECIMALS: u8 = 8;

/// `10^PRICE_DECIMALS`, handy for writing human-readable prices in tests.
pub const PRICE_SCALE: u128 = 100_000_000;

/// Decimal places of the native asset's smallest unit (wei-equivalent).
pub const NATIVE_DECIMALS: u8 = 18;

/// One whole native unit in smallest units.
pub const NATIVE_UNIT: Amount = 1_000_000_000_000_000_000;

// ---------------------------------------------------------------------------
// Oracle Parameters
// ---------------------------------------------------------------------------

/// Quotes older than this are rejected. One hour matches the heartbeat of
/// the slower reference feeds.
pub const MAX_PRICE_STALENESS: Duration = Duration::from_secs(3_600);

/// Future-dated quotes within this tolerance are accepted as fresh. Feeds
/// and hosts disagree about wall-clock time by a few hundred milliseconds.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// Withdrawal Limits
// ---------------------------------------------------------------------------

/// Default ceiling on the quote-currency value of a single native
/// withdrawal: 1,000.00000000 at the 8-decimal price scale.
pub const MAX_WITHDRAWAL_QUOTE_VALUE: u128 = 1_000 * PRICE_SCALE;

/// Default per-transaction native withdrawal limit: 10 native units.
pub const DEFAULT_PER_TX_LIMIT: Amount = 10 * NATIVE_UNIT;

/// Default native capacity: 1,000 native units.
pub const DEFAULT_NATIVE_CAPACITY: Amount = 1_000 * NATIVE_UNIT;

/// Basis-point denominator used for transfer fees.
pub const BPS_DENOMINATOR: u128 = 10_000;

// ---------------------------------------------------------------------------
// VaultConfig
// ---------------------------------------------------------------------------

/// Initialization parameters for a custody vault.
///
/// Everything except `native_capacity` is immutable once the vault exists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Initial capacity of the native asset.
    pub native_capacity: Capacity,

    /// Largest native amount a single withdrawal may request.
    pub per_tx_limit: Amount,

    /// Largest quote-currency value (8 decimals) a single native
    /// withdrawal may be worth.
    pub max_withdrawal_quote_value: u128,

    /// Maximum accepted age of a price quote, in seconds.
    pub max_price_staleness_secs: u64,
}

impl VaultConfig {
    /// Returns the staleness window as a [`Duration`].
    pub fn max_price_staleness(&self) -> Duration {
        Duration::from_secs(self.max_price_staleness_secs)
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            native_capacity: Capacity::Limited(DEFAULT_NATIVE_CAPACITY),
            per_tx_limit: DEFAULT_PER_TX_LIMIT,
            max_withdrawal_quote_value: MAX_WITHDRAWAL_QUOTE_VALUE,
            max_price_staleness_secs: MAX_PRICE_STALENESS.as_secs(),
        }
    }
}
