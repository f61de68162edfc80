//! Capacity limits and per-asset aggregate totals.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Amount;

/// Maximum total balance an asset may hold.
///
/// `Limited(0)` is a hard zero cap that rejects every credit. It is never
/// shorthand for "no limit"; that is what `Unlimited` is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capacity {
    /// No ceiling on the asset total.
    Unlimited,
    /// The asset total may never exceed this amount.
    Limited(Amount),
}

impl Capacity {
    /// Room left under this capacity for an asset currently holding
    /// `total`. `None` means unbounded.
    pub fn headroom(&self, total: Amount) -> Option<Amount> {
        match self {
            Capacity::Unlimited => None,
            Capacity::Limited(cap) => Some(cap.saturating_sub(total)),
        }
    }

    /// Returns `true` if an asset holding `total` may accept `amount` more.
    pub fn admits(&self, total: Amount, amount: Amount) -> bool {
        match self.headroom(total) {
            None => true,
            Some(room) => amount <= room,
        }
    }
}

impl Default for Capacity {
    fn default() -> Self {
        Capacity::Unlimited
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capacity::Unlimited => write!(f, "unlimited"),
            Capacity::Limited(cap) => write!(f, "{}", cap),
        }
    }
}

/// Aggregate bookkeeping for one asset.
///
/// `total_balance` always equals the sum of every account balance for the
/// asset, and never exceeds a finite `capacity`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetTotals {
    /// Sum of all account balances for the asset.
    pub total_balance: Amount,
    /// Configured ceiling for `total_balance`.
    pub capacity: Capacity,
}
