//! # Withdrawal Policy
//!
//! Ceilings on native-asset withdrawals. Two limits apply, cheapest first:
//!
//! 1. a per-transaction limit on the raw amount, checked without touching
//!    the oracle;
//! 2. a ceiling on the quote-currency value of the withdrawal, which needs
//!    a fresh, validated price.
//!
//! Token withdrawals are not value-capped and never reach this module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::VaultConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::Amount;
use crate::oracle::PriceOracleAdapter;

/// Fixed withdrawal ceilings, set once at vault construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalPolicy {
    per_tx_limit: Amount,
    max_quote_value: u128,
}

impl WithdrawalPolicy {
    /// Creates a policy with explicit ceilings.
    pub fn new(per_tx_limit: Amount, max_quote_value: u128) -> Self {
        Self {
            per_tx_limit,
            max_quote_value,
        }
    }

    /// Builds the policy from a vault configuration.
    pub fn from_config(config: &VaultConfig) -> Self {
        Self::new(config.per_tx_limit, config.max_withdrawal_quote_value)
    }

    /// Largest native amount a single withdrawal may request.
    pub fn per_tx_limit(&self) -> Amount {
        self.per_tx_limit
    }

    /// Largest quote-currency value a single withdrawal may be worth.
    pub fn max_quote_value(&self) -> u128 {
        self.max_quote_value
    }

    /// Checks a native withdrawal of `amount` as of `now`, returning its
    /// quote-currency value.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] for zero.
    /// - [`LedgerError::LimitExceeded`] above the per-transaction limit; the
    ///   oracle is not consulted.
    /// - [`LedgerError::StalePrice`] / [`LedgerError::InvalidPrice`] if the
    ///   quote fails validation.
    /// - [`LedgerError::ValueCapExceeded`] above the value ceiling.
    pub fn check_native(
        &self,
        amount: Amount,
        oracle: &PriceOracleAdapter,
        now: DateTime<Utc>,
    ) -> LedgerResult<u128> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount("amount must be greater than zero"));
        }
        if amount > self.per_tx_limit {
            return Err(LedgerError::LimitExceeded {
                requested: amount,
                limit: self.per_tx_limit,
            });
        }

        let quoted = oracle.convert_to_quote_at(amount, now)?;
        if quoted > self.max_quote_value {
            return Err(LedgerError::ValueCapExceeded {
                quoted,
                cap: self.max_quote_value,
            });
        }
        Ok(quoted)
    }
}
