//! # Asset Ledger
//!
//! The authoritative record of per-principal, per-asset balances and the
//! aggregate totals that sit on top of them. Two invariants hold after every
//! call, successful or not:
//!
//! 1. **Conservation** -- `total_balance(asset)` equals the sum of every
//!    account balance for that asset.
//! 2. **Capacity** -- `total_balance(asset) <= capacity(asset)` whenever the
//!    capacity is finite.
//!
//! Every operation validates all of its preconditions before it touches a
//! single map entry, so a failed call leaves the ledger exactly as it found
//! it. There is no repair path: invariant violations are prevented, not
//! detected.
//!
//! Accounts are lazy. Reading a principal that has never been credited
//! yields zero, and an account debited down to zero is dropped again, so
//! "absent" and "zero" are the same state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::capacity::{AssetTotals, Capacity};
use super::ids::{Address, AssetId};
use super::Amount;
use crate::error::{LedgerError, LedgerResult};

/// Per-asset, per-principal balance book.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetLedger {
    /// `asset -> (principal -> balance)`. Zero balances are never stored.
    accounts: BTreeMap<AssetId, BTreeMap<Address, Amount>>,
    /// Aggregate totals and capacity per asset.
    totals: BTreeMap<AssetId, AssetTotals>,
}

/// A read-only view of one asset's books, suitable for reporting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSnapshot {
    /// The asset.
    pub asset: AssetId,
    /// Sum of all balances.
    pub total_balance: Amount,
    /// Configured capacity.
    pub capacity: Capacity,
    /// Every non-zero account, ordered by address.
    pub accounts: Vec<(Address, Amount)>,
}

impl AssetLedger {
    /// Creates an empty ledger. Every asset starts out unlimited.
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    /// Sets the capacity of `asset`, returning the previous value.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::CapacityBelowTotal`] if a finite capacity would
    /// sit below what the asset already holds.
    pub fn set_capacity(&mut self, asset: AssetId, capacity: Capacity) -> LedgerResult<Capacity> {
        let total = self.total_of(&asset);
        if let Capacity::Limited(cap) = capacity {
            if cap < total {
                return Err(LedgerError::CapacityBelowTotal {
                    asset,
                    total,
                    requested: cap,
                });
            }
        }

        let totals = self.totals.entry(asset).or_default();
        let previous = totals.capacity;
        totals.capacity = capacity;
        Ok(previous)
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Credits `amount` of new money to `principal`, returning the new
    /// balance.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] if `amount` is zero.
    /// - [`LedgerError::InvalidIdentity`] for the null address.
    /// - [`LedgerError::CapacityExceeded`] if the asset total would pass its
    ///   capacity.
    /// - [`LedgerError::Overflow`] if the total would not fit in an `Amount`.
    pub fn credit(
        &mut self,
        principal: Address,
        asset: AssetId,
        amount: Amount,
    ) -> LedgerResult<Amount> {
        require_positive(amount)?;
        require_identity(&principal)?;

        let totals = self.totals_of(&asset);
        if let Some(available) = totals.capacity.headroom(totals.total_balance) {
            if amount > available {
                return Err(LedgerError::CapacityExceeded {
                    available,
                    requested: amount,
                });
            }
        }

        let new_total = totals
            .total_balance
            .checked_add(amount)
            .ok_or(LedgerError::Overflow("asset total"))?;
        let new_balance = self
            .balance_of(&principal, &asset)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow("account balance"))?;

        self.totals.entry(asset).or_default().total_balance = new_total;
        self.store_balance(principal, asset, new_balance);
        Ok(new_balance)
    }

    /// Debits `amount` from `principal`, returning the remaining balance.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] if `amount` is zero.
    /// - [`LedgerError::InvalidIdentity`] for the null address.
    /// - [`LedgerError::InsufficientBalance`] if the account holds less than
    ///   `amount`.
    pub fn debit(
        &mut self,
        principal: Address,
        asset: AssetId,
        amount: Amount,
    ) -> LedgerResult<Amount> {
        require_positive(amount)?;
        require_identity(&principal)?;

        let available = self.balance_of(&principal, &asset);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                available,
                requested: amount,
            });
        }

        // balance <= total, so neither subtraction can underflow.
        let remaining = available - amount;
        let totals = self.totals.entry(asset).or_default();
        totals.total_balance -= amount;
        self.store_balance(principal, asset, remaining);
        Ok(remaining)
    }

    /// Moves already-accounted value from one principal to another.
    ///
    /// The asset total does not change and capacity is not consulted:
    /// capacity limits new money entering the ledger, not redistribution of
    /// money it already holds. `from == to` passes the balance check and
    /// then does nothing.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] if `amount` is zero.
    /// - [`LedgerError::InvalidIdentity`] if either side is the null address.
    /// - [`LedgerError::InsufficientBalance`] if `from` holds less than
    ///   `amount`.
    pub fn transfer_internal(
        &mut self,
        from: Address,
        to: Address,
        asset: AssetId,
        amount: Amount,
    ) -> LedgerResult<()> {
        require_positive(amount)?;
        require_identity(&from)?;
        require_identity(&to)?;

        let available = self.balance_of(&from, &asset);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                available,
                requested: amount,
            });
        }
        if from == to {
            return Ok(());
        }

        let receiver = self
            .balance_of(&to, &asset)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow("account balance"))?;

        self.store_balance(from, asset, available - amount);
        self.store_balance(to, asset, receiver);
        Ok(())
    }

    /// Credits value that reached custody through a side channel.
    ///
    /// `externally_held` is the amount custody verifiably holds for the
    /// asset. The credit is accepted only if the prospective total fits
    /// under both the capacity and that holding, so the ledger never
    /// records balance that no real value backs.
    ///
    /// # Errors
    ///
    /// Everything [`credit`](Self::credit) returns, plus
    /// [`LedgerError::UnbackedCredit`] when custody holds less unaccounted
    /// value than `amount`.
    pub fn inject_external(
        &mut self,
        principal: Address,
        asset: AssetId,
        amount: Amount,
        externally_held: Amount,
    ) -> LedgerResult<Amount> {
        require_positive(amount)?;
        require_identity(&principal)?;

        let totals = self.totals_of(&asset);
        if let Some(available) = totals.capacity.headroom(totals.total_balance) {
            if amount > available {
                return Err(LedgerError::CapacityExceeded {
                    available,
                    requested: amount,
                });
            }
        }

        let surplus = externally_held.saturating_sub(totals.total_balance);
        if amount > surplus {
            return Err(LedgerError::UnbackedCredit {
                surplus,
                requested: amount,
            });
        }

        self.credit(principal, asset, amount)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Balance of `principal` in `asset`. Unknown accounts read as zero.
    pub fn balance_of(&self, principal: &Address, asset: &AssetId) -> Amount {
        self.accounts
            .get(asset)
            .and_then(|book| book.get(principal))
            .copied()
            .unwrap_or(0)
    }

    /// Aggregate total of `asset`.
    pub fn total_of(&self, asset: &AssetId) -> Amount {
        self.totals_of(asset).total_balance
    }

    /// Configured capacity of `asset`.
    pub fn capacity_of(&self, asset: &AssetId) -> Capacity {
        self.totals_of(asset).capacity
    }

    /// Room left under the capacity of `asset`; `None` when unlimited.
    pub fn available_capacity(&self, asset: &AssetId) -> Option<Amount> {
        let totals = self.totals_of(asset);
        totals.capacity.headroom(totals.total_balance)
    }

    /// Totals record for `asset`, defaulted if the asset was never touched.
    pub fn totals_of(&self, asset: &AssetId) -> AssetTotals {
        self.totals.get(asset).copied().unwrap_or_default()
    }

    /// Sum of every account balance for `asset`, computed by a full scan.
    ///
    /// Never used on the hot path; tests and audits compare it against
    /// [`total_of`](Self::total_of).
    pub fn sum_of_balances(&self, asset: &AssetId) -> Amount {
        self.accounts
            .get(asset)
            .map(|book| book.values().sum())
            .unwrap_or(0)
    }

    /// Every non-zero account for `asset`, ordered by address.
    pub fn accounts_of(&self, asset: &AssetId) -> Vec<(Address, Amount)> {
        self.accounts
            .get(asset)
            .map(|book| book.iter().map(|(a, b)| (*a, *b)).collect())
            .unwrap_or_default()
    }

    /// Every asset the ledger has configured or credited.
    pub fn assets(&self) -> Vec<AssetId> {
        self.totals.keys().copied().collect()
    }

    /// Reporting view of every known asset.
    pub fn snapshot(&self) -> Vec<AssetSnapshot> {
        self.totals
            .iter()
            .map(|(asset, totals)| AssetSnapshot {
                asset: *asset,
                total_balance: totals.total_balance,
                capacity: totals.capacity,
                accounts: self.accounts_of(asset),
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Internal Helpers
    // -----------------------------------------------------------------------

    fn store_balance(&mut self, principal: Address, asset: AssetId, balance: Amount) {
        if balance == 0 {
            if let Some(book) = self.accounts.get_mut(&asset) {
                book.remove(&principal);
                if book.is_empty() {
                    self.accounts.remove(&asset);
                }
            }
        } else {
            self.accounts
                .entry(asset)
                .or_default()
                .insert(principal, balance);
        }
    }
}

/// Rejects a zero amount.
pub fn require_positive(amount: Amount) -> LedgerResult<()> {
    if amount == 0 {
        return Err(LedgerError::InvalidAmount("amount must be greater than zero"));
    }
    Ok(())
}

/// Rejects the null address.
pub fn require_identity(principal: &Address) -> LedgerResult<()> {
    if principal.is_zero() {
        return Err(LedgerError::InvalidIdentity);
    }
    Ok(())
}
