//! Error types for ledger operations.
//!
//! Every operation that can fail returns a [`LedgerError`]. The variants
//! form the complete failure taxonomy surfaced to callers: an error always
//! aborts the whole operation and nothing it did before failing survives.

use thiserror::Error;

use crate::access::Role;
use crate::custody::TransferError;
use crate::ledger::{Address, Amount, AssetId};
use crate::oracle::OracleError;

/// Errors that can occur while operating on the ledger.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The caller lacks the role the operation requires.
    #[error("unauthorized: {principal} does not hold the {role} role")]
    Unauthorized {
        /// The principal that attempted the call.
        principal: Address,
        /// The role the operation requires.
        role: Role,
    },

    /// Zero or otherwise disallowed amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(&'static str),

    /// The null identity was supplied where a real principal is required.
    #[error("invalid identity: the null address cannot hold or receive value")]
    InvalidIdentity,

    /// Crediting would push the asset total above its capacity.
    #[error("capacity exceeded: available {available}, requested {requested}")]
    CapacityExceeded {
        /// Room left under the capacity.
        available: Amount,
        /// The amount that was requested.
        requested: Amount,
    },

    /// A new finite capacity would sit below what the ledger already holds.
    #[error("capacity {requested} is below the current total {total} (asset {asset})")]
    CapacityBelowTotal {
        /// The asset being configured.
        asset: AssetId,
        /// The asset's current total balance.
        total: Amount,
        /// The capacity that was requested.
        requested: Amount,
    },

    /// The per-transaction withdrawal limit was breached.
    #[error("limit exceeded: requested {requested}, limit {limit}")]
    LimitExceeded {
        /// The amount that was requested.
        requested: Amount,
        /// The configured per-transaction limit.
        limit: Amount,
    },

    /// The quote-converted value exceeds the withdrawal value ceiling.
    #[error("value cap exceeded: withdrawal is worth {quoted}, cap is {cap}")]
    ValueCapExceeded {
        /// Quote-currency value of the withdrawal (8 decimals).
        quoted: u128,
        /// The configured ceiling (8 decimals).
        cap: u128,
    },

    /// Attempted to debit more than the account holds.
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        /// The current balance.
        available: Amount,
        /// The amount that was requested.
        requested: Amount,
    },

    /// Custody does not hold enough unaccounted value to back a credit.
    #[error("unbacked credit: custody surplus {surplus}, requested {requested}")]
    UnbackedCredit {
        /// Custody holdings minus the ledger total.
        surplus: Amount,
        /// The amount that was requested.
        requested: Amount,
    },

    /// External custody movement did not complete.
    #[error("transfer failed: {0}")]
    TransferFailed(#[from] TransferError),

    /// The price quote is too old or never finished updating.
    #[error("stale price: {0}")]
    StalePrice(String),

    /// The price quote is not a usable positive price.
    #[error("invalid price: {0}")]
    InvalidPrice(String),

    /// Checked arithmetic overflowed. Someone is feeding us numbers no real
    /// asset can reach.
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),
}

impl From<OracleError> for LedgerError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::Stale(reason) => LedgerError::StalePrice(reason),
            OracleError::Invalid(reason) | OracleError::Unavailable(reason) => {
                LedgerError::InvalidPrice(reason)
            }
            OracleError::Overflow => LedgerError::Overflow("price conversion"),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type LedgerResult<T> = Result<T, LedgerError>;
