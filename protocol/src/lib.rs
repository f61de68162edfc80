// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Strongbox Protocol: Core Library
//!
//! The accounting core of a custodial, multi-asset balance ledger. Principals
//! deposit and withdraw value into per-asset accounts; administrators set
//! capacity ceilings; a recovery role corrects misattributed funds. None of
//! that is allowed to break the books.
//!
//! ## Architecture
//!
//! - **ledger**: Per-principal, per-asset balances and aggregate totals.
//! - **oracle**: Price quotes: validation, decimal normalization, conversion.
//! - **access**: Role registry. Injected, never global.
//! - **custody**: The external value mover, and an in-memory stand-in.
//! - **policy**: Per-transaction and value-denominated withdrawal ceilings.
//! - **config**: Constants and the vault configuration record.
//! - **error**: The failure taxonomy every operation reports through.
//!
//! ## Design Philosophy
//!
//! 1. Invariants are prevented, not repaired: every precondition is checked
//!    before the first byte of state changes.
//! 2. Checked arithmetic everywhere. An overflow is an error, not a wrap.
//! 3. Collaborators (roles, prices, custody) are traits handed in by the
//!    caller, so the core never reaches for ambient state.
//! 4. If it touches money, it has tests. Plural.

pub mod access;
pub mod config;
pub mod custody;
pub mod error;
pub mod ledger;
pub mod oracle;
pub mod policy;

pub use error::{LedgerError, LedgerResult};
