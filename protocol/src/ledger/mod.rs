//! # Ledger Module: Per-Asset Balance Bookkeeping
//!
//! The ledger is where money lives in Strongbox. Every deposit, withdrawal
//! and recovery correction ends up as a credit or debit here.
//!
//! ## Architecture
//!
//! ```text
//! ids.rs      : Address and AssetId handles
//! capacity.rs : Capacity ceilings and per-asset totals
//! book.rs     : AssetLedger: credit, debit, internal transfer, injection
//! ```
//!
//! ## Design Principles
//!
//! 1. **All amounts are `u128` in smallest-unit denomination.** The native
//!    asset has 18 decimals, which overflows `u64` at about 18 whole units.
//! 2. **Checked arithmetic only.** Wrapping arithmetic and money do not mix.
//! 3. **Validate first, then mutate.** No operation leaves a half-applied
//!    change behind when it fails.

pub mod book;
pub mod capacity;
pub mod ids;

/// Amount of an asset in its smallest unit.
pub type Amount = u128;

pub use book::{require_identity, require_positive, AssetLedger, AssetSnapshot};
pub use capacity::{AssetTotals, Capacity};
pub use ids::{Address, AssetId};
