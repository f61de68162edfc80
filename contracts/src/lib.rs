//! # Strongbox Contracts
//!
//! The operation layer on top of the protocol core. Where `strongbox-protocol`
//! keeps the books, these contracts decide who may touch them and in what
//! order:
//!
//! - **Vault**: deposits, withdrawals under the withdrawal policy, and the
//!   administrative surface (capacity, price feed, roles).
//! - **Recovery**: privileged corrections for misattributed funds that keep
//!   every ledger invariant intact.
//! - **Events**: the audit log every committed write appends to.
//!
//! ## Design Principles
//!
//! 1. Checks, then effects, then interactions. Outbound value moves last.
//! 2. Every write commits in full or not at all.
//! 3. Privileged operations carry the operator's identity into the audit log.

pub mod events;
pub mod recovery;
pub mod vault;

pub use events::{EventLog, EventRecord, VaultEvent};
pub use vault::{Counters, CustodyVault, VaultSnapshot};
