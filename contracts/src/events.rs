//! # Audit Events
//!
//! Every committed write on the vault appends one [`EventRecord`]. Reverted
//! operations leave nothing behind: the vault truncates the log back to its
//! checkpoint along with the rest of its state.
//!
//! Privileged events carry the operator's identity so that every recovery
//! correction can be traced to whoever performed it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use strongbox_protocol::access::Role;
use strongbox_protocol::ledger::{Address, Amount, AssetId, Capacity};

/// Something that happened to the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultEvent {
    /// A principal deposited value.
    Deposited {
        principal: Address,
        asset: AssetId,
        /// Amount the principal declared.
        declared: Amount,
        /// Amount custody actually received and the ledger credited.
        credited: Amount,
    },
    /// A principal withdrew value.
    Withdrawn {
        principal: Address,
        asset: AssetId,
        amount: Amount,
        /// Quote-currency value at withdrawal time; native withdrawals only.
        quoted_value: Option<u128>,
    },
    /// An administrator changed an asset's capacity.
    CapacityUpdated {
        operator: Address,
        asset: AssetId,
        previous: Capacity,
        current: Capacity,
    },
    /// An administrator pointed the oracle at a different feed.
    PriceFeedUpdated {
        operator: Address,
        previous: String,
        current: String,
    },
    /// An administrator granted a role.
    RoleGranted {
        operator: Address,
        principal: Address,
        role: Role,
    },
    /// An administrator revoked a role.
    RoleRevoked {
        operator: Address,
        principal: Address,
        role: Role,
    },
    /// Recovery moved balance between two principals.
    Reassigned {
        operator: Address,
        from: Address,
        to: Address,
        asset: AssetId,
        amount: Amount,
    },
    /// Recovery credited unaccounted custody surplus.
    ExcessAssigned {
        operator: Address,
        to: Address,
        asset: AssetId,
        amount: Amount,
        /// Custody holding observed when the credit was made.
        custody_held: Amount,
    },
    /// Recovery topped up a principal with value the operator supplied.
    ToppedUp {
        operator: Address,
        principal: Address,
        asset: AssetId,
        declared: Amount,
        credited: Amount,
    },
    /// Recovery forced value out of a principal's account.
    ForcedWithdrawal {
        operator: Address,
        from: Address,
        destination: Address,
        asset: AssetId,
        amount: Amount,
    },
}

impl VaultEvent {
    /// Short machine-friendly name, used for metrics labels and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            VaultEvent::Deposited { .. } => "deposited",
            VaultEvent::Withdrawn { .. } => "withdrawn",
            VaultEvent::CapacityUpdated { .. } => "capacity_updated",
            VaultEvent::PriceFeedUpdated { .. } => "price_feed_updated",
            VaultEvent::RoleGranted { .. } => "role_granted",
            VaultEvent::RoleRevoked { .. } => "role_revoked",
            VaultEvent::Reassigned { .. } => "reassigned",
            VaultEvent::ExcessAssigned { .. } => "excess_assigned",
            VaultEvent::ToppedUp { .. } => "topped_up",
            VaultEvent::ForcedWithdrawal { .. } => "forced_withdrawal",
        }
    }

    /// The privileged principal behind the event, if any.
    pub fn operator(&self) -> Option<Address> {
        match self {
            VaultEvent::Deposited { .. } | VaultEvent::Withdrawn { .. } => None,
            VaultEvent::CapacityUpdated { operator, .. }
            | VaultEvent::PriceFeedUpdated { operator, .. }
            | VaultEvent::RoleGranted { operator, .. }
            | VaultEvent::RoleRevoked { operator, .. }
            | VaultEvent::Reassigned { operator, .. }
            | VaultEvent::ExcessAssigned { operator, .. }
            | VaultEvent::ToppedUp { operator, .. }
            | VaultEvent::ForcedWithdrawal { operator, .. } => Some(*operator),
        }
    }
}

/// One entry in the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Unique id of the record.
    pub id: Uuid,
    /// Position in the log, starting at 0.
    pub sequence: u64,
    /// When the event was recorded.
    pub recorded_at: DateTime<Utc>,
    /// What happened.
    pub event: VaultEvent,
}

/// Append-only (except for rollback) audit log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `event` and returns its record.
    pub fn append(&mut self, event: VaultEvent) -> &EventRecord {
        let record = EventRecord {
            id: Uuid::new_v4(),
            sequence: self.records.len() as u64,
            recorded_at: Utc::now(),
            event,
        };
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records, oldest first.
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Records whose operator is `operator`.
    pub fn by_operator(&self, operator: &Address) -> Vec<&EventRecord> {
        self.records
            .iter()
            .filter(|r| r.event.operator().as_ref() == Some(operator))
            .collect()
    }

    /// Drops every record past `len`. Used only when rolling back a failed
    /// operation.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.records.truncate(len);
    }
}
