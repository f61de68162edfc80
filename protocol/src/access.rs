//! # Access Control
//!
//! Maps principals to roles. The ledger core never consults global state
//! for authorization; it is handed a [`RoleRegistry`] and asks it.
//!
//! [`AccessControl`] is the in-process registry. It is seeded with a single
//! bootstrap administrator, and only that principal may grant or revoke
//! roles. Other administrators configure the vault but cannot change who
//! holds which role.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::Address;

/// Capabilities a principal may hold. A principal may hold none, one, or
/// both.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Capacity and policy configuration, role management.
    Administrator,
    /// Privileged ledger-correcting operations.
    Recovery,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Administrator => write!(f, "administrator"),
            Role::Recovery => write!(f, "recovery"),
        }
    }
}

/// Answers role-membership queries.
pub trait RoleRegistry: Send + Sync {
    /// Returns `true` if `principal` holds `role`.
    fn has_role(&self, principal: &Address, role: Role) -> bool;

    /// Fails with [`LedgerError::Unauthorized`] unless `principal` holds
    /// `role`.
    fn require_role(&self, principal: &Address, role: Role) -> LedgerResult<()> {
        if self.has_role(principal, role) {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized {
                principal: *principal,
                role,
            })
        }
    }
}

/// In-process role registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    /// The principal that seeded the registry.
    bootstrap_admin: Address,
    /// Role assignments.
    grants: BTreeMap<Address, BTreeSet<Role>>,
}

impl AccessControl {
    /// Creates a registry where `bootstrap_admin` holds the administrator
    /// role.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidIdentity`] for the null address.
    pub fn new(bootstrap_admin: Address) -> LedgerResult<Self> {
        if bootstrap_admin.is_zero() {
            return Err(LedgerError::InvalidIdentity);
        }
        let mut grants = BTreeMap::new();
        grants.insert(bootstrap_admin, BTreeSet::from([Role::Administrator]));
        Ok(Self {
            bootstrap_admin,
            grants,
        })
    }

    /// The principal the registry was seeded with.
    pub fn bootstrap_admin(&self) -> Address {
        self.bootstrap_admin
    }

    /// Grants `role` to `principal`. Returns `false` if it was already held.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Unauthorized`] if `caller` is not the bootstrap
    ///   administrator.
    /// - [`LedgerError::InvalidIdentity`] if `principal` is the null address.
    pub fn grant_role(
        &mut self,
        caller: &Address,
        principal: Address,
        role: Role,
    ) -> LedgerResult<bool> {
        self.require_bootstrap(caller)?;
        if principal.is_zero() {
            return Err(LedgerError::InvalidIdentity);
        }
        Ok(self.grants.entry(principal).or_default().insert(role))
    }

    /// Revokes `role` from `principal`. Returns `false` if it was not held.
    ///
    /// The bootstrap administrator cannot lose the administrator role;
    /// otherwise a single call could leave the registry with no one able
    /// to manage it.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Unauthorized`] if `caller` is not the bootstrap
    ///   administrator, or if the call would strip the bootstrap
    ///   administrator.
    pub fn revoke_role(
        &mut self,
        caller: &Address,
        principal: Address,
        role: Role,
    ) -> LedgerResult<bool> {
        self.require_bootstrap(caller)?;
        if principal == self.bootstrap_admin && role == Role::Administrator {
            return Err(LedgerError::Unauthorized {
                principal: *caller,
                role,
            });
        }

        let Some(roles) = self.grants.get_mut(&principal) else {
            return Ok(false);
        };
        let removed = roles.remove(&role);
        if roles.is_empty() {
            self.grants.remove(&principal);
        }
        Ok(removed)
    }

    fn require_bootstrap(&self, caller: &Address) -> LedgerResult<()> {
        if *caller == self.bootstrap_admin {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized {
                principal: *caller,
                role: Role::Administrator,
            })
        }
    }

    /// All roles held by `principal`.
    pub fn roles_of(&self, principal: &Address) -> Vec<Role> {
        self.grants
            .get(principal)
            .map(|roles| roles.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every principal holding `role`.
    pub fn members(&self, role: Role) -> Vec<Address> {
        self.grants
            .iter()
            .filter(|(_, roles)| roles.contains(&role))
            .map(|(principal, _)| *principal)
            .collect()
    }
}

impl RoleRegistry for AccessControl {
    fn has_role(&self, principal: &Address, role: Role) -> bool {
        self.grants
            .get(principal)
            .is_some_and(|roles| roles.contains(&role))
    }
}
