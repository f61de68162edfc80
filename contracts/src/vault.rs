//! # Custody Vault Contract
//!
//! The caller-facing surface of the ledger. Principals deposit and withdraw;
//! administrators configure capacity, the price feed and role assignments.
//! The privileged recovery operations live in [`crate::recovery`] and share
//! the same machinery.
//!
//! ## Operation Discipline
//!
//! Every write follows the same order:
//!
//! 1. **Checks**: caller identity and role, amounts, capacity, withdrawal
//!    policy (which may read the oracle).
//! 2. **Effects**: ledger mutation, counters, audit event.
//! 3. **Interaction**: the outbound custody transfer, always last.
//!
//! Inbound value is the one exception the direction of flow forces: the
//! pull happens after the checks but before the credit, because the ledger
//! must credit what actually arrived. Capacity is therefore enforced on the
//! received amount, after the pull.
//!
//! ## Atomicity
//!
//! Each write runs inside [`CustodyVault::atomically`], which checkpoints the
//! vault's state and restores it if any step fails. A failed operation leaves
//! balances, totals, counters, role assignments, the oracle wiring and the
//! audit log exactly as they were. Inbound pulls made before the failure are
//! handed back through [`CustodyGateway::reverse_receive`], so the source's
//! external holdings are restored too.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use strongbox_protocol::access::{AccessControl, Role, RoleRegistry};
use strongbox_protocol::config::VaultConfig;
use strongbox_protocol::custody::{CustodyGateway, TransferError};
use strongbox_protocol::ledger::{
    require_identity, require_positive, Address, Amount, AssetId, AssetLedger, AssetSnapshot,
    Capacity,
};
use strongbox_protocol::oracle::{PriceFeed, PriceOracleAdapter, PriceQuote};
use strongbox_protocol::policy::WithdrawalPolicy;
use strongbox_protocol::{LedgerError, LedgerResult};

use crate::events::{EventLog, EventRecord, VaultEvent};

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Monotonic operation counters. Observability only; nothing depends on
/// them for correctness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    /// Committed user deposits.
    pub deposit_count: u64,
    /// Committed user withdrawals.
    pub withdrawal_count: u64,
    /// Committed recovery operations.
    pub recovery_count: u64,
}

/// Full reporting view of the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSnapshot {
    /// Per-asset books.
    pub assets: Vec<AssetSnapshot>,
    /// Operation counters.
    pub counters: Counters,
    /// Number of audit events recorded.
    pub event_count: usize,
}

/// State captured before a write so it can be restored on failure.
struct Checkpoint {
    ledger: AssetLedger,
    access: AccessControl,
    oracle: PriceOracleAdapter,
    counters: Counters,
    event_len: usize,
}

/// An inbound pull made by the running operation.
#[derive(Debug, Clone, Copy)]
struct Inbound {
    from: Address,
    asset: AssetId,
    declared: Amount,
    received: Amount,
}

// ---------------------------------------------------------------------------
// CustodyVault
// ---------------------------------------------------------------------------

/// A custodial multi-asset vault.
pub struct CustodyVault {
    pub(crate) ledger: AssetLedger,
    pub(crate) access: AccessControl,
    pub(crate) oracle: PriceOracleAdapter,
    pub(crate) custody: Arc<dyn CustodyGateway>,
    pub(crate) policy: WithdrawalPolicy,
    pub(crate) counters: Counters,
    pub(crate) events: EventLog,
    config: VaultConfig,
    inbound: Vec<Inbound>,
}

impl std::fmt::Debug for CustodyVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustodyVault")
            .field("config", &self.config)
            .field("oracle", &self.oracle)
            .field("counters", &self.counters)
            .field("events", &self.events.len())
            .finish()
    }
}

impl CustodyVault {
    /// Creates a vault.
    ///
    /// The native asset's capacity comes from `config`; every other asset
    /// starts unlimited until an administrator configures it.
    ///
    /// # Arguments
    ///
    /// * `config` - Ceilings and staleness window, immutable from here on
    ///   (except the native capacity).
    /// * `access` - The role registry, already seeded with its bootstrap
    ///   administrator.
    /// * `feed` - Upstream price feed for the native asset.
    /// * `custody` - The external value mover.
    pub fn new(
        config: VaultConfig,
        access: AccessControl,
        feed: Arc<dyn PriceFeed>,
        custody: Arc<dyn CustodyGateway>,
    ) -> LedgerResult<Self> {
        let mut ledger = AssetLedger::new();
        ledger.set_capacity(AssetId::NATIVE, config.native_capacity)?;

        Ok(Self {
            ledger,
            access,
            oracle: PriceOracleAdapter::new(feed, config.max_price_staleness()),
            custody,
            policy: WithdrawalPolicy::from_config(&config),
            counters: Counters::default(),
            events: EventLog::new(),
            config,
            inbound: Vec::new(),
        })
    }

    // -----------------------------------------------------------------------
    // User Operations
    // -----------------------------------------------------------------------

    /// Deposits `amount` of `asset` from `caller`'s external holdings.
    ///
    /// Returns the amount actually credited, which is less than `amount`
    /// for assets that skim a fee in transit.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] for zero, or when nothing arrived.
    /// - [`LedgerError::InvalidIdentity`] for the null caller.
    /// - [`LedgerError::CapacityExceeded`] if the amount that arrived does
    ///   not fit under the asset's capacity. The pull is reversed.
    /// - [`LedgerError::TransferFailed`] if custody could not pull the value.
    pub fn deposit(
        &mut self,
        caller: Address,
        asset: AssetId,
        amount: Amount,
    ) -> LedgerResult<Amount> {
        self.atomically("deposit", |vault| {
            require_positive(amount)?;
            require_identity(&caller)?;
            vault.precheck_inbound(&asset, amount)?;

            let credited = vault.pull_in(&caller, &asset, amount)?;
            let balance = vault.ledger.credit(caller, asset, credited)?;
            vault.counters.deposit_count += 1;
            vault.events.append(VaultEvent::Deposited {
                principal: caller,
                asset,
                declared: amount,
                credited,
            });

            info!(
                principal = %caller,
                asset = %asset,
                declared = %amount,
                credited = %credited,
                balance = %balance,
                "deposit committed"
            );
            Ok(credited)
        })
    }

    /// Withdraws `amount` of `asset` to `caller`'s external holdings,
    /// returning the remaining balance.
    ///
    /// Native withdrawals pass the [`WithdrawalPolicy`] first: the
    /// per-transaction limit, then the quote-value ceiling.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::LimitExceeded`], [`LedgerError::ValueCapExceeded`],
    ///   [`LedgerError::StalePrice`], [`LedgerError::InvalidPrice`] from the
    ///   policy (native only).
    /// - [`LedgerError::InsufficientBalance`] if the account is short.
    /// - [`LedgerError::TransferFailed`] if custody refused the release; the
    ///   debit is rolled back.
    pub fn withdraw(
        &mut self,
        caller: Address,
        asset: AssetId,
        amount: Amount,
    ) -> LedgerResult<Amount> {
        self.atomically("withdraw", |vault| {
            require_positive(amount)?;
            require_identity(&caller)?;

            let quoted_value = if asset.is_native() {
                Some(vault.policy.check_native(amount, &vault.oracle, Utc::now())?)
            } else {
                None
            };

            let remaining = vault.ledger.debit(caller, asset, amount)?;
            vault.counters.withdrawal_count += 1;
            vault.events.append(VaultEvent::Withdrawn {
                principal: caller,
                asset,
                amount,
                quoted_value,
            });

            vault.custody.send_out(&caller, &asset, amount)?;

            info!(
                principal = %caller,
                asset = %asset,
                amount = %amount,
                remaining = %remaining,
                "withdrawal committed"
            );
            Ok(remaining)
        })
    }

    // -----------------------------------------------------------------------
    // Administration
    // -----------------------------------------------------------------------

    /// Sets the capacity of `asset`, returning the previous capacity.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Unauthorized`] unless `caller` is an administrator.
    /// - [`LedgerError::CapacityBelowTotal`] if a finite capacity would sit
    ///   below the asset's current total.
    pub fn set_capacity(
        &mut self,
        caller: Address,
        asset: AssetId,
        capacity: Capacity,
    ) -> LedgerResult<Capacity> {
        self.atomically("set_capacity", |vault| {
            vault.authorize(&caller, Role::Administrator)?;
            let previous = vault.ledger.set_capacity(asset, capacity)?;
            vault.events.append(VaultEvent::CapacityUpdated {
                operator: caller,
                asset,
                previous,
                current: capacity,
            });
            info!(operator = %caller, asset = %asset, %previous, current = %capacity, "capacity updated");
            Ok(previous)
        })
    }

    /// Points the oracle at a different upstream feed.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Unauthorized`] unless `caller` is an administrator.
    pub fn set_price_feed(&mut self, caller: Address, feed: Arc<dyn PriceFeed>) -> LedgerResult<()> {
        self.atomically("set_price_feed", |vault| {
            vault.authorize(&caller, Role::Administrator)?;
            let current = feed.description();
            let previous = vault.oracle.set_feed(feed).description();
            vault.events.append(VaultEvent::PriceFeedUpdated {
                operator: caller,
                previous: previous.clone(),
                current: current.clone(),
            });
            info!(operator = %caller, %previous, %current, "price feed changed");
            Ok(())
        })
    }

    /// Grants `role` to `principal`. Returns `false` if it was already held.
    /// Only the bootstrap administrator manages roles.
    pub fn grant_role(&mut self, caller: Address, principal: Address, role: Role) -> LedgerResult<bool> {
        self.atomically("grant_role", |vault| {
            let changed = vault.access.grant_role(&caller, principal, role)?;
            if changed {
                vault.events.append(VaultEvent::RoleGranted {
                    operator: caller,
                    principal,
                    role,
                });
                info!(operator = %caller, principal = %principal, %role, "role granted");
            }
            Ok(changed)
        })
    }

    /// Revokes `role` from `principal`. Returns `false` if it was not held.
    pub fn revoke_role(&mut self, caller: Address, principal: Address, role: Role) -> LedgerResult<bool> {
        self.atomically("revoke_role", |vault| {
            let changed = vault.access.revoke_role(&caller, principal, role)?;
            if changed {
                vault.events.append(VaultEvent::RoleRevoked {
                    operator: caller,
                    principal,
                    role,
                });
                info!(operator = %caller, principal = %principal, %role, "role revoked");
            }
            Ok(changed)
        })
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// The caller's own balance in `asset`.
    pub fn my_balance(&self, caller: &Address, asset: &AssetId) -> Amount {
        self.ledger.balance_of(caller, asset)
    }

    /// Aggregate total of `asset`.
    pub fn total_of(&self, asset: &AssetId) -> Amount {
        self.ledger.total_of(asset)
    }

    /// Capacity of `asset`.
    pub fn capacity_of(&self, asset: &AssetId) -> Capacity {
        self.ledger.capacity_of(asset)
    }

    /// Room left under the capacity of `asset`; `None` when unlimited.
    pub fn available_capacity(&self, asset: &AssetId) -> Option<Amount> {
        self.ledger.available_capacity(asset)
    }

    /// Custody holdings of `asset` that the ledger does not account for.
    pub fn custody_surplus(&self, asset: &AssetId) -> Amount {
        self.custody
            .custody_held(asset)
            .saturating_sub(self.ledger.total_of(asset))
    }

    /// Operation counters.
    pub fn counters(&self) -> Counters {
        self.counters
    }

    /// Current validated quote.
    pub fn current_quote(&self) -> LedgerResult<PriceQuote> {
        Ok(self.oracle.latest_quote()?)
    }

    /// Description of the feed the oracle currently reads.
    pub fn price_feed_description(&self) -> String {
        self.oracle.feed_description()
    }

    /// Current normalized native price (8 decimals).
    pub fn current_price(&self) -> LedgerResult<u128> {
        Ok(self.oracle.latest_price()?)
    }

    /// Quote-currency value of a hypothetical native `amount`.
    pub fn quote_value(&self, amount: Amount) -> LedgerResult<u128> {
        Ok(self.oracle.convert_to_quote(amount)?)
    }

    /// The audit log, oldest first.
    pub fn events(&self) -> &[EventRecord] {
        self.events.records()
    }

    /// The audit log itself, for filtered queries.
    pub fn event_log(&self) -> &EventLog {
        &self.events
    }

    /// Read-only access to the underlying ledger, for audits and reports.
    pub fn ledger(&self) -> &AssetLedger {
        &self.ledger
    }

    /// Read-only access to the role registry.
    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    /// The withdrawal ceilings.
    pub fn policy(&self) -> WithdrawalPolicy {
        self.policy
    }

    /// The configuration the vault was built with.
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Reporting view of every asset plus counters.
    pub fn snapshot(&self) -> VaultSnapshot {
        VaultSnapshot {
            assets: self.ledger.snapshot(),
            counters: self.counters,
            event_count: self.events.len(),
        }
    }

    // -----------------------------------------------------------------------
    // Shared Machinery
    // -----------------------------------------------------------------------

    /// Runs `op` as a single all-or-nothing operation.
    pub(crate) fn atomically<T>(
        &mut self,
        name: &'static str,
        op: impl FnOnce(&mut Self) -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        let checkpoint = Checkpoint {
            ledger: self.ledger.clone(),
            access: self.access.clone(),
            oracle: self.oracle.clone(),
            counters: self.counters,
            event_len: self.events.len(),
        };

        self.inbound.clear();
        let outcome = op(self);
        let pulled = std::mem::take(&mut self.inbound);

        match outcome {
            Ok(value) => Ok(value),
            Err(err) => {
                for pull in pulled.iter().rev() {
                    self.return_inbound(name, pull);
                }
                self.ledger = checkpoint.ledger;
                self.access = checkpoint.access;
                self.oracle = checkpoint.oracle;
                self.counters = checkpoint.counters;
                self.events.truncate(checkpoint.event_len);
                warn!(operation = name, error = %err, "operation reverted");
                Err(err)
            }
        }
    }

    /// Role check that leaves a trace of refused privileged calls.
    pub(crate) fn authorize(&self, caller: &Address, role: Role) -> LedgerResult<()> {
        self.access.require_role(caller, role).map_err(|err| {
            warn!(principal = %caller, %role, "privileged call refused");
            err
        })
    }

    /// Refuses an inbound amount whose total could not be represented even
    /// if it arrived in full. Runs before any value moves; capacity is left
    /// to the credit of what actually arrives.
    pub(crate) fn precheck_inbound(&self, asset: &AssetId, declared: Amount) -> LedgerResult<()> {
        self.ledger
            .total_of(asset)
            .checked_add(declared)
            .map(|_| ())
            .ok_or(LedgerError::Overflow("asset total"))
    }

    /// Pulls `declared` from `from` into custody and returns what arrived.
    /// The pull is recorded so a later failure in the same operation hands
    /// it back.
    pub(crate) fn pull_in(
        &mut self,
        from: &Address,
        asset: &AssetId,
        declared: Amount,
    ) -> LedgerResult<Amount> {
        let received = self.custody.receive_in(from, asset, declared)?;
        self.inbound.push(Inbound {
            from: *from,
            asset: *asset,
            declared,
            received,
        });
        if received > declared {
            return Err(TransferError::OverReported { declared, received }.into());
        }
        if received == 0 {
            return Err(LedgerError::InvalidAmount("amount must be greater than zero"));
        }
        Ok(received)
    }

    /// Hands a recorded pull back to its source during a revert.
    fn return_inbound(&self, operation: &'static str, pull: &Inbound) {
        if let Err(err) =
            self.custody
                .reverse_receive(&pull.from, &pull.asset, pull.declared, pull.received)
        {
            error!(
                operation,
                holder = %pull.from,
                asset = %pull.asset,
                declared = %pull.declared,
                received = %pull.received,
                error = %err,
                "failed to hand back inbound value"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strongbox_protocol::config::NATIVE_UNIT;
    use strongbox_protocol::custody::InMemoryCustody;
    use strongbox_protocol::oracle::{FixedPriceFeed, RawQuote};

    fn admin() -> Address {
        Address::from_label("admin")
    }

    fn alice() -> Address {
        Address::from_label("alice")
    }

    fn vault() -> (CustodyVault, Arc<InMemoryCustody>) {
        let custody = Arc::new(InMemoryCustody::new());
        let feed = Arc::new(FixedPriceFeed::new(
            "NATIVE/USD",
            RawQuote::settled(250_000_000_000, 8, Utc::now(), 1),
        ));
        let vault = CustodyVault::new(
            VaultConfig::default(),
            AccessControl::new(admin()).unwrap(),
            feed,
            custody.clone(),
        )
        .unwrap();
        (vault, custody)
    }

    #[test]
    fn new_vault_applies_native_capacity() {
        let (v, _) = vault();
        assert_eq!(
            v.capacity_of(&AssetId::NATIVE),
            VaultConfig::default().native_capacity
        );
        assert_eq!(v.counters(), Counters::default());
        assert!(v.events().is_empty());
    }

    #[test]
    fn deposit_then_withdraw_native() {
        let (mut v, custody) = vault();
        custody.fund_external(alice(), AssetId::NATIVE, NATIVE_UNIT);

        assert_eq!(v.deposit(alice(), AssetId::NATIVE, NATIVE_UNIT).unwrap(), NATIVE_UNIT);
        let remaining = v
            .withdraw(alice(), AssetId::NATIVE, NATIVE_UNIT / 10)
            .unwrap();
        assert_eq!(remaining, NATIVE_UNIT - NATIVE_UNIT / 10);
        assert_eq!(v.counters().deposit_count, 1);
        assert_eq!(v.counters().withdrawal_count, 1);
        assert_eq!(
            custody.external_balance(&alice(), &AssetId::NATIVE),
            NATIVE_UNIT / 10
        );
    }

    #[test]
    fn failed_send_out_reverts_everything() {
        let (mut v, custody) = vault();
        custody.fund_external(alice(), AssetId::NATIVE, 1_000);
        v.deposit(alice(), AssetId::NATIVE, 1_000).unwrap();
        custody.halt_outbound(true);

        let err = v.withdraw(alice(), AssetId::NATIVE, 400).unwrap_err();
        assert!(matches!(err, LedgerError::TransferFailed(_)));
        assert_eq!(v.my_balance(&alice(), &AssetId::NATIVE), 1_000);
        assert_eq!(v.total_of(&AssetId::NATIVE), 1_000);
        assert_eq!(v.counters().withdrawal_count, 0);
        assert_eq!(v.events().len(), 1);
    }

    #[test]
    fn deposit_of_nothing_received_rejected() {
        let (mut v, custody) = vault();
        let dust = AssetId::derive("DUST");
        custody.set_transfer_fee_bps(dust, 10_000);
        custody.fund_external(alice(), dust, 5);

        let err = v.deposit(alice(), dust, 5).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InvalidAmount("amount must be greater than zero")
        );
        assert_eq!(v.total_of(&dust), 0);
        assert_eq!(custody.external_balance(&alice(), &dust), 5);
        assert_eq!(custody.custody_held(&dust), 0);
    }

    #[test]
    fn non_admin_cannot_set_capacity() {
        let (mut v, _) = vault();
        let err = v
            .set_capacity(alice(), AssetId::NATIVE, Capacity::Unlimited)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Unauthorized { .. }));
        assert!(v.events().is_empty());
    }

    #[test]
    fn price_feed_change_is_recorded() {
        let (mut v, _) = vault();
        let replacement = Arc::new(FixedPriceFeed::new(
            "NATIVE/USD v2",
            RawQuote::settled(300_000_000_000, 8, Utc::now(), 1),
        ));
        v.set_price_feed(admin(), replacement).unwrap();

        assert_eq!(v.current_price().unwrap(), 300_000_000_000);
        match &v.events()[0].event {
            VaultEvent::PriceFeedUpdated {
                previous, current, ..
            } => {
                assert_eq!(previous, "NATIVE/USD");
                assert_eq!(current, "NATIVE/USD v2");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn quote_value_of_hypothetical_amount() {
        let (v, _) = vault();
        assert_eq!(v.quote_value(2 * NATIVE_UNIT).unwrap(), 500_000_000_000);
    }

    #[test]
    fn duplicate_grant_emits_nothing() {
        let (mut v, _) = vault();
        assert!(v.grant_role(admin(), alice(), Role::Recovery).unwrap());
        assert!(!v.grant_role(admin(), alice(), Role::Recovery).unwrap());
        assert_eq!(v.events().len(), 1);
    }

    #[test]
    fn delegated_admin_configures_but_cannot_grant() {
        let (mut v, _) = vault();
        v.grant_role(admin(), alice(), Role::Administrator).unwrap();
        let events = v.events().len();

        v.set_capacity(alice(), AssetId::derive("USDC"), Capacity::Limited(10))
            .unwrap();
        let err = v
            .grant_role(alice(), Address::from_label("mallory"), Role::Recovery)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Unauthorized { .. }));
        assert_eq!(v.events().len(), events + 1);
    }
}
