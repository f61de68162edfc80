//! # Recovery Operations
//!
//! Privileged corrections that move or inject balance outside the normal
//! deposit and withdrawal flow. All four require the recovery role, run
//! inside the vault's commit-or-revert envelope, and record the operator in
//! the audit log.
//!
//! None of them may break the books:
//!
//! - [`reassign`](CustodyVault::reassign) moves balance between accounts and
//!   leaves the total untouched.
//! - [`assign_excess`](CustodyVault::assign_excess) credits only value that
//!   custody holds and the ledger does not yet account for.
//! - [`admin_top_up`](CustodyVault::admin_top_up) credits exactly what the
//!   operator delivered through the inbound channel.
//! - [`admin_withdraw_from`](CustodyVault::admin_withdraw_from) debits first
//!   and releases value last.
//!
//! Every credit re-checks capacity. Withdrawal ceilings do not apply to
//! forced exits.

use tracing::info;

use strongbox_protocol::access::Role;
use strongbox_protocol::ledger::{require_identity, require_positive, Address, Amount, AssetId};
use strongbox_protocol::LedgerResult;

use crate::events::VaultEvent;
use crate::vault::CustodyVault;

impl CustodyVault {
    /// Moves `amount` of `asset` from `from` to `to`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Unauthorized`](strongbox_protocol::LedgerError::Unauthorized)
    ///   without the recovery role.
    /// - [`LedgerError::InsufficientBalance`](strongbox_protocol::LedgerError::InsufficientBalance)
    ///   if `from` is short.
    pub fn reassign(
        &mut self,
        operator: Address,
        from: Address,
        to: Address,
        asset: AssetId,
        amount: Amount,
    ) -> LedgerResult<()> {
        self.atomically("reassign", |vault| {
            vault.authorize(&operator, Role::Recovery)?;
            vault.ledger.transfer_internal(from, to, asset, amount)?;
            vault.counters.recovery_count += 1;
            vault.events.append(VaultEvent::Reassigned {
                operator,
                from,
                to,
                asset,
                amount,
            });
            info!(
                operator = %operator,
                from = %from,
                to = %to,
                asset = %asset,
                amount = %amount,
                "balance reassigned"
            );
            Ok(())
        })
    }

    /// Credits `to` with `amount` of custody surplus, value that reached
    /// custody without passing through [`deposit`](CustodyVault::deposit).
    /// Returns the new balance of `to`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::UnbackedCredit`](strongbox_protocol::LedgerError::UnbackedCredit)
    ///   if custody holds less unaccounted value than `amount`.
    /// - [`LedgerError::CapacityExceeded`](strongbox_protocol::LedgerError::CapacityExceeded)
    ///   if the credit would overflow the asset's capacity.
    pub fn assign_excess(
        &mut self,
        operator: Address,
        to: Address,
        asset: AssetId,
        amount: Amount,
    ) -> LedgerResult<Amount> {
        self.atomically("assign_excess", |vault| {
            vault.authorize(&operator, Role::Recovery)?;
            let custody_held = vault.custody.custody_held(&asset);
            let balance = vault
                .ledger
                .inject_external(to, asset, amount, custody_held)?;
            vault.counters.recovery_count += 1;
            vault.events.append(VaultEvent::ExcessAssigned {
                operator,
                to,
                asset,
                amount,
                custody_held,
            });
            info!(
                operator = %operator,
                to = %to,
                asset = %asset,
                amount = %amount,
                custody_held = %custody_held,
                "custody surplus assigned"
            );
            Ok(balance)
        })
    }

    /// Pulls `amount` of `asset` from the operator's own holdings and
    /// credits `principal` with whatever arrived. Returns the credited
    /// amount.
    pub fn admin_top_up(
        &mut self,
        operator: Address,
        principal: Address,
        asset: AssetId,
        amount: Amount,
    ) -> LedgerResult<Amount> {
        self.atomically("admin_top_up", |vault| {
            vault.authorize(&operator, Role::Recovery)?;
            require_positive(amount)?;
            require_identity(&principal)?;
            vault.precheck_inbound(&asset, amount)?;

            let credited = vault.pull_in(&operator, &asset, amount)?;
            vault.ledger.credit(principal, asset, credited)?;
            vault.counters.recovery_count += 1;
            vault.events.append(VaultEvent::ToppedUp {
                operator,
                principal,
                asset,
                declared: amount,
                credited,
            });
            info!(
                operator = %operator,
                principal = %principal,
                asset = %asset,
                declared = %amount,
                credited = %credited,
                "account topped up"
            );
            Ok(credited)
        })
    }

    /// Debits `amount` of `asset` from `from` and releases it to
    /// `destination`. Returns the remaining balance of `from`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InsufficientBalance`](strongbox_protocol::LedgerError::InsufficientBalance)
    ///   if `from` is short.
    /// - [`LedgerError::TransferFailed`](strongbox_protocol::LedgerError::TransferFailed)
    ///   if custody refused the release; the debit is rolled back.
    pub fn admin_withdraw_from(
        &mut self,
        operator: Address,
        from: Address,
        destination: Address,
        asset: AssetId,
        amount: Amount,
    ) -> LedgerResult<Amount> {
        self.atomically("admin_withdraw_from", |vault| {
            vault.authorize(&operator, Role::Recovery)?;
            require_identity(&destination)?;

            let remaining = vault.ledger.debit(from, asset, amount)?;
            vault.counters.recovery_count += 1;
            vault.events.append(VaultEvent::ForcedWithdrawal {
                operator,
                from,
                destination,
                asset,
                amount,
            });

            vault.custody.send_out(&destination, &asset, amount)?;

            info!(
                operator = %operator,
                from = %from,
                destination = %destination,
                asset = %asset,
                amount = %amount,
                "forced withdrawal committed"
            );
            Ok(remaining)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use strongbox_protocol::access::AccessControl;
    use strongbox_protocol::config::VaultConfig;
    use strongbox_protocol::custody::{CustodyGateway, InMemoryCustody};
    use strongbox_protocol::oracle::{FixedPriceFeed, RawQuote};
    use strongbox_protocol::LedgerError;

    fn admin() -> Address {
        Address::from_label("admin")
    }

    fn fixer() -> Address {
        Address::from_label("fixer")
    }

    fn usdc() -> AssetId {
        AssetId::derive("USDC")
    }

    fn setup() -> (CustodyVault, Arc<InMemoryCustody>) {
        let custody = Arc::new(InMemoryCustody::new());
        let feed = Arc::new(FixedPriceFeed::new(
            "NATIVE/USD",
            RawQuote::settled(250_000_000_000, 8, Utc::now(), 1),
        ));
        let mut vault = CustodyVault::new(
            VaultConfig::default(),
            AccessControl::new(admin()).unwrap(),
            feed,
            custody.clone(),
        )
        .unwrap();
        vault.grant_role(admin(), fixer(), Role::Recovery).unwrap();
        (vault, custody)
    }

    #[test]
    fn administrator_alone_cannot_recover() {
        let (mut v, _) = setup();
        let err = v
            .reassign(admin(), Address::from_label("a"), Address::from_label("b"), usdc(), 1)
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::Unauthorized {
                principal: admin(),
                role: Role::Recovery
            }
        );
    }

    #[test]
    fn assign_excess_consumes_surplus_once() {
        let (mut v, custody) = setup();
        let stray = Address::from_label("stray");
        let bob = Address::from_label("bob");
        custody.fund_external(stray, usdc(), 300);
        custody.side_transfer(stray, usdc(), 300).unwrap();

        assert_eq!(v.custody_surplus(&usdc()), 300);
        v.assign_excess(fixer(), bob, usdc(), 300).unwrap();
        assert_eq!(v.custody_surplus(&usdc()), 0);

        let err = v.assign_excess(fixer(), bob, usdc(), 1).unwrap_err();
        assert_eq!(
            err,
            LedgerError::UnbackedCredit {
                surplus: 0,
                requested: 1
            }
        );
        assert_eq!(v.total_of(&usdc()), custody.custody_held(&usdc()));
    }

    #[test]
    fn top_up_pulls_from_operator() {
        let (mut v, custody) = setup();
        let carol = Address::from_label("carol");
        custody.fund_external(fixer(), usdc(), 500);

        assert_eq!(v.admin_top_up(fixer(), carol, usdc(), 200).unwrap(), 200);
        assert_eq!(v.my_balance(&carol, &usdc()), 200);
        assert_eq!(custody.external_balance(&fixer(), &usdc()), 300);
        assert_eq!(v.counters().recovery_count, 1);
        assert_eq!(v.counters().deposit_count, 0);
    }

    #[test]
    fn forced_withdrawal_ignores_native_ceilings() {
        let (mut v, custody) = setup();
        let whale = Address::from_label("whale");
        let exit = Address::from_label("exit");
        let big = 20 * strongbox_protocol::config::NATIVE_UNIT;
        v.set_capacity(admin(), AssetId::NATIVE, strongbox_protocol::ledger::Capacity::Unlimited)
            .unwrap();
        custody.fund_external(whale, AssetId::NATIVE, big);
        v.deposit(whale, AssetId::NATIVE, big).unwrap();

        let remaining = v
            .admin_withdraw_from(fixer(), whale, exit, AssetId::NATIVE, big)
            .unwrap();
        assert_eq!(remaining, 0);
        assert_eq!(custody.external_balance(&exit, &AssetId::NATIVE), big);
    }

    #[test]
    fn forced_withdrawal_to_null_destination_rejected() {
        let (mut v, custody) = setup();
        let alice = Address::from_label("alice");
        custody.fund_external(alice, usdc(), 10);
        v.deposit(alice, usdc(), 10).unwrap();

        let err = v
            .admin_withdraw_from(fixer(), alice, Address::ZERO, usdc(), 10)
            .unwrap_err();
        assert_eq!(err, LedgerError::InvalidIdentity);
        assert_eq!(v.my_balance(&alice, &usdc()), 10);
    }
}
