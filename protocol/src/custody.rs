//! # Custody Gateway
//!
//! The ledger records who owns what; custody is where the value actually
//! sits. A [`CustodyGateway`] moves value between custody and external
//! holders and answers how much custody currently holds.
//!
//! Two properties of real assets shape the interface:
//!
//! - **Deduction on transfer.** Some tokens skim a fee in flight, so an
//!   inbound pull of `declared` may deliver less. `receive_in` reports what
//!   actually arrived and the ledger credits exactly that.
//! - **All-or-nothing outbound.** `send_out` either releases the full amount
//!   or fails; there is no partial success to reconcile.
//!
//! [`InMemoryCustody`] is the reference implementation used by the operator
//! node and the test suites.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use thiserror::Error;

use crate::config::BPS_DENOMINATOR;
use crate::ledger::{Address, Amount, AssetId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Reasons an external value movement did not complete.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// The custody mechanism refused the outbound transfer.
    #[error("outbound transfer of {amount} to {destination} rejected: {reason}")]
    Rejected {
        /// Intended recipient.
        destination: Address,
        /// Amount that was to be released.
        amount: Amount,
        /// Why the mechanism refused.
        reason: String,
    },

    /// The external holder cannot cover the declared inbound amount.
    #[error("holder {holder} has {available}, cannot supply {requested}")]
    HolderInsufficient {
        /// The external holder being pulled from.
        holder: Address,
        /// What the holder has.
        available: Amount,
        /// What was declared.
        requested: Amount,
    },

    /// Custody does not hold enough of the asset to release.
    #[error("custody holds {held}, cannot release {requested}")]
    CustodyInsufficient {
        /// Current custody holding.
        held: Amount,
        /// Amount requested.
        requested: Amount,
    },

    /// The gateway claims to have received more than was declared.
    #[error("gateway reported {received} received for a declared {declared}")]
    OverReported {
        /// Amount declared by the caller.
        declared: Amount,
        /// Amount the gateway reported.
        received: Amount,
    },
}

// ---------------------------------------------------------------------------
// CustodyGateway
// ---------------------------------------------------------------------------

/// External custody collaborator.
pub trait CustodyGateway: Send + Sync {
    /// Releases exactly `amount` of `asset` from custody to `destination`.
    fn send_out(
        &self,
        destination: &Address,
        asset: &AssetId,
        amount: Amount,
    ) -> Result<(), TransferError>;

    /// Pulls `declared` of `asset` from `from` into custody and returns the
    /// amount that actually arrived, which may be less than `declared`.
    fn receive_in(
        &self,
        from: &Address,
        asset: &AssetId,
        declared: Amount,
    ) -> Result<Amount, TransferError>;

    /// Undoes a completed [`receive_in`](Self::receive_in): `from` gets
    /// back the full `declared` amount and custody gives up the `received`
    /// amount it was credited with. Called when the operation that pulled
    /// the value fails afterwards.
    fn reverse_receive(
        &self,
        from: &Address,
        asset: &AssetId,
        declared: Amount,
        received: Amount,
    ) -> Result<(), TransferError>;

    /// How much of `asset` custody currently holds.
    fn custody_held(&self, asset: &AssetId) -> Amount;
}

// ---------------------------------------------------------------------------
// InMemoryCustody
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone)]
struct CustodyState {
    /// `asset -> (holder -> balance)` outside custody.
    external: BTreeMap<AssetId, BTreeMap<Address, Amount>>,
    /// Custody holdings per asset.
    held: BTreeMap<AssetId, Amount>,
    /// Transfer fee in basis points, per asset.
    fee_bps: BTreeMap<AssetId, u32>,
    /// When set, every outbound transfer is refused.
    outbound_halted: bool,
}

impl CustodyState {
    fn external_mut(&mut self, holder: Address, asset: AssetId) -> &mut Amount {
        self.external
            .entry(asset)
            .or_default()
            .entry(holder)
            .or_insert(0)
    }

    fn fee_for(&self, asset: &AssetId, amount: Amount) -> Amount {
        let bps = self.fee_bps.get(asset).copied().unwrap_or(0) as u128;
        // amount * bps could overflow for absurd amounts; divide first then.
        amount
            .checked_mul(bps)
            .map(|v| v / BPS_DENOMINATOR)
            .unwrap_or_else(|| amount / BPS_DENOMINATOR * bps)
    }
}

/// An in-process custody mechanism with external holder balances,
/// per-asset transfer fees, and a switch for refusing outbound transfers.
#[derive(Debug, Default)]
pub struct InMemoryCustody {
    state: Mutex<CustodyState>,
}

impl InMemoryCustody {
    /// Creates an empty custody with no holders and no fees.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gives `holder` external funds to deposit with.
    pub fn fund_external(&self, holder: Address, asset: AssetId, amount: Amount) {
        let mut state = self.state.lock();
        let balance = state.external_mut(holder, asset);
        *balance = balance.saturating_add(amount);
    }

    /// External (non-custodied) balance of `holder`.
    pub fn external_balance(&self, holder: &Address, asset: &AssetId) -> Amount {
        self.state
            .lock()
            .external
            .get(asset)
            .and_then(|m| m.get(holder))
            .copied()
            .unwrap_or(0)
    }

    /// Makes `asset` skim `bps` basis points from every transfer.
    pub fn set_transfer_fee_bps(&self, asset: AssetId, bps: u32) {
        let bps = bps.min(BPS_DENOMINATOR as u32);
        self.state.lock().fee_bps.insert(asset, bps);
    }

    /// Refuses (or resumes) all outbound transfers.
    pub fn halt_outbound(&self, halted: bool) {
        self.state.lock().outbound_halted = halted;
    }

    /// Moves value from `holder` straight into custody without touching the
    /// ledger: the "sent tokens to the contract address" mistake that
    /// recovery's `assign_excess` exists to fix. Returns the amount that
    /// arrived after fees.
    pub fn side_transfer(
        &self,
        holder: Address,
        asset: AssetId,
        amount: Amount,
    ) -> Result<Amount, TransferError> {
        self.pull(&holder, &asset, amount)
    }

    fn pull(&self, from: &Address, asset: &AssetId, declared: Amount) -> Result<Amount, TransferError> {
        let mut state = self.state.lock();

        let available = state
            .external
            .get(asset)
            .and_then(|m| m.get(from))
            .copied()
            .unwrap_or(0);
        if available < declared {
            return Err(TransferError::HolderInsufficient {
                holder: *from,
                available,
                requested: declared,
            });
        }

        let received = declared - state.fee_for(asset, declared);
        *state.external_mut(*from, *asset) = available - declared;
        let held = state.held.entry(*asset).or_insert(0);
        *held = held.saturating_add(received);
        Ok(received)
    }
}

impl CustodyGateway for InMemoryCustody {
    fn send_out(
        &self,
        destination: &Address,
        asset: &AssetId,
        amount: Amount,
    ) -> Result<(), TransferError> {
        let mut state = self.state.lock();

        if state.outbound_halted {
            return Err(TransferError::Rejected {
                destination: *destination,
                amount,
                reason: "outbound transfers are halted".to_string(),
            });
        }

        let held = state.held.get(asset).copied().unwrap_or(0);
        if held < amount {
            return Err(TransferError::CustodyInsufficient {
                held,
                requested: amount,
            });
        }

        // Custody releases the full amount; a fee-skimming asset delivers
        // less to the recipient, which is the recipient's concern.
        let delivered = amount - state.fee_for(asset, amount);
        state.held.insert(*asset, held - amount);
        let balance = state.external_mut(*destination, *asset);
        *balance = balance.saturating_add(delivered);
        Ok(())
    }

    fn receive_in(
        &self,
        from: &Address,
        asset: &AssetId,
        declared: Amount,
    ) -> Result<Amount, TransferError> {
        self.pull(from, asset, declared)
    }

    fn reverse_receive(
        &self,
        from: &Address,
        asset: &AssetId,
        declared: Amount,
        received: Amount,
    ) -> Result<(), TransferError> {
        let mut state = self.state.lock();

        let held = state.held.get(asset).copied().unwrap_or(0);
        if held < received {
            return Err(TransferError::CustodyInsufficient {
                held,
                requested: received,
            });
        }
        state.held.insert(*asset, held - received);
        let balance = state.external_mut(*from, *asset);
        *balance = balance.saturating_add(declared);
        Ok(())
    }

    fn custody_held(&self, asset: &AssetId) -> Amount {
        self.state.lock().held.get(asset).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Address {
        Address::from_label("alice")
    }

    fn fee_token() -> AssetId {
        AssetId::derive("FEE")
    }

    #[test]
    fn receive_in_without_fee_delivers_in_full() {
        let custody = InMemoryCustody::new();
        custody.fund_external(alice(), AssetId::NATIVE, 1_000);

        let received = custody.receive_in(&alice(), &AssetId::NATIVE, 400).unwrap();
        assert_eq!(received, 400);
        assert_eq!(custody.custody_held(&AssetId::NATIVE), 400);
        assert_eq!(custody.external_balance(&alice(), &AssetId::NATIVE), 600);
    }

    #[test]
    fn fee_on_transfer_delivers_less() {
        let custody = InMemoryCustody::new();
        custody.fund_external(alice(), fee_token(), 100);
        custody.set_transfer_fee_bps(fee_token(), 300);

        let received = custody.receive_in(&alice(), &fee_token(), 100).unwrap();
        assert_eq!(received, 97);
        assert_eq!(custody.custody_held(&fee_token()), 97);
        assert_eq!(custody.external_balance(&alice(), &fee_token()), 0);
    }

    #[test]
    fn receive_in_beyond_holder_balance_fails() {
        let custody = InMemoryCustody::new();
        custody.fund_external(alice(), fee_token(), 10);
        let err = custody.receive_in(&alice(), &fee_token(), 11).unwrap_err();
        assert!(matches!(err, TransferError::HolderInsufficient { .. }));
        assert_eq!(custody.custody_held(&fee_token()), 0);
    }

    #[test]
    fn send_out_releases_full_amount() {
        let custody = InMemoryCustody::new();
        custody.fund_external(alice(), AssetId::NATIVE, 500);
        custody.receive_in(&alice(), &AssetId::NATIVE, 500).unwrap();

        let bob = Address::from_label("bob");
        custody.send_out(&bob, &AssetId::NATIVE, 200).unwrap();
        assert_eq!(custody.custody_held(&AssetId::NATIVE), 300);
        assert_eq!(custody.external_balance(&bob, &AssetId::NATIVE), 200);
    }

    #[test]
    fn send_out_beyond_holdings_fails_wholesale() {
        let custody = InMemoryCustody::new();
        let err = custody
            .send_out(&alice(), &AssetId::NATIVE, 1)
            .unwrap_err();
        assert_eq!(
            err,
            TransferError::CustodyInsufficient {
                held: 0,
                requested: 1
            }
        );
    }

    #[test]
    fn halted_outbound_refuses() {
        let custody = InMemoryCustody::new();
        custody.fund_external(alice(), AssetId::NATIVE, 5);
        custody.receive_in(&alice(), &AssetId::NATIVE, 5).unwrap();
        custody.halt_outbound(true);

        let err = custody.send_out(&alice(), &AssetId::NATIVE, 5).unwrap_err();
        assert!(matches!(err, TransferError::Rejected { .. }));
        assert_eq!(custody.custody_held(&AssetId::NATIVE), 5);

        custody.halt_outbound(false);
        custody.send_out(&alice(), &AssetId::NATIVE, 5).unwrap();
    }

    #[test]
    fn side_transfer_lands_in_custody() {
        let custody = InMemoryCustody::new();
        custody.fund_external(alice(), fee_token(), 50);
        assert_eq!(custody.side_transfer(alice(), fee_token(), 50).unwrap(), 50);
        assert_eq!(custody.custody_held(&fee_token()), 50);
    }

    #[test]
    fn fee_is_capped_at_full_amount() {
        let custody = InMemoryCustody::new();
        custody.set_transfer_fee_bps(fee_token(), 20_000);
        custody.fund_external(alice(), fee_token(), 10);
        assert_eq!(custody.receive_in(&alice(), &fee_token(), 10).unwrap(), 0);
    }

    #[test]
    fn reverse_receive_restores_both_sides() {
        let custody = InMemoryCustody::new();
        custody.set_transfer_fee_bps(fee_token(), 300);
        custody.fund_external(alice(), fee_token(), 100);
        let received = custody.receive_in(&alice(), &fee_token(), 100).unwrap();
        assert_eq!(received, 97);

        custody
            .reverse_receive(&alice(), &fee_token(), 100, received)
            .unwrap();
        assert_eq!(custody.external_balance(&alice(), &fee_token()), 100);
        assert_eq!(custody.custody_held(&fee_token()), 0);
    }

    #[test]
    fn reverse_receive_beyond_holdings_fails() {
        let custody = InMemoryCustody::new();
        let err = custody
            .reverse_receive(&alice(), &AssetId::NATIVE, 5, 5)
            .unwrap_err();
        assert!(matches!(err, TransferError::CustodyInsufficient { .. }));
        assert_eq!(custody.external_balance(&alice(), &AssetId::NATIVE), 0);
    }
}
