//! Property tests for the asset ledger and the price math.
//!
//! The ledger is exercised directly, without a vault around it, so that
//! every failure path is reached with arbitrary inputs rather than the ones
//! the vault happens to produce.

use proptest::prelude::*;

use strongbox_protocol::config::{NATIVE_UNIT, PRICE_SCALE};
use strongbox_protocol::ledger::{Address, Amount, AssetId, AssetLedger, Capacity};
use strongbox_protocol::oracle::{normalize_price, quote_value};
use strongbox_protocol::LedgerError;

#[derive(Debug, Clone)]
enum Step {
    Credit(usize, Amount),
    Debit(usize, Amount),
    Transfer(usize, usize, Amount),
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0usize..3, 0u128..2_000).prop_map(|(w, a)| Step::Credit(w, a)),
        (0usize..3, 0u128..2_000).prop_map(|(w, a)| Step::Debit(w, a)),
        (0usize..3, 0usize..3, 0u128..2_000).prop_map(|(f, t, a)| Step::Transfer(f, t, a)),
    ]
}

fn holders() -> [Address; 3] {
    [
        Address::from_label("h0"),
        Address::from_label("h1"),
        Address::from_label("h2"),
    ]
}

proptest! {
    /// Property: total == sum of balances and total <= capacity after every
    /// step, and a failed step changes nothing.
    #[test]
    fn conservation_and_capacity(
        capacity in 0u128..5_000,
        steps in prop::collection::vec(step_strategy(), 1..60)
    ) {
        let asset = AssetId::derive("PROP");
        let who = holders();
        let mut ledger = AssetLedger::new();
        ledger.set_capacity(asset, Capacity::Limited(capacity)).unwrap();

        for step in steps {
            let before = ledger.clone();
            let result = match step {
                Step::Credit(w, a) => ledger.credit(who[w], asset, a).map(|_| ()),
                Step::Debit(w, a) => ledger.debit(who[w], asset, a).map(|_| ()),
                Step::Transfer(f, t, a) => ledger.transfer_internal(who[f], who[t], asset, a),
            };

            prop_assert_eq!(ledger.total_of(&asset), ledger.sum_of_balances(&asset));
            prop_assert!(ledger.total_of(&asset) <= capacity);
            if result.is_err() {
                prop_assert_eq!(&ledger, &before);
            }
        }
    }

    /// Property: a debit beyond the balance always reports the exact
    /// shortfall and never goes negative.
    #[test]
    fn overdraw_always_fails(balance in 1u128..1_000_000, extra in 1u128..1_000_000) {
        let asset = AssetId::NATIVE;
        let [h0, _, _] = holders();
        let mut ledger = AssetLedger::new();
        ledger.credit(h0, asset, balance).unwrap();

        let err = ledger.debit(h0, asset, balance + extra).unwrap_err();
        prop_assert_eq!(
            err,
            LedgerError::InsufficientBalance { available: balance, requested: balance + extra }
        );
        prop_assert_eq!(ledger.balance_of(&h0, &asset), balance);
    }

    /// Property: quote value is monotonic in the amount and never rounds up.
    #[test]
    fn quote_value_truncates(amount in 0u128..1_000 * NATIVE_UNIT, price in 1u128..1_000_000 * PRICE_SCALE) {
        let value = quote_value(amount, price).unwrap();
        prop_assert!(value * NATIVE_UNIT <= amount * price);
        prop_assert!(quote_value(amount + 1, price).unwrap() >= value);
    }

    /// Property: rescaling an 18-decimal answer to 8 decimals drops exactly
    /// ten digits.
    #[test]
    fn normalization_from_18_decimals(answer in 1u128..u64::MAX as u128) {
        let scaled = answer * 10_000_000_000;
        prop_assert_eq!(normalize_price(scaled, 18).unwrap(), answer);
    }
}
