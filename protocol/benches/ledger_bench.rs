// Ledger bookkeeping benchmarks.
//
// Covers credit/debit round trips on a single account, internal transfers
// between many accounts, and price normalization.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use strongbox_protocol::ledger::{Address, AssetId, AssetLedger, Capacity};
use strongbox_protocol::oracle::{normalize_price, quote_value};

fn bench_credit_debit(c: &mut Criterion) {
    let alice = Address::from_label("alice");
    let mut ledger = AssetLedger::new();
    ledger
        .set_capacity(AssetId::NATIVE, Capacity::Limited(u128::MAX))
        .unwrap();

    c.bench_function("ledger/credit_debit", |b| {
        b.iter(|| {
            ledger.credit(alice, AssetId::NATIVE, 1_000).unwrap();
            ledger.debit(alice, AssetId::NATIVE, 1_000).unwrap();
        });
    });
}

fn bench_transfer_internal(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger/transfer_internal");
    let asset = AssetId::derive("USDC");

    for accounts in [10usize, 100, 1_000] {
        let principals: Vec<Address> = (0..accounts)
            .map(|i| Address::from_label(&format!("holder-{i}")))
            .collect();
        let mut ledger = AssetLedger::new();
        for p in &principals {
            ledger.credit(*p, asset, 1_000_000).unwrap();
        }

        group.throughput(Throughput::Elements(accounts as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(accounts),
            &principals,
            |b, principals| {
                b.iter(|| {
                    for pair in principals.windows(2) {
                        ledger.transfer_internal(pair[0], pair[1], asset, 1).unwrap();
                    }
                    for pair in principals.windows(2) {
                        ledger.transfer_internal(pair[1], pair[0], asset, 1).unwrap();
                    }
                });
            },
        );
    }
    group.finish();
}

fn bench_price_math(c: &mut Criterion) {
    c.bench_function("oracle/normalize_18_to_8", |b| {
        b.iter(|| normalize_price(2_500_123_456_789_012_345_678, 18).unwrap());
    });
    c.bench_function("oracle/quote_value", |b| {
        b.iter(|| quote_value(400_000_000_000_000_000, 250_000_000_000).unwrap());
    });
}

criterion_group!(
    benches,
    bench_credit_debit,
    bench_transfer_internal,
    bench_price_math
);
criterion_main!(benches);
