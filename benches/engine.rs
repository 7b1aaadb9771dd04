// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Timberledger Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Benchmarks for the timber ledger engine.
//!
//! Run with: cargo bench
//!
//! Benchmarks include:
//! - Single-threaded sale processing
//! - Concurrent sales across many lots
//! - Shipment propagation with and without coalescing

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rayon::prelude::*;
use rust_decimal::Decimal;
use std::time::Duration;
use timberledger::{
    ClientId, Currency, Engine, EngineConfig, LotId, LotSpec, RetryPolicy, SaleRequest, SaleUnit,
    ShipmentId, ShipmentSpec,
};

// =============================================================================
// Helper Functions
// =============================================================================

fn bench_engine(window: Duration) -> Engine {
    Engine::with_config(EngineConfig {
        retry: RetryPolicy::immediate(1024),
        propagation_window: window,
    })
}

fn seed_shipment(engine: &Engine) -> ShipmentId {
    engine.register_shipment(ShipmentSpec {
        code: "VAG-BENCH".to_string(),
        origin: "Bratsk".to_string(),
        destination: "Shanghai".to_string(),
        departure_date: None,
        arrival_date: None,
    })
}

/// Registers a lot big enough that benchmark sales never run it dry.
fn seed_big_lot(engine: &Engine, shipment: ShipmentId) -> LotId {
    engine
        .register_lot(
            shipment,
            LotSpec {
                thickness_mm: Decimal::from(50),
                width_mm: Decimal::from(100),
                length_m: Decimal::from(5),
                quantity: 4_000_000,
                purchase_currency: Currency::Usd,
                purchase_amount: Decimal::from(50_000_000),
            },
        )
        .unwrap()
}

fn small_sale(lot: LotId, client: ClientId) -> SaleRequest {
    SaleRequest {
        lot_id: lot,
        client_id: client,
        unit: SaleUnit::Volume,
        sent: Decimal::new(1, 2),
        client_loss: Decimal::ZERO,
        transport_loss: Decimal::ZERO,
        split: None,
        currency: Currency::Usd,
        unit_price: Decimal::from(620),
        paid_amount: Decimal::ZERO,
    }
}

// =============================================================================
// Single-Threaded Benchmarks
// =============================================================================

fn bench_single_sale(c: &mut Criterion) {
    c.bench_function("single_sale", |b| {
        let engine = bench_engine(Duration::from_secs(2));
        let shipment = seed_shipment(&engine);
        let lot = seed_big_lot(&engine, shipment);
        let client = engine.register_client("Bench Client", None);
        b.iter(|| {
            engine.commit_sale(black_box(small_sale(lot, client))).unwrap();
        })
    });
}

fn bench_sale_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("sale_throughput");

    for count in [100, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let engine = bench_engine(Duration::from_secs(2));
                let shipment = seed_shipment(&engine);
                let lot = seed_big_lot(&engine, shipment);
                let client = engine.register_client("Bench Client", None);
                for _ in 0..count {
                    engine.commit_sale(small_sale(lot, client)).unwrap();
                }
                black_box(&engine);
            })
        });
    }
    group.finish();
}

fn bench_commit_delete_cycle(c: &mut Criterion) {
    c.bench_function("commit_delete_cycle", |b| {
        let engine = bench_engine(Duration::from_secs(2));
        let shipment = seed_shipment(&engine);
        let lot = seed_big_lot(&engine, shipment);
        let client = engine.register_client("Bench Client", None);
        b.iter(|| {
            let receipt = engine.commit_sale(small_sale(lot, client)).unwrap();
            engine.delete_sale(receipt.sale.id).unwrap();
        })
    });
}

// =============================================================================
// Concurrent Benchmarks
// =============================================================================

fn bench_concurrent_sales_disjoint_lots(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_sales_disjoint_lots");

    for lots in [2, 8, 32].iter() {
        group.throughput(Throughput::Elements(100 * *lots as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lots), lots, |b, &lots| {
            b.iter(|| {
                let engine = bench_engine(Duration::from_secs(2));
                let shipment = seed_shipment(&engine);
                let lot_ids: Vec<LotId> = (0..lots)
                    .map(|_| seed_big_lot(&engine, shipment))
                    .collect();
                let client = engine.register_client("Bench Client", None);

                lot_ids.par_iter().for_each(|lot| {
                    for _ in 0..100 {
                        engine.commit_sale(small_sale(*lot, client)).unwrap();
                    }
                });
                black_box(&engine);
            })
        });
    }
    group.finish();
}

fn bench_contended_lot(c: &mut Criterion) {
    c.bench_function("contended_lot_8_threads", |b| {
        b.iter(|| {
            let engine = bench_engine(Duration::from_secs(2));
            let shipment = seed_shipment(&engine);
            let lot = seed_big_lot(&engine, shipment);
            let client = engine.register_client("Bench Client", None);

            (0..8).into_par_iter().for_each(|_| {
                for _ in 0..50 {
                    engine.commit_sale(small_sale(lot, client)).unwrap();
                }
            });
            black_box(&engine);
        })
    });
}

// =============================================================================
// Propagation Benchmarks
// =============================================================================

fn bench_propagation_coalescing(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagation");

    // Zero window: every sale triggers a full shipment re-sum
    group.bench_function("uncoalesced", |b| {
        let engine = bench_engine(Duration::ZERO);
        let shipment = seed_shipment(&engine);
        let lot = seed_big_lot(&engine, shipment);
        let client = engine.register_client("Bench Client", None);
        b.iter(|| {
            engine.commit_sale(small_sale(lot, client)).unwrap();
        })
    });

    // Wide window: re-sums are suppressed within the window
    group.bench_function("coalesced", |b| {
        let engine = bench_engine(Duration::from_secs(60));
        let shipment = seed_shipment(&engine);
        let lot = seed_big_lot(&engine, shipment);
        let client = engine.register_client("Bench Client", None);
        b.iter(|| {
            engine.commit_sale(small_sale(lot, client)).unwrap();
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_single_sale,
    bench_sale_throughput,
    bench_commit_delete_cycle,
    bench_concurrent_sales_disjoint_lots,
    bench_contended_lot,
    bench_propagation_coalescing,
);
criterion_main!(benches);
