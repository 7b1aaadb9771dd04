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

//! Property-based tests for the ledger engine.
//!
//! These verify invariants that should hold for any sequence of valid
//! operations: volume conservation, the current-debt floor, and the
//! commit/delete round-trip law.

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;
use timberledger::{
    ClientId, Currency, DebtCategory, Engine, EngineConfig, LiabilitySplit, LotId, LotSpec,
    ResponsibleParty, RetryPolicy, SaleRequest, SaleUnit, ShipmentSpec,
};

// =============================================================================
// Arbitrary Strategies
// =============================================================================

/// Volume between 0.0001 and 1.0000 m³, four decimal places.
fn arb_volume() -> impl Strategy<Value = Decimal> {
    (1i64..=10_000i64).prop_map(|units| Decimal::new(units, 4))
}

/// Unit price between 1.00 and 1000.00.
fn arb_price() -> impl Strategy<Value = Decimal> {
    (100i64..=100_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Liability split percentages that do sum to 100.
fn arb_balanced_split() -> impl Strategy<Value = LiabilitySplit> {
    (0i64..=10_000i64).prop_map(|buyer_bp| {
        let buyer_pct = Decimal::new(buyer_bp, 2);
        LiabilitySplit {
            seller_pct: Decimal::ONE_HUNDRED - buyer_pct,
            buyer_pct,
        }
    })
}

fn test_engine() -> Engine {
    Engine::with_config(EngineConfig {
        retry: RetryPolicy::immediate(5),
        propagation_window: Duration::ZERO,
    })
}

/// 10 m³ lot and a client to sell to.
fn seed(engine: &Engine) -> (LotId, ClientId) {
    let shipment = engine.register_shipment(ShipmentSpec {
        code: "VAG-PROP".to_string(),
        origin: "Bratsk".to_string(),
        destination: "Shanghai".to_string(),
        departure_date: None,
        arrival_date: None,
    });
    let lot = engine
        .register_lot(
            shipment,
            LotSpec {
                thickness_mm: dec!(50),
                width_mm: dec!(100),
                length_m: dec!(5),
                quantity: 400,
                purchase_currency: Currency::Usd,
                purchase_amount: dec!(5000),
            },
        )
        .unwrap();
    let client = engine.register_client("Harbin Timber Trade", None);
    (lot, client)
}

fn volume_sale(lot: LotId, client: ClientId, sent: Decimal, price: Decimal) -> SaleRequest {
    SaleRequest {
        lot_id: lot,
        client_id: client,
        unit: SaleUnit::Volume,
        sent,
        client_loss: Decimal::ZERO,
        transport_loss: Decimal::ZERO,
        split: None,
        currency: Currency::Usd,
        unit_price: price,
        paid_amount: Decimal::ZERO,
    }
}

// =============================================================================
// Invariant Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// available + dispatched + loss == total, for any mix of sales and
    /// losses (failed operations included, they must not move anything).
    #[test]
    fn volume_conservation_holds(
        sales in prop::collection::vec(arb_volume(), 0..20),
        losses in prop::collection::vec(arb_volume(), 0..5),
    ) {
        let engine = test_engine();
        let (lot, client) = seed(&engine);

        for volume in &sales {
            let _ = engine.commit_sale(volume_sale(lot, client, *volume, dec!(620)));
        }
        for volume in &losses {
            let _ = engine.record_lot_loss(lot, *volume, ResponsibleParty::Seller, "breakage");
        }

        let s = engine.lot_snapshot(lot).unwrap();
        prop_assert_eq!(
            s.available_volume + s.dispatched_volume + s.loss_volume,
            s.total_volume
        );
        prop_assert!(s.available_volume >= Decimal::ZERO);
    }

    /// current_debt == max(0, total_debt − total_paid) after any sequence of
    /// sales and payments.
    #[test]
    fn current_debt_floor_holds(
        sales in prop::collection::vec((arb_volume(), arb_price()), 1..10),
        payments in prop::collection::vec(arb_price(), 0..10),
    ) {
        let engine = test_engine();
        let (lot, client) = seed(&engine);

        for (volume, price) in &sales {
            let _ = engine.commit_sale(volume_sale(lot, client, *volume, *price));
        }
        for amount in &payments {
            let _ = engine.adjust_debt(
                client,
                Currency::Usd,
                DebtCategory::Goods,
                timberledger::DebtAdjustment::Decrease,
                *amount,
            );
        }

        let account = engine
            .client_snapshot(client)
            .unwrap()
            .account(Currency::Usd, DebtCategory::Goods);
        prop_assert_eq!(
            account.current(),
            (account.total_debt - account.total_paid).max(Decimal::ZERO)
        );
        prop_assert!(account.current() >= Decimal::ZERO);
    }

    /// Committing then deleting a sale restores lot and client state.
    #[test]
    fn commit_delete_round_trips(
        sent in arb_volume(),
        price in arb_price(),
        paid_ratio in 0u32..=100u32,
    ) {
        let engine = test_engine();
        let (lot, client) = seed(&engine);

        // A prior sale so the round trip starts from a non-trivial state
        engine
            .commit_sale(volume_sale(lot, client, dec!(1.5), dec!(510)))
            .unwrap();

        let lot_before = engine.lot_snapshot(lot).unwrap();
        let client_before = engine.client_snapshot(client).unwrap();

        let mut request = volume_sale(lot, client, sent, price);
        let total = (price * sent).round_dp(2);
        request.paid_amount = (total * Decimal::from(paid_ratio) / Decimal::ONE_HUNDRED)
            .round_dp(2);
        let receipt = engine.commit_sale(request).unwrap();
        engine.delete_sale(receipt.sale.id).unwrap();

        let lot_after = engine.lot_snapshot(lot).unwrap();
        let client_after = engine.client_snapshot(client).unwrap();
        prop_assert_eq!(lot_after.available_volume, lot_before.available_volume);
        prop_assert_eq!(lot_after.dispatched_volume, lot_before.dispatched_volume);
        prop_assert_eq!(lot_after.sold_volume, lot_before.sold_volume);
        prop_assert_eq!(lot_after.realized_profit, lot_before.realized_profit);
        prop_assert_eq!(lot_after.unrealized_value, lot_before.unrealized_value);
        prop_assert_eq!(
            client_after.account(Currency::Usd, DebtCategory::Goods),
            client_before.account(Currency::Usd, DebtCategory::Goods)
        );
    }

    /// A request beyond remaining + epsilon is always rejected and mutates
    /// nothing.
    #[test]
    fn oversell_never_mutates(
        excess in (1i64..=100_000i64).prop_map(|units| Decimal::new(units, 4)),
    ) {
        let engine = test_engine();
        let (lot, client) = seed(&engine);

        let before = engine.lot_snapshot(lot).unwrap();
        let request = volume_sale(lot, client, before.available_volume + excess, dec!(620));
        prop_assert!(engine.commit_sale(request).is_err());
        prop_assert_eq!(engine.lot_snapshot(lot).unwrap(), before);
    }

    /// Splits that do not sum to 100 are rejected before any mutation;
    /// balanced splits always apportion back to the whole loss.
    #[test]
    fn liability_split_law(
        split in arb_balanced_split(),
        loss in arb_volume(),
        skew in prop::option::of(1i64..=1_000i64),
    ) {
        let (seller, buyer) = split.apportion(loss);
        prop_assert_eq!(seller + buyer, loss);

        if let Some(skew) = skew {
            // Any nonzero skew breaks the sum and must be rejected
            let engine = test_engine();
            let (lot, client) = seed(&engine);
            let before = engine.lot_snapshot(lot).unwrap();

            let mut request = volume_sale(lot, client, dec!(5), dec!(620));
            request.transport_loss = loss.min(dec!(4));
            request.split = Some(LiabilitySplit {
                seller_pct: split.seller_pct + Decimal::new(skew, 2),
                buyer_pct: split.buyer_pct,
            });
            prop_assert_eq!(
                engine.commit_sale(request).unwrap_err(),
                timberledger::LedgerError::InvalidLiabilitySplit
            );
            prop_assert_eq!(engine.lot_snapshot(lot).unwrap(), before);
        }
    }
}
