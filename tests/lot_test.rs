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

//! Lot and client document API tests.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use timberledger::{
    Client, ClientId, Currency, DebtCategory, LedgerError, Lot, LotId, LotSpec, ResponsibleParty,
    SaleEffects, ShipmentId,
};

/// 25×150 mm boards, 4 m long: 0.015 m³ each, 600 pieces = 9 m³.
fn thin_board_lot() -> Lot {
    Lot::new(
        LotId(7),
        ShipmentId(2),
        LotSpec {
            thickness_mm: dec!(25),
            width_mm: dec!(150),
            length_m: dec!(4),
            quantity: 600,
            purchase_currency: Currency::Rub,
            purchase_amount: dec!(540000),
        },
    )
}

fn effects(dispatch: Decimal, accepted: Decimal, revenue: Decimal) -> SaleEffects {
    SaleEffects {
        dispatch_volume: dispatch,
        accepted_volume: accepted,
        revenue,
        currency: Currency::Rub,
    }
}

#[test]
fn unit_volume_and_quantity_derivation() {
    let lot = thin_board_lot();
    let snapshot = lot.snapshot();
    assert_eq!(snapshot.unit_volume, dec!(0.015));
    assert_eq!(snapshot.total_volume, dec!(9.000));
    assert_eq!(snapshot.break_even_price, dec!(60000));
    assert_eq!(snapshot.remaining_quantity, 600);
}

#[test]
fn remaining_quantity_floors_partial_pieces() {
    let lot = thin_board_lot();
    let version = lot.snapshot().version;
    // Dispatch 0.02 m³: one full board plus a sliver
    lot.apply_sale(version, &effects(dec!(0.02), dec!(0.02), dec!(1300)))
        .unwrap();
    let snapshot = lot.snapshot();
    assert_eq!(snapshot.available_volume, dec!(8.980));
    // 8.98 / 0.015 = 598.67 → 598 whole boards
    assert_eq!(snapshot.remaining_quantity, 598);
}

#[test]
fn sequential_sales_accumulate() {
    let lot = thin_board_lot();
    for _ in 0..5 {
        let version = lot.snapshot().version;
        lot.apply_sale(version, &effects(dec!(1.5), dec!(1.5), dec!(97500)))
            .unwrap();
    }
    let snapshot = lot.snapshot();
    assert_eq!(snapshot.dispatched_volume, dec!(7.5));
    assert_eq!(snapshot.available_volume, dec!(1.500));
    assert_eq!(snapshot.revenue.rub, dec!(487500));
    // 487500 − 7.5 × 60000 = 37500
    assert_eq!(snapshot.realized_profit.rub, dec!(37500));
    assert_eq!(snapshot.version, 5);
}

#[test]
fn expense_reallocates_unrealized_value() {
    let lot = thin_board_lot();
    lot.allocate_expense(dec!(54000)).unwrap();
    let snapshot = lot.snapshot();
    // 594000 / 9 = 66000 per m³, all of it still in the warehouse
    assert_eq!(snapshot.break_even_price, dec!(66000));
    assert_eq!(snapshot.unrealized_value, dec!(594000.000));
}

#[test]
fn non_positive_expense_rejected() {
    let lot = thin_board_lot();
    assert_eq!(
        lot.allocate_expense(Decimal::ZERO),
        Err(LedgerError::InvalidPayment)
    );
    assert_eq!(
        lot.allocate_expense(dec!(-5)),
        Err(LedgerError::InvalidPayment)
    );
}

#[test]
fn loss_audit_trail_keeps_party_and_reason() {
    let lot = thin_board_lot();
    lot.record_loss(dec!(0.3), ResponsibleParty::Carrier, "crane drop")
        .unwrap();
    lot.record_loss(dec!(0.1), ResponsibleParty::Seller, "mold")
        .unwrap();

    let records = lot.loss_records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].volume, dec!(0.3));
    assert_eq!(records[0].party, ResponsibleParty::Carrier);
    assert_eq!(records[0].reason, "crane drop");
    assert_eq!(lot.snapshot().loss_volume, dec!(0.4));
}

#[test]
fn snapshot_serializes_with_string_decimals() {
    let lot = thin_board_lot();
    let json = serde_json::to_value(lot.snapshot()).unwrap();
    assert_eq!(json["total_volume"].as_str().unwrap(), "9.000");
    assert_eq!(json["purchase_currency"].as_str().unwrap(), "rub");
    assert_eq!(json["remaining_quantity"].as_u64().unwrap(), 600);
}

#[test]
fn client_snapshot_serializes_all_lanes() {
    let client = Client::new(ClientId(3), "Manzhouli Wood", Some("+86 470 000 000".into()));
    client
        .increase_debt(Currency::Usd, DebtCategory::Goods, dec!(1200.50))
        .unwrap();
    client
        .increase_debt(Currency::Rub, DebtCategory::Delivery, dec!(43000))
        .unwrap();

    let json = serde_json::to_value(client.snapshot()).unwrap();
    assert_eq!(json["name"].as_str().unwrap(), "Manzhouli Wood");
    assert_eq!(
        json["goods"]["usd"]["total_debt"].as_str().unwrap(),
        "1200.50"
    );
    assert_eq!(
        json["delivery"]["rub"]["total_debt"].as_str().unwrap(),
        "43000"
    );
    assert_eq!(json["delivery"]["usd"]["total_debt"].as_str().unwrap(), "0");
}

#[test]
fn reversal_returns_version_to_motion() {
    // Versions only move forward; a reversal is a new mutation, not a rewind
    let lot = thin_board_lot();
    let before = lot.snapshot().version;
    let sale = effects(dec!(1.5), dec!(1.5), dec!(97500));
    lot.apply_sale(before, &sale).unwrap();
    lot.reverse_sale(&sale);
    let snapshot = lot.snapshot();
    assert_eq!(snapshot.version, before + 2);
    assert_eq!(snapshot.available_volume, dec!(9.000));
}
