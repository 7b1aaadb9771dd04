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

//! Lot inventory ledger.
//!
//! A [`Lot`] is the single source of truth for one batch of wood: its
//! volumetric counters (available, dispatched, lost) and the financial
//! aggregates derived from them. All mutations are deltas; every mutation
//! bumps the document version so a sale commit that validated against a
//! stale snapshot is told to re-read instead of silently double-applying.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use timberledger::{Currency, Lot, LotId, LotSpec, ShipmentId};
//!
//! let lot = Lot::new(LotId(1), ShipmentId(1), LotSpec {
//!     thickness_mm: dec!(50),
//!     width_mm: dec!(150),
//!     length_m: dec!(6),
//!     quantity: 200,
//!     purchase_currency: Currency::Usd,
//!     purchase_amount: dec!(4500),
//! });
//! assert_eq!(lot.snapshot().total_volume, dec!(9.0));
//! ```

use crate::base::{Currency, LotId, PerCurrency, ResponsibleParty, ShipmentId};
use crate::error::LedgerError;
use crate::validate::VOLUME_EPSILON;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

/// Millimeters-squared per square meter, for board volume from dimensions.
const MM2_PER_M2: Decimal = rust_decimal_macros::dec!(1_000_000);

/// Physical description of a lot at registration.
#[derive(Debug, Clone, Copy)]
pub struct LotSpec {
    pub thickness_mm: Decimal,
    pub width_mm: Decimal,
    pub length_m: Decimal,
    pub quantity: u32,
    pub purchase_currency: Currency,
    pub purchase_amount: Decimal,
}

/// Lot-side effect of one sale, already converted to cubic meters.
///
/// Applied and reversed as a unit so the lot sees a sale as a single
/// version bump in both directions.
#[derive(Debug, Clone, Copy)]
pub struct SaleEffects {
    /// Volume leaving the warehouse toward the client. Dispatched volume
    /// never returns; its full cost is realized whether or not every cubic
    /// meter of it earned revenue.
    pub dispatch_volume: Decimal,
    /// Volume the client accepted in good condition.
    pub accepted_volume: Decimal,
    /// Revenue booked for the billable portion.
    pub revenue: Decimal,
    pub currency: Currency,
}

/// Audit record for a direct warehouse loss.
#[derive(Debug, Clone, Serialize)]
pub struct LossRecord {
    pub volume: Decimal,
    pub party: ResponsibleParty,
    pub reason: String,
}

#[derive(Debug)]
struct LotData {
    id: LotId,
    shipment_id: ShipmentId,
    quantity: u32,
    unit_volume: Decimal,
    total_volume: Decimal,
    purchase_currency: Currency,
    purchase_amount: Decimal,
    /// Expenses allocated to this lot, in the purchase currency.
    expenses: Decimal,
    loss_volume: Decimal,
    losses: Vec<LossRecord>,
    dispatched_volume: Decimal,
    sold_volume: Decimal,
    revenue: PerCurrency,
    /// Optimistic-concurrency token; bumped by every mutation.
    version: u64,
    // Derived, refreshed by recompute()
    total_investment: Decimal,
    break_even_price: Decimal,
    realized_profit: PerCurrency,
    unrealized_value: Decimal,
}

impl LotData {
    fn new(id: LotId, shipment_id: ShipmentId, spec: LotSpec) -> Self {
        // Board volume in m³: (thickness × width) mm² → m², times length in m
        let unit_volume =
            (spec.thickness_mm * spec.width_mm / MM2_PER_M2 * spec.length_m).round_dp(6);
        let total_volume = unit_volume * Decimal::from(spec.quantity);
        let mut data = Self {
            id,
            shipment_id,
            quantity: spec.quantity,
            unit_volume,
            total_volume,
            purchase_currency: spec.purchase_currency,
            purchase_amount: spec.purchase_amount,
            expenses: Decimal::ZERO,
            loss_volume: Decimal::ZERO,
            losses: Vec::new(),
            dispatched_volume: Decimal::ZERO,
            sold_volume: Decimal::ZERO,
            revenue: PerCurrency::ZERO,
            version: 0,
            total_investment: Decimal::ZERO,
            break_even_price: Decimal::ZERO,
            realized_profit: PerCurrency::ZERO,
            unrealized_value: Decimal::ZERO,
        };
        data.recompute();
        data
    }

    fn available(&self) -> Decimal {
        self.total_volume - self.loss_volume - self.dispatched_volume
    }

    fn remaining_quantity(&self) -> u32 {
        if self.unit_volume <= Decimal::ZERO {
            return 0;
        }
        (self.available() / self.unit_volume)
            .floor()
            .to_u32()
            .unwrap_or(0)
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.available() >= -VOLUME_EPSILON,
            "Invariant violated: available volume went negative: {}",
            self.available()
        );
        debug_assert!(
            self.dispatched_volume + VOLUME_EPSILON >= self.sold_volume,
            "Invariant violated: sold volume {} exceeds dispatched {}",
            self.sold_volume,
            self.dispatched_volume
        );
    }

    /// Refreshes the derived aggregates from the primitive counters.
    ///
    /// Idempotent: with no intervening mutation a second call is a no-op.
    fn recompute(&mut self) {
        self.total_investment = self.purchase_amount + self.expenses;
        self.break_even_price = if self.total_volume > Decimal::ZERO {
            self.total_investment / self.total_volume
        } else {
            Decimal::ZERO
        };
        // Cost of everything that left the lot through sales, charged to the
        // purchase currency; in-sale breakage carried cost but no revenue
        let realized_cost = self.dispatched_volume * self.break_even_price;
        let mut profit = self.revenue;
        profit.add(self.purchase_currency, -realized_cost);
        self.realized_profit = profit;
        self.unrealized_value = self.available() * self.break_even_price;
    }

    fn apply_sale(&mut self, effects: &SaleEffects) {
        self.dispatched_volume += effects.dispatch_volume;
        self.sold_volume += effects.accepted_volume;
        self.revenue.add(effects.currency, effects.revenue);
        self.version += 1;
        self.recompute();
        self.assert_invariants();
    }

    fn reverse_sale(&mut self, effects: &SaleEffects) {
        self.dispatched_volume -= effects.dispatch_volume;
        self.sold_volume -= effects.accepted_volume;
        self.revenue.add(effects.currency, -effects.revenue);
        self.version += 1;
        self.recompute();
        self.assert_invariants();
    }
}

/// Point-in-time view of a lot, carried into validation and API responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LotSnapshot {
    pub id: LotId,
    pub shipment_id: ShipmentId,
    pub quantity: u32,
    pub unit_volume: Decimal,
    pub total_volume: Decimal,
    pub purchase_currency: Currency,
    pub purchase_amount: Decimal,
    pub expenses: Decimal,
    pub loss_volume: Decimal,
    pub dispatched_volume: Decimal,
    pub sold_volume: Decimal,
    pub available_volume: Decimal,
    pub remaining_quantity: u32,
    pub total_investment: Decimal,
    pub break_even_price: Decimal,
    pub realized_profit: PerCurrency,
    pub unrealized_value: Decimal,
    pub revenue: PerCurrency,
    pub version: u64,
}

/// One wood lot behind a mutex.
#[derive(Debug)]
pub struct Lot {
    inner: Mutex<LotData>,
}

impl Lot {
    pub fn new(id: LotId, shipment_id: ShipmentId, spec: LotSpec) -> Self {
        Self {
            inner: Mutex::new(LotData::new(id, shipment_id, spec)),
        }
    }

    pub fn shipment_id(&self) -> ShipmentId {
        self.inner.lock().shipment_id
    }

    pub fn snapshot(&self) -> LotSnapshot {
        let data = self.inner.lock();
        LotSnapshot {
            id: data.id,
            shipment_id: data.shipment_id,
            quantity: data.quantity,
            unit_volume: data.unit_volume,
            total_volume: data.total_volume,
            purchase_currency: data.purchase_currency,
            purchase_amount: data.purchase_amount,
            expenses: data.expenses,
            loss_volume: data.loss_volume,
            dispatched_volume: data.dispatched_volume,
            sold_volume: data.sold_volume,
            available_volume: data.available(),
            remaining_quantity: data.remaining_quantity(),
            total_investment: data.total_investment,
            break_even_price: data.break_even_price,
            realized_profit: data.realized_profit,
            unrealized_value: data.unrealized_value,
            revenue: data.revenue,
            version: data.version,
        }
    }

    /// Applies a sale's lot-side effects if the lot is still at the version
    /// the caller validated against.
    ///
    /// # Errors
    ///
    /// [`LedgerError::WriteConflict`] when another writer got in between the
    /// snapshot and this commit; the caller must re-read and re-validate.
    pub fn apply_sale(
        &self,
        expected_version: u64,
        effects: &SaleEffects,
    ) -> Result<(), LedgerError> {
        let mut data = self.inner.lock();
        if data.version != expected_version {
            return Err(LedgerError::WriteConflict);
        }
        data.apply_sale(effects);
        Ok(())
    }

    /// Backs out a previously applied sale. Pure delta, no version check:
    /// the effects being reversed are taken from the committed sale record,
    /// not from a read of current state.
    pub fn reverse_sale(&self, effects: &SaleEffects) {
        self.inner.lock().reverse_sale(effects);
    }

    /// Records a permanent warehouse loss: volume leaves `available`
    /// directly, bypassing dispatch.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidLoss`] for non-positive volume,
    /// [`LedgerError::InsufficientInventory`] when the loss exceeds what the
    /// lot still holds.
    pub fn record_loss(
        &self,
        volume: Decimal,
        party: ResponsibleParty,
        reason: impl Into<String>,
    ) -> Result<(), LedgerError> {
        let mut data = self.inner.lock();
        if volume <= Decimal::ZERO {
            return Err(LedgerError::InvalidLoss);
        }
        if volume > data.available() + VOLUME_EPSILON {
            return Err(LedgerError::InsufficientInventory {
                requested: volume,
                available: data.available(),
            });
        }
        data.loss_volume += volume;
        data.losses.push(LossRecord {
            volume,
            party,
            reason: reason.into(),
        });
        data.version += 1;
        data.recompute();
        data.assert_invariants();
        Ok(())
    }

    /// Allocates an expense to this lot, raising its total investment and
    /// break-even price. Amount is in the lot's purchase currency.
    pub fn allocate_expense(&self, amount: Decimal) -> Result<(), LedgerError> {
        let mut data = self.inner.lock();
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidPayment);
        }
        data.expenses += amount;
        data.version += 1;
        data.recompute();
        Ok(())
    }

    /// Re-derives the cached aggregates. Idempotent; exists so reconciliation
    /// can force a refresh without going through a mutation.
    pub fn recompute_aggregates(&self) {
        self.inner.lock().recompute();
    }

    /// Audit trail of direct losses.
    pub fn loss_records(&self) -> Vec<LossRecord> {
        self.inner.lock().losses.clone()
    }
}
