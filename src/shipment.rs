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

//! Shipment lifecycle and rolled-up aggregates.
//!
//! A shipment never computes its own numbers incrementally; its aggregates
//! are re-summed from constituent lot snapshots. Re-summing instead of
//! trusting accumulated deltas means a missed or doubled propagation can
//! never leave the totals permanently drifted.

use crate::base::{PerCurrency, ShipmentId};
use crate::error::LedgerError;
use crate::lot::LotSnapshot;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Shipment lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShipmentStatus {
    Active,
    Closing,
    Closed,
    Archived,
}

/// Registration details for a shipment.
#[derive(Debug, Clone, Deserialize)]
pub struct ShipmentSpec {
    pub code: String,
    pub origin: String,
    pub destination: String,
    pub departure_date: Option<String>,
    pub arrival_date: Option<String>,
}

/// Aggregates re-summed over a shipment's lots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShipmentRollup {
    pub total_volume: Decimal,
    /// Warehouse losses plus in-sale breakage across all lots.
    pub total_loss: Decimal,
    /// Volume accepted by clients.
    pub sold_volume: Decimal,
    pub remaining_volume: Decimal,
    pub total_cost: PerCurrency,
    pub total_revenue: PerCurrency,
    pub total_profit: PerCurrency,
}

impl ShipmentRollup {
    /// Folds one lot into the rollup.
    pub fn absorb(&mut self, lot: &LotSnapshot) {
        self.total_volume += lot.total_volume;
        // Sale breakage is the dispatched volume that was never accepted
        self.total_loss += lot.loss_volume + (lot.dispatched_volume - lot.sold_volume);
        self.sold_volume += lot.sold_volume;
        self.remaining_volume += lot.available_volume;
        self.total_cost
            .add(lot.purchase_currency, lot.total_investment);
        self.total_revenue += lot.revenue;
        self.total_profit += lot.realized_profit;
    }
}

#[derive(Debug)]
struct ShipmentData {
    id: ShipmentId,
    code: String,
    status: ShipmentStatus,
    origin: String,
    destination: String,
    departure_date: Option<String>,
    arrival_date: Option<String>,
    rollup: ShipmentRollup,
    version: u64,
}

/// Point-in-time view of a shipment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShipmentSnapshot {
    pub id: ShipmentId,
    pub code: String,
    pub status: ShipmentStatus,
    pub origin: String,
    pub destination: String,
    pub departure_date: Option<String>,
    pub arrival_date: Option<String>,
    #[serde(flatten)]
    pub rollup: ShipmentRollup,
    pub version: u64,
}

/// One rail-car shipment aggregating its lots.
#[derive(Debug)]
pub struct Shipment {
    inner: Mutex<ShipmentData>,
}

impl Shipment {
    pub fn new(id: ShipmentId, spec: ShipmentSpec) -> Self {
        Self {
            inner: Mutex::new(ShipmentData {
                id,
                code: spec.code,
                status: ShipmentStatus::Active,
                origin: spec.origin,
                destination: spec.destination,
                departure_date: spec.departure_date,
                arrival_date: spec.arrival_date,
                rollup: ShipmentRollup::default(),
                version: 0,
            }),
        }
    }

    pub fn status(&self) -> ShipmentStatus {
        self.inner.lock().status
    }

    /// Whether lot inventory under this shipment may still change.
    pub fn accepts_inventory_changes(&self) -> bool {
        matches!(
            self.inner.lock().status,
            ShipmentStatus::Active | ShipmentStatus::Closing
        )
    }

    /// Replaces the stored aggregates with a fresh re-sum.
    pub fn apply_rollup(&self, rollup: ShipmentRollup) {
        let mut data = self.inner.lock();
        debug_assert!(
            rollup.remaining_volume
                == rollup.total_volume - rollup.sold_volume - rollup.total_loss,
            "Invariant violated: remaining {} != total {} - sold {} - loss {}",
            rollup.remaining_volume,
            rollup.total_volume,
            rollup.sold_volume,
            rollup.total_loss
        );
        data.rollup = rollup;
        data.version += 1;
    }

    /// Marks the shipment as winding down; sales are still permitted.
    pub fn begin_closing(&self) -> Result<(), LedgerError> {
        let mut data = self.inner.lock();
        match data.status {
            ShipmentStatus::Active => {
                data.status = ShipmentStatus::Closing;
                data.version += 1;
                Ok(())
            }
            _ => Err(LedgerError::IrreversibleState),
        }
    }

    /// Closes the shipment. After this, inventory under it is frozen.
    pub fn close(&self) -> Result<(), LedgerError> {
        let mut data = self.inner.lock();
        match data.status {
            ShipmentStatus::Active | ShipmentStatus::Closing => {
                data.status = ShipmentStatus::Closed;
                data.version += 1;
                Ok(())
            }
            _ => Err(LedgerError::IrreversibleState),
        }
    }

    /// Archives a closed shipment.
    pub fn archive(&self) -> Result<(), LedgerError> {
        let mut data = self.inner.lock();
        match data.status {
            ShipmentStatus::Closed => {
                data.status = ShipmentStatus::Archived;
                data.version += 1;
                Ok(())
            }
            _ => Err(LedgerError::IrreversibleState),
        }
    }

    pub fn snapshot(&self) -> ShipmentSnapshot {
        let data = self.inner.lock();
        ShipmentSnapshot {
            id: data.id,
            code: data.code.clone(),
            status: data.status,
            origin: data.origin.clone(),
            destination: data.destination.clone(),
            departure_date: data.departure_date.clone(),
            arrival_date: data.arrival_date.clone(),
            rollup: data.rollup,
            version: data.version,
        }
    }
}
