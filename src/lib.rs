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

//! # Timberledger
//!
//! Lot inventory and financial ledger engine for a timber export operation:
//! wood lots move from acquisition through warehousing, dispatch and sale,
//! with client debt tracked per currency (USD, RUB) and per category
//! (goods, delivery), and a cash journal mirroring every monetary effect.
//!
//! ## Core Components
//!
//! - [`Engine`]: Sale transaction processor and single mutation entry point
//! - [`Lot`]: Per-lot volumetric state and derived financial aggregates
//! - [`Shipment`]: Rail-car shipment with aggregates re-summed from its lots
//! - [`Client`]: Per-currency, per-category debt ledger
//! - [`CashJournal`]: Append-only ledger of record for money movement
//! - [`LedgerError`]: Typed failures; [`Warning`]s ride alongside successes
//!
//! ## Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use timberledger::{
//!     Currency, Engine, LotSpec, SaleRequest, SaleUnit, ShipmentSpec,
//! };
//!
//! let engine = Engine::new();
//! let shipment = engine.register_shipment(ShipmentSpec {
//!     code: "VAG-2025-001".into(),
//!     origin: "Bratsk".into(),
//!     destination: "Shanghai".into(),
//!     departure_date: None,
//!     arrival_date: None,
//! });
//! let lot = engine
//!     .register_lot(shipment, LotSpec {
//!         thickness_mm: dec!(50),
//!         width_mm: dec!(150),
//!         length_m: dec!(6),
//!         quantity: 200,
//!         purchase_currency: Currency::Usd,
//!         purchase_amount: dec!(4500),
//!     })
//!     .unwrap();
//! let client = engine.register_client("Harbin Timber Trade", None);
//!
//! let receipt = engine
//!     .commit_sale(SaleRequest {
//!         lot_id: lot,
//!         client_id: client,
//!         unit: SaleUnit::Volume,
//!         sent: dec!(4.5),
//!         client_loss: dec!(0),
//!         transport_loss: dec!(0),
//!         split: None,
//!         currency: Currency::Usd,
//!         unit_price: dec!(620),
//!         paid_amount: dec!(1000),
//!     })
//!     .unwrap();
//! assert_eq!(receipt.sale.total_price, dec!(2790.00));
//! assert_eq!(receipt.lot.available_volume, dec!(4.5));
//! ```
//!
//! ## Thread Safety
//!
//! The engine handles concurrent access to lots and clients; a sale that
//! loses a write race against another sale on the same lot is retried
//! against fresh state, so two concurrent sales can never jointly oversell
//! a lot.

pub mod base;
pub mod cash;
pub mod client;
mod engine;
pub mod error;
pub mod lot;
mod reconcile;
pub mod sale;
pub mod shipment;
pub mod validate;

pub use base::{
    CashEntryId, ClientId, Currency, DebtCategory, LotId, PerCurrency, ResponsibleParty, SaleId,
    SaleUnit, ShipmentId,
};
pub use cash::{CashEntry, CashEntryKind, CashJournal};
pub use client::{Client, ClientSnapshot, DebtAccount, DebtBook};
pub use engine::{DebtAdjustment, Engine, EngineConfig, SaleReceipt, SaleRequest};
pub use error::{LedgerError, Warning};
pub use lot::{Lot, LotSnapshot, LotSpec, LossRecord, SaleEffects};
pub use reconcile::{DedupCache, EntityKind, PropagationQueue, RetryPolicy, with_conflict_retry};
pub use sale::{LiabilitySplit, Sale, SaleStatus};
pub use shipment::{Shipment, ShipmentRollup, ShipmentSnapshot, ShipmentSpec, ShipmentStatus};
