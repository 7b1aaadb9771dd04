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

//! Sale transaction processor.
//!
//! The [`Engine`] is the only mutation entry point for the ledger. It owns
//! the shipment, lot, client and sale collections plus the cash journal, and
//! orchestrates each sale as one commit group: validate, dispatch the lot,
//! record the sale, post the cash entry, post the client debt. A failure
//! after the lot was dispatched rolls earlier steps back through an ordered
//! list of compensating actions, executed in reverse.
//!
//! # Concurrency
//!
//! Validation runs against a lot snapshot; the dispatch is applied only if
//! the lot is still at the snapshot's version. A lost race surfaces as a
//! write conflict and the whole commit re-runs from scratch against fresh
//! state (bounded retries with backoff). All counters move by deltas, never
//! by writing back a previously read total, so a replay cannot double-apply.

use crate::base::{
    CashEntryId, ClientId, Currency, DebtCategory, LotId, ResponsibleParty, SaleId, SaleUnit,
    ShipmentId,
};
use crate::cash::{CashEntry, CashEntryKind, CashJournal};
use crate::client::{Client, ClientSnapshot};
use crate::error::{LedgerError, Warning};
use crate::lot::{Lot, LotSnapshot, LotSpec, SaleEffects};
use crate::reconcile::{PropagationQueue, RetryPolicy, with_conflict_retry};
use crate::sale::{LiabilitySplit, Sale, SaleStatus};
use crate::shipment::{Shipment, ShipmentRollup, ShipmentSnapshot, ShipmentSpec};
use crate::validate;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

/// Money amounts are carried to two decimal places.
const MONEY_PRECISION: u32 = 2;

/// Tunables for the engine's concurrency layer.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub retry: RetryPolicy,
    /// Coalescing window for shipment aggregate propagation.
    pub propagation_window: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            propagation_window: Duration::from_secs(2),
        }
    }
}

/// Inbound sale, amounts denominated in `unit`.
#[derive(Debug, Clone)]
pub struct SaleRequest {
    pub lot_id: LotId,
    pub client_id: ClientId,
    pub unit: SaleUnit,
    pub sent: Decimal,
    pub client_loss: Decimal,
    pub transport_loss: Decimal,
    pub split: Option<LiabilitySplit>,
    pub currency: Currency,
    pub unit_price: Decimal,
    pub paid_amount: Decimal,
}

/// Result of a committed sale: the record plus fresh snapshots and any
/// non-fatal warnings raised during validation.
#[derive(Debug, Clone)]
pub struct SaleReceipt {
    pub sale: Sale,
    pub lot: LotSnapshot,
    pub client: ClientSnapshot,
    pub warnings: Vec<Warning>,
}

/// Direction of an explicit debt adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebtAdjustment {
    Increase,
    Decrease,
}

/// Compensating actions for a partially applied commit group, executed in
/// reverse order of application.
enum Compensation {
    ReverseLot {
        lot: Arc<Lot>,
        effects: SaleEffects,
    },
    ReverseCash {
        entry: CashEntryId,
    },
}

/// Central ledger engine: shipments, lots, clients, sales, cash.
pub struct Engine {
    shipments: DashMap<ShipmentId, Arc<Shipment>>,
    lots: DashMap<LotId, Arc<Lot>>,
    clients: DashMap<ClientId, Arc<Client>>,
    sales: DashMap<SaleId, Sale>,
    journal: CashJournal,
    propagation: PropagationQueue,
    retry: RetryPolicy,
    next_shipment_id: AtomicU32,
    next_lot_id: AtomicU32,
    next_client_id: AtomicU32,
    next_sale_id: AtomicU64,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Engine {
            shipments: DashMap::new(),
            lots: DashMap::new(),
            clients: DashMap::new(),
            sales: DashMap::new(),
            journal: CashJournal::new(),
            propagation: PropagationQueue::new(config.propagation_window),
            retry: config.retry,
            next_shipment_id: AtomicU32::new(1),
            next_lot_id: AtomicU32::new(1),
            next_client_id: AtomicU32::new(1),
            next_sale_id: AtomicU64::new(1),
        }
    }

    // === Registration ===

    pub fn register_shipment(&self, spec: ShipmentSpec) -> ShipmentId {
        let id = ShipmentId(self.next_shipment_id.fetch_add(1, Ordering::Relaxed));
        self.shipments.insert(id, Arc::new(Shipment::new(id, spec)));
        id
    }

    /// Registers a lot under a shipment.
    ///
    /// # Errors
    ///
    /// `NotFound` for a missing shipment, `IrreversibleState` when the
    /// shipment no longer accepts inventory changes.
    pub fn register_lot(
        &self,
        shipment_id: ShipmentId,
        spec: LotSpec,
    ) -> Result<LotId, LedgerError> {
        let shipment = self.shipment(shipment_id)?;
        if !shipment.accepts_inventory_changes() {
            return Err(LedgerError::IrreversibleState);
        }
        let id = LotId(self.next_lot_id.fetch_add(1, Ordering::Relaxed));
        self.lots
            .insert(id, Arc::new(Lot::new(id, shipment_id, spec)));
        self.request_propagation(shipment_id);
        Ok(id)
    }

    pub fn register_client(&self, name: impl Into<String>, contact: Option<String>) -> ClientId {
        let id = ClientId(self.next_client_id.fetch_add(1, Ordering::Relaxed));
        self.clients
            .insert(id, Arc::new(Client::new(id, name, contact)));
        id
    }

    /// Removes a client with no outstanding balance in any lane.
    pub fn remove_client(&self, client_id: ClientId) -> Result<(), LedgerError> {
        let client = self.client(client_id)?;
        if client.has_outstanding_debt() {
            return Err(LedgerError::OutstandingDebt);
        }
        self.clients.remove(&client_id);
        Ok(())
    }

    // === Sales ===

    /// Commits one sale: validation, lot dispatch, sale record, cash entry,
    /// client debt, all or nothing. Retries transparently on write conflict.
    pub fn commit_sale(&self, request: SaleRequest) -> Result<SaleReceipt, LedgerError> {
        with_conflict_retry(&self.retry, || self.try_commit_sale(&request))
    }

    fn try_commit_sale(&self, request: &SaleRequest) -> Result<SaleReceipt, LedgerError> {
        // Resolve collaborators before touching anything
        let client = self.client(request.client_id)?;
        let lot = self.lot(request.lot_id)?;
        let shipment = self.shipment(lot.shipment_id())?;
        if !shipment.accepts_inventory_changes() {
            return Err(LedgerError::IrreversibleState);
        }

        let snapshot = lot.snapshot();
        let mut warnings = Vec::new();

        // --- Validation, all against the snapshot, nothing mutated yet ---

        if request.client_loss < Decimal::ZERO || request.transport_loss < Decimal::ZERO {
            return Err(LedgerError::InvalidLoss);
        }
        let loss = request.client_loss + request.transport_loss;
        if loss > Decimal::ZERO
            && let Some(warning) = validate::validate_transport_loss(request.sent, loss)?
        {
            warnings.push(warning);
        }
        let accepted = request.sent - loss;

        match request.unit {
            SaleUnit::Volume => {
                validate::validate_volume_request(request.sent, snapshot.available_volume)?;
            }
            SaleUnit::Pieces => {
                validate::validate_quantity_request(request.sent, snapshot.remaining_quantity)?;
            }
        }

        if let Some(split) = &request.split {
            validate::validate_liability_split(split)?;
        }

        // m³ per request unit
        let factor = match request.unit {
            SaleUnit::Volume => Decimal::ONE,
            SaleUnit::Pieces => snapshot.unit_volume,
        };

        // Break-even is only comparable when the sale settles in the
        // currency the lot was bought in
        let cost_per_unit = (request.currency == snapshot.purchase_currency)
            .then(|| snapshot.break_even_price * factor);
        if let Some(warning) = validate::validate_price(request.unit_price, cost_per_unit)? {
            warnings.push(warning);
        }

        let billable = match &request.split {
            Some(split) => {
                let (_seller, buyer) = split.apportion(loss);
                accepted + buyer
            }
            // Without a split the client answers for its own breakage and
            // the seller eats the transport loss
            None => accepted + request.client_loss,
        };

        let total_price = (request.unit_price * billable).round_dp(MONEY_PRECISION);
        validate::validate_payment(request.paid_amount, total_price)?;
        let debt_delta = total_price - request.paid_amount;

        let effects = SaleEffects {
            dispatch_volume: request.sent * factor,
            accepted_volume: accepted * factor,
            revenue: total_price,
            currency: request.currency,
        };

        // --- Commit group ---

        let mut applied: Vec<Compensation> = Vec::new();

        // 1. Dispatch the lot, guarded by the validated-against version
        lot.apply_sale(snapshot.version, &effects)?;
        applied.push(Compensation::ReverseLot {
            lot: Arc::clone(&lot),
            effects,
        });

        // 2. Cash entry for the up-front payment
        let sale_id = SaleId(self.next_sale_id.fetch_add(1, Ordering::Relaxed));
        let cash_entry = if request.paid_amount > Decimal::ZERO {
            let entry = self.journal.append(
                CashEntryKind::Income,
                request.paid_amount,
                request.currency,
                Some(request.client_id),
                Some(request.lot_id),
                Some(sale_id),
            );
            applied.push(Compensation::ReverseCash { entry });
            Some(entry)
        } else {
            None
        };

        // 3. Client debt; the client may have been removed since resolution
        if !self.clients.contains_key(&request.client_id) {
            self.compensate(applied)?;
            return Err(LedgerError::NotFound("client"));
        }
        if let Err(err) =
            client.increase_debt(request.currency, DebtCategory::Goods, debt_delta)
        {
            self.compensate(applied)?;
            return Err(err);
        }

        // 4. Sale record
        let sale = Sale {
            id: sale_id,
            lot_id: request.lot_id,
            client_id: request.client_id,
            unit: request.unit,
            sent: request.sent,
            accepted,
            client_loss: request.client_loss,
            transport_loss: request.transport_loss,
            split: request.split,
            currency: request.currency,
            unit_price: request.unit_price,
            total_price,
            paid_amount: request.paid_amount,
            status: SaleStatus::Committed,
            cash_entry,
        };
        self.sales.insert(sale_id, sale.clone());

        tracing::debug!(
            sale = %sale_id,
            lot = %request.lot_id,
            client = %request.client_id,
            %total_price,
            "sale committed"
        );

        self.request_propagation(lot.shipment_id());

        Ok(SaleReceipt {
            sale,
            lot: lot.snapshot(),
            client: client.snapshot(),
            warnings,
        })
    }

    /// Deletes a committed sale, reversing its side effects in mirror order:
    /// restore lot volume, reverse the cash entry, reverse the debt delta.
    pub fn delete_sale(&self, sale_id: SaleId) -> Result<(), LedgerError> {
        let sale = self
            .sales
            .get(&sale_id)
            .map(|entry| entry.value().clone())
            .ok_or(LedgerError::NotFound("sale"))?;
        let lot = self.lot(sale.lot_id)?;
        let shipment = self.shipment(lot.shipment_id())?;
        if !shipment.accepts_inventory_changes() {
            return Err(LedgerError::IrreversibleState);
        }

        let factor = match sale.unit {
            SaleUnit::Volume => Decimal::ONE,
            SaleUnit::Pieces => lot.snapshot().unit_volume,
        };
        let effects = SaleEffects {
            dispatch_volume: sale.sent * factor,
            accepted_volume: sale.accepted * factor,
            revenue: sale.total_price,
            currency: sale.currency,
        };

        lot.reverse_sale(&effects);
        if let Some(entry) = sale.cash_entry {
            self.journal.reverse(entry);
        }
        if let Ok(client) = self.client(sale.client_id) {
            client.reverse_debt(sale.currency, DebtCategory::Goods, sale.debt());
        }
        self.sales.remove(&sale_id);

        tracing::debug!(sale = %sale_id, "sale deleted and reversed");
        self.request_propagation(lot.shipment_id());
        Ok(())
    }

    /// Rolls back a partially applied commit group in reverse order.
    ///
    /// A failure here is the one path that cannot be automated away: it is
    /// escalated as fatal and the affected documents need manual
    /// reconciliation.
    fn compensate(&self, applied: Vec<Compensation>) -> Result<(), LedgerError> {
        tracing::warn!(
            steps = applied.len(),
            "commit group failed mid-way, compensating"
        );
        for action in applied.into_iter().rev() {
            match action {
                Compensation::ReverseLot { lot, effects } => lot.reverse_sale(&effects),
                Compensation::ReverseCash { entry } => {
                    if self.journal.reverse(entry).is_none() {
                        tracing::error!(%entry, "cash entry missing during compensation");
                        return Err(LedgerError::ReconciliationRequired(
                            "cash entry missing during compensation",
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    // === Debt adjustments ===

    /// Explicit debt adjustment outside a sale. A decrease records a debt
    /// payment in the cash journal.
    pub fn adjust_debt(
        &self,
        client_id: ClientId,
        currency: Currency,
        category: DebtCategory,
        adjustment: DebtAdjustment,
        amount: Decimal,
    ) -> Result<ClientSnapshot, LedgerError> {
        with_conflict_retry(&self.retry, || {
            let client = self.client(client_id)?;
            if amount <= Decimal::ZERO {
                return Err(LedgerError::InvalidPayment);
            }
            match adjustment {
                DebtAdjustment::Increase => {
                    client.increase_debt(currency, category, amount)?;
                }
                DebtAdjustment::Decrease => {
                    client.settle_debt(currency, category, amount)?;
                    self.journal.append(
                        CashEntryKind::DebtPayment,
                        amount,
                        currency,
                        Some(client_id),
                        None,
                        None,
                    );
                }
            }
            Ok(client.snapshot())
        })
    }

    // === Lot operations ===

    /// Records a permanent warehouse loss against a lot.
    pub fn record_lot_loss(
        &self,
        lot_id: LotId,
        volume: Decimal,
        party: ResponsibleParty,
        reason: impl Into<String>,
    ) -> Result<LotSnapshot, LedgerError> {
        let lot = self.lot(lot_id)?;
        let shipment = self.shipment(lot.shipment_id())?;
        if !shipment.accepts_inventory_changes() {
            return Err(LedgerError::IrreversibleState);
        }
        lot.record_loss(volume, party, reason)?;
        self.request_propagation(lot.shipment_id());
        Ok(lot.snapshot())
    }

    /// Allocates an expense to a lot and records it in the cash journal.
    pub fn allocate_lot_expense(
        &self,
        lot_id: LotId,
        amount: Decimal,
    ) -> Result<LotSnapshot, LedgerError> {
        let lot = self.lot(lot_id)?;
        lot.allocate_expense(amount)?;
        let snapshot = lot.snapshot();
        self.journal.append(
            CashEntryKind::Expense,
            amount,
            snapshot.purchase_currency,
            None,
            Some(lot_id),
            None,
        );
        self.request_propagation(snapshot.shipment_id);
        Ok(snapshot)
    }

    // === Shipment lifecycle ===

    pub fn begin_closing_shipment(&self, shipment_id: ShipmentId) -> Result<(), LedgerError> {
        self.shipment(shipment_id)?.begin_closing()
    }

    /// Closes a shipment; inventory under it is frozen afterwards.
    pub fn close_shipment(&self, shipment_id: ShipmentId) -> Result<(), LedgerError> {
        let shipment = self.shipment(shipment_id)?;
        // Freeze with current numbers, not whatever the last coalesced
        // propagation happened to leave behind
        self.propagate_now(shipment_id);
        shipment.close()
    }

    pub fn archive_shipment(&self, shipment_id: ShipmentId) -> Result<(), LedgerError> {
        self.shipment(shipment_id)?.archive()
    }

    // === Propagation ===

    fn request_propagation(&self, shipment_id: ShipmentId) {
        self.propagation.request(shipment_id);
        // Drain immediately: the re-sum is cheap and idempotent, the dedup
        // window is what bounds repeated work
        self.flush_propagation();
    }

    /// Re-sums every shipment with a pending propagation request.
    pub fn flush_propagation(&self) {
        for shipment_id in self.propagation.drain() {
            self.propagate_now(shipment_id);
        }
    }

    /// Forces a shipment re-sum, bypassing the coalescing window.
    pub fn reconcile_shipment(
        &self,
        shipment_id: ShipmentId,
    ) -> Result<ShipmentSnapshot, LedgerError> {
        let shipment = self.shipment(shipment_id)?;
        self.propagate_now(shipment_id);
        Ok(shipment.snapshot())
    }

    fn propagate_now(&self, shipment_id: ShipmentId) {
        let Some(shipment) = self
            .shipments
            .get(&shipment_id)
            .map(|entry| Arc::clone(entry.value()))
        else {
            return;
        };
        let mut rollup = ShipmentRollup::default();
        for entry in self.lots.iter() {
            if entry.value().shipment_id() == shipment_id {
                rollup.absorb(&entry.value().snapshot());
            }
        }
        shipment.apply_rollup(rollup);
    }

    // === Reads ===

    pub fn lot_snapshot(&self, lot_id: LotId) -> Result<LotSnapshot, LedgerError> {
        Ok(self.lot(lot_id)?.snapshot())
    }

    pub fn shipment_snapshot(
        &self,
        shipment_id: ShipmentId,
    ) -> Result<ShipmentSnapshot, LedgerError> {
        Ok(self.shipment(shipment_id)?.snapshot())
    }

    pub fn client_snapshot(&self, client_id: ClientId) -> Result<ClientSnapshot, LedgerError> {
        Ok(self.client(client_id)?.snapshot())
    }

    pub fn sale(&self, sale_id: SaleId) -> Result<Sale, LedgerError> {
        self.sales
            .get(&sale_id)
            .map(|entry| entry.value().clone())
            .ok_or(LedgerError::NotFound("sale"))
    }

    /// All client snapshots, ordered by id. Report output.
    pub fn client_snapshots(&self) -> Vec<ClientSnapshot> {
        let mut all: Vec<ClientSnapshot> = self
            .clients
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        all.sort_by_key(|snapshot| snapshot.id.0);
        all
    }

    /// The full cash journal in insertion order.
    pub fn cash_entries(&self) -> Vec<Arc<CashEntry>> {
        self.journal.entries()
    }

    pub fn cash_balance(&self, currency: Currency) -> Decimal {
        self.journal.balance(currency)
    }

    fn shipment(&self, id: ShipmentId) -> Result<Arc<Shipment>, LedgerError> {
        self.shipments
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(LedgerError::NotFound("shipment"))
    }

    fn lot(&self, id: LotId) -> Result<Arc<Lot>, LedgerError> {
        self.lots
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(LedgerError::NotFound("lot"))
    }

    fn client(&self, id: ClientId) -> Result<Arc<Client>, LedgerError> {
        self.clients
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(LedgerError::NotFound("client"))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
