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

//! Append-only cash journal.
//!
//! The journal is the ledger of record for money movement: every sale
//! payment, debt payment, and expense lands here exactly once. Entries are
//! never removed; undoing a sale appends a reversing entry that references
//! the original. Ids are monotonic, so insertion order is recoverable by
//! sorting.

use crate::base::{CashEntryId, ClientId, Currency, LotId, SaleId};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// What a cash entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CashEntryKind {
    /// Up-front payment received with a sale.
    Income,
    /// Ad-hoc payment from a client outside a sale.
    ClientPayment,
    /// Payment settling outstanding debt.
    DebtPayment,
    /// Expense allocated to a lot.
    Expense,
    /// Reversal of a prior entry (sale deletion).
    Reversal,
}

/// One row in the cash journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CashEntry {
    pub id: CashEntryId,
    pub kind: CashEntryKind,
    pub amount: Decimal,
    pub currency: Currency,
    pub client_id: Option<ClientId>,
    pub lot_id: Option<LotId>,
    pub sale_id: Option<SaleId>,
    /// For reversals, the entry being reversed.
    pub reverses: Option<CashEntryId>,
}

/// Thread-safe append-only journal with monotonic ids.
#[derive(Debug, Default)]
pub struct CashJournal {
    entries: DashMap<CashEntryId, Arc<CashEntry>>,
    next_id: AtomicU64,
}

impl CashJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry and returns its id.
    pub fn append(
        &self,
        kind: CashEntryKind,
        amount: Decimal,
        currency: Currency,
        client_id: Option<ClientId>,
        lot_id: Option<LotId>,
        sale_id: Option<SaleId>,
    ) -> CashEntryId {
        let id = CashEntryId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = CashEntry {
            id,
            kind,
            amount,
            currency,
            client_id,
            lot_id,
            sale_id,
            reverses: None,
        };
        self.entries.insert(id, Arc::new(entry));
        id
    }

    /// Appends a reversing entry for `original`. Returns `None` when the
    /// original does not exist (nothing to reverse).
    pub fn reverse(&self, original: CashEntryId) -> Option<CashEntryId> {
        let source = self.entries.get(&original)?.value().clone();
        let id = CashEntryId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = CashEntry {
            id,
            kind: CashEntryKind::Reversal,
            amount: -source.amount,
            currency: source.currency,
            client_id: source.client_id,
            lot_id: source.lot_id,
            sale_id: source.sale_id,
            reverses: Some(original),
        };
        self.entries.insert(id, Arc::new(entry));
        Some(id)
    }

    pub fn get(&self, id: CashEntryId) -> Option<Arc<CashEntry>> {
        self.entries.get(&id).map(|entry| entry.value().clone())
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> Vec<Arc<CashEntry>> {
        let mut all: Vec<Arc<CashEntry>> =
            self.entries.iter().map(|entry| entry.value().clone()).collect();
        all.sort_by_key(|entry| entry.id);
        all
    }

    /// Net cash position for one currency across the whole journal.
    pub fn balance(&self, currency: Currency) -> Decimal {
        self.entries
            .iter()
            .filter(|entry| entry.currency == currency)
            .map(|entry| match entry.kind {
                CashEntryKind::Expense => -entry.amount,
                _ => entry.amount,
            })
            .sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn append_assigns_monotonic_ids() {
        let journal = CashJournal::new();
        let a = journal.append(
            CashEntryKind::Income,
            dec!(400),
            Currency::Usd,
            Some(ClientId(1)),
            None,
            Some(SaleId(1)),
        );
        let b = journal.append(
            CashEntryKind::DebtPayment,
            dec!(600),
            Currency::Usd,
            Some(ClientId(1)),
            None,
            None,
        );
        assert!(b > a);
        assert_eq!(journal.entries().len(), 2);
        assert_eq!(journal.entries()[0].id, a);
    }

    #[test]
    fn reversal_mirrors_the_original() {
        let journal = CashJournal::new();
        let original = journal.append(
            CashEntryKind::Income,
            dec!(400),
            Currency::Usd,
            Some(ClientId(1)),
            Some(LotId(2)),
            Some(SaleId(3)),
        );
        let reversal_id = journal.reverse(original).unwrap();
        let reversal = journal.get(reversal_id).unwrap();
        assert_eq!(reversal.kind, CashEntryKind::Reversal);
        assert_eq!(reversal.amount, dec!(-400));
        assert_eq!(reversal.reverses, Some(original));
        // Original is still on record
        assert!(journal.get(original).is_some());
        assert_eq!(journal.balance(Currency::Usd), Decimal::ZERO);
    }

    #[test]
    fn reverse_of_missing_entry_is_none() {
        let journal = CashJournal::new();
        assert_eq!(journal.reverse(CashEntryId(99)), None);
    }

    #[test]
    fn balance_nets_expenses() {
        let journal = CashJournal::new();
        journal.append(
            CashEntryKind::Income,
            dec!(1000),
            Currency::Rub,
            None,
            None,
            None,
        );
        journal.append(
            CashEntryKind::Expense,
            dec!(300),
            Currency::Rub,
            None,
            Some(LotId(1)),
            None,
        );
        assert_eq!(journal.balance(Currency::Rub), dec!(700));
        assert_eq!(journal.balance(Currency::Usd), Decimal::ZERO);
    }
}
