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

//! Client debt ledger.
//!
//! Each client carries four debt accounts: {goods, delivery} × {USD, RUB}.
//! Every account is a pair of running totals (`total_debt`, `total_paid`);
//! `current_debt` is derived as `max(0, debt − paid)`. The floor is a
//! display rule: overpayment is not carried forward as credit, but the raw
//! totals keep the full history so nothing is lost.

use crate::base::{ClientId, Currency, DebtCategory};
use crate::error::LedgerError;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;

/// One running balance: cumulative owed vs cumulative paid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DebtAccount {
    pub total_debt: Decimal,
    pub total_paid: Decimal,
}

impl DebtAccount {
    /// Outstanding balance, floored at zero for display.
    pub fn current(&self) -> Decimal {
        (self.total_debt - self.total_paid).max(Decimal::ZERO)
    }
}

/// Per-currency debt accounts for one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DebtBook {
    pub usd: DebtAccount,
    pub rub: DebtAccount,
}

impl DebtBook {
    fn account_mut(&mut self, currency: Currency) -> &mut DebtAccount {
        match currency {
            Currency::Usd => &mut self.usd,
            Currency::Rub => &mut self.rub,
        }
    }

    fn account(&self, currency: Currency) -> &DebtAccount {
        match currency {
            Currency::Usd => &self.usd,
            Currency::Rub => &self.rub,
        }
    }

    fn has_outstanding(&self) -> bool {
        self.usd.current() > Decimal::ZERO || self.rub.current() > Decimal::ZERO
    }
}

#[derive(Debug)]
struct ClientData {
    id: ClientId,
    name: String,
    contact: Option<String>,
    goods: DebtBook,
    delivery: DebtBook,
    version: u64,
}

impl ClientData {
    fn book_mut(&mut self, category: DebtCategory) -> &mut DebtBook {
        match category {
            DebtCategory::Goods => &mut self.goods,
            DebtCategory::Delivery => &mut self.delivery,
        }
    }
}

/// Point-in-time view of a client's debt books.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientSnapshot {
    pub id: ClientId,
    pub name: String,
    pub contact: Option<String>,
    pub goods: DebtBook,
    pub delivery: DebtBook,
    pub version: u64,
}

impl ClientSnapshot {
    pub fn account(&self, currency: Currency, category: DebtCategory) -> DebtAccount {
        match category {
            DebtCategory::Goods => *self.goods.account(currency),
            DebtCategory::Delivery => *self.delivery.account(currency),
        }
    }

    /// Display-facing outstanding balance for one currency/category lane.
    pub fn current_debt(&self, currency: Currency, category: DebtCategory) -> Decimal {
        self.account(currency, category).current()
    }
}

/// One client with per-currency, per-category debt accounts.
#[derive(Debug)]
pub struct Client {
    inner: Mutex<ClientData>,
}

impl Client {
    pub fn new(id: ClientId, name: impl Into<String>, contact: Option<String>) -> Self {
        Self {
            inner: Mutex::new(ClientData {
                id,
                name: name.into(),
                contact,
                goods: DebtBook::default(),
                delivery: DebtBook::default(),
                version: 0,
            }),
        }
    }

    /// Adds to what the client owes in one lane.
    pub fn increase_debt(
        &self,
        currency: Currency,
        category: DebtCategory,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        if amount < Decimal::ZERO {
            return Err(LedgerError::InvalidPayment);
        }
        let mut data = self.inner.lock();
        data.book_mut(category).account_mut(currency).total_debt += amount;
        data.version += 1;
        Ok(())
    }

    /// Records a payment against one lane.
    pub fn settle_debt(
        &self,
        currency: Currency,
        category: DebtCategory,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidPayment);
        }
        let mut data = self.inner.lock();
        data.book_mut(category).account_mut(currency).total_paid += amount;
        data.version += 1;
        Ok(())
    }

    /// Backs a previously posted debt out of the book (sale deletion).
    pub fn reverse_debt(&self, currency: Currency, category: DebtCategory, amount: Decimal) {
        let mut data = self.inner.lock();
        let account = data.book_mut(category).account_mut(currency);
        account.total_debt -= amount;
        debug_assert!(
            account.total_debt >= Decimal::ZERO,
            "Invariant violated: total debt went negative: {}",
            account.total_debt
        );
        data.version += 1;
    }

    /// True while any currency/category lane shows a positive balance.
    /// Backs the deletion guard.
    pub fn has_outstanding_debt(&self) -> bool {
        let data = self.inner.lock();
        data.goods.has_outstanding() || data.delivery.has_outstanding()
    }

    pub fn snapshot(&self) -> ClientSnapshot {
        let data = self.inner.lock();
        ClientSnapshot {
            id: data.id,
            name: data.name.clone(),
            contact: data.contact.clone(),
            goods: data.goods,
            delivery: data.delivery,
            version: data.version,
        }
    }
}
