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

//! Core identifier and currency types shared across the ledger.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};

/// Unique identifier for a shipment (one rail car).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ShipmentId(pub u32);

impl fmt::Display for ShipmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a wood lot within a shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct LotId(pub u32);

impl fmt::Display for LotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ClientId(pub u32);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a committed sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct SaleId(pub u64);

impl fmt::Display for SaleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a cash journal entry. Ids are monotonic, so their
/// ordering is the journal's insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct CashEntryId(pub u64);

impl fmt::Display for CashEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Settlement currency. The ledger keeps USD and RUB balances side by side
/// and never converts between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Usd,
    Rub,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "usd",
            Currency::Rub => "rub",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Debt category: goods owed for delivered wood, delivery owed for freight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DebtCategory {
    Goods,
    Delivery,
}

impl fmt::Display for DebtCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DebtCategory::Goods => f.write_str("goods"),
            DebtCategory::Delivery => f.write_str("delivery"),
        }
    }
}

/// Unit a sale is denominated in: cubic meters or whole pieces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaleUnit {
    Volume,
    Pieces,
}

/// Who answers for a recorded loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponsibleParty {
    Seller,
    Buyer,
    Carrier,
}

/// A pair of amounts kept per settlement currency.
///
/// Shipment cost/revenue/profit and client debt books all come in USD/RUB
/// pairs; this keeps the two lanes from being mixed up at call sites.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PerCurrency {
    pub usd: Decimal,
    pub rub: Decimal,
}

impl PerCurrency {
    pub const ZERO: PerCurrency = PerCurrency {
        usd: Decimal::ZERO,
        rub: Decimal::ZERO,
    };

    pub fn get(&self, currency: Currency) -> Decimal {
        match currency {
            Currency::Usd => self.usd,
            Currency::Rub => self.rub,
        }
    }

    pub fn get_mut(&mut self, currency: Currency) -> &mut Decimal {
        match currency {
            Currency::Usd => &mut self.usd,
            Currency::Rub => &mut self.rub,
        }
    }

    pub fn add(&mut self, currency: Currency, amount: Decimal) {
        *self.get_mut(currency) += amount;
    }
}

impl Add for PerCurrency {
    type Output = PerCurrency;

    fn add(self, rhs: PerCurrency) -> PerCurrency {
        PerCurrency {
            usd: self.usd + rhs.usd,
            rub: self.rub + rhs.rub,
        }
    }
}

impl AddAssign for PerCurrency {
    fn add_assign(&mut self, rhs: PerCurrency) {
        self.usd += rhs.usd;
        self.rub += rhs.rub;
    }
}
