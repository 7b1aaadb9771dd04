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

//! Sale records and loss liability apportionment.
//!
//! A sale moves through a short state machine:
//! - `Draft` → `Validated` (all checks passed, nothing applied yet)
//! - `Validated` → `Committed` (all side effects applied as one group)
//! - `Draft`/`Validated` → `Rejected` (terminal, zero side effects)
//!
//! Only `Committed` sales are stored; a rejected sale leaves no trace.

use crate::base::{CashEntryId, ClientId, Currency, LotId, SaleId, SaleUnit};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Seller/buyer apportionment of breakage volume, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct LiabilitySplit {
    pub seller_pct: Decimal,
    pub buyer_pct: Decimal,
}

impl LiabilitySplit {
    /// Precision of apportioned amounts (matches display precision).
    const SPLIT_PRECISION: u32 = 4;

    /// Splits a loss amount into `(seller_liable, buyer_liable)`.
    ///
    /// The buyer share is computed first and rounded to four decimal places;
    /// the seller absorbs the remainder so the parts always re-sum to the
    /// whole loss exactly.
    pub fn apportion(&self, loss: Decimal) -> (Decimal, Decimal) {
        let buyer = (loss * self.buyer_pct / Decimal::ONE_HUNDRED)
            .round_dp(Self::SPLIT_PRECISION);
        let seller = loss - buyer;
        (seller, buyer)
    }
}

/// Sale lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    Draft,
    Validated,
    Committed,
    Rejected,
}

/// One committed sale transaction: one lot, one client, one currency.
///
/// All amounts (`sent`, `accepted`, losses) are denominated in the sale's
/// [`SaleUnit`]; conversion to cubic meters happens at the lot boundary.
/// Invariant: `accepted + client_loss + transport_loss == sent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sale {
    pub id: SaleId,
    pub lot_id: LotId,
    pub client_id: ClientId,
    pub unit: SaleUnit,
    /// Amount dispatched toward the client.
    pub sent: Decimal,
    /// Amount the client confirmed receiving in good condition.
    pub accepted: Decimal,
    /// Breakage attributed to the client's handling.
    pub client_loss: Decimal,
    /// Breakage attributed to transport.
    pub transport_loss: Decimal,
    pub split: Option<LiabilitySplit>,
    pub currency: Currency,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub paid_amount: Decimal,
    pub status: SaleStatus,
    /// Cash entry recorded for the up-front payment, if any.
    pub cash_entry: Option<CashEntryId>,
}

impl Sale {
    /// Outstanding debt this sale added to the client's book.
    pub fn debt(&self) -> Decimal {
        self.total_price - self.paid_amount
    }

    /// Total loss amount across both attributions.
    pub fn loss(&self) -> Decimal {
        self.client_loss + self.transport_loss
    }

    /// Amount billable to the client: accepted goods plus the buyer-liable
    /// share of the loss.
    pub fn billable(&self) -> Decimal {
        match self.split {
            Some(split) => {
                let (_, buyer) = split.apportion(self.loss());
                self.accepted + buyer
            }
            // No split on record: the client answers for its own breakage,
            // transport loss is written off against the lot
            None => self.accepted + self.client_loss,
        }
    }

    /// Loss amount written off against the lot's realized profit.
    pub fn write_off(&self) -> Decimal {
        self.loss() - (self.billable() - self.accepted)
    }
}
