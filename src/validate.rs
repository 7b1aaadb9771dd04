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

//! Pure validation of sale inputs.
//!
//! Every check here is side-effect free and runs before any mutation in the
//! engine. A failed check means nothing was touched. Warnings do not fail the
//! check; they ride back to the caller next to the success value.

use crate::error::{LedgerError, Warning};
use crate::sale::LiabilitySplit;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Tolerance for volume comparisons, in cubic meters (10 mL).
///
/// Volumes arrive from float-entry UIs and accumulate over many sales;
/// comparisons absorb drift below the fourth decimal place without letting a
/// genuine 0.0001 m³ oversell through.
pub const VOLUME_EPSILON: Decimal = dec!(0.00001);

/// Sanity ceiling for a unit price, in either currency.
pub const MAX_UNIT_PRICE: Decimal = dec!(1_000_000);

/// Transport loss above this share of the dispatched amount draws a warning.
pub const HIGH_LOSS_RATIO: Decimal = dec!(0.10);

/// Checks a requested sale volume against a lot's remaining volume.
///
/// # Errors
///
/// [`LedgerError::InsufficientInventory`] when the request exceeds remaining
/// volume plus [`VOLUME_EPSILON`].
pub fn validate_volume_request(
    requested: Decimal,
    remaining: Decimal,
) -> Result<(), LedgerError> {
    if requested <= Decimal::ZERO {
        return Err(LedgerError::InsufficientInventory {
            requested,
            available: remaining,
        });
    }
    if requested > remaining + VOLUME_EPSILON {
        return Err(LedgerError::InsufficientInventory {
            requested,
            available: remaining,
        });
    }
    Ok(())
}

/// Checks a requested piece count against a lot's remaining quantity.
///
/// Pieces are counted, not measured: the request must be a whole number and
/// no tolerance applies.
pub fn validate_quantity_request(requested: Decimal, remaining: u32) -> Result<(), LedgerError> {
    if requested <= Decimal::ZERO
        || !requested.is_integer()
        || requested > Decimal::from(remaining)
    {
        return Err(LedgerError::InsufficientInventory {
            requested,
            available: Decimal::from(remaining),
        });
    }
    Ok(())
}

/// Checks a loss amount against the dispatched amount it came out of.
///
/// Loss cannot be negative and cannot consume everything that was sent.
/// A loss above [`HIGH_LOSS_RATIO`] succeeds with a [`Warning::HighLoss`].
pub fn validate_transport_loss(
    dispatched: Decimal,
    loss: Decimal,
) -> Result<Option<Warning>, LedgerError> {
    if loss < Decimal::ZERO || loss >= dispatched {
        return Err(LedgerError::InvalidLoss);
    }
    if dispatched > Decimal::ZERO && loss / dispatched > HIGH_LOSS_RATIO {
        let loss_pct = (loss / dispatched * Decimal::ONE_HUNDRED).round_dp(2);
        return Ok(Some(Warning::HighLoss { loss_pct }));
    }
    Ok(None)
}

/// Checks a unit price for sanity.
///
/// Selling below cost is permitted; when `cost_per_unit` is known and the
/// price undercuts it, the check succeeds with a [`Warning::BelowCost`]
/// carrying the loss percentage.
pub fn validate_price(
    price: Decimal,
    cost_per_unit: Option<Decimal>,
) -> Result<Option<Warning>, LedgerError> {
    if price <= Decimal::ZERO || price > MAX_UNIT_PRICE {
        return Err(LedgerError::InvalidPrice);
    }
    if let Some(cost) = cost_per_unit
        && cost > Decimal::ZERO
        && price < cost
    {
        let loss_pct = ((cost - price) / cost * Decimal::ONE_HUNDRED).round_dp(2);
        return Ok(Some(Warning::BelowCost { loss_pct }));
    }
    Ok(None)
}

/// Checks that a payment stays within `[0, total]`.
pub fn validate_payment(paid: Decimal, total: Decimal) -> Result<(), LedgerError> {
    if paid < Decimal::ZERO || paid > total {
        return Err(LedgerError::InvalidPayment);
    }
    Ok(())
}

/// Checks that liability split percentages sum to exactly 100.
pub fn validate_liability_split(split: &LiabilitySplit) -> Result<(), LedgerError> {
    if split.seller_pct < Decimal::ZERO
        || split.buyer_pct < Decimal::ZERO
        || split.seller_pct + split.buyer_pct != Decimal::ONE_HUNDRED
    {
        return Err(LedgerError::InvalidLiabilitySplit);
    }
    Ok(())
}
