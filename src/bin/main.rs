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

use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use timberledger::{
    ClientId, Currency, DebtAdjustment, DebtCategory, Engine, LiabilitySplit, LotId, LotSpec,
    ResponsibleParty, SaleRequest, SaleUnit, ShipmentId, ShipmentSpec,
};

/// Timberledger - Replay an operations CSV through the ledger engine
///
/// Reads shipments, lots, clients, sales, payments and losses from a CSV
/// file and outputs per-client debt balances to stdout.
#[derive(Parser, Debug)]
#[command(name = "timberledger")]
#[command(about = "A ledger engine that replays timber-trade operation CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with operations
    ///
    /// Expected format: op,shipment,lot,client,... (see README)
    /// Example: cargo run -- operations.csv > balances.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

fn main() {
    // Parse command line arguments
    let args = Args::parse();

    // Open input file
    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    // Replay operations from CSV
    let engine = match process_operations(BufReader::new(file)) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error processing operations: {}", e);
            process::exit(1);
        }
    };

    // Write results to stdout
    if let Err(e) = write_balances(&engine, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record for one operation. Most columns are optional; which ones
/// matter depends on `op`.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    shipment: Option<u32>,
    lot: Option<u32>,
    client: Option<u32>,
    code: Option<String>,
    origin: Option<String>,
    destination: Option<String>,
    name: Option<String>,
    thickness: Option<Decimal>,
    width: Option<Decimal>,
    length: Option<Decimal>,
    quantity: Option<u32>,
    currency: Option<String>,
    amount: Option<Decimal>,
    unit: Option<String>,
    sent: Option<Decimal>,
    client_loss: Option<Decimal>,
    transport_loss: Option<Decimal>,
    seller_pct: Option<Decimal>,
    buyer_pct: Option<Decimal>,
    unit_price: Option<Decimal>,
    paid: Option<Decimal>,
    category: Option<String>,
    party: Option<String>,
    reason: Option<String>,
}

fn parse_currency(value: Option<&str>) -> Option<Currency> {
    match value?.to_lowercase().as_str() {
        "usd" => Some(Currency::Usd),
        "rub" => Some(Currency::Rub),
        _ => None,
    }
}

fn parse_category(value: Option<&str>) -> DebtCategory {
    match value.map(str::to_lowercase).as_deref() {
        Some("delivery") => DebtCategory::Delivery,
        _ => DebtCategory::Goods,
    }
}

fn parse_party(value: Option<&str>) -> ResponsibleParty {
    match value.map(str::to_lowercase).as_deref() {
        Some("buyer") => ResponsibleParty::Buyer,
        Some("carrier") => ResponsibleParty::Carrier,
        _ => ResponsibleParty::Seller,
    }
}

impl CsvRecord {
    /// Applies this record to the engine.
    ///
    /// Returns `None` for unknown operations or records missing required
    /// fields; ledger errors bubble up as strings for logging.
    fn apply(self, engine: &Engine) -> Option<Result<(), String>> {
        let result = match self.op.to_lowercase().as_str() {
            "shipment" => {
                engine.register_shipment(ShipmentSpec {
                    code: self.code?,
                    origin: self.origin.unwrap_or_default(),
                    destination: self.destination.unwrap_or_default(),
                    departure_date: None,
                    arrival_date: None,
                });
                Ok(())
            }
            "lot" => engine
                .register_lot(
                    ShipmentId(self.shipment?),
                    LotSpec {
                        thickness_mm: self.thickness?,
                        width_mm: self.width?,
                        length_m: self.length?,
                        quantity: self.quantity?,
                        purchase_currency: parse_currency(self.currency.as_deref())?,
                        purchase_amount: self.amount?,
                    },
                )
                .map(|_| ()),
            "client" => {
                engine.register_client(self.name?, None);
                Ok(())
            }
            "sale" => {
                let split = match (self.seller_pct, self.buyer_pct) {
                    (Some(seller_pct), Some(buyer_pct)) => Some(LiabilitySplit {
                        seller_pct,
                        buyer_pct,
                    }),
                    _ => None,
                };
                let unit = match self.unit.map(|u| u.to_lowercase()).as_deref() {
                    Some("pieces") => SaleUnit::Pieces,
                    _ => SaleUnit::Volume,
                };
                engine
                    .commit_sale(SaleRequest {
                        lot_id: LotId(self.lot?),
                        client_id: ClientId(self.client?),
                        unit,
                        sent: self.sent?,
                        client_loss: self.client_loss.unwrap_or_default(),
                        transport_loss: self.transport_loss.unwrap_or_default(),
                        split,
                        currency: parse_currency(self.currency.as_deref())?,
                        unit_price: self.unit_price?,
                        paid_amount: self.paid.unwrap_or_default(),
                    })
                    .map(|_| ())
            }
            "debt" => engine
                .adjust_debt(
                    ClientId(self.client?),
                    parse_currency(self.currency.as_deref())?,
                    parse_category(self.category.as_deref()),
                    DebtAdjustment::Increase,
                    self.amount?,
                )
                .map(|_| ()),
            "payment" => engine
                .adjust_debt(
                    ClientId(self.client?),
                    parse_currency(self.currency.as_deref())?,
                    parse_category(self.category.as_deref()),
                    DebtAdjustment::Decrease,
                    self.amount?,
                )
                .map(|_| ()),
            "loss" => engine
                .record_lot_loss(
                    LotId(self.lot?),
                    self.amount?,
                    parse_party(self.party.as_deref()),
                    self.reason.unwrap_or_default(),
                )
                .map(|_| ()),
            "expense" => engine
                .allocate_lot_expense(LotId(self.lot?), self.amount?)
                .map(|_| ()),
            "close" => engine.close_shipment(ShipmentId(self.shipment?)),
            _ => return None,
        };
        Some(result.map_err(|e| e.to_string()))
    }
}

/// Replay operations from a CSV reader.
///
/// Streaming: the file is never fully loaded. Malformed rows and failed
/// operations are skipped; a replay is a best-effort reconstruction, not a
/// validation pass.
///
/// # CSV Format
///
/// ```csv
/// op,shipment,lot,client,code,origin,destination,name,thickness,width,length,quantity,currency,amount,unit,sent,client_loss,transport_loss,seller_pct,buyer_pct,unit_price,paid,category,party,reason
/// shipment,,,,VAG-001,Bratsk,Shanghai,,,,,,,,,,,,,,,,,,
/// lot,1,,,,,,,50,150,6,200,usd,4500,,,,,,,,,,,
/// client,,,,,,,Harbin Timber,,,,,,,,,,,,,,,,,
/// sale,,1,1,,,,,,,,,usd,,volume,4.5,0,0,,,620,1000,,,
/// payment,,,1,,,,,,,,,usd,500,,,,,,,,,goods,,
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
pub fn process_operations<R: Read>(reader: R) -> Result<Engine, csv::Error> {
    let engine = Engine::new();

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        match result {
            Ok(record) => {
                let op = record.op.clone();
                match record.apply(&engine) {
                    None => {
                        #[cfg(debug_assertions)]
                        eprintln!("Skipping invalid {} record", op);
                    }
                    Some(Err(e)) => {
                        #[cfg(debug_assertions)]
                        eprintln!("Skipping {} operation: {}", op, e);
                    }
                    Some(Ok(())) => {}
                }
            }
            Err(e) => {
                // Skip malformed rows
                #[cfg(debug_assertions)]
                eprintln!("Skipping malformed row: {}", e);
                continue;
            }
        }
    }

    Ok(engine)
}

/// One output row: a client's balance in one currency/category lane.
#[derive(Debug, Serialize)]
struct BalanceRow {
    client: u32,
    name: String,
    currency: &'static str,
    category: String,
    total_debt: Decimal,
    total_paid: Decimal,
    current_debt: Decimal,
}

/// Write per-client debt balances to a CSV writer.
///
/// One row per client per currency/category lane, with 2 decimal precision.
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_balances<W: Write>(engine: &Engine, writer: W) -> Result<(), csv::Error> {
    const PRECISION: u32 = 2;
    let mut wtr = Writer::from_writer(writer);

    for snapshot in engine.client_snapshots() {
        for category in [DebtCategory::Goods, DebtCategory::Delivery] {
            for currency in [Currency::Usd, Currency::Rub] {
                let account = snapshot.account(currency, category);
                wtr.serialize(BalanceRow {
                    client: snapshot.id.0,
                    name: snapshot.name.clone(),
                    currency: currency.as_str(),
                    category: category.to_string(),
                    total_debt: account.total_debt.round_dp(PRECISION),
                    total_paid: account.total_paid.round_dp(PRECISION),
                    current_debt: account.current().round_dp(PRECISION),
                })?;
            }
        }
    }

    wtr.flush()?;
    Ok(())
}
