//! Simple REST API server example for the timber ledger engine.
//!
//! Run with: `cargo run --example server`
//!
//! ## Endpoints
//!
//! - `POST /shipments` - Register a shipment
//! - `POST /shipments/{id}/lots` - Register a lot under a shipment
//! - `POST /clients` - Register a client
//! - `POST /sales` - Commit a sale
//! - `DELETE /sales/{id}` - Delete (reverse) a committed sale
//! - `POST /clients/{id}/debt` - Adjust client debt
//! - `GET /lots/{id}` - Get a lot snapshot
//! - `GET /shipments/{id}` - Get a shipment snapshot
//! - `GET /clients/{id}` - Get a client snapshot
//!
//! ## Example Usage
//!
//! ```bash
//! # Register a shipment and a lot
//! curl -X POST http://localhost:3000/shipments \
//!   -H "Content-Type: application/json" \
//!   -d '{"code": "VAG-001", "origin": "Bratsk", "destination": "Shanghai"}'
//! curl -X POST http://localhost:3000/shipments/1/lots \
//!   -H "Content-Type: application/json" \
//!   -d '{"thickness_mm": "50", "width_mm": "150", "length_m": "6", "quantity": 200, "currency": "usd", "purchase_amount": "4500"}'
//!
//! # Commit a sale
//! curl -X POST http://localhost:3000/sales \
//!   -H "Content-Type: application/json" \
//!   -d '{"lot": 1, "client": 1, "unit": "volume", "sent": "4.5", "currency": "usd", "unit_price": "620", "paid_amount": "1000"}'
//!
//! # Pay down debt
//! curl -X POST http://localhost:3000/clients/1/debt \
//!   -H "Content-Type: application/json" \
//!   -d '{"amount": "500", "currency": "usd", "category": "goods", "type": "decrease"}'
//! ```

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use timberledger::{
    ClientId, ClientSnapshot, Currency, DebtAdjustment, DebtCategory, Engine, LedgerError,
    LiabilitySplit, LotId, LotSnapshot, LotSpec, Sale, SaleId, SaleRequest, SaleUnit, ShipmentId,
    ShipmentSnapshot, ShipmentSpec, Warning,
};
use tokio::net::TcpListener;

// === Request/Response DTOs ===

/// Request body for registering a shipment.
#[derive(Debug, Deserialize)]
pub struct ShipmentRequest {
    pub code: String,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub destination: String,
    pub departure_date: Option<String>,
    pub arrival_date: Option<String>,
}

/// Request body for registering a lot.
#[derive(Debug, Deserialize)]
pub struct LotRequest {
    pub thickness_mm: Decimal,
    pub width_mm: Decimal,
    pub length_m: Decimal,
    pub quantity: u32,
    pub currency: Currency,
    pub purchase_amount: Decimal,
}

/// Request body for registering a client.
#[derive(Debug, Deserialize)]
pub struct ClientRequest {
    pub name: String,
    pub contact: Option<String>,
}

/// Request body for committing a sale.
#[derive(Debug, Deserialize)]
pub struct CreateSaleRequest {
    pub lot: u32,
    pub client: u32,
    pub unit: SaleUnit,
    pub sent: Decimal,
    #[serde(default)]
    pub client_loss: Decimal,
    #[serde(default)]
    pub transport_loss: Decimal,
    pub split: Option<LiabilitySplit>,
    pub currency: Currency,
    pub unit_price: Decimal,
    #[serde(default)]
    pub paid_amount: Decimal,
}

/// Request body for a debt adjustment.
#[derive(Debug, Deserialize)]
pub struct DebtRequest {
    pub amount: Decimal,
    pub currency: Currency,
    #[serde(default = "default_category")]
    pub category: DebtCategory,
    #[serde(rename = "type")]
    pub kind: DebtKind,
}

fn default_category() -> DebtCategory {
    DebtCategory::Goods
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebtKind {
    Increase,
    Decrease,
}

/// Response body for a committed sale.
#[derive(Debug, Serialize)]
pub struct SaleResponse {
    pub sale: Sale,
    pub lot: LotSnapshot,
    pub client: ClientSnapshot,
    pub warnings: Vec<Warning>,
}

/// Response body carrying a newly assigned id.
#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: u64,
}

/// Response body for errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// === Application State ===

/// Shared application state containing the ledger engine.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

// === Error Handling ===

/// Wrapper for converting `LedgerError` into HTTP responses.
pub struct AppError(LedgerError);

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            LedgerError::InsufficientInventory { .. } => {
                (StatusCode::BAD_REQUEST, "INSUFFICIENT_INVENTORY")
            }
            LedgerError::InvalidLoss => (StatusCode::BAD_REQUEST, "INVALID_LOSS"),
            LedgerError::InvalidPrice => (StatusCode::BAD_REQUEST, "INVALID_PRICE"),
            LedgerError::InvalidPayment => (StatusCode::BAD_REQUEST, "INVALID_PAYMENT"),
            LedgerError::InvalidLiabilitySplit => {
                (StatusCode::BAD_REQUEST, "INVALID_LIABILITY_SPLIT")
            }
            LedgerError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            LedgerError::OutstandingDebt => (StatusCode::CONFLICT, "OUTSTANDING_DEBT"),
            LedgerError::IrreversibleState => (StatusCode::CONFLICT, "IRREVERSIBLE_STATE"),
            LedgerError::WriteConflict | LedgerError::ConcurrencyExhausted => {
                (StatusCode::CONFLICT, "CONCURRENCY_EXHAUSTED")
            }
            LedgerError::ReconciliationRequired(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "RECONCILIATION_REQUIRED")
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

// === Handlers ===

/// POST /shipments - Register a shipment.
async fn create_shipment(
    State(state): State<AppState>,
    Json(request): Json<ShipmentRequest>,
) -> (StatusCode, Json<CreatedResponse>) {
    let id = state.engine.register_shipment(ShipmentSpec {
        code: request.code,
        origin: request.origin,
        destination: request.destination,
        departure_date: request.departure_date,
        arrival_date: request.arrival_date,
    });
    (StatusCode::CREATED, Json(CreatedResponse { id: id.0.into() }))
}

/// POST /shipments/{id}/lots - Register a lot under a shipment.
async fn create_lot(
    State(state): State<AppState>,
    Path(shipment): Path<u32>,
    Json(request): Json<LotRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), AppError> {
    let id = state.engine.register_lot(
        ShipmentId(shipment),
        LotSpec {
            thickness_mm: request.thickness_mm,
            width_mm: request.width_mm,
            length_m: request.length_m,
            quantity: request.quantity,
            purchase_currency: request.currency,
            purchase_amount: request.purchase_amount,
        },
    )?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id: id.0.into() })))
}

/// POST /clients - Register a client.
async fn create_client(
    State(state): State<AppState>,
    Json(request): Json<ClientRequest>,
) -> (StatusCode, Json<CreatedResponse>) {
    let id = state.engine.register_client(request.name, request.contact);
    (StatusCode::CREATED, Json(CreatedResponse { id: id.0.into() }))
}

/// POST /sales - Commit a sale.
async fn create_sale(
    State(state): State<AppState>,
    Json(request): Json<CreateSaleRequest>,
) -> Result<(StatusCode, Json<SaleResponse>), AppError> {
    let receipt = state.engine.commit_sale(SaleRequest {
        lot_id: LotId(request.lot),
        client_id: ClientId(request.client),
        unit: request.unit,
        sent: request.sent,
        client_loss: request.client_loss,
        transport_loss: request.transport_loss,
        split: request.split,
        currency: request.currency,
        unit_price: request.unit_price,
        paid_amount: request.paid_amount,
    })?;
    Ok((
        StatusCode::CREATED,
        Json(SaleResponse {
            sale: receipt.sale,
            lot: receipt.lot,
            client: receipt.client,
            warnings: receipt.warnings,
        }),
    ))
}

/// DELETE /sales/{id} - Reverse a committed sale.
async fn delete_sale(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, AppError> {
    state.engine.delete_sale(SaleId(id))?;
    Ok(StatusCode::OK)
}

/// POST /clients/{id}/debt - Adjust a client's debt.
async fn adjust_debt(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(request): Json<DebtRequest>,
) -> Result<Json<ClientSnapshot>, AppError> {
    let adjustment = match request.kind {
        DebtKind::Increase => DebtAdjustment::Increase,
        DebtKind::Decrease => DebtAdjustment::Decrease,
    };
    let snapshot = state.engine.adjust_debt(
        ClientId(id),
        request.currency,
        request.category,
        adjustment,
        request.amount,
    )?;
    Ok(Json(snapshot))
}

/// GET /lots/{id} - Get a lot snapshot.
async fn get_lot(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<LotSnapshot>, AppError> {
    Ok(Json(state.engine.lot_snapshot(LotId(id))?))
}

/// GET /shipments/{id} - Get a shipment snapshot.
async fn get_shipment(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<ShipmentSnapshot>, AppError> {
    Ok(Json(state.engine.shipment_snapshot(ShipmentId(id))?))
}

/// GET /clients/{id} - Get a client snapshot.
async fn get_client(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<ClientSnapshot>, AppError> {
    Ok(Json(state.engine.client_snapshot(ClientId(id))?))
}

// === Router ===

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/shipments", post(create_shipment))
        .route("/shipments/{id}", get(get_shipment))
        .route("/shipments/{id}/lots", post(create_lot))
        .route("/clients", post(create_client))
        .route("/clients/{id}", get(get_client))
        .route("/clients/{id}/debt", post(adjust_debt))
        .route("/sales", post(create_sale))
        .route("/sales/{id}", delete(delete_sale))
        .route("/lots/{id}", get(get_lot))
        .with_state(state)
}

// === Main ===

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let state = AppState {
        engine: Arc::new(Engine::new()),
    };

    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:3000").await.unwrap();
    println!("Timber ledger API server running on http://127.0.0.1:3000");
    println!();
    println!("Endpoints:");
    println!("  POST   /shipments           - Register a shipment");
    println!("  POST   /shipments/:id/lots  - Register a lot");
    println!("  POST   /clients             - Register a client");
    println!("  POST   /sales               - Commit a sale");
    println!("  DELETE /sales/:id           - Reverse a sale");
    println!("  POST   /clients/:id/debt    - Adjust client debt");
    println!("  GET    /lots/:id            - Lot snapshot");
    println!("  GET    /shipments/:id       - Shipment snapshot");
    println!("  GET    /clients/:id         - Client snapshot");

    axum::serve(listener, app).await.unwrap();
}
