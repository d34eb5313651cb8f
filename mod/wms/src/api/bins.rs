use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;

use wharf_core::ServiceError;

use crate::bins::{BinFilter, NewBin};
use crate::WmsState;

pub fn routes() -> Router<WmsState> {
    Router::new()
        .route("/bins", get(list_bins).post(create_or_allocate))
        .route("/bins/allocate", post(allocate))
        .route("/bins/move", post(move_stock))
        .route(
            "/bins/allocations/{id}",
            patch(update_allocation).delete(delete_allocation),
        )
}

// ---------------------------------------------------------------------------
// GET /bins
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct BinListQuery {
    warehouse_id: Option<String>,
    section_id: Option<String>,
    x: Option<i64>,
    y: Option<i64>,
    z: Option<i64>,
}

async fn list_bins(
    State(svc): State<WmsState>,
    Query(query): Query<BinListQuery>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let warehouse_id = query
        .warehouse_id
        .ok_or_else(|| ServiceError::Validation("warehouse_id is required".to_string()))?;

    let bins = svc.bins.list(&BinFilter {
        warehouse_id,
        section_id: query.section_id,
        x: query.x,
        y: query.y,
        z: query.z,
    })?;
    Ok(Json(serde_json::json!({ "bins": bins })))
}

// ---------------------------------------------------------------------------
// POST /bins — create, or allocate when `allocate: true`
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct BinPostBody {
    #[serde(default)]
    allocate: bool,

    // create
    warehouse_id: Option<String>,
    section_id: Option<String>,
    x: Option<i64>,
    y: Option<i64>,
    z: Option<i64>,
    max_quantity: Option<i64>,
    max_volume: Option<f64>,
    bin_code: Option<String>,

    // allocate
    bin_id: Option<String>,
    product_id: Option<String>,
    quantity: Option<i64>,
    volume_used: Option<f64>,
    client_id: Option<String>,
}

async fn create_or_allocate(
    State(svc): State<WmsState>,
    Json(body): Json<BinPostBody>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    if body.allocate {
        let req = AllocateRequest {
            bin_id: body.bin_id,
            product_id: body.product_id,
            quantity: body.quantity,
            volume_used: body.volume_used,
            client_id: body.client_id,
        };
        return run_allocate(&svc, req);
    }

    let (warehouse_id, x, y, z) = match (body.warehouse_id, body.x, body.y, body.z) {
        (Some(w), Some(x), Some(y), Some(z)) => (w, x, y, z),
        _ => {
            return Err(ServiceError::Validation(
                "warehouse_id, x, y, z are required".to_string(),
            ))
        }
    };

    let bin = svc.bins.create(NewBin {
        warehouse_id,
        section_id: body.section_id,
        x,
        y,
        z,
        max_quantity: body.max_quantity,
        max_volume: body.max_volume,
        bin_code: body.bin_code,
    })?;
    Ok(Json(serde_json::json!({ "bin": bin })))
}

// ---------------------------------------------------------------------------
// POST /bins/allocate
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AllocateRequest {
    bin_id: Option<String>,
    product_id: Option<String>,
    quantity: Option<i64>,
    volume_used: Option<f64>,
    client_id: Option<String>,
}

async fn allocate(
    State(svc): State<WmsState>,
    Json(req): Json<AllocateRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    run_allocate(&svc, req)
}

fn run_allocate(
    svc: &WmsState,
    req: AllocateRequest,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let (bin_id, product_id, quantity) = match (req.bin_id, req.product_id, req.quantity) {
        (Some(b), Some(p), Some(q)) if q >= 1 => (b, p, q),
        _ => {
            return Err(ServiceError::Validation(
                "bin_id, product_id, and quantity (>=1) are required".to_string(),
            ))
        }
    };

    let out = svc.bins.allocate(
        &bin_id,
        &product_id,
        quantity,
        req.volume_used.unwrap_or(0.0),
        req.client_id,
    )?;
    Ok(Json(serde_json::json!({
        "allocation": out.allocation,
        "action": out.action.as_str(),
        "coordinates": out.coordinates,
    })))
}

// ---------------------------------------------------------------------------
// POST /bins/move
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct MoveRequest {
    from_bin_id: Option<String>,
    to_bin_id: Option<String>,
    product_id: Option<String>,
    quantity: Option<i64>,
}

async fn move_stock(
    State(svc): State<WmsState>,
    Json(req): Json<MoveRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let (from, to, product, quantity) =
        match (req.from_bin_id, req.to_bin_id, req.product_id, req.quantity) {
            (Some(f), Some(t), Some(p), Some(q)) if q >= 1 => (f, t, p, q),
            _ => {
                return Err(ServiceError::Validation(
                    "from_bin_id, to_bin_id, product_id, and quantity (>=1) are required"
                        .to_string(),
                ))
            }
        };

    let out = svc.bins.move_stock(&from, &to, &product, quantity)?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": out.message,
        "from_bin_id": from,
        "to_bin_id": to,
        "coordinates": out.coordinates,
    })))
}

// ---------------------------------------------------------------------------
// PATCH / DELETE /bins/allocations/{id}
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct UpdateAllocationRequest {
    quantity: Option<i64>,
}

async fn update_allocation(
    State(svc): State<WmsState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateAllocationRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let quantity = req
        .quantity
        .ok_or_else(|| ServiceError::Validation("quantity is required".to_string()))?;

    match svc.bins.set_allocation_quantity(&id, quantity)? {
        Some(allocation) => Ok(Json(serde_json::json!({ "allocation": allocation }))),
        None => Ok(Json(serde_json::json!({ "deleted": true }))),
    }
}

async fn delete_allocation(
    State(svc): State<WmsState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    svc.bins.remove_allocation(&id)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}
