use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;

use wharf_core::ServiceError;

use crate::sections::UpsertSection;
use crate::WmsState;

pub fn routes() -> Router<WmsState> {
    Router::new()
        .route(
            "/sections",
            get(list_sections).post(upsert_section).delete(delete_section),
        )
        .route("/section-inventory", get(section_inventory).post(add_stock))
        .route("/section-inventory/transfer", post(transfer))
        .route(
            "/section-inventory/{id}",
            patch(update_inventory).delete(delete_inventory),
        )
}

// ---------------------------------------------------------------------------
// GET /sections
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SectionListQuery {
    layout_id: Option<String>,
}

async fn list_sections(
    State(svc): State<WmsState>,
    Query(query): Query<SectionListQuery>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let layout_id = query
        .layout_id
        .ok_or_else(|| ServiceError::Validation("layout_id is required".to_string()))?;

    let sections = svc.sections.list(&layout_id)?;
    Ok(Json(serde_json::json!({ "sections": sections })))
}

// ---------------------------------------------------------------------------
// POST /sections
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SectionPostBody {
    layout_id: Option<String>,
    row_index: Option<i64>,
    column_index: Option<i64>,
    section_name: Option<String>,
    section_type: Option<String>,
    capacity: Option<i64>,
    is_blocked: Option<bool>,
    color: Option<String>,
}

async fn upsert_section(
    State(svc): State<WmsState>,
    Json(body): Json<SectionPostBody>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let (layout_id, row_index, column_index) =
        match (body.layout_id, body.row_index, body.column_index) {
            (Some(l), Some(r), Some(c)) => (l, r, c),
            _ => {
                return Err(ServiceError::Validation(
                    "layout_id, row_index, and column_index are required".to_string(),
                ))
            }
        };

    let section = svc.sections.upsert(UpsertSection {
        layout_id,
        row_index,
        column_index,
        section_name: body.section_name,
        section_type: body.section_type,
        capacity: body.capacity,
        is_blocked: body.is_blocked,
        color: body.color,
    })?;
    Ok(Json(serde_json::json!({ "section": section })))
}

// ---------------------------------------------------------------------------
// DELETE /sections
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SectionDeleteQuery {
    section_id: Option<String>,
}

async fn delete_section(
    State(svc): State<WmsState>,
    Query(query): Query<SectionDeleteQuery>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let section_id = query
        .section_id
        .ok_or_else(|| ServiceError::Validation("section_id is required".to_string()))?;

    svc.sections.delete(&section_id)?;
    Ok(Json(serde_json::json!({ "success": true })))
}

// ---------------------------------------------------------------------------
// GET /section-inventory
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct InventoryQuery {
    section_id: Option<String>,
}

async fn section_inventory(
    State(svc): State<WmsState>,
    Query(query): Query<InventoryQuery>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let section_id = query
        .section_id
        .ok_or_else(|| ServiceError::Validation("section_id is required".to_string()))?;

    let inventory = svc.sections.inventory(&section_id)?;
    Ok(Json(serde_json::json!({ "inventory": inventory })))
}

// ---------------------------------------------------------------------------
// POST /section-inventory
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AddStockRequest {
    section_id: Option<String>,
    product_id: Option<String>,
    quantity: Option<i64>,
    notes: Option<String>,
}

async fn add_stock(
    State(svc): State<WmsState>,
    Json(req): Json<AddStockRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let (section_id, product_id, quantity) = match (req.section_id, req.product_id, req.quantity) {
        (Some(s), Some(p), Some(q)) => (s, p, q),
        _ => {
            return Err(ServiceError::Validation(
                "section_id, product_id, and quantity are required".to_string(),
            ))
        }
    };

    let out = svc
        .sections
        .add_stock(&section_id, &product_id, quantity, req.notes)?;
    Ok(Json(serde_json::json!({ "inventory": out.allocation })))
}

// ---------------------------------------------------------------------------
// POST /section-inventory/transfer
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SectionTransferRequest {
    from_section_id: Option<String>,
    to_section_id: Option<String>,
    product_id: Option<String>,
    quantity: Option<i64>,
    notes: Option<String>,
}

async fn transfer(
    State(svc): State<WmsState>,
    Json(req): Json<SectionTransferRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let (from, to, product, quantity) = match (
        req.from_section_id,
        req.to_section_id,
        req.product_id,
        req.quantity,
    ) {
        (Some(f), Some(t), Some(p), Some(q)) if q >= 1 => (f, t, p, q),
        _ => {
            return Err(ServiceError::Validation(
                "from_section_id, to_section_id, product_id, and quantity (>=1) are required"
                    .to_string(),
            ))
        }
    };

    let out = svc
        .sections
        .transfer(&from, &to, &product, quantity, req.notes)?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": out.message,
    })))
}

// ---------------------------------------------------------------------------
// PATCH / DELETE /section-inventory/{id}
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct UpdateInventoryRequest {
    quantity: Option<i64>,
    notes: Option<String>,
}

async fn update_inventory(
    State(svc): State<WmsState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateInventoryRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let quantity = req
        .quantity
        .ok_or_else(|| ServiceError::Validation("quantity is required".to_string()))?;

    match svc.sections.set_inventory_quantity(&id, quantity, req.notes)? {
        Some(inventory) => Ok(Json(serde_json::json!({ "inventory": inventory }))),
        None => Ok(Json(serde_json::json!({ "deleted": true }))),
    }
}

async fn delete_inventory(
    State(svc): State<WmsState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    svc.sections.remove_inventory(&id)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}
