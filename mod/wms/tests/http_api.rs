//! Router-level tests driving the WMS HTTP surface end to end against an
//! in-memory SQLite store.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use wharf_sql::SqliteStore;
use wharf_wms::{api, WmsService};

fn service() -> Router {
    let db = Arc::new(SqliteStore::open_in_memory().expect("open in-memory store"));
    let svc = Arc::new(WmsService::new(db).expect("init wms service"));
    api::router(svc)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("build request");

    let response = app.clone().oneshot(request).await.expect("route request");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("read body").to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("parse response json")
    };
    (status, value)
}

async fn create_bin(app: &Router, x: i64, y: i64, z: i64, body_extra: Value) -> String {
    let mut body = json!({ "warehouse_id": "wh1", "x": x, "y": y, "z": z });
    if let (Some(dst), Some(src)) = (body.as_object_mut(), body_extra.as_object()) {
        for (k, v) in src {
            dst.insert(k.clone(), v.clone());
        }
    }
    let (status, out) = send(app, "POST", "/bins", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    out["bin"]["id"].as_str().expect("bin id").to_string()
}

async fn create_section(app: &Router, row: i64, col: i64, capacity: i64) -> String {
    let (status, out) = send(
        app,
        "POST",
        "/sections",
        Some(json!({
            "layout_id": "layout1",
            "row_index": row,
            "column_index": col,
            "capacity": capacity,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    out["section"]["id"].as_str().expect("section id").to_string()
}

#[tokio::test]
async fn create_and_list_bins() {
    let app = service();
    create_bin(&app, 0, 0, 0, json!({ "bin_code": "A-0-0-0" })).await;
    create_bin(&app, 1, 0, 0, json!({})).await;

    let (status, out) = send(&app, "GET", "/bins?warehouse_id=wh1", None).await;
    assert_eq!(status, StatusCode::OK);
    let bins = out["bins"].as_array().expect("bins array");
    assert_eq!(bins.len(), 2);
    assert_eq!(bins[0]["bin_code"], "A-0-0-0");
    assert_eq!(bins[0]["max_quantity"], 100);
    assert_eq!(bins[0]["bin_allocations"], json!([]));
}

#[tokio::test]
async fn list_bins_requires_warehouse_id() {
    let app = service();
    let (status, out) = send(&app, "GET", "/bins", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(out["error"], "warehouse_id is required");
}

#[tokio::test]
async fn duplicate_bin_coordinates_conflict() {
    let app = service();
    create_bin(&app, 2, 3, 4, json!({})).await;

    let (status, out) = send(
        &app,
        "POST",
        "/bins",
        Some(json!({ "warehouse_id": "wh1", "x": 2, "y": 3, "z": 4 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    // The conflict message is a fixed string, not interpolated coordinates.
    assert_eq!(out["error"], "Bin at (x,y,z) already exists for this warehouse");
}

#[tokio::test]
async fn allocate_twice_is_additive() {
    let app = service();
    let bin_id = create_bin(&app, 0, 0, 0, json!({})).await;

    let body = json!({ "bin_id": bin_id, "product_id": "prod1", "quantity": 30 });
    let (status, out) = send(&app, "POST", "/bins/allocate", Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(out["action"], "created");
    assert_eq!(out["allocation"]["quantity"], 30);
    assert_eq!(out["coordinates"], json!({ "x": 0, "y": 0, "z": 0 }));

    let (status, out) = send(&app, "POST", "/bins/allocate", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(out["action"], "updated");
    assert_eq!(out["allocation"]["quantity"], 60);
}

#[tokio::test]
async fn post_bins_with_allocate_flag_dispatches_to_allocation() {
    let app = service();
    let bin_id = create_bin(&app, 0, 0, 0, json!({})).await;

    let (status, out) = send(
        &app,
        "POST",
        "/bins",
        Some(json!({
            "allocate": true,
            "bin_id": bin_id,
            "product_id": "prod1",
            "quantity": 5,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(out["action"], "created");
    assert_eq!(out["allocation"]["quantity"], 5);
}

#[tokio::test]
async fn allocation_over_capacity_is_rejected_with_details() {
    let app = service();
    let bin_id = create_bin(&app, 0, 0, 0, json!({ "max_quantity": 100 })).await;

    let (status, _) = send(
        &app,
        "POST",
        "/bins/allocate",
        Some(json!({ "bin_id": bin_id, "product_id": "prod1", "quantity": 90 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, out) = send(
        &app,
        "POST",
        "/bins/allocate",
        Some(json!({ "bin_id": bin_id, "product_id": "prod2", "quantity": 20 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(out["error"], "Over-allocation prevented");
    assert_eq!(
        out["details"],
        "Bin (0,0,0) capacity: 100. Current: 90. Cannot add 20."
    );

    // An exact fill still goes through.
    let (status, _) = send(
        &app,
        "POST",
        "/bins/allocate",
        Some(json!({ "bin_id": bin_id, "product_id": "prod2", "quantity": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn allocate_into_missing_bin_is_not_found() {
    let app = service();
    let (status, out) = send(
        &app,
        "POST",
        "/bins/allocate",
        Some(json!({ "bin_id": "nope", "product_id": "p", "quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(out["error"], "Bin not found");
}

#[tokio::test]
async fn allocate_requires_fields() {
    let app = service();
    let (status, out) = send(
        &app,
        "POST",
        "/bins/allocate",
        Some(json!({ "bin_id": "b1", "quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(out["error"], "bin_id, product_id, and quantity (>=1) are required");
}

#[tokio::test]
async fn move_full_quantity_removes_source_allocation() {
    let app = service();
    let from = create_bin(&app, 0, 0, 0, json!({})).await;
    let to = create_bin(&app, 1, 0, 0, json!({})).await;

    send(
        &app,
        "POST",
        "/bins/allocate",
        Some(json!({ "bin_id": from, "product_id": "prod1", "quantity": 25 })),
    )
    .await;

    let (status, out) = send(
        &app,
        "POST",
        "/bins/move",
        Some(json!({
            "from_bin_id": from,
            "to_bin_id": to,
            "product_id": "prod1",
            "quantity": 25,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(out["success"], true);
    assert_eq!(out["message"], "Moved 25 units to bin (1,0,0)");

    let (_, listed) = send(&app, "GET", "/bins?warehouse_id=wh1", None).await;
    let bins = listed["bins"].as_array().expect("bins array");
    assert_eq!(bins[0]["bin_allocations"], json!([]));
    assert_eq!(bins[1]["bin_allocations"][0]["quantity"], 25);
}

#[tokio::test]
async fn move_over_destination_capacity_is_rejected() {
    let app = service();
    let from = create_bin(&app, 0, 0, 0, json!({})).await;
    let to = create_bin(&app, 1, 0, 0, json!({ "max_quantity": 10 })).await;

    send(
        &app,
        "POST",
        "/bins/allocate",
        Some(json!({ "bin_id": from, "product_id": "prod1", "quantity": 20 })),
    )
    .await;
    send(
        &app,
        "POST",
        "/bins/allocate",
        Some(json!({ "bin_id": to, "product_id": "prod2", "quantity": 8 })),
    )
    .await;

    let (status, out) = send(
        &app,
        "POST",
        "/bins/move",
        Some(json!({
            "from_bin_id": from,
            "to_bin_id": to,
            "product_id": "prod1",
            "quantity": 5,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(out["error"], "Over-allocation prevented at destination");
    assert_eq!(out["details"], "Bin (1,0,0) capacity: 10. Current: 8. Cannot add 5.");

    // Nothing moved.
    let (_, listed) = send(&app, "GET", "/bins?warehouse_id=wh1", None).await;
    let bins = listed["bins"].as_array().expect("bins array");
    assert_eq!(bins[0]["bin_allocations"][0]["quantity"], 20);
    assert_eq!(bins[1]["bin_allocations"][0]["quantity"], 8);
}

#[tokio::test]
async fn move_insufficient_quantity_leaves_state_untouched() {
    let app = service();
    let from = create_bin(&app, 0, 0, 0, json!({})).await;
    let to = create_bin(&app, 1, 0, 0, json!({})).await;

    send(
        &app,
        "POST",
        "/bins/allocate",
        Some(json!({ "bin_id": from, "product_id": "prod1", "quantity": 3 })),
    )
    .await;

    let (status, out) = send(
        &app,
        "POST",
        "/bins/move",
        Some(json!({
            "from_bin_id": from,
            "to_bin_id": to,
            "product_id": "prod1",
            "quantity": 9,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(out["error"], "Insufficient quantity. Available: 3. Requested: 9.");

    let (_, listed) = send(&app, "GET", "/bins?warehouse_id=wh1", None).await;
    let bins = listed["bins"].as_array().expect("bins array");
    assert_eq!(bins[0]["bin_allocations"][0]["quantity"], 3);
    assert_eq!(bins[1]["bin_allocations"], json!([]));
}

#[tokio::test]
async fn move_to_same_bin_is_rejected() {
    let app = service();
    let bin = create_bin(&app, 0, 0, 0, json!({})).await;

    let (status, out) = send(
        &app,
        "POST",
        "/bins/move",
        Some(json!({
            "from_bin_id": bin,
            "to_bin_id": bin,
            "product_id": "prod1",
            "quantity": 1,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(out["error"], "Source and destination bin must be different");
}

#[tokio::test]
async fn patch_allocation_to_zero_deletes_it() {
    let app = service();
    let bin = create_bin(&app, 0, 0, 0, json!({})).await;

    let (_, out) = send(
        &app,
        "POST",
        "/bins/allocate",
        Some(json!({ "bin_id": bin, "product_id": "prod1", "quantity": 10 })),
    )
    .await;
    let alloc_id = out["allocation"]["id"].as_str().expect("allocation id").to_string();

    let (status, out) = send(
        &app,
        "PATCH",
        &format!("/bins/allocations/{alloc_id}"),
        Some(json!({ "quantity": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(out["deleted"], true);

    let (status, out) = send(
        &app,
        "DELETE",
        &format!("/bins/allocations/{alloc_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(out["error"], "Allocation not found");
}

#[tokio::test]
async fn sections_upsert_and_list_with_usage() {
    let app = service();
    let section_id = create_section(&app, 0, 0, 50).await;

    // Same coordinates update in place instead of inserting a twin.
    let (status, out) = send(
        &app,
        "POST",
        "/sections",
        Some(json!({
            "layout_id": "layout1",
            "row_index": 0,
            "column_index": 0,
            "section_name": "Cold storage",
            "capacity": 50,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(out["section"]["id"], section_id.as_str());
    assert_eq!(out["section"]["section_name"], "Cold storage");

    send(
        &app,
        "POST",
        "/section-inventory",
        Some(json!({ "section_id": section_id, "product_id": "prod1", "quantity": 10 })),
    )
    .await;

    let (status, out) = send(&app, "GET", "/sections?layout_id=layout1", None).await;
    assert_eq!(status, StatusCode::OK);
    let sections = out["sections"].as_array().expect("sections array");
    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0]["current_usage"], 10);
    assert_eq!(sections[0]["usage_percentage"], 20.0);
}

#[tokio::test]
async fn section_add_stock_over_capacity_is_rejected() {
    let app = service();
    let section_id = create_section(&app, 1, 1, 15).await;

    send(
        &app,
        "POST",
        "/section-inventory",
        Some(json!({ "section_id": section_id, "product_id": "prod1", "quantity": 12 })),
    )
    .await;

    let (status, out) = send(
        &app,
        "POST",
        "/section-inventory",
        Some(json!({ "section_id": section_id, "product_id": "prod2", "quantity": 4 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(out["error"], "Over-allocation prevented");
    assert_eq!(out["details"], "Section capacity: 15. Current: 12. Cannot add 4.");
}

#[tokio::test]
async fn section_transfer_moves_stock_and_reports_message() {
    let app = service();
    let from = create_section(&app, 0, 0, 0).await;
    let to = create_section(&app, 0, 1, 0).await;

    send(
        &app,
        "POST",
        "/section-inventory",
        Some(json!({ "section_id": from, "product_id": "prod1", "quantity": 40 })),
    )
    .await;

    let (status, out) = send(
        &app,
        "POST",
        "/section-inventory/transfer",
        Some(json!({
            "from_section_id": from,
            "to_section_id": to,
            "product_id": "prod1",
            "quantity": 15,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(out["success"], true);
    assert_eq!(out["message"], "Transferred 15 units between sections");

    let (_, from_inv) = send(&app, "GET", &format!("/section-inventory?section_id={from}"), None).await;
    assert_eq!(from_inv["inventory"][0]["quantity"], 25);

    let (_, to_inv) = send(&app, "GET", &format!("/section-inventory?section_id={to}"), None).await;
    assert_eq!(to_inv["inventory"][0]["quantity"], 15);
    assert_eq!(
        to_inv["inventory"][0]["notes"],
        format!("Transferred from section {from}")
    );
}

#[tokio::test]
async fn section_transfer_over_destination_capacity_is_rejected() {
    let app = service();
    let from = create_section(&app, 0, 0, 0).await;
    let to = create_section(&app, 0, 1, 10).await;

    send(
        &app,
        "POST",
        "/section-inventory",
        Some(json!({ "section_id": from, "product_id": "prod1", "quantity": 30 })),
    )
    .await;
    send(
        &app,
        "POST",
        "/section-inventory",
        Some(json!({ "section_id": to, "product_id": "prod2", "quantity": 7 })),
    )
    .await;

    let (status, out) = send(
        &app,
        "POST",
        "/section-inventory/transfer",
        Some(json!({
            "from_section_id": from,
            "to_section_id": to,
            "product_id": "prod1",
            "quantity": 5,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(out["error"], "Over-allocation prevented at destination");
    assert_eq!(out["details"], "Section capacity: 10. Current: 7. Cannot add 5.");
}

#[tokio::test]
async fn delete_section_then_missing_is_not_found() {
    let app = service();
    let section_id = create_section(&app, 3, 3, 0).await;

    let (status, out) = send(
        &app,
        "DELETE",
        &format!("/sections?section_id={section_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(out["success"], true);

    let (status, out) = send(
        &app,
        "DELETE",
        &format!("/sections?section_id={section_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(out["error"], "Section not found");
}
