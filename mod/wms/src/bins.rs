//! Bins — 3D-addressed storage locations with quantity and volume
//! ceilings, plus their instantiation of the stock ledger.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use wharf_core::{new_id, now_rfc3339, ServiceError};
use wharf_sql::{Row, SQLStore, Value};

use crate::capacity::CapacityLimits;
use crate::ledger::{storage_err, AllocationOutcome, Ledger, TransferOutcome};
use crate::model::{Allocation, Bin, BinCoord};
use crate::space::{required_str, LocationRecord, LocationSpace};

/// SQL schema for the bin tables.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS warehouse_bins (
    id            TEXT PRIMARY KEY,
    warehouse_id  TEXT NOT NULL,
    section_id    TEXT,
    x             INTEGER NOT NULL,
    y             INTEGER NOT NULL,
    z             INTEGER NOT NULL,
    bin_code      TEXT,
    max_quantity  INTEGER NOT NULL DEFAULT 100,
    max_volume    REAL NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    UNIQUE (warehouse_id, x, y, z)
);
CREATE INDEX IF NOT EXISTS idx_bins_warehouse ON warehouse_bins(warehouse_id);
CREATE INDEX IF NOT EXISTS idx_bins_section ON warehouse_bins(section_id);

CREATE TABLE IF NOT EXISTS bin_allocations (
    id           TEXT PRIMARY KEY,
    bin_id       TEXT NOT NULL,
    product_id   TEXT NOT NULL,
    quantity     INTEGER NOT NULL,
    volume_used  REAL NOT NULL DEFAULT 0,
    client_id    TEXT,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL,
    UNIQUE (bin_id, product_id)
);
CREATE INDEX IF NOT EXISTS idx_bin_alloc_bin ON bin_allocations(bin_id);
";

/// The bin instantiation of the ledger's location space.
pub struct BinSpace;

impl LocationSpace for BinSpace {
    type Coord = BinCoord;

    const KIND: &'static str = "Bin";
    const LOCATION_TABLE: &'static str = "warehouse_bins";
    const ALLOCATION_TABLE: &'static str = "bin_allocations";
    const LOCATION_FK: &'static str = "bin_id";
    const TRACKS_VOLUME: bool = true;
    const HAS_NOTES: bool = false;
    const DENORMALIZES_USAGE: bool = false;
    const NO_SOURCE_MSG: &'static str = "No allocation found for this product in source bin";

    fn location_from_row(row: &Row) -> Result<LocationRecord<BinCoord>, ServiceError> {
        Ok(LocationRecord {
            id: required_str(row, "id")?,
            coord: BinCoord {
                x: row.get_i64("x").unwrap_or(0),
                y: row.get_i64("y").unwrap_or(0),
                z: row.get_i64("z").unwrap_or(0),
            },
            limits: CapacityLimits {
                max_quantity: row.get_i64("max_quantity").unwrap_or(0),
                max_volume: row.get_f64("max_volume").unwrap_or(0.0),
            },
        })
    }

    fn describe(coord: &BinCoord) -> String {
        format!("Bin ({},{},{})", coord.x, coord.y, coord.z)
    }

    fn transfer_message(quantity: i64, dest: &BinCoord) -> String {
        format!(
            "Moved {quantity} units to bin ({},{},{})",
            dest.x, dest.y, dest.z
        )
    }
}

/// A new bin, as accepted by the create endpoint.
#[derive(Debug, Clone)]
pub struct NewBin {
    pub warehouse_id: String,
    pub section_id: Option<String>,
    pub x: i64,
    pub y: i64,
    pub z: i64,
    pub max_quantity: Option<i64>,
    pub max_volume: Option<f64>,
    pub bin_code: Option<String>,
}

/// Listing filters. `warehouse_id` is mandatory, the rest narrow.
#[derive(Debug, Clone, Default)]
pub struct BinFilter {
    pub warehouse_id: String,
    pub section_id: Option<String>,
    pub x: Option<i64>,
    pub y: Option<i64>,
    pub z: Option<i64>,
}

/// A bin together with its live allocations, as returned by listings.
#[derive(Debug, Clone, Serialize)]
pub struct BinWithAllocations {
    #[serde(flatten)]
    pub bin: Bin,
    pub bin_allocations: Vec<Allocation>,
}

/// Persistent storage and ledger operations for bins.
pub struct BinStore {
    db: Arc<dyn SQLStore>,
    ledger: Ledger<BinSpace>,
}

impl BinStore {
    /// Create the store and initialise the schema.
    pub fn new(db: Arc<dyn SQLStore>) -> Result<Self, ServiceError> {
        db.exec(SCHEMA, &[])
            .map_err(|e| ServiceError::Storage(format!("bin schema init: {e}")))?;
        Ok(Self {
            ledger: Ledger::new(Arc::clone(&db)),
            db,
        })
    }

    /// Create a bin. The coordinate is unique per warehouse.
    pub fn create(&self, new: NewBin) -> Result<Bin, ServiceError> {
        let now = now_rfc3339();
        let bin = Bin {
            id: new_id(),
            warehouse_id: new.warehouse_id,
            section_id: new.section_id,
            x: new.x,
            y: new.y,
            z: new.z,
            bin_code: new.bin_code,
            max_quantity: new.max_quantity.filter(|q| *q > 0).unwrap_or(100),
            max_volume: new.max_volume.unwrap_or(0.0),
            created_at: now.clone(),
            updated_at: now,
        };

        self.db
            .exec(
                "INSERT INTO warehouse_bins \
                 (id, warehouse_id, section_id, x, y, z, bin_code, max_quantity, max_volume, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                &[
                    Value::Text(bin.id.clone()),
                    Value::Text(bin.warehouse_id.clone()),
                    opt_text(&bin.section_id),
                    Value::Integer(bin.x),
                    Value::Integer(bin.y),
                    Value::Integer(bin.z),
                    opt_text(&bin.bin_code),
                    Value::Integer(bin.max_quantity),
                    Value::Real(bin.max_volume),
                    Value::Text(bin.created_at.clone()),
                    Value::Text(bin.updated_at.clone()),
                ],
            )
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("UNIQUE constraint") {
                    ServiceError::Conflict(
                        "Bin at (x,y,z) already exists for this warehouse".to_string(),
                    )
                } else {
                    storage_err(e)
                }
            })?;

        info!(
            warehouse = bin.warehouse_id,
            x = bin.x,
            y = bin.y,
            z = bin.z,
            "bin created"
        );
        Ok(bin)
    }

    /// List a warehouse's bins with their allocations, ordered by (x, y, z).
    pub fn list(&self, filter: &BinFilter) -> Result<Vec<BinWithAllocations>, ServiceError> {
        let mut where_clauses = vec!["warehouse_id = ?1".to_string()];
        let mut params = vec![Value::Text(filter.warehouse_id.clone())];
        let mut idx = 2;

        if let Some(section_id) = &filter.section_id {
            where_clauses.push(format!("section_id = ?{idx}"));
            params.push(Value::Text(section_id.clone()));
            idx += 1;
        }
        for (col, val) in [("x", filter.x), ("y", filter.y), ("z", filter.z)] {
            if let Some(v) = val {
                where_clauses.push(format!("{col} = ?{idx}"));
                params.push(Value::Integer(v));
                idx += 1;
            }
        }

        let sql = format!(
            "SELECT * FROM warehouse_bins WHERE {} ORDER BY x, y, z",
            where_clauses.join(" AND ")
        );
        let rows = self.db.query(&sql, &params).map_err(storage_err)?;

        let mut result = Vec::with_capacity(rows.len());
        for row in &rows {
            let bin = row_to_bin(row)?;
            let bin_allocations = self.ledger.list_allocations(&bin.id)?;
            result.push(BinWithAllocations {
                bin,
                bin_allocations,
            });
        }
        Ok(result)
    }

    /// Allocate stock into a bin, capacity-checked.
    pub fn allocate(
        &self,
        bin_id: &str,
        product_id: &str,
        quantity: i64,
        volume_used: f64,
        client_id: Option<String>,
    ) -> Result<AllocationOutcome<BinCoord>, ServiceError> {
        self.ledger
            .allocate(bin_id, product_id, quantity, volume_used, client_id, None)
    }

    /// Move stock between two bins.
    pub fn move_stock(
        &self,
        from_bin_id: &str,
        to_bin_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> Result<TransferOutcome<BinCoord>, ServiceError> {
        self.ledger
            .transfer(from_bin_id, to_bin_id, product_id, quantity, None)
    }

    /// Set an allocation's quantity directly (delete at zero).
    pub fn set_allocation_quantity(
        &self,
        allocation_id: &str,
        quantity: i64,
    ) -> Result<Option<Allocation>, ServiceError> {
        self.ledger.set_quantity(allocation_id, quantity, None)
    }

    /// Remove an allocation row.
    pub fn remove_allocation(&self, allocation_id: &str) -> Result<(), ServiceError> {
        self.ledger.remove(allocation_id)
    }
}

fn row_to_bin(row: &Row) -> Result<Bin, ServiceError> {
    Ok(Bin {
        id: required_str(row, "id")?,
        warehouse_id: required_str(row, "warehouse_id")?,
        section_id: row.get_str("section_id").map(str::to_string),
        x: row.get_i64("x").unwrap_or(0),
        y: row.get_i64("y").unwrap_or(0),
        z: row.get_i64("z").unwrap_or(0),
        bin_code: row.get_str("bin_code").map(str::to_string),
        max_quantity: row.get_i64("max_quantity").unwrap_or(0),
        max_volume: row.get_f64("max_volume").unwrap_or(0.0),
        created_at: required_str(row, "created_at")?,
        updated_at: required_str(row, "updated_at")?,
    })
}

fn opt_text(value: &Option<String>) -> Value {
    match value {
        Some(s) => Value::Text(s.clone()),
        None => Value::Null,
    }
}
