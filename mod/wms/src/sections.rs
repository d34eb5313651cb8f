//! Sections — 2D grid cells of a warehouse layout with a quantity
//! ceiling, plus their instantiation of the stock ledger.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use wharf_core::{new_id, now_rfc3339, ServiceError};
use wharf_sql::{Row, SQLStore, Value};

use crate::capacity::CapacityLimits;
use crate::ledger::{storage_err, AllocationOutcome, Ledger, TransferOutcome};
use crate::model::{Allocation, Section, SectionCoord};
use crate::space::{required_str, LocationRecord, LocationSpace};

/// SQL schema for the section tables.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS warehouse_sections (
    id             TEXT PRIMARY KEY,
    layout_id      TEXT NOT NULL,
    row_index      INTEGER NOT NULL,
    column_index   INTEGER NOT NULL,
    section_name   TEXT NOT NULL,
    section_type   TEXT NOT NULL DEFAULT 'storage',
    capacity       INTEGER NOT NULL DEFAULT 0,
    is_blocked     INTEGER NOT NULL DEFAULT 0,
    color          TEXT,
    current_usage  INTEGER NOT NULL DEFAULT 0,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL,
    UNIQUE (layout_id, row_index, column_index)
);
CREATE INDEX IF NOT EXISTS idx_sections_layout ON warehouse_sections(layout_id);

CREATE TABLE IF NOT EXISTS section_inventory (
    id          TEXT PRIMARY KEY,
    section_id  TEXT NOT NULL,
    product_id  TEXT NOT NULL,
    quantity    INTEGER NOT NULL,
    notes       TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    UNIQUE (section_id, product_id)
);
CREATE INDEX IF NOT EXISTS idx_section_inv_section ON section_inventory(section_id);
";

/// The section instantiation of the ledger's location space.
pub struct SectionSpace;

impl LocationSpace for SectionSpace {
    type Coord = SectionCoord;

    const KIND: &'static str = "Section";
    const LOCATION_TABLE: &'static str = "warehouse_sections";
    const ALLOCATION_TABLE: &'static str = "section_inventory";
    const LOCATION_FK: &'static str = "section_id";
    const TRACKS_VOLUME: bool = false;
    const HAS_NOTES: bool = true;
    const DENORMALIZES_USAGE: bool = true;
    const NO_SOURCE_MSG: &'static str = "Product not found in source section";

    fn location_from_row(row: &Row) -> Result<LocationRecord<SectionCoord>, ServiceError> {
        Ok(LocationRecord {
            id: required_str(row, "id")?,
            coord: SectionCoord {
                row_index: row.get_i64("row_index").unwrap_or(0),
                column_index: row.get_i64("column_index").unwrap_or(0),
            },
            limits: CapacityLimits {
                max_quantity: row.get_i64("capacity").unwrap_or(0),
                max_volume: 0.0,
            },
        })
    }

    fn describe(_coord: &SectionCoord) -> String {
        "Section".to_string()
    }

    fn transfer_message(quantity: i64, _dest: &SectionCoord) -> String {
        format!("Transferred {quantity} units between sections")
    }
}

/// A section create/update request, keyed on (layout, row, column).
#[derive(Debug, Clone)]
pub struct UpsertSection {
    pub layout_id: String,
    pub row_index: i64,
    pub column_index: i64,
    pub section_name: Option<String>,
    pub section_type: Option<String>,
    pub capacity: Option<i64>,
    pub is_blocked: Option<bool>,
    pub color: Option<String>,
}

/// A section together with its live inventory and computed usage.
#[derive(Debug, Clone, Serialize)]
pub struct SectionWithInventory {
    #[serde(flatten)]
    pub section: Section,
    pub usage_percentage: f64,
    pub section_inventory: Vec<Allocation>,
}

/// Persistent storage and ledger operations for sections.
pub struct SectionStore {
    db: Arc<dyn SQLStore>,
    ledger: Ledger<SectionSpace>,
}

impl SectionStore {
    /// Create the store and initialise the schema.
    pub fn new(db: Arc<dyn SQLStore>) -> Result<Self, ServiceError> {
        db.exec(SCHEMA, &[])
            .map_err(|e| ServiceError::Storage(format!("section schema init: {e}")))?;
        Ok(Self {
            ledger: Ledger::new(Arc::clone(&db)),
            db,
        })
    }

    /// Create or update the section at (layout, row, column).
    pub fn upsert(&self, req: UpsertSection) -> Result<Section, ServiceError> {
        let now = now_rfc3339();
        let section_name = req
            .section_name
            .unwrap_or_else(|| format!("Section {}-{}", req.row_index, req.column_index));
        let section_type = req.section_type.unwrap_or_else(|| "storage".to_string());
        let capacity = req.capacity.unwrap_or(0);
        let is_blocked = req.is_blocked.unwrap_or(false);

        let existing = self
            .db
            .query(
                "SELECT * FROM warehouse_sections \
                 WHERE layout_id = ?1 AND row_index = ?2 AND column_index = ?3",
                &[
                    Value::Text(req.layout_id.clone()),
                    Value::Integer(req.row_index),
                    Value::Integer(req.column_index),
                ],
            )
            .map_err(storage_err)?;

        if let Some(row) = existing.first() {
            let id = required_str(row, "id")?;
            self.db
                .exec(
                    "UPDATE warehouse_sections SET section_name = ?1, section_type = ?2, \
                     capacity = ?3, is_blocked = ?4, color = ?5, updated_at = ?6 WHERE id = ?7",
                    &[
                        Value::Text(section_name),
                        Value::Text(section_type),
                        Value::Integer(capacity),
                        Value::Integer(is_blocked as i64),
                        opt_text(&req.color),
                        Value::Text(now),
                        Value::Text(id.clone()),
                    ],
                )
                .map_err(storage_err)?;
            return self.get(&id);
        }

        let section = Section {
            id: new_id(),
            layout_id: req.layout_id,
            row_index: req.row_index,
            column_index: req.column_index,
            section_name,
            section_type,
            capacity,
            is_blocked,
            color: req.color,
            current_usage: 0,
            created_at: now.clone(),
            updated_at: now,
        };
        self.db
            .exec(
                "INSERT INTO warehouse_sections \
                 (id, layout_id, row_index, column_index, section_name, section_type, capacity, \
                  is_blocked, color, current_usage, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                &[
                    Value::Text(section.id.clone()),
                    Value::Text(section.layout_id.clone()),
                    Value::Integer(section.row_index),
                    Value::Integer(section.column_index),
                    Value::Text(section.section_name.clone()),
                    Value::Text(section.section_type.clone()),
                    Value::Integer(section.capacity),
                    Value::Integer(section.is_blocked as i64),
                    opt_text(&section.color),
                    Value::Integer(0),
                    Value::Text(section.created_at.clone()),
                    Value::Text(section.updated_at.clone()),
                ],
            )
            .map_err(storage_err)?;

        info!(
            layout = section.layout_id,
            row = section.row_index,
            column = section.column_index,
            "section created"
        );
        Ok(section)
    }

    /// Get a section by id.
    pub fn get(&self, id: &str) -> Result<Section, ServiceError> {
        let rows = self
            .db
            .query(
                "SELECT * FROM warehouse_sections WHERE id = ?1",
                &[Value::Text(id.to_string())],
            )
            .map_err(storage_err)?;
        let row = rows
            .first()
            .ok_or_else(|| ServiceError::NotFound("Section not found".to_string()))?;
        row_to_section(row)
    }

    /// List a layout's sections with live usage and nested inventory,
    /// ordered by (row, column). Usage is recomputed from allocations,
    /// not read from the denormalized counter.
    pub fn list(&self, layout_id: &str) -> Result<Vec<SectionWithInventory>, ServiceError> {
        let rows = self
            .db
            .query(
                "SELECT * FROM warehouse_sections WHERE layout_id = ?1 \
                 ORDER BY row_index, column_index",
                &[Value::Text(layout_id.to_string())],
            )
            .map_err(storage_err)?;

        let mut result = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut section = row_to_section(row)?;
            let section_inventory = self.ledger.list_allocations(&section.id)?;
            let total: i64 = section_inventory.iter().map(|a| a.quantity).sum();
            section.current_usage = total;
            let usage_percentage = if section.capacity > 0 {
                (total as f64 / section.capacity as f64) * 100.0
            } else {
                0.0
            };
            result.push(SectionWithInventory {
                section,
                usage_percentage,
                section_inventory,
            });
        }
        Ok(result)
    }

    /// Delete a section.
    pub fn delete(&self, id: &str) -> Result<(), ServiceError> {
        let affected = self
            .db
            .exec(
                "DELETE FROM warehouse_sections WHERE id = ?1",
                &[Value::Text(id.to_string())],
            )
            .map_err(storage_err)?;
        if affected == 0 {
            return Err(ServiceError::NotFound("Section not found".to_string()));
        }
        Ok(())
    }

    /// Inventory rows for a section, newest first.
    pub fn inventory(&self, section_id: &str) -> Result<Vec<Allocation>, ServiceError> {
        self.ledger.list_allocations(section_id)
    }

    /// Move stock into a section, capacity-checked. Refreshes the
    /// section's denormalized usage counter.
    pub fn add_stock(
        &self,
        section_id: &str,
        product_id: &str,
        quantity: i64,
        notes: Option<String>,
    ) -> Result<AllocationOutcome<SectionCoord>, ServiceError> {
        self.ledger
            .allocate(section_id, product_id, quantity, 0.0, None, notes)
    }

    /// Transfer stock between two sections.
    pub fn transfer(
        &self,
        from_section_id: &str,
        to_section_id: &str,
        product_id: &str,
        quantity: i64,
        notes: Option<String>,
    ) -> Result<TransferOutcome<SectionCoord>, ServiceError> {
        self.ledger
            .transfer(from_section_id, to_section_id, product_id, quantity, notes)
    }

    /// Set an inventory row's quantity directly (delete at zero).
    pub fn set_inventory_quantity(
        &self,
        inventory_id: &str,
        quantity: i64,
        notes: Option<String>,
    ) -> Result<Option<Allocation>, ServiceError> {
        self.ledger.set_quantity(inventory_id, quantity, notes)
    }

    /// Remove an inventory row.
    pub fn remove_inventory(&self, inventory_id: &str) -> Result<(), ServiceError> {
        self.ledger.remove(inventory_id)
    }
}

fn row_to_section(row: &Row) -> Result<Section, ServiceError> {
    Ok(Section {
        id: required_str(row, "id")?,
        layout_id: required_str(row, "layout_id")?,
        row_index: row.get_i64("row_index").unwrap_or(0),
        column_index: row.get_i64("column_index").unwrap_or(0),
        section_name: required_str(row, "section_name")?,
        section_type: required_str(row, "section_type")?,
        capacity: row.get_i64("capacity").unwrap_or(0),
        is_blocked: row.get_i64("is_blocked").unwrap_or(0) != 0,
        color: row.get_str("color").map(str::to_string),
        current_usage: row.get_i64("current_usage").unwrap_or(0),
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
