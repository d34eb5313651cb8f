use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

/// 3D position of a bin inside a warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinCoord {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

/// Grid position of a section inside a warehouse layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionCoord {
    pub row_index: i64,
    pub column_index: i64,
}

// ---------------------------------------------------------------------------
// Locations
// ---------------------------------------------------------------------------

/// A storage bin addressed by (x, y, z) within a warehouse.
///
/// `max_quantity` / `max_volume` of 0 mean unconstrained. Stock movement
/// never mutates the bin row; committed usage is derived from allocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bin {
    pub id: String,
    pub warehouse_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    pub x: i64,
    pub y: i64,
    pub z: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin_code: Option<String>,
    pub max_quantity: i64,
    pub max_volume: f64,
    pub created_at: String,
    pub updated_at: String,
}

impl Bin {
    pub fn coord(&self) -> BinCoord {
        BinCoord {
            x: self.x,
            y: self.y,
            z: self.z,
        }
    }
}

/// A layout section addressed by (row, column) within a warehouse grid.
///
/// `capacity` of 0 means unconstrained. `current_usage` is a denormalized
/// counter refreshed after inbound section-inventory writes; listings
/// recompute it from live allocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub layout_id: String,
    pub row_index: i64,
    pub column_index: i64,
    pub section_name: String,
    pub section_type: String,
    pub capacity: i64,
    pub is_blocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub current_usage: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Section {
    pub fn coord(&self) -> SectionCoord {
        SectionCoord {
            row_index: self.row_index,
            column_index: self.column_index,
        }
    }
}

// ---------------------------------------------------------------------------
// Allocations
// ---------------------------------------------------------------------------

/// A binding of one product to one quantity at one location.
///
/// At most one row exists per (location, product) pair; writers upsert.
/// A row never persists at quantity <= 0 — it is deleted instead.
/// `volume_used`/`client_id` are tracked for bins, `notes` for sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub id: String,
    pub location_id: String,
    pub product_id: String,
    pub quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_used: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Whether an allocate upserted into an existing row or created a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocAction {
    Created,
    Updated,
}

impl AllocAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
        }
    }
}

impl std::fmt::Display for AllocAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
