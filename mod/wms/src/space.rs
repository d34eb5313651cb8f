//! Location spaces — the two coordinate schemes the ledger is
//! instantiated over. Bins are 3D-addressed and volume-tracking; sections
//! are 2D grid cells with a quantity ceiling only.

use std::fmt;

use serde::Serialize;

use wharf_core::ServiceError;
use wharf_sql::Row;

use crate::capacity::CapacityLimits;

/// A location's identity and ceilings, as read from its table.
#[derive(Debug, Clone)]
pub struct LocationRecord<C> {
    pub id: String,
    pub coord: C,
    pub limits: CapacityLimits,
}

/// Shape of one storage domain: table names, coordinate type, and which
/// capacity dimensions and allocation columns exist.
///
/// The ledger is generic over this trait; `BinSpace` and `SectionSpace`
/// are the only instantiations.
pub trait LocationSpace: Send + Sync + 'static {
    /// Coordinate shape, rendered into confirmations and API payloads.
    type Coord: Clone + fmt::Debug + Serialize + Send + Sync;

    /// Capitalised noun for messages ("Bin", "Section").
    const KIND: &'static str;
    const LOCATION_TABLE: &'static str;
    const ALLOCATION_TABLE: &'static str;
    /// Column linking an allocation row to its location.
    const LOCATION_FK: &'static str;
    /// Allocations carry `volume_used`/`client_id` and the location a
    /// `max_volume` ceiling.
    const TRACKS_VOLUME: bool;
    /// Allocations carry an operator `notes` column.
    const HAS_NOTES: bool;
    /// The location row keeps a denormalized usage counter refreshed after
    /// inbound writes.
    const DENORMALIZES_USAGE: bool;
    /// 404 message when a transfer's source holds no row for the product.
    const NO_SOURCE_MSG: &'static str;

    /// Read id, coordinate and ceilings from a `LOCATION_TABLE` row.
    fn location_from_row(row: &Row) -> Result<LocationRecord<Self::Coord>, ServiceError>;

    /// Descriptor used in capacity detail strings.
    fn describe(coord: &Self::Coord) -> String;

    /// Confirmation message for an accepted transfer of `quantity` units.
    fn transfer_message(quantity: i64, dest: &Self::Coord) -> String;
}

pub(crate) fn required_str(row: &Row, col: &str) -> Result<String, ServiceError> {
    row.get_str(col)
        .map(str::to_string)
        .ok_or_else(|| ServiceError::Internal(format!("row missing column '{col}'")))
}
