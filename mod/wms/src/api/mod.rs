pub mod bins;
pub mod sections;

use axum::Router;

use crate::WmsState;

/// Build the complete WMS module router.
///
/// Routes:
/// - `GET    /bins`                        — list bins with allocations
/// - `POST   /bins`                        — create bin (or allocate with `allocate: true`)
/// - `POST   /bins/allocate`               — allocate stock into a bin
/// - `POST   /bins/move`                   — move stock between bins
/// - `PATCH  /bins/allocations/{id}`       — set allocation quantity
/// - `DELETE /bins/allocations/{id}`       — remove allocation
/// - `GET    /sections`                    — list layout sections with usage
/// - `POST   /sections`                    — create or update a section
/// - `DELETE /sections`                    — delete a section
/// - `GET    /section-inventory`           — list a section's inventory
/// - `POST   /section-inventory`           — move stock into a section
/// - `POST   /section-inventory/transfer`  — transfer stock between sections
/// - `PATCH  /section-inventory/{id}`      — set inventory quantity
/// - `DELETE /section-inventory/{id}`      — remove inventory row
pub fn router(state: WmsState) -> Router {
    Router::new()
        .merge(bins::routes())
        .merge(sections::routes())
        .with_state(state)
}
