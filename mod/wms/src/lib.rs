pub mod api;
pub mod bins;
pub mod capacity;
pub mod ledger;
pub mod model;
pub mod sections;
pub mod space;

use std::sync::Arc;

use axum::Router;

use wharf_core::{Module, ServiceError};
use wharf_sql::SQLStore;

use bins::BinStore;
use sections::SectionStore;

/// WMS service — the capacity-bounded stock ledger over bins and sections.
pub struct WmsService {
    pub bins: BinStore,
    pub sections: SectionStore,
}

impl WmsService {
    /// Create the service and initialise both storage domains.
    pub fn new(db: Arc<dyn SQLStore>) -> Result<Self, ServiceError> {
        Ok(Self {
            bins: BinStore::new(Arc::clone(&db))?,
            sections: SectionStore::new(db)?,
        })
    }
}

/// Shared application state for the WMS routers.
pub type WmsState = Arc<WmsService>;

/// The WMS module — warehouse bins, sections and stock movement.
pub struct WmsModule {
    service: Arc<WmsService>,
}

impl WmsModule {
    pub fn new(db: Arc<dyn SQLStore>) -> Result<Self, ServiceError> {
        Ok(Self {
            service: Arc::new(WmsService::new(db)?),
        })
    }
}

impl Module for WmsModule {
    fn name(&self) -> &str {
        "wms"
    }

    fn routes(&self) -> Router {
        api::router(Arc::clone(&self.service))
    }
}
