//! Generic stock ledger — allocation writer and transfer coordinator,
//! parameterized over a [`LocationSpace`].
//!
//! Every read-check-write span (allocate, transfer, set-quantity) runs
//! inside one database transaction on the serialized connection, so two
//! concurrent operations against the same location cannot both pass the
//! capacity check and jointly exceed the ceiling.

use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug;

use wharf_core::{new_id, now_rfc3339, ServiceError};
use wharf_sql::{Row, SQLStore, SqlSession, Value};

use crate::capacity::{check_capacity, StockLevel};
use crate::model::{AllocAction, Allocation};
use crate::space::{required_str, LocationRecord, LocationSpace};

/// Map a storage failure, surfacing a missing schema as 503 with a hint.
pub(crate) fn storage_err(err: wharf_sql::SQLError) -> ServiceError {
    let msg = err.to_string();
    if msg.contains("no such table") {
        ServiceError::Unavailable(format!(
            "{msg}. Run migrations to initialise the warehouse schema."
        ))
    } else {
        ServiceError::Storage(msg)
    }
}

/// Result of an accepted allocate.
#[derive(Debug, Clone)]
pub struct AllocationOutcome<C> {
    pub allocation: Allocation,
    pub action: AllocAction,
    pub coordinates: C,
}

/// Result of an accepted transfer.
#[derive(Debug, Clone)]
pub struct TransferOutcome<C> {
    pub moved: i64,
    pub message: String,
    pub coordinates: C,
}

/// Capacity-bounded stock ledger over one location space.
pub struct Ledger<S: LocationSpace> {
    db: Arc<dyn SQLStore>,
    _space: PhantomData<fn() -> S>,
}

impl<S: LocationSpace> Ledger<S> {
    pub fn new(db: Arc<dyn SQLStore>) -> Self {
        Self {
            db,
            _space: PhantomData,
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    fn load_location<Sess: SqlSession + ?Sized>(
        &self,
        session: &Sess,
        id: &str,
    ) -> Result<Option<LocationRecord<S::Coord>>, ServiceError> {
        let sql = format!("SELECT * FROM {} WHERE id = ?1", S::LOCATION_TABLE);
        let rows = session
            .query(&sql, &[Value::Text(id.to_string())])
            .map_err(storage_err)?;
        rows.first().map(S::location_from_row).transpose()
    }

    fn usage_in<Sess: SqlSession + ?Sized>(
        &self,
        session: &Sess,
        location_id: &str,
    ) -> Result<StockLevel, ServiceError> {
        let sql = if S::TRACKS_VOLUME {
            format!(
                "SELECT COALESCE(SUM(quantity), 0) AS qty, COALESCE(SUM(volume_used), 0) AS vol \
                 FROM {} WHERE {} = ?1",
                S::ALLOCATION_TABLE,
                S::LOCATION_FK
            )
        } else {
            format!(
                "SELECT COALESCE(SUM(quantity), 0) AS qty FROM {} WHERE {} = ?1",
                S::ALLOCATION_TABLE,
                S::LOCATION_FK
            )
        };
        let rows = session
            .query(&sql, &[Value::Text(location_id.to_string())])
            .map_err(storage_err)?;

        let row = rows.first();
        Ok(StockLevel {
            quantity: row.and_then(|r| r.get_i64("qty")).unwrap_or(0),
            volume: row.and_then(|r| r.get_f64("vol")).unwrap_or(0.0),
        })
    }

    fn find_allocation<Sess: SqlSession + ?Sized>(
        &self,
        session: &Sess,
        location_id: &str,
        product_id: &str,
    ) -> Result<Option<Allocation>, ServiceError> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?1 AND product_id = ?2",
            S::ALLOCATION_TABLE,
            S::LOCATION_FK
        );
        let rows = session
            .query(
                &sql,
                &[
                    Value::Text(location_id.to_string()),
                    Value::Text(product_id.to_string()),
                ],
            )
            .map_err(storage_err)?;
        rows.first().map(|r| self.row_to_allocation(r)).transpose()
    }

    fn get_allocation<Sess: SqlSession + ?Sized>(
        &self,
        session: &Sess,
        id: &str,
    ) -> Result<Option<Allocation>, ServiceError> {
        let sql = format!("SELECT * FROM {} WHERE id = ?1", S::ALLOCATION_TABLE);
        let rows = session
            .query(&sql, &[Value::Text(id.to_string())])
            .map_err(storage_err)?;
        rows.first().map(|r| self.row_to_allocation(r)).transpose()
    }

    fn row_to_allocation(&self, row: &Row) -> Result<Allocation, ServiceError> {
        Ok(Allocation {
            id: required_str(row, "id")?,
            location_id: required_str(row, S::LOCATION_FK)?,
            product_id: required_str(row, "product_id")?,
            quantity: row.get_i64("quantity").unwrap_or(0),
            volume_used: if S::TRACKS_VOLUME {
                Some(row.get_f64("volume_used").unwrap_or(0.0))
            } else {
                None
            },
            client_id: if S::TRACKS_VOLUME {
                row.get_str("client_id").map(str::to_string)
            } else {
                None
            },
            notes: if S::HAS_NOTES {
                row.get_str("notes").map(str::to_string)
            } else {
                None
            },
            created_at: required_str(row, "created_at")?,
            updated_at: required_str(row, "updated_at")?,
        })
    }

    /// All allocations at a location, newest first.
    pub fn list_allocations(&self, location_id: &str) -> Result<Vec<Allocation>, ServiceError> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?1 ORDER BY created_at DESC",
            S::ALLOCATION_TABLE,
            S::LOCATION_FK
        );
        let rows = self
            .db
            .query(&sql, &[Value::Text(location_id.to_string())])
            .map_err(storage_err)?;
        rows.iter().map(|r| self.row_to_allocation(r)).collect()
    }

    /// Live committed usage at a location, outside any transaction.
    pub fn usage_of(&self, location_id: &str) -> Result<StockLevel, ServiceError> {
        self.usage_in(self.db.as_ref(), location_id)
    }

    // -----------------------------------------------------------------------
    // Allocation writer
    // -----------------------------------------------------------------------

    /// Place stock at a location: capacity check, then upsert keyed on
    /// (location, product). Allocating twice is additive by design.
    pub fn allocate(
        &self,
        location_id: &str,
        product_id: &str,
        quantity: i64,
        volume_used: f64,
        client_id: Option<String>,
        notes: Option<String>,
    ) -> Result<AllocationOutcome<S::Coord>, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::Validation(
                "quantity must be at least 1".to_string(),
            ));
        }

        let tx = self.db.begin().map_err(storage_err)?;

        let location = self
            .load_location(&*tx, location_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("{} not found", S::KIND)))?;

        let current = self.usage_in(&*tx, location_id)?;
        check_capacity(
            &S::describe(&location.coord),
            &location.limits,
            &current,
            quantity,
            volume_used,
        )
        .map_err(|e| e.into_rejection(false))?;

        let now = now_rfc3339();
        let (allocation, action) = match self.find_allocation(&*tx, location_id, product_id)? {
            Some(existing) => {
                let new_quantity = existing.quantity + quantity;
                let new_volume = existing.volume_used.unwrap_or(0.0) + volume_used;
                if S::TRACKS_VOLUME {
                    let sql = format!(
                        "UPDATE {} SET quantity = ?1, volume_used = ?2, updated_at = ?3 WHERE id = ?4",
                        S::ALLOCATION_TABLE
                    );
                    tx.exec(
                        &sql,
                        &[
                            Value::Integer(new_quantity),
                            Value::Real(new_volume),
                            Value::Text(now.clone()),
                            Value::Text(existing.id.clone()),
                        ],
                    )
                    .map_err(storage_err)?;
                } else if notes.is_some() {
                    let sql = format!(
                        "UPDATE {} SET quantity = ?1, notes = ?2, updated_at = ?3 WHERE id = ?4",
                        S::ALLOCATION_TABLE
                    );
                    tx.exec(
                        &sql,
                        &[
                            Value::Integer(new_quantity),
                            opt_text(&notes),
                            Value::Text(now.clone()),
                            Value::Text(existing.id.clone()),
                        ],
                    )
                    .map_err(storage_err)?;
                } else {
                    // An absent notes field leaves the stored note alone.
                    let sql = format!(
                        "UPDATE {} SET quantity = ?1, updated_at = ?2 WHERE id = ?3",
                        S::ALLOCATION_TABLE
                    );
                    tx.exec(
                        &sql,
                        &[
                            Value::Integer(new_quantity),
                            Value::Text(now.clone()),
                            Value::Text(existing.id.clone()),
                        ],
                    )
                    .map_err(storage_err)?;
                }

                let merged_notes = if S::HAS_NOTES {
                    notes.or_else(|| existing.notes.clone())
                } else {
                    None
                };
                (
                    Allocation {
                        quantity: new_quantity,
                        volume_used: S::TRACKS_VOLUME.then_some(new_volume),
                        notes: merged_notes,
                        updated_at: now,
                        ..existing
                    },
                    AllocAction::Updated,
                )
            }
            None => {
                let allocation = Allocation {
                    id: new_id(),
                    location_id: location_id.to_string(),
                    product_id: product_id.to_string(),
                    quantity,
                    volume_used: S::TRACKS_VOLUME.then_some(volume_used),
                    client_id: if S::TRACKS_VOLUME { client_id } else { None },
                    notes: if S::HAS_NOTES { notes } else { None },
                    created_at: now.clone(),
                    updated_at: now,
                };
                self.insert_allocation(&*tx, &allocation)?;
                (allocation, AllocAction::Created)
            }
        };

        if S::DENORMALIZES_USAGE {
            self.refresh_usage(&*tx, location_id)?;
        }

        tx.commit().map_err(storage_err)?;

        debug!(
            location = location_id,
            product = product_id,
            quantity,
            action = action.as_str(),
            "stock allocated"
        );

        Ok(AllocationOutcome {
            allocation,
            action,
            coordinates: location.coord,
        })
    }

    fn insert_allocation<Sess: SqlSession + ?Sized>(
        &self,
        session: &Sess,
        alloc: &Allocation,
    ) -> Result<(), ServiceError> {
        if S::TRACKS_VOLUME {
            let sql = format!(
                "INSERT INTO {} (id, {}, product_id, quantity, volume_used, client_id, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                S::ALLOCATION_TABLE,
                S::LOCATION_FK
            );
            session
                .exec(
                    &sql,
                    &[
                        Value::Text(alloc.id.clone()),
                        Value::Text(alloc.location_id.clone()),
                        Value::Text(alloc.product_id.clone()),
                        Value::Integer(alloc.quantity),
                        Value::Real(alloc.volume_used.unwrap_or(0.0)),
                        opt_text(&alloc.client_id),
                        Value::Text(alloc.created_at.clone()),
                        Value::Text(alloc.updated_at.clone()),
                    ],
                )
                .map_err(storage_err)?;
        } else {
            let sql = format!(
                "INSERT INTO {} (id, {}, product_id, quantity, notes, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                S::ALLOCATION_TABLE,
                S::LOCATION_FK
            );
            session
                .exec(
                    &sql,
                    &[
                        Value::Text(alloc.id.clone()),
                        Value::Text(alloc.location_id.clone()),
                        Value::Text(alloc.product_id.clone()),
                        Value::Integer(alloc.quantity),
                        opt_text(&alloc.notes),
                        Value::Text(alloc.created_at.clone()),
                        Value::Text(alloc.updated_at.clone()),
                    ],
                )
                .map_err(storage_err)?;
        }
        Ok(())
    }

    fn refresh_usage<Sess: SqlSession + ?Sized>(
        &self,
        session: &Sess,
        location_id: &str,
    ) -> Result<(), ServiceError> {
        let sql = format!(
            "UPDATE {loc} SET current_usage = \
             (SELECT COALESCE(SUM(quantity), 0) FROM {alloc} WHERE {fk} = ?1), \
             updated_at = ?2 WHERE id = ?1",
            loc = S::LOCATION_TABLE,
            alloc = S::ALLOCATION_TABLE,
            fk = S::LOCATION_FK,
        );
        session
            .exec(
                &sql,
                &[
                    Value::Text(location_id.to_string()),
                    Value::Text(now_rfc3339()),
                ],
            )
            .map_err(storage_err)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Transfer coordinator
    // -----------------------------------------------------------------------

    /// Move `quantity` units of a product between two locations.
    ///
    /// Debit and credit are atomic: validation, the destination capacity
    /// check and both writes run in one transaction, and a failure at any
    /// step leaves both locations untouched.
    pub fn transfer(
        &self,
        from_id: &str,
        to_id: &str,
        product_id: &str,
        quantity: i64,
        notes: Option<String>,
    ) -> Result<TransferOutcome<S::Coord>, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::Validation(
                "quantity must be at least 1".to_string(),
            ));
        }
        if from_id == to_id {
            return Err(ServiceError::Validation(format!(
                "Source and destination {} must be different",
                S::KIND.to_lowercase()
            )));
        }

        let tx = self.db.begin().map_err(storage_err)?;

        let source = self
            .find_allocation(&*tx, from_id, product_id)?
            .ok_or_else(|| ServiceError::NotFound(S::NO_SOURCE_MSG.to_string()))?;

        let available = source.quantity;
        if quantity > available {
            return Err(ServiceError::Validation(format!(
                "Insufficient quantity. Available: {available}. Requested: {quantity}."
            )));
        }

        let dest = self.load_location(&*tx, to_id)?.ok_or_else(|| {
            ServiceError::NotFound(format!(
                "Destination {} not found",
                S::KIND.to_lowercase()
            ))
        })?;

        let dest_usage = self.usage_in(&*tx, to_id)?;
        check_capacity(
            &S::describe(&dest.coord),
            &dest.limits,
            &dest_usage,
            quantity,
            0.0,
        )
        .map_err(|e| e.into_rejection(true))?;

        let now = now_rfc3339();

        // Debit source: delete at zero, never keep an empty row.
        let remaining = available - quantity;
        if remaining <= 0 {
            let sql = format!("DELETE FROM {} WHERE id = ?1", S::ALLOCATION_TABLE);
            tx.exec(&sql, &[Value::Text(source.id.clone())])
                .map_err(storage_err)?;
        } else {
            let sql = format!(
                "UPDATE {} SET quantity = ?1, updated_at = ?2 WHERE id = ?3",
                S::ALLOCATION_TABLE
            );
            tx.exec(
                &sql,
                &[
                    Value::Integer(remaining),
                    Value::Text(now.clone()),
                    Value::Text(source.id.clone()),
                ],
            )
            .map_err(storage_err)?;
        }

        // Credit destination.
        let note = notes.unwrap_or_else(|| {
            format!("Transferred from {} {from_id}", S::KIND.to_lowercase())
        });
        match self.find_allocation(&*tx, to_id, product_id)? {
            Some(existing) => {
                if S::HAS_NOTES {
                    let sql = format!(
                        "UPDATE {} SET quantity = ?1, notes = ?2, updated_at = ?3 WHERE id = ?4",
                        S::ALLOCATION_TABLE
                    );
                    tx.exec(
                        &sql,
                        &[
                            Value::Integer(existing.quantity + quantity),
                            Value::Text(note),
                            Value::Text(now),
                            Value::Text(existing.id.clone()),
                        ],
                    )
                    .map_err(storage_err)?;
                } else {
                    let sql = format!(
                        "UPDATE {} SET quantity = ?1, updated_at = ?2 WHERE id = ?3",
                        S::ALLOCATION_TABLE
                    );
                    tx.exec(
                        &sql,
                        &[
                            Value::Integer(existing.quantity + quantity),
                            Value::Text(now),
                            Value::Text(existing.id.clone()),
                        ],
                    )
                    .map_err(storage_err)?;
                }
            }
            None => {
                let credited = Allocation {
                    id: new_id(),
                    location_id: to_id.to_string(),
                    product_id: product_id.to_string(),
                    quantity,
                    volume_used: S::TRACKS_VOLUME.then_some(0.0),
                    client_id: None,
                    notes: S::HAS_NOTES.then_some(note),
                    created_at: now.clone(),
                    updated_at: now,
                };
                self.insert_allocation(&*tx, &credited)?;
            }
        }

        tx.commit().map_err(storage_err)?;

        debug!(
            from = from_id,
            to = to_id,
            product = product_id,
            quantity,
            "stock transferred"
        );

        Ok(TransferOutcome {
            moved: quantity,
            message: S::transfer_message(quantity, &dest.coord),
            coordinates: dest.coord,
        })
    }

    // -----------------------------------------------------------------------
    // Direct updates
    // -----------------------------------------------------------------------

    /// Set an allocation's quantity directly. A target of <= 0 deletes the
    /// row; an increase is capacity-checked for the delta.
    ///
    /// Returns the updated allocation, or `None` when the row was removed.
    pub fn set_quantity(
        &self,
        allocation_id: &str,
        quantity: i64,
        notes: Option<String>,
    ) -> Result<Option<Allocation>, ServiceError> {
        let tx = self.db.begin().map_err(storage_err)?;

        let existing = self
            .get_allocation(&*tx, allocation_id)?
            .ok_or_else(|| ServiceError::NotFound("Allocation not found".to_string()))?;

        if quantity <= 0 {
            let sql = format!("DELETE FROM {} WHERE id = ?1", S::ALLOCATION_TABLE);
            tx.exec(&sql, &[Value::Text(allocation_id.to_string())])
                .map_err(storage_err)?;
            if S::DENORMALIZES_USAGE {
                self.refresh_usage(&*tx, &existing.location_id)?;
            }
            tx.commit().map_err(storage_err)?;
            return Ok(None);
        }

        if quantity > existing.quantity {
            let location = self
                .load_location(&*tx, &existing.location_id)?
                .ok_or_else(|| ServiceError::NotFound(format!("{} not found", S::KIND)))?;
            let current = self.usage_in(&*tx, &existing.location_id)?;
            check_capacity(
                &S::describe(&location.coord),
                &location.limits,
                &current,
                quantity - existing.quantity,
                0.0,
            )
            .map_err(|e| e.into_rejection(false))?;
        }

        let now = now_rfc3339();
        if S::HAS_NOTES && notes.is_some() {
            let sql = format!(
                "UPDATE {} SET quantity = ?1, notes = ?2, updated_at = ?3 WHERE id = ?4",
                S::ALLOCATION_TABLE
            );
            tx.exec(
                &sql,
                &[
                    Value::Integer(quantity),
                    opt_text(&notes),
                    Value::Text(now.clone()),
                    Value::Text(allocation_id.to_string()),
                ],
            )
            .map_err(storage_err)?;
        } else {
            let sql = format!(
                "UPDATE {} SET quantity = ?1, updated_at = ?2 WHERE id = ?3",
                S::ALLOCATION_TABLE
            );
            tx.exec(
                &sql,
                &[
                    Value::Integer(quantity),
                    Value::Text(now.clone()),
                    Value::Text(allocation_id.to_string()),
                ],
            )
            .map_err(storage_err)?;
        }

        if S::DENORMALIZES_USAGE {
            self.refresh_usage(&*tx, &existing.location_id)?;
        }
        tx.commit().map_err(storage_err)?;

        Ok(Some(Allocation {
            quantity,
            notes: if S::HAS_NOTES && notes.is_some() {
                notes
            } else {
                existing.notes.clone()
            },
            updated_at: now,
            ..existing
        }))
    }

    /// Remove an allocation row entirely.
    pub fn remove(&self, allocation_id: &str) -> Result<(), ServiceError> {
        let tx = self.db.begin().map_err(storage_err)?;

        let existing = self
            .get_allocation(&*tx, allocation_id)?
            .ok_or_else(|| ServiceError::NotFound("Allocation not found".to_string()))?;

        let sql = format!("DELETE FROM {} WHERE id = ?1", S::ALLOCATION_TABLE);
        tx.exec(&sql, &[Value::Text(allocation_id.to_string())])
            .map_err(storage_err)?;

        if S::DENORMALIZES_USAGE {
            self.refresh_usage(&*tx, &existing.location_id)?;
        }
        tx.commit().map_err(storage_err)?;
        Ok(())
    }
}

fn opt_text(value: &Option<String>) -> Value {
    match value {
        Some(s) => Value::Text(s.clone()),
        None => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bins::BinSpace;
    use axum::http::StatusCode;
    use wharf_sql::SqliteStore;

    // A store whose schema was never initialised.
    fn bare_ledger() -> Ledger<BinSpace> {
        let db = Arc::new(SqliteStore::open_in_memory().unwrap());
        Ledger::new(db)
    }

    #[test]
    fn missing_schema_is_unavailable_with_migration_hint() {
        let ledger = bare_ledger();

        let err = ledger.allocate("b1", "sku1", 1, 0.0, None, None).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        match err {
            ServiceError::Unavailable(msg) => {
                assert!(msg.contains("no such table"));
                assert!(msg.contains("Run migrations to initialise the warehouse schema."));
            }
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[test]
    fn missing_schema_on_reads_is_unavailable_too() {
        let ledger = bare_ledger();
        let err = ledger.list_allocations("b1").unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
    }
}
