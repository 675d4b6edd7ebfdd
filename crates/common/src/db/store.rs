//! Unit store
//!
//! Owns every read and write of units. A store value carries its own
//! request-scoped cache, so callers build one per request and drop it
//! afterwards. Writes clear the cache.
//!
//! Default resolution is a read with write side effects: it may seed the
//! starter units or repair duplicate default flags. It runs as one
//! transaction on the primary connection.

use crate::cache::UnitCache;
use crate::db::models::*;
use crate::db::seed::{UnitSeed, DEFAULT_UNITS};
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::normalize::normalize_code;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseBackend, DatabaseConnection,
    DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};
use uuid::Uuid;

/// Select box entry: unit id and `"shortcut - name"` label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitOption {
    pub id: Uuid,
    pub label: String,
}

/// Store for unit records
pub struct UnitStore {
    pool: DbPool,
    seed: &'static [UnitSeed],
    cache: UnitCache,
}

impl UnitStore {
    /// Create a store with an empty cache and the standard seed list
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            seed: DEFAULT_UNITS,
            cache: UnitCache::new(),
        }
    }

    /// Replace the list used by seeding
    pub fn with_seed(mut self, seed: &'static [UnitSeed]) -> Self {
        self.seed = seed;
        self
    }

    /// The underlying pool
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    /// Find a unit by id
    pub async fn get_by_id(&self, id: Uuid) -> Result<Unit> {
        UnitEntity::find_by_id(id)
            .one(self.read_conn())
            .await?
            .ok_or_else(|| AppError::UnitNotFound {
                key: format!("id={}", id),
            })
    }

    /// Find the single unit with this exact shortcut
    pub async fn get_by_shortcut(&self, shortcut: &str) -> Result<Unit> {
        let query = UnitEntity::find().filter(UnitColumn::Shortcut.eq(shortcut));
        fetch_single(self.read_conn(), query, "shortcut", shortcut).await
    }

    /// Find the single unit with this exact code
    pub async fn get_by_code(&self, code: &str) -> Result<Unit> {
        let query = UnitEntity::find().filter(UnitColumn::Code.eq(code));
        fetch_single(self.read_conn(), query, "code", code).await
    }

    /// All units ordered by name (ties by id)
    pub async fn list_all(&self) -> Result<Vec<Unit>> {
        if let Some(units) = self.cache.units().await {
            return Ok(units);
        }

        let units = ordered(UnitEntity::find()).all(self.read_conn()).await?;
        self.cache.set_units(units.clone()).await;
        Ok(units)
    }

    /// Options for unit select boxes, in list order
    pub async fn form_options(&self) -> Result<Vec<UnitOption>> {
        if let Some(options) = self.cache.options().await {
            return Ok(options);
        }

        let options: Vec<UnitOption> = self
            .list_all()
            .await?
            .iter()
            .map(|u| UnitOption {
                id: u.id,
                label: u.option_label(),
            })
            .collect();
        self.cache.set_options(options.clone()).await;
        Ok(options)
    }

    // ========================================================================
    // Default unit
    // ========================================================================

    /// Resolve the default unit, seeding or repairing storage when needed.
    ///
    /// - exactly one default: returned as is
    /// - none: the seed list is installed once and resolution retried; a
    ///   second miss fails with `SeedExhausted`
    /// - several: the first by name (then id) keeps the flag, the rest lose it
    pub async fn get_default(&self) -> Result<Unit> {
        if let Some(unit) = self.cache.default_unit().await {
            return Ok(unit);
        }

        let result = self.resolve_default().await;
        metrics::record_operation("get_default", result.is_ok());
        let (unit, changed) = result?;

        if changed {
            self.cache.invalidate().await;
        }
        self.cache.set_default_unit(unit.clone()).await;
        Ok(unit)
    }

    /// Returns the default and whether storage was modified
    async fn resolve_default(&self) -> Result<(Unit, bool)> {
        let txn = self.write_conn().begin().await?;
        lock_units(&txn).await?;

        let mut retried = false;
        let mut changed = false;

        let unit = loop {
            let mut defaults = ordered(UnitEntity::find().filter(UnitColumn::IsDefault.eq(true)))
                .all(&txn)
                .await?;

            if defaults.is_empty() {
                if retried {
                    txn.rollback().await?;
                    tracing::error!("No default unit after seeding");
                    return Err(AppError::SeedExhausted);
                }

                warn!("No default unit found, installing starter units");
                insert_seed(&txn, self.seed).await?;
                changed = true;
                retried = true;
                continue;
            }

            let first = defaults.remove(0);
            if !defaults.is_empty() {
                let cleared = clear_default_except(&txn, first.id).await?;
                metrics::record_default_repair(cleared as usize + 1);
                changed = true;
            }
            break first;
        };

        txn.commit().await?;
        Ok((unit, changed))
    }

    /// Make `unit` the only default unit and return its fresh state
    pub async fn set_default(&self, unit: &Unit) -> Result<Unit> {
        let result = self.set_default_inner(unit.id).await;
        metrics::record_operation("set_default", result.is_ok());
        self.cache.invalidate().await;

        let updated = result?;
        info!(unit_id = %updated.id, code = %updated.code, "Default unit changed");
        Ok(updated)
    }

    async fn set_default_inner(&self, id: Uuid) -> Result<Unit> {
        let txn = self.write_conn().begin().await?;
        lock_units(&txn).await?;

        let target = match UnitEntity::find_by_id(id).one(&txn).await? {
            Some(target) => target,
            None => {
                txn.rollback().await?;
                return Err(AppError::UnitNotFound {
                    key: format!("id={}", id),
                });
            }
        };

        clear_default_except(&txn, id).await?;

        let mut active: UnitActiveModel = target.into();
        active.is_default = Set(true);
        active.updated_at = Set(chrono::Utc::now().into());
        let updated = active.update(&txn).await?;

        txn.commit().await?;
        Ok(updated)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Create a unit. The code defaults to the normalized shortcut; an explicit
    /// code is normalized the same way.
    pub async fn create(&self, name: &str, shortcut: &str, code: Option<&str>) -> Result<Unit> {
        let result = self.create_inner(name, shortcut, code).await;
        metrics::record_operation("create", result.is_ok());

        let unit = result?;
        self.cache.invalidate().await;
        info!(unit_id = %unit.id, code = %unit.code, "Unit created");
        Ok(unit)
    }

    async fn create_inner(&self, name: &str, shortcut: &str, code: Option<&str>) -> Result<Unit> {
        let name = required("name", name)?;
        let shortcut = required("shortcut", shortcut)?;

        let code_field = if code.is_some() { "code" } else { "shortcut" };
        let code = normalize_code(code.unwrap_or(shortcut));
        if code.is_empty() {
            return Err(AppError::Validation {
                message: "code must contain at least one letter or digit".to_string(),
                field: Some(code_field.to_string()),
            });
        }

        insert_unit(self.write_conn(), name, &code, shortcut, false).await
    }

    /// Change name and shortcut of an existing unit. The code never changes.
    pub async fn update(&self, id: Uuid, name: &str, shortcut: &str) -> Result<Unit> {
        let result = self.update_inner(id, name, shortcut).await;
        metrics::record_operation("update", result.is_ok());

        let unit = result?;
        self.cache.invalidate().await;
        info!(unit_id = %unit.id, "Unit updated");
        Ok(unit)
    }

    async fn update_inner(&self, id: Uuid, name: &str, shortcut: &str) -> Result<Unit> {
        let name = required("name", name)?;
        let shortcut = required("shortcut", shortcut)?;

        let mut unit: UnitActiveModel = UnitEntity::find_by_id(id)
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::UnitNotFound {
                key: format!("id={}", id),
            })?
            .into();

        unit.name = Set(name.to_string());
        unit.shortcut = Set(shortcut.to_string());
        unit.updated_at = Set(chrono::Utc::now().into());

        unit.update(self.write_conn()).await.map_err(Into::into)
    }

    /// Delete a unit. Fails with `UnitInUse` when other records reference it.
    pub async fn remove(&self, unit: &Unit) -> Result<()> {
        let result = UnitEntity::delete_by_id(unit.id)
            .exec(self.write_conn())
            .await
            .map_err(|e| AppError::from_delete(e, &unit.name))
            .and_then(|res| {
                if res.rows_affected == 0 {
                    Err(AppError::UnitNotFound {
                        key: format!("id={}", unit.id),
                    })
                } else {
                    Ok(())
                }
            });
        metrics::record_operation("remove", result.is_ok());

        result?;
        self.cache.invalidate().await;
        info!(unit_id = %unit.id, code = %unit.code, "Unit removed");
        Ok(())
    }

    /// Install every seed entry whose code is not present yet.
    ///
    /// Returns the number of inserted units.
    pub async fn seed_defaults(&self) -> Result<usize> {
        let result = async {
            let txn = self.write_conn().begin().await?;
            lock_units(&txn).await?;
            let inserted = insert_seed(&txn, self.seed).await?;
            txn.commit().await?;
            Ok::<_, AppError>(inserted)
        }
        .await;
        metrics::record_operation("seed", result.is_ok());

        let inserted = result?;
        self.cache.invalidate().await;
        Ok(inserted)
    }
}

// ============================================================================
// Query helpers (usable on pools and transactions alike)
// ============================================================================

fn ordered(query: Select<UnitEntity>) -> Select<UnitEntity> {
    query
        .order_by_asc(UnitColumn::Name)
        .order_by_asc(UnitColumn::Id)
}

/// Exactly one row or a typed failure
async fn fetch_single<C: ConnectionTrait>(
    conn: &C,
    query: Select<UnitEntity>,
    field: &str,
    value: &str,
) -> Result<Unit> {
    let mut rows = ordered(query).limit(2).all(conn).await?;
    match rows.len() {
        0 => Err(AppError::UnitNotFound {
            key: format!("{}={}", field, value),
        }),
        1 => Ok(rows.remove(0)),
        _ => Err(AppError::Ambiguous {
            field: field.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Serialize default bookkeeping between concurrent transactions.
///
/// Must run before the first read of the transaction. Postgres takes a table
/// lock so two requests cannot both seed or both repair. SQLite transactions
/// start deferred, so a no-op write claims the write lock up front the way
/// `BEGIN IMMEDIATE` would; a later upgrade from a read could fail with busy.
async fn lock_units(txn: &DatabaseTransaction) -> Result<()> {
    match txn.get_database_backend() {
        DatabaseBackend::Postgres => {
            txn.execute_unprepared("LOCK TABLE units IN SHARE ROW EXCLUSIVE MODE")
                .await?;
        }
        DatabaseBackend::Sqlite => {
            txn.execute_unprepared("UPDATE units SET is_default = is_default WHERE 0")
                .await?;
        }
        _ => {}
    }
    Ok(())
}

/// Clear the default flag on every unit except `keep`; returns rows touched
async fn clear_default_except<C: ConnectionTrait>(conn: &C, keep: Uuid) -> Result<u64> {
    let now: DateTimeWithTimeZone = chrono::Utc::now().into();
    let res = UnitEntity::update_many()
        .col_expr(UnitColumn::IsDefault, Expr::value(false))
        .col_expr(UnitColumn::UpdatedAt, Expr::value(now))
        .filter(UnitColumn::IsDefault.eq(true))
        .filter(UnitColumn::Id.ne(keep))
        .exec(conn)
        .await?;
    Ok(res.rows_affected)
}

async fn insert_unit<C: ConnectionTrait>(
    conn: &C,
    name: &str,
    code: &str,
    shortcut: &str,
    is_default: bool,
) -> Result<Unit> {
    let now: DateTimeWithTimeZone = chrono::Utc::now().into();

    let unit = UnitActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set(code.to_string()),
        name: Set(name.to_string()),
        shortcut: Set(shortcut.to_string()),
        is_default: Set(is_default),
        created_at: Set(now),
        updated_at: Set(now),
    };

    unit.insert(conn)
        .await
        .map_err(|e| AppError::from_insert(e, code))
}

/// Install missing seed entries and make sure a default exists afterwards.
///
/// When storage has no default, the seed default either arrives flagged or,
/// if its code is already present, gets its flag back. With a default in
/// place seeded rows are inserted unflagged.
async fn insert_seed<C: ConnectionTrait>(conn: &C, seed: &[UnitSeed]) -> Result<usize> {
    let existing: HashSet<String> = UnitEntity::find()
        .filter(UnitColumn::Code.is_in(seed.iter().map(|s| s.code)))
        .all(conn)
        .await?
        .into_iter()
        .map(|u| u.code)
        .collect();

    let has_default = UnitEntity::find()
        .filter(UnitColumn::IsDefault.eq(true))
        .one(conn)
        .await?
        .is_some();

    let mut inserted = 0;
    for entry in seed.iter().filter(|s| !existing.contains(s.code)) {
        let is_default = entry.is_default && !has_default;
        insert_unit(conn, entry.name, entry.code, entry.shortcut, is_default).await?;
        inserted += 1;
    }

    if !has_default {
        if let Some(entry) = seed.iter().find(|s| s.is_default && existing.contains(s.code)) {
            let now: DateTimeWithTimeZone = chrono::Utc::now().into();
            UnitEntity::update_many()
                .col_expr(UnitColumn::IsDefault, Expr::value(true))
                .col_expr(UnitColumn::UpdatedAt, Expr::value(now))
                .filter(UnitColumn::Code.eq(entry.code))
                .exec(conn)
                .await?;
            warn!(code = entry.code, "No default unit, restored the starter default");
        }
    }

    metrics::record_seed_run(inserted);
    info!(inserted, skipped = existing.len(), "Starter units installed");
    Ok(inserted)
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation {
            message: format!("{} is required", field),
            field: Some(field.to_string()),
        });
    }
    Ok(value)
}
