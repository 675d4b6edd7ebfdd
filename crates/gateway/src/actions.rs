//! Unit actions
//!
//! Each action runs one store operation and turns its outcome into a
//! [`Flash`] for the user. Expected failures (missing unit, duplicate code,
//! unit in use) get a specific message; anything else is logged and reported
//! with a generic one. Both the JSON API and the admin pages go through here.

use crate::flash::Flash;
use crate::forms::UnitInput;
use axum::http::StatusCode;
use tracing::{error, warn};
use unitforge_common::{AppError, Unit, UnitStore};
use uuid::Uuid;

const UNIT_MISSING: &str = "Unit does not exist.";
const SAVE_FAILED: &str = "Saving to the database failed.";

/// A failed action: what to tell the user plus the underlying error
#[derive(Debug)]
pub struct ActionError {
    pub flash: Flash,
    pub error: AppError,
}

impl ActionError {
    fn new(error: AppError, message: impl Into<String>) -> Self {
        Self {
            flash: Flash::error(message),
            error,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.error.status_code()
    }

    pub fn is_lookup_failure(&self) -> bool {
        self.error.is_lookup_failure()
    }
}

pub type ActionResult<T> = std::result::Result<(T, Flash), ActionError>;

/// Path ids that are not UUIDs name no unit
pub fn parse_id(raw: &str) -> Result<Uuid, ActionError> {
    Uuid::parse_str(raw).map_err(|_| {
        ActionError::new(
            AppError::UnitNotFound {
                key: format!("id={}", raw),
            },
            UNIT_MISSING,
        )
    })
}

fn missing(err: AppError) -> ActionError {
    warn!(error = %err, "Unit lookup failed");
    ActionError::new(err, UNIT_MISSING)
}

fn unexpected(err: AppError, message: &str) -> ActionError {
    error!(error = %err, "Unit action failed");
    ActionError::new(err, message)
}

fn invalid(err: AppError) -> ActionError {
    let message = match &err {
        AppError::Validation { message, .. } => format!("Invalid input: {}.", message),
        _ => SAVE_FAILED.to_string(),
    };
    ActionError::new(err, message)
}

async fn lookup(store: &UnitStore, raw_id: &str) -> Result<Unit, ActionError> {
    let id = parse_id(raw_id)?;
    store.get_by_id(id).await.map_err(|err| {
        if err.is_lookup_failure() {
            missing(err)
        } else {
            unexpected(err, "Unit could not be loaded.")
        }
    })
}

/// Install the starter units
pub async fn install(store: &UnitStore) -> ActionResult<usize> {
    match store.seed_defaults().await {
        Ok(0) => Ok((0, Flash::info("All starter units are already installed."))),
        Ok(inserted) => Ok((inserted, Flash::success("Units were installed successfully."))),
        Err(err) => Err(unexpected(err, "Units could not be installed.")),
    }
}

/// Create a unit from user input
pub async fn create(store: &UnitStore, input: &UnitInput) -> ActionResult<Unit> {
    match store.create(&input.name, &input.shortcut, input.code()).await {
        Ok(unit) => {
            let flash = Flash::success(format!("Unit {} was created successfully.", unit.name));
            Ok((unit, flash))
        }
        Err(AppError::DuplicateCode { code }) => {
            let message = format!("A unit with code {} already exists.", code);
            Err(ActionError::new(AppError::DuplicateCode { code }, message))
        }
        Err(err @ AppError::Validation { .. }) => Err(invalid(err)),
        Err(err) => Err(unexpected(err, SAVE_FAILED)),
    }
}

/// Change name and shortcut of an existing unit
pub async fn edit(store: &UnitStore, raw_id: &str, input: &UnitInput) -> ActionResult<Unit> {
    let id = parse_id(raw_id)?;
    match store.update(id, &input.name, &input.shortcut).await {
        Ok(unit) => Ok((unit, Flash::success("Changes were saved successfully."))),
        Err(err) if err.is_lookup_failure() => Err(missing(err)),
        Err(err @ AppError::Validation { .. }) => Err(invalid(err)),
        Err(err) => Err(unexpected(err, SAVE_FAILED)),
    }
}

/// Make a unit the default
pub async fn set_default(store: &UnitStore, raw_id: &str) -> ActionResult<Unit> {
    let unit = lookup(store, raw_id).await?;
    match store.set_default(&unit).await {
        Ok(unit) => {
            let flash = Flash::success(format!("Unit {} is now the default unit.", unit.name));
            Ok((unit, flash))
        }
        Err(err) if err.is_lookup_failure() => Err(missing(err)),
        Err(err) => Err(unexpected(err, "Default unit could not be set.")),
    }
}

/// Delete a unit unless something references it
pub async fn delete(store: &UnitStore, raw_id: &str) -> ActionResult<Unit> {
    let unit = lookup(store, raw_id).await?;
    match store.remove(&unit).await {
        Ok(()) => {
            let flash = Flash::info(format!("Unit {} was deleted.", unit.name));
            Ok((unit, flash))
        }
        Err(err) if err.is_lookup_failure() => Err(missing(err)),
        Err(AppError::UnitInUse { name }) => {
            warn!(unit_id = %unit.id, "Refusing to delete a unit in use");
            let message = format!("Unit {} cannot be deleted because it is in use.", name);
            Err(ActionError::new(AppError::UnitInUse { name }, message))
        }
        Err(err) => Err(unexpected(err, "Unit could not be deleted.")),
    }
}

/// Load a unit for the detail page
pub async fn detail(store: &UnitStore, raw_id: &str) -> Result<Unit, ActionError> {
    lookup(store, raw_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flash::FlashLevel;
    use sea_orm::ConnectionTrait;
    use unitforge_common::config::DatabaseConfig;
    use unitforge_common::db::schema::ensure_schema;
    use unitforge_common::DbPool;

    async fn store() -> UnitStore {
        let pool = DbPool::new(&DatabaseConfig::in_memory()).await.unwrap();
        ensure_schema(pool.write()).await.unwrap();
        UnitStore::new(pool)
    }

    fn input(name: &str, shortcut: &str) -> UnitInput {
        UnitInput {
            name: name.into(),
            shortcut: shortcut.into(),
            code: None,
        }
    }

    #[tokio::test]
    async fn test_install_twice() {
        let store = store().await;

        let (inserted, flash) = install(&store).await.unwrap();
        assert_eq!(inserted, 8);
        assert_eq!(flash.level, FlashLevel::Success);

        let (inserted, flash) = install(&store).await.unwrap();
        assert_eq!(inserted, 0);
        assert_eq!(flash.level, FlashLevel::Info);
    }

    #[tokio::test]
    async fn test_create_and_duplicate() {
        let store = store().await;

        let (unit, flash) = create(&store, &input("Metr", "m")).await.unwrap();
        assert_eq!(unit.code, "M");
        assert_eq!(flash.message, "Unit Metr was created successfully.");

        let err = create(&store, &input("Metry", "m")).await.unwrap_err();
        assert_eq!(err.flash, Flash::error("A unit with code M already exists."));
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_create_rejects_symbol_only_shortcut() {
        let store = store().await;

        let err = create(&store, &input("Procento", "%")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.flash.message.starts_with("Invalid input"));
    }

    #[tokio::test]
    async fn test_unknown_ids() {
        let store = store().await;
        let random = Uuid::new_v4().to_string();

        for raw in ["not-a-uuid", random.as_str()] {
            let err = detail(&store, raw).await.unwrap_err();
            assert_eq!(err.flash.message, UNIT_MISSING);
            assert!(err.is_lookup_failure());

            let err = set_default(&store, raw).await.unwrap_err();
            assert_eq!(err.flash.message, UNIT_MISSING);

            let err = delete(&store, raw).await.unwrap_err();
            assert_eq!(err.status(), StatusCode::NOT_FOUND);

            let err = edit(&store, raw, &input("X", "x")).await.unwrap_err();
            assert_eq!(err.flash.message, UNIT_MISSING);
        }
    }

    #[tokio::test]
    async fn test_edit_and_set_default() {
        let store = store().await;
        let (unit, _) = create(&store, &input("Metr", "m")).await.unwrap();
        let id = unit.id.to_string();

        let (edited, flash) = edit(&store, &id, &input("Metr krychlový", "m3")).await.unwrap();
        assert_eq!(edited.code, "M");
        assert_eq!(flash.level, FlashLevel::Success);

        let (default, flash) = set_default(&store, &id).await.unwrap();
        assert!(default.is_default);
        assert_eq!(flash.message, "Unit Metr krychlový is now the default unit.");
    }

    #[tokio::test]
    async fn test_delete_in_use() {
        let store = store().await;
        let (unit, _) = create(&store, &input("Kusy", "ks")).await.unwrap();

        let conn = store.pool().write();
        conn.execute_unprepared(
            "CREATE TABLE stock_items (id INTEGER PRIMARY KEY, unit_id uuid_text REFERENCES units(id))",
        )
        .await
        .unwrap();
        conn.execute(sea_orm::Statement::from_sql_and_values(
            conn.get_database_backend(),
            "INSERT INTO stock_items (unit_id) VALUES (?)",
            [unit.id.into()],
        ))
        .await
        .unwrap();

        let err = delete(&store, &unit.id.to_string()).await.unwrap_err();
        assert_eq!(
            err.flash.message,
            "Unit Kusy cannot be deleted because it is in use."
        );
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = store().await;
        let (unit, _) = create(&store, &input("Gram", "g")).await.unwrap();

        let (deleted, flash) = delete(&store, &unit.id.to_string()).await.unwrap();
        assert_eq!(deleted.id, unit.id);
        assert_eq!(flash, Flash::info("Unit Gram was deleted."));
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_default_unit() {
        let store = store().await;
        install(&store).await.unwrap();
        let kg = store.get_by_code("KG").await.unwrap();
        set_default(&store, &kg.id.to_string()).await.unwrap();

        let (_, flash) = delete(&store, &kg.id.to_string()).await.unwrap();
        assert_eq!(flash, Flash::info("Unit Kilogram was deleted."));

        let unit = store.get_default().await.unwrap();
        assert_eq!(unit.code, "KS");
        assert_eq!(store.list_all().await.unwrap().len(), 7);

        // a later install keeps the single default
        let (inserted, _) = install(&store).await.unwrap();
        assert_eq!(inserted, 1);
        let defaults = store.list_all().await.unwrap();
        assert_eq!(defaults.iter().filter(|u| u.is_default).count(), 1);
    }
}
