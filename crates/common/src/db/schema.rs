//! Schema bootstrap
//!
//! Creates the `units` table from the entity definition when it is missing.
//! The unique constraint on `code` is part of the generated DDL.

use crate::db::models::{UnitColumn, UnitEntity};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Schema};
use tracing::info;

/// Create the tables and indexes used by the unit store
pub async fn ensure_schema<C: ConnectionTrait>(conn: &C) -> Result<()> {
    let backend = conn.get_database_backend();
    let schema = Schema::new(backend);

    let mut table = schema.create_table_from_entity(UnitEntity);
    table.if_not_exists();
    conn.execute(backend.build(&table)).await?;

    let index = Index::create()
        .if_not_exists()
        .name("idx_units_name")
        .table(UnitEntity)
        .col(UnitColumn::Name)
        .to_owned();
    conn.execute(backend.build(&index)).await?;

    info!("Unit schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::DbPool;

    #[tokio::test]
    async fn test_ensure_schema_is_repeatable() {
        let pool = DbPool::new(&DatabaseConfig::in_memory()).await.unwrap();
        ensure_schema(pool.write()).await.unwrap();
        ensure_schema(pool.write()).await.unwrap();
    }
}
