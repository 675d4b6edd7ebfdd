//! Request-scoped unit cache
//!
//! Memoizes the ordered unit list, the resolved default unit and the select
//! box options for the lifetime of one `UnitStore`. The gateway builds a
//! store per request, so cached values never outlive the request that loaded
//! them. Any write through the store clears everything.

use crate::db::models::Unit;
use crate::db::UnitOption;
use crate::metrics;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct CacheState {
    units: Option<Vec<Unit>>,
    default_unit: Option<Unit>,
    options: Option<Vec<UnitOption>>,
}

/// In-process cache owned by a single store value
#[derive(Default)]
pub struct UnitCache {
    state: RwLock<CacheState>,
}

impl UnitCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached list of all units, ordered by name
    pub async fn units(&self) -> Option<Vec<Unit>> {
        let hit = self.state.read().await.units.clone();
        metrics::record_cache(hit.is_some(), "units");
        hit
    }

    pub async fn set_units(&self, units: Vec<Unit>) {
        self.state.write().await.units = Some(units);
    }

    /// Cached result of default resolution
    pub async fn default_unit(&self) -> Option<Unit> {
        let hit = self.state.read().await.default_unit.clone();
        metrics::record_cache(hit.is_some(), "default_unit");
        hit
    }

    pub async fn set_default_unit(&self, unit: Unit) {
        self.state.write().await.default_unit = Some(unit);
    }

    /// Cached select box options
    pub async fn options(&self) -> Option<Vec<UnitOption>> {
        let hit = self.state.read().await.options.clone();
        metrics::record_cache(hit.is_some(), "options");
        hit
    }

    pub async fn set_options(&self, options: Vec<UnitOption>) {
        self.state.write().await.options = Some(options);
    }

    /// Drop every cached value
    pub async fn invalidate(&self) {
        *self.state.write().await = CacheState::default();
        debug!("Unit cache invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn unit(name: &str, code: &str) -> Unit {
        let now = Utc::now().into();
        Unit {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: name.to_string(),
            shortcut: code.to_lowercase(),
            is_default: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_starts_empty() {
        let cache = UnitCache::new();
        assert!(cache.units().await.is_none());
        assert!(cache.default_unit().await.is_none());
        assert!(cache.options().await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_drops_everything() {
        let cache = UnitCache::new();
        let kg = unit("Kilogram", "KG");
        cache.set_units(vec![kg.clone()]).await;
        cache.set_default_unit(kg.clone()).await;
        cache
            .set_options(vec![UnitOption { id: kg.id, label: kg.option_label() }])
            .await;

        assert_eq!(cache.units().await.map(|u| u.len()), Some(1));
        assert_eq!(cache.default_unit().await.map(|u| u.code), Some("KG".to_string()));

        cache.invalidate().await;
        assert!(cache.units().await.is_none());
        assert!(cache.default_unit().await.is_none());
        assert!(cache.options().await.is_none());
    }
}
