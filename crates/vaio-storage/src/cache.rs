//! Typed helpers over a [`KeyValueStore`] for the well-known board keys.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use vaio_proto::{Layouts, ModuleRecord, ModulesByType, SessionMirror};

use crate::error::StorageError;
use crate::kv::{KeyValueStore, StoreExt};

/// Grid layout key.
pub const LAYOUTS_KEY: &str = "vaio_layouts";
/// Active module list key.
pub const ACTIVE_MODULES_KEY: &str = "vaio_active_modules";
/// Ephemeral session mirror key.
pub const SESSION_KEY: &str = "vaio_session";
/// Module registry cache key.
pub const MODULE_CACHE_KEY: &str = "vaio_module_cache";

/// Module cache entries older than this are ignored.
pub const MODULE_CACHE_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// A value stamped with the time it was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamped<T> {
    /// Write time.
    pub timestamp: DateTime<Utc>,
    /// Wrapped value.
    pub data: T,
}

impl<T> Timestamped<T> {
    /// Stamp `data` with the current time.
    pub fn now(data: T) -> Self {
        Self {
            timestamp: Utc::now(),
            data,
        }
    }

    /// Whether the value is younger than `max_age` at `now`.
    ///
    /// Timestamps in the future count as fresh.
    #[must_use]
    pub fn is_fresh_at(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        match (now - self.timestamp).to_std() {
            Ok(age) => age < max_age,
            Err(_) => true,
        }
    }

    /// Whether the value is younger than `max_age`.
    #[must_use]
    pub fn is_fresh(&self, max_age: Duration) -> bool {
        self.is_fresh_at(Utc::now(), max_age)
    }
}

/// Board state kept in one storage tier.
#[derive(Clone)]
pub struct LocalCache {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for LocalCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCache").finish_non_exhaustive()
    }
}

impl LocalCache {
    /// Wrap a store.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Persist the grid layout.
    pub fn save_layouts(&self, layouts: &Layouts) -> Result<(), StorageError> {
        self.store.save(LAYOUTS_KEY, layouts)?;
        debug!(items = layouts.item_count(), "saved layouts");
        Ok(())
    }

    /// Load the grid layout, if one was saved and parses.
    #[must_use]
    pub fn load_layouts(&self) -> Option<Layouts> {
        self.store.load(LAYOUTS_KEY)
    }

    /// Forget the grid layout.
    pub fn clear_layouts(&self) -> Result<(), StorageError> {
        self.store.remove(LAYOUTS_KEY)
    }

    /// Persist the active module list.
    pub fn save_active_modules(&self, modules: &[String]) -> Result<(), StorageError> {
        self.store.save(ACTIVE_MODULES_KEY, modules)?;
        debug!(count = modules.len(), "saved active modules");
        Ok(())
    }

    /// Load the active module list.
    #[must_use]
    pub fn load_active_modules(&self) -> Option<Vec<String>> {
        self.store.load(ACTIVE_MODULES_KEY)
    }

    /// Forget the active module list.
    pub fn clear_active_modules(&self) -> Result<(), StorageError> {
        self.store.remove(ACTIVE_MODULES_KEY)
    }

    /// Persist the session mirror.
    pub fn save_session(&self, mirror: &SessionMirror) -> Result<(), StorageError> {
        self.store.save(SESSION_KEY, mirror)
    }

    /// Load the session mirror.
    #[must_use]
    pub fn load_session(&self) -> Option<SessionMirror> {
        self.store.load(SESSION_KEY)
    }

    /// Forget the session mirror.
    pub fn clear_session(&self) -> Result<(), StorageError> {
        self.store.remove(SESSION_KEY)
    }

    /// Persist module records with the current timestamp.
    pub fn save_module_cache(
        &self,
        modules: &ModulesByType<ModuleRecord>,
    ) -> Result<(), StorageError> {
        self.store.save(MODULE_CACHE_KEY, &Timestamped::now(modules))?;
        debug!(total = modules.total(), "saved module cache");
        Ok(())
    }

    /// Load cached module records regardless of age.
    #[must_use]
    pub fn load_module_cache(&self) -> Option<Timestamped<ModulesByType<ModuleRecord>>> {
        self.store.load(MODULE_CACHE_KEY)
    }

    /// Forget cached module records.
    pub fn clear_module_cache(&self) -> Result<(), StorageError> {
        self.store.remove(MODULE_CACHE_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{JsonFileStore, MemoryStore};
    use chrono::TimeDelta;
    use proptest::prelude::*;
    use tempfile::TempDir;
    use vaio_proto::{Breakpoint, LayoutItem, ModuleType, Position, Size};

    fn layouts() -> Layouts {
        let mut layouts = Layouts::empty();
        layouts.lg.push(LayoutItem::new(
            "SYSTEM-SupervisorPane-ab12c",
            Position { x: 0, y: 0 },
            Size { w: 12, h: 8 },
        ));
        layouts.xxs.push(LayoutItem::new(
            "SYSTEM-SupervisorPane-ab12c",
            Position { x: 0, y: 0 },
            Size { w: 2, h: 8 },
        ));
        layouts
    }

    #[test]
    fn layouts_round_trip_through_files() {
        let dir = TempDir::new().expect("tempdir");
        let cache = LocalCache::new(Arc::new(JsonFileStore::open(dir.path()).expect("open")));

        cache.save_layouts(&layouts()).expect("save");
        assert_eq!(cache.load_layouts(), Some(layouts()));

        cache.clear_layouts().expect("clear");
        assert!(cache.load_layouts().is_none());
    }

    fn arb_item() -> impl Strategy<Value = LayoutItem> {
        (
            "[A-Za-z][A-Za-z0-9-]{0,24}",
            (0u32..48, 0u32..64, 1u32..48, 1u32..24),
            (1u32..6, 1u32..6),
            prop::option::of(prop::sample::select(vec![
                ModuleType::System,
                ModuleType::Service,
                ModuleType::User,
            ])),
            prop::option::of("[a-z0-9]{5}"),
            prop::option::of(any::<bool>()),
        )
            .prop_map(|(i, (x, y, w, h), (min_w, min_h), module_type, instance_id, is_static)| {
                let mut item = LayoutItem::new(i, Position { x, y }, Size { w, h });
                item.min_w = min_w;
                item.min_h = min_h;
                item.module_type = module_type;
                item.instance_id = instance_id;
                item.is_static = is_static;
                item
            })
    }

    fn arb_layouts() -> impl Strategy<Value = Layouts> {
        prop::collection::vec(prop::collection::vec(arb_item(), 0..6), 5).prop_map(|mut bps| {
            let mut layouts = Layouts::empty();
            for bp in Breakpoint::ALL.into_iter().rev() {
                *layouts.get_mut(bp) = bps.pop().unwrap_or_default();
            }
            layouts
        })
    }

    proptest! {
        #[test]
        fn layouts_round_trip_for_any_valid_layout(layouts in arb_layouts()) {
            let cache = LocalCache::new(Arc::new(MemoryStore::new()));
            cache.save_layouts(&layouts).expect("save");
            prop_assert_eq!(cache.load_layouts(), Some(layouts));
        }
    }

    #[test]
    fn active_modules_round_trip() {
        let cache = LocalCache::new(Arc::new(MemoryStore::new()));
        let modules = vec!["SYSTEM-SupervisorPane-ab12c".to_string()];
        cache.save_active_modules(&modules).expect("save");
        assert_eq!(cache.load_active_modules(), Some(modules));
    }

    #[test]
    fn module_cache_is_timestamped() {
        let cache = LocalCache::new(Arc::new(MemoryStore::new()));
        let modules = ModulesByType::from_records(vec![ModuleRecord::new(
            ModuleType::System,
            "SupervisorPane",
            "Supervisor",
        )]);
        cache.save_module_cache(&modules).expect("save");

        let cached = cache.load_module_cache().expect("cached");
        assert_eq!(cached.data, modules);
        assert!(cached.is_fresh(MODULE_CACHE_MAX_AGE));
    }

    #[test]
    fn staleness_boundary() {
        let now = Utc::now();
        let stamped = Timestamped {
            timestamp: now - TimeDelta::hours(25),
            data: (),
        };
        assert!(!stamped.is_fresh_at(now, MODULE_CACHE_MAX_AGE));

        let recent = Timestamped {
            timestamp: now - TimeDelta::hours(23),
            data: (),
        };
        assert!(recent.is_fresh_at(now, MODULE_CACHE_MAX_AGE));

        let future = Timestamped {
            timestamp: now + TimeDelta::minutes(5),
            data: (),
        };
        assert!(future.is_fresh_at(now, MODULE_CACHE_MAX_AGE));
    }

    #[test]
    fn session_mirror_round_trip() {
        let cache = LocalCache::new(Arc::new(MemoryStore::new()));
        let mut mirror = SessionMirror::default();
        mirror.active_modules.push("USER-Notes-x1y2z".into());
        mirror
            .pane_states
            .insert("USER-Notes-x1y2z".into(), serde_json::json!({"draft": true}));

        cache.save_session(&mirror).expect("save");
        assert_eq!(cache.load_session(), Some(mirror));
    }
}
