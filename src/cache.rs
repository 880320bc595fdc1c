//! Per-check counts cache
//!
//! Counts are populated on read and invalidated explicitly by the
//! synchronizer when it deletes stale units. There is no time-based expiry.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::units::checks::CHECKS;
use crate::units::TranslationId;

pub trait CountsCache: Send + Sync {
    fn get(&self, key: &str) -> Option<usize>;

    fn set(&self, key: &str, value: usize);

    fn delete_many(&self, keys: &[String]);
}

/// `counts-{project}__{component}-{lang}-check:{id}`
pub fn check_count_key(translation: &TranslationId, check: &str) -> String {
    format!(
        "counts-{}-{}-check:{}",
        translation.component_slug(),
        translation.language,
        check
    )
}

/// Keys of every known check for one translation
pub fn check_count_keys(translation: &TranslationId) -> Vec<String> {
    CHECKS
        .iter()
        .map(|check| check_count_key(translation, check.id))
        .collect()
}

#[derive(Debug, Default)]
pub struct MemoryCountsCache {
    values: Mutex<HashMap<String, usize>>,
}

impl MemoryCountsCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> MutexGuard<'_, HashMap<String, usize>> {
        self.values.lock().unwrap_or_else(|poisoned| {
            warn!("counts cache mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl CountsCache for MemoryCountsCache {
    fn get(&self, key: &str) -> Option<usize> {
        self.values().get(key).copied()
    }

    fn set(&self, key: &str, value: usize) {
        self.values().insert(key.to_string(), value);
    }

    fn delete_many(&self, keys: &[String]) {
        let mut values = self.values();
        for key in keys {
            values.remove(key);
        }
        debug!("Invalidated {} cached counts", keys.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let id = TranslationId::new("demo", "app", "de");
        assert_eq!(
            check_count_key(&id, "same"),
            "counts-demo__app-de-check:same"
        );
        assert_eq!(check_count_keys(&id).len(), CHECKS.len());
    }

    #[test]
    fn test_delete_many() {
        let cache = MemoryCountsCache::new();
        cache.set("a", 1);
        cache.set("b", 2);
        cache.delete_many(&["a".to_string()]);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
    }
}
