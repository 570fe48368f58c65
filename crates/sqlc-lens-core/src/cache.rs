//! Parsed-source cache for generated companion modules.

use crate::syntax::ParsedSource;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Parsed generated modules, keyed by the document that requested them.
///
/// Entries are never invalidated on edit; the owner evicts them with
/// [`SourceCache::remove`] when the keying document closes.
#[derive(Debug, Default)]
pub struct SourceCache {
    entries: Mutex<HashMap<PathBuf, Arc<ParsedSource>>>,
}

impl SourceCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the entry for `key`, computing it with `load` on a miss.
    ///
    /// Failed loads are not cached.
    pub fn get_or_try_insert<E>(
        &self,
        key: &Path,
        load: impl FnOnce() -> Result<ParsedSource, E>,
    ) -> Result<Arc<ParsedSource>, E> {
        if let Some(parsed) = self.entries.lock().get(key) {
            return Ok(Arc::clone(parsed));
        }

        let parsed = Arc::new(load()?);
        self.entries
            .lock()
            .insert(key.to_path_buf(), Arc::clone(&parsed));
        Ok(parsed)
    }

    /// Evict the entry for `key`.
    pub fn remove(&self, key: &Path) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loads_once_until_removed() {
        let cache = SourceCache::new();
        let key = Path::new("/work/src/repositories/user.ts");
        let mut loads = 0;

        for _ in 0..3 {
            cache
                .get_or_try_insert::<()>(key, || {
                    loads += 1;
                    Ok(ParsedSource::default())
                })
                .unwrap();
        }
        assert_eq!(loads, 1);
        assert_eq!(cache.len(), 1);

        assert!(cache.remove(key));
        assert!(!cache.remove(key));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_errors_are_not_cached() {
        let cache = SourceCache::new();
        let key = Path::new("/work/a.ts");
        let result = cache.get_or_try_insert(key, || Err("unreadable"));
        assert_eq!(result.unwrap_err(), "unreadable");
        assert!(cache.is_empty());
    }
}
