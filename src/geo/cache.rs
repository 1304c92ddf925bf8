//! Persistent geocode cache.
//!
//! A JSON object on disk mapping join key → `[lat, lng]` or `null`. The cache
//! is append-only and authoritative: once a key has an entry (including the
//! explicit no-match `null`), it is never re-queried. Read once at startup,
//! rewritten once (atomically) at the end of a run.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use super::GeoError;

#[derive(Debug, Default)]
pub struct GeocodeCache {
    entries: HashMap<String, Option<(f64, f64)>>,
}

impl GeocodeCache {
    /// Load the cache file. A missing file is an empty cache; an unreadable
    /// one is logged and treated as empty (the run degrades to re-querying).
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        let parsed = fs::read_to_string(path)
            .map_err(GeoError::from)
            .and_then(|content| {
                serde_json::from_str::<HashMap<String, Option<(f64, f64)>>>(&content)
                    .map_err(GeoError::from)
            });
        match parsed {
            Ok(entries) => Self { entries },
            Err(e) => {
                log::warn!("geocode cache {} unreadable ({}), starting empty", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Outer `None` = never resolved; `Some(None)` = explicit no-match marker.
    pub fn get(&self, key: &str) -> Option<Option<(f64, f64)>> {
        self.entries.get(key).copied()
    }

    pub fn insert(&mut self, key: String, value: Option<(f64, f64)>) {
        self.entries.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Atomic whole-file rewrite: write to a tempfile in the target directory,
    /// then persist over the destination.
    pub fn save(&self, path: &Path) -> Result<(), GeoError> {
        // Stable key order keeps the file diffable across runs.
        let ordered: std::collections::BTreeMap<&String, &Option<(f64, f64)>> =
            self.entries.iter().collect();
        let json = serde_json::to_string_pretty(&ordered)?;

        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(dir) = dir {
            fs::create_dir_all(dir)?;
        }
        let mut tmp = match dir {
            Some(dir) => tempfile::NamedTempFile::new_in(dir)?,
            None => tempfile::NamedTempFile::new_in(".")?,
        };
        tmp.write_all(json.as_bytes())?;
        tmp.persist(path).map_err(|e| GeoError::Io(e.error))?;
        Ok(())
    }
}
