//! Geocode resolution.
//!
//! Resolution order per company: persistent cache (authoritative, including
//! explicit no-match markers) → one chunked batch call covering every
//! cache-miss address in the run → deterministic centroid fallback with
//! name-derived jitter. Every key submitted to the batch service has its
//! final outcome written back to the cache before the run ends.

pub mod cache;
pub mod census;
pub mod centroid;

use std::collections::HashSet;
use std::path::PathBuf;

use cache::GeocodeCache;
use census::BatchGeocoder;
use centroid::fallback_coords;

#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("geocoder returned status {0}")]
    Status(u16),
    #[error("CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything needed to resolve one company's coordinates.
#[derive(Debug, Clone)]
pub struct GeocodeRequest {
    pub key: String,
    pub address: String,
    pub state: String,
    pub name: String,
}

pub struct GeoResolver {
    cache: GeocodeCache,
    cache_path: PathBuf,
    geocoder: BatchGeocoder,
}

impl GeoResolver {
    /// Read the cache once at startup.
    pub fn load(cache_path: impl Into<PathBuf>) -> Self {
        let cache_path = cache_path.into();
        let cache = GeocodeCache::load(&cache_path);
        log::info!("geocode cache: {} entries", cache.len());
        Self {
            cache,
            cache_path,
            geocoder: BatchGeocoder::new(),
        }
    }

    /// Cache-miss keys that have an address to submit. Keys without an
    /// address never reach the batch service; their fallback is computed
    /// fresh each run (it is deterministic anyway).
    pub(crate) fn collect_misses(&self, wants: &[GeocodeRequest]) -> Vec<(String, String)> {
        let mut seen = HashSet::new();
        wants
            .iter()
            .filter(|w| !w.address.is_empty() && !self.cache.contains(&w.key))
            .filter(|w| seen.insert(w.key.clone()))
            .map(|w| (w.key.clone(), w.address.clone()))
            .collect()
    }

    /// Submit all cache misses in one chunked batch, then write back a final
    /// outcome for every submitted key: the precise match, the jittered
    /// centroid fallback, or the explicit no-match marker.
    pub async fn resolve_misses(&mut self, wants: &[GeocodeRequest]) {
        let misses = self.collect_misses(wants);
        if misses.is_empty() {
            log::info!("all addresses already cached");
            return;
        }
        log::info!("geocoding {} new addresses", misses.len());
        let matched = self.geocoder.geocode(&misses).await;
        log::info!("geocoded {} addresses precisely", matched.len());

        let submitted: HashSet<&str> = misses.iter().map(|(k, _)| k.as_str()).collect();
        for w in wants {
            if !submitted.contains(w.key.as_str()) {
                continue;
            }
            let outcome = match matched.get(&w.key) {
                Some(&coords) => Some(coords),
                None => {
                    let (lat, lng) = fallback_coords(&w.address, &w.state, &w.name);
                    lat.zip(lng)
                }
            };
            self.cache.insert(w.key.clone(), outcome);
        }
    }

    /// Coordinates for one company: cached outcome verbatim (a stored null
    /// stays unresolved, no retry), else the deterministic fallback.
    pub fn coords_for(&self, req: &GeocodeRequest) -> (Option<f64>, Option<f64>) {
        match self.cache.get(&req.key) {
            Some(Some((lat, lng))) => (Some(lat), Some(lng)),
            Some(None) => (None, None),
            None => fallback_coords(&req.address, &req.state, &req.name),
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Single atomic rewrite at the end of the run.
    pub fn save(&self) -> Result<(), GeoError> {
        self.cache.save(&self.cache_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(key: &str, address: &str, state: &str) -> GeocodeRequest {
        GeocodeRequest {
            key: key.to_string(),
            address: address.to_string(),
            state: state.to_string(),
            name: key.to_string(),
        }
    }

    fn resolver_with_cache(entries: &[(&str, Option<(f64, f64)>)]) -> GeoResolver {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut resolver = GeoResolver::load(&path);
        for (k, v) in entries {
            resolver.cache.insert(k.to_string(), *v);
        }
        resolver
    }

    #[test]
    fn test_collect_misses_skips_cached_and_addressless() {
        let resolver = resolver_with_cache(&[
            ("cached co", Some((1.0, 2.0))),
            ("null co", None),
        ]);
        let wants = vec![
            request("cached co", "1 Main St, Tampa, FL 33602", "FL"),
            // A stored null is authoritative and never re-submitted.
            request("null co", "99 Nowhere Rd, Ocala, FL 34470", "FL"),
            request("no address co", "", "GA"),
            request("fresh co", "2 Oak Ave, Atlanta, GA 30303", "GA"),
        ];
        let misses = resolver.collect_misses(&wants);
        assert_eq!(misses.len(), 1);
        assert_eq!(misses[0].0, "fresh co");
    }

    #[test]
    fn test_coords_for_cache_hit_verbatim() {
        let resolver = resolver_with_cache(&[("acme", Some((27.947, -82.458)))]);
        let got = resolver.coords_for(&request("acme", "irrelevant", "FL"));
        assert_eq!(got, (Some(27.947), Some(-82.458)));
    }

    #[test]
    fn test_coords_for_stored_null_is_not_retried() {
        let resolver = resolver_with_cache(&[("acme", None)]);
        let got = resolver.coords_for(&request("acme", "1 Main St, Tampa, FL 33602", "FL"));
        assert_eq!(got, (None, None));
    }

    #[test]
    fn test_coords_for_uncached_uses_deterministic_fallback() {
        let resolver = resolver_with_cache(&[]);
        let req = request("sanctuary louisiana", "", "LA");
        let first = resolver.coords_for(&req);
        let second = resolver.coords_for(&req);
        assert_eq!(first, second);
        assert!(first.0.is_some());
    }

    #[tokio::test]
    async fn test_warm_cache_triggers_no_submission() {
        // Cache idempotence: with every key already cached, resolve_misses
        // finds nothing to submit and returns before touching the network.
        let mut resolver = resolver_with_cache(&[
            ("acme", Some((27.9, -82.4))),
            ("beta", None),
        ]);
        let wants = vec![
            request("acme", "1 Main St, Tampa, FL 33602", "FL"),
            request("beta", "99 Nowhere Rd, Ocala, FL 34470", "FL"),
        ];
        let before = resolver.cache_len();
        resolver.resolve_misses(&wants).await;
        assert_eq!(resolver.cache_len(), before);
        assert_eq!(
            resolver.coords_for(&wants[0]),
            (Some(27.9), Some(-82.4))
        );
    }
}
