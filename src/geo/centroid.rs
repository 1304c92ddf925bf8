//! Centroid tables and the deterministic fallback geocoder.
//!
//! When the batch geocoder has no match for an address, coordinates degrade
//! to a regional approximation: a Florida zip3 centroid when available, else
//! the state centroid, displaced by a jitter derived from the company name so
//! that same-state companies spread out on the map. The jitter is fully
//! reproducible from the name alone.

use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};

/// State centroids, 50 states + DC.
pub const STATE_CENTROIDS: &[(&str, f64, f64)] = &[
    ("AL", 32.806671, -86.791130),
    ("AK", 61.370716, -152.404419),
    ("AZ", 33.729759, -111.431221),
    ("AR", 34.969704, -92.373123),
    ("CA", 36.116203, -119.681564),
    ("CO", 39.059811, -105.311104),
    ("CT", 41.597782, -72.755371),
    ("DE", 39.318523, -75.507141),
    ("FL", 27.766279, -81.686783),
    ("GA", 33.040619, -83.643074),
    ("HI", 21.094318, -157.498337),
    ("ID", 44.240459, -114.478828),
    ("IL", 40.349457, -88.986137),
    ("IN", 39.849426, -86.258278),
    ("IA", 42.011539, -93.210526),
    ("KS", 38.526600, -96.726486),
    ("KY", 37.668140, -84.670067),
    ("LA", 31.169546, -91.867805),
    ("ME", 44.693947, -69.381927),
    ("MD", 39.063946, -76.802101),
    ("MA", 42.230171, -71.530106),
    ("MI", 43.326618, -84.536095),
    ("MN", 45.694454, -93.900192),
    ("MS", 32.741646, -89.678696),
    ("MO", 38.456085, -92.288368),
    ("MT", 46.921925, -110.454353),
    ("NE", 41.125370, -98.268082),
    ("NV", 38.313515, -117.055374),
    ("NH", 43.452492, -71.563896),
    ("NJ", 40.298904, -74.521011),
    ("NM", 34.840515, -106.248482),
    ("NY", 42.165726, -74.948051),
    ("NC", 35.630066, -79.806419),
    ("ND", 47.528912, -99.784012),
    ("OH", 40.388783, -82.764915),
    ("OK", 35.565342, -96.928917),
    ("OR", 44.572021, -122.070938),
    ("PA", 40.590752, -77.209755),
    ("RI", 41.680893, -71.511780),
    ("SC", 33.856892, -80.945007),
    ("SD", 44.299782, -99.438828),
    ("TN", 35.747845, -86.692345),
    ("TX", 31.054487, -97.563461),
    ("UT", 40.150032, -111.862434),
    ("VT", 44.045876, -72.710686),
    ("VA", 37.769337, -78.169968),
    ("WA", 47.400902, -121.490494),
    ("WV", 38.491226, -80.954456),
    ("WI", 44.268543, -89.616508),
    ("WY", 42.755966, -107.302490),
    ("DC", 38.897438, -77.026817),
];

/// Florida zip3 prefixes to regional centroids. Florida gets finer-grained
/// treatment because the dataset is heaviest there.
pub const FL_ZIP3_CENTROIDS: &[(&str, f64, f64)] = &[
    ("320", 30.4, -84.3),
    ("321", 29.2, -81.0),
    ("322", 30.3, -81.7),
    ("323", 30.3, -81.7),
    ("324", 30.4, -86.6),
    ("325", 30.4, -87.2),
    ("326", 29.2, -82.1),
    ("327", 28.5, -81.4),
    ("328", 28.5, -81.4),
    ("329", 28.1, -80.6),
    ("330", 25.8, -80.2),
    ("331", 25.8, -80.2),
    ("332", 25.8, -80.2),
    ("333", 26.1, -80.1),
    ("334", 26.7, -80.1),
    ("335", 27.8, -82.6),
    ("336", 27.8, -82.6),
    ("337", 27.3, -82.5),
    ("338", 28.0, -82.0),
    ("339", 26.6, -81.9),
    ("340", 26.6, -81.9),
    ("341", 26.1, -80.4),
    ("342", 28.0, -82.5),
    ("344", 29.0, -82.5),
    ("346", 27.5, -82.5),
    ("347", 28.2, -82.2),
    ("349", 26.4, -80.1),
];

/// State centroid for a canonical code.
pub fn state_centroid(code: &str) -> Option<(f64, f64)> {
    STATE_CENTROIDS
        .iter()
        .find(|(c, _, _)| *c == code)
        .map(|(_, lat, lng)| (*lat, *lng))
}

fn fl_zip3_centroid(prefix: &str) -> Option<(f64, f64)> {
    FL_ZIP3_CENTROIDS
        .iter()
        .find(|(p, _, _)| *p == prefix)
        .map(|(_, lat, lng)| (*lat, *lng))
}

fn zip_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{5})\b").expect("valid regex"))
}

/// Deterministic displacement for a company name: first 8 hex characters of
/// the SHA-256 digest as a 32-bit integer, mapped into ±0.4 degrees on each
/// axis.
fn jitter(name: &str) -> (f64, f64) {
    let digest = hex::encode(Sha256::digest(name.as_bytes()));
    let h = u32::from_str_radix(&digest[..8], 16).unwrap_or(0);
    let dlat = ((h % 1000) as f64 / 1000.0 - 0.5) * 0.8;
    let dlng = (((h >> 10) % 1000) as f64 / 1000.0 - 0.5) * 0.8;
    (dlat, dlng)
}

/// Approximate coordinates for an address that the batch geocoder could not
/// resolve.
///
/// A 5-digit substring in the address selects a zip3 prefix; Florida prefixes
/// map to regional centroids, anything else falls back to the state centroid.
/// With no zip at all the state centroid is used directly. Centroids are
/// always jittered; `(None, None)` means nothing resolved.
pub fn fallback_coords(address: &str, state: &str, name: &str) -> (Option<f64>, Option<f64>) {
    let zip = zip_re()
        .captures(address)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str());

    let centroid = match zip {
        Some(z) => {
            let prefix = &z[..3];
            if state == "FL" {
                fl_zip3_centroid(prefix).or_else(|| state_centroid(state))
            } else {
                state_centroid(state)
            }
        }
        None => state_centroid(state),
    };

    match centroid {
        Some((lat, lng)) => {
            let (dlat, dlng) = jitter(name);
            (Some(lat + dlat), Some(lng + dlng))
        }
        None => (None, None),
    }
}
