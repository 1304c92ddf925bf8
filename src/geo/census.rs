//! Batch address-matching client (US Census Bureau geocoder).
//!
//! The service only accepts bulk submissions: a multipart form with a CSV of
//! (id, street, city, state, zip) plus a benchmark parameter, answered with a
//! CSV of match results. Miss sets are chunked at 1000 records with a fixed
//! 1-second pause between chunks; each chunk gets exactly one attempt and a
//! failed chunk simply contributes zero matches.

use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use super::GeoError;

const BATCH_ENDPOINT: &str = "https://geocoding.geo.census.gov/geocoder/locations/addressbatch";
const BENCHMARK: &str = "Public_AR_Current";
const CHUNK_SIZE: usize = 1000;
const CHUNK_PAUSE: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct BatchGeocoder {
    client: reqwest::Client,
    endpoint: String,
}

impl Default for BatchGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchGeocoder {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: BATCH_ENDPOINT.to_string(),
        }
    }

    /// Geocode `(key, address)` pairs, returning precise matches by key.
    ///
    /// Chunks are processed strictly sequentially. Network or parse failures
    /// are logged and swallowed; affected keys just stay unmatched.
    pub async fn geocode(&self, addresses: &[(String, String)]) -> HashMap<String, (f64, f64)> {
        let mut results = HashMap::new();
        for (i, chunk) in addresses.chunks(CHUNK_SIZE).enumerate() {
            if i > 0 {
                tokio::time::sleep(CHUNK_PAUSE).await;
            }
            log::info!("geocoding chunk {} ({} addresses)", i + 1, chunk.len());
            match self.geocode_chunk(chunk).await {
                Ok(matches) => {
                    log::info!("chunk {}: {} matches", i + 1, matches.len());
                    results.extend(matches);
                }
                Err(e) => log::warn!("geocoding chunk {} failed: {}", i + 1, e),
            }
        }
        results
    }

    async fn geocode_chunk(
        &self,
        chunk: &[(String, String)],
    ) -> Result<HashMap<String, (f64, f64)>, GeoError> {
        let csv_data = build_request_csv(chunk)?;
        let file = reqwest::multipart::Part::bytes(csv_data)
            .file_name("addresses.csv")
            .mime_str("text/csv")
            .map_err(GeoError::Http)?;
        let form = reqwest::multipart::Form::new()
            .part("addressFile", file)
            .text("benchmark", BENCHMARK);

        let resp = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GeoError::Status(status.as_u16()));
        }
        let body = resp.text().await?;
        Ok(parse_response(&body))
    }
}

fn state_zip_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z\s]+?)\s*(\d{5})").expect("valid regex"))
}

/// Split a free-text address into (street, city, state, zip) on commas.
///
/// Three or more parts give street / city / "state zip"; two parts give
/// street / city; anything else goes through as the raw street field and the
/// service does what it can.
fn split_address(addr: &str) -> (String, String, String, String) {
    let parts: Vec<&str> = addr.split(',').map(str::trim).collect();
    match parts.as_slice() {
        [street, city, state_zip, ..] => {
            let (state, zip) = match state_zip_re().captures(state_zip) {
                Some(c) => (c[1].trim().to_string(), c[2].to_string()),
                None => (state_zip.to_string(), String::new()),
            };
            (street.to_string(), city.to_string(), state, zip)
        }
        [street, city] => (street.to_string(), city.to_string(), String::new(), String::new()),
        _ => (addr.trim().to_string(), String::new(), String::new(), String::new()),
    }
}

/// Serialize a chunk as the upload CSV: id, street, city, state, zip.
fn build_request_csv(chunk: &[(String, String)]) -> Result<Vec<u8>, GeoError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for (key, addr) in chunk {
        let (street, city, state, zip) = split_address(addr);
        writer.write_record([key.as_str(), &street, &city, &state, &zip])?;
    }
    writer
        .into_inner()
        .map_err(|e| GeoError::Io(std::io::Error::other(e.to_string())))
}

/// Parse the result CSV. Rows whose match column reads "Match" carry a
/// "longitude,latitude" pair. Note the reversed order on the wire, flipped
/// to (lat, lng) here.
fn parse_response(body: &str) -> HashMap<String, (f64, f64)> {
    let mut results = HashMap::new();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());
    for record in reader.records() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                log::debug!("skipping unparseable geocoder row: {}", e);
                continue;
            }
        };
        if record.len() < 6 {
            continue;
        }
        if !record[2].trim().eq_ignore_ascii_case("match") {
            continue;
        }
        let key = record[0].trim();
        let coords = record[5].trim();
        let Some((lng_s, lat_s)) = coords.split_once(',') else {
            continue;
        };
        if let (Ok(lat), Ok(lng)) = (lat_s.trim().parse::<f64>(), lng_s.trim().parse::<f64>()) {
            results.insert(key.to_string(), (lat, lng));
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_address_street_city_state_zip() {
        let (street, city, state, zip) =
            split_address("6000 Peachtree Pkwy, Norcross, Georgia 30092, United States");
        assert_eq!(street, "6000 Peachtree Pkwy");
        assert_eq!(city, "Norcross");
        assert_eq!(state, "Georgia");
        assert_eq!(zip, "30092");
    }

    #[test]
    fn test_split_address_state_without_zip() {
        let (_, _, state, zip) = split_address("1 Main St, Tampa, FL");
        assert_eq!(state, "FL");
        assert_eq!(zip, "");
    }

    #[test]
    fn test_split_address_two_parts() {
        let (street, city, state, zip) = split_address("1 Main St, Tampa");
        assert_eq!(street, "1 Main St");
        assert_eq!(city, "Tampa");
        assert_eq!(state, "");
        assert_eq!(zip, "");
    }

    #[test]
    fn test_split_address_raw_string() {
        let (street, city, _, _) = split_address("PO Box 42");
        assert_eq!(street, "PO Box 42");
        assert_eq!(city, "");
    }

    #[test]
    fn test_build_request_csv_one_row_per_address() {
        let chunk = vec![
            ("acme".to_string(), "1 Main St, Tampa, FL 33602".to_string()),
            ("beta".to_string(), "PO Box 42".to_string()),
        ];
        let bytes = build_request_csv(&chunk).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("acme,1 Main St,Tampa,FL,33602"));
    }

    #[test]
    fn test_parse_response_flips_longitude_latitude() {
        let body = concat!(
            "\"acme\",\"1 Main St, Tampa, FL\",\"Match\",\"Exact\",\"1 MAIN ST, TAMPA, FL, 33602\",\"-82.458,27.947\",\"76746\",\"L\"\n",
            "\"beta\",\"nowhere\",\"No_Match\"\n",
        );
        let results = parse_response(body);
        assert_eq!(results.len(), 1);
        let (lat, lng) = results["acme"];
        assert!((lat - 27.947).abs() < 1e-9);
        assert!((lng - -82.458).abs() < 1e-9);
    }

    #[test]
    fn test_parse_response_skips_bad_coordinates() {
        let body = "\"acme\",\"addr\",\"Match\",\"Exact\",\"matched\",\"not-coords\",\"1\",\"L\"\n";
        assert!(parse_response(body).is_empty());
    }

    #[test]
    fn test_parse_response_empty_body() {
        assert!(parse_response("").is_empty());
    }
}
