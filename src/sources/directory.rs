//! Flat CSV company exports (secondary company-info sources).
//!
//! Two exports share this shape: the primary company directory ("view all")
//! and the working sheet. Rows are keyed by the normalized company name;
//! rows with no name are skipped. Files start with a UTF-8 BOM when exported
//! from spreadsheets, so that is stripped before parsing.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::{CompanyInfo, SourceError};
use crate::normalize::company_key;

/// Parse one company export file into partial records by join key.
pub fn load_company_csv(path: &Path) -> Result<HashMap<String, CompanyInfo>, SourceError> {
    let raw = fs::read_to_string(path)?;
    Ok(parse_company_csv(&raw))
}

pub(crate) fn parse_company_csv(raw: &str) -> HashMap<String, CompanyInfo> {
    let body = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let mut reader = csv::Reader::from_reader(body.as_bytes());
    let mut companies = HashMap::new();

    for row in reader.deserialize::<HashMap<String, String>>() {
        let row = match row {
            Ok(r) => r,
            Err(e) => {
                log::debug!("skipping malformed directory row: {}", e);
                continue;
            }
        };
        let get = |key: &str| row.get(key).map(|v| v.trim().to_string()).unwrap_or_default();

        let name = get("Name");
        if name.is_empty() {
            continue;
        }
        let key = company_key(&name);
        companies.insert(
            key,
            CompanyInfo {
                name,
                address: get("HQ Address"),
                state: get("HQ State"),
                full_state: get("Full HQ State Name"),
                all_states: get("All State(s) Operating In"),
                ownership: get("Ownership"),
                website: get("Website"),
                state_tier: get("State Tier"),
                manual_override: get("Override") == "checked",
            },
        );
    }

    companies
}
