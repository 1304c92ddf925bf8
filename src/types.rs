//! Output document types.
//!
//! These structs are the contract with the dashboard: field names and shapes
//! are binding, serialized in camelCase. Maps use `BTreeMap` so repeated runs
//! over unchanged inputs serialize byte-identically.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One merged company entity, rebuilt from scratch every run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyRecord {
    pub name: String,
    pub address: String,
    /// Canonical 2-letter state code, or empty when unresolvable.
    pub state: String,
    pub full_state: String,
    pub ownership: String,
    /// Manual override checkbox from any company-level source.
    #[serde(rename = "override")]
    pub manual_override: bool,
    pub website: String,
    /// Comma-joined list of states the company operates in. Source order is
    /// preserved and duplicates are tolerated.
    pub all_states: String,
    pub state_tier: String,

    // Outreach aggregates
    pub msgs_sent: u32,
    pub by_medium: BTreeMap<String, u32>,
    pub by_account: BTreeMap<String, u32>,
    pub responded: bool,
    pub responded_count: u32,
    pub scheduled_intro: bool,
    pub assisted_meeting: bool,
    pub not_interested: bool,
    pub follow_up_later: bool,
    pub contact_count: u32,
    pub contacts: Vec<String>,
    pub first_msg: String,
    pub last_msg: String,
    pub meeting_date: String,
    pub opened: bool,
    pub viewed_profile: bool,

    // Pipeline linkage
    pub in_pipeline: bool,
    pub pipeline_status: String,
    pub pipeline_priority: String,
    pub pipeline_type: String,
    pub pipeline_ebitda: String,
    pub pipeline_asking_price: String,
    pub pipeline_nda: String,
    pub pipeline_data_room: String,
    pub pipeline_site_visit: String,
    pub pipeline_key_contact: String,
    pub pipeline_next_action: String,
    pub pipeline_action_owner: String,
    pub pipeline_deadline: String,
    pub pipeline_last_update: String,
    pub pipeline_days_since: String,
    pub pipeline_notes: String,

    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/// A deal row from the pipeline export, emitted as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub name: String,
    #[serde(default)]
    pub states: String,
    #[serde(rename = "type", default)]
    pub deal_type: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub ebitda: String,
    #[serde(default)]
    pub asking_price: String,
    #[serde(default)]
    pub nda_status: String,
    #[serde(default)]
    pub data_room: String,
    #[serde(default)]
    pub site_visit: String,
    #[serde(default)]
    pub key_contact: String,
    #[serde(default)]
    pub next_action: String,
    #[serde(default)]
    pub action_owner: String,
    #[serde(default)]
    pub deadline: String,
    #[serde(default)]
    pub last_update: String,
    #[serde(default)]
    pub days_since_update: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub deal_number: String,
}

/// A row from the action-tracker export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionItem {
    pub priority: String,
    pub action: String,
    #[serde(default)]
    pub facility: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub deadline: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub pipeline_status: String,
}

/// Cross-cutting message statistics.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub total_messages: u32,
    pub medium_counts: BTreeMap<String, u32>,
    pub account_counts: BTreeMap<String, u32>,
    /// Keyed by `YYYY-MM`; serialized in sorted key order.
    pub monthly_counts: BTreeMap<String, u32>,
}

/// The single denormalized document consumed by the dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputDoc {
    pub companies: Vec<CompanyRecord>,
    pub pipeline: Vec<Deal>,
    pub actions: Vec<ActionItem>,
    pub meta: Meta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_company_record_serializes_camel_case() {
        let record = CompanyRecord {
            name: "Acme Health".to_string(),
            manual_override: true,
            msgs_sent: 3,
            lat: Some(27.7),
            ..Default::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["name"], "Acme Health");
        assert_eq!(json["override"], true);
        assert_eq!(json["msgsSent"], 3);
        assert_eq!(json["inPipeline"], false);
        assert_eq!(json["lat"], 27.7);
        assert!(json["lng"].is_null());
        assert!(json.get("manualOverride").is_none());
    }

    #[test]
    fn test_deal_type_field_renamed() {
        let deal = Deal {
            name: "Sanctuary".to_string(),
            deal_type: "Detox".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&deal).unwrap();
        assert_eq!(json["type"], "Detox");
        assert_eq!(json["askingPrice"], "");
    }

    #[test]
    fn test_meta_monthly_counts_sorted() {
        let mut meta = Meta::default();
        meta.monthly_counts.insert("2024-03".to_string(), 1);
        meta.monthly_counts.insert("2024-01".to_string(), 2);
        meta.monthly_counts.insert("2023-12".to_string(), 5);
        let json = serde_json::to_string(&meta).unwrap();
        let dec = json.find("2023-12").unwrap();
        let jan = json.find("2024-01").unwrap();
        let mar = json.find("2024-03").unwrap();
        assert!(dec < jan && jan < mar);
    }
}
