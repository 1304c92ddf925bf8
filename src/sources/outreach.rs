//! CRM API source: companies, contacts, and cold-outreach messages.
//!
//! Fetches each table with the opaque-offset pagination the API uses,
//! unwraps the three field shapes a value can arrive in (plain scalar,
//! AI-generated tagged object, list), links messages to companies through
//! the contacts table, and aggregates per company key. A table that fails to
//! fetch contributes zero records; the run degrades rather than aborts.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use super::{CompanyInfo, Message, OutreachAggregate, SourceError};
use crate::config::{Config, CrmTables};
use crate::normalize::company_key;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const COMPANY_FIELDS: &[&str] = &[
    "Name",
    "HQ Address",
    "Full HQ State Name",
    "HQ State",
    "Ownership",
    "All State(s) Operating In",
    "Override",
    "Website",
    "State Tier",
];

const CONTACT_FIELDS: &[&str] = &["Name", "Companies"];

const OUTREACH_FIELDS: &[&str] = &[
    "Contacts",
    "Date Sent",
    "Message Medium",
    "Account",
    "Responded",
    "Scheduled Intro Call",
    "Assisted Meeting",
    "Not Interested",
    "Meeting Date",
    "Opened",
    "Viewed Profile",
    "Follow Up Priority (from Follow Ups)",
];

// ============================================================================
// Wire types
// ============================================================================

/// A field value in any of the shapes the API sends: an AI-generated tagged
/// object, a list, or a plain scalar. Unknown shapes are retained raw so a
/// surprising record never sinks the whole page.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Tagged(TaggedValue),
    List(Vec<String>),
    Text(String),
    Number(f64),
    Bool(bool),
    Other(serde_json::Value),
}

/// AI-generated field payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaggedValue {
    #[serde(default, alias = "state")]
    pub status: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default, alias = "fresh")]
    pub is_stale: bool,
}

fn truthy_str(s: &str) -> bool {
    !matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "none" | "no" | "n/a"
    )
}

impl FieldValue {
    /// Total unwrap to a scalar string; `default` covers absent/empty values.
    pub fn as_str(&self, default: &str) -> String {
        let out = match self {
            FieldValue::Tagged(t) => t.value.clone().unwrap_or_default(),
            FieldValue::List(items) => items.join(", "),
            FieldValue::Text(s) => s.clone(),
            FieldValue::Number(n) => {
                if n.fract() == 0.0 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            FieldValue::Bool(b) => {
                if *b {
                    "true".to_string()
                } else {
                    String::new()
                }
            }
            FieldValue::Other(v) => v.as_str().map(str::to_string).unwrap_or_default(),
        };
        let trimmed = out.trim();
        if trimmed.is_empty() {
            default.to_string()
        } else {
            trimmed.to_string()
        }
    }

    /// Unwrap to a list; scalars become a one-element list, anything else is
    /// empty.
    pub fn as_list(&self) -> Vec<String> {
        match self {
            FieldValue::List(items) => items.clone(),
            FieldValue::Text(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
            _ => Vec::new(),
        }
    }

    /// Best-effort truthiness for checkbox/flag fields regardless of shape.
    pub fn is_truthy(&self) -> bool {
        match self {
            FieldValue::Bool(b) => *b,
            FieldValue::Number(n) => *n != 0.0,
            FieldValue::Text(s) => truthy_str(s),
            FieldValue::Tagged(t) => t.value.as_deref().map(truthy_str).unwrap_or(false),
            FieldValue::List(items) => !items.is_empty(),
            FieldValue::Other(v) => !v.is_null(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrmRecord {
    pub id: String,
    #[serde(default)]
    pub fields: HashMap<String, FieldValue>,
}

impl CrmRecord {
    pub fn field_str(&self, name: &str) -> String {
        self.fields
            .get(name)
            .map(|v| v.as_str(""))
            .unwrap_or_default()
    }

    pub fn field_list(&self, name: &str) -> Vec<String> {
        self.fields
            .get(name)
            .map(|v| v.as_list())
            .unwrap_or_default()
    }

    pub fn field_truthy(&self, name: &str) -> bool {
        self.fields.get(name).map(|v| v.is_truthy()).unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
struct RecordPage {
    #[serde(default)]
    records: Vec<CrmRecord>,
    #[serde(default)]
    offset: Option<String>,
}

// ============================================================================
// Client
// ============================================================================

pub struct CrmClient {
    client: reqwest::Client,
    base_url: String,
    base_id: String,
    token: String,
}

impl CrmClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.crm_base_url.clone(),
            base_id: config.crm_base.clone(),
            token: config.crm_token.clone(),
        }
    }

    /// Fetch every record of a table, following the opaque `offset` token
    /// until the API stops returning one.
    pub async fn fetch_table(
        &self,
        table: &str,
        fields: &[&str],
    ) -> Result<Vec<CrmRecord>, SourceError> {
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut url = Url::parse(&self.base_url)
                .map_err(|e| SourceError::Url(format!("{}: {}", self.base_url, e)))?;
            url.path_segments_mut()
                .map_err(|_| SourceError::Url(self.base_url.clone()))?
                .push(&self.base_id)
                .push(table);
            {
                let mut pairs = url.query_pairs_mut();
                for field in fields {
                    pairs.append_pair("fields[]", field);
                }
                if let Some(ref token) = offset {
                    pairs.append_pair("offset", token);
                }
            }

            let resp = self
                .client
                .get(url)
                .bearer_auth(&self.token)
                .timeout(REQUEST_TIMEOUT)
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(SourceError::Api {
                    status: status.as_u16(),
                    message: body,
                });
            }

            let page: RecordPage = resp.json().await?;
            records.extend(page.records);
            offset = page.offset;
            if offset.is_none() {
                break;
            }
        }

        Ok(records)
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Everything the CRM source contributes to the pipeline.
#[derive(Debug, Default)]
pub struct OutreachData {
    /// Company directory partial records, keyed by join key.
    pub directory: HashMap<String, CompanyInfo>,
    /// Per-company behavioral aggregates, keyed by join key.
    pub aggregates: HashMap<String, OutreachAggregate>,
    /// Flat message list for the cross-cutting statistics.
    pub messages: Vec<Message>,
}

/// The per-message facts folded into a company aggregate.
#[derive(Debug, Clone, Default)]
pub struct MessageFacts {
    pub date: String,
    pub medium: String,
    pub account: String,
    pub contacts: Vec<String>,
    pub responded: bool,
    pub scheduled_intro: bool,
    pub assisted_meeting: bool,
    pub not_interested: bool,
    pub follow_up_later: bool,
    pub opened: bool,
    pub viewed_profile: bool,
    pub meeting_date: String,
}

/// Fetch and aggregate the CRM source. Table failures degrade to empty.
pub async fn fetch_outreach(client: &CrmClient, tables: &CrmTables) -> OutreachData {
    let companies = fetch_or_empty(client, &tables.companies, COMPANY_FIELDS).await;
    let contacts = fetch_or_empty(client, &tables.contacts, CONTACT_FIELDS).await;
    let outreach = fetch_or_empty(client, &tables.outreach, OUTREACH_FIELDS).await;
    log::info!(
        "CRM: {} companies, {} contacts, {} outreach messages",
        companies.len(),
        contacts.len(),
        outreach.len()
    );
    build(&companies, &contacts, &outreach)
}

async fn fetch_or_empty(client: &CrmClient, table: &str, fields: &[&str]) -> Vec<CrmRecord> {
    match client.fetch_table(table, fields).await {
        Ok(records) => records,
        Err(e) => {
            log::warn!("table {} unavailable: {}", table, e);
            Vec::new()
        }
    }
}

/// Link and aggregate the three tables into per-key maps.
fn build(companies: &[CrmRecord], contacts: &[CrmRecord], outreach: &[CrmRecord]) -> OutreachData {
    // Company record id → join key, plus the directory itself.
    let mut directory: HashMap<String, CompanyInfo> = HashMap::new();
    let mut key_by_record_id: HashMap<&str, String> = HashMap::new();
    for r in companies {
        let name = r.field_str("Name");
        if name.is_empty() {
            continue;
        }
        let key = company_key(&name);
        // Multi-valued "all states" may arrive as a list or a comma-joined
        // string; either way it is canonicalized to one comma-joined string.
        let all_states = r
            .fields
            .get("All State(s) Operating In")
            .map(|v| v.as_list().join(", "))
            .unwrap_or_default();
        key_by_record_id.insert(r.id.as_str(), key.clone());
        directory.insert(
            key,
            CompanyInfo {
                name,
                address: r.field_str("HQ Address"),
                state: r.field_str("HQ State"),
                full_state: r.field_str("Full HQ State Name"),
                all_states,
                ownership: r.field_str("Ownership"),
                website: r.field_str("Website"),
                state_tier: r.field_str("State Tier"),
                manual_override: r.field_truthy("Override"),
            },
        );
    }

    // Contact record id → linked company record ids.
    let mut contact_companies: HashMap<&str, Vec<String>> = HashMap::new();
    for r in contacts {
        let links = r.field_list("Companies");
        if !links.is_empty() {
            contact_companies.insert(r.id.as_str(), links);
        }
    }

    let mut aggregates: HashMap<String, OutreachAggregate> = HashMap::new();
    let mut messages = Vec::with_capacity(outreach.len());

    for r in outreach {
        let facts = MessageFacts {
            date: format_crm_date(&r.field_str("Date Sent")),
            medium: r.field_str("Message Medium"),
            account: r.field_str("Account"),
            contacts: r.field_list("Contacts"),
            responded: r.field_truthy("Responded"),
            scheduled_intro: r.field_truthy("Scheduled Intro Call"),
            assisted_meeting: r.field_truthy("Assisted Meeting"),
            not_interested: r.field_truthy("Not Interested"),
            follow_up_later: r.field_truthy("Follow Up Priority (from Follow Ups)"),
            opened: r.field_truthy("Opened"),
            viewed_profile: r.field_truthy("Viewed Profile"),
            meeting_date: format_crm_date(&r.field_str("Meeting Date")),
        };

        // A message reaches every company its contacts link to. Unknown
        // company ids are skipped.
        let mut keys: BTreeSet<&str> = BTreeSet::new();
        for contact_id in &facts.contacts {
            if let Some(company_ids) = contact_companies.get(contact_id.as_str()) {
                for company_id in company_ids {
                    if let Some(key) = key_by_record_id.get(company_id.as_str()) {
                        keys.insert(key.as_str());
                    }
                }
            }
        }
        for key in keys {
            let agg = aggregates.entry(key.to_string()).or_default();
            if agg.name.is_empty() {
                if let Some(info) = directory.get(key) {
                    agg.name = info.name.clone();
                }
            }
            agg.absorb(&facts);
        }

        messages.push(Message {
            date: facts.date.clone(),
            medium: facts.medium.clone(),
            account: facts.account.clone(),
        });
    }

    OutreachData {
        directory,
        aggregates,
        messages,
    }
}

/// Canonicalize an API timestamp to `MM/DD/YYYY`.
///
/// ISO 8601 datetimes and bare dates both occur; anything else degrades to
/// its first ten characters.
pub(crate) fn format_crm_date(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(&raw.replace('Z', "+00:00")) {
        return dt.format("%m/%d/%Y").to_string();
    }
    if let Ok(d) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return d.format("%m/%d/%Y").to_string();
    }
    raw.get(..10)
        .map(str::to_string)
        .unwrap_or_else(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, fields: serde_json::Value) -> CrmRecord {
        serde_json::from_value(serde_json::json!({ "id": id, "fields": fields })).unwrap()
    }

    #[test]
    fn test_field_value_shapes_deserialize() {
        let r = record(
            "rec1",
            serde_json::json!({
                "Name": "Acme Health",
                "Override": true,
                "All State(s) Operating In": ["FL", "GA"],
                "HQ Address": { "state": "generated", "value": "1 Main St, Tampa, FL 33602", "isStale": false },
                "Count": 3,
            }),
        );
        assert_eq!(r.field_str("Name"), "Acme Health");
        assert!(r.field_truthy("Override"));
        assert_eq!(r.field_list("All State(s) Operating In"), vec!["FL", "GA"]);
        assert_eq!(r.field_str("HQ Address"), "1 Main St, Tampa, FL 33602");
        assert_eq!(r.field_str("Count"), "3");
    }

    #[test]
    fn test_tagged_value_without_value_uses_default() {
        let r = record(
            "rec1",
            serde_json::json!({ "HQ Address": { "state": "pending" } }),
        );
        assert_eq!(r.field_str("HQ Address"), "");
        assert_eq!(
            r.fields.get("HQ Address").unwrap().as_str("fallback"),
            "fallback"
        );
        assert!(!r.field_truthy("HQ Address"));
    }

    #[test]
    fn test_unknown_shape_survives_deserialization() {
        let r = record(
            "rec1",
            serde_json::json!({ "Attachments": [{ "url": "https://x/y.png" }] }),
        );
        assert_eq!(r.field_str("Attachments"), "");
        assert!(r.field_truthy("Attachments"));
    }

    #[test]
    fn test_truthiness_of_scalar_flags() {
        for falsy in ["", "0", "false", "None", "no", "N/A"] {
            assert!(!FieldValue::Text(falsy.to_string()).is_truthy(), "{:?}", falsy);
        }
        assert!(FieldValue::Text("checked".to_string()).is_truthy());
        assert!(FieldValue::List(vec!["Not Interested".to_string()]).is_truthy());
        assert!(!FieldValue::List(Vec::new()).is_truthy());
    }

    #[test]
    fn test_record_page_pagination_token() {
        let json = r#"{
            "records": [
                { "id": "rec1", "fields": { "Name": "Acme" } },
                { "id": "rec2" }
            ],
            "offset": "itrX/rec2"
        }"#;
        let page: RecordPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.offset.as_deref(), Some("itrX/rec2"));

        let last: RecordPage = serde_json::from_str(r#"{ "records": [] }"#).unwrap();
        assert!(last.offset.is_none());
    }

    #[test]
    fn test_format_crm_date() {
        assert_eq!(format_crm_date("2024-01-15T10:30:00.000Z"), "01/15/2024");
        assert_eq!(format_crm_date("2024-01-15"), "01/15/2024");
        assert_eq!(format_crm_date(""), "");
        assert_eq!(format_crm_date("2024-01-15junk"), "2024-01-15");
        assert_eq!(format_crm_date("garbage"), "garbage");
    }

    #[test]
    fn test_build_links_messages_through_contacts() {
        let companies = vec![
            record("cmpA", serde_json::json!({ "Name": "Acme Health" })),
            record("cmpB", serde_json::json!({ "Name": "Beta Recovery" })),
        ];
        let contacts = vec![
            record("conA", serde_json::json!({ "Companies": ["cmpA"] })),
            record("conB", serde_json::json!({ "Companies": ["cmpA", "cmpB"] })),
        ];
        let outreach = vec![
            record(
                "msg1",
                serde_json::json!({
                    "Contacts": ["conA"],
                    "Date Sent": "2024-01-15T09:00:00.000Z",
                    "Message Medium": "Email",
                    "Account": "jane",
                    "Responded": true,
                }),
            ),
            record(
                "msg2",
                serde_json::json!({
                    "Contacts": ["conB"],
                    "Date Sent": "2024-02-01T09:00:00.000Z",
                    "Message Medium": "LinkedIn",
                    "Account": "jane",
                }),
            ),
            // No linked contact: counted as a message, aggregated nowhere.
            record("msg3", serde_json::json!({ "Message Medium": "Email" })),
        ];

        let data = build(&companies, &contacts, &outreach);
        assert_eq!(data.messages.len(), 3);
        assert_eq!(data.directory.len(), 2);

        let acme = &data.aggregates["acme health"];
        assert_eq!(acme.msgs_sent, 2);
        assert!(acme.responded);
        assert_eq!(acme.responded_count, 1);
        assert_eq!(acme.first_msg, "01/15/2024");
        assert_eq!(acme.last_msg, "02/01/2024");
        assert_eq!(acme.by_medium["Email"], 1);
        assert_eq!(acme.by_medium["LinkedIn"], 1);
        assert_eq!(acme.contacts.len(), 2);

        let beta = &data.aggregates["beta recovery"];
        assert_eq!(beta.msgs_sent, 1);
        assert!(!beta.responded);
    }

    #[test]
    fn test_build_skips_unknown_company_links() {
        let companies = vec![record("cmpA", serde_json::json!({ "Name": "Acme" }))];
        let contacts = vec![record("conA", serde_json::json!({ "Companies": ["cmpGone"] }))];
        let outreach = vec![record(
            "msg1",
            serde_json::json!({ "Contacts": ["conA"], "Message Medium": "Email" }),
        )];
        let data = build(&companies, &contacts, &outreach);
        assert!(data.aggregates.is_empty());
        assert_eq!(data.messages.len(), 1);
    }

    #[test]
    fn test_build_coerces_all_states_list() {
        let companies = vec![record(
            "cmpA",
            serde_json::json!({ "Name": "Acme", "All State(s) Operating In": ["FL", "GA", "FL"] }),
        )];
        let data = build(&companies, &[], &[]);
        // Order preserved, duplicates tolerated.
        assert_eq!(data.directory["acme"].all_states, "FL, GA, FL");
    }
}
