//! Deal-pipeline and action-tracker source (spreadsheet CSV export).
//!
//! Both tabs arrive as CSV text, over HTTP from the sheet's export URL or
//! from a local file for offline runs. The exports carry leading title and
//! blank rows, so the real header row is located by scanning for a known
//! column-name anchor before row parsing begins. Any failure here degrades
//! to an empty list.

use std::collections::HashMap;
use std::fs;
use std::time::Duration;

use super::SourceError;
use crate::config::Config;
use crate::types::{ActionItem, Deal};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetch and parse both tabs. Every failure path logs and returns empty.
pub async fn fetch_pipeline(client: &reqwest::Client, config: &Config) -> (Vec<Deal>, Vec<ActionItem>) {
    let deals = match load_tab(
        client,
        config.pipeline_csv.as_deref(),
        config.pipeline_export_url.as_deref(),
        "pipeline",
    )
    .await
    {
        Some(text) => match parse_deals(&text) {
            Ok(deals) => {
                log::info!("pipeline export: {} deals", deals.len());
                deals
            }
            Err(e) => {
                log::warn!("pipeline export unparseable: {}", e);
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    let actions = match load_tab(
        client,
        config.actions_csv.as_deref(),
        config.actions_export_url.as_deref(),
        "action tracker",
    )
    .await
    {
        Some(text) => match parse_actions(&text) {
            Ok(actions) => {
                log::info!("action tracker export: {} items", actions.len());
                actions
            }
            Err(e) => {
                log::warn!("action tracker export unparseable: {}", e);
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    (deals, actions)
}

/// Resolve one tab's CSV text: local file first, then the export URL.
async fn load_tab(
    client: &reqwest::Client,
    file: Option<&std::path::Path>,
    url: Option<&str>,
    label: &str,
) -> Option<String> {
    if let Some(path) = file {
        return match fs::read_to_string(path) {
            Ok(text) => Some(text),
            Err(e) => {
                log::warn!("{} file {} unavailable: {}", label, path.display(), e);
                None
            }
        };
    }
    let url = match url {
        Some(u) => u,
        None => {
            log::info!("{} source not configured, skipping", label);
            return None;
        }
    };
    match fetch_csv(client, url).await {
        Ok(text) => Some(text),
        Err(e) => {
            log::warn!("{} export unavailable: {}", label, e);
            None
        }
    }
}

async fn fetch_csv(client: &reqwest::Client, url: &str) -> Result<String, SourceError> {
    let resp = client.get(url).timeout(REQUEST_TIMEOUT).send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(SourceError::Api {
            status: status.as_u16(),
            message: body,
        });
    }
    Ok(resp.text().await?)
}

/// Drop everything above the header row identified by `anchors` (all must
/// appear in the line). The export prepends title and blank rows that would
/// otherwise be taken for headers.
fn body_from_anchor(text: &str, anchors: &[&str]) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines
        .iter()
        .position(|line| anchors.iter().all(|a| line.contains(a)))?;
    Some(lines[start..].join("\n"))
}

pub(crate) fn parse_deals(text: &str) -> Result<Vec<Deal>, SourceError> {
    let body =
        body_from_anchor(text, &["Facility Name"]).ok_or(SourceError::HeaderNotFound("Facility Name"))?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(body.as_bytes());
    let mut deals = Vec::new();

    for row in reader.deserialize::<HashMap<String, String>>() {
        let row = match row {
            Ok(r) => r,
            Err(e) => {
                log::debug!("skipping malformed deal row: {}", e);
                continue;
            }
        };
        let get = |key: &str| row.get(key).map(|v| v.trim().to_string()).unwrap_or_default();

        let name = get("Facility Name");
        if name.is_empty() {
            continue;
        }
        deals.push(Deal {
            name,
            states: get("State(s)"),
            deal_type: get("Type"),
            status: get("Status"),
            priority: get("Priority"),
            ebitda: get("EBITDA / Financials"),
            asking_price: get("Asking Price"),
            nda_status: get("NDA Status"),
            data_room: get("Data Room"),
            site_visit: get("Site Visit"),
            key_contact: get("Key Contact"),
            next_action: get("Next Action"),
            action_owner: get("Action Owner"),
            deadline: get("Deadline"),
            last_update: get("Last Update"),
            days_since_update: get("Days Since Update"),
            notes: get("Notes"),
            deal_number: get("#"),
        });
    }

    Ok(deals)
}

pub(crate) fn parse_actions(text: &str) -> Result<Vec<ActionItem>, SourceError> {
    let body = body_from_anchor(text, &["Action Item", "Priority"])
        .ok_or(SourceError::HeaderNotFound("Action Item"))?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(body.as_bytes());
    let mut actions = Vec::new();

    for row in reader.deserialize::<HashMap<String, String>>() {
        let row = match row {
            Ok(r) => r,
            Err(e) => {
                log::debug!("skipping malformed action row: {}", e);
                continue;
            }
        };
        let get = |key: &str| row.get(key).map(|v| v.trim().to_string()).unwrap_or_default();

        let action = get("Action Item");
        if action.is_empty() {
            continue;
        }
        actions.push(ActionItem {
            priority: get("Priority"),
            action,
            facility: get("Facility"),
            owner: get("Owner"),
            deadline: get("Deadline"),
            status: get("Status"),
            notes: get("Notes"),
            pipeline_status: get("Pipeline Status"),
        });
    }

    Ok(actions)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEALS_EXPORT: &str = "Pipeline Dashboard,,,,,,\n\
,,,,,,\n\
#,Facility Name,State(s),Type,Status,Priority,EBITDA / Financials\n\
1,Sanctuary,LA,Detox,NDA Signed,High,$1.2M\n\
2,The Grove Recovery,TN,Residential,Intro Call,Medium,\n\
3,,,,,\n";

    const ACTIONS_EXPORT: &str = "Action Tracker,,,,\n\
,,,,\n\
Priority,Action Item,Facility,Owner,Deadline,Status,Notes,Pipeline Status\n\
P1,Send NDA,Sanctuary,Dylan,02/01/2024,Open,,NDA Out\n\
,No priority still counts,Acme,,,,,\n\
P2,,,,,,\n";

    #[test]
    fn test_parse_deals_skips_title_rows() {
        let deals = parse_deals(DEALS_EXPORT).unwrap();
        assert_eq!(deals.len(), 2);
        assert_eq!(deals[0].name, "Sanctuary");
        assert_eq!(deals[0].states, "LA");
        assert_eq!(deals[0].deal_type, "Detox");
        assert_eq!(deals[0].status, "NDA Signed");
        assert_eq!(deals[0].ebitda, "$1.2M");
        assert_eq!(deals[0].deal_number, "1");
        assert_eq!(deals[1].name, "The Grove Recovery");
    }

    #[test]
    fn test_parse_deals_missing_anchor() {
        let err = parse_deals("just,some,random\ncsv,rows,here\n");
        assert!(matches!(err, Err(SourceError::HeaderNotFound(_))));
    }

    #[test]
    fn test_parse_actions_requires_both_anchors() {
        let actions = parse_actions(ACTIONS_EXPORT).unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].action, "Send NDA");
        assert_eq!(actions[0].priority, "P1");
        assert_eq!(actions[0].pipeline_status, "NDA Out");
        // Empty "Action Item" rows are dropped, empty priority is kept.
        assert_eq!(actions[1].action, "No priority still counts");
        assert_eq!(actions[1].priority, "");
    }

    #[test]
    fn test_parse_actions_missing_anchor() {
        // "Priority" alone must not satisfy the scan.
        let err = parse_actions("Priority,Something Else\nP1,x\n");
        assert!(matches!(err, Err(SourceError::HeaderNotFound(_))));
    }
}
