//! Reconciliation merger.
//!
//! Combines the per-source partial records into one `CompanyRecord` per
//! distinct join key. The outreach source is primary: every key it knows
//! yields a record. Supplemental fields are filled by probing the
//! company-info sources in a fixed precedence order: the first source with
//! a non-empty value wins, and empty values never override a filled field.
//! Keys present only in company-info sources still produce records with
//! zeroed behavioral aggregates. Deals join by direct key match, then by the
//! alias table; unmatched deals stay in the output as orphaned pipeline
//! entries.

use std::collections::{BTreeSet, HashMap};

use crate::normalize::{company_key, resolve_state};
use crate::sources::{CompanyInfo, OutreachAggregate};
use crate::types::{CompanyRecord, Deal};

/// Normalized pipeline deal name → the company key it should join against.
/// Used when key normalization alone cannot unify two spellings of the same
/// entity. A target that matches no company leaves the deal unmatched.
pub const PIPELINE_ALIASES: &[(&str, &str)] = &[
    ("asheville detox (healthcare alliance)", "asheville detox center"),
    ("cardinal", "cardinal recovery"),
    ("centric", "reign residential treatment center"),
    ("dreamlife / crestview", "dreamlife recovery pa"),
    ("ghr", "ghr center for addiction recovery and treatment"),
    ("new vista / ethan crossing", "ethan crossing addiction treatment"),
    ("new waters", "new waters recovery"),
    ("nola detox & recovery center", "nola detox"),
    ("peachtree detox (evoraa)", "peachtree detox"),
    ("recovery now / longbranch", "longbranch healthcare"),
    ("revive recover", "gateway to sobriety (revive recover)"),
    ("sanctuary", "sanctuary louisiana"),
    ("second chances", "second chances addiction recovery center"),
    ("serenity treatment centers", "serenity treatment center"),
    ("southeast detox / addiction ctr", "southeast detox"),
    ("southern sky", "southern sky recovery"),
    ("sycamour", "sycamore behavioral health"),
    ("the grove recovery", "the grove recovery centers"),
    ("the sylvia brafman mh center", "the sylvia brafman mental health center"),
    ("the wave", "the wave international"),
    ("turning leaf behavioral health", "turning leaf behavioral health services"),
    ("woodlake center", "woodlake addiction recovery"),
];

/// Merge all sources into the final company list.
///
/// `company_sources` is ordered by precedence (highest first). Output order
/// is deterministic: outreach-active companies first, then company-only
/// entries, each sorted by key.
pub fn merge(
    aggregates: &HashMap<String, OutreachAggregate>,
    company_sources: &[HashMap<String, CompanyInfo>],
    deals: &[Deal],
) -> Vec<CompanyRecord> {
    let deal_lookup = build_deal_lookup(deals);

    let mut records = Vec::new();
    let mut seen: BTreeSet<&str> = BTreeSet::new();

    let mut primary_keys: Vec<&String> = aggregates.keys().collect();
    primary_keys.sort();
    for key in primary_keys {
        seen.insert(key.as_str());
        let agg = &aggregates[key];
        let infos: Vec<&CompanyInfo> =
            company_sources.iter().filter_map(|m| m.get(key)).collect();
        let name = if agg.name.is_empty() {
            infos
                .first()
                .map(|i| i.name.clone())
                .unwrap_or_else(|| key.clone())
        } else {
            agg.name.clone()
        };
        records.push(build_record(key, name, Some(agg), &infos, &deal_lookup));
    }

    // Companies with no outreach activity still appear, aggregates zeroed.
    let mut secondary_keys: BTreeSet<&str> = BTreeSet::new();
    for source in company_sources {
        for key in source.keys() {
            if !seen.contains(key.as_str()) {
                secondary_keys.insert(key.as_str());
            }
        }
    }
    for key in secondary_keys {
        let infos: Vec<&CompanyInfo> =
            company_sources.iter().filter_map(|m| m.get(key)).collect();
        let name = infos
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| key.to_string());
        records.push(build_record(key, name, None, &infos, &deal_lookup));
    }

    records
}

/// Index deals by normalized name, then register alias targets so a company
/// can find its deal under its own key. Aliases never shadow a direct match.
fn build_deal_lookup<'a>(deals: &'a [Deal]) -> HashMap<String, &'a Deal> {
    let mut lookup: HashMap<String, &Deal> = HashMap::new();
    for deal in deals {
        let key = company_key(&deal.name);
        if key.is_empty() {
            continue;
        }
        lookup.insert(key, deal);
    }
    for (from, to) in PIPELINE_ALIASES {
        if lookup.contains_key(*to) {
            continue;
        }
        if let Some(&deal) = lookup.get(*from) {
            lookup.insert((*to).to_string(), deal);
        }
    }
    lookup
}

fn first_non_empty(infos: &[&CompanyInfo], field: impl Fn(&CompanyInfo) -> &str) -> String {
    infos
        .iter()
        .map(|i| field(i).trim())
        .find(|v| !v.is_empty())
        .unwrap_or("")
        .to_string()
}

/// Resolve the record's state: explicit state fields first, then the first
/// resolvable entry of the multi-state list, else empty. Spreadsheet
/// artifacts like `#ERROR!` fall through naturally because they resolve to
/// nothing.
fn resolve_record_state(explicit: &str, full_state: &str, all_states: &str) -> String {
    for candidate in [explicit, full_state] {
        let code = resolve_state(candidate);
        if !code.is_empty() {
            return code;
        }
    }
    all_states
        .split(',')
        .map(|part| resolve_state(part.trim()))
        .find(|code| !code.is_empty())
        .unwrap_or_default()
}

fn build_record(
    key: &str,
    name: String,
    agg: Option<&OutreachAggregate>,
    infos: &[&CompanyInfo],
    deal_lookup: &HashMap<String, &Deal>,
) -> CompanyRecord {
    let address = first_non_empty(infos, |i| &i.address);
    let explicit_state = first_non_empty(infos, |i| &i.state);
    let full_state = first_non_empty(infos, |i| &i.full_state);
    let all_states = first_non_empty(infos, |i| &i.all_states);
    let state = resolve_record_state(&explicit_state, &full_state, &all_states);
    let deal = deal_lookup.get(key).copied();

    let mut record = CompanyRecord {
        name,
        address,
        state,
        full_state,
        ownership: first_non_empty(infos, |i| &i.ownership),
        manual_override: infos.iter().any(|i| i.manual_override),
        website: first_non_empty(infos, |i| &i.website),
        all_states,
        state_tier: first_non_empty(infos, |i| &i.state_tier),
        in_pipeline: deal.is_some(),
        ..Default::default()
    };

    if let Some(agg) = agg {
        record.msgs_sent = agg.msgs_sent;
        record.by_medium = agg.by_medium.clone();
        record.by_account = agg.by_account.clone();
        record.responded = agg.responded;
        record.responded_count = agg.responded_count;
        record.scheduled_intro = agg.scheduled_intro;
        record.assisted_meeting = agg.assisted_meeting;
        record.not_interested = agg.not_interested;
        record.follow_up_later = agg.follow_up_later;
        record.contact_count = agg.contacts.len() as u32;
        record.contacts = agg.contacts.iter().cloned().collect();
        record.first_msg = agg.first_msg.clone();
        record.last_msg = agg.last_msg.clone();
        record.meeting_date = agg.meeting_date.clone();
        record.opened = agg.opened;
        record.viewed_profile = agg.viewed_profile;
    }

    if let Some(deal) = deal {
        record.pipeline_status = deal.status.clone();
        record.pipeline_priority = deal.priority.clone();
        record.pipeline_type = deal.deal_type.clone();
        record.pipeline_ebitda = deal.ebitda.clone();
        record.pipeline_asking_price = deal.asking_price.clone();
        record.pipeline_nda = deal.nda_status.clone();
        record.pipeline_data_room = deal.data_room.clone();
        record.pipeline_site_visit = deal.site_visit.clone();
        record.pipeline_key_contact = deal.key_contact.clone();
        record.pipeline_next_action = deal.next_action.clone();
        record.pipeline_action_owner = deal.action_owner.clone();
        record.pipeline_deadline = deal.deadline.clone();
        record.pipeline_last_update = deal.last_update.clone();
        record.pipeline_days_since = deal.days_since_update.clone();
        record.pipeline_notes = deal.notes.clone();
    }

    record
}
