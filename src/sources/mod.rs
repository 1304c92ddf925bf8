//! Source extractors.
//!
//! One extractor per data source, each producing partial records keyed by
//! the normalized company join key:
//! - `outreach`: the CRM API (companies, contacts, outreach messages)
//! - `directory`: flat CSV company exports
//! - `pipeline`: the spreadsheet CSV export of deals and action items
//!
//! Source failures degrade to empty input and a warning; they never abort
//! the run.

pub mod directory;
pub mod outreach;
pub mod pipeline;

use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("header row not found (expected {0})")]
    HeaderNotFound(&'static str),
}

/// Company-level partial record, produced by every company-info source.
/// Empty fields mean "this source doesn't know" and never override a filled
/// value during the merge.
#[derive(Debug, Clone, Default)]
pub struct CompanyInfo {
    pub name: String,
    pub address: String,
    pub state: String,
    pub full_state: String,
    pub all_states: String,
    pub ownership: String,
    pub website: String,
    pub state_tier: String,
    pub manual_override: bool,
}

/// One outreach message, kept flat for the cross-cutting aggregates.
#[derive(Debug, Clone)]
pub struct Message {
    pub date: String,
    pub medium: String,
    pub account: String,
}

/// Per-company accumulator over all outreach messages.
///
/// Counters only go up; boolean flags are sticky (false→true, never reset);
/// first/last message dates are a running min/max by lexicographic
/// comparison of the canonical `MM/DD/YYYY` string.
#[derive(Debug, Clone, Default)]
pub struct OutreachAggregate {
    pub name: String,
    pub msgs_sent: u32,
    pub by_medium: BTreeMap<String, u32>,
    pub by_account: BTreeMap<String, u32>,
    pub responded: bool,
    pub responded_count: u32,
    pub scheduled_intro: bool,
    pub assisted_meeting: bool,
    pub not_interested: bool,
    pub follow_up_later: bool,
    pub contacts: BTreeSet<String>,
    pub first_msg: String,
    pub last_msg: String,
    pub meeting_date: String,
    pub opened: bool,
    pub viewed_profile: bool,
}

impl OutreachAggregate {
    /// Fold one message's facts into the accumulator.
    pub fn absorb(&mut self, facts: &outreach::MessageFacts) {
        self.msgs_sent += 1;
        if !facts.medium.is_empty() {
            *self.by_medium.entry(facts.medium.clone()).or_insert(0) += 1;
        }
        if !facts.account.is_empty() {
            *self.by_account.entry(facts.account.clone()).or_insert(0) += 1;
        }
        for contact in &facts.contacts {
            self.contacts.insert(contact.clone());
        }
        if facts.responded {
            self.responded = true;
            self.responded_count += 1;
        }
        self.scheduled_intro |= facts.scheduled_intro;
        self.assisted_meeting |= facts.assisted_meeting;
        self.not_interested |= facts.not_interested;
        self.follow_up_later |= facts.follow_up_later;
        self.opened |= facts.opened;
        self.viewed_profile |= facts.viewed_profile;
        if !facts.date.is_empty() {
            if self.first_msg.is_empty() || facts.date.as_str() < self.first_msg.as_str() {
                self.first_msg = facts.date.clone();
            }
            if self.last_msg.is_empty() || facts.date.as_str() > self.last_msg.as_str() {
                self.last_msg = facts.date.clone();
            }
        }
        if !facts.meeting_date.is_empty() {
            self.meeting_date = facts.meeting_date.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::outreach::MessageFacts;
    use super::*;

    fn facts(date: &str) -> MessageFacts {
        MessageFacts {
            date: date.to_string(),
            medium: "Email".to_string(),
            account: "jane".to_string(),
            contacts: vec!["rec1".to_string()],
            responded: false,
            scheduled_intro: false,
            assisted_meeting: false,
            not_interested: false,
            follow_up_later: false,
            opened: false,
            viewed_profile: false,
            meeting_date: String::new(),
        }
    }

    #[test]
    fn test_first_last_msg_lexicographic_min_max() {
        let mut agg = OutreachAggregate::default();
        agg.absorb(&facts("02/10/2024"));
        agg.absorb(&facts("01/15/2024"));
        agg.absorb(&facts("03/01/2024"));
        assert_eq!(agg.first_msg, "01/15/2024");
        assert_eq!(agg.last_msg, "03/01/2024");
        assert_eq!(agg.msgs_sent, 3);
        assert_eq!(agg.by_medium["Email"], 3);
    }

    #[test]
    fn test_sticky_flags_never_reset() {
        let mut agg = OutreachAggregate::default();
        let mut f = facts("01/01/2024");
        f.responded = true;
        f.not_interested = true;
        agg.absorb(&f);
        agg.absorb(&facts("01/02/2024"));
        assert!(agg.responded);
        assert!(agg.not_interested);
        assert_eq!(agg.responded_count, 1);
    }

    #[test]
    fn test_contacts_deduplicated() {
        let mut agg = OutreachAggregate::default();
        agg.absorb(&facts("01/01/2024"));
        agg.absorb(&facts("01/02/2024"));
        assert_eq!(agg.contacts.len(), 1);
    }

    #[test]
    fn test_empty_date_does_not_disturb_min_max() {
        let mut agg = OutreachAggregate::default();
        agg.absorb(&facts("01/15/2024"));
        agg.absorb(&facts(""));
        assert_eq!(agg.first_msg, "01/15/2024");
        assert_eq!(agg.last_msg, "01/15/2024");
        assert_eq!(agg.msgs_sent, 2);
    }
}
