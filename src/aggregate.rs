//! Cross-cutting message statistics.
//!
//! Tallies are keyed by the raw medium/account strings, so distinct casings
//! and spellings stay distinct buckets, reflecting upstream data as-is.
//! Monthly buckets parse the canonical `MM/DD/YYYY` date into `YYYY-MM`;
//! malformed dates are excluded from the monthly buckets but still count
//! toward the total.

use std::sync::OnceLock;

use regex::Regex;

use crate::sources::Message;
use crate::types::Meta;

fn month_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,2})/\d{1,2}/(\d{4})").expect("valid regex"))
}

pub fn aggregate(messages: &[Message]) -> Meta {
    let mut meta = Meta {
        total_messages: messages.len() as u32,
        ..Default::default()
    };

    for m in messages {
        if !m.medium.is_empty() {
            *meta.medium_counts.entry(m.medium.clone()).or_insert(0) += 1;
        }
        if !m.account.is_empty() {
            *meta.account_counts.entry(m.account.clone()).or_insert(0) += 1;
        }
        if let Some(caps) = month_re().captures(&m.date) {
            if let Ok(month) = caps[1].parse::<u32>() {
                let key = format!("{}-{:02}", &caps[2], month);
                *meta.monthly_counts.entry(key).or_insert(0) += 1;
            }
        }
    }

    meta
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(date: &str, medium: &str, account: &str) -> Message {
        Message {
            date: date.to_string(),
            medium: medium.to_string(),
            account: account.to_string(),
        }
    }

    #[test]
    fn test_monthly_bucketing() {
        let messages = vec![
            message("01/15/2024", "Email", "jane"),
            message("01/20/2024", "Email", "jane"),
            message("2/3/2024", "LinkedIn", "joe"),
        ];
        let meta = aggregate(&messages);
        assert_eq!(meta.total_messages, 3);
        assert_eq!(meta.monthly_counts["2024-01"], 2);
        assert_eq!(meta.monthly_counts["2024-02"], 1);
    }

    #[test]
    fn test_malformed_date_counts_total_only() {
        let messages = vec![
            message("01/15/2024", "Email", "jane"),
            message("not a date", "Email", "jane"),
            message("", "Email", "jane"),
        ];
        let meta = aggregate(&messages);
        assert_eq!(meta.total_messages, 3);
        assert_eq!(meta.monthly_counts.len(), 1);
        assert_eq!(meta.monthly_counts["2024-01"], 1);
    }

    #[test]
    fn test_raw_strings_stay_distinct_buckets() {
        let messages = vec![
            message("", "Email", "Jane"),
            message("", "email", "jane"),
        ];
        let meta = aggregate(&messages);
        assert_eq!(meta.medium_counts["Email"], 1);
        assert_eq!(meta.medium_counts["email"], 1);
        assert_eq!(meta.account_counts.len(), 2);
    }

    #[test]
    fn test_empty_medium_and_account_excluded() {
        let messages = vec![message("01/01/2024", "", "")];
        let meta = aggregate(&messages);
        assert_eq!(meta.total_messages, 1);
        assert!(meta.medium_counts.is_empty());
        assert!(meta.account_counts.is_empty());
    }
}
