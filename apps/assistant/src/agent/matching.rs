//! Local predicate filters applied after the remote fetch.
//!
//! Each predicate is optional and they are AND-combined. A record missing the
//! attribute a predicate needs simply does not match; nothing here fails.

use chrono::{DateTime, Utc};

use crate::agent::filters::Filter;
use crate::agent::vocab::synonyms_for;
use crate::models::record::SearchRecord;

/// Values that mean "no preference" for a text filter.
const WILDCARDS: &[&str] = &["", "any", "all", "anywhere", "none", "null", "n/a"];

fn active(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !WILDCARDS.contains(&v.as_str()))
}

/// Past-deadline records are dropped before any other filter.
pub fn is_expired<R: SearchRecord>(record: &R, now: DateTime<Utc>) -> bool {
    record.deadline().is_some_and(|deadline| deadline < now)
}

/// Case-insensitive substring match in either direction, over every location field.
pub fn matches_location<R: SearchRecord>(record: &R, wanted: &str) -> bool {
    record.location_values().iter().any(|value| {
        let value = value.trim().to_lowercase();
        !value.is_empty() && (value.contains(wanted) || wanted.contains(&value))
    })
}

fn compact(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

/// `"Full time"` matches `"full-time"`; `"part"` matches `"Part-Time"`.
pub fn matches_employment_type<R: SearchRecord>(record: &R, wanted: &str) -> bool {
    let wanted = compact(wanted);
    record
        .employment_type()
        .map(compact)
        .is_some_and(|value| value.contains(&wanted))
}

/// Direct substring over title/description/requirements, then the synonym table.
pub fn matches_role<R: SearchRecord>(record: &R, wanted: &str) -> bool {
    let text = record.searchable_text().to_lowercase();
    if text.contains(wanted) {
        return true;
    }
    synonyms_for(wanted)
        .iter()
        .any(|synonym| text.contains(synonym))
}

/// Drops expired records, then keeps those satisfying every active predicate.
pub fn apply_filters<R: SearchRecord>(records: Vec<R>, filter: &Filter, now: DateTime<Utc>) -> Vec<R> {
    let location = active(filter.location.as_deref());
    let employment_type = active(filter.employment_type.as_deref());
    let role = active(filter.role.as_deref());

    records
        .into_iter()
        .filter(|r| !is_expired(r, now))
        .filter(|r| location.as_deref().map_or(true, |l| matches_location(r, l)))
        .filter(|r| {
            employment_type
                .as_deref()
                .map_or(true, |t| matches_employment_type(r, t))
        })
        .filter(|r| role.as_deref().map_or(true, |role| matches_role(r, role)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::{Candidate, Job};
    use chrono::Duration;

    fn job(title: &str, district: &str, employment_type: &str) -> Job {
        Job {
            id: title.to_string(),
            title: Some(title.to_string()),
            district: Some(district.to_string()),
            employment_type: Some(employment_type.to_string()),
            ..Job::default()
        }
    }

    fn filter(role: Option<&str>, location: Option<&str>, employment_type: Option<&str>) -> Filter {
        Filter {
            role: role.map(str::to_string),
            location: location.map(str::to_string),
            employment_type: employment_type.map(str::to_string),
            ..Filter::default()
        }
    }

    #[test]
    fn test_deadline_strictly_before_now_is_expired() {
        let now = Utc::now();
        let mut record = job("Driver", "Kigali", "Full-time");
        record.deadline = Some(now - Duration::seconds(1));
        assert!(is_expired(&record, now));
        record.deadline = Some(now);
        assert!(!is_expired(&record, now));
        record.deadline = None;
        assert!(!is_expired(&record, now));
    }

    #[test]
    fn test_location_matches_in_either_direction() {
        let record = job("Driver", "Gasabo, Kigali", "Full-time");
        assert!(matches_location(&record, "kigali"));

        let short = job("Driver", "Kigali", "Full-time");
        assert!(matches_location(&short, "kigali city"));
        assert!(!matches_location(&short, "musanze"));
    }

    #[test]
    fn test_employment_type_ignores_punctuation() {
        let record = job("Driver", "Kigali", "Full-Time");
        assert!(matches_employment_type(&record, "full time"));
        assert!(!matches_employment_type(&record, "part-time"));
        assert!(!matches_employment_type(&Job::default(), "full time"));
    }

    #[test]
    fn test_role_falls_back_to_synonyms() {
        let record = job("Chauffeur for executive", "Kigali", "Full-time");
        assert!(matches_role(&record, "driver"));
        assert!(!matches_role(&record, "nurse"));
    }

    #[test]
    fn test_role_with_no_direct_or_synonym_match_yields_nothing() {
        let records = vec![job("Accountant", "Kigali", "Full-time")];
        let kept = apply_filters(records, &filter(Some("astronaut"), None, None), Utc::now());
        assert!(kept.is_empty());
    }

    #[test]
    fn test_any_employment_type_is_a_wildcard() {
        let records = vec![job("Driver", "Kigali", "Contract")];
        let kept = apply_filters(records, &filter(None, Some("Kigali"), Some("Any")), Utc::now());
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_filters_are_and_combined() {
        let records = vec![
            job("Driver", "Kigali", "Full-time"),
            job("Driver", "Huye", "Full-time"),
            job("Driver", "Kigali", "Part-time"),
        ];
        let kept = apply_filters(
            records,
            &filter(Some("driver"), Some("kigali"), Some("full-time")),
            Utc::now(),
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].district.as_deref(), Some("Kigali"));
    }

    #[test]
    fn test_candidate_skills_count_for_role() {
        let candidate = Candidate {
            id: "c1".to_string(),
            skills: vec!["Driving".to_string()],
            ..Candidate::default()
        };
        assert!(matches_role(&candidate, "driver"));
    }
}
