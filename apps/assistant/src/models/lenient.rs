//! Tolerant field decoders for records coming from the remote platform API.
//!
//! Remote payloads are loosely typed: ids arrive as numbers or strings, flags as
//! bools, strings or `null`, dates in several layouts. A field that cannot be
//! understood decodes to its empty value instead of rejecting the whole record.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Folds every alias group onto its canonical (first) key so a payload that
/// carries two spellings of one field never trips serde's duplicate check.
/// The first non-null spelling wins.
pub fn collapse_aliases(mut raw: Value, groups: &[&[&str]]) -> Value {
    let Value::Object(map) = &mut raw else {
        return raw;
    };
    for group in groups {
        let Some((canonical, _)) = group.split_first() else {
            continue;
        };
        let mut chosen = None;
        for key in group.iter() {
            if let Some(value) = map.remove(*key) {
                if chosen.is_none() && !value.is_null() {
                    chosen = Some(value);
                }
            }
        }
        if let Some(value) = chosen {
            map.insert((*canonical).to_string(), value);
        }
    }
    raw
}

pub fn string_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

pub fn opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Accepts an array of strings, a comma separated string, or nothing.
pub fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Object(map) => map
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            })
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect(),
        _ => Vec::new(),
    })
}

pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    })
}

/// Timestamps; a bare date means the start of that day (UTC).
pub fn timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(parse_value(Value::deserialize(deserializer)?, NaiveTime::MIN))
}

/// Deadlines; a bare date stays open until the end of that day (UTC).
pub fn deadline<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    Ok(parse_value(Value::deserialize(deserializer)?, end_of_day))
}

fn parse_value(value: Value, date_only_time: NaiveTime) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_str(s.trim(), date_only_time),
        Value::Number(n) => {
            let raw = n.as_i64()?;
            // Anything past year ~5000 in seconds is really milliseconds.
            if raw.abs() > 100_000_000_000 {
                Utc.timestamp_millis_opt(raw).single()
            } else {
                Utc.timestamp_opt(raw, 0).single()
            }
        }
        _ => None,
    }
}

pub(crate) fn parse_str(raw: &str, date_only_time: NaiveTime) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for layout in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| Utc.from_utc_datetime(&date.and_time(date_only_time)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Bag {
        #[serde(default, deserialize_with = "string_id")]
        id: String,
        #[serde(default, deserialize_with = "string_list")]
        skills: Vec<String>,
        #[serde(default, deserialize_with = "flag")]
        verified: bool,
        #[serde(default, deserialize_with = "timestamp")]
        created: Option<DateTime<Utc>>,
        #[serde(default, deserialize_with = "deadline")]
        due: Option<DateTime<Utc>>,
    }

    #[test]
    fn test_collapse_keeps_first_populated_spelling() {
        let groups: &[&[&str]] = &[&["id", "_id"], &["created_at", "createdAt"]];
        let raw = json!({"_id": "a", "id": "b", "created_at": null, "createdAt": "2026-01-01"});

        let collapsed = collapse_aliases(raw, groups);

        assert_eq!(collapsed, json!({"id": "b", "created_at": "2026-01-01"}));
    }

    #[test]
    fn test_collapse_leaves_non_objects_alone() {
        assert_eq!(collapse_aliases(json!([1]), &[&["id", "_id"]]), json!([1]));
    }

    #[test]
    fn test_numeric_id_becomes_string() {
        let bag: Bag = serde_json::from_value(json!({"id": 42})).unwrap();
        assert_eq!(bag.id, "42");
    }

    #[test]
    fn test_skills_accept_comma_string_and_objects() {
        let a: Bag = serde_json::from_value(json!({"skills": "driving, mechanics ,"})).unwrap();
        assert_eq!(a.skills, vec!["driving", "mechanics"]);

        let b: Bag =
            serde_json::from_value(json!({"skills": [{"name": "Excel"}, "Word", 3]})).unwrap();
        assert_eq!(b.skills, vec!["Excel", "Word"]);
    }

    #[test]
    fn test_null_and_missing_fields_are_absent() {
        let bag: Bag =
            serde_json::from_value(json!({"skills": null, "verified": null, "created": null}))
                .unwrap();
        assert!(bag.skills.is_empty());
        assert!(!bag.verified);
        assert!(bag.created.is_none());
        assert!(bag.due.is_none());
    }

    #[test]
    fn test_flag_accepts_strings_and_numbers() {
        let a: Bag = serde_json::from_value(json!({"verified": "true"})).unwrap();
        let b: Bag = serde_json::from_value(json!({"verified": 1})).unwrap();
        let c: Bag = serde_json::from_value(json!({"verified": "no"})).unwrap();
        assert!(a.verified && b.verified && !c.verified);
    }

    #[test]
    fn test_bare_date_deadline_runs_to_end_of_day() {
        let bag: Bag =
            serde_json::from_value(json!({"due": "2026-03-01", "created": "2026-03-01"})).unwrap();
        let due = bag.due.unwrap();
        assert_eq!((due.day(), due.hour(), due.minute()), (1, 23, 59));
        assert_eq!(bag.created.unwrap().hour(), 0);
    }

    #[test]
    fn test_garbage_timestamp_is_absent() {
        let bag: Bag = serde_json::from_value(json!({"created": "soon"})).unwrap();
        assert!(bag.created.is_none());
    }
}
