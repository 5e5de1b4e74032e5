use serde::{Deserialize, Serialize};

use crate::models::lenient;

/// A platform category (e.g. "Transport & Logistics"). Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(deserialize_with = "lenient::string_id")]
    pub id: String,
    pub name: String,
}

impl Category {
    const FIELD_ALIASES: &'static [&'static [&'static str]] = &[&["id", "_id"]];

    /// `None` for entries without a usable id or name.
    pub fn from_raw(raw: serde_json::Value) -> Option<Self> {
        serde_json::from_value::<Self>(lenient::collapse_aliases(raw, Self::FIELD_ALIASES))
            .ok()
            .filter(|c| !c.id.is_empty() && !c.name.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mongo_style_id_decodes() {
        let category = Category::from_raw(json!({"_id": "64a1", "id": "64a1", "name": "Healthcare"}));
        assert_eq!(category.map(|c| c.id), Some("64a1".to_string()));
    }

    #[test]
    fn test_nameless_category_is_dropped() {
        assert!(Category::from_raw(json!({"id": 3, "name": " "})).is_none());
    }
}
