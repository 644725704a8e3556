// Fixed category set
//
// Every expense carries one of these keys. The order of `CATEGORIES` is the
// canonical order used when a breakdown is pre-seeded with every category
// (budget template), so dashboards list categories deterministically.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Category {
    /// Stable key stored on transactions (e.g. "food")
    pub key: &'static str,

    /// Display name (e.g. "Food")
    pub name: &'static str,

    /// Icon for UI
    pub icon: &'static str,

    /// Color for UI
    pub color: &'static str,
}

pub const CATEGORIES: &[Category] = &[
    Category { key: "food", name: "Food", icon: "🍽️", color: "#FF5733" },
    Category { key: "transportation", name: "Transportation", icon: "🚗", color: "#2196F3" },
    Category { key: "housing", name: "Housing", icon: "🏠", color: "#795548" },
    Category { key: "utilities", name: "Utilities", icon: "💡", color: "#FFC107" },
    Category { key: "healthcare", name: "Healthcare", icon: "🩺", color: "#E91E63" },
    Category { key: "insurance", name: "Insurance", icon: "🛡️", color: "#607D8B" },
    Category { key: "entertainment", name: "Entertainment", icon: "🎬", color: "#9C27B0" },
    Category { key: "shopping", name: "Shopping", icon: "🛍️", color: "#FF9800" },
    Category { key: "education", name: "Education", icon: "🎓", color: "#3F51B5" },
    Category { key: "travel", name: "Travel", icon: "✈️", color: "#03A9F4" },
    Category { key: "personal", name: "Personal", icon: "💇", color: "#8BC34A" },
    Category { key: "gifts", name: "Gifts", icon: "🎁", color: "#F44336" },
    Category { key: "savings", name: "Savings", icon: "🏦", color: "#4CAF50" },
    Category { key: "other", name: "Other", icon: "📦", color: "#9E9E9E" },
];

/// Category keys in canonical order
pub fn keys() -> impl Iterator<Item = &'static str> {
    CATEGORIES.iter().map(|c| c.key)
}

pub fn find(key: &str) -> Option<&'static Category> {
    CATEGORIES.iter().find(|c| c.key == key)
}

pub fn is_known(key: &str) -> bool {
    find(key).is_some()
}

/// Resolve a user-supplied category (e.g. a `?category=` query) to its key.
///
/// Matches either the key or the display name, ignoring case and
/// surrounding whitespace. Unknown values resolve to `None`.
pub fn resolve_query(raw: &str) -> Option<&'static str> {
    let wanted = raw.trim();
    if wanted.is_empty() {
        return None;
    }

    CATEGORIES
        .iter()
        .find(|c| c.key.eq_ignore_ascii_case(wanted) || c.name.eq_ignore_ascii_case(wanted))
        .map(|c| c.key)
}

/// Display name for a key, falling back to the key capitalized
pub fn display_name(key: &str) -> String {
    match find(key) {
        Some(category) => category.name.to_string(),
        None => capitalize(key),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for key in keys() {
            assert!(seen.insert(key), "duplicate category key {}", key);
        }
        assert_eq!(seen.len(), CATEGORIES.len());
    }

    #[test]
    fn test_canonical_order_starts_with_food() {
        let first: Vec<_> = keys().take(2).collect();
        assert_eq!(first, vec!["food", "transportation"]);
    }

    #[test]
    fn test_resolve_query() {
        assert_eq!(resolve_query("food"), Some("food"));
        assert_eq!(resolve_query("Food"), Some("food"));
        assert_eq!(resolve_query("  TRAVEL "), Some("travel"));
        assert_eq!(resolve_query("crypto"), None);
        assert_eq!(resolve_query(""), None);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("healthcare"), "Healthcare");
        assert_eq!(display_name("pets"), "Pets");
        assert_eq!(display_name(""), "");
    }
}
