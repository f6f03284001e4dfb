//! User-configurable classification buckets.
//!
//! Categories are a flat, explicitly ordered list rather than a keyed map:
//! prompt rendering and priority handling must never depend on container
//! iteration order, so every record carries its own `order` attribute.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::errors::ClassifyError;

/// Slot of the required "needs a reply" bucket.
pub const RESPOND_CATEGORY_KEY: u8 = 1;
/// Slot every unresolvable classification falls back to.
pub const FALLBACK_CATEGORY_KEY: u8 = 2;
/// Slot reserved for marketing and spam in the default set; the thread
/// safety override keys off this value.
pub const SPAM_CATEGORY_KEY: u8 = 8;
/// Hard ceiling on buckets per user.
pub const MAX_CATEGORIES: usize = 9;

/// One classification bucket as configured by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Stable 1-based slot number; surfaces in prompts, labels, and the
    /// stored classification.
    pub key: u8,
    pub name: String,
    pub color: String,
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Required buckets cannot be disabled or removed by the user.
    #[serde(default)]
    pub required: bool,
    /// Free-form guidance injected into the classification prompt.
    #[serde(default)]
    pub rules: Option<String>,
    /// Whether emails landing here get an auto-drafted reply.
    #[serde(default)]
    pub drafts: bool,
    /// Explicit sort position; independent of `key` so users can reorder
    /// without renumbering.
    pub order: u32,
}

fn default_enabled() -> bool {
    true
}

/// The out-of-the-box category set.
pub fn default_categories() -> Vec<CategoryConfig> {
    vec![
        category(1, "Respond", "#fb4c2f", "Emails that need a direct reply from you")
            .required()
            .drafts(),
        category(2, "Update/FYI", "#16a766", "Informational updates that need no action")
            .required(),
        category(3, "Calendar", "#ffad47", "Meeting invites, scheduling, and calendar coordination"),
        category(4, "Pending", "#f691b3", "Waiting on someone else or on an external process"),
        category(5, "Comment", "#8e63ce", "Comment and mention notifications from collaboration tools"),
        category(6, "Notification", "#4a86e8", "Automated notifications from apps and services"),
        category(7, "Complete", "#2da2bb", "Threads that are wrapped up and need nothing further"),
        category(8, "Marketing/Spam", "#999999", "Marketing blasts, cold outreach, and unsolicited newsletters"),
    ]
}

fn category(key: u8, name: &str, color: &str, description: &str) -> CategoryConfig {
    CategoryConfig {
        key,
        name: name.to_string(),
        color: color.to_string(),
        description: description.to_string(),
        enabled: true,
        required: false,
        rules: None,
        drafts: false,
        order: key as u32,
    }
}

impl CategoryConfig {
    fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn drafts(mut self) -> Self {
        self.drafts = true;
        self
    }
}

/// Enabled categories in display order.
pub fn enabled_sorted(categories: &[CategoryConfig]) -> Vec<&CategoryConfig> {
    let mut sorted: Vec<&CategoryConfig> = categories.iter().filter(|c| c.enabled).collect();
    sorted.sort_by_key(|c| (c.order, c.key));
    sorted
}

/// Looks up an enabled category by slot number.
pub fn category_for(categories: &[CategoryConfig], key: u8) -> Option<&CategoryConfig> {
    categories.iter().find(|c| c.enabled && c.key == key)
}

/// Name of an enabled category, if the slot resolves.
pub fn category_name(categories: &[CategoryConfig], key: u8) -> Option<&str> {
    category_for(categories, key).map(|c| c.name.as_str())
}

/// Highest enabled slot number; the parser snaps anything above this back
/// to the fallback slot.
pub fn max_category_key(categories: &[CategoryConfig]) -> u8 {
    categories
        .iter()
        .filter(|c| c.enabled)
        .map(|c| c.key)
        .max()
        .unwrap_or(FALLBACK_CATEGORY_KEY)
}

/// Validates a user-supplied category set before it is persisted.
pub fn validate_set(categories: &[CategoryConfig]) -> Result<(), ClassifyError> {
    if categories.is_empty() {
        return Err(ClassifyError::InvalidCategories(
            "category set is empty".to_string(),
        ));
    }
    if categories.len() > MAX_CATEGORIES {
        return Err(ClassifyError::InvalidCategories(format!(
            "{} categories exceeds the limit of {}",
            categories.len(),
            MAX_CATEGORIES
        )));
    }

    let mut seen = HashSet::new();
    for c in categories {
        if c.key == 0 {
            return Err(ClassifyError::InvalidCategories(format!(
                "category '{}' has slot 0; slots are 1-based",
                c.name
            )));
        }
        if !seen.insert(c.key) {
            return Err(ClassifyError::InvalidCategories(format!(
                "duplicate category slot {}",
                c.key
            )));
        }
    }

    for required in [RESPOND_CATEGORY_KEY, FALLBACK_CATEGORY_KEY] {
        match categories.iter().find(|c| c.key == required) {
            Some(c) if c.enabled => {}
            Some(c) => {
                return Err(ClassifyError::InvalidCategories(format!(
                    "required category '{}' (slot {}) is disabled",
                    c.name, required
                )))
            }
            None => {
                return Err(ClassifyError::InvalidCategories(format!(
                    "required category slot {} is missing",
                    required
                )))
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_set_shape() {
        let categories = default_categories();
        assert_eq!(categories.len(), 8);
        assert!(validate_set(&categories).is_ok());

        let respond = category_for(&categories, RESPOND_CATEGORY_KEY).unwrap();
        assert!(respond.required);
        assert!(respond.drafts);

        let fallback = category_for(&categories, FALLBACK_CATEGORY_KEY).unwrap();
        assert_eq!(fallback.name, "Update/FYI");
        assert!(fallback.required);

        assert_eq!(
            category_name(&categories, SPAM_CATEGORY_KEY),
            Some("Marketing/Spam")
        );
        assert_eq!(max_category_key(&categories), 8);
    }

    #[test]
    fn enabled_sorted_respects_order_attribute_not_position() {
        let mut categories = default_categories();
        // Reorder Calendar to the front without renumbering slots.
        categories.iter_mut().find(|c| c.key == 3).unwrap().order = 0;
        categories.iter_mut().find(|c| c.key == 6).unwrap().enabled = false;

        let sorted = enabled_sorted(&categories);
        assert_eq!(sorted.first().unwrap().key, 3);
        assert!(sorted.iter().all(|c| c.key != 6));
    }

    #[test]
    fn lookup_skips_disabled_slots() {
        let mut categories = default_categories();
        categories.iter_mut().find(|c| c.key == 7).unwrap().enabled = false;
        assert!(category_for(&categories, 7).is_none());
        assert_eq!(max_category_key(&categories), 8);
    }

    #[test]
    fn validate_rejects_duplicates_and_missing_required() {
        let mut categories = default_categories();
        categories[4].key = 3;
        assert!(validate_set(&categories).is_err());

        let only_respond = vec![default_categories().remove(0)];
        assert!(validate_set(&only_respond).is_err());

        let mut disabled_fallback = default_categories();
        disabled_fallback
            .iter_mut()
            .find(|c| c.key == FALLBACK_CATEGORY_KEY)
            .unwrap()
            .enabled = false;
        assert!(validate_set(&disabled_fallback).is_err());
    }

    #[test]
    fn two_bucket_set_is_valid() {
        let categories = vec![
            CategoryConfig {
                key: 1,
                name: "Respond".to_string(),
                color: "#fb4c2f".to_string(),
                description: "Needs a reply".to_string(),
                enabled: true,
                required: true,
                rules: None,
                drafts: false,
                order: 1,
            },
            CategoryConfig {
                key: 2,
                name: "Other".to_string(),
                color: "#999999".to_string(),
                description: "Everything else".to_string(),
                enabled: true,
                required: true,
                rules: None,
                drafts: false,
                order: 2,
            },
        ];
        assert!(validate_set(&categories).is_ok());
        assert_eq!(max_category_key(&categories), 2);
    }
}
