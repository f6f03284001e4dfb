//! Gmail label naming and synchronization for category sets.
//!
//! Category labels are named `"{key}: {display}"`. Stripping and
//! re-applying the numeric prefix must round-trip, otherwise renumbering
//! a category set would spawn duplicate labels.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use classify_module::classify::enabled_sorted;
use classify_module::CategoryConfig;
use gmail_module::{GmailClient, GoogleApiError};

static LABEL_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+:\s*").unwrap());

/// Label name without its numeric slot prefix.
pub fn get_display_name(name: &str) -> &str {
    match LABEL_PREFIX.find(name) {
        Some(found) => &name[found.end()..],
        None => name,
    }
}

/// Label name for a category slot. Strips any existing prefix first, so
/// applying it twice (or after a renumber) never stacks prefixes.
pub fn get_prefixed_name(name: &str, key: u8) -> String {
    format!("{}: {}", key, get_display_name(name))
}

/// Ensures one Gmail label per enabled category and returns slot → label id.
///
/// Existing labels are matched by display name, so a renumbered category
/// keeps its label instead of growing a second one.
pub async fn sync_category_labels(
    gmail: &GmailClient,
    categories: &[CategoryConfig],
) -> Result<HashMap<u8, String>, GoogleApiError> {
    let existing = gmail.list_labels().await?;
    let mut by_display: HashMap<String, String> = existing
        .into_iter()
        .map(|label| (get_display_name(&label.name).to_lowercase(), label.id))
        .collect();

    let mut label_ids = HashMap::new();
    for category in enabled_sorted(categories) {
        let display_key = get_display_name(&category.name).to_lowercase();
        let label_id = match by_display.remove(&display_key) {
            Some(id) => id,
            None => {
                let name = get_prefixed_name(&category.name, category.key);
                let created = gmail.create_label(&name, Some(&category.color)).await?;
                info!(label = %created.name, "created missing category label");
                created.id
            }
        };
        label_ids.insert(category.key, label_id);
    }
    Ok(label_ids)
}
