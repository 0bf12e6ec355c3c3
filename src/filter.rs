//! Filter stage: reduce the spot collection to the active category or deal subset.
//!
//! Category tabs arrive as their display labels. The label is mapped to an internal
//! [`Category`] through a fixed table; an unknown label filters nothing.

use crate::{Category, DealIndex, Spot};

/// Label of the "all categories" tab.
pub const ALL_CATEGORIES_LABEL: &str = "전체";

// Display label -> category key
const CATEGORY_LABELS: &[(&str, Category)] = &[
    ("체험", Category::Experience),
    ("문화", Category::Culture),
    ("맛집", Category::Restaurant),
    ("카페", Category::Cafe),
];

/// Active filter selection of the list view.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct SpotFilter {
    /// Display label of the selected category tab
    pub active_category: String,
    /// Show only spots with an active deal (overrides the category)
    pub show_deals_only: bool,
}

impl Default for SpotFilter {
    fn default() -> Self {
        Self {
            active_category: ALL_CATEGORIES_LABEL.to_string(),
            show_deals_only: false,
        }
    }
}

impl SpotFilter {
    pub fn category(label: &str) -> Self {
        Self {
            active_category: label.to_string(),
            show_deals_only: false,
        }
    }

    pub fn deals_only() -> Self {
        Self {
            show_deals_only: true,
            ..Self::default()
        }
    }
}

fn is_all_label(label: &str) -> bool {
    label == ALL_CATEGORIES_LABEL || label.eq_ignore_ascii_case("all")
}

/// Map a category display label to its internal key.
pub fn category_from_label(label: &str) -> Option<Category> {
    CATEGORY_LABELS
        .iter()
        .find(|(l, _)| *l == label)
        .map(|(_, category)| *category)
}

/// Apply `filter` to `spots`, preserving input order.
///
/// # Example
/// ```
/// use spot_finder::{Category, DealIndex, Spot, SpotFilter, filter_spots};
///
/// let spots = vec![
///     Spot::new("c1", 37.0, 127.0, Category::Cafe),
///     Spot::new("r1", 37.0, 127.0, Category::Restaurant),
/// ];
/// let cafes = filter_spots(&spots, &SpotFilter::category("카페"), &DealIndex::default());
/// assert_eq!(cafes.len(), 1);
/// assert_eq!(cafes[0].id, "c1");
/// ```
pub fn filter_spots(spots: &[Spot], filter: &SpotFilter, deals: &DealIndex) -> Vec<Spot> {
    if filter.show_deals_only {
        return spots.iter().filter(|s| deals.has_deal(&s.id)).cloned().collect();
    }

    if is_all_label(&filter.active_category) {
        return spots.to_vec();
    }

    match category_from_label(&filter.active_category) {
        Some(category) => spots.iter().filter(|s| s.category == category).cloned().collect(),
        None => spots.to_vec(),
    }
}
