//! Spot ranking.
//!
//! Orders a spot collection by one of the [`SortOption`] strategies. Ranking never
//! mutates its input; it returns a new ordering. All sorts are stable, so spots with
//! exactly equal keys keep their input order.
//!
//! - **Recommended**: descending composite score
//!   `rating * 0.6 + ln(max(review_count, 1)) * 0.3 + (active deal ? 0.5 : 0)`
//! - **Distance**: ascending great-circle distance from the user. Without a user
//!   location the input order is returned unchanged.
//! - **Rating**: descending rating, then descending review count.

use std::cmp::Ordering;

use log::debug;

use crate::geo_utils::distance_to_spot_km;
use crate::{DealIndex, GpsPoint, SortOption, Spot};

/// Weights of the recommended-sort composite score.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct RankingConfig {
    /// Multiplier on the spot rating.
    /// Default: 0.6
    pub rating_weight: f64,

    /// Multiplier on ln(max(review_count, 1)).
    /// Default: 0.3
    pub review_weight: f64,

    /// Flat bonus for spots with an active deal.
    /// Default: 0.5
    pub deal_boost: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            rating_weight: 0.6,
            review_weight: 0.3,
            deal_boost: 0.5,
        }
    }
}

/// Composite recommendation score of a spot. Missing rating/reviews count as 0.
///
/// # Example
/// ```
/// use spot_finder::{Category, Deal, DealIndex, RankingConfig, Spot, recommendation_score};
///
/// let spot = Spot::new("s1", 37.0, 127.0, Category::Restaurant);
/// let deals = DealIndex::new(vec![Deal::new("d1", "s1", true, "Free dessert")]);
///
/// let score = recommendation_score(&spot, &deals, &RankingConfig::default());
/// assert!((score - 0.5).abs() < 1e-12);
/// ```
pub fn recommendation_score(spot: &Spot, deals: &DealIndex, config: &RankingConfig) -> f64 {
    let reviews = spot.review_count_or_zero().max(1) as f64;
    let deal_bonus = if deals.has_deal(&spot.id) { config.deal_boost } else { 0.0 };

    spot.rating_or_zero() * config.rating_weight + reviews.ln() * config.review_weight + deal_bonus
}

/// Precomputed sort key for one spot.
#[derive(Debug, Clone, Copy)]
enum SortKey {
    Score(f64),
    DistanceKm(f64),
    Rating(f64, u32),
}

fn compare_keys(a: &SortKey, b: &SortKey) -> Ordering {
    match (a, b) {
        (SortKey::Score(a), SortKey::Score(b)) => b.total_cmp(a),
        (SortKey::DistanceKm(a), SortKey::DistanceKm(b)) => a.total_cmp(b),
        (SortKey::Rating(ra, ca), SortKey::Rating(rb, cb)) => {
            rb.total_cmp(ra).then_with(|| cb.cmp(ca))
        }
        // Keys of one ranking pass always share a variant
        _ => Ordering::Equal,
    }
}

/// Compute sort keys, or `None` when the ordering is the identity.
fn decorate<'a>(
    spots: &'a [Spot],
    sort: SortOption,
    deals: &DealIndex,
    user_location: Option<GpsPoint>,
    config: &RankingConfig,
) -> Option<Vec<(SortKey, &'a Spot)>> {
    let keyed = match sort {
        SortOption::Recommended => spots
            .iter()
            .map(|s| (SortKey::Score(recommendation_score(s, deals, config)), s))
            .collect(),
        SortOption::Distance => {
            let user = user_location?;
            spots
                .iter()
                .map(|s| (SortKey::DistanceKm(distance_to_spot_km(&user, s)), s))
                .collect()
        }
        SortOption::Rating => spots
            .iter()
            .map(|s| (SortKey::Rating(s.rating_or_zero(), s.review_count_or_zero()), s))
            .collect(),
    };
    Some(keyed)
}

/// Order spots by `sort` using the default [`RankingConfig`].
///
/// # Example
/// ```
/// use spot_finder::{Category, DealIndex, SortOption, Spot, rank_spots};
///
/// let spots = vec![
///     Spot::new("a", 37.0, 127.0, Category::Cafe).with_rating(4.0, 10),
///     Spot::new("b", 37.0, 127.0, Category::Cafe).with_rating(4.0, 50),
/// ];
/// let ranked = rank_spots(&spots, SortOption::Rating, &DealIndex::default(), None);
/// assert_eq!(ranked[0].id, "b");
/// ```
pub fn rank_spots(
    spots: &[Spot],
    sort: SortOption,
    deals: &DealIndex,
    user_location: Option<GpsPoint>,
) -> Vec<Spot> {
    rank_spots_with_config(spots, sort, deals, user_location, &RankingConfig::default())
}

/// Order spots by `sort` with custom score weights.
pub fn rank_spots_with_config(
    spots: &[Spot],
    sort: SortOption,
    deals: &DealIndex,
    user_location: Option<GpsPoint>,
    config: &RankingConfig,
) -> Vec<Spot> {
    let Some(mut keyed) = decorate(spots, sort, deals, user_location, config) else {
        debug!("[Ranking] No user location, keeping input order for distance sort");
        return spots.to_vec();
    };

    // `sort_by` is stable: equal keys keep input order
    keyed.sort_by(|a, b| compare_keys(&a.0, &b.0));
    keyed.into_iter().map(|(_, s)| s.clone()).collect()
}

/// Order spots by a sort label coming from the UI.
///
/// Unknown labels return the input unchanged.
pub fn rank_spots_by_label(
    spots: &[Spot],
    label: &str,
    deals: &DealIndex,
    user_location: Option<GpsPoint>,
) -> Vec<Spot> {
    match label.parse::<SortOption>() {
        Ok(sort) => rank_spots(spots, sort, deals, user_location),
        Err(e) => {
            debug!("[Ranking] {}, keeping input order", e);
            spots.to_vec()
        }
    }
}

/// Rank spots using parallel processing.
///
/// Produces exactly the same ordering as [`rank_spots`]; rayon's `par_sort_by`
/// is stable. Recommended for large collections (10k+ spots).
#[cfg(feature = "parallel")]
pub fn rank_spots_parallel(
    spots: &[Spot],
    sort: SortOption,
    deals: &DealIndex,
    user_location: Option<GpsPoint>,
) -> Vec<Spot> {
    use rayon::prelude::*;

    let config = RankingConfig::default();
    let Some(mut keyed) = decorate(spots, sort, deals, user_location, &config) else {
        return spots.to_vec();
    };

    keyed.par_sort_by(|a, b| compare_keys(&a.0, &b.0));
    keyed.into_par_iter().map(|(_, s)| s.clone()).collect()
}
