//! # Spot Finder
//!
//! Ranking, filtering and bookmark-state synchronization for map-based spot browsing.
//!
//! This library provides:
//! - Great-circle distance and distance labels for geo-tagged spots
//! - Composite "recommended" ranking with deal boost, distance and rating sorts
//! - Category / deal filtering of spot collections
//! - A bookmark state store with parallel batch resolve and optimistic toggles
//!
//! ## Features
//!
//! - **`parallel`** - Enable parallel ranking with rayon
//! - **`http`** - Enable the REST client for spots, deals and bookmarks
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use spot_finder::{Category, DealIndex, GpsPoint, SortOption, Spot, rank_spots};
//!
//! let spots = vec![
//!     Spot::new("cafe-1", 37.5665, 126.9780, Category::Cafe).with_rating(4.2, 120),
//!     Spot::new("museum-1", 37.5796, 126.9770, Category::Culture).with_rating(4.8, 40),
//! ];
//! let deals = DealIndex::default();
//! let me = GpsPoint::new(37.5700, 126.9820);
//!
//! let ranked = rank_spots(&spots, SortOption::Rating, &deals, Some(me));
//! assert_eq!(ranked[0].id, "museum-1");
//! ```

use std::fmt;
use std::str::FromStr;

pub mod error;
pub use error::RemoteError;

pub mod geo_utils;
pub use geo_utils::{distance_km, format_distance};

pub mod deals;
pub use deals::{CouponError, CouponWallet, DealIndex};

pub mod ranking;
pub use ranking::{
    rank_spots, rank_spots_by_label, rank_spots_with_config, recommendation_score, RankingConfig,
};

pub mod filter;
pub use filter::{category_from_label, filter_spots, SpotFilter};

pub mod bookmarks;
pub use bookmarks::{
    ActorId, BookmarkApi, BookmarkResponse, BookmarkSnapshot, BookmarkStore, PendingToggle,
    ResolveOutcome, StorePhase,
};

pub mod browser;
pub use browser::{ImageCursor, LocationProvider, LocationState, SpotBrowser};

// HTTP module for the remote collaborators
#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{ApiConfig, SpotApiClient};

#[cfg(feature = "parallel")]
pub use ranking::rank_spots_parallel;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("SpotFinderRust")
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use spot_finder::GpsPoint;
/// let point = GpsPoint::new(37.5665, 126.9780); // Seoul City Hall
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "http", derive(serde::Serialize, serde::Deserialize))]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Internal category key of a spot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[cfg_attr(feature = "http", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "http", serde(rename_all = "lowercase"))]
pub enum Category {
    Experience,
    Culture,
    Restaurant,
    Cafe,
    /// Any category key this library does not know about
    #[cfg_attr(feature = "http", serde(other))]
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Experience => "experience",
            Category::Culture => "culture",
            Category::Restaurant => "restaurant",
            Category::Cafe => "cafe",
            Category::Other => "other",
        }
    }
}

/// A geo-tagged point of interest.
///
/// Spots are supplied by an external data source and never mutated here.
/// Missing `rating` / `review_count` count as 0 wherever they are scored.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "http", derive(serde::Serialize, serde::Deserialize))]
pub struct Spot {
    /// Unique identifier
    pub id: String,
    /// Display name
    #[cfg_attr(
        feature = "http",
        serde(default, deserialize_with = "crate::http::null_as_default")
    )]
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub category: Category,
    #[cfg_attr(feature = "http", serde(default))]
    pub rating: Option<f64>,
    #[cfg_attr(feature = "http", serde(default))]
    pub review_count: Option<u32>,
    /// Opaque, passed through unmodified. Structured JSON hours arrive as their JSON text.
    #[cfg_attr(
        feature = "http",
        serde(default, deserialize_with = "crate::http::opaque_text")
    )]
    pub operating_hours: Option<String>,
    /// Image references in display order
    #[cfg_attr(
        feature = "http",
        serde(default, deserialize_with = "crate::http::null_as_default")
    )]
    pub images: Vec<String>,
}

impl Spot {
    /// Create a spot with no rating, reviews, hours or images.
    pub fn new(id: &str, latitude: f64, longitude: f64, category: Category) -> Self {
        Self {
            id: id.to_string(),
            name: String::new(),
            latitude,
            longitude,
            category,
            rating: None,
            review_count: None,
            operating_hours: None,
            images: Vec::new(),
        }
    }

    /// Builder-style helper to attach a rating and review count.
    pub fn with_rating(mut self, rating: f64, review_count: u32) -> Self {
        self.rating = Some(rating);
        self.review_count = Some(review_count);
        self
    }

    pub fn location(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }

    /// Rating, with an absent rating treated as 0.
    pub fn rating_or_zero(&self) -> f64 {
        self.rating.unwrap_or(0.0)
    }

    /// Review count, with an absent count treated as 0.
    pub fn review_count_or_zero(&self) -> u32 {
        self.review_count.unwrap_or(0)
    }
}

/// A promotional offer attached to a spot.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "http", derive(serde::Serialize, serde::Deserialize))]
pub struct Deal {
    pub id: String,
    /// Identifier of the spot this deal belongs to
    pub spot_id: String,
    pub is_active: bool,
    pub title: String,
}

impl Deal {
    pub fn new(id: &str, spot_id: &str, is_active: bool, title: &str) -> Self {
        Self {
            id: id.to_string(),
            spot_id: spot_id.to_string(),
            is_active,
            title: title.to_string(),
        }
    }
}

/// How the visible spot list is ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum SortOption {
    /// Composite score of rating, review volume and active deal
    #[default]
    Recommended,
    /// Nearest first (requires a user location)
    Distance,
    /// Highest rating first, ties broken by review count
    Rating,
}

impl SortOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOption::Recommended => "recommended",
            SortOption::Distance => "distance",
            SortOption::Rating => "rating",
        }
    }
}

impl fmt::Display for SortOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sort option: {0}")]
pub struct ParseSortOptionError(pub String);

impl FromStr for SortOption {
    type Err = ParseSortOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recommended" => Ok(SortOption::Recommended),
            "distance" => Ok(SortOption::Distance),
            "rating" => Ok(SortOption::Rating),
            other => Err(ParseSortOptionError(other.to_string())),
        }
    }
}

/// Kind of entity a bookmark points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "http", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "http", serde(rename_all = "kebab-case"))]
pub enum BookmarkKind {
    #[default]
    Spot,
    AiRoute,
    Benefit,
    MapPlace,
}

impl BookmarkKind {
    /// Wire name used by the remote bookmark store.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookmarkKind::Spot => "spot",
            BookmarkKind::AiRoute => "ai-route",
            BookmarkKind::Benefit => "benefit",
            BookmarkKind::MapPlace => "map-place",
        }
    }
}

// ============================================================================
// FFI Exports (only when feature enabled)
// ============================================================================

#[cfg(feature = "ffi")]
mod ffi {
    use super::*;
    use log::info;

    /// Order spots for display.
    #[uniffi::export]
    pub fn ffi_rank_spots(
        spots: Vec<Spot>,
        deals: Vec<Deal>,
        sort: SortOption,
        user_location: Option<GpsPoint>,
    ) -> Vec<Spot> {
        init_logging();
        info!("[SpotFinderRust] rank_spots called with {} spots by {}", spots.len(), sort);

        let start = std::time::Instant::now();
        let index = DealIndex::new(deals);
        let ranked = crate::ranking::rank_spots_parallel(&spots, sort, &index, user_location);

        info!("[SpotFinderRust] Ranked {} spots in {:?}", ranked.len(), start.elapsed());
        ranked
    }

    /// Reduce spots to the active category or deal-only subset.
    #[uniffi::export]
    pub fn ffi_filter_spots(spots: Vec<Spot>, deals: Vec<Deal>, filter: SpotFilter) -> Vec<Spot> {
        init_logging();
        let index = DealIndex::new(deals);
        let visible = filter_spots(&spots, &filter, &index);
        info!(
            "[SpotFinderRust] filter_spots kept {}/{} spots ({:?})",
            visible.len(),
            spots.len(),
            filter
        );
        visible
    }

    /// Distance label between the user and a spot ("350m", "2.4km", or "").
    #[uniffi::export]
    pub fn ffi_format_distance(user_location: Option<GpsPoint>, spot: Spot) -> String {
        format_distance(user_location, &spot)
    }

    /// Great-circle distance in kilometers.
    #[uniffi::export]
    pub fn ffi_distance_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
        distance_km(lat1, lng1, lat2, lng2)
    }

    /// Get default ranking configuration.
    #[uniffi::export]
    pub fn default_ranking_config() -> RankingConfig {
        init_logging();
        info!("[SpotFinderRust] default_ranking_config called - Rust is active!");
        RankingConfig::default()
    }
}

// ============================================================================
// Tests
// ============================================================================
