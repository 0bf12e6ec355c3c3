//! View-facing browsing session.
//!
//! [`SpotBrowser`] owns the state a list/detail view reads: the spot and deal
//! collections, the active filter and sort option, the one-shot user location, the
//! coupon wallet, and the [`BookmarkStore`] for the visible spots. Views read through
//! accessors and change state only through the setters and bookmark operations here.

use std::future::Future;

use async_trait::async_trait;
use log::{info, warn};

use crate::geo_utils::format_distance;
use crate::{
    filter_spots, rank_spots_with_config, BookmarkStore, CouponError, CouponWallet, Deal,
    DealIndex, GpsPoint, RankingConfig, RemoteError, SortOption, Spot, SpotFilter,
};

/// Source of the device location.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// One position fix. May take arbitrarily long.
    async fn current_location(&self) -> Result<GpsPoint, RemoteError>;
}

/// User location for the session.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LocationState {
    /// Not requested yet
    #[default]
    Pending,
    Known(GpsPoint),
    /// Acquisition failed; not retried this session
    Unavailable,
}

impl LocationState {
    pub fn point(&self) -> Option<GpsPoint> {
        match self {
            LocationState::Known(p) => Some(*p),
            _ => None,
        }
    }
}

/// Browsing state behind the map's spot list and detail views.
#[derive(Debug)]
pub struct SpotBrowser {
    spots: Vec<Spot>,
    deals: DealIndex,
    filter: SpotFilter,
    sort: SortOption,
    ranking: RankingConfig,
    location: LocationState,
    bookmarks: BookmarkStore,
    coupons: CouponWallet,
}

impl SpotBrowser {
    pub fn new(bookmarks: BookmarkStore) -> Self {
        Self {
            spots: Vec::new(),
            deals: DealIndex::default(),
            filter: SpotFilter::default(),
            sort: SortOption::default(),
            ranking: RankingConfig::default(),
            location: LocationState::default(),
            bookmarks,
            coupons: CouponWallet::new(),
        }
    }

    pub fn with_ranking_config(mut self, ranking: RankingConfig) -> Self {
        self.ranking = ranking;
        self
    }

    // ------------------------------------------------------------------
    // Inputs
    // ------------------------------------------------------------------

    /// Replace the spot collection wholesale.
    pub fn set_spots(&mut self, spots: Vec<Spot>) {
        self.spots = spots;
    }

    /// Replace the deal collection wholesale.
    pub fn set_deals(&mut self, deals: Vec<Deal>) {
        self.deals = DealIndex::new(deals);
    }

    pub fn spots(&self) -> &[Spot] {
        &self.spots
    }

    pub fn deals(&self) -> &DealIndex {
        &self.deals
    }

    pub fn set_filter(&mut self, filter: SpotFilter) {
        self.filter = filter;
    }

    pub fn filter(&self) -> &SpotFilter {
        &self.filter
    }

    pub fn set_sort(&mut self, sort: SortOption) {
        self.sort = sort;
    }

    pub fn sort(&self) -> SortOption {
        self.sort
    }

    // ------------------------------------------------------------------
    // Location
    // ------------------------------------------------------------------

    pub fn location(&self) -> LocationState {
        self.location
    }

    pub fn user_location(&self) -> Option<GpsPoint> {
        self.location.point()
    }

    /// Acquire the user location once per session.
    ///
    /// Only the first call asks the provider. A failure leaves the location absent
    /// for the rest of the session, which keeps distance sorting in input order.
    pub async fn acquire_location(&mut self, provider: &dyn LocationProvider) -> Option<GpsPoint> {
        if self.location != LocationState::Pending {
            return self.location.point();
        }

        self.location = match provider.current_location().await {
            Ok(point) => {
                info!("[SpotBrowser] User location acquired");
                LocationState::Known(point)
            }
            Err(e) => {
                warn!("[SpotBrowser] Location unavailable: {}", e);
                LocationState::Unavailable
            }
        };
        self.location.point()
    }

    // ------------------------------------------------------------------
    // Derived view data
    // ------------------------------------------------------------------

    /// Filtered then ranked spots, in display order.
    pub fn visible_spots(&self) -> Vec<Spot> {
        let filtered = filter_spots(&self.spots, &self.filter, &self.deals);
        rank_spots_with_config(
            &filtered,
            self.sort,
            &self.deals,
            self.user_location(),
            &self.ranking,
        )
    }

    pub fn visible_ids(&self) -> Vec<String> {
        self.visible_spots().into_iter().map(|s| s.id).collect()
    }

    /// Distance label for a spot, empty while the location is unknown.
    pub fn distance_label(&self, spot: &Spot) -> String {
        format_distance(self.user_location(), spot)
    }

    pub fn deal_for(&self, spot_id: &str) -> Option<&Deal> {
        self.deals.deal_for(spot_id)
    }

    // ------------------------------------------------------------------
    // Bookmarks
    // ------------------------------------------------------------------

    pub fn bookmarks(&self) -> &BookmarkStore {
        &self.bookmarks
    }

    /// Re-resolve bookmark flags if the visible spot set changed.
    pub async fn refresh_bookmarks(&self) -> bool {
        let ids = self.visible_ids();
        self.bookmarks.sync_visible(&ids).await
    }

    /// Displayed bookmark flag; unknown reads as not bookmarked.
    pub fn is_bookmarked(&self, spot_id: &str) -> bool {
        self.bookmarks.is_bookmarked(spot_id).unwrap_or(false)
    }

    pub fn bookmarks_loading(&self) -> bool {
        self.bookmarks.is_loading()
    }

    /// Toggle the bookmark of a spot from its currently displayed flag.
    pub fn toggle_bookmark(
        &self,
        spot_id: &str,
    ) -> impl Future<Output = Result<bool, RemoteError>> + Send + 'static {
        let displayed = self.is_bookmarked(spot_id);
        self.bookmarks.toggle(spot_id, displayed)
    }

    // ------------------------------------------------------------------
    // Coupons
    // ------------------------------------------------------------------

    /// Receive the coupon of the deal attached to `spot_id`.
    ///
    /// Returns `Ok(None)` when the spot has no active deal.
    pub fn receive_coupon(&mut self, spot_id: &str) -> Result<Option<Deal>, CouponError> {
        let Some(deal) = self.deals.deal_for(spot_id).cloned() else {
            return Ok(None);
        };
        self.coupons.receive(&deal)?;
        Ok(Some(deal))
    }

    pub fn has_received_coupon(&self, deal_id: &str) -> bool {
        self.coupons.has_received(deal_id)
    }
}

/// Position in a spot's image carousel, wrapping at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageCursor {
    index: usize,
    len: usize,
}

impl ImageCursor {
    pub fn for_spot(spot: &Spot) -> Self {
        Self {
            index: 0,
            len: spot.images.len(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn next(&mut self) {
        if self.len == 0 {
            return;
        }
        self.index = (self.index + 1) % self.len;
    }

    pub fn prev(&mut self) {
        if self.len == 0 {
            return;
        }
        self.index = if self.index == 0 { self.len - 1 } else { self.index - 1 };
    }

    pub fn current<'a>(&self, spot: &'a Spot) -> Option<&'a str> {
        spot.images.get(self.index).map(String::as_str)
    }
}
