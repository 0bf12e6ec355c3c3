//! Deal lookup and coupon receipt tracking.
//!
//! A spot may have several deals attached, but only one is "the" deal for that
//! spot: the first deal in collection order that targets the spot and is active.
//! Ranking (deal boost), filtering (deals-only) and display all go through the
//! same [`DealIndex`] so they agree on which spots have a deal.

use std::collections::{HashMap, HashSet};

use log::info;

use crate::Deal;

/// Read-only index over an immutable deal collection.
#[derive(Debug, Clone, Default)]
pub struct DealIndex {
    deals: Vec<Deal>,
    /// spot id -> position of its first active deal in `deals`
    first_active: HashMap<String, usize>,
}

impl DealIndex {
    /// Build an index over a deal collection, keeping collection order.
    pub fn new(deals: Vec<Deal>) -> Self {
        let mut first_active = HashMap::new();
        for (idx, deal) in deals.iter().enumerate() {
            if deal.is_active {
                first_active.entry(deal.spot_id.clone()).or_insert(idx);
            }
        }
        Self {
            deals,
            first_active,
        }
    }

    /// The first active deal targeting `spot_id`, if any.
    ///
    /// # Example
    /// ```
    /// use spot_finder::{Deal, DealIndex};
    ///
    /// let index = DealIndex::new(vec![
    ///     Deal::new("d1", "s1", false, "Expired"),
    ///     Deal::new("d2", "s1", true, "10% off"),
    ///     Deal::new("d3", "s1", true, "Free drink"),
    /// ]);
    /// assert_eq!(index.deal_for("s1").map(|d| d.id.as_str()), Some("d2"));
    /// assert!(index.deal_for("s2").is_none());
    /// ```
    pub fn deal_for(&self, spot_id: &str) -> Option<&Deal> {
        self.first_active.get(spot_id).map(|&idx| &self.deals[idx])
    }

    /// Whether any active deal targets `spot_id`.
    pub fn has_deal(&self, spot_id: &str) -> bool {
        self.first_active.contains_key(spot_id)
    }

    /// All deals in collection order, active or not.
    pub fn deals(&self) -> &[Deal] {
        &self.deals
    }

    pub fn is_empty(&self) -> bool {
        self.deals.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CouponError {
    #[error("coupon for deal {0} already received")]
    AlreadyReceived(String),
}

/// Coupons the user has received during this session, keyed by deal id.
#[derive(Debug, Clone, Default)]
pub struct CouponWallet {
    received: HashSet<String>,
}

impl CouponWallet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive the coupon attached to `deal`. Each deal's coupon can be received once.
    pub fn receive(&mut self, deal: &Deal) -> Result<(), CouponError> {
        if !self.received.insert(deal.id.clone()) {
            return Err(CouponError::AlreadyReceived(deal.id.clone()));
        }
        info!("[CouponWallet] Received coupon '{}' ({})", deal.title, deal.id);
        Ok(())
    }

    pub fn has_received(&self, deal_id: &str) -> bool {
        self.received.contains(deal_id)
    }

    pub fn len(&self) -> usize {
        self.received.len()
    }

    pub fn is_empty(&self) -> bool {
        self.received.is_empty()
    }
}
