//! Walk through one browsing session against an in-memory bookmark store.
//!
//! Run with: cargo run --example browse_spots

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use spot_finder::{
    ActorId, BookmarkApi, BookmarkKind, BookmarkResponse, BookmarkStore, Category, Deal, GpsPoint,
    ImageCursor, LocationProvider, RemoteError, SortOption, Spot, SpotBrowser, SpotFilter,
};

/// Bookmark server that lives in a hash map.
#[derive(Default)]
struct InMemoryBookmarks {
    flags: Mutex<HashMap<String, bool>>,
}

#[async_trait]
impl BookmarkApi for InMemoryBookmarks {
    async fn resolve_bookmark(
        &self,
        _actor: &ActorId,
        target_id: &str,
        _kind: BookmarkKind,
    ) -> Result<BookmarkResponse, RemoteError> {
        let flags = self.flags.lock().map_err(|e| RemoteError::Unavailable(e.to_string()))?;
        Ok(BookmarkResponse::bookmarked(flags.get(target_id).copied().unwrap_or(false)))
    }

    async fn toggle_bookmark(
        &self,
        _actor: &ActorId,
        target_id: &str,
        _kind: BookmarkKind,
    ) -> Result<BookmarkResponse, RemoteError> {
        let mut flags = self.flags.lock().map_err(|e| RemoteError::Unavailable(e.to_string()))?;
        let flag = flags.entry(target_id.to_string()).or_insert(false);
        *flag = !*flag;
        Ok(BookmarkResponse::bookmarked(*flag))
    }
}

/// Device parked in front of Deoksugung.
struct StaticLocation(GpsPoint);

#[async_trait]
impl LocationProvider for StaticLocation {
    async fn current_location(&self) -> Result<GpsPoint, RemoteError> {
        Ok(self.0)
    }
}

fn sample_spots() -> Vec<Spot> {
    let mut spots = vec![
        Spot::new("s1", 37.5796, 126.9770, Category::Culture).with_rating(4.7, 1200),
        Spot::new("s2", 37.5665, 126.9780, Category::Cafe).with_rating(4.3, 85),
        Spot::new("s3", 37.5512, 126.9882, Category::Experience).with_rating(4.5, 300),
        Spot::new("s4", 37.5636, 126.9838, Category::Restaurant),
    ];
    spots[0].name = "Gyeongbokgung".to_string();
    spots[1].name = "Plaza Coffee".to_string();
    spots[2].name = "Namsan Pottery".to_string();
    spots[3].name = "Myeongdong Noodles".to_string();
    spots[1].images = vec!["front.jpg".to_string(), "latte.jpg".to_string()];
    spots
}

fn print_list(title: &str, browser: &SpotBrowser) {
    println!("{}:", title);
    for spot in browser.visible_spots() {
        let label = browser.distance_label(&spot);
        let star = if browser.is_bookmarked(&spot.id) { "*" } else { " " };
        let deal = browser
            .deal_for(&spot.id)
            .map(|d| format!(" [deal: {}]", d.title))
            .unwrap_or_default();
        println!(
            "  {} {:<20} {:>7} rating {:.1}{}",
            star,
            spot.name,
            label,
            spot.rating_or_zero(),
            deal
        );
    }
    println!();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Spot Browsing Example\n");

    let remote = Arc::new(InMemoryBookmarks::default());
    let store = BookmarkStore::new(remote, ActorId::generate());
    println!("Browsing as actor {}\n", store.actor());

    let mut browser = SpotBrowser::new(store);
    browser.set_spots(sample_spots());
    browser.set_deals(vec![
        Deal::new("d1", "s4", true, "Free dumplings"),
        Deal::new("d2", "s2", false, "Expired latte deal"),
    ]);

    browser.refresh_bookmarks().await;
    print_list("Recommended (no location yet)", &browser);

    let location = browser
        .acquire_location(&StaticLocation(GpsPoint::new(37.5658, 126.9751)))
        .await;
    println!("Location: {:?}\n", location);

    browser.set_sort(SortOption::Distance);
    print_list("Nearest first", &browser);

    // Bookmark the cafe; the flag is visible before the remote answers
    let pending = browser.toggle_bookmark("s2");
    println!("Optimistic flag for s2: {}", browser.is_bookmarked("s2"));
    let confirmed = pending.await?;
    println!("Confirmed flag for s2: {}\n", confirmed);

    browser.set_filter(SpotFilter::category("카페"));
    browser.refresh_bookmarks().await;
    print_list("Cafes", &browser);

    browser.set_filter(SpotFilter::deals_only());
    browser.refresh_bookmarks().await;
    print_list("Deals only", &browser);

    match browser.receive_coupon("s4")? {
        Some(deal) => println!("Received coupon '{}'", deal.title),
        None => println!("No coupon for s4"),
    }
    if let Err(e) = browser.receive_coupon("s4") {
        println!("Second attempt: {}", e);
    }

    if let Some(cafe) = browser.spots().iter().find(|s| s.id == "s2") {
        let mut cursor = ImageCursor::for_spot(cafe);
        cursor.next();
        cursor.next();
        println!("\nImage after two swipes: {:?}", cursor.current(cafe));
    }

    Ok(())
}
