//! Fetch spots from a running backend and resolve their bookmark flags.
//!
//! Point `SPOT_API_URL` at the backend origin (defaults to http://localhost:3001).
//! Run with: cargo run --example live_bookmarks --features http

use std::sync::Arc;
use std::time::Instant;

use spot_finder::{ActorId, ApiConfig, BookmarkStore, SpotApiClient, SpotBrowser};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ApiConfig::from_env();
    println!("Live Bookmarks Example");
    println!("======================");
    println!("API: {}\n", config.base_url);

    let client = Arc::new(SpotApiClient::new(&config)?);

    let start = Instant::now();
    let spots = client.fetch_spots().await?;
    let deals = client.fetch_active_deals().await?;
    println!(
        "Fetched {} spots and {} active deals in {:?}\n",
        spots.len(),
        deals.len(),
        start.elapsed()
    );

    let actor = match std::env::args().nth(1) {
        Some(id) => ActorId::new(id),
        None => ActorId::generate(),
    };
    let store = BookmarkStore::new(client, actor);
    let mut updates = store.subscribe();

    let mut browser = SpotBrowser::new(store);
    browser.set_spots(spots);
    browser.set_deals(deals);

    let start = Instant::now();
    browser.refresh_bookmarks().await;
    println!("Resolved bookmarks in {:?}", start.elapsed());

    let snapshot = updates.borrow_and_update().clone();
    let bookmarked = snapshot.flags.values().filter(|flag| **flag).count();
    println!(
        "Snapshot v{}: {} known flags, {} bookmarked\n",
        snapshot.version,
        snapshot.flags.len(),
        bookmarked
    );

    for spot in browser.visible_spots().iter().take(10) {
        println!(
            "  {} {} ({})",
            if browser.is_bookmarked(&spot.id) { "*" } else { " " },
            spot.name,
            spot.category.as_str()
        );
    }

    Ok(())
}
