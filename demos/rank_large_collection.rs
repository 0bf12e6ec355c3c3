//! Rank a large synthetic spot collection sequentially and in parallel.
//!
//! Run with: cargo run --example rank_large_collection --features parallel

use spot_finder::{
    rank_spots, rank_spots_parallel, Category, Deal, DealIndex, GpsPoint, SortOption, Spot,
};
use std::time::Instant;

const SPOT_COUNT: usize = 50_000;

fn main() {
    println!("Large Collection Ranking Example\n");

    let spots = synthetic_spots(SPOT_COUNT);
    let deals = DealIndex::new(
        spots
            .iter()
            .step_by(7)
            .enumerate()
            .map(|(i, s)| Deal::new(&format!("deal-{}", i), &s.id, i % 3 != 0, "Discount"))
            .collect(),
    );
    let me = GpsPoint::new(37.5665, 126.9780);

    println!("Created {} spots, {} deals\n", spots.len(), deals.deals().len());

    for sort in [SortOption::Recommended, SortOption::Distance, SortOption::Rating] {
        let start = Instant::now();
        let sequential = rank_spots(&spots, sort, &deals, Some(me));
        let sequential_elapsed = start.elapsed();

        let start = Instant::now();
        let parallel = rank_spots_parallel(&spots, sort, &deals, Some(me));
        let parallel_elapsed = start.elapsed();

        let identical = sequential
            .iter()
            .zip(&parallel)
            .all(|(a, b)| a.id == b.id);

        println!("Sort '{}':", sort);
        println!("  Sequential: {:?}", sequential_elapsed);
        println!("  Parallel:   {:?}", parallel_elapsed);
        println!("  Same order: {}", identical);
        println!(
            "  Top 3: {:?}\n",
            parallel.iter().take(3).map(|s| s.id.as_str()).collect::<Vec<_>>()
        );
    }
}

/// Spots scattered around central Seoul with deterministic pseudo-random metrics.
fn synthetic_spots(count: usize) -> Vec<Spot> {
    let categories = [
        Category::Experience,
        Category::Culture,
        Category::Restaurant,
        Category::Cafe,
    ];

    (0..count)
        .map(|i| {
            let seed = (i as u64).wrapping_mul(2_654_435_761) % 10_000;
            let lat = 37.45 + (seed % 100) as f64 * 0.002;
            let lng = 126.85 + (seed / 100) as f64 * 0.003;
            let category = categories[i % categories.len()];
            let spot = Spot::new(&format!("spot-{}", i), lat, lng, category);
            if i % 5 == 0 {
                spot
            } else {
                spot.with_rating(3.0 + (seed % 20) as f64 / 10.0, (seed % 500) as u32)
            }
        })
        .collect()
}
