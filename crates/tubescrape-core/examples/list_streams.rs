//! Debug script to resolve and list every stream of a video
//!
//! Run with: cargo run --example list_streams -p tubescrape-core -- <video id or url>

use tubescrape_core::TubeScraper;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let input = std::env::args().nth(1).unwrap_or_else(|| "9bZkp7q19f0".to_string());
    let scraper = TubeScraper::new()?;

    println!("Resolving streams for {}...\n", input);
    let catalog = scraper.catalog(&input).await?;

    println!("{} ({} streams, {} dropped)\n", catalog.title(), catalog.len(), catalog.dropped_count());
    let query = catalog.query();
    for stream in query.order_by_name("itag")?.iter() {
        println!("{}", stream);
    }
    for dropped in catalog.dropped() {
        println!("dropped itag {}: {}", dropped.itag, dropped.reason);
    }

    if let Some(best) = query.get_highest_resolution() {
        println!("\nBest progressive: {}", best.default_filename());
        println!("{}", best.url());
        if let Some(expires) = best.expiration() {
            println!("Expires: {}", expires);
        }
    }

    Ok(())
}
