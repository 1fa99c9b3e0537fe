//! Debug script to inspect a watch page and its player script reference
//!
//! Run with: cargo run --example debug_watch_page -p tubescrape-core -- <video id or url>

use tubescrape_core::{PageFetcher, TubeClient, build_watch_url, extract_video_id};
use tubescrape_core::parser::{find_player_script, parse_watch_page};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let input = std::env::args().nth(1).unwrap_or_else(|| "9bZkp7q19f0".to_string());
    let video_id = extract_video_id(&input)?;
    let client = TubeClient::new()?;

    println!("Fetching watch page for {}...\n", video_id);
    let html = client.fetch(&build_watch_url(&video_id)).await?;

    // Save HTML to file for inspection
    std::fs::write("debug_watch.html", &html)?;
    println!("HTML saved to debug_watch.html");

    match find_player_script(&html) {
        Some(script) => println!("Player script: {}", script.url()),
        None => println!("Player script: not found"),
    }

    let descriptor = parse_watch_page(&html, &video_id)?;
    println!("Title: {}", descriptor.title);
    println!("Availability: {}", descriptor.availability);
    println!(
        "Formats: {} ({} ciphered)",
        descriptor.formats.len(),
        descriptor.ciphered_count()
    );
    for format in &descriptor.formats {
        println!(
            "   itag {:>3}  {:<11} {:<6} {}",
            format.itag,
            format.mime_type,
            format.resolution.as_deref().or(format.abr.as_deref()).unwrap_or("-"),
            if format.source.is_ciphered() { "ciphered" } else { "direct" }
        );
    }

    Ok(())
}
