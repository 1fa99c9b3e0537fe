//! YouTube Stream Resolver Core Library
//!
//! Turns a video ID or URL into a set of directly downloadable streams and
//! walks playlists page by page.
//!
//! # Overview
//!
//! This crate provides:
//! - A rate-limited HTTP page fetcher behind the [`PageFetcher`] trait, with
//!   retry and backoff for transient failures
//! - A watch page extractor producing a [`VideoDescriptor`]
//! - A cipher resolver that recovers the player script's signature
//!   transform structurally and caches it per script version
//! - An immutable, chainable [`StreamQuery`] over the resolved streams
//! - A lazy [`PlaylistWalker`] following continuation tokens
//!
//! # Example
//!
//! ```no_run
//! use tubescrape_core::{Result, TubeScraper};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let scraper = TubeScraper::new()?;
//!
//!     // Resolve and query the streams of one video
//!     let streams = scraper.streams("https://www.youtube.com/watch?v=9bZkp7q19f0").await?;
//!     for stream in streams.filter_by([("progressive", true)])?.order_by_name("resolution")?.desc().iter() {
//!         println!("{}", stream);
//!     }
//!
//!     // Walk a playlist
//!     let mut playlist = scraper.playlist("PLFgquLnL59alCl_2TQvOiD5Vgm1hCaGSI")?;
//!     while let Some(video_id) = playlist.next().await? {
//!         println!("{}", video_id);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Stream URLs
//!
//! Resolved URLs carry an `expire` parameter (see [`Stream::expiration`])
//! and stop working afterwards, typically within hours. Do not cache them
//! long-term.

pub mod catalog;
pub mod cipher;
mod client;
mod error;
pub mod itags;
pub mod parser;
pub mod playlist;
pub mod query;
mod scraper;
mod stream;
mod types;
pub mod url;

#[cfg(test)]
mod test_support;

// Re-export client types
pub use client::{ClientConfig, PageFetcher, RateLimiter, RetryPolicy, TubeClient, fetch_with_retry};

// Re-export error types
pub use error::{Result, TubeError};

// Re-export pipeline components
pub use catalog::StreamCatalog;
pub use cipher::{CipherResolver, ProgramCache, TransformOp, TransformProgram};
pub use playlist::{PlaylistCursor, PlaylistWalker, WalkState};
pub use query::{Filter, FilterSet, FilterValue, OrderKey, StreamQuery};

// Re-export main scraper API
pub use scraper::TubeScraper;

// Re-export data types
pub use stream::Stream;
pub use types::{Availability, CipherPayload, DroppedFormat, FormatSource, PlayerScriptRef, RawFormat, VideoDescriptor};

// Re-export URL helper functions for convenience
pub use url::{build_playlist_url, build_watch_url, extract_playlist_id, extract_video_id};
