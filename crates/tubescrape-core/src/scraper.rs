//! Main scraper API
//!
//! Provides the high-level API tying the fetcher, page parsers, cipher
//! resolver and query engine together.

use std::sync::Arc;

use tracing::info;

use crate::catalog::StreamCatalog;
use crate::cipher::{CipherResolver, ProgramCache};
use crate::client::{ClientConfig, PageFetcher, RetryPolicy, TubeClient, fetch_with_retry};
use crate::error::Result;
use crate::parser::parse_watch_page;
use crate::playlist::PlaylistWalker;
use crate::query::StreamQuery;
use crate::stream::Stream;
use crate::types::VideoDescriptor;
use crate::url::{build_watch_url, extract_video_id};

/// Main scraper API
///
/// Combines a rate-limited page fetcher, the watch page extractor and the
/// cipher resolver to turn a video ID or URL into a queryable set of
/// playable streams. Player script programs are cached per scraper (and
/// shared with any other scraper given the same [`ProgramCache`]).
pub struct TubeScraper {
    fetcher: Arc<dyn PageFetcher>,
    resolver: CipherResolver,
    retry: RetryPolicy,
}

impl TubeScraper {
    /// Create a new scraper with default configuration
    ///
    /// # Errors
    /// Returns error if HTTP client initialization fails
    pub fn new() -> Result<Self> {
        Self::with_config(&ClientConfig::default())
    }

    /// Create a new scraper with custom client configuration
    ///
    /// # Arguments
    /// * `config` - Client and retry configuration
    ///
    /// # Errors
    /// Returns `InvalidConfig` if the configuration cannot produce a client
    pub fn with_config(config: &ClientConfig) -> Result<Self> {
        let client = TubeClient::with_config(config)?;
        Ok(Self::with_fetcher(
            Arc::new(client),
            ProgramCache::new(),
            config.retry_policy(),
        ))
    }

    /// Create a scraper over any page fetcher
    ///
    /// # Arguments
    /// * `fetcher` - Transport used for watch pages, player scripts and playlists
    /// * `cache` - Transform program cache (clone one to share it)
    /// * `retry` - Retry policy for transient fetch failures
    pub fn with_fetcher(fetcher: Arc<dyn PageFetcher>, cache: ProgramCache, retry: RetryPolicy) -> Self {
        let resolver = CipherResolver::new(Arc::clone(&fetcher), cache, retry);
        Self {
            fetcher,
            resolver,
            retry,
        }
    }

    /// Transform program cache used by this scraper
    pub fn cache(&self) -> &ProgramCache {
        self.resolver.cache()
    }

    /// Fetch and parse a video's watch page
    ///
    /// # Arguments
    /// * `video` - Video ID or any watch/share URL
    ///
    /// # Errors
    /// - `InvalidId` if no video ID can be extracted
    /// - `TransientNetwork` / `RateLimited` / `HttpStatus` if fetching fails
    /// - `MalformedPage` if the page layout is not recognized
    /// - `VideoUnavailable` if the video is private, removed or restricted
    ///
    /// # Example
    /// ```no_run
    /// # async fn example() -> tubescrape_core::Result<()> {
    /// use tubescrape_core::TubeScraper;
    /// let scraper = TubeScraper::new()?;
    /// let video = scraper.describe("https://youtu.be/9bZkp7q19f0").await?;
    /// println!("{} ({} formats)", video.title, video.formats.len());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn describe(&self, video: &str) -> Result<VideoDescriptor> {
        let video_id = extract_video_id(video)?;
        let url = build_watch_url(&video_id);
        info!(video_id = %video_id, "fetching watch page");

        let html = fetch_with_retry(self.fetcher.as_ref(), &url, self.retry).await?;
        parse_watch_page(&html, &video_id)
    }

    /// Resolve every playable stream of a video
    ///
    /// # Errors
    /// Everything [`TubeScraper::describe`] returns, plus
    /// `NoPlayableStreams` if no format could be resolved
    pub async fn catalog(&self, video: &str) -> Result<StreamCatalog> {
        let descriptor = self.describe(video).await?;
        StreamCatalog::build(&descriptor, &self.resolver).await
    }

    /// Query view over a video's streams
    ///
    /// # Example
    /// ```no_run
    /// # async fn example() -> tubescrape_core::Result<()> {
    /// use tubescrape_core::TubeScraper;
    /// let scraper = TubeScraper::new()?;
    /// let streams = scraper.streams("9bZkp7q19f0").await?;
    /// if let Some(best) = streams.get_highest_resolution() {
    ///     println!("{}", best.url());
    /// }
    /// let audio = streams.filter_by([("only_audio", true)])?.order_by_name("abr")?.desc();
    /// println!("{} audio streams", audio.len());
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// See [`TubeScraper::catalog`]
    pub async fn streams(&self, video: &str) -> Result<StreamQuery> {
        Ok(self.catalog(video).await?.query())
    }

    /// Size of a stream in bytes
    ///
    /// Estimated from the page data when possible, otherwise read from a
    /// HEAD request for the stream URL.
    ///
    /// # Errors
    /// `NotFound` if neither the page nor the server reports a size, or
    /// the HEAD request's fetch error
    pub async fn filesize(&self, stream: &Stream) -> Result<u64> {
        stream.filesize_or_fetch(self.fetcher.as_ref()).await
    }

    /// Lazy walker over a playlist's video IDs
    ///
    /// # Arguments
    /// * `playlist` - Playlist ID or any URL with a `list=` parameter
    ///
    /// # Errors
    /// `InvalidId` / `InvalidUrl` if no playlist ID can be extracted
    pub fn playlist(&self, playlist: &str) -> Result<PlaylistWalker> {
        PlaylistWalker::new(Arc::clone(&self.fetcher), playlist, self.retry)
    }
}
