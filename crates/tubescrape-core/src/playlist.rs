//! Playlist walking
//!
//! A playlist is fetched one page at a time: the first page comes from the
//! playlist URL, every later page from a continuation token handed out by
//! the page before it. Page fetches are strictly sequential.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::{PageFetcher, RetryPolicy, fetch_with_retry};
use crate::error::Result;
use crate::parser::{PlaylistPage, parse_continuation_page, parse_playlist_page};
use crate::url::{build_continuation_url, build_playlist_url, extract_playlist_id};

/// Where a walk currently is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WalkState {
    /// Nothing fetched yet
    #[default]
    Start,
    /// First page fetched and a continuation token is pending
    Paginating,
    /// Last page fetched
    Exhausted,
}

/// Position of a walk: next token plus the IDs already yielded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistCursor {
    playlist_id: String,
    state: WalkState,
    continuation: Option<String>,
    seen: HashSet<String>,
}

impl PlaylistCursor {
    fn new(playlist_id: String) -> Self {
        Self {
            playlist_id,
            ..Self::default()
        }
    }

    pub fn playlist_id(&self) -> &str {
        &self.playlist_id
    }

    pub fn state(&self) -> WalkState {
        self.state
    }

    pub fn continuation(&self) -> Option<&str> {
        self.continuation.as_deref()
    }

    /// Number of distinct IDs yielded so far
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Moves to the next state given the token of the page just parsed
    fn advance(&mut self, next: Option<String>) {
        let repeated = next.is_some() && next == self.continuation;
        if repeated {
            warn!(playlist_id = %self.playlist_id, "continuation token repeated, stopping");
        }
        match next {
            Some(token) if !repeated => {
                self.continuation = Some(token);
                self.state = WalkState::Paginating;
            }
            _ => {
                self.continuation = None;
                self.state = WalkState::Exhausted;
            }
        }
    }
}

/// Lazy sequence of a playlist's video IDs
///
/// Walks can be restarted from the beginning but not resumed from an
/// arbitrary page. With deduplication on (the default) every ID is yielded
/// at most once per walk, which hides entries repeated across page
/// boundaries.
pub struct PlaylistWalker {
    fetcher: Arc<dyn PageFetcher>,
    retry: RetryPolicy,
    dedup: bool,
    cursor: PlaylistCursor,
    buffer: VecDeque<String>,
    title: Option<String>,
    last_updated: Option<NaiveDate>,
}

impl PlaylistWalker {
    /// Creates a walker for a playlist ID or any URL with a `list=` parameter
    ///
    /// # Errors
    /// `InvalidId` / `InvalidUrl` if no playlist ID can be extracted
    pub fn new(fetcher: Arc<dyn PageFetcher>, playlist: &str, retry: RetryPolicy) -> Result<Self> {
        let playlist_id = extract_playlist_id(playlist)?;
        Ok(Self {
            fetcher,
            retry,
            dedup: true,
            cursor: PlaylistCursor::new(playlist_id),
            buffer: VecDeque::new(),
            title: None,
            last_updated: None,
        })
    }

    /// Enables or disables skipping IDs already yielded by this walk
    pub fn with_dedup(mut self, dedup: bool) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn playlist_id(&self) -> &str {
        self.cursor.playlist_id()
    }

    pub fn playlist_url(&self) -> String {
        build_playlist_url(self.cursor.playlist_id())
    }

    pub fn state(&self) -> WalkState {
        self.cursor.state()
    }

    pub fn cursor(&self) -> &PlaylistCursor {
        &self.cursor
    }

    /// Playlist title, known once the first page is fetched
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Date of the last playlist update, known once the first page is fetched
    pub fn last_updated(&self) -> Option<NaiveDate> {
        self.last_updated
    }

    /// Forgets all progress; the next call starts from the first page
    pub fn restart(&mut self) {
        debug!(playlist_id = %self.cursor.playlist_id, "restarting playlist walk");
        self.cursor = PlaylistCursor::new(std::mem::take(&mut self.cursor.playlist_id));
        self.buffer.clear();
        self.title = None;
        self.last_updated = None;
    }

    fn take_new_ids(&mut self, page: PlaylistPage) -> Vec<String> {
        if !self.dedup {
            return page.video_ids;
        }
        page.video_ids
            .into_iter()
            .filter(|id| self.cursor.seen.insert(id.clone()))
            .collect()
    }

    /// Fetches the next page and returns its (new) video IDs
    ///
    /// Returns `Ok(None)` once the walk is exhausted. On error the cursor
    /// is left unchanged, so calling again retries the same page.
    ///
    /// # Errors
    /// Fetch errors after retries, or `MalformedPage` for unparseable pages
    pub async fn next_page(&mut self) -> Result<Option<Vec<String>>> {
        let page = match (self.cursor.state, self.cursor.continuation.clone()) {
            (WalkState::Exhausted, _) | (WalkState::Paginating, None) => {
                self.cursor.state = WalkState::Exhausted;
                return Ok(None);
            }
            (WalkState::Start, _) => {
                let url = self.playlist_url();
                info!(playlist_id = %self.cursor.playlist_id, "fetching first playlist page");
                let html = fetch_with_retry(self.fetcher.as_ref(), &url, self.retry).await?;
                let page = parse_playlist_page(&html)?;
                self.title = page.title.clone();
                self.last_updated = page.last_updated;
                page
            }
            (WalkState::Paginating, Some(token)) => {
                let url = build_continuation_url(&token);
                debug!(playlist_id = %self.cursor.playlist_id, "fetching continuation page");
                let body = fetch_with_retry(self.fetcher.as_ref(), &url, self.retry).await?;
                parse_continuation_page(&body)?
            }
        };

        let next = page.continuation.clone();
        let total = page.video_ids.len();
        let ids = self.take_new_ids(page);
        if ids.len() < total {
            debug!(skipped = total - ids.len(), "skipped repeated playlist entries");
        }
        self.cursor.advance(next);
        debug!(count = ids.len(), state = ?self.cursor.state, "playlist page parsed");
        Ok(Some(ids))
    }

    /// Next video ID, fetching pages as needed
    ///
    /// # Errors
    /// See [`PlaylistWalker::next_page`]
    pub async fn next(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(id) = self.buffer.pop_front() {
                return Ok(Some(id));
            }
            match self.next_page().await? {
                Some(ids) => self.buffer.extend(ids),
                None => return Ok(None),
            }
        }
    }

    /// Every remaining video ID of the walk
    ///
    /// # Errors
    /// See [`PlaylistWalker::next_page`]
    pub async fn collect_all(&mut self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.buffer.drain(..).collect();
        while let Some(page) = self.next_page().await? {
            ids.extend(page);
        }
        Ok(ids)
    }

    /// Turns the walker into an async stream of IDs; the stream ends after
    /// the first error
    pub fn into_stream(self) -> impl futures::Stream<Item = Result<String>> {
        futures::stream::unfold(Some(self), |walker| async move {
            let mut walker = walker?;
            match walker.next().await {
                Ok(Some(id)) => Some((Ok(id), Some(walker))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}

impl std::fmt::Debug for PlaylistWalker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaylistWalker")
            .field("cursor", &self.cursor)
            .field("dedup", &self.dedup)
            .field("buffered", &self.buffer.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TubeError;
    use crate::parser::playlist::tests::{continuation_page, first_page};
    use crate::test_support::StaticFetcher;
    use futures::StreamExt;

    const PLAYLIST_ID: &str = "PLtest123";

    /// Three pages; page 2's last ID repeats as page 3's first
    fn three_page_fetcher() -> StaticFetcher {
        StaticFetcher::new()
            .with_page(
                build_playlist_url(PLAYLIST_ID),
                first_page(&["aaaaaaaaaaa", "bbbbbbbbbbb"], Some("TOKEN1")),
            )
            .with_page(
                build_continuation_url("TOKEN1"),
                continuation_page(&["ccccccccccc", "ddddddddddd"], Some("TOKEN2")),
            )
            .with_page(
                build_continuation_url("TOKEN2"),
                continuation_page(&["ddddddddddd", "eeeeeeeeeee"], None),
            )
    }

    fn walker(fetcher: Arc<StaticFetcher>) -> PlaylistWalker {
        PlaylistWalker::new(fetcher, PLAYLIST_ID, RetryPolicy::none()).unwrap()
    }

    #[tokio::test]
    async fn test_walk_dedups_page_boundary() {
        let fetcher = Arc::new(three_page_fetcher());
        let mut walker = walker(fetcher.clone());

        let ids = walker.collect_all().await.unwrap();
        assert_eq!(
            ids,
            vec!["aaaaaaaaaaa", "bbbbbbbbbbb", "ccccccccccc", "ddddddddddd", "eeeeeeeeeee"]
        );
        assert_eq!(walker.state(), WalkState::Exhausted);
        assert_eq!(walker.cursor().seen_count(), 5);
        assert_eq!(fetcher.total_calls(), 3);
    }

    #[tokio::test]
    async fn test_walk_without_dedup_keeps_repeats() {
        let fetcher = Arc::new(three_page_fetcher());
        let mut walker = walker(fetcher).with_dedup(false);

        let ids = walker.collect_all().await.unwrap();
        assert_eq!(ids.len(), 6);
        assert_eq!(ids[3], ids[4]);
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let fetcher = Arc::new(three_page_fetcher());
        let mut walker = walker(fetcher);
        assert_eq!(walker.state(), WalkState::Start);

        walker.next_page().await.unwrap();
        assert_eq!(walker.state(), WalkState::Paginating);
        assert_eq!(walker.cursor().continuation(), Some("TOKEN1"));
        assert_eq!(walker.title(), Some("Test Playlist"));
        assert_eq!(walker.last_updated(), NaiveDate::from_ymd_opt(2024, 3, 3));

        walker.next_page().await.unwrap();
        assert_eq!(walker.cursor().continuation(), Some("TOKEN2"));

        let last = walker.next_page().await.unwrap().unwrap();
        assert_eq!(last, vec!["eeeeeeeeeee"]);
        assert_eq!(walker.state(), WalkState::Exhausted);
        assert_eq!(walker.next_page().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_next_is_lazy() {
        let fetcher = Arc::new(three_page_fetcher());
        let mut walker = walker(fetcher.clone());

        assert_eq!(walker.next().await.unwrap().as_deref(), Some("aaaaaaaaaaa"));
        assert_eq!(walker.next().await.unwrap().as_deref(), Some("bbbbbbbbbbb"));
        assert_eq!(fetcher.total_calls(), 1);

        assert_eq!(walker.next().await.unwrap().as_deref(), Some("ccccccccccc"));
        assert_eq!(fetcher.total_calls(), 2);
    }

    #[tokio::test]
    async fn test_restart_walks_from_scratch() {
        let fetcher = Arc::new(three_page_fetcher());
        let mut walker = walker(fetcher.clone());

        let first = walker.collect_all().await.unwrap();
        walker.restart();
        assert_eq!(walker.state(), WalkState::Start);
        assert_eq!(walker.title(), None);

        let second = walker.collect_all().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(fetcher.total_calls(), 6);
    }

    #[tokio::test]
    async fn test_into_stream() {
        let fetcher = Arc::new(three_page_fetcher());
        let ids: Vec<String> = walker(fetcher)
            .into_stream()
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(ids.len(), 5);
    }

    #[tokio::test]
    async fn test_error_leaves_cursor_for_retry() {
        let fetcher = Arc::new(three_page_fetcher());
        let continuation = build_continuation_url("TOKEN1");
        fetcher.fail_transiently(&continuation, 1);
        let mut walker = walker(fetcher.clone());

        walker.next_page().await.unwrap();
        let err = walker.next_page().await.unwrap_err();
        assert!(matches!(err, TubeError::TransientNetwork(_)));
        assert_eq!(walker.state(), WalkState::Paginating);

        let page = walker.next_page().await.unwrap().unwrap();
        assert_eq!(page, vec!["ccccccccccc", "ddddddddddd"]);
        assert_eq!(fetcher.calls(&continuation), 2);
    }

    #[tokio::test]
    async fn test_stream_ends_after_error() {
        let fetcher = Arc::new(StaticFetcher::new());
        let results: Vec<Result<String>> = walker(fetcher).into_stream().collect().await;
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(TubeError::HttpStatus { status: 404, .. })));
    }

    #[tokio::test]
    async fn test_repeated_token_stops_walk() {
        let fetcher = Arc::new(
            StaticFetcher::new()
                .with_page(
                    build_playlist_url(PLAYLIST_ID),
                    first_page(&["aaaaaaaaaaa"], Some("LOOP")),
                )
                .with_page(
                    build_continuation_url("LOOP"),
                    continuation_page(&["bbbbbbbbbbb"], Some("LOOP")),
                ),
        );
        let mut walker = walker(fetcher.clone());

        let ids = walker.collect_all().await.unwrap();
        assert_eq!(ids, vec!["aaaaaaaaaaa", "bbbbbbbbbbb"]);
        assert_eq!(fetcher.total_calls(), 2);
    }

    #[test]
    fn test_accepts_playlist_url() {
        let fetcher = Arc::new(StaticFetcher::new());
        let walker = PlaylistWalker::new(
            fetcher,
            "https://www.youtube.com/playlist?list=PLtest123",
            RetryPolicy::none(),
        )
        .unwrap();
        assert_eq!(walker.playlist_id(), PLAYLIST_ID);
        assert_eq!(walker.playlist_url(), "https://www.youtube.com/playlist?list=PLtest123");
    }
}
