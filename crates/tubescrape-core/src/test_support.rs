//! In-memory page fetcher for tests

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::client::PageFetcher;
use crate::error::{Result, TubeError};

/// Serves canned bodies by URL, counts calls, and can inject failures
#[derive(Default)]
pub(crate) struct StaticFetcher {
    pages: HashMap<String, String>,
    lengths: HashMap<String, u64>,
    delay: Option<Duration>,
    calls: Mutex<HashMap<String, usize>>,
    length_calls: Mutex<HashMap<String, usize>>,
    transient_failures: Mutex<HashMap<String, usize>>,
}

impl StaticFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_page(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.pages.insert(url.into(), body.into());
        self
    }

    pub(crate) fn with_content_length(mut self, url: impl Into<String>, length: u64) -> Self {
        self.lengths.insert(url.into(), length);
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Makes the next `times` fetches of `url` fail with a transient error
    pub(crate) fn fail_transiently(&self, url: &str, times: usize) {
        self.transient_failures
            .lock()
            .unwrap()
            .insert(url.to_string(), times);
    }

    pub(crate) fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub(crate) fn length_calls(&self, url: &str) -> usize {
        self.length_calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        *self.calls.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        {
            let mut failures = self.transient_failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(url)
                && *remaining > 0
            {
                *remaining -= 1;
                return Err(TubeError::TransientNetwork("connection reset".to_string()));
            }
        }

        self.pages.get(url).cloned().ok_or(TubeError::HttpStatus {
            status: 404,
            url: url.to_string(),
        })
    }

    async fn content_length(&self, url: &str) -> Result<Option<u64>> {
        *self
            .length_calls
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_insert(0) += 1;
        Ok(self.lengths.get(url).copied())
    }
}
