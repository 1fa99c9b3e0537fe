//! Stream catalog
//!
//! Turns a video descriptor's format records into playable streams,
//! deciphering protected URLs on the way. A format that cannot be resolved
//! is dropped and reported, and the build only fails when nothing is left.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::cipher::CipherResolver;
use crate::error::{Result, TubeError};
use crate::query::StreamQuery;
use crate::stream::Stream;
pub use crate::types::DroppedFormat;
use crate::types::{FormatSource, RawFormat, VideoDescriptor};

/// Playable streams of one video
#[derive(Debug, Clone)]
pub struct StreamCatalog {
    video_id: String,
    title: String,
    streams: Vec<Arc<Stream>>,
    dropped: Vec<DroppedFormat>,
}

async fn resolve_url(format: &RawFormat, resolver: &CipherResolver) -> Result<String> {
    match &format.source {
        FormatSource::Direct(url) => Ok(url.clone()),
        FormatSource::Ciphered(payload) => resolver.resolve(payload).await,
    }
}

impl StreamCatalog {
    /// Resolves every format of `descriptor`
    ///
    /// Ciphered formats are resolved concurrently; formats sharing a player
    /// script share one script fetch. For a repeated itag the first record
    /// that resolves is kept, so a failing record does not hide a later
    /// working one.
    ///
    /// # Errors
    /// `NoPlayableStreams` if no format could be resolved, carrying the
    /// first resolution error as its source.
    pub async fn build(descriptor: &VideoDescriptor, resolver: &CipherResolver) -> Result<Self> {
        let mut dropped = descriptor.skipped.clone();
        let urls = join_all(
            descriptor
                .formats
                .iter()
                .map(|format| resolve_url(format, resolver)),
        )
        .await;

        let mut kept = HashSet::new();
        let mut streams = Vec::with_capacity(descriptor.formats.len());
        let mut first_error = None;
        for (format, url) in descriptor.formats.iter().zip(urls) {
            if kept.contains(&format.itag) {
                debug!(itag = format.itag, "skipping repeated itag");
                dropped.push(DroppedFormat {
                    itag: format.itag,
                    reason: "duplicate itag".to_string(),
                });
                continue;
            }
            match url {
                Ok(url) => {
                    kept.insert(format.itag);
                    streams.push(Arc::new(Stream::resolved(format.clone(), url, &descriptor.title)));
                }
                Err(e) => {
                    warn!(video_id = %descriptor.video_id, itag = format.itag, error = %e, "dropping format");
                    dropped.push(DroppedFormat {
                        itag: format.itag,
                        reason: e.to_string(),
                    });
                    first_error.get_or_insert(e);
                }
            }
        }

        if streams.is_empty() {
            return Err(TubeError::NoPlayableStreams {
                video_id: descriptor.video_id.clone(),
                dropped: dropped.len(),
                cause: first_error.map(Box::new),
            });
        }

        debug!(
            video_id = %descriptor.video_id,
            streams = streams.len(),
            dropped = dropped.len(),
            "built stream catalog"
        );

        Ok(Self {
            video_id: descriptor.video_id.clone(),
            title: descriptor.title.clone(),
            streams,
            dropped,
        })
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn streams(&self) -> &[Arc<Stream>] {
        &self.streams
    }

    /// Formats that were left out: records rejected by the page parser
    /// first, then resolution failures and repeated itags in page order
    pub fn dropped(&self) -> &[DroppedFormat] {
        &self.dropped
    }

    pub fn dropped_count(&self) -> usize {
        self.dropped.len()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Query view over every stream, in page order
    pub fn query(&self) -> StreamQuery {
        StreamQuery::new(self.streams.clone())
    }
}
