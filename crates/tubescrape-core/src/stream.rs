//! Resolved media stream entity

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::client::PageFetcher;
use crate::error::{Result, TubeError};
use crate::types::RawFormat;

/// A resolved, directly downloadable media stream
///
/// Built only from a [`RawFormat`] whose URL is already playable, so a
/// `Stream` never carries a scrambled signature. Carries a video codec,
/// an audio codec, or both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stream {
    itag: u32,
    url: String,
    mime_type: String,
    #[serde(rename = "type")]
    kind: String,
    subtype: String,
    codecs: Vec<String>,
    video_codec: Option<String>,
    audio_codec: Option<String>,
    resolution: Option<String>,
    fps: Option<u32>,
    abr: Option<String>,
    bitrate: Option<u64>,
    content_length: Option<u64>,
    approx_duration_ms: Option<u64>,
    is_otf: bool,
    is_3d: bool,
    is_hdr: bool,
    is_live: bool,
    progressive: bool,
    adaptive: bool,
    title: String,
}

impl Stream {
    /// Wraps a format together with its playable URL
    pub(crate) fn resolved(format: RawFormat, url: String, title: &str) -> Self {
        let progressive = format.video_codec.is_some() && format.audio_codec.is_some();
        let adaptive = format.video_codec.is_some() != format.audio_codec.is_some();
        Self {
            itag: format.itag,
            url,
            mime_type: format.mime_type,
            kind: format.kind,
            subtype: format.subtype,
            codecs: format.codecs,
            video_codec: format.video_codec,
            audio_codec: format.audio_codec,
            resolution: format.resolution,
            fps: format.fps,
            abr: format.abr,
            bitrate: format.bitrate,
            content_length: format.content_length,
            approx_duration_ms: format.approx_duration_ms,
            is_otf: format.is_otf,
            is_3d: format.is_3d,
            is_hdr: format.is_hdr,
            is_live: format.is_live,
            progressive,
            adaptive,
            title: title.to_string(),
        }
    }

    pub fn itag(&self) -> u32 {
        self.itag
    }

    /// Playable URL, signature included
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// "video" or "audio"
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    pub fn codecs(&self) -> &[String] {
        &self.codecs
    }

    pub fn video_codec(&self) -> Option<&str> {
        self.video_codec.as_deref()
    }

    pub fn audio_codec(&self) -> Option<&str> {
        self.audio_codec.as_deref()
    }

    pub fn resolution(&self) -> Option<&str> {
        self.resolution.as_deref()
    }

    /// Numeric vertical resolution ("720p" -> 720)
    pub fn resolution_value(&self) -> Option<u32> {
        self.resolution.as_deref().and_then(leading_number)
    }

    pub fn fps(&self) -> Option<u32> {
        self.fps
    }

    pub fn abr(&self) -> Option<&str> {
        self.abr.as_deref()
    }

    /// Numeric audio bitrate in kbps ("128kbps" -> 128)
    pub fn abr_value(&self) -> Option<u32> {
        self.abr.as_deref().and_then(leading_number)
    }

    pub fn bitrate(&self) -> Option<u64> {
        self.bitrate
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn approx_duration_ms(&self) -> Option<u64> {
        self.approx_duration_ms
    }

    pub fn is_otf(&self) -> bool {
        self.is_otf
    }

    pub fn is_3d(&self) -> bool {
        self.is_3d
    }

    pub fn is_hdr(&self) -> bool {
        self.is_hdr
    }

    pub fn is_live(&self) -> bool {
        self.is_live
    }

    /// Single file carrying both audio and video
    pub fn is_progressive(&self) -> bool {
        self.progressive
    }

    /// DASH stream carrying exactly one of audio or video
    pub fn is_adaptive(&self) -> bool {
        self.adaptive
    }

    pub fn includes_audio_track(&self) -> bool {
        self.audio_codec.is_some()
    }

    pub fn includes_video_track(&self) -> bool {
        self.video_codec.is_some()
    }

    /// Title of the video this stream belongs to
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Size in bytes: the announced content length, otherwise
    /// duration times bitrate
    ///
    /// `None` when the page gave neither, or the estimate overflows.
    pub fn filesize_approx(&self) -> Option<u64> {
        if let Some(length) = self.content_length {
            return Some(length);
        }
        let duration_ms = self.approx_duration_ms?;
        let bitrate = self.bitrate?;
        Some(duration_ms.checked_mul(bitrate)? / 8 / 1000)
    }

    /// Exact size in bytes
    ///
    /// Uses the content length announced by the page, otherwise asks the
    /// server with a HEAD request through `fetcher`.
    ///
    /// # Errors
    /// - `NotFound` if the server does not report a length
    /// - Any fetch error from the HEAD request
    pub async fn filesize(&self, fetcher: &dyn PageFetcher) -> Result<u64> {
        if let Some(length) = self.content_length {
            return Ok(length);
        }
        fetcher
            .content_length(&self.url)
            .await?
            .ok_or_else(|| TubeError::NotFound(format!("content length for itag {}", self.itag)))
    }

    /// [`Stream::filesize_approx`], falling back to [`Stream::filesize`]
    /// when the page gave nothing to estimate from
    pub async fn filesize_or_fetch(&self, fetcher: &dyn PageFetcher) -> Result<u64> {
        match self.filesize_approx() {
            Some(size) => Ok(size),
            None => self.filesize(fetcher).await,
        }
    }

    /// Moment the URL stops working, from its `expire` query parameter
    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        let parsed = url::Url::parse(&self.url).ok()?;
        let expire = parsed
            .query_pairs()
            .find(|(key, _)| key == "expire")
            .and_then(|(_, value)| value.parse::<i64>().ok())?;
        DateTime::from_timestamp(expire, 0)
    }

    /// File name derived from the video title and container subtype
    pub fn default_filename(&self) -> String {
        format!("{}.{}", safe_filename(&self.title), self.subtype)
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Stream: itag=\"{}\" mime_type=\"{}\"", self.itag, self.mime_type)?;
        if self.includes_video_track() {
            write!(
                f,
                " res=\"{}\" fps=\"{}fps\" vcodec=\"{}\"",
                self.resolution.as_deref().unwrap_or("None"),
                self.fps.map(|v| v.to_string()).unwrap_or_else(|| "None".to_string()),
                self.video_codec.as_deref().unwrap_or("None"),
            )?;
            if self.progressive {
                write!(f, " acodec=\"{}\"", self.audio_codec.as_deref().unwrap_or("None"))?;
            }
        } else {
            write!(
                f,
                " abr=\"{}\" acodec=\"{}\"",
                self.abr.as_deref().unwrap_or("None"),
                self.audio_codec.as_deref().unwrap_or("None"),
            )?;
        }
        write!(f, " progressive=\"{}\" type=\"{}\">", self.progressive, self.kind)
    }
}

/// Parses the leading decimal digits of a label like "720p" or "128kbps"
pub(crate) fn leading_number(label: &str) -> Option<u32> {
    let digits: String = label
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Strips characters that are not allowed in file names on common platforms
fn safe_filename(title: &str) -> String {
    const FORBIDDEN: &[char] = &[
        '"', '#', '$', '%', '\'', '*', ',', '.', '/', ':', ';', '<', '>', '?', '\\', '^', '|',
        '~',
    ];
    let cleaned: String = title
        .chars()
        .filter(|c| !c.is_control() && !FORBIDDEN.contains(c))
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated: String = collapsed.chars().take(255).collect();
    if truncated.is_empty() {
        "video".to_string()
    } else {
        truncated
    }
}
