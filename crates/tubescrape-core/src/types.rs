//! Core data types for the resolution pipeline
//!
//! Contains the video descriptor produced by page extraction and the raw
//! format records it carries.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::url::BASE_URL;

/// Playability state reported by the watch page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Ok,
    Private,
    AgeRestricted,
    Removed,
    RegionBlocked,
    LiveNow,
}

impl Availability {
    /// Whether streams can be resolved for a video in this state
    pub fn is_playable(self) -> bool {
        matches!(self, Availability::Ok | Availability::LiveNow)
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Availability::Ok => "ok",
            Availability::Private => "private",
            Availability::AgeRestricted => "age restricted",
            Availability::Removed => "removed",
            Availability::RegionBlocked => "region blocked",
            Availability::LiveNow => "live now",
        };
        f.write_str(text)
    }
}

/// Versioned path of the player script a page's ciphers depend on
/// (e.g. "/s/player/4fbb4d5b/player_ias.vflset/en_US/base.js")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerScriptRef(String);

impl PlayerScriptRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Absolute URL of the script
    pub fn url(&self) -> String {
        if self.0.starts_with("//") {
            format!("https:{}", self.0)
        } else if self.0.starts_with('/') {
            format!("{}{}", BASE_URL, self.0)
        } else {
            self.0.clone()
        }
    }
}

impl fmt::Display for PlayerScriptRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scrambled signature plus everything needed to turn it into a URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherPayload {
    /// Scrambled signature (`s` in the cipher query string)
    pub signature: String,

    /// Query parameter the deciphered signature is sent as (`sp`, default "signature")
    pub signature_param: String,

    /// Stream URL without the signature
    pub base_url: String,

    /// Player script whose transform unscrambles `signature`
    pub player_script: PlayerScriptRef,
}

/// Where a format's bytes come from
///
/// Exactly one of a direct URL or a cipher payload is present per format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatSource {
    Direct(String),
    Ciphered(CipherPayload),
}

impl FormatSource {
    pub fn is_ciphered(&self) -> bool {
        matches!(self, FormatSource::Ciphered(_))
    }
}

/// One format record from the page's streaming data, before cipher resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFormat {
    /// Stream encoding profile identifier
    pub itag: u32,

    /// Mime type without parameters (e.g. "video/mp4")
    pub mime_type: String,

    /// Top-level media type: "video" or "audio"
    pub kind: String,

    /// Container subtype (e.g. "mp4", "webm")
    pub subtype: String,

    /// Codec list as declared in the mime type
    pub codecs: Vec<String>,

    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,

    /// Vertical resolution label (e.g. "720p")
    pub resolution: Option<String>,

    pub fps: Option<u32>,

    /// Average audio bitrate label (e.g. "128kbps")
    pub abr: Option<String>,

    /// Peak bitrate in bits per second
    pub bitrate: Option<u64>,

    pub content_length: Option<u64>,
    pub approx_duration_ms: Option<u64>,

    /// Served as on-the-fly segments rather than a single file
    pub is_otf: bool,
    pub is_3d: bool,
    pub is_hdr: bool,
    pub is_live: bool,

    pub source: FormatSource,
}

/// A format left out of the stream set, with the reason
///
/// `itag` is 0 when the record did not carry one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedFormat {
    pub itag: u32,
    pub reason: String,
}

/// Structured description of a video, extracted from its watch page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDescriptor {
    /// 11-character video ID
    pub video_id: String,

    pub title: String,

    pub author: Option<String>,

    pub length_seconds: Option<u64>,

    pub availability: Availability,

    /// Format records in page order (progressive first, then adaptive)
    pub formats: Vec<RawFormat>,

    /// Records rejected while parsing, in page order
    #[serde(default)]
    pub skipped: Vec<DroppedFormat>,

    /// Player script the ciphered formats depend on
    pub player_script: Option<PlayerScriptRef>,

    /// Lifetime of the streaming URLs as announced by the page
    pub expires_in_seconds: Option<u64>,
}

impl VideoDescriptor {
    /// Number of formats whose URL needs cipher resolution
    pub fn ciphered_count(&self) -> usize {
        self.formats.iter().filter(|f| f.source.is_ciphered()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_script_url_relative() {
        let script = PlayerScriptRef::new("/s/player/4fbb4d5b/player_ias.vflset/en_US/base.js");
        assert_eq!(
            script.url(),
            "https://www.youtube.com/s/player/4fbb4d5b/player_ias.vflset/en_US/base.js"
        );
    }

    #[test]
    fn test_player_script_url_protocol_relative() {
        let script = PlayerScriptRef::new("//s.ytimg.com/yts/jsbin/player-vfl.js");
        assert_eq!(script.url(), "https://s.ytimg.com/yts/jsbin/player-vfl.js");
    }

    #[test]
    fn test_player_script_url_absolute() {
        let script = PlayerScriptRef::new("https://cdn.example/base.js");
        assert_eq!(script.url(), "https://cdn.example/base.js");
    }

    #[test]
    fn test_availability_display_and_playable() {
        assert_eq!(Availability::RegionBlocked.to_string(), "region blocked");
        assert!(Availability::Ok.is_playable());
        assert!(Availability::LiveNow.is_playable());
        assert!(!Availability::Private.is_playable());
        assert!(!Availability::Removed.is_playable());
    }

    #[test]
    fn test_descriptor_serialization() {
        let descriptor = VideoDescriptor {
            video_id: "9bZkp7q19f0".to_string(),
            title: "Test Video".to_string(),
            author: None,
            length_seconds: Some(253),
            availability: Availability::Ok,
            formats: vec![],
            skipped: vec![DroppedFormat {
                itag: 17,
                reason: "no codecs".to_string(),
            }],
            player_script: Some(PlayerScriptRef::new("/s/player/abc/base.js")),
            expires_in_seconds: None,
        };

        let json = serde_json::to_string(&descriptor).expect("Serialization should succeed");
        assert!(json.contains("\"availability\":\"ok\""));
        assert!(json.contains("\"player_script\":\"/s/player/abc/base.js\""));
        let deserialized: VideoDescriptor =
            serde_json::from_str(&json).expect("Deserialization should succeed");
        assert_eq!(descriptor, deserialized);
    }
}
