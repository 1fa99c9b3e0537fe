//! Watch page parser
//!
//! Extracts the embedded player response and the player script reference
//! from a watch page and builds a [`VideoDescriptor`].

use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Result, TubeError};
use crate::parser::embedded::find_json_after_markers;
use crate::parser::formats::{has_ciphered_records, parse_streaming_data};
use crate::types::{Availability, PlayerScriptRef, VideoDescriptor};

/// Markers that precede the player response object, most current first
const PLAYER_RESPONSE_MARKERS: &[&str] = &[
    "var ytInitialPlayerResponse = ",
    "ytInitialPlayerResponse = ",
    "window[\"ytInitialPlayerResponse\"] = ",
    "ytInitialPlayerResponse=",
];

/// Legacy pages carry the response as a JSON string inside `ytplayer.config.args`
const LEGACY_CONFIG_MARKERS: &[&str] = &["ytplayer.config = ", "ytplayer.config="];

const UNKNOWN_TITLE: &str = "Unknown YouTube Video Title";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PlayabilityStatus {
    status: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct VideoDetails {
    video_id: Option<String>,
    title: Option<String>,
    author: Option<String>,
    length_seconds: Option<String>,
    is_live: Option<bool>,
}

/// Locates the player response object in the page
fn find_player_response(html: &str) -> Option<Value> {
    if let Some((marker, value)) = find_json_after_markers(html, PLAYER_RESPONSE_MARKERS) {
        debug!(marker, "player response located");
        return Some(value);
    }

    let (marker, config) = find_json_after_markers(html, LEGACY_CONFIG_MARKERS)?;
    debug!(marker, "legacy player config located");
    let embedded = config.pointer("/args/player_response")?;
    match embedded {
        Value::String(text) => serde_json::from_str(text).ok(),
        Value::Object(_) => Some(embedded.clone()),
        _ => None,
    }
}

/// Finds the versioned player script path referenced by the page
///
/// # Returns
/// `Some(PlayerScriptRef)` with escaped slashes removed, or `None`
pub fn find_player_script(html: &str) -> Option<PlayerScriptRef> {
    for pattern in [
        r#""jsUrl"\s*:\s*"([^"]+)""#,
        r#""PLAYER_JS_URL"\s*:\s*"([^"]+)""#,
        r#""js"\s*:\s*"([^"]+base\.js)""#,
    ] {
        if let Ok(re) = Regex::new(pattern)
            && let Some(caps) = re.captures(html)
            && let Some(m) = caps.get(1)
        {
            return Some(PlayerScriptRef::new(m.as_str().replace("\\/", "/")));
        }
    }

    let document = Html::parse_document(html);
    let selector = Selector::parse("script[src]").ok()?;
    document
        .select(&selector)
        .filter_map(|script| script.value().attr("src"))
        .find(|src| src.contains("/player") && src.ends_with("base.js"))
        .map(PlayerScriptRef::new)
}

/// Maps the page's playability status onto an availability state
fn classify_playability(status: Option<&str>, reason: Option<&str>, is_live: bool) -> Availability {
    let reason = reason.unwrap_or_default().to_lowercase();
    match status.unwrap_or("OK") {
        "OK" if is_live => Availability::LiveNow,
        "OK" => Availability::Ok,
        "LIVE_STREAM" | "LIVE_STREAM_OFFLINE" => Availability::LiveNow,
        "LOGIN_REQUIRED" if reason.contains("private") => Availability::Private,
        "LOGIN_REQUIRED" | "AGE_CHECK_REQUIRED" | "AGE_VERIFICATION_REQUIRED"
        | "CONTENT_CHECK_REQUIRED" => Availability::AgeRestricted,
        "UNPLAYABLE" if reason.contains("country") || reason.contains("region") => {
            Availability::RegionBlocked
        }
        "UNPLAYABLE" if reason.contains("private") => Availability::Private,
        "UNPLAYABLE" if reason.contains("age") => Availability::AgeRestricted,
        _ => Availability::Removed,
    }
}

/// Title from `<meta name="title">` or `<title>` when the response lacks one
fn fallback_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let meta = Selector::parse(r#"meta[name="title"]"#).ok()?;
    if let Some(content) = document
        .select(&meta)
        .find_map(|el| el.value().attr("content"))
        .filter(|c| !c.trim().is_empty())
    {
        return Some(content.trim().to_string());
    }

    let title = Selector::parse("title").ok()?;
    document
        .select(&title)
        .next()
        .map(|el| el.text().collect::<String>())
        .map(|t| t.trim().trim_end_matches("- YouTube").trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Parses a watch page into a [`VideoDescriptor`]
///
/// # Arguments
/// * `html` - Raw watch page text
/// * `video_id` - ID the page was requested for; used when the page omits it
///
/// # Errors
/// - `MalformedPage` if no recognized player response marker is present,
///   or if the page has ciphered formats but no player script reference
/// - `VideoUnavailable` if the page reports the video as private, removed,
///   age restricted or region blocked
pub fn parse_watch_page(html: &str, video_id: &str) -> Result<VideoDescriptor> {
    let response = find_player_response(html).ok_or_else(|| {
        TubeError::MalformedPage("no recognized player response marker in page".to_string())
    })?;

    let playability: PlayabilityStatus = response
        .get("playabilityStatus")
        .and_then(|v| PlayabilityStatus::deserialize(v).ok())
        .unwrap_or_default();
    let details: VideoDetails = response
        .get("videoDetails")
        .and_then(|v| VideoDetails::deserialize(v).ok())
        .unwrap_or_default();

    let video_id = details
        .video_id
        .clone()
        .unwrap_or_else(|| video_id.to_string());

    let availability = classify_playability(
        playability.status.as_deref(),
        playability.reason.as_deref(),
        details.is_live.unwrap_or(false),
    );

    if !availability.is_playable() {
        info!(%video_id, %availability, "video unavailable");
        return Err(TubeError::VideoUnavailable {
            video_id,
            reason: availability,
            message: playability
                .reason
                .or(playability.status)
                .unwrap_or_default(),
        });
    }

    let player_script = find_player_script(html);
    let streaming_data = response.get("streamingData");
    if player_script.is_none() && streaming_data.is_some_and(has_ciphered_records) {
        return Err(TubeError::MalformedPage(
            "ciphered formats present but no player script reference found".to_string(),
        ));
    }
    let (formats, skipped) = streaming_data
        .map(|data| parse_streaming_data(data, player_script.as_ref()))
        .unwrap_or_default();
    let expires_in_seconds = streaming_data
        .and_then(|data| data.get("expiresInSeconds"))
        .and_then(|v| match v {
            Value::String(s) => s.parse().ok(),
            other => other.as_u64(),
        });

    let title = details
        .title
        .filter(|t| !t.trim().is_empty())
        .or_else(|| fallback_title(html))
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

    debug!(
        %video_id,
        formats = formats.len(),
        skipped = skipped.len(),
        script = ?player_script.as_ref().map(PlayerScriptRef::as_str),
        "parsed watch page"
    );

    Ok(VideoDescriptor {
        video_id,
        title,
        author: details.author,
        length_seconds: details.length_seconds.and_then(|s| s.parse().ok()),
        availability,
        formats,
        skipped,
        player_script,
        expires_in_seconds,
    })
}
