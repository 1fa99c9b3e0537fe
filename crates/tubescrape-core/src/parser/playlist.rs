//! Playlist page parser
//!
//! Pulls video IDs and the continuation token out of the first playlist
//! page (HTML with an embedded `ytInitialData` object) and out of the JSON
//! documents returned for continuation requests.

use chrono::NaiveDate;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::error::{Result, TubeError};
use crate::parser::embedded::find_json_after_markers;

const INITIAL_DATA_MARKERS: &[&str] = &[
    "var ytInitialData = ",
    "window[\"ytInitialData\"] = ",
    "ytInitialData = ",
];

/// Entries and cursor extracted from one playlist page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistPage {
    /// Video IDs in page order (may repeat entries of neighbouring pages)
    pub video_ids: Vec<String>,

    /// Token for the next page; `None` on the last page
    pub continuation: Option<String>,

    /// Playlist title (first page only)
    pub title: Option<String>,

    /// Date of the playlist's last update (first page only)
    pub last_updated: Option<NaiveDate>,
}

/// Walks a JSON tree collecting video IDs and the first continuation token
fn collect_entries(value: &Value, ids: &mut Vec<String>, continuation: &mut Option<String>) {
    match value {
        Value::Object(map) => {
            if let Some(id) = map
                .get("playlistVideoRenderer")
                .and_then(|r| r.get("videoId"))
                .and_then(Value::as_str)
            {
                ids.push(id.to_string());
            }

            if continuation.is_none() {
                let token = map
                    .get("nextContinuationData")
                    .and_then(|d| d.get("continuation"))
                    .or_else(|| map.get("continuationCommand").and_then(|c| c.get("token")))
                    .and_then(Value::as_str);
                if let Some(token) = token {
                    *continuation = Some(token.to_string());
                }
            }

            for (key, child) in map {
                if key != "playlistVideoRenderer" {
                    collect_entries(child, ids, continuation);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_entries(item, ids, continuation);
            }
        }
        _ => {}
    }
}

fn page_from_json(data: &Value) -> PlaylistPage {
    let mut video_ids = Vec::new();
    let mut continuation = None;
    collect_entries(data, &mut video_ids, &mut continuation);
    PlaylistPage {
        video_ids,
        continuation,
        title: None,
        last_updated: None,
    }
}

/// Parses "Last updated on Mar 3, 2024"
fn parse_last_updated(html: &str) -> Option<NaiveDate> {
    let re = Regex::new(r"Last updated on (\w{3}) (\d{1,2}), (\d{4})").ok()?;
    let caps = re.captures(html)?;
    let text = format!("{} {:0>2} {}", &caps[1], &caps[2], &caps[3]);
    NaiveDate::parse_from_str(&text, "%b %d %Y").ok()
}

fn parse_title(html: &str, data: &Value) -> Option<String> {
    if let Some(title) = data
        .pointer("/metadata/playlistMetadataRenderer/title")
        .and_then(Value::as_str)
    {
        return Some(title.to_string());
    }

    let document = Html::parse_document(html);
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>())
        .map(|t| t.replace("- YouTube", "").trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Parses the first playlist page
///
/// # Errors
/// Returns `MalformedPage` if no `ytInitialData` object is found
pub fn parse_playlist_page(html: &str) -> Result<PlaylistPage> {
    let (_, data) = find_json_after_markers(html, INITIAL_DATA_MARKERS).ok_or_else(|| {
        TubeError::MalformedPage("no recognized initial data marker in playlist page".to_string())
    })?;

    let mut page = page_from_json(&data);
    page.title = parse_title(html, &data);
    page.last_updated = parse_last_updated(html);
    Ok(page)
}

/// Parses a continuation response (a JSON document, or a page fragment
/// embedding `ytInitialData`)
///
/// # Errors
/// Returns `MalformedPage` if the body carries no recognizable JSON
pub fn parse_continuation_page(body: &str) -> Result<PlaylistPage> {
    if let Ok(data) = serde_json::from_str::<Value>(body.trim()) {
        return Ok(page_from_json(&data));
    }

    find_json_after_markers(body, INITIAL_DATA_MARKERS)
        .map(|(_, data)| page_from_json(&data))
        .ok_or_else(|| TubeError::MalformedPage("unrecognized continuation response".to_string()))
}
