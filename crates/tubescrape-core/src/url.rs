//! URL helper functions
//!
//! Builds watch, playlist and continuation URLs and pulls video/playlist
//! identifiers out of the many URL shapes users paste.

use regex::Regex;

use crate::error::{Result, TubeError};

pub(crate) const BASE_URL: &str = "https://www.youtube.com";

/// Builds the watch page URL for a video ID
///
/// # Example
/// ```
/// use tubescrape_core::url::build_watch_url;
/// let url = build_watch_url("9bZkp7q19f0");
/// assert_eq!(url, "https://www.youtube.com/watch?v=9bZkp7q19f0");
/// ```
pub fn build_watch_url(video_id: &str) -> String {
    format!("{}/watch?v={}", BASE_URL, video_id)
}

/// Builds the playlist page URL for a playlist ID
///
/// # Example
/// ```
/// use tubescrape_core::url::build_playlist_url;
/// let url = build_playlist_url("PLabc");
/// assert_eq!(url, "https://www.youtube.com/playlist?list=PLabc");
/// ```
pub fn build_playlist_url(playlist_id: &str) -> String {
    format!("{}/playlist?list={}", BASE_URL, urlencoding::encode(playlist_id))
}

/// Builds the URL that returns the playlist page after `continuation`
///
/// The endpoint expects the token twice, as `ctoken` and `continuation`.
pub fn build_continuation_url(continuation: &str) -> String {
    let token = urlencoding::encode(continuation);
    format!(
        "{}/browse_ajax?ctoken={}&continuation={}",
        BASE_URL, token, token
    )
}

fn is_video_id(candidate: &str) -> bool {
    candidate.len() == 11
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Extracts the 11-character video ID from a raw ID or any watch/share URL
///
/// Accepts `watch?v=`, `youtu.be/`, `/embed/`, `/shorts/` and `/live/` forms.
///
/// # Example
/// ```
/// use tubescrape_core::url::extract_video_id;
/// let id = extract_video_id("https://youtu.be/9bZkp7q19f0?t=10").unwrap();
/// assert_eq!(id, "9bZkp7q19f0");
/// ```
pub fn extract_video_id(input: &str) -> Result<String> {
    let input = input.trim();
    if is_video_id(input) {
        return Ok(input.to_string());
    }

    let re = Regex::new(r"(?:v=|/)([0-9A-Za-z_-]{11})(?:[?&#/]|$)")
        .map_err(|e| TubeError::InvalidUrl(e.to_string()))?;

    re.captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| TubeError::InvalidId(format!("no video ID in '{}'", input)))
}

/// Extracts the playlist ID from a raw ID or a URL carrying `list=`
pub fn extract_playlist_id(input: &str) -> Result<String> {
    let input = input.trim();
    if input.is_empty() {
        return Err(TubeError::InvalidId("Playlist ID cannot be empty".to_string()));
    }

    if input.contains("://") {
        let parsed =
            url::Url::parse(input).map_err(|e| TubeError::InvalidUrl(e.to_string()))?;
        return parsed
            .query_pairs()
            .find(|(key, _)| key == "list")
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| TubeError::InvalidId(format!("no list parameter in '{}'", input)));
    }

    if let Some(rest) = input.split("list=").nth(1) {
        let id = rest.split('&').next().unwrap_or(rest);
        if !id.is_empty() {
            return Ok(id.to_string());
        }
    }

    if input
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Ok(input.to_string());
    }

    Err(TubeError::InvalidId(format!("invalid playlist ID '{}'", input)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_watch_url() {
        assert_eq!(
            build_watch_url("9bZkp7q19f0"),
            "https://www.youtube.com/watch?v=9bZkp7q19f0"
        );
    }

    #[test]
    fn test_build_continuation_url_encodes_token() {
        let url = build_continuation_url("4qmFsgI=");
        assert_eq!(
            url,
            "https://www.youtube.com/browse_ajax?ctoken=4qmFsgI%3D&continuation=4qmFsgI%3D"
        );
    }

    #[test]
    fn test_extract_video_id_raw() {
        assert_eq!(extract_video_id("9bZkp7q19f0").unwrap(), "9bZkp7q19f0");
    }

    #[test]
    fn test_extract_video_id_watch_url() {
        let id = extract_video_id("https://www.youtube.com/watch?v=9bZkp7q19f0&list=PLx").unwrap();
        assert_eq!(id, "9bZkp7q19f0");
    }

    #[test]
    fn test_extract_video_id_short_forms() {
        for url in [
            "https://youtu.be/9bZkp7q19f0",
            "https://www.youtube.com/embed/9bZkp7q19f0",
            "https://www.youtube.com/shorts/9bZkp7q19f0?feature=share",
            "https://m.youtube.com/watch?feature=youtu.be&v=9bZkp7q19f0",
        ] {
            assert_eq!(extract_video_id(url).unwrap(), "9bZkp7q19f0", "{}", url);
        }
    }

    #[test]
    fn test_extract_video_id_invalid() {
        let result = extract_video_id("https://www.youtube.com/feed/trending");
        assert!(matches!(result, Err(TubeError::InvalidId(_))));
    }

    #[test]
    fn test_extract_playlist_id_from_url() {
        let id = extract_playlist_id(
            "https://www.youtube.com/playlist?list=PLS1QulWo1RIaJECMeUT4LFwJ-ghgoSH6n",
        )
        .unwrap();
        assert_eq!(id, "PLS1QulWo1RIaJECMeUT4LFwJ-ghgoSH6n");
    }

    #[test]
    fn test_extract_playlist_id_from_watch_url() {
        let id = extract_playlist_id("https://www.youtube.com/watch?v=9bZkp7q19f0&list=PLabc&index=2")
            .unwrap();
        assert_eq!(id, "PLabc");
    }

    #[test]
    fn test_extract_playlist_id_raw_and_empty() {
        assert_eq!(extract_playlist_id("PLabc_-1").unwrap(), "PLabc_-1");
        assert!(matches!(extract_playlist_id("  "), Err(TubeError::InvalidId(_))));
        assert!(matches!(
            extract_playlist_id("https://www.youtube.com/playlist"),
            Err(TubeError::InvalidId(_))
        ));
    }
}
