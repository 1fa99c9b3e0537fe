//! Format record parsing
//!
//! Turns the `streamingData.formats` / `adaptiveFormats` entries of a
//! player response into [`RawFormat`]s, enforcing that each record has a
//! direct URL or a cipher payload but not both, and at least one codec.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{Result, TubeError};
use crate::itags::format_profile;
use crate::types::{CipherPayload, DroppedFormat, FormatSource, PlayerScriptRef, RawFormat};

/// One entry of `formats` / `adaptiveFormats` as served by the page
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FormatRecord {
    itag: u32,
    url: Option<String>,
    mime_type: String,
    bitrate: Option<u64>,
    average_bitrate: Option<u64>,
    quality_label: Option<String>,
    height: Option<u32>,
    fps: Option<u32>,
    content_length: Option<String>,
    approx_duration_ms: Option<String>,
    signature_cipher: Option<String>,
    cipher: Option<String>,
    #[serde(rename = "type")]
    stream_type: Option<String>,
}

/// Splits `video/webm; codecs="vp8, vorbis"` into the mime type and codec list
///
/// # Example
/// ```
/// use tubescrape_core::parser::parse_mime_type;
/// let (mime, codecs) = parse_mime_type(r#"video/webm; codecs="vp8, vorbis""#).unwrap();
/// assert_eq!(mime, "video/webm");
/// assert_eq!(codecs, vec!["vp8", "vorbis"]);
/// ```
pub fn parse_mime_type(raw: &str) -> Result<(String, Vec<String>)> {
    let re = Regex::new(r#"^\s*([\w-]+/[\w.+-]+)\s*(?:;\s*codecs\s*=\s*"?([^"]*)"?)?"#)
        .map_err(|e| TubeError::MalformedPage(e.to_string()))?;

    let caps = re
        .captures(raw)
        .ok_or_else(|| TubeError::MalformedPage(format!("unparseable mime type '{}'", raw)))?;

    let mime = caps
        .get(1)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    let codecs = caps
        .get(2)
        .map(|m| {
            m.as_str()
                .split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Ok((mime, codecs))
}

/// Parses a `signatureCipher` query string (`s=...&sp=...&url=...`)
pub fn parse_cipher_payload(query: &str, player_script: &PlayerScriptRef) -> Result<CipherPayload> {
    let mut signature = None;
    let mut signature_param = None;
    let mut base_url = None;

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "s" => signature = Some(value.into_owned()),
            "sp" => signature_param = Some(value.into_owned()),
            "url" => base_url = Some(value.into_owned()),
            _ => {}
        }
    }

    let signature = signature
        .filter(|s| !s.is_empty())
        .ok_or_else(|| TubeError::MalformedPage("cipher payload without signature".to_string()))?;
    let base_url = base_url
        .filter(|u| !u.is_empty())
        .ok_or_else(|| TubeError::MalformedPage("cipher payload without url".to_string()))?;

    Ok(CipherPayload {
        signature,
        signature_param: signature_param.unwrap_or_else(|| "signature".to_string()),
        base_url,
        player_script: player_script.clone(),
    })
}

/// "720p60 HDR" -> "720p"
fn normalize_resolution(label: &str) -> Option<String> {
    let digits: String = label.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        Some(format!("{}p", digits))
    }
}

/// Parses a single format record
///
/// # Errors
/// `MalformedPage` when the record breaks an invariant: no codecs, both or
/// neither of url/cipher, or a cipher without a known player script.
pub fn parse_format(value: &Value, player_script: Option<&PlayerScriptRef>) -> Result<RawFormat> {
    let record = FormatRecord::deserialize(value)
        .map_err(|e| TubeError::MalformedPage(format!("format record: {}", e)))?;
    build_format(record, player_script)
}

fn build_format(record: FormatRecord, player_script: Option<&PlayerScriptRef>) -> Result<RawFormat> {
    let itag = record.itag;
    let (mime_type, codecs) = parse_mime_type(&record.mime_type)?;
    let (kind, subtype) = mime_type
        .split_once('/')
        .map(|(k, s)| (k.to_string(), s.to_string()))
        .ok_or_else(|| TubeError::MalformedPage(format!("itag {}: bad mime type", itag)))?;

    let (video_codec, audio_codec) = match codecs.as_slice() {
        [video, audio] => (Some(video.clone()), Some(audio.clone())),
        [single] if kind == "audio" => (None, Some(single.clone())),
        [single] if kind == "video" => (Some(single.clone()), None),
        [] => {
            return Err(TubeError::MalformedPage(format!(
                "itag {}: format declares no codecs",
                itag
            )));
        }
        _ => {
            return Err(TubeError::MalformedPage(format!(
                "itag {}: cannot assign codecs {:?} for type {}",
                itag, codecs, kind
            )));
        }
    };

    let cipher = record.signature_cipher.or(record.cipher);
    let source = match (record.url, cipher) {
        (Some(url), None) => FormatSource::Direct(url),
        (None, Some(query)) => {
            let script = player_script.ok_or_else(|| {
                TubeError::MalformedPage(format!(
                    "itag {}: ciphered format but no player script reference",
                    itag
                ))
            })?;
            FormatSource::Ciphered(parse_cipher_payload(&query, script)?)
        }
        (Some(_), Some(_)) => {
            return Err(TubeError::MalformedPage(format!(
                "itag {}: both direct url and cipher present",
                itag
            )));
        }
        (None, None) => {
            return Err(TubeError::MalformedPage(format!(
                "itag {}: neither direct url nor cipher present",
                itag
            )));
        }
    };

    let profile = format_profile(itag);
    let has_video = video_codec.is_some();
    let has_audio = audio_codec.is_some();

    let resolution = if has_video {
        record
            .quality_label
            .as_deref()
            .and_then(normalize_resolution)
            .or_else(|| profile.resolution.map(String::from))
            .or_else(|| record.height.map(|h| format!("{}p", h)))
    } else {
        None
    };
    let fps = if has_video { record.fps.or(profile.fps) } else { None };
    let abr = if has_audio {
        profile.abr.map(String::from).or_else(|| {
            if has_video {
                None
            } else {
                record
                    .average_bitrate
                    .or(record.bitrate)
                    .map(|bps| format!("{}kbps", bps / 1000))
            }
        })
    } else {
        None
    };

    Ok(RawFormat {
        itag,
        mime_type,
        kind,
        subtype,
        codecs,
        video_codec,
        audio_codec,
        resolution,
        fps,
        abr,
        bitrate: record.bitrate,
        content_length: record.content_length.and_then(|v| v.parse().ok()),
        approx_duration_ms: record.approx_duration_ms.and_then(|v| v.parse().ok()),
        is_otf: record.stream_type.as_deref() == Some("FORMAT_STREAM_TYPE_OTF"),
        is_3d: profile.is_3d,
        is_hdr: profile.is_hdr,
        is_live: profile.is_live,
        source,
    })
}

/// Whether any record of a `streamingData` object is ciphered
pub fn has_ciphered_records(streaming_data: &Value) -> bool {
    ["formats", "adaptiveFormats"]
        .into_iter()
        .filter_map(|list| streaming_data.get(list).and_then(Value::as_array))
        .flatten()
        .any(|entry| entry.get("signatureCipher").is_some() || entry.get("cipher").is_some())
}

/// Parses every format of a `streamingData` object, progressive first
///
/// Records that break an invariant are logged and returned as the second
/// list, with the reason.
pub fn parse_streaming_data(
    streaming_data: &Value,
    player_script: Option<&PlayerScriptRef>,
) -> (Vec<RawFormat>, Vec<DroppedFormat>) {
    let mut formats = Vec::new();
    let mut skipped = Vec::new();

    for list in ["formats", "adaptiveFormats"] {
        let Some(entries) = streaming_data.get(list).and_then(Value::as_array) else {
            continue;
        };
        for entry in entries {
            match parse_format(entry, player_script) {
                Ok(format) => formats.push(format),
                Err(e) => {
                    let itag = entry
                        .get("itag")
                        .and_then(Value::as_u64)
                        .and_then(|v| u32::try_from(v).ok())
                        .unwrap_or_default();
                    warn!(itag, error = %e, "skipping format record");
                    skipped.push(DroppedFormat {
                        itag,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    (formats, skipped)
}
