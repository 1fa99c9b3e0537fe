//! Locating JSON objects embedded in inline scripts
//!
//! Pages assign their data to a global (`var ytInitialPlayerResponse = {...};`).
//! The variable name and surrounding code drift over time, so extraction
//! scans for a list of marker substrings and then balances braces from the
//! first `{` instead of relying on offsets or a trailing `;`.

use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

/// Returns the balanced `{...}` object starting at the first `{` of `text`
///
/// String literals (single or double quoted) and escapes are honoured so
/// braces inside strings do not count.
pub(crate) fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == q {
                quote = None;
            }
            continue;
        }

        match byte {
            b'"' | b'\'' => quote = Some(byte),
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Inline script bodies of an HTML document, in document order
pub(crate) fn inline_scripts(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("script") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter(|script| script.value().attr("src").is_none())
        .map(|script| script.text().collect::<String>())
        .filter(|text| !text.trim().is_empty())
        .collect()
}

/// Finds the first marker whose following object parses as JSON
///
/// Searches inline script blocks first, then the raw text, so both full
/// HTML pages and bare script fragments are accepted.
pub(crate) fn find_json_after_markers(html: &str, markers: &[&str]) -> Option<(String, Value)> {
    let scripts = inline_scripts(html);
    let haystacks = scripts.iter().map(String::as_str).chain(std::iter::once(html));

    for haystack in haystacks {
        for marker in markers {
            let mut search_from = 0;
            while let Some(pos) = haystack[search_from..].find(marker) {
                let after = search_from + pos + marker.len();
                let rest = haystack[after..].trim_start();
                if rest.starts_with('{')
                    && let Some(object) = extract_json_object(rest)
                    && let Ok(value) = serde_json::from_str::<Value>(object)
                {
                    debug!(marker, "found embedded JSON object");
                    return Some((marker.to_string(), value));
                }
                search_from = after;
            }
        }
    }

    None
}
