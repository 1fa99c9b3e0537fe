//! Stream query engine
//!
//! [`StreamQuery`] is an immutable view over a catalog's streams. Every
//! filter or ordering returns a new view; views share the underlying
//! `Stream`s through `Arc` and never mutate them.
//!
//! Filters are a closed set of typed predicates ([`Filter`]). String keyed
//! filter maps are parsed into that set up front, so an unknown key or a
//! value of the wrong kind is an error instead of a silent no-op.

use std::fmt;
use std::ops::Index;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Result, TubeError};
use crate::stream::Stream;

/// Untyped filter value as supplied through a key/value filter map
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Int(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        FilterValue::Int(i64::from(value))
    }
}

impl From<u32> for FilterValue {
    fn from(value: u32) -> Self {
        FilterValue::Int(i64::from(value))
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl FilterValue {
    fn invalid(key: &str, expected: &'static str) -> TubeError {
        TubeError::InvalidFilterValue {
            key: key.to_string(),
            expected,
        }
    }

    fn into_bool(self, key: &str) -> Result<bool> {
        match self {
            FilterValue::Bool(b) => Ok(b),
            _ => Err(Self::invalid(key, "boolean")),
        }
    }

    fn into_text(self, key: &str) -> Result<String> {
        match self {
            FilterValue::Text(s) => Ok(s),
            _ => Err(Self::invalid(key, "string")),
        }
    }

    fn into_u64(self, key: &str) -> Result<u64> {
        match self {
            FilterValue::Int(n) => u64::try_from(n).map_err(|_| Self::invalid(key, "non-negative integer")),
            FilterValue::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| Self::invalid(key, "non-negative integer")),
            FilterValue::Bool(_) => Err(Self::invalid(key, "non-negative integer")),
        }
    }

    fn into_u32(self, key: &str) -> Result<u32> {
        let n = self.into_u64(key)?;
        u32::try_from(n).map_err(|_| Self::invalid(key, "32-bit integer"))
    }

    /// Text as-is, or an integer with `suffix` appended ("720" -> "720p")
    fn into_label(self, key: &str, suffix: &str, expected: &'static str) -> Result<String> {
        match self {
            FilterValue::Text(s) if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => {
                Ok(format!("{}{}", s, suffix))
            }
            FilterValue::Text(s) => Ok(s),
            FilterValue::Int(n) if n >= 0 => Ok(format!("{}{}", n, suffix)),
            _ => Err(Self::invalid(key, expected)),
        }
    }
}

type Predicate = Arc<dyn Fn(&Stream) -> bool + Send + Sync>;

/// A single typed predicate over streams
///
/// Boolean flags set to `false` impose no constraint.
#[derive(Clone)]
pub enum Filter {
    Progressive(bool),
    Adaptive(bool),
    OnlyAudio(bool),
    OnlyVideo(bool),
    Subtype(String),
    Resolution(String),
    MimeType(String),
    /// Top-level media type, "video" or "audio"
    Type(String),
    Abr(String),
    Fps(u32),
    Bitrate(u64),
    VideoCodec(String),
    AudioCodec(String),
    Itag(u32),
    Otf(bool),
    Hdr(bool),
    Custom(Predicate),
}

impl Filter {
    /// Wraps a caller-supplied predicate
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&Stream) -> bool + Send + Sync + 'static,
    {
        Filter::Custom(Arc::new(predicate))
    }

    /// Builds a filter from a string key and an untyped value
    ///
    /// # Errors
    /// - `UnknownFilterKey` - key is not recognized
    /// - `InvalidFilterValue` - value has the wrong kind for the key
    pub fn parse(key: &str, value: impl Into<FilterValue>) -> Result<Self> {
        let value = value.into();
        let filter = match key {
            "progressive" => Filter::Progressive(value.into_bool(key)?),
            "adaptive" | "is_dash" => Filter::Adaptive(value.into_bool(key)?),
            "only_audio" => Filter::OnlyAudio(value.into_bool(key)?),
            "only_video" => Filter::OnlyVideo(value.into_bool(key)?),
            "subtype" | "file_extension" => Filter::Subtype(value.into_text(key)?),
            "resolution" | "res" => Filter::Resolution(value.into_label(key, "p", "resolution label")?),
            "mime_type" => Filter::MimeType(value.into_text(key)?),
            "type" => Filter::Type(value.into_text(key)?),
            "abr" => Filter::Abr(value.into_label(key, "kbps", "bitrate label")?),
            "fps" => Filter::Fps(value.into_u32(key)?),
            "bitrate" => Filter::Bitrate(value.into_u64(key)?),
            "video_codec" | "vcodec" => Filter::VideoCodec(value.into_text(key)?),
            "audio_codec" | "acodec" => Filter::AudioCodec(value.into_text(key)?),
            "itag" => Filter::Itag(value.into_u32(key)?),
            "otf" | "is_otf" => Filter::Otf(value.into_bool(key)?),
            "hdr" | "is_hdr" => Filter::Hdr(value.into_bool(key)?),
            other => return Err(TubeError::UnknownFilterKey(other.to_string())),
        };
        Ok(filter)
    }

    pub fn matches(&self, stream: &Stream) -> bool {
        match self {
            Filter::Progressive(on) => !on || stream.is_progressive(),
            Filter::Adaptive(on) => !on || stream.is_adaptive(),
            Filter::OnlyAudio(on) => {
                !on || (stream.includes_audio_track() && !stream.includes_video_track())
            }
            Filter::OnlyVideo(on) => {
                !on || (stream.includes_video_track() && !stream.includes_audio_track())
            }
            Filter::Subtype(v) => stream.subtype() == v,
            Filter::Resolution(v) => stream.resolution() == Some(v.as_str()),
            Filter::MimeType(v) => stream.mime_type() == v,
            Filter::Type(v) => stream.kind() == v,
            Filter::Abr(v) => stream.abr() == Some(v.as_str()),
            Filter::Fps(v) => stream.fps() == Some(*v),
            Filter::Bitrate(v) => stream.bitrate() == Some(*v),
            Filter::VideoCodec(v) => stream.video_codec() == Some(v.as_str()),
            Filter::AudioCodec(v) => stream.audio_codec() == Some(v.as_str()),
            Filter::Itag(v) => stream.itag() == *v,
            Filter::Otf(on) => !on || stream.is_otf(),
            Filter::Hdr(on) => !on || stream.is_hdr(),
            Filter::Custom(predicate) => predicate(stream),
        }
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Progressive(v) => write!(f, "Progressive({})", v),
            Filter::Adaptive(v) => write!(f, "Adaptive({})", v),
            Filter::OnlyAudio(v) => write!(f, "OnlyAudio({})", v),
            Filter::OnlyVideo(v) => write!(f, "OnlyVideo({})", v),
            Filter::Subtype(v) => write!(f, "Subtype({:?})", v),
            Filter::Resolution(v) => write!(f, "Resolution({:?})", v),
            Filter::MimeType(v) => write!(f, "MimeType({:?})", v),
            Filter::Type(v) => write!(f, "Type({:?})", v),
            Filter::Abr(v) => write!(f, "Abr({:?})", v),
            Filter::Fps(v) => write!(f, "Fps({})", v),
            Filter::Bitrate(v) => write!(f, "Bitrate({})", v),
            Filter::VideoCodec(v) => write!(f, "VideoCodec({:?})", v),
            Filter::AudioCodec(v) => write!(f, "AudioCodec({:?})", v),
            Filter::Itag(v) => write!(f, "Itag({})", v),
            Filter::Otf(v) => write!(f, "Otf({})", v),
            Filter::Hdr(v) => write!(f, "Hdr({})", v),
            Filter::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Conjunction of filters
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    filters: Vec<Filter>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Parses `(key, value)` pairs, failing on the first bad entry
    pub fn parse<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FilterValue>,
    {
        let filters = pairs
            .into_iter()
            .map(|(key, value)| Filter::parse(key.as_ref(), value))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { filters })
    }

    pub fn matches(&self, stream: &Stream) -> bool {
        self.filters.iter().all(|f| f.matches(stream))
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl From<Filter> for FilterSet {
    fn from(filter: Filter) -> Self {
        Self {
            filters: vec![filter],
        }
    }
}

impl FromIterator<Filter> for FilterSet {
    fn from_iter<T: IntoIterator<Item = Filter>>(iter: T) -> Self {
        Self {
            filters: iter.into_iter().collect(),
        }
    }
}

/// Attribute a query can be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderKey {
    Itag,
    Resolution,
    Fps,
    Abr,
    Bitrate,
    ContentLength,
    MimeType,
    Subtype,
    Type,
    VideoCodec,
    AudioCodec,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum SortValue {
    Num(u64),
    Text(String),
}

impl OrderKey {
    /// Sort value of `stream`, `None` if it lacks the attribute
    fn value(self, stream: &Stream) -> Option<SortValue> {
        let num = |v: Option<u64>| v.map(SortValue::Num);
        let text = |v: Option<&str>| v.map(|s| SortValue::Text(s.to_string()));
        match self {
            OrderKey::Itag => num(Some(u64::from(stream.itag()))),
            OrderKey::Resolution => num(stream.resolution_value().map(u64::from)),
            OrderKey::Fps => num(stream.fps().map(u64::from)),
            OrderKey::Abr => num(stream.abr_value().map(u64::from)),
            OrderKey::Bitrate => num(stream.bitrate()),
            OrderKey::ContentLength => num(stream.content_length()),
            OrderKey::MimeType => text(Some(stream.mime_type())),
            OrderKey::Subtype => text(Some(stream.subtype())),
            OrderKey::Type => text(Some(stream.kind())),
            OrderKey::VideoCodec => text(stream.video_codec()),
            OrderKey::AudioCodec => text(stream.audio_codec()),
        }
    }
}

impl FromStr for OrderKey {
    type Err = TubeError;

    fn from_str(s: &str) -> Result<Self> {
        let key = match s {
            "itag" => OrderKey::Itag,
            "resolution" | "res" => OrderKey::Resolution,
            "fps" => OrderKey::Fps,
            "abr" => OrderKey::Abr,
            "bitrate" => OrderKey::Bitrate,
            "filesize" | "content_length" => OrderKey::ContentLength,
            "mime_type" => OrderKey::MimeType,
            "subtype" | "file_extension" => OrderKey::Subtype,
            "type" => OrderKey::Type,
            "video_codec" | "vcodec" => OrderKey::VideoCodec,
            "audio_codec" | "acodec" => OrderKey::AudioCodec,
            other => return Err(TubeError::UnknownFilterKey(other.to_string())),
        };
        Ok(key)
    }
}

/// Immutable, chainable view over a set of streams
#[derive(Debug, Clone, Default)]
pub struct StreamQuery {
    streams: Vec<Arc<Stream>>,
    order: Option<OrderKey>,
}

impl StreamQuery {
    pub fn new(streams: Vec<Arc<Stream>>) -> Self {
        Self {
            streams,
            order: None,
        }
    }

    fn derived(&self, streams: Vec<Arc<Stream>>) -> Self {
        Self {
            streams,
            order: self.order,
        }
    }

    /// Streams matching every filter in `filters`
    pub fn filter(&self, filters: &FilterSet) -> Self {
        self.derived(
            self.streams
                .iter()
                .filter(|s| filters.matches(s))
                .cloned()
                .collect(),
        )
    }

    /// Like [`StreamQuery::filter`], from string keys
    ///
    /// ```
    /// use tubescrape_core::query::StreamQuery;
    ///
    /// let query = StreamQuery::default();
    /// let audio = query.filter_by([("only_audio", true)]).unwrap();
    /// assert!(audio.is_empty());
    /// assert!(query.filter_by([("colour", "blue")]).is_err());
    /// ```
    ///
    /// # Errors
    /// `UnknownFilterKey` or `InvalidFilterValue` from parsing the pairs
    pub fn filter_by<I, K, V>(&self, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FilterValue>,
    {
        Ok(self.filter(&FilterSet::parse(pairs)?))
    }

    pub fn custom_filter<F>(&self, predicate: F) -> Self
    where
        F: Fn(&Stream) -> bool,
    {
        self.derived(
            self.streams
                .iter()
                .filter(|s| predicate(s))
                .cloned()
                .collect(),
        )
    }

    /// Ascending order by `key`; streams lacking the attribute are dropped
    pub fn order_by(&self, key: OrderKey) -> Self {
        let mut keyed: Vec<(SortValue, Arc<Stream>)> = self
            .streams
            .iter()
            .filter_map(|s| key.value(s).map(|v| (v, Arc::clone(s))))
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        Self {
            streams: keyed.into_iter().map(|(_, s)| s).collect(),
            order: Some(key),
        }
    }

    /// # Errors
    /// `UnknownFilterKey` if `name` is not an orderable attribute
    pub fn order_by_name(&self, name: &str) -> Result<Self> {
        Ok(self.order_by(name.parse()?))
    }

    /// Descending order by the current key, or the reversed view if unordered
    pub fn desc(&self) -> Self {
        let mut streams = self.streams.clone();
        match self.order {
            Some(key) => streams.sort_by(|a, b| key.value(b).cmp(&key.value(a))),
            None => streams.reverse(),
        }
        self.derived(streams)
    }

    /// Ascending order by the current key; unchanged if unordered
    pub fn asc(&self) -> Self {
        let mut streams = self.streams.clone();
        if let Some(key) = self.order {
            streams.sort_by(|a, b| key.value(a).cmp(&key.value(b)));
        }
        self.derived(streams)
    }

    /// # Errors
    /// `NotFound` if no stream has `itag`
    pub fn get_by_itag(&self, itag: u32) -> Result<&Stream> {
        self.iter()
            .find(|s| s.itag() == itag)
            .ok_or_else(|| TubeError::NotFound(format!("stream with itag {}", itag)))
    }

    pub fn first(&self) -> Option<&Stream> {
        self.streams.first().map(AsRef::as_ref)
    }

    pub fn last(&self) -> Option<&Stream> {
        self.streams.last().map(AsRef::as_ref)
    }

    /// # Errors
    /// `IndexOutOfRange` if `index >= len()`
    pub fn get(&self, index: usize) -> Result<&Stream> {
        self.streams
            .get(index)
            .map(AsRef::as_ref)
            .ok_or(TubeError::IndexOutOfRange {
                index,
                len: self.streams.len(),
            })
    }

    /// Progressive stream with the highest resolution
    pub fn get_highest_resolution(&self) -> Option<&Stream> {
        self.iter()
            .filter(|s| s.is_progressive())
            .filter_map(|s| s.resolution_value().map(|r| (r, s)))
            .max_by_key(|(r, _)| *r)
            .map(|(_, s)| s)
    }

    /// Progressive stream with the lowest resolution
    pub fn get_lowest_resolution(&self) -> Option<&Stream> {
        self.iter()
            .filter(|s| s.is_progressive())
            .filter_map(|s| s.resolution_value().map(|r| (r, s)))
            .min_by_key(|(r, _)| *r)
            .map(|(_, s)| s)
    }

    /// Audio-only stream of `subtype` with the highest bitrate
    pub fn get_audio_only(&self, subtype: &str) -> Option<&Stream> {
        self.iter()
            .filter(|s| s.includes_audio_track() && !s.includes_video_track())
            .filter(|s| s.subtype() == subtype)
            .filter_map(|s| s.abr_value().map(|abr| (abr, s)))
            .max_by_key(|(abr, _)| *abr)
            .map(|(_, s)| s)
    }

    /// Streams whose on-the-fly flag equals `is_otf`
    pub fn otf(&self, is_otf: bool) -> Self {
        self.custom_filter(|s| s.is_otf() == is_otf)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.streams.iter(),
        }
    }

    pub fn as_slice(&self) -> &[Arc<Stream>] {
        &self.streams
    }
}

impl Index<usize> for StreamQuery {
    type Output = Stream;

    fn index(&self, index: usize) -> &Stream {
        &self.streams[index]
    }
}

/// Borrowing iterator over a query's streams
pub struct Iter<'a> {
    inner: std::slice::Iter<'a, Arc<Stream>>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Stream;

    fn next(&mut self) -> Option<&'a Stream> {
        self.inner.next().map(AsRef::as_ref)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(AsRef::as_ref)
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a StreamQuery {
    type Item = &'a Stream;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

impl IntoIterator for StreamQuery {
    type Item = Arc<Stream>;
    type IntoIter = std::vec::IntoIter<Arc<Stream>>;

    fn into_iter(self) -> Self::IntoIter {
        self.streams.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::tests::{raw_format, stream};
    use proptest::prelude::*;

    fn query(streams: Vec<Stream>) -> StreamQuery {
        StreamQuery::new(streams.into_iter().map(Arc::new).collect())
    }

    fn itags(q: &StreamQuery) -> Vec<u32> {
        q.iter().map(Stream::itag).collect()
    }

    /// A small but realistic spread of formats
    fn sample() -> StreamQuery {
        query(vec![
            stream(18, "video/mp4", Some("360p"), Some("avc1.42001E"), Some("mp4a.40.2"), None),
            stream(22, "video/mp4", Some("720p"), Some("avc1.64001F"), Some("mp4a.40.2"), None),
            stream(137, "video/mp4", Some("1080p"), Some("avc1.640028"), None, None),
            stream(248, "video/webm", Some("1080p"), Some("vp9"), None, None),
            stream(135, "video/mp4", Some("480p"), Some("avc1.4d401f"), None, None),
            stream(140, "audio/mp4", None, None, Some("mp4a.40.2"), Some("128kbps")),
            stream(251, "audio/webm", None, None, Some("opus"), Some("160kbps")),
            stream(250, "audio/webm", None, None, Some("opus"), Some("70kbps")),
        ])
    }

    #[test]
    fn test_scenario_only_audio_and_progressive() {
        let q = query(vec![
            stream(22, "video/mp4", Some("720p"), Some("avc1"), Some("mp4a"), None),
            stream(140, "audio/mp4", None, None, Some("mp4a"), Some("128kbps")),
        ]);
        assert_eq!(itags(&q.filter_by([("only_audio", true)]).unwrap()), vec![140]);
        assert_eq!(itags(&q.filter_by([("progressive", true)]).unwrap()), vec![22]);
    }

    #[test]
    fn test_progressive_and_adaptive_is_empty() {
        let q = sample()
            .filter_by([("progressive", true), ("adaptive", true)])
            .unwrap();
        assert!(q.is_empty());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = sample().filter_by([("colour", "blue")]).unwrap_err();
        assert!(matches!(err, TubeError::UnknownFilterKey(k) if k == "colour"));
    }

    #[test]
    fn test_wrong_value_type_rejected() {
        let err = sample().filter_by([("progressive", "yes")]).unwrap_err();
        assert!(matches!(err, TubeError::InvalidFilterValue { expected: "boolean", .. }));

        let err = sample()
            .filter_by([("fps", FilterValue::Bool(true))])
            .unwrap_err();
        assert!(matches!(err, TubeError::InvalidFilterValue { .. }));
    }

    #[test]
    fn test_false_flag_imposes_no_constraint() {
        let q = sample().filter_by([("progressive", false)]).unwrap();
        assert_eq!(q.len(), sample().len());
    }

    #[test]
    fn test_mixed_filters_and_aliases() {
        let set = FilterSet::parse([
            ("file_extension", FilterValue::from("mp4")),
            ("res", FilterValue::from(1080)),
            ("is_dash", FilterValue::from(true)),
        ])
        .unwrap();
        assert_eq!(itags(&sample().filter(&set)), vec![137]);

        let q = sample().filter_by([("abr", "160")]).unwrap();
        assert_eq!(itags(&q), vec![251]);

        let q = sample().filter_by([("type", "audio"), ("acodec", "opus")]).unwrap();
        assert_eq!(itags(&q), vec![251, 250]);
    }

    #[test]
    fn test_custom_filter() {
        let set = FilterSet::new().with(Filter::custom(|s| s.itag() > 200));
        assert_eq!(itags(&sample().filter(&set)), vec![248, 251, 250]);
    }

    #[test]
    fn test_order_by_excludes_missing_and_sorts_numerically() {
        let q = sample().order_by(OrderKey::Resolution);
        assert_eq!(itags(&q), vec![18, 135, 22, 137, 248]);

        let q = sample().order_by_name("abr").unwrap();
        assert_eq!(itags(&q), vec![250, 140, 251]);
    }

    #[test]
    fn test_order_by_unknown_key() {
        assert!(matches!(
            sample().order_by_name("colour"),
            Err(TubeError::UnknownFilterKey(_))
        ));
    }

    #[test]
    fn test_desc_and_asc() {
        let asc = sample().order_by(OrderKey::Resolution);
        let desc = asc.desc();
        assert_eq!(itags(&desc), vec![137, 248, 22, 135, 18]);
        assert_eq!(itags(&desc.asc()), itags(&asc));
    }

    #[test]
    fn test_desc_without_order_reverses() {
        let q = sample();
        let mut expected = itags(&q);
        expected.reverse();
        assert_eq!(itags(&q.desc()), expected);
        assert_eq!(itags(&q.asc()), itags(&q));
    }

    #[test]
    fn test_filter_keeps_order_key() {
        let q = sample()
            .order_by(OrderKey::Resolution)
            .filter_by([("subtype", "mp4")])
            .unwrap()
            .desc();
        assert_eq!(itags(&q), vec![137, 22, 135, 18]);
    }

    #[test]
    fn test_views_do_not_affect_source() {
        let base = sample();
        let _ = base.order_by(OrderKey::Abr).desc();
        let _ = base.filter_by([("only_video", true)]).unwrap();
        assert_eq!(itags(&base), itags(&sample()));
    }

    #[test]
    fn test_get_by_itag() {
        let q = sample();
        assert_eq!(q.get_by_itag(22).unwrap().resolution(), Some("720p"));
        assert!(matches!(q.get_by_itag(999), Err(TubeError::NotFound(_))));
    }

    #[test]
    fn test_positional_access() {
        let q = sample();
        assert_eq!(q.first().map(Stream::itag), Some(18));
        assert_eq!(q.last().map(Stream::itag), Some(250));
        assert_eq!(q.get(1).unwrap().itag(), 22);
        assert_eq!(q[2].itag(), 137);
        assert!(matches!(
            q.get(8),
            Err(TubeError::IndexOutOfRange { index: 8, len: 8 })
        ));

        let empty = StreamQuery::default();
        assert!(empty.first().is_none());
        assert!(empty.last().is_none());
    }

    #[test]
    #[should_panic]
    fn test_index_out_of_range_panics() {
        let _ = &sample()[100];
    }

    #[test]
    fn test_convenience_selectors() {
        let q = sample();
        assert_eq!(q.get_highest_resolution().map(Stream::itag), Some(22));
        assert_eq!(q.get_lowest_resolution().map(Stream::itag), Some(18));
        assert_eq!(q.get_audio_only("mp4").map(Stream::itag), Some(140));
        assert_eq!(q.get_audio_only("webm").map(Stream::itag), Some(251));
        assert!(q.get_audio_only("ogg").is_none());
    }

    #[test]
    fn test_otf_selection() {
        let mut format = raw_format(160, "video/mp4", Some("144p"), Some("avc1"), None, None);
        format.is_otf = true;
        let otf_stream = Stream::resolved(format, "https://cdn.example/otf".to_string(), "t");
        let mut streams: Vec<Arc<Stream>> = sample().into_iter().collect();
        streams.push(Arc::new(otf_stream));
        let q = StreamQuery::new(streams);

        assert_eq!(itags(&q.otf(true)), vec![160]);
        assert_eq!(q.otf(false).len(), 8);
        assert_eq!(itags(&q.filter_by([("otf", true)]).unwrap()), vec![160]);
    }

    #[test]
    fn test_iterators() {
        let q = sample();
        let by_ref: Vec<u32> = (&q).into_iter().map(Stream::itag).collect();
        assert_eq!(by_ref.len(), q.iter().len());
        let reversed: Vec<u32> = q.iter().rev().map(Stream::itag).collect();
        assert_eq!(reversed.first(), Some(&250));
        let owned: Vec<Arc<Stream>> = q.into_iter().collect();
        assert_eq!(owned.len(), 8);
    }

    fn arb_streams() -> impl Strategy<Value = Vec<Stream>> {
        let entry = (
            0u8..3,
            prop::option::of(prop::sample::select(vec!["144p", "360p", "720p", "1080p", "2160p"])),
            prop::option::of(prop::sample::select(vec!["48kbps", "128kbps", "160kbps"])),
        );
        prop::collection::vec(entry, 0..24).prop_map(|entries| {
            entries
                .into_iter()
                .enumerate()
                .map(|(i, (tracks, res, abr))| {
                    let itag = i as u32 + 1;
                    match tracks {
                        0 => stream(itag, "video/mp4", res, Some("avc1"), Some("mp4a"), abr),
                        1 => stream(itag, "video/webm", res, Some("vp9"), None, None),
                        _ => stream(itag, "audio/webm", None, None, Some("opus"), abr),
                    }
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_every_stream_has_a_track(streams in arb_streams()) {
            for s in &streams {
                prop_assert!(s.includes_audio_track() || s.includes_video_track());
            }
        }

        #[test]
        fn prop_progressive_and_adaptive_disjoint(streams in arb_streams()) {
            let q = query(streams);
            let progressive = q.filter_by([("progressive", true)]).unwrap();
            let adaptive = q.filter_by([("adaptive", true)]).unwrap();
            for s in &progressive {
                prop_assert!(adaptive.get_by_itag(s.itag()).is_err());
            }
            prop_assert_eq!(progressive.len() + adaptive.len(), q.len());
        }

        #[test]
        fn prop_order_by_resolution_is_monotonic(streams in arb_streams()) {
            let q = query(streams);
            let ordered = q.order_by(OrderKey::Resolution);
            let values: Vec<u32> = ordered
                .iter()
                .map(|s| s.resolution_value())
                .collect::<Option<Vec<_>>>()
                .expect("ordered view must not contain streams without resolution");
            prop_assert!(values.windows(2).all(|w| w[0] <= w[1]));

            let expected = q.iter().filter(|s| s.resolution().is_some()).count();
            prop_assert_eq!(ordered.len(), expected);

            let desc: Vec<u32> = ordered.desc().iter().filter_map(Stream::resolution_value).collect();
            prop_assert!(desc.windows(2).all(|w| w[0] >= w[1]));
        }

        #[test]
        fn prop_views_are_subsets(streams in arb_streams()) {
            let q = query(streams);
            let view = q.order_by(OrderKey::Abr).desc().filter_by([("only_audio", true)]).unwrap();
            for s in &view {
                prop_assert!(q.get_by_itag(s.itag()).is_ok());
            }
        }
    }
}
