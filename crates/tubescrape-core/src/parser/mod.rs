//! Page parsers
//!
//! Contains modules for the watch page, its format records, and playlist
//! pages, plus the embedded-JSON scanner they share.

pub(crate) mod embedded;
pub mod formats;
pub mod playlist;
pub mod watch_page;

pub use formats::{has_ciphered_records, parse_cipher_payload, parse_format, parse_mime_type, parse_streaming_data};
pub use playlist::{PlaylistPage, parse_continuation_page, parse_playlist_page};
pub use watch_page::{find_player_script, parse_watch_page};
