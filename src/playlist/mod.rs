mod document;
mod rewrite;

use thiserror::Error;

pub use document::Playlist;
pub use rewrite::{relocate_clip, SegmentRename};

pub const TAG_HEADER: &str = "#EXTM3U";
pub const TAG_VERSION: &str = "#EXT-X-VERSION:";
pub const TAG_TARGET_DURATION: &str = "#EXT-X-TARGETDURATION:";
pub const TAG_MEDIA_SEQUENCE: &str = "#EXT-X-MEDIA-SEQUENCE:";
pub const TAG_ALLOW_CACHE: &str = "#EXT-X-ALLOW-CACHE:";
pub const TAG_DURATION: &str = "#EXTINF:";
pub const TAG_DISCONTINUITY: &str = "#EXT-X-DISCONTINUITY";
pub const TAG_END_LIST: &str = "#EXT-X-ENDLIST";

const SEGMENT_PREFIX: &str = "seg";
const SEGMENT_SUFFIX: &str = ".ts";

#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("malformed playlist: {0}")]
    Malformed(String),
}

pub fn segment_name(index: u64) -> String {
    format!("{SEGMENT_PREFIX}{index}{SEGMENT_SUFFIX}")
}

/// `seg<N>.ts` -> `N`. Anything else, including temp names, is `None`.
pub fn parse_segment_index(name: &str) -> Option<u64> {
    let digits = name
        .trim()
        .strip_prefix(SEGMENT_PREFIX)?
        .strip_suffix(SEGMENT_SUFFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// `#EXTINF:<float>,[title]` -> the float.
pub fn parse_duration(line: &str) -> Option<f64> {
    let value = line.trim().strip_prefix(TAG_DURATION)?;
    let value = value.split(',').next()?.trim();
    value.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_name_roundtrip() {
        assert_eq!(segment_name(42), "seg42.ts");
        assert_eq!(parse_segment_index("seg42.ts"), Some(42));
        assert_eq!(parse_segment_index("seg0.ts"), Some(0));
    }

    #[test]
    fn test_parse_segment_index_rejects_other_names() {
        assert_eq!(parse_segment_index("seg.ts"), None);
        assert_eq!(parse_segment_index("seg4.ts.staged"), None);
        assert_eq!(parse_segment_index("9f1c_seg4.ts"), None);
        assert_eq!(parse_segment_index("seg-1.ts"), None);
        assert_eq!(parse_segment_index("#EXTINF:10.0,"), None);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("#EXTINF:10.666667,"), Some(10.666667));
        assert_eq!(parse_duration("#EXTINF:9,title"), Some(9.0));
        assert_eq!(parse_duration("#EXT-X-TARGETDURATION:10"), None);
        assert_eq!(parse_duration("#EXTINF:abc,"), None);
    }
}
