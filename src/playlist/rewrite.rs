use super::{
    parse_segment_index, segment_name, Playlist, PlaylistError, TAG_DISCONTINUITY, TAG_DURATION,
};

/// One file move decided by a relocation: `seg<from>.ts` -> `seg<to>.ts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentRename {
    pub from: u64,
    pub to: u64,
}

#[derive(Debug)]
pub struct Relocation {
    pub playlist: Playlist,
    /// Free index observed before renumbering started.
    pub first_free: u64,
    /// Renames in document order; the segment files must follow them.
    pub renames: Vec<SegmentRename>,
}

impl Relocation {
    /// New `(start, end)` of the relocated clip.
    pub fn new_range(&self) -> Option<(u64, u64)> {
        let first = self.renames.first()?;
        let last = self.renames.last()?;
        Some((first.to, last.to))
    }
}

/// Moves the clip spanning `seg<start>.ts..=seg<end>.ts` to the end of the
/// document under fresh segment numbers starting at `next_free`.
///
/// The block starts at the `#EXTINF` line in front of the start segment.
/// Its own leading discontinuity marker is dropped with it, and a single
/// new marker is put in front of the relocated block.
pub fn relocate_clip(
    playlist: &Playlist,
    start: u64,
    end: u64,
    next_free: u64,
) -> Result<Relocation, PlaylistError> {
    let lines = playlist.lines();
    let start_name = segment_name(start);
    let end_name = segment_name(end);

    let start_line = lines
        .iter()
        .position(|l| l.trim() == start_name)
        .ok_or_else(|| PlaylistError::Malformed(format!("{start_name} not found")))?;
    let end_line = lines[start_line..]
        .iter()
        .position(|l| l.trim() == end_name)
        .map(|offset| start_line + offset)
        .ok_or_else(|| {
            PlaylistError::Malformed(format!("{end_name} not found after {start_name}"))
        })?;

    let block_start = match start_line.checked_sub(1) {
        Some(i) if lines[i].trim_start().starts_with(TAG_DURATION) => i,
        _ => {
            return Err(PlaylistError::Malformed(format!(
                "no {TAG_DURATION} line before {start_name}"
            )))
        }
    };
    let cut_start = match block_start.checked_sub(1) {
        Some(i) if lines[i].trim() == TAG_DISCONTINUITY => i,
        _ => block_start,
    };

    let mut next = next_free;
    let mut renames = Vec::new();
    let mut block = Vec::with_capacity(end_line - block_start + 2);
    block.push(TAG_DISCONTINUITY.to_string());
    for line in &lines[block_start..=end_line] {
        match parse_segment_index(line) {
            Some(from) => {
                renames.push(SegmentRename { from, to: next });
                block.push(segment_name(next));
                next += 1;
            }
            None => block.push(line.clone()),
        }
    }

    let mut rewritten = Vec::with_capacity(lines.len() + 1);
    rewritten.extend_from_slice(&lines[..cut_start]);
    rewritten.extend_from_slice(&lines[end_line + 1..]);
    rewritten.extend(block);

    Ok(Relocation {
        playlist: Playlist::from_lines(rewritten),
        first_free: next_free,
        renames,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playlist(body: &[&str]) -> Playlist {
        let mut lines = vec![
            "#EXTM3U".to_string(),
            "#EXT-X-VERSION:3".to_string(),
            "#EXT-X-TARGETDURATION:11".to_string(),
            "#EXT-X-MEDIA-SEQUENCE:0".to_string(),
        ];
        lines.extend(body.iter().map(|s| s.to_string()));
        Playlist::from_lines(lines)
    }

    #[test]
    fn test_relocates_whole_document_clip() {
        let doc = playlist(&[
            "#EXTINF:9.3,",
            "seg0.ts",
            "#EXTINF:10.6,",
            "seg1.ts",
            "#EXTINF:8.1,",
            "seg2.ts",
        ]);

        let relocation = relocate_clip(&doc, 0, 2, 3).unwrap();

        assert_eq!(
            relocation.playlist.lines(),
            [
                "#EXTM3U",
                "#EXT-X-VERSION:3",
                "#EXT-X-TARGETDURATION:11",
                "#EXT-X-MEDIA-SEQUENCE:0",
                "#EXT-X-DISCONTINUITY",
                "#EXTINF:9.3,",
                "seg3.ts",
                "#EXTINF:10.6,",
                "seg4.ts",
                "#EXTINF:8.1,",
                "seg5.ts",
            ]
        );
        assert_eq!(relocation.first_free, 3);
        assert_eq!(relocation.new_range(), Some((3, 5)));
        assert_eq!(
            relocation.renames,
            vec![
                SegmentRename { from: 0, to: 3 },
                SegmentRename { from: 1, to: 4 },
                SegmentRename { from: 2, to: 5 },
            ]
        );
    }

    #[test]
    fn test_relocates_head_past_other_clips() {
        let doc = playlist(&[
            "#EXTINF:5.0,",
            "seg0.ts",
            "#EXT-X-DISCONTINUITY",
            "#EXTINF:8.0,",
            "seg1.ts",
        ]);

        let relocation = relocate_clip(&doc, 0, 0, 2).unwrap();

        assert_eq!(
            &relocation.playlist.lines()[4..],
            [
                "#EXT-X-DISCONTINUITY",
                "#EXTINF:8.0,",
                "seg1.ts",
                "#EXT-X-DISCONTINUITY",
                "#EXTINF:5.0,",
                "seg2.ts",
            ]
        );
    }

    #[test]
    fn test_drops_own_leading_marker() {
        let doc = playlist(&[
            "#EXT-X-DISCONTINUITY",
            "#EXTINF:8.0,",
            "seg1.ts",
            "#EXT-X-DISCONTINUITY",
            "#EXTINF:5.0,",
            "seg2.ts",
        ]);

        let relocation = relocate_clip(&doc, 1, 1, 3).unwrap();
        let markers = relocation
            .playlist
            .lines()
            .iter()
            .filter(|l| *l == TAG_DISCONTINUITY)
            .count();

        assert_eq!(markers, 2);
        assert_eq!(
            &relocation.playlist.lines()[4..],
            [
                "#EXT-X-DISCONTINUITY",
                "#EXTINF:5.0,",
                "seg2.ts",
                "#EXT-X-DISCONTINUITY",
                "#EXTINF:8.0,",
                "seg3.ts",
            ]
        );
    }

    #[test]
    fn test_indented_duration_line() {
        let doc = playlist(&["  #EXTINF:5.0,", "  seg0.ts", "#EXTINF:6.0,", "seg1.ts"]);

        let relocation = relocate_clip(&doc, 0, 0, 2).unwrap();

        assert_eq!(
            &relocation.playlist.lines()[4..],
            [
                "#EXTINF:6.0,",
                "seg1.ts",
                "#EXT-X-DISCONTINUITY",
                "  #EXTINF:5.0,",
                "seg2.ts",
            ]
        );
    }

    #[test]
    fn test_input_is_untouched() {
        let doc = playlist(&["#EXTINF:5.0,", "seg0.ts"]);
        let before = doc.clone();
        relocate_clip(&doc, 0, 0, 1).unwrap();
        assert_eq!(doc, before);
    }

    #[test]
    fn test_missing_start_is_malformed() {
        let doc = playlist(&["#EXTINF:5.0,", "seg4.ts"]);
        let err = relocate_clip(&doc, 0, 4, 5).unwrap_err();
        assert!(matches!(err, PlaylistError::Malformed(msg) if msg.contains("seg0.ts")));
    }

    #[test]
    fn test_missing_end_is_malformed() {
        let doc = playlist(&["#EXTINF:5.0,", "seg4.ts"]);
        let err = relocate_clip(&doc, 4, 6, 7).unwrap_err();
        assert!(matches!(err, PlaylistError::Malformed(msg) if msg.contains("seg6.ts")));
    }

    #[test]
    fn test_start_without_duration_is_malformed() {
        let doc = Playlist::from_lines(vec!["seg0.ts".to_string()]);
        assert!(relocate_clip(&doc, 0, 0, 1).is_err());
    }
}
