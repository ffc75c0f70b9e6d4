use super::{
    parse_duration, parse_segment_index, TAG_ALLOW_CACHE, TAG_DISCONTINUITY, TAG_DURATION,
    TAG_END_LIST, TAG_HEADER, TAG_MEDIA_SEQUENCE, TAG_TARGET_DURATION, TAG_VERSION,
};

/// Target duration written into a freshly seeded playlist, before any
/// segment durations are known.
const SEED_TARGET_DURATION: u64 = 13;

/// The live playlist as plain lines. Only tag prefixes and `seg<N>.ts`
/// lines carry meaning; everything else passes through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Playlist {
    lines: Vec<String>,
}

/// One clip as found in the document: the segment run between two
/// discontinuity markers and its summed `#EXTINF` time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipSpan {
    pub start_segment: u64,
    pub end_segment: u64,
    pub total_secs: f64,
}

impl Playlist {
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// Header for a playlist that has no clips yet.
    pub fn seeded() -> Self {
        Self::from_lines(vec![
            TAG_HEADER.to_string(),
            format!("{TAG_VERSION}3"),
            format!("{TAG_TARGET_DURATION}{SEED_TARGET_DURATION}"),
            format!("{TAG_ALLOW_CACHE}NO"),
            format!("{TAG_MEDIA_SEQUENCE}0"),
        ])
    }

    /// Parses a stored playlist for live use: blank lines and end-of-list
    /// markers are dropped.
    pub fn live(text: &str) -> Self {
        let lines = text
            .lines()
            .filter(|line| {
                let trimmed = line.trim();
                !trimmed.is_empty() && trimmed != TAG_END_LIST
            })
            .map(str::to_string)
            .collect();
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }

    /// Non-live copy of the document, closed with `#EXT-X-ENDLIST`.
    pub fn finalized(&self) -> String {
        let mut out = self.render();
        out.push_str(TAG_END_LIST);
        out.push('\n');
        out
    }

    pub fn has_segments(&self) -> bool {
        self.lines.iter().any(|l| parse_segment_index(l).is_some())
    }

    pub fn max_segment_index(&self) -> Option<u64> {
        self.lines.iter().filter_map(|l| parse_segment_index(l)).max()
    }

    /// Splices a clip's `#EXTINF`/segment lines onto the end, behind a
    /// discontinuity marker unless the document has no segments yet.
    pub fn append_clip(&mut self, clip_lines: Vec<String>) {
        if self.has_segments() {
            self.lines.push(TAG_DISCONTINUITY.to_string());
        }
        self.lines.extend(clip_lines);
    }

    pub fn max_duration(&self) -> Option<f64> {
        self.lines
            .iter()
            .filter(|l| l.trim_start().starts_with(TAG_DURATION))
            .filter_map(|l| parse_duration(l))
            .fold(None, |max, d| match max {
                Some(m) if m >= d => Some(m),
                _ => Some(d),
            })
    }

    /// Sets `#EXT-X-TARGETDURATION` to the ceiling of the longest segment.
    /// A document without durations is left as is.
    pub fn update_target_duration(&mut self) {
        let Some(max) = self.max_duration() else {
            return;
        };
        let tag = format!("{TAG_TARGET_DURATION}{}", max.ceil() as u64);
        self.replace_tag(TAG_TARGET_DURATION, tag);
    }

    pub fn update_media_sequence(&mut self, sequence: u64) {
        let tag = format!("{TAG_MEDIA_SEQUENCE}{sequence}");
        self.replace_tag(TAG_MEDIA_SEQUENCE, tag);
    }

    fn replace_tag(&mut self, prefix: &str, tag: String) {
        if let Some(line) = self.lines.iter_mut().find(|l| l.trim_start().starts_with(prefix)) {
            *line = tag;
        }
    }

    /// Splits the document into clips at discontinuity markers.
    pub fn clips(&self) -> Vec<ClipSpan> {
        let mut spans = Vec::new();
        let mut range: Option<(u64, u64)> = None;
        let mut total_secs = 0.0;

        for line in &self.lines {
            if line.trim() == TAG_DISCONTINUITY {
                if let Some((start_segment, end_segment)) = range.take() {
                    spans.push(ClipSpan {
                        start_segment,
                        end_segment,
                        total_secs,
                    });
                }
                total_secs = 0.0;
            } else if let Some(duration) = parse_duration(line) {
                total_secs += duration;
            } else if let Some(index) = parse_segment_index(line) {
                range = match range {
                    Some((start, _)) => Some((start, index)),
                    None => Some((index, index)),
                };
            }
        }

        if let Some((start_segment, end_segment)) = range {
            spans.push(ClipSpan {
                start_segment,
                end_segment,
                total_secs,
            });
        }

        spans
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIVE: &str = "#EXTM3U\n\
        #EXT-X-VERSION:3\n\
        #EXT-X-TARGETDURATION:13\n\
        #EXT-X-ALLOW-CACHE:NO\n\
        #EXT-X-MEDIA-SEQUENCE:0\n\
        #EXTINF:9.3,\n\
        seg0.ts\n\
        #EXTINF:10.6,\n\
        seg1.ts\n\
        #EXT-X-DISCONTINUITY\n\
        #EXTINF:8.1,\n\
        seg2.ts\n";

    #[test]
    fn test_live_strips_blank_and_end_list() {
        let playlist = Playlist::live("#EXTM3U\n\n#EXTINF:4.0,\nseg0.ts\n   \n#EXT-X-ENDLIST\n");
        assert_eq!(playlist.lines(), ["#EXTM3U", "#EXTINF:4.0,", "seg0.ts"]);
    }

    #[test]
    fn test_target_duration_is_ceiling_of_max() {
        let mut playlist = Playlist::live(LIVE);
        playlist.update_target_duration();
        assert!(playlist
            .lines()
            .contains(&"#EXT-X-TARGETDURATION:11".to_string()));
    }

    #[test]
    fn test_media_sequence_touches_one_line() {
        let mut playlist = Playlist::live(LIVE);
        let before = playlist.lines().to_vec();

        playlist.update_media_sequence(7);

        let changed: Vec<usize> = before
            .iter()
            .zip(playlist.lines())
            .enumerate()
            .filter(|(_, (a, b))| a != b)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(changed, vec![4]);
        assert_eq!(playlist.lines()[4], "#EXT-X-MEDIA-SEQUENCE:7");
    }

    #[test]
    fn test_indented_tags_are_recognised() {
        let mut playlist = Playlist::live(
            "#EXTM3U\n  #EXT-X-TARGETDURATION:4\n  #EXT-X-MEDIA-SEQUENCE:0\n  #EXTINF:6.2,\nseg0.ts\n",
        );
        playlist.update_target_duration();
        playlist.update_media_sequence(3);
        assert_eq!(
            playlist.lines(),
            [
                "#EXTM3U",
                "#EXT-X-TARGETDURATION:7",
                "#EXT-X-MEDIA-SEQUENCE:3",
                "  #EXTINF:6.2,",
                "seg0.ts"
            ]
        );
    }

    #[test]
    fn test_clips_split_at_discontinuity() {
        let playlist = Playlist::live(LIVE);
        let clips = playlist.clips();
        assert_eq!(clips.len(), 2);
        assert_eq!((clips[0].start_segment, clips[0].end_segment), (0, 1));
        assert!((clips[0].total_secs - 19.9).abs() < 1e-9);
        assert_eq!((clips[1].start_segment, clips[1].end_segment), (2, 2));
    }

    #[test]
    fn test_clips_skip_leading_marker() {
        let playlist = Playlist::live(
            "#EXTM3U\n#EXT-X-DISCONTINUITY\n#EXTINF:5.0,\nseg7.ts\n#EXT-X-DISCONTINUITY\n#EXTINF:6.0,\nseg3.ts\n",
        );
        let clips = playlist.clips();
        assert_eq!(clips.len(), 2);
        assert_eq!(clips[0].start_segment, 7);
        assert_eq!(clips[1].start_segment, 3);
    }

    #[test]
    fn test_append_clip_seeds_then_marks() {
        let mut playlist = Playlist::seeded();
        playlist.append_clip(vec!["#EXTINF:4.0,".into(), "seg0.ts".into()]);
        assert!(!playlist
            .lines()
            .contains(&TAG_DISCONTINUITY.to_string()));

        playlist.append_clip(vec!["#EXTINF:6.0,".into(), "seg1.ts".into()]);
        let tail: Vec<&str> = playlist.lines()[playlist.lines().len() - 3..]
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(tail, [TAG_DISCONTINUITY, "#EXTINF:6.0,", "seg1.ts"]);
        assert_eq!(playlist.max_segment_index(), Some(1));
    }

    #[test]
    fn test_finalized_closes_list() {
        let playlist = Playlist::live(LIVE);
        assert!(playlist.finalized().ends_with("#EXT-X-ENDLIST\n"));
        assert!(!playlist.render().contains(TAG_END_LIST));
    }
}
