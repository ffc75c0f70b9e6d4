use serde::Serialize;

/// Snapshot of a clip's segment range and playback length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClipInfo {
    pub start_segment: u64,
    pub end_segment: u64,
    pub length_secs: u64,
}

/// What a ring slot needs from its payload: read the range, move the range.
pub trait ClipDescriptor {
    fn info(&self) -> ClipInfo;

    /// Rewrites the segment range in place. The length is left untouched.
    fn update(&mut self, start_segment: u64, end_segment: u64);
}

/// One ingested video: an inclusive run of `seg<N>.ts` files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clip {
    start_segment: u64,
    end_segment: u64,
    length_secs: u64,
}

impl Clip {
    pub fn new(start_segment: u64, end_segment: u64, length_secs: u64) -> Self {
        debug_assert!(end_segment >= start_segment);
        Self {
            start_segment,
            end_segment,
            length_secs,
        }
    }

    /// Length derived from the summed `#EXTINF` durations, scaled and rounded up.
    pub fn from_durations(
        start_segment: u64,
        end_segment: u64,
        total_secs: f64,
        length_adjust: f64,
    ) -> Self {
        let length_secs = (total_secs * length_adjust).ceil().max(1.0) as u64;
        Self::new(start_segment, end_segment, length_secs)
    }
}

impl ClipDescriptor for Clip {
    fn info(&self) -> ClipInfo {
        ClipInfo {
            start_segment: self.start_segment,
            end_segment: self.end_segment,
            length_secs: self.length_secs,
        }
    }

    fn update(&mut self, start_segment: u64, end_segment: u64) {
        self.start_segment = start_segment;
        self.end_segment = end_segment;
    }
}
