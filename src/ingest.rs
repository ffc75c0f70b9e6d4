use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::carousel::Carousel;
use crate::playlist::{segment_name, Playlist, PlaylistError, TAG_DURATION};
use crate::ring::{Clip, ClipDescriptor, ClipInfo, RingBuffer, RingError};
use crate::transcode::{TranscodeError, Transcoder};

const STAGED_SEGMENT_TAG: &str = "_seg";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("carousel is full")]
    RingFull,
    #[error("transcode failed: {0}")]
    Transcode(#[from] TranscodeError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("transcoder playlist unusable: {0}")]
    Playlist(#[from] PlaylistError),
    #[error("transcoder produced no segments")]
    NoSegments,
    #[error("playlist update still running after {0:?}")]
    TimedOut(Duration),
    #[error("ingest task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<RingError> for IngestError {
    fn from(e: RingError) -> Self {
        match e {
            RingError::CapacityExceeded(_) => IngestError::RingFull,
            RingError::EmptyRing => IngestError::Io(io::Error::other(e)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StagedSegment {
    pub duration_line: String,
    pub duration_secs: f64,
    pub file: PathBuf,
}

/// Transcoder output waiting to be copied into the segment directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StagedClip {
    pub segments: Vec<StagedSegment>,
}

impl StagedClip {
    /// Reads the transcoder's media playlist. Segments whose URI does not
    /// start with `prefix` are ignored; the rest keep document order.
    pub fn parse(text: &str, dir: &Path, prefix: &str) -> Result<Self, PlaylistError> {
        let playlist = m3u8_rs::parse_media_playlist_res(text.as_bytes())
            .map_err(|e| PlaylistError::Malformed(format!("transcoder playlist: {e}")))?;

        let mut segments = Vec::with_capacity(playlist.segments.len());
        for segment in playlist.segments {
            if !segment.uri.starts_with(prefix) {
                continue;
            }
            if segment.duration <= 0.0 {
                return Err(PlaylistError::Malformed(format!(
                    "{} has no {TAG_DURATION} duration",
                    segment.uri
                )));
            }
            let duration_secs = f64::from(segment.duration);
            segments.push(StagedSegment {
                duration_line: format!(
                    "{TAG_DURATION}{duration_secs:.6},{}",
                    segment.title.unwrap_or_default()
                ),
                duration_secs,
                file: dir.join(&segment.uri),
            });
        }

        Ok(Self { segments })
    }

    pub fn total_secs(&self) -> f64 {
        self.segments.iter().map(|s| s.duration_secs).sum()
    }
}

/// Copies a staged clip into the live stream. Runs under the carousel lock.
///
/// The clip takes its ring slot first. If copying the files or persisting
/// the playlist fails, the slot is given back and the copied files are
/// deleted, so the ring, the playlist and the directory stay in step.
pub(crate) fn splice_clip(
    ring: &mut RingBuffer<Clip>,
    carousel: &Carousel,
    staged: &StagedClip,
) -> Result<ClipInfo, IngestError> {
    if ring.is_full() {
        return Err(IngestError::RingFull);
    }
    if staged.segments.is_empty() {
        return Err(IngestError::NoSegments);
    }

    let playlist = match carousel.read_playlist() {
        Ok(p) if !p.lines().is_empty() => p,
        Ok(_) => Playlist::seeded(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::info!(path = %carousel.playlist_path().display(), "creating playlist");
            Playlist::seeded()
        }
        Err(e) => return Err(e.into()),
    };

    let segments = carousel.segments();
    std::fs::create_dir_all(segments.path())?;
    let start = segments
        .next_free_index()?
        .max(playlist.max_segment_index().map_or(0, |m| m + 1));
    let end = start + staged.segments.len() as u64 - 1;

    let first_clip = ring.is_empty();
    let clip = Clip::from_durations(start, end, staged.total_secs(), carousel.length_adjust());
    let info = clip.info();
    ring.append(clip)?;

    if let Err(e) = persist_clip(carousel, playlist, staged, start, first_clip) {
        ring.pop_tail()?;
        return Err(e);
    }

    tracing::info!(
        position = ring.len(),
        start = info.start_segment,
        end = info.end_segment,
        length_secs = info.length_secs,
        "clip added to carousel"
    );
    Ok(info)
}

/// Imports the staged files from `start` on and writes the extended
/// playlist. On failure every file imported here is removed again.
fn persist_clip(
    carousel: &Carousel,
    mut playlist: Playlist,
    staged: &StagedClip,
    start: u64,
    first_clip: bool,
) -> Result<(), IngestError> {
    let segments = carousel.segments();
    let mut lines = Vec::with_capacity(staged.segments.len() * 2);

    for (offset, segment) in staged.segments.iter().enumerate() {
        let index = start + offset as u64;
        if let Err(e) = segments.import(&segment.file, index) {
            segments.discard(start..index);
            return Err(e.into());
        }
        lines.push(segment.duration_line.clone());
        lines.push(segment_name(index));
    }

    playlist.append_clip(lines);
    playlist.update_target_duration();
    if first_clip {
        playlist.update_media_sequence(start);
    }
    if let Err(e) = carousel.write_playlist(&playlist) {
        segments.discard(start..start + staged.segments.len() as u64);
        return Err(e.into());
    }
    Ok(())
}

/// Turns an uploaded video into a new carousel clip.
pub struct Ingestor {
    carousel: Arc<Carousel>,
    transcoder: Transcoder,
    upload_dir: PathBuf,
    splice_timeout: Duration,
}

impl Ingestor {
    pub fn new(
        carousel: Arc<Carousel>,
        transcoder: Transcoder,
        upload_dir: PathBuf,
        splice_timeout: Duration,
    ) -> Self {
        Self {
            carousel,
            transcoder,
            upload_dir,
            splice_timeout,
        }
    }

    /// A [`IngestError::TimedOut`] splice keeps running in the background
    /// and may still add the clip.
    pub async fn ingest(&self, data: &[u8]) -> Result<ClipInfo, IngestError> {
        if self.carousel.is_full() {
            return Err(IngestError::RingFull);
        }

        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let key = Uuid::new_v4().to_string();

        let staged = match self.transcode(&key, data).await {
            Ok(staged) => staged,
            Err(e) => {
                self.discard_upload(key).await;
                return Err(e);
            }
        };

        // The staged files belong to the splice task from here on; it
        // removes them once the splice has finished, timed out or not.
        let carousel = Arc::clone(&self.carousel);
        let upload_dir = self.upload_dir.clone();
        let splice = tokio::task::spawn_blocking(move || {
            let result = carousel.splice(&staged);
            remove_staged(&upload_dir, &key);
            result
        });

        match tokio::time::timeout(self.splice_timeout, splice).await {
            Ok(result) => result?,
            Err(_) => Err(IngestError::TimedOut(self.splice_timeout)),
        }
    }

    async fn transcode(&self, key: &str, data: &[u8]) -> Result<StagedClip, IngestError> {
        let upload = self.upload_dir.join(format!("{key}_upload"));
        tokio::fs::write(&upload, data).await?;

        let prefix = format!("{key}{STAGED_SEGMENT_TAG}");
        let staged_playlist = self.upload_dir.join(format!("{prefix}.m3u8"));
        self.transcoder.to_hls(&upload, &staged_playlist).await?;

        let text = tokio::fs::read_to_string(&staged_playlist).await?;
        let staged = StagedClip::parse(&text, &self.upload_dir, &prefix)?;
        tracing::debug!(
            key = %key,
            segments = staged.segments.len(),
            total_secs = format!("{:.1}", staged.total_secs()),
            "transcoded upload"
        );
        Ok(staged)
    }

    async fn discard_upload(&self, key: String) {
        let dir = self.upload_dir.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || remove_staged(&dir, &key)).await {
            tracing::warn!(error = %e, "staged file cleanup did not run");
        }
    }
}

/// Removes every staged file belonging to one upload. Failures are logged.
fn remove_staged(dir: &Path, key: &str) {
    let read_dir = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "failed to list upload directory");
            return;
        }
    };

    for entry in read_dir.flatten() {
        if !entry.file_name().to_string_lossy().starts_with(key) {
            continue;
        }
        let path = entry.path();
        if let Err(e) = std::fs::remove_file(&path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove staged file");
        }
    }
}
