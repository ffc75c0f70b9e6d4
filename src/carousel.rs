use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tokio::sync::watch;

use crate::config::StreamConfig;
use crate::ingest::{self, IngestError, StagedClip};
use crate::playlist::Playlist;
use crate::ring::{Clip, ClipDescriptor, ClipInfo, RingBuffer, RingError};
use crate::rotation::{self, RotationError, RotationOutcome};
use crate::segments::SegmentDir;

#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("failed to read playlist: {0}")]
    Io(#[from] io::Error),
    #[error("failed to restore clip: {0}")]
    Ring(#[from] RingError),
}

/// The looping stream: clip ring, live playlist and segment directory.
///
/// One mutex covers all three. Rotation and ingestion both read-modify-write
/// the playlist and the directory as a whole, so they run strictly one after
/// the other, on the blocking pool. Async callers only read `published`, the
/// head-to-tail clip list as of the last finished operation.
pub struct Carousel {
    ring: Mutex<RingBuffer<Clip>>,
    published: watch::Sender<Vec<ClipInfo>>,
    capacity: usize,
    segments: SegmentDir,
    playlist_path: PathBuf,
    length_adjust: f64,
}

impl Carousel {
    pub fn new(config: &StreamConfig) -> Arc<Self> {
        let (published, _) = watch::channel(Vec::new());
        Arc::new(Self {
            ring: Mutex::new(RingBuffer::new(config.capacity)),
            published,
            capacity: config.capacity,
            segments: SegmentDir::new(config.hls_dir.clone()),
            playlist_path: config.playlist_path(),
            length_adjust: config.length_adjust,
        })
    }

    /// Blocks until any rotation or splice in progress is done.
    pub(crate) fn lock(&self) -> MutexGuard<'_, RingBuffer<Clip>> {
        // No ring operation can panic halfway through relinking, so a
        // poisoned ring is still consistent.
        self.ring.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, ring: &RingBuffer<Clip>) {
        let clips = match ring.display() {
            Ok(clips) => clips.into_iter().map(ClipDescriptor::info).collect(),
            Err(_) => Vec::new(),
        };
        self.published.send_replace(clips);
    }

    pub fn segments(&self) -> &SegmentDir {
        &self.segments
    }

    pub fn playlist_path(&self) -> &Path {
        &self.playlist_path
    }

    pub fn length_adjust(&self) -> f64 {
        self.length_adjust
    }

    pub fn is_full(&self) -> bool {
        self.published.borrow().len() >= self.capacity
    }

    /// Clips head-to-tail; empty before the first upload.
    pub fn clips(&self) -> Vec<ClipInfo> {
        self.published.borrow().to_vec()
    }

    pub fn head_length(&self) -> Option<u64> {
        self.published.borrow().first().map(|clip| clip.length_secs)
    }

    /// Runs one rotation cycle while holding the lock.
    pub fn rotate(&self) -> Result<RotationOutcome, RotationError> {
        let mut ring = self.lock();
        let outcome = rotation::rotate_cycle(&mut ring, self);
        self.publish(&ring);
        outcome
    }

    /// Copies a transcoded clip in and appends it, while holding the lock.
    pub fn splice(&self, staged: &StagedClip) -> Result<ClipInfo, IngestError> {
        let mut ring = self.lock();
        let info = ingest::splice_clip(&mut ring, self, staged);
        self.publish(&ring);
        info
    }

    /// Rebuilds the ring from the playlist left by a previous run.
    pub fn reload(&self) -> Result<usize, ReloadError> {
        let playlist = match self.read_playlist() {
            Ok(p) => p,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!(
                    path = %self.playlist_path.display(),
                    "no playlist yet, starting with an empty carousel"
                );
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };

        let mut ring = self.lock();
        let restored = restore(&mut ring, &playlist, self.length_adjust);
        self.publish(&ring);
        restored
    }

    /// The live playlist closed with an end-of-list marker, or `None` before
    /// the first upload.
    pub fn snapshot(&self) -> io::Result<Option<String>> {
        match self.read_playlist() {
            Ok(playlist) => Ok(Some(playlist.finalized())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub(crate) fn read_playlist(&self) -> io::Result<Playlist> {
        let text = std::fs::read_to_string(&self.playlist_path)?;
        Ok(Playlist::live(&text))
    }

    /// Replaces the playlist through a sibling temp file so HTTP readers
    /// never see a partial document.
    pub(crate) fn write_playlist(&self, playlist: &Playlist) -> io::Result<()> {
        let temp = temp_path_for(&self.playlist_path);
        std::fs::write(&temp, playlist.render())?;
        std::fs::rename(&temp, &self.playlist_path)
    }
}

fn restore(
    ring: &mut RingBuffer<Clip>,
    playlist: &Playlist,
    length_adjust: f64,
) -> Result<usize, ReloadError> {
    for span in playlist.clips() {
        let clip = Clip::from_durations(
            span.start_segment,
            span.end_segment,
            span.total_secs,
            length_adjust,
        );
        ring.append(clip)?;
        tracing::info!(
            position = ring.len(),
            start = span.start_segment,
            end = span.end_segment,
            total_secs = format!("{:.1}", span.total_secs),
            "restored clip"
        );
    }
    Ok(ring.len())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut temp = path.to_path_buf();
    temp.set_extension("m3u8.tmp");
    temp
}
