use std::io;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;

use crate::carousel::Carousel;
use crate::playlist::{relocate_clip, PlaylistError};
use crate::ring::{Clip, ClipDescriptor, ClipInfo, RingBuffer, RingError};
use crate::segments::RenameError;

#[derive(Debug, Error)]
pub enum RotationError {
    #[error("playlist io error: {0}")]
    PlaylistIo(#[from] io::Error),
    #[error(transparent)]
    Malformed(#[from] PlaylistError),
    #[error("segment rename failed: {0}")]
    SegmentRename(#[from] RenameError),
    #[error(transparent)]
    Ring(#[from] RingError),
    #[error("rotation cycle did not finish within {0:?}")]
    TimedOut(Duration),
    #[error("rotation task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationOutcome {
    /// Fewer than two clips; nothing to cycle past.
    Skipped,
    /// `moved` is the former head under its new range, `head` the clip now
    /// playing first.
    Rotated { moved: ClipInfo, head: ClipInfo },
}

/// One rotation: move the head clip's playlist block and files to the end
/// under fresh numbers, then advance the ring.
///
/// The caller holds the carousel lock. Nothing in the ring changes until the
/// files are renamed and the playlist is persisted, so a failed cycle leaves
/// the ring and the playlist as they were.
pub(crate) fn rotate_cycle(
    ring: &mut RingBuffer<Clip>,
    carousel: &Carousel,
) -> Result<RotationOutcome, RotationError> {
    if ring.len() < 2 {
        return Ok(RotationOutcome::Skipped);
    }

    let playlist = carousel.read_playlist()?;
    let current = ring.head().ok_or(RingError::EmptyRing)?.info();
    let next_head = ring.iter().nth(1).ok_or(RingError::EmptyRing)?.info();

    let segments = carousel.segments();
    let next_free = segments
        .next_free_index()?
        .max(playlist.max_segment_index().map_or(0, |m| m + 1));

    let relocation = relocate_clip(
        &playlist,
        current.start_segment,
        current.end_segment,
        next_free,
    )?;
    let (new_start, new_end) = relocation.new_range().ok_or_else(|| {
        PlaylistError::Malformed(format!(
            "clip {}..={} has no segment lines",
            current.start_segment, current.end_segment
        ))
    })?;

    tracing::debug!(
        start = current.start_segment,
        end = current.end_segment,
        first_free = relocation.first_free,
        "relocating head clip"
    );
    segments.apply(&relocation.renames)?;

    let mut rewritten = relocation.playlist;
    rewritten.update_target_duration();
    rewritten.update_media_sequence(next_head.start_segment);

    if let Err(e) = carousel.write_playlist(&rewritten) {
        if let Err(revert) = segments.revert(&relocation.renames) {
            tracing::error!(
                error = %revert,
                "failed to revert segment renames, playlist and directory disagree"
            );
        }
        return Err(e.into());
    }

    let head = ring.head_mut().ok_or(RingError::EmptyRing)?;
    head.update(new_start, new_end);
    let moved = head.info();
    ring.rotate()?;

    Ok(RotationOutcome::Rotated {
        moved,
        head: next_head,
    })
}

/// Background timer that rotates the carousel once per head clip.
///
/// The delay is re-armed after every tick from the clip that just became
/// head, so each clip plays through once before it is moved to the back.
pub struct RotationScheduler {
    carousel: Arc<Carousel>,
    initial_period: Duration,
    cycle_timeout: Duration,
}

impl RotationScheduler {
    pub fn new(carousel: Arc<Carousel>, initial_period: Duration, cycle_timeout: Duration) -> Self {
        Self {
            carousel,
            initial_period,
            cycle_timeout,
        }
    }

    /// Ticks until `shutdown` flips or its sender goes away. A cycle already
    /// running when the signal arrives is finished first.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut period = self.first_period();
        tracing::info!(
            period_secs = period.as_secs(),
            clips = self.carousel.clips().len(),
            "rotation scheduler started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(period) => {}
                _ = shutdown.changed() => break,
            }
            period = self.tick(period).await;
        }

        tracing::info!("rotation scheduler stopped");
    }

    /// A head restored at startup plays for its own length; an empty
    /// carousel waits the configured initial period.
    fn first_period(&self) -> Duration {
        self.carousel
            .head_length()
            .map(Duration::from_secs)
            .unwrap_or(self.initial_period)
    }

    /// Runs one cycle and returns the delay before the next one.
    pub async fn tick(&self, period: Duration) -> Duration {
        let carousel = Arc::clone(&self.carousel);
        let cycle = tokio::task::spawn_blocking(move || carousel.rotate());

        let result = match tokio::time::timeout(self.cycle_timeout, cycle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(RotationError::Join(e)),
            Err(_) => Err(RotationError::TimedOut(self.cycle_timeout)),
        };

        match result {
            Ok(RotationOutcome::Skipped) => {
                tracing::trace!("fewer than two clips, rotation skipped");
                period
            }
            Ok(RotationOutcome::Rotated { moved, head }) => {
                tracing::info!(
                    moved_start = moved.start_segment,
                    moved_end = moved.end_segment,
                    head_start = head.start_segment,
                    head_end = head.end_segment,
                    period_secs = head.length_secs,
                    "rotated carousel"
                );
                Duration::from_secs(head.length_secs)
            }
            Err(e @ RotationError::TimedOut(_)) => {
                // The blocking cycle keeps the lock until it completes.
                tracing::error!(error = %e, "rotation stalled");
                period
            }
            Err(e) => {
                tracing::error!(error = %e, "rotation failed, retrying next tick");
                self.carousel
                    .head_length()
                    .map(Duration::from_secs)
                    .unwrap_or(period)
            }
        }
    }
}
