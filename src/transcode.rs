use std::path::Path;
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;

use crate::config::TranscodeConfig;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ffmpeg not found")]
    FfmpegNotFound,
    #[error("ffmpeg failed: {0}")]
    FfmpegFailed(String),
}

/// Splits an uploaded video into HLS segments without re-encoding.
#[derive(Debug, Clone)]
pub struct Transcoder {
    ffmpeg: String,
    segment_secs: u32,
}

impl Transcoder {
    pub fn new(config: &TranscodeConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg.clone(),
            segment_secs: config.segment_secs,
        }
    }

    /// Writes `output` (an `.m3u8`) plus `<output stem><N>.ts` segments,
    /// numbered from zero, next to it.
    pub async fn to_hls(&self, input: &Path, output: &Path) -> Result<(), TranscodeError> {
        let segment_secs = self.segment_secs.to_string();
        tracing::debug!(input = %input.display(), output = %output.display(), "starting ffmpeg");

        let result = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-i"])
            .arg(input)
            .args([
                "-c:v",
                "copy", // No re-encoding
                "-c:a",
                "copy",
                "-start_number",
                "0",
                "-hls_time",
                segment_secs.as_str(),
                "-hls_list_size",
                "0", // Keep every segment in the playlist
                "-f",
                "hls",
            ])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await;

        let output = match result {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TranscodeError::FfmpegNotFound)
            }
            Err(e) => return Err(TranscodeError::Io(e)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(status = %output.status, stderr = %stderr.trim(), "ffmpeg exited with error");
            return Err(TranscodeError::FfmpegFailed(format!(
                "exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}
