use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("stream.capacity must be at least 1")]
    ZeroCapacity,
    #[error("stream.initial_period_secs must be at least 1")]
    ZeroPeriod,
    #[error("stream.length_adjust must be positive, got {0}")]
    InvalidLengthAdjust(f64),
    #[error("transcode.segment_secs must be at least 1")]
    ZeroSegmentLength,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_hls_dir")]
    pub hls_dir: PathBuf,
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default = "default_playlist")]
    pub playlist: String,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_initial_period")]
    pub initial_period_secs: u64,
    #[serde(default = "default_length_adjust")]
    pub length_adjust: f64,
    #[serde(default = "default_io_timeout")]
    pub io_timeout_secs: u64,
}

fn default_hls_dir() -> PathBuf {
    PathBuf::from("static/hls")
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("upload_video_tmp")
}

fn default_playlist() -> String {
    "playlist.m3u8".to_string()
}

fn default_capacity() -> usize {
    10
}

fn default_initial_period() -> u64 {
    10
}

fn default_length_adjust() -> f64 {
    1.4
}

fn default_io_timeout() -> u64 {
    30
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            hls_dir: default_hls_dir(),
            upload_dir: default_upload_dir(),
            playlist: default_playlist(),
            capacity: default_capacity(),
            initial_period_secs: default_initial_period(),
            length_adjust: default_length_adjust(),
            io_timeout_secs: default_io_timeout(),
        }
    }
}

impl StreamConfig {
    pub fn playlist_path(&self) -> PathBuf {
        self.hls_dir.join(&self.playlist)
    }

    pub fn initial_period(&self) -> Duration {
        Duration::from_secs(self.initial_period_secs)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_segment_secs() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscodeConfig {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    #[serde(default = "default_segment_secs")]
    pub segment_secs: u32,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            segment_secs: default_segment_secs(),
        }
    }
}

fn default_http_port() -> u16 {
    18080
}

fn default_max_upload_mb() -> usize {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: default_http_port(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub transcode: TranscodeConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        match Self::load_from(DEFAULT_CONFIG_PATH) {
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no {} found, using defaults", DEFAULT_CONFIG_PATH);
                let config = Config::default();
                config.validate()?;
                Ok(config)
            }
            other => other,
        }
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.stream.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.stream.initial_period_secs == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        if self.stream.length_adjust.is_nan() || self.stream.length_adjust <= 0.0 {
            return Err(ConfigError::InvalidLengthAdjust(self.stream.length_adjust));
        }
        if self.transcode.segment_secs == 0 {
            return Err(ConfigError::ZeroSegmentLength);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.stream.capacity, 10);
        assert_eq!(config.stream.initial_period_secs, 10);
        assert_eq!(config.http.port, 18080);
        assert_eq!(
            config.stream.playlist_path(),
            PathBuf::from("static/hls/playlist.m3u8")
        );
    }

    #[test]
    fn test_partial_section() {
        let config = Config::parse(
            "[stream]\ncapacity = 3\nhls_dir = \"/srv/hls\"\n\n[transcode]\nsegment_secs = 4\n",
        )
        .unwrap();
        assert_eq!(config.stream.capacity, 3);
        assert_eq!(config.stream.hls_dir, PathBuf::from("/srv/hls"));
        assert_eq!(config.stream.length_adjust, 1.4);
        assert_eq!(config.transcode.segment_secs, 4);
        assert_eq!(config.transcode.ffmpeg, "ffmpeg");
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let err = Config::parse("[stream]\ncapacity = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ZeroCapacity));
    }

    #[test]
    fn test_rejects_bad_length_adjust() {
        let err = Config::parse("[stream]\nlength_adjust = -1.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLengthAdjust(_)));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            Config::parse("[stream\n"),
            Err(ConfigError::Parse(_))
        ));
    }
}
