//! Worker configuration.

use reel_media::{CaptionConfig, MediaToolConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Upper bound on a whole job, including repair and remix
    pub job_timeout: Duration,
    /// Upper bound on a single ffmpeg invocation; unbounded when unset
    pub render_timeout: Option<Duration>,
    /// Grace period for in-flight jobs on shutdown
    pub shutdown_timeout: Duration,
    /// Parent directory for per-job working directories
    pub work_dir: PathBuf,
    /// Where outputs land when a job file names none
    pub output_dir: PathBuf,
    /// ffmpeg/ffprobe locations
    pub tools: MediaToolConfig,
    /// Caption regrouping limits
    pub captions: CaptionConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            job_timeout: Duration::from_secs(3600), // 1 hour
            render_timeout: None,
            shutdown_timeout: Duration::from_secs(30),
            work_dir: std::env::temp_dir().join("reel"),
            output_dir: PathBuf::from("./exports"),
            tools: MediaToolConfig::default(),
            captions: CaptionConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from any key/value source; unset or unparsable keys keep their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());

        let tools = match (lookup("FFMPEG_BIN"), lookup("FFPROBE_BIN")) {
            (Some(ffmpeg), Some(ffprobe)) => MediaToolConfig::new(ffmpeg, ffprobe),
            (Some(ffmpeg), None) => MediaToolConfig::from_ffmpeg(ffmpeg),
            (None, Some(ffprobe)) => MediaToolConfig::new("ffmpeg", ffprobe),
            (None, None) => MediaToolConfig::default(),
        };

        let captions = CaptionConfig {
            max_chars: lookup("REEL_CAPTION_MAX_CHARS")
                .and_then(|s| s.trim().parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.captions.max_chars),
            max_duration_secs: lookup("REEL_CAPTION_MAX_SECS")
                .and_then(|s| s.trim().parse().ok())
                .filter(|n: &f64| n.is_finite() && *n > 0.0)
                .unwrap_or(defaults.captions.max_duration_secs),
            ..defaults.captions
        };

        Self {
            max_concurrent_jobs: parsed("REEL_MAX_JOBS")
                .map(|n| n as usize)
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            job_timeout: parsed("REEL_JOB_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.job_timeout),
            render_timeout: parsed("REEL_RENDER_TIMEOUT_SECS")
                .filter(|n| *n > 0)
                .map(Duration::from_secs),
            shutdown_timeout: parsed("REEL_SHUTDOWN_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_timeout),
            work_dir: lookup("REEL_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            output_dir: lookup("REEL_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            tools,
            captions,
        }
    }
}
