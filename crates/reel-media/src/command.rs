//! FFmpeg command builder and the render engine seam.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Bytes of engine stderr kept as the failure diagnostic.
const STDERR_TAIL_BYTES: usize = 4096;

/// Engine verbosity passed with `-v`.
const ENGINE_LOG_LEVEL: &str = "error";

/// Locations of the external media tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaToolConfig {
    pub ffmpeg_bin: PathBuf,
    pub ffprobe_bin: PathBuf,
}

impl Default for MediaToolConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            ffprobe_bin: PathBuf::from("ffprobe"),
        }
    }
}

impl MediaToolConfig {
    /// Configure both binaries explicitly.
    pub fn new(ffmpeg_bin: impl Into<PathBuf>, ffprobe_bin: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
            ffprobe_bin: ffprobe_bin.into(),
        }
    }

    /// Configure ffmpeg; ffprobe is looked up next to it when it exists there.
    pub fn from_ffmpeg(ffmpeg_bin: impl Into<PathBuf>) -> Self {
        let ffmpeg_bin = ffmpeg_bin.into();
        let ffprobe_bin = sibling_ffprobe(&ffmpeg_bin).unwrap_or_else(|| PathBuf::from("ffprobe"));
        Self {
            ffmpeg_bin,
            ffprobe_bin,
        }
    }

    /// Resolve the ffmpeg binary on PATH or as an explicit path.
    pub fn resolve_ffmpeg(&self) -> MediaResult<PathBuf> {
        which::which(&self.ffmpeg_bin)
            .map_err(|_| MediaError::FfmpegNotFound(self.ffmpeg_bin.clone()))
    }

    /// Resolve the ffprobe binary on PATH or as an explicit path.
    pub fn resolve_ffprobe(&self) -> MediaResult<PathBuf> {
        which::which(&self.ffprobe_bin)
            .map_err(|_| MediaError::FfprobeNotFound(self.ffprobe_bin.clone()))
    }
}

fn sibling_ffprobe(ffmpeg_bin: &Path) -> Option<PathBuf> {
    let parent = ffmpeg_bin.parent().filter(|p| !p.as_os_str().is_empty())?;
    let name = match ffmpeg_bin.extension() {
        Some(ext) => format!("ffprobe.{}", ext.to_string_lossy()),
        None => "ffprobe".to_string(),
    };
    let candidate = parent.join(name);
    candidate.is_file().then_some(candidate)
}

/// A single `-i` input with its input-side options.
#[derive(Debug, Clone, PartialEq)]
struct FfmpegInput {
    /// Arguments placed before `-i`
    args: Vec<String>,
    /// Path or lavfi source expression
    source: String,
}

/// Builder for FFmpeg commands with any number of inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegCommand {
    inputs: Vec<FfmpegInput>,
    output: PathBuf,
    /// Global arguments placed before the first input
    global_args: Vec<String>,
    filter_complex: Option<String>,
    maps: Vec<String>,
    /// Output arguments (after inputs and maps)
    output_args: Vec<String>,
    overwrite: bool,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command writing to `output`.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            global_args: Vec::new(),
            filter_complex: None,
            maps: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
        }
    }

    /// Add a plain file input.
    pub fn input(self, path: impl AsRef<Path>) -> Self {
        self.input_with(Vec::<String>::new(), path)
    }

    /// Add a file input with input-side options.
    pub fn input_with<I, S>(mut self, args: I, path: impl AsRef<Path>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push(FfmpegInput {
            args: args.into_iter().map(Into::into).collect(),
            source: path.as_ref().to_string_lossy().to_string(),
        });
        self
    }

    /// Add a file input that repeats indefinitely.
    pub fn looped_input(self, path: impl AsRef<Path>) -> Self {
        self.input_with(["-stream_loop", "-1"], path)
    }

    /// Add a synthetic lavfi source, optionally bounded in time.
    pub fn lavfi_input(mut self, expr: impl Into<String>, duration: Option<f64>) -> Self {
        let mut args = vec!["-f".to_string(), "lavfi".to_string()];
        if let Some(secs) = duration.filter(|d| d.is_finite() && *d > 0.0) {
            args.push("-t".to_string());
            args.push(format_seconds(secs));
        }
        self.inputs.push(FfmpegInput {
            args,
            source: expr.into(),
        });
        self
    }

    /// Number of inputs added so far; the next input gets this index.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Add a global argument (before inputs).
    pub fn global_arg(mut self, arg: impl Into<String>) -> Self {
        self.global_args.push(arg.into());
        self
    }

    /// Set the filter complex.
    pub fn filter_complex(mut self, graph: impl Into<String>) -> Self {
        self.filter_complex = Some(graph.into());
        self
    }

    /// Map a stream or filter output label.
    pub fn map(mut self, spec: impl Into<String>) -> Self {
        self.maps.push(spec.into());
        self
    }

    /// Add an output argument.
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Drop audio from the output.
    pub fn no_audio(self) -> Self {
        self.output_arg("-an")
    }

    /// Stop at the end of the shortest stream.
    pub fn shortest(self) -> Self {
        self.output_arg("-shortest")
    }

    /// Output path.
    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// The filter complex, if any.
    pub fn filter_graph(&self) -> Option<&str> {
        self.filter_complex.as_deref()
    }

    /// Mapped stream specifiers, in order.
    pub fn maps(&self) -> &[String] {
        &self.maps
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-hide_banner".to_string());
        args.push("-v".to_string());
        args.push(ENGINE_LOG_LEVEL.to_string());

        args.extend(self.global_args.iter().cloned());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.source.clone());
        }

        if let Some(graph) = &self.filter_complex {
            args.push("-filter_complex".to_string());
            args.push(graph.clone());
        }

        for map in &self.maps {
            args.push("-map".to_string());
            args.push(map.clone());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Format seconds with millisecond precision.
pub fn format_seconds(seconds: f64) -> String {
    format!("{:.3}", seconds)
}

/// The external transcoder that executes a built command.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Run the command to completion; a non-zero exit is an error.
    async fn render(&self, cmd: &FfmpegCommand) -> MediaResult<()>;
}

/// Render engine backed by the ffmpeg CLI.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    ffmpeg_bin: PathBuf,
    timeout_secs: Option<u64>,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new(&MediaToolConfig::default())
    }
}

impl FfmpegRunner {
    /// Create a runner for the configured ffmpeg binary.
    pub fn new(tools: &MediaToolConfig) -> Self {
        Self {
            ffmpeg_bin: tools.ffmpeg_bin.clone(),
            timeout_secs: None,
        }
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

#[async_trait]
impl RenderEngine for FfmpegRunner {
    async fn render(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        let ffmpeg = which::which(&self.ffmpeg_bin)
            .map_err(|_| MediaError::FfmpegNotFound(self.ffmpeg_bin.clone()))?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: {} {}", ffmpeg.display(), args.join(" "));

        let mut child = Command::new(&ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("ffmpeg stderr was not captured"))?;
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            buf
        });

        let status = match self.timeout_secs {
            Some(secs) => {
                let limit = std::time::Duration::from_secs(secs);
                match tokio::time::timeout(limit, child.wait()).await {
                    Ok(status) => status?,
                    Err(_) => {
                        warn!("FFmpeg timed out after {} seconds, killing process", secs);
                        let _ = child.kill().await;
                        return Err(MediaError::Timeout(secs));
                    }
                }
            }
            None => child.wait().await?,
        };

        let stderr = stderr_task.await.unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::render_failed(
                "FFmpeg exited with non-zero status",
                Some(stderr_tail(&stderr)),
                status.code(),
            ))
        }
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&stderr[start..]).trim().to_string()
}
