//! Stream repair and synthesis of missing tracks.
//!
//! Every step writes a new file into the job's working directory and the
//! result is probed again; the caller's input is never modified.

use reel_models::MediaAsset;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use crate::command::{FfmpegCommand, RenderEngine};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::verify_output;
use crate::probe::MediaProber;

const HEAD_BYTES: u64 = 8192;
const HTML_SNIFF_BYTES: usize = 1024;

/// Parameters of synthesized companion tracks.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub color: String,
    pub sample_rate: u32,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1080,
            fps: 30,
            color: "black".to_string(),
            sample_rate: 48000,
        }
    }
}

/// A repair step that was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairAction {
    Remuxed,
    SynthesizedSilence,
    SynthesizedVideo,
}

impl RepairAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepairAction::Remuxed => "remux",
            RepairAction::SynthesizedSilence => "synthesize_audio",
            RepairAction::SynthesizedVideo => "synthesize_video",
        }
    }
}

/// The repaired asset and how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairedAsset {
    pub asset: MediaAsset,
    pub actions: Vec<RepairAction>,
}

/// Turns an arbitrary input into an asset the graph builder can work with.
pub struct Repairer<'a> {
    engine: &'a dyn RenderEngine,
    prober: &'a dyn MediaProber,
    synthesis: SynthesisConfig,
}

impl<'a> Repairer<'a> {
    pub fn new(engine: &'a dyn RenderEngine, prober: &'a dyn MediaProber) -> Self {
        Self {
            engine,
            prober,
            synthesis: SynthesisConfig::default(),
        }
    }

    pub fn with_synthesis(mut self, synthesis: SynthesisConfig) -> Self {
        self.synthesis = synthesis;
        self
    }

    /// Validate, remux if needed and fill in missing tracks.
    ///
    /// Silent audio is only synthesized when no music will be mixed in.
    pub async fn repair(
        &self,
        input: &Path,
        workdir: &Path,
        music_supplied: bool,
    ) -> MediaResult<RepairedAsset> {
        check_media_file(input).await?;

        let mut actions = Vec::new();
        let mut asset = self.prober.probe(input).await;

        if asset.has_no_streams() {
            warn!("No streams detected in {}, attempting remux", input.display());
            let remuxed = workdir.join("remuxed.mp4");
            match self.remux(input, &remuxed).await {
                Ok(()) => {
                    asset = self.prober.probe(&remuxed).await;
                    actions.push(RepairAction::Remuxed);
                }
                Err(e) => warn!("Remux failed: {}", e.detailed_message()),
            }
            if asset.has_no_streams() {
                return Err(MediaError::NoStreams(input.to_path_buf()));
            }
        }

        if !asset.has_video && asset.has_audio {
            info!("Input has no video, synthesizing a {} frame", self.synthesis.color);
            asset = self
                .synthesize(&asset, workdir.join("with_video.mp4"), Track::Video)
                .await?;
            actions.push(RepairAction::SynthesizedVideo);
        } else if asset.has_video && !asset.has_audio && !music_supplied {
            info!("Input has no audio, synthesizing silence");
            asset = self
                .synthesize(&asset, workdir.join("with_audio.mp4"), Track::Audio)
                .await?;
            actions.push(RepairAction::SynthesizedSilence);
        }

        debug!(
            "Repaired asset {}: video={}, audio={}, duration={:.3}",
            asset.path.display(),
            asset.has_video,
            asset.has_audio,
            asset.duration_sec
        );
        Ok(RepairedAsset { asset, actions })
    }

    async fn remux(&self, input: &Path, output: &Path) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(output)
            .global_arg("-analyzeduration")
            .global_arg("200M")
            .global_arg("-probesize")
            .global_arg("200M")
            .global_arg("-fflags")
            .global_arg("+genpts")
            .input(input)
            .output_args(["-c", "copy", "-movflags", "+faststart"]);
        self.engine.render(&cmd).await?;
        verify_output(output).await?;
        Ok(())
    }

    async fn synthesize(
        &self,
        asset: &MediaAsset,
        output: PathBuf,
        missing: Track,
    ) -> MediaResult<MediaAsset> {
        let duration = asset.known_duration();
        let cmd = match missing {
            Track::Audio => FfmpegCommand::new(&output)
                .input(&asset.path)
                .lavfi_input(
                    format!("anullsrc=r={}:cl=stereo", self.synthesis.sample_rate),
                    duration,
                )
                .map("0:v:0")
                .map("1:a:0")
                .video_codec("copy")
                .audio_codec("aac")
                .output_args(["-b:a", "192k"]),
            Track::Video => FfmpegCommand::new(&output)
                .lavfi_input(
                    format!(
                        "color=size={}x{}:rate={}:color={}",
                        self.synthesis.width,
                        self.synthesis.height,
                        self.synthesis.fps,
                        self.synthesis.color
                    ),
                    duration,
                )
                .input(&asset.path)
                .map("0:v:0")
                .map("1:a:0")
                .video_codec("libx264")
                .output_args(["-pix_fmt", "yuv420p"])
                .audio_codec("aac")
                .output_args(["-b:a", "192k"]),
        }
        .shortest();

        self.engine.render(&cmd).await?;
        verify_output(&output).await?;

        let synthesized = self.prober.probe(&output).await;
        if !synthesized.has_both_streams() {
            return Err(MediaError::render_failed(
                format!("synthesized file is missing a track: {}", output.display()),
                None,
                None,
            ));
        }
        Ok(synthesized)
    }
}

#[derive(Debug, Clone, Copy)]
enum Track {
    Audio,
    Video,
}

/// Reject empty files and HTML error pages before probing.
pub async fn check_media_file(path: &Path) -> MediaResult<()> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|_| MediaError::invalid_input(format!("file not found: {}", path.display())))?;
    if !meta.is_file() || meta.len() == 0 {
        return Err(MediaError::invalid_input(format!(
            "file is empty: {}",
            path.display()
        )));
    }

    let file = tokio::fs::File::open(path).await?;
    let mut head = Vec::with_capacity(HEAD_BYTES as usize);
    file.take(HEAD_BYTES).read_to_end(&mut head).await?;

    if looks_like_html(&head) {
        return Err(MediaError::invalid_input(format!(
            "file is an HTML page, not media: {}",
            path.display()
        )));
    }
    if has_mp4_signature(&head) {
        debug!("{} carries an MP4 ftyp box", path.display());
    }
    Ok(())
}

/// Case-insensitive `<html` / `<!doctype` in the first kilobyte.
pub fn looks_like_html(head: &[u8]) -> bool {
    let sniff = &head[..head.len().min(HTML_SNIFF_BYTES)];
    let text = String::from_utf8_lossy(sniff).to_lowercase();
    text.contains("<html") || text.contains("<!doctype")
}

fn has_mp4_signature(head: &[u8]) -> bool {
    head.windows(4).any(|w| w == b"ftyp")
}
