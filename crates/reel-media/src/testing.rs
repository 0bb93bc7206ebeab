//! In-process fakes for the render engine and prober.

use async_trait::async_trait;
use reel_models::MediaAsset;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use crate::command::{FfmpegCommand, RenderEngine};
use crate::error::{MediaError, MediaResult};
use crate::probe::MediaProber;

/// Records every command and writes placeholder bytes to its output.
#[derive(Default)]
pub struct FakeEngine {
    pub commands: Mutex<Vec<FfmpegCommand>>,
    /// Output file names whose render exits non-zero
    pub failing_outputs: HashSet<String>,
    /// Output file names that "succeed" without writing anything
    pub silent_outputs: HashSet<String>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, file_name: &str) -> Self {
        self.failing_outputs.insert(file_name.to_string());
        self
    }

    pub fn silent(mut self, file_name: &str) -> Self {
        self.silent_outputs.insert(file_name.to_string());
        self
    }

    pub fn recorded(&self) -> Vec<FfmpegCommand> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl RenderEngine for FakeEngine {
    async fn render(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.commands.lock().unwrap().push(cmd.clone());
        let name = file_name(cmd.output_path());
        if self.failing_outputs.contains(&name) {
            return Err(MediaError::render_failed(
                "FFmpeg exited with non-zero status",
                Some("Conversion failed!".into()),
                Some(1),
            ));
        }
        if !self.silent_outputs.contains(&name) {
            tokio::fs::write(cmd.output_path(), b"rendered").await?;
        }
        Ok(())
    }
}

/// Returns configured snapshots keyed by file name.
#[derive(Default)]
pub struct FakeProber {
    assets: Mutex<HashMap<String, MediaAsset>>,
}

impl FakeProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, file_name: &str, asset: MediaAsset) -> Self {
        self.assets.lock().unwrap().insert(file_name.to_string(), asset);
        self
    }
}

#[async_trait]
impl MediaProber for FakeProber {
    async fn probe(&self, path: &Path) -> MediaAsset {
        match self.assets.lock().unwrap().get(&file_name(path)) {
            Some(asset) => MediaAsset {
                path: path.to_path_buf(),
                ..asset.clone()
            },
            None => MediaAsset::unreadable(path),
        }
    }
}

/// Snapshot with the given topology at 1080x1920, 30 fps.
pub fn asset(has_video: bool, has_audio: bool, duration_sec: f64) -> MediaAsset {
    MediaAsset {
        path: "placeholder".into(),
        has_video,
        has_audio,
        duration_sec,
        width: if has_video { 1080 } else { 0 },
        height: if has_video { 1920 } else { 0 },
        fps: if has_video { 30.0 } else { 0.0 },
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
