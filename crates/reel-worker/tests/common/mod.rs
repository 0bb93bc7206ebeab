//! Fakes shared by the worker integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use reel_media::{FfmpegCommand, MediaError, MediaProber, MediaResult, RenderEngine, RenderExecutor};
use reel_models::MediaAsset;
use reel_worker::{JobExecutor, WorkerConfig};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Writes placeholder bytes to every output after an optional delay.
#[derive(Default)]
pub struct FakeEngine {
    pub delay: Duration,
    pub failing_outputs: HashSet<String>,
    pub commands: Mutex<Vec<FfmpegCommand>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, file_name: &str) -> Self {
        self.failing_outputs.insert(file_name.to_string());
        self
    }

    /// Highest number of renders observed running at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn render_count(&self) -> usize {
        self.commands.lock().unwrap().len()
    }
}

#[async_trait]
impl RenderEngine for FakeEngine {
    async fn render(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.commands.lock().unwrap().push(cmd.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let result = if self.failing_outputs.contains(&file_name(cmd.output_path())) {
            Err(MediaError::render_failed(
                "FFmpeg exited with non-zero status",
                Some("Invalid data found when processing input".into()),
                Some(1),
            ))
        } else {
            tokio::fs::write(cmd.output_path(), b"rendered")
                .await
                .map_err(MediaError::from)
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Returns configured snapshots keyed by file name.
#[derive(Default)]
pub struct FakeProber {
    assets: HashMap<String, MediaAsset>,
}

impl FakeProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, file_name: &str, asset: MediaAsset) -> Self {
        self.assets.insert(file_name.to_string(), asset);
        self
    }
}

#[async_trait]
impl MediaProber for FakeProber {
    async fn probe(&self, path: &Path) -> MediaAsset {
        match self.assets.get(&file_name(path)) {
            Some(asset) => MediaAsset {
                path: path.to_path_buf(),
                ..asset.clone()
            },
            None => MediaAsset::unreadable(path),
        }
    }
}

/// Portrait 1080x1920 at 30 fps.
pub fn asset(has_video: bool, has_audio: bool, duration_sec: f64) -> MediaAsset {
    MediaAsset {
        path: PathBuf::from("placeholder"),
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

/// Scratch layout: a source file plus work and output directories.
pub struct Workspace {
    pub dir: TempDir,
    pub input: PathBuf,
}

impl Workspace {
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.mp4");
        tokio::fs::write(&input, b"\x00\x00\x00\x18ftypmp42").await.unwrap();
        Self { dir, input }
    }

    pub fn config(&self, max_jobs: usize) -> WorkerConfig {
        WorkerConfig {
            max_concurrent_jobs: max_jobs,
            work_dir: self.dir.path().join("work"),
            output_dir: self.dir.path().join("exports"),
            ..WorkerConfig::default()
        }
    }

    pub fn executor(
        &self,
        config: WorkerConfig,
        engine: Arc<FakeEngine>,
        prober: FakeProber,
    ) -> JobExecutor {
        let render = RenderExecutor::new(engine, Arc::new(prober))
            .with_work_root(config.work_dir.clone())
            .with_caption_config(config.captions.clone());
        JobExecutor::new(config, render)
    }

    pub async fn work_entries(&self) -> usize {
        let Ok(mut entries) = tokio::fs::read_dir(self.dir.path().join("work")).await else {
            return 0;
        };
        let mut count = 0;
        while entries.next_entry().await.unwrap().is_some() {
            count += 1;
        }
        count
    }
}
