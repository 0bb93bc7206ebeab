//! Per-job render executor.
//!
//! Probes and repairs the input, optionally remixes it to the kept scenes,
//! prepares captions and renders the composed output. All intermediate
//! files live in a per-job working directory that is removed when the job
//! ends, successfully or not. The output only appears at its final path
//! once it has been verified.

use reel_models::{
    CaptionCue, EncodingConfig, JobId, MediaAsset, RemixFallback, RenderJob, RenderMode,
    SceneSegment,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::captions::{regroup, CaptionConfig, CaptionTracks};
use crate::collaborators::Transcriber;
use crate::command::{FfmpegRunner, MediaToolConfig, RenderEngine};
use crate::compose::{build_compose_plan, output_extension, ComposeInputs};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{publish_output, verify_output};
use crate::probe::{FfprobeProber, MediaProber};
use crate::remix::build_remix_plan;
use crate::repair::{check_media_file, RepairAction, Repairer, SynthesisConfig};

/// What happened to the remix stage of a job.
#[derive(Debug, Clone, PartialEq)]
pub enum RemixOutcome {
    NotRequested,
    Applied { segments: usize, duration_sec: f64 },
    /// The remix failed and the original source was composed instead
    FellBack { reason: String },
}

/// Result of a successful render.
#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub job_id: JobId,
    pub mode: RenderMode,
    pub output_path: PathBuf,
    pub output_bytes: u64,
    pub remix: RemixOutcome,
    pub repairs: Vec<RepairAction>,
    pub caption_count: usize,
    pub elapsed: Duration,
}

/// Runs render jobs against a render engine.
pub struct RenderExecutor {
    engine: Arc<dyn RenderEngine>,
    prober: Arc<dyn MediaProber>,
    transcriber: Option<Arc<dyn Transcriber>>,
    caption_config: CaptionConfig,
    synthesis: SynthesisConfig,
    work_root: Option<PathBuf>,
}

impl RenderExecutor {
    pub fn new(engine: Arc<dyn RenderEngine>, prober: Arc<dyn MediaProber>) -> Self {
        Self {
            engine,
            prober,
            transcriber: None,
            caption_config: CaptionConfig::default(),
            synthesis: SynthesisConfig::default(),
            work_root: None,
        }
    }

    /// Executor backed by the ffmpeg and ffprobe CLIs.
    pub fn from_tools(tools: &MediaToolConfig) -> Self {
        Self::new(
            Arc::new(FfmpegRunner::new(tools)),
            Arc::new(FfprobeProber::new(tools)),
        )
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn with_caption_config(mut self, config: CaptionConfig) -> Self {
        self.caption_config = config;
        self
    }

    pub fn with_synthesis(mut self, synthesis: SynthesisConfig) -> Self {
        self.synthesis = synthesis;
        self
    }

    /// Parent directory for per-job working directories (system temp by default).
    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = Some(root.into());
        self
    }

    /// Run one job to completion.
    pub async fn execute(&self, job: &RenderJob) -> MediaResult<RenderOutcome> {
        let started = Instant::now();
        let mode = job.mode();
        info!(
            job_id = %job.job_id,
            mode = mode.as_str(),
            input = %job.input_path.display(),
            "Render started"
        );

        let result = self.run(job, started).await;
        let elapsed = started.elapsed();
        crate::metrics::record_render(mode.as_str(), result.is_ok(), elapsed.as_secs_f64());

        match &result {
            Ok(outcome) => info!(
                job_id = %job.job_id,
                output = %outcome.output_path.display(),
                bytes = outcome.output_bytes,
                elapsed_ms = elapsed.as_millis() as u64,
                "Render complete"
            ),
            Err(e) => warn!(
                job_id = %job.job_id,
                elapsed_ms = elapsed.as_millis() as u64,
                "Render failed: {}",
                e.detailed_message()
            ),
        }
        result
    }

    async fn run(&self, job: &RenderJob, started: Instant) -> MediaResult<RenderOutcome> {
        job.options.validate()?;
        if job.scenes.as_ref().is_some_and(|s| s.is_empty()) {
            return Err(MediaError::EmptySceneList);
        }

        let workdir = self.create_workdir(&job.job_id).await?;
        let dir = workdir.path();

        let repaired = Repairer::new(self.engine.as_ref(), self.prober.as_ref())
            .with_synthesis(self.synthesis.clone())
            .repair(&job.input_path, dir, job.options.music_path.is_some())
            .await?;
        for action in &repaired.actions {
            crate::metrics::record_repair(action.as_str());
        }
        let mut asset = repaired.asset;

        let remix = match &job.scenes {
            None => RemixOutcome::NotRequested,
            Some(scenes) => match self.remix(&asset, scenes, dir).await {
                Ok((remixed, outcome)) => {
                    asset = remixed;
                    outcome
                }
                Err(e) if e.is_caller_error() || job.remix_fallback == RemixFallback::Fail => {
                    return Err(e)
                }
                Err(e) => {
                    warn!(
                        job_id = %job.job_id,
                        "Remix failed, composing the original source: {}",
                        e.detailed_message()
                    );
                    crate::metrics::record_remix_fallback();
                    RemixOutcome::FellBack {
                        reason: e.to_string(),
                    }
                }
            },
        };

        let cues = match &job.captions {
            Some(cues) => cues.clone(),
            None => self.transcribe(&asset, job.language.as_deref()).await,
        };
        let tracks = CaptionTracks::write(dir, &cues, &asset).await?;

        let music = match &job.options.music_path {
            Some(path) => Some(self.probe_music(path).await?),
            None => None,
        };

        let plan = build_compose_plan(ComposeInputs {
            asset: &asset,
            music: music.as_ref(),
            options: &job.options,
            captions: &tracks,
            output_path: &dir.join("render"),
        })?;
        self.engine.render(&plan.command).await?;

        let output_path = job
            .output_path
            .with_extension(output_extension(job.options.burn_in));
        let output_bytes = publish_output(&plan.output_path, &output_path).await?;

        Ok(RenderOutcome {
            job_id: job.job_id.clone(),
            mode: job.mode(),
            output_path,
            output_bytes,
            remix,
            repairs: repaired.actions,
            caption_count: tracks.cue_count,
            elapsed: started.elapsed(),
        })
    }

    async fn create_workdir(&self, job_id: &JobId) -> MediaResult<TempDir> {
        let prefix = format!("reel-{}-", job_id);
        let dir = match &self.work_root {
            Some(root) => {
                tokio::fs::create_dir_all(root).await?;
                tempfile::Builder::new().prefix(&prefix).tempdir_in(root)?
            }
            None => tempfile::Builder::new().prefix(&prefix).tempdir()?,
        };
        debug!("Working directory {}", dir.path().display());
        Ok(dir)
    }

    async fn remix(
        &self,
        asset: &MediaAsset,
        scenes: &[SceneSegment],
        dir: &Path,
    ) -> MediaResult<(MediaAsset, RemixOutcome)> {
        let output = dir.join("remix.mp4");
        let plan = build_remix_plan(asset, scenes, &EncodingConfig::for_remix(), &output)?;
        self.engine.render(&plan.command).await?;
        verify_output(&output).await?;

        let remixed = self.prober.probe(&output).await;
        if !remixed.has_video {
            return Err(MediaError::render_failed(
                format!("remixed file has no video stream: {}", output.display()),
                None,
                None,
            ));
        }
        Ok((
            remixed,
            RemixOutcome::Applied {
                segments: scenes.len(),
                duration_sec: plan.expected_duration,
            },
        ))
    }

    /// Transcribe and regroup; any failure degrades to no captions.
    async fn transcribe(&self, asset: &MediaAsset, language: Option<&str>) -> Vec<CaptionCue> {
        let Some(transcriber) = &self.transcriber else {
            debug!("No transcriber configured, rendering without captions");
            return Vec::new();
        };
        match transcriber.transcribe(asset, language).await {
            Ok(fragments) => regroup(&fragments, &self.caption_config),
            Err(e) => {
                warn!("Transcription failed, rendering without captions: {}", e);
                Vec::new()
            }
        }
    }

    async fn probe_music(&self, path: &Path) -> MediaResult<MediaAsset> {
        check_media_file(path).await?;
        let music = self.prober.probe(path).await;
        if !music.has_audio {
            return Err(MediaError::invalid_input(format!(
                "music file has no audio stream: {}",
                path.display()
            )));
        }
        Ok(music)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{asset, FakeEngine, FakeProber};
    use async_trait::async_trait;
    use reel_models::{RenderOptions, TranscriptFragment, WordTiming};

    struct Fixture {
        dir: TempDir,
        input: PathBuf,
    }

    impl Fixture {
        async fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let input = dir.path().join("in.mp4");
            tokio::fs::write(&input, b"\x00\x00\x00\x18ftypmp42").await.unwrap();
            Self { dir, input }
        }

        fn output(&self) -> PathBuf {
            self.dir.path().join("exports").join("clip.mp4")
        }

        fn work_root(&self) -> PathBuf {
            self.dir.path().join("work")
        }

        fn executor(&self, engine: Arc<FakeEngine>, prober: FakeProber) -> RenderExecutor {
            RenderExecutor::new(engine, Arc::new(prober)).with_work_root(self.work_root())
        }

        async fn work_entries(&self) -> usize {
            let mut entries = tokio::fs::read_dir(self.work_root()).await.unwrap();
            let mut count = 0;
            while entries.next_entry().await.unwrap().is_some() {
                count += 1;
            }
            count
        }
    }

    struct StaticTranscriber(MediaResult<Vec<TranscriptFragment>>);

    #[async_trait]
    impl Transcriber for StaticTranscriber {
        async fn transcribe(
            &self,
            _asset: &MediaAsset,
            _language: Option<&str>,
        ) -> MediaResult<Vec<TranscriptFragment>> {
            match &self.0 {
                Ok(fragments) => Ok(fragments.clone()),
                Err(e) => Err(MediaError::internal(e.to_string())),
            }
        }
    }

    #[tokio::test]
    async fn test_compose_publishes_output_and_cleans_workdir() {
        let fx = Fixture::new().await;
        let engine = Arc::new(FakeEngine::new());
        let prober = FakeProber::new().with("in.mp4", asset(true, true, 10.0));
        let job = RenderJob::new(&fx.input, fx.output())
            .with_captions(vec![CaptionCue::new(1, 0.0, 1.0, "hello")]);

        let outcome = fx.executor(engine.clone(), prober).execute(&job).await.unwrap();

        assert_eq!(outcome.output_path, fx.output());
        assert!(outcome.output_bytes > 0);
        assert_eq!(outcome.caption_count, 1);
        assert_eq!(outcome.remix, RemixOutcome::NotRequested);
        assert!(fx.output().exists());
        assert_eq!(fx.work_entries().await, 0);

        let commands = engine.recorded();
        assert_eq!(commands.len(), 1);
        assert!(commands[0].filter_graph().unwrap().contains("subtitles="));
    }

    #[tokio::test]
    async fn test_zero_byte_output_fails_and_is_not_published() {
        let fx = Fixture::new().await;
        let engine = Arc::new(FakeEngine::new().silent("render.mp4"));
        let prober = FakeProber::new().with("in.mp4", asset(true, true, 10.0));
        let job = RenderJob::new(&fx.input, fx.output());

        let err = fx.executor(engine, prober).execute(&job).await.unwrap_err();

        assert!(matches!(err, MediaError::RenderEngine { .. }));
        assert!(!fx.output().exists());
        assert_eq!(fx.work_entries().await, 0);
    }

    #[tokio::test]
    async fn test_engine_failure_carries_diagnostics() {
        let fx = Fixture::new().await;
        let engine = Arc::new(FakeEngine::new().failing("render.mp4"));
        let prober = FakeProber::new().with("in.mp4", asset(true, true, 10.0));
        let job = RenderJob::new(&fx.input, fx.output());

        let err = fx.executor(engine, prober).execute(&job).await.unwrap_err();

        assert!(err.detailed_message().contains("Conversion failed!"));
        assert!(!fx.output().exists());
    }

    #[tokio::test]
    async fn test_empty_scene_list_fails_before_engine() {
        let fx = Fixture::new().await;
        let engine = Arc::new(FakeEngine::new());
        let prober = FakeProber::new().with("in.mp4", asset(true, true, 10.0));
        let job = RenderJob::new(&fx.input, fx.output()).with_scenes(Vec::new());

        let err = fx.executor(engine.clone(), prober).execute(&job).await.unwrap_err();

        assert!(matches!(err, MediaError::EmptySceneList));
        assert!(engine.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_remix_then_compose() {
        let fx = Fixture::new().await;
        let engine = Arc::new(FakeEngine::new());
        let prober = FakeProber::new()
            .with("in.mp4", asset(true, true, 10.0))
            .with("remix.mp4", asset(true, true, 3.0));
        let job = RenderJob::new(&fx.input, fx.output())
            .with_captions(Vec::new())
            .with_scenes(vec![SceneSegment::new(2.0, 5.0)]);

        let outcome = fx.executor(engine.clone(), prober).execute(&job).await.unwrap();

        assert_eq!(outcome.mode, RenderMode::Remix);
        assert_eq!(
            outcome.remix,
            RemixOutcome::Applied {
                segments: 1,
                duration_sec: 3.0
            }
        );
        let commands = engine.recorded();
        assert_eq!(commands.len(), 2);
        assert!(commands[0]
            .filter_graph()
            .unwrap()
            .contains("trim=start=2.000:end=5.000"));
        assert!(commands[1].build_args().iter().any(|a| a.ends_with("remix.mp4")));
    }

    #[tokio::test]
    async fn test_remix_failure_fails_job_by_default() {
        let fx = Fixture::new().await;
        let engine = Arc::new(FakeEngine::new().failing("remix.mp4"));
        let prober = FakeProber::new().with("in.mp4", asset(true, true, 10.0));
        let job = RenderJob::new(&fx.input, fx.output())
            .with_scenes(vec![SceneSegment::new(2.0, 5.0)]);

        assert!(fx.executor(engine, prober).execute(&job).await.is_err());
        assert!(!fx.output().exists());
    }

    #[tokio::test]
    async fn test_remix_failure_can_fall_back() {
        let fx = Fixture::new().await;
        let engine = Arc::new(FakeEngine::new().failing("remix.mp4"));
        let prober = FakeProber::new().with("in.mp4", asset(true, true, 10.0));
        let job = RenderJob::new(&fx.input, fx.output())
            .with_scenes(vec![SceneSegment::new(2.0, 5.0)])
            .with_remix_fallback(RemixFallback::UseOriginal);

        let outcome = fx.executor(engine, prober).execute(&job).await.unwrap();

        assert!(matches!(outcome.remix, RemixOutcome::FellBack { .. }));
        assert!(fx.output().exists());
    }

    #[tokio::test]
    async fn test_invalid_segment_never_falls_back() {
        let fx = Fixture::new().await;
        let engine = Arc::new(FakeEngine::new());
        let prober = FakeProber::new().with("in.mp4", asset(true, true, 10.0));
        let job = RenderJob::new(&fx.input, fx.output())
            .with_scenes(vec![SceneSegment::new(8.0, 12.0)])
            .with_remix_fallback(RemixFallback::UseOriginal);

        let err = fx.executor(engine.clone(), prober).execute(&job).await.unwrap_err();

        assert!(matches!(err, MediaError::InvalidSegment(_)));
        assert!(engine.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_soft_captions_correct_extension() {
        let fx = Fixture::new().await;
        let engine = Arc::new(FakeEngine::new());
        let prober = FakeProber::new().with("in.mp4", asset(true, true, 10.0));
        let job = RenderJob::new(&fx.input, fx.output())
            .with_options(RenderOptions::default().with_burn_in(false))
            .with_captions(vec![CaptionCue::new(1, 0.0, 1.0, "hello")]);

        let outcome = fx.executor(engine.clone(), prober).execute(&job).await.unwrap();

        assert_eq!(outcome.output_path.extension().unwrap(), "mkv");
        assert!(engine.recorded()[0].build_args().contains(&"srt".to_string()));
    }

    #[tokio::test]
    async fn test_transcription_is_regrouped() {
        let fx = Fixture::new().await;
        let engine = Arc::new(FakeEngine::new());
        let prober = FakeProber::new().with("in.mp4", asset(true, true, 10.0));
        let fragment = TranscriptFragment::new(0.0, 4.0, "one two three four").with_words(vec![
            WordTiming::new(0.0, 1.0, "one"),
            WordTiming::new(1.0, 2.0, "two"),
            WordTiming::new(2.0, 3.0, "three"),
            WordTiming::new(3.0, 4.0, "four"),
        ]);
        let executor = fx
            .executor(engine, prober)
            .with_transcriber(Arc::new(StaticTranscriber(Ok(vec![fragment]))));

        let outcome = executor
            .execute(&RenderJob::new(&fx.input, fx.output()))
            .await
            .unwrap();

        assert_eq!(outcome.caption_count, 2);
    }

    #[tokio::test]
    async fn test_transcription_failure_renders_captionless() {
        let fx = Fixture::new().await;
        let engine = Arc::new(FakeEngine::new());
        let prober = FakeProber::new().with("in.mp4", asset(true, true, 10.0));
        let executor = fx
            .executor(engine.clone(), prober)
            .with_transcriber(Arc::new(StaticTranscriber(Err(MediaError::internal("quota")))));

        let outcome = executor
            .execute(&RenderJob::new(&fx.input, fx.output()))
            .await
            .unwrap();

        assert_eq!(outcome.caption_count, 0);
        assert!(engine.recorded()[0].filter_graph().is_none());
    }

    #[tokio::test]
    async fn test_music_without_audio_is_rejected() {
        let fx = Fixture::new().await;
        let song = fx.dir.path().join("song.mp3");
        tokio::fs::write(&song, b"ID3").await.unwrap();
        let engine = Arc::new(FakeEngine::new());
        let prober = FakeProber::new().with("in.mp4", asset(true, true, 10.0));
        let job = RenderJob::new(&fx.input, fx.output())
            .with_options(RenderOptions::default().with_music(&song));

        let err = fx.executor(engine, prober).execute(&job).await.unwrap_err();
        assert!(matches!(err, MediaError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_invalid_options_rejected() {
        let fx = Fixture::new().await;
        let mut options = RenderOptions::default();
        options.duck_ratio = 0.5;
        let job = RenderJob::new(&fx.input, fx.output()).with_options(options);

        let err = fx
            .executor(Arc::new(FakeEngine::new()), FakeProber::new())
            .execute(&job)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidOptions(_)));
    }
}
