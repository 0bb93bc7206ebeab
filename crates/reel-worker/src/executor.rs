//! Job executor: runs render jobs concurrently, bounded by a semaphore.

use reel_media::{FfmpegRunner, FfprobeProber, RenderExecutor};
use reel_models::{JobId, JobStatus, RenderJob};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{info, warn, Instrument};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::jobs::with_default_output;
use crate::logging::JobLogger;
use crate::metrics::{JobMetrics, JobOutcome};
use crate::status::{JobStatusStore, StatusHandle};

/// Poll interval used while waiting on job status.
const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runs render jobs on the tokio runtime.
///
/// Each submitted job becomes its own task. At most
/// `max_concurrent_jobs` tasks run the pipeline at once; the rest wait
/// for a permit. Terminal status is published through the job's
/// [`StatusHandle`].
pub struct JobExecutor {
    config: WorkerConfig,
    render: Arc<RenderExecutor>,
    store: JobStatusStore,
    job_semaphore: Arc<Semaphore>,
}

impl JobExecutor {
    /// Create an executor around an already configured render executor.
    pub fn new(config: WorkerConfig, render: RenderExecutor) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        Self {
            config,
            render: Arc::new(render),
            store: JobStatusStore::new(),
            job_semaphore,
        }
    }

    /// Executor backed by the ffmpeg and ffprobe CLIs.
    pub fn from_config(config: WorkerConfig) -> WorkerResult<Self> {
        std::fs::create_dir_all(&config.work_dir).map_err(|e| {
            WorkerError::config_error(format!(
                "cannot create work dir {}: {}",
                config.work_dir.display(),
                e
            ))
        })?;
        // Missing tools fail at startup, not on the first job.
        config.tools.resolve_ffmpeg()?;
        config.tools.resolve_ffprobe()?;

        let mut runner = FfmpegRunner::new(&config.tools);
        if let Some(timeout) = config.render_timeout {
            runner = runner.with_timeout(timeout.as_secs());
        }
        let render = RenderExecutor::new(
            Arc::new(runner),
            Arc::new(FfprobeProber::new(&config.tools)),
        )
        .with_caption_config(config.captions.clone())
        .with_work_root(config.work_dir.clone());

        Ok(Self::new(config, render))
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn store(&self) -> &JobStatusStore {
        &self.store
    }

    pub fn status(&self, job_id: &JobId) -> Option<JobStatus> {
        self.store.get(job_id)
    }

    /// Register a job and start its task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, job: RenderJob) -> WorkerResult<JobId> {
        let job = with_default_output(job, &self.config.output_dir);
        let handle = self.store.register(job.job_id.clone())?;
        let job_id = job.job_id.clone();

        let logger = JobLogger::for_job(&job);
        let span = logger.create_span();
        let task = JobTask {
            job,
            handle,
            logger,
            render: Arc::clone(&self.render),
            semaphore: Arc::clone(&self.job_semaphore),
            timeout: self.config.job_timeout,
        };
        tokio::spawn(task.run().instrument(span));

        Ok(job_id)
    }

    /// Wait until the job reaches a terminal state.
    pub async fn wait_for(&self, job_id: &JobId) -> WorkerResult<JobStatus> {
        loop {
            match self.store.get(job_id) {
                None => return Err(WorkerError::JobNotFound(job_id.clone())),
                Some(status) if status.is_terminal() => return Ok(status),
                Some(_) => tokio::time::sleep(STATUS_POLL_INTERVAL).await,
            }
        }
    }

    /// Wait for every submitted job to finish.
    pub async fn wait_for_jobs(&self) {
        while self.store.in_flight() > 0 {
            tokio::time::sleep(STATUS_POLL_INTERVAL).await;
        }
    }

    /// Stop handing out permits and give running jobs the shutdown grace period.
    ///
    /// Jobs still waiting for a permit fail immediately. Returns `false`
    /// when jobs were still running at the deadline.
    pub async fn shutdown(&self) -> bool {
        self.job_semaphore.close();
        info!("Shutting down, waiting for {} in-flight jobs", self.store.in_flight());
        let drained = tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs())
            .await
            .is_ok();
        if !drained {
            warn!(
                "Shutdown timeout after {:?}; {} jobs still running",
                self.config.shutdown_timeout,
                self.store.in_flight()
            );
        }
        drained
    }
}

/// Everything a job's task owns.
struct JobTask {
    job: RenderJob,
    handle: StatusHandle,
    logger: JobLogger,
    render: Arc<RenderExecutor>,
    semaphore: Arc<Semaphore>,
    timeout: Duration,
}

impl JobTask {
    async fn run(self) {
        let JobTask {
            job,
            handle,
            logger,
            render,
            semaphore,
            timeout,
        } = self;

        let _permit = match semaphore.acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                logger.not_started();
                handle.fail("worker shut down before the job started");
                return;
            }
        };

        let job_metrics = JobMetrics::start();
        logger.started(&job);

        match tokio::time::timeout(timeout, render.execute(&job)).await {
            Ok(Ok(outcome)) => {
                logger.finished(&outcome);
                job_metrics.finish(JobOutcome::Complete);
                handle.complete(outcome.output_path);
            }
            Ok(Err(e)) => {
                logger.failed(&e);
                job_metrics.finish(JobOutcome::Failed);
                handle.fail(e.detailed_message());
            }
            Err(_) => {
                logger.timed_out(timeout);
                job_metrics.finish(JobOutcome::TimedOut);
                handle.fail(format!("job timed out after {}s", timeout.as_secs()));
            }
        }
    }
}
