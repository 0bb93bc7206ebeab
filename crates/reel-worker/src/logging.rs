//! Tracing setup and per-job lifecycle logging.

use reel_media::{MediaError, RemixOutcome, RenderOutcome, RepairAction};
use reel_models::{JobId, RenderJob, RenderMode};
use std::time::Duration;
use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber.
///
/// `LOG_FORMAT=json` selects JSON lines; anything else gets the colored
/// human format. `RUST_LOG` directives are honored on top of `reel=info`.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    if let Ok(directive) = "reel=info".parse() {
        env_filter = env_filter.add_directive(directive);
    }

    // try_init: a global subscriber may already be installed.
    if use_json {
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .try_init();
    }
}

/// Lifecycle logging for one render job.
///
/// Every event carries the job ID and pipeline mode as structured fields.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: JobId,
    mode: RenderMode,
}

impl JobLogger {
    pub fn for_job(job: &RenderJob) -> Self {
        Self {
            job_id: job.job_id.clone(),
            mode: job.mode(),
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// Span that tags everything logged inside the job's task.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            mode = self.mode.as_str()
        )
    }

    pub fn started(&self, job: &RenderJob) {
        info!(
            job_id = %self.job_id,
            mode = self.mode.as_str(),
            input = %job.input_path.display(),
            output = %job.output_path.display(),
            scenes = job.scenes.as_ref().map_or(0, |s| s.len()),
            "Job started"
        );
    }

    /// The executor shut down while the job waited for a permit.
    pub fn not_started(&self) {
        warn!(
            job_id = %self.job_id,
            mode = self.mode.as_str(),
            "Job dropped before start: worker shutting down"
        );
    }

    pub fn finished(&self, outcome: &RenderOutcome) {
        if let Some(repairs) = repair_summary(&outcome.repairs) {
            info!(
                job_id = %self.job_id,
                mode = self.mode.as_str(),
                repairs = %repairs,
                "Input repaired before render"
            );
        }
        if let RemixOutcome::FellBack { reason } = &outcome.remix {
            warn!(
                job_id = %self.job_id,
                mode = self.mode.as_str(),
                "Remix fell back to the original source: {}", reason
            );
        }
        info!(
            job_id = %self.job_id,
            mode = self.mode.as_str(),
            output = %outcome.output_path.display(),
            bytes = outcome.output_bytes,
            captions = outcome.caption_count,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "Job completed"
        );
    }

    pub fn failed(&self, error: &MediaError) {
        error!(
            job_id = %self.job_id,
            mode = self.mode.as_str(),
            caller_error = error.is_caller_error(),
            "Job failed: {}", error.detailed_message()
        );
    }

    pub fn timed_out(&self, limit: Duration) {
        error!(
            job_id = %self.job_id,
            mode = self.mode.as_str(),
            limit_secs = limit.as_secs(),
            "Job timed out"
        );
    }
}

/// Comma-separated repair steps, `None` when the input needed none.
pub fn repair_summary(repairs: &[RepairAction]) -> Option<String> {
    if repairs.is_empty() {
        return None;
    }
    let names: Vec<&str> = repairs.iter().map(|r| r.as_str()).collect();
    Some(names.join(", "))
}
