//! Render worker binary.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use reel_media::{FfprobeProber, SceneSegmenter, SegmenterConfig};
use reel_models::{JobId, JobStatus};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use reel_worker::{
    init_tracing, load_job_file, HighlightFile, JobExecutor, SourceAnalyzer, TranscriptFile,
    WorkerConfig,
};

#[derive(Parser, Debug)]
#[command(name = "reel-worker")]
#[command(about = "Render short-form video jobs and analyze sources", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one or more JSON job files concurrently
    Render {
        /// Job description files
        #[arg(required = true)]
        job_files: Vec<PathBuf>,
    },
    /// Write a scene/transcript/highlight report for a source file
    Analyze {
        /// Source media file
        media: PathBuf,

        /// Report path (defaults to `<output dir>/<stem>_analysis.json`)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Transcript JSON (array of timed fragments)
        #[arg(long)]
        transcript: Option<PathBuf>,

        /// Highlight picks JSON (array of segments)
        #[arg(long)]
        highlights: Option<PathBuf>,

        /// Language hint passed to the transcriber
        #[arg(short, long)]
        language: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    init_tracing();

    let result = match cli.command {
        Command::Render { job_files } => render(&job_files).await,
        Command::Analyze {
            media,
            out,
            transcript,
            highlights,
            language,
        } => analyze(media, out, transcript, highlights, language).await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn render(job_files: &[PathBuf]) -> anyhow::Result<()> {
    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);
    let executor = JobExecutor::from_config(config).context("failed to create job executor")?;

    let mut submitted: Vec<JobId> = Vec::new();
    for path in job_files {
        let job = load_job_file(path).await?;
        let job_id = executor
            .submit(job)
            .with_context(|| format!("failed to submit {}", path.display()))?;
        info!(job_id = %job_id, "Submitted {}", path.display());
        submitted.push(job_id);
    }

    tokio::select! {
        _ = executor.wait_for_jobs() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            if !executor.shutdown().await {
                bail!("shutdown timed out with jobs still running");
            }
        }
    }

    let mut failed = 0;
    for job_id in &submitted {
        match executor.status(job_id) {
            Some(JobStatus::Complete { output_path, .. }) => {
                println!("{}\tcomplete\t{}", job_id, output_path.display());
            }
            Some(JobStatus::Failed { error_message, .. }) => {
                failed += 1;
                println!("{}\tfailed\t{}", job_id, error_message);
            }
            other => {
                failed += 1;
                let state = other.as_ref().map(|s| s.as_str()).unwrap_or("unknown");
                println!("{}\t{}", job_id, state);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} jobs failed", failed, submitted.len());
    }
    Ok(())
}

async fn analyze(
    media: PathBuf,
    out: Option<PathBuf>,
    transcript: Option<PathBuf>,
    highlights: Option<PathBuf>,
    language: Option<String>,
) -> anyhow::Result<()> {
    let config = WorkerConfig::from_env();
    let mut analyzer = SourceAnalyzer::new(Arc::new(FfprobeProber::new(&config.tools)))
        .with_segmenter(SceneSegmenter::new(&config.tools, SegmenterConfig::default()));
    if let Some(path) = transcript {
        analyzer = analyzer.with_transcriber(Arc::new(TranscriptFile::new(path)));
    }
    if let Some(path) = highlights {
        analyzer = analyzer.with_highlights(Arc::new(HighlightFile::new(path)));
    }

    let report = analyzer
        .analyze(&media, language.as_deref())
        .await
        .with_context(|| format!("failed to analyze {}", media.display()))?;

    let out = out.unwrap_or_else(|| {
        let stem = media
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "source".to_string());
        config.output_dir.join(format!("{}_analysis.json", stem))
    });
    report.write(&out).await?;
    println!("{}", out.display());
    Ok(())
}
