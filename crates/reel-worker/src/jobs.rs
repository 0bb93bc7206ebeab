//! Job files and output naming.

use reel_media::compose::output_extension;
use reel_models::RenderJob;
use std::path::{Path, PathBuf};

use crate::error::{WorkerError, WorkerResult};

/// Read a JSON job description.
pub async fn load_job_file(path: &Path) -> WorkerResult<RenderJob> {
    let bytes = tokio::fs::read(path).await?;
    let job: RenderJob = serde_json::from_slice(&bytes).map_err(|e| {
        WorkerError::invalid_job_file(format!("{}: {}", path.display(), e))
    })?;
    if job.input_path.as_os_str().is_empty() {
        return Err(WorkerError::invalid_job_file(format!(
            "{}: input_path is empty",
            path.display()
        )));
    }
    Ok(job)
}

/// `<stem>[_flipped]_<job_id>.mp4|.mkv` inside `output_dir`.
pub fn default_output_path(job: &RenderJob, output_dir: &Path) -> PathBuf {
    let stem = job
        .input_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "output".to_string());
    let flipped = if job.options.flip { "_flipped" } else { "" };
    output_dir.join(format!(
        "{}{}_{}.{}",
        stem,
        flipped,
        job.job_id,
        output_extension(job.options.burn_in)
    ))
}

/// Fill in the output path when the job left it empty.
pub fn with_default_output(mut job: RenderJob, output_dir: &Path) -> RenderJob {
    if job.output_path.as_os_str().is_empty() {
        job.output_path = default_output_path(&job, output_dir);
    }
    job
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::{JobId, RenderOptions};
    use tempfile::TempDir;

    fn job(input: &str, options: RenderOptions) -> RenderJob {
        let mut job = RenderJob::new(input, "").with_options(options);
        job.job_id = JobId::from_string("j1");
        job
    }

    #[test]
    fn test_default_output_names() {
        let out = Path::new("/exports");
        assert_eq!(
            default_output_path(&job("/src/talk.mov", RenderOptions::default()), out),
            PathBuf::from("/exports/talk_j1.mp4")
        );
        let soft_flipped = RenderOptions::default().with_flip(true).with_burn_in(false);
        assert_eq!(
            default_output_path(&job("/src/talk.mov", soft_flipped), out),
            PathBuf::from("/exports/talk_flipped_j1.mkv")
        );
    }

    #[test]
    fn test_explicit_output_is_kept() {
        let mut explicit = job("/src/a.mp4", RenderOptions::default());
        explicit.output_path = PathBuf::from("/elsewhere/final.mp4");
        let filled = with_default_output(explicit, Path::new("/exports"));
        assert_eq!(filled.output_path, PathBuf::from("/elsewhere/final.mp4"));
    }

    #[tokio::test]
    async fn test_load_job_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("job.json");
        tokio::fs::write(
            &path,
            r#"{
                "job_id": "clip-1",
                "input_path": "/src/in.mp4",
                "options": {"flip": true, "music_path": "/src/bed.mp3"},
                "scenes": [{"start_sec": 0.0, "end_sec": 2.0, "duration_sec": 2.0}],
                "remix_fallback": "use_original"
            }"#,
        )
        .await
        .unwrap();

        let job = load_job_file(&path).await.unwrap();
        assert_eq!(job.job_id, JobId::from_string("clip-1"));
        assert!(job.output_path.as_os_str().is_empty());
        assert!(job.options.flip);
        assert_eq!(job.scenes.as_ref().map(|s| s.len()), Some(1));
    }

    #[tokio::test]
    async fn test_load_rejects_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("job.json");
        tokio::fs::write(&path, r#"{"output_path": "/out.mp4"}"#).await.unwrap();
        assert!(matches!(
            load_job_file(&path).await,
            Err(WorkerError::InvalidJobFile(_))
        ));

        tokio::fs::write(&path, r#"{"input_path": ""}"#).await.unwrap();
        assert!(matches!(
            load_job_file(&path).await,
            Err(WorkerError::InvalidJobFile(_))
        ));
    }
}
