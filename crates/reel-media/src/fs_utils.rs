//! Filesystem helpers for staging and publishing render outputs.

use std::path::Path;
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Check that a rendered file exists and is non-empty.
pub async fn verify_output(path: &Path) -> MediaResult<u64> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(meta.len()),
        Ok(_) => Err(MediaError::render_failed(
            format!("render produced an empty file: {}", path.display()),
            None,
            None,
        )),
        Err(_) => Err(MediaError::render_failed(
            format!("render produced no file: {}", path.display()),
            None,
            None,
        )),
    }
}

/// Verify a staged output, then move it to its final location.
///
/// The destination only ever appears complete: a cross-device move copies
/// into a hidden sibling first and renames it into place.
pub async fn publish_output(staged: &Path, dst: &Path) -> MediaResult<u64> {
    let size = verify_output(staged).await?;

    if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(staged, dst).await {
        Ok(()) => {}
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device publish, copying: {} -> {}",
                staged.display(),
                dst.display()
            );
            copy_into_place(staged, dst).await?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(size)
}

/// EXDEV (cross-device link).
fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

async fn copy_into_place(src: &Path, dst: &Path) -> MediaResult<()> {
    let file_name = dst
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| {
            MediaError::internal(format!("output path has no file name: {}", dst.display()))
        })?;
    let partial = dst.with_file_name(format!(".{}.partial", file_name));

    if let Err(e) = fs::copy(src, &partial).await {
        let _ = fs::remove_file(&partial).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&partial, dst).await {
        let _ = fs::remove_file(&partial).await;
        return Err(e.into());
    }
    if let Err(e) = fs::remove_file(src).await {
        tracing::warn!("Failed to remove staged output {}: {}", src.display(), e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_publish_moves_into_new_directory() {
        let dir = TempDir::new().unwrap();
        let staged = dir.path().join("render.mp4");
        let dst = dir.path().join("exports").join("clip.mp4");
        fs::write(&staged, b"mp4 bytes").await.unwrap();

        let size = publish_output(&staged, &dst).await.unwrap();

        assert_eq!(size, 9);
        assert!(!staged.exists());
        assert_eq!(fs::read(&dst).await.unwrap(), b"mp4 bytes");
    }

    #[tokio::test]
    async fn test_publish_rejects_empty_output() {
        let dir = TempDir::new().unwrap();
        let staged = dir.path().join("render.mp4");
        let dst = dir.path().join("clip.mp4");
        fs::write(&staged, b"").await.unwrap();

        let err = publish_output(&staged, &dst).await.unwrap_err();

        assert!(matches!(err, MediaError::RenderEngine { .. }));
        assert!(!dst.exists());
    }

    #[tokio::test]
    async fn test_verify_missing_output() {
        let dir = TempDir::new().unwrap();
        assert!(verify_output(&dir.path().join("nope.mkv")).await.is_err());
    }

    #[test]
    fn test_is_cross_device_error() {
        assert!(is_cross_device_error(&std::io::Error::from_raw_os_error(18)));
        assert!(!is_cross_device_error(&std::io::Error::from_raw_os_error(2)));
    }
}
