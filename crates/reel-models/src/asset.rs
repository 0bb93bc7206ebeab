//! Probed media asset snapshot.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Immutable snapshot of a media file's stream topology.
///
/// Produced by the prober. Any repair or synthesis step yields a new file,
/// which must be probed again because its topology may differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MediaAsset {
    /// Absolute path of the probed file
    pub path: PathBuf,
    /// At least one video stream is present
    pub has_video: bool,
    /// At least one audio stream is present
    pub has_audio: bool,
    /// Container duration in seconds (0 when unknown)
    pub duration_sec: f64,
    /// Width of the first video stream in pixels (0 when unknown)
    pub width: u32,
    /// Height of the first video stream in pixels (0 when unknown)
    pub height: u32,
    /// Average frame rate of the first video stream (0 when unknown)
    #[serde(default)]
    pub fps: f64,
}

impl MediaAsset {
    /// Snapshot for a file whose introspection failed.
    pub fn unreadable(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            has_video: false,
            has_audio: false,
            duration_sec: 0.0,
            width: 0,
            height: 0,
            fps: 0.0,
        }
    }

    /// Neither a video nor an audio stream was detected.
    pub fn has_no_streams(&self) -> bool {
        !self.has_video && !self.has_audio
    }

    /// Both a video and an audio stream are present.
    pub fn has_both_streams(&self) -> bool {
        self.has_video && self.has_audio
    }

    /// Duration if it is known (strictly positive).
    pub fn known_duration(&self) -> Option<f64> {
        (self.duration_sec > 0.0).then_some(self.duration_sec)
    }

    /// Frame resolution if both dimensions are known.
    pub fn resolution(&self) -> Option<(u32, u32)> {
        (self.width > 0 && self.height > 0).then_some((self.width, self.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreadable_asset() {
        let asset = MediaAsset::unreadable("/tmp/broken.mp4");
        assert!(asset.has_no_streams());
        assert!(!asset.has_both_streams());
        assert_eq!(asset.known_duration(), None);
        assert_eq!(asset.resolution(), None);
    }

    #[test]
    fn test_known_values() {
        let asset = MediaAsset {
            path: "/tmp/a.mp4".into(),
            has_video: true,
            has_audio: true,
            duration_sec: 12.5,
            width: 1080,
            height: 1920,
            fps: 30.0,
        };
        assert!(asset.has_both_streams());
        assert_eq!(asset.known_duration(), Some(12.5));
        assert_eq!(asset.resolution(), Some((1080, 1920)));
    }
}
