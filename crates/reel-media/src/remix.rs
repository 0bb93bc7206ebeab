//! Remix mode: keep a list of scenes and concatenate them.

use reel_models::{EncodingConfig, MediaAsset, SceneSegment};
use std::path::Path;

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};
use crate::graph::{Filter, FilterGraph, Pin, Stage};

/// A validated trim-and-concat graph and the command that runs it.
#[derive(Debug, Clone)]
pub struct RemixPlan {
    pub command: FfmpegCommand,
    pub graph: FilterGraph,
    /// Sum of the kept segment durations
    pub expected_duration: f64,
}

/// Build the remix plan for the kept segments, in order.
///
/// Fails before anything runs when the list is empty or a segment falls
/// outside the asset.
pub fn build_remix_plan(
    asset: &MediaAsset,
    segments: &[SceneSegment],
    encoding: &EncodingConfig,
    output_path: &Path,
) -> MediaResult<RemixPlan> {
    if segments.is_empty() {
        return Err(MediaError::EmptySceneList);
    }
    for segment in segments {
        segment.validate_within(asset.duration_sec)?;
    }
    if !asset.has_video {
        return Err(MediaError::NoStreams(asset.path.clone()));
    }
    if encoding.is_stream_copy() {
        return Err(MediaError::unsupported("remix re-encodes video and cannot use stream copy"));
    }

    let with_audio = asset.has_audio;
    let mut graph = FilterGraph::new(1);
    let mut concat_inputs = Vec::with_capacity(segments.len() * 2);

    for (i, segment) in segments.iter().enumerate() {
        let video = Pin::named(format!("v{}", i));
        graph.push(Stage::chain(
            Pin::input_video(0),
            vec![
                Filter::Trim {
                    start: segment.start_sec,
                    end: segment.end_sec,
                },
                Filter::ResetPts,
            ],
            video.clone(),
        ));
        concat_inputs.push(video);

        if with_audio {
            let audio = Pin::named(format!("a{}", i));
            graph.push(Stage::chain(
                Pin::input_audio(0),
                vec![
                    Filter::ATrim {
                        start: segment.start_sec,
                        end: segment.end_sec,
                    },
                    Filter::ResetAudioPts,
                ],
                audio.clone(),
            ));
            concat_inputs.push(audio);
        }
    }

    let mut outputs = vec![Pin::named("outv")];
    if with_audio {
        outputs.push(Pin::named("outa"));
    }
    graph.push(Stage::new(
        concat_inputs,
        vec![Filter::Concat {
            segments: segments.len(),
            video: true,
            audio: with_audio,
        }],
        outputs,
    ));
    graph.set_video_output(Pin::named("outv"));
    if with_audio {
        graph.set_audio_output(Pin::named("outa"));
    }
    graph.validate()?;

    let mut command = FfmpegCommand::new(output_path).input(&asset.path);
    if let Some(filter_complex) = graph.to_filter_complex() {
        command = command.filter_complex(filter_complex);
    }
    for map in graph.map_args() {
        command = command.map(map);
    }
    command = command.output_args(encoding.video_args());
    command = if with_audio {
        command.output_args(encoding.audio_args())
    } else {
        command.no_audio()
    };
    command = command.output_args(["-movflags", "+faststart"]);

    Ok(RemixPlan {
        command,
        graph,
        expected_duration: segments.iter().map(|s| s.end_sec - s.start_sec).sum(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::StageKind;
    use crate::testing::asset;

    fn source() -> MediaAsset {
        MediaAsset {
            path: "/work/in.mp4".into(),
            ..asset(true, true, 10.0)
        }
    }

    #[test]
    fn test_single_segment_trims_exact_range() {
        let plan = build_remix_plan(
            &source(),
            &[SceneSegment::new(2.0, 5.0)],
            &EncodingConfig::for_remix(),
            Path::new("/work/remix.mp4"),
        )
        .unwrap();

        assert_eq!(
            plan.command.filter_graph().unwrap(),
            "[0:v]trim=start=2.000:end=5.000,setpts=PTS-STARTPTS[v0];\
             [0:a]atrim=start=2.000:end=5.000,asetpts=PTS-STARTPTS[a0];\
             [v0][a0]concat=n=1:v=1:a=1[outv][outa]"
        );
        assert!((plan.expected_duration - 3.0).abs() < 1e-9);
        assert_eq!(plan.command.maps(), ["[outv]", "[outa]"]);
    }

    #[test]
    fn test_segments_keep_caller_order() {
        let plan = build_remix_plan(
            &source(),
            &[SceneSegment::new(6.0, 8.0), SceneSegment::new(1.0, 2.5)],
            &EncodingConfig::for_remix(),
            Path::new("/work/remix.mp4"),
        )
        .unwrap();

        let graph = plan.command.filter_graph().unwrap();
        assert!(graph.find("trim=start=6.000").unwrap() < graph.find("trim=start=1.000").unwrap());
        assert!(graph.ends_with("[v0][a0][v1][a1]concat=n=2:v=1:a=1[outv][outa]"));
        assert!(plan.graph.has_stage(StageKind::Concat));
        assert!((plan.expected_duration - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_list_fails_first() {
        let err = build_remix_plan(
            &MediaAsset::unreadable("/work/in.mp4"),
            &[],
            &EncodingConfig::for_remix(),
            Path::new("/work/remix.mp4"),
        )
        .unwrap_err();
        assert!(matches!(err, MediaError::EmptySceneList));
    }

    #[test]
    fn test_out_of_range_segment_is_rejected() {
        for segment in [
            SceneSegment::new(4.0, 3.0),
            SceneSegment::new(-1.0, 2.0),
            SceneSegment::new(8.0, 10.2),
        ] {
            let err = build_remix_plan(
                &source(),
                &[segment],
                &EncodingConfig::for_remix(),
                Path::new("/work/remix.mp4"),
            )
            .unwrap_err();
            assert!(matches!(err, MediaError::InvalidSegment(_)));
        }
    }

    #[test]
    fn test_end_within_tolerance_is_accepted() {
        assert!(build_remix_plan(
            &source(),
            &[SceneSegment::new(8.0, 10.04)],
            &EncodingConfig::for_remix(),
            Path::new("/work/remix.mp4"),
        )
        .is_ok());
    }

    #[test]
    fn test_silent_source_concats_video_only() {
        let silent = MediaAsset {
            has_audio: false,
            ..source()
        };
        let plan = build_remix_plan(
            &silent,
            &[SceneSegment::new(0.0, 1.0), SceneSegment::new(3.0, 4.0)],
            &EncodingConfig::for_remix(),
            Path::new("/work/remix.mp4"),
        )
        .unwrap();

        assert!(plan.command.filter_graph().unwrap().ends_with("[v0][v1]concat=n=2:v=1:a=0[outv]"));
        assert!(plan.command.build_args().contains(&"-an".to_string()));
    }
}
