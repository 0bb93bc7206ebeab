//! Compose mode: captions, music mixing with ducking, and flip.

use reel_models::{MediaAsset, RenderOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::captions::CaptionTracks;
use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};
use crate::graph::{Filter, FilterGraph, Pin, Stage};

/// Common audio sample rate for mixing.
pub const MIX_SAMPLE_RATE: u32 = 48000;
/// Music is looped when it is shorter than the video by more than this.
pub const LOOP_SLACK_SECS: f64 = 0.5;
/// Fade applied to music that replaces the original audio.
pub const MUSIC_FADE_SECS: f64 = 0.8;
const VOICE_GAIN: f64 = 1.0;
const DUCK_MAKEUP: f64 = 8.0;
const MIX_GAIN: f64 = 2.0;

/// Container for burned-in captions.
pub const BURN_IN_EXTENSION: &str = "mp4";
/// Container able to carry a subtitle stream.
pub const SOFT_CAPTION_EXTENSION: &str = "mkv";

/// Which audio chain a compose plan uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioBranch {
    /// No audio stream in the output
    None,
    /// Source audio mapped straight through
    Original,
    /// Voice plus music ducked under it
    Ducked,
    /// Music alone; faded in and out when it replaces removed audio
    MusicOnly { faded: bool },
}

/// Everything the compose builder needs.
#[derive(Debug, Clone, Copy)]
pub struct ComposeInputs<'a> {
    pub asset: &'a MediaAsset,
    pub music: Option<&'a MediaAsset>,
    pub options: &'a RenderOptions,
    pub captions: &'a CaptionTracks,
    pub output_path: &'a Path,
}

/// A validated compose graph and the command that runs it.
#[derive(Debug, Clone)]
pub struct ComposePlan {
    pub command: FfmpegCommand,
    pub graph: FilterGraph,
    /// Output path with the container extension corrected
    pub output_path: PathBuf,
    pub audio_branch: AudioBranch,
    pub music_looped: bool,
}

/// Output container extension for the caption mode.
pub fn output_extension(burn_in: bool) -> &'static str {
    if burn_in {
        BURN_IN_EXTENSION
    } else {
        SOFT_CAPTION_EXTENSION
    }
}

/// Music shorter than the video (with slack) is looped; both must be known.
pub fn music_needs_loop(music_duration: f64, video_duration: f64) -> bool {
    music_duration > 0.0
        && video_duration > 0.0
        && music_duration + LOOP_SLACK_SECS < video_duration
}

/// Build the compose graph and command.
pub fn build_compose_plan(inputs: ComposeInputs<'_>) -> MediaResult<ComposePlan> {
    let ComposeInputs {
        asset,
        music,
        options,
        captions,
        output_path,
    } = inputs;

    if !asset.has_video {
        return Err(MediaError::NoStreams(asset.path.clone()));
    }

    let output_path = output_path.with_extension(output_extension(options.burn_in));
    let overlay = captions.overlay.as_ref().filter(|_| options.burn_in);
    if options.burn_in && overlay.is_none() {
        warn!("Burn-in requested without captions, rendering without overlay");
    }

    let needs_video_filter = options.flip || overlay.is_some();
    if needs_video_filter && options.encoding.is_stream_copy() {
        return Err(MediaError::unsupported(
            "video stream copy cannot be combined with flip or burned-in captions",
        ));
    }

    let mut command = FfmpegCommand::new(&output_path).input(&asset.path);
    let video_duration = asset.known_duration();

    let mut music_looped = false;
    let music_input = match music {
        Some(music) if music.has_audio => {
            music_looped = options.loop_music
                && video_duration.is_some_and(|v| music_needs_loop(music.duration_sec, v));
            let index = command.input_count();
            command = if music_looped {
                command.looped_input(&music.path)
            } else {
                command.input(&music.path)
            };
            Some(index)
        }
        Some(music) => {
            return Err(MediaError::invalid_input(format!(
                "music file {} has no audio stream",
                music.path.display()
            )));
        }
        None => None,
    };

    let mut graph = FilterGraph::new(command.input_count());

    // Video: flip first so the overlay lands on the mirrored frame.
    let mut video_filters = Vec::new();
    if options.flip {
        video_filters.push(Filter::HFlip);
    }
    if let Some(path) = overlay {
        video_filters.push(Filter::Subtitles { path: path.clone() });
    }
    if video_filters.is_empty() {
        graph.set_video_output(Pin::input_video(0));
    } else {
        graph.push(Stage::chain(Pin::input_video(0), video_filters, Pin::named("vout")));
        graph.set_video_output(Pin::named("vout"));
    }

    let audio_branch = build_audio(
        &mut graph,
        asset,
        music_input,
        music_looped,
        video_duration,
        options,
    );
    graph.validate()?;

    if let Some(filter_complex) = graph.to_filter_complex() {
        command = command.filter_complex(filter_complex);
    }
    for map in graph.map_args() {
        command = command.map(map);
    }

    if !options.burn_in {
        if let Some(plain) = &captions.plain {
            let index = command.input_count();
            command = command
                .input(plain)
                .map(format!("{}:0", index))
                .output_args(["-c:s", "srt"]);
        }
    }

    let copy_video = !needs_video_filter && (!options.burn_in || options.encoding.is_stream_copy());
    command = if copy_video {
        command.video_codec("copy")
    } else {
        command.output_args(options.encoding.video_args())
    };

    command = if graph.audio_output().is_some() {
        command.output_args(options.encoding.audio_args())
    } else {
        command.no_audio()
    };

    if options.burn_in {
        command = command.output_args(["-movflags", "+faststart"]);
    }
    command = command.shortest();

    debug!(
        "Compose plan: audio={:?}, looped_music={}, stages={}",
        audio_branch,
        music_looped,
        graph.stages().len()
    );

    Ok(ComposePlan {
        command,
        graph,
        output_path,
        audio_branch,
        music_looped,
    })
}

fn build_audio(
    graph: &mut FilterGraph,
    asset: &MediaAsset,
    music_input: Option<usize>,
    music_looped: bool,
    video_duration: Option<f64>,
    options: &RenderOptions,
) -> AudioBranch {
    let keep_original = asset.has_audio && !options.remove_original_audio;

    match (music_input, keep_original) {
        (Some(music), true) => {
            graph.push(Stage::new(
                vec![Pin::input_audio(0)],
                vec![
                    Filter::StereoFormat,
                    Filter::Resample { rate: MIX_SAMPLE_RATE },
                    Filter::Volume(VOICE_GAIN),
                    Filter::ASplit { outputs: 2 },
                ],
                vec![Pin::named("voice"), Pin::named("voicekey")],
            ));
            graph.push(Stage::chain(
                Pin::input_audio(music),
                music_chain(music_looped, video_duration, options.music_gain),
                Pin::named("bgm"),
            ));
            graph.push(Stage::new(
                vec![Pin::named("bgm"), Pin::named("voicekey")],
                vec![Filter::SidechainCompress {
                    threshold: options.duck_threshold,
                    ratio: options.duck_ratio,
                    attack_ms: options.duck_attack_ms,
                    release_ms: options.duck_release_ms,
                    makeup: DUCK_MAKEUP,
                }],
                vec![Pin::named("ducked")],
            ));
            graph.push(Stage::new(
                vec![Pin::named("voice"), Pin::named("ducked")],
                vec![Filter::AMix { weights: vec![1.0, 1.0] }, Filter::Volume(MIX_GAIN)],
                vec![Pin::named("aout")],
            ));
            graph.set_audio_output(Pin::named("aout"));
            AudioBranch::Ducked
        }
        (Some(music), false) => {
            // Fades only when the music replaces audio that was removed.
            let faded = options.remove_original_audio;
            let mut filters = music_chain(music_looped, video_duration, options.music_gain);
            if faded {
                filters.push(Filter::FadeIn {
                    duration: MUSIC_FADE_SECS,
                });
                if let Some(duration) = video_duration {
                    filters.push(Filter::FadeOut {
                        start: (duration - MUSIC_FADE_SECS).max(0.0),
                        duration: MUSIC_FADE_SECS,
                    });
                }
            }
            graph.push(Stage::chain(Pin::input_audio(music), filters, Pin::named("aout")));
            graph.set_audio_output(Pin::named("aout"));
            AudioBranch::MusicOnly { faded }
        }
        (None, true) => {
            graph.set_audio_output(Pin::input_audio(0));
            AudioBranch::Original
        }
        (None, false) => AudioBranch::None,
    }
}

fn music_chain(looped: bool, video_duration: Option<f64>, gain: f64) -> Vec<Filter> {
    let mut filters = vec![
        Filter::StereoFormat,
        Filter::Resample { rate: MIX_SAMPLE_RATE },
    ];
    if let (true, Some(duration)) = (looped, video_duration) {
        filters.push(Filter::ATrim {
            start: 0.0,
            end: duration,
        });
        filters.push(Filter::SampleClockPts);
    }
    filters.push(Filter::Volume(gain));
    filters
}
