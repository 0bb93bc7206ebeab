//! Typed filter graph with named pins.
//!
//! Stages consume pins and produce pins. A graph is validated before it is
//! serialized, so a dangling, duplicated or double-consumed label is caught
//! here rather than by the transcoder.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;

use crate::error::{MediaError, MediaResult};

/// Stream kind carried by a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    fn specifier(self) -> char {
        match self {
            MediaKind::Video => 'v',
            MediaKind::Audio => 'a',
        }
    }
}

/// A connection point: a raw input stream or a named stage output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pin {
    Input { index: usize, kind: MediaKind },
    Named(String),
}

impl Pin {
    pub fn input_video(index: usize) -> Self {
        Pin::Input {
            index,
            kind: MediaKind::Video,
        }
    }

    pub fn input_audio(index: usize) -> Self {
        Pin::Input {
            index,
            kind: MediaKind::Audio,
        }
    }

    pub fn named(label: impl Into<String>) -> Self {
        Pin::Named(label.into())
    }

    /// Label as written inside the filter graph, e.g. `[0:v]` or `[vout]`.
    pub fn filter_label(&self) -> String {
        match self {
            Pin::Input { index, kind } => format!("[{}:{}]", index, kind.specifier()),
            Pin::Named(label) => format!("[{}]", label),
        }
    }

    /// Value for `-map`, e.g. `0:a:0` or `[aout]`.
    pub fn map_arg(&self) -> String {
        match self {
            Pin::Input { index, kind } => format!("{}:{}:0", index, kind.specifier()),
            Pin::Named(label) => format!("[{}]", label),
        }
    }
}

/// Classification of a stage by its main filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Trim,
    Concat,
    Mix,
    SidechainDuck,
    OverlaySubtitle,
    Flip,
    Format,
    Gain,
    Fade,
    Split,
}

/// A single filter with typed parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Trim { start: f64, end: f64 },
    ATrim { start: f64, end: f64 },
    /// Restart video timestamps at zero
    ResetPts,
    /// Restart audio timestamps at zero
    ResetAudioPts,
    /// Regenerate audio timestamps from the sample count
    SampleClockPts,
    StereoFormat,
    Resample { rate: u32 },
    Volume(f64),
    SidechainCompress {
        threshold: f64,
        ratio: f64,
        attack_ms: f64,
        release_ms: f64,
        makeup: f64,
    },
    AMix { weights: Vec<f64> },
    FadeIn { duration: f64 },
    FadeOut { start: f64, duration: f64 },
    ASplit { outputs: usize },
    HFlip,
    Subtitles { path: PathBuf },
    Concat { segments: usize, video: bool, audio: bool },
}

impl Filter {
    pub fn kind(&self) -> StageKind {
        match self {
            Filter::Trim { .. }
            | Filter::ATrim { .. }
            | Filter::ResetPts
            | Filter::ResetAudioPts
            | Filter::SampleClockPts => StageKind::Trim,
            Filter::StereoFormat | Filter::Resample { .. } => StageKind::Format,
            Filter::Volume(_) => StageKind::Gain,
            Filter::SidechainCompress { .. } => StageKind::SidechainDuck,
            Filter::AMix { .. } => StageKind::Mix,
            Filter::FadeIn { .. } | Filter::FadeOut { .. } => StageKind::Fade,
            Filter::ASplit { .. } => StageKind::Split,
            Filter::HFlip => StageKind::Flip,
            Filter::Subtitles { .. } => StageKind::OverlaySubtitle,
            Filter::Concat { .. } => StageKind::Concat,
        }
    }

    /// Number of pins the filter consumes.
    fn input_arity(&self) -> usize {
        match self {
            Filter::SidechainCompress { .. } => 2,
            Filter::AMix { weights } => weights.len(),
            Filter::Concat {
                segments,
                video,
                audio,
            } => segments * (usize::from(*video) + usize::from(*audio)),
            _ => 1,
        }
    }

    /// Number of pins the filter produces.
    fn output_arity(&self) -> usize {
        match self {
            Filter::ASplit { outputs } => *outputs,
            Filter::Concat { video, audio, .. } => usize::from(*video) + usize::from(*audio),
            _ => 1,
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Trim { start, end } => write!(f, "trim=start={:.3}:end={:.3}", start, end),
            Filter::ATrim { start, end } => write!(f, "atrim=start={:.3}:end={:.3}", start, end),
            Filter::ResetPts => write!(f, "setpts=PTS-STARTPTS"),
            Filter::ResetAudioPts => write!(f, "asetpts=PTS-STARTPTS"),
            Filter::SampleClockPts => write!(f, "asetpts=N/SR/TB"),
            Filter::StereoFormat => write!(f, "aformat=channel_layouts=stereo"),
            Filter::Resample { rate } => write!(f, "aresample={}", rate),
            Filter::Volume(gain) => write!(f, "volume={}", gain),
            Filter::SidechainCompress {
                threshold,
                ratio,
                attack_ms,
                release_ms,
                makeup,
            } => write!(
                f,
                "sidechaincompress=threshold={}:ratio={}:attack={}:release={}:makeup={}",
                threshold, ratio, attack_ms, release_ms, makeup
            ),
            Filter::AMix { weights } => {
                let weights: Vec<String> = weights.iter().map(|w| w.to_string()).collect();
                write!(
                    f,
                    "amix=inputs={}:duration=first:weights={}",
                    weights.len(),
                    weights.join(" ")
                )
            }
            Filter::FadeIn { duration } => write!(f, "afade=t=in:st=0:d={:.3}", duration),
            Filter::FadeOut { start, duration } => {
                write!(f, "afade=t=out:st={:.3}:d={:.3}", start, duration)
            }
            Filter::ASplit { outputs } => write!(f, "asplit={}", outputs),
            Filter::HFlip => write!(f, "hflip"),
            Filter::Subtitles { path } => write!(
                f,
                "subtitles='{}'",
                escape_filter_path(&path.to_string_lossy())
            ),
            Filter::Concat {
                segments,
                video,
                audio,
            } => write!(
                f,
                "concat=n={}:v={}:a={}",
                segments,
                u8::from(*video),
                u8::from(*audio)
            ),
        }
    }
}

/// Escape a path for use as a quoted filter option value.
fn escape_filter_path(path: &str) -> String {
    path.replace('\\', "\\\\").replace('\'', "\\'").replace(':', "\\:")
}

/// A linear filter chain from input pins to output pins.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    inputs: Vec<Pin>,
    filters: Vec<Filter>,
    outputs: Vec<Pin>,
}

impl Stage {
    pub fn new(inputs: Vec<Pin>, filters: Vec<Filter>, outputs: Vec<Pin>) -> Self {
        Self {
            inputs,
            filters,
            outputs,
        }
    }

    /// Single input, single output chain.
    pub fn chain(input: Pin, filters: Vec<Filter>, output: Pin) -> Self {
        Self::new(vec![input], filters, vec![output])
    }

    /// Kind of the stage's defining filter.
    ///
    /// Multi-input filters define the stage; otherwise the last filter does,
    /// so a `format,resample,volume` chain is a gain stage.
    pub fn kind(&self) -> Option<StageKind> {
        self.filters
            .iter()
            .find(|f| f.input_arity() > 1)
            .or_else(|| self.filters.last())
            .map(Filter::kind)
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn inputs(&self) -> &[Pin] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Pin] {
        &self.outputs
    }

    fn validate_shape(&self, position: usize) -> MediaResult<()> {
        let first = self
            .filters
            .first()
            .ok_or_else(|| {
                MediaError::invalid_graph(format!("stage {} has no filters", position))
            })?;
        let last = self.filters.last().unwrap_or(first);

        if first.input_arity() != self.inputs.len() {
            return Err(MediaError::invalid_graph(format!(
                "stage {} ({}) expects {} inputs, got {}",
                position,
                first,
                first.input_arity(),
                self.inputs.len()
            )));
        }
        if last.output_arity() != self.outputs.len() {
            return Err(MediaError::invalid_graph(format!(
                "stage {} ({}) produces {} outputs, {} labelled",
                position,
                last,
                last.output_arity(),
                self.outputs.len()
            )));
        }
        for inner in &self.filters[1..] {
            if inner.input_arity() != 1 {
                return Err(MediaError::invalid_graph(format!(
                    "stage {}: multi-input filter `{}` must start its chain",
                    position, inner
                )));
            }
        }
        for filter in &self.filters[..self.filters.len() - 1] {
            if filter.output_arity() != 1 {
                return Err(MediaError::invalid_graph(format!(
                    "stage {}: multi-output filter `{}` must end its chain",
                    position, filter
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for pin in &self.inputs {
            write!(f, "{}", pin.filter_label())?;
        }
        let filters: Vec<String> = self.filters.iter().map(|x| x.to_string()).collect();
        write!(f, "{}", filters.join(","))?;
        for pin in &self.outputs {
            write!(f, "{}", pin.filter_label())?;
        }
        Ok(())
    }
}

/// Ordered stages plus the pins routed to the output container.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGraph {
    input_count: usize,
    stages: Vec<Stage>,
    video_out: Option<Pin>,
    audio_out: Option<Pin>,
}

impl FilterGraph {
    /// Create a graph over `input_count` command inputs.
    pub fn new(input_count: usize) -> Self {
        Self {
            input_count,
            stages: Vec::new(),
            video_out: None,
            audio_out: None,
        }
    }

    pub fn push(&mut self, stage: Stage) {
        self.stages.push(stage);
    }

    pub fn set_video_output(&mut self, pin: Pin) {
        self.video_out = Some(pin);
    }

    pub fn set_audio_output(&mut self, pin: Pin) {
        self.audio_out = Some(pin);
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn video_output(&self) -> Option<&Pin> {
        self.video_out.as_ref()
    }

    pub fn audio_output(&self) -> Option<&Pin> {
        self.audio_out.as_ref()
    }

    /// Whether any stage of the given kind is present.
    pub fn has_stage(&self, kind: StageKind) -> bool {
        self.stages
            .iter()
            .any(|s| s.filters.iter().any(|f| f.kind() == kind))
    }

    /// Check pin wiring.
    ///
    /// Every consumed label must be produced by an earlier stage and be
    /// consumed at most once. Every produced label must end up consumed or
    /// mapped. There is exactly one video output and at most one audio output.
    pub fn validate(&self) -> MediaResult<()> {
        // label -> produced-at stage index
        let mut produced: HashMap<&str, usize> = HashMap::new();
        let mut consumed: HashSet<&str> = HashSet::new();

        for (position, stage) in self.stages.iter().enumerate() {
            stage.validate_shape(position)?;

            for pin in &stage.inputs {
                match pin {
                    Pin::Input { index, .. } => self.check_input_index(*index)?,
                    Pin::Named(label) => {
                        if !produced.contains_key(label.as_str()) {
                            return Err(MediaError::invalid_graph(format!(
                                "stage {} consumes [{}] before it is produced",
                                position, label
                            )));
                        }
                        if !consumed.insert(label.as_str()) {
                            return Err(MediaError::invalid_graph(format!(
                                "[{}] is consumed more than once",
                                label
                            )));
                        }
                    }
                }
            }

            for pin in &stage.outputs {
                let Pin::Named(label) = pin else {
                    return Err(MediaError::invalid_graph(format!(
                        "stage {} writes to raw input pin {}",
                        position,
                        pin.filter_label()
                    )));
                };
                if produced.insert(label.as_str(), position).is_some() {
                    return Err(MediaError::invalid_graph(format!(
                        "[{}] is produced more than once",
                        label
                    )));
                }
            }
        }

        let video_out = self
            .video_out
            .as_ref()
            .ok_or_else(|| MediaError::invalid_graph("graph has no video output"))?;
        let mut mapped: Vec<&str> = Vec::new();
        let outputs = [
            (Some(video_out), MediaKind::Video),
            (self.audio_out.as_ref(), MediaKind::Audio),
        ];
        for (pin, kind) in outputs {
            match pin {
                Some(Pin::Input { index, kind: pin_kind }) => {
                    self.check_input_index(*index)?;
                    if *pin_kind != kind {
                        return Err(MediaError::invalid_graph(format!(
                            "{:?} output mapped from a {:?} input stream",
                            kind, pin_kind
                        )));
                    }
                }
                Some(Pin::Named(label)) => {
                    if !produced.contains_key(label.as_str()) {
                        return Err(MediaError::invalid_graph(format!(
                            "mapped output [{}] is never produced",
                            label
                        )));
                    }
                    if consumed.contains(label.as_str()) {
                        return Err(MediaError::invalid_graph(format!(
                            "mapped output [{}] is also consumed by a stage",
                            label
                        )));
                    }
                    mapped.push(label.as_str());
                }
                None => {}
            }
        }

        if let Some(dangling) = produced
            .keys()
            .find(|label| !consumed.contains(**label) && !mapped.contains(*label))
        {
            return Err(MediaError::invalid_graph(format!(
                "[{}] is produced but never used",
                dangling
            )));
        }

        Ok(())
    }

    fn check_input_index(&self, index: usize) -> MediaResult<()> {
        if index >= self.input_count {
            return Err(MediaError::invalid_graph(format!(
                "input #{} referenced but only {} inputs exist",
                index, self.input_count
            )));
        }
        Ok(())
    }

    /// Serialize for `-filter_complex`; `None` when there are no stages.
    pub fn to_filter_complex(&self) -> Option<String> {
        if self.stages.is_empty() {
            return None;
        }
        let stages: Vec<String> = self.stages.iter().map(|s| s.to_string()).collect();
        Some(stages.join(";"))
    }

    /// `-map` values in output order: video first, then audio.
    pub fn map_args(&self) -> Vec<String> {
        self.video_out
            .iter()
            .chain(self.audio_out.iter())
            .map(Pin::map_arg)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flip_graph() -> FilterGraph {
        let mut graph = FilterGraph::new(1);
        graph.push(Stage::chain(Pin::input_video(0), vec![Filter::HFlip], Pin::named("vout")));
        graph.set_video_output(Pin::named("vout"));
        graph
    }

    #[test]
    fn test_pin_labels() {
        assert_eq!(Pin::input_audio(1).filter_label(), "[1:a]");
        assert_eq!(Pin::input_audio(1).map_arg(), "1:a:0");
        assert_eq!(Pin::named("vout").map_arg(), "[vout]");
    }

    #[test]
    fn test_filter_rendering() {
        assert_eq!(Filter::Trim { start: 2.0, end: 5.0 }.to_string(), "trim=start=2.000:end=5.000");
        assert_eq!(Filter::Volume(0.35).to_string(), "volume=0.35");
        assert_eq!(Filter::Volume(2.0).to_string(), "volume=2");
        assert_eq!(
            Filter::AMix { weights: vec![1.0, 1.0] }.to_string(),
            "amix=inputs=2:duration=first:weights=1 1"
        );
        assert_eq!(
            Filter::Concat { segments: 3, video: true, audio: true }.to_string(),
            "concat=n=3:v=1:a=1"
        );
        assert_eq!(
            Filter::Subtitles { path: PathBuf::from("/tmp/job:1/it's.ass") }.to_string(),
            r"subtitles='/tmp/job\:1/it\'s.ass'"
        );
    }

    #[test]
    fn test_valid_graph_serializes() {
        let graph = flip_graph();
        graph.validate().unwrap();
        assert_eq!(graph.to_filter_complex().unwrap(), "[0:v]hflip[vout]");
        assert_eq!(graph.map_args(), vec!["[vout]".to_string()]);
    }

    #[test]
    fn test_empty_graph_maps_raw_streams() {
        let mut graph = FilterGraph::new(1);
        graph.set_video_output(Pin::input_video(0));
        graph.set_audio_output(Pin::input_audio(0));
        graph.validate().unwrap();
        assert!(graph.to_filter_complex().is_none());
        assert_eq!(graph.map_args(), vec!["0:v:0", "0:a:0"]);
    }

    #[test]
    fn test_rejects_double_consumption() {
        let mut graph = FilterGraph::new(2);
        graph.push(Stage::chain(
            Pin::input_audio(0),
            vec![Filter::Volume(1.0)],
            Pin::named("voice"),
        ));
        graph.push(Stage::new(
            vec![Pin::input_audio(1), Pin::named("voice")],
            vec![Filter::SidechainCompress {
                threshold: 0.05,
                ratio: 12.0,
                attack_ms: 5.0,
                release_ms: 250.0,
                makeup: 8.0,
            }],
            vec![Pin::named("ducked")],
        ));
        graph.push(Stage::new(
            vec![Pin::named("voice"), Pin::named("ducked")],
            vec![Filter::AMix { weights: vec![1.0, 1.0] }],
            vec![Pin::named("aout")],
        ));
        graph.push(Stage::chain(Pin::input_video(0), vec![Filter::HFlip], Pin::named("vout")));
        graph.set_video_output(Pin::named("vout"));
        graph.set_audio_output(Pin::named("aout"));

        let err = graph.validate().unwrap_err();
        assert!(err.to_string().contains("consumed more than once"));
    }

    #[test]
    fn test_rejects_unknown_label() {
        let mut graph = FilterGraph::new(1);
        graph.push(Stage::chain(Pin::named("missing"), vec![Filter::HFlip], Pin::named("vout")));
        graph.set_video_output(Pin::named("vout"));
        assert!(graph.validate().is_err());
    }

    #[test]
    fn test_rejects_dangling_output() {
        let mut graph = flip_graph();
        graph.push(Stage::chain(
            Pin::input_audio(0),
            vec![Filter::Volume(1.0)],
            Pin::named("aout"),
        ));
        let err = graph.validate().unwrap_err();
        assert!(err.to_string().contains("[aout]"));
    }

    #[test]
    fn test_rejects_missing_video_output() {
        let mut graph = FilterGraph::new(1);
        graph.set_audio_output(Pin::input_audio(0));
        assert!(graph.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_input() {
        let mut graph = FilterGraph::new(1);
        graph.set_video_output(Pin::input_video(0));
        graph.set_audio_output(Pin::input_audio(1));
        assert!(graph.validate().is_err());
    }

    #[test]
    fn test_rejects_wrong_arity() {
        let mut graph = FilterGraph::new(1);
        graph.push(Stage::new(
            vec![Pin::input_video(0)],
            vec![Filter::Concat { segments: 2, video: true, audio: false }],
            vec![Pin::named("vout")],
        ));
        graph.set_video_output(Pin::named("vout"));
        assert!(graph.validate().is_err());
    }

    #[test]
    fn test_stage_kind() {
        let gain = Stage::chain(
            Pin::input_audio(1),
            vec![Filter::StereoFormat, Filter::Resample { rate: 48000 }, Filter::Volume(0.35)],
            Pin::named("bgm"),
        );
        assert_eq!(gain.kind(), Some(StageKind::Gain));

        let mix = Stage::new(
            vec![Pin::named("a"), Pin::named("b")],
            vec![Filter::AMix { weights: vec![1.0, 1.0] }, Filter::Volume(2.0)],
            vec![Pin::named("aout")],
        );
        assert_eq!(mix.kind(), Some(StageKind::Mix));
    }
}
