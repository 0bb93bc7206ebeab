//! Styled overlay (ASS) track scaled to the frame resolution.

use reel_models::CaptionCue;

const FALLBACK_RESOLUTION: (u32, u32) = (1080, 1920);
const MIN_FONT_SIZE: u32 = 28;
const MAX_FONT_SIZE: u32 = 48;
const MIN_MARGIN_V: u32 = 80;
const MAX_MARGIN_V: u32 = 400;
const MIN_MARGIN_H: u32 = 40;
const MAX_MARGIN_H: u32 = 200;

/// Overlay style derived from the frame resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayStyle {
    pub font_name: String,
    pub font_size: u32,
    pub margin_v: u32,
    pub margin_h: u32,
    /// `&HAABBGGRR` colours
    pub primary_colour: String,
    pub outline_colour: String,
    pub back_colour: String,
    pub outline: u32,
}

impl OverlayStyle {
    /// Scale font and margins to the frame; unknown dimensions use 1080x1920.
    pub fn for_resolution(resolution: Option<(u32, u32)>) -> Self {
        let (width, height) = resolution.unwrap_or(FALLBACK_RESOLUTION);
        let scaled = |dim: u32, factor: f64| (dim as f64 * factor).round() as u32;

        Self {
            font_name: "Arial".to_string(),
            font_size: scaled(height, 0.04).clamp(MIN_FONT_SIZE, MAX_FONT_SIZE),
            margin_v: scaled(height, 0.09).clamp(MIN_MARGIN_V, MAX_MARGIN_V),
            margin_h: scaled(width, 0.05).clamp(MIN_MARGIN_H, MAX_MARGIN_H),
            primary_colour: "&H0000FFFF&".to_string(),
            outline_colour: "&H00000000&".to_string(),
            back_colour: "&H50000000&".to_string(),
            outline: 3,
        }
    }
}

/// Serialize cues as an ASS script; malformed cues are dropped.
pub fn render_overlay(cues: &[CaptionCue], style: &OverlayStyle) -> String {
    let mut out = String::new();
    out.push_str("[Script Info]\n");
    out.push_str("ScriptType: v4.00+\n");
    out.push_str("PlayResX: 1080\n");
    out.push_str("PlayResY: 1920\n");
    out.push_str("WrapStyle: 2\n");
    out.push_str("ScaledBorderAndShadow: yes\n\n");

    out.push_str("[V4+ Styles]\n");
    out.push_str(
        "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, \
         BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, \
         BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n",
    );
    out.push_str(&format!(
        "Style: BottomBox,{font},{size},{primary},&H000000FF&,{outline_c},{back},\
         -1,0,0,0,100,100,0,0,3,{outline},0,2,{mh},{mh},{mv},1\n\n",
        font = style.font_name,
        size = style.font_size,
        primary = style.primary_colour,
        outline_c = style.outline_colour,
        back = style.back_colour,
        outline = style.outline,
        mh = style.margin_h,
        mv = style.margin_v,
    ));

    out.push_str("[Events]\n");
    out.push_str(
        "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n",
    );
    for cue in cues.iter().filter(|c| c.is_well_formed()) {
        let text = escape_overlay_text(cue.text.trim());
        if text.is_empty() {
            continue;
        }
        out.push_str(&format!(
            "Dialogue: 0,{},{},BottomBox,,0,0,0,,{}\n",
            ass_timestamp(cue.start_sec),
            ass_timestamp(cue.end_sec),
            text
        ));
    }
    out
}

/// `H:MM:SS.cc` with rounded centiseconds.
pub fn ass_timestamp(seconds: f64) -> String {
    let total_cs = (seconds.max(0.0) * 100.0).round() as u64;
    let hours = total_cs / 360_000;
    let minutes = (total_cs / 6000) % 60;
    let secs = (total_cs / 100) % 60;
    let centis = total_cs % 100;
    format!("{}:{:02}:{:02}.{:02}", hours, minutes, secs, centis)
}

/// Escape override-block and line-break syntax in cue text.
pub fn escape_overlay_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '{' => out.push_str("\\{"),
            '}' => out.push_str("\\}"),
            '\n' => out.push_str("\\N"),
            '\r' => {}
            other => out.push(other),
        }
    }
    out
}
