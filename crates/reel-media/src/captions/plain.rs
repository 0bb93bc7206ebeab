//! Plain indexed-timed-text (SRT) track.

use reel_models::CaptionCue;

/// Serialize cues as SRT; malformed cues are dropped and the rest re-indexed.
pub fn render_plain(cues: &[CaptionCue]) -> String {
    let mut out = String::new();
    let kept = cues
        .iter()
        .filter(|c| c.is_well_formed())
        .filter(|c| !c.text.trim().is_empty());

    for (i, cue) in kept.enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            srt_timestamp(cue.start_sec),
            srt_timestamp(cue.end_sec),
            cue.text.trim()
        ));
    }
    out
}

/// `HH:MM:SS,mmm` with truncated milliseconds.
pub fn srt_timestamp(seconds: f64) -> String {
    // 1e-6 absorbs binary representation error before truncating
    let total_ms = (seconds.max(0.0) * 1000.0 + 1e-6).floor() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms / 60_000) % 60;
    let secs = (total_ms / 1000) % 60;
    let millis = total_ms % 1000;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}
