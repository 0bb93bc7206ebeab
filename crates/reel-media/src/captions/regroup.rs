//! Regrouping transcript fragments into bounded caption cues.

use reel_models::{CaptionCue, TranscriptFragment, WordTiming};

use super::CaptionConfig;

/// Shortest cue emitted when word timings collapse to a point.
const MIN_CUE_SECS: f64 = 0.05;

/// Accumulate word timings into cues bounded by characters and duration.
///
/// A cue is closed when appending the next word would exceed the character
/// budget, or when the cue would run for the maximum duration or longer. A
/// closed cue ends where the next word starts. Fragments without word timing
/// become one wrapped cue over their own span. Output is re-indexed 1..N.
///
/// Zero-length or out-of-order timings never produce an empty cue: each
/// cue starts no earlier than the previous one ends and lasts at least
/// `MIN_CUE_SECS`.
pub fn regroup(fragments: &[TranscriptFragment], config: &CaptionConfig) -> Vec<CaptionCue> {
    let mut spans = Spans::default();

    for fragment in fragments {
        let words: Vec<&WordTiming> = fragment
            .words
            .iter()
            .filter(|w| !w.word.trim().is_empty())
            .collect();

        if words.is_empty() {
            let text = fragment.text.trim();
            if !text.is_empty() {
                spans.push(
                    fragment.start_sec,
                    fragment.end_sec,
                    wrap_lines(text, config.max_chars, config.max_lines),
                );
            }
            continue;
        }

        let mut buffer: Vec<&str> = Vec::new();
        let mut buffer_start = words[0].start_sec;
        let mut buffer_end = words[0].end_sec;

        for word in &words {
            let token = word.word.trim();
            if buffer.is_empty() {
                buffer_start = word.start_sec;
                buffer_end = word.end_sec;
                buffer.push(token);
                continue;
            }

            let candidate_len = char_len(&buffer.join(" ")) + 1 + char_len(token);
            let too_long = candidate_len > config.max_chars;
            let too_slow = word.end_sec - buffer_start >= config.max_duration_secs;

            if too_long || too_slow {
                let end = if word.start_sec > buffer_start {
                    word.start_sec
                } else {
                    buffer_end
                };
                spans.push(
                    buffer_start,
                    end,
                    wrap_lines(&buffer.join(" "), config.max_chars, config.max_lines),
                );
                buffer.clear();
                buffer_start = word.start_sec;
                buffer_end = word.end_sec;
            }
            buffer_end = buffer_end.max(word.end_sec);
            buffer.push(token);
        }

        if !buffer.is_empty() {
            spans.push(
                buffer_start,
                buffer_end,
                wrap_lines(&buffer.join(" "), config.max_chars, config.max_lines),
            );
        }
    }

    spans.into_cues()
}

/// Ordered cue spans; each starts at or after the previous end.
#[derive(Default)]
struct Spans {
    spans: Vec<(f64, f64, String)>,
}

impl Spans {
    fn push(&mut self, start: f64, end: f64, text: String) {
        let floor = self.spans.last().map_or(0.0, |(_, end, _)| *end);
        let start = start.max(floor);
        let end = end.max(start + MIN_CUE_SECS);
        self.spans.push((start, end, text));
    }

    fn into_cues(self) -> Vec<CaptionCue> {
        self.spans
            .into_iter()
            .enumerate()
            .map(|(i, (start, end, text))| CaptionCue::new(i as u32 + 1, start, end, text))
            .collect()
    }
}

/// Greedy word wrap into at most `max_lines` lines of `max_chars`.
///
/// Words that do not fit once the line limit is reached stay on the last
/// line, so no text is ever dropped.
pub fn wrap_lines(text: &str, max_chars: usize, max_lines: usize) -> String {
    let max_lines = max_lines.max(1);
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let fits = char_len(&current) + 1 + char_len(word) <= max_chars;
        if fits || lines.len() + 1 >= max_lines {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines.join("\n")
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
