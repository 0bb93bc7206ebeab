//! Render pipeline metrics.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const RENDERS_TOTAL: &str = "reel_renders_total";
    pub const RENDER_DURATION_SECONDS: &str = "reel_render_seconds";
    pub const REPAIRS_TOTAL: &str = "reel_repairs_total";
    pub const REMIX_FALLBACKS_TOTAL: &str = "reel_remix_fallbacks_total";
}

/// Record a finished render and its wall time.
pub fn record_render(mode: &str, success: bool, duration_secs: f64) {
    let outcome = if success { "success" } else { "failure" };
    let labels = [("mode", mode.to_string()), ("outcome", outcome.to_string())];
    counter!(names::RENDERS_TOTAL, &labels).increment(1);
    histogram!(names::RENDER_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a repair step.
pub fn record_repair(action: &str) {
    let labels = [("action", action.to_string())];
    counter!(names::REPAIRS_TOTAL, &labels).increment(1);
}

/// Record a remix that fell back to the original source.
pub fn record_remix_fallback() {
    counter!(names::REMIX_FALLBACKS_TOTAL).increment(1);
}
