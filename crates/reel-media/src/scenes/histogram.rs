//! Hue/saturation histograms and cut detection over decoded frames.

/// 8-bit HSV conversion of one RGB pixel: hue in [0, 180), saturation in [0, 255].
fn hue_saturation(r: u8, g: u8, b: u8) -> (f64, f64) {
    let (r, g, b) = (r as f64, g as f64, b as f64);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let s = if max == 0.0 { 0.0 } else { 255.0 * delta / max };

    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    (h / 2.0, s)
}

/// 2-D hue × saturation histogram of an RGB24 frame, min-max normalized to [0, 1].
pub fn hs_histogram(rgb: &[u8], bins: usize) -> Vec<f64> {
    let bins = bins.max(1);
    let mut histogram = vec![0.0; bins * bins];

    for pixel in rgb.chunks_exact(3) {
        let (h, s) = hue_saturation(pixel[0], pixel[1], pixel[2]);
        let h_bin = ((h * bins as f64 / 180.0) as usize).min(bins - 1);
        let s_bin = ((s * bins as f64 / 256.0) as usize).min(bins - 1);
        histogram[h_bin * bins + s_bin] += 1.0;
    }

    let max = histogram.iter().cloned().fold(f64::MIN, f64::max);
    let min = histogram.iter().cloned().fold(f64::MAX, f64::min);
    let range = max - min;
    if range > 0.0 {
        for value in &mut histogram {
            *value = (*value - min) / range;
        }
    } else {
        histogram.iter_mut().for_each(|v| *v = 0.0);
    }
    histogram
}

/// Pearson correlation of two histograms; identical flat inputs correlate to 1.
pub fn correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 1.0;
    }
    let mean_a = a[..n].iter().sum::<f64>() / n as f64;
    let mean_b = b[..n].iter().sum::<f64>() / n as f64;

    let mut num = 0.0;
    let mut den_a = 0.0;
    let mut den_b = 0.0;
    for (x, y) in a[..n].iter().zip(&b[..n]) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        num += dx * dy;
        den_a += dx * dx;
        den_b += dy * dy;
    }

    let den = den_a * den_b;
    if den.abs() > f64::EPSILON {
        num / den.sqrt()
    } else {
        1.0
    }
}

/// Streaming cut detector fed one histogram per decoded frame.
///
/// A cut is recorded at frame `i` when `1 - correlation(prev, cur)` reaches
/// the threshold and at least `min_gap` frames have passed since the last cut.
#[derive(Debug, Clone)]
pub struct CutDetector {
    threshold: f64,
    min_gap: usize,
    previous: Option<Vec<f64>>,
    frames: usize,
    cuts: Vec<usize>,
}

impl CutDetector {
    pub fn new(threshold: f64, min_gap: usize) -> Self {
        Self {
            threshold,
            min_gap,
            previous: None,
            frames: 0,
            cuts: vec![0],
        }
    }

    /// Feed the next frame's histogram; returns the frame index if it is a cut.
    pub fn push(&mut self, histogram: Vec<f64>) -> Option<usize> {
        let index = self.frames;
        self.frames += 1;

        let mut cut = None;
        if let Some(previous) = &self.previous {
            let diff = 1.0 - correlation(previous, &histogram);
            let last_cut = self.cuts.last().copied().unwrap_or(0);
            if diff >= self.threshold && index - last_cut >= self.min_gap {
                self.cuts.push(index);
                cut = Some(index);
            }
        }
        self.previous = Some(histogram);
        cut
    }

    pub fn frames_seen(&self) -> usize {
        self.frames
    }

    /// Boundary frame indices starting at 0 and ending at the last frame.
    ///
    /// Empty when no frame was decoded.
    pub fn finish(self) -> Vec<usize> {
        if self.frames == 0 {
            return Vec::new();
        }
        let mut boundaries = self.cuts;
        let last_frame = self.frames - 1;
        if boundaries.last() != Some(&last_frame) {
            boundaries.push(last_frame);
        }
        boundaries
    }
}
