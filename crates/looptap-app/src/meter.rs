//! Terminal level meter fed one frame per capture-and-play cycle.

use looptap_audio::FrameSink;
use looptap_core::Frame;
use std::io::Write;

/// Fraction of the held peak kept per frame.
const PEAK_DECAY: f32 = 0.85;

/// Draw a bar of `width` cells filled in proportion to `level`.
pub fn render_bar(level: f32, width: usize) -> String {
    let filled = ((level.clamp(0.0, 1.0) * width as f32).round() as usize).min(width);
    let mut bar = String::with_capacity(width + 2);
    bar.push('[');
    bar.extend(std::iter::repeat('#').take(filled));
    bar.extend(std::iter::repeat(' ').take(width - filled));
    bar.push(']');
    bar
}

/// Peak level in dBFS, floored at -96.
pub fn peak_db(level: f32) -> f32 {
    if level <= 0.0 {
        return -96.0;
    }
    (20.0 * level.log10()).max(-96.0)
}

/// Redraws a single status line with a decaying peak.
pub struct LevelMeter<W: Write> {
    out: W,
    width: usize,
    held: f32,
}

impl<W: Write> LevelMeter<W> {
    pub const fn new(out: W, width: usize) -> Self {
        Self {
            out,
            width,
            held: 0.0,
        }
    }

    /// Current held peak, 0.0..=1.0.
    pub const fn held(&self) -> f32 {
        self.held
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> FrameSink for LevelMeter<W> {
    fn on_frame(&mut self, frame: &Frame) {
        self.held = frame.peak().max(self.held * PEAK_DECAY);
        let line = format!(
            "\r{} {:>6.1} dB",
            render_bar(self.held, self.width),
            peak_db(self.held)
        );
        // A broken terminal must not stop the audio path.
        let _ = self.out.write_all(line.as_bytes());
        let _ = self.out.flush();
    }
}
