//! High-frequency feedback channel.
//!
//! Every sample is pushed to a `FeedbackSink` directly from the timer so a
//! renderer can update transforms or filters imperatively. The coarse
//! `Event` stream only carries phase transitions and terminal states.

use super::phase::Phase;

pub trait FeedbackSink {
    /// Called on every sample, holding or decaying.
    fn on_sample(&mut self, progress: f64, phase: Phase);
}

/// Discards all samples.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFeedback;

impl FeedbackSink for NoFeedback {
    fn on_sample(&mut self, _progress: f64, _phase: Phase) {}
}

/// Keeps every sample. Useful for replays and assertions.
#[derive(Debug, Default, Clone)]
pub struct RecordedFeedback {
    pub samples: Vec<(f64, Phase)>,
}

impl FeedbackSink for RecordedFeedback {
    fn on_sample(&mut self, progress: f64, phase: Phase) {
        self.samples.push((progress, phase));
    }
}
