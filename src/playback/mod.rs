//! Spoken playback of exam texts with simulated progress.
//!
//! Synthesis engines expose no playback position, only speaking and paused
//! flags, so progress is simulated from the word count estimate in
//! [`estimate`]. Seeking cancels the current utterance and speaks the tail
//! of the text from the requested character offset; the progress of that
//! shorter utterance is mapped back onto the whole text. All clocked
//! methods take the current `Instant` so tests control time.

pub mod estimate;
pub mod voices;

use std::time::{Duration, Instant};

use log::{debug, warn};

use estimate::{estimated_duration, overall_progress, seek_offset, segment_progress};

/// How often callers should poll to keep the flags in sync.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Engines take a moment to fire their start event; within this window a
/// non-speaking engine is treated as still starting, not as finished.
const START_GRACE: Duration = Duration::from_secs(1);

/// The synthesis engine as the controller sees it.
pub trait SynthDriver {
    fn speak(&mut self, text: &str, rate: f64, voice: Option<&str>);
    fn cancel(&mut self);
    fn pause(&mut self);
    fn resume(&mut self);
    fn is_speaking(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Idle,
    /// Speak was issued, waiting for the engine to actually start.
    Pending,
    Speaking,
    Paused,
    Done,
}

pub struct PlaybackController<D> {
    driver: D,
    status: PlaybackStatus,
    text: Option<String>,
    rate: f64,
    voice: Option<String>,
    /// Overall percent at which the current utterance began (non-zero
    /// after a seek).
    segment_start: f64,
    segment_estimate: Duration,
    /// Speaking time consumed before the last pause.
    accumulated: Duration,
    segment_started_at: Option<Instant>,
    speak_requested_at: Option<Instant>,
}

impl<D: SynthDriver> PlaybackController<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            status: PlaybackStatus::Idle,
            text: None,
            rate: 1.0,
            voice: None,
            segment_start: 0.0,
            segment_estimate: Duration::ZERO,
            accumulated: Duration::ZERO,
            segment_started_at: None,
            speak_requested_at: None,
        }
    }

    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    pub fn set_voice(&mut self, voice: Option<String>) {
        self.voice = voice;
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn is_speaking(&self) -> bool {
        matches!(self.status, PlaybackStatus::Speaking | PlaybackStatus::Pending)
    }

    /// The play button: starts the text, or pauses/resumes when the same
    /// text is already playing. A different text always starts over.
    pub fn toggle(&mut self, text: &str, now: Instant) {
        let same_text = self.text.as_deref() == Some(text);
        match self.status {
            PlaybackStatus::Speaking | PlaybackStatus::Pending if same_text => self.pause(now),
            PlaybackStatus::Paused if same_text => self.resume(now),
            _ => self.start(text, now),
        }
    }

    fn start(&mut self, text: &str, now: Instant) {
        self.driver.cancel();
        self.text = Some(text.to_string());
        self.segment_start = 0.0;
        self.speak_segment(text.to_string(), now);
    }

    fn speak_segment(&mut self, segment: String, now: Instant) {
        self.segment_estimate = estimated_duration(&segment, self.rate);
        self.accumulated = Duration::ZERO;
        self.segment_started_at = None;
        self.speak_requested_at = Some(now);
        self.status = PlaybackStatus::Pending;
        self.driver.speak(&segment, self.rate, self.voice.as_deref());
    }

    pub fn pause(&mut self, now: Instant) {
        if self.status == PlaybackStatus::Speaking || self.status == PlaybackStatus::Pending {
            if let Some(started) = self.segment_started_at.take() {
                self.accumulated += now - started;
            }
            self.driver.pause();
            self.status = PlaybackStatus::Paused;
        }
    }

    pub fn resume(&mut self, now: Instant) {
        if self.status == PlaybackStatus::Paused {
            self.segment_started_at = Some(now);
            self.driver.resume();
            self.status = PlaybackStatus::Speaking;
        }
    }

    /// Jump to a point in the text. Seeking to the end completes playback
    /// without speaking anything.
    pub fn seek(&mut self, percent: f64, now: Instant) {
        let Some(text) = self.text.clone() else {
            return;
        };
        if percent >= 100.0 {
            self.driver.cancel();
            self.status = PlaybackStatus::Done;
            self.segment_started_at = None;
            return;
        }
        let chars: Vec<char> = text.chars().collect();
        let offset = seek_offset(percent, chars.len());
        let remainder: String = chars[offset..].iter().collect();
        debug!("Seeking to {percent:.0}% (char offset {offset})");

        self.driver.cancel();
        self.segment_start = percent.max(0.0);
        self.speak_segment(remainder, now);
    }

    pub fn stop(&mut self) {
        self.driver.cancel();
        self.status = PlaybackStatus::Idle;
        self.text = None;
        self.segment_start = 0.0;
        self.accumulated = Duration::ZERO;
        self.segment_started_at = None;
        self.speak_requested_at = None;
    }

    /// Simulated progress through the whole text, in percent.
    pub fn progress(&self, now: Instant) -> f64 {
        match self.status {
            PlaybackStatus::Idle => 0.0,
            PlaybackStatus::Done => 100.0,
            _ => {
                let mut elapsed = self.accumulated;
                if let Some(started) = self.segment_started_at {
                    elapsed += now - started;
                }
                let segment = segment_progress(elapsed, self.segment_estimate);
                overall_progress(self.segment_start, segment)
            }
        }
    }

    /// Sync with the engine. Call this every [`POLL_INTERVAL`].
    pub fn poll(&mut self, now: Instant) {
        match self.status {
            PlaybackStatus::Pending => {
                if self.driver.is_speaking() {
                    self.status = PlaybackStatus::Speaking;
                    self.segment_started_at = Some(now);
                } else if self.past_grace(now) {
                    // The engine never started; a start failure, not a
                    // completed playback.
                    warn!("Speech synthesis did not start, giving up");
                    self.stop();
                }
            }
            PlaybackStatus::Speaking => {
                if !self.driver.is_speaking() && self.past_grace(now) {
                    self.status = PlaybackStatus::Done;
                    self.segment_started_at = None;
                }
            }
            _ => {}
        }
    }

    fn past_grace(&self, now: Instant) -> bool {
        self.speak_requested_at
            .is_some_and(|requested| now - requested > START_GRACE)
    }

    /// Engine error callback. Cancellation noise from our own seeks and
    /// stops is expected and ignored.
    pub fn handle_error(&mut self, error: &str) {
        if error == "canceled" || error == "interrupted" {
            debug!("Ignoring synthesis {error} event");
            return;
        }
        warn!("Speech synthesis failed: {error}");
        self.stop();
    }
}
