//! Exam countdown.
//!
//! The countdown itself is a pure state machine advanced by `tick()`, one
//! call per elapsed second, so every transition can be tested without
//! waiting on a clock. `spawn` wraps it in a tokio task that ticks on a
//! real one second interval and forwards events over a channel.

use std::time::Duration;

use log::info;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::ExamType;

/// Official exam durations, in seconds.
pub fn exam_duration_secs(exam_type: ExamType) -> u32 {
    let minutes = match exam_type {
        ExamType::Reading => 65,
        ExamType::Listening => 45,
        ExamType::Writing => 40,
        ExamType::Speaking => 35,
        ExamType::Knm => 45,
    };
    minutes * 60
}

/// The warning fires when the clock first reaches this many seconds.
pub const LOW_TIME_WARNING_SECS: u32 = 100;

/// How many ticks the warning banner stays visible (3 seconds).
const WARNING_VISIBLE_TICKS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTick {
    /// One second elapsed; the remaining time is attached.
    Tick(u32),
    /// Remaining time just crossed the warning threshold. Fired once.
    Warning(u32),
    /// The clock hit zero. Fired once, after which the timer is done.
    TimeUp,
}

#[derive(Debug)]
pub struct CountdownTimer {
    remaining: u32,
    running: bool,
    finished: bool,
    warning_fired: bool,
    warning_ticks_left: u32,
}

impl CountdownTimer {
    pub fn new(duration_secs: u32) -> Self {
        Self {
            remaining: duration_secs,
            running: false,
            finished: false,
            warning_fired: false,
            warning_ticks_left: 0,
        }
    }

    pub fn for_exam(exam_type: ExamType) -> Self {
        Self::new(exam_duration_secs(exam_type))
    }

    pub fn start(&mut self) {
        if !self.finished {
            self.running = true;
        }
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.warning_ticks_left = 0;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Whether the low-time banner should currently be shown. It clears on
    /// its own a few ticks after the warning fired.
    pub fn warning_visible(&self) -> bool {
        self.warning_ticks_left > 0
    }

    /// Advance the clock by one second. Returns `None` when stopped or
    /// already finished.
    pub fn tick(&mut self) -> Option<TimerTick> {
        if !self.running || self.finished {
            return None;
        }
        self.warning_ticks_left = self.warning_ticks_left.saturating_sub(1);
        self.remaining = self.remaining.saturating_sub(1);

        if self.remaining == 0 {
            self.finished = true;
            self.running = false;
            self.warning_ticks_left = 0;
            return Some(TimerTick::TimeUp);
        }
        if self.remaining == LOW_TIME_WARNING_SECS && !self.warning_fired {
            self.warning_fired = true;
            self.warning_ticks_left = WARNING_VISIBLE_TICKS;
            return Some(TimerTick::Warning(self.remaining));
        }
        Some(TimerTick::Tick(self.remaining))
    }

    /// Run the countdown on a one second interval, forwarding every event.
    /// The task ends after `TimeUp` or when the receiver goes away.
    pub fn spawn(mut self, events: mpsc::UnboundedSender<TimerTick>) -> JoinHandle<()> {
        self.start();
        info!("Starting exam countdown at {} second(s)", self.remaining);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.tick().await; // first tick resolves immediately
            loop {
                interval.tick().await;
                match self.tick() {
                    Some(TimerTick::TimeUp) => {
                        let _ = events.send(TimerTick::TimeUp);
                        break;
                    }
                    Some(event) => {
                        if events.send(event).is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        })
    }
}
