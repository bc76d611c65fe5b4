//! Speech answer capture for the speaking exam.
//!
//! Two sources feed one recording: a speech recognizer streaming transcript
//! results and an audio recorder streaming encoded chunks. Both deliver
//! their events asynchronously and both can fire after teardown, so every
//! event is tagged with the epoch of the capture session it belongs to and
//! events from a stale epoch are dropped. Stopping flips the controller out
//! of the recording phase before the backend is torn down and captures the
//! transcript at that moment as the authoritative answer; results that
//! trickle in afterwards cannot change it.

pub mod transcript;

use bytes::{Bytes, BytesMut};
use log::{debug, info, warn};
use thiserror::Error;

use crate::models::AudioClip;

pub use transcript::TranscriptBuffer;

#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("microphone unavailable: {0}")]
    MicrophoneUnavailable(String),
    #[error("a recording is already in progress")]
    Busy,
    #[error("nothing is being recorded")]
    NotRecording,
    #[error("the transcript can only be edited while idle")]
    EditWhileRecording,
}

/// Recognizer failure classes, mapped from the engine's error codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerError {
    /// Silence timed out. Harmless, the recognizer keeps running.
    NoSpeech,
    /// Connectivity loss. Transcription halts for this session; the audio
    /// recorder is unaffected.
    Network,
    /// Teardown we triggered ourselves.
    Aborted,
    /// Permission denied by the user.
    NotAllowed,
    Other(String),
}

#[derive(Debug, Clone)]
pub enum RecognizerEvent {
    Result {
        finals: Vec<String>,
        interim: String,
    },
    Error(RecognizerError),
    Ended,
}

#[derive(Debug, Clone)]
pub enum RecorderEvent {
    Chunk(Bytes),
    Stopped { mime_type: String },
}

/// Action the caller must take on its capture backend.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingSignal {
    /// Start recognizer and recorder for the given epoch.
    StartCapture { epoch: u64 },
    /// Restart only the recognizer after it gave up on a long silence.
    RestartRecognizer { epoch: u64 },
    /// The recognizer failed and will not be restarted. Non-fatal: audio
    /// capture continues, the transcript just stops growing.
    RecognizerFault(RecognizerError),
    /// Tear the backend down; late events for this epoch are still accepted.
    StopCapture,
    /// Both sources have drained. Fired once per epoch.
    Finished(Recording),
}

/// The completed answer: the transcript captured at stop time and the
/// encoded audio, when the recorder produced any.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub transcript: String,
    pub audio: Option<AudioClip>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Recording,
    Stopping,
}

pub struct RecordingController {
    phase: Phase,
    epoch: u64,
    buffer: TranscriptBuffer,
    /// Transcript frozen at the moment `stop` was called.
    captured: Option<String>,
    chunks: BytesMut,
    mime_type: Option<String>,
    /// Set on a network failure; suppresses recognizer restarts for the
    /// rest of the session.
    recognizer_halted: bool,
    recognizer_ended: bool,
    recorder_stopped: bool,
    finished: bool,
}

impl Default for RecordingController {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingController {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            epoch: 0,
            buffer: TranscriptBuffer::new(),
            captured: None,
            chunks: BytesMut::new(),
            mime_type: None,
            recognizer_halted: false,
            recognizer_ended: false,
            recorder_stopped: false,
            finished: false,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.phase == Phase::Recording
    }

    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The transcript to show. Once stopped, this is the captured answer;
    /// late recognizer results never change it.
    pub fn transcript(&self) -> String {
        match &self.captured {
            Some(captured) => captured.clone(),
            None => self.buffer.text(),
        }
    }

    /// Replace the transcript by hand. Only allowed while idle.
    pub fn set_transcript(&mut self, text: &str) -> Result<(), RecordingError> {
        if self.phase != Phase::Idle {
            return Err(RecordingError::EditWhileRecording);
        }
        self.captured = Some(text.to_string());
        Ok(())
    }

    /// Begin a new capture session. `microphone` is the attempt to acquire
    /// the input device; when it fails nothing changes and the previous
    /// transcript survives.
    pub fn start(
        &mut self,
        microphone: Result<(), RecordingError>,
    ) -> Result<RecordingSignal, RecordingError> {
        if self.phase != Phase::Idle {
            return Err(RecordingError::Busy);
        }
        microphone?;

        self.epoch += 1;
        self.buffer.clear();
        self.captured = None;
        self.chunks = BytesMut::new();
        self.mime_type = None;
        self.recognizer_halted = false;
        self.recognizer_ended = false;
        self.recorder_stopped = false;
        self.finished = false;
        self.phase = Phase::Recording;
        info!("Recording started (epoch {})", self.epoch);
        Ok(RecordingSignal::StartCapture { epoch: self.epoch })
    }

    /// Stop capturing. The phase flips and the transcript is captured
    /// before the caller tears the backend down, so events racing the
    /// teardown see a controller that is no longer recording.
    pub fn stop(&mut self) -> Result<RecordingSignal, RecordingError> {
        if self.phase != Phase::Recording {
            return Err(RecordingError::NotRecording);
        }
        self.phase = Phase::Stopping;
        self.captured = Some(self.buffer.text());
        info!("Recording stopping (epoch {})", self.epoch);
        Ok(RecordingSignal::StopCapture)
    }

    pub fn recognizer_event(
        &mut self,
        epoch: u64,
        event: RecognizerEvent,
    ) -> Option<RecordingSignal> {
        if epoch != self.epoch {
            debug!("Dropping recognizer event from stale epoch {epoch}");
            return None;
        }
        match event {
            RecognizerEvent::Result { finals, interim } => {
                for segment in &finals {
                    self.buffer.push_final(segment);
                }
                self.buffer.set_interim(&interim);
                None
            }
            RecognizerEvent::Error(error) => self.recognizer_error(error),
            RecognizerEvent::Ended => match self.phase {
                // A halted recognizer stays down; remember it is gone so a
                // later stop does not wait for a second end event.
                Phase::Recording if self.recognizer_halted => {
                    self.recognizer_ended = true;
                    None
                }
                // The engine gives up on long silences; keep it alive.
                Phase::Recording => Some(RecordingSignal::RestartRecognizer { epoch: self.epoch }),
                Phase::Stopping => {
                    self.recognizer_ended = true;
                    self.try_finish()
                }
                Phase::Idle => None,
            },
        }
    }

    pub fn recorder_event(&mut self, epoch: u64, event: RecorderEvent) -> Option<RecordingSignal> {
        if epoch != self.epoch {
            debug!("Dropping recorder event from stale epoch {epoch}");
            return None;
        }
        match event {
            RecorderEvent::Chunk(chunk) => {
                self.chunks.extend_from_slice(&chunk);
                None
            }
            RecorderEvent::Stopped { mime_type } => {
                self.mime_type = Some(mime_type);
                self.recorder_stopped = true;
                self.try_finish()
            }
        }
    }

    fn recognizer_error(&mut self, error: RecognizerError) -> Option<RecordingSignal> {
        match error {
            RecognizerError::NoSpeech => None,
            RecognizerError::Network if self.phase == Phase::Recording => {
                warn!("Recognizer lost its connection; transcription halted, audio continues");
                self.recognizer_halted = true;
                Some(RecordingSignal::RecognizerFault(RecognizerError::Network))
            }
            RecognizerError::Network => None,
            RecognizerError::Aborted | RecognizerError::NotAllowed => {
                debug!("Recognizer reported {error:?}, ignoring");
                None
            }
            RecognizerError::Other(message) => {
                warn!("Recognizer error: {message}");
                Some(RecordingSignal::RecognizerFault(RecognizerError::Other(
                    message,
                )))
            }
        }
    }

    fn try_finish(&mut self) -> Option<RecordingSignal> {
        if self.phase != Phase::Stopping
            || !self.recognizer_ended
            || !self.recorder_stopped
            || self.finished
        {
            return None;
        }
        self.finished = true;
        self.phase = Phase::Idle;

        let audio = if self.chunks.is_empty() {
            None
        } else {
            Some(AudioClip {
                mime_type: self
                    .mime_type
                    .clone()
                    .unwrap_or_else(|| "audio/webm".to_string()),
                data: self.chunks.split().freeze(),
            })
        };
        let transcript = self.captured.clone().unwrap_or_default();
        info!(
            "Recording finished (epoch {}, {} transcript char(s), audio: {})",
            self.epoch,
            transcript.len(),
            audio.is_some()
        );
        Some(RecordingSignal::Finished(Recording { transcript, audio }))
    }
}
