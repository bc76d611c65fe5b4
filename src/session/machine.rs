//! Exam attempt lifecycle, modelled as one tagged state value.
//!
//! Every phase carries exactly the data that is valid in that phase, so
//! callers can never observe a loaded question list without an exam id or
//! a review without the attempt it belongs to. Transitions that need I/O
//! (fetching exercises, submitting answers) return a [`SessionCommand`]
//! for the caller to execute; the outcome is fed back through
//! `load_succeeded` / `load_failed` and friends.

use std::collections::BTreeMap;

use log::{debug, warn};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    AnswerPayload, AnswerValue, ExamType, GenerateExamResponse, Question, ValidationResponse,
};

use super::timer::exam_duration_secs;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no exam attempt is loaded")]
    NotLoaded,
    #[error("question index {0} is out of range")]
    QuestionOutOfRange(usize),
    #[error("answer shape does not fit question {index}: {reason}")]
    AnswerShape { index: usize, reason: String },
    #[error("exam is already being submitted")]
    SubmitInFlight,
}

/// A loaded exam with the user's progress through it.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub exam_id: Uuid,
    pub exam_type: ExamType,
    pub questions: Vec<Question>,
    pub current_index: usize,
    /// Sparse answers, keyed by question index. Last write wins.
    pub answers: BTreeMap<usize, AnswerValue>,
    pub seconds_left: u32,
}

impl Attempt {
    fn new(exam_id: Uuid, exam_type: ExamType, questions: Vec<Question>) -> Self {
        Self {
            exam_id,
            exam_type,
            questions,
            current_index: 0,
            answers: BTreeMap::new(),
            seconds_left: exam_duration_secs(exam_type),
        }
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    /// One payload per question, in question order. Unanswered questions
    /// submit a null payload so the grader sees the gap.
    fn payloads(&self) -> Vec<AnswerPayload> {
        (0..self.questions.len())
            .map(|index| match self.answers.get(&index) {
                Some(answer) => AnswerPayload::from_answer(answer),
                None => AnswerPayload::unanswered(),
            })
            .collect()
    }
}

/// Where the session currently is in its lifecycle.
#[derive(Debug, Clone)]
pub enum ExamPhase {
    /// Nothing loaded. `selected` remembers the last requested type so a
    /// failed load can be retried; `error` is the message to show for it.
    Idle {
        selected: Option<ExamType>,
        error: Option<String>,
    },
    /// Exercise generation is in flight.
    Loading { exam_type: ExamType },
    /// Exam is loaded and the user is answering.
    Ready { attempt: Attempt },
    /// Answers were sent for grading. `error` holds a failed submit so the
    /// attempt (and its answers) survive for a retry.
    Submitting {
        attempt: Attempt,
        error: Option<String>,
    },
    /// Grading came back.
    Reviewed {
        attempt: Attempt,
        validation: ValidationResponse,
    },
}

/// Side effect the caller must perform to advance the session.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    Fetch(ExamType),
    Validate {
        exam_id: Uuid,
        answers: Vec<AnswerPayload>,
    },
}

pub struct ExamSession {
    phase: ExamPhase,
}

impl Default for ExamSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ExamSession {
    pub fn new() -> Self {
        Self {
            phase: ExamPhase::Idle {
                selected: None,
                error: None,
            },
        }
    }

    pub fn phase(&self) -> &ExamPhase {
        &self.phase
    }

    pub fn attempt(&self) -> Option<&Attempt> {
        match &self.phase {
            ExamPhase::Ready { attempt }
            | ExamPhase::Submitting { attempt, .. }
            | ExamPhase::Reviewed { attempt, .. } => Some(attempt),
            _ => None,
        }
    }

    /// Mutable attempt access while editing is legal: answering, or fixing
    /// things up after a failed submit. An in-flight submit stays frozen.
    fn attempt_mut(&mut self) -> Option<&mut Attempt> {
        match &mut self.phase {
            ExamPhase::Ready { attempt } => Some(attempt),
            ExamPhase::Submitting {
                attempt,
                error: Some(_),
            } => Some(attempt),
            _ => None,
        }
    }

    /// Pick an exam type. Returns the fetch command, or `None` when the
    /// same exam is already loaded or already being fetched.
    pub fn select(&mut self, exam_type: ExamType) -> Option<SessionCommand> {
        match &self.phase {
            ExamPhase::Ready { attempt } if attempt.exam_type == exam_type => {
                debug!("{exam_type} exam already loaded, not refetching");
                return None;
            }
            ExamPhase::Loading { exam_type: current } if *current == exam_type => {
                return None;
            }
            _ => {}
        }
        self.phase = ExamPhase::Loading { exam_type };
        Some(SessionCommand::Fetch(exam_type))
    }

    pub fn load_succeeded(&mut self, response: GenerateExamResponse) {
        let ExamPhase::Loading { exam_type } = self.phase else {
            warn!("Ignoring exam load result outside of the loading phase");
            return;
        };
        if response.exam_type != exam_type {
            warn!(
                "Ignoring stale load result for {} while loading {exam_type}",
                response.exam_type
            );
            return;
        }
        let attempt = Attempt::new(response.id, response.exam_type, response.exercises.questions);
        self.phase = ExamPhase::Ready { attempt };
    }

    pub fn load_failed(&mut self, message: impl Into<String>) {
        let ExamPhase::Loading { exam_type } = self.phase else {
            return;
        };
        self.phase = ExamPhase::Idle {
            selected: Some(exam_type),
            error: Some(message.into()),
        };
    }

    /// Refetch the exam that last failed to load.
    pub fn retry(&mut self) -> Option<SessionCommand> {
        let ExamPhase::Idle {
            selected: Some(exam_type),
            ..
        } = self.phase
        else {
            return None;
        };
        self.phase = ExamPhase::Loading { exam_type };
        Some(SessionCommand::Fetch(exam_type))
    }

    /// Record an answer, rejecting shapes the question cannot hold.
    pub fn set_answer(&mut self, index: usize, value: AnswerValue) -> Result<(), SessionError> {
        let attempt = self.attempt_mut().ok_or(SessionError::NotLoaded)?;
        let question = attempt
            .questions
            .get(index)
            .ok_or(SessionError::QuestionOutOfRange(index))?;

        check_answer_shape(index, attempt.exam_type, question, &value)?;
        attempt.answers.insert(index, value);
        Ok(())
    }

    pub fn answer(&self, index: usize) -> Option<&AnswerValue> {
        self.attempt()?.answers.get(&index)
    }

    /// Jump to a question, clamped into the valid range.
    pub fn go_to(&mut self, index: usize) {
        if let Some(attempt) = self.attempt_mut() {
            let last = attempt.questions.len().saturating_sub(1);
            attempt.current_index = index.min(last);
        }
    }

    pub fn next(&mut self) {
        if let Some(attempt) = self.attempt_mut() {
            let last = attempt.questions.len().saturating_sub(1);
            attempt.current_index = (attempt.current_index + 1).min(last);
        }
    }

    pub fn previous(&mut self) {
        if let Some(attempt) = self.attempt_mut() {
            attempt.current_index = attempt.current_index.saturating_sub(1);
        }
    }

    pub fn set_time_left(&mut self, seconds: u32) {
        if let Some(attempt) = self.attempt_mut() {
            attempt.seconds_left = seconds;
        }
    }

    /// Send the attempt for grading. Also usable after a failed submit,
    /// in which case the preserved answers are sent again.
    pub fn submit(&mut self) -> Result<SessionCommand, SessionError> {
        let attempt = match &self.phase {
            ExamPhase::Ready { attempt } => attempt.clone(),
            ExamPhase::Submitting {
                attempt,
                error: Some(_),
            } => attempt.clone(),
            ExamPhase::Submitting { error: None, .. } => return Err(SessionError::SubmitInFlight),
            _ => return Err(SessionError::NotLoaded),
        };
        let command = SessionCommand::Validate {
            exam_id: attempt.exam_id,
            answers: attempt.payloads(),
        };
        self.phase = ExamPhase::Submitting {
            attempt,
            error: None,
        };
        Ok(command)
    }

    pub fn validation_succeeded(&mut self, validation: ValidationResponse) {
        let ExamPhase::Submitting { attempt, .. } = &self.phase else {
            warn!("Ignoring validation result outside of the submitting phase");
            return;
        };
        self.phase = ExamPhase::Reviewed {
            attempt: attempt.clone(),
            validation,
        };
    }

    pub fn validation_failed(&mut self, message: impl Into<String>) {
        if let ExamPhase::Submitting { attempt, .. } = &self.phase {
            self.phase = ExamPhase::Submitting {
                attempt: attempt.clone(),
                error: Some(message.into()),
            };
        }
    }

    /// Drop everything and return to a pristine selection screen.
    pub fn clear(&mut self) {
        self.phase = ExamPhase::Idle {
            selected: None,
            error: None,
        };
    }
}

fn check_answer_shape(
    index: usize,
    exam_type: ExamType,
    question: &Question,
    value: &AnswerValue,
) -> Result<(), SessionError> {
    let reject = |reason: &str| SessionError::AnswerShape {
        index,
        reason: reason.to_string(),
    };

    if question.has_choices() {
        let options = question.answers.as_ref().map_or(0, Vec::len);
        return match value {
            AnswerValue::Choice(choice) if (*choice as usize) < options => Ok(()),
            AnswerValue::Choice(_) => Err(reject("choice index is out of range")),
            _ => Err(reject("multiple choice questions take a choice index")),
        };
    }

    match (exam_type, value) {
        (ExamType::Speaking, AnswerValue::Audio(_)) => Ok(()),
        (ExamType::Speaking, AnswerValue::Text(_)) => Ok(()),
        (ExamType::Speaking, _) => Err(reject("speaking tasks take a recording or text")),
        (_, AnswerValue::Text(_)) => Ok(()),
        (_, AnswerValue::Audio(_)) => Err(reject("only speaking tasks take a recording")),
        (_, AnswerValue::Choice(_)) => Err(reject("open tasks take a written answer")),
    }
}
