//! Top-level screen the app is showing.
//!
//! The step is its own piece of state rather than something derived from a
//! route string, and every forward move is guarded: the exam screen needs a
//! matching selection, the review screen needs a loaded attempt. A guard
//! failure lands back on the selection screen instead of a half-broken view.

use log::warn;

use crate::models::ExamType;

use super::machine::{ExamPhase, ExamSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppStep {
    Selection,
    Exam,
    Review,
}

pub struct StepController {
    step: AppStep,
}

impl Default for StepController {
    fn default() -> Self {
        Self::new()
    }
}

impl StepController {
    pub fn new() -> Self {
        Self {
            step: AppStep::Selection,
        }
    }

    pub fn step(&self) -> AppStep {
        self.step
    }

    pub fn go_to_selection(&mut self) {
        self.step = AppStep::Selection;
    }

    /// Enter the exam screen for `requested`. Refused unless the session is
    /// loading or has loaded exactly that exam type.
    pub fn go_to_exam(&mut self, session: &ExamSession, requested: ExamType) -> AppStep {
        let allowed = match session.phase() {
            ExamPhase::Loading { exam_type } => *exam_type == requested,
            ExamPhase::Ready { attempt } | ExamPhase::Submitting { attempt, .. } => {
                attempt.exam_type == requested
            }
            _ => false,
        };
        if allowed {
            self.step = AppStep::Exam;
        } else {
            warn!("Refusing exam screen for {requested}: no matching exam in progress");
            self.step = AppStep::Selection;
        }
        self.step
    }

    /// Enter the review screen. Refused unless an exam with questions is
    /// loaded; grading may still be in flight (the time-up path forces
    /// navigation here while the submit request is pending).
    pub fn go_to_review(&mut self, session: &ExamSession) -> AppStep {
        let loaded = session
            .attempt()
            .is_some_and(|attempt| !attempt.questions.is_empty());
        if loaded {
            self.step = AppStep::Review;
        } else {
            warn!("Refusing review screen: no exam loaded");
            self.step = AppStep::Selection;
        }
        self.step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ExerciseResponse, GenerateExamResponse, MultipleChoiceValidation, Question,
        ValidationResponse,
    };
    use uuid::Uuid;

    fn reading_session() -> ExamSession {
        let mut session = ExamSession::new();
        session.select(ExamType::Reading);
        session.load_succeeded(GenerateExamResponse {
            id: Uuid::new_v4(),
            exam_type: ExamType::Reading,
            exercises: ExerciseResponse {
                questions: vec![Question {
                    title: "Vraag".to_string(),
                    question: "Wat staat er?".to_string(),
                    answers: Some(vec!["a".to_string(), "b".to_string()]),
                    correct_answer_index: Some(0),
                    context: None,
                    transcription: None,
                }],
            },
        });
        session
    }

    #[test]
    fn exam_step_requires_a_matching_exam() {
        let session = reading_session();
        let mut steps = StepController::new();

        assert_eq!(steps.go_to_exam(&session, ExamType::Reading), AppStep::Exam);
        assert_eq!(
            steps.go_to_exam(&session, ExamType::Writing),
            AppStep::Selection
        );
    }

    #[test]
    fn exam_step_refused_with_nothing_loaded() {
        let session = ExamSession::new();
        let mut steps = StepController::new();
        assert_eq!(
            steps.go_to_exam(&session, ExamType::Reading),
            AppStep::Selection
        );
    }

    #[test]
    fn exam_step_allowed_while_loading() {
        let mut session = ExamSession::new();
        session.select(ExamType::Listening);
        let mut steps = StepController::new();
        assert_eq!(
            steps.go_to_exam(&session, ExamType::Listening),
            AppStep::Exam
        );
    }

    #[test]
    fn review_step_requires_loaded_questions() {
        let mut steps = StepController::new();
        assert_eq!(steps.go_to_review(&ExamSession::new()), AppStep::Selection);

        // Still loading: no questions yet.
        let mut loading = ExamSession::new();
        loading.select(ExamType::Reading);
        assert_eq!(steps.go_to_review(&loading), AppStep::Selection);

        let session = reading_session();
        assert_eq!(steps.go_to_review(&session), AppStep::Review);
    }

    #[test]
    fn review_step_is_reachable_while_grading_is_in_flight() {
        let mut session = reading_session();
        let mut steps = StepController::new();

        // Time-up forces navigation here before the validation returns.
        session.submit().unwrap();
        assert_eq!(steps.go_to_review(&session), AppStep::Review);

        session.validation_succeeded(ValidationResponse::MultipleChoice(
            MultipleChoiceValidation {
                passed: false,
                total_questions: 1,
                correct_answers: 0,
                answers: vec![],
            },
        ));
        assert_eq!(steps.go_to_review(&session), AppStep::Review);
    }
}
