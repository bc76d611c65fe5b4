use std::fmt;
use std::str::FromStr;

use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The five sections of the Inburgeringsexamen (A2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExamType {
    Reading,
    Listening,
    Writing,
    Speaking,
    #[serde(rename = "KNM")]
    Knm,
}

impl ExamType {
    pub const ALL: [ExamType; 5] = [
        ExamType::Reading,
        ExamType::Listening,
        ExamType::Writing,
        ExamType::Speaking,
        ExamType::Knm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExamType::Reading => "Reading",
            ExamType::Listening => "Listening",
            ExamType::Writing => "Writing",
            ExamType::Speaking => "Speaking",
            ExamType::Knm => "KNM",
        }
    }

    /// Writing and Speaking are graded as open-ended tasks (0-10 scores),
    /// the other sections as multiple choice.
    pub fn is_open_ended(&self) -> bool {
        matches!(self, ExamType::Writing | ExamType::Speaking)
    }
}

impl fmt::Display for ExamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExamType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Reading" => Ok(ExamType::Reading),
            "Listening" => Ok(ExamType::Listening),
            "Writing" => Ok(ExamType::Writing),
            "Speaking" => Ok(ExamType::Speaking),
            "KNM" => Ok(ExamType::Knm),
            _ => Err(()),
        }
    }
}

/// A single generated exam question. Produced once by the AI gateway and
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub title: String,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer_index: Option<u32>,
    /// Scenario description, Listening only (e.g. "At the doctor").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Dialogue text spoken by text-to-speech, Listening only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcription: Option<String>,
}

impl Question {
    /// Whether this question carries a multiple-choice answer list.
    pub fn has_choices(&self) -> bool {
        self.answers.as_ref().is_some_and(|a| !a.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseResponse {
    pub questions: Vec<Question>,
}

/// Response body of `GET /api/exam/generate/:type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateExamResponse {
    pub id: Uuid,
    pub exam_type: ExamType,
    pub exercises: ExerciseResponse,
}

/// Response body of `POST /api/exam/:id/validate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateExamResponse {
    pub id: String,
    pub exam_type: ExamType,
    pub validation: ValidationResponse,
}

/// Per-question verdict inside a validation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerReview {
    pub correct: bool,
    /// 0-10, open-ended tasks only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub feedback: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipleChoiceValidation {
    pub passed: bool,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub answers: Vec<AnswerReview>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenEndedValidation {
    pub passed: bool,
    pub total_tasks: u32,
    pub average_score: f64,
    pub answers: Vec<AnswerReview>,
}

/// AI-graded outcome of a submitted answer set. The two forms are told apart
/// by field presence: `totalQuestions` vs `totalTasks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValidationResponse {
    MultipleChoice(MultipleChoiceValidation),
    OpenEnded(OpenEndedValidation),
}

impl ValidationResponse {
    pub fn passed(&self) -> bool {
        match self {
            ValidationResponse::MultipleChoice(v) => v.passed,
            ValidationResponse::OpenEnded(v) => v.passed,
        }
    }

    pub fn reviews(&self) -> &[AnswerReview] {
        match self {
            ValidationResponse::MultipleChoice(v) => &v.answers,
            ValidationResponse::OpenEnded(v) => &v.answers,
        }
    }
}

/// A recorded audio answer.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub mime_type: String,
    pub data: Bytes,
}

/// One stored answer for one question. Absence is represented by a missing
/// entry in the session's answer map, not by a variant here.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerValue {
    Choice(u32),
    Text(String),
    Audio(AudioClip),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerPayloadKind {
    String,
    Number,
    Blob,
}

/// Wire form of one answer as posted to the validate endpoint. Audio travels
/// base64-encoded in `blobData` with its MIME type in `blobType`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerPayload {
    #[serde(rename = "type")]
    pub kind: AnswerPayloadKind,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_type: Option<String>,
}

impl AnswerPayload {
    /// Wire form of an unanswered question.
    pub fn unanswered() -> Self {
        Self {
            kind: AnswerPayloadKind::String,
            value: serde_json::Value::Null,
            blob_data: None,
            blob_type: None,
        }
    }

    pub fn from_answer(answer: &AnswerValue) -> Self {
        match answer {
            AnswerValue::Choice(index) => Self {
                kind: AnswerPayloadKind::Number,
                value: serde_json::Value::from(*index),
                blob_data: None,
                blob_type: None,
            },
            AnswerValue::Text(text) => Self {
                kind: AnswerPayloadKind::String,
                value: serde_json::Value::from(text.clone()),
                blob_data: None,
                blob_type: None,
            },
            AnswerValue::Audio(clip) => Self {
                kind: AnswerPayloadKind::Blob,
                value: serde_json::Value::Null,
                blob_data: Some(base64::engine::general_purpose::STANDARD.encode(&clip.data)),
                blob_type: Some(clip.mime_type.clone()),
            },
        }
    }
}
