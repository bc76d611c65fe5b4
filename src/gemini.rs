use std::time::Duration;

use log::{debug, info};
use reqwest::Client;
use serde_json::{json, Value};

use crate::error::{ApiError, Result};
use crate::models::{AnswerPayload, AnswerPayloadKind, ExamType, ExerciseResponse, ValidationResponse};

/// Persona shared by every model call: an official examiner generating and
/// grading tasks in the exact structure of DUO exams.
pub const SYSTEM_INSTRUCTION: &str =
    "You are an official examiner for the Dutch Inburgeringsexamen (A2 level). \
     You generate tasks that are simple, use common vocabulary (Basis-NT2), \
     and follow the exact structure of DUO exams.";

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Client for the Gemini `generateContent` endpoint with structured JSON
/// output. Built per request so header-supplied credentials can override the
/// server configuration.
pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(http: Client, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http,
            base_url: BASE_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Shared HTTP client with sane timeouts for model calls.
    pub fn default_http() -> Client {
        Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new())
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Generate a fresh exercise set for one exam type. `rules` is the
    /// type-specific generation rule document merged into the persona.
    pub async fn generate(&self, exam_type: ExamType, rules: &str) -> Result<ExerciseResponse> {
        let system = format!("{SYSTEM_INSTRUCTION}\n\n{rules}");
        let prompt = generation_prompt(exam_type);
        let schema = exercise_response_schema(exam_type);

        info!("Generating {exam_type} exercises with model {}", self.model);
        let text = self
            .generate_content(&system, vec![json!({ "text": prompt })], schema)
            .await
            .map_err(ApiError::GenerationFailed)?;

        serde_json::from_str(&text).map_err(|err| {
            ApiError::GenerationFailed(format!("Model returned malformed JSON: {err}"))
        })
    }

    /// Grade a submitted answer set against the original exercises. Text and
    /// number answers are embedded in the prompt as JSON; audio answers are
    /// attached as inline binary parts.
    pub async fn validate(
        &self,
        exam_type: ExamType,
        exercises: &ExerciseResponse,
        answers: &[AnswerPayload],
        rules: &str,
    ) -> Result<ValidationResponse> {
        let system = format!("{SYSTEM_INSTRUCTION}\n\n{rules}");
        let partitioned = partition_answers(answers);
        let prompt = validation_prompt(exam_type, exercises, &partitioned)
            .map_err(|err| ApiError::ValidationFailed(err.to_string()))?;

        let mut parts = vec![json!({ "text": prompt })];
        parts.extend(partitioned.audio_parts);

        let schema = if exam_type.is_open_ended() {
            open_ended_validation_schema()
        } else {
            multiple_choice_validation_schema()
        };

        info!(
            "Validating {exam_type} exam ({} text, {} audio answers) with model {}",
            partitioned.text_answers.len(),
            partitioned.audio_indices.len(),
            self.model
        );
        let text = self
            .generate_content(&system, parts, schema)
            .await
            .map_err(ApiError::ValidationFailed)?;

        serde_json::from_str(&text).map_err(|err| {
            ApiError::ValidationFailed(format!("Model returned malformed JSON: {err}"))
        })
    }

    async fn generate_content(
        &self,
        system_instruction: &str,
        parts: Vec<Value>,
        response_schema: Value,
    ) -> std::result::Result<String, String> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = json!({
            "systemInstruction": { "parts": [{ "text": system_instruction }] },
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": response_schema,
            },
        });

        debug!("POST {url}");
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| format!("Model request failed: {err}"))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(format!("Model returned HTTP {status}: {detail}"));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|err| format!("Model response was not JSON: {err}"))?;

        payload
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| "Model response contained no text candidate".to_string())
    }
}

/// Text/number answers with their question indices, next to the inline audio
/// parts and the indices they belong to.
pub struct PartitionedAnswers {
    pub text_answers: Vec<Value>,
    pub audio_parts: Vec<Value>,
    pub audio_indices: Vec<usize>,
}

/// Split answers into prompt-embeddable entries and inline audio parts,
/// keeping each answer tied to its original question index.
pub fn partition_answers(answers: &[AnswerPayload]) -> PartitionedAnswers {
    let mut text_answers = Vec::new();
    let mut audio_parts = Vec::new();
    let mut audio_indices = Vec::new();

    for (index, answer) in answers.iter().enumerate() {
        match (&answer.kind, &answer.blob_data) {
            (AnswerPayloadKind::Blob, Some(data)) => {
                audio_parts.push(json!({
                    "inlineData": {
                        "mimeType": answer.blob_type.as_deref().unwrap_or("audio/webm"),
                        "data": data,
                    }
                }));
                audio_indices.push(index);
            }
            _ => {
                text_answers.push(json!({
                    "questionIndex": index,
                    "type": answer.kind,
                    "value": answer.value,
                }));
            }
        }
    }

    PartitionedAnswers {
        text_answers,
        audio_parts,
        audio_indices,
    }
}

fn generation_prompt(exam_type: ExamType) -> String {
    let mut prompt = format!(
        "Generate exam exercises for the {exam_type} section of the Dutch \
         Inburgeringsexamen (A2 level). Follow the rules and structure \
         specified in the system instructions exactly.\n\n\
         IMPORTANT: Each question must include:\n\
         - A \"title\" field: the actual question in a short sentence. This \
         should be a concise question that summarizes what the user needs to \
         answer.\n\
         - A \"question\" field: the full question text, context, or task \
         description. Use \\n for line breaks to format longer texts with \
         proper paragraphs and spacing."
    );

    match exam_type {
        ExamType::Listening => prompt.push_str(
            "\n\nFor Listening exercises, you MUST always include:\n\
             - A \"context\" field describing the situation of the audio \
             scenario (e.g. 'At the doctor', 'At the supermarket').\n\
             - A \"transcription\" field with the full dialogue text that \
             will be spoken by the text-to-speech system. Do NOT include the \
             words 'Transcription' or 'Context' in this field.",
        ),
        ExamType::Speaking => prompt.push_str(
            "\n\nFor Speaking exercises:\n\
             - The \"question\" field must be detailed and descriptive, with \
             clear requirements such as the number of sentences to speak and \
             what to cover (e.g. 'tell what happened, mention the reason, \
             propose a solution').\n\
             - The answers array should be empty and correctAnswerIndex \
             should be omitted; these are open-ended questions.",
        ),
        ExamType::Writing => prompt.push_str(
            "\n\nFor writing exercises, the answers array should be empty \
             and correctAnswerIndex should be omitted; these are open-ended \
             questions.",
        ),
        ExamType::Reading | ExamType::Knm => prompt.push_str(
            "\n\nInclude multiple choice answers with exactly one correct \
             answer. Set correctAnswerIndex to the 0-based index of the \
             correct answer in the answers array.",
        ),
    }

    prompt
}

fn validation_prompt(
    exam_type: ExamType,
    exercises: &ExerciseResponse,
    partitioned: &PartitionedAnswers,
) -> serde_json::Result<String> {
    let exercises_json = serde_json::to_string_pretty(exercises)?;
    let answers_json = serde_json::to_string_pretty(&partitioned.text_answers)?;

    let mut prompt = format!(
        "You are validating answers for a {exam_type} exam.\n\n\
         Original Exercises:\n{exercises_json}\n\n\
         User Answers (text/number):\n{answers_json}\n"
    );

    if !partitioned.audio_indices.is_empty() {
        let indices = partitioned
            .audio_indices
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        prompt.push_str(&format!(
            "\nAudio Recordings:\nThe following question indices have audio \
             recordings attached: {indices}. Each recording is provided as a \
             separate part in this message. Listen to each recording and \
             evaluate the spoken response on pronunciation, fluency, \
             grammatical correctness, and content accuracy.\n"
        ));
    }

    prompt.push_str(
        "\nPlease validate each answer according to the validation rules \
         provided in the system instructions.",
    );

    Ok(prompt)
}

/// Response schema for generated exercises. Listening additionally requires
/// the audio scenario fields; open-ended types omit the multiple-choice
/// fields from their instructions but share the same base shape.
fn exercise_response_schema(exam_type: ExamType) -> Value {
    let mut properties = json!({
        "title": {
            "type": "STRING",
            "description": "The actual question in a short sentence.",
        },
        "question": {
            "type": "STRING",
            "description": "The question description, text or task body.",
        },
        "answers": {
            "type": "ARRAY",
            "items": { "type": "STRING" },
            "description": "Possible answers; empty for open-ended questions.",
        },
        "correctAnswerIndex": {
            "type": "INTEGER",
            "description": "0-based index of the correct answer; omitted for open-ended questions.",
        },
    });

    let mut required = vec!["title", "question"];
    if exam_type == ExamType::Listening {
        properties["context"] = json!({
            "type": "STRING",
            "description": "Context description of the audio scenario.",
        });
        properties["transcription"] = json!({
            "type": "STRING",
            "description": "Full dialogue text spoken by the text-to-speech system.",
        });
        required = vec!["title", "question", "context", "transcription"];
    }

    json!({
        "type": "OBJECT",
        "properties": {
            "questions": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": properties,
                    "required": required,
                },
            },
        },
        "required": ["questions"],
    })
}

fn multiple_choice_validation_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "passed": { "type": "BOOLEAN", "description": "Whether the exam was passed." },
            "totalQuestions": { "type": "INTEGER", "description": "Total number of questions." },
            "correctAnswers": { "type": "INTEGER", "description": "Number of correct answers." },
            "answers": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "correct": { "type": "BOOLEAN" },
                        "feedback": { "type": "STRING" },
                    },
                    "required": ["correct", "feedback"],
                },
            },
        },
        "required": ["passed", "totalQuestions", "correctAnswers", "answers"],
    })
}

fn open_ended_validation_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "passed": { "type": "BOOLEAN", "description": "Whether the exam was passed." },
            "totalTasks": { "type": "INTEGER", "description": "Total number of tasks." },
            "averageScore": { "type": "NUMBER", "description": "Average score across all tasks (0-10)." },
            "answers": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "correct": { "type": "BOOLEAN", "description": "Whether the task passed (score >= 6.0)." },
                        "score": { "type": "NUMBER", "description": "Score for this task (0-10)." },
                        "feedback": { "type": "STRING" },
                    },
                    "required": ["correct", "score", "feedback"],
                },
            },
        },
        "required": ["passed", "totalTasks", "averageScore", "answers"],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnswerValue;

    #[test]
    fn listening_schema_requires_context_and_transcription() {
        let schema = exercise_response_schema(ExamType::Listening);
        let required = schema["properties"]["questions"]["items"]["required"]
            .as_array()
            .unwrap();
        assert!(required.iter().any(|v| v == "context"));
        assert!(required.iter().any(|v| v == "transcription"));

        for exam_type in [ExamType::Reading, ExamType::Writing, ExamType::Speaking, ExamType::Knm] {
            let schema = exercise_response_schema(exam_type);
            let required = schema["properties"]["questions"]["items"]["required"]
                .as_array()
                .unwrap();
            assert_eq!(required.len(), 2, "{exam_type} should only require title/question");
        }
    }

    #[test]
    fn open_ended_types_get_the_score_schema() {
        assert!(ExamType::Writing.is_open_ended());
        assert!(ExamType::Speaking.is_open_ended());
        assert!(!ExamType::Reading.is_open_ended());
        assert!(!ExamType::Listening.is_open_ended());
        assert!(!ExamType::Knm.is_open_ended());

        let schema = open_ended_validation_schema();
        let required = schema["required"].as_array().unwrap();
        assert!(required.iter().any(|v| v == "totalTasks"));
        assert!(required.iter().any(|v| v == "averageScore"));
    }

    #[test]
    fn answers_partition_into_text_and_audio_by_original_index() {
        let answers = vec![
            AnswerPayload::from_answer(&AnswerValue::Choice(2)),
            AnswerPayload::unanswered(),
            AnswerPayload::from_answer(&AnswerValue::Audio(crate::models::AudioClip {
                mime_type: "audio/webm".to_string(),
                data: bytes::Bytes::from_static(b"abc"),
            })),
            AnswerPayload::from_answer(&AnswerValue::Text("Ik woon in Utrecht.".to_string())),
        ];

        let partitioned = partition_answers(&answers);
        assert_eq!(partitioned.text_answers.len(), 3);
        assert_eq!(partitioned.audio_indices, vec![2]);
        assert_eq!(partitioned.audio_parts.len(), 1);
        assert_eq!(
            partitioned.audio_parts[0]["inlineData"]["mimeType"],
            "audio/webm"
        );
        // Text answers keep their original question indices.
        assert_eq!(partitioned.text_answers[0]["questionIndex"], 0);
        assert_eq!(partitioned.text_answers[1]["questionIndex"], 1);
        assert_eq!(partitioned.text_answers[2]["questionIndex"], 3);
    }

    #[test]
    fn blob_without_data_falls_back_to_text_partition() {
        let answer = AnswerPayload {
            kind: AnswerPayloadKind::Blob,
            value: serde_json::Value::Null,
            blob_data: None,
            blob_type: None,
        };
        let partitioned = partition_answers(&[answer]);
        assert!(partitioned.audio_parts.is_empty());
        assert_eq!(partitioned.text_answers.len(), 1);
    }

    #[test]
    fn validation_prompt_names_audio_indices() {
        let exercises = ExerciseResponse { questions: vec![] };
        let answers = vec![AnswerPayload::from_answer(&AnswerValue::Audio(
            crate::models::AudioClip {
                mime_type: "audio/webm".to_string(),
                data: bytes::Bytes::from_static(b"x"),
            },
        ))];
        let partitioned = partition_answers(&answers);
        let prompt = validation_prompt(ExamType::Speaking, &exercises, &partitioned).unwrap();
        assert!(prompt.contains("indices have audio recordings attached: 0"));
    }

    #[test]
    fn client_builds_against_custom_base_url() {
        let client = GeminiClient::new(Client::new(), "key", "gemini-2.5-flash")
            .with_base_url("http://localhost:9999");
        assert_eq!(client.base_url, "http://localhost:9999");
    }
}
