use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{ApiError, Result};
use crate::models::ExamType;

/// File name of the rule document for an exam type. The same name is used
/// under `generation/` and `validation/`.
pub fn rule_file_name(exam_type: ExamType) -> &'static str {
    match exam_type {
        ExamType::Reading => "reading-a2.md",
        ExamType::Listening => "listening-a2.md",
        ExamType::Writing => "writing-a2.md",
        ExamType::Speaking => "speaking-a2.md",
        ExamType::Knm => "knm.md",
    }
}

fn rule_path(rules_dir: &Path, kind: &str, exam_type: ExamType) -> PathBuf {
    rules_dir.join(kind).join(rule_file_name(exam_type))
}

/// Read the generation rule document for an exam type.
pub async fn read_generation_rules(rules_dir: &Path, exam_type: ExamType) -> Result<String> {
    read_rules(rule_path(rules_dir, "generation", exam_type), exam_type)
        .await
        .map_err(ApiError::GenerationFailed)
}

/// Read the validation rule document for an exam type.
pub async fn read_validation_rules(rules_dir: &Path, exam_type: ExamType) -> Result<String> {
    read_rules(rule_path(rules_dir, "validation", exam_type), exam_type)
        .await
        .map_err(ApiError::ValidationFailed)
}

async fn read_rules(path: PathBuf, exam_type: ExamType) -> std::result::Result<String, String> {
    debug!("Reading rule file {}", path.display());
    tokio::fs::read_to_string(&path)
        .await
        .map_err(|err| format!("Failed to read rule file for {exam_type}: {err}"))
}
