//! Rolling transcript assembled from recognizer results.

/// Finalized segments plus the current interim hypothesis. The interim part
/// is replaced wholesale on every recognizer result; finals only grow.
#[derive(Debug, Default, Clone)]
pub struct TranscriptBuffer {
    finals: Vec<String>,
    interim: String,
}

impl TranscriptBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_final(&mut self, segment: &str) {
        let segment = segment.trim();
        if !segment.is_empty() {
            self.finals.push(segment.to_string());
        }
    }

    pub fn set_interim(&mut self, interim: &str) {
        self.interim = interim.trim().to_string();
    }

    /// The text as it should be shown right now: all finals followed by the
    /// interim hypothesis, single-spaced.
    pub fn text(&self) -> String {
        let mut parts: Vec<&str> = self.finals.iter().map(String::as_str).collect();
        if !self.interim.is_empty() {
            parts.push(&self.interim);
        }
        parts.join(" ")
    }

    pub fn is_empty(&self) -> bool {
        self.finals.is_empty() && self.interim.is_empty()
    }

    pub fn clear(&mut self) {
        self.finals.clear();
        self.interim.clear();
    }
}
