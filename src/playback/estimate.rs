//! Progress estimation for synthesized speech.
//!
//! Speech engines report no playback position, so progress is simulated
//! from an estimated duration. These are pure functions over elapsed time;
//! the controller owns the clock.

use std::time::Duration;

/// Average speaking rate the estimate is based on.
pub const WORDS_PER_MINUTE: f64 = 175.0;

/// How long speaking `text` at `rate` is expected to take.
pub fn estimated_duration(text: &str, rate: f64) -> Duration {
    let words = text.split_whitespace().count();
    if words == 0 || rate <= 0.0 {
        return Duration::ZERO;
    }
    let minutes = words as f64 / (WORDS_PER_MINUTE * rate);
    Duration::from_secs_f64(minutes * 60.0)
}

/// Progress through the current utterance, in percent, capped at 100.
pub fn segment_progress(elapsed: Duration, estimated: Duration) -> f64 {
    if estimated.is_zero() {
        return 100.0;
    }
    (elapsed.as_secs_f64() / estimated.as_secs_f64() * 100.0).min(100.0)
}

/// Map segment progress onto the whole text. After a seek the utterance
/// only covers the tail of the text, so its progress is scaled into the
/// remaining `100 - segment_start` percent.
pub fn overall_progress(segment_start: f64, segment: f64) -> f64 {
    segment_start + segment * (100.0 - segment_start) / 100.0
}

/// Character offset to resume from when seeking to `percent` of the text.
pub fn seek_offset(percent: f64, char_count: usize) -> usize {
    let clamped = percent.clamp(0.0, 100.0);
    ((clamped / 100.0 * char_count as f64).floor() as usize).min(char_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_scales_with_words_and_rate() {
        // 175 words at rate 1.0 is exactly one minute.
        let text = vec!["woord"; 175].join(" ");
        assert_eq!(estimated_duration(&text, 1.0), Duration::from_secs(60));

        // Doubling the rate halves the duration.
        assert_eq!(estimated_duration(&text, 2.0), Duration::from_secs(30));

        assert_eq!(estimated_duration("", 1.0), Duration::ZERO);
        assert_eq!(estimated_duration("   ", 1.0), Duration::ZERO);
    }

    #[test]
    fn segment_progress_is_capped() {
        let estimated = Duration::from_secs(10);
        assert_eq!(segment_progress(Duration::ZERO, estimated), 0.0);
        assert_eq!(segment_progress(Duration::from_secs(5), estimated), 50.0);
        assert_eq!(segment_progress(Duration::from_secs(30), estimated), 100.0);
        assert_eq!(segment_progress(Duration::from_secs(1), Duration::ZERO), 100.0);
    }

    #[test]
    fn overall_progress_resumes_from_the_seek_point() {
        // Without a seek the segment covers the whole text.
        assert_eq!(overall_progress(0.0, 40.0), 40.0);

        // After seeking to 50%, the segment covers the second half.
        assert_eq!(overall_progress(50.0, 0.0), 50.0);
        assert_eq!(overall_progress(50.0, 50.0), 75.0);
        assert_eq!(overall_progress(50.0, 100.0), 100.0);
    }

    #[test]
    fn seek_offset_floors_into_range() {
        assert_eq!(seek_offset(0.0, 40), 0);
        assert_eq!(seek_offset(50.0, 41), 20);
        assert_eq!(seek_offset(100.0, 40), 40);
        assert_eq!(seek_offset(150.0, 40), 40);
        assert_eq!(seek_offset(-5.0, 40), 0);
        assert_eq!(seek_offset(33.0, 10), 3);
    }
}
