//! Voice selection for Dutch speech output.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub name: String,
    pub lang: String,
    pub default: bool,
}

/// Keep only Dutch voices, sorted by name for a stable picker.
pub fn dutch_voices(all: &[Voice]) -> Vec<Voice> {
    let mut voices: Vec<Voice> = all
        .iter()
        .filter(|voice| {
            let lang = voice.lang.to_ascii_lowercase();
            lang == "nl" || lang.starts_with("nl-")
        })
        .cloned()
        .collect();
    voices.sort_by(|a, b| a.name.cmp(&b.name));
    voices
}

/// Pick the voice to use: the persisted preference when it still exists,
/// otherwise the platform default, otherwise the first one.
pub fn pick_voice<'a>(voices: &'a [Voice], preferred: Option<&str>) -> Option<&'a Voice> {
    if let Some(name) = preferred {
        if let Some(voice) = voices.iter().find(|voice| voice.name == name) {
            return Some(voice);
        }
    }
    voices
        .iter()
        .find(|voice| voice.default)
        .or_else(|| voices.first())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(name: &str, lang: &str, default: bool) -> Voice {
        Voice {
            name: name.to_string(),
            lang: lang.to_string(),
            default,
        }
    }

    fn sample() -> Vec<Voice> {
        vec![
            voice("Xander", "nl-NL", false),
            voice("Samantha", "en-US", true),
            voice("Ellen", "nl-BE", false),
            voice("Claire", "nl-NL", true),
        ]
    }

    #[test]
    fn only_dutch_voices_sorted_by_name() {
        let voices = dutch_voices(&sample());
        let names: Vec<&str> = voices.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["Claire", "Ellen", "Xander"]);
    }

    #[test]
    fn persisted_name_wins_when_still_present() {
        let voices = dutch_voices(&sample());
        assert_eq!(pick_voice(&voices, Some("Xander")).unwrap().name, "Xander");
        // Gone from the system: fall back to the default voice.
        assert_eq!(pick_voice(&voices, Some("Verdwenen")).unwrap().name, "Claire");
        assert_eq!(pick_voice(&voices, None).unwrap().name, "Claire");
    }

    #[test]
    fn without_a_default_the_first_voice_is_used() {
        let voices = vec![voice("Ellen", "nl-BE", false), voice("Xander", "nl-NL", false)];
        assert_eq!(pick_voice(&voices, None).unwrap().name, "Ellen");
        assert!(pick_voice(&[], None).is_none());
    }
}
