//! Persisted user preferences.
//!
//! Stored as one JSON object whose keys carry the `exam-oefenen:`
//! namespace prefix. The API key and model are only written when the user
//! opted in to remembering them; turning that off removes them from disk
//! on the next save.

use std::fs;
use std::io;
use std::path::PathBuf;

use log::warn;
use serde_json::{Map, Value};

pub const STORAGE_PREFIX: &str = "exam-oefenen:";

fn storage_key(name: &str) -> String {
    format!("{STORAGE_PREFIX}{name}")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preferences {
    /// Name of the preferred Dutch voice.
    pub voice: Option<String>,
    /// Whether the user opted in to storing credentials.
    pub remember_credentials: bool,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

pub struct PrefStore {
    path: PathBuf,
}

impl PrefStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load preferences, falling back to defaults when the file is missing
    /// or unreadable. A corrupt file is not an error for the caller.
    pub fn load(&self) -> Preferences {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Preferences::default(),
            Err(err) => {
                warn!("Could not read preferences: {err}");
                return Preferences::default();
            }
        };
        let map: Map<String, Value> = match serde_json::from_str(&raw) {
            Ok(map) => map,
            Err(err) => {
                warn!("Ignoring corrupt preferences file: {err}");
                return Preferences::default();
            }
        };

        let get_string = |name: &str| {
            map.get(&storage_key(name))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Preferences {
            voice: get_string("voice"),
            remember_credentials: map
                .get(&storage_key("rememberCredentials"))
                .and_then(Value::as_bool)
                .unwrap_or(false),
            api_key: get_string("apiKey"),
            model: get_string("model"),
        }
    }

    pub fn save(&self, prefs: &Preferences) -> io::Result<()> {
        let mut map = Map::new();
        if let Some(voice) = &prefs.voice {
            map.insert(storage_key("voice"), Value::String(voice.clone()));
        }
        map.insert(
            storage_key("rememberCredentials"),
            Value::Bool(prefs.remember_credentials),
        );
        if prefs.remember_credentials {
            if let Some(api_key) = &prefs.api_key {
                map.insert(storage_key("apiKey"), Value::String(api_key.clone()));
            }
            if let Some(model) = &prefs.model {
                map.insert(storage_key("model"), Value::String(model.clone()));
            }
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&map)?;
        fs::write(&self.path, json)
    }
}
