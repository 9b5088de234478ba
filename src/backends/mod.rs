pub mod espeak;
pub mod festival;
pub mod piper;
mod process;

pub use process::{capture_stdout, ensure_output, executable_in_path, Invocation, ProcessSlot};

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

/// Represents a text-to-speech voice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub id: String,
    pub name: String,
}

impl Voice {
    /// Stand-in offered when an engine reports no voices: empty id means
    /// "let the engine pick".
    pub fn engine_default() -> Self {
        Self {
            id: String::new(),
            name: "(default)".to_string(),
        }
    }
}

/// Catalog as shown to a user: never empty.
pub fn voices_or_default(voices: Vec<Voice>) -> Vec<Voice> {
    if voices.is_empty() {
        vec![Voice::engine_default()]
    } else {
        voices
    }
}

/// The uniform knobs every engine understands, each relative to the
/// engine's own baseline (1.0 = engine default).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub speed: f64,
    pub pitch: f64,
    pub volume: f64,
    pub voice: Option<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            speed: 1.0,
            pitch: 1.0,
            volume: 1.0,
            voice: None,
        }
    }
}

impl EngineSettings {
    /// The voice, treating an empty string the same as no selection.
    pub fn selected_voice(&self) -> Option<&str> {
        self.voice.as_deref().filter(|v| !v.is_empty())
    }
}

/// Settings plus the process slot: the mutable half of every backend.
pub struct EngineState {
    settings: RwLock<EngineSettings>,
    process: ProcessSlot,
}

impl EngineState {
    pub fn new(poll: Duration) -> Self {
        Self {
            settings: RwLock::new(EngineSettings::default()),
            process: ProcessSlot::new(poll),
        }
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
            .read()
            .map(|s| s.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    pub fn set_settings(&self, settings: &EngineSettings) {
        match self.settings.write() {
            Ok(mut guard) => *guard = settings.clone(),
            Err(e) => *e.into_inner() = settings.clone(),
        }
    }

    pub fn process(&self) -> &ProcessSlot {
        &self.process
    }
}

/// Trait that all speech synthesis backends must implement.
/// Each backend wraps one external TTS program.
pub trait SpeechBackend: Send + Sync {
    /// Returns the unique ID of the backend (e.g., "espeak-ng")
    fn id(&self) -> &'static str;

    /// True if the backing program can be found. Never spawns anything.
    fn is_available(&self) -> bool;

    /// Voice catalog; empty when the engine cannot be queried.
    fn list_voices(&self) -> Vec<Voice>;

    /// Synthesizes `text` with the current settings.
    ///
    /// With `output`, the audio file exists when this returns `Ok`. Without
    /// it the engine plays on the default device and returns `None`, unless
    /// it can only write files, in which case the returned path is a
    /// transient file the caller must play and remove.
    fn speak(&self, text: &str, output: Option<&Path>, ssml: bool) -> Result<Option<PathBuf>>;

    /// Terminates the running synthesis, if any. Idempotent.
    fn stop(&self);

    fn is_speaking(&self) -> bool;

    fn apply_settings(&self, settings: &EngineSettings);

    fn current_settings(&self) -> EngineSettings;
}
