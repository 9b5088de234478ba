use super::{
    ensure_output, executable_in_path, EngineSettings, EngineState, Invocation, SpeechBackend,
    Voice,
};
use crate::config_loader::AppConfig;
use crate::error::{Error, Result};
use crate::registry::EngineDescriptor;
use log::debug;
use serde_json::Value;
use std::path::{Path, PathBuf};

pub const DESCRIPTOR: EngineDescriptor = EngineDescriptor {
    id: "piper",
    display_name: "Piper",
};

/// `--length_scale` is inverse speed: higher means slower. `None` at the
/// default speed so the model's own timing is untouched.
pub fn length_scale(speed: f64) -> Option<f64> {
    if speed == 1.0 {
        None
    } else {
        Some(1.0 / speed.max(0.1))
    }
}

/// Piper reads text on stdin and always writes a WAV file.
pub fn invocation(program: &str, settings: &EngineSettings, text: &str, output: &Path) -> Invocation {
    let mut inv = Invocation::new(program)
        .arg("--output_file")
        .arg(output.to_string_lossy());

    if let Some(model) = settings.selected_voice() {
        inv = inv.arg("--model").arg(model);
    }

    if let Some(scale) = length_scale(settings.speed) {
        inv = inv.arg("--length_scale").arg(scale.to_string());
    }

    let mut input = text.to_string();
    if !input.ends_with('\n') {
        input.push('\n');
    }
    inv.stdin(input)
}

fn voice_label(model: &Path, stem: &str) -> String {
    let config_path = model.with_extension("onnx.json");
    let quality = std::fs::read_to_string(config_path)
        .ok()
        .and_then(|content| serde_json::from_str::<Value>(&content).ok())
        .and_then(|json| {
            json.get("audio")
                .and_then(|a| a.get("quality"))
                .and_then(|q| q.as_str())
                .map(str::to_string)
        });

    match quality {
        Some(quality) => format!("{} ({})", stem, quality),
        None => stem.to_string(),
    }
}

/// Every `*.onnx` model in `dirs`, directory by directory, file names sorted.
/// The voice id is the model path, which is what `--model` expects.
pub fn scan_models(dirs: &[PathBuf]) -> Vec<Voice> {
    let mut voices = Vec::new();

    for dir in dirs.iter().filter(|d| d.is_dir()) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            continue;
        };
        let mut models: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("onnx"))
            .collect();
        models.sort();

        for model in models {
            if let Some(stem) = model.file_stem().and_then(|s| s.to_str()) {
                voices.push(Voice {
                    id: model.to_string_lossy().into_owned(),
                    name: voice_label(&model, stem),
                });
            }
        }
    }

    voices
}

pub struct PiperBackend {
    program: String,
    model_dirs: Vec<PathBuf>,
    state: EngineState,
}

impl PiperBackend {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            program: config.piper_binary.clone(),
            model_dirs: config.piper_model_dirs.clone(),
            state: EngineState::new(config.poll_interval()),
        }
    }

    fn transient_output() -> Result<PathBuf> {
        tempfile::Builder::new()
            .prefix("tts-tester-")
            .suffix(".wav")
            .tempfile()?
            .into_temp_path()
            .keep()
            .map_err(|e| Error::Io(e.error))
    }
}

impl SpeechBackend for PiperBackend {
    fn id(&self) -> &'static str {
        DESCRIPTOR.id
    }

    fn is_available(&self) -> bool {
        executable_in_path(&self.program)
    }

    fn list_voices(&self) -> Vec<Voice> {
        scan_models(&self.model_dirs)
    }

    fn speak(&self, text: &str, output: Option<&Path>, ssml: bool) -> Result<Option<PathBuf>> {
        if ssml {
            debug!("piper has no markup mode, sending text as-is");
        }

        let (path, transient) = match output {
            Some(path) => (path.to_path_buf(), false),
            None => (Self::transient_output()?, true),
        };

        let inv = invocation(&self.program, &self.state.settings(), text, &path);
        let result = self
            .state
            .process()
            .run(&inv, self.id())
            .and_then(|_| ensure_output(&self.program, &path));

        match result {
            Ok(()) => Ok(Some(path)),
            Err(e) => {
                if transient {
                    let _ = std::fs::remove_file(&path);
                }
                Err(e)
            }
        }
    }

    fn stop(&self) {
        self.state.process().stop();
    }

    fn is_speaking(&self) -> bool {
        self.state.process().is_running()
    }

    fn apply_settings(&self, settings: &EngineSettings) {
        self.state.set_settings(settings);
    }

    fn current_settings(&self) -> EngineSettings {
        self.state.settings()
    }
}
