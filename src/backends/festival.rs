use super::{
    capture_stdout, ensure_output, executable_in_path, EngineSettings, EngineState, Invocation,
    SpeechBackend, Voice,
};
use crate::config_loader::AppConfig;
use crate::error::Result;
use crate::registry::EngineDescriptor;
use log::debug;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DESCRIPTOR: EngineDescriptor = EngineDescriptor {
    id: "festival",
    display_name: "Festival",
};

/// Festival's voice selection functions are named `voice_<name>`.
const VOICE_PREFIX: &str = "voice_";

/// Value for `Duration_Stretch`; `None` at the default speed.
pub fn duration_stretch(speed: f64) -> Option<f64> {
    if speed == 1.0 {
        None
    } else {
        Some(1.0 / speed.max(0.1))
    }
}

/// Scheme string literal.
fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// The Scheme program fed to festival's interactive shell.
pub fn script(settings: &EngineSettings, text: &str, output: Option<&Path>) -> String {
    let mut program = String::new();

    if let Some(voice) = settings.selected_voice() {
        program.push_str(&format!("({})\n", voice));
    }
    if let Some(stretch) = duration_stretch(settings.speed) {
        program.push_str(&format!("(Parameter.set 'Duration_Stretch {})\n", stretch));
    }

    match output {
        Some(path) => {
            program.push_str(&format!("(set! utt1 (SynthText {}))\n", quote(text)));
            program.push_str(&format!(
                "(utt.save.wave utt1 {})\n",
                quote(&path.to_string_lossy())
            ));
        }
        None => program.push_str(&format!("(SayText {})\n", quote(text))),
    }

    program
}

/// Parses the printed result of `(voice.list)`, e.g. `(kal_diphone rab_diphone)`.
/// Ids carry the `voice_` prefix so `(<id>)` selects the voice.
pub fn parse_voice_list(output: &str) -> Vec<Voice> {
    let trimmed = output.trim();
    let Some(inner) = trimmed
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    else {
        return Vec::new();
    };

    inner
        .split_whitespace()
        .map(|name| Voice {
            id: format!("{}{}", VOICE_PREFIX, name),
            name: name.to_string(),
        })
        .collect()
}

pub struct FestivalBackend {
    program: String,
    voice_timeout: Duration,
    state: EngineState,
}

impl FestivalBackend {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            program: config.festival_binary.clone(),
            voice_timeout: config.voice_list_timeout(),
            state: EngineState::new(config.poll_interval()),
        }
    }
}

impl SpeechBackend for FestivalBackend {
    fn id(&self) -> &'static str {
        DESCRIPTOR.id
    }

    fn is_available(&self) -> bool {
        executable_in_path(&self.program)
    }

    fn list_voices(&self) -> Vec<Voice> {
        let inv = Invocation::new(&self.program)
            .arg("-b")
            .arg("(print (voice.list))");
        capture_stdout(&inv, self.voice_timeout)
            .map(|out| parse_voice_list(&out))
            .unwrap_or_default()
    }

    fn speak(&self, text: &str, output: Option<&Path>, ssml: bool) -> Result<Option<PathBuf>> {
        if ssml {
            debug!("festival script mode has no markup support, speaking text as-is");
        }

        let inv = Invocation::new(&self.program).stdin(script(&self.state.settings(), text, output));
        self.state.process().run(&inv, self.id())?;

        match output {
            Some(path) => {
                ensure_output(&self.program, path)?;
                Ok(Some(path.to_path_buf()))
            }
            None => Ok(None),
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
