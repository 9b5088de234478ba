use super::{
    capture_stdout, ensure_output, executable_in_path, EngineSettings, EngineState, Invocation,
    SpeechBackend, Voice,
};
use crate::config_loader::AppConfig;
use crate::error::Result;
use crate::registry::EngineDescriptor;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DESCRIPTOR: EngineDescriptor = EngineDescriptor {
    id: "espeak-ng",
    display_name: "eSpeak NG",
};

/// espeak-ng's own default rate in words per minute
const BASE_WPM: f64 = 175.0;
const BASE_PITCH: f64 = 50.0;
const BASE_AMPLITUDE: f64 = 100.0;

/// `-s`: words per minute.
pub fn words_per_minute(speed: f64) -> i64 {
    (BASE_WPM * speed).round().max(0.0) as i64
}

/// `-p`: 0-99, 50 is neutral.
pub fn pitch_value(pitch: f64) -> i64 {
    (BASE_PITCH * pitch).round().clamp(0.0, 99.0) as i64
}

/// `-a`: amplitude 0-200, 100 is neutral.
pub fn amplitude(volume: f64) -> i64 {
    (BASE_AMPLITUDE * volume).round().clamp(0.0, 200.0) as i64
}

/// Builds the espeak-ng command line for `text`.
pub fn invocation(
    program: &str,
    settings: &EngineSettings,
    text: &str,
    output: Option<&Path>,
    ssml: bool,
) -> Invocation {
    let mut inv = Invocation::new(program);

    if let Some(voice) = settings.selected_voice() {
        inv = inv.arg("-v").arg(voice);
    }

    inv = inv
        .arg("-s")
        .arg(words_per_minute(settings.speed).to_string())
        .arg("-p")
        .arg(pitch_value(settings.pitch).to_string())
        .arg("-a")
        .arg(amplitude(settings.volume).to_string());

    if ssml {
        inv = inv.arg("-m");
    }

    if let Some(path) = output {
        inv = inv.arg("-w").arg(path.to_string_lossy());
    }

    inv.arg(text)
}

/// Parses `espeak-ng --voices`:
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  af              --/M      Afrikaans          gmw/af
/// ```
pub fn parse_voices(listing: &str) -> Vec<Voice> {
    listing
        .lines()
        .skip(1)
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 4 {
                let lang = parts[1];
                let name = parts[3];
                Some(Voice {
                    id: name.to_string(),
                    name: format!("{} ({})", name, lang),
                })
            } else {
                None
            }
        })
        .collect()
}

pub struct EspeakBackend {
    program: String,
    voice_timeout: Duration,
    state: EngineState,
}

impl EspeakBackend {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            program: config.espeak_binary.clone(),
            voice_timeout: config.voice_list_timeout(),
            state: EngineState::new(config.poll_interval()),
        }
    }

    pub fn invocation(&self, text: &str, output: Option<&Path>, ssml: bool) -> Invocation {
        invocation(&self.program, &self.state.settings(), text, output, ssml)
    }
}

impl SpeechBackend for EspeakBackend {
    fn id(&self) -> &'static str {
        DESCRIPTOR.id
    }

    fn is_available(&self) -> bool {
        executable_in_path(&self.program)
    }

    fn list_voices(&self) -> Vec<Voice> {
        let inv = Invocation::new(&self.program).arg("--voices");
        capture_stdout(&inv, self.voice_timeout)
            .map(|out| parse_voices(&out))
            .unwrap_or_default()
    }

    fn speak(&self, text: &str, output: Option<&Path>, ssml: bool) -> Result<Option<PathBuf>> {
        let inv = self.invocation(text, output, ssml);
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
