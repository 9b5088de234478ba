use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Process-wide configuration. Built once at startup and handed to the
/// registry and the settings store; nothing reads it from a global.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Directory holding settings.json and favorites.json
    pub config_dir: PathBuf,
    pub espeak_binary: String,
    pub piper_binary: String,
    pub festival_binary: String,
    /// Directories scanned for Piper `.onnx` voice models, in order
    #[serde(default = "default_piper_model_dirs")]
    pub piper_model_dirs: Vec<PathBuf>,
    /// Upper bound for `--voices` style catalog queries
    pub voice_list_timeout_secs: u64,
    /// How often a running synthesis process is polled for exit
    pub poll_interval_ms: u64,
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tts-tester")
}

fn default_piper_model_dirs() -> Vec<PathBuf> {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
    vec![
        home.join(".local/share/piper-voices"),
        PathBuf::from("/usr/share/piper-voices"),
        home.join(".local/share/piper/voices"),
        home.join(".local/share/piper/models"),
    ]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            espeak_binary: "espeak-ng".to_string(),
            piper_binary: "piper".to_string(),
            festival_binary: "festival".to_string(),
            piper_model_dirs: default_piper_model_dirs(),
            voice_list_timeout_secs: 10,
            poll_interval_ms: 50,
        }
    }
}

impl AppConfig {
    /// Defaults, then `<config dir>/config.*` if present, then `TTS_TESTER_*` variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(None)
    }

    /// Like [`AppConfig::load`], but an explicit file replaces the default
    /// lookup and must exist.
    pub fn load_from(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let defaults = Self::default();

        let mut builder = Config::builder()
            .set_default(
                "config_dir",
                defaults.config_dir.to_string_lossy().to_string(),
            )?
            .set_default("espeak_binary", defaults.espeak_binary.as_str())?
            .set_default("piper_binary", defaults.piper_binary.as_str())?
            .set_default("festival_binary", defaults.festival_binary.as_str())?
            .set_default("voice_list_timeout_secs", defaults.voice_list_timeout_secs)?
            .set_default("poll_interval_ms", defaults.poll_interval_ms)?;

        builder = match file {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(
                File::with_name(&defaults.config_dir.join("config").to_string_lossy())
                    .required(false),
            ),
        };

        // e.g. TTS_TESTER_PIPER_BINARY=/opt/piper/piper
        let builder = builder.add_source(
            Environment::with_prefix("TTS_TESTER")
                .try_parsing(true)
                .list_separator(":")
                .with_list_parse_key("piper_model_dirs"),
        );

        let settings: AppConfig = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Same defaults, different place for settings.json / favorites.json.
    pub fn with_config_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: dir.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), config::ConfigError> {
        for (key, value) in [
            ("espeak_binary", &self.espeak_binary),
            ("piper_binary", &self.piper_binary),
            ("festival_binary", &self.festival_binary),
        ] {
            if value.trim().is_empty() {
                return Err(config::ConfigError::Message(format!(
                    "{} must not be empty",
                    key
                )));
            }
        }
        if self.voice_list_timeout_secs == 0 {
            return Err(config::ConfigError::Message(
                "voice_list_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(config::ConfigError::Message(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn voice_list_timeout(&self) -> Duration {
        Duration::from_secs(self.voice_list_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.espeak_binary, "espeak-ng");
        assert!(config.config_dir.ends_with("tts-tester"));
        assert_eq!(config.piper_model_dirs.len(), 4);
    }

    #[test]
    #[serial]
    fn test_load_from_file_overrides_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tts.toml");
        std::fs::write(
            &path,
            "piper_binary = \"/opt/piper/piper\"\npoll_interval_ms = 20\npiper_model_dirs = [\"/srv/voices\"]\n",
        )
        .unwrap();

        let config = AppConfig::load_from(Some(path.as_path())).expect("Failed to load settings");
        assert_eq!(config.piper_binary, "/opt/piper/piper");
        assert_eq!(config.poll_interval_ms, 20);
        assert_eq!(config.piper_model_dirs, vec![PathBuf::from("/srv/voices")]);
        assert_eq!(config.festival_binary, "festival");
    }

    #[test]
    #[serial]
    fn test_environment_overrides_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tts.toml");
        std::fs::write(&path, "festival_binary = \"festival-from-file\"\n").unwrap();

        std::env::set_var("TTS_TESTER_FESTIVAL_BINARY", "festival-from-env");
        let config = AppConfig::load_from(Some(path.as_path()));
        std::env::remove_var("TTS_TESTER_FESTIVAL_BINARY");

        assert_eq!(config.unwrap().festival_binary, "festival-from-env");
    }

    #[test]
    #[serial]
    fn test_invalid_values_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tts.toml");
        std::fs::write(&path, "voice_list_timeout_secs = 0\n").unwrap();

        assert!(AppConfig::load_from(Some(path.as_path())).is_err());
    }

    #[test]
    #[serial]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(AppConfig::load_from(Some(dir.path().join("absent.toml").as_path())).is_err());
    }
}
