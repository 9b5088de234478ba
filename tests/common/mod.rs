#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tts_tester::config_loader::AppConfig;

/// Writes an executable shell script standing in for a TTS program.
pub fn fake_program(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Logs each argument on its own line and writes a stub WAV header to the `-w` path.
pub const FAKE_ESPEAK: &str = r#"dir=$(dirname "$0")
if [ "$1" = "--voices" ]; then
  echo "Pty Language       Age/Gender VoiceName          File                 Other Languages"
  echo " 5  en              --/M      English            gmw/en"
  echo " 5  sv              --/M      Swedish            gmw/sv"
  exit 0
fi
: > "$dir/espeak.args"
out=""
while [ $# -gt 0 ]; do
  printf '%s\n' "$1" >> "$dir/espeak.args"
  if [ "$1" = "-w" ]; then out="$2"; fi
  shift
done
if [ -n "$out" ]; then printf 'RIFF' > "$out"; fi
"#;

/// Records arguments and stdin, then writes to `--output_file`.
pub const FAKE_PIPER: &str = r#"dir=$(dirname "$0")
: > "$dir/piper.args"
out=""
while [ $# -gt 0 ]; do
  printf '%s\n' "$1" >> "$dir/piper.args"
  if [ "$1" = "--output_file" ]; then out="$2"; fi
  shift
done
cat > "$dir/piper.stdin"
printf 'RIFF' > "$out"
"#;

/// Records the Scheme script from stdin and honours `utt.save.wave`.
pub const FAKE_FESTIVAL: &str = r#"dir=$(dirname "$0")
if [ "$1" = "-b" ]; then
  echo "(kal_diphone rab_diphone)"
  exit 0
fi
cat > "$dir/festival.stdin"
out=$(sed -n 's/^(utt.save.wave utt1 "\(.*\)")$/\1/p' "$dir/festival.stdin")
if [ -n "$out" ]; then printf 'RIFF' > "$out"; fi
"#;

pub const FAKE_SLOW: &str = "exec sleep 5\n";

pub const FAKE_BROKEN: &str = "echo 'voice not found' >&2\nexit 3\n";

/// Config pointing every engine at a fake program under `dir/bin`.
pub fn config_with(dir: &Path, espeak: &str, piper: &str, festival: &str) -> AppConfig {
    let bin = dir.join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    AppConfig {
        espeak_binary: fake_program(&bin, "espeak-ng", espeak)
            .to_string_lossy()
            .into_owned(),
        piper_binary: fake_program(&bin, "piper", piper)
            .to_string_lossy()
            .into_owned(),
        festival_binary: fake_program(&bin, "festival", festival)
            .to_string_lossy()
            .into_owned(),
        piper_model_dirs: vec![dir.join("models")],
        poll_interval_ms: 10,
        ..AppConfig::with_config_dir(dir.join("cfg"))
    }
}

pub fn fake_config(dir: &Path) -> AppConfig {
    config_with(dir, FAKE_ESPEAK, FAKE_PIPER, FAKE_FESTIVAL)
}

pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}
