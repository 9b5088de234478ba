#![cfg(unix)]

mod common;

use common::*;
use serial_test::serial;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;
use tts_tester::backends::espeak::EspeakBackend;
use tts_tester::backends::festival::FestivalBackend;
use tts_tester::backends::piper::PiperBackend;
use tts_tester::backends::{EngineSettings, SpeechBackend};
use tts_tester::registry::Registry;
use tts_tester::Error;

#[test]
#[serial]
fn test_espeak_default_settings_to_file() {
    let dir = tempdir().unwrap();
    let config = fake_config(dir.path());
    let espeak = EspeakBackend::new(&config);
    let out = dir.path().join("out.wav");

    let written = espeak.speak("Hello world", Some(out.as_path()), false).unwrap();

    assert_eq!(written.as_deref(), Some(out.as_path()));
    let expected: Vec<String> = ["-s", "175", "-p", "50", "-a", "100", "-w"]
        .iter()
        .map(|s| s.to_string())
        .chain([out.to_string_lossy().into_owned(), "Hello world".to_string()])
        .collect();
    assert_eq!(read_lines(&dir.path().join("bin/espeak.args")), expected);
    assert!(!espeak.is_speaking());
}

#[test]
#[serial]
fn test_espeak_applied_settings_reach_command_line() {
    let dir = tempdir().unwrap();
    let espeak = EspeakBackend::new(&fake_config(dir.path()));
    espeak.apply_settings(&EngineSettings {
        speed: 2.0,
        pitch: 0.5,
        volume: 1.5,
        voice: Some("sv".to_string()),
    });

    espeak.speak("Hej", None, false).unwrap();

    assert_eq!(
        read_lines(&dir.path().join("bin/espeak.args")),
        ["-v", "sv", "-s", "350", "-p", "25", "-a", "150", "Hej"]
    );
}

#[test]
#[serial]
fn test_espeak_voices_are_parsed() {
    let dir = tempdir().unwrap();
    let espeak = EspeakBackend::new(&fake_config(dir.path()));

    let voices = espeak.list_voices();
    let ids: Vec<&str> = voices.iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, ["English", "Swedish"]);
    assert_eq!(voices[1].name, "Swedish (sv)");
}

#[test]
#[serial]
fn test_piper_feeds_text_on_stdin() {
    let dir = tempdir().unwrap();
    let piper = PiperBackend::new(&fake_config(dir.path()));
    piper.apply_settings(&EngineSettings {
        speed: 2.0,
        voice: Some("/voices/en_US-lessac-medium.onnx".to_string()),
        ..EngineSettings::default()
    });
    let out = dir.path().join("piper.wav");

    piper.speak("Hello there", Some(out.as_path()), false).unwrap();

    assert_eq!(
        std::fs::read_to_string(dir.path().join("bin/piper.stdin")).unwrap(),
        "Hello there\n"
    );
    assert_eq!(
        read_lines(&dir.path().join("bin/piper.args")),
        [
            "--output_file",
            out.to_str().unwrap(),
            "--model",
            "/voices/en_US-lessac-medium.onnx",
            "--length_scale",
            "0.5"
        ]
    );
}

#[test]
#[serial]
fn test_piper_without_output_returns_transient_file() {
    let dir = tempdir().unwrap();
    let piper = PiperBackend::new(&fake_config(dir.path()));

    let transient = piper.speak("Hi", None, false).unwrap().unwrap();

    assert!(transient.is_file());
    assert_eq!(transient.extension().and_then(|e| e.to_str()), Some("wav"));
    std::fs::remove_file(transient).unwrap();
}

#[test]
#[serial]
fn test_failed_piper_leaves_no_transient_file() {
    let dir = tempdir().unwrap();
    let config = config_with(dir.path(), FAKE_ESPEAK, FAKE_BROKEN, FAKE_FESTIVAL);
    let piper = PiperBackend::new(&config);

    let scratch = dir.path().join("tmp");
    std::fs::create_dir_all(&scratch).unwrap();
    let saved_tmpdir = std::env::var_os("TMPDIR");
    std::env::set_var("TMPDIR", &scratch);
    let result = piper.speak("Hi", None, false);
    match saved_tmpdir {
        Some(value) => std::env::set_var("TMPDIR", value),
        None => std::env::remove_var("TMPDIR"),
    }

    assert!(matches!(result, Err(Error::Failed { .. })));
    let leftovers: Vec<_> = std::fs::read_dir(&scratch)
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert!(leftovers.is_empty(), "left behind: {:?}", leftovers);
}

#[test]
#[serial]
fn test_festival_script_saves_wave() {
    let dir = tempdir().unwrap();
    let festival = FestivalBackend::new(&fake_config(dir.path()));
    festival.apply_settings(&EngineSettings {
        voice: Some("voice_kal_diphone".to_string()),
        ..EngineSettings::default()
    });
    let out = dir.path().join("festival.wav");

    let written = festival.speak("Say \"hi\"", Some(out.as_path()), false).unwrap();

    assert_eq!(written, Some(out.clone()));
    let script = std::fs::read_to_string(dir.path().join("bin/festival.stdin")).unwrap();
    assert!(script.starts_with("(voice_kal_diphone)\n"));
    assert!(script.contains(r#"(SynthText "Say \"hi\"")"#));
    assert!(std::fs::metadata(&out).unwrap().len() > 0);
}

#[test]
#[serial]
fn test_festival_voice_ids_select_voices() {
    let dir = tempdir().unwrap();
    let festival = FestivalBackend::new(&fake_config(dir.path()));

    let ids: Vec<String> = festival.list_voices().into_iter().map(|v| v.id).collect();
    assert_eq!(ids, ["voice_kal_diphone", "voice_rab_diphone"]);
}

#[test]
#[serial]
fn test_failing_engine_reports_stderr() {
    let dir = tempdir().unwrap();
    let config = config_with(dir.path(), FAKE_BROKEN, FAKE_PIPER, FAKE_FESTIVAL);
    let espeak = EspeakBackend::new(&config);

    match espeak.speak("Hello", None, false) {
        Err(Error::Failed { stderr, .. }) => assert_eq!(stderr.trim(), "voice not found"),
        other => panic!("expected a failure, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_missing_output_file_is_an_error() {
    let dir = tempdir().unwrap();
    let config = config_with(dir.path(), "exit 0\n", FAKE_PIPER, FAKE_FESTIVAL);
    let espeak = EspeakBackend::new(&config);

    let result = espeak.speak("Hello", Some(dir.path().join("never.wav").as_path()), false);
    assert!(matches!(result, Err(Error::MissingOutput { .. })));
}

#[test]
#[serial]
fn test_stop_kills_running_process() {
    let dir = tempdir().unwrap();
    let config = config_with(dir.path(), FAKE_SLOW, FAKE_PIPER, FAKE_FESTIVAL);
    let espeak = Arc::new(EspeakBackend::new(&config));

    let speaker = espeak.clone();
    let handle = thread::spawn(move || speaker.speak("long text", None, false));

    let deadline = Instant::now() + Duration::from_secs(5);
    while !espeak.is_speaking() {
        assert!(Instant::now() < deadline, "process never started");
        thread::sleep(Duration::from_millis(10));
    }

    let stopped_at = Instant::now();
    espeak.stop();
    assert!(!espeak.is_speaking());
    assert!(matches!(handle.join().unwrap(), Err(Error::Cancelled)));
    assert!(stopped_at.elapsed() < Duration::from_secs(3));
}

#[test]
#[serial]
fn test_second_speak_on_same_instance_is_refused() {
    let dir = tempdir().unwrap();
    let config = config_with(dir.path(), FAKE_SLOW, FAKE_PIPER, FAKE_FESTIVAL);
    let espeak = Arc::new(EspeakBackend::new(&config));

    let speaker = espeak.clone();
    let handle = thread::spawn(move || speaker.speak("first", None, false));
    while !espeak.is_speaking() {
        thread::sleep(Duration::from_millis(10));
    }

    assert!(matches!(
        espeak.speak("second", None, false),
        Err(Error::Busy(_))
    ));
    espeak.stop();
    let _ = handle.join();
}

#[test]
#[serial]
fn test_registry_detects_fake_engines() {
    let dir = tempdir().unwrap();
    let registry = Registry::new(Arc::new(fake_config(dir.path())));

    let ids: Vec<&str> = registry.detect_available().iter().map(|d| d.id).collect();
    assert_eq!(ids, ["espeak-ng", "piper", "festival"]);

    let engine = registry.construct("festival").unwrap();
    assert_eq!(engine.id(), "festival");
    assert!(engine.is_available());
    assert!(registry.construct("mbrola").is_none());
}

#[test]
#[serial]
fn test_stop_when_idle_is_harmless() {
    let dir = tempdir().unwrap();
    let espeak = EspeakBackend::new(&fake_config(dir.path()));
    espeak.stop();
    espeak.stop();
    let out = dir.path().join("a.wav");
    assert!(espeak.speak("still works", Some(out.as_path()), false).is_ok());
}
