//! tts-tester - compare text-to-speech engines from the command line
//!
//! Drives the same session a graphical front end would: pick an engine, tune
//! it, speak or save, keep favorites and run A/B comparisons.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tts_tester::backends::EngineSettings;
use tts_tester::config_loader::AppConfig;
use tts_tester::export::ExportFormat;
use tts_tester::session::{AbSlot, Session};
use tts_tester::worker::SpeechEvent;
use tts_tester::Error;

/// Compare text-to-speech engines
#[derive(Parser)]
#[command(name = "tts-tester")]
#[command(author = "StarTuz")]
#[command(version)]
#[command(about = "Compare espeak-ng, Piper and Festival side by side", long_about = None)]
struct Cli {
    /// Configuration file (defaults to <config dir>/tts-tester/config.*)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Per-engine knobs; anything given is applied and remembered.
#[derive(Args, Default)]
struct EngineArgs {
    /// Engine id (espeak-ng, piper, festival); defaults to the first installed one
    #[arg(short, long)]
    engine: Option<String>,
    /// Voice id as listed by `voices`
    #[arg(long)]
    voice: Option<String>,
    /// Speed, 1.0 = engine default
    #[arg(long)]
    speed: Option<f64>,
    /// Pitch, 1.0 = engine default
    #[arg(long)]
    pitch: Option<f64>,
    /// Volume, 1.0 = engine default
    #[arg(long)]
    volume: Option<f64>,
}

impl EngineArgs {
    fn has_overrides(&self) -> bool {
        self.voice.is_some() || self.speed.is_some() || self.pitch.is_some() || self.volume.is_some()
    }

    fn apply_to(&self, mut settings: EngineSettings) -> EngineSettings {
        if let Some(voice) = &self.voice {
            settings.voice = Some(voice.clone());
        }
        if let Some(speed) = self.speed {
            settings.speed = speed;
        }
        if let Some(pitch) = self.pitch {
            settings.pitch = pitch;
        }
        if let Some(volume) = self.volume {
            settings.volume = volume;
        }
        settings
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List known engines and whether they are installed
    Engines,

    /// List voices of an engine
    Voices {
        #[arg(short, long)]
        engine: Option<String>,
    },

    /// Speak text, or save it to a WAV file with --output
    Speak {
        /// Text to speak
        text: String,
        #[command(flatten)]
        engine: EngineArgs,
        /// Treat the text as SSML markup
        #[arg(long)]
        ssml: bool,
        /// Write audio here instead of playing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show or change stored engine settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Manage favorites
    Favorites {
        #[command(subcommand)]
        action: FavoritesAction,
    },

    /// Speak the same text with two engines, one after the other
    Compare {
        text: String,
        /// Engine for side A
        #[arg(long)]
        a: String,
        /// Engine for side B
        #[arg(long)]
        b: String,
        /// Rating for side A (1-5)
        #[arg(long)]
        rate_a: Option<u8>,
        /// Rating for side B (1-5)
        #[arg(long)]
        rate_b: Option<u8>,
        /// Export the comparison afterwards (.json or .csv)
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Export a snapshot of engine, settings, text and favorites
    Export {
        /// Destination file
        path: PathBuf,
        #[arg(short, long)]
        engine: Option<String>,
        #[arg(long, default_value = "")]
        text: String,
        /// json or csv; guessed from the extension when omitted
        #[arg(long)]
        format: Option<String>,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the stored settings of an engine
    Show {
        #[arg(short, long)]
        engine: Option<String>,
    },
    /// Change settings of an engine
    Set {
        #[command(flatten)]
        engine: EngineArgs,
    },
}

#[derive(Subcommand)]
enum FavoritesAction {
    /// List favorites
    List,
    /// Save an engine's current settings as a favorite
    Add {
        name: String,
        #[arg(short, long)]
        engine: Option<String>,
    },
    /// Switch to a favorite's engine and settings
    Apply { name: String },
    /// Delete a favorite
    Remove { name: String },
}

/// Selects `requested`, or the first installed engine.
fn select(session: &mut Session, requested: Option<&str>) -> Result<String, Error> {
    let id = match requested {
        Some(id) => id.to_string(),
        None => session
            .available_engines()
            .first()
            .map(|d| d.id.to_string())
            .ok_or_else(|| Error::Unavailable {
                program: "any TTS engine (espeak-ng, piper, festival)".to_string(),
            })?,
    };
    session.select_engine(&id)?;
    Ok(id)
}

fn select_with_overrides(session: &mut Session, args: &EngineArgs) -> Result<String, Error> {
    let id = select(session, args.engine.as_deref())?;
    if args.has_overrides() {
        let settings = args.apply_to(session.current_settings().unwrap_or_default());
        session.update_settings(settings)?;
    }
    Ok(id)
}

fn print_settings(id: &str, settings: &EngineSettings) {
    println!("{}:", id);
    println!("  speed:  {}", settings.speed);
    println!("  pitch:  {}", settings.pitch);
    println!("  volume: {}", settings.volume);
    println!(
        "  voice:  {}",
        settings.selected_voice().unwrap_or("(default)")
    );
}

/// Prints the outcome; `Err` if synthesis did not succeed.
fn report(event: Option<SpeechEvent>) -> Result<(), Box<dyn std::error::Error>> {
    match event {
        Some(event @ SpeechEvent::Finished { .. }) => {
            println!("{}", event.status_text());
            Ok(())
        }
        Some(event) => Err(event.status_text().into()),
        None => Err("speech worker went away".into()),
    }
}

/// Records both scores, or neither if one is out of range.
fn record_ratings(
    session: &mut Session,
    rate_a: Option<u8>,
    rate_b: Option<u8>,
) -> Result<(), Error> {
    if let Some(bad) = [rate_a, rate_b]
        .into_iter()
        .flatten()
        .find(|score| !(1..=5).contains(score))
    {
        return Err(Error::InvalidRating(bad));
    }
    for (slot, score) in [(AbSlot::A, rate_a), (AbSlot::B, rate_b)] {
        if let Some(score) = score {
            session.rate(slot, score)?;
        }
    }
    Ok(())
}

fn export_format(path: &std::path::Path, explicit: Option<&str>) -> Result<ExportFormat, Error> {
    match explicit {
        Some(name) => name.parse(),
        None => Ok(ExportFormat::from_path(path).unwrap_or(ExportFormat::Json)),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = AppConfig::load_from(cli.config.as_deref())?;
    let mut session = Session::new(config);

    match cli.command {
        Commands::Engines => {
            for status in session.engines() {
                println!(
                    "{:<10} {:<10} {}",
                    status.descriptor.id,
                    status.descriptor.display_name,
                    if status.available {
                        "installed"
                    } else {
                        "not installed"
                    }
                );
            }
        }

        Commands::Voices { engine } => {
            select(&mut session, engine.as_deref())?;
            for voice in session.voices()? {
                if voice.id.is_empty() {
                    println!("{}", voice.name);
                } else {
                    println!("{:<40} {}", voice.id, voice.name);
                }
            }
        }

        Commands::Speak {
            text,
            engine,
            ssml,
            output,
        } => {
            select_with_overrides(&mut session, &engine)?;
            session.speak(&text, output, ssml)?;
            report(session.wait_for_outcome())?;
        }

        Commands::Settings { action } => match action {
            SettingsAction::Show { engine } => {
                let id = select(&mut session, engine.as_deref())?;
                print_settings(&id, &session.stored_settings(&id));
            }
            SettingsAction::Set { engine } => {
                let id = select_with_overrides(&mut session, &engine)?;
                print_settings(&id, &session.stored_settings(&id));
            }
        },

        Commands::Favorites { action } => match action {
            FavoritesAction::List => {
                if session.favorites().is_empty() {
                    println!("No favorites yet");
                }
                for favorite in session.favorites() {
                    println!(
                        "{:<24} {:<10} speed {} pitch {} volume {} voice {}",
                        favorite.name,
                        favorite.engine,
                        favorite.settings.speed,
                        favorite.settings.pitch,
                        favorite.settings.volume,
                        favorite.settings.selected_voice().unwrap_or("(default)")
                    );
                }
            }
            FavoritesAction::Add { name, engine } => {
                let id = select(&mut session, engine.as_deref())?;
                session.add_favorite(&name)?;
                println!("Saved '{}' ({})", name, id);
            }
            FavoritesAction::Apply { name } => {
                if session.apply_favorite(&name)? {
                    let id = session.current_engine().unwrap_or_default().to_string();
                    print_settings(&id, &session.stored_settings(&id));
                } else {
                    println!("'{}' uses an engine that is not available here", name);
                }
            }
            FavoritesAction::Remove { name } => {
                if session.remove_favorite(&name)? {
                    println!("Removed '{}'", name);
                } else {
                    return Err(Error::UnknownFavorite(name).into());
                }
            }
        },

        Commands::Compare {
            text,
            a,
            b,
            rate_a,
            rate_b,
            export,
        } => {
            record_ratings(&mut session, rate_a, rate_b)?;
            for (slot, engine) in [(AbSlot::A, &a), (AbSlot::B, &b)] {
                let settings = session.stored_settings(engine);
                session.set_ab_slot(slot, engine, settings)?;
            }
            for slot in [AbSlot::A, AbSlot::B] {
                println!("{}: {}", slot, session.ab_engine(slot).unwrap_or_default());
                session.speak_ab(slot, &text, None)?;
                if let Err(e) = report(session.wait_for_outcome()) {
                    eprintln!("{}: {}", slot, e);
                }
            }
            if let Some(path) = export {
                let format = export_format(&path, None)?;
                session.snapshot(&text).write_to(&path, format)?;
                println!("Exported to {}", path.display());
            }
        }

        Commands::Export {
            path,
            engine,
            text,
            format,
        } => {
            if let Some(id) = engine.as_deref() {
                session.select_engine(id)?;
            }
            let format = export_format(&path, format.as_deref())?;
            session.snapshot(&text).write_to(&path, format)?;
            println!("Exported to {}", path.display());
        }
    }

    Ok(())
}
