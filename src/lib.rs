//! Side-by-side testing of command-line text-to-speech engines.
//!
//! Each engine (espeak-ng, Piper, Festival) sits behind [`backends::SpeechBackend`],
//! which turns a uniform speed/pitch/volume/voice setting into that program's
//! own command line. A [`session::Session`] ties the engines together with the
//! persisted settings and favorites and runs every request on a
//! per-engine [`worker::SpeechWorker`] thread.

pub mod backends;
pub mod config_loader;
pub mod error;
pub mod export;
pub mod playback;
pub mod registry;
pub mod session;
pub mod settings;
pub mod worker;

pub use error::{Error, Result};
