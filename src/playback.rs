use crate::error::{Error, Result};
use log::debug;
use rodio::{Decoder, OutputStream, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Plays WAV files on the default output device, one at a time, and can be
/// interrupted from another thread.
///
/// A stop that lands before playback has started is remembered until the next
/// [`Player::reset`], so the file that follows never plays.
#[derive(Default)]
pub struct Player {
    current: Mutex<Option<Arc<Sink>>>,
    stopped: AtomicBool,
}

impl Player {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the file has finished playing or [`Player::stop`] is called.
    pub fn play_file(&self, path: &Path) -> Result<()> {
        if self.stopped.swap(false, Ordering::SeqCst) {
            return Err(Error::Cancelled);
        }

        // The output stream must stay alive on this thread while the sink plays
        let (_stream, stream_handle) =
            OutputStream::try_default().map_err(|e| Error::Playback(e.to_string()))?;
        let sink = Sink::try_new(&stream_handle).map_err(|e| Error::Playback(e.to_string()))?;
        let sink = Arc::new(sink);

        let file = File::open(path)?;
        let source =
            Decoder::new(BufReader::new(file)).map_err(|e| Error::Playback(e.to_string()))?;
        sink.append(source.convert_samples::<f32>());

        if let Ok(mut current) = self.current.lock() {
            *current = Some(sink.clone());
        }
        // A stop may have arrived while the device was opening
        if self.stopped.load(Ordering::SeqCst) {
            sink.stop();
        }
        debug!("Playing {}", path.display());
        sink.sleep_until_end();

        if let Ok(mut current) = self.current.lock() {
            *current = None;
        }

        if self.stopped.swap(false, Ordering::SeqCst) {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Ok(current) = self.current.lock() {
            if let Some(sink) = current.as_ref() {
                sink.stop();
            }
        }
    }

    /// Forgets a stop that no playback consumed.
    pub fn reset(&self) {
        self.stopped.store(false, Ordering::SeqCst);
    }
}

/// Length of a WAV file in seconds, if it can be read as one.
pub fn wav_duration_secs(path: &Path) -> Option<f64> {
    let reader = hound::WavReader::open(path).ok()?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return None;
    }
    Some(reader.duration() as f64 / spec.sample_rate as f64)
}
