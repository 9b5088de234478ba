use crate::backends::SpeechBackend;
use crate::error::{Error, Result};
use crate::playback::{wav_duration_secs, Player};
use log::{error, info, warn};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    /// Write audio here instead of playing it
    pub output: Option<PathBuf>,
    pub ssml: bool,
}

/// What a worker reports back; the last event of a request is never `Started`.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechEvent {
    Started {
        engine: String,
    },
    Finished {
        engine: String,
        output: Option<PathBuf>,
        duration_secs: Option<f64>,
    },
    Failed {
        engine: String,
        message: String,
    },
    Cancelled {
        engine: String,
    },
}

impl SpeechEvent {
    pub fn engine(&self) -> &str {
        match self {
            SpeechEvent::Started { engine }
            | SpeechEvent::Finished { engine, .. }
            | SpeechEvent::Failed { engine, .. }
            | SpeechEvent::Cancelled { engine } => engine,
        }
    }

    pub fn is_final(&self) -> bool {
        !matches!(self, SpeechEvent::Started { .. })
    }

    /// One-line status, as a status bar would show it.
    pub fn status_text(&self) -> String {
        match self {
            SpeechEvent::Started { engine } => format!("Speaking with {}...", engine),
            SpeechEvent::Finished {
                output: Some(path),
                duration_secs: Some(secs),
                ..
            } => format!("Saved {} ({:.1}s)", path.display(), secs),
            SpeechEvent::Finished {
                output: Some(path), ..
            } => format!("Saved {}", path.display()),
            SpeechEvent::Finished { .. } => "Ready".to_string(),
            SpeechEvent::Failed { engine, message } => format!("{} failed: {}", engine, message),
            SpeechEvent::Cancelled { .. } => "Stopped".to_string(),
        }
    }
}

/// Owns an engine instance and the thread that talks to it.
///
/// Requests are handled one at a time. Submitting while a request is still
/// in flight is rejected with [`Error::Busy`] instead of racing the running
/// process. A stop issued while a request is in flight always ends that
/// request as [`SpeechEvent::Cancelled`], whichever stage it is in.
pub struct SpeechWorker {
    engine: Arc<dyn SpeechBackend>,
    player: Arc<Player>,
    busy: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    tx: Sender<SpeechRequest>,
}

impl SpeechWorker {
    pub fn spawn(engine: Arc<dyn SpeechBackend>, events: Sender<SpeechEvent>) -> Result<Self> {
        let (tx, rx) = channel::<SpeechRequest>();
        let player = Arc::new(Player::new());
        let busy = Arc::new(AtomicBool::new(false));
        let cancel = Arc::new(AtomicBool::new(false));

        let thread_engine = engine.clone();
        let thread_player = player.clone();
        let thread_busy = busy.clone();
        let thread_cancel = cancel.clone();
        thread::Builder::new()
            .name(format!("speech-{}", engine.id()))
            .spawn(move || {
                while let Ok(request) = rx.recv() {
                    let id = thread_engine.id().to_string();
                    let _ = events.send(SpeechEvent::Started { engine: id.clone() });

                    let event = panic::catch_unwind(AssertUnwindSafe(|| {
                        handle(
                            thread_engine.as_ref(),
                            &thread_player,
                            &thread_cancel,
                            request,
                        )
                    }))
                    .unwrap_or_else(|payload| {
                        error!("{} panicked: {}", id, panic_message(payload.as_ref()));
                        SpeechEvent::Failed {
                            engine: id.clone(),
                            message: format!("engine panicked: {}", panic_message(payload.as_ref())),
                        }
                    });
                    match &event {
                        SpeechEvent::Failed { message, .. } => warn!("{}: {}", id, message),
                        other => info!("{}: {}", id, other.status_text()),
                    }

                    thread_busy.store(false, Ordering::SeqCst);
                    let _ = events.send(event);
                }
            })?;

        Ok(Self {
            engine,
            player,
            busy,
            cancel,
            tx,
        })
    }

    pub fn engine(&self) -> &Arc<dyn SpeechBackend> {
        &self.engine
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn submit(&self, request: SpeechRequest) -> Result<()> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::Busy(self.engine.id().to_string()));
        }
        self.cancel.store(false, Ordering::SeqCst);
        self.player.reset();

        if self.tx.send(request).is_err() {
            self.busy.store(false, Ordering::SeqCst);
            return Err(Error::WorkerStopped(self.engine.id().to_string()));
        }
        Ok(())
    }

    /// Interrupts synthesis and any playback of a transient file.
    /// Does not go through the queue, so it works while a request is running.
    pub fn stop(&self) {
        self.cancel.store(true, Ordering::SeqCst);
        self.engine.stop();
        self.player.stop();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause")
}

/// Runs one request; every error ends up as an event, never a panic or a
/// propagated `Err`.
fn handle(
    engine: &dyn SpeechBackend,
    player: &Player,
    cancel: &AtomicBool,
    request: SpeechRequest,
) -> SpeechEvent {
    let id = engine.id().to_string();
    let cancelled = || cancel.load(Ordering::SeqCst);

    // Stopped before the engine had a process to kill
    if cancelled() {
        return SpeechEvent::Cancelled { engine: id };
    }
    let result = engine.speak(&request.text, request.output.as_deref(), request.ssml);

    let outcome = match result {
        // Engine could only render to a file; playing it is our job
        Ok(Some(transient)) if request.output.is_none() => {
            let duration_secs = wav_duration_secs(&transient);
            let played = if cancelled() {
                Err(Error::Cancelled)
            } else {
                player.play_file(&transient)
            };
            if let Err(e) = std::fs::remove_file(&transient) {
                warn!("Could not remove {}: {}", transient.display(), e);
            }
            played.map(|_| (None, duration_secs))
        }
        Ok(_) if cancelled() => Err(Error::Cancelled),
        Ok(output) => {
            let duration_secs = output.as_deref().and_then(wav_duration_secs);
            Ok((output, duration_secs))
        }
        Err(e) => Err(e),
    };

    match outcome {
        Ok((output, duration_secs)) => SpeechEvent::Finished {
            engine: id,
            output,
            duration_secs,
        },
        Err(Error::Cancelled) => SpeechEvent::Cancelled { engine: id },
        Err(e) => SpeechEvent::Failed {
            engine: id,
            message: e.to_string(),
        },
    }
}
