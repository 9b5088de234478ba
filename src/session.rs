use crate::backends::{voices_or_default, EngineSettings, SpeechBackend, Voice};
use crate::config_loader::AppConfig;
use crate::error::{Error, Result};
use crate::export::ExportSnapshot;
use crate::registry::{EngineDescriptor, Registry};
use crate::settings::{Favorite, SettingsDocument, SettingsStore};
use crate::worker::{SpeechEvent, SpeechRequest, SpeechWorker};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbSlot {
    A,
    B,
}

impl fmt::Display for AbSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbSlot::A => write!(f, "A"),
            AbSlot::B => write!(f, "B"),
        }
    }
}

/// Listener scores for the two sides of a comparison, 1 (worst) to 5.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbRatings {
    pub a: Option<u8>,
    pub b: Option<u8>,
}

/// One side of an A/B comparison. Each side gets its own engine instance so
/// it never disturbs the settings of the engine selected in the editor.
struct AbSide {
    engine: String,
    worker: SpeechWorker,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatus {
    #[serde(flatten)]
    pub descriptor: EngineDescriptor,
    pub available: bool,
}

/// What the UI talks to: current engine, persisted settings, favorites and
/// the A/B comparison.
pub struct Session {
    registry: Registry,
    store: SettingsStore,
    settings: SettingsDocument,
    favorites: Vec<Favorite>,
    workers: HashMap<String, SpeechWorker>,
    current: Option<String>,
    ab: HashMap<AbSlot, AbSide>,
    ratings: AbRatings,
    events_tx: Sender<SpeechEvent>,
    events_rx: Receiver<SpeechEvent>,
}

impl Session {
    pub fn new(config: AppConfig) -> Self {
        let config = Arc::new(config);
        let store = SettingsStore::new(&config);
        let registry = Registry::new(config);
        let settings = store.load_settings();
        let favorites = store.load_favorites();
        let (events_tx, events_rx) = channel();

        Self {
            registry,
            store,
            settings,
            favorites,
            workers: HashMap::new(),
            current: None,
            ab: HashMap::new(),
            ratings: AbRatings::default(),
            events_tx,
            events_rx,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Every known engine with its install status, for an engine picker.
    pub fn engines(&self) -> Vec<EngineStatus> {
        let available = self.registry.detect_available();
        self.registry
            .descriptors()
            .into_iter()
            .map(|descriptor| EngineStatus {
                available: available.contains(&descriptor),
                descriptor,
            })
            .collect()
    }

    pub fn available_engines(&self) -> Vec<EngineDescriptor> {
        self.registry.detect_available()
    }

    /// Settings stored for `id`, or defaults.
    pub fn stored_settings(&self, id: &str) -> EngineSettings {
        self.settings.get(id).cloned().unwrap_or_default()
    }

    fn worker_for(&mut self, id: &str) -> Result<&SpeechWorker> {
        if !self.workers.contains_key(id) {
            let engine = self
                .registry
                .construct(id)
                .ok_or_else(|| Error::UnknownEngine(id.to_string()))?;
            engine.apply_settings(&self.stored_settings(id));
            let worker = SpeechWorker::spawn(Arc::from(engine), self.events_tx.clone())?;
            self.workers.insert(id.to_string(), worker);
        }
        self.workers
            .get(id)
            .ok_or_else(|| Error::UnknownEngine(id.to_string()))
    }

    /// Makes `id` the current engine, creating it on first use with its
    /// stored settings. An unknown id leaves the selection as it was.
    pub fn select_engine(&mut self, id: &str) -> Result<()> {
        self.worker_for(id)?;
        if self.current.as_deref() != Some(id) {
            info!("Selected engine {}", id);
        }
        self.current = Some(id.to_string());
        Ok(())
    }

    pub fn current_engine(&self) -> Option<&str> {
        self.current.as_deref()
    }

    fn current_worker(&self) -> Result<&SpeechWorker> {
        let id = self.current.as_deref().ok_or(Error::NoEngineSelected)?;
        self.workers
            .get(id)
            .ok_or_else(|| Error::UnknownEngine(id.to_string()))
    }

    fn current_backend(&self) -> Result<&Arc<dyn SpeechBackend>> {
        self.current_worker().map(SpeechWorker::engine)
    }

    pub fn current_settings(&self) -> Option<EngineSettings> {
        self.current_backend().ok().map(|e| e.current_settings())
    }

    /// Applies `settings` to the current engine and writes settings.json.
    pub fn update_settings(&mut self, settings: EngineSettings) -> Result<()> {
        let id = self.current.clone().ok_or(Error::NoEngineSelected)?;
        self.current_backend()?.apply_settings(&settings);
        self.settings.insert(id, settings);
        self.store.save_settings(&self.settings)
    }

    /// Voices of the current engine; a single default entry if it reports none.
    pub fn voices(&self) -> Result<Vec<Voice>> {
        Ok(voices_or_default(self.current_backend()?.list_voices()))
    }

    pub fn speak(&self, text: &str, output: Option<PathBuf>, ssml: bool) -> Result<()> {
        self.current_worker()?.submit(SpeechRequest {
            text: text.to_string(),
            output,
            ssml,
        })
    }

    /// Stops everything this session has playing, A/B sides included.
    pub fn stop(&self) {
        for worker in self.workers.values() {
            worker.stop();
        }
        for side in self.ab.values() {
            side.worker.stop();
        }
    }

    pub fn events(&self) -> &Receiver<SpeechEvent> {
        &self.events_rx
    }

    /// Blocks until some request reaches a final event.
    pub fn wait_for_outcome(&self) -> Option<SpeechEvent> {
        loop {
            let event = self.events_rx.recv().ok()?;
            if event.is_final() {
                return Some(event);
            }
            info!("{}", event.status_text());
        }
    }

    pub fn favorites(&self) -> &[Favorite] {
        &self.favorites
    }

    /// Saves the current engine and its settings under `name`.
    pub fn add_favorite(&mut self, name: &str) -> Result<()> {
        let engine = self.current.clone().ok_or(Error::NoEngineSelected)?;
        let settings = self.current_backend()?.current_settings();
        self.favorites.push(Favorite {
            name: name.to_string(),
            engine,
            settings,
        });
        self.store.save_favorites(&self.favorites)
    }

    /// Switches to the favorite's engine and settings. Returns `Ok(false)`
    /// without touching the selection when that engine isn't registered.
    pub fn apply_favorite(&mut self, name: &str) -> Result<bool> {
        let favorite = self
            .favorites
            .iter()
            .find(|f| f.name == name)
            .cloned()
            .ok_or_else(|| Error::UnknownFavorite(name.to_string()))?;

        if self.registry.descriptor(&favorite.engine).is_none() {
            warn!(
                "Favorite '{}' uses unknown engine '{}', keeping current engine",
                favorite.name, favorite.engine
            );
            return Ok(false);
        }

        self.select_engine(&favorite.engine)?;
        self.update_settings(favorite.settings)?;
        Ok(true)
    }

    /// Removes every favorite called `name`; `false` if there was none.
    pub fn remove_favorite(&mut self, name: &str) -> Result<bool> {
        let before = self.favorites.len();
        self.favorites.retain(|f| f.name != name);
        if self.favorites.len() == before {
            return Ok(false);
        }
        self.store.save_favorites(&self.favorites)?;
        Ok(true)
    }

    /// Assigns an engine configuration to one side of the comparison.
    pub fn set_ab_slot(&mut self, slot: AbSlot, engine: &str, settings: EngineSettings) -> Result<()> {
        let backend = self
            .registry
            .construct(engine)
            .ok_or_else(|| Error::UnknownEngine(engine.to_string()))?;
        backend.apply_settings(&settings);

        if let Some(previous) = self.ab.remove(&slot) {
            previous.worker.stop();
        }
        let worker = SpeechWorker::spawn(Arc::from(backend), self.events_tx.clone())?;
        self.ab.insert(
            slot,
            AbSide {
                engine: engine.to_string(),
                worker,
            },
        );
        Ok(())
    }

    pub fn ab_engine(&self, slot: AbSlot) -> Option<&str> {
        self.ab.get(&slot).map(|side| side.engine.as_str())
    }

    pub fn speak_ab(&self, slot: AbSlot, text: &str, output: Option<PathBuf>) -> Result<()> {
        let side = self.ab.get(&slot).ok_or(Error::AbSlotEmpty(slot))?;
        side.worker.submit(SpeechRequest {
            text: text.to_string(),
            output,
            ssml: false,
        })
    }

    pub fn rate(&mut self, slot: AbSlot, score: u8) -> Result<()> {
        if !(1..=5).contains(&score) {
            return Err(Error::InvalidRating(score));
        }
        match slot {
            AbSlot::A => self.ratings.a = Some(score),
            AbSlot::B => self.ratings.b = Some(score),
        }
        Ok(())
    }

    pub fn ab_ratings(&self) -> &AbRatings {
        &self.ratings
    }

    /// Everything worth keeping from this session, ready for export.
    pub fn snapshot(&self, text: &str) -> ExportSnapshot {
        ExportSnapshot::new(
            self.current.clone(),
            self.current_settings(),
            text,
            self.ratings.clone(),
            self.favorites.clone(),
        )
    }
}
