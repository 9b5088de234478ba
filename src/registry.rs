use crate::backends::espeak::{self, EspeakBackend};
use crate::backends::festival::{self, FestivalBackend};
use crate::backends::piper::{self, PiperBackend};
use crate::backends::SpeechBackend;
use crate::config_loader::AppConfig;
use serde::Serialize;
use std::sync::Arc;

/// Static identity of an engine variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EngineDescriptor {
    pub id: &'static str,
    pub display_name: &'static str,
}

type Constructor = fn(&AppConfig) -> Box<dyn SpeechBackend>;

fn new_espeak(config: &AppConfig) -> Box<dyn SpeechBackend> {
    Box::new(EspeakBackend::new(config))
}

fn new_piper(config: &AppConfig) -> Box<dyn SpeechBackend> {
    Box::new(PiperBackend::new(config))
}

fn new_festival(config: &AppConfig) -> Box<dyn SpeechBackend> {
    Box::new(FestivalBackend::new(config))
}

/// Known engines, in display order.
static ENGINES: [(EngineDescriptor, Constructor); 3] = [
    (espeak::DESCRIPTOR, new_espeak),
    (piper::DESCRIPTOR, new_piper),
    (festival::DESCRIPTOR, new_festival),
];

/// Lookup and construction of engine variants against one configuration.
#[derive(Clone)]
pub struct Registry {
    config: Arc<AppConfig>,
}

impl Registry {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// All known engines, installed or not.
    pub fn descriptors(&self) -> Vec<EngineDescriptor> {
        ENGINES.iter().map(|(descriptor, _)| *descriptor).collect()
    }

    pub fn descriptor(&self, id: &str) -> Option<EngineDescriptor> {
        ENGINES
            .iter()
            .find(|(descriptor, _)| descriptor.id == id)
            .map(|(descriptor, _)| *descriptor)
    }

    /// Engines whose program is installed, in registry order.
    pub fn detect_available(&self) -> Vec<EngineDescriptor> {
        ENGINES
            .iter()
            .filter(|(_, construct)| construct(&self.config).is_available())
            .map(|(descriptor, _)| *descriptor)
            .collect()
    }

    pub fn is_available(&self, id: &str) -> bool {
        self.construct(id).is_some_and(|engine| engine.is_available())
    }

    /// A fresh instance with default settings.
    pub fn construct(&self, id: &str) -> Option<Box<dyn SpeechBackend>> {
        ENGINES
            .iter()
            .find(|(descriptor, _)| descriptor.id == id)
            .map(|(_, construct)| construct(&self.config))
    }
}
