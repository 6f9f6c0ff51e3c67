use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, broadcast};

use crate::config::AppConfig;
use crate::core::commands::{self, Command};
use crate::core::deck;
use crate::core::engine::OffloadEngine;
use crate::core::error::EngineResult;
use crate::core::notifications::OffloadEvent;
use crate::core::transcode::TranscodeDesk;

pub type SharedEngine = Arc<Mutex<OffloadEngine>>;
pub type SharedDesk = Arc<Mutex<TranscodeDesk>>;

const EVENT_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub engine: SharedEngine,
    pub transcode: SharedDesk,
    pub events: broadcast::Sender<OffloadEvent>,
    pub started_at: Instant,
}

impl AppContext {
    /// Context with an engine seeded from the configured deck.
    pub fn new(config: AppConfig) -> Self {
        let engine = OffloadEngine::new(deck::load(&config.cards), config.simulation.clone())
            .with_verification_mode(config.verification_mode);
        Self::with_engine(config, engine)
    }

    pub fn with_engine(config: AppConfig, engine: OffloadEngine) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let desk = TranscodeDesk::new(config.transcode.history_limit);
        Self {
            config: Arc::new(config),
            engine: Arc::new(Mutex::new(engine)),
            transcode: Arc::new(Mutex::new(desk)),
            events,
            started_at: Instant::now(),
        }
    }

    /// Run a command against the engine and publish what it produced.
    pub async fn apply(&self, command: Command) -> EngineResult<Vec<OffloadEvent>> {
        let events = {
            let mut engine = self.engine.lock().await;
            commands::dispatch(&mut engine, command)?
        };
        self.publish(&events);
        Ok(events)
    }

    pub fn publish(&self, events: &[OffloadEvent]) {
        for event in events {
            // no subscribers is fine
            let _ = self.events.send(event.clone());
        }
    }
}
