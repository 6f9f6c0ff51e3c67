use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex},
};

use crate::core::hardware::{DeviceEvent, DeviceMonitor};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

enum SimulatedCommand {
    Insert(String),
    Remove(String),
}

/// Handle for injecting reader events into a [`SimulatedMonitor`].
#[derive(Clone)]
pub struct Simulator {
    tx: mpsc::UnboundedSender<SimulatedCommand>,
}

impl Simulator {
    pub fn insert_card(&self, id: &str) {
        let _ = self.tx.send(SimulatedCommand::Insert(id.to_string()));
    }

    pub fn remove_card(&self, id: &str) {
        let _ = self.tx.send(SimulatedCommand::Remove(id.to_string()));
    }

    /// Parse one operator line: `mount <id>` or `eject <id>`.
    pub fn apply_line(&self, line: &str) -> bool {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            ["mount" | "insert", id] => self.insert_card(id),
            ["eject" | "remove", id] => self.remove_card(id),
            _ => return false,
        }
        true
    }
}

pub struct SimulatedMonitor {
    // Taken out of the mutex by `start()`, which only runs once.
    cmd_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<SimulatedCommand>>>>,
    present: Arc<Mutex<BTreeSet<String>>>,
    cancel: CancellationToken,
}

impl SimulatedMonitor {
    pub fn new() -> (Self, Simulator) {
        Self::with_present(std::iter::empty::<String>())
    }

    /// Monitor whose readers already hold `ids`.
    pub fn with_present<I, S>(ids: I) -> (Self, Simulator)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (tx, rx) = mpsc::unbounded_channel();

        (
            Self {
                cmd_rx: Arc::new(Mutex::new(Some(rx))),
                present: Arc::new(Mutex::new(ids.into_iter().map(Into::into).collect())),
                cancel: CancellationToken::new(),
            },
            Simulator { tx },
        )
    }
}

impl DeviceMonitor for SimulatedMonitor {
    fn start(&self, event_tx: mpsc::Sender<DeviceEvent>) {
        let rx = self.cmd_rx.lock().ok().and_then(|mut slot| slot.take());
        let Some(mut rx) = rx else {
            warn!("Simulated monitor already started");
            return;
        };

        let present = self.present.clone();
        let cancel = self.cancel.clone();
        debug!("Simulated monitor listening for injected events");

        tokio::spawn(async move {
            loop {
                let cmd = tokio::select! {
                    _ = cancel.cancelled() => break,
                    cmd = rx.recv() => match cmd {
                        Some(cmd) => cmd,
                        None => break,
                    },
                };

                let event = match cmd {
                    SimulatedCommand::Insert(id) => DeviceEvent::Inserted(id),
                    SimulatedCommand::Remove(id) => DeviceEvent::Removed(id),
                };

                if let Ok(mut set) = present.lock() {
                    match &event {
                        DeviceEvent::Inserted(id) => set.insert(id.clone()),
                        DeviceEvent::Removed(id) => set.remove(id),
                    };
                }

                if event_tx.send(event).await.is_err() {
                    break;
                }
            }
        });
    }

    fn stop(&self) {
        self.cancel.cancel();
    }

    fn list_devices(&self) -> anyhow::Result<Vec<String>> {
        let set = self
            .present
            .lock()
            .map_err(|_| anyhow::anyhow!("device list poisoned"))?;
        Ok(set.iter().cloned().collect())
    }
}
