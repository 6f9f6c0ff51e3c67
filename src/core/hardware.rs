use tokio::sync::mpsc;

/// Reader-slot events, keyed by card id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Inserted(String),
    Removed(String),
}

impl DeviceEvent {
    pub fn card_id(&self) -> &str {
        match self {
            Self::Inserted(id) | Self::Removed(id) => id,
        }
    }
}

pub trait DeviceMonitor: Send + Sync {
    /// Start listening for reader events.
    /// Spawns internal tasks that send events to the provided channel.
    fn start(&self, event_sender: mpsc::Sender<DeviceEvent>);

    /// Stop the monitor. Events already queued are still delivered.
    fn stop(&self);

    /// Ids of the cards currently present in a reader.
    fn list_devices(&self) -> anyhow::Result<Vec<String>>;
}
