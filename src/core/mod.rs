pub mod clock;
pub mod commands;
pub mod deck;
pub mod engine;
pub mod error;
pub mod hardware;
pub mod jitter;
pub mod models;
pub mod notifications;
pub mod orchestrator;
pub mod report;
pub mod ticker;
pub mod transcode;

pub use commands::{Command, dispatch};
pub use engine::{OffloadEngine, TickReport};
pub use error::{EngineError, EngineResult};
pub use hardware::{DeviceEvent, DeviceMonitor};
pub use models::{BackupRecord, Card, CardStatus, ClipMetadata, SpeedMultiplier, VerificationMode};
pub use orchestrator::Orchestrator;
pub use ticker::Ticker;
pub use transcode::{TranscodeDesk, TranscodeError, TranscodeRecord, TranscodeSettings};
