use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("card not found: {0}")]
    CardNotFound(String),

    #[error("card is locked: {0}")]
    CardLocked(String),

    #[error("card is busy: {0}")]
    CardBusy(String),

    #[error("control panel is locked")]
    PanelLocked,
}

pub type EngineResult<T> = Result<T, EngineError>;
