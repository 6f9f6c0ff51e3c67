//! Operator commands and the lock policy that guards them.
//!
//! The engine exposes raw transitions; this layer refuses commands the
//! control surface would have disabled (locked card, locked panel, busy card)
//! and turns successful ones into notification events.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::engine::OffloadEngine;
use super::error::{EngineError, EngineResult};
use super::models::{Card, CardStatus, VerificationMode};
use super::notifications::OffloadEvent;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Start { id: String },
    Pause { id: String },
    StartAll,
    ToggleSpeed { id: String },
    Eject { id: String },
    Mount { id: String },
    SetPath { id: String, path: String },
    SetSlotName { id: String, name: String },
    ToggleLock { id: String },
    SetVerificationMode { mode: VerificationMode },
    TogglePanelLock,
}

impl Command {
    pub fn card_id(&self) -> Option<&str> {
        match self {
            Self::Start { id }
            | Self::Pause { id }
            | Self::ToggleSpeed { id }
            | Self::Eject { id }
            | Self::Mount { id }
            | Self::SetPath { id, .. }
            | Self::SetSlotName { id, .. }
            | Self::ToggleLock { id } => Some(id),
            Self::StartAll | Self::SetVerificationMode { .. } | Self::TogglePanelLock => None,
        }
    }

    /// Whether a per-card lock blocks this command.
    fn blocked_by_card_lock(&self) -> bool {
        matches!(
            self,
            Self::Start { .. }
                | Self::Pause { .. }
                | Self::ToggleSpeed { .. }
                | Self::Eject { .. }
                | Self::SetPath { .. }
                | Self::SetSlotName { .. }
        )
    }

    /// Unlocking the panel and seating an empty reader stay available under the panel lock.
    fn allowed_on_locked_panel(&self) -> bool {
        matches!(self, Self::TogglePanelLock | Self::Mount { .. })
    }

    /// Whether a card mid-run blocks this command.
    fn blocked_while_busy(&self) -> bool {
        matches!(self, Self::Eject { .. } | Self::SetPath { .. })
    }
}

fn check(engine: &OffloadEngine, command: &Command) -> EngineResult<()> {
    if engine.panel_locked() && !command.allowed_on_locked_panel() {
        return Err(EngineError::PanelLocked);
    }

    let Some(id) = command.card_id() else {
        return Ok(());
    };
    let card = engine
        .card(id)
        .ok_or_else(|| EngineError::CardNotFound(id.to_string()))?;

    if card.is_locked && command.blocked_by_card_lock() {
        return Err(EngineError::CardLocked(id.to_string()));
    }
    if card.is_busy() && command.blocked_while_busy() {
        return Err(EngineError::CardBusy(id.to_string()));
    }
    Ok(())
}

/// Apply `command` under the lock policy. Returns the events it produced.
pub fn dispatch(engine: &mut OffloadEngine, command: Command) -> EngineResult<Vec<OffloadEvent>> {
    check(engine, &command)?;
    debug!(?command, "Dispatching command");

    let events = match command {
        Command::Start { id } => {
            let resumed = status_of(engine, &id) == Some(CardStatus::Paused);
            if engine.start(&id)? {
                vec![started(card_of(engine, &id)?, resumed)]
            } else {
                Vec::new()
            }
        }
        Command::Pause { id } => {
            if engine.pause(&id)? {
                let card = card_of(engine, &id)?;
                vec![OffloadEvent::Paused {
                    card_id: card.id.clone(),
                    label: card.label.clone(),
                    progress: card.progress,
                }]
            } else {
                Vec::new()
            }
        }
        Command::StartAll => {
            let paused: Vec<String> = engine
                .cards()
                .iter()
                .filter(|c| c.status == CardStatus::Paused)
                .map(|c| c.id.clone())
                .collect();
            let ids = engine.start_all();
            ids.iter()
                .filter_map(|id| engine.card(id))
                .map(|card| started(card, paused.contains(&card.id)))
                .collect()
        }
        Command::ToggleSpeed { id } => {
            engine.toggle_speed(&id)?;
            Vec::new()
        }
        Command::Eject { id } => {
            let previous = engine.eject(&id)?;
            vec![ejected(card_of(engine, &id)?, previous)]
        }
        Command::Mount { id } => {
            if engine.mount(&id)? {
                vec![mounted(card_of(engine, &id)?)]
            } else {
                Vec::new()
            }
        }
        Command::SetPath { id, path } => {
            engine.update_path(&id, path)?;
            Vec::new()
        }
        Command::SetSlotName { id, name } => {
            engine.update_slot_name(&id, name)?;
            Vec::new()
        }
        Command::ToggleLock { id } => {
            engine.toggle_lock(&id)?;
            Vec::new()
        }
        Command::SetVerificationMode { mode } => {
            engine.set_verification_mode(mode);
            Vec::new()
        }
        Command::TogglePanelLock => {
            engine.toggle_panel_lock();
            Vec::new()
        }
    };

    Ok(events)
}

fn status_of(engine: &OffloadEngine, id: &str) -> Option<CardStatus> {
    engine.card(id).map(|c| c.status)
}

fn card_of<'a>(engine: &'a OffloadEngine, id: &str) -> EngineResult<&'a Card> {
    engine
        .card(id)
        .ok_or_else(|| EngineError::CardNotFound(id.to_string()))
}

fn started(card: &Card, resumed: bool) -> OffloadEvent {
    OffloadEvent::Started {
        card_id: card.id.clone(),
        label: card.label.clone(),
        resumed,
    }
}

pub fn mounted(card: &Card) -> OffloadEvent {
    OffloadEvent::Mounted {
        card_id: card.id.clone(),
        label: card.label.clone(),
    }
}

/// Event for a card that left the reader, by command or by device removal.
pub fn ejected(card: &Card, previous: CardStatus) -> OffloadEvent {
    let interrupted = matches!(
        previous,
        CardStatus::Copying | CardStatus::Resuming | CardStatus::Verifying | CardStatus::Paused
    )
    .then_some(previous);

    OffloadEvent::Ejected {
        card_id: card.id.clone(),
        label: card.label.clone(),
        interrupted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::core::deck;
    use crate::core::jitter::FixedJitter;

    fn engine() -> OffloadEngine {
        OffloadEngine::new(deck::load(&[]), SimulationConfig::default()).with_jitter(FixedJitter(0.0))
    }

    fn start(id: &str) -> Command {
        Command::Start { id: id.to_string() }
    }

    #[test]
    fn locked_card_rejects_start_but_can_be_unlocked() {
        let mut engine = engine();
        dispatch(&mut engine, Command::ToggleLock { id: "card-a".into() }).unwrap();

        assert_eq!(
            dispatch(&mut engine, start("card-a")),
            Err(EngineError::CardLocked("card-a".into()))
        );
        assert_eq!(engine.card("card-a").unwrap().status, CardStatus::Idle);

        dispatch(&mut engine, Command::ToggleLock { id: "card-a".into() }).unwrap();
        let events = dispatch(&mut engine, start("card-a")).unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], OffloadEvent::Started { resumed: false, .. }));
    }

    #[test]
    fn busy_card_rejects_path_edit_and_eject() {
        let mut engine = engine();
        dispatch(&mut engine, start("card-b")).unwrap();

        let edit = Command::SetPath {
            id: "card-b".into(),
            path: "/elsewhere".into(),
        };
        assert_eq!(
            dispatch(&mut engine, edit),
            Err(EngineError::CardBusy("card-b".into()))
        );
        assert_eq!(
            dispatch(&mut engine, Command::Eject { id: "card-b".into() }),
            Err(EngineError::CardBusy("card-b".into()))
        );
        assert!(engine.card("card-b").unwrap().is_mounted);
    }

    #[test]
    fn panel_lock_blocks_operator_commands() {
        let mut engine = engine();
        dispatch(&mut engine, Command::TogglePanelLock).unwrap();

        assert_eq!(dispatch(&mut engine, Command::StartAll), Err(EngineError::PanelLocked));
        assert_eq!(
            dispatch(
                &mut engine,
                Command::SetVerificationMode {
                    mode: VerificationMode::Quick
                }
            ),
            Err(EngineError::PanelLocked)
        );

        dispatch(&mut engine, Command::TogglePanelLock).unwrap();
        assert_eq!(dispatch(&mut engine, Command::StartAll).unwrap().len(), 3);
    }

    #[test]
    fn locked_panel_still_mounts_empty_reader() {
        let mut engine = engine();
        dispatch(&mut engine, Command::Eject { id: "card-b".into() }).unwrap();
        dispatch(&mut engine, Command::TogglePanelLock).unwrap();

        assert_eq!(
            dispatch(&mut engine, Command::Eject { id: "card-c".into() }),
            Err(EngineError::PanelLocked)
        );
        let events = dispatch(&mut engine, Command::Mount { id: "card-b".into() }).unwrap();
        assert!(matches!(&events[0], OffloadEvent::Mounted { .. }));
        assert!(engine.card("card-b").unwrap().is_mounted);
    }

    #[test]
    fn pause_then_start_reports_resume() {
        let mut engine = engine();
        dispatch(&mut engine, start("card-c")).unwrap();
        engine.step();

        let paused = dispatch(&mut engine, Command::Pause { id: "card-c".into() }).unwrap();
        assert!(matches!(&paused[0], OffloadEvent::Paused { .. }));

        let resumed = dispatch(&mut engine, start("card-c")).unwrap();
        assert!(matches!(&resumed[0], OffloadEvent::Started { resumed: true, .. }));
    }

    #[test]
    fn idle_eject_carries_no_interruption() {
        let mut engine = engine();
        let events = dispatch(&mut engine, Command::Eject { id: "card-c".into() }).unwrap();
        assert_eq!(
            events,
            vec![OffloadEvent::Ejected {
                card_id: "card-c".into(),
                label: "Mag C (Amber)".into(),
                interrupted: None,
            }]
        );

        let events = dispatch(&mut engine, Command::Mount { id: "card-c".into() }).unwrap();
        assert!(matches!(&events[0], OffloadEvent::Mounted { .. }));
    }

    #[test]
    fn mount_on_running_card_is_silent_noop() {
        let mut engine = engine();
        dispatch(&mut engine, start("card-a")).unwrap();
        for _ in 0..200 {
            engine.step();
        }
        let progress = engine.card("card-a").unwrap().progress;

        let events = dispatch(&mut engine, Command::Mount { id: "card-a".into() }).unwrap();

        assert!(events.is_empty());
        let card = engine.card("card-a").unwrap();
        assert_eq!(card.status, CardStatus::Copying);
        assert_eq!(card.progress, progress);
    }

    #[test]
    fn unknown_card_is_reported() {
        let mut engine = engine();
        assert_eq!(
            dispatch(&mut engine, start("card-z")),
            Err(EngineError::CardNotFound("card-z".into()))
        );
    }
}
