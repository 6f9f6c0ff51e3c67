//! Offload simulation engine.
//!
//! Owns the card collection and advances every mounted card one tick at a
//! time. Commands are transition primitives only; lock and busy policy is
//! applied by [`crate::core::commands`].

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::clock::{Clock, SystemClock, record_date, record_id};
use super::error::{EngineError, EngineResult};
use super::jitter::{Jitter, RandomJitter};
use super::models::{BackupRecord, Card, CardStatus, RecordStatus, SpeedMultiplier, VerificationMode};
use crate::config::SimulationConfig;

/// Tick period the configured step sizes are expressed in.
pub const NOMINAL_TICK: Duration = Duration::from_millis(50);

/// Everything a single card update depends on besides the card itself.
pub struct TickContext<'a> {
    pub sim: &'a SimulationConfig,
    pub verification_mode: VerificationMode,
    /// Elapsed time as a multiple of [`NOMINAL_TICK`].
    pub scale: f64,
}

impl<'a> TickContext<'a> {
    pub fn new(sim: &'a SimulationConfig, verification_mode: VerificationMode, elapsed: Duration) -> Self {
        Self {
            sim,
            verification_mode,
            scale: elapsed.as_secs_f64() / NOMINAL_TICK.as_secs_f64(),
        }
    }

    fn step(&self, card: &Card) -> f64 {
        let factor = card.speed_multiplier.factor();
        let per_tick = match card.status {
            CardStatus::Copying => self.sim.copy_step * factor,
            CardStatus::Resuming => self.sim.resume_step,
            CardStatus::Verifying => match self.verification_mode {
                VerificationMode::Quick => self.sim.quick_verify_step * factor,
                VerificationMode::Full => self.sim.full_verify_step * factor,
            },
            _ => 0.0,
        };
        per_tick * self.scale
    }

    fn rate(&self, card: &Card, jitter: &mut dyn Jitter) -> f64 {
        let base = self.sim.base_rate_mbps + jitter.sample(self.sim.rate_jitter_mbps);
        let rate = base.max(0.0) * card.speed_multiplier.factor();
        if card.status == CardStatus::Verifying {
            rate * self.sim.verify_rate_factor
        } else {
            rate
        }
    }
}

/// Result of advancing one card by one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Advance {
    pub card: Card,
    /// Set on the tick that moves the card into COMPLETED.
    pub completed: Option<BackupRecord>,
}

/// Advance a single card. Pure apart from the injected jitter and clock.
pub fn advance(card: &Card, ctx: &TickContext<'_>, jitter: &mut dyn Jitter, clock: &dyn Clock) -> Advance {
    let mut next = card.clone();

    if !card.is_mounted || !card.status.is_active() {
        next.transfer_rate_mbps = 0.0;
        return Advance { card: next, completed: None };
    }

    let rate = ctx.rate(card, jitter);
    let progress = card.progress + ctx.step(card);

    match card.status {
        CardStatus::Resuming => {
            let target = card.paused_progress.unwrap_or(0.0).clamp(0.0, 100.0);
            if progress >= target {
                next.status = CardStatus::Copying;
                next.progress = target;
                next.paused_progress = None;
                next.transfer_rate_mbps = rate;
                return Advance { card: next, completed: None };
            }
        }
        CardStatus::Copying if progress >= 100.0 => {
            next.status = CardStatus::Verifying;
            next.progress = 0.0;
            next.paused_progress = None;
            next.transfer_rate_mbps = rate;
            return Advance { card: next, completed: None };
        }
        CardStatus::Verifying if progress >= 100.0 => {
            let now = clock.now();
            let record = BackupRecord {
                id: record_id(now),
                date: record_date(now),
                card_label: card.label.clone(),
                total_size: card.total_size_label(),
                clip_count: card.clips.len(),
                destination: card.destination_path.clone(),
                status: RecordStatus::Success,
            };

            next.status = CardStatus::Completed;
            next.progress = 100.0;
            next.transfer_rate_mbps = 0.0;
            next.history.insert(0, record.clone());
            next.history.truncate(ctx.sim.history_limit);
            return Advance { card: next, completed: Some(record) };
        }
        _ => {}
    }

    next.progress = progress.clamp(0.0, 100.0);
    next.transfer_rate_mbps = rate;
    Advance { card: next, completed: None }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub card_id: String,
    pub record: BackupRecord,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub completed: Vec<Completion>,
    /// Cards whose status changed during the tick, with the new status.
    pub transitions: Vec<(String, CardStatus)>,
}

pub struct OffloadEngine {
    cards: Vec<Card>,
    verification_mode: VerificationMode,
    panel_locked: bool,
    sim: SimulationConfig,
    jitter: Box<dyn Jitter>,
    clock: Arc<dyn Clock>,
}

impl OffloadEngine {
    /// Seeded history beyond `sim.history_limit` is dropped, oldest first.
    pub fn new(mut cards: Vec<Card>, sim: SimulationConfig) -> Self {
        for card in &mut cards {
            if card.history.len() > sim.history_limit {
                debug!(card_id = %card.id, seeded = card.history.len(), "Trimming seeded history");
                card.history.truncate(sim.history_limit);
            }
        }
        Self {
            cards,
            verification_mode: VerificationMode::default(),
            panel_locked: false,
            sim,
            jitter: Box::new(RandomJitter),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_jitter(mut self, jitter: impl Jitter + 'static) -> Self {
        self.jitter = Box::new(jitter);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_verification_mode(mut self, mode: VerificationMode) -> Self {
        self.verification_mode = mode;
        self
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn card(&self, id: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == id)
    }

    pub fn verification_mode(&self) -> VerificationMode {
        self.verification_mode
    }

    pub fn panel_locked(&self) -> bool {
        self.panel_locked
    }

    pub fn active_count(&self) -> usize {
        self.cards
            .iter()
            .filter(|c| c.is_mounted && c.status.is_active())
            .count()
    }

    fn card_mut(&mut self, id: &str) -> EngineResult<&mut Card> {
        self.cards
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| EngineError::CardNotFound(id.to_string()))
    }

    /// Advance every card by `elapsed` of simulated time.
    pub fn tick(&mut self, elapsed: Duration) -> TickReport {
        let ctx = TickContext::new(&self.sim, self.verification_mode, elapsed);
        let mut report = TickReport::default();

        for card in self.cards.iter_mut() {
            let Advance { card: next, completed } =
                advance(card, &ctx, self.jitter.as_mut(), self.clock.as_ref());

            if next.status != card.status {
                debug!(card_id = %card.id, from = %card.status, to = %next.status, "Card transition");
                report.transitions.push((card.id.clone(), next.status));
            }
            if let Some(record) = completed {
                info!(
                    card_id = %card.id,
                    label = %card.label,
                    clips = record.clip_count,
                    destination = %record.destination,
                    "Offload verified and completed"
                );
                report.completed.push(Completion {
                    card_id: card.id.clone(),
                    record,
                });
            }
            *card = next;
        }

        report
    }

    /// One nominal tick.
    pub fn step(&mut self) -> TickReport {
        self.tick(NOMINAL_TICK)
    }

    /// Begin or resume a run. Returns whether the card changed state.
    ///
    /// PAUSED resumes through a catch-up phase; IDLE, COMPLETED and ERROR
    /// start a fresh run. Cards already running and unmounted cards are left alone.
    pub fn start(&mut self, id: &str) -> EngineResult<bool> {
        let card = self.card_mut(id)?;
        Ok(start_card(card))
    }

    pub fn pause(&mut self, id: &str) -> EngineResult<bool> {
        let card = self.card_mut(id)?;
        if !matches!(card.status, CardStatus::Copying | CardStatus::Resuming) {
            return Ok(false);
        }
        card.paused_progress = Some(card.progress);
        card.status = CardStatus::Paused;
        card.transfer_rate_mbps = 0.0;
        info!(card_id = %card.id, progress = card.progress, "Offload paused");
        Ok(true)
    }

    /// Start every mounted, unlocked card that is IDLE or PAUSED.
    pub fn start_all(&mut self) -> Vec<String> {
        self.cards
            .iter_mut()
            .filter(|c| matches!(c.status, CardStatus::Idle | CardStatus::Paused))
            .filter(|c| c.is_mounted && !c.is_locked)
            .filter_map(|c| start_card(c).then(|| c.id.clone()))
            .collect()
    }

    pub fn toggle_speed(&mut self, id: &str) -> EngineResult<SpeedMultiplier> {
        let card = self.card_mut(id)?;
        card.speed_multiplier = card.speed_multiplier.toggled();
        Ok(card.speed_multiplier)
    }

    /// Unmount the card, discarding any run in flight. Returns the status it had.
    pub fn eject(&mut self, id: &str) -> EngineResult<CardStatus> {
        let card = self.card_mut(id)?;
        let previous = card.status;
        card.is_mounted = false;
        card.status = CardStatus::Idle;
        card.progress = 0.0;
        card.paused_progress = None;
        card.transfer_rate_mbps = 0.0;
        info!(card_id = %card.id, previous = %previous, "Card ejected");
        Ok(previous)
    }

    /// Seat an unmounted card. Returns false for a card already in its reader,
    /// whose state (and any run in flight) is left alone.
    pub fn mount(&mut self, id: &str) -> EngineResult<bool> {
        let card = self.card_mut(id)?;
        if card.is_mounted {
            return Ok(false);
        }
        card.is_mounted = true;
        card.status = CardStatus::Idle;
        card.progress = 0.0;
        card.paused_progress = None;
        card.transfer_rate_mbps = 0.0;
        info!(card_id = %card.id, "Card mounted");
        Ok(true)
    }

    pub fn update_path(&mut self, id: &str, path: impl Into<String>) -> EngineResult<()> {
        self.card_mut(id)?.destination_path = path.into();
        Ok(())
    }

    pub fn update_slot_name(&mut self, id: &str, name: impl Into<String>) -> EngineResult<()> {
        self.card_mut(id)?.slot_label = name.into();
        Ok(())
    }

    /// Returns the new lock state.
    pub fn toggle_lock(&mut self, id: &str) -> EngineResult<bool> {
        let card = self.card_mut(id)?;
        card.is_locked = !card.is_locked;
        Ok(card.is_locked)
    }

    pub fn set_verification_mode(&mut self, mode: VerificationMode) {
        if mode != self.verification_mode {
            info!(mode = mode.as_str(), "Verification mode changed");
        }
        self.verification_mode = mode;
    }

    pub fn toggle_panel_lock(&mut self) -> bool {
        self.panel_locked = !self.panel_locked;
        self.panel_locked
    }
}

fn start_card(card: &mut Card) -> bool {
    if !card.is_mounted {
        return false;
    }
    match card.status {
        CardStatus::Paused => {
            card.status = CardStatus::Resuming;
            info!(card_id = %card.id, resume_at = ?card.paused_progress, "Offload resuming");
            true
        }
        CardStatus::Idle | CardStatus::Completed | CardStatus::Error => {
            card.status = CardStatus::Copying;
            card.progress = 0.0;
            card.paused_progress = Some(0.0);
            info!(card_id = %card.id, destination = %card.destination_path, "Offload started");
            true
        }
        CardStatus::Copying | CardStatus::Resuming | CardStatus::Verifying => false,
    }
}
