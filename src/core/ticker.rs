//! Fixed-cadence driver for the offload engine.

use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::engine::TickReport;
use super::notifications::OffloadEvent;
use crate::context::AppContext;
use crate::logging::LogThrottle;

const PROGRESS_LOG_INTERVAL: Duration = Duration::from_millis(500);

pub struct Ticker {
    ctx: AppContext,
    throttle: LogThrottle,
}

impl Ticker {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            ctx,
            throttle: LogThrottle::new(PROGRESS_LOG_INTERVAL),
        }
    }

    /// Tick until `cancel` fires. Each tick advances the engine by the real time elapsed.
    pub async fn run(self, cancel: CancellationToken) {
        let period = self.ctx.config.tick_interval();
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(period_ms = period.as_millis() as u64, "Ticker started");
        let mut last = Instant::now();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let now = Instant::now();
                    self.tick_once(now - last).await;
                    last = now;
                }
            }
        }

        info!("Ticker stopped");
    }

    /// Advance once and publish completions.
    pub async fn tick_once(&self, elapsed: Duration) -> TickReport {
        let report = {
            let mut engine = self.ctx.engine.lock().await;
            let report = engine.tick(elapsed);

            if engine.active_count() > 0 && self.throttle.should_log() {
                for card in engine.cards().iter().filter(|c| c.status.is_active()) {
                    debug!(
                        card_id = %card.id,
                        status = %card.status,
                        progress = %format!("{:.1}", card.progress),
                        rate_mbps = %format!("{:.0}", card.transfer_rate_mbps),
                        "Offload progress"
                    );
                }
            }
            report
        };

        let events: Vec<OffloadEvent> = report
            .completed
            .iter()
            .map(|c| OffloadEvent::Completed {
                card_id: c.card_id.clone(),
                record: c.record.clone(),
            })
            .collect();
        self.ctx.publish(&events);

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::core::commands::Command;
    use crate::core::engine::NOMINAL_TICK;
    use crate::core::models::{CardStatus, VerificationMode};

    #[tokio::test]
    async fn completion_is_published_once() {
        let config = AppConfig {
            verification_mode: VerificationMode::Quick,
            ..AppConfig::default()
        };
        let ctx = AppContext::new(config);
        let mut rx = ctx.events.subscribe();
        let ticker = Ticker::new(ctx.clone());

        ctx.apply(Command::Start { id: "card-c".into() }).await.unwrap();
        assert!(matches!(rx.recv().await.unwrap(), OffloadEvent::Started { .. }));

        let mut completions = 0;
        for _ in 0..1000 {
            completions += ticker.tick_once(NOMINAL_TICK).await.completed.len();
        }
        assert_eq!(completions, 1);

        match rx.try_recv().unwrap() {
            OffloadEvent::Completed { card_id, record } => {
                assert_eq!(card_id, "card-c");
                assert_eq!(record.clip_count, 1);
            }
            other => panic!("expected completion, got {other:?}"),
        }
        assert!(rx.try_recv().is_err());

        let engine = ctx.engine.lock().await;
        assert_eq!(engine.card("card-c").unwrap().status, CardStatus::Completed);
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let config = AppConfig {
            tick_interval_ms: 5,
            ..AppConfig::default()
        };
        let ctx = AppContext::new(config);
        ctx.apply(Command::Start { id: "card-a".into() }).await.unwrap();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Ticker::new(ctx.clone()).run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        handle.await.unwrap();

        let engine = ctx.engine.lock().await;
        assert!(engine.card("card-a").unwrap().progress > 0.0);
    }
}
