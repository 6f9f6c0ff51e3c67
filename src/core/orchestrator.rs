use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::AppContext;
use crate::core::commands::{ejected, mounted};
use crate::core::error::{EngineError, EngineResult};
use crate::core::hardware::{DeviceEvent, DeviceMonitor};
use crate::core::notifications::{self, OffloadEvent};
use crate::core::ticker::Ticker;
use crate::rpc::RpcServer;
use anyhow::Result;

pub struct Orchestrator {
    ctx: AppContext,
    monitor: Box<dyn DeviceMonitor>,
}

impl Orchestrator {
    pub fn new(ctx: AppContext, monitor: Box<dyn DeviceMonitor>) -> Self {
        Self { ctx, monitor }
    }

    /// Run the daemon until ctrl-c.
    pub async fn start(&self) -> Result<()> {
        let cards = self.ctx.engine.lock().await.cards().len();
        info!(
            cards,
            verification = self.ctx.config.verification_mode.as_str(),
            "ditd starting"
        );

        let cancel = CancellationToken::new();
        let mut tasks: Vec<JoinHandle<()>> = Vec::new();

        tasks.push(tokio::spawn(
            Ticker::new(self.ctx.clone()).run(cancel.clone()),
        ));

        if let Some(channel) = notifications::create_notifier(&self.ctx.config.notifications) {
            let rx = self.ctx.events.subscribe();
            tasks.push(tokio::spawn(notifications::forward(rx, channel, cancel.clone())));
        }

        let rpc = RpcServer::new(self.ctx.clone(), self.ctx.config.rpc_bind);
        let rpc_cancel = cancel.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = rpc.start(rpc_cancel).await {
                warn!(error = %e, "RPC server stopped");
            }
        }));

        let (tx, mut rx) = mpsc::channel(32);
        self.monitor.start(tx);

        let mut devices_open = true;
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown requested");
                    break;
                }
                event = rx.recv(), if devices_open => match event {
                    Some(event) => self.handle_device_event(event).await,
                    None => {
                        debug!("Device monitor closed, no further reader events");
                        devices_open = false;
                    }
                },
            }
        }

        self.monitor.stop();
        cancel.cancel();
        for task in tasks {
            let _ = task.await;
        }

        info!("ditd stopped");
        Ok(())
    }

    /// Physical insertion and removal bypass the operator lock policy.
    pub async fn handle_device_event(&self, event: DeviceEvent) {
        let result = match &event {
            DeviceEvent::Inserted(id) => self.handle_inserted(id).await,
            DeviceEvent::Removed(id) => self.handle_removed(id).await.map(Some),
        };

        match result {
            Ok(Some(event)) => self.ctx.publish(&[event]),
            Ok(None) => debug!(card_id = %event.card_id(), "Card already seated, insertion ignored"),
            Err(e) => warn!(card_id = %event.card_id(), error = %e, "Ignoring device event"),
        }
    }

    async fn handle_inserted(&self, id: &str) -> EngineResult<Option<OffloadEvent>> {
        let mut engine = self.ctx.engine.lock().await;
        if !engine.mount(id)? {
            return Ok(None);
        }
        let card = engine
            .card(id)
            .ok_or_else(|| EngineError::CardNotFound(id.to_string()))?;
        Ok(Some(mounted(card)))
    }

    async fn handle_removed(&self, id: &str) -> EngineResult<OffloadEvent> {
        let mut engine = self.ctx.engine.lock().await;
        let previous = engine.eject(id)?;
        let card = engine
            .card(id)
            .ok_or_else(|| EngineError::CardNotFound(id.to_string()))?;
        let event = ejected(card, previous);

        if let OffloadEvent::Ejected {
            interrupted: Some(status),
            ..
        } = &event
        {
            warn!(card_id = %id, interrupted = %status, "Card removed mid-run, progress discarded");
        }
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SimulatedMonitor;
    use crate::config::AppConfig;
    use crate::core::commands::Command;
    use crate::core::models::CardStatus;

    fn orchestrator() -> (Orchestrator, AppContext) {
        let ctx = AppContext::new(AppConfig::default());
        let (monitor, _sim) = SimulatedMonitor::new();
        (Orchestrator::new(ctx.clone(), Box::new(monitor)), ctx)
    }

    #[tokio::test]
    async fn removal_mid_run_resets_card_and_flags_interruption() {
        let (orch, ctx) = orchestrator();
        ctx.apply(Command::Start { id: "card-a".into() }).await.unwrap();
        let mut rx = ctx.events.subscribe();

        orch.handle_device_event(DeviceEvent::Removed("card-a".into()))
            .await;

        match rx.recv().await.unwrap() {
            OffloadEvent::Ejected { interrupted, .. } => {
                assert_eq!(interrupted, Some(CardStatus::Copying))
            }
            other => panic!("unexpected {other:?}"),
        }
        let engine = ctx.engine.lock().await;
        let card = engine.card("card-a").unwrap();
        assert!(!card.is_mounted);
        assert_eq!(card.status, CardStatus::Idle);
    }

    #[tokio::test]
    async fn insertion_mounts_card() {
        let (orch, ctx) = orchestrator();
        ctx.engine.lock().await.eject("card-b").unwrap();

        orch.handle_device_event(DeviceEvent::Inserted("card-b".into()))
            .await;

        assert!(ctx.engine.lock().await.card("card-b").unwrap().is_mounted);
    }

    #[tokio::test]
    async fn repeated_insertion_leaves_running_card_alone() {
        let (orch, ctx) = orchestrator();
        ctx.apply(Command::Start { id: "card-a".into() }).await.unwrap();
        for _ in 0..200 {
            ctx.engine.lock().await.step();
        }
        let mut rx = ctx.events.subscribe();

        orch.handle_device_event(DeviceEvent::Inserted("card-a".into()))
            .await;

        assert!(rx.try_recv().is_err());
        let engine = ctx.engine.lock().await;
        let card = engine.card("card-a").unwrap();
        assert_eq!(card.status, CardStatus::Copying);
        assert!(card.progress > 0.0);
    }

    #[tokio::test]
    async fn unknown_device_is_ignored() {
        let (orch, ctx) = orchestrator();
        let mut rx = ctx.events.subscribe();
        orch.handle_device_event(DeviceEvent::Inserted("card-q".into()))
            .await;
        assert!(rx.try_recv().is_err());
    }
}
