//! RPC method handlers.
//!
//! Dispatches JSON-RPC method calls onto the engine's command API.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::AppContext;
use crate::core::clock::SystemClock;
use crate::core::commands::Command;
use crate::core::error::EngineError;
use crate::core::models::{Card, ClipMetadata, VerificationMode};
use crate::core::notifications::OffloadEvent;
use crate::core::report::{LogGenerator, LogRequest, ScriptNotes, generate_or_fallback};
use crate::core::transcode::{TranscodeError, TranscodeSettings};

use super::protocol::{Request, Response};

#[derive(Deserialize)]
struct CardParams {
    id: String,
}

#[derive(Deserialize)]
struct PathParams {
    id: String,
    path: String,
}

#[derive(Deserialize)]
struct SlotNameParams {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct HistoryParams {
    id: String,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct ModeParams {
    mode: VerificationMode,
}

#[derive(Deserialize)]
struct ReportParams {
    id: String,
    #[serde(default)]
    script: ScriptNotes,
}

#[derive(Deserialize)]
struct ClipParams {
    clip: String,
}

#[derive(Deserialize)]
struct LimitParams {
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeEstimate {
    pub clip: String,
    pub size_mb: u64,
}

/// Result of a card command: what it emitted and the card afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub events: Vec<OffloadEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<Card>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub version: String,
    pub uptime_secs: u64,
    pub active_cards: usize,
    pub verification_mode: VerificationMode,
    pub panel_locked: bool,
    pub tick_interval_ms: u64,
}

pub struct MethodHandler {
    ctx: AppContext,
    log_generator: Option<Arc<dyn LogGenerator>>,
}

impl MethodHandler {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            ctx,
            log_generator: None,
        }
    }

    pub fn with_log_generator(mut self, generator: Arc<dyn LogGenerator>) -> Self {
        self.log_generator = Some(generator);
        self
    }

    pub async fn handle(&self, request: Request) -> Response {
        let id = request.id.clone().unwrap_or(Value::Null);
        let params = request.params.unwrap_or(Value::Null);

        match request.method.as_str() {
            "daemon.status" => self.daemon_status(id).await,
            "cards.list" => self.cards_list(id).await,
            "cards.get" => self.cards_get(id, params).await,
            "cards.history" => self.cards_history(id, params).await,
            "cards.start" => self.card_command(id, params, |id| Command::Start { id }).await,
            "cards.pause" => self.card_command(id, params, |id| Command::Pause { id }).await,
            "cards.toggle_speed" => self.card_command(id, params, |id| Command::ToggleSpeed { id }).await,
            "cards.eject" => self.card_command(id, params, |id| Command::Eject { id }).await,
            "cards.mount" => self.card_command(id, params, |id| Command::Mount { id }).await,
            "cards.toggle_lock" => self.card_command(id, params, |id| Command::ToggleLock { id }).await,
            "cards.set_path" => match parse::<PathParams>(&id, params) {
                Ok(p) => self.run(id, Command::SetPath { id: p.id.clone(), path: p.path }, Some(p.id)).await,
                Err(resp) => resp,
            },
            "cards.set_slot_name" => match parse::<SlotNameParams>(&id, params) {
                Ok(p) => self.run(id, Command::SetSlotName { id: p.id.clone(), name: p.name }, Some(p.id)).await,
                Err(resp) => resp,
            },
            "cards.start_all" => self.run(id, Command::StartAll, None).await,
            "verification.get" => {
                let mode = self.ctx.engine.lock().await.verification_mode();
                Response::success(id, serde_json::json!({ "mode": mode }))
            }
            "verification.set" => match parse::<ModeParams>(&id, params) {
                Ok(p) => self.run(id, Command::SetVerificationMode { mode: p.mode }, None).await,
                Err(resp) => resp,
            },
            "panel.toggle_lock" => match self.ctx.apply(Command::TogglePanelLock).await {
                Ok(_) => {
                    let locked = self.ctx.engine.lock().await.panel_locked();
                    Response::success(id, serde_json::json!({ "locked": locked }))
                }
                Err(e) => Response::engine_error(id, &e),
            },
            "report.generate" => self.report_generate(id, params).await,
            "transcode.settings.get" => {
                let desk = self.ctx.transcode.lock().await;
                Response::success(id, desk.settings())
            }
            "transcode.settings.set" => self.transcode_settings_set(id, params).await,
            "transcode.estimate" => self.transcode_estimate(id, params).await,
            "transcode.render" => self.transcode_render(id, params).await,
            "transcode.history" => self.transcode_history(id, params).await,
            _ => Response::method_not_found(id, &request.method),
        }
    }

    async fn daemon_status(&self, id: Value) -> Response {
        let engine = self.ctx.engine.lock().await;
        Response::success(
            id,
            DaemonStatus {
                version: env!("CARGO_PKG_VERSION").to_string(),
                uptime_secs: self.ctx.started_at.elapsed().as_secs(),
                active_cards: engine.active_count(),
                verification_mode: engine.verification_mode(),
                panel_locked: engine.panel_locked(),
                tick_interval_ms: self.ctx.config.tick_interval_ms,
            },
        )
    }

    async fn cards_list(&self, id: Value) -> Response {
        let engine = self.ctx.engine.lock().await;
        Response::success(id, engine.cards())
    }

    async fn cards_get(&self, id: Value, params: Value) -> Response {
        let params = match parse::<CardParams>(&id, params) {
            Ok(p) => p,
            Err(resp) => return resp,
        };
        match self.snapshot(&params.id).await {
            Ok(card) => Response::success(id, card),
            Err(e) => Response::engine_error(id, &e),
        }
    }

    async fn cards_history(&self, id: Value, params: Value) -> Response {
        let params = match parse::<HistoryParams>(&id, params) {
            Ok(p) => p,
            Err(resp) => return resp,
        };
        match self.snapshot(&params.id).await {
            Ok(card) => {
                let limit = params.limit.unwrap_or(card.history.len());
                let records: Vec<_> = card.history.into_iter().take(limit).collect();
                Response::success(id, records)
            }
            Err(e) => Response::engine_error(id, &e),
        }
    }

    async fn card_command(&self, id: Value, params: Value, build: impl FnOnce(String) -> Command) -> Response {
        match parse::<CardParams>(&id, params) {
            Ok(p) => self.run(id, build(p.id.clone()), Some(p.id)).await,
            Err(resp) => resp,
        }
    }

    async fn run(&self, id: Value, command: Command, card_id: Option<String>) -> Response {
        let events = match self.ctx.apply(command).await {
            Ok(events) => events,
            Err(e) => return Response::engine_error(id, &e),
        };

        let card = match card_id {
            Some(card_id) => self.snapshot(&card_id).await.ok(),
            None => None,
        };
        Response::success(id, CommandResult { events, card })
    }

    async fn report_generate(&self, id: Value, params: Value) -> Response {
        let params = match parse::<ReportParams>(&id, params) {
            Ok(p) => p,
            Err(resp) => return resp,
        };
        let card = match self.snapshot(&params.id).await {
            Ok(card) => card,
            Err(e) => return Response::engine_error(id, &e),
        };

        let request = LogRequest {
            card_label: card.label,
            clips: card.clips,
            script: params.script,
        };
        let report =
            generate_or_fallback(self.log_generator.as_deref(), &request, &SystemClock).await;
        Response::success(id, report)
    }

    /// Merge the given fields over the current settings.
    async fn transcode_settings_set(&self, id: Value, params: Value) -> Response {
        let Value::Object(patch) = params else {
            return Response::invalid_params(id, "expected an object of settings fields");
        };

        let mut desk = self.ctx.transcode.lock().await;
        let mut merged = match serde_json::to_value(desk.settings()) {
            Ok(Value::Object(current)) => current,
            Ok(_) => return Response::internal_error(id, "settings did not serialize to an object"),
            Err(e) => return Response::internal_error(id, e.to_string()),
        };
        merged.extend(patch);

        match serde_json::from_value::<TranscodeSettings>(Value::Object(merged)) {
            Ok(settings) => {
                desk.update_settings(settings);
                Response::success(id, desk.settings())
            }
            Err(e) => Response::invalid_params(id, e.to_string()),
        }
    }

    async fn transcode_estimate(&self, id: Value, params: Value) -> Response {
        let params = match parse::<ClipParams>(&id, params) {
            Ok(p) => p,
            Err(resp) => return resp,
        };
        let clip = match self.find_clip(&params.clip).await {
            Ok(clip) => clip,
            Err(e) => return Response::transcode_error(id, &e),
        };

        let desk = self.ctx.transcode.lock().await;
        match desk.estimate(&clip) {
            Ok(size_mb) => Response::success(id, SizeEstimate { clip: clip.name, size_mb }),
            Err(e) => Response::transcode_error(id, &e),
        }
    }

    async fn transcode_render(&self, id: Value, params: Value) -> Response {
        let params = match parse::<ClipParams>(&id, params) {
            Ok(p) => p,
            Err(resp) => return resp,
        };
        let clip = match self.find_clip(&params.clip).await {
            Ok(clip) => clip,
            Err(e) => return Response::transcode_error(id, &e),
        };

        let mut desk = self.ctx.transcode.lock().await;
        match desk.render(&clip, &SystemClock) {
            Ok(record) => Response::success(id, record),
            Err(e) => Response::transcode_error(id, &e),
        }
    }

    async fn transcode_history(&self, id: Value, params: Value) -> Response {
        let limit = if params.is_null() {
            None
        } else {
            match parse::<LimitParams>(&id, params) {
                Ok(p) => p.limit,
                Err(resp) => return resp,
            }
        };
        let desk = self.ctx.transcode.lock().await;
        let history = desk.history();
        let records = &history[..limit.unwrap_or(history.len()).min(history.len())];
        Response::success(id, records)
    }

    /// Clip by file name, searched across every card in the deck.
    async fn find_clip(&self, name: &str) -> Result<ClipMetadata, TranscodeError> {
        let engine = self.ctx.engine.lock().await;
        engine
            .cards()
            .iter()
            .flat_map(|card| card.clips.iter())
            .find(|clip| clip.name == name)
            .cloned()
            .ok_or_else(|| TranscodeError::ClipNotFound(name.to_string()))
    }

    async fn snapshot(&self, card_id: &str) -> Result<Card, EngineError> {
        let engine = self.ctx.engine.lock().await;
        engine
            .card(card_id)
            .cloned()
            .ok_or_else(|| EngineError::CardNotFound(card_id.to_string()))
    }
}

fn parse<T: DeserializeOwned>(id: &Value, params: Value) -> Result<T, Response> {
    serde_json::from_value(params).map_err(|e| Response::invalid_params(id.clone(), e.to_string()))
}
