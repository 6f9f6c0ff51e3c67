//! TUI application state and logic.

use std::net::SocketAddr;

use serde::de::DeserializeOwned;

use crate::core::models::Card;
use crate::rpc::{ClientError, CommandResult, DaemonStatus, RpcClient};

/// Cached data fetched from the daemon via RPC.
#[derive(Debug, Default)]
pub struct AppData {
    pub daemon_status: Option<DaemonStatus>,
    pub cards: Vec<Card>,
}

/// Current view being displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    /// All slots with live progress.
    Deck,
    /// Clips and backup history of one card.
    Detail { card_id: String },
}

/// Actions that can be triggered by user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    Up,
    Down,
    Select,
    Back,
    Refresh,
    Start,
    Pause,
    StartAll,
    ToggleSpeed,
    Eject,
    Mount,
    ToggleLock,
    ToggleVerification,
    TogglePanelLock,
}

/// Main TUI application state.
pub struct TuiApp {
    client: RpcClient,
    pub view: View,
    pub selected: usize,
    pub data: AppData,
    pub running: bool,
    pub error: Option<String>,
}

impl TuiApp {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            client: RpcClient::new(addr),
            view: View::Deck,
            selected: 0,
            data: AppData::default(),
            running: true,
            error: None,
        }
    }

    /// Refresh daemon status and the card list.
    pub async fn refresh(&mut self) {
        self.error = None;

        match self.client.call_no_params::<DaemonStatus>("daemon.status").await {
            Ok(status) => self.data.daemon_status = Some(status),
            Err(e) => {
                self.error = Some(format!("Failed to connect: {e}"));
                return;
            }
        }

        self.refresh_cards().await;
    }

    /// Poll the card list. Polling failures are silent; the last snapshot stays up.
    pub async fn refresh_cards(&mut self) {
        if let Ok(cards) = self.client.call_no_params::<Vec<Card>>("cards.list").await {
            self.data.cards = cards;
            if self.selected >= self.data.cards.len() {
                self.selected = self.data.cards.len().saturating_sub(1);
            }
        }
    }

    pub fn selected_card(&self) -> Option<&Card> {
        match &self.view {
            View::Deck => self.data.cards.get(self.selected),
            View::Detail { card_id } => self.data.cards.iter().find(|c| &c.id == card_id),
        }
    }

    pub async fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.running = false,
            Action::Refresh => self.refresh().await,
            Action::Up => self.selected = self.selected.saturating_sub(1),
            Action::Down => {
                if self.selected + 1 < self.data.cards.len() {
                    self.selected += 1;
                }
            }
            Action::Select => {
                if let Some(card) = self.data.cards.get(self.selected) {
                    self.view = View::Detail {
                        card_id: card.id.clone(),
                    };
                }
            }
            Action::Back => self.view = View::Deck,
            Action::Start => self.card_command("cards.start").await,
            Action::Pause => self.card_command("cards.pause").await,
            Action::ToggleSpeed => self.card_command("cards.toggle_speed").await,
            Action::Eject => self.card_command("cards.eject").await,
            Action::Mount => self.card_command("cards.mount").await,
            Action::ToggleLock => self.card_command("cards.toggle_lock").await,
            Action::StartAll => {
                let result = self.client.call_no_params::<CommandResult>("cards.start_all").await;
                self.finish(result).await;
            }
            Action::TogglePanelLock => {
                let result = self.client.call_no_params::<serde_json::Value>("panel.toggle_lock").await;
                self.finish(result).await;
            }
            Action::ToggleVerification => {
                let Some(status) = &self.data.daemon_status else {
                    return;
                };
                let mode = status.verification_mode.toggled();
                let result = self
                    .client
                    .call::<CommandResult>("verification.set", Some(serde_json::json!({ "mode": mode })))
                    .await;
                self.finish(result).await;
            }
        }
    }

    async fn card_command(&mut self, method: &str) {
        let Some(id) = self.selected_card().map(|c| c.id.clone()) else {
            return;
        };
        let result = self.client.call_card::<CommandResult>(method, &id).await;
        self.finish(result).await;
    }

    async fn finish<T: DeserializeOwned>(&mut self, result: Result<T, ClientError>) {
        match result {
            Ok(_) => self.refresh().await,
            Err(e) => self.error = Some(e.to_string()),
        }
    }
}
