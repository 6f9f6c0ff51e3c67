//! Interactive TUI for ditd.
//!
//! Shows the card deck with live progress and sends operator commands to the
//! daemon over RPC.

mod app;
mod input;
mod ui;

use std::io::{self, Stdout, stdout};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::{
    cursor::Show,
    event, execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};

use app::TuiApp;

/// Card progress is re-read at this rate, key presses or not.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

type DeckTerminal = Terminal<CrosstermBackend<Stdout>>;

/// Raw mode plus alternate screen for as long as it lives.
///
/// Dropping it puts the operator's shell back, including on early return
/// or panic out of the draw loop.
struct TerminalSession {
    terminal: DeckTerminal,
}

impl TerminalSession {
    fn enter() -> Result<Self> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        if let Err(e) = execute!(stdout(), EnterAlternateScreen) {
            leave();
            return Err(e).context("Failed to enter alternate screen");
        }
        match Terminal::new(CrosstermBackend::new(stdout())) {
            Ok(terminal) => Ok(Self { terminal }),
            Err(e) => {
                leave();
                Err(e).context("Failed to create terminal")
            }
        }
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        leave();
    }
}

/// Best effort; there is nowhere left to report a failure.
fn leave() {
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen, Show);
}

/// Run the TUI connected to the daemon at the given address.
pub async fn run(addr: SocketAddr) -> Result<()> {
    let mut session = TerminalSession::enter()?;
    let mut app = TuiApp::new(addr);
    run_app(&mut session.terminal, &mut app).await
}

async fn run_app(terminal: &mut DeckTerminal, app: &mut TuiApp) -> Result<()> {
    app.refresh().await;
    let mut last_refresh = Instant::now();

    while app.running {
        terminal.draw(|frame| ui::render(frame, app))?;

        if event::poll(input_wait(last_refresh.elapsed()))? {
            if let Some(action) = input::handle_event(event::read()?) {
                app.handle_action(action).await;
            }
        }

        // Steady typing must not freeze the progress bars.
        if refresh_due(last_refresh.elapsed()) {
            app.refresh_cards().await;
            last_refresh = Instant::now();
        }
    }

    Ok(())
}

/// How long to block on input before the next card refresh is due.
fn input_wait(since_refresh: Duration) -> Duration {
    POLL_INTERVAL.saturating_sub(since_refresh)
}

fn refresh_due(since_refresh: Duration) -> bool {
    since_refresh >= POLL_INTERVAL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_wait_shrinks_towards_next_refresh() {
        assert_eq!(input_wait(Duration::ZERO), POLL_INTERVAL);
        assert_eq!(input_wait(Duration::from_millis(100)), Duration::from_millis(150));
        assert_eq!(input_wait(Duration::from_secs(2)), Duration::ZERO);
    }

    #[test]
    fn refresh_runs_even_under_continuous_input() {
        assert!(!refresh_due(Duration::from_millis(249)));
        assert!(refresh_due(POLL_INTERVAL));
        assert!(refresh_due(Duration::from_secs(1)));
    }
}
