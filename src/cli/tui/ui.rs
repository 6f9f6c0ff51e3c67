//! UI rendering for the TUI.

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};

use crate::core::models::{BackupRecord, Card, CardStatus, RecordStatus, SpeedMultiplier};

use super::app::{TuiApp, View};

const RECENT_HISTORY: usize = 5;

/// Main render function - dispatches to view-specific renderers.
pub fn render(frame: &mut Frame, app: &TuiApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content
            Constraint::Length(3), // Footer/help
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);

    match &app.view {
        View::Deck => render_deck(frame, app, chunks[1]),
        View::Detail { .. } => render_detail(frame, app, chunks[1]),
    }

    render_footer(frame, app, chunks[2]);
}

fn render_header(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let title = match &app.data.daemon_status {
        Some(s) => {
            let lock = if s.panel_locked { "  [PANEL LOCKED]" } else { "" };
            format!(
                "DITD  v{}  Uptime: {}  Verify: {}  Active: {}{}",
                s.version,
                format_duration(s.uptime_secs),
                s.verification_mode.as_str(),
                s.active_cards,
                lock
            )
        }
        None => "DITD  (connecting...)".to_string(),
    };

    let border = match &app.data.daemon_status {
        Some(s) if s.panel_locked => Color::Red,
        _ => Color::Cyan,
    };

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border));

    frame.render_widget(block, area);
}

fn render_deck(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),                           // Cards
            Constraint::Length(RECENT_HISTORY as u16 + 2), // Recent history
        ])
        .split(area);

    render_cards(frame, app, chunks[0]);
    render_recent_history(frame, app, chunks[1]);
}

fn render_cards(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let block = Block::default()
        .title("Card Deck")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    if app.data.cards.is_empty() {
        let text = Paragraph::new("  No cards")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(text, area);
        return;
    }

    let items: Vec<ListItem> = app
        .data
        .cards
        .iter()
        .enumerate()
        .map(|(i, card)| {
            let is_selected = i == app.selected;
            let style = if is_selected {
                Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };

            let mut spans = vec![
                Span::raw(if is_selected { "> " } else { "  " }),
                Span::styled("■ ", Style::default().fg(card_color(card))),
                Span::raw(format!("{:<8} {:<16} ", card.slot_label, card.label)),
                status_span(card),
                Span::raw(format!(" {} {:>5.1}%", progress_bar(card.progress, 20), card.progress)),
            ];

            if card.status.is_active() {
                spans.push(Span::raw(format!("  {:>4.0} MB/s", card.transfer_rate_mbps)));
            }
            if card.speed_multiplier == SpeedMultiplier::Fast {
                spans.push(Span::styled("  5x", Style::default().fg(Color::Magenta)));
            }
            if card.is_locked {
                spans.push(Span::styled("  [locked]", Style::default().fg(Color::Red)));
            }

            ListItem::new(Line::from(spans)).style(style)
        })
        .collect();

    let list = List::new(items).block(block);
    frame.render_widget(list, area);
}

fn render_recent_history(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let card = app.selected_card();
    let title = match card {
        Some(card) => format!("Recent Backups: {}", card.label),
        None => "Recent Backups".to_string(),
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let lines: Vec<Line> = match card {
        Some(card) if !card.history.is_empty() => card
            .history
            .iter()
            .take(RECENT_HISTORY)
            .map(history_line)
            .collect(),
        _ => vec![Line::from(Span::styled(
            "  No backups yet",
            Style::default().fg(Color::DarkGray),
        ))],
    };

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_detail(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let block = Block::default()
        .title("Card Details")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let Some(card) = app.selected_card() else {
        let text = Paragraph::new("  Card not found")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(text, area);
        return;
    };

    let label = |text: &'static str| Span::styled(text, Style::default().fg(Color::Cyan));

    let mut lines = vec![
        Line::from(vec![label("  Label:       "), Span::raw(card.label.clone())]),
        Line::from(vec![label("  Slot:        "), Span::raw(card.slot_label.clone())]),
        Line::from(vec![label("  Capacity:    "), Span::raw(card.total_size_label())]),
        Line::from(vec![label("  Destination: "), Span::raw(card.destination_path.clone())]),
        Line::from(vec![label("  Status:      "), status_span(card)]),
        Line::from(""),
        section("  Clips"),
    ];

    for clip in &card.clips {
        lines.push(Line::from(format!(
            "  {:<16} {:>8}  {}  {}  {}",
            clip.name, clip.size, clip.duration, clip.resolution, clip.camera_model
        )));
    }

    lines.push(Line::from(""));
    lines.push(section("  Backup History"));

    if card.history.is_empty() {
        lines.push(Line::from(Span::styled("  No backups yet", Style::default().fg(Color::DarkGray))));
    }
    lines.extend(card.history.iter().map(history_line));

    let paragraph = Paragraph::new(lines).block(block);
    frame.render_widget(paragraph, area);
}

fn render_footer(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let help_text = match &app.view {
        View::Deck => {
            "[↑↓] Select  [Enter] Details  [s] Start  [p] Pause  [a] All  [f] Speed  [e] Eject  [m] Mount  [l] Lock  [v] Verify  [L] Panel  [q] Quit"
        }
        View::Detail { .. } => "[s] Start  [p] Pause  [e] Eject  [l] Lock  [Esc] Back  [q] Quit",
    };

    let mut spans = vec![Span::raw(format!("  {help_text}"))];

    if let Some(error) = &app.error {
        spans.push(Span::styled(format!("  Error: {error}"), Style::default().fg(Color::Red)));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let paragraph = Paragraph::new(Line::from(spans)).block(block);
    frame.render_widget(paragraph, area);
}

fn history_line(record: &BackupRecord) -> Line<'static> {
    let icon = match record.status {
        RecordStatus::Success => Span::styled("✓", Style::default().fg(Color::Green)),
        RecordStatus::Error => Span::styled("✗", Style::default().fg(Color::Red)),
    };
    Line::from(vec![
        Span::raw("  "),
        icon,
        Span::raw(format!(
            "  {}  {}  {} clips  {}",
            record.date, record.total_size, record.clip_count, record.destination
        )),
    ])
}

fn section(title: &'static str) -> Line<'static> {
    Line::from(Span::styled(
        title,
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
    ))
}

fn status_span(card: &Card) -> Span<'static> {
    let color = match card.status {
        CardStatus::Idle => Color::Gray,
        CardStatus::Copying | CardStatus::Resuming => Color::Green,
        CardStatus::Paused => Color::Yellow,
        CardStatus::Verifying => Color::Blue,
        CardStatus::Completed => Color::Cyan,
        CardStatus::Error => Color::Red,
    };
    let text = if card.is_mounted {
        format!("{:<10}", card.status.as_str())
    } else {
        format!("{:<10}", "EJECTED")
    };
    Span::styled(text, Style::default().fg(color))
}

fn card_color(card: &Card) -> Color {
    card.color.parse().unwrap_or(Color::White)
}

fn progress_bar(progress: f64, width: usize) -> String {
    let filled = ((progress.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    let filled = filled.min(width);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(width - filled))
}

fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{hours}h {mins}m")
    } else if mins > 0 {
        format!("{mins}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_bar_fills_proportionally() {
        assert_eq!(progress_bar(0.0, 4), "[░░░░]");
        assert_eq!(progress_bar(50.0, 4), "[██░░]");
        assert_eq!(progress_bar(150.0, 4), "[████]");
    }

    #[test]
    fn formats_uptime() {
        assert_eq!(format_duration(42), "42s");
        assert_eq!(format_duration(125), "2m 5s");
        assert_eq!(format_duration(3720), "1h 2m");
    }
}
