//! TUI rendering with ratatui
//!
//! Status bar, the two buttons, the outcome log and a help bar.

use common::ReplacementPolicy;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use std::time::Duration;

use super::app::{App, Button, Dialog, Severity};

/// Main render function
pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Status bar
            Constraint::Length(5), // Buttons
            Constraint::Min(5),    // Outcome log
            Constraint::Length(3), // Help bar
        ])
        .split(frame.area());

    render_status_bar(frame, app, chunks[0]);
    render_buttons(frame, app, chunks[1]);
    render_outcomes(frame, app, chunks[2]);
    render_help_bar(frame, chunks[3]);

    if app.dialog() == &Dialog::Help {
        render_help_dialog(frame);
    }
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let policy_style = match app.policy() {
        ReplacementPolicy::Replace => Style::default().fg(Color::Yellow),
        ReplacementPolicy::Cancel => Style::default().fg(Color::Green),
    };
    let policy = match app.policy() {
        ReplacementPolicy::Replace => "replace",
        ReplacementPolicy::Cancel => "cancel",
    };

    let status_text = vec![
        Span::styled("Extension: ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.identifier().to_string(), Style::default().fg(Color::Cyan)),
        Span::raw("  |  "),
        Span::styled("Backend: ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.backend(), Style::default().fg(Color::White)),
        Span::raw("  |  "),
        Span::styled("On replace: ", Style::default().fg(Color::DarkGray)),
        Span::styled(policy, policy_style),
    ];

    let status = Paragraph::new(Line::from(status_text))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Virtual USB Driver Installer ")
                .title_alignment(Alignment::Center)
                .border_style(Style::default().fg(Color::Blue)),
        )
        .alignment(Alignment::Center);

    frame.render_widget(status, area);
}

fn render_buttons(frame: &mut Frame, app: &App, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(20),
            Constraint::Percentage(30),
            Constraint::Percentage(30),
            Constraint::Percentage(20),
        ])
        .split(area);

    for (button, column) in [(Button::Install, columns[1]), (Button::Uninstall, columns[2])] {
        let focused = app.selected() == button;
        let (border, label) = if focused {
            (
                Style::default().fg(Color::Yellow),
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        } else {
            (
                Style::default().fg(Color::DarkGray),
                Style::default().fg(Color::White),
            )
        };

        let widget = Paragraph::new(Line::from(Span::styled(
            format!(" {} ", button.label()),
            label,
        )))
        .block(Block::default().borders(Borders::ALL).border_style(border))
        .alignment(Alignment::Center);

        frame.render_widget(widget, centered_row(column));
    }
}

fn render_outcomes(frame: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .outcomes()
        .map(|outcome| {
            let style = match outcome.severity {
                Severity::Info => Style::default().fg(Color::White),
                Severity::Warning => Style::default().fg(Color::Yellow),
                Severity::Error => Style::default().fg(Color::Red),
                Severity::Success => Style::default().fg(Color::Green),
            };
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("[{:>6}] ", format_elapsed(outcome.at)),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(outcome.text.clone(), style),
            ]))
        })
        .collect();

    // Keep the newest lines visible
    let visible = area.height.saturating_sub(2) as usize;
    let skip = items.len().saturating_sub(visible);
    let items: Vec<ListItem> = items.into_iter().skip(skip).collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Outcomes ")
            .border_style(Style::default().fg(Color::Blue)),
    );

    frame.render_widget(list, area);
}

fn render_help_bar(frame: &mut Frame, area: Rect) {
    let key = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);

    let help_text = vec![
        Span::styled("q", key),
        Span::raw(" Quit  "),
        Span::styled("←/→", key),
        Span::raw(" Select  "),
        Span::styled("Enter", key),
        Span::raw(" Press  "),
        Span::styled("i", key),
        Span::raw(" Install  "),
        Span::styled("u", key),
        Span::raw(" Uninstall  "),
        Span::styled("c", key),
        Span::raw(" Clear  "),
        Span::styled("?", key),
        Span::raw(" Help"),
    ];

    let help = Paragraph::new(Line::from(help_text))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        )
        .alignment(Alignment::Center);

    frame.render_widget(help, area);
}

fn render_help_dialog(frame: &mut Frame) {
    let area = centered_rect(60, 60, frame.area());
    let key = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);

    let bindings = [
        ("Enter / Space", "Press the focused button"),
        ("←/→ Tab", "Move focus"),
        ("i", "Install (activate) the dext"),
        ("u", "Uninstall (deactivate) the dext"),
        ("c", "Clear outcomes"),
        ("q / Ctrl+C", "Quit"),
    ];

    let mut lines: Vec<Line> = bindings
        .iter()
        .map(|(keys, description)| {
            Line::from(vec![
                Span::styled(format!("{:<15}", keys), key),
                Span::raw(*description),
            ])
        })
        .collect();
    lines.extend([
        Line::from(""),
        Line::from(Span::styled(
            "Activation may ask for approval in System Settings > Privacy & Security. \
             The outcome appears here once macOS reports it.",
            Style::default().fg(Color::DarkGray),
        )),
    ]);

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Help ")
                .title_alignment(Alignment::Center)
                .border_style(Style::default().fg(Color::Yellow)),
        )
        .wrap(Wrap { trim: true });

    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

/// Vertically center a 3-line button inside its column
fn centered_row(r: Rect) -> Rect {
    let height = 3.min(r.height);
    Rect {
        x: r.x,
        y: r.y + (r.height - height) / 2,
        width: r.width,
        height,
    }
}

/// Helper to create a centered rectangle
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Format time since start for the outcome log
fn format_elapsed(duration: Duration) -> String {
    let secs = duration.as_secs();
    let mins = secs / 60;
    let secs = secs % 60;

    if mins > 0 {
        format!("{}m{:02}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::ExtensionIdentifier;
    use ratatui::{Terminal, backend::TestBackend};

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_secs(7)), "7s");
        assert_eq!(format_elapsed(Duration::from_secs(125)), "2m05s");
    }

    #[test]
    fn test_centered_row() {
        let row = centered_row(Rect::new(0, 10, 30, 5));
        assert_eq!(row.height, 3);
        assert_eq!(row.y, 11);

        let short = centered_row(Rect::new(0, 0, 30, 2));
        assert_eq!(short.height, 2);
        assert_eq!(short.y, 0);
    }

    #[test]
    fn test_centered_rect() {
        let area = Rect::new(0, 0, 100, 50);
        let centered = centered_rect(50, 50, area);

        assert!(centered.x > 0);
        assert!(centered.y > 0);
        assert!(centered.width < 100);
        assert!(centered.height < 50);
    }

    #[test]
    fn test_render_shows_both_buttons() {
        let app = App::new(
            ExtensionIdentifier::default(),
            "mock",
            ReplacementPolicy::Replace,
        );
        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal.draw(|frame| render(frame, &app)).unwrap();

        let buffer = terminal.backend().buffer();
        let text: String = buffer.content().iter().map(|cell| cell.symbol()).collect();
        assert!(text.contains("Install Dext"));
        assert!(text.contains("Uninstall Dext"));
        assert!(text.contains("id.bulwark.VirtualUSBDriver.driver"));
    }

    #[test]
    fn test_render_help_dialog_lists_bindings() {
        let mut app = App::new(
            ExtensionIdentifier::default(),
            "mock",
            ReplacementPolicy::Replace,
        );
        app.handle_action(crate::tui::events::Action::ShowHelp);

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|frame| render(frame, &app)).unwrap();

        let buffer = terminal.backend().buffer();
        let text: String = buffer.content().iter().map(|cell| cell.symbol()).collect();
        assert!(text.contains("Move focus"));
        assert!(text.contains("Uninstall (deactivate) the dext"));
    }
}
