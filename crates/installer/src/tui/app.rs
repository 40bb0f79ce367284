//! TUI application state
//!
//! Holds the two-button state and the outcome log, and the terminal
//! wrapper used to draw it. The app itself never talks to the OS; pressing
//! a button only queues a request kind for the main loop to submit.

use anyhow::Result;
use common::ReplacementPolicy;
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use protocol::{ExtensionEvent, ExtensionIdentifier, ExtensionRequest, RequestKind};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::collections::VecDeque;
use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use super::events::Action;
use super::ui;

/// Maximum number of outcome lines kept for display
const MAX_OUTCOMES: usize = 200;

/// The two buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Install,
    Uninstall,
}

impl Button {
    pub fn label(&self) -> &'static str {
        match self {
            Button::Install => "Install Dext",
            Button::Uninstall => "Uninstall Dext",
        }
    }

    fn kind(&self) -> RequestKind {
        match self {
            Button::Install => RequestKind::Activate,
            Button::Uninstall => RequestKind::Deactivate,
        }
    }

    fn other(&self) -> Self {
        match self {
            Button::Install => Button::Uninstall,
            Button::Uninstall => Button::Install,
        }
    }
}

/// Current dialog/popup being displayed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialog {
    /// No dialog open
    None,
    /// Help dialog showing keybindings
    Help,
}

/// Severity of an outcome line, used for coloring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Success,
}

/// One line in the outcome log
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Time since the app started
    pub at: Duration,
    pub severity: Severity,
    pub text: String,
}

/// Application state
pub struct App {
    identifier: ExtensionIdentifier,
    backend: &'static str,
    policy: ReplacementPolicy,
    selected: Button,
    dialog: Dialog,
    should_quit: bool,
    start_time: Instant,
    /// Request kind queued by a button press, submitted by the main loop
    pending: Option<RequestKind>,
    outcomes: VecDeque<Outcome>,
}

impl App {
    /// Create a new application instance
    pub fn new(
        identifier: ExtensionIdentifier,
        backend: &'static str,
        policy: ReplacementPolicy,
    ) -> Self {
        Self {
            identifier,
            backend,
            policy,
            selected: Button::Install,
            dialog: Dialog::None,
            should_quit: false,
            start_time: Instant::now(),
            pending: None,
            outcomes: VecDeque::new(),
        }
    }

    pub fn identifier(&self) -> &ExtensionIdentifier {
        &self.identifier
    }

    pub fn backend(&self) -> &'static str {
        self.backend
    }

    pub fn policy(&self) -> ReplacementPolicy {
        self.policy
    }

    pub fn selected(&self) -> Button {
        self.selected
    }

    pub fn dialog(&self) -> &Dialog {
        &self.dialog
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Outcome lines, oldest first
    pub fn outcomes(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter()
    }

    /// Take the request kind queued by the last button press
    pub fn take_pending(&mut self) -> Option<RequestKind> {
        self.pending.take()
    }

    /// Handle user action
    pub fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => {
                if self.dialog != Dialog::None {
                    self.dialog = Dialog::None;
                } else {
                    self.should_quit = true;
                }
            }
            Action::CloseDialog => {
                self.dialog = Dialog::None;
            }
            Action::Previous | Action::Next => {
                if self.dialog == Dialog::None {
                    self.selected = self.selected.other();
                }
            }
            Action::Press => {
                if self.dialog == Dialog::None {
                    self.press(self.selected);
                }
            }
            Action::Install => {
                if self.dialog == Dialog::None {
                    self.press(Button::Install);
                }
            }
            Action::Uninstall => {
                if self.dialog == Dialog::None {
                    self.press(Button::Uninstall);
                }
            }
            Action::ClearLog => {
                self.outcomes.clear();
            }
            Action::ShowHelp => {
                self.dialog = Dialog::Help;
            }
            Action::None => {}
        }
    }

    fn press(&mut self, button: Button) {
        self.selected = button;
        self.pending = Some(button.kind());
    }

    /// Record the result of handing a request to the manager
    pub fn record_submission(
        &mut self,
        kind: RequestKind,
        result: &common::Result<ExtensionRequest>,
    ) {
        match result {
            Ok(request) => self.push(
                Severity::Info,
                format!("{}: submitted {} request", request.id, request.kind),
            ),
            Err(e) => self.push(
                Severity::Error,
                format!("Could not submit {} request: {}", kind, e),
            ),
        }
    }

    /// Record a callback from the OS
    pub fn handle_extension_event(&mut self, event: &ExtensionEvent) {
        let (severity, text) = match event {
            ExtensionEvent::ReplacementNeeded {
                request,
                existing,
                replacement,
                action,
            } => (
                Severity::Warning,
                format!(
                    "{}: replacement needed, {} -> {}; answered {}",
                    request.id,
                    existing.bundle_short_version,
                    replacement.bundle_short_version,
                    action
                ),
            ),
            ExtensionEvent::ApprovalNeeded { request } => (
                Severity::Warning,
                format!(
                    "{}: approval needed in System Settings > Privacy & Security",
                    request.id
                ),
            ),
            ExtensionEvent::Finished { request, result } => (
                Severity::Success,
                format!("{}: {} finished: {}", request.id, request.kind, result),
            ),
            ExtensionEvent::Failed { request, failure } => (
                Severity::Error,
                format!(
                    "{}: {} failed: {}",
                    request.id, request.kind, failure.description
                ),
            ),
        };
        self.push(severity, text);
    }

    fn push(&mut self, severity: Severity, text: String) {
        if self.outcomes.len() == MAX_OUTCOMES {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(Outcome {
            at: self.start_time.elapsed(),
            severity,
            text,
        });
    }
}

/// Terminal wrapper for setup/teardown
pub struct Tui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl Tui {
    /// Create and initialize the terminal
    pub fn new() -> Result<Self> {
        let backend = CrosstermBackend::new(io::stdout());
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }

    /// Enter TUI mode (raw mode, alternate screen)
    pub fn enter(&mut self) -> Result<()> {
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen)?;
        self.terminal.hide_cursor()?;
        self.terminal.clear()?;
        Ok(())
    }

    /// Exit TUI mode (restore terminal state)
    pub fn exit(&mut self) -> Result<()> {
        disable_raw_mode()?;
        execute!(io::stdout(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }

    /// Draw the UI
    pub fn draw(&mut self, app: &App) -> Result<()> {
        self.terminal.draw(|frame| {
            ui::render(frame, app);
        })?;
        Ok(())
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        // Best effort cleanup
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::test_utils::{create_mock_failure, create_mock_properties};
    use protocol::{ReplacementAction, RequestId, RequestResult};

    fn app() -> App {
        App::new(
            ExtensionIdentifier::default(),
            "mock",
            ReplacementPolicy::Replace,
        )
    }

    fn request(kind: RequestKind) -> ExtensionRequest {
        ExtensionRequest::new(RequestId(1), kind, ExtensionIdentifier::default())
    }

    #[test]
    fn test_focus_toggles_between_buttons() {
        let mut app = app();
        assert_eq!(app.selected(), Button::Install);

        app.handle_action(Action::Next);
        assert_eq!(app.selected(), Button::Uninstall);

        app.handle_action(Action::Next);
        assert_eq!(app.selected(), Button::Install);

        app.handle_action(Action::Previous);
        assert_eq!(app.selected(), Button::Uninstall);
    }

    #[test]
    fn test_press_queues_one_request() {
        let mut app = app();

        app.handle_action(Action::Press);
        assert_eq!(app.take_pending(), Some(RequestKind::Activate));
        assert_eq!(app.take_pending(), None);

        app.handle_action(Action::Next);
        app.handle_action(Action::Press);
        assert_eq!(app.take_pending(), Some(RequestKind::Deactivate));
    }

    #[test]
    fn test_shortcuts_select_and_queue() {
        let mut app = app();

        app.handle_action(Action::Uninstall);
        assert_eq!(app.selected(), Button::Uninstall);
        assert_eq!(app.take_pending(), Some(RequestKind::Deactivate));

        app.handle_action(Action::Install);
        assert_eq!(app.selected(), Button::Install);
        assert_eq!(app.take_pending(), Some(RequestKind::Activate));
    }

    #[test]
    fn test_buttons_inactive_under_dialog() {
        let mut app = app();

        app.handle_action(Action::ShowHelp);
        assert_eq!(app.dialog(), &Dialog::Help);

        app.handle_action(Action::Press);
        app.handle_action(Action::Uninstall);
        assert_eq!(app.take_pending(), None);

        // Quit should close dialog first
        app.handle_action(Action::Quit);
        assert_eq!(app.dialog(), &Dialog::None);
        assert!(!app.should_quit());

        app.handle_action(Action::Quit);
        assert!(app.should_quit());
    }

    #[test]
    fn test_events_become_outcomes() {
        let mut app = app();
        let activation = request(RequestKind::Activate);

        app.handle_extension_event(&ExtensionEvent::ReplacementNeeded {
            request: activation.clone(),
            existing: create_mock_properties("1.0", "10"),
            replacement: create_mock_properties("1.1", "11"),
            action: ReplacementAction::Replace,
        });
        app.handle_extension_event(&ExtensionEvent::ApprovalNeeded {
            request: activation.clone(),
        });
        app.handle_extension_event(&ExtensionEvent::Finished {
            request: activation.clone(),
            result: RequestResult::Completed,
        });
        app.handle_extension_event(&ExtensionEvent::Failed {
            request: activation,
            failure: create_mock_failure(9, "Validation failed"),
        });

        let severities: Vec<Severity> = app.outcomes().map(|o| o.severity).collect();
        assert_eq!(
            severities,
            vec![
                Severity::Warning,
                Severity::Warning,
                Severity::Success,
                Severity::Error
            ]
        );
        assert!(app.outcomes().any(|o| o.text.contains("1.0 -> 1.1")));
        assert!(app.outcomes().any(|o| o.text.contains("Validation failed")));

        app.handle_action(Action::ClearLog);
        assert_eq!(app.outcomes().count(), 0);
    }

    #[test]
    fn test_submission_errors_are_recorded() {
        let mut app = app();
        let result: common::Result<ExtensionRequest> =
            Err(common::Error::Unsupported("linux".to_string()));

        app.record_submission(RequestKind::Activate, &result);

        let outcome = app.outcomes().next().unwrap();
        assert_eq!(outcome.severity, Severity::Error);
        assert!(outcome.text.contains("activate"));
        assert!(outcome.text.contains("linux"));
    }

    #[test]
    fn test_outcome_log_is_bounded() {
        let mut app = app();
        let result = Ok(request(RequestKind::Activate));
        for _ in 0..MAX_OUTCOMES + 10 {
            app.record_submission(RequestKind::Activate, &result);
        }
        assert_eq!(app.outcomes().count(), MAX_OUTCOMES);
    }
}
