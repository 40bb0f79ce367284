//! Terminal User Interface
//!
//! Two buttons, "Install Dext" and "Uninstall Dext", plus a log of what the
//! OS reported for each request.

pub mod app;
pub mod events;
pub mod ui;

use anyhow::Result;
use common::{EventStream, LifecycleController, log_event};
use protocol::RequestKind;
use std::time::Duration;
use tracing::{error, warn};

use app::{App, Tui};
use events::{Action, Event, EventHandler};

/// Run the TUI application
///
/// Returns when the user quits. Requests still in flight keep running
/// under OS control; their callbacks are simply no longer shown.
pub async fn run(controller: LifecycleController, stream: EventStream) -> Result<()> {
    let mut tui = Tui::new()?;
    tui.enter()?;

    let mut app = App::new(
        controller.identifier().clone(),
        controller.manager_name(),
        controller.policy(),
    );

    let mut events = EventHandler::new(Duration::from_millis(250));

    loop {
        if let Err(e) = tui.draw(&app) {
            error!("Failed to draw UI: {:#}", e);
            break;
        }

        if let Some(kind) = app.take_pending() {
            let result = match kind {
                RequestKind::Activate => controller.activate(),
                RequestKind::Deactivate => controller.deactivate(),
            };
            if let Err(e) = &result {
                warn!("Failed to submit {} request: {}", kind, e);
            }
            app.record_submission(kind, &result);
            // Redraw right away so the submission shows before the next event
            continue;
        }

        tokio::select! {
            event = events.next() => {
                match event {
                    Some(Event::Key(key)) => app.handle_action(Action::from(key)),
                    Some(Event::Resize(_, _)) => {
                        // Terminal resize is handled automatically by ratatui
                    }
                    Some(Event::Tick) => {}
                    None => break,
                }
            }

            extension_event = stream.recv() => {
                match extension_event {
                    Ok(event) => {
                        log_event(&event);
                        app.handle_extension_event(&event);
                    }
                    Err(e) => {
                        warn!("Extension event error: {:#}", e);
                        break;
                    }
                }
            }
        }

        if app.should_quit() {
            break;
        }
    }

    tui.exit()?;

    Ok(())
}
