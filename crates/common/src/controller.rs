//! Extension lifecycle controller
//!
//! Translates "install" / "uninstall" into activation / deactivation
//! requests for one extension and reports what the OS says about them.

use protocol::{ExtensionEvent, ExtensionIdentifier, ExtensionRequest, RequestId, RequestKind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

use crate::channel::{EventSink, EventStream, create_event_bridge};
use crate::manager::{ExtensionManager, ReplacementPolicy, RequestDelegate};

/// Builds and submits lifecycle requests for a single extension
pub struct LifecycleController {
    manager: Arc<dyn ExtensionManager>,
    identifier: ExtensionIdentifier,
    policy: ReplacementPolicy,
    sink: EventSink,
    next_request_id: AtomicU64,
}

impl LifecycleController {
    /// Create a controller and the stream its callbacks arrive on
    pub fn new(
        manager: Arc<dyn ExtensionManager>,
        identifier: ExtensionIdentifier,
        policy: ReplacementPolicy,
    ) -> (Self, EventStream) {
        let (sink, stream) = create_event_bridge();

        let controller = Self {
            manager,
            identifier,
            policy,
            sink,
            next_request_id: AtomicU64::new(1),
        };
        (controller, stream)
    }

    /// Target extension
    pub fn identifier(&self) -> &ExtensionIdentifier {
        &self.identifier
    }

    /// Replacement policy handed to every delegate
    pub fn policy(&self) -> ReplacementPolicy {
        self.policy
    }

    /// Name of the backend requests go to
    pub fn manager_name(&self) -> &'static str {
        self.manager.name()
    }

    /// Submit an activation request
    pub fn activate(&self) -> crate::Result<ExtensionRequest> {
        self.submit(RequestKind::Activate)
    }

    /// Submit a deactivation request
    pub fn deactivate(&self) -> crate::Result<ExtensionRequest> {
        self.submit(RequestKind::Deactivate)
    }

    fn submit(&self, kind: RequestKind) -> crate::Result<ExtensionRequest> {
        let id = RequestId(self.next_request_id.fetch_add(1, Ordering::Relaxed));
        let request = ExtensionRequest::new(id, kind, self.identifier.clone());
        let delegate = RequestDelegate::new(request.clone(), self.policy, self.sink.clone());

        info!(
            "Submitting {} request {} for {} via {}",
            kind,
            id,
            self.identifier,
            self.manager.name()
        );
        self.manager.submit(delegate)?;

        Ok(request)
    }
}

/// Log one lifecycle event
///
/// Emits exactly one log record per event and touches no state.
pub fn log_event(event: &ExtensionEvent) {
    match event {
        ExtensionEvent::ReplacementNeeded {
            request,
            existing,
            replacement,
            action,
        } => match action {
            protocol::ReplacementAction::Replace => warn!(
                "{}: replacing installed extension {} with {} (replacement policy: replace)",
                request.id, existing, replacement
            ),
            protocol::ReplacementAction::Cancel => info!(
                "{}: keeping installed extension {}, not replacing with {}",
                request.id, existing, replacement
            ),
        },
        ExtensionEvent::ApprovalNeeded { request } => info!(
            "{}: {} needs user approval in System Settings > Privacy & Security",
            request.id, request.identifier
        ),
        ExtensionEvent::Finished { request, result } => info!(
            "{}: {} request finished: {} (result code {})",
            request.id,
            request.kind,
            result,
            result.raw()
        ),
        ExtensionEvent::Failed { request, failure } => error!(
            "{}: {} request failed: {} [{}]",
            request.id,
            request.kind,
            failure,
            failure.kind()
        ),
    }
}

/// Wait until the OS is done with `request`
///
/// Logs every event for the request and returns the terminal one
/// (`Finished` or `Failed`). Events for other requests are logged and
/// skipped. There is no timeout: approval may take as long as the user
/// takes.
pub async fn wait_for_outcome(
    stream: &EventStream,
    request: &ExtensionRequest,
) -> crate::Result<ExtensionEvent> {
    loop {
        let event = stream.recv().await?;
        log_event(&event);

        if event.request().id != request.id {
            debug!("Ignoring event for {} while waiting on {}", event.request().id, request.id);
            continue;
        }
        if event.is_terminal() {
            return Ok(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockExtensionManager;

    #[test]
    fn test_request_ids_increase() {
        let manager = Arc::new(MockExtensionManager::new());
        let (controller, _stream) = LifecycleController::new(
            manager.clone(),
            ExtensionIdentifier::default(),
            ReplacementPolicy::Replace,
        );

        let first = controller.activate().unwrap();
        let second = controller.deactivate().unwrap();
        let third = controller.activate().unwrap();

        assert_eq!(first.id, RequestId(1));
        assert_eq!(second.id, RequestId(2));
        assert_eq!(third.id, RequestId(3));
    }

    #[test]
    fn test_manager_name() {
        let manager = Arc::new(MockExtensionManager::new());
        let (controller, _stream) = LifecycleController::new(
            manager,
            ExtensionIdentifier::default(),
            ReplacementPolicy::Replace,
        );
        assert_eq!(controller.manager_name(), "mock");
    }
}
