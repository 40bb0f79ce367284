//! System extension manager capability
//!
//! The OS manager is a process-wide singleton in the real world. Here it is
//! a trait object so that the controller can be driven by a mock in tests
//! and by a platform backend in the installer binary.

use protocol::{
    ExtensionEvent, ExtensionProperties, ExtensionRequest, ReplacementAction, RequestFailure,
    RequestResult,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::channel::EventSink;

/// Something that can submit lifecycle requests to the OS
pub trait ExtensionManager: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Submit a request
    ///
    /// The delegate carries the request and receives every callback the OS
    /// delivers for it. Returning `Ok` only means the request was handed
    /// over; outcomes arrive later as events.
    fn submit(&self, delegate: RequestDelegate) -> crate::Result<()>;
}

/// How to answer the OS when an installed extension must be replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplacementPolicy {
    /// Always replace the installed extension
    #[default]
    Replace,
    /// Always keep the installed extension
    Cancel,
}

impl ReplacementPolicy {
    /// Decide on a replacement
    ///
    /// The bundle properties are not consulted; the answer depends on the
    /// policy alone.
    pub fn decide(
        &self,
        _existing: &ExtensionProperties,
        _replacement: &ExtensionProperties,
    ) -> ReplacementAction {
        match self {
            ReplacementPolicy::Replace => ReplacementAction::Replace,
            ReplacementPolicy::Cancel => ReplacementAction::Cancel,
        }
    }
}

/// Callback receiver registered on one request
///
/// Mirrors the four delegate callbacks of the OS. Each call emits exactly
/// one [`ExtensionEvent`] into the event bridge.
#[derive(Debug, Clone)]
pub struct RequestDelegate {
    request: ExtensionRequest,
    policy: ReplacementPolicy,
    sink: EventSink,
}

impl RequestDelegate {
    /// Create a delegate for a request
    pub fn new(request: ExtensionRequest, policy: ReplacementPolicy, sink: EventSink) -> Self {
        Self {
            request,
            policy,
            sink,
        }
    }

    /// The request this delegate answers for
    pub fn request(&self) -> &ExtensionRequest {
        &self.request
    }

    /// The replacement policy in effect
    pub fn policy(&self) -> ReplacementPolicy {
        self.policy
    }

    /// An installed version must be replaced; returns the decision
    pub fn replacement_needed(
        &self,
        existing: ExtensionProperties,
        replacement: ExtensionProperties,
    ) -> ReplacementAction {
        let action = self.policy.decide(&existing, &replacement);
        self.emit(ExtensionEvent::ReplacementNeeded {
            request: self.request.clone(),
            existing,
            replacement,
            action,
        });
        action
    }

    /// User approval is required before activation can proceed
    pub fn approval_needed(&self) {
        self.emit(ExtensionEvent::ApprovalNeeded {
            request: self.request.clone(),
        });
    }

    /// The request finished
    pub fn finished(&self, result: RequestResult) {
        self.emit(ExtensionEvent::Finished {
            request: self.request.clone(),
            result,
        });
    }

    /// The request failed
    pub fn failed(&self, failure: RequestFailure) {
        self.emit(ExtensionEvent::Failed {
            request: self.request.clone(),
            failure,
        });
    }

    fn emit(&self, event: ExtensionEvent) {
        // Nobody listening anymore (e.g. the UI quit); the OS still expects us to return
        if let Err(e) = self.sink.send(event) {
            debug!("Dropping {} callback for {}: {}", self.request.kind, self.request.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::create_event_bridge;
    use protocol::{ExtensionIdentifier, RequestId, RequestKind};

    fn delegate(policy: ReplacementPolicy) -> (RequestDelegate, crate::EventStream) {
        let (sink, stream) = create_event_bridge();
        let request = ExtensionRequest::new(
            RequestId(5),
            RequestKind::Activate,
            ExtensionIdentifier::default(),
        );
        (RequestDelegate::new(request, policy, sink), stream)
    }

    #[test]
    fn test_default_policy_is_replace() {
        assert_eq!(ReplacementPolicy::default(), ReplacementPolicy::Replace);
    }

    #[test]
    fn test_replacement_needed_returns_and_emits_decision() {
        let (delegate, stream) = delegate(ReplacementPolicy::Replace);

        let action = delegate.replacement_needed(
            ExtensionProperties::default(),
            ExtensionProperties::default(),
        );
        assert_eq!(action, ReplacementAction::Replace);

        match stream.try_recv() {
            Some(ExtensionEvent::ReplacementNeeded { action, .. }) => {
                assert_eq!(action, ReplacementAction::Replace)
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(stream.is_empty());
    }

    #[test]
    fn test_cancel_policy() {
        let (delegate, _stream) = delegate(ReplacementPolicy::Cancel);
        let action = delegate.replacement_needed(
            ExtensionProperties::default(),
            ExtensionProperties::default(),
        );
        assert_eq!(action, ReplacementAction::Cancel);
    }

    #[test]
    fn test_callbacks_survive_closed_stream() {
        let (delegate, stream) = delegate(ReplacementPolicy::Replace);
        drop(stream);

        delegate.approval_needed();
        delegate.finished(RequestResult::Completed);
        assert_eq!(
            delegate.replacement_needed(
                ExtensionProperties::default(),
                ExtensionProperties::default()
            ),
            ReplacementAction::Replace
        );
    }
}
