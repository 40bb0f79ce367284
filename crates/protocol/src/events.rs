//! Lifecycle events
//!
//! The OS reports request progress through four delegate callbacks. Each
//! callback becomes one [`ExtensionEvent`] variant. Zero or more events may
//! arrive per request and their order is decided by the OS.

use serde::{Deserialize, Serialize};

use crate::types::{
    ExtensionProperties, ExtensionRequest, ReplacementAction, RequestFailure, RequestResult,
};

/// One callback notification for a submitted request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtensionEvent {
    /// An installed version must be replaced; `action` is what was answered
    ReplacementNeeded {
        request: ExtensionRequest,
        existing: ExtensionProperties,
        replacement: ExtensionProperties,
        action: ReplacementAction,
    },

    /// The user must approve the extension in System Settings
    ApprovalNeeded { request: ExtensionRequest },

    /// The request completed
    Finished {
        request: ExtensionRequest,
        result: RequestResult,
    },

    /// The request failed
    Failed {
        request: ExtensionRequest,
        failure: RequestFailure,
    },
}

impl ExtensionEvent {
    /// The request this event belongs to
    pub fn request(&self) -> &ExtensionRequest {
        match self {
            ExtensionEvent::ReplacementNeeded { request, .. }
            | ExtensionEvent::ApprovalNeeded { request }
            | ExtensionEvent::Finished { request, .. }
            | ExtensionEvent::Failed { request, .. } => request,
        }
    }

    /// Whether the OS is done with the request after this event
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExtensionEvent::Finished { .. } | ExtensionEvent::Failed { .. }
        )
    }

    /// Short name of the callback this event stands for
    pub fn name(&self) -> &'static str {
        match self {
            ExtensionEvent::ReplacementNeeded { .. } => "replacement-needed",
            ExtensionEvent::ApprovalNeeded { .. } => "approval-needed",
            ExtensionEvent::Finished { .. } => "finished",
            ExtensionEvent::Failed { .. } => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExtensionIdentifier, RequestId, RequestKind};

    fn request() -> ExtensionRequest {
        ExtensionRequest::new(
            RequestId(1),
            RequestKind::Activate,
            ExtensionIdentifier::default(),
        )
    }

    #[test]
    fn test_terminal_events() {
        let approval = ExtensionEvent::ApprovalNeeded { request: request() };
        assert!(!approval.is_terminal());

        let finished = ExtensionEvent::Finished {
            request: request(),
            result: RequestResult::Completed,
        };
        assert!(finished.is_terminal());

        let failed = ExtensionEvent::Failed {
            request: request(),
            failure: RequestFailure::new("OSSystemExtensionErrorDomain", 2, "Missing entitlement"),
        };
        assert!(failed.is_terminal());
    }

    #[test]
    fn test_request_accessor() {
        let event = ExtensionEvent::ReplacementNeeded {
            request: request(),
            existing: ExtensionProperties::default(),
            replacement: ExtensionProperties::default(),
            action: ReplacementAction::Replace,
        };
        assert_eq!(event.request().id, RequestId(1));
        assert_eq!(event.name(), "replacement-needed");
    }
}
