//! Protocol Type Tests
//!
//! Covers identifier parsing through serde, event tagging, and the
//! mapping of OS result/error codes.
//!
//! Run with: `cargo test -p protocol --test protocol_tests`

use protocol::{
    DEFAULT_EXTENSION_IDENTIFIER, ExtensionEvent, ExtensionIdentifier, ExtensionProperties,
    ExtensionRequest, FailureKind, ReplacementAction, RequestFailure, RequestId, RequestKind,
    RequestResult, SYSTEM_EXTENSION_ERROR_DOMAIN,
};
use serde::Deserialize;

// ============================================================================
// Identifier Tests
// ============================================================================

#[derive(Debug, Deserialize)]
struct IdentifierHolder {
    identifier: ExtensionIdentifier,
}

#[test]
fn test_identifier_deserializes_from_toml() {
    let holder: IdentifierHolder =
        toml::from_str(r#"identifier = "id.bulwark.VirtualUSBDriver.driver""#).unwrap();
    assert_eq!(holder.identifier.as_str(), DEFAULT_EXTENSION_IDENTIFIER);
}

#[test]
fn test_identifier_rejected_by_serde() {
    let result: Result<IdentifierHolder, _> = toml::from_str(r#"identifier = "not a bundle id""#);
    assert!(result.is_err());

    let result: Result<IdentifierHolder, _> = toml::from_str(r#"identifier = "driver""#);
    assert!(result.is_err());
}

#[test]
fn test_identifier_serializes_as_string() {
    let json = serde_json::to_string(&ExtensionIdentifier::default()).unwrap();
    assert_eq!(json, format!("\"{}\"", DEFAULT_EXTENSION_IDENTIFIER));
}

// ============================================================================
// Event Tests
// ============================================================================

fn activation(id: u64) -> ExtensionRequest {
    ExtensionRequest::new(
        RequestId(id),
        RequestKind::Activate,
        ExtensionIdentifier::default(),
    )
}

#[test]
fn test_event_json_is_tagged() {
    let event = ExtensionEvent::Finished {
        request: activation(9),
        result: RequestResult::WillCompleteAfterReboot,
    };
    let value = serde_json::to_value(&event).unwrap();

    assert_eq!(value["type"], "finished");
    assert_eq!(value["request"]["kind"], "activate");
    assert_eq!(value["request"]["identifier"], DEFAULT_EXTENSION_IDENTIFIER);
}

#[test]
fn test_replacement_event_carries_both_bundles() {
    let existing = ExtensionProperties {
        bundle_identifier: DEFAULT_EXTENSION_IDENTIFIER.to_string(),
        bundle_version: "10".to_string(),
        bundle_short_version: "1.0".to_string(),
        path: None,
    };
    let replacement = ExtensionProperties {
        bundle_version: "11".to_string(),
        bundle_short_version: "1.1".to_string(),
        ..existing.clone()
    };

    let event = ExtensionEvent::ReplacementNeeded {
        request: activation(1),
        existing: existing.clone(),
        replacement: replacement.clone(),
        action: ReplacementAction::Replace,
    };

    match event {
        ExtensionEvent::ReplacementNeeded {
            existing: e,
            replacement: r,
            action,
            ..
        } => {
            assert_eq!(e, existing);
            assert_eq!(r, replacement);
            assert_eq!(action, ReplacementAction::Replace);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_event_names_are_distinct() {
    let failure = RequestFailure::new(SYSTEM_EXTENSION_ERROR_DOMAIN, 11, "Request canceled");
    let events = [
        ExtensionEvent::ReplacementNeeded {
            request: activation(1),
            existing: ExtensionProperties::default(),
            replacement: ExtensionProperties::default(),
            action: ReplacementAction::Cancel,
        },
        ExtensionEvent::ApprovalNeeded {
            request: activation(1),
        },
        ExtensionEvent::Finished {
            request: activation(1),
            result: RequestResult::Completed,
        },
        ExtensionEvent::Failed {
            request: activation(1),
            failure,
        },
    ];

    let mut names: Vec<&str> = events.iter().map(|e| e.name()).collect();
    names.sort_unstable();
    names.dedup();
    assert_eq!(names.len(), 4);
}

// ============================================================================
// Code Mapping Tests
// ============================================================================

#[test]
fn test_failure_kinds_cover_framework_codes() {
    for code in 1..=13 {
        assert!(
            !matches!(FailureKind::from_code(code), FailureKind::Other(_)),
            "code {} should be named",
            code
        );
    }
    assert_eq!(FailureKind::from_code(0), FailureKind::Other(0));
}

#[test]
fn test_failure_display_includes_description() {
    let failure = RequestFailure::new(
        SYSTEM_EXTENSION_ERROR_DOMAIN,
        8,
        "Code signature invalid for extension",
    );
    let msg = failure.to_string();
    assert!(msg.contains("Code signature invalid"));
    assert!(msg.contains("8"));
    assert_eq!(failure.kind(), FailureKind::CodeSignatureInvalid);
}
