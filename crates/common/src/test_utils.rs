//! Test utilities for the installer crates
//!
//! Provides a mock extension manager, a log capture layer, and helper
//! functions for testing across crates.
//!
//! # Example
//!
//! ```
//! use common::test_utils::create_mock_properties;
//!
//! let props = create_mock_properties("1.0", "10");
//! assert_eq!(props.bundle_short_version, "1.0");
//! ```

use protocol::{
    DEFAULT_EXTENSION_IDENTIFIER, ExtensionProperties, ExtensionRequest, RequestFailure,
    SYSTEM_EXTENSION_ERROR_DOMAIN,
};
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::manager::{ExtensionManager, RequestDelegate};

/// Default test timeout (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Create mock bundle properties for the driver extension
pub fn create_mock_properties(short_version: &str, version: &str) -> ExtensionProperties {
    ExtensionProperties {
        bundle_identifier: DEFAULT_EXTENSION_IDENTIFIER.to_string(),
        bundle_version: version.to_string(),
        bundle_short_version: short_version.to_string(),
        path: Some(PathBuf::from(format!(
            "/Applications/VirtualUSB.app/Contents/Library/SystemExtensions/{}.dext",
            DEFAULT_EXTENSION_IDENTIFIER
        ))),
    }
}

/// Create a mock failure in the system extension error domain
pub fn create_mock_failure(code: i64, description: &str) -> RequestFailure {
    RequestFailure::new(SYSTEM_EXTENSION_ERROR_DOMAIN, code, description)
}

/// Run a future with the default timeout, panicking if it elapses
pub async fn with_timeout<F, T>(future: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(DEFAULT_TEST_TIMEOUT, future)
        .await
        .expect("Test timed out")
}

/// Extension manager that records submissions instead of talking to the OS
///
/// Tests play the OS by pulling recorded delegates and invoking callbacks
/// on them.
#[derive(Default)]
pub struct MockExtensionManager {
    submitted: Mutex<Vec<RequestDelegate>>,
    reject_with: Option<String>,
}

impl MockExtensionManager {
    /// Create a manager that accepts every request
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager that rejects every submission
    pub fn rejecting(reason: &str) -> Self {
        Self {
            submitted: Mutex::new(Vec::new()),
            reject_with: Some(reason.to_string()),
        }
    }

    /// Requests submitted so far, in order
    pub fn submissions(&self) -> Vec<ExtensionRequest> {
        self.lock().iter().map(|d| d.request().clone()).collect()
    }

    /// Number of requests submitted so far
    pub fn submission_count(&self) -> usize {
        self.lock().len()
    }

    /// Delegate registered for the n-th submission
    pub fn delegate(&self, index: usize) -> Option<RequestDelegate> {
        self.lock().get(index).cloned()
    }

    /// Delegate registered for the most recent submission
    pub fn last_delegate(&self) -> Option<RequestDelegate> {
        self.lock().last().cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RequestDelegate>> {
        self.submitted.lock().expect("mock manager lock poisoned")
    }
}

impl ExtensionManager for MockExtensionManager {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn submit(&self, delegate: RequestDelegate) -> crate::Result<()> {
        if let Some(reason) = &self.reject_with {
            return Err(crate::Error::Submission(reason.clone()));
        }
        self.lock().push(delegate);
        Ok(())
    }
}

/// One captured log record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedLog {
    pub level: Level,
    pub target: String,
    pub message: String,
}

/// Tracing layer that keeps every event in memory
///
/// ```
/// use common::test_utils::LogCapture;
/// use tracing_subscriber::prelude::*;
///
/// let capture = LogCapture::new();
/// let subscriber = tracing_subscriber::registry().with(capture.clone());
/// tracing::subscriber::with_default(subscriber, || tracing::info!("hello"));
///
/// assert_eq!(capture.logs().len(), 1);
/// assert_eq!(capture.logs()[0].message, "hello");
/// ```
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    logs: Arc<Mutex<Vec<CapturedLog>>>,
}

impl LogCapture {
    /// Create an empty capture
    pub fn new() -> Self {
        Self::default()
    }

    /// Records captured so far
    pub fn logs(&self) -> Vec<CapturedLog> {
        self.logs.lock().expect("log capture lock poisoned").clone()
    }

    /// Records captured from a given crate (target prefix)
    pub fn logs_from(&self, target_prefix: &str) -> Vec<CapturedLog> {
        self.logs()
            .into_iter()
            .filter(|log| log.target.starts_with(target_prefix))
            .collect()
    }

    /// Forget every captured record
    pub fn clear(&self) {
        self.logs.lock().expect("log capture lock poisoned").clear();
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let metadata = event.metadata();
        self.logs
            .lock()
            .expect("log capture lock poisoned")
            .push(CapturedLog {
                level: *metadata.level(),
                target: metadata.target().to_string(),
                message: visitor.message,
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::prelude::*;

    #[test]
    fn test_log_capture_levels() {
        let capture = LogCapture::new();
        let subscriber = tracing_subscriber::registry().with(capture.clone());

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("first");
            tracing::error!(code = 4, "second {}", 2);
        });

        let logs = capture.logs();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].level, Level::WARN);
        assert_eq!(logs[0].message, "first");
        assert_eq!(logs[1].level, Level::ERROR);
        assert_eq!(logs[1].message, "second 2");

        capture.clear();
        assert!(capture.logs().is_empty());
    }

    #[test]
    fn test_rejecting_manager() {
        let manager = MockExtensionManager::rejecting("no entitlement");
        let (sink, _stream) = crate::create_event_bridge();
        let delegate = RequestDelegate::new(
            ExtensionRequest::new(
                protocol::RequestId(1),
                protocol::RequestKind::Activate,
                protocol::ExtensionIdentifier::default(),
            ),
            crate::ReplacementPolicy::Replace,
            sink,
        );

        assert!(matches!(
            manager.submit(delegate),
            Err(crate::Error::Submission(_))
        ));
        assert_eq!(manager.submission_count(), 0);
    }
}
