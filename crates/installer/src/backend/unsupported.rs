//! Fallback backend for platforms without system extensions

use common::{Error, ExtensionManager, RequestDelegate};
use tracing::warn;

/// Manager that refuses every request
pub struct UnsupportedManager;

impl ExtensionManager for UnsupportedManager {
    fn name(&self) -> &'static str {
        "unsupported"
    }

    fn submit(&self, delegate: RequestDelegate) -> common::Result<()> {
        warn!(
            "Cannot {} {}: system extensions require macOS",
            delegate.request().kind,
            delegate.request().identifier
        );
        Err(Error::Unsupported(format!(
            "system extensions are only available on macOS (running on {})",
            std::env::consts::OS
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{ReplacementPolicy, create_event_bridge};
    use protocol::{ExtensionIdentifier, ExtensionRequest, RequestId, RequestKind};

    #[test]
    fn test_submit_is_unsupported() {
        let (sink, stream) = create_event_bridge();
        let delegate = RequestDelegate::new(
            ExtensionRequest::new(
                RequestId(1),
                RequestKind::Activate,
                ExtensionIdentifier::default(),
            ),
            ReplacementPolicy::Replace,
            sink,
        );

        let err = UnsupportedManager.submit(delegate).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
        assert!(stream.is_empty());
    }
}
