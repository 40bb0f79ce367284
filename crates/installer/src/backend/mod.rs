//! Platform backends for the system extension manager
//!
//! # Platform Support
//!
//! - **macOS**: `OSSystemExtensionManager` through the SystemExtensions
//!   framework. The binary must run from an app bundle in /Applications that
//!   embeds the dext and carries the system-extension install entitlement.
//! - **Other platforms**: every submission fails with `Unsupported`.

use common::ExtensionManager;
use std::sync::Arc;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(not(target_os = "macos"))]
pub mod unsupported;

/// Create the extension manager for the current platform
pub fn create_manager() -> Arc<dyn ExtensionManager> {
    #[cfg(target_os = "macos")]
    {
        Arc::new(macos::SystemExtensionManager::new())
    }

    #[cfg(not(target_os = "macos"))]
    {
        Arc::new(unsupported::UnsupportedManager)
    }
}
