//! Extension lifecycle vocabulary for the virtual USB driver installer
//!
//! This crate defines the types exchanged between the installer and the
//! operating system's system extension manager: the extension identifier,
//! activation/deactivation requests, the bundle properties the OS reports,
//! and the tagged [`ExtensionEvent`] that replaces the OS delegate callbacks.
//!
//! # Example
//!
//! ```
//! use protocol::{ExtensionIdentifier, ExtensionRequest, RequestId, RequestKind};
//!
//! let request = ExtensionRequest::new(
//!     RequestId(1),
//!     RequestKind::Activate,
//!     ExtensionIdentifier::default(),
//! );
//!
//! assert_eq!(request.identifier.as_str(), "id.bulwark.VirtualUSBDriver.driver");
//! assert_eq!(request.kind.to_string(), "activate");
//! ```

pub mod error;
pub mod events;
pub mod types;

pub use error::{ProtocolError, Result};
pub use events::ExtensionEvent;
pub use types::{
    DEFAULT_EXTENSION_IDENTIFIER, ExtensionIdentifier, ExtensionProperties, ExtensionRequest,
    FailureKind, MAX_IDENTIFIER_LEN, ReplacementAction, RequestFailure, RequestId, RequestKind,
    RequestResult, SYSTEM_EXTENSION_ERROR_DOMAIN,
};
