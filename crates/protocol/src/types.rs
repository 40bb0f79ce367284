//! Extension lifecycle type definitions
//!
//! This module defines the request side (identifier, kind, request) and the
//! payloads the system extension manager hands back through its callbacks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{ProtocolError, Result};

/// Bundle identifier of the virtual USB DriverKit extension
///
/// Must match the identifier in the bundled dext's Info.plist exactly; the
/// OS reports `ExtensionNotFound` for any mismatch.
pub const DEFAULT_EXTENSION_IDENTIFIER: &str = "id.bulwark.VirtualUSBDriver.driver";

/// Maximum length of a bundle identifier in bytes
pub const MAX_IDENTIFIER_LEN: usize = 255;

/// Validated reverse-DNS bundle identifier of a system extension
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExtensionIdentifier(String);

impl ExtensionIdentifier {
    /// Parse and validate an identifier
    pub fn new(identifier: impl Into<String>) -> Result<Self> {
        let identifier = identifier.into();

        if identifier.is_empty() {
            return Err(ProtocolError::EmptyIdentifier);
        }
        if identifier.len() > MAX_IDENTIFIER_LEN {
            return Err(ProtocolError::IdentifierTooLong {
                len: identifier.len(),
                max: MAX_IDENTIFIER_LEN,
            });
        }
        if let Some(character) = identifier
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '.'))
        {
            return Err(ProtocolError::InvalidCharacter {
                identifier,
                character,
            });
        }
        if !identifier.contains('.') || identifier.split('.').any(str::is_empty) {
            return Err(ProtocolError::MalformedIdentifier(identifier));
        }

        Ok(Self(identifier))
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ExtensionIdentifier {
    fn default() -> Self {
        Self(DEFAULT_EXTENSION_IDENTIFIER.to_string())
    }
}

impl FromStr for ExtensionIdentifier {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ExtensionIdentifier {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ExtensionIdentifier> for String {
    fn from(identifier: ExtensionIdentifier) -> Self {
        identifier.0
    }
}

impl fmt::Display for ExtensionIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Direction of a lifecycle request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    /// Install (replacing if needed) and start the extension
    Activate,
    /// Stop and remove the extension
    Deactivate,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Activate => f.write_str("activate"),
            RequestKind::Deactivate => f.write_str("deactivate"),
        }
    }
}

/// Request ID for correlating callbacks with submissions
///
/// Assigned by the lifecycle controller from a process-wide counter. The OS
/// never sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single activation or deactivation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionRequest {
    /// Correlation id
    pub id: RequestId,
    /// Activate or deactivate
    pub kind: RequestKind,
    /// Target extension
    pub identifier: ExtensionIdentifier,
}

impl ExtensionRequest {
    /// Create a new request
    pub fn new(id: RequestId, kind: RequestKind, identifier: ExtensionIdentifier) -> Self {
        Self {
            id,
            kind,
            identifier,
        }
    }
}

impl fmt::Display for ExtensionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.kind, self.identifier, self.id)
    }
}

/// Properties of an extension bundle as reported by the OS
///
/// Delivered for both the currently installed and the incoming bundle when
/// the OS asks whether to replace one with the other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionProperties {
    /// CFBundleIdentifier
    pub bundle_identifier: String,
    /// CFBundleVersion
    pub bundle_version: String,
    /// CFBundleShortVersionString
    pub bundle_short_version: String,
    /// Location of the bundle on disk (if reported)
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl fmt::Display for ExtensionProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({})",
            self.bundle_identifier, self.bundle_short_version, self.bundle_version
        )
    }
}

/// Answer to the OS's replacement question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplacementAction {
    /// Replace the installed extension with the incoming one
    Replace,
    /// Keep the installed extension and cancel the request
    Cancel,
}

impl fmt::Display for ReplacementAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplacementAction::Replace => f.write_str("replace"),
            ReplacementAction::Cancel => f.write_str("cancel"),
        }
    }
}

/// Terminal result code of a successful request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestResult {
    /// Request completed
    Completed,
    /// Request accepted; takes effect after the next reboot
    WillCompleteAfterReboot,
    /// Result code this build does not know about
    Other(i64),
}

impl RequestResult {
    /// Convert from the OS's raw result code
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            0 => RequestResult::Completed,
            1 => RequestResult::WillCompleteAfterReboot,
            other => RequestResult::Other(other),
        }
    }

    /// The OS's raw result code
    pub fn raw(&self) -> i64 {
        match self {
            RequestResult::Completed => 0,
            RequestResult::WillCompleteAfterReboot => 1,
            RequestResult::Other(raw) => *raw,
        }
    }
}

impl fmt::Display for RequestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestResult::Completed => f.write_str("completed"),
            RequestResult::WillCompleteAfterReboot => f.write_str("will complete after reboot"),
            RequestResult::Other(raw) => write!(f, "unknown result {}", raw),
        }
    }
}

/// Named system extension error codes
///
/// Only used to label logged failures; nothing branches on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    Unknown,
    MissingEntitlement,
    UnsupportedParentBundleLocation,
    ExtensionNotFound,
    ExtensionMissingIdentifier,
    DuplicateExtensionIdentifier,
    UnknownExtensionCategory,
    CodeSignatureInvalid,
    ValidationFailed,
    ForbiddenBySystemPolicy,
    RequestCanceled,
    RequestSuperseded,
    AuthorizationRequired,
    Other(i64),
}

impl FailureKind {
    /// Map a raw `OSSystemExtensionErrorDomain` code
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => FailureKind::Unknown,
            2 => FailureKind::MissingEntitlement,
            3 => FailureKind::UnsupportedParentBundleLocation,
            4 => FailureKind::ExtensionNotFound,
            5 => FailureKind::ExtensionMissingIdentifier,
            6 => FailureKind::DuplicateExtensionIdentifier,
            7 => FailureKind::UnknownExtensionCategory,
            8 => FailureKind::CodeSignatureInvalid,
            9 => FailureKind::ValidationFailed,
            10 => FailureKind::ForbiddenBySystemPolicy,
            11 => FailureKind::RequestCanceled,
            12 => FailureKind::RequestSuperseded,
            13 => FailureKind::AuthorizationRequired,
            other => FailureKind::Other(other),
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Unknown => f.write_str("unknown"),
            FailureKind::MissingEntitlement => f.write_str("missing entitlement"),
            FailureKind::UnsupportedParentBundleLocation => {
                f.write_str("unsupported parent bundle location")
            }
            FailureKind::ExtensionNotFound => f.write_str("extension not found"),
            FailureKind::ExtensionMissingIdentifier => f.write_str("extension missing identifier"),
            FailureKind::DuplicateExtensionIdentifier => {
                f.write_str("duplicate extension identifier")
            }
            FailureKind::UnknownExtensionCategory => f.write_str("unknown extension category"),
            FailureKind::CodeSignatureInvalid => f.write_str("code signature invalid"),
            FailureKind::ValidationFailed => f.write_str("validation failed"),
            FailureKind::ForbiddenBySystemPolicy => f.write_str("forbidden by system policy"),
            FailureKind::RequestCanceled => f.write_str("request canceled"),
            FailureKind::RequestSuperseded => f.write_str("request superseded"),
            FailureKind::AuthorizationRequired => f.write_str("authorization required"),
            FailureKind::Other(code) => write!(f, "code {}", code),
        }
    }
}

/// Error reported by the OS when a request fails
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFailure {
    /// NSError domain
    pub domain: String,
    /// NSError code
    pub code: i64,
    /// Localized description
    pub description: String,
}

/// NSError domain used by the system extension framework
pub const SYSTEM_EXTENSION_ERROR_DOMAIN: &str = "OSSystemExtensionErrorDomain";

impl RequestFailure {
    /// Create a new failure payload
    pub fn new(domain: impl Into<String>, code: i64, description: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            code,
            description: description.into(),
        }
    }

    /// Named kind, when the failure comes from the system extension domain
    pub fn kind(&self) -> FailureKind {
        if self.domain == SYSTEM_EXTENSION_ERROR_DOMAIN {
            FailureKind::from_code(self.code)
        } else {
            FailureKind::Other(self.code)
        }
    }
}

impl fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.description, self.domain, self.code)
    }
}
