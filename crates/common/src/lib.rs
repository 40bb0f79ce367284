//! Common utilities for the virtual USB driver installer
//!
//! This crate provides the pieces shared by every presentation surface:
//! error handling, logging setup, the event bridge that carries OS
//! callbacks into the async runtime, the injectable extension manager
//! capability, and the lifecycle controller built on top of it.

pub mod channel;
pub mod controller;
pub mod error;
pub mod logging;
pub mod manager;
pub mod test_utils;

pub use channel::{EventSink, EventStream, create_event_bridge};
pub use controller::{LifecycleController, log_event, wait_for_outcome};
pub use error::{Error, Result};
pub use logging::{LOG_LEVELS, setup_file_logging, setup_logging, validate_log_level};
pub use manager::{ExtensionManager, ReplacementPolicy, RequestDelegate};
