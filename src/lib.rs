//! hidhub
//!
//! Captures one USB HID keyboard, identified by vendor/product id, on a host
//! acting as a USB gadget, and forwards its reports while a heartbeat proves
//! the process is alive.
//!
//! # Features
//! - Exclusive capture session with ordered teardown on every exit path
//! - Thread-safe periodic trigger driving an independent heartbeat
//! - HID device listing by vendor/product filter
//! - TOML configuration with command-line overrides

pub mod core;
pub mod hid;

pub use self::core::config::{parse_usb_id, Config, SessionSettings};
pub use self::core::error::{ConfigError, HubError, OpenError, SessionError, WriteError};
pub use self::core::events::{SessionEvent, SessionEventSender};
pub use self::core::heartbeat::Heartbeat;
pub use self::core::session::{CapturePlan, CaptureSession, SessionState};
pub use self::core::trigger::PeriodicTrigger;
