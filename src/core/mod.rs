//! Core module - configuration, errors, events, and the capture session

pub mod config;
pub mod error;
pub mod events;
pub mod heartbeat;
pub mod session;
pub mod trigger;
