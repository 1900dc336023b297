//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the K2 bridge core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! Every other core crate depends on this one for its configuration type, the
//! typed event bus that replaces ad hoc listener arrays, and the logging
//! conventions (structured fields, token redaction).

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
