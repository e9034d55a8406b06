//! Common Infrastructure Module
//!
//! Shared utilities and configuration for Veil.
//!
//! This module contains:
//! - Configuration loading from environment variables
//! - Structured logging setup
//! - Common error types

pub mod config;
pub mod error;
pub mod logging;

// Re-exports for convenience
pub use config::{ConfigError, Network, VeilConfig, DEFAULT_PROGRAM_ID};
pub use error::{Operation, Result, VeilError};
pub use logging::{
    generate_correlation_id, init_from_config, init_logging, log_operation_event,
    log_security_event, EventCategory, LogEvent, LogLevel, LoggingError,
};
