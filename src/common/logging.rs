//! Structured Logging for Veil
//!
//! Provides structured logging with:
//! - JSON output for log aggregation
//! - Correlation IDs tying the stages of one operation together
//! - Security event logging (conflicts, rejected proofs)
//!
//! Secrets never reach a log line. Commitments and nullifiers are logged
//! as short hex prefixes only.
//!
//! # Usage
//!
//! ```rust,ignore
//! use veil::common::logging::{init_logging, LogLevel};
//!
//! init_logging(LogLevel::Info, true)?; // JSON mode for production
//! ```

use serde::Serialize;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use super::error::Operation;

// ============================================================================
// Log Levels
// ============================================================================

/// Application log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl From<&str> for LogLevel {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

// ============================================================================
// Structured Event Types
// ============================================================================

/// Event categories for structured logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Pool initialization and state queries
    Pool,
    /// Shield (deposit) events
    Shield,
    /// Private transfer events
    Transfer,
    /// Unshield (withdrawal) events
    Unshield,
    /// Security events (conflicts, rejected proofs)
    Security,
    /// System events (startup, shutdown)
    System,
}

impl From<Operation> for EventCategory {
    fn from(operation: Operation) -> Self {
        match operation {
            Operation::Shield => EventCategory::Shield,
            Operation::Transfer => EventCategory::Transfer,
            Operation::Unshield => EventCategory::Unshield,
            Operation::Initialize | Operation::Query => EventCategory::Pool,
            Operation::Derive => EventCategory::System,
        }
    }
}

/// Structured log event
#[derive(Debug, Serialize)]
pub struct LogEvent {
    /// Event timestamp (ISO 8601)
    pub timestamp: String,
    /// Log level
    pub level: String,
    /// Event category
    pub category: EventCategory,
    /// Human-readable message
    pub message: String,
    /// Correlation ID for operation tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Additional structured data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

/// Error details for error events
#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl LogEvent {
    /// Create a new log event
    pub fn new(level: LogLevel, category: EventCategory, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level: format!("{:?}", level).to_uppercase(),
            category,
            message: message.into(),
            correlation_id: None,
            data: None,
            error: None,
        }
    }

    /// Add correlation ID
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Add structured data
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Add error details
    pub fn with_error(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.error = Some(ErrorDetails {
            code: code.into(),
            message: message.into(),
        });
        self
    }

    /// Serialize this event to JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "{{\"error\": \"failed to serialize log\", \"message\": \"{}\"}}",
                self.message
            )
        })
    }
}

// ============================================================================
// Event Helpers
// ============================================================================

/// Log the outcome of a protocol operation
pub fn log_operation_event(
    operation: Operation,
    correlation_id: &str,
    data: serde_json::Value,
    error: Option<(&str, &str)>,
) {
    let success = error.is_none();
    let level = if success { LogLevel::Info } else { LogLevel::Error };
    let message = if success {
        format!("{} completed", operation)
    } else {
        format!("{} failed", operation)
    };

    let mut event = LogEvent::new(level, operation.into(), message)
        .with_correlation_id(correlation_id)
        .with_data(data);

    if let Some((code, message)) = error {
        event = event.with_error(code, message);
    }

    if success {
        tracing::info!(target: "veil::protocol", "{}", event.to_json());
    } else {
        tracing::error!(target: "veil::protocol", "{}", event.to_json());
    }
}

/// Log a security-related event
pub fn log_security_event(
    event_type: &str,
    success: bool,
    details: serde_json::Value,
    correlation_id: Option<&str>,
) {
    let level = if success { LogLevel::Info } else { LogLevel::Warn };
    let event = LogEvent::new(level, EventCategory::Security, event_type).with_data(
        serde_json::json!({
            "success": success,
            "details": details
        }),
    );

    let event = match correlation_id {
        Some(id) => event.with_correlation_id(id),
        None => event,
    };

    if success {
        tracing::info!(target: "veil::security", "{}", event.to_json());
    } else {
        tracing::warn!(target: "veil::security", "{}", event.to_json());
    }
}

/// Short hex prefix of a public 32-byte value, for log lines
pub fn short_hex(bytes: &[u8]) -> String {
    let len = bytes.len().min(8);
    hex::encode(&bytes[..len])
}

// ============================================================================
// Initialization
// ============================================================================

/// Initialize the logging system
///
/// # Arguments
/// * `level` - Minimum log level to output
/// * `json_format` - Use JSON format (recommended for production)
pub fn init_logging(level: LogLevel, json_format: bool) -> Result<(), LoggingError> {
    let level_str = format!("{:?}", level).to_lowercase();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("veil={},solana_client=warn", level_str)));

    if json_format {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::CLOSE),
        );

        subscriber
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    } else {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .pretty()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_span_events(FmtSpan::NONE),
        );

        subscriber
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    }

    Ok(())
}

/// Initialize logging from VeilConfig
pub fn init_from_config(config: &super::config::VeilConfig) -> Result<(), LoggingError> {
    init_logging(LogLevel::from(config.log_level.as_str()), config.log_json)
}

/// Logging errors
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to initialize logging: {0}")]
    InitFailed(String),
}

/// Generate a unique correlation ID for one protocol operation
pub fn generate_correlation_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

// ============================================================================
// Tests
// ============================================================================
