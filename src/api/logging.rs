//! Structured logging with correlation tracking for catalog actions
//!
//! Every action call gets a correlation id so the request, response and completion
//! lines of one call can be grepped out of the log file together.

use serde_json::json;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use log::{debug, error, info, warn};

use super::constants::headers;

/// Monitoring and logging configuration
#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    pub request_logging: bool,
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warn" => LogLevel::Warn,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => LogLevel::Info,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            request_logging: true,
            log_level: LogLevel::Info,
        }
    }
}

impl MonitoringConfig {
    /// Silence everything but errors (tests, scripted runs)
    pub fn quiet() -> Self {
        Self {
            request_logging: false,
            log_level: LogLevel::Error,
        }
    }
}

/// Structured logger for catalog actions
#[derive(Debug, Clone)]
pub struct ApiLogger {
    config: MonitoringConfig,
}

/// Tracking state for one in-flight action call
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub correlation_id: String,
    pub action: String,
    pub instance: String,
    pub start_time: Instant,
}

impl ActionContext {
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl ApiLogger {
    pub fn new(config: MonitoringConfig) -> Self {
        Self { config }
    }

    /// Start tracking a new action call
    pub fn start_action(&self, action: &str, instance: &str) -> ActionContext {
        let context = ActionContext {
            correlation_id: uuid::Uuid::new_v4().to_string(),
            action: action.to_string(),
            instance: instance.to_string(),
            start_time: Instant::now(),
        };

        if self.config.request_logging && self.should_log(LogLevel::Info) {
            let log_data = json!({
                "event": "action_started",
                "correlation_id": context.correlation_id,
                "action": context.action,
                "instance": context.instance,
                "timestamp": chrono::Utc::now().to_rfc3339()
            });

            info!("Catalog Action Started: {}", log_data);
        }

        context
    }

    /// Log HTTP request details
    pub fn log_request(&self, context: &ActionContext, method: &str, url: &str, headers: &HashMap<String, String>) {
        if !self.config.request_logging || !self.should_log(LogLevel::Debug) {
            return;
        }

        let log_data = json!({
            "event": "http_request",
            "correlation_id": context.correlation_id,
            "action": context.action,
            "method": method,
            "url": url,
            "headers": sanitize_headers(headers),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        debug!("HTTP Request: {}", log_data);
    }

    /// Log HTTP response status
    pub fn log_response(&self, context: &ActionContext, status_code: u16) {
        if !self.config.request_logging || !self.should_log(LogLevel::Debug) {
            return;
        }

        let log_data = json!({
            "event": "http_response",
            "correlation_id": context.correlation_id,
            "action": context.action,
            "status_code": status_code,
            "duration_ms": context.elapsed().as_millis(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        if status_code >= 400 {
            warn!("HTTP Response (Error): {}", log_data);
        } else {
            debug!("HTTP Response: {}", log_data);
        }
    }

    /// Log the end of an action call
    pub fn complete_action(&self, context: &ActionContext, status_code: Option<u16>, error_message: Option<&str>) {
        let success = error_message.is_none();
        let level = if success { LogLevel::Info } else { LogLevel::Error };
        if !self.should_log(level) || (success && !self.config.request_logging) {
            return;
        }

        let log_data = json!({
            "event": "action_completed",
            "correlation_id": context.correlation_id,
            "action": context.action,
            "instance": context.instance,
            "duration_ms": context.elapsed().as_millis(),
            "success": success,
            "status_code": status_code,
            "error_message": error_message,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        if success {
            info!("Catalog Action Completed: {}", log_data);
        } else {
            error!("Catalog Action Failed: {}", log_data);
        }
    }

    fn should_log(&self, level: LogLevel) -> bool {
        level <= self.config.log_level
    }
}

/// Copy of the headers with credentials replaced
pub fn sanitize_headers(headers: &HashMap<String, String>) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            if name.eq_ignore_ascii_case(headers::AUTHORIZATION) {
                (name.clone(), headers::REDACTED.to_string())
            } else {
                (name.clone(), value.clone())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_headers_redacts_authorization() {
        let mut headers = HashMap::new();
        headers.insert("authorization".to_string(), "secret-token".to_string());
        headers.insert("Accept".to_string(), "application/json".to_string());

        let sanitized = sanitize_headers(&headers);
        assert_eq!(sanitized["authorization"], "<redacted>");
        assert_eq!(sanitized["Accept"], "application/json");
    }

    #[test]
    fn test_log_level_ordering() {
        let logger = ApiLogger::new(MonitoringConfig {
            request_logging: true,
            log_level: LogLevel::Warn,
        });
        assert!(logger.should_log(LogLevel::Error));
        assert!(logger.should_log(LogLevel::Warn));
        assert!(!logger.should_log(LogLevel::Info));
        assert_eq!(LogLevel::parse("DEBUG"), LogLevel::Debug);
        assert_eq!(LogLevel::parse("nonsense"), LogLevel::Info);
    }

    #[test]
    fn test_each_action_gets_fresh_correlation_id() {
        let logger = ApiLogger::new(MonitoringConfig::quiet());
        let a = logger.start_action("package_show", "https://a");
        let b = logger.start_action("package_show", "https://a");
        assert_ne!(a.correlation_id, b.correlation_id);
        assert_eq!(a.action, "package_show");
    }
}
