//! Structured failure records. Every backend or collaborator failure that
//! reaches a handler is logged once here with its component, action and a
//! coarse error type.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorType {
    Network,
    Timeout,
    Database,
    Decode,
    Unknown,
}

pub fn classify(err: &anyhow::Error) -> ErrorType {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<reqwest::Error>() {
            return if e.is_timeout() {
                ErrorType::Timeout
            } else if e.is_decode() {
                ErrorType::Decode
            } else {
                ErrorType::Network
            };
        }
        if cause.is::<tokio::time::error::Elapsed>() {
            return ErrorType::Timeout;
        }
        if cause.is::<sqlx::Error>() {
            return ErrorType::Database;
        }
        if cause.is::<serde_json::Error>() {
            return ErrorType::Decode;
        }
    }
    ErrorType::Unknown
}

pub fn failure(component: &str, action: &str, err: &anyhow::Error) -> ErrorType {
    let error_type = classify(err);
    tracing::error!(
        component,
        action,
        timestamp = %chrono::Utc::now().to_rfc3339(),
        error_type = ?error_type,
        "{:#}",
        err
    );
    error_type
}
