//! Tagged result returned by every public operation.

use serde::Serialize;

use crate::error::Result;

/// `{success, message?, data, error?}`
///
/// `data` is always present on the wire; it is `null` on failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Convert an operation result into an envelope, logging failures.
    pub fn capture(operation: &str, result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => {
                if e.is_transport() {
                    log::error!("[{}] transport failure: {}", operation, e);
                } else {
                    log::error!("[{}] {}", operation, e);
                }
                Self::failure(e.to_string())
            }
        }
    }
}
