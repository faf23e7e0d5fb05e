use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Structured error body returned for every intercepted failure.
///
/// Field names are part of the wire contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub timestamp: NaiveDateTime,
    pub path: String,
    pub method: String,
    pub status: u16,
    /// Reason phrase for `status`, e.g. "Bad Request".
    pub error: String,
    pub message: String,
    /// Concrete failure kind name, e.g. "`RuntimeException`".
    pub exception: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Message used when a failure carries no text of its own.
pub const DEFAULT_ERROR_MESSAGE: &str = "An error occurred";

impl ErrorRecord {
    /// Builds a record stamped with the local wall clock.
    ///
    /// An empty `message` is replaced by [`DEFAULT_ERROR_MESSAGE`].
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        method: impl Into<String>,
        status: u16,
        error: impl Into<String>,
        message: impl Into<String>,
        exception: impl Into<String>,
        request_id: Option<String>,
    ) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = DEFAULT_ERROR_MESSAGE.to_string();
        }
        Self {
            timestamp: Local::now().naive_local(),
            path: path.into(),
            method: method.into(),
            status,
            error: error.into(),
            message,
            exception: exception.into(),
            request_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(request_id: Option<String>) -> ErrorRecord {
        ErrorRecord::new(
            "/api/users/test-error",
            "GET",
            500,
            "Internal Server Error",
            "boom",
            "RuntimeException",
            request_id,
        )
    }

    #[test]
    fn serializes_wire_field_names() {
        let value = serde_json::to_value(record(Some("abc".into()))).unwrap();
        for field in [
            "timestamp",
            "path",
            "method",
            "status",
            "error",
            "message",
            "exception",
            "requestId",
        ] {
            assert!(value.get(field).is_some(), "missing {field}");
        }
        assert_eq!(value["status"], 500);
        assert_eq!(value["requestId"], "abc");
    }

    #[test]
    fn omits_absent_request_id() {
        let value = serde_json::to_value(record(None)).unwrap();
        assert!(value.get("requestId").is_none());
    }

    #[test]
    fn blank_message_is_replaced() {
        let rec = ErrorRecord::new("/", "GET", 500, "Internal Server Error", "  ", "X", None);
        assert_eq!(rec.message, DEFAULT_ERROR_MESSAGE);
    }
}
