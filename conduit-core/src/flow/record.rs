use crate::error::CallableError;
use chrono::Utc;
use serde_json::{json, Map, Value};

/// One unit of event data: an ordered mapping of string keys to JSON values.
pub type Record = Map<String, Value>;

/// Key under which failed records carry their error annotation.
pub const ERROR_FIELD: &str = "_error";

/// Annotates a record with the type and message of the error it failed with,
/// plus the failure time so downstream consumers can expire it.
#[must_use]
pub fn annotate_error(mut record: Record, error: &CallableError) -> Record {
    record.insert(
        ERROR_FIELD.to_string(),
        json!({
            "type": error.kind(),
            "message": error.detail(),
            "failed_at": Utc::now().to_rfc3339(),
        }),
    );
    record
}

/// Pretty JSON rendering used in log lines.
#[must_use]
pub fn pretty(record: &Record) -> String {
    serde_json::to_string_pretty(record).unwrap_or_else(|_| format!("{record:?}"))
}
