// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Closed-schema validation of individual log events.
//!
//! A data event is accepted only when its message is a JSON object with exactly
//! the shape of [`LogTemplate`]: unknown keys, missing required keys and values
//! that do not survive a parse/render round trip (e.g. explicit `null` for an
//! optional key) are all rejected. Size is not considered here.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::REDACTED;
use crate::error::ValidationError;
use crate::model::LogEvent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    pub extra_fields: Map<String, Value>,
}

/// Shape every structured application log line must have.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogTemplate {
    pub correlation_id: String,
    pub nhsd_correlation_id: String,
    pub request_id: String,
    pub transaction_id: String,
    pub host: String,
    pub environment: String,
    pub index: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub log_level: String,
    pub log_reference: String,
    pub outcome: String,
    pub duration_ms: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    pub data: LogData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_stack: Option<String>,
    pub timestamp: String,
    pub sensitive: bool,
}

/// Checks one event. Control events are always valid.
pub fn validate(event: &LogEvent) -> Result<(), ValidationError> {
    if event.is_control_message() {
        return Ok(());
    }
    parse_log(event).map(|_| ())
}

/// Parses a data event against the closed schema.
pub fn parse_log(event: &LogEvent) -> Result<LogTemplate, ValidationError> {
    let raw: Value = serde_json::from_str(&event.message).map_err(ValidationError::NotJson)?;
    let parsed: LogTemplate =
        serde_json::from_value(raw.clone()).map_err(ValidationError::Schema)?;
    let rendered = serde_json::to_value(&parsed).map_err(ValidationError::Schema)?;
    if rendered != raw {
        return Err(ValidationError::FieldMismatch(rendered.to_string()));
    }
    Ok(parsed)
}

/// Validates a data event and returns the log object to emit downstream,
/// with `data` redacted when the log is marked sensitive.
pub fn accept(event: &LogEvent) -> Result<Value, ValidationError> {
    let log = parse_log(event)?;
    let sensitive = log.sensitive;
    let mut rendered = serde_json::to_value(log).map_err(ValidationError::Schema)?;
    if sensitive {
        if let Some(fields) = rendered.as_object_mut() {
            fields.insert("data".to_string(), Value::String(REDACTED.to_string()));
        }
    }
    Ok(rendered)
}
