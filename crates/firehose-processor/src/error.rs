// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// A delivery record that cannot be turned into a [`crate::model::DeliveryUnit`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Failed to decompress record: {0}")]
    Decompress(#[source] std::io::Error),

    #[error("Failed to parse record: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("Record contains no log events")]
    NoLogEvents,

    #[error("Data message contains a control message event")]
    ControlEventInDataMessage,

    #[error("Control message contains a non-control event")]
    DataEventInControlMessage,
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to compress record: {0}")]
    Compress(#[from] std::io::Error),
}

/// A single log event rejected by the closed log schema.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Log message is not JSON: {0}")]
    NotJson(#[source] serde_json::Error),

    #[error("Log message does not match the log schema: {0}")]
    Schema(#[source] serde_json::Error),

    #[error("Field mismatch between parsed and provided log. Parsed log: {0}")]
    FieldMismatch(String),
}

/// Failure of one `PutRecordBatch` call as a whole.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unreadable response: {0}")]
    Response(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Resubmission gave up; the invocation must be treated as failed.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("Could not put records after {attempts} attempts. Individual error codes: {error_codes}")]
    AttemptsExhausted { attempts: u32, error_codes: String },

    #[error("Transport failed after {attempts} attempts: {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: TransportError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid value for {var}: '{value}'")]
    InvalidValue { var: &'static str, value: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}
