// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Wire and in-memory types shared by every stage of the pipeline.
//!
//! - [`FirehoseEvent`] / [`FirehoseRecord`]: the invocation as handed over by Firehose
//! - [`DeliveryUnit`] / [`LogEvent`]: one decoded CloudWatch Logs subscription record
//! - [`OutcomeRecord`] / [`InvocationResult`]: the per-record answer returned to Firehose
//! - [`SubmissionUnit`]: a record scheduled for resubmission onto the delivery stream

use serde::{Deserialize, Serialize};

use crate::constants::CONTROL_MESSAGE_TEXT;

/// `data` of an invocation record and `Data` of a PutRecordBatch entry travel
/// as standard base64 strings; in memory they are the gzip bytes.
pub(crate) mod record_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&base64::display::Base64Display::new(bytes, &STANDARD))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map_err(|e| D::Error::custom(format!("record bytes are not valid base64: {e}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    #[serde(rename = "DATA_MESSAGE")]
    Data,
    /// Health-check ping sent by CloudWatch Logs; never carries real logs.
    #[serde(rename = "CONTROL_MESSAGE")]
    Control,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub id: String,
    /// Milliseconds since the epoch.
    pub timestamp: i64,
    pub message: String,
}

impl LogEvent {
    #[must_use]
    pub fn is_control_message(&self) -> bool {
        self.message == CONTROL_MESSAGE_TEXT
    }
}

/// One CloudWatch Logs subscription record.
///
/// Values are never mutated once decoded; splitting produces new units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryUnit {
    /// Firehose record id. Not part of the CloudWatch payload.
    #[serde(skip)]
    pub unit_id: String,
    pub message_type: MessageType,
    pub owner: String,
    pub log_group: String,
    pub log_stream: String,
    #[serde(default)]
    pub subscription_filters: Vec<String>,
    pub log_events: Vec<LogEvent>,
}

impl DeliveryUnit {
    /// Copy of this unit carrying `log_events` instead of its own events.
    #[must_use]
    pub fn with_log_events(&self, log_events: Vec<LogEvent>) -> Self {
        DeliveryUnit {
            unit_id: self.unit_id.clone(),
            message_type: self.message_type,
            owner: self.owner.clone(),
            log_group: self.log_group.clone(),
            log_stream: self.log_stream.clone(),
            subscription_filters: self.subscription_filters.clone(),
            log_events,
        }
    }

    /// Splits the events in two; the first half gets `floor(n / 2)` of them.
    #[must_use]
    pub fn split_in_two(&self) -> (Self, Self) {
        let mid_point = self.log_events.len() / 2;
        let (first, second) = self.log_events.split_at(mid_point);
        (
            self.with_log_events(first.to_vec()),
            self.with_log_events(second.to_vec()),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FirehoseResult {
    Ok,
    Dropped,
    ProcessingFailed,
}

/// A record handed back to the delivery stream for a later invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubmissionUnit {
    #[serde(with = "record_bytes")]
    pub data: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<String>,
}

/// The decision taken for one input record in this invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeRecord {
    #[serde(rename = "recordId")]
    pub unit_id: String,
    pub result: FirehoseResult,
    /// Base64 payload forwarded downstream; present only for [`FirehoseResult::Ok`].
    #[serde(rename = "data", skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    /// Present only for [`FirehoseResult::Dropped`] records that were deferred.
    #[serde(skip)]
    pub deferred_units: Vec<SubmissionUnit>,
}

impl OutcomeRecord {
    #[must_use]
    pub fn ok(unit_id: String, payload: String) -> Self {
        OutcomeRecord {
            unit_id,
            result: FirehoseResult::Ok,
            payload: Some(payload),
            deferred_units: Vec::new(),
        }
    }

    #[must_use]
    pub fn dropped(unit_id: String) -> Self {
        Self::deferred(unit_id, Vec::new())
    }

    #[must_use]
    pub fn deferred(unit_id: String, deferred_units: Vec<SubmissionUnit>) -> Self {
        OutcomeRecord {
            unit_id,
            result: FirehoseResult::Dropped,
            payload: None,
            deferred_units,
        }
    }

    #[must_use]
    pub fn processing_failed(unit_id: String) -> Self {
        OutcomeRecord {
            unit_id,
            result: FirehoseResult::ProcessingFailed,
            payload: None,
            deferred_units: Vec::new(),
        }
    }

    /// Bytes this record adds to the invocation's response payload.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        match (&self.result, &self.payload) {
            (FirehoseResult::Ok, Some(payload)) => payload.len(),
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KinesisRecordMetadata {
    pub partition_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirehoseRecord {
    pub record_id: String,
    #[serde(default)]
    pub approximate_arrival_timestamp: Option<i64>,
    /// Gzip-compressed CloudWatch payload, base64-decoded on deserialization.
    #[serde(with = "record_bytes")]
    pub data: Vec<u8>,
    #[serde(default)]
    pub kinesis_record_metadata: Option<KinesisRecordMetadata>,
}

impl FirehoseRecord {
    #[must_use]
    pub fn partition_key(&self) -> Option<&str> {
        self.kinesis_record_metadata
            .as_ref()
            .and_then(|metadata| metadata.partition_key.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirehoseEvent {
    #[serde(default)]
    pub invocation_id: Option<String>,
    pub delivery_stream_arn: String,
    #[serde(default)]
    pub region: Option<String>,
    pub records: Vec<FirehoseRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationResult {
    pub records: Vec<OutcomeRecord>,
}
