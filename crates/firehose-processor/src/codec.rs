// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Conversion between delivery records and their wire formats.
//!
//! - [`decode`] / [`encode`]: gzip-compressed CloudWatch Logs JSON <-> [`DeliveryUnit`]
//! - [`encode_payload`]: accepted logs -> base64 newline-delimited `{"event": ...}` lines

use base64::Engine;
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde_json::Value;
use std::io::{Read, Write};

use crate::error::{DecodeError, EncodeError};
use crate::model::{DeliveryUnit, MessageType};

/// Decodes one gzip-compressed CloudWatch Logs record.
///
/// Fails when the bytes are not gzip, the JSON does not have the subscription
/// record shape, the record has no events, or its message type disagrees with
/// its events (a data message carrying the control text or the reverse).
pub fn decode(data: &[u8], unit_id: &str) -> Result<DeliveryUnit, DecodeError> {
    let mut decoder = GzDecoder::new(data);
    let mut json = Vec::new();
    decoder
        .read_to_end(&mut json)
        .map_err(DecodeError::Decompress)?;

    let mut unit: DeliveryUnit = serde_json::from_slice(&json).map_err(DecodeError::Parse)?;
    unit.unit_id = unit_id.to_string();

    if unit.log_events.is_empty() {
        return Err(DecodeError::NoLogEvents);
    }
    match unit.message_type {
        MessageType::Data if unit.log_events.iter().any(|e| e.is_control_message()) => {
            Err(DecodeError::ControlEventInDataMessage)
        }
        MessageType::Control if !unit.log_events.iter().all(|e| e.is_control_message()) => {
            Err(DecodeError::DataEventInControlMessage)
        }
        _ => Ok(unit),
    }
}

/// Encodes a unit back into the format accepted by [`decode`].
pub fn encode(unit: &DeliveryUnit) -> Result<Vec<u8>, EncodeError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    serde_json::to_writer(&mut encoder, unit)?;
    encoder.flush()?;
    Ok(encoder.finish()?)
}

/// Renders accepted logs as the payload of an `Ok` record.
///
/// Each log becomes one `{"event": <log>}` line; the joined lines are base64
/// encoded. No logs gives an empty payload.
#[must_use]
pub fn encode_payload(logs: &[Value]) -> String {
    let mut buffer = String::new();
    for (i, log) in logs.iter().enumerate() {
        if i > 0 {
            buffer.push('\n');
        }
        buffer.push_str(&serde_json::json!({ "event": log }).to_string());
    }
    base64::engine::general_purpose::STANDARD.encode(buffer.as_bytes())
}

/// Last `/`-separated segment of a stream identifier such as a delivery stream ARN.
#[must_use]
pub fn name_from_arn(arn: &str) -> &str {
    arn.rsplit('/').next().unwrap_or(arn)
}
