// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Builders for invocation events and readers for invocation results

use base64::Engine;
use firehose_processor::codec;
use firehose_processor::constants::CONTROL_MESSAGE_TEXT;
use firehose_processor::model::{DeliveryUnit, FirehoseEvent, LogEvent, MessageType};
use serde_json::{json, Value};

pub const STREAM_ARN: &str = "arn:aws:firehose:eu-west-2:123456789012:deliverystream/my-stream";

/// A log line that satisfies the closed log schema.
pub fn log_line(i: usize, sensitive: bool) -> String {
    json!({
        "correlation_id": format!("correlation-{i}"),
        "nhsd_correlation_id": "nhsd-1",
        "request_id": "request-1",
        "transaction_id": "transaction-1",
        "host": "123456789012",
        "environment": "dev",
        "index": "logs",
        "source": "api",
        "log_level": "INFO",
        "log_reference": "API001",
        "outcome": "SUCCESS",
        "duration_ms": 3,
        "message": "Request handled",
        "data": {"inputs": {"secret": "s3cr3t"}, "extra_fields": {}},
        "timestamp": "2024-01-01T00:00:00.000Z",
        "sensitive": sensitive
    })
    .to_string()
}

pub fn data_messages(count: usize) -> Vec<String> {
    (0..count).map(|i| log_line(i, false)).collect()
}

pub fn control_messages() -> Vec<String> {
    vec![CONTROL_MESSAGE_TEXT.to_string()]
}

/// Base64 `data` of an envelope record holding `messages`.
pub fn record_data(message_type: MessageType, messages: Vec<String>) -> String {
    let unit = DeliveryUnit {
        unit_id: String::new(),
        message_type,
        owner: "123456789012".to_string(),
        log_group: "/aws/lambda/api".to_string(),
        log_stream: "2024/01/01/[$LATEST]abc".to_string(),
        subscription_filters: vec!["to-firehose".to_string()],
        log_events: messages
            .into_iter()
            .enumerate()
            .map(|(i, message)| LogEvent {
                id: format!("event-{i}"),
                timestamp: 1_700_000_000_000 + i as i64,
                message,
            })
            .collect(),
    };
    base64::engine::general_purpose::STANDARD.encode(codec::encode(&unit).unwrap())
}

/// Raw invocation JSON, as Firehose would send it.
pub fn event_json(records: Vec<(&str, String)>) -> Value {
    json!({
        "invocationId": "invocation-1",
        "deliveryStreamArn": STREAM_ARN,
        "region": "eu-west-2",
        "records": records
            .into_iter()
            .map(|(record_id, data)| json!({
                "recordId": record_id,
                "approximateArrivalTimestamp": 1_700_000_000_000i64,
                "data": data
            }))
            .collect::<Vec<_>>()
    })
}

pub fn event(records: Vec<(&str, String)>) -> FirehoseEvent {
    serde_json::from_value(event_json(records)).unwrap()
}

/// Logs carried by the `data` of an `Ok` result record.
pub fn decode_payload(data: &str) -> Vec<Value> {
    let text = base64::engine::general_purpose::STANDARD
        .decode(data)
        .unwrap();
    String::from_utf8(text)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str::<Value>(line).unwrap()["event"].clone())
        .collect()
}

/// Payload length of `count` lines built by [`data_messages`].
pub fn payload_len(count: usize) -> usize {
    let logs: Vec<Value> = data_messages(count)
        .iter()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    codec::encode_payload(&logs).len()
}
