// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mock Firehose endpoint and transport wiring

use firehose_processor::config::ProcessorConfig;
use firehose_processor::constants::PUT_RECORD_BATCH_TARGET;
use firehose_processor::handler::FirehoseHandler;
use firehose_processor::transport::HttpBatchTransport;
use mockito::{Matcher, Mock, ServerGuard};
use serde_json::{json, Value};
use std::sync::Arc;

/// Response body accepting every one of `count` records.
pub fn all_accepted(count: usize) -> String {
    json!({
        "FailedPutCount": 0,
        "Encrypted": false,
        "RequestResponses": (0..count)
            .map(|i| json!({"RecordId": format!("record-{i}")}))
            .collect::<Vec<_>>()
    })
    .to_string()
}

/// Response body where the records at `failed` report `error_code`.
pub fn partially_failed(count: usize, failed: &[usize], error_code: &str) -> String {
    json!({
        "FailedPutCount": failed.len(),
        "RequestResponses": (0..count)
            .map(|i| if failed.contains(&i) {
                json!({"ErrorCode": error_code, "ErrorMessage": "Try again"})
            } else {
                json!({"RecordId": format!("record-{i}")})
            })
            .collect::<Vec<_>>()
    })
    .to_string()
}

/// PutRecordBatch mock answering `status`/`body` to requests whose body matches
/// `request`, expected to be hit `hits` times.
pub async fn mock_put_record_batch(
    server: &mut ServerGuard,
    request: Matcher,
    status: usize,
    body: String,
    hits: usize,
) -> Mock {
    server
        .mock("POST", "/")
        .match_header("X-Amz-Target", PUT_RECORD_BATCH_TARGET)
        .match_header("Content-Type", "application/x-amz-json-1.1")
        .match_body(request)
        .with_status(status)
        .with_body(body)
        .expect(hits)
        .create_async()
        .await
}

/// Matches requests putting exactly `count` records onto the test stream.
pub fn records_matcher(count: usize) -> Matcher {
    Matcher::Regex(format!(
        r#"^\{{"DeliveryStreamName":"my-stream","Records":\[(\{{[^}}]*\}},?){{{count}}}\]\}}$"#
    ))
}

pub fn request_body(records: Vec<Value>) -> Matcher {
    Matcher::Json(json!({"DeliveryStreamName": "my-stream", "Records": records}))
}

/// Handler talking HTTP to `server`.
pub fn handler(server: &ServerGuard, config: ProcessorConfig) -> FirehoseHandler {
    let config = ProcessorConfig {
        endpoint: Some(server.url()),
        ..config
    };
    let transport = HttpBatchTransport::from_config(&config).unwrap();
    FirehoseHandler::new(&config, Arc::new(transport))
}
