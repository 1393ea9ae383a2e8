// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `PutRecordBatch` over HTTP, using the JSON 1.1 protocol of the Firehose API.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Instant;
use tracing::debug;

use crate::config::ProcessorConfig;
use crate::constants::PUT_RECORD_BATCH_TARGET;
use crate::error::{ConfigError, TransportError};
use crate::http::build_client;
use crate::model::SubmissionUnit;
use crate::submission::{BatchTransport, PutRecordBatchResponse};

const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PutRecordBatchRequest<'a> {
    delivery_stream_name: &'a str,
    records: &'a [SubmissionUnit],
}

/// Sends batches to a Firehose-compatible endpoint.
///
/// The client is shared by every invocation served by the process; it keeps no
/// state of its own besides connections.
#[derive(Clone, Debug)]
pub struct HttpBatchTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpBatchTransport {
    #[must_use]
    pub fn new(client: reqwest::Client, endpoint: String) -> Self {
        HttpBatchTransport { client, endpoint }
    }

    pub fn from_config(config: &ProcessorConfig) -> Result<Self, ConfigError> {
        let client = build_client(config.https_proxy.as_deref(), config.request_timeout())
            .map_err(ConfigError::HttpClient)?;
        Ok(Self::new(client, config.endpoint()))
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl BatchTransport for HttpBatchTransport {
    async fn put_record_batch(
        &self,
        stream_name: &str,
        records: &[SubmissionUnit],
    ) -> Result<PutRecordBatchResponse, TransportError> {
        let body = serde_json::to_vec(&PutRecordBatchRequest {
            delivery_stream_name: stream_name,
            records,
        })
        .map_err(|e| TransportError::Other(format!("Failed to serialize request: {e}")))?;

        let start = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Amz-Target", PUT_RECORD_BATCH_TARGET)
            .header("Content-Type", CONTENT_TYPE)
            .body(body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(
            "FIREHOSE | PutRecordBatch of {} records answered {} in {} ms",
            records.len(),
            status,
            start.elapsed().as_millis()
        );

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(serde_json::from_str(&text)?)
    }
}
