// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use tracing::{debug, info};

use crate::codec::name_from_arn;
use crate::config::ProcessorConfig;
use crate::error::SubmissionError;
use crate::model::{FirehoseEvent, FirehoseResult, InvocationResult};
use crate::processor::BatchProcessor;
use crate::submission::{BatchTransport, ResubmissionClient, RetryStrategy};

/// Entry point for one Firehose transformation invocation.
///
/// Holds nothing that belongs to a single invocation, so one handler (and its
/// transport connections) can serve every invocation of the process.
#[derive(Clone)]
pub struct FirehoseHandler {
    processor: BatchProcessor,
    transport: Arc<dyn BatchTransport>,
    submission_group_size: usize,
    retry_strategy: RetryStrategy,
}

impl FirehoseHandler {
    #[must_use]
    pub fn new(config: &ProcessorConfig, transport: Arc<dyn BatchTransport>) -> Self {
        FirehoseHandler {
            processor: BatchProcessor::new(config.size_limits()),
            transport,
            submission_group_size: config.submission_group_size,
            retry_strategy: config.retry_strategy(),
        }
    }

    /// Processes the records, resubmits whatever was deferred and returns one
    /// outcome per record.
    ///
    /// The outcomes describe what this invocation decided; they are returned
    /// unchanged whether or not anything had to be resubmitted. A resubmission
    /// that gives up fails the whole invocation.
    pub async fn handle(&self, event: FirehoseEvent) -> Result<InvocationResult, SubmissionError> {
        let stream_name = name_from_arn(&event.delivery_stream_arn);
        debug!(
            "FIREHOSE | Invocation {} with {} records from {}",
            event.invocation_id.as_deref().unwrap_or("-"),
            event.records.len(),
            stream_name
        );

        let batch = self.processor.process(&event.records, Some(stream_name));

        let count = |result: FirehoseResult| {
            batch
                .outcomes
                .iter()
                .filter(|outcome| outcome.result == result)
                .count()
        };
        info!(
            "FIREHOSE | {} ok ({} bytes), {} dropped, {} failed, {} to resubmit",
            count(FirehoseResult::Ok),
            batch.total_bytes,
            count(FirehoseResult::Dropped),
            count(FirehoseResult::ProcessingFailed),
            batch.deferred.len()
        );

        let client = ResubmissionClient::new(
            Arc::clone(&self.transport),
            stream_name.to_string(),
            self.submission_group_size,
            self.retry_strategy,
        );
        client.resubmit(batch.deferred).await?;

        Ok(InvocationResult {
            records: batch.outcomes,
        })
    }
}
