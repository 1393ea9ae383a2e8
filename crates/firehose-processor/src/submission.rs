// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Pushes deferred records back onto the delivery stream.
//!
//! Records are sent in fixed-size groups. After each call only the records the
//! stream reported as failed are sent again, until either none are left or the
//! group has used up its attempts.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::constants;
use crate::error::{SubmissionError, TransportError};
use crate::model::SubmissionUnit;

/// Error code used when the stream answers with fewer entries than records sent.
pub const MISSING_RESPONSE_ENTRY: &str = "MissingResponseEntry";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutRecordBatchResponseEntry {
    #[serde(default)]
    pub record_id: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Answer to one batch put; `request_responses[i]` belongs to the i-th record sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutRecordBatchResponse {
    #[serde(default)]
    pub failed_put_count: usize,
    #[serde(default)]
    pub encrypted: Option<bool>,
    #[serde(default)]
    pub request_responses: Vec<PutRecordBatchResponseEntry>,
}

#[async_trait]
pub trait BatchTransport: Send + Sync {
    /// Sends one group of records to `stream_name`. Partial failures are reported
    /// in the response; only failures of the call as a whole are errors.
    async fn put_record_batch(
        &self,
        stream_name: &str,
        records: &[SubmissionUnit],
    ) -> Result<PutRecordBatchResponse, TransportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStrategy {
    /// Attempts per group, no pause in between.
    Immediate(u32),
    /// Attempts per group, and the pause in ms multiplied by the attempt number.
    LinearBackoff(u32, u64),
}

impl Default for RetryStrategy {
    fn default() -> Self {
        RetryStrategy::Immediate(constants::DEFAULT_MAX_SUBMISSION_ATTEMPTS)
    }
}

impl RetryStrategy {
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        match self {
            RetryStrategy::Immediate(attempts) | RetryStrategy::LinearBackoff(attempts, _) => {
                *attempts
            }
        }
    }

    async fn pause(&self, attempt: u32) {
        if let RetryStrategy::LinearBackoff(_, delay_ms) = self {
            let backoff = delay_ms.saturating_mul(u64::from(attempt));
            if backoff > 0 {
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
        }
    }
}

/// Records of a group still failing, with the error codes of the last attempt.
struct FailedSubset {
    units: Vec<SubmissionUnit>,
    error_codes: BTreeSet<String>,
}

fn failed_subset(units: &[SubmissionUnit], response: &PutRecordBatchResponse) -> FailedSubset {
    let mut failed = FailedSubset {
        units: Vec::new(),
        error_codes: BTreeSet::new(),
    };
    for (i, unit) in units.iter().enumerate() {
        let code = match response.request_responses.get(i) {
            Some(entry) => match &entry.error_code {
                Some(code) => code.clone(),
                None => continue,
            },
            None => MISSING_RESPONSE_ENTRY.to_string(),
        };
        failed.units.push(unit.clone());
        failed.error_codes.insert(code);
    }
    failed
}

#[derive(Clone)]
pub struct ResubmissionClient {
    transport: Arc<dyn BatchTransport>,
    stream_name: String,
    group_size: usize,
    retry_strategy: RetryStrategy,
}

impl ResubmissionClient {
    #[must_use]
    pub fn new(
        transport: Arc<dyn BatchTransport>,
        stream_name: String,
        group_size: usize,
        retry_strategy: RetryStrategy,
    ) -> Self {
        ResubmissionClient {
            transport,
            stream_name,
            group_size: group_size.clamp(1, constants::MAX_TRANSPORT_GROUP_SIZE),
            retry_strategy,
        }
    }

    #[must_use]
    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    /// Submits every unit, group by group, in order.
    ///
    /// Returns the number of units submitted. Fails on the first group that
    /// cannot be delivered within the attempt limit; earlier groups stay
    /// delivered.
    pub async fn resubmit(&self, units: Vec<SubmissionUnit>) -> Result<usize, SubmissionError> {
        if units.is_empty() {
            return Ok(0);
        }
        info!(
            "FIREHOSE | Resubmitting {} records to {}",
            units.len(),
            self.stream_name
        );
        for group in units.chunks(self.group_size) {
            self.submit_group(group).await?;
        }
        Ok(units.len())
    }

    async fn submit_group(&self, group: &[SubmissionUnit]) -> Result<(), SubmissionError> {
        let max_attempts = self.retry_strategy.max_attempts();
        let mut pending = group.to_vec();
        let mut attempts = 0;

        loop {
            attempts += 1;
            let last_failure = match self
                .transport
                .put_record_batch(&self.stream_name, &pending)
                .await
            {
                Ok(response) => {
                    let failed = failed_subset(&pending, &response);
                    if failed.units.is_empty() {
                        debug!(
                            "FIREHOSE | Put {} records on attempt {}",
                            pending.len(),
                            attempts
                        );
                        return Ok(());
                    }
                    let error_codes = failed.error_codes.into_iter().collect::<Vec<_>>().join(",");
                    warn!(
                        "FIREHOSE | {} of {} records failed on attempt {}/{}: {}",
                        failed.units.len(),
                        pending.len(),
                        attempts,
                        max_attempts,
                        error_codes
                    );
                    pending = failed.units;
                    SubmissionError::AttemptsExhausted {
                        attempts,
                        error_codes,
                    }
                }
                Err(e) => {
                    warn!(
                        "FIREHOSE | Batch put failed on attempt {}/{}: {}",
                        attempts, max_attempts, e
                    );
                    SubmissionError::Transport {
                        attempts,
                        source: e,
                    }
                }
            };

            if attempts >= max_attempts {
                error!("FIREHOSE | {}", last_failure);
                return Err(last_failure);
            }
            self.retry_strategy.pause(attempts).await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tracing_test::traced_test;

    /// Answers calls from a script; once the script runs out every record succeeds.
    #[derive(Default)]
    struct FakeTransport {
        script: Mutex<VecDeque<Result<Vec<Option<&'static str>>, String>>>,
        calls: Mutex<Vec<Vec<SubmissionUnit>>>,
        fail_forever: Option<&'static str>,
    }

    impl FakeTransport {
        fn scripted(script: Vec<Result<Vec<Option<&'static str>>, String>>) -> Self {
            FakeTransport {
                script: Mutex::new(script.into()),
                ..Default::default()
            }
        }

        fn failing_forever(code: &'static str) -> Self {
            FakeTransport {
                fail_forever: Some(code),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<Vec<SubmissionUnit>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BatchTransport for FakeTransport {
        async fn put_record_batch(
            &self,
            stream_name: &str,
            records: &[SubmissionUnit],
        ) -> Result<PutRecordBatchResponse, TransportError> {
            assert_eq!(stream_name, "my-stream");
            self.calls.lock().unwrap().push(records.to_vec());

            let codes: Vec<Option<&str>> = if let Some(code) = self.fail_forever {
                vec![Some(code); records.len()]
            } else {
                match self.script.lock().unwrap().pop_front() {
                    Some(Ok(codes)) => codes,
                    Some(Err(message)) => return Err(TransportError::Other(message)),
                    None => vec![None; records.len()],
                }
            };

            Ok(PutRecordBatchResponse {
                failed_put_count: codes.iter().filter(|c| c.is_some()).count(),
                encrypted: None,
                request_responses: codes
                    .into_iter()
                    .map(|code| PutRecordBatchResponseEntry {
                        record_id: code.is_none().then(|| "id".to_string()),
                        error_code: code.map(str::to_string),
                        error_message: code.map(|_| "failed".to_string()),
                    })
                    .collect(),
            })
        }
    }

    fn units(count: usize) -> Vec<SubmissionUnit> {
        (0..count)
            .map(|i| SubmissionUnit {
                data: format!("unit-{i}").into_bytes(),
                partition_key: Some("my-stream".to_string()),
            })
            .collect()
    }

    fn client(
        transport: &Arc<FakeTransport>,
        group_size: usize,
        attempts: u32,
    ) -> ResubmissionClient {
        ResubmissionClient::new(
            transport.clone(),
            "my-stream".to_string(),
            group_size,
            RetryStrategy::Immediate(attempts),
        )
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_calls() {
        let transport = Arc::new(FakeTransport::default());

        let submitted = client(&transport, 500, 20).resubmit(Vec::new()).await.unwrap();

        assert_eq!(submitted, 0);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_all_succeed_first_time() {
        let transport = Arc::new(FakeTransport::default());

        let submitted = client(&transport, 500, 20).resubmit(units(5)).await.unwrap();

        assert_eq!(submitted, 5);
        assert_eq!(transport.calls(), vec![units(5)]);
    }

    #[tokio::test]
    async fn test_only_failed_subset_is_retried() {
        let transport = Arc::new(FakeTransport::scripted(vec![Ok(vec![
            None,
            Some("ServiceUnavailableException"),
            None,
            Some("InternalFailure"),
            None,
        ])]));
        let input = units(5);

        let submitted = client(&transport, 500, 20).resubmit(input.clone()).await.unwrap();

        assert_eq!(submitted, 5);
        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], vec![input[1].clone(), input[3].clone()]);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_exhaustion_after_exact_attempts() {
        let transport = Arc::new(FakeTransport::failing_forever("ServiceUnavailableException"));

        let result = client(&transport, 500, 20).resubmit(units(3)).await;

        assert_eq!(transport.calls().len(), 20);
        match result {
            Err(SubmissionError::AttemptsExhausted {
                attempts,
                error_codes,
            }) => {
                assert_eq!(attempts, 20);
                assert_eq!(error_codes, "ServiceUnavailableException");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(logs_contain("Could not put records after 20 attempts"));
    }

    #[tokio::test]
    async fn test_exhaustion_joins_distinct_error_codes() {
        let transport = Arc::new(FakeTransport::scripted(vec![
            Ok(vec![Some("A"), Some("B")]),
            Ok(vec![Some("B"), Some("A")]),
        ]));

        let error = client(&transport, 500, 2)
            .resubmit(units(2))
            .await
            .unwrap_err();

        assert_eq!(
            error.to_string(),
            "Could not put records after 2 attempts. Individual error codes: A,B"
        );
    }

    #[tokio::test]
    async fn test_transport_error_is_retried() {
        let transport = Arc::new(FakeTransport::scripted(vec![
            Err("connection reset".to_string()),
            Err("connection reset".to_string()),
        ]));

        let submitted = client(&transport, 500, 3).resubmit(units(4)).await.unwrap();

        assert_eq!(submitted, 4);
        let calls = transport.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|call| call.len() == 4));
    }

    #[tokio::test]
    async fn test_transport_error_on_last_attempt_is_fatal() {
        let transport = Arc::new(FakeTransport::scripted(vec![
            Ok(vec![Some("A"), None]),
            Err("timeout".to_string()),
        ]));

        let error = client(&transport, 500, 2)
            .resubmit(units(2))
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            SubmissionError::Transport { attempts: 2, .. }
        ));
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_response_entries_count_as_failed() {
        let transport = Arc::new(FakeTransport::scripted(vec![Ok(vec![None])]));
        let input = units(3);

        client(&transport, 500, 5).resubmit(input.clone()).await.unwrap();

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], input[1..].to_vec());
    }

    #[tokio::test]
    async fn test_groups_are_fixed_size_and_ordered() {
        let transport = Arc::new(FakeTransport::default());
        let input = units(7);

        let submitted = client(&transport, 3, 20).resubmit(input.clone()).await.unwrap();

        assert_eq!(submitted, 7);
        let calls = transport.calls();
        assert_eq!(
            calls.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![3, 3, 1]
        );
        assert_eq!(calls.concat(), input);
    }

    #[tokio::test]
    async fn test_group_failure_stops_later_groups() {
        let transport = Arc::new(FakeTransport::failing_forever("A"));

        let result = client(&transport, 2, 1).resubmit(units(6)).await;

        assert!(result.is_err());
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_linear_backoff_keeps_attempt_count() {
        let transport = Arc::new(FakeTransport::failing_forever("A"));
        let client = ResubmissionClient::new(
            transport.clone(),
            "my-stream".to_string(),
            500,
            RetryStrategy::LinearBackoff(3, 1),
        );

        assert!(client.resubmit(units(1)).await.is_err());
        assert_eq!(transport.calls().len(), 3);
    }

    #[test]
    fn test_group_size_is_capped() {
        let transport = Arc::new(FakeTransport::default());
        assert_eq!(client(&transport, 10_000, 1).group_size, 500);
        assert_eq!(client(&transport, 0, 1).group_size, 1);
    }

    #[test]
    fn test_response_deserialization() {
        let response: PutRecordBatchResponse = serde_json::from_str(
            r#"{
                "FailedPutCount": 1,
                "Encrypted": false,
                "RequestResponses": [
                    {"RecordId": "abc"},
                    {"ErrorCode": "ServiceUnavailableException", "ErrorMessage": "Slow down."}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(response.failed_put_count, 1);
        assert_eq!(response.encrypted, Some(false));
        assert_eq!(response.request_responses[0].record_id.as_deref(), Some("abc"));
        assert_eq!(
            response.request_responses[1].error_code.as_deref(),
            Some("ServiceUnavailableException")
        );
    }
}
