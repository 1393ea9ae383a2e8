// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Size, batching and retry limits of the Firehose boundary.
//!
//! Every value here is a default; [`crate::config::ProcessorConfig`] can override
//! all of them from the environment.

/// Documented hard limit of a Firehose transformation response, in bytes.
///
/// Responses larger than this are rejected by Firehose as a whole, which fails
/// every record in the invocation.
pub const DEFAULT_TRANSPORT_LIMIT_BYTES: usize = 6_291_456;

/// Ceiling on the cumulative payload size of all `Ok` records in one invocation.
///
/// Deliberately kept below [`DEFAULT_TRANSPORT_LIMIT_BYTES`] to leave headroom for
/// the response envelope (record ids, JSON framing).
pub const DEFAULT_MAX_BATCH_BYTES: usize = 6_000_000;

/// Ceiling on the payload size of a single record.
pub const DEFAULT_MAX_UNIT_BYTES: usize = DEFAULT_MAX_BATCH_BYTES;

/// Number of records sent per `PutRecordBatch` call.
pub const DEFAULT_SUBMISSION_GROUP_SIZE: usize = 500;

/// `PutRecordBatch` refuses calls with more records than this.
pub const MAX_TRANSPORT_GROUP_SIZE: usize = 500;

/// Transport calls made for one group before resubmission fails the invocation.
pub const DEFAULT_MAX_SUBMISSION_ATTEMPTS: u32 = 20;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_REGION: &str = "eu-west-2";

/// Text CloudWatch Logs sends in place of log lines when probing the destination.
pub const CONTROL_MESSAGE_TEXT: &str =
    "CWL CONTROL MESSAGE: Checking health of destination Firehose.";

/// Replacement for the `data` field of sensitive logs in emitted payloads.
pub const REDACTED: &str = "REDACTED";

pub const PUT_RECORD_BATCH_TARGET: &str = "Firehose_20150804.PutRecordBatch";
