// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-invocation processing of delivery records.
//!
//! Records are handled strictly in input order: earlier records get first claim
//! on the remaining response space, so this loop must stay sequential.
//!
//! For every record:
//! 1. Decode it; failure gives `ProcessingFailed`.
//! 2. Drop control messages (`Dropped`, no deferral, no size used).
//! 3. Validate each event, keeping only the accepted ones.
//! 4. Encode the accepted events and ask the [`SizeGuard`] where they go.

use tracing::{debug, error, warn};

use crate::codec;
use crate::model::{
    DeliveryUnit, FirehoseRecord, LogEvent, MessageType, OutcomeRecord, SubmissionUnit,
};
use crate::size_guard::{Decision, SizeGuard, SizeLimits};
use crate::validator;

/// Outcomes for one invocation plus everything that must be resubmitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedBatch {
    /// One entry per input record, in input order.
    pub outcomes: Vec<OutcomeRecord>,
    /// Deferred units of all outcomes, flattened in outcome order.
    pub deferred: Vec<SubmissionUnit>,
    /// Payload bytes accepted in this invocation.
    pub total_bytes: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchProcessor {
    limits: SizeLimits,
}

impl BatchProcessor {
    #[must_use]
    pub fn new(limits: SizeLimits) -> Self {
        BatchProcessor { limits }
    }

    /// Processes all records of one invocation.
    ///
    /// `fallback_partition_key` is used for deferred units of records that carry
    /// no partition key of their own.
    #[must_use]
    pub fn process(
        &self,
        records: &[FirehoseRecord],
        fallback_partition_key: Option<&str>,
    ) -> ProcessedBatch {
        let mut guard = SizeGuard::new(self.limits);
        let mut outcomes = Vec::with_capacity(records.len());

        for record in records {
            let partition_key = record
                .partition_key()
                .or(fallback_partition_key)
                .map(str::to_string);
            outcomes.push(Self::process_record(record, partition_key, &mut guard));
        }

        let deferred = outcomes
            .iter()
            .flat_map(|outcome| outcome.deferred_units.iter().cloned())
            .collect();

        ProcessedBatch {
            outcomes,
            deferred,
            total_bytes: guard.running_total_bytes(),
        }
    }

    fn process_record(
        record: &FirehoseRecord,
        partition_key: Option<String>,
        guard: &mut SizeGuard,
    ) -> OutcomeRecord {
        let unit = match codec::decode(&record.data, &record.record_id) {
            Ok(unit) => unit,
            Err(e) => {
                warn!(
                    "FIREHOSE | Failed to decode record {}: {}",
                    record.record_id, e
                );
                return OutcomeRecord::processing_failed(record.record_id.clone());
            }
        };

        match unit.message_type {
            MessageType::Control => {
                debug!(
                    "FIREHOSE | Dropping control message {}",
                    record.record_id
                );
                OutcomeRecord::dropped(unit.unit_id)
            }
            MessageType::Data => Self::process_data_unit(unit, partition_key, guard),
        }
    }

    fn process_data_unit(
        unit: DeliveryUnit,
        partition_key: Option<String>,
        guard: &mut SizeGuard,
    ) -> OutcomeRecord {
        let mut accepted_events: Vec<LogEvent> = Vec::with_capacity(unit.log_events.len());
        let mut logs = Vec::with_capacity(unit.log_events.len());
        for event in &unit.log_events {
            match validator::accept(event) {
                Ok(log) => {
                    accepted_events.push(event.clone());
                    logs.push(log);
                }
                Err(e) => warn!(
                    "FIREHOSE | Rejected log event {} of record {}: {}",
                    event.id, unit.unit_id, e
                ),
            }
        }

        let payload = codec::encode_payload(&logs);
        match guard.admit(payload.len(), accepted_events.len()) {
            Decision::Fits => OutcomeRecord::ok(unit.unit_id, payload),
            Decision::PermanentlyTooLarge => {
                error!(
                    "FIREHOSE | Record {} holds a single event of {} bytes, which can never fit under {} bytes",
                    unit.unit_id,
                    payload.len(),
                    guard.limits().max_unit_bytes
                );
                OutcomeRecord::processing_failed(unit.unit_id)
            }
            Decision::SplittableTooLarge => {
                let (first, second) = unit.with_log_events(accepted_events).split_in_two();
                debug!(
                    "FIREHOSE | Splitting record {} into {} and {} events",
                    unit.unit_id,
                    first.log_events.len(),
                    second.log_events.len()
                );
                Self::defer(&unit.unit_id, &[first, second], partition_key)
            }
            Decision::NoSpaceLeft => {
                debug!(
                    "FIREHOSE | No space left for record {}, deferring it",
                    unit.unit_id
                );
                Self::defer(&unit.unit_id, std::slice::from_ref(&unit), partition_key)
            }
        }
    }

    fn defer(
        unit_id: &str,
        units: &[DeliveryUnit],
        partition_key: Option<String>,
    ) -> OutcomeRecord {
        let mut deferred_units = Vec::with_capacity(units.len());
        for unit in units {
            match codec::encode(unit) {
                Ok(data) => deferred_units.push(SubmissionUnit {
                    data,
                    partition_key: partition_key.clone(),
                }),
                Err(e) => {
                    error!("FIREHOSE | Failed to encode record {}: {}", unit_id, e);
                    return OutcomeRecord::processing_failed(unit_id.to_string());
                }
            }
        }
        OutcomeRecord::deferred(unit_id.to_string(), deferred_units)
    }
}
