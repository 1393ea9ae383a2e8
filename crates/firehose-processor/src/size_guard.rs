// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Size accounting for the records returned by one invocation.
//!
//! Firehose rejects a transformation response above a hard size limit, which
//! fails every record in it. Each candidate payload is therefore classified
//! against two ceilings before it is accepted:
//!
//! 1. **Unit ceiling**: a single payload at or above `max_unit_bytes` (capped at
//!    `max_batch_bytes`) never fits.
//!    With one event it is rejected for good, otherwise it is split in two.
//! 2. **Batch ceiling**: a payload that would take the running total to or above
//!    `max_batch_bytes` is deferred whole to a later invocation.
//!
//! The rules are evaluated in that order so that a record which is merely late
//! in the invocation is never split.

use tracing::debug;

use crate::constants;

/// Outcome of checking one candidate payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Accept the payload and add it to the running total.
    Fits,
    /// A single event too large for any invocation.
    PermanentlyTooLarge,
    /// Too large as a whole, but has more than one event.
    SplittableTooLarge,
    /// Fine on its own; the current invocation is full.
    NoSpaceLeft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeLimits {
    pub max_unit_bytes: usize,
    pub max_batch_bytes: usize,
}

impl Default for SizeLimits {
    fn default() -> Self {
        SizeLimits {
            max_unit_bytes: constants::DEFAULT_MAX_UNIT_BYTES,
            max_batch_bytes: constants::DEFAULT_MAX_BATCH_BYTES,
        }
    }
}

/// Applies the decision table to one candidate. Pure; see [`SizeGuard`] for the
/// stateful form.
#[must_use]
pub fn classify(
    limits: &SizeLimits,
    candidate_payload_bytes: usize,
    running_total_bytes: usize,
    number_of_events: usize,
) -> Decision {
    // A unit that can never fit an empty invocation must be split, not deferred.
    let unit_ceiling = limits.max_unit_bytes.min(limits.max_batch_bytes);
    if candidate_payload_bytes >= unit_ceiling {
        if number_of_events <= 1 {
            Decision::PermanentlyTooLarge
        } else {
            Decision::SplittableTooLarge
        }
    } else if running_total_bytes.saturating_add(candidate_payload_bytes) >= limits.max_batch_bytes
    {
        Decision::NoSpaceLeft
    } else {
        Decision::Fits
    }
}

/// Running total of accepted payload bytes for one invocation.
///
/// Create one per invocation; the total only grows, and only on [`Decision::Fits`].
#[derive(Debug, Clone)]
pub struct SizeGuard {
    limits: SizeLimits,
    running_total_bytes: usize,
}

impl SizeGuard {
    #[must_use]
    pub fn new(limits: SizeLimits) -> Self {
        SizeGuard {
            limits,
            running_total_bytes: 0,
        }
    }

    #[must_use]
    pub fn running_total_bytes(&self) -> usize {
        self.running_total_bytes
    }

    #[must_use]
    pub fn limits(&self) -> &SizeLimits {
        &self.limits
    }

    /// Classifies a candidate and commits it to the running total when it fits.
    pub fn admit(&mut self, candidate_payload_bytes: usize, number_of_events: usize) -> Decision {
        let decision = classify(
            &self.limits,
            candidate_payload_bytes,
            self.running_total_bytes,
            number_of_events,
        );
        debug!(
            "FIREHOSE | {:?}: payload of {} bytes with {} events, {} of {} bytes used",
            decision,
            candidate_payload_bytes,
            number_of_events,
            self.running_total_bytes,
            self.limits.max_batch_bytes
        );
        if decision == Decision::Fits {
            self.running_total_bytes += candidate_payload_bytes;
        }
        decision
    }
}
