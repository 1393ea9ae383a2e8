// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Processing of CloudWatch Logs subscription records delivered through Firehose.
//!
//! One invocation receives an ordered list of compressed records. Each record is
//! decoded, its log events are checked against a closed log schema, the accepted
//! events are re-encoded for the downstream index and the result is packed under a
//! hard per-invocation size ceiling. Records that do not fit are split or deferred
//! and pushed back onto the delivery stream.
//!
//! ```text
//!   FirehoseEvent.records
//!          │
//!          v
//!   ┌──────────────┐
//!   │    codec     │  (base64 → gzip → JSON)
//!   └──────┬───────┘
//!          v
//!   ┌──────────────┐
//!   │  validator   │  (closed log schema, per event)
//!   └──────┬───────┘
//!          v
//!   ┌──────────────┐
//!   │  size_guard  │  (running total, split / defer)
//!   └──────┬───────┘
//!          v
//!   ┌──────────────┐      ┌──────────────┐
//!   │  processor   │ ───> │  submission  │  (PutRecordBatch, partial retry)
//!   └──────┬───────┘      └──────────────┘
//!          v
//!   InvocationResult.records
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod codec;
pub mod config;
pub mod constants;
pub mod error;
pub mod handler;
pub mod http;
pub mod model;
pub mod processor;
pub mod size_guard;
pub mod submission;
pub mod transport;
pub mod validator;
