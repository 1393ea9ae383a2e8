// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use anyhow::Context;
use std::{env, sync::Arc};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use firehose_processor::{
    config::ProcessorConfig, handler::FirehoseHandler, model::FirehoseEvent,
    transport::HttpBatchTransport,
};

/// Reads the invocation event from the file named by the first argument, or
/// from stdin when there is none.
async fn read_event() -> anyhow::Result<FirehoseEvent> {
    let raw = match env::args().nth(1) {
        Some(path) => tokio::fs::read(&path)
            .await
            .with_context(|| format!("failed to read event from {path}"))?,
        None => {
            let mut raw = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut raw)
                .await
                .context("failed to read event from stdin")?;
            raw
        }
    };
    serde_json::from_slice(&raw).context("failed to parse invocation event")
}

fn init_logging(log_level: &str) -> anyhow::Result<()> {
    let env_filter = format!("h2=off,hyper=off,rustls=off,reqwest=off,{log_level}");

    // stdout carries the invocation result
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).context("could not parse log level in configuration")?,
        )
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;
    debug!("Logging subsystem enabled");
    Ok(())
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let config = ProcessorConfig::from_env().context("invalid configuration")?;
    init_logging(&config.log_level)?;

    let transport = HttpBatchTransport::from_config(&config)?;
    debug!("FIREHOSE | Resubmitting through {}", transport.endpoint());
    let handler = FirehoseHandler::new(&config, Arc::new(transport));

    let event = read_event().await?;
    let result = match handler.handle(event).await {
        Ok(result) => result,
        Err(e) => {
            error!("FIREHOSE | Invocation failed: {}", e);
            return Err(e.into());
        }
    };

    let mut output = serde_json::to_vec(&result).context("failed to serialize result")?;
    output.push(b'\n');
    let mut stdout = tokio::io::stdout();
    stdout.write_all(&output).await?;
    stdout.flush().await?;
    Ok(())
}
