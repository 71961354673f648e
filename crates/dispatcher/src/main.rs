// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `rmaked`: message bus + dispatcher daemon.

use rmake_core::{ExactFlavorMatcher, SystemClock};
use rmake_dispatcher::bus::{serve, Bus};
use rmake_dispatcher::relay::TracingEventSink;
use rmake_dispatcher::{env, Config, Dispatcher, EventRelay, NullStateSink};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::load(&env::config_path()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("rmaked: {err}");
            return ExitCode::FAILURE;
        }
    };

    let filter = EnvFilter::try_new(&config.log_filter)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "rmaked failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(&config.listen).await?;
    info!(listen = %config.listen, "message bus listening");

    let cancel = CancellationToken::new();
    let (bus, handle) = Bus::new(SystemClock);
    tokio::spawn(bus.run(cancel.clone()));
    tokio::spawn(serve(listener, handle.clone(), cancel.clone()));

    let relay = Arc::new(EventRelay::new());
    relay.subscribe(Arc::new(TracingEventSink));
    let dispatcher = Dispatcher::attach(
        handle,
        Arc::new(ExactFlavorMatcher),
        relay,
        Arc::new(NullStateSink),
    )
    .await?;
    let dispatcher_task = tokio::spawn(dispatcher.run(cancel.clone()));

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    cancel.cancel();
    let _ = dispatcher_task.await;
    Ok(())
}
