// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cadred`: the cadre orchestration daemon.

use cadre_daemon::env;
use cadre_daemon::handlers::DaemonCtx;
use cadre_daemon::lifecycle::{init_tracing, Daemon};
use cadre_daemon::listener::Listener;
use cadre_daemon::LifecycleError;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("cadred: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), LifecycleError> {
    let daemon = Daemon::build().await?;
    let _log_guard = init_tracing(&daemon.state_dir);
    tracing::info!(version = env::PROTOCOL_VERSION, "cadred starting");

    let ctx = DaemonCtx {
        engine: daemon.engine.clone(),
        jobs: daemon.jobs.clone(),
        queue_jobs: daemon.queue_jobs.clone(),
        dispatcher: daemon.dispatcher.clone(),
    };

    let shutdown = CancellationToken::new();
    let listener = Listener::bind(&env::socket_path(&daemon.state_dir), ctx, shutdown.clone())?;
    let listener_task = tokio::spawn(listener.run());

    // Periodic maintenance between accepts: due timers, overdue hooks,
    // TTL sweeps.
    let tick = env::tick_interval();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                break;
            }
            _ = tokio::time::sleep(tick) => daemon.tick().await,
        }
    }

    shutdown.cancel();
    daemon.shutdown();
    let _ = tokio::time::timeout(env::drain_timeout(), listener_task).await;
    tracing::info!("cadred stopped");
    Ok(())
}
