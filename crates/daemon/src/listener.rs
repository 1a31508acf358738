// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unix-socket listener.
//!
//! Accepts connections and spawns a task per connection; each connection
//! carries a sequence of framed requests, answered in order. Events that
//! take long (awaited triggers, orchestrations with inline sleeps) hold
//! only their own connection.

use crate::handlers::{handle, DaemonCtx};
use cadre_wire::{read_message, write_message, Request, Response};
use std::path::{Path, PathBuf};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct Listener {
    unix: UnixListener,
    path: PathBuf,
    ctx: DaemonCtx,
    shutdown: CancellationToken,
}

impl Listener {
    /// Bind the socket, replacing a stale file from a previous instance.
    pub fn bind(
        path: &Path,
        ctx: DaemonCtx,
        shutdown: CancellationToken,
    ) -> std::io::Result<Self> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        let unix = UnixListener::bind(path)?;
        info!(path = %path.display(), "listening");
        Ok(Self {
            unix,
            path: path.to_path_buf(),
            ctx,
            shutdown,
        })
    }

    /// Accept until shutdown.
    pub async fn run(self) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = self.unix.accept() => {
                    match accepted {
                        Ok((stream, _)) => {
                            let ctx = self.ctx.clone();
                            let shutdown = self.shutdown.clone();
                            tokio::spawn(async move {
                                if let Err(e) = serve_connection(stream, ctx, shutdown).await {
                                    debug!(error = %e, "connection closed with error");
                                }
                            });
                        }
                        Err(e) => {
                            warn!(error = %e, "accept failed");
                        }
                    }
                }
            }
        }
        let _ = std::fs::remove_file(&self.path);
        info!("listener stopped");
    }
}

async fn serve_connection(
    mut stream: UnixStream,
    ctx: DaemonCtx,
    shutdown: CancellationToken,
) -> Result<(), cadre_wire::ProtocolError> {
    loop {
        let request: Option<Request> = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            read = read_message(&mut stream) => read?,
        };
        let Some(request) = request else {
            return Ok(());
        };
        let response: Response = handle(&ctx, request).await;
        write_message(&mut stream, &response).await?;
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
