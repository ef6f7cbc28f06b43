// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin request/response wrapper around the `jw_wire` protocol over a
//! Unix domain socket.

use anyhow::{anyhow, Context, Result};
use jw_wire::{Request, Response};
use std::path::Path;
use tokio::net::UnixStream;

pub struct DaemonClient {
    stream: UnixStream,
}

impl DaemonClient {
    pub async fn connect(socket_path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(socket_path)
            .await
            .with_context(|| format!("connecting to daemon at {}", socket_path.display()))?;
        Ok(Self { stream })
    }

    pub async fn send(&mut self, request: Request) -> Result<Response> {
        jw_wire::write_message(&mut self.stream, &request).await.context("sending request")?;
        jw_wire::read_message(&mut self.stream).await.context("reading response")
    }

    /// Consume the connection and yield every `Response::Event` frame it
    /// receives, for `Subscribe`. Never returns `Ok` on its own; the caller
    /// breaks out (e.g. on Ctrl-C).
    pub async fn stream_events(mut self, request: Request, mut on_event: impl FnMut(jw_core::Event)) -> Result<()> {
        jw_wire::write_message(&mut self.stream, &request).await.context("sending subscribe request")?;
        loop {
            let response: Response = jw_wire::read_message(&mut self.stream).await.context("reading event")?;
            match response {
                Response::Event { event } => on_event(event),
                Response::Error { message } => return Err(anyhow!(message)),
                other => return Err(anyhow!("unexpected response to Subscribe: {other:?}")),
            }
        }
    }
}

pub fn response_or_error(response: Response) -> Result<Response> {
    if let Response::Error { message } = &response {
        return Err(anyhow!(message.clone()));
    }
    Ok(response)
}
