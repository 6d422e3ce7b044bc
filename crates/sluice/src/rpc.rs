// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Loopback RPC between a resident log host and same-machine client
//! processes.
//!
//! The wire format is line-delimited JSON over loopback TCP. Requests are
//! tagged by `op`:
//!
//! ```text
//! {"op": "append", "message": {...}}
//! {"op": "flush"}
//! {"op": "ping"}
//! ```
//!
//! and every request is answered with `{"status": "ok"}` or
//! `{"status": "error", "message": "..."}`. A connection carries any number
//! of requests; a malformed frame answers `error` and the connection
//! continues.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sluice_core::{LogMessage, SluiceError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::engine::Engine;

/// A request frame.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WireRequest {
    Append { message: LogMessage },
    Flush,
    Ping,
}

/// A response frame.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WireResponse {
    Ok,
    Error { message: String },
}

impl WireResponse {
    /// Serialize to a newline-terminated frame.
    fn to_frame(&self) -> String {
        let mut frame = serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"status":"error","message":"unserializable response"}"#.to_string()
        });
        frame.push('\n');
        frame
    }
}

/// Serve the engine over the listener until the token is cancelled.
///
/// One task per accepted connection; a connection error ends only that
/// connection.
pub async fn serve(engine: Arc<Engine>, listener: TcpListener, cancel: CancellationToken) {
    debug!("rpc host serving");
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((socket, peer)) => {
                        debug!(peer = %peer, "rpc connection accepted");
                        let engine = engine.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(engine, socket).await {
                                debug!(error = %e, "rpc connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "rpc accept failed");
                    }
                }
            }
            _ = cancel.cancelled() => {
                debug!("rpc host stopping");
                break;
            }
        }
    }
}

/// Answer frames on one connection until the peer hangs up.
async fn handle_connection(engine: Arc<Engine>, socket: TcpStream) -> std::io::Result<()> {
    let (reader, mut writer) = socket.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<WireRequest>(&line) {
            Ok(request) => handle_request(&engine, request).await,
            Err(e) => WireResponse::Error {
                message: format!("malformed request: {e}"),
            },
        };
        writer.write_all(response.to_frame().as_bytes()).await?;
    }
    Ok(())
}

async fn handle_request(engine: &Engine, request: WireRequest) -> WireResponse {
    match request {
        WireRequest::Append { message } => {
            engine.enqueue(message).await;
            WireResponse::Ok
        }
        WireRequest::Flush => match engine.flush().await {
            Ok(()) => WireResponse::Ok,
            Err(e) => WireResponse::Error {
                message: e.to_string(),
            },
        },
        WireRequest::Ping => WireResponse::Ok,
    }
}

/// Client side of the wire: one short-lived connection per call.
#[derive(Debug, Clone)]
pub struct RpcClient {
    addr: SocketAddr,
}

impl RpcClient {
    /// A client for the loopback host on `port`.
    pub fn new(port: u16) -> RpcClient {
        RpcClient {
            addr: SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
        }
    }

    /// Append a locally constructed message to the host's queue.
    pub async fn append(&self, message: &LogMessage) -> Result<(), SluiceError> {
        self.call(&WireRequest::Append {
            message: message.clone(),
        })
        .await
    }

    /// Ask the host to deliver everything queued.
    pub async fn flush(&self) -> Result<(), SluiceError> {
        self.call(&WireRequest::Flush).await
    }

    /// Liveness probe.
    pub async fn ping(&self) -> Result<(), SluiceError> {
        self.call(&WireRequest::Ping).await
    }

    async fn call(&self, request: &WireRequest) -> Result<(), SluiceError> {
        let mut socket = TcpStream::connect(self.addr).await.map_err(SluiceError::io)?;

        let mut frame = serde_json::to_string(request)
            .map_err(|e| SluiceError::Internal(format!("request serialization failed: {e}")))?;
        frame.push('\n');
        socket.write_all(frame.as_bytes()).await.map_err(SluiceError::io)?;

        let mut line = String::new();
        let mut reader = BufReader::new(socket);
        reader.read_line(&mut line).await.map_err(SluiceError::io)?;

        match serde_json::from_str::<WireResponse>(line.trim()) {
            Ok(WireResponse::Ok) => Ok(()),
            Ok(WireResponse::Error { message }) => Err(SluiceError::Remote { message }),
            Err(e) => Err(SluiceError::Remote {
                message: format!("malformed response: {e}"),
            }),
        }
    }
}
