// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! JSON-over-TCP listener for tsr-server.
//!
//! Accepts client connections speaking the `ClientEnvelope`/`ClientResponse`
//! protocol defined in `tsr-protocol`, one JSON object per line.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{error, info, warn};

use tsr_protocol::{encode_response, parse_envelope, ClientResponse, TokenValidator};

use crate::conductor::Conductor;

/// Run the JSON TCP listener until shutdown is signalled.
pub async fn run_listener(
    addr: SocketAddr,
    conductor: Arc<Conductor>,
    validator: Arc<dyn TokenValidator>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (socket, peer) = accepted?;
                info!("Client connected: {}", peer);

                let conductor = Arc::clone(&conductor);
                let validator = Arc::clone(&validator);
                tokio::spawn(async move {
                    if let Err(e) = handle_client(socket, peer, conductor, validator).await {
                        error!("Client {} error: {:?}", peer, e);
                    }
                });
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!("Listener on {} stopping", addr);
                    return Ok(());
                }
            }
        }
    }
}

async fn handle_client(
    socket: TcpStream,
    addr: SocketAddr,
    conductor: Arc<Conductor>,
    validator: Arc<dyn TokenValidator>,
) -> std::io::Result<()> {
    let (reader, mut writer) = socket.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            info!("Client {} disconnected", addr);
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let resp = handle_line(trimmed, addr, &conductor, validator.as_ref()).await;
        write_response(&mut writer, &resp).await?;
    }

    Ok(())
}

async fn handle_line(
    line: &str,
    addr: SocketAddr,
    conductor: &Conductor,
    validator: &dyn TokenValidator,
) -> ClientResponse {
    let envelope = match parse_envelope(line) {
        Ok(envelope) => envelope,
        Err(e) => {
            error!("Invalid JSON from {}: {} / {:?}", addr, line, e);
            return ClientResponse::error(format!("Invalid JSON: {}", e));
        }
    };

    if let Err(err) = validator.validate(envelope.token.as_deref(), envelope.cmd.scope()) {
        warn!("Rejected request from {}: {}", addr, err);
        return ClientResponse::error(err.to_string());
    }

    conductor
        .dispatch(envelope.device_id.as_deref(), envelope.cmd)
        .await
}

async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    resp: &ClientResponse,
) -> std::io::Result<()> {
    let resp_line = encode_response(resp)?;
    writer.write_all(resp_line.as_bytes()).await?;
    writer.flush().await
}
