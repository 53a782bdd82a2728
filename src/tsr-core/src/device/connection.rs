// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Reconnecting TCP connection.
//!
//! A background task owns the socket and drives a [`ConnectionMachine`].
//! Callers talk to it through a cloneable [`TcpConnection`] handle and can
//! watch connected/disconnected transitions.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::device::controller::machine::{
    ConnectionAction, ConnectionEvent, ConnectionMachine, DEFAULT_RECONNECT_DELAY,
};
use crate::device::error::{DeviceError, DeviceResult};

/// Default bound on a single connection attempt and on dispose.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(3_000);

#[derive(Debug, Clone)]
pub struct TcpConnectionOptions {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub reconnect_delay: Duration,
}

impl TcpConnectionOptions {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// A connection attempt in flight, raced against requests and dispose.
type ConnectAttempt = Pin<Box<dyn Future<Output = (ConnectionEvent, Option<TcpStream>)> + Send>>;

enum ConnCommand {
    Send(Vec<u8>, oneshot::Sender<DeviceResult<()>>),
    Dispose(oneshot::Sender<()>),
}

/// Handle to a reconnecting TCP connection task.
#[derive(Clone)]
pub struct TcpConnection {
    tx: mpsc::Sender<ConnCommand>,
    connected: watch::Receiver<bool>,
}

impl TcpConnection {
    /// Spawn the connection task and start connecting.
    pub fn spawn(options: TcpConnectionOptions) -> Self {
        let (tx, rx) = mpsc::channel(64);
        let (connected_tx, connected) = watch::channel(false);
        tokio::spawn(run_connection(options, rx, connected_tx));
        Self { tx, connected }
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Receiver that observes connected/disconnected transitions.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }

    /// Write `bytes` to the socket. Fails immediately when disconnected.
    pub async fn send(&self, bytes: Vec<u8>) -> DeviceResult<()> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(ConnCommand::Send(bytes, resp_tx))
            .await
            .map_err(|_| DeviceError::connection("connection task stopped"))?;
        resp_rx
            .await
            .map_err(|_| DeviceError::connection("connection task dropped request"))?
    }

    /// Close for good. Resolves once the socket is gone, or after the task
    /// has already stopped.
    pub async fn dispose(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(ConnCommand::Dispose(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
    }
}

async fn run_connection(
    options: TcpConnectionOptions,
    mut rx: mpsc::Receiver<ConnCommand>,
    connected_tx: watch::Sender<bool>,
) {
    let mut machine = ConnectionMachine::new(options.reconnect_delay);
    let mut stream: Option<TcpStream> = None;
    let mut attempt: Option<ConnectAttempt> = None;
    let mut reconnect_at: Option<Instant> = None;
    let mut events = VecDeque::from([ConnectionEvent::ConnectRequested]);
    let mut dispose_waiters: Vec<oneshot::Sender<()>> = Vec::new();

    loop {
        while let Some(event) = events.pop_front() {
            debug!("{}:{} {:?} in {}", options.host, options.port, event, machine.phase());
            for action in machine.process_event(event) {
                match action {
                    ConnectionAction::Connect => {
                        attempt = Some(Box::pin(connect(options.clone())));
                    }
                    ConnectionAction::ScheduleReconnect(delay) => {
                        reconnect_at = Some(Instant::now() + delay);
                    }
                    ConnectionAction::TearDown => {
                        attempt = None;
                        stream = None;
                    }
                    ConnectionAction::CloseGracefully => {
                        reconnect_at = None;
                        attempt = None;
                        if let Some(socket) = stream.take() {
                            close_gracefully(socket, options.connect_timeout).await;
                        }
                    }
                    ConnectionAction::Notify(connected) => {
                        if connected {
                            info!("Connected to {}:{}", options.host, options.port);
                        } else {
                            warn!("Disconnected from {}:{}", options.host, options.port);
                        }
                        let _ = connected_tx.send(connected);
                    }
                }
            }
        }

        if machine.is_disposed() {
            for waiter in dispose_waiters.drain(..) {
                let _ = waiter.send(());
            }
            // Keep answering so late senders get an error instead of hanging.
            while let Some(cmd) = rx.recv().await {
                match cmd {
                    ConnCommand::Send(_, resp) => {
                        let _ = resp.send(Err(DeviceError::connection("connection disposed")));
                    }
                    ConnCommand::Dispose(done) => {
                        let _ = done.send(());
                    }
                }
            }
            return;
        }

        let mut outgoing = None;
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(ConnCommand::Send(bytes, resp)) => outgoing = Some((bytes, resp)),
                Some(ConnCommand::Dispose(done)) => {
                    dispose_waiters.push(done);
                    events.push_back(ConnectionEvent::DisposeRequested);
                }
                None => events.push_back(ConnectionEvent::DisposeRequested),
            },
            _ = time::sleep_until(reconnect_at.unwrap_or_else(Instant::now)), if reconnect_at.is_some() => {
                reconnect_at = None;
                events.push_back(ConnectionEvent::ReconnectTimerFired);
            }
            (event, socket) = finish_attempt(&mut attempt), if attempt.is_some() => {
                if let Some(socket) = socket {
                    stream = Some(socket);
                }
                events.push_back(event);
            }
            reason = wait_closed(&mut stream), if stream.is_some() => {
                events.push_back(ConnectionEvent::Lost(reason));
            }
        }

        if let Some((bytes, resp)) = outgoing {
            let result = match stream.as_mut() {
                Some(socket) => socket.write_all(&bytes).await.map_err(DeviceError::from),
                None => Err(DeviceError::connection("not connected")),
            };
            if let (Err(err), true) = (&result, stream.is_some()) {
                events.push_back(ConnectionEvent::Lost(err.message.clone()));
            }
            let _ = resp.send(result);
        }
    }
}

async fn connect(options: TcpConnectionOptions) -> (ConnectionEvent, Option<TcpStream>) {
    let addr = (options.host.as_str(), options.port);
    match time::timeout(options.connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(socket)) => {
            let _ = socket.set_nodelay(true);
            (ConnectionEvent::Established, Some(socket))
        }
        Ok(Err(e)) => {
            warn!("Connecting to {}:{} failed: {}", options.host, options.port, e);
            (ConnectionEvent::Lost(e.to_string()), None)
        }
        Err(_) => {
            warn!("Connecting to {}:{} timed out", options.host, options.port);
            (ConnectionEvent::AttemptTimedOut, None)
        }
    }
}

/// Drive the attempt in flight to completion and clear it.
async fn finish_attempt(attempt: &mut Option<ConnectAttempt>) -> (ConnectionEvent, Option<TcpStream>) {
    let Some(pending) = attempt.as_mut() else {
        return std::future::pending().await;
    };
    let outcome = pending.await;
    *attempt = None;
    outcome
}

/// Resolve when the peer closes the socket or it errors. Incoming bytes are
/// discarded.
async fn wait_closed(stream: &mut Option<TcpStream>) -> String {
    let Some(socket) = stream.as_mut() else {
        return std::future::pending().await;
    };
    let mut buf = [0u8; 512];
    loop {
        match socket.read(&mut buf).await {
            Ok(0) => return "connection closed by peer".to_string(),
            Ok(_) => continue,
            Err(e) => return e.to_string(),
        }
    }
}

/// Shut the write side down, giving up after half of `limit`; the socket is
/// destroyed on drop either way.
async fn close_gracefully(mut socket: TcpStream, limit: Duration) {
    if time::timeout(limit / 2, socket.shutdown()).await.is_err() {
        warn!("Graceful close timed out, destroying socket");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    #[ignore = "requires TCP bind permissions"]
    async fn test_send_reaches_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let conn = TcpConnection::spawn(TcpConnectionOptions::new("127.0.0.1", port));
        let (mut peer, _) = listener.accept().await.unwrap();

        let mut connected = conn.subscribe();
        connected.wait_for(|c| *c).await.unwrap();

        conn.send(vec![0xf9, 0x01]).await.unwrap();
        let mut buf = [0u8; 2];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0xf9, 0x01]);

        conn.dispose().await;
        assert!(!conn.is_connected());
        assert!(conn.send(vec![0]).await.is_err());
    }

    #[tokio::test]
    async fn test_dispose_during_connect_attempt() {
        // Blackholed address: the attempt stays in flight until its timeout.
        let mut options = TcpConnectionOptions::new("10.255.255.1", 9);
        options.connect_timeout = Duration::from_secs(60);
        let conn = TcpConnection::spawn(options);

        let sent = time::timeout(Duration::from_secs(1), conn.send(vec![0xf9])).await;
        assert_eq!(
            sent.expect("send waited on the connect attempt").unwrap_err(),
            DeviceError::connection("not connected")
        );

        time::timeout(Duration::from_secs(1), conn.dispose())
            .await
            .expect("dispose waited on the connect attempt");
        assert!(!conn.is_connected());
        assert!(conn.send(vec![0]).await.is_err());
    }

    #[tokio::test]
    #[ignore = "requires TCP bind permissions"]
    async fn test_peer_close_reports_disconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let conn = TcpConnection::spawn(TcpConnectionOptions::new("127.0.0.1", port));
        let (peer, _) = listener.accept().await.unwrap();
        let mut connected = conn.subscribe();
        connected.wait_for(|c| *c).await.unwrap();

        drop(peer);
        connected.wait_for(|c| !*c).await.unwrap();
        conn.dispose().await;
    }
}
