// Copyright 2024-2026 Farlight Networks, LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Server role: the public, ingress side of the relay.
//!
//! The server owns two listeners. The public listener accepts external
//! client connections and turns each into a registered stream whose
//! reads become `Data` events. The event listener accepts the TLS event
//! channel from the client component, exactly one active peer at a
//! time, most-recent-wins: a newly accepted channel replaces (and
//! closes) the current one.
//!
//! Channel replacement is a supervised subscription: a supervisor task
//! accepts event channel peers and hands each fresh pipe's outbound
//! queue to the role loop, which drains whatever queue is current and
//! backs off briefly when it closes. Outbound producers go through an
//! [`EventSink`] whose sender the supervisor swaps on attach, so events
//! emitted while no channel is up are dropped rather than blocking
//! streams.

use crate::config::ServerConfig;
use crate::pipe::{EventPipe, EventSink, PipeTasks};
use crate::registry::Registry;
use crate::state::ChannelState;
use crate::stream::{pump_stream, RelayConn};
use crate::Error;
use std::sync::Arc;
use std::time::Duration;
use tls_relay_wire::{Event, EventKind};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, trace, warn};

/// Backoff before the role loop reattaches after losing its pipe.
const REATTACH_BACKOFF: Duration = Duration::from_secs(5);

/// The ingress side of the relay.
pub struct Server {
    public: TcpListener,
    events: TcpListener,
    acceptor: TlsAcceptor,
    registry: Arc<Registry>,
}

impl Server {
    /// Binds both listeners.
    ///
    /// # Errors
    ///
    /// Returns an error if either bind fails.
    pub async fn bind(config: &ServerConfig, tls: rustls::ServerConfig) -> Result<Self, Error> {
        let public = TcpListener::bind(&config.listen_addr).await?;
        let events = TcpListener::bind(&config.event_addr).await?;

        info!(
            public = %public.local_addr()?,
            events = %events.local_addr()?,
            "server listening"
        );

        Ok(Self {
            public,
            events,
            acceptor: TlsAcceptor::from(Arc::new(tls)),
            registry: Arc::new(Registry::new()),
        })
    }

    /// Returns the bound public listener address.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn public_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.public.local_addr()
    }

    /// Returns the bound event listener address.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn event_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.events.local_addr()
    }

    /// Runs the server until an unrecoverable error.
    ///
    /// # Errors
    ///
    /// Returns an error on listener failure, on a protocol violation
    /// from the peer, or on a failed write to a registered external
    /// socket.
    pub async fn run(self) -> Result<(), Error> {
        let sink = EventSink::detached();
        let (pipes_tx, pipes_rx) = mpsc::channel(1);

        tokio::try_join!(
            supervise_event_channel(self.events, self.acceptor, sink.clone(), pipes_tx),
            run_role_loop(Arc::clone(&self.registry), pipes_rx),
            accept_external(self.public, Arc::clone(&self.registry), sink),
        )?;
        Ok(())
    }
}

/// Accepts event channel peers, most-recent-wins.
///
/// Each accepted TLS connection becomes a fresh [`EventPipe`]; the
/// previous pipe's pumps are torn down, the sink is repointed at the
/// new inbound queue, and the new outbound queue is handed to the role
/// loop. A failed handshake only costs that connection.
async fn supervise_event_channel(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    sink: EventSink,
    pipes_tx: mpsc::Sender<mpsc::Receiver<Event>>,
) -> Result<(), Error> {
    let mut active: Option<PipeTasks> = None;

    loop {
        let (stream, peer) = listener.accept().await?;

        let tls = match acceptor.accept(stream).await {
            Ok(tls) => tls,
            Err(e) => {
                warn!(peer = %peer, error = %e, "event channel handshake failed");
                continue;
            }
        };

        if let Some(old) = active.take() {
            info!(peer = %peer, "replacing event channel");
            old.shutdown();
        } else {
            info!(peer = %peer, "event channel attached");
        }

        let (input, output, tasks) = EventPipe::spawn(tls).into_parts();
        sink.replace(input);
        active = Some(tasks);

        if pipes_tx.send(output).await.is_err() {
            // Role loop is gone; nothing left to supervise for
            return Ok(());
        }
    }
}

/// Consumes inbound events from whatever pipe is current.
///
/// Each pipe is drained until its outbound queue closes (channel loss
/// or `Exit`), then the loop waits briefly and resumes against the
/// next pipe the supervisor delivers.
async fn run_role_loop(
    registry: Arc<Registry>,
    mut pipes: mpsc::Receiver<mpsc::Receiver<Event>>,
) -> Result<(), Error> {
    while let Some(mut events) = pipes.recv().await {
        debug!(state = %ChannelState::Active, "event pipe attached");

        while let Some(event) = events.recv().await {
            if event.kind == EventKind::Exit {
                debug!("exit event received");
                break;
            }
            handle_event(&registry, event).await?;
        }

        debug!(state = %ChannelState::NoPipe, "event pipe lost");
        tokio::time::sleep(REATTACH_BACKOFF).await;
    }
    Ok(())
}

/// Applies one inbound event from the client component.
async fn handle_event(registry: &Registry, event: Event) -> Result<(), Error> {
    match event.kind {
        // Only the server mints streams; a Connect from the peer means
        // the roles are crossed and nothing about the channel can be
        // trusted.
        EventKind::Connect => Err(Error::protocol_violation(
            "received Connect event on the server role",
        )),
        EventKind::Data => {
            if let Some(conn) = registry.get_conn(&event.uid) {
                conn.write(&event.data)
                    .await
                    .map_err(|e| Error::stream_write(event.uid, e))?;
            } else {
                trace!(uid = %event.uid, "data for unknown stream dropped");
            }
            Ok(())
        }
        EventKind::Disconnect => {
            if let Some(conn) = registry.get_conn(&event.uid) {
                debug!(uid = %event.uid, "peer disconnected stream");
                conn.close();
            }
            Ok(())
        }
        EventKind::Ping => {
            trace!("ping");
            Ok(())
        }
        // Handled by the caller
        EventKind::Exit => Ok(()),
    }
}

/// Accepts external client connections on the public listener.
///
/// Each accepted socket is registered under a fresh uid, announced to
/// the peer with a `Connect` event, and handed to a pump task.
async fn accept_external(
    listener: TcpListener,
    registry: Arc<Registry>,
    sink: EventSink,
) -> Result<(), Error> {
    loop {
        let (stream, peer) = listener.accept().await?;

        let (conn, read_half) = match RelayConn::new(stream) {
            Ok(pair) => pair,
            Err(e) => {
                warn!(peer = %peer, error = %e, "dropping external connection");
                continue;
            }
        };

        let uid = registry.create_uid(&conn);
        info!(%uid, "external connection accepted");

        if !sink.send(Event::connect(uid)).await {
            trace!("connect event dropped, no event channel");
        }

        tokio::spawn(pump_stream(
            conn,
            read_half,
            Arc::clone(&registry),
            sink.clone(),
        ));
    }
}
