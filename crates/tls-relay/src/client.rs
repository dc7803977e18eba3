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

//! Client role: the egress side of the relay, beside the target.
//!
//! The client dials the event channel once, over mutually
//! authenticated TLS, and never reconnects: channel loss is terminal.
//! For every `Connect` event it dials the configured target service and
//! registers the socket under the server-minted uid; dialling happens
//! synchronously within the event loop so no `Data` for that uid can be
//! processed before the stream exists. A ping task keeps the channel
//! warm so dead peers surface through the transport.

use crate::config::ClientConfig;
use crate::pipe::{EventPipe, EventSink};
use crate::registry::Registry;
use crate::stream::{pump_stream, RelayConn};
use crate::{tls, Error};
use std::sync::Arc;
use std::time::Duration;
use tls_relay_wire::{Event, EventKind};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;
use tracing::{debug, info, trace, warn};

/// Interval between keep-alive pings on the event channel.
const PING_PERIOD: Duration = Duration::from_secs(40);

/// The egress side of the relay.
pub struct Client {
    config: ClientConfig,
    pipe: EventPipe,
    sink: EventSink,
    registry: Arc<Registry>,
}

impl Client {
    /// Dials the event channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP dial or the TLS handshake fails;
    /// both are unrecoverable for this role.
    pub async fn connect(config: ClientConfig, tls: rustls::ClientConfig) -> Result<Self, Error> {
        let server_name = tls::server_name(&config.event_addr)?;
        let stream = TcpStream::connect(&config.event_addr).await?;
        let connector = TlsConnector::from(Arc::new(tls));
        let tls_stream = connector.connect(server_name, stream).await?;

        info!(events = %config.event_addr, "event channel connected");

        let pipe = EventPipe::spawn(tls_stream);
        let sink = EventSink::new(pipe.sender());

        Ok(Self {
            config,
            pipe,
            sink,
            registry: Arc::new(Registry::new()),
        })
    }

    /// Runs the client until the channel ends.
    ///
    /// Returns `Ok(())` on a clean `Exit` from the peer.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel closes without an `Exit` or a
    /// write to a registered target socket fails.
    pub async fn run(mut self) -> Result<(), Error> {
        let ping = spawn_ping(self.sink.clone(), PING_PERIOD);

        let result = loop {
            match self.pipe.recv().await {
                Some(event) => {
                    if event.kind == EventKind::Exit {
                        info!("exit event received, shutting down");
                        break Ok(());
                    }
                    if let Err(e) = handle_event(
                        &self.registry,
                        &self.sink,
                        &self.config.target_addr,
                        event,
                    )
                    .await
                    {
                        break Err(e);
                    }
                }
                // No reconnection on this role: a lost channel ends the
                // process.
                None => break Err(Error::ChannelClosed),
            }
        };

        ping.abort();
        result
    }
}

/// Applies one inbound event from the server.
async fn handle_event(
    registry: &Arc<Registry>,
    sink: &EventSink,
    target_addr: &str,
    event: Event,
) -> Result<(), Error> {
    match event.kind {
        EventKind::Connect => {
            let dialed = async {
                RelayConn::new(TcpStream::connect(target_addr).await?)
            };
            match dialed.await {
                Ok((conn, read_half)) => {
                    registry.set(&conn, event.uid.clone());
                    info!(uid = %event.uid, "target connection opened");
                    tokio::spawn(pump_stream(
                        conn,
                        read_half,
                        Arc::clone(registry),
                        sink.clone(),
                    ));
                }
                Err(e) => {
                    // Stream-local: tell the server so it closes the
                    // external socket; other streams are unaffected.
                    warn!(uid = %event.uid, target = %target_addr, error = %e, "target dial failed");
                    sink.send(Event::disconnect(event.uid)).await;
                }
            }
            Ok(())
        }
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

/// Spawns the keep-alive task: one `Ping` per period, starting one
/// period from now. Stops when the channel is gone.
fn spawn_ping(sink: EventSink, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if !sink.send(Event::ping()).await {
                debug!("ping task stopping, channel gone");
                return;
            }
        }
    })
}
