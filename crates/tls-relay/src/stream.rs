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

//! Relayed stream handles and the per-connection pump task.
//!
//! A [`RelayConn`] wraps one side of a relayed TCP stream: the external
//! client socket on the server, the target socket on the client. The
//! write half lives here so inbound `Data` events can be written from
//! the role loop; the read half is driven by [`pump_stream`], which
//! turns socket reads into `Data` events and unwinds into a
//! `Disconnect` when the stream ends.

use crate::pipe::EventSink;
use crate::registry::Registry;
use crate::state::StreamState;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tls_relay_wire::Event;
use tracing::{debug, info, trace};

/// Read chunk size for relayed sockets.
///
/// Every non-empty chunk becomes one `Data` event.
pub(crate) const READ_CHUNK_SIZE: usize = 1024;

/// Allocator for process-unique connection identities.
static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// One side of a relayed TCP stream.
///
/// Holds the write half, the stream state, and the cancellation token
/// that doubles as the socket-close primitive: cancelling it wakes the
/// pump task out of its blocked read.
pub struct RelayConn {
    /// Process-unique identity, used as the registry's socket key.
    id: u64,
    /// Remote address of the socket, used in minted uids.
    peer: SocketAddr,
    /// Write half, serialized across writers.
    writer: Mutex<OwnedWriteHalf>,
    /// Current [`StreamState`].
    state: AtomicU8,
    /// Cancelled exactly once when the stream closes.
    shutdown: CancellationToken,
}

impl RelayConn {
    /// Wraps a connected socket, returning the handle and the read half
    /// for the pump task.
    ///
    /// # Errors
    ///
    /// Returns an error if the peer address cannot be read from the
    /// socket.
    pub fn new(stream: TcpStream) -> std::io::Result<(Arc<Self>, OwnedReadHalf)> {
        let peer = stream.peer_addr()?;
        let (read_half, write_half) = stream.into_split();

        let conn = Arc::new(Self {
            id: NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed),
            peer,
            writer: Mutex::new(write_half),
            state: AtomicU8::new(StreamState::Idle as u8),
            shutdown: CancellationToken::new(),
        });

        Ok((conn, read_half))
    }

    /// Returns the process-unique identity of this connection.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the remote address of the socket.
    #[must_use]
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Returns the current stream state.
    #[must_use]
    pub fn state(&self) -> StreamState {
        StreamState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Marks the stream as registered. Called under the registry lock.
    pub(crate) fn mark_registered(&self) {
        // Only valid from Idle; a concurrently closed stream stays closed.
        let _ = self.state.compare_exchange(
            StreamState::Idle as u8,
            StreamState::Registered as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Writes bytes to the socket.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error; callers decide whether it is
    /// fatal (inbound `Data` on a registered stream) or stream-local.
    pub async fn write(&self, data: &[u8]) -> std::io::Result<()> {
        self.writer.lock().await.write_all(data).await
    }

    /// Closes the stream.
    ///
    /// Idempotent. Cancels the shutdown token, which unblocks the pump
    /// task; the pump performs the actual socket teardown.
    pub fn close(&self) {
        let previous = self.state.swap(StreamState::Closed as u8, Ordering::SeqCst);
        if StreamState::from_u8(previous) != StreamState::Closed {
            self.shutdown.cancel();
        }
    }

    /// Resolves when the stream has been closed.
    pub async fn closed(&self) {
        self.shutdown.cancelled().await;
    }

    /// Shuts down the write half, flushing buffered bytes and sending
    /// FIN. Errors are ignored; the socket is going away regardless.
    pub(crate) async fn finish(&self) {
        let _ = self.writer.lock().await.shutdown().await;
    }
}

impl std::fmt::Debug for RelayConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConn")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Drives the read half of a relayed stream.
///
/// Reads in chunks of at most [`READ_CHUNK_SIZE`] bytes, emitting one
/// `Data` event per non-empty chunk. The uid is looked up fresh for
/// every chunk; the registry is the sole authority on mapping state.
/// On EOF, read error, or close the task deregisters the stream, emits
/// a `Disconnect` if the stream was still registered, and shuts the
/// socket down.
pub(crate) async fn pump_stream(
    conn: Arc<RelayConn>,
    mut read_half: OwnedReadHalf,
    registry: Arc<Registry>,
    sink: EventSink,
) {
    let mut buf = [0u8; READ_CHUNK_SIZE];

    loop {
        tokio::select! {
            () = conn.closed() => {
                trace!(conn = conn.id(), "stream closed locally");
                break;
            }
            result = read_half.read(&mut buf) => match result {
                Ok(0) => {
                    trace!(conn = conn.id(), "stream EOF");
                    break;
                }
                Ok(n) => {
                    let uid = registry.get_uid(&conn);
                    if uid.is_empty() {
                        // Deregistered while we were reading; the stream
                        // is closing and the bytes have nowhere to go.
                        break;
                    }
                    // A send fails only while no event channel is
                    // attached; such events are lost.
                    if !sink.send(Event::data(uid, &buf[..n])).await {
                        trace!(conn = conn.id(), "data event dropped, no event channel");
                    }
                }
                Err(e) => {
                    if is_connection_closed_error(&e) {
                        trace!(conn = conn.id(), error = %e, "stream reset");
                    } else {
                        debug!(conn = conn.id(), error = %e, "stream read failed");
                    }
                    break;
                }
            }
        }
    }

    // Deregister first so no further events can carry this uid, then
    // tell the peer. A stream already removed (inbound Disconnect
    // consumed after removal) produces nothing.
    let uid = registry.remove_by_conn(&conn);
    if !uid.is_empty() {
        info!(%uid, "stream ended");
        sink.send(Event::disconnect(uid)).await;
    }
    conn.finish().await;
}

/// Returns true if the error indicates the connection was closed.
///
/// These errors are expected whenever a peer drops a stream and should
/// not be logged at debug level or above.
pub(crate) fn is_connection_closed_error(e: &std::io::Error) -> bool {
    use std::io::ErrorKind;
    matches!(
        e.kind(),
        ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::NotConnected
            | ErrorKind::UnexpectedEof
    )
}
