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

// RwLock::read()/write().unwrap() is the standard pattern in Rust; see
// registry.rs for the rationale.
#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

//! Event pipe: bounded queues and the two background pumps.
//!
//! An [`EventPipe`] is the in-process endpoint of one event channel.
//! It exposes an inbound queue (events to send) and an outbound queue
//! (events received), each bounded so that back-pressure propagates
//! from the channel to per-connection read tasks and on to TCP.
//!
//! Two long-lived tasks move events between the queues and the
//! transport: the writer pump drains the inbound queue through the
//! compressing [`EventWriter`](crate::channel::EventWriter), and the
//! reader pump feeds the outbound queue from the decompressing
//! [`EventReader`](crate::channel::EventReader). The outbound queue is
//! closed by the reader pump exactly once; the writer pump never closes
//! the inbound queue.

use crate::channel::{EventReader, EventWriter};
use std::sync::{Arc, RwLock};
use tls_relay_wire::{Event, EventKind};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Depth of the inbound and outbound event queues.
pub(crate) const EVENT_QUEUE_DEPTH: usize = 64;

/// In-process endpoint of one event channel.
pub struct EventPipe {
    input: mpsc::Sender<Event>,
    output: mpsc::Receiver<Event>,
    tasks: PipeTasks,
}

/// Handles to a pipe's pump tasks.
///
/// The server's supervisor keeps these for the active pipe so a
/// replaced pipe can be torn down: aborting the pumps drops both
/// transport halves, closing the underlying connection.
pub struct PipeTasks {
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl PipeTasks {
    /// Aborts both pumps, closing the transport.
    pub fn shutdown(&self) {
        self.writer.abort();
        self.reader.abort();
    }
}

impl EventPipe {
    /// Spawns the two pumps over a connected transport and returns the
    /// pipe endpoint.
    pub fn spawn<T>(transport: T) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (read_half, write_half) = tokio::io::split(transport);
        let (input, input_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let (output_tx, output) = mpsc::channel(EVENT_QUEUE_DEPTH);

        let writer = tokio::spawn(run_writer_pump(write_half, input_rx));
        let reader = tokio::spawn(run_reader_pump(read_half, output_tx));

        Self {
            input,
            output,
            tasks: PipeTasks { writer, reader },
        }
    }

    /// Returns a sender for the inbound queue.
    #[must_use]
    pub fn sender(&self) -> mpsc::Sender<Event> {
        self.input.clone()
    }

    /// Receives the next event from the outbound queue.
    ///
    /// Returns `None` once the reader pump has closed the queue.
    pub async fn recv(&mut self) -> Option<Event> {
        self.output.recv().await
    }

    /// Splits the pipe into its inbound sender, outbound receiver, and
    /// pump task handles.
    #[must_use]
    pub fn into_parts(self) -> (mpsc::Sender<Event>, mpsc::Receiver<Event>, PipeTasks) {
        (self.input, self.output, self.tasks)
    }
}

/// Drains the inbound queue onto the transport.
///
/// Terminates on encoder or transport error. When the inbound queue
/// closes cleanly, writes a final `Exit` and stops.
async fn run_writer_pump<W>(send: W, mut events: mpsc::Receiver<Event>)
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    let mut writer = EventWriter::new(send);

    while let Some(event) = events.recv().await {
        if let Err(e) = writer.write_event(&event).await {
            debug!(error = %e, "writer pump terminating");
            return;
        }
    }

    // Inbound queue closed cleanly; sign off with an Exit
    trace!("inbound queue closed, sending exit");
    if writer.write_event(&Event::exit()).await.is_ok() {
        let _ = writer.finish().await;
    }
}

/// Feeds the outbound queue from the transport.
///
/// Decodes records until error, EOF, or an `Exit` event, then drops
/// the sender, closing the outbound queue exactly once.
async fn run_reader_pump<R>(recv: R, events: mpsc::Sender<Event>)
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let mut reader = EventReader::new(recv);

    loop {
        match reader.read_event().await {
            Ok(Some(event)) => {
                let is_exit = event.kind == EventKind::Exit;
                if events.send(event).await.is_err() {
                    trace!("outbound queue receiver gone");
                    return;
                }
                if is_exit {
                    trace!("exit event received, reader pump stopping");
                    return;
                }
            }
            Ok(None) => {
                debug!("event channel EOF");
                return;
            }
            Err(e) => {
                debug!(error = %e, "reader pump terminating");
                return;
            }
        }
    }
}

/// Cloneable handle for enqueueing outbound events.
///
/// Producers (per-connection pumps, the accept loop, the ping task)
/// hold an `EventSink` rather than a pipe sender so the server can
/// replace the event channel underneath them. Sends resolve the
/// current sender under a short lock and tolerate a closed channel:
/// while no pipe is attached, events are dropped.
#[derive(Clone)]
pub struct EventSink {
    current: Arc<RwLock<mpsc::Sender<Event>>>,
}

impl EventSink {
    /// Creates a sink over an initial sender.
    #[must_use]
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self {
            current: Arc::new(RwLock::new(sender)),
        }
    }

    /// Creates a sink with no pipe attached: all sends fail until
    /// [`replace`](Self::replace) is called.
    #[must_use]
    pub fn detached() -> Self {
        let (sender, _) = mpsc::channel(1);
        Self::new(sender)
    }

    /// Swaps in the sender of a freshly attached pipe.
    pub fn replace(&self, sender: mpsc::Sender<Event>) {
        *self.current.write().unwrap() = sender;
    }

    /// Enqueues an event on the current pipe.
    ///
    /// Blocks while the inbound queue is full (back-pressure). Returns
    /// false if no pipe is attached or the pipe died; the event is
    /// dropped.
    pub async fn send(&self, event: Event) -> bool {
        // Clone the sender out so the lock is not held across the await
        let sender = self.current.read().unwrap().clone();
        sender.send(event).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two pipes over the two ends of an in-memory duplex behave like a
    /// connected server/client pair.
    fn pipe_pair() -> (EventPipe, EventPipe) {
        let (a, b) = tokio::io::duplex(16 * 1024);
        (EventPipe::spawn(a), EventPipe::spawn(b))
    }

    #[tokio::test]
    async fn events_cross_the_pipe() {
        let (near, mut far) = pipe_pair();

        let event = Event::data("u-1", b"payload");
        near.sender().send(event.clone()).await.expect("send");

        assert_eq!(far.recv().await, Some(event));
    }

    #[tokio::test]
    async fn order_is_preserved() {
        let (near, mut far) = pipe_pair();

        let events: Vec<Event> = (0..32)
            .map(|i| Event::data("u-1", format!("chunk {i}").as_bytes()))
            .collect();
        let sender = near.sender();
        for event in &events {
            sender.send(event.clone()).await.expect("send");
        }

        for expected in &events {
            assert_eq!(far.recv().await.as_ref(), Some(expected));
        }
    }

    #[tokio::test]
    async fn clean_close_sends_exit_then_closes_outbound() {
        let (near, mut far) = pipe_pair();

        near.sender()
            .send(Event::ping())
            .await
            .expect("send");

        // Dropping every inbound sender closes the queue; the writer
        // pump signs off with Exit.
        drop(near);

        assert_eq!(far.recv().await.map(|e| e.kind), Some(EventKind::Ping));
        assert_eq!(far.recv().await.map(|e| e.kind), Some(EventKind::Exit));
        // Reader pump stops after Exit and closes the outbound queue
        assert_eq!(far.recv().await, None);
    }

    #[tokio::test]
    async fn sink_drops_events_while_detached() {
        let sink = EventSink::detached();
        assert!(!sink.send(Event::ping()).await);

        let (tx, mut rx) = mpsc::channel(4);
        sink.replace(tx);
        assert!(sink.send(Event::ping()).await);
        assert_eq!(rx.recv().await.map(|e: Event| e.kind), Some(EventKind::Ping));
    }

    #[tokio::test]
    async fn sink_survives_pipe_replacement() {
        let (old_tx, old_rx) = mpsc::channel(4);
        let sink = EventSink::new(old_tx);
        drop(old_rx);

        // Old pipe is gone; sends fail but do not panic
        assert!(!sink.send(Event::ping()).await);

        let (new_tx, mut new_rx) = mpsc::channel(4);
        sink.replace(new_tx);
        assert!(sink.send(Event::data("u", b"x")).await);
        assert_eq!(
            new_rx.recv().await.map(|e| e.kind),
            Some(EventKind::Data)
        );
    }

    #[tokio::test]
    async fn shutdown_tears_the_channel_down() {
        let (near, mut far) = pipe_pair();
        let (_tx, _rx, tasks) = near.into_parts();

        tasks.shutdown();

        // The far side observes the transport drop: its reader pump
        // ends and closes the outbound queue without an Exit.
        assert_eq!(far.recv().await, None);
    }
}
