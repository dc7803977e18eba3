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

//! Event channel handler.
//!
//! Manages reading and writing events on one half of the event channel.
//! The channel carries a single gzip stream whose decompressed form is
//! a concatenation of self-delimited BSON records; every record is
//! sync-flushed through the compressor so the receiver never waits on
//! compressor buffering.

use crate::Error;
use flate2::write::{GzDecoder, GzEncoder};
use flate2::Compression;
use std::io::Write;
use tls_relay_wire::{BsonCodec, Codec, Event, RecordReader};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{trace, warn};

/// Transport read buffer size.
const READ_BUF_SIZE: usize = 4096;

/// Handles reading events from the event channel.
pub struct EventReader<R> {
    recv: R,
    /// Write-through gzip decoder; decompressed bytes collect in the
    /// inner buffer until drained into `records`.
    decoder: GzDecoder<Vec<u8>>,
    records: RecordReader,
    codec: BsonCodec,
    read_buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> EventReader<R> {
    /// Creates a new event reader wrapping the receive half.
    pub fn new(recv: R) -> Self {
        Self {
            recv,
            decoder: GzDecoder::new(Vec::new()),
            records: RecordReader::with_capacity(READ_BUF_SIZE),
            codec: BsonCodec::new(),
            read_buf: vec![0u8; READ_BUF_SIZE],
        }
    }

    /// Reads the next event from the channel.
    ///
    /// Returns `Ok(None)` if the channel has closed gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails, the gzip stream is invalid,
    /// or a record is malformed. Any error here is channel-fatal; the
    /// caller must stop reading.
    pub async fn read_event(&mut self) -> Result<Option<Event>, Error> {
        loop {
            // Try to extract a complete record from decompressed data
            match self.records.read_record() {
                Ok(Some(record)) => {
                    let event = self.codec.decode_event(&record)?;
                    trace!(kind = %event.kind, len = record.len(), "received event");
                    return Ok(Some(event));
                }
                Ok(None) => {
                    // Need more data
                }
                Err(e) => {
                    warn!(error = %e, "record read error");
                    return Err(e.into());
                }
            }

            // Read more compressed data from the transport
            let n = self.recv.read(&mut self.read_buf).await.map_err(|e| {
                warn!(error = %e, "event channel read error");
                Error::Io(e)
            })?;

            if n == 0 {
                if self.records.buffered_len() > 0 {
                    warn!(
                        buffered = self.records.buffered_len(),
                        "event channel closed with partial record"
                    );
                    return Err(Error::protocol_violation(
                        "event channel closed with partial record",
                    ));
                }
                trace!("event channel closed gracefully");
                return Ok(None);
            }

            // Run it through the decompressor; an invalid gzip header
            // or corrupt stream surfaces here and kills the channel.
            self.decoder.write_all(&self.read_buf[..n]).map_err(|e| {
                warn!(error = %e, "gzip decode error");
                Error::Io(e)
            })?;
            self.decoder.flush().map_err(Error::Io)?;

            let decompressed = std::mem::take(self.decoder.get_mut());
            trace!(
                compressed = n,
                decompressed = decompressed.len(),
                "read from event channel"
            );
            self.records.extend(&decompressed);
        }
    }
}

/// Handles writing events to the event channel.
pub struct EventWriter<W> {
    send: W,
    encoder: GzEncoder<Vec<u8>>,
    codec: BsonCodec,
}

impl<W: AsyncWrite + Unpin> EventWriter<W> {
    /// Creates a new event writer wrapping the send half.
    pub fn new(send: W) -> Self {
        Self {
            send,
            encoder: GzEncoder::new(Vec::new(), Compression::default()),
            codec: BsonCodec::new(),
        }
    }

    /// Writes one event to the channel and flushes it through both the
    /// compressor and the transport.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding, compression, or the transport
    /// write fails. Any error here is channel-fatal; the caller must
    /// stop writing.
    pub async fn write_event(&mut self, event: &Event) -> Result<(), Error> {
        let record = self.codec.encode_event(event)?;

        // Sync-flush so this record is immediately decodable downstream
        self.encoder.write_all(&record).map_err(Error::Io)?;
        self.encoder.flush().map_err(Error::Io)?;

        let compressed = std::mem::take(self.encoder.get_mut());
        trace!(
            kind = %event.kind,
            record = record.len(),
            compressed = compressed.len(),
            "sending event"
        );

        self.send.write_all(&compressed).await.map_err(|e| {
            if crate::stream::is_connection_closed_error(&e) {
                trace!(error = %e, "event channel write failed (connection closed)");
            } else {
                warn!(error = %e, "event channel write error");
            }
            Error::Io(e)
        })?;
        self.send.flush().await.map_err(Error::Io)?;

        Ok(())
    }

    /// Gracefully shuts down the send half.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown fails.
    pub async fn finish(mut self) -> Result<(), Error> {
        self.send.shutdown().await.map_err(Error::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tls_relay_wire::EventKind;

    #[tokio::test]
    async fn event_round_trip() {
        let (ours, theirs) = tokio::io::duplex(4096);
        let (their_read, _their_write) = tokio::io::split(theirs);
        let (_our_read, our_write) = tokio::io::split(ours);

        let mut writer = EventWriter::new(our_write);
        let mut reader = EventReader::new(their_read);

        let event = Event::data("u-1", b"hello, relay");
        writer.write_event(&event).await.expect("write");

        let received = reader
            .read_event()
            .await
            .expect("read")
            .expect("should have event");
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn events_arrive_in_order() {
        let (ours, theirs) = tokio::io::duplex(4096);
        let (their_read, _tw) = tokio::io::split(theirs);
        let (_or, our_write) = tokio::io::split(ours);

        let mut writer = EventWriter::new(our_write);
        let mut reader = EventReader::new(their_read);

        let events = [
            Event::connect("u-1"),
            Event::data("u-1", b"first"),
            Event::data("u-1", b"second"),
            Event::disconnect("u-1"),
        ];
        for event in &events {
            writer.write_event(event).await.expect("write");
        }

        for expected in &events {
            let received = reader
                .read_event()
                .await
                .expect("read")
                .expect("should have event");
            assert_eq!(&received, expected);
        }
    }

    #[tokio::test]
    async fn wire_bytes_are_gzip() {
        let (ours, mut theirs) = tokio::io::duplex(4096);
        let (_or, our_write) = tokio::io::split(ours);

        let mut writer = EventWriter::new(our_write);
        writer.write_event(&Event::ping()).await.expect("write");

        let mut wire = [0u8; 2];
        theirs.read_exact(&mut wire).await.expect("read magic");
        assert_eq!(wire, [0x1f, 0x8b], "stream must start with gzip magic");
    }

    #[tokio::test]
    async fn graceful_close_returns_none() {
        let (ours, theirs) = tokio::io::duplex(4096);
        let (their_read, _tw) = tokio::io::split(theirs);
        let (_or, our_write) = tokio::io::split(ours);

        let mut writer = EventWriter::new(our_write);
        writer.write_event(&Event::exit()).await.expect("write");
        writer.finish().await.expect("finish");

        let mut reader = EventReader::new(their_read);
        let first = reader.read_event().await.expect("read");
        assert_eq!(first.map(|e| e.kind), Some(EventKind::Exit));

        let second = reader.read_event().await.expect("read");
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn garbage_stream_is_an_error() {
        let (mut ours, theirs) = tokio::io::duplex(4096);
        let (their_read, _tw) = tokio::io::split(theirs);

        ours.write_all(b"definitely not a gzip stream")
            .await
            .expect("write");
        ours.shutdown().await.expect("shutdown");

        let mut reader = EventReader::new(their_read);
        assert!(reader.read_event().await.is_err());
    }
}
