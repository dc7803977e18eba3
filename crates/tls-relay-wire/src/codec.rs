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

//! Codec abstraction for event serialization.
//!
//! This module provides a trait for pluggable serialization codecs.
//! The event channel's record format is BSON, so the default (and only
//! shipped) implementation is [`BsonCodec`].

use crate::Event;
use thiserror::Error;

/// Errors that can occur during codec operations.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Serialization failed.
    #[error("serialization failed: {0}")]
    Serialize(String),

    /// Deserialization failed.
    #[error("deserialization failed: {0}")]
    Deserialize(String),
}

/// Trait for event serialization codecs.
///
/// Implementations must be thread-safe as they may be shared across
/// async tasks. An encoded event must be self-delimited: its total
/// length must be recoverable from the encoded bytes alone so records
/// can be concatenated on the wire without outer framing.
pub trait Codec: Send + Sync + 'static {
    /// Encodes an event to its wire record.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn encode_event(&self, event: &Event) -> Result<Vec<u8>, CodecError>;

    /// Decodes one complete wire record into an event.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    fn decode_event(&self, data: &[u8]) -> Result<Event, CodecError>;
}

/// BSON codec producing the event channel's record format.
///
/// Every record is a BSON document whose first four bytes are the
/// document's own length, little-endian, including those four bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct BsonCodec;

impl BsonCodec {
    /// Creates a new BSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Codec for BsonCodec {
    fn encode_event(&self, event: &Event) -> Result<Vec<u8>, CodecError> {
        bson::to_vec(event).map_err(|e| CodecError::Serialize(e.to_string()))
    }

    fn decode_event(&self, data: &[u8]) -> Result<Event, CodecError> {
        bson::from_slice(data).map_err(|e| CodecError::Deserialize(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventKind;

    #[test]
    fn round_trip_all_kinds() {
        let codec = BsonCodec::new();
        let events = [
            Event::connect("peer-{01ARZ}"),
            Event::disconnect("peer-{01ARZ}"),
            Event::data("peer-{01ARZ}", b"hello"),
            Event::exit(),
            Event::ping(),
        ];

        for event in &events {
            let encoded = codec.encode_event(event).expect("encode should succeed");
            let decoded = codec.decode_event(&encoded).expect("decode should succeed");
            assert_eq!(&decoded, event);
        }
    }

    #[test]
    fn encode_is_deterministic() {
        let codec = BsonCodec::new();
        let event = Event::data("u", &[0, 1, 2, 3]);

        let a = codec.encode_event(&event).expect("encode should succeed");
        let b = codec.encode_event(&event).expect("encode should succeed");
        assert_eq!(a, b);
    }

    #[test]
    fn record_reports_its_own_length() {
        let codec = BsonCodec::new();
        let encoded = codec
            .encode_event(&Event::data("u1", b"payload"))
            .expect("encode should succeed");

        let declared =
            u32::from_le_bytes([encoded[0], encoded[1], encoded[2], encoded[3]]) as usize;
        assert_eq!(declared, encoded.len());
    }

    #[test]
    fn wire_field_names() {
        let codec = BsonCodec::new();
        let encoded = codec
            .encode_event(&Event::data("u1", b"xy"))
            .expect("encode should succeed");

        let doc: bson::Document =
            bson::from_slice(&encoded).expect("record should be a BSON document");
        assert_eq!(doc.get_str("t").expect("t field"), "Data");
        assert_eq!(doc.get_str("uid").expect("uid field"), "u1");
        let binary = doc.get_binary_generic("data").expect("data field is binary");
        assert_eq!(binary.as_slice(), b"xy");
    }

    #[test]
    fn empty_payload_round_trips() {
        let codec = BsonCodec::new();
        let encoded = codec
            .encode_event(&Event::exit())
            .expect("encode should succeed");
        let decoded = codec.decode_event(&encoded).expect("decode should succeed");

        assert_eq!(decoded.kind, EventKind::Exit);
        assert!(decoded.uid.is_empty());
        assert!(decoded.data.is_empty());
    }

    #[test]
    fn decode_invalid_data() {
        let codec = BsonCodec::new();
        let invalid = [0xffu8, 0xff, 0xff, 0xff, 0x00];
        assert!(codec.decode_event(&invalid).is_err());
    }

    #[test]
    fn codec_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BsonCodec>();
    }
}
