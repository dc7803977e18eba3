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

//! Event definitions.
//!
//! An [`Event`] is the unit carried on the event channel. Connection
//! lifecycle and data transfer for every relayed stream are multiplexed
//! as events over the single channel, addressed by stream uid.

use serde::{Deserialize, Serialize};

/// The kind of an event.
///
/// Kinds serialize as their variant name (`"Connect"`, `"Data"`, ...)
/// in the wire document's `t` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A new external connection was accepted. Produced only by the
    /// server; consumed only by the client.
    Connect,
    /// A stream ended on the emitting side. Flows in both directions.
    Disconnect,
    /// A chunk of stream bytes. Flows in both directions.
    Data,
    /// The emitting side is done with the channel; terminates the
    /// receiving role loop.
    Exit,
    /// Keep-alive. Ignored on receipt.
    Ping,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect => write!(f, "Connect"),
            Self::Disconnect => write!(f, "Disconnect"),
            Self::Data => write!(f, "Data"),
            Self::Exit => write!(f, "Exit"),
            Self::Ping => write!(f, "Ping"),
        }
    }
}

/// An event on the event channel.
///
/// The wire form is a BSON document with fields `t` (kind), `uid`
/// (stream identifier, empty for `Exit` and `Ping`), and `data`
/// (payload bytes, non-empty only for `Data`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// The event kind.
    #[serde(rename = "t")]
    pub kind: EventKind,
    /// Stream identifier this event addresses.
    pub uid: String,
    /// Payload bytes. Encoded as BSON binary.
    #[serde(default, with = "serde_bytes")]
    pub data: Vec<u8>,
}

impl Event {
    /// Creates a `Connect` event for the given uid.
    #[must_use]
    pub fn connect(uid: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Connect,
            uid: uid.into(),
            data: Vec::new(),
        }
    }

    /// Creates a `Disconnect` event for the given uid.
    #[must_use]
    pub fn disconnect(uid: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Disconnect,
            uid: uid.into(),
            data: Vec::new(),
        }
    }

    /// Creates a `Data` event carrying a copy of `bytes`.
    ///
    /// The slice is copied so the caller's read buffer may be reused
    /// immediately.
    #[must_use]
    pub fn data(uid: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            kind: EventKind::Data,
            uid: uid.into(),
            data: bytes.to_vec(),
        }
    }

    /// Creates an `Exit` event.
    #[must_use]
    pub fn exit() -> Self {
        Self {
            kind: EventKind::Exit,
            uid: String::new(),
            data: Vec::new(),
        }
    }

    /// Creates a `Ping` event.
    #[must_use]
    pub fn ping() -> Self {
        Self {
            kind: EventKind::Ping,
            uid: String::new(),
            data: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_copies_the_callers_buffer() {
        let mut buf = vec![1u8, 2, 3, 4];
        let event = Event::data("u1", &buf[..2]);

        // Mutating the source buffer must not affect the event.
        buf[0] = 0xff;

        assert_eq!(event.kind, EventKind::Data);
        assert_eq!(event.uid, "u1");
        assert_eq!(event.data, vec![1, 2]);
    }

    #[test]
    fn control_events_carry_empty_fields() {
        let exit = Event::exit();
        assert_eq!(exit.kind, EventKind::Exit);
        assert!(exit.uid.is_empty());
        assert!(exit.data.is_empty());

        let ping = Event::ping();
        assert_eq!(ping.kind, EventKind::Ping);
        assert!(ping.uid.is_empty());
        assert!(ping.data.is_empty());
    }

    #[test]
    fn lifecycle_events_carry_the_uid() {
        let connect = Event::connect("127.0.0.1:9999-{abc}");
        assert_eq!(connect.kind, EventKind::Connect);
        assert_eq!(connect.uid, "127.0.0.1:9999-{abc}");
        assert!(connect.data.is_empty());

        let disconnect = Event::disconnect("127.0.0.1:9999-{abc}");
        assert_eq!(disconnect.kind, EventKind::Disconnect);
        assert_eq!(disconnect.uid, "127.0.0.1:9999-{abc}");
    }

    #[test]
    fn kind_display() {
        assert_eq!(EventKind::Connect.to_string(), "Connect");
        assert_eq!(EventKind::Exit.to_string(), "Exit");
        assert_eq!(EventKind::Ping.to_string(), "Ping");
    }
}
