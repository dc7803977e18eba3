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

//! Error types for relay operations.

use thiserror::Error;

/// Errors that can occur while running a relay role.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// TLS material could not be loaded or the TLS config is invalid.
    #[error("TLS error: {0}")]
    Tls(#[from] crate::tls::TlsError),

    /// I/O error on a listener or the event channel.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Wire-level error on the event channel.
    #[error("wire error: {0}")]
    Wire(#[from] tls_relay_wire::WireError),

    /// Codec error while encoding or decoding an event.
    #[error("codec error: {0}")]
    Codec(#[from] tls_relay_wire::CodecError),

    /// The peer violated the event protocol.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// A write to a registered target socket failed.
    ///
    /// Data already accepted from the peer would be lost, so this is
    /// unrecoverable.
    #[error("write to stream {uid} failed: {source}")]
    StreamWrite {
        /// The stream whose socket rejected the write.
        uid: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The event channel closed without a clean `Exit`.
    #[error("event channel closed")]
    ChannelClosed,
}

impl Error {
    /// Creates a protocol violation error.
    pub fn protocol_violation(message: impl Into<String>) -> Self {
        Self::ProtocolViolation(message.into())
    }

    /// Creates a stream write error.
    pub fn stream_write(uid: impl Into<String>, source: std::io::Error) -> Self {
        Self::StreamWrite {
            uid: uid.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::protocol_violation("Connect event on server role");
        assert!(err.to_string().contains("protocol violation"));
        assert!(err.to_string().contains("Connect event"));
    }

    #[test]
    fn stream_write_names_the_uid() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err = Error::stream_write("peer-{u}", io);
        assert!(err.to_string().contains("peer-{u}"));
    }
}
