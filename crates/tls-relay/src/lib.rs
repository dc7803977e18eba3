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

//! Bidirectional TCP relay over a mutually-authenticated TLS event channel.
//!
//! `tls-relay` exposes a service living behind a trust boundary without
//! opening any inbound port on the protected side. A [`Server`] accepts
//! external clients on a public listener and forwards their byte streams,
//! multiplexed as discrete events, across a single TLS channel to a
//! [`Client`] running beside the real target, which dials the target on
//! behalf of each remote user:
//!
//! ```text
//! external user            Server (public)           Client (protected)      target
//! ─────────────           ────────────────           ──────────────────      ──────
//!      │── TCP ──────────>│                               │                    │
//!      │                  │<──── TLS event channel ───────│  Client dials out  │
//!      │                  │  Connect / Data / Disconnect  │── TCP ────────────>│
//!      │<════ bytes ═════>│<══════════ events ═══════════>│<═════ bytes ══════>│
//! ```
//!
//! The channel carries gzip-compressed, self-delimited BSON records (see
//! [`tls_relay_wire`]); per-stream byte order is preserved end to end,
//! while distinct streams interleave freely. The server survives event
//! channel loss and reattaches to the next connection; on the client a
//! channel loss is terminal.

pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod pipe;
pub mod registry;
pub mod server;
pub mod state;
pub mod stream;
pub mod tls;

pub use client::Client;
pub use config::{ClientConfig, ConfigError, ServerConfig};
pub use error::Error;
pub use pipe::{EventPipe, EventSink};
pub use registry::Registry;
pub use server::Server;
pub use state::{ChannelState, StreamState};
pub use stream::RelayConn;

pub use tls_relay_wire::{Event, EventKind};
