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

//! Lifecycle state machines.
//!
//! Defines the per-stream state progression and the server's event
//! channel state, with the valid transitions for each.

/// Per-stream lifecycle state.
///
/// Both roles drive a stream through the same progression:
/// ```text
/// Idle ──► Registered ──► Closed
///   │                       ▲
///   └───────────────────────┘ (abandoned before registration)
/// ```
/// `Registered` is entered on local accept (server) or on `Connect`
/// consumption (client). `Closed` is entered on read EOF, peer reset,
/// inbound `Disconnect`, or write error; closing is idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StreamState {
    /// Socket exists but carries no uid yet.
    #[default]
    Idle,
    /// Socket is registered in the registry under a uid.
    Registered,
    /// Stream has ended; the socket is closed or closing.
    Closed,
}

impl StreamState {
    /// Converts from the u8 representation used in atomic storage.
    #[must_use]
    pub(crate) const fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Idle,
            1 => Self::Registered,
            _ => Self::Closed,
        }
    }

    /// Returns true if the stream is registered and may carry data.
    #[must_use]
    pub const fn is_registered(&self) -> bool {
        matches!(self, Self::Registered)
    }

    /// Returns true if the stream has ended.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Returns true if a transition to the target state is valid.
    #[must_use]
    pub const fn can_transition_to(&self, target: Self) -> bool {
        use StreamState::{Closed, Idle, Registered};

        match (*self, target) {
            (Idle, Registered) => true,
            // Close is reachable from anywhere and idempotent
            (Idle | Registered | Closed, Closed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Registered => write!(f, "registered"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Server event-channel state.
///
/// ```text
/// NoPipe ──► Active ──► NoPipe ──► ...
/// ```
/// `Active` is entered when an event channel peer attaches; `NoPipe`
/// when the outbound queue closes. The server cycles between the two
/// for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelState {
    /// No event channel attached; outbound events are dropped.
    #[default]
    NoPipe,
    /// An event channel is attached and draining.
    Active,
}

impl ChannelState {
    /// Returns true if an event channel is attached.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoPipe => write!(f, "no-pipe"),
            Self::Active => write!(f, "active"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions() {
        assert!(StreamState::Idle.can_transition_to(StreamState::Registered));
        assert!(StreamState::Registered.can_transition_to(StreamState::Closed));
        assert!(StreamState::Idle.can_transition_to(StreamState::Closed));
    }

    #[test]
    fn close_is_idempotent() {
        assert!(StreamState::Closed.can_transition_to(StreamState::Closed));
    }

    #[test]
    fn no_reopening() {
        assert!(!StreamState::Closed.can_transition_to(StreamState::Registered));
        assert!(!StreamState::Closed.can_transition_to(StreamState::Idle));
        assert!(!StreamState::Registered.can_transition_to(StreamState::Idle));
    }

    #[test]
    fn atomic_round_trip() {
        for state in [
            StreamState::Idle,
            StreamState::Registered,
            StreamState::Closed,
        ] {
            assert_eq!(StreamState::from_u8(state as u8), state);
        }
    }

    #[test]
    fn stream_state_display() {
        assert_eq!(StreamState::Idle.to_string(), "idle");
        assert_eq!(StreamState::Registered.to_string(), "registered");
        assert_eq!(StreamState::Closed.to_string(), "closed");
    }

    #[test]
    fn channel_state() {
        assert!(!ChannelState::NoPipe.is_active());
        assert!(ChannelState::Active.is_active());
        assert_eq!(ChannelState::NoPipe.to_string(), "no-pipe");
        assert_eq!(ChannelState::Active.to_string(), "active");
    }
}
