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

//! Error types for the wire protocol.

use thiserror::Error;

/// Errors that can occur while handling wire records.
#[derive(Debug, Error)]
pub enum WireError {
    /// Record exceeds the maximum allowed size.
    #[error("record size {size} exceeds maximum {max}", max = crate::MAX_RECORD_SIZE)]
    RecordTooLarge {
        /// The declared record size.
        size: usize,
    },

    /// Record is smaller than the smallest possible BSON document.
    #[error("record size {size} below minimum {min}", min = crate::MIN_RECORD_SIZE)]
    RecordTooSmall {
        /// The declared record size.
        size: usize,
    },

    /// Codec error during serialization or deserialization.
    #[error("codec error: {0}")]
    Codec(#[from] crate::CodecError),

    /// I/O error during read or write operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
