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

//! Record extraction for the event channel byte stream.
//!
//! Records are self-delimited BSON documents concatenated back to back:
//!
//! ```text
//! ┌────────────────────┬──────────────────────────────────┐
//! │ Length (4 bytes)   │      Rest of document (N-4)      │
//! │ little-endian,     │      fields t / uid / data       │
//! │ includes itself    │                                  │
//! └────────────────────┴──────────────────────────────────┘
//! ```
//!
//! There is no outer framing layer; the decoder locates boundaries from
//! the embedded length alone. The maximum record size is 64KB to prevent
//! memory exhaustion from a corrupt or hostile length field.

use crate::WireError;
use bytes::BytesMut;

/// Maximum record size (64KB).
///
/// Data events carry at most 1KB of payload, so any larger length field
/// indicates corruption and is rejected.
pub const MAX_RECORD_SIZE: usize = 65536;

/// Minimum record size: an empty BSON document (4-byte length plus the
/// terminating NUL).
pub const MIN_RECORD_SIZE: usize = 5;

/// Embedded length field size in bytes.
const LENGTH_SIZE: usize = 4;

/// Reads self-delimited records from a byte stream.
///
/// This struct maintains internal state for incremental parsing,
/// allowing records to be read from partial data as it arrives.
#[derive(Debug, Default)]
pub struct RecordReader {
    /// Buffer for accumulating incoming (already decompressed) data.
    buffer: BytesMut,
}

impl RecordReader {
    /// Creates a new record reader.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
        }
    }

    /// Creates a new record reader with the specified initial capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to read a complete record from the buffer.
    ///
    /// Returns `Ok(Some(record))` if a complete record is available
    /// (including its leading length bytes), `Ok(None)` if more data is
    /// needed, or an error if the embedded length is implausible.
    ///
    /// # Errors
    ///
    /// Returns an error if the record size exceeds [`MAX_RECORD_SIZE`]
    /// or falls below [`MIN_RECORD_SIZE`].
    pub fn read_record(&mut self) -> Result<Option<Vec<u8>>, WireError> {
        // Need at least the embedded length field
        if self.buffer.len() < LENGTH_SIZE {
            return Ok(None);
        }

        // Peek at the length without consuming; it counts itself
        let length = u32::from_le_bytes([
            self.buffer[0],
            self.buffer[1],
            self.buffer[2],
            self.buffer[3],
        ]) as usize;

        if length > MAX_RECORD_SIZE {
            return Err(WireError::RecordTooLarge { size: length });
        }
        if length < MIN_RECORD_SIZE {
            return Err(WireError::RecordTooSmall { size: length });
        }

        // Check if we have the complete record
        if self.buffer.len() < length {
            return Ok(None);
        }

        // Hand back the whole document, length bytes included: the BSON
        // decoder expects them.
        let record = self.buffer.split_to(length).to_vec();

        Ok(Some(record))
    }

    /// Returns the number of bytes currently buffered.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
