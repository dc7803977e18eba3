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

//! Wire protocol for the tls-relay event channel.
//!
//! This crate provides the event model carried on the event channel,
//! the record extraction logic, and the codec abstraction.
//!
//! Events travel as a concatenation of self-delimited BSON documents:
//! each document begins with its own total length as a 4-byte
//! little-endian integer, so record boundaries need no outer framing.

mod codec;
mod error;
mod event;
mod record;

pub use codec::{BsonCodec, Codec, CodecError};
pub use error::WireError;
pub use event::{Event, EventKind};
pub use record::{RecordReader, MAX_RECORD_SIZE, MIN_RECORD_SIZE};
