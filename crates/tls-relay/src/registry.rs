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

// RwLock::read()/write().unwrap() is the standard pattern in Rust. The lock
// only fails if it is poisoned (a thread panicked while holding it), which
// indicates a bug elsewhere that should propagate. We also suppress the
// "missing # Panics" warning since these are not user-actionable panics.
#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

//! Stream registry.
//!
//! The registry is the sole authority on which sockets map to which
//! stream uids. It keeps both directions of the mapping consistent
//! under a single readers/writer lock; no operation suspends, so the
//! lock is never held across an await point.

use crate::stream::RelayConn;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use ulid::Ulid;

/// Bidirectional map between live sockets and stream uids.
///
/// Entries are created by the server when it accepts an external
/// connection ([`create_uid`](Self::create_uid)) and by the client when
/// it processes a `Connect` event ([`set`](Self::set)). Entries are
/// removed when the underlying socket closes or a `Disconnect` event is
/// consumed.
#[derive(Debug, Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    by_uid: HashMap<String, Arc<RelayConn>>,
    by_conn: HashMap<u64, String>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the socket mapped to `uid`, if any.
    #[must_use]
    pub fn get_conn(&self, uid: &str) -> Option<Arc<RelayConn>> {
        self.inner.read().unwrap().by_uid.get(uid).cloned()
    }

    /// Returns the uid mapped to `conn`, or the empty string if the
    /// socket is not registered.
    #[must_use]
    pub fn get_uid(&self, conn: &RelayConn) -> String {
        self.inner
            .read()
            .unwrap()
            .by_conn
            .get(&conn.id())
            .cloned()
            .unwrap_or_default()
    }

    /// Inserts both directions of the mapping.
    ///
    /// If either key already maps, the existing mapping is overwritten;
    /// callers must not rely on rollback.
    pub fn set(&self, conn: &Arc<RelayConn>, uid: impl Into<String>) {
        let uid = uid.into();
        let mut inner = self.inner.write().unwrap();
        inner.by_conn.insert(conn.id(), uid.clone());
        inner.by_uid.insert(uid, Arc::clone(conn));
        conn.mark_registered();
    }

    /// Returns the uid for `conn`, minting and registering one if the
    /// socket has none yet.
    ///
    /// Atomic against concurrent calls for the same socket: exactly one
    /// uid is ever minted per socket.
    pub fn create_uid(&self, conn: &Arc<RelayConn>) -> String {
        let mut inner = self.inner.write().unwrap();
        if let Some(uid) = inner.by_conn.get(&conn.id()) {
            return uid.clone();
        }

        let uid = mint_uid(conn);
        inner.by_conn.insert(conn.id(), uid.clone());
        inner.by_uid.insert(uid.clone(), Arc::clone(conn));
        conn.mark_registered();
        uid
    }

    /// Deletes both directions of the mapping for `uid`, returning the
    /// socket so the caller can close it.
    pub fn remove_by_uid(&self, uid: &str) -> Option<Arc<RelayConn>> {
        let mut inner = self.inner.write().unwrap();
        let conn = inner.by_uid.remove(uid)?;
        inner.by_conn.remove(&conn.id());
        Some(conn)
    }

    /// Deletes both directions of the mapping for `conn` and closes the
    /// socket inside the critical section.
    ///
    /// Returns the uid the socket had, or the empty string if it was
    /// not registered.
    pub fn remove_by_conn(&self, conn: &RelayConn) -> String {
        let mut inner = self.inner.write().unwrap();
        match inner.by_conn.remove(&conn.id()) {
            Some(uid) => {
                inner.by_uid.remove(&uid);
                conn.close();
                uid
            }
            None => String::new(),
        }
    }

    /// Returns the number of registered streams.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().by_uid.len()
    }

    /// Returns true if no streams are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Mints a stream uid for a socket.
///
/// The printable form is `"<peer-address>-{<ulid>}"`: the remote TCP
/// address aids debugging, and the ULID contributes a millisecond
/// timestamp prefix plus 80 bits of randomness, so uids sort by
/// creation time and never collide within a process lifetime.
fn mint_uid(conn: &RelayConn) -> String {
    format!("{}-{{{}}}", conn.peer(), Ulid::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StreamState;
    use tokio::net::{TcpListener, TcpStream};

    async fn make_conn() -> Arc<RelayConn> {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (dialed, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let _hold = accepted.expect("accept");
        let (conn, _read) = RelayConn::new(dialed.expect("connect")).expect("wrap");
        conn
    }

    #[tokio::test]
    async fn set_then_lookup_both_directions() {
        let registry = Registry::new();
        let conn = make_conn().await;

        registry.set(&conn, "u-1");

        let found = registry.get_conn("u-1").expect("mapped");
        assert_eq!(found.id(), conn.id());
        assert_eq!(registry.get_uid(&conn), "u-1");
        assert_eq!(conn.state(), StreamState::Registered);
    }

    #[tokio::test]
    async fn missing_lookups_are_empty() {
        let registry = Registry::new();
        let conn = make_conn().await;

        assert!(registry.get_conn("nope").is_none());
        assert_eq!(registry.get_uid(&conn), "");
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn create_uid_is_stable_per_socket() {
        let registry = Registry::new();
        let conn = make_conn().await;

        let first = registry.create_uid(&conn);
        let second = registry.create_uid(&conn);
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn uids_embed_the_peer_address() {
        let registry = Registry::new();
        let conn = make_conn().await;

        let uid = registry.create_uid(&conn);
        assert!(uid.starts_with(&conn.peer().to_string()));
        assert!(uid.ends_with('}'));
    }

    #[tokio::test]
    async fn distinct_sockets_get_distinct_uids() {
        let registry = Registry::new();
        let a = make_conn().await;
        let b = make_conn().await;

        assert_ne!(registry.create_uid(&a), registry.create_uid(&b));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn remove_by_uid_clears_both_directions() {
        let registry = Registry::new();
        let conn = make_conn().await;
        let uid = registry.create_uid(&conn);

        let removed = registry.remove_by_uid(&uid).expect("was mapped");
        assert_eq!(removed.id(), conn.id());
        assert!(registry.get_conn(&uid).is_none());
        assert_eq!(registry.get_uid(&conn), "");
        // remove_by_uid leaves closing to the caller
        assert_ne!(conn.state(), StreamState::Closed);
    }

    #[tokio::test]
    async fn remove_by_conn_closes_and_returns_uid() {
        let registry = Registry::new();
        let conn = make_conn().await;
        let uid = registry.create_uid(&conn);

        assert_eq!(registry.remove_by_conn(&conn), uid);
        assert_eq!(conn.state(), StreamState::Closed);

        // Second removal finds nothing
        assert_eq!(registry.remove_by_conn(&conn), "");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_create_uid_agrees() {
        let registry = Arc::new(Registry::new());
        let conn = make_conn().await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            let conn = Arc::clone(&conn);
            handles.push(tokio::spawn(
                async move { registry.create_uid(&conn) },
            ));
        }

        let mut uids = Vec::new();
        for handle in handles {
            uids.push(handle.await.expect("task"));
        }
        uids.dedup();
        assert_eq!(uids.len(), 1, "all callers must observe the same uid");
        assert_eq!(registry.len(), 1);
    }
}
