// SPDX-FileCopyrightText: 2026 The Registry Authors
// SPDX-License-Identifier: MIT

//! Per-name publish locks.
//!
//! Each server name maps to a 63-bit key; holding the key's lock gives
//! exclusive access to that name's publish critical section. Distinct names
//! whose keys collide are serialized against each other, which costs
//! throughput but never correctness.
//!
//! The lock is released when its guard is dropped: on success, on error,
//! and when the future holding it is cancelled.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::{Error, Result};

/// Hash a server name to a non-negative lock key.
///
/// FNV-1a 64-bit, masked to 63 bits so the key fits a signed 64-bit integer.
pub fn hash_server_name(name: &str) -> i64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let hash = name.bytes().fold(OFFSET, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(PRIME)
    });
    (hash & 0x7FFF_FFFF_FFFF_FFFF) as i64
}

type Slot = Arc<AsyncMutex<()>>;

/// Table of lock slots keyed by hashed name.
///
/// Slots exist only while someone holds or waits for them.
#[derive(Clone, Default)]
pub struct PublishLocks {
    slots: Arc<Mutex<HashMap<i64, Slot>>>,
}

impl PublishLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive ownership of `name`'s lock.
    ///
    /// There is no timeout; a cancelled `cancel` ends the wait with
    /// [`Error::Cancelled`].
    pub async fn lock(&self, name: &str, cancel: &CancellationToken) -> Result<PublishLockGuard> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let key = hash_server_name(name);
        let slot = Arc::clone(
            self.lock_slots()
                .entry(key)
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        );

        // The slot reference is owned from here on, so the table is cleaned
        // up on every exit path including cancellation.
        let mut held = HeldSlot {
            key,
            held: None,
            slot: Some(Arc::clone(&slot)),
            locks: self.clone(),
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            owned = slot.lock_owned() => held.held = Some(owned),
        }

        trace!("Acquired publish lock {key}");
        Ok(PublishLockGuard {
            inner: Arc::new(held),
        })
    }

    /// Number of names currently locked or waited on.
    pub fn active_slots(&self) -> usize {
        self.lock_slots().len()
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<i64, Slot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Exclusive ownership of one name's publish lock.
///
/// Clones share the same ownership; the lock is released when the last
/// clone is dropped. Writes issued under the lock carry a clone into their
/// blocking task, so abandoning the caller's future does not free the name
/// while a write is still in flight.
#[derive(Clone)]
pub struct PublishLockGuard {
    inner: Arc<HeldSlot>,
}

impl PublishLockGuard {
    /// The hashed key this guard holds.
    pub fn key(&self) -> i64 {
        self.inner.key
    }

    /// Whether this guard serializes publishes of `name`.
    pub fn covers(&self, name: &str) -> bool {
        self.inner.key == hash_server_name(name)
    }
}

struct HeldSlot {
    key: i64,
    held: Option<OwnedMutexGuard<()>>,
    slot: Option<Slot>,
    locks: PublishLocks,
}

impl Drop for HeldSlot {
    fn drop(&mut self) {
        // Release the mutex before deciding whether the slot is still needed.
        let was_held = self.held.take().is_some();
        drop(self.slot.take());

        let mut slots = self.locks.lock_slots();
        if slots
            .get(&self.key)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(&self.key);
        }
        if was_held {
            trace!("Released publish lock {}", self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_hash_is_stable_and_non_negative() {
        // FNV-1a of the empty string is the offset basis with the top bit masked.
        assert_eq!(hash_server_name(""), 0x4bf2_9ce4_8422_2325);
        assert_eq!(
            hash_server_name("io.github.example/weather"),
            hash_server_name("io.github.example/weather")
        );
        assert_ne!(hash_server_name("a"), hash_server_name("b"));
        let long = "x".repeat(1000);
        for name in ["a", "io.github.example/weather", "\u{1f600}", long.as_str()] {
            assert!(hash_server_name(name) >= 0);
        }
    }

    #[test]
    fn test_hash_matches_fnv1a_reference() {
        // Reference value for FNV-1a 64 of "a" is 0xaf63dc4c8601ec8c.
        assert_eq!(hash_server_name("a"), 0x2f63_dc4c_8601_ec8c);
    }

    #[tokio::test]
    async fn test_same_name_is_exclusive() {
        let locks = PublishLocks::new();
        let cancel = CancellationToken::new();

        let first = locks.lock("weather", &cancel).await.unwrap();
        let contender = {
            let locks = locks.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let start = Instant::now();
                let _guard = locks.lock("weather", &cancel).await.unwrap();
                start.elapsed()
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(first);
        let waited = contender.await.unwrap();
        assert!(waited >= Duration::from_millis(40), "waited {waited:?}");
        assert_eq!(locks.active_slots(), 0);
    }

    #[tokio::test]
    async fn test_different_names_do_not_block() {
        let locks = PublishLocks::new();
        let cancel = CancellationToken::new();

        let _weather = locks.lock("weather", &cancel).await.unwrap();
        let notes = tokio::time::timeout(Duration::from_millis(100), locks.lock("notes", &cancel))
            .await
            .expect("different name must not wait")
            .unwrap();
        assert_ne!(notes.key(), hash_server_name("weather"));
        assert_eq!(locks.active_slots(), 2);
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_cleans_up() {
        let locks = PublishLocks::new();
        let holder_cancel = CancellationToken::new();
        let waiter_cancel = CancellationToken::new();

        let held = locks.lock("weather", &holder_cancel).await.unwrap();
        let trigger = waiter_cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = locks.lock("weather", &waiter_cancel).await;
        assert!(matches!(result, Err(Error::Cancelled)));

        drop(held);
        assert_eq!(locks.active_slots(), 0);
    }

    #[tokio::test]
    async fn test_clone_keeps_lock_held() {
        let locks = PublishLocks::new();
        let cancel = CancellationToken::new();

        let first = locks.lock("weather", &cancel).await.unwrap();
        let in_flight = first.clone();
        drop(first);

        let blocked = tokio::time::timeout(Duration::from_millis(50), locks.lock("weather", &cancel)).await;
        assert!(blocked.is_err(), "lock released while a clone was alive");
        assert_eq!(locks.active_slots(), 1);

        drop(in_flight);
        let next = tokio::time::timeout(Duration::from_millis(100), locks.lock("weather", &cancel))
            .await
            .expect("lock must be free once every clone is gone")
            .unwrap();
        assert!(next.covers("weather"));
        assert!(!next.covers("notes"));
        drop(next);
        assert_eq!(locks.active_slots(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_token_fails_fast() {
        let locks = PublishLocks::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            locks.lock("weather", &cancel).await,
            Err(Error::Cancelled)
        ));
        assert_eq!(locks.active_slots(), 0);
    }
}
