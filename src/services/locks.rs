//! Per-key exclusive regions
//!
//! Every mutation of a book's stock, its borrow records or its reservation
//! queue runs while holding that book's region. User-level changes (credit,
//! status) additionally hold the user's region. Regions are always taken in
//! the order book, then user; several books are locked in ascending id order.

use std::{
    collections::HashMap,
    hash::Hash,
    sync::{Arc, Mutex},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Arena of lazily created mutexes, one per key, never removed
pub struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Copy> KeyedLocks<K> {
    fn slot(&self, key: K) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slots.entry(key).or_default().clone()
    }

    /// Wait for exclusive access to `key`. Waiters are served in arrival order.
    pub async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
        self.slot(key).lock_owned().await
    }

    /// Number of keys seen so far
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Proof that the holder has exclusive access to one book
pub struct BookRegion {
    book_id: i32,
    _guard: OwnedMutexGuard<()>,
}

impl BookRegion {
    pub fn book_id(&self) -> i32 {
        self.book_id
    }
}

/// Proof that the holder has exclusive access to one user account
pub struct UserRegion {
    _guard: OwnedMutexGuard<()>,
}

#[derive(Default)]
pub struct Regions {
    books: KeyedLocks<i32>,
    users: KeyedLocks<i32>,
}

impl Regions {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn book(&self, book_id: i32) -> BookRegion {
        BookRegion {
            book_id,
            _guard: self.books.lock(book_id).await,
        }
    }

    /// Lock several books, in ascending id order, each once
    pub async fn books(&self, book_ids: &[i32]) -> Vec<BookRegion> {
        let mut ids = book_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mut regions = Vec::with_capacity(ids.len());
        for id in ids {
            regions.push(self.book(id).await);
        }
        regions
    }

    pub async fn user(&self, user_id: i32) -> UserRegion {
        UserRegion {
            _guard: self.users.lock(user_id).await,
        }
    }
}
