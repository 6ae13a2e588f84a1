use super::{
    CoordinationStore, Node, PrevExist, RequestOptions, StoreResponse, KEY_NOT_FOUND, NODE_EXIST,
    TEST_FAILED,
};
use crate::error::Result;
use crate::StoreIndex;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

struct Entry {
    value: String,
    created_index: StoreIndex,
    modified_index: StoreIndex,
    expires_at: Option<Instant>,
}

impl Entry {
    fn node(&self, key: &str, now: Instant) -> Node {
        Node {
            created_index: self.created_index,
            key: key.to_owned(),
            modified_index: self.modified_index,
            value: self.value.clone(),
            ttl: self
                .expires_at
                .map(|at| at.saturating_duration_since(now).as_secs() as i64),
        }
    }
}

#[derive(Default)]
struct Keys {
    /// last index handed out; every successful write or delete takes the next one
    index: StoreIndex,
    entries: HashMap<String, Entry>,
}

impl Keys {
    /// Drop the key if its TTL has run out.
    fn expire(&mut self, key: &str, now: Instant) {
        let expired = self
            .entries
            .get(key)
            .and_then(|entry| entry.expires_at)
            .map_or(false, |at| at <= now);
        if expired {
            self.entries.remove(key);
        }
    }

    fn refuse(&self, error_code: u32, message: &str, cause: String) -> StoreResponse {
        StoreResponse {
            error_code,
            message: message.to_owned(),
            cause,
            index: self.index,
            ..StoreResponse::default()
        }
    }

    /// Check write/delete preconditions against the current entry.
    fn check(&self, key: &str, options: &RequestOptions) -> Option<StoreResponse> {
        let entry = self.entries.get(key);
        match (options.prev_exist, entry) {
            (PrevExist::MustNotExist, Some(_)) => {
                return Some(self.refuse(NODE_EXIST, "Key already exists", key.to_owned()))
            }
            (PrevExist::MustExist, None) => {
                return Some(self.refuse(KEY_NOT_FOUND, "Key not found", key.to_owned()))
            }
            _ => {}
        }
        if options.prev_index != 0 {
            match entry {
                None => return Some(self.refuse(KEY_NOT_FOUND, "Key not found", key.to_owned())),
                Some(entry) if entry.modified_index != options.prev_index => {
                    return Some(self.refuse(
                        TEST_FAILED,
                        "Compare failed",
                        format!("[{} != {}]", options.prev_index, entry.modified_index),
                    ))
                }
                Some(_) => {}
            }
        }
        None
    }
}

/// An in-process coordination store with the same compare-and-swap and expiry semantics as the
/// HTTP one. Operations are atomic with respect to each other; clones share the same keys.
///
/// Expiry is evaluated when a key is touched, against the wall clock.
#[derive(Clone, Default)]
pub struct MemoryStore {
    keys: Arc<Mutex<Keys>>,
    interleave: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Yield to the scheduler before every operation, so that concurrently driven callers
    /// interleave between their reads and writes the way networked callers would.
    pub fn interleaved() -> Self {
        Self {
            interleave: true,
            ..Self::default()
        }
    }

    fn keys(&self) -> MutexGuard<'_, Keys> {
        self.keys.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn pause(&self) {
        if self.interleave {
            tokio::task::yield_now().await;
        }
    }

    /// Read a key without going through the request contract.
    pub fn peek(&self, key: &str) -> Option<Node> {
        let now = Instant::now();
        let mut keys = self.keys();
        keys.expire(key, now);
        keys.entries.get(key).map(|entry| entry.node(key, now))
    }

    /// Time left before a key expires, if it exists and has a TTL.
    pub fn time_to_live(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let mut keys = self.keys();
        keys.expire(key, now);
        keys.entries
            .get(key)
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }
}

#[async_trait(?Send)]
impl CoordinationStore for MemoryStore {
    async fn get(&self, key: &str, _options: RequestOptions) -> Result<StoreResponse> {
        self.pause().await;
        let now = Instant::now();
        let mut keys = self.keys();
        keys.expire(key, now);
        Ok(match keys.entries.get(key) {
            Some(entry) => StoreResponse {
                action: "get".to_owned(),
                node: entry.node(key, now),
                ..StoreResponse::default()
            },
            None => keys.refuse(KEY_NOT_FOUND, "Key not found", key.to_owned()),
        })
    }

    async fn put(&self, key: &str, value: &str, options: RequestOptions) -> Result<StoreResponse> {
        self.pause().await;
        let now = Instant::now();
        let mut keys = self.keys();
        keys.expire(key, now);
        if let Some(refusal) = keys.check(key, &options) {
            return Ok(refusal);
        }
        keys.index += 1;
        let index = keys.index;
        let prev_node = keys.entries.get(key).map(|entry| entry.node(key, now));
        let entry = Entry {
            value: value.to_owned(),
            created_index: prev_node.as_ref().map_or(index, |prev| prev.created_index),
            modified_index: index,
            expires_at: if options.ttl.is_zero() {
                None
            } else {
                Some(now + options.ttl)
            },
        };
        let node = entry.node(key, now);
        keys.entries.insert(key.to_owned(), entry);
        let action = if options.prev_index != 0 {
            "compareAndSwap"
        } else {
            match options.prev_exist {
                PrevExist::MustNotExist => "create",
                PrevExist::MustExist => "update",
                PrevExist::Unspecified => "set",
            }
        };
        Ok(StoreResponse {
            action: action.to_owned(),
            node,
            prev_node,
            ..StoreResponse::default()
        })
    }

    async fn delete(&self, key: &str, options: RequestOptions) -> Result<StoreResponse> {
        self.pause().await;
        let now = Instant::now();
        let mut keys = self.keys();
        keys.expire(key, now);
        if let Some(refusal) = keys.check(key, &options) {
            return Ok(refusal);
        }
        let entry = match keys.entries.remove(key) {
            Some(entry) => entry,
            None => return Ok(keys.refuse(KEY_NOT_FOUND, "Key not found", key.to_owned())),
        };
        keys.index += 1;
        let prev_node = entry.node(key, now);
        let action = if options.prev_index != 0 {
            "compareAndDelete"
        } else {
            "delete"
        };
        Ok(StoreResponse {
            action: action.to_owned(),
            node: Node {
                created_index: entry.created_index,
                key: key.to_owned(),
                modified_index: keys.index,
                ..Node::default()
            },
            prev_node: Some(prev_node),
            ..StoreResponse::default()
        })
    }
}
