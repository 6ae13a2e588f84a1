//! Actors coordinate only through a linearizable key-value store offering compare-and-swap writes
//! and key expiry. Each operation is a single request/response exchange with no retry; a
//! precondition that does not hold comes back as an ordinary response with a nonzero
//! `errorCode`, never as an error.

use super::error::Result;
use super::StoreIndex;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

mod http;
mod memory;

pub use http::HttpStore;
pub use memory::MemoryStore;

/// The request took effect.
pub const SUCCESS: u32 = 0;
/// The key is absent (never written, deleted, or expired).
pub const KEY_NOT_FOUND: u32 = 100;
/// A `prevIndex` / `prevValue` comparison did not hold.
pub const TEST_FAILED: u32 = 101;
/// A create (`prevExist=false`) found the key already present.
pub const NODE_EXIST: u32 = 105;

/// Precondition on the key's existence for a conditional write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrevExist {
    Unspecified,
    MustExist,
    MustNotExist,
}

impl Default for PrevExist {
    fn default() -> Self {
        Self::Unspecified
    }
}

/// Directives attached to a single store call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// time after which the store drops the key unless it is written again; zero for none
    pub ttl: Duration,
    /// ask for the long-poll variant of a read
    pub wait: bool,
    /// existence precondition for a write
    pub prev_exist: PrevExist,
    /// the write only applies while the key's `modifiedIndex` equals this; zero for unconstrained
    pub prev_index: StoreIndex,
}

impl RequestOptions {
    pub fn create() -> Self {
        Self {
            prev_exist: PrevExist::MustNotExist,
            ..Self::default()
        }
    }

    pub fn compare_and_swap(prev_index: StoreIndex, ttl: Duration) -> Self {
        Self {
            prev_index,
            ttl,
            ..Self::default()
        }
    }

    pub fn compare_and_delete(prev_index: StoreIndex) -> Self {
        Self {
            prev_index,
            ..Self::default()
        }
    }
}

/// A key as reported by the store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Node {
    /// store index of the write that created the key
    #[serde(rename = "createdIndex", alias = "CreatedIndex")]
    pub created_index: StoreIndex,
    pub key: String,
    /// store index of the last write to the key; the fencing index for conditional writes
    #[serde(rename = "modifiedIndex", alias = "ModifiedIndex")]
    pub modified_index: StoreIndex,
    pub value: String,
    /// remaining time to live in seconds, when the key has one
    pub ttl: Option<i64>,
}

/// Outcome of one store call. `error_code == SUCCESS` means the request took effect; any other
/// code is a store-defined refusal and is expected in normal operation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreResponse {
    pub error_code: u32,
    pub message: String,
    /// the key or comparison the refusal is about
    pub cause: String,
    /// `get`, `set`, `create`, `update`, `compareAndSwap`, `delete` or `compareAndDelete`
    pub action: String,
    pub node: Node,
    /// the key as it was before a successful write or delete
    pub prev_node: Option<Node>,
    /// store index at the time of a refusal
    pub index: StoreIndex,
}

impl StoreResponse {
    pub fn is_success(&self) -> bool {
        self.error_code == SUCCESS
    }

    pub fn is_not_found(&self) -> bool {
        self.error_code == KEY_NOT_FOUND
    }
}

/// The request/response contract of the coordination store.
///
/// Calls are `?Send`: actors run on a single-threaded arbiter and the HTTP client is tied to it.
#[async_trait(?Send)]
pub trait CoordinationStore {
    async fn get(&self, key: &str, options: RequestOptions) -> Result<StoreResponse>;

    async fn put(&self, key: &str, value: &str, options: RequestOptions) -> Result<StoreResponse>;

    /// Remove a key. Only the `prev_index` / `prev_exist` preconditions are meaningful.
    async fn delete(&self, key: &str, options: RequestOptions) -> Result<StoreResponse>;
}
