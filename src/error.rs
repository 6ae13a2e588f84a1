//! Failures to complete an exchange with the coordination store.
//!
//! A store that answers with a nonzero `errorCode` has *not* failed: that is a normal
//! [`StoreResponse`](crate::store::StoreResponse) and is handled by the election state machine.
//! Everything here means the exchange itself did not complete, so nothing can be inferred about
//! the store's state and the issuing actor stops.

use awc::error::{PayloadError, SendRequestError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The request could not be sent or no response arrived.
    #[error("request failed: {0}")]
    Request(#[from] SendRequestError),

    /// The response body could not be read.
    #[error("reading response body failed: {0}")]
    Payload(#[from] PayloadError),

    /// The response body is not a store response.
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Request directives could not be encoded.
    #[error("encoding request failed: {0}")]
    Encode(String),
}
