//! Client side of the CCDciel JSON-RPC interface.

pub use ccdciel::*;
pub use http::HttpRemote;

mod ccdciel;
mod http;
pub mod mock;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("cannot reach CCDciel at {url}: {cause}")]
    Transport { url: String, cause: String },

    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("{method} failed with code {code}: {message}")]
    Remote {
        method: String,
        code: i64,
        message: String,
    },

    #[error("unexpected result from {method}: {result}")]
    UnexpectedResult { method: String, result: Value },
}

impl RpcError {
    pub fn unexpected(method: &str, result: &Value) -> Self {
        Self::UnexpectedResult {
            method: method.to_string(),
            result: result.clone(),
        }
    }

    /// The application answered and refused the call. Transport problems are not remote errors.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }
}

pub type RpcResult<T> = Result<T, RpcError>;

/// A synchronous call/response channel to the orchestrator. No retries:
/// hardware convergence is handled by [`crate::positioning`].
#[async_trait]
pub trait RemoteControl: Send + Sync {
    async fn invoke(&self, method: &str, params: Vec<Value>) -> RpcResult<Value>;
}

#[async_trait]
impl<T: RemoteControl + ?Sized> RemoteControl for &T {
    async fn invoke(&self, method: &str, params: Vec<Value>) -> RpcResult<Value> {
        (**self).invoke(method, params).await
    }
}
