use super::*;
use crate::config::RemoteSettings;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct Request<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Vec<Value>,
    id: u64,
}

#[derive(Deserialize)]
struct Response {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<ErrorObject>,
}

#[derive(Deserialize)]
struct ErrorObject {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// JSON-RPC 2.0 over HTTP POST
pub struct HttpRemote {
    client: Client,
    url: String,
    next_id: AtomicU64,
}

impl HttpRemote {
    pub fn new(settings: &RemoteSettings) -> RpcResult<Self> {
        let url = settings.url();
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| RpcError::Transport {
                url: url.clone(),
                cause: e.to_string(),
            })?;

        Ok(Self {
            client,
            url,
            next_id: AtomicU64::new(1),
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> RpcError {
        RpcError::Transport {
            url: self.url.clone(),
            cause: e.to_string(),
        }
    }
}

#[async_trait]
impl RemoteControl for HttpRemote {
    async fn invoke(&self, method: &str, params: Vec<Value>) -> RpcResult<Value> {
        let request = Request {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
        };
        debug!("-> {} {:?}", method, request.params);

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RpcError::Http {
                status: status.as_u16(),
                message: body,
            });
        }

        let response: Response = response.json().await.map_err(|e| self.transport_error(e))?;
        if let Some(error) = response.error {
            return Err(RpcError::Remote {
                method: method.to_string(),
                code: error.code,
                message: error.message,
            });
        }

        debug!("<- {} {}", method, response.result);
        Ok(response.result)
    }
}
