//! Newline-delimited JSON-RPC 2.0 client over a persistent TCP
//! connection.
//!
//! One request/response pair in flight at a time, matched by
//! incrementing ids; unsolicited lines (notifications, stale replies)
//! are skipped. Callers own reconnect policy: any `Connection` or
//! `Timeout` error leaves the connection in an unknown state and the
//! client should be dropped.

use std::io;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Errors from the RPC transport and protocol layers.
#[derive(thiserror::Error, Debug)]
pub enum RpcError {
    #[error("Connection to {endpoint} failed: {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Remote error {code}: {message}")]
    Remote { code: i64, message: String },

    #[error("Call timed out after {0:?}")]
    Timeout(Duration),
}

pub struct RpcClient {
    endpoint: String,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    next_id: u64,
}

impl RpcClient {
    pub async fn connect(endpoint: &str) -> Result<Self, RpcError> {
        let stream = TcpStream::connect(endpoint)
            .await
            .map_err(|source| RpcError::Connection {
                endpoint: endpoint.to_string(),
                source,
            })?;
        let (read_half, write_half) = stream.into_split();
        debug!(%endpoint, "RPC connection established");
        Ok(Self {
            endpoint: endpoint.to_string(),
            reader: BufReader::new(read_half),
            writer: write_half,
            next_id: 1,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Issue one call and wait for its reply, optionally bounded by a
    /// deadline.
    pub async fn call(
        &mut self,
        method: &str,
        params: Value,
        deadline: Option<Duration>,
    ) -> Result<Value, RpcError> {
        let id = self.next_id;
        self.next_id += 1;
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        match deadline {
            Some(limit) => tokio::time::timeout(limit, self.round_trip(id, &request))
                .await
                .map_err(|_| RpcError::Timeout(limit))?,
            None => self.round_trip(id, &request).await,
        }
    }

    async fn round_trip(&mut self, id: u64, request: &Value) -> Result<Value, RpcError> {
        let mut line = serde_json::to_string(request)
            .map_err(|e| RpcError::Protocol(format!("Unserializable request: {e}")))?;
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|source| self.connection_error(source))?;
        self.writer
            .flush()
            .await
            .map_err(|source| self.connection_error(source))?;

        let mut buf = String::new();
        loop {
            buf.clear();
            let n = self
                .reader
                .read_line(&mut buf)
                .await
                .map_err(|source| self.connection_error(source))?;
            if n == 0 {
                return Err(self.connection_error(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by peer",
                )));
            }
            let trimmed = buf.trim();
            if trimmed.is_empty() {
                continue;
            }
            let response: Value = serde_json::from_str(trimmed)
                .map_err(|e| RpcError::Protocol(format!("Malformed response: {e}")))?;
            if response.get("id").and_then(Value::as_u64) != Some(id) {
                warn!(endpoint = %self.endpoint, "Skipping unsolicited RPC message");
                continue;
            }
            if let Some(err) = response.get("error") {
                return Err(RpcError::Remote {
                    code: err.get("code").and_then(Value::as_i64).unwrap_or(-1),
                    message: err
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error")
                        .to_string(),
                });
            }
            return Ok(response.get("result").cloned().unwrap_or(Value::Null));
        }
    }

    fn connection_error(&self, source: io::Error) -> RpcError {
        RpcError::Connection {
            endpoint: self.endpoint.clone(),
            source,
        }
    }
}
