//! WebSocket client for the gateway
//!
//! Speaks the gateway's request/reply protocol: log in, call methods by
//! name, log out. Requests are numbered from 1; replies are matched back
//! by that number, so a deferred call simply takes longer to answer.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use mc_protocol::{request_object, RequestId, Response, LOGIN_METHOD, LOGOUT_METHOD};

/// Default gateway URL
pub const DEFAULT_URL: &str = "ws://127.0.0.1:8080/ws";

/// Default time to wait for a reply
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Client connection to a gateway
pub struct GatewayClient {
    url: String,
    stream: Option<WsStream>,
    next_id: u64,
    timeout: Duration,
}

impl GatewayClient {
    /// Create a client for `url` (not yet connected)
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stream: None,
            next_id: 1,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set how long to wait for each reply
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Gateway URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the socket is open
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Open the WebSocket connection
    pub async fn connect(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let (stream, _) = connect_async(self.url.as_str())
            .await
            .with_context(|| format!("Failed to connect to gateway at {}", self.url))?;
        tracing::debug!(url = %self.url, "Connected to gateway");
        self.stream = Some(stream);
        Ok(())
    }

    /// Log in; fails if the gateway rejects the credentials
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let reply = self
            .request(LOGIN_METHOD, vec![json!(username), json!(password)])
            .await?;

        let result = reply.result().cloned().unwrap_or(Value::Null);
        if result.get("success").and_then(Value::as_bool) != Some(true) {
            let reason = result
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("login rejected");
            bail!("Login failed: {}", reason);
        }
        Ok(())
    }

    /// Call `method` and wait for its reply, immediate or deferred
    pub async fn call(&mut self, method: &str, params: Vec<Value>) -> Result<Response> {
        self.request(method, params).await
    }

    /// Log out; the gateway closes the connection afterwards
    pub async fn logout(&mut self) -> Result<Response> {
        let reply = self.request(LOGOUT_METHOD, Vec::new()).await?;
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.close(None).await;
        }
        Ok(reply)
    }

    /// Close the connection without logging out
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            stream.close(None).await.context("Failed to close connection")?;
        }
        Ok(())
    }

    async fn request(&mut self, method: &str, params: Vec<Value>) -> Result<Response> {
        self.connect().await?;

        let id = self.next_id;
        self.next_id += 1;
        let text = request_object(method, params, json!(id)).to_string();

        let timeout = self.timeout;
        let stream = self.stream.as_mut().context("Not connected")?;
        stream
            .send(Message::Text(text))
            .await
            .context("Failed to send request")?;
        tracing::debug!(method, id, "Sent request");

        let expected = RequestId::new(id);
        tokio::time::timeout(timeout, read_reply(stream, &expected))
            .await
            .with_context(|| format!("Timed out waiting for reply to {}", method))?
    }
}

async fn read_reply(stream: &mut WsStream, expected: &RequestId) -> Result<Response> {
    while let Some(message) = stream.next().await {
        let text = match message.context("Connection error")? {
            Message::Text(text) => text,
            Message::Binary(bytes) => String::from_utf8(bytes).context("Reply is not UTF-8")?,
            Message::Close(_) => bail!("Gateway closed the connection"),
            _ => continue,
        };

        let reply: Response =
            serde_json::from_str(&text).with_context(|| format!("Malformed reply: {}", text))?;
        if &reply.id == expected {
            return Ok(reply);
        }
        tracing::warn!(id = %reply.id, "Ignoring reply to another request");
    }

    bail!("Gateway closed the connection")
}
