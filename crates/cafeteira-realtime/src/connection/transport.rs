//! Transport seam between the connection manager and the socket.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Sink, Stream, StreamExt};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::debug;

use cafeteira_client::DeviceClient;
use cafeteira_core::error::{AppError, ErrorKind};
use cafeteira_core::AppResult;

/// Outbound half of an open socket.
pub type FrameSink = Pin<Box<dyn Sink<Message, Error = WsError> + Send>>;

/// Inbound half of an open socket.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Message, WsError>> + Send>>;

/// An open socket, split into halves.
pub struct Transport {
    /// Frames to the device.
    pub sink: FrameSink,
    /// Frames from the device.
    pub stream: FrameStream,
}

impl Transport {
    /// Wrap a sink/stream pair.
    pub fn new<S, R>(sink: S, stream: R) -> Self
    where
        S: Sink<Message, Error = WsError> + Send + 'static,
        R: Stream<Item = Result<Message, WsError>> + Send + 'static,
    {
        Self {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        }
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport").finish()
    }
}

/// Opens sockets for the connection manager.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a new socket. Any error counts as an abnormal close.
    async fn connect(&self) -> AppResult<Transport>;
}

/// Connects to the device's `/ws` endpoint with tokio-tungstenite,
/// sending the session cookie on the handshake.
#[derive(Debug, Clone)]
pub struct WsConnector {
    /// REST client providing the base URL and session cookie.
    client: DeviceClient,
    /// Socket path.
    path: String,
}

impl WsConnector {
    /// Create a connector for `path` on the client's device.
    pub fn new(client: DeviceClient, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
        }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> AppResult<Transport> {
        let url = self.client.websocket_url(&self.path)?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| AppError::with_source(ErrorKind::Configuration, format!("Invalid realtime URL {url}"), e))?;

        if let Some(cookie) = self.client.session_cookie() {
            let value = HeaderValue::from_str(&cookie)
                .map_err(|e| AppError::with_source(ErrorKind::Internal, "Invalid session cookie", e))?;
            request.headers_mut().insert(COOKIE, value);
        }

        debug!(url = %url, "Opening realtime socket");
        let (socket, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Transport, format!("Realtime handshake failed: {e}"), e))?;

        let (sink, stream) = socket.split();
        Ok(Transport::new(sink, stream))
    }
}
