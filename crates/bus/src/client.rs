//! WebSocket client for the test service's signal stream.
//!
//! [`SignalClient`] holds the connection configuration for the
//! service's signal socket. Call [`SignalClient::connect`] to
//! establish a live [`SignalConnection`].

use tokio_tungstenite::{connect_async, MaybeTlsStream};

use crate::connector::BusError;

/// Configuration handle for the service's signal socket.
///
/// Stores the WebSocket URL needed to receive signals from the test
/// service. Create a [`SignalConnection`] by calling
/// [`connect`](Self::connect).
pub struct SignalClient {
    ws_url: String,
}

/// A live WebSocket connection to the signal stream.
pub struct SignalConnection {
    /// Unique client ID sent during the WebSocket handshake.
    pub client_id: String,
    /// The raw WebSocket stream for reading frames.
    pub ws_stream: tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

impl SignalClient {
    /// Create a new client targeting the service's signal socket.
    ///
    /// * `ws_url` - WebSocket base URL, e.g. `ws://localhost:8440`.
    pub fn new(ws_url: String) -> Self {
        Self { ws_url }
    }

    /// WebSocket base URL.
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Connect to the signal socket.
    ///
    /// Generates a unique `client_id` (UUID v4) and appends it as a
    /// query parameter so that the service can address signals back to
    /// this specific front-end.
    pub async fn connect(&self) -> Result<SignalConnection, BusError> {
        let client_id = uuid::Uuid::new_v4().to_string();
        let url = format!("{}/signals?clientId={}", self.ws_url, client_id);

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            BusError::Connection(format!(
                "Failed to connect to test service at {}: {e}",
                self.ws_url
            ))
        })?;

        tracing::info!(
            client_id = %client_id,
            "Connected to test service signal stream at {}",
            self.ws_url,
        );

        Ok(SignalConnection {
            client_id,
            ws_stream,
        })
    }
}
