//! Signal-stream message processing loop.
//!
//! Reads raw frames from the service's WebSocket connection, parses
//! them into typed [`ServiceMessage`] variants, and forwards them as
//! [`ServiceSignal`]s on the broadcast channel the engine subscribes
//! to.

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;

use crate::connector::ServiceSignal;
use crate::messages::{parse_message, ServiceMessage};

/// Process signal messages from a live service connection.
///
/// Loops until the WebSocket closes, encounters a fatal receive error,
/// or the stream is exhausted. Each text frame is parsed via
/// [`parse_message`] and forwarded as the matching [`ServiceSignal`].
pub async fn process_signals(
    ws_stream: &mut tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    signal_tx: &broadcast::Sender<ServiceSignal>,
) {
    while let Some(msg_result) = ws_stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                handle_text_message(&text, signal_tx);
            }
            Ok(Message::Binary(_)) => {
                tracing::trace!("Ignoring binary frame on signal stream");
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {
                // Handled automatically by tungstenite.
            }
            Ok(Message::Close(frame)) => {
                tracing::info!(?frame, "Service signal stream closed");
                break;
            }
            Ok(Message::Frame(_)) => {}
            Err(e) => {
                tracing::error!(error = %e, "Signal stream receive error");
                break;
            }
        }
    }
}

/// Parse one text frame and forward the resulting signal.
fn handle_text_message(text: &str, signal_tx: &broadcast::Sender<ServiceSignal>) {
    match parse_message(text) {
        Ok(msg) => {
            let signal = match msg {
                ServiceMessage::JobResultAvailable(data) => {
                    tracing::debug!(
                        job = %data.job,
                        result = %data.result,
                        "Job result available",
                    );
                    ServiceSignal::JobResultAvailable {
                        job: data.job,
                        result: data.result,
                    }
                }
                ServiceMessage::InterfacesAdded(data) => {
                    tracing::debug!(
                        object = %data.object,
                        interfaces = data.interfaces.len(),
                        "Interfaces added",
                    );
                    ServiceSignal::InterfacesAdded {
                        object: data.object,
                    }
                }
                ServiceMessage::InterfacesRemoved(data) => {
                    tracing::debug!(object = %data.object, "Interfaces removed");
                    ServiceSignal::InterfacesRemoved {
                        object: data.object,
                    }
                }
            };
            // Ignore the SendError -- it only means there are zero
            // receivers right now.
            let _ = signal_tx.send(signal);
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                raw_message = %text,
                "Failed to parse service signal",
            );
        }
    }
}
