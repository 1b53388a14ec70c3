//! Message-bus connector for the certification test service.
//!
//! Provides the [`ServiceBus`](connector::ServiceBus) trait the engine
//! programs against, typed wire messages for the service's signal
//! stream, an HTTP call layer, WebSocket connection management with
//! reconnection backoff, and the concrete [`RemoteServiceBus`]
//! implementation tying them together.
//!
//! [`RemoteServiceBus`]: remote::RemoteServiceBus

pub mod api;
pub mod client;
pub mod connector;
pub mod messages;
pub mod processor;
pub mod reconnect;
pub mod remote;
