//! # Satori Transport
//!
//! Concrete implementations of the transport seams defined in `satori-core`.
//! Each transport is behind a feature flag.
//!
//! ## Features
//!
//! - `ws-client`: WebSocket client ([`websocket::TungsteniteConnector`])
//! - `http-client`: HTTP client ([`http::ReqwestClient`])
//! - `http-server`: webhook listener ([`http::AxumServer`])
//! - `full`: all of the above
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  satori-adapter     │  (Satori signaling, API facade)
//! ├─────────────────────┤
//! │  satori-core        │  (WsConnector / HttpClient / HttpServer traits)
//! ├─────────────────────┤
//! │  satori-transport   │  <- This crate (implementations)
//! ├─────────────────────┤
//! │  Network (TCP/HTTP) │
//! └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use satori_core::TransportContext;
//! use satori_transport::{AxumServer, ReqwestClient, TungsteniteConnector};
//!
//! let transports = TransportContext::new()
//!     .with_ws_connector(Arc::new(TungsteniteConnector::new()))
//!     .with_http_client(Arc::new(ReqwestClient::new()?))
//!     .with_http_server(Arc::new(AxumServer::new()));
//! ```

#[cfg(any(feature = "http-client", feature = "http-server"))]
pub mod http;

#[cfg(feature = "ws-client")]
pub mod websocket;

#[cfg(feature = "ws-client")]
pub use websocket::TungsteniteConnector;

#[cfg(feature = "http-client")]
pub use http::ReqwestClient;

#[cfg(feature = "http-server")]
pub use http::AxumServer;
