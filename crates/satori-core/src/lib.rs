//! # Satori Core
//!
//! Foundation types shared by every crate of the Satori client:
//!
//! - **Errors** ([`error`]): the failure taxonomy (`TransportError`,
//!   `DecodeError`, `EventError`, `ApiError`, `AdapterError`).
//! - **Transport seams** ([`transport`]): the traits the adapter uses to reach
//!   the network, plus [`TransportContext`] which bundles the available ones.
//!
//! ```text
//! ┌──────────────────┐
//! │  satori-adapter  │  (uses the seams)
//! ├──────────────────┤
//! │  satori-core     │  <- this crate (traits, errors)
//! ├──────────────────┤
//! │ satori-transport │  (tokio-tungstenite / reqwest / axum)
//! └──────────────────┘
//! ```

pub mod error;
pub mod transport;

pub use error::{
    AdapterError, AdapterResult, ApiError, ApiErrorKind, ApiResult, DecodeError, DecodeResult,
    EventError, EventResult, TransportError, TransportResult,
};
pub use transport::{
    BoxedWsConnection, HttpClient, HttpRequest, HttpResponse, HttpServer, ListenerHandle,
    PayloadHandler, TransportContext, WsConnection, WsConnector,
};
