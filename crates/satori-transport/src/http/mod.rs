//! HTTP transports.
//!
//! The client posts Satori API calls; the server receives webhook pushes.

#[cfg(feature = "http-client")]
mod client;
#[cfg(feature = "http-client")]
pub use client::ReqwestClient;

#[cfg(feature = "http-server")]
mod server;
#[cfg(feature = "http-server")]
pub use server::AxumServer;
