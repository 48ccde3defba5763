//! # Buttress Gateway Transport
//!
//! A [`buttress_core::Transport`] implementation that routes every call
//! through an API gateway. The orchestration engine decides *whether* a
//! request runs; this crate decides *how* it reaches the wire: gateway URL
//! routing, calling-service identity headers, per-request correlation IDs,
//! connection pooling, and TLS via rustls.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use buttress_core::{ClientConfig, ServiceClient};
//! use buttress_gateway::{GatewayConfig, GatewayTransport};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = GatewayTransport::new(GatewayConfig::new(
//!         "https://gateway.internal:8443",
//!         "crm-service",
//!         std::env::var("SERVICE_TOKEN")?,
//!     ))?;
//!
//!     let client = ServiceClient::new(ClientConfig::default(), Arc::new(transport));
//!
//!     let listings = client
//!         .get("listings", "/api/v1/listings")
//!         .query("city", "dubai")
//!         .send()
//!         .await?;
//!
//!     println!("{}", listings.text()?);
//!     Ok(())
//! }
//! ```

mod config;
mod transport;

pub use config::GatewayConfig;
pub use transport::GatewayTransport;
