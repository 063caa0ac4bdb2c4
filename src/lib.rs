//! HTTP client for the etcd v3 JSON gRPC-gateway.
//!
//! Translates method calls into POST requests against the gateway's fixed
//! endpoints, base64-encoding binary fields on the way out and decoding them
//! on the way back. With `pretty` enabled, replies lose their envelope and
//! key/value records are flattened into maps.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use etcd_gateway::{Config, Etcd};
//!
//! async fn example() -> etcd_gateway::Result<()> {
//!     let etcd = Etcd::new(Config::default().with_pretty(true));
//!     let client = etcd.client()?;
//!
//!     client.put("/test", "hello", None).await?;
//!     let reply = client.get("/test", None).await?;
//!     let records = reply.as_records().expect("pretty get returns records");
//!     assert_eq!(records.get("/test").and_then(|v| v.as_str()), Some("hello"));
//!     Ok(())
//! }
//! ```

pub mod bootstrap;
pub mod client;
pub mod codec;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod etcd;
pub mod params;
pub mod shaper;
pub mod value;

// Re-export main types at crate root
pub use client::Client;
pub use config::{Config, ConfigError};
pub use endpoint::Endpoint;
pub use error::{GatewayError, Result};
pub use etcd::{Etcd, Permission};
pub use params::{Param, Params};
pub use value::{KeyValueMap, Object, Reply, Value};
