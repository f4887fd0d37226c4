//! Connection core of an EdgeDB binary-protocol driver.
//!
//! This crate owns the connection state machine, the SCRAM authentication
//! exchange, the prepared-query and codec caches, and the configuration
//! resolver. It deliberately does not provide sockets: the caller (normally
//! a pooling layer) establishes a TLS stream with ALPN
//! [`ALPN`](crate::builder::ALPN) and hands it to
//! [`Connection::handshake`](crate::connection::Connection::handshake).

pub mod builder;
pub mod cache;
pub mod connection;
pub mod credentials;
pub mod errors;
pub mod server_params;

mod env;
mod reader;
mod scram;

pub use builder::{Builder, Config};
pub use cache::{CodecRegistry, PreparedQuery, QueryCache};
pub use connection::Connection;
pub use credentials::{Credentials, TlsSecurity};
pub use errors::Error;
