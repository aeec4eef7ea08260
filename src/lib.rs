//! pconv — the peer-to-peer conversation engine of a secure messaging
//! product.
//!
//! This crate owns four things: a binary codec and schema registry for
//! self-describing packets ([`codec`]), the descriptor content model
//! ([`descriptor`]), the IQ packet layer built on top of both
//! ([`iq`]), and the per-peer connection state machine plus inbound
//! dispatcher that drives them ([`connection`]). The durable
//! [`operation`] model sits above the connection and decides, for a given
//! peer capability and descriptor state, which IQ variant to send. The
//! [`conversation`] module is the thin data-model layer the connection and
//! operation layers attach to.
//!
//! Transport, storage and cryptographic primitives are external
//! collaborators, not owned by this crate: see [`external`] for the traits
//! a host application implements to plug them in.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use uuid::Uuid;
//! use pconv::config::EngineConfig;
//! use pconv::connection::ConversationConnection;
//! use pconv::external::{StatType, Transport};
//! use pconv::ConvResult;
//!
//! struct NullTransport;
//! impl Transport for NullTransport {
//!     fn send_packet(&self, _peer: Uuid, _stat: StatType, _frame: Bytes) -> ConvResult<()> { Ok(()) }
//!     fn send_message(&self, _peer: Uuid, _stat: StatType, _bytes: Bytes) -> ConvResult<()> { Ok(()) }
//!     fn increment_stat(&self, _peer: Uuid, _stat: StatType) {}
//! }
//!
//! let transport = Arc::new(NullTransport);
//! let connection = ConversationConnection::new(Uuid::new_v4(), EngineConfig::default(), transport, 0);
//! assert!(!connection.is_supported(3, 0));
//! ```

pub mod codec;
pub mod config;
pub mod connection;
pub mod conversation;
pub mod descriptor;
pub mod error;
pub mod external;
pub mod iq;
pub mod operation;

pub use config::{EngineConfig, EngineConfigBuilder};
pub use error::{ConvError, ConvResult, ErrorCode};
