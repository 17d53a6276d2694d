//! Core Wayland wire types and transport.
//!
//! This crate has no notion of a running connection or a dispatch loop —
//! that lives in `wl-client`. It provides the pieces a connection is built
//! from: object ids and the argument union ([`wire`]), the allocator that
//! hands out client-side ids ([`bitmap`]), the chained map used to look
//! objects and interfaces up by id or name ([`collections`]), the
//! byte-level ring buffer ([`ring_buffer`]), the buffered, fd-aware socket
//! framing on top of it ([`transport`]), and the crate's error type and
//! compatibility error channel ([`error`]).

pub mod bitmap;
pub mod collections;
pub mod error;
pub mod ring_buffer;
pub mod transport;
pub mod wire;

pub use error::Error;
