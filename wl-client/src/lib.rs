//! A client-side dispatcher for the Wayland wire protocol.
//!
//! This crate builds the running connection on top of `wl-core`'s wire
//! types and transport: the global interface registry, the per-connection
//! object and listener registries, and the [`Connection`] dispatcher that
//! ties them together.
//!
//! Set `WAYLAND_DEBUG=1` to print every sent request and received event to
//! stderr.

pub mod connection;
mod debug_message;
pub mod interface;
pub mod listener;
pub mod object;

pub use connection::{Connection, Target, WL_CALLBACK, WL_DISPLAY};
pub use wl_core::error::{last_error_code, print_last_error};
pub use wl_core::wire::{ArgType, ArgValue, Fixed, Interface, MethodDesc, ObjectId};
pub use wl_core::Error;
