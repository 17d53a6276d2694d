//! `WAYLAND_DEBUG`-gated human-readable formatting of a request/event.

use std::fmt::{self, Debug, Formatter};
use std::os::fd::AsRawFd;

use wl_core::wire::{ArgValue, Message};

use crate::object::ObjectEntry;

pub(crate) struct DebugMessage<'a> {
    message: &'a Message,
    is_event: bool,
    object: &'a ObjectEntry,
}

impl<'a> DebugMessage<'a> {
    pub(crate) fn new(message: &'a Message, is_event: bool, object: &'a ObjectEntry) -> Self {
        Self {
            message,
            is_event,
            object,
        }
    }
}

impl Debug for DebugMessage<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let table = if self.is_event {
            self.object.interface.events
        } else {
            self.object.interface.requests
        };
        let method_name = table
            .get(self.message.header.opcode as usize)
            .map_or("<unknown>", |desc| desc.name);

        write!(
            f,
            "{}@{} . {}(",
            self.object.interface_name,
            self.object.id.as_u32(),
            method_name
        )?;

        for (arg_i, arg) in self.message.args.iter().enumerate() {
            if arg_i != 0 {
                write!(f, ", ")?;
            }
            match arg {
                ArgValue::Int(x) => write!(f, "{x}")?,
                ArgValue::Uint(x) => write!(f, "{x}")?,
                ArgValue::Fixed(x) => write!(f, "{}", x.as_f64())?,
                ArgValue::Object(id) => write!(f, "{}", id.as_u32())?,
                ArgValue::NewId(id) => write!(f, "new id {}", id.as_u32())?,
                ArgValue::String(s) => write!(f, "{:?}", s)?,
                ArgValue::Fd(fd) => write!(f, "fd {}", fd.as_raw_fd())?,
            }
        }

        write!(f, ")")
    }
}

/// Whether the compatibility debug channel is enabled for this process.
pub(crate) fn debug_enabled() -> bool {
    std::env::var_os("WAYLAND_DEBUG").is_some()
}
