//! Error types and the (thread-local, not process-global) compatibility
//! error channel.
//!
//! The primary API is [`Error`] returned through `Result`. The legacy
//! "single slot, newest wins" error channel described for C-style Wayland
//! clients is kept as a thin shim on top: every [`Error`] is also recorded
//! here as it is produced, so callers that only check `last_error_code()`
//! after a sentinel failure still see the right thing.

use std::cell::RefCell;
use std::fmt;
use std::io;

/// Everything that can go wrong in this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("allocation or system call failure: {0}")]
    Std(#[from] io::Error),
    #[error("required environment variable {0} is not set")]
    Env(&'static str),
    #[error("id {0} is already registered")]
    IdTaken(u32),
    #[error("required argument missing for method {method}")]
    NullArg { method: &'static str },
    #[error("no object with id {0}")]
    NullObject(u32),
    #[error("no request with opcode {opcode} on object {object_id}")]
    NullRequest { object_id: u32, opcode: u16 },
    #[error("no event with opcode {opcode} on object {object_id}")]
    NullEvent { object_id: u32, opcode: u16 },
    #[error("no interface registered with name {0:?}")]
    NullInterface(String),
    #[error("no listener registered for object {0}")]
    NullListener(u32),
    #[error("failed to connect to the compositor socket: {0}")]
    SockConnect(io::Error),
    #[error("failed to send message: {0}")]
    SockSend(io::Error),
    #[error("server is gone")]
    SockRecv,
    #[error("bitmap allocator has no free bit")]
    NoFreeBit,
    #[error("index {index} is out of range for a bitmap of {capacity} bits")]
    OutOfRange { index: u32, capacity: u32 },
    #[error("no protocol XML descriptor available for this message")]
    NoProtoXml,
}

impl Error {
    /// Stable numeric code, matching the `xdwl_errors` ordering this crate's
    /// error channel emulates.
    pub fn code(&self) -> i32 {
        match self {
            Self::Std(_) => 1,
            Self::Env(_) => 2,
            Self::IdTaken(_) => 3,
            Self::NullArg { .. } => 4,
            Self::NullObject(_) => 5,
            Self::NullRequest { .. } => 6,
            Self::NullEvent { .. } => 7,
            Self::NullInterface(_) => 8,
            Self::NullListener(_) => 9,
            Self::SockConnect(_) => 10,
            Self::SockSend(_) => 11,
            Self::SockRecv => 12,
            Self::NoFreeBit => 13,
            Self::OutOfRange { .. } => 14,
            Self::NoProtoXml => 15,
        }
    }
}

struct Slot {
    code: i32,
    message: String,
}

thread_local! {
    static LAST_ERROR: RefCell<Option<Slot>> = const { RefCell::new(None) };
}

/// Record `err` as the newest error on this thread's compatibility channel.
///
/// Called internally wherever a fallible operation is about to return
/// `Err`; never call this directly from outside the crate.
pub(crate) fn record(err: &Error) {
    LAST_ERROR.with(|slot| {
        *slot.borrow_mut() = Some(Slot {
            code: err.code(),
            message: err.to_string(),
        });
    });
}

/// Record `result`'s error (if any) on the compatibility channel and pass it
/// through unchanged. Used at public API boundaries — in this crate and in
/// `wl-client` — so every `Err` that escapes to an application is also
/// visible through `last_error_code()`.
pub fn tracked<T>(result: Result<T, Error>) -> Result<T, Error> {
    if let Err(err) = &result {
        record(err);
    }
    result
}

/// The code of the most recently recorded error on this thread, or `0` if
/// none is pending.
pub fn last_error_code() -> i32 {
    LAST_ERROR.with(|slot| slot.borrow().as_ref().map_or(0, |s| s.code))
}

/// Print the most recently recorded error to stderr and clear it.
///
/// No-op if no error is pending.
pub fn print_last_error() {
    LAST_ERROR.with(|slot| {
        if let Some(s) = slot.borrow_mut().take() {
            eprintln!("{}", s.message);
        }
    });
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Slot({}, {:?})", self.code, self.message)
    }
}
