//! Wire-level types: object ids, the `iufshon` argument union, messages,
//! and the little-endian header/body codec.

use std::ffi::{CString, NulError};
use std::num::NonZeroU32;
use std::os::fd::OwnedFd;

/// A Wayland object id.
///
/// `0` is never a live id; it is used as a sentinel ("allocate a new client
/// id" / "resolve by name") at the call sites that need it, never stored in
/// an [`ObjectId`] itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub NonZeroU32);

impl ObjectId {
    pub const MIN_CLIENT: u32 = 0x0000_0001;
    pub const MAX_CLIENT: u32 = 0xFEFF_FFFF;
    pub const MIN_SERVER: u32 = 0xFF00_0000;
    pub const MAX_SERVER: u32 = 0xFFFF_FFFF;

    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    pub fn as_u32(self) -> u32 {
        self.0.get()
    }

    pub fn created_by_client(self) -> bool {
        self.as_u32() <= Self::MAX_CLIENT
    }

    pub fn created_by_server(self) -> bool {
        self.as_u32() >= Self::MIN_SERVER
    }
}

/// Signed 24.8 fixed-point decimal, per the Wayland wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Fixed(pub i32);

impl Fixed {
    pub const ZERO: Self = Self(0);

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 256.0
    }

    pub fn as_int(self) -> i32 {
        self.0 / 256
    }

    pub fn is_int(self) -> bool {
        self.0 & 0xFF == 0
    }
}

impl From<f64> for Fixed {
    fn from(value: f64) -> Self {
        Self((value * 256.0).round() as i32)
    }
}

impl From<i32> for Fixed {
    fn from(value: i32) -> Self {
        Self(value * 256)
    }
}

/// One character of a method signature: `i u f s o n h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    Int,
    Uint,
    Fixed,
    String,
    Object,
    NewId,
    Fd,
}

impl ArgType {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'i' => Some(Self::Int),
            'u' => Some(Self::Uint),
            'f' => Some(Self::Fixed),
            's' => Some(Self::String),
            'o' => Some(Self::Object),
            'n' => Some(Self::NewId),
            'h' => Some(Self::Fd),
            _ => None,
        }
    }
}

/// Parse a method signature string into its argument types.
///
/// `None` signature means "no wire arguments", matching spec.md §3's
/// "Signature absent ⇒ the method takes no wire arguments".
pub fn parse_signature(signature: Option<&str>) -> Vec<ArgType> {
    match signature {
        None => Vec::new(),
        Some(sig) => sig.chars().filter_map(ArgType::from_char).collect(),
    }
}

/// A decoded/to-be-encoded argument value.
#[derive(Debug)]
pub enum ArgValue {
    Int(i32),
    Uint(u32),
    Fixed(Fixed),
    Object(ObjectId),
    NewId(ObjectId),
    String(CString),
    Fd(OwnedFd),
}

impl ArgValue {
    /// Wire size in bytes, not counting an `h` argument (which occupies
    /// zero bytes on the wire and travels as ancillary data instead).
    pub fn wire_size(&self) -> usize {
        match self {
            Self::Int(_) | Self::Uint(_) | Self::Fixed(_) | Self::Object(_) | Self::NewId(_) => 4,
            Self::String(s) => 4 + s.as_bytes_with_nul().len().next_multiple_of(4),
            Self::Fd(_) => 0,
        }
    }

    pub fn as_type(&self) -> ArgType {
        match self {
            Self::Int(_) => ArgType::Int,
            Self::Uint(_) => ArgType::Uint,
            Self::Fixed(_) => ArgType::Fixed,
            Self::Object(_) => ArgType::Object,
            Self::NewId(_) => ArgType::NewId,
            Self::String(_) => ArgType::String,
            Self::Fd(_) => ArgType::Fd,
        }
    }
}

/// Sum of `ArgValue::wire_size` over `args`, i.e. the body size for a
/// message whose args are already built.
pub fn body_size(args: &[ArgValue]) -> usize {
    args.iter().map(ArgValue::wire_size).sum()
}

#[derive(Debug, Clone, Copy)]
pub struct MessageHeader {
    pub object_id: ObjectId,
    pub opcode: u16,
    /// Total size in bytes, including the 8-byte header.
    pub size: u16,
}

impl MessageHeader {
    pub const SIZE: usize = 8;
}

#[derive(Debug)]
pub struct Message {
    pub header: MessageHeader,
    pub args: Vec<ArgValue>,
}

/// A single named, positionally-addressed request or event.
#[derive(Debug, Clone, Copy)]
pub struct MethodDesc {
    pub name: &'static str,
    pub arg_count: usize,
    /// `None` means the method carries no wire arguments.
    pub signature: Option<&'static str>,
}

/// The static description of an interface: its requests and events, each
/// addressed by position (`method_id`).
#[derive(Debug, Clone, Copy)]
pub struct Interface {
    pub name: &'static str,
    pub requests: &'static [MethodDesc],
    pub events: &'static [MethodDesc],
}

/// Build a string argument from a Rust `&str`, rejecting embedded NULs.
pub fn cstring_arg(s: &str) -> Result<CString, NulError> {
    CString::new(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_id_ranges() {
        let client = ObjectId::new(1).unwrap();
        let server = ObjectId::new(ObjectId::MIN_SERVER).unwrap();
        assert!(client.created_by_client());
        assert!(!client.created_by_server());
        assert!(server.created_by_server());
        assert!(!server.created_by_client());
    }

    #[test]
    fn fixed_round_trips_integers() {
        let f = Fixed::from(7);
        assert_eq!(f.as_int(), 7);
        assert!(f.is_int());
    }

    #[test]
    fn fixed_from_float_rounds() {
        assert_eq!(Fixed::from(1.0).0, 256);
        assert_eq!(Fixed::from(0.5).0, 128);
    }

    #[test]
    fn string_wire_size_is_len_plus_nul_padded() {
        let arg = ArgValue::String(CString::new("abc").unwrap());
        // len (4) + "abc\0" (4, already aligned) = 8
        assert_eq!(arg.wire_size(), 8);
    }
}
