//! Buffered, blocking message transport with ancillary file-descriptor
//! passthrough.

mod unix;

use std::collections::VecDeque;
use std::ffi::CString;
use std::io::{self, IoSlice, IoSliceMut};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use crate::error::{tracked, Error};
use crate::ring_buffer::RingBuffer;
use crate::wire::{ArgType, ArgValue, Fixed, Message, MessageHeader, ObjectId};

pub use unix::UnixTransport;

pub const BYTES_OUT_LEN: usize = 4096;
pub const BYTES_IN_LEN: usize = BYTES_OUT_LEN * 2;

/// An abstraction over the underlying byte+fd transport. The only
/// implementation this crate ships is [`UnixTransport`], but user code can
/// substitute its own (a pipe pair in tests, for instance).
pub trait Transport {
    fn raw_fd(&self) -> RawFd;
    fn send(&mut self, bytes: &[IoSlice], fds: &[OwnedFd]) -> io::Result<usize>;
    fn recv(&mut self, bytes: &mut [IoSliceMut], fds: &mut VecDeque<OwnedFd>)
        -> io::Result<usize>;
}

/// Wraps a [`Transport`] with staging ring buffers for bytes and a queue
/// for file descriptors, implementing message-level framing on top of
/// byte-level send/recv.
pub struct BufferedSocket<T> {
    transport: T,
    bytes_in: RingBuffer,
    bytes_out: RingBuffer,
    fds_in: VecDeque<OwnedFd>,
    fds_out: VecDeque<OwnedFd>,
}

impl<T: Transport> From<T> for BufferedSocket<T> {
    fn from(transport: T) -> Self {
        Self {
            transport,
            bytes_in: RingBuffer::new(BYTES_IN_LEN),
            bytes_out: RingBuffer::new(BYTES_OUT_LEN),
            fds_in: VecDeque::new(),
            fds_out: VecDeque::new(),
        }
    }
}

impl<T: Transport> AsRawFd for BufferedSocket<T> {
    fn as_raw_fd(&self) -> RawFd {
        self.transport.raw_fd()
    }
}

impl<T: Transport> BufferedSocket<T> {
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Stage one message's header + body into the outgoing buffer,
    /// flushing first if there isn't room. At most one `h` argument may be
    /// present; its fd is queued for the next flush's ancillary data.
    pub fn write_message(
        &mut self,
        object_id: ObjectId,
        opcode: u16,
        args: Vec<ArgValue>,
    ) -> Result<(), Error> {
        let size = MessageHeader::SIZE + args.iter().map(ArgValue::wire_size).sum::<usize>();
        assert!(size <= BYTES_OUT_LEN, "message exceeds the output buffer");

        if size > self.bytes_out.writable_len() {
            self.flush()?;
        }

        self.bytes_out.write_u32(object_id.as_u32());
        self.bytes_out.write_u16(opcode);
        self.bytes_out.write_u16(size as u16);
        self.write_args(args);

        Ok(())
    }

    fn write_args(&mut self, args: Vec<ArgValue>) {
        for arg in args {
            match arg {
                ArgValue::Uint(x) => self.bytes_out.write_u32(x),
                ArgValue::Int(x) | ArgValue::Fixed(Fixed(x)) => self.bytes_out.write_i32(x),
                ArgValue::Object(id) | ArgValue::NewId(id) => self.bytes_out.write_u32(id.as_u32()),
                ArgValue::String(s) => self.send_array(s.as_bytes_with_nul()),
                ArgValue::Fd(fd) => self.fds_out.push_back(fd),
            }
        }
    }

    /// Peek the next message header without consuming it. Blocks, filling
    /// the incoming buffer as needed.
    pub fn peek_message_header(&mut self) -> Result<MessageHeader, Error> {
        while self.bytes_in.readable_len() < MessageHeader::SIZE {
            self.fill_incoming_buf()?;
        }

        let mut raw = [0u8; MessageHeader::SIZE];
        self.bytes_in.peek_bytes(&mut raw);
        let object_id = u32::from_le_bytes(raw[0..4].try_into().unwrap());
        let opcode = u16::from_le_bytes(raw[4..6].try_into().unwrap());
        let size = u16::from_le_bytes(raw[6..8].try_into().unwrap());

        let object_id = tracked(ObjectId::new(object_id).ok_or(Error::NullObject(0)))?;
        Ok(MessageHeader {
            object_id,
            opcode,
            size,
        })
    }

    /// Consume the message whose header was just peeked, decoding its body
    /// per `signature`.
    pub fn recv_message(
        &mut self,
        header: MessageHeader,
        signature: &[ArgType],
    ) -> Result<Message, Error> {
        let fds_needed = signature.iter().filter(|t| **t == ArgType::Fd).count();
        while (header.size as usize) > self.bytes_in.readable_len()
            || fds_needed > self.fds_in.len()
        {
            self.fill_incoming_buf()?;
        }

        self.bytes_in.move_tail(MessageHeader::SIZE);

        let mut args = Vec::with_capacity(signature.len());
        for arg_type in signature {
            args.push(match arg_type {
                ArgType::Int => ArgValue::Int(self.bytes_in.read_i32()),
                ArgType::Uint => ArgValue::Uint(self.bytes_in.read_u32()),
                ArgType::Fixed => ArgValue::Fixed(Fixed(self.bytes_in.read_i32())),
                ArgType::Object => {
                    let raw = self.bytes_in.read_u32();
                    ArgValue::Object(tracked(ObjectId::new(raw).ok_or(Error::NullObject(0)))?)
                }
                ArgType::NewId => {
                    let raw = self.bytes_in.read_u32();
                    ArgValue::NewId(tracked(ObjectId::new(raw).ok_or(Error::NullObject(0)))?)
                }
                ArgType::String => ArgValue::String(self.recv_string()?),
                ArgType::Fd => {
                    let fd = self.fds_in.pop_front().expect("fd count checked above");
                    ArgValue::Fd(fd)
                }
            });
        }

        Ok(Message { header, args })
    }

    /// Whether a full message header is already sitting in the incoming
    /// buffer, i.e. whether the next [`peek_message_header`](Self::peek_message_header)
    /// call is guaranteed not to need another `recv` syscall. Used to drain
    /// everything a single read already delivered without blocking for more.
    pub fn has_buffered_message(&self) -> bool {
        self.bytes_in.readable_len() >= MessageHeader::SIZE
    }

    /// Send everything staged so far.
    pub fn flush(&mut self) -> Result<(), Error> {
        while !self.bytes_out.is_empty() {
            let mut iov_buf = [IoSlice::new(&[]), IoSlice::new(&[])];
            let iov = self.bytes_out.get_readable_iov(&mut iov_buf);

            let fds: Vec<OwnedFd> = self.fds_out.drain(..).collect();
            let sent = tracked(
                self.transport
                    .send(iov, &fds)
                    .map_err(Error::SockSend),
            )?;
            self.bytes_out.move_tail(sent);
        }
        Ok(())
    }

    fn fill_incoming_buf(&mut self) -> Result<(), Error> {
        if self.bytes_in.is_full() {
            return Ok(());
        }

        let mut iov_buf = [IoSliceMut::new(&mut []), IoSliceMut::new(&mut [])];
        let iov = self.bytes_in.get_writeable_iov(&mut iov_buf);

        let read = tracked(
            self.transport
                .recv(iov, &mut self.fds_in)
                .map_err(|_| Error::SockRecv),
        )?;
        if read == 0 {
            return tracked(Err(Error::SockRecv));
        }
        self.bytes_in.move_head(read);
        Ok(())
    }

    fn send_array(&mut self, bytes: &[u8]) {
        let len = bytes.len() as u32;
        self.bytes_out.write_u32(len);
        self.bytes_out.write_bytes(bytes);
        let padding = (4 - (bytes.len() % 4)) % 4;
        self.bytes_out.write_bytes(&[0u8; 3][..padding]);
    }

    fn recv_string(&mut self) -> Result<CString, Error> {
        let len = self.bytes_in.read_u32() as usize;
        let mut buf = vec![0u8; len];
        self.bytes_in.read_bytes(&mut buf);
        let padding = (4 - (len % 4)) % 4;
        self.bytes_in.move_tail(padding);
        CString::from_vec_with_nul(buf).map_err(|_| Error::Std(io::Error::new(
            io::ErrorKind::InvalidData,
            "string argument missing its trailing NUL",
        )))
    }
}
