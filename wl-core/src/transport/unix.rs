//! Wayland transport over a Unix domain stream socket, the only transport
//! this protocol actually uses.

use std::collections::VecDeque;
use std::env;
use std::io::{self, IoSlice, IoSliceMut};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

use nix::sys::socket::{self, ControlMessage, ControlMessageOwned, MsgFlags};

use crate::error::Error;

use super::Transport;

/// A connected Wayland socket. Send/recv file descriptors travel as
/// `SCM_RIGHTS` ancillary data.
pub struct UnixTransport {
    stream: UnixStream,
}

impl UnixTransport {
    pub fn new(stream: UnixStream) -> Self {
        Self { stream }
    }

    /// Connect to the compositor named by `$WAYLAND_DISPLAY`, relative to
    /// `$XDG_RUNTIME_DIR`. Both variables are required; a bare display name
    /// containing a `/` is treated as already-absolute, matching the
    /// behavior of `wl_display_connect(3)`.
    pub fn connect() -> Result<Self, Error> {
        let runtime_dir = env::var_os("XDG_RUNTIME_DIR").ok_or(Error::Env("XDG_RUNTIME_DIR"))?;
        let display = env::var_os("WAYLAND_DISPLAY").ok_or(Error::Env("WAYLAND_DISPLAY"))?;

        let mut path = PathBuf::from(display.clone());
        if !path.is_absolute() {
            path = PathBuf::from(runtime_dir);
            path.push(display);
        }

        let stream = UnixStream::connect(&path).map_err(Error::SockConnect)?;
        Ok(Self::new(stream))
    }
}

impl Transport for UnixTransport {
    fn raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }

    fn send(&mut self, bytes: &[IoSlice], fds: &[OwnedFd]) -> io::Result<usize> {
        let raw_fds: Vec<RawFd> = fds.iter().map(AsRawFd::as_raw_fd).collect();
        let cmsgs: &[ControlMessage] = if raw_fds.is_empty() {
            &[]
        } else {
            &[ControlMessage::ScmRights(&raw_fds)]
        };

        socket::sendmsg::<()>(
            self.stream.as_raw_fd(),
            bytes,
            cmsgs,
            MsgFlags::MSG_NOSIGNAL,
            None,
        )
        .map_err(io::Error::from)
    }

    fn recv(
        &mut self,
        bytes: &mut [IoSliceMut],
        fds: &mut VecDeque<OwnedFd>,
    ) -> io::Result<usize> {
        let mut cmsg_space = nix::cmsg_space!([RawFd; 1]);

        let msg = socket::recvmsg::<()>(
            self.stream.as_raw_fd(),
            bytes,
            Some(&mut cmsg_space),
            MsgFlags::MSG_CMSG_CLOEXEC,
        )
        .map_err(io::Error::from)?;

        for cmsg in msg.cmsgs()? {
            if let ControlMessageOwned::ScmRights(raw_fds) = cmsg {
                for fd in raw_fds {
                    // SAFETY: fds delivered via SCM_RIGHTS are freshly
                    // dup()'d by the kernel for this process and not owned
                    // elsewhere.
                    fds.push_back(unsafe { OwnedFd::from_raw_fd(fd) });
                }
            }
        }

        Ok(msg.bytes)
    }
}
