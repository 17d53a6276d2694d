//! The client-side dispatcher: connect, send requests, receive and route
//! events, and the `roundtrip` synchronization primitive.

use wl_core::error::tracked;
use wl_core::transport::{BufferedSocket, UnixTransport};
use wl_core::wire::{parse_signature, ArgValue, Interface, Message, MessageHeader, MethodDesc, ObjectId};
use wl_core::Error;

use crate::debug_message::{debug_enabled, DebugMessage};
use crate::interface::register_interface;
use crate::listener::{Handler, ListenerRegistry};
use crate::object::{ObjectEntry, ObjectRegistry};

const WL_DISPLAY_REQUESTS: &[MethodDesc] = &[
    MethodDesc {
        name: "sync",
        arg_count: 1,
        signature: Some("n"),
    },
    MethodDesc {
        name: "get_registry",
        arg_count: 1,
        signature: Some("n"),
    },
];

const WL_DISPLAY_EVENTS: &[MethodDesc] = &[
    MethodDesc {
        name: "error",
        arg_count: 3,
        signature: Some("ous"),
    },
    MethodDesc {
        name: "delete_id",
        arg_count: 1,
        signature: Some("u"),
    },
];

/// The built-in `wl_display` descriptor, always bound to object id 1.
pub static WL_DISPLAY: Interface = Interface {
    name: "wl_display",
    requests: WL_DISPLAY_REQUESTS,
    events: WL_DISPLAY_EVENTS,
};

const WL_CALLBACK_EVENTS: &[MethodDesc] = &[MethodDesc {
    name: "done",
    arg_count: 1,
    signature: Some("u"),
}];

/// The built-in `wl_callback` descriptor, used internally by [`Connection::roundtrip`].
pub static WL_CALLBACK: Interface = Interface {
    name: "wl_callback",
    requests: &[],
    events: WL_CALLBACK_EVENTS,
};

/// Which object a request targets.
pub enum Target<'a> {
    Id(ObjectId),
    /// Resolve to the newest live object with this interface name.
    Newest(&'a str),
}

/// Mirrors the receive loop's per-call progression. `Closed` is terminal:
/// once the peer is observed gone, every further receive fails without
/// retrying the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReceiveState {
    Idle,
    Filled,
    Draining,
    Closed,
}

/// Client-side connection state: the socket, both registries, and the
/// receive loop's state machine. `D` is arbitrary state threaded into every
/// listener invocation.
pub struct Connection<D> {
    socket: BufferedSocket<UnixTransport>,
    objects: ObjectRegistry,
    listeners: ListenerRegistry<D>,
    display_id: ObjectId,
    state: ReceiveState,
}

impl<D> Connection<D> {
    /// Connect to `$XDG_RUNTIME_DIR/$WAYLAND_DISPLAY` and bootstrap the
    /// `wl_display` object at id 1.
    pub fn connect() -> Result<Self, Error> {
        let transport = UnixTransport::connect()?;
        Self::from_socket(BufferedSocket::from(transport))
    }

    /// Build a connection over an already-established transport. Exposed
    /// so tests can drive a connection over a `UnixStream::pair()` half
    /// standing in for a compositor.
    pub fn from_socket(socket: BufferedSocket<UnixTransport>) -> Result<Self, Error> {
        register_interface(&WL_DISPLAY);
        register_interface(&WL_CALLBACK);

        let mut objects = ObjectRegistry::new();
        let display_id = objects.register(ObjectId::MIN_CLIENT, "wl_display")?;
        debug_assert_eq!(display_id.as_u32(), ObjectId::MIN_CLIENT);

        Ok(Self {
            socket,
            objects,
            listeners: ListenerRegistry::new(),
            display_id,
            state: ReceiveState::Idle,
        })
    }

    /// Register a new object of `interface_name`, with `id_hint == 0`
    /// allocating a fresh client id.
    pub fn register_object(&mut self, id_hint: u32, interface_name: &str) -> Result<ObjectId, Error> {
        self.objects.register(id_hint, interface_name)
    }

    pub fn unregister_object(&mut self, id: ObjectId) -> Result<(), Error> {
        self.objects.unregister(id)
    }

    pub fn object(&self, id: ObjectId) -> Option<&ObjectEntry> {
        self.objects.get_by_id(id)
    }

    /// Install (or replace) the event listener for the newest live object
    /// of `interface_name`, resolved the same way `Target::Newest` resolves
    /// a request's destination. Slot 0 of the handler's argument slice is
    /// always the emitting object's id.
    pub fn add_listener(&mut self, interface_name: &str, handler: Handler<D>) -> Result<(), Error> {
        let object_id = tracked(
            self.objects
                .get_by_name(interface_name)
                .map(|entry| entry.id)
                .ok_or_else(|| Error::NullInterface(interface_name.to_owned())),
        )?;
        self.listeners.add(object_id.as_u32(), handler);
        Ok(())
    }

    pub fn remove_listener(&mut self, object_id: ObjectId) {
        self.listeners.remove(object_id.as_u32());
    }

    /// Marshal and send one request, flushing immediately.
    pub fn send_request(
        &mut self,
        target: Target,
        method_id: u16,
        args: Vec<ArgValue>,
    ) -> Result<(), Error> {
        let resolved_id = match target {
            Target::Id(id) => id,
            Target::Newest(name) => tracked(
                self.objects
                    .get_by_name(name)
                    .map(|entry| entry.id)
                    .ok_or(Error::NullObject(0)),
            )?,
        };

        let entry = tracked(
            self.objects
                .get_by_id(resolved_id)
                .cloned()
                .ok_or(Error::NullObject(resolved_id.as_u32())),
        )?;

        tracked(
            entry
                .interface
                .requests
                .get(method_id as usize)
                .ok_or(Error::NullRequest {
                    object_id: resolved_id.as_u32(),
                    opcode: method_id,
                }),
        )?;

        let preview = Message {
            header: MessageHeader {
                object_id: resolved_id,
                opcode: method_id,
                size: 0,
            },
            args,
        };

        if debug_enabled() {
            eprintln!("[wl-client]  -> {:?}", DebugMessage::new(&preview, false, &entry));
        }

        self.socket
            .write_message(resolved_id, method_id, preview.args)?;
        self.socket.flush()
    }

    /// Receive exactly one event, blocking until it is fully available.
    pub fn recv_one(&mut self) -> Result<Message, Error> {
        if self.state == ReceiveState::Closed {
            return tracked(Err(Error::SockRecv));
        }

        let header = match self.socket.peek_message_header() {
            Ok(header) => header,
            Err(err) => {
                if matches!(err, Error::SockRecv) {
                    self.state = ReceiveState::Closed;
                }
                return Err(err);
            }
        };
        self.state = ReceiveState::Filled;

        let entry = tracked(
            self.objects
                .get_by_id(header.object_id)
                .ok_or(Error::NullObject(header.object_id.as_u32())),
        )?;
        let event_desc = tracked(entry.interface.events.get(header.opcode as usize).ok_or(
            Error::NullEvent {
                object_id: header.object_id.as_u32(),
                opcode: header.opcode,
            },
        ))?;
        let signature = parse_signature(event_desc.signature);

        self.state = ReceiveState::Draining;
        let message = match self.socket.recv_message(header, &signature) {
            Ok(message) => message,
            Err(err) => {
                if matches!(err, Error::SockRecv) {
                    self.state = ReceiveState::Closed;
                }
                return Err(err);
            }
        };
        self.state = ReceiveState::Idle;

        Ok(message)
    }

    /// Route one already-received message to its listener, if any.
    pub fn dispatch(&mut self, state: &mut D, message: Message) -> Result<(), Error> {
        let object_id = message.header.object_id;

        if debug_enabled() {
            let entry = tracked(
                self.objects
                    .get_by_id(object_id)
                    .ok_or(Error::NullObject(object_id.as_u32())),
            )?;
            eprintln!("[wl-client] {:?}", DebugMessage::new(&message, true, entry));
        }

        let Some(handler) = self.listeners.get_mut(object_id.as_u32()) else {
            return Ok(());
        };

        let mut args = Vec::with_capacity(message.args.len() + 1);
        args.push(ArgValue::Object(object_id));
        args.extend(message.args);
        handler(state, &args);

        Ok(())
    }

    /// Drain and dispatch every message already received or immediately
    /// available, blocking for at least the first one.
    pub fn dispatch_all(&mut self, state: &mut D) -> Result<usize, Error> {
        let first = self.recv_one()?;
        self.dispatch(state, first)?;
        let mut count = 1;

        while self.socket.has_buffered_message() {
            let message = self.recv_one()?;
            self.dispatch(state, message)?;
            count += 1;
        }

        Ok(count)
    }

    /// Block until the server has processed every request sent before this
    /// call, via a `wl_display.sync` roundtrip. Events observed along the
    /// way (other than the sync callback itself) are dispatched normally.
    pub fn roundtrip(&mut self, state: &mut D) -> Result<(), Error> {
        let callback_id = self.objects.register(0, "wl_callback")?;
        self.send_request(
            Target::Id(self.display_id),
            0,
            vec![ArgValue::NewId(callback_id)],
        )?;

        loop {
            let message = self.recv_one()?;
            if message.header.object_id == callback_id {
                self.objects.unregister(callback_id)?;
                return Ok(());
            }
            self.dispatch(state, message)?;
        }
    }
}
