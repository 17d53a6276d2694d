//! End-to-end scenarios driven against a mock compositor over a
//! `UnixStream::pair()`, standing in for the real Wayland socket.

use std::os::unix::net::UnixStream;
use std::sync::{Arc, Mutex};

use wl_client::connection::Target;
use wl_client::interface::register_interface;
use wl_client::{ArgValue, Connection, Interface, MethodDesc};
use wl_core::transport::{BufferedSocket, UnixTransport};
use wl_core::wire::parse_signature;

static WL_REGISTRY: Interface = Interface {
    name: "wl_registry",
    requests: &[MethodDesc {
        name: "bind",
        arg_count: 1,
        signature: Some("s"),
    }],
    events: &[MethodDesc {
        name: "global",
        arg_count: 3,
        signature: Some("usu"),
    }],
};

fn pair() -> (Connection<()>, BufferedSocket<UnixTransport>) {
    register_interface(&WL_REGISTRY);
    let (client_half, server_half) = UnixStream::pair().unwrap();
    let conn = Connection::from_socket(BufferedSocket::from(UnixTransport::new(client_half))).unwrap();
    (conn, BufferedSocket::from(UnixTransport::new(server_half)))
}

/// S1: a `wl_registry.global` event lands at the listener with the
/// registry's own id prepended to the decoded arguments.
#[test]
fn registry_global_event_reaches_its_listener() {
    let (mut conn, mut server) = pair();

    let registry_id = conn.register_object(0, "wl_registry").unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));
    let received_in_handler = Arc::clone(&received);
    conn.add_listener(
        "wl_registry",
        Box::new(move |_state: &mut (), args| {
            received_in_handler.lock().unwrap().push(format!("{args:?}"));
        }),
    )
    .unwrap();

    std::thread::scope(|scope| {
        scope.spawn(|| {
            server
                .write_message(
                    registry_id,
                    0,
                    vec![
                        ArgValue::Uint(1),
                        ArgValue::String(std::ffi::CString::new("wl_compositor").unwrap()),
                        ArgValue::Uint(4),
                    ],
                )
                .unwrap();
            server.flush().unwrap();
        });

        let message = conn.recv_one().unwrap();
        conn.dispatch(&mut (), message).unwrap();
    });

    let logged = received.lock().unwrap();
    assert_eq!(logged.len(), 1);
    assert!(logged[0].contains("Object"));
    assert!(logged[0].contains("wl_compositor"));
}

/// S2: registering an explicit server-range id twice fails `IdTaken` on
/// the second attempt.
#[test]
fn server_id_registered_twice_is_rejected() {
    let (mut conn, _server) = pair();
    let id_hint = wl_core::wire::ObjectId::MIN_SERVER + 1;

    conn.register_object(id_hint, "wl_registry").unwrap();
    let err = conn.register_object(id_hint, "wl_registry").unwrap_err();
    assert!(matches!(err, wl_client::Error::IdTaken(hint) if hint == id_hint));
}

/// S4: a string request argument is framed as length-prefixed,
/// NUL-terminated bytes, padded up to the next 4-byte boundary, and
/// decodes back to the exact text sent.
#[test]
fn string_argument_round_trips_with_documented_framing() {
    let (mut conn, mut server) = pair();
    let registry_id = conn.register_object(0, "wl_registry").unwrap();

    std::thread::scope(|scope| {
        scope.spawn(|| {
            conn.send_request(
                Target::Id(registry_id),
                0,
                vec![ArgValue::String(std::ffi::CString::new("abc").unwrap())],
            )
            .unwrap();
        });

        let header = server.peek_message_header().unwrap();
        assert_eq!(header.object_id, registry_id);
        assert_eq!(header.opcode, 0);
        // 8-byte header + 4-byte length + "abc\0" already aligned to 4.
        assert_eq!(header.size as usize, 8 + 8);

        let message = server
            .recv_message(header, &parse_signature(Some("s")))
            .unwrap();
        let ArgValue::String(s) = &message.args[0] else {
            panic!("expected a string argument");
        };
        assert_eq!(s.to_str().unwrap(), "abc");
    });
}

/// S6: removing a listener drops events for that object instead of
/// panicking or buffering them for a future listener.
#[test]
fn removed_listener_silently_drops_future_events() {
    let (mut conn, mut server) = pair();
    let registry_id = conn.register_object(0, "wl_registry").unwrap();
    conn.add_listener("wl_registry", Box::new(|_: &mut (), _| {}))
        .unwrap();
    conn.remove_listener(registry_id);

    server
        .write_message(registry_id, 0, vec![ArgValue::Uint(1), ArgValue::String(std::ffi::CString::new("x").unwrap()), ArgValue::Uint(1)])
        .unwrap();
    server.flush().unwrap();

    let message = conn.recv_one().unwrap();
    // Must not panic: dispatch on an object with no listener is a no-op.
    conn.dispatch(&mut (), message).unwrap();
}
