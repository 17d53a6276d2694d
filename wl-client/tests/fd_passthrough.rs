//! Ancillary file-descriptor passthrough over a `UnixStream::pair()` mock
//! compositor link: a request carrying an `h` argument must deliver a
//! valid `SCM_RIGHTS` fd referring to the same open file on the far side.

use std::io::{Read, Seek, SeekFrom, Write};
use std::os::fd::OwnedFd;
use std::os::unix::net::UnixStream;

use wl_client::connection::Target;
use wl_client::interface::register_interface;
use wl_client::{ArgValue, Connection, Interface, MethodDesc};
use wl_core::transport::{BufferedSocket, UnixTransport};
use wl_core::wire::parse_signature;

static WL_FD_CARRIER: Interface = Interface {
    name: "wl_fd_carrier",
    requests: &[MethodDesc {
        name: "send_fd",
        arg_count: 1,
        signature: Some("h"),
    }],
    events: &[],
};

fn pair() -> (Connection<()>, BufferedSocket<UnixTransport>) {
    register_interface(&WL_FD_CARRIER);
    let (client_half, server_half) = UnixStream::pair().unwrap();
    let conn = Connection::from_socket(BufferedSocket::from(UnixTransport::new(client_half))).unwrap();
    (conn, BufferedSocket::from(UnixTransport::new(server_half)))
}

/// Testable Property #6: ancillary fd passthrough. The fd the peer
/// receives names the same open file description as the one sent, not
/// merely a fd with the same number.
#[test]
fn fd_argument_passes_through_as_scm_rights() {
    let (mut conn, mut server) = pair();
    let carrier_id = conn.register_object(0, "wl_fd_carrier").unwrap();

    let mut tmp = tempfile();
    tmp.write_all(b"hello over scm_rights").unwrap();
    tmp.flush().unwrap();
    let sent_fd = OwnedFd::from(tmp);

    std::thread::scope(|scope| {
        scope.spawn(|| {
            conn.send_request(Target::Id(carrier_id), 0, vec![ArgValue::Fd(sent_fd)])
                .unwrap();
        });

        let header = server.peek_message_header().unwrap();
        assert_eq!(header.object_id, carrier_id);
        let message = server
            .recv_message(header, &parse_signature(Some("h")))
            .unwrap();

        let ArgValue::Fd(received_fd) = message.args.into_iter().next().unwrap() else {
            panic!("expected an fd argument");
        };

        let mut received_file = std::fs::File::from(received_fd);
        received_file.seek(SeekFrom::Start(0)).unwrap();
        let mut contents = String::new();
        received_file.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "hello over scm_rights");
    });
}

fn tempfile() -> std::fs::File {
    let mut path = std::env::temp_dir();
    path.push(format!("wl-client-fd-passthrough-test-{}", std::process::id()));
    let file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .read(true)
        .write(true)
        .open(&path)
        .unwrap();
    std::fs::remove_file(&path).ok();
    file
}
