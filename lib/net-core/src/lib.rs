// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod error;
mod handle;
mod tls;
mod verify;

pub use error::{Error, Result};
pub use handle::NetHandle;
pub use tls::{build_client_config, PemSource, TlsMaterial, MAX_PEM_BYTES};
pub use verify::NoHostnameVerification;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn connect_send_and_recv_over_plain_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 5];
            stream.read_exact(&mut buf).unwrap();
            assert_eq!(&buf, b"hello");
            stream.write_all(b"world").unwrap();
        });

        let handle = NetHandle::init(None).unwrap();
        handle.connect("127.0.0.1", addr.port(), Duration::from_secs(1)).unwrap();
        handle.send(b"hello", Duration::from_secs(1)).unwrap();

        let mut buf = [0u8; 5];
        handle.recv(&mut buf, Duration::from_secs(1)).unwrap();
        assert_eq!(&buf, b"world");

        handle.close();
        assert!(!handle.is_connected());
        server.join().unwrap();
    }

    #[test]
    fn recv_times_out_when_peer_sends_nothing() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(300));
            drop(stream);
        });

        let handle = NetHandle::init(None).unwrap();
        handle.connect("127.0.0.1", addr.port(), Duration::from_secs(1)).unwrap();
        let mut buf = [0u8; 16];
        let result = handle.recv(&mut buf, Duration::from_millis(50));
        assert!(matches!(result, Err(Error::Timeout)));
        server.join().unwrap();
    }

    #[test]
    fn send_before_connect_is_invalid_state() {
        let handle = NetHandle::init(None).unwrap();
        let result = handle.send(b"x", Duration::from_millis(100));
        assert!(matches!(result, Err(Error::InvalidState)));
    }
}
