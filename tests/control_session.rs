//! End-to-end control-session scenarios (the literal cases worked through in
//! the wire protocol design: alive-time round trip, mastership handoff,
//! async notification delivery, and master-gate rejection) driven over real
//! loopback TCP against a running controller.

use std::collections::HashMap;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use mom_protocol::{Param, ParamList};
use surrogate_core::{Controller, NoopApplicationHandler, CONTROL_PORT};

async fn read_line(stream: &mut TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 256];
    loop {
        let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut chunk))
            .await
            .expect("timed out waiting for a reply")
            .expect("read failed");
        assert!(n > 0, "connection closed before a full line arrived");
        buf.extend_from_slice(&chunk[..n]);
        if buf.ends_with(b"\r") {
            return buf;
        }
    }
}

// Both scenarios share one controller and one `#[tokio::test]`: the control
// port is a fixed, non-configurable constant (CONTROL_PORT), so two
// concurrently-running tests binding it would race each other.
#[tokio::test(flavor = "current_thread")]
async fn control_session_scenarios() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let controller = Controller::create(HashMap::new(), Box::new(NoopApplicationHandler));
            controller
                .begin_discoverability()
                .await
                .expect("discoverability should start cleanly");

            let mut peer_a = TcpStream::connect(("127.0.0.1", CONTROL_PORT))
                .await
                .expect("peer A should connect");

            peer_a.write_all(b"?galivetime\r").await.unwrap();
            assert_eq!(read_line(&mut peer_a).await, b":galivetime,0,20\r");

            peer_a.write_all(b"&salivetime,5\r").await.unwrap();
            assert_eq!(read_line(&mut peer_a).await, b":salivetime,0,5\r");

            peer_a.write_all(b"%smaster,1\r").await.unwrap();
            assert_eq!(read_line(&mut peer_a).await, b"!smaster,0,1\r");

            let mut peer_b = TcpStream::connect(("127.0.0.1", CONTROL_PORT))
                .await
                .expect("peer B should connect");
            peer_b.write_all(b"&skeymode,1,1,0\r").await.unwrap();
            assert_eq!(read_line(&mut peer_b).await, b":skeymode,0,1,1,0\r");

            peer_b.write_all(b"?ghwconf,3\r").await.unwrap();
            assert_eq!(read_line(&mut peer_b).await, b":ghwconf,2,3\r");

            let params = ParamList::from_vec(vec![Param::Int(5), Param::Int(1)]);
            let status = controller.notify("sledstate", params).await;
            assert_eq!(status, mom_protocol::Status::Success);
            assert_eq!(read_line(&mut peer_a).await, b"!sledstate,5,1\r");

            controller.end_discoverability();
        })
        .await;
}
