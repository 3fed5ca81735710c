use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use googletest::prelude::*;
use rstest::rstest;
use sable_common::config::ServerConfig;
use sable_core::value::Value;

use super::EventLoop;
use crate::app::ServerApp;

fn bound_loop() -> (EventLoop, ServerApp, SocketAddr) {
    let app = ServerApp::new(ServerConfig::default());
    let event_loop = EventLoop::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .expect("reactor bind should succeed");
    let addr = event_loop.local_addr().expect("local addr should be available");
    (event_loop, app, addr)
}

fn drive_until(
    event_loop: &mut EventLoop,
    app: &mut ServerApp,
    client: &mut TcpStream,
    expected_suffix: &[u8],
) -> Vec<u8> {
    let deadline = Instant::now() + Duration::from_millis(600);
    let mut response = Vec::new();
    while Instant::now() < deadline {
        let _ = event_loop
            .poll_once(app)
            .expect("reactor poll should succeed");

        let mut chunk = [0_u8; 256];
        match client.read(&mut chunk) {
            Ok(0) => break,
            Ok(read_len) => {
                response.extend_from_slice(&chunk[..read_len]);
                if response.ends_with(expected_suffix) {
                    break;
                }
            }
            Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(error) => panic!("read from client failed: {error}"),
        }
    }
    response
}

#[rstest]
fn reactor_executes_resp_ping_roundtrip() {
    let (mut event_loop, mut app, addr) = bound_loop();
    let mut client = TcpStream::connect(addr).expect("connect should succeed");
    client
        .set_nonblocking(true)
        .expect("nonblocking client should be configurable");
    client
        .write_all(b"*1\r\n$4\r\nPING\r\n")
        .expect("write ping should succeed");

    let response = drive_until(&mut event_loop, &mut app, &mut client, b"+PONG\r\n");
    assert_that!(&response, eq(&b"+PONG\r\n".to_vec()));
}

#[rstest]
fn reactor_executes_set_then_get_for_one_client() {
    let (mut event_loop, mut app, addr) = bound_loop();
    let mut client = TcpStream::connect(addr).expect("connect should succeed");
    client
        .set_nonblocking(true)
        .expect("nonblocking client should be configurable");
    client
        .write_all(b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n")
        .expect("write pipeline should succeed");

    let response = drive_until(&mut event_loop, &mut app, &mut client, b"$3\r\nbar\r\n");
    assert_that!(&response, eq(&b"+OK\r\n$3\r\nbar\r\n".to_vec()));
}

#[rstest]
fn reactor_drops_clients_on_disconnect() {
    let (mut event_loop, mut app, addr) = bound_loop();
    let client = TcpStream::connect(addr).expect("connect should succeed");

    let deadline = Instant::now() + Duration::from_millis(600);
    while event_loop.connection_count() == 0 && Instant::now() < deadline {
        let _ = event_loop.poll_once(&mut app).expect("poll should succeed");
    }
    assert_that!(event_loop.connection_count(), eq(1));

    drop(client);
    let deadline = Instant::now() + Duration::from_millis(600);
    while event_loop.connection_count() > 0 && Instant::now() < deadline {
        let _ = event_loop.poll_once(&mut app).expect("poll should succeed");
    }
    assert_that!(event_loop.connection_count(), eq(0));
}

#[rstest]
fn protocol_errors_report_then_close_the_connection() {
    let (mut event_loop, mut app, addr) = bound_loop();
    let mut client = TcpStream::connect(addr).expect("connect should succeed");
    client
        .set_nonblocking(true)
        .expect("nonblocking client should be configurable");
    client
        .write_all(b"*1\r\n$oops\r\n")
        .expect("write malformed frame should succeed");

    let response = drive_until(&mut event_loop, &mut app, &mut client, b"\r\n");
    assert_that!(response.starts_with(b"-ERR Protocol error:"), eq(true));

    // The reactor drains the error reply and then drops the client.
    let deadline = Instant::now() + Duration::from_millis(600);
    while event_loop.connection_count() > 0 && Instant::now() < deadline {
        let _ = event_loop.poll_once(&mut app).expect("poll should succeed");
    }
    assert_that!(event_loop.connection_count(), eq(0));
}

fn one_shot_marker(app: &mut ServerApp) -> Option<u64> {
    let _ = app.db.upsert(b"marker", Value::Str(b"1".to_vec()));
    None
}

fn recurring_counter(app: &mut ServerApp) -> Option<u64> {
    let next = match app.db.lookup(b"ticks", sable_common::time::now_unix_millis()) {
        Some(Value::Str(raw)) => {
            String::from_utf8_lossy(raw).parse::<u64>().unwrap_or(0) + 1
        }
        _ => 1,
    };
    let _ = app.db.upsert(b"ticks", Value::Str(next.to_string().into_bytes()));
    Some(1)
}

#[rstest]
fn one_shot_time_events_run_once_and_disappear() {
    let (mut event_loop, mut app, _addr) = bound_loop();
    let _ = event_loop.schedule(0, one_shot_marker);

    let _ = event_loop.poll_once(&mut app).expect("poll should succeed");
    assert_that!(app.db.len(), eq(1));

    // A second cycle must not re-run the handler.
    let _ = event_loop.poll_once(&mut app).expect("poll should succeed");
    let marker = app.db.lookup(b"marker", 0).is_some();
    assert_that!(marker, eq(true));
    assert_that!(app.db.len(), eq(1));
}

#[rstest]
fn recurring_time_events_reschedule_themselves() {
    let (mut event_loop, mut app, _addr) = bound_loop();
    let _ = event_loop.schedule(0, recurring_counter);

    let deadline = Instant::now() + Duration::from_millis(600);
    loop {
        let _ = event_loop.poll_once(&mut app).expect("poll should succeed");
        let ticks = match app.db.lookup(b"ticks", 0) {
            Some(Value::Str(raw)) => String::from_utf8_lossy(raw).parse::<u64>().unwrap_or(0),
            _ => 0,
        };
        if ticks >= 3 || Instant::now() >= deadline {
            assert_that!(ticks >= 3, eq(true));
            break;
        }
    }
}
