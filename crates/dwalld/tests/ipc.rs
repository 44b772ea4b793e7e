use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use dwalld::coordinator::Event;
use dwalld::ipc::{self, Response};
use dwalld::state::AppliedState;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn with_socket_env<F: FnOnce()>(sock: &std::path::Path, f: F) {
    let old = std::env::var_os("DWALL_SOCKET_PATH");

    std::env::set_var("DWALL_SOCKET_PATH", sock);

    f();

    match old {
        Some(v) => std::env::set_var("DWALL_SOCKET_PATH", v),
        None => std::env::remove_var("DWALL_SOCKET_PATH"),
    }
}

fn wait_for_socket(path: &std::path::Path) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if path.exists() {
            return;
        }
        thread::sleep(Duration::from_millis(20));
    }
    panic!("socket did not appear: {path:?}");
}

fn send_line(sock: &std::path::Path, line: &str) -> String {
    let mut stream = UnixStream::connect(sock).unwrap();
    stream.write_all(line.as_bytes()).unwrap();
    stream.flush().unwrap();

    let mut reader = BufReader::new(stream);
    let mut resp = String::new();
    reader.read_line(&mut resp).unwrap();
    resp
}

struct Server {
    sock: std::path::PathBuf,
    events: mpsc::Receiver<Event>,
    _dir: tempfile::TempDir,
}

fn spawn_server() -> Server {
    let dir = tempfile::tempdir().unwrap();
    let sock = dir.path().join("dwall.sock");
    let db_path = dir.path().join("dwall.db");
    let state = Arc::new(AppliedState::new(dir.path().join("applied.json")));
    state.set_current("default").unwrap();

    let (tx, rx) = mpsc::channel();
    {
        let sock = sock.clone();
        thread::spawn(move || {
            let _ = ipc::run_server(&sock, tx, state, db_path);
        });
    }
    wait_for_socket(&sock);

    Server {
        sock,
        events: rx,
        _dir: dir,
    }
}

#[test]
fn server_answers_ping_status_and_refresh() {
    let server = spawn_server();

    let line = send_line(&server.sock, "PING\n");
    assert_eq!(Response::parse_line(&line).unwrap(), Response::Ok);

    let line = send_line(&server.sock, "STATUS\n");
    match Response::parse_line(&line).unwrap() {
        Response::OkMsg(msg) => {
            assert!(msg.contains("current=default"));
            assert!(msg.contains("rules=0"));
        }
        other => panic!("unexpected response: {other:?}"),
    }

    let line = send_line(&server.sock, "REFRESH\n");
    assert_eq!(Response::parse_line(&line).unwrap(), Response::Ok);
    let event = server
        .events
        .recv_timeout(Duration::from_secs(2))
        .unwrap();
    assert_eq!(event, Event::Refresh);
}

#[test]
fn server_rejects_unknown_commands() {
    let server = spawn_server();

    let line = send_line(&server.sock, "SET whatever\n");
    match Response::parse_line(&line).unwrap() {
        Response::Err(msg) => assert_eq!(msg, "unknown_command"),
        other => panic!("unexpected response: {other:?}"),
    }
}

#[test]
fn client_helpers_work_against_a_running_server() {
    let _g = ENV_LOCK.lock().unwrap();
    let server = spawn_server();

    with_socket_env(&server.sock, || {
        ipc::ping().unwrap();

        let status = ipc::status().unwrap();
        assert!(status.contains("current=default"));

        ipc::refresh().unwrap();
        let event = server
            .events
            .recv_timeout(Duration::from_secs(2))
            .unwrap();
        assert_eq!(event, Event::Refresh);
    });
}
