use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use crate::coordinator::Event;
use crate::db::RuleStore;
use crate::state::AppliedState;

/// Line protocol between the CLI and the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Ping,
    Status,
    /// The rule list was mutated; re-arm and re-resolve now.
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ok,
    OkMsg(String),
    Err(String),
}

impl Request {
    pub fn parse_line(line: &str) -> Result<Self> {
        match line.trim_end_matches(['\r', '\n']) {
            "PING" => Ok(Self::Ping),
            "STATUS" => Ok(Self::Status),
            "REFRESH" => Ok(Self::Refresh),
            _ => Err(anyhow!("unknown_command")),
        }
    }

    fn to_line(&self) -> &'static str {
        match self {
            Self::Ping => "PING\n",
            Self::Status => "STATUS\n",
            Self::Refresh => "REFRESH\n",
        }
    }
}

impl Response {
    pub fn to_line(&self) -> String {
        match self {
            Self::Ok => "OK\n".to_string(),
            Self::OkMsg(msg) => format!("OK {msg}\n"),
            Self::Err(msg) => format!("ERR {msg}\n"),
        }
    }

    pub fn parse_line(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']);

        if line == "OK" {
            return Ok(Self::Ok);
        }
        if let Some(rest) = line.strip_prefix("OK ") {
            return Ok(Self::OkMsg(rest.to_string()));
        }
        if let Some(rest) = line.strip_prefix("ERR ") {
            return Ok(Self::Err(rest.to_string()));
        }

        Err(anyhow!("invalid_response")).with_context(|| format!("line: {line:?}"))
    }
}

pub fn socket_path() -> Result<PathBuf> {
    if let Some(p) = std::env::var_os("DWALL_SOCKET_PATH") {
        return Ok(PathBuf::from(p));
    }

    let dir =
        std::env::var_os("XDG_RUNTIME_DIR").ok_or_else(|| anyhow!("XDG_RUNTIME_DIR is not set"))?;
    Ok(Path::new(&dir).join("dwall.sock"))
}

/// Serves CLI requests until the process exits. `STATUS` reads the store
/// through its own connection, so the coordinator never shares one.
pub fn run_server(
    sock: &Path,
    events: Sender<Event>,
    state: Arc<AppliedState>,
    db_path: PathBuf,
) -> Result<()> {
    // Ensure an old socket is gone.
    if sock.exists() {
        std::fs::remove_file(sock).with_context(|| format!("remove existing socket {sock:?}"))?;
    }

    let listener = UnixListener::bind(sock).with_context(|| format!("bind socket {sock:?}"))?;

    // Best-effort perms: user-only.
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(sock, std::fs::Permissions::from_mode(0o600));
    }

    loop {
        let (stream, _addr) = listener.accept().context("accept")?;
        if let Err(err) = handle_client(stream, &events, &state, &db_path) {
            warn!("ipc client error: {err:#}");
        }
    }
}

fn handle_client(
    stream: UnixStream,
    events: &Sender<Event>,
    state: &AppliedState,
    db_path: &Path,
) -> Result<()> {
    let mut w = stream.try_clone().context("clone stream")?;
    let r = BufReader::new(stream);

    for line in r.lines() {
        let line = line.context("read line")?;
        let req = match Request::parse_line(&line) {
            Ok(req) => req,
            Err(_) => {
                w.write_all(Response::Err("unknown_command".into()).to_line().as_bytes())?;
                w.flush()?;
                continue;
            }
        };
        debug!("ipc request: {req:?}");

        let resp = match req {
            Request::Ping => Response::Ok,
            Request::Status => match status_message(state, db_path) {
                Ok(msg) => Response::OkMsg(msg),
                Err(err) => Response::Err(format!("{err}")),
            },
            Request::Refresh => match events.send(Event::Refresh) {
                Ok(()) => Response::Ok,
                Err(_) => Response::Err("daemon is shutting down".into()),
            },
        };

        w.write_all(resp.to_line().as_bytes())?;
        w.flush()?;
    }

    Ok(())
}

fn status_message(state: &AppliedState, db_path: &Path) -> Result<String> {
    let current = state.current().unwrap_or_else(|| "<unset>".to_string());
    let rules = RuleStore::open(db_path)?.list_all()?;
    Ok(format!("current={current} rules={}", rules.len()))
}

// Client side, used by the CLI.

fn connect() -> Result<UnixStream> {
    let sock = socket_path()?;
    UnixStream::connect(&sock).with_context(|| format!("connect {sock:?}"))
}

fn send(req: Request) -> Result<Response> {
    let mut stream = connect()?;
    stream.write_all(req.to_line().as_bytes()).context("write")?;
    stream.flush().context("flush")?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).context("read response")?;
    Response::parse_line(&line)
}

pub fn ping() -> Result<()> {
    match send(Request::Ping)? {
        Response::Ok | Response::OkMsg(_) => Ok(()),
        Response::Err(msg) => Err(anyhow!("{msg}")),
    }
}

pub fn status() -> Result<String> {
    match send(Request::Status)? {
        Response::Ok => Ok(String::new()),
        Response::OkMsg(msg) => Ok(msg),
        Response::Err(msg) => Err(anyhow!("{msg}")),
    }
}

pub fn refresh() -> Result<()> {
    match send(Request::Refresh)? {
        Response::Ok | Response::OkMsg(_) => Ok(()),
        Response::Err(msg) => Err(anyhow!("{msg}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_round_trip_through_lines() {
        assert_eq!(Request::parse_line("PING\n").unwrap(), Request::Ping);
        assert_eq!(Request::parse_line("STATUS").unwrap(), Request::Status);
        assert_eq!(Request::parse_line("REFRESH\r\n").unwrap(), Request::Refresh);
        assert!(Request::parse_line("SET things").is_err());
        assert!(Request::parse_line("").is_err());
    }

    #[test]
    fn responses_round_trip_through_lines() {
        assert_eq!(Response::parse_line("OK\n").unwrap(), Response::Ok);
        assert_eq!(
            Response::parse_line("OK current=default rules=2\n").unwrap(),
            Response::OkMsg("current=default rules=2".to_string())
        );
        assert_eq!(
            Response::parse_line("ERR nope\n").unwrap(),
            Response::Err("nope".to_string())
        );
        assert!(Response::parse_line("garbage").is_err());

        assert_eq!(Response::Ok.to_line(), "OK\n");
        assert_eq!(Response::Err("x".into()).to_line(), "ERR x\n");
    }
}
