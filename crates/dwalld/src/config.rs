use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub struct Config {
    pub db_path: PathBuf,
    pub images_dir: PathBuf,
    pub state_path: PathBuf,
    pub poll_interval: Duration,
    pub settle_delay: Duration,
}

impl Config {
    pub fn from_args() -> Result<Self> {
        let mut db_path = default_db_path();
        let mut images_dir = default_images_dir();
        let mut state_path = default_state_path();
        let mut poll_ms: u64 = 5000;
        let mut settle_ms: u64 = 500;

        let mut args = env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = args.next().context("missing value for --db")?;
                    db_path = PathBuf::from(value);
                }
                "--images" => {
                    let value = args.next().context("missing value for --images")?;
                    images_dir = PathBuf::from(value);
                }
                "--state" => {
                    let value = args.next().context("missing value for --state")?;
                    state_path = PathBuf::from(value);
                }
                "--poll-ms" => {
                    let value = args.next().context("missing value for --poll-ms")?;
                    poll_ms = value
                        .parse::<u64>()
                        .with_context(|| format!("invalid --poll-ms value: {value}"))?;
                }
                "--settle-ms" => {
                    let value = args.next().context("missing value for --settle-ms")?;
                    settle_ms = value
                        .parse::<u64>()
                        .with_context(|| format!("invalid --settle-ms value: {value}"))?;
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                _ => bail!("unknown argument: {arg}"),
            }
        }

        if poll_ms == 0 {
            bail!("--poll-ms must be greater than zero");
        }

        Ok(Self {
            db_path,
            images_dir,
            state_path,
            poll_interval: Duration::from_millis(poll_ms),
            settle_delay: Duration::from_millis(settle_ms),
        })
    }
}

/// `$XDG_DATA_HOME/dwall`, falling back to `~/.local/share/dwall`.
pub fn data_dir() -> PathBuf {
    if let Some(data) = env::var_os("XDG_DATA_HOME") {
        return PathBuf::from(data).join("dwall");
    }
    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".local/share/dwall");
    }
    PathBuf::from("data").join("dwall")
}

pub fn default_db_path() -> PathBuf {
    data_dir().join("dwall.db")
}

pub fn default_images_dir() -> PathBuf {
    data_dir().join("wallpapers")
}

pub fn default_state_path() -> PathBuf {
    data_dir().join("applied.json")
}

fn print_help() {
    println!(
        "\
dwalld - wallpaper switching daemon

Usage:
  dwalld [--db <path>] [--images <dir>] [--state <path>] [--poll-ms <ms>] [--settle-ms <ms>]

Options:
  --db          SQLite file path (default: $XDG_DATA_HOME/dwall/dwall.db)
  --images      Stored wallpaper directory (default: $XDG_DATA_HOME/dwall/wallpapers)
  --state       Applied-wallpaper record (default: $XDG_DATA_HOME/dwall/applied.json)
  --poll-ms     Wi-Fi polling interval in milliseconds (default: 5000)
  --settle-ms   Delay before reading the SSID after a change (default: 500)
  -h, --help    Print this help"
    );
}
