use anyhow::{anyhow, Context, Result};
use chrono::NaiveTime;

/// Hard cap on the rule list; the list screen refuses a sixth entry.
pub const MAX_RULES: usize = 5;

/// Image name reserved for the fallback wallpaper.
pub const DEFAULT_WALLPAPER: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Wifi,
    Time,
    Unset,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Wifi => "wifi",
            Mode::Time => "time",
            Mode::Unset => "unset",
        }
    }

    /// Unknown mode strings decode to `Unset`, which never matches.
    pub fn from_db(s: &str) -> Mode {
        match s {
            "wifi" => Mode::Wifi,
            "time" => Mode::Time,
            _ => Mode::Unset,
        }
    }
}

/// One entry of the priority list. `position` is zero-based and dense;
/// position 0 wins when several rules are active at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WallpaperRule {
    pub position: i64,
    pub name: String,
    pub mode: Mode,
    pub selector: String,
    pub image: String,
}

impl WallpaperRule {
    /// A rule may only be persisted once it has a name, a mode and an image.
    pub fn is_complete(&self) -> bool {
        !self.name.is_empty() && self.mode != Mode::Unset && !self.image.is_empty()
    }

    pub fn time_window(&self) -> Result<TimeWindow> {
        TimeWindow::parse(&self.selector)
    }
}

/// Daily window parsed from a `"HH:MM HH:MM"` selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn parse(selector: &str) -> Result<TimeWindow> {
        let mut parts = selector.split_whitespace();
        let start = parts
            .next()
            .ok_or_else(|| anyhow!("time selector is empty"))?;
        let end = parts
            .next()
            .ok_or_else(|| anyhow!("time selector is missing the end time"))?;
        if parts.next().is_some() {
            return Err(anyhow!("time selector has trailing tokens: {selector:?}"));
        }

        Ok(TimeWindow {
            start: parse_hhmm(start)?,
            end: parse_hhmm(end)?,
        })
    }

    pub fn to_selector(self) -> String {
        format!("{} {}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

fn parse_hhmm(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M").with_context(|| format!("invalid HH:MM time: {s:?}"))
}

/// SSIDs arrive quoted from some tools; rules store them bare.
pub fn strip_ssid_quotes(ssid: &str) -> &str {
    ssid.trim().trim_matches('"')
}

/// Rewrites positions into a dense 0..N-1 sequence, preserving order.
pub fn renumber(rules: &mut [WallpaperRule]) {
    for (index, rule) in rules.iter_mut().enumerate() {
        rule.position = index as i64;
    }
}
