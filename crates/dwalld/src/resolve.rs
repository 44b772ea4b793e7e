use chrono::NaiveTime;
use log::warn;

use crate::interval::is_within_daily_window;
use crate::rules::{Mode, TimeWindow, WallpaperRule, DEFAULT_WALLPAPER};

/// Snapshot of the live context a resolution runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionContext {
    /// Current SSID, empty when disconnected.
    pub ssid: String,
    pub now: NaiveTime,
}

/// What the resolver picked; `Default` means no rule matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Image(String),
    Default,
}

impl Selection {
    pub fn image_name(&self) -> &str {
        match self {
            Selection::Image(name) => name,
            Selection::Default => DEFAULT_WALLPAPER,
        }
    }
}

/// Filters the rule list down to the rules whose condition currently holds,
/// preserving priority order. A malformed time selector fails closed: the
/// rule is skipped and logged, never a crash.
pub fn resolve_active<'a>(
    rules: &'a [WallpaperRule],
    ctx: &ResolutionContext,
) -> Vec<&'a WallpaperRule> {
    let mut active = Vec::new();
    for rule in rules {
        match rule.mode {
            Mode::Wifi => {
                if rule.selector == ctx.ssid {
                    active.push(rule);
                }
            }
            Mode::Time => match TimeWindow::parse(&rule.selector) {
                Ok(window) => {
                    if is_within_daily_window(window.start, window.end, ctx.now) {
                        active.push(rule);
                    }
                }
                Err(err) => {
                    warn!("rule {:?}: bad time selector, skipping: {err:#}", rule.name);
                }
            },
            Mode::Unset => {}
        }
    }
    active
}

/// The highest-priority active image, or the default fallback.
pub fn select(rules: &[WallpaperRule], ctx: &ResolutionContext) -> Selection {
    match resolve_active(rules, ctx).first() {
        Some(rule) => Selection::Image(rule.image.clone()),
        None => Selection::Default,
    }
}
