use anyhow::Result;
use chrono::Local;
use log::{debug, warn};
use std::sync::mpsc::Receiver;

use crate::alarm::{AlarmScheduler, AlarmToken, WindowEdge};
use crate::apply::Applier;
use crate::db::RuleStore;
use crate::monitor;
use crate::resolve::{resolve_active, select, ResolutionContext, Selection};
use crate::rules::Mode;

/// Everything that can re-enter the resolution pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Daemon start; alarms do not survive a restart, so every time rule is
    /// re-armed before the first resolution.
    Boot,
    /// Connectivity transition, already settled by the monitor.
    Network,
    /// A registered window edge came due.
    Alarm(AlarmToken),
    /// Manual rule mutation reported over IPC.
    Refresh,
    Shutdown,
}

/// Supplies the live context a resolution runs against; tests pin it.
pub trait ContextSource: Send {
    fn current(&self) -> ResolutionContext;
}

pub struct LiveContext;

impl ContextSource for LiveContext {
    fn current(&self) -> ResolutionContext {
        ResolutionContext {
            ssid: monitor::current_ssid(),
            now: Local::now().time(),
        }
    }
}

/// Single consumer of the event channel. Each event re-runs the resolution
/// engine against a fresh store snapshot and hands the outcome to the
/// applier; alarm registrations are kept in step with the time rules.
pub struct Coordinator {
    store: RuleStore,
    applier: Applier,
    scheduler: Box<dyn AlarmScheduler>,
    ctx: Box<dyn ContextSource>,
    armed: Vec<String>,
}

impl Coordinator {
    pub fn new(
        store: RuleStore,
        applier: Applier,
        scheduler: Box<dyn AlarmScheduler>,
        ctx: Box<dyn ContextSource>,
    ) -> Self {
        Self {
            store,
            applier,
            scheduler,
            ctx,
            armed: Vec::new(),
        }
    }

    pub fn run(&mut self, events: Receiver<Event>) {
        for event in events {
            if event == Event::Shutdown {
                break;
            }
            // No trigger path is fatal; the next event reconciles again.
            if let Err(err) = self.handle(event) {
                warn!("trigger failed: {err:#}");
            }
        }
    }

    pub fn handle(&mut self, event: Event) -> Result<()> {
        debug!("event: {event:?}");
        match event {
            Event::Boot | Event::Refresh => {
                self.rearm()?;
                self.resolve_and_apply()?;
            }
            Event::Network => {
                self.resolve_and_apply()?;
            }
            Event::Alarm(token) => {
                self.handle_alarm(token)?;
            }
            Event::Shutdown => {}
        }
        Ok(())
    }

    /// Cancels every registration this coordinator made, then arms both
    /// window edges of every current time rule. Rules whose selector no
    /// longer parses are skipped rather than armed with garbage.
    fn rearm(&mut self) -> Result<()> {
        for image in self.armed.drain(..) {
            self.scheduler.cancel(&image);
        }

        for rule in self.store.list_all()? {
            if rule.mode != Mode::Time {
                continue;
            }
            let window = match rule.time_window() {
                Ok(window) => window,
                Err(err) => {
                    warn!("rule {:?}: not arming alarms: {err:#}", rule.name);
                    continue;
                }
            };

            self.scheduler.schedule_daily(
                window.start,
                AlarmToken {
                    image: rule.image.clone(),
                    edge: WindowEdge::Start,
                },
            );
            self.scheduler.schedule_daily(
                window.end,
                AlarmToken {
                    image: rule.image.clone(),
                    edge: WindowEdge::End,
                },
            );
            self.armed.push(rule.image);
        }
        Ok(())
    }

    fn handle_alarm(&mut self, token: AlarmToken) -> Result<()> {
        let rules = self.store.list_all()?;

        // A stale registration can fire for a since-deleted rule.
        if !rules.iter().any(|r| r.image == token.image) {
            debug!("alarm for unknown wallpaper {}, ignoring", token.image);
            return Ok(());
        }

        let ctx = self.ctx.current();
        match token.edge {
            WindowEdge::Start => {
                // Only applied when the firing rule won the resolution;
                // a higher-priority active rule keeps the wallpaper.
                if let Some(top) = resolve_active(&rules, &ctx).first() {
                    if top.mode == Mode::Time && top.image == token.image {
                        self.applier.apply(Selection::Image(top.image.clone()));
                    }
                }
            }
            WindowEdge::End => {
                // Whatever resolves now: a lower-priority still-active rule
                // or the default.
                self.applier.apply(select(&rules, &ctx));
            }
        }
        Ok(())
    }

    fn resolve_and_apply(&mut self) -> Result<()> {
        let rules = self.store.list_all()?;
        let ctx = self.ctx.current();
        self.applier.apply(select(&rules, &ctx));
        Ok(())
    }
}
