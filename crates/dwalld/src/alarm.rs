use chrono::{Duration as ChronoDuration, Local, NaiveDateTime, NaiveTime};
use log::{debug, warn};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::coordinator::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEdge {
    Start,
    End,
}

/// Identifies one registered alarm: the image of the owning time rule plus
/// which edge of its window fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmToken {
    pub image: String,
    pub edge: WindowEdge,
}

/// Daily repeating alarm registration, keyed by image. Every schedule call
/// has a matching cancel (rule deleted, mode changed, or re-arm).
pub trait AlarmScheduler: Send {
    fn schedule_daily(&self, at: NaiveTime, token: AlarmToken);

    /// Cancels both edges registered for `image`. Unknown images are a no-op.
    fn cancel(&self, image: &str);
}

struct AlarmEntry {
    token: AlarmToken,
    at: NaiveTime,
    next: NaiveDateTime,
}

#[derive(Default)]
struct SchedulerState {
    entries: Vec<AlarmEntry>,
    shutdown: bool,
}

impl SchedulerState {
    fn schedule(&mut self, at: NaiveTime, token: AlarmToken, now: NaiveDateTime) {
        // Re-registering the same edge replaces the old registration.
        self.entries
            .retain(|e| !(e.token.image == token.image && e.token.edge == token.edge));
        self.entries.push(AlarmEntry {
            token,
            at,
            next: next_occurrence(at, now),
        });
    }

    fn cancel(&mut self, image: &str) {
        self.entries.retain(|e| e.token.image != image);
    }
}

struct SchedulerInner {
    state: Mutex<SchedulerState>,
    wake: Condvar,
}

/// In-process stand-in for an OS alarm service: one worker thread sleeps
/// until the earliest registered instant, fires a coordinator event, and
/// rolls the entry over to the next day.
pub struct ThreadScheduler {
    inner: Arc<SchedulerInner>,
    worker: Option<JoinHandle<()>>,
}

impl ThreadScheduler {
    pub fn start(events: Sender<Event>) -> Self {
        let inner = Arc::new(SchedulerInner {
            state: Mutex::new(SchedulerState::default()),
            wake: Condvar::new(),
        });

        let worker_inner = Arc::clone(&inner);
        let worker = std::thread::spawn(move || run_worker(worker_inner, events));

        Self {
            inner,
            worker: Some(worker),
        }
    }
}

impl AlarmScheduler for ThreadScheduler {
    fn schedule_daily(&self, at: NaiveTime, token: AlarmToken) {
        debug!("alarm armed: {token:?} at {at}");
        let mut state = match self.inner.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.schedule(at, token, Local::now().naive_local());
        self.inner.wake.notify_all();
    }

    fn cancel(&self, image: &str) {
        debug!("alarms cancelled for {image}");
        let mut state = match self.inner.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.cancel(image);
        self.inner.wake.notify_all();
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        {
            let mut state = match self.inner.state.lock() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            state.shutdown = true;
        }
        self.inner.wake.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_worker(inner: Arc<SchedulerInner>, events: Sender<Event>) {
    let mut guard = match inner.state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };

    loop {
        if guard.shutdown {
            return;
        }

        let now = Local::now().naive_local();

        // Fire everything that came due, rolling each entry to tomorrow.
        let mut fired = Vec::new();
        for entry in guard.entries.iter_mut() {
            if entry.next <= now {
                fired.push(entry.token.clone());
                entry.next = next_occurrence(entry.at, now);
            }
        }
        for token in fired {
            debug!("alarm fired: {token:?}");
            if events.send(Event::Alarm(token)).is_err() {
                warn!("coordinator gone, alarm worker exiting");
                return;
            }
        }

        let wait = guard
            .entries
            .iter()
            .map(|e| e.next)
            .min()
            .map(|next| (next - now).to_std().unwrap_or(Duration::ZERO));

        guard = match wait {
            Some(timeout) => {
                let (guard, _) = match inner.wake.wait_timeout(guard, timeout) {
                    Ok(result) => result,
                    Err(poisoned) => poisoned.into_inner(),
                };
                guard
            }
            None => match inner.wake.wait(guard) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            },
        };
    }
}

/// Next instant strictly after `now` whose time of day equals `at`.
fn next_occurrence(at: NaiveTime, now: NaiveDateTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today + ChronoDuration::days(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t(hhmm: &str) -> NaiveTime {
        NaiveTime::parse_from_str(hhmm, "%H:%M").unwrap()
    }

    fn dt(hhmm: &str) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_time(t(hhmm))
    }

    fn token(image: &str, edge: WindowEdge) -> AlarmToken {
        AlarmToken {
            image: image.to_string(),
            edge,
        }
    }

    #[test]
    fn next_occurrence_is_today_when_still_ahead() {
        let next = next_occurrence(t("18:00"), dt("12:00"));
        assert_eq!(next, dt("18:00"));
    }

    #[test]
    fn next_occurrence_rolls_past_instants_to_tomorrow() {
        let next = next_occurrence(t("08:00"), dt("12:00"));
        assert_eq!(next, dt("08:00") + ChronoDuration::days(1));

        // The exact instant counts as already passed.
        let next = next_occurrence(t("12:00"), dt("12:00"));
        assert_eq!(next, dt("12:00") + ChronoDuration::days(1));
    }

    #[test]
    fn cancel_drops_both_edges_for_an_image() {
        let mut state = SchedulerState::default();
        state.schedule(t("08:00"), token("a", WindowEdge::Start), dt("00:00"));
        state.schedule(t("18:00"), token("a", WindowEdge::End), dt("00:00"));
        state.schedule(t("09:00"), token("b", WindowEdge::Start), dt("00:00"));

        state.cancel("a");
        let images: Vec<&str> = state
            .entries
            .iter()
            .map(|e| e.token.image.as_str())
            .collect();
        assert_eq!(images, vec!["b"]);

        // Cancelling something never armed is fine.
        state.cancel("missing");
        assert_eq!(state.entries.len(), 1);
    }

    #[test]
    fn rescheduling_an_edge_replaces_the_old_registration() {
        let mut state = SchedulerState::default();
        state.schedule(t("08:00"), token("a", WindowEdge::Start), dt("00:00"));
        state.schedule(t("09:30"), token("a", WindowEdge::Start), dt("00:00"));

        assert_eq!(state.entries.len(), 1);
        assert_eq!(state.entries[0].at, t("09:30"));
    }
}
