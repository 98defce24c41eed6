//! History statistics over completed records.
//!
//! Records are bucketed by their end time in the local time zone. The week
//! starts on Monday.

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone};

use crate::types::{RecordPhase, TimerRecord};

/// Totals shown by `history`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryStats {
    pub today_count: usize,
    pub today_ms: i64,
    pub week_count: usize,
    pub week_ms: i64,
    /// Work time only (break records excluded), this week
    pub week_work_ms: i64,
}

impl HistoryStats {
    pub fn compute<Tz: TimeZone>(records: &[TimerRecord], now: &DateTime<Tz>) -> Self {
        let today = today_records(records, now);
        let week = week_records(records, now);
        Self {
            today_count: today.len(),
            today_ms: total_duration(today.iter().copied()),
            week_count: week.len(),
            week_ms: total_duration(week.iter().copied()),
            week_work_ms: total_duration(
                week.iter()
                    .copied()
                    .filter(|r| r.phase != Some(RecordPhase::Break)),
            ),
        }
    }
}

fn start_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Tz> {
    let naive = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(dt, _) => dt,
        LocalResult::None => tz.from_utc_datetime(&naive),
    }
}

/// Epoch millis of local midnight today.
pub fn today_start_ms<Tz: TimeZone>(now: &DateTime<Tz>) -> i64 {
    start_of_day(&now.timezone(), now.date_naive()).timestamp_millis()
}

/// Epoch millis of local midnight on this week's Monday.
pub fn week_start_ms<Tz: TimeZone>(now: &DateTime<Tz>) -> i64 {
    let today = now.date_naive();
    let days_since_monday = i64::from(today.weekday().num_days_from_monday());
    let monday = today - Duration::days(days_since_monday);
    start_of_day(&now.timezone(), monday).timestamp_millis()
}

/// Records that ended today.
pub fn today_records<'a, Tz: TimeZone>(
    records: &'a [TimerRecord],
    now: &DateTime<Tz>,
) -> Vec<&'a TimerRecord> {
    let start = today_start_ms(now);
    records.iter().filter(|r| r.end_time >= start).collect()
}

/// Records that ended this week.
pub fn week_records<'a, Tz: TimeZone>(
    records: &'a [TimerRecord],
    now: &DateTime<Tz>,
) -> Vec<&'a TimerRecord> {
    let start = week_start_ms(now);
    records.iter().filter(|r| r.end_time >= start).collect()
}

pub fn total_duration<'a>(records: impl IntoIterator<Item = &'a TimerRecord>) -> i64 {
    records.into_iter().map(|r| r.duration).sum()
}
