use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone};

/// Returns start of the next day.
///
/// When midnight doesn't exist in the timezone (a DST jump right at 00:00) the first hour after
/// the jump is used instead.
pub fn next_day_start<Tz: TimeZone>(date: DateTime<Tz>) -> DateTime<Tz> {
    let tz = date.timezone();
    let next_day = date.date_naive().succ_opt().unwrap_or(NaiveDate::MAX);
    tz.from_local_datetime(&next_day.and_time(NaiveTime::MIN))
        .earliest()
        .or_else(|| {
            tz.from_local_datetime(&next_day.and_hms_opt(1, 0, 0)?)
                .earliest()
        })
        .unwrap_or_else(|| date + Duration::days(1))
}

/// How much of the current day is left.
pub fn time_until_day_end<Tz: TimeZone>(now: DateTime<Tz>) -> Duration {
    next_day_start(now.clone()) - now
}

/// Formats a countdown as `HH:MM:SS`. Negative values are shown as zero.
pub fn format_countdown(left: Duration) -> String {
    let seconds = left.num_seconds().max(0);
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds / 60) % 60,
        seconds % 60
    )
}
