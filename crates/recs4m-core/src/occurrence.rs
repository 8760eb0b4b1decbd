use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveTime};

use crate::reservation::Reservation;

/// Next instant strictly after `now` at which `reservation` starts.
///
/// Takes today's midnight in `now`'s offset, moves to `start_minute`, then
/// forward to the reservation's weekday. If that is not after `now` the
/// result advances by whole weeks until it is.
pub fn next_occurrence(reservation: &Reservation, now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let midnight = now
        .date_naive()
        .and_time(NaiveTime::MIN)
        .and_local_timezone(*now.offset())
        .single()
        .unwrap_or(now);

    let mut candidate = midnight + Duration::minutes(i64::from(reservation.start_minute));

    let target = i64::from(reservation.day_of_week % 7);
    let current = i64::from(candidate.weekday().num_days_from_sunday());
    candidate += Duration::days((target - current).rem_euclid(7));

    while candidate <= now {
        candidate += Duration::weeks(1);
    }
    candidate
}
