// libs/availability-cell/src/services/timegrid.rs
//
// Pure time arithmetic for the availability engine: slot enumeration,
// recurrence expansion, the overlap predicate, and timezone-correct
// materialization of local wall times into UTC instants.

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use rand::Rng;

use crate::models::{AvailabilityError, RecurrencePattern};

/// Alphabet for booking references. Ambiguous glyphs (0/O, 1/I/L) are
/// excluded so references survive being read over the phone.
const REFERENCE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const REFERENCE_SUFFIX_LEN: usize = 8;

/// Parse a local wall time. Accepts `HH:MM` from clients and `HH:MM:SS`
/// as the store renders time columns.
pub fn parse_hm(value: &str) -> Result<NaiveTime, AvailabilityError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| AvailabilityError::InvalidInput(format!("Invalid time: {}", value)))
}

pub fn parse_date(value: &str) -> Result<NaiveDate, AvailabilityError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| AvailabilityError::InvalidInput(format!("Invalid date: {}", value)))
}

/// Local start times of the slots that fit inside `[start, end)`. Each slot
/// occupies `slot_min` minutes; consecutive starts are `slot_min +
/// break_min` apart. Empty when the window cannot hold a first slot.
pub fn enumerate_slots(
    start: NaiveTime,
    end: NaiveTime,
    slot_min: i64,
    break_min: i64,
) -> Vec<NaiveTime> {
    let mut starts = Vec::new();

    if slot_min <= 0 || break_min < 0 {
        return starts;
    }

    let start_min = start.num_seconds_from_midnight() as i64 / 60;
    let end_min = end.num_seconds_from_midnight() as i64 / 60;

    let mut cursor = start_min;
    while cursor + slot_min <= end_min {
        let time = NaiveTime::from_num_seconds_from_midnight_opt((cursor * 60) as u32, 0);
        match time {
            Some(t) => starts.push(t),
            None => break,
        }
        cursor += slot_min + break_min;
    }

    starts
}

/// Dates a recurring template lands on, inclusive of both bounds. Monthly
/// recurrence preserves the day-of-month and skips months that do not have
/// it (a template on the 31st never lands in February).
pub fn expand_recurrence(
    start_date: NaiveDate,
    end_date: NaiveDate,
    pattern: RecurrencePattern,
) -> Result<Vec<NaiveDate>, AvailabilityError> {
    if start_date > end_date {
        return Err(AvailabilityError::InvalidInput(
            "Recurrence end date precedes start date".to_string(),
        ));
    }

    let mut dates = Vec::new();

    match pattern {
        RecurrencePattern::Daily | RecurrencePattern::Weekly => {
            let step = match pattern {
                RecurrencePattern::Daily => Duration::days(1),
                _ => Duration::days(7),
            };
            let mut cursor = start_date;
            while cursor <= end_date {
                dates.push(cursor);
                cursor += step;
            }
        }
        RecurrencePattern::Monthly => {
            let day = start_date.day();
            let mut year = start_date.year();
            let mut month = start_date.month();
            loop {
                if let Some(candidate) = NaiveDate::from_ymd_opt(year, month, day) {
                    if candidate > end_date {
                        break;
                    }
                    dates.push(candidate);
                } else if NaiveDate::from_ymd_opt(year, month, 1)
                    .map(|first| first > end_date)
                    .unwrap_or(true)
                {
                    break;
                }
                month += 1;
                if month > 12 {
                    month = 1;
                    year += 1;
                }
            }
        }
    }

    Ok(dates)
}

/// Half-open interval overlap. Adjacent windows (one ends exactly where the
/// other begins) do not conflict.
pub fn conflict(a_start: NaiveTime, a_end: NaiveTime, b_start: NaiveTime, b_end: NaiveTime) -> bool {
    a_start < b_end && b_start < a_end
}

/// Interpret a local wall time in an IANA zone as a UTC instant.
///
/// DST policy: wall times skipped by spring-forward roll forward in 15
/// minute steps to the next valid instant; wall times duplicated by
/// fall-back resolve to the earlier instant.
pub fn to_utc(date: NaiveDate, time: NaiveTime, tz: &str) -> Result<DateTime<Utc>, AvailabilityError> {
    let zone: Tz = tz
        .parse()
        .map_err(|_| AvailabilityError::InvalidInput(format!("Unknown timezone: {}", tz)))?;

    let mut local = date.and_time(time);

    // A DST gap is at most a few hours; eight steps of 15 minutes cover
    // every real-world transition.
    for _ in 0..=8 {
        match zone.from_local_datetime(&local) {
            LocalResult::Single(instant) => return Ok(instant.with_timezone(&Utc)),
            LocalResult::Ambiguous(earlier, _) => return Ok(earlier.with_timezone(&Utc)),
            LocalResult::None => {
                local += Duration::minutes(15);
            }
        }
    }

    Err(AvailabilityError::InvalidInput(format!(
        "Wall time {} {} has no mapping in {}",
        date, time, tz
    )))
}

/// Render a UTC instant on a wall clock. Used by projections; `to_utc`
/// composed with this returns the original wall time except for
/// DST-skipped inputs.
pub fn to_local(instant: DateTime<Utc>, tz: &str) -> Result<(NaiveDate, NaiveTime), AvailabilityError> {
    let zone: Tz = tz
        .parse()
        .map_err(|_| AvailabilityError::InvalidInput(format!("Unknown timezone: {}", tz)))?;

    let local = instant.with_timezone(&zone);
    Ok((local.date_naive(), local.time()))
}

/// Opaque, URL-safe booking reference: a UTC date prefix plus a random
/// suffix. Global uniqueness is enforced by the store's unique index; the
/// suffix alphabet gives 31^8 combinations per day.
pub fn booking_reference() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..REFERENCE_SUFFIX_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..REFERENCE_ALPHABET.len());
            REFERENCE_ALPHABET[idx] as char
        })
        .collect();

    format!("APT-{}-{}", Utc::now().format("%y%m%d"), suffix)
}
