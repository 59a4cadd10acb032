use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

const MS_PER_DAY: f64 = 86_400_000.0;

pub(crate) fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Écart en jours entiers : |Δ ms| / 24h arrondi (pas de soustraction calendaire).
pub(crate) fn rounded_day_diff(a: DateTime<Utc>, b: DateTime<Utc>) -> i64 {
    let ms = (a - b).num_milliseconds().abs() as f64;
    (ms / MS_PER_DAY).round() as i64
}

/// Heures (fractionnaires) séparant deux intervalles disjoints, 0 s'ils se chevauchent.
pub(crate) fn gap_hours(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> f64 {
    let gap = if a_end <= b_start {
        b_start - a_end
    } else if b_end <= a_start {
        a_start - b_end
    } else {
        Duration::zero()
    };
    gap.num_milliseconds() as f64 / 3_600_000.0
}

/// Lundi 00:00 UTC de la semaine contenant `at`.
pub(crate) fn start_of_week(at: DateTime<Utc>) -> DateTime<Utc> {
    let date = at.date_naive();
    let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
    Utc.from_utc_datetime(&monday.and_time(chrono::NaiveTime::MIN))
}

pub(crate) fn date_ranges_overlap(
    a_start: NaiveDate,
    a_end: NaiveDate,
    b_start: NaiveDate,
    b_end: NaiveDate,
) -> bool {
    a_start <= b_end && b_start <= a_end
}

/// Nombre de jours communs, bornes incluses.
pub(crate) fn overlapping_days(
    a_start: NaiveDate,
    a_end: NaiveDate,
    b_start: NaiveDate,
    b_end: NaiveDate,
) -> i64 {
    let start = a_start.max(b_start);
    let end = a_end.min(b_end);
    ((end - start).num_days() + 1).max(0)
}
