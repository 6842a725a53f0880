use chrono::{Days, NaiveDate};

/// Parse a `YYYY-MM-DD` calendar day.
///
/// The string must split on `-` into exactly three all-digit components that
/// name a real calendar date. Anything else yields `None`; an unparseable day
/// is never ordered against valid ones.
pub fn parse_day(s: &str) -> Option<NaiveDate> {
    let mut parts = s.split('-');
    let (y, m, d) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let year: i32 = numeric(y)?.try_into().ok()?;
    let month: u32 = numeric(m)?.try_into().ok()?;
    let day: u32 = numeric(d)?.try_into().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn numeric(part: &str) -> Option<i64> {
    if part.is_empty() || part.len() > 9 || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

/// Render `YYYY-MM-DD` as `DD/MM/YYYY`. Display only: empty input stays empty
/// and input that is not three `-`-separated parts is returned unchanged.
pub fn format_day(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }
    let parts: Vec<&str> = s.split('-').collect();
    match parts.as_slice() {
        [y, m, d] => format!("{d}/{m}/{y}"),
        _ => s.to_string(),
    }
}

/// Same rendering for an already-parsed day.
pub fn display_day(day: NaiveDate) -> String {
    day.format("%d/%m/%Y").to_string()
}

/// Half-open overlap: `[a_start, a_end)` against `[b_start, b_end)`.
/// A stay ending on day D does not overlap one starting on D.
pub fn overlaps<T: PartialOrd>(a_start: T, a_end: T, b_start: T, b_end: T) -> bool {
    a_start < b_end && b_start < a_end
}

/// The day after `day`, saturating at the last representable date.
pub fn next_day(day: NaiveDate) -> NaiveDate {
    day.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX)
}

/// Resolve a query day: `today`, `tomorrow`, `week` (today + 7) or an explicit
/// `YYYY-MM-DD`.
pub fn resolve_query_day(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    match input.trim() {
        "today" | "hoje" => Some(today),
        "tomorrow" | "amanha" => today.checked_add_days(Days::new(1)),
        "week" | "semana" => today.checked_add_days(Days::new(7)),
        other => parse_day(other),
    }
}
