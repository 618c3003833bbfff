//! Parsing of remediation-effort strings such as `"1d2h30min"`.

use std::sync::LazyLock;

use regex::Regex;

/// Minutes in one working day (8 hours).
const MINUTES_PER_DAY: u64 = 8 * 60;

static DEBT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:(\d+)d)?(?:(\d+)h)?(?:(\d+)min)?$").unwrap());

/// Convert a debt string into a total minute count.
///
/// Each unit is optional but at least one must be present. Anything else,
/// including an empty string, yields `None`.
pub fn parse_debt(debt: &str) -> Option<u64> {
    let caps = DEBT_RE.captures(debt.trim())?;
    if caps.iter().skip(1).all(|group| group.is_none()) {
        return None;
    }
    let unit = |i: usize| -> Option<u64> {
        match caps.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(0),
        }
    };
    let days = unit(1)?;
    let hours = unit(2)?;
    let minutes = unit(3)?;
    days.checked_mul(MINUTES_PER_DAY)?
        .checked_add(hours.checked_mul(60)?)?
        .checked_add(minutes)
}
