//! Wait intervals attached to jump options (`"1d"`, `"2h:30m"`, `"1d:2h:3m:4s"`).
//!
//! Units must appear in day, hour, minute, second order, each at most once,
//! optionally separated by `:`.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid interval '{input}': {reason}")]
pub struct IntervalError {
    pub input: String,
    pub reason: &'static str,
}

const UNITS: [(char, u64); 4] = [('d', 86_400), ('h', 3_600), ('m', 60), ('s', 1)];

/// Parses a wait interval into a [`Duration`].
pub fn parse_interval(input: &str) -> Result<Duration, IntervalError> {
    let fail = |reason| IntervalError {
        input: input.to_string(),
        reason,
    };

    let compact: String = input.trim().chars().filter(|c| *c != ':').collect();
    if compact.is_empty() {
        return Err(fail("empty interval"));
    }

    let mut seconds: u64 = 0;
    let mut next_unit = 0;
    let mut digits = String::new();

    for c in compact.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let offset = UNITS[next_unit..]
            .iter()
            .position(|(unit, _)| *unit == c)
            .ok_or_else(|| fail("unknown or out-of-order unit"))?;
        let (_, scale) = UNITS[next_unit + offset];
        if digits.is_empty() {
            return Err(fail("unit without a number"));
        }
        let value: u64 = digits.parse().map_err(|_| fail("number too large"))?;
        seconds = value
            .checked_mul(scale)
            .and_then(|v| seconds.checked_add(v))
            .ok_or_else(|| fail("number too large"))?;
        digits.clear();
        next_unit += offset + 1;
    }

    if !digits.is_empty() {
        return Err(fail("number without a unit"));
    }

    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_units() {
        assert_eq!(parse_interval("1d").unwrap(), Duration::from_secs(86_400));
        assert_eq!(parse_interval("45m").unwrap(), Duration::from_secs(2_700));
    }

    #[test]
    fn combined_units_with_and_without_separators() {
        let expected = Duration::from_secs(86_400 + 2 * 3_600 + 3 * 60 + 4);
        assert_eq!(parse_interval("1d:2h:3m:4s").unwrap(), expected);
        assert_eq!(parse_interval("1d2h3m4s").unwrap(), expected);
        assert_eq!(parse_interval("2d:3h").unwrap(), Duration::from_secs(2 * 86_400 + 3 * 3_600));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_interval("").is_err());
        assert!(parse_interval("10").is_err());
        assert!(parse_interval("3h1d").is_err());
        assert!(parse_interval("1w").is_err());
        assert!(parse_interval("h").is_err());
        assert!(parse_interval("1h1h").is_err());
    }
}
