//! Time provider abstraction and query time-string parsing
//! (`spec.md` §6 "`start_time`, `end_time`").
#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use snafu::Snafu;

/// Microseconds since the Unix epoch. The coordinator's sole unit of
/// time, per `spec.md` §3 ("timestamp (microseconds since epoch)").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time(pub u64);

impl Time {
    pub fn from_micros(v: u64) -> Self {
        Self(v)
    }

    pub fn micros(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Supplies the current time. Abstracted so tests can pin "now" and get
/// deterministic TTL clamps and `"now±Ns"` resolution.
pub trait TimeProvider: std::fmt::Debug + Send + Sync {
    fn now(&self) -> Time;
}

/// Real wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProvider;

impl SystemProvider {
    pub fn new() -> Self {
        Self
    }
}

impl TimeProvider for SystemProvider {
    fn now(&self) -> Time {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before epoch")
            .as_micros() as u64;
        Time(micros)
    }
}

/// A fixed or steppable time source for tests.
#[derive(Debug)]
pub struct MockProvider {
    now: AtomicU64,
}

impl MockProvider {
    pub fn new(start: Time) -> Self {
        Self { now: AtomicU64::new(start.0) }
    }

    pub fn set(&self, t: Time) {
        self.now.store(t.0, Ordering::SeqCst);
    }

    pub fn advance(&self, micros: u64) {
        self.now.fetch_add(micros, Ordering::SeqCst);
    }
}

impl TimeProvider for MockProvider {
    fn now(&self) -> Time {
        Time(self.now.load(Ordering::SeqCst))
    }
}

#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
pub enum TimeParseError {
    #[snafu(display("cannot parse time string {input:?}"))]
    Malformed { input: String },
}

/// Parses a query's `start_time`/`end_time` field (`spec.md` §6): a pure
/// integer of microseconds, `"now"`, or `"now±N{s,m,h,d}"`.
pub fn parse_time_string(input: &str, now: Time) -> Result<Time, TimeParseError> {
    let trimmed = input.trim();
    if let Ok(v) = trimmed.parse::<u64>() {
        return Ok(Time(v));
    }
    if trimmed == "now" {
        return Ok(now);
    }
    if let Some(rest) = trimmed.strip_prefix("now") {
        let (sign, rest) = match rest.as_bytes().first() {
            Some(b'+') => (1i64, &rest[1..]),
            Some(b'-') => (-1i64, &rest[1..]),
            _ => return Malformed { input: input.to_string() }.fail(),
        };
        let (digits, unit) = split_unit(rest);
        let value: i64 = digits.parse().map_err(|_| TimeParseError::Malformed { input: input.to_string() })?;
        let unit_micros: i64 = match unit {
            "s" => 1_000_000,
            "m" => 60 * 1_000_000,
            "h" => 3600 * 1_000_000,
            "d" => 24 * 3600 * 1_000_000,
            _ => return Malformed { input: input.to_string() }.fail(),
        };
        let delta = sign * value * unit_micros;
        let result = now.0 as i64 + delta;
        return Ok(Time(result.max(0) as u64));
    }
    Malformed { input: input.to_string() }.fail()
}

fn split_unit(s: &str) -> (&str, &str) {
    let split_at = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(split_at)
}

/// Renders a `Time` back as the plain-microseconds form. Round-tripping a
/// plain-integer input through `parse_time_string` then `render_time`
/// yields the identical string value (`spec.md` §8 round-trip law);
/// relative forms (`"now"`, `"now±Ns"`) are resolved at parse time and so
/// render as their resolved absolute microsecond value, not re-rendered
/// relatively.
pub fn render_time(t: Time) -> String {
    t.0.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_integer_round_trips() {
        let now = Time(1_700_000_000_000_000);
        let t = parse_time_string("123456789", now).unwrap();
        assert_eq!(render_time(t), "123456789");
    }

    #[test]
    fn now_resolves_to_current_time() {
        let now = Time(1_700_000_000_000_000);
        assert_eq!(parse_time_string("now", now).unwrap(), now);
    }

    #[test]
    fn now_minus_offset_subtracts_micros() {
        let now = Time(1_700_000_000_000_000);
        let t = parse_time_string("now-60s", now).unwrap();
        assert_eq!(t.0, now.0 - 60_000_000);
    }

    #[test]
    fn now_plus_offset_in_days() {
        let now = Time(1_000_000_000_000);
        let t = parse_time_string("now+2d", now).unwrap();
        assert_eq!(t.0, now.0 + 2 * 24 * 3600 * 1_000_000);
    }

    #[test]
    fn malformed_input_is_rejected() {
        let now = Time(0);
        assert!(parse_time_string("later", now).is_err());
        assert!(parse_time_string("now~60s", now).is_err());
    }

    #[test]
    fn mock_provider_advances() {
        let mp = MockProvider::new(Time(10));
        mp.advance(5);
        assert_eq!(mp.now(), Time(15));
    }
}
