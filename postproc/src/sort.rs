//! Multi-key typed sort (`spec.md` §4.7 "Sort").

use std::cmp::Ordering;
use std::net::Ipv4Addr;
use std::str::FromStr;

use hashbrown::HashMap;
use schema::Datatype;
use serde_json::Value as Json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl Default for SortDirection {
    fn default() -> Self {
        Self::Ascending
    }
}

/// One declared sort key.
#[derive(Debug, Clone)]
pub struct SortField {
    pub name: String,
    pub datatype: Datatype,
    pub direction: SortDirection,
}

impl SortField {
    pub fn new(name: impl Into<String>, datatype: Datatype, direction: SortDirection) -> Self {
        Self { name: name.into(), datatype, direction }
    }
}

/// Parses a rendered column value as `u64` per its declared datatype:
/// `ipv4` columns render as dotted-quad strings (`sip`/`dip`), so they go
/// through `Ipv4Addr` rather than a bare integer parse (`spec.md` §4.7:
/// "`int`/`long`/`ipv4` are compared numerically via parsed uint64").
fn parse_numeric(s: &str, datatype: Datatype) -> Option<u64> {
    match datatype {
        Datatype::IpAddr => Ipv4Addr::from_str(s).ok().map(u32::from).map(u64::from),
        _ => s.parse().ok(),
    }
}

fn compare_values(a: Option<&str>, b: Option<&str>, datatype: Datatype) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) if datatype.is_numeric() => {
            let a = parse_numeric(a, datatype);
            let b = parse_numeric(b, datatype);
            a.cmp(&b)
        }
        (Some(a), Some(b)) => a.cmp(b),
    }
}

/// Compares two output rows key-by-key over `sort_fields`, the way
/// `spec.md` §4.7 describes: numeric parse for `int`/`long`/`ipv4`,
/// lexicographic otherwise, direction applied per field.
pub fn compare_rows(a: &HashMap<String, String>, b: &HashMap<String, String>, sort_fields: &[SortField]) -> Ordering {
    for field in sort_fields {
        let mut ord = compare_values(a.get(&field.name).map(String::as_str), b.get(&field.name).map(String::as_str), field.datatype);
        if field.direction == SortDirection::Descending {
            ord = ord.reverse();
        }
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Stable multi-key sort of non-aggregated output rows.
pub fn sort_rows(rows: &mut [HashMap<String, String>], sort_fields: &[SortField]) {
    rows.sort_by(|a, b| compare_rows(a, b, sort_fields));
}

fn json_as_str(v: &Json) -> Option<String> {
    match v {
        Json::Null => None,
        Json::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Same comparison, for `StatsSelect`'s post-aggregation rendered rows
/// (`BTreeMap<String, Json>` from `select_exec::render_row`).
pub fn compare_json_rows(a: &std::collections::BTreeMap<String, Json>, b: &std::collections::BTreeMap<String, Json>, sort_fields: &[SortField]) -> Ordering {
    for field in sort_fields {
        let av = a.get(&field.name).and_then(json_as_str);
        let bv = b.get(&field.name).and_then(json_as_str);
        let mut ord = compare_values(av.as_deref(), bv.as_deref(), field.datatype);
        if field.direction == SortDirection::Descending {
            ord = ord.reverse();
        }
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

pub fn sort_json_rows(rows: &mut [std::collections::BTreeMap<String, Json>], sort_fields: &[SortField]) {
    rows.sort_by(|a, b| compare_json_rows(a, b, sort_fields));
}
