//! `DbDataValue`: the tagged-sum cell type every column family reads and
//! writes (`spec.md` §9 design notes — "Dynamic typing of cells").
//!
//! All per-cell arithmetic, comparison, and JSON rendering dispatches on
//! the tag. New variants should stay rare: the set below is exactly the
//! datatype vocabulary named in `spec.md` §4.6/§6/§7.

use std::cmp::Ordering;
use std::fmt;
use std::net::Ipv4Addr;

use serde_json::Value as Json;
use uuid::Uuid;

/// A single typed cell, as stored in a column family or materialized into
/// an output row.
#[derive(Debug, Clone, PartialEq)]
pub enum DbDataValue {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    String(String),
    Uuid(Uuid),
    Double(f64),
    IpAddr(Ipv4Addr),
    Blob(Vec<u8>),
    Blank,
}

impl DbDataValue {
    /// Render this cell as JSON, the form every output row's column map
    /// ultimately takes on the result bus.
    pub fn to_json(&self) -> Json {
        match self {
            Self::U8(v) => Json::from(*v),
            Self::U16(v) => Json::from(*v),
            Self::U32(v) => Json::from(*v),
            Self::U64(v) => Json::from(*v),
            Self::String(v) => Json::from(v.clone()),
            Self::Uuid(v) => Json::from(v.to_string()),
            Self::Double(v) => {
                serde_json::Number::from_f64(*v).map(Json::Number).unwrap_or(Json::Null)
            }
            Self::IpAddr(v) => Json::from(v.to_string()),
            Self::Blob(v) => Json::from(hex_encode(v)),
            Self::Blank => Json::Null,
        }
    }

    /// String rendering used for lexicographic comparisons and for the
    /// column maps fed to `predicate`'s filter evaluator.
    pub fn to_display_string(&self) -> String {
        match self {
            Self::U8(v) => v.to_string(),
            Self::U16(v) => v.to_string(),
            Self::U32(v) => v.to_string(),
            Self::U64(v) => v.to_string(),
            Self::String(v) => v.clone(),
            Self::Uuid(v) => v.to_string(),
            Self::Double(v) => v.to_string(),
            Self::IpAddr(v) => v.to_string(),
            Self::Blob(v) => hex_encode(v),
            Self::Blank => String::new(),
        }
    }

    /// Parse this cell as `u64` for numeric (`int`/`long`/`ipv4`) typed
    /// comparisons (`spec.md` §4.7 Sort).
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U8(v) => Some(*v as u64),
            Self::U16(v) => Some(*v as u64),
            Self::U32(v) => Some(*v as u64),
            Self::U64(v) => Some(*v),
            Self::IpAddr(v) => Some(u32::from(*v) as u64),
            Self::String(v) => v.parse().ok(),
            _ => None,
        }
    }

    /// Parse this cell as `f64`, used by `AVG`/centroid math and by
    /// `LEQ`/`GEQ` filter comparisons on declared-double columns.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            Self::U8(v) => Some(*v as f64),
            Self::U16(v) => Some(*v as f64),
            Self::U32(v) => Some(*v as f64),
            Self::U64(v) => Some(*v as f64),
            Self::String(v) => v.parse().ok(),
            _ => None,
        }
    }

    /// Elementwise numeric addition, used by `SUM`/`COUNT` merge.
    /// Preserves the left operand's variant, per `spec.md` §4.6
    /// "numeric type preserved".
    pub fn add(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::U64(a), _) => Self::U64(a + other.as_u64().unwrap_or(0)),
            (Self::U32(a), _) => Self::U32(a + other.as_u64().unwrap_or(0) as u32),
            (Self::Double(a), _) => Self::Double(a + other.as_f64().unwrap_or(0.0)),
            (a, _) => a.clone(),
        }
    }

    /// Elementwise numeric extremum, used by `MAX`/`MIN` merge.
    pub fn extremum(&self, other: &Self, want_max: bool) -> Self {
        let (a, b) = (self.as_f64(), other.as_f64());
        match (a, b) {
            (Some(a), Some(b)) => {
                let take_other = if want_max { b > a } else { b < a };
                if take_other {
                    other.clone()
                } else {
                    self.clone()
                }
            }
            _ => self.clone(),
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

impl Eq for DbDataValue {}

impl PartialOrd for DbDataValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Total order used for row-handle cell-vector comparisons
/// (`spec.md` §3 "RH ordering"). Cross-variant comparisons fall back to
/// comparing the rendered string form, which is stable and total.
impl Ord for DbDataValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.as_u64(), other.as_u64()) {
            (Some(a), Some(b)) if self.is_numeric() && other.is_numeric() => a.cmp(&b),
            _ => self.to_display_string().cmp(&other.to_display_string()),
        }
    }
}

impl DbDataValue {
    fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::U8(_) | Self::U16(_) | Self::U32(_) | Self::U64(_) | Self::IpAddr(_)
        )
    }
}

impl fmt::Display for DbDataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_cells_compare_numerically() {
        assert!(DbDataValue::U64(2) > DbDataValue::U64(10).extremum(&DbDataValue::U64(2), false));
        assert_eq!(DbDataValue::U32(9).cmp(&DbDataValue::U64(10)), Ordering::Less);
    }

    #[test]
    fn add_preserves_left_variant() {
        let sum = DbDataValue::U64(3).add(&DbDataValue::U64(4));
        assert_eq!(sum, DbDataValue::U64(7));
    }

    #[test]
    fn json_round_trips_string_cells() {
        let v = DbDataValue::String("hi".into());
        assert_eq!(v.to_json(), Json::from("hi"));
    }
}
