//! `MatchTerm`, `Op`, and the OR-of-ANDs `WhereTree` the query JSON's
//! `where` field decodes into (`spec.md` §4.4, §6).

use query_types::DbDataValue;
use serde_json::Value as Json;
use snafu::Snafu;

/// Comparison operators a WHERE (or filter) match-term may carry
/// (`spec.md` §4.4: "EQUAL, NOT_EQUAL, IN_RANGE, LEQ, GEQ, PREFIX,
/// REGEX_MATCH, CONTAINS").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Equal,
    NotEqual,
    InRange,
    Leq,
    Geq,
    Prefix,
    RegexMatch,
    Contains,
}

impl Op {
    fn from_str(s: &str) -> Option<Self> {
        match s {
            "EQUAL" => Some(Self::Equal),
            "NOT_EQUAL" => Some(Self::NotEqual),
            "IN_RANGE" => Some(Self::InRange),
            "LEQ" => Some(Self::Leq),
            "GEQ" => Some(Self::Geq),
            "PREFIX" => Some(Self::Prefix),
            "REGEX_MATCH" => Some(Self::RegexMatch),
            "CONTAINS" => Some(Self::Contains),
            _ => None,
        }
    }
}

/// One compiled match term: `{name, value, value2?, op, suffix?}`
/// (`spec.md` §6).
#[derive(Debug, Clone, PartialEq)]
pub struct MatchTerm {
    pub name: String,
    pub value: DbDataValue,
    pub value2: Option<DbDataValue>,
    pub op: Op,
    /// StatsOracle suffix value, present only on dynamic stat where-terms.
    pub suffix: Option<DbDataValue>,
}

impl MatchTerm {
    pub fn new(name: impl Into<String>, value: DbDataValue, op: Op) -> Self {
        Self { name: name.into(), value, value2: None, op, suffix: None }
    }

    pub fn with_value2(mut self, value2: DbDataValue) -> Self {
        self.value2 = Some(value2);
        self
    }

    pub fn with_suffix(mut self, suffix: DbDataValue) -> Self {
        self.suffix = Some(suffix);
        self
    }
}

/// An OR-of-ANDs tree of match terms.
pub type WhereTree = Vec<Vec<MatchTerm>>;

#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
pub enum WhereParseError {
    #[snafu(display("where term {index} malformed: {detail}"))]
    Malformed { index: usize, detail: String },
}

/// Parses the `where` JSON field into a [`WhereTree`]. Accepts both the
/// documented array-of-arrays form and the legacy flat array of ANDs,
/// which is wrapped into a single OR group (`spec.md` §4.4: "The legacy
/// form (single flat array of ANDs) is accepted and wrapped.").
pub fn parse_where(json: &Json) -> Result<WhereTree, WhereParseError> {
    match json {
        Json::Null => Ok(Vec::new()),
        Json::String(s) if s.is_empty() => Ok(Vec::new()),
        Json::Array(outer) => {
            if outer.is_empty() {
                return Ok(Vec::new());
            }
            if outer.iter().all(|v| v.is_object()) {
                // Legacy flat array of ANDs.
                let and_group = outer
                    .iter()
                    .enumerate()
                    .map(|(i, v)| parse_term(i, v))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(vec![and_group])
            } else {
                outer
                    .iter()
                    .enumerate()
                    .map(|(i, and_group)| match and_group {
                        Json::Array(terms) => terms
                            .iter()
                            .enumerate()
                            .map(|(j, v)| parse_term(i * 1000 + j, v))
                            .collect::<Result<Vec<_>, _>>(),
                        _ => Malformed { index: i, detail: "expected an array of terms".to_string() }.fail(),
                    })
                    .collect()
            }
        }
        _ => Malformed { index: 0, detail: "where must be an array".to_string() }.fail(),
    }
}

fn parse_term(index: usize, json: &Json) -> Result<MatchTerm, WhereParseError> {
    let obj = json.as_object().ok_or_else(|| WhereParseError::Malformed {
        index,
        detail: "term must be an object".to_string(),
    })?;
    let name = obj
        .get("name")
        .and_then(Json::as_str)
        .ok_or_else(|| WhereParseError::Malformed { index, detail: "missing name".to_string() })?
        .to_string();
    let op_str = obj
        .get("op")
        .and_then(Json::as_str)
        .ok_or_else(|| WhereParseError::Malformed { index, detail: "missing op".to_string() })?;
    let op = Op::from_str(op_str).ok_or_else(|| WhereParseError::Malformed {
        index,
        detail: format!("unrecognized op {op_str:?}"),
    })?;
    let value = obj
        .get("value")
        .map(json_to_cell)
        .ok_or_else(|| WhereParseError::Malformed { index, detail: "missing value".to_string() })?;
    let value2 = obj.get("value2").map(json_to_cell);
    let suffix = obj.get("suffix").map(json_to_cell);
    Ok(MatchTerm { name, value, value2, op, suffix })
}

/// Converts a raw JSON scalar into a [`DbDataValue`]. WHERE-term JSON
/// carries only strings and numbers; UUID/IP-typed terms are strings that
/// `query_parser`'s per-table compiler re-tags once it knows the column's
/// declared datatype.
fn json_to_cell(json: &Json) -> DbDataValue {
    match json {
        Json::String(s) => DbDataValue::String(s.clone()),
        Json::Number(n) => {
            if let Some(u) = n.as_u64() {
                DbDataValue::U64(u)
            } else if let Some(f) = n.as_f64() {
                DbDataValue::Double(f)
            } else {
                DbDataValue::String(n.to_string())
            }
        }
        Json::Bool(b) => DbDataValue::U8(*b as u8),
        _ => DbDataValue::Blank,
    }
}
