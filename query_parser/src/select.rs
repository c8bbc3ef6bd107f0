//! SELECT token recognition and classification (`spec.md` §4.4 "SELECT").

use query_types::QueryError;
use select_exec::{classify, FsSelectError, FsShape, StatToken, TimeDim};

fn invalid(qid: &str, detail: impl Into<String>) -> QueryError {
    QueryError::Invalid { qid: qid.to_string(), detail: detail.into() }
}

/// Flow-tuple field names a flow-series SELECT may request
/// (`spec.md` §3 row-handle shape for flow-records/flow-series).
const FLOW_TUPLE_FIELDS: &[&str] = &["vrouter", "svn", "dvn", "sip", "dip", "proto", "sport", "dport", "is_short"];

/// The classified SELECT, per `spec.md` §4.6's three families.
#[derive(Debug, Clone)]
pub enum SelectPlan {
    /// Per-UUID fetch family: a plain column projection.
    Fetch { fields: Vec<String> },
    /// Flow-series matrix family.
    FlowSeries { shape: FsShape, time_dim: TimeDim, tuple_fields: Vec<String>, include_class_id: bool },
    /// `StatsSelect` family.
    Stats { tokens: Vec<StatToken> },
}

impl SelectPlan {
    /// Whether this SELECT yields an aggregated multimap of rows rather
    /// than a flat row list (`spec.md` §4.3 "map-output flag").
    pub fn is_map_output(&self) -> bool {
        match self {
            Self::Fetch { .. } => false,
            Self::FlowSeries { shape, .. } => matches!(shape, FsShape::StatsOnly | FsShape::TimeStats | FsShape::TupleStats | FsShape::TupleTimeStats),
            Self::Stats { .. } => true,
        }
    }
}

fn parse_granularity_micros(qid: &str, token: &str) -> Result<u64, QueryError> {
    let secs: u64 = token
        .strip_prefix("T=")
        .unwrap()
        .parse()
        .map_err(|_| invalid(qid, format!("bad granularity in SELECT token {token:?}")))?;
    Ok(secs * 1_000_000)
}

fn parse_flow_series_select(qid: &str, fields: &[String]) -> Result<SelectPlan, QueryError> {
    let mut time_dim = TimeDim::Absent;
    let mut tuple_fields = Vec::new();
    let mut has_stats = false;
    let mut include_class_id = false;

    for field in fields {
        if field == "T" {
            time_dim = TimeDim::Raw;
        } else if field.starts_with("T=") {
            time_dim = TimeDim::Binned(parse_granularity_micros(qid, field)?);
        } else if FLOW_TUPLE_FIELDS.contains(&field.as_str()) {
            tuple_fields.push(field.clone());
        } else if matches!(field.as_str(), "packets" | "bytes" | "sum(packets)" | "sum(bytes)" | "flow_count") {
            has_stats = true;
        } else if field == "flow_class_id" {
            include_class_id = true;
        } else {
            return Err(invalid(qid, format!("unrecognized flow-series SELECT token {field:?}")));
        }
    }

    let shape = classify(time_dim, !tuple_fields.is_empty(), has_stats).map_err(|e| {
        let detail = match e {
            FsSelectError::Empty => "SELECT selects nothing",
            FsSelectError::RawTimeWithStats => "raw T cannot combine with a stats aggregate",
            FsSelectError::BinnedTimeWithRawTuple => "T= cannot combine with a raw tuple projection and no stats",
        };
        invalid(qid, detail)
    })?;

    Ok(SelectPlan::FlowSeries { shape, time_dim, tuple_fields, include_class_id })
}

fn strip_call<'a>(field: &'a str, func: &str) -> Option<&'a str> {
    field.strip_prefix(func)?.strip_prefix('(')?.strip_suffix(')')
}

fn parse_stats_select(qid: &str, fields: &[String]) -> Result<SelectPlan, QueryError> {
    let mut tokens = Vec::with_capacity(fields.len());
    let mut seen_time = false;

    for field in fields {
        let is_time_token = field == "T" || field.starts_with("T=");
        if is_time_token {
            if seen_time {
                return Err(invalid(qid, "T and T= are mutually exclusive"));
            }
            seen_time = true;
            tokens.push(StatToken::Unique(field.clone()));
            continue;
        }

        let token = if let Some(attr) = strip_call(field, "SUM") {
            StatToken::Sum(attr.to_string())
        } else if let Some(attr) = strip_call(field, "COUNT") {
            StatToken::Count(attr.to_string())
        } else if let Some(attr) = strip_call(field, "CLASS") {
            StatToken::Class(attr.to_string())
        } else if let Some(attr) = strip_call(field, "MIN") {
            StatToken::Min(attr.to_string())
        } else if let Some(attr) = strip_call(field, "MAX") {
            StatToken::Max(attr.to_string())
        } else if let Some(attr) = strip_call(field, "AVG") {
            StatToken::Avg(attr.to_string())
        } else if let Some(attr) = strip_call(field, "PERCENTILES") {
            StatToken::Percentiles(attr.to_string())
        } else {
            StatToken::Unique(field.clone())
        };
        tokens.push(token);
    }

    Ok(SelectPlan::Stats { tokens })
}

/// Classifies `select_fields` against the query's table, per `spec.md`
/// §4.4/§4.6. Non-flow-series, non-stats tables resolve to a plain
/// column-projection fetch.
pub fn parse_select(qid: &str, table: schema::TableFamily, fields: &[String]) -> Result<SelectPlan, QueryError> {
    match table {
        schema::TableFamily::FlowSeries => parse_flow_series_select(qid, fields),
        schema::TableFamily::Stats => parse_stats_select(qid, fields),
        _ => Ok(SelectPlan::Fetch { fields: fields.to_vec() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema::TableFamily;

    #[test]
    fn flow_series_time_and_stats_classifies_time_stats_shape() {
        let fields = vec!["T=7".to_string(), "sum(packets)".to_string()];
        let plan = parse_select("q1", TableFamily::FlowSeries, &fields).unwrap();
        match plan {
            SelectPlan::FlowSeries { shape, .. } => assert_eq!(shape, FsShape::TimeStats),
            _ => panic!("expected flow-series plan"),
        }
    }

    #[test]
    fn flow_series_raw_time_with_stats_is_einval() {
        let fields = vec!["T".to_string(), "sum(packets)".to_string()];
        let err = parse_select("q1", TableFamily::FlowSeries, &fields).unwrap_err();
        assert!(matches!(err, QueryError::Invalid { .. }));
    }

    #[test]
    fn fetch_family_passes_fields_through() {
        let fields = vec!["Source".to_string(), "Module".to_string()];
        let plan = parse_select("q1", TableFamily::Messages, &fields).unwrap();
        match plan {
            SelectPlan::Fetch { fields: f } => assert_eq!(f, fields),
            _ => panic!("expected fetch plan"),
        }
    }

    #[test]
    fn stats_select_parses_aggregate_tokens() {
        let fields = vec!["attrA".to_string(), "SUM(packets)".to_string(), "CLASS(attrB)".to_string()];
        let plan = parse_select("q1", TableFamily::Stats, &fields).unwrap();
        match plan {
            SelectPlan::Stats { tokens } => {
                assert_eq!(tokens.len(), 3);
                assert!(matches!(tokens[1], StatToken::Sum(ref s) if s == "packets"));
            }
            _ => panic!("expected stats plan"),
        }
    }

    #[test]
    fn stats_select_rejects_both_t_and_t_eq() {
        let fields = vec!["T".to_string(), "T=5".to_string()];
        let err = parse_select("q1", TableFamily::Stats, &fields).unwrap_err();
        assert!(matches!(err, QueryError::Invalid { .. }));
    }
}
