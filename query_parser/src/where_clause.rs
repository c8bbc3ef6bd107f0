//! WHERE/filter JSON parsing plus cross-field and object-id validation
//! (`spec.md` §4.4 "WHERE").

use predicate::{validate_cross_field, validate_object_id, CrossFieldError, FilterTerm, MatchTerm, WhereTree};
use query_types::QueryError;
use schema::TableFamily;
use serde_json::Value as Json;

use crate::columns::column_datatype;

fn bad_message(qid: &str, detail: impl Into<String>) -> QueryError {
    QueryError::BadMessage { qid: qid.to_string(), detail: detail.into() }
}

fn invalid(qid: &str, detail: impl Into<String>) -> QueryError {
    QueryError::Invalid { qid: qid.to_string(), detail: detail.into() }
}

fn cross_field_detail(err: CrossFieldError) -> String {
    match err {
        CrossFieldError::IpWithoutVn { ip_field, vn_field } => format!("{ip_field} present without {vn_field}"),
        CrossFieldError::IpWithRangeVn { ip_field, vn_field } => format!("{vn_field} is a range while {ip_field} is also present"),
        CrossFieldError::PortWithoutProto { port_field } => format!("{port_field} present without proto"),
        CrossFieldError::PortWithRangeProto { port_field } => format!("proto is a range while {port_field} is also present"),
        CrossFieldError::MissingObjectId => "object-table query missing an object-id term".to_string(),
    }
}

/// Parses the `where` field, then validates every AND-group's cross-field
/// rules and (for object-table queries) the object-id requirement.
pub fn parse_and_validate_where(qid: &str, table: TableFamily, json: &Json) -> Result<WhereTree, QueryError> {
    let tree = predicate::parse_where(json).map_err(|e| bad_message(qid, e.to_string()))?;

    for and_group in &tree {
        validate_cross_field(and_group).map_err(|e| invalid(qid, cross_field_detail(e)))?;
        if table == TableFamily::ObjectLog || table == TableFamily::ObjectValue {
            validate_object_id(and_group).map_err(|e| invalid(qid, cross_field_detail(e)))?;
        }
    }
    Ok(tree)
}

/// Parses the `filter` field (same grammar as `where`, matched against
/// materialized rows) into `predicate`'s filter term shape.
pub fn parse_filter(qid: &str, json: &Json) -> Result<Vec<Vec<FilterTerm>>, QueryError> {
    let tree = predicate::parse_where(json).map_err(|e| bad_message(qid, e.to_string()))?;
    Ok(tree
        .into_iter()
        .map(|and_group| and_group.into_iter().map(match_term_to_filter_term).collect())
        .collect())
}

fn match_term_to_filter_term(term: MatchTerm) -> FilterTerm {
    let datatype = column_datatype(&term.name);
    FilterTerm::new(term.name, term.op, term.value.to_display_string(), datatype)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sip_without_svn_becomes_invalid() {
        let where_json = json!([[{"name": "sip", "value": "10.0.0.1", "op": "EQUAL"}]]);
        let err = parse_and_validate_where("q1", TableFamily::FlowRecords, &where_json).unwrap_err();
        assert!(matches!(err, QueryError::Invalid { .. }));
    }

    #[test]
    fn object_table_without_object_id_is_invalid() {
        let where_json = json!([[{"name": "x", "value": "1", "op": "EQUAL"}]]);
        let err = parse_and_validate_where("q1", TableFamily::ObjectLog, &where_json).unwrap_err();
        assert!(matches!(err, QueryError::Invalid { .. }));
    }

    #[test]
    fn malformed_where_is_bad_message() {
        let err = parse_and_validate_where("q1", TableFamily::Messages, &json!("not an array or object string")).unwrap_err();
        assert!(matches!(err, QueryError::BadMessage { .. }));
    }

    #[test]
    fn filter_parses_into_filter_terms() {
        let filter_json = json!([[{"name": "module", "value": "self", "op": "NOT_EQUAL"}]]);
        let filter = parse_filter("q1", &filter_json).unwrap();
        assert_eq!(filter.len(), 1);
        assert_eq!(filter[0][0].name, "module");
    }
}
