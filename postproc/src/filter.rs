//! Filter OR-of-ANDs plus the collector global message table's implicit
//! self-filter (`spec.md` §4.7 "Filter").

use std::collections::BTreeMap;

use hashbrown::HashMap;
use predicate::{evaluate_filter, FilterTerm, Op};
use schema::Datatype;
use serde_json::Value as Json;

/// How the auto-filter applies, decided once per query by `coordinator`
/// from `query_parser`'s classification of the table and the query's
/// `disable_self_filter` flag (`spec.md` §4.7).
#[derive(Debug, Clone, Default)]
pub struct AutoFilterConfig {
    pub is_global_message_table: bool,
    pub self_filter_disabled: bool,
    pub self_module: Option<String>,
}

/// Appends `(module != self)` to every AND-group (or adds a single
/// AND-group carrying only that term, if the filter list was empty),
/// when the auto-filter applies.
fn with_auto_filter(filter: &[Vec<FilterTerm>], config: &AutoFilterConfig) -> Vec<Vec<FilterTerm>> {
    let Some(module) = (config.is_global_message_table && !config.self_filter_disabled)
        .then(|| config.self_module.clone())
        .flatten()
    else {
        return filter.to_vec();
    };

    let term = FilterTerm::new("module", Op::NotEqual, module, Datatype::String);
    if filter.is_empty() {
        vec![vec![term]]
    } else {
        filter.iter().map(|and_group| { let mut g = and_group.clone(); g.push(term.clone()); g }).collect()
    }
}

/// Filters output rows against the OR-of-ANDs filter list, with the
/// collector global message table's self-filter applied first.
pub fn filter_rows(rows: Vec<HashMap<String, String>>, filter: &[Vec<FilterTerm>], config: &AutoFilterConfig) -> Vec<HashMap<String, String>> {
    let effective = with_auto_filter(filter, config);
    rows.into_iter().filter(|row| evaluate_filter(&effective, row)).collect()
}

fn json_row_as_strings(row: &BTreeMap<String, Json>) -> HashMap<String, String> {
    row.iter()
        .filter_map(|(k, v)| match v {
            Json::Null => None,
            Json::String(s) => Some((k.clone(), s.clone())),
            other => Some((k.clone(), other.to_string())),
        })
        .collect()
}

/// Same filter, for rendered JSON rows (`StatsSelect`'s aggregates and the
/// flow-series matrix's final output, both of which must filter after
/// their merge completes since aggregate columns are only whole
/// post-merge — `spec.md` §4.7 "Filter").
pub fn filter_json_rows(rows: Vec<BTreeMap<String, Json>>, filter: &[Vec<FilterTerm>], config: &AutoFilterConfig) -> Vec<BTreeMap<String, Json>> {
    let effective = with_auto_filter(filter, config);
    rows.into_iter().filter(|row| evaluate_filter(&effective, &json_row_as_strings(row))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn auto_filter_drops_self_module_rows() {
        let rows = vec![row(&[("module", "collector")]), row(&[("module", "other")])];
        let config = AutoFilterConfig { is_global_message_table: true, self_filter_disabled: false, self_module: Some("collector".into()) };
        let result = filter_rows(rows, &[], &config);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0]["module"], "other");
    }

    #[test]
    fn auto_filter_does_not_apply_when_disabled() {
        let rows = vec![row(&[("module", "collector")])];
        let config = AutoFilterConfig { is_global_message_table: true, self_filter_disabled: true, self_module: Some("collector".into()) };
        let result = filter_rows(rows, &[], &config);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn auto_filter_is_anded_into_existing_groups() {
        let rows = vec![row(&[("module", "collector"), ("a", "1")]), row(&[("module", "other"), ("a", "1")])];
        let config = AutoFilterConfig { is_global_message_table: true, self_filter_disabled: false, self_module: Some("collector".into()) };
        let filter = vec![vec![FilterTerm::new("a", Op::Equal, "1", Datatype::String)]];
        let result = filter_rows(rows, &filter, &config);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0]["module"], "other");
    }

    #[test]
    fn filter_json_rows_renders_numbers_before_matching() {
        let mut r1 = BTreeMap::new();
        r1.insert("flow_count".to_string(), Json::from(2));
        let mut r2 = BTreeMap::new();
        r2.insert("flow_count".to_string(), Json::from(5));
        let filter = vec![vec![FilterTerm::new("flow_count", Op::Geq, "3", Datatype::Int)]];
        let result = filter_json_rows(vec![r1, r2], &filter, &AutoFilterConfig::default());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0]["flow_count"], Json::from(5));
    }
}
