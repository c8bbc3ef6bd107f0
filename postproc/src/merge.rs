//! The two merge entry points (`spec.md` §4.7 "Two merge entry points").

use std::cmp::Ordering;
use std::collections::BTreeMap;

use hashbrown::HashMap;
use select_exec::StatsAccumulator;
use serde_json::Value as Json;

use crate::limit::apply_limit;
use crate::sort::{compare_rows, sort_json_rows, sort_rows, SortField};

/// `merge_processing(chunk-output, running-buffer)` for non-aggregated
/// rows: concatenates when unsorted, otherwise performs an in-place
/// sorted merge. Assumes both `running` and `chunk_output` are each
/// already sorted by `sort_fields` (every chunk applies its own sort
/// before merging in).
pub fn merge_processing_rows(running: &mut Vec<HashMap<String, String>>, chunk_output: Vec<HashMap<String, String>>, sort_fields: &[SortField]) {
    if sort_fields.is_empty() {
        running.extend(chunk_output);
        return;
    }
    let mut merged = Vec::with_capacity(running.len() + chunk_output.len());
    let mut a = running.drain(..).peekable();
    let mut b = chunk_output.into_iter().peekable();
    loop {
        match (a.peek(), b.peek()) {
            (Some(x), Some(y)) => {
                if compare_rows(x, y, sort_fields) != Ordering::Greater {
                    merged.push(a.next().unwrap());
                } else {
                    merged.push(b.next().unwrap());
                }
            }
            (Some(_), None) => merged.push(a.next().unwrap()),
            (None, Some(_)) => merged.push(b.next().unwrap()),
            (None, None) => break,
        }
    }
    *running = merged;
}

/// `final_merge_processing(vec<chunk-output>, final)` for non-aggregated
/// rows: reserve exact capacity, concatenate, re-sort, truncate.
pub fn final_merge_processing_rows(chunks: Vec<Vec<HashMap<String, String>>>, sort_fields: &[SortField], limit: Option<usize>) -> Vec<HashMap<String, String>> {
    let total: usize = chunks.iter().map(Vec::len).sum();
    let mut all = Vec::with_capacity(total);
    for chunk in chunks {
        all.extend(chunk);
    }
    sort_rows(&mut all, sort_fields);
    apply_limit(&mut all, limit);
    all
}

/// `merge_processing` for `StatsSelect`: key-by-key `MergeFullRow`.
pub fn merge_processing_stats(running: &mut StatsAccumulator, chunk_output: StatsAccumulator) {
    running.merge_processing(chunk_output);
}

/// `final_merge_processing`'s `MergeFinal` for `StatsSelect`: absorbs
/// every chunk's accumulator, then renders and (if aggregate sort keys
/// were requested) re-sorts by the post-aggregation projected fields.
pub fn final_merge_processing_stats(chunks: Vec<StatsAccumulator>, sort_fields: &[SortField], limit: Option<usize>) -> Vec<BTreeMap<String, Json>> {
    let merged = select_exec::merge_final(chunks);
    let mut rows: Vec<BTreeMap<String, Json>> = merged.rows().map(|(unique, agg)| select_exec::render_row(unique, agg)).collect();
    if !sort_fields.is_empty() {
        sort_json_rows(&mut rows, sort_fields);
    }
    apply_limit(&mut rows, limit);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema::Datatype;
    use select_exec::{process_row, StatToken};

    use crate::sort::SortDirection;

    fn row(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn merge_processing_concatenates_when_unsorted() {
        let mut running = vec![row(&[("a", "1")])];
        merge_processing_rows(&mut running, vec![row(&[("a", "2")])], &[]);
        assert_eq!(running.len(), 2);
    }

    #[test]
    fn merge_processing_preserves_sort_order() {
        let sort_fields = vec![SortField::new("n", Datatype::Int, SortDirection::Ascending)];
        let mut running = vec![row(&[("n", "1")]), row(&[("n", "3")])];
        let chunk = vec![row(&[("n", "2")]), row(&[("n", "4")])];
        merge_processing_rows(&mut running, chunk, &sort_fields);
        let values: Vec<&str> = running.iter().map(|r| r["n"].as_str()).collect();
        assert_eq!(values, vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn final_merge_processing_sorts_and_truncates() {
        let chunks = vec![vec![row(&[("n", "3")])], vec![row(&[("n", "1")]), row(&[("n", "2")])]];
        let sort_fields = vec![SortField::new("n", Datatype::Int, SortDirection::Ascending)];
        let result = final_merge_processing_rows(chunks, &sort_fields, Some(2));
        let values: Vec<&str> = result.iter().map(|r| r["n"].as_str()).collect();
        assert_eq!(values, vec!["1", "2"]);
    }

    #[test]
    fn final_merge_processing_stats_merges_across_chunks() {
        use query_types::DbDataValue;
        use std::collections::BTreeMap as Map;

        let tokens = vec![StatToken::Unique("attrA".into()), StatToken::Sum("packets".into())];
        let mut acc_a = StatsAccumulator::new();
        let raw = Map::from([("attrA".to_string(), DbDataValue::String("x".into())), ("packets".to_string(), DbDataValue::U64(1))]);
        let (u, a) = process_row(&tokens, &raw);
        acc_a.merge_full_row(u, a);

        let mut acc_b = StatsAccumulator::new();
        let raw = Map::from([("attrA".to_string(), DbDataValue::String("x".into())), ("packets".to_string(), DbDataValue::U64(2))]);
        let (u, a) = process_row(&tokens, &raw);
        acc_b.merge_full_row(u, a);

        let result = final_merge_processing_stats(vec![acc_a, acc_b], &[], None);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0]["SUM(packets)"], Json::from(3));
    }
}
