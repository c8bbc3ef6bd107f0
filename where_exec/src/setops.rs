//! Sorted set-algebra over row-handles (`spec.md` §4.5 "Set algebra"):
//! AND intersects, OR unions, both stable in row-handle total order.

use query_types::RowHandle;

/// Stable sorted intersection of two already-sorted, deduplicated
/// row-handle lists.
pub fn intersect(a: Vec<RowHandle>, b: Vec<RowHandle>) -> Vec<RowHandle> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i].clone());
                i += 1;
                j += 1;
            }
        }
    }
    out
}

/// Stable sorted union of two already-sorted row-handle lists, with
/// exact duplicates collapsed.
pub fn union(a: Vec<RowHandle>, b: Vec<RowHandle>) -> Vec<RowHandle> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => {
                out.push(a[i].clone());
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[j].clone());
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push(a[i].clone());
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

/// Intersects every unit's row-handle list within one AND-group.
pub fn intersect_all(lists: Vec<Vec<RowHandle>>) -> Vec<RowHandle> {
    let mut iter = lists.into_iter();
    let first = match iter.next() {
        Some(l) => l,
        None => return Vec::new(),
    };
    iter.fold(first, intersect)
}

/// Unions every OR-branch's AND-group result.
pub fn union_all(lists: Vec<Vec<RowHandle>>) -> Vec<RowHandle> {
    let mut iter = lists.into_iter();
    let first = match iter.next() {
        Some(l) => l,
        None => return Vec::new(),
    };
    iter.fold(first, union)
}

/// Flow-record WHERE results deduplicate by UUID, keeping the latest
/// (`spec.md` §4.5, §9 Open Question: "reverse-iterate and
/// insert-if-absent"). Non-flow row-handle shapes have no UUID cell and
/// pass through unchanged.
pub fn dedup_flow_by_uuid(rows: Vec<RowHandle>) -> Vec<RowHandle> {
    use hashbrown::HashSet;
    let mut seen = HashSet::new();
    let mut kept: Vec<RowHandle> = Vec::with_capacity(rows.len());
    for row in rows.into_iter().rev() {
        match row.uuid_cell() {
            Some(uuid) => {
                if seen.insert(uuid.clone()) {
                    kept.push(row);
                }
            }
            None => kept.push(row),
        }
    }
    kept.reverse();
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_types::DbDataValue;
    use uuid::Uuid;

    fn row(t: u64, v: u64) -> RowHandle {
        RowHandle::new(t, vec![DbDataValue::U64(v)])
    }

    #[test]
    fn intersect_keeps_only_common_rows() {
        let a = vec![row(1, 1), row(2, 2), row(3, 3)];
        let b = vec![row(2, 2), row(3, 3), row(4, 4)];
        assert_eq!(intersect(a, b), vec![row(2, 2), row(3, 3)]);
    }

    #[test]
    fn union_merges_and_dedups() {
        let a = vec![row(1, 1), row(2, 2)];
        let b = vec![row(2, 2), row(3, 3)];
        assert_eq!(union(a, b), vec![row(1, 1), row(2, 2), row(3, 3)]);
    }

    #[test]
    fn dedup_flow_by_uuid_keeps_latest_copy() {
        let id = Uuid::nil();
        let older = RowHandle::new(1, vec![DbDataValue::Uuid(id), DbDataValue::String("old".into())]);
        let newer = RowHandle::new(2, vec![DbDataValue::Uuid(id), DbDataValue::String("new".into())]);
        let deduped = dedup_flow_by_uuid(vec![older, newer.clone()]);
        assert_eq!(deduped, vec![newer]);
    }
}
