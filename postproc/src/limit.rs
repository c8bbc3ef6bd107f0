//! Limit (`spec.md` §4.7 "Limit").

/// Truncates `rows` to `limit` elements, after sorting. `None` leaves
/// the rows untouched.
pub fn apply_limit<T>(rows: &mut Vec<T>, limit: Option<usize>) {
    if let Some(limit) = limit {
        rows.truncate(limit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_to_limit() {
        let mut rows = vec![1, 2, 3, 4, 5];
        apply_limit(&mut rows, Some(2));
        assert_eq!(rows, vec![1, 2]);
    }

    #[test]
    fn no_limit_is_a_no_op() {
        let mut rows = vec![1, 2, 3];
        apply_limit(&mut rows, None);
        assert_eq!(rows, vec![1, 2, 3]);
    }
}
