//! Row-key, column-cell, and consistency types shared by every storage
//! engine backend (`spec.md` §3 "Column-family descriptor", §6 "Storage
//! engine contract").

use query_types::DbDataValue;

/// A fully-composed row key: `(t2_bucket, ...suffix, partition?, is_si?)`
/// per `spec.md` §4.5.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowKey(pub Vec<String>);

impl RowKey {
    pub fn new(parts: Vec<DbDataValue>) -> Self {
        Self(parts.iter().map(|p| p.to_display_string()).collect())
    }
}

/// One stored column: a name cell (carrying the row's `t1` time offset
/// for time-series column families) plus its value cells, as returned by
/// `get_row_async` (`spec.md` §6: "result = ordered vector of
/// `(name-cells, value-cells)`"). `values` holds one cell per slot of the
/// table family's row-handle cell-vector shape (`spec.md` §3).
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnCell {
    pub name: DbDataValue,
    pub values: Vec<DbDataValue>,
}

/// Read consistency level requested of the backend. The in-memory engine
/// has only one replica and ignores this; a networked backend would use
/// it to pick a quorum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consistency {
    One,
    Quorum,
}
