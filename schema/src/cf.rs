//! Column-family descriptors (`spec.md` §3 "Column-family descriptor").

use crate::datatype::Datatype;
use query_types::DbDataValue;

/// A typed endpoint of a column-name range scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnNameRange {
    pub start: DbDataValue,
    pub finish: DbDataValue,
    /// Row-limit hint for the underlying scan; `None` means unbounded.
    pub count: Option<u64>,
}

impl ColumnNameRange {
    pub fn new(start: DbDataValue, finish: DbDataValue) -> Self {
        Self { start, finish, count: None }
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }
}

/// A named, schema-bound table in the storage engine, addressed by a
/// typed row-key tuple and a typed column-name range (`spec.md` §3).
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnFamilyDescriptor {
    pub name: String,
    /// Fixed-prefix key components appended after the `t2` time-bucket.
    pub row_key_suffix: Vec<DbDataValue>,
    pub column_range: ColumnNameRange,
}

impl ColumnFamilyDescriptor {
    pub fn new(name: impl Into<String>, row_key_suffix: Vec<DbDataValue>, column_range: ColumnNameRange) -> Self {
        Self { name: name.into(), row_key_suffix, column_range }
    }
}

/// Declared column metadata for a table, used by SELECT projection and
/// by `spec.md` §4.7's typed sort/filter comparisons.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub datatype: Datatype,
}
