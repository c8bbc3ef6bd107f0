//! Storage-engine failure kinds. Any of these flips a `DbQueryUnit`'s
//! `query_fetch_error` flag and surfaces as `QueryError::Storage`
//! (`-EIO`) to the coordinator (`spec.md` §4.5, §7).

use snafu::Snafu;

#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    #[snafu(display("unknown column family {cf:?}"))]
    UnknownColumnFamily { cf: String },

    #[snafu(display("row not found in {cf:?}"))]
    RowNotFound { cf: String },

    #[snafu(display("backend unavailable: {detail}"))]
    Unavailable { detail: String },
}
