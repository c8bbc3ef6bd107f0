//! Errno-shaped error kinds surfaced to the result bus as negative progress
//! frames (`spec.md` §7).

use snafu::Snafu;

/// Error kinds that can terminate a query's pipeline. Each variant maps to
/// one of the negative-progress-frame codes documented in `spec.md` §7.
#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
#[snafu(visibility(pub))]
pub enum QueryError {
    /// Query JSON malformed (`-EBADMSG`).
    #[snafu(display("query {qid} malformed: {detail}"))]
    BadMessage { qid: String, detail: String },

    /// Query violates a documented SELECT/WHERE rule (`-EINVAL`).
    #[snafu(display("query {qid} invalid: {detail}"))]
    Invalid { qid: String, detail: String },

    /// Storage-engine or intermediate fetch failure (`-EIO`).
    #[snafu(display("query {qid} storage error: {detail}"))]
    Storage { qid: String, detail: String },

    /// Per-query row cap exceeded (`-ENOBUFS`).
    #[snafu(display("query {qid} exceeded row cap"))]
    RowCapExceeded { qid: String },

    /// Global in-flight pipeline cap exceeded (`-EMFILE`).
    #[snafu(display("too many in-flight pipelines, refusing query {qid}"))]
    TooManyPipelines { qid: String },

    /// Referenced object-table row missing (`-ENOENT`).
    #[snafu(display("query {qid}: object row not found"))]
    ObjectNotFound { qid: String },

    /// Admission-time hash-read failure (`-5`).
    #[snafu(display("query {qid}: admission read failed: {detail}"))]
    Admission { qid: String, detail: String },
}

impl QueryError {
    /// The query-id this error pertains to.
    pub fn qid(&self) -> &str {
        match self {
            Self::BadMessage { qid, .. }
            | Self::Invalid { qid, .. }
            | Self::Storage { qid, .. }
            | Self::RowCapExceeded { qid }
            | Self::TooManyPipelines { qid }
            | Self::ObjectNotFound { qid }
            | Self::Admission { qid, .. } => qid,
        }
    }

    /// The negative progress code written to `REPLY:<qid>` on failure.
    pub fn progress_code(&self) -> i64 {
        match self {
            Self::BadMessage { .. } => -(libc_errno::EBADMSG),
            Self::Invalid { .. } => -(libc_errno::EINVAL),
            Self::Storage { .. } => -(libc_errno::EIO),
            Self::RowCapExceeded { .. } => -(libc_errno::ENOBUFS),
            Self::TooManyPipelines { .. } => -(libc_errno::EMFILE),
            Self::ObjectNotFound { .. } => -(libc_errno::ENOENT),
            Self::Admission { .. } => -5,
        }
    }
}

/// Minimal POSIX errno constants, kept local so this crate does not need a
/// platform `libc` dependency merely to name five integers.
mod libc_errno {
    pub const EBADMSG: i64 = 74;
    pub const EINVAL: i64 = 22;
    pub const EIO: i64 = 5;
    pub const ENOBUFS: i64 = 105;
    pub const EMFILE: i64 = 24;
    pub const ENOENT: i64 = 2;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_codes_match_spec() {
        assert_eq!(
            QueryError::BadMessage {
                qid: "q1".into(),
                detail: "x".into()
            }
            .progress_code(),
            -74
        );
        assert_eq!(
            QueryError::TooManyPipelines { qid: "q1".into() }.progress_code(),
            -24
        );
        assert_eq!(
            QueryError::Admission {
                qid: "q1".into(),
                detail: "x".into()
            }
            .progress_code(),
            -5
        );
    }
}
