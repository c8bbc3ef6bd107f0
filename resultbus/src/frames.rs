//! `REPLY:<qid>` progress frames (`spec.md` §4.2, §4.3, §6, §7).

use serde::Serialize;

/// One JSON object `RPUSH`ed onto `REPLY:<qid>`. Negative `progress`
/// values are the errno-shaped failure codes from `spec.md` §7; `100` is
/// always the terminal success frame.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProgressFrame {
    pub progress: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

impl ProgressFrame {
    /// A bare percentage heartbeat, e.g. the `{"progress":15}` admission
    /// frame or the `{10..90}` per-chunk frames (`spec.md` §4.2).
    pub fn heartbeat(pct: i64) -> Self {
        Self { progress: pct, lines: None, count: None }
    }

    /// The terminal success frame (`spec.md` §4.3 step 5).
    pub fn done(lines: u64, count: u64) -> Self {
        Self { progress: 100, lines: Some(lines), count: Some(count) }
    }

    /// A terminal failure frame carrying one of `spec.md` §7's negative
    /// error codes.
    pub fn error(code: i64) -> Self {
        Self { progress: code, lines: None, count: None }
    }

    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).expect("ProgressFrame always serializes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_omits_lines_and_count() {
        let frame = ProgressFrame::heartbeat(15);
        assert_eq!(frame.to_json_string(), r#"{"progress":15}"#);
    }

    #[test]
    fn done_frame_carries_lines_and_count() {
        let frame = ProgressFrame::done(42, 40);
        assert_eq!(frame.to_json_string(), r#"{"progress":100,"lines":42,"count":40}"#);
    }

    #[test]
    fn error_frame_is_a_bare_negative_progress() {
        let frame = ProgressFrame::error(-24);
        assert_eq!(frame.to_json_string(), r#"{"progress":-24}"#);
    }
}
