//! Filter OR-of-ANDs evaluator, run against materialized output rows
//! (`spec.md` §4.7 "Filter").

use std::net::Ipv4Addr;
use std::str::FromStr;

use hashbrown::HashMap;
use once_regex::OnceRegex;
use schema::Datatype;

use crate::term::Op;

mod once_regex {
    use regex::Regex;

    /// Compiles a regex once per term rather than once per evaluated row.
    #[derive(Debug, Clone)]
    pub struct OnceRegex(Regex);

    impl OnceRegex {
        pub fn compile(pattern: &str) -> Option<Self> {
            Regex::new(pattern).ok().map(Self)
        }

        pub fn is_match(&self, haystack: &str) -> bool {
            self.0.is_match(haystack)
        }
    }

    impl PartialEq for OnceRegex {
        fn eq(&self, other: &Self) -> bool {
            self.0.as_str() == other.0.as_str()
        }
    }
}

/// One filter-list match term (`spec.md` §6 "filter": "same grammar as
/// where"), plus the `ignore_col_absence` escape hatch named in §4.7.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterTerm {
    pub name: String,
    pub op: Op,
    pub value: String,
    pub datatype: Datatype,
    pub ignore_col_absence: bool,
}

impl FilterTerm {
    pub fn new(name: impl Into<String>, op: Op, value: impl Into<String>, datatype: Datatype) -> Self {
        Self { name: name.into(), op, value: value.into(), datatype, ignore_col_absence: false }
    }

    pub fn ignoring_absence(mut self) -> Self {
        self.ignore_col_absence = true;
        self
    }

    fn eval(&self, row: &HashMap<String, String>) -> bool {
        let actual = match row.get(&self.name) {
            Some(v) => v,
            None => return self.ignore_col_absence,
        };
        match self.op {
            Op::Equal => actual == &self.value,
            Op::NotEqual => actual != &self.value,
            Op::Leq => self.numeric_cmp(actual).map(|o| o.is_le()).unwrap_or(false),
            Op::Geq => self.numeric_cmp(actual).map(|o| o.is_ge()).unwrap_or(false),
            Op::RegexMatch => OnceRegex::compile(&self.value).map(|re| re.is_match(actual)).unwrap_or(false),
            Op::Prefix => actual.starts_with(self.value.as_str()),
            Op::Contains => actual.contains(self.value.as_str()),
            Op::InRange => false, // filter-list does not use range terms; WHERE only.
        }
    }

    /// Parses both sides as the column's declared type before comparing
    /// (`spec.md` §4.7: "`LEQ`/`GEQ` parse both sides as the column's
    /// declared type"). `ipv4` columns render as dotted-quad strings
    /// (`sip`/`dip`), so they parse through `Ipv4Addr` rather than a bare
    /// integer parse.
    fn numeric_cmp(&self, actual: &str) -> Option<std::cmp::Ordering> {
        if self.datatype == Datatype::IpAddr {
            let a = Ipv4Addr::from_str(actual).ok().map(u32::from)?;
            let b = Ipv4Addr::from_str(&self.value).ok().map(u32::from)?;
            Some(a.cmp(&b))
        } else if self.datatype.is_numeric() {
            let a: u64 = actual.parse().ok()?;
            let b: u64 = self.value.parse().ok()?;
            Some(a.cmp(&b))
        } else {
            let a: f64 = actual.parse().ok()?;
            let b: f64 = self.value.parse().ok()?;
            a.partial_cmp(&b)
        }
    }
}

/// Evaluates an OR-of-ANDs filter list against one output row's
/// string-keyed column map. An empty filter list passes every row.
pub fn evaluate_filter(filter: &[Vec<FilterTerm>], row: &HashMap<String, String>) -> bool {
    if filter.is_empty() {
        return true;
    }
    filter.iter().any(|and_group| and_group.iter().all(|term| term.eval(row)))
}
