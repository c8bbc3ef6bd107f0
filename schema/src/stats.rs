//! StatsOracle dynamic stat-table schema (`spec.md` §4.4, §4.6, §6).

use hashbrown::HashMap;
use observability_deps::tracing::warn;

use crate::datatype::Datatype;

/// One column's declared shape in a `table_schema` query field
/// (`spec.md` §6: `{name → {datatype, index, suffixes[]}}`).
#[derive(Debug, Clone, PartialEq)]
pub struct StatColumnSchema {
    pub datatype: Datatype,
    /// Whether this column is an indexed stat-tag prefix.
    pub index: bool,
    pub suffixes: Vec<String>,
}

/// The schema for one dynamic stat table, built from the query's
/// `table_schema` field. `spec.md` §4.4: "a schema inference rule beyond
/// the documented static-versus-dynamic stat-table rule" is explicitly a
/// non-goal, so this struct is populated only from what the query
/// supplies, never inferred from stored data.
#[derive(Debug, Clone, Default)]
pub struct DynamicStatsSchema {
    pub columns: HashMap<String, StatColumnSchema>,
}

impl DynamicStatsSchema {
    pub fn new(columns: HashMap<String, StatColumnSchema>) -> Self {
        Self { columns }
    }

    /// Resolves the datatype of a prefix/suffix match-term value against
    /// this schema. Open Question (`spec.md` §9): when the suffix's
    /// schema is unknown, silently coerce to a string cell but surface
    /// the coercion as `Datatype::DynamicUnchecked` in logs rather than
    /// guessing a different datatype.
    pub fn resolve_suffix_datatype(&self, column: &str) -> Datatype {
        match self.columns.get(column) {
            Some(col) => col.datatype,
            None => {
                warn!(column, "dynamic stat suffix has unknown schema, coercing to string");
                Datatype::DynamicUnchecked
            }
        }
    }
}

/// The prefix/suffix datatype used to pick one of the six indexed
/// stat-tag column families, per `spec.md` §4.4: "a separate
/// prefix/suffix compiler that picks one of six indexed stat-tag CFs by
/// the datatypes of the prefix and optional suffix values:
/// `{STR, U64, DBL} × {none, STR, U64}`".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatTagPrefix {
    Str,
    U64,
    Dbl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatTagSuffix {
    None,
    Str,
    U64,
}

/// Selects the indexed stat-tag CF name for a `(prefix, suffix)` pair.
/// `spec.md` §4.4 names six of these nine slots as actually indexed
/// (a `Dbl` prefix never composes with a suffix, since doubles are not
/// usable as a stable sub-key); `predicate`'s compiler only ever
/// constructs the six reachable combinations, but this function covers
/// the full `{STR,U64,DBL} x {none,STR,U64}` matrix so callers don't need
/// a partial match.
pub fn stat_tag_cf_name(prefix: StatTagPrefix, suffix: StatTagSuffix) -> String {
    let p = match prefix {
        StatTagPrefix::Str => "STR",
        StatTagPrefix::U64 => "U64",
        StatTagPrefix::Dbl => "DBL",
    };
    let s = match suffix {
        StatTagSuffix::None => "",
        StatTagSuffix::Str => "_STR",
        StatTagSuffix::U64 => "_U64",
    };
    format!("StatTableByTag{p}{s}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_suffix_coerces_to_dynamic_unchecked() {
        let schema = DynamicStatsSchema::default();
        assert_eq!(schema.resolve_suffix_datatype("attrA"), Datatype::DynamicUnchecked);
    }

    #[test]
    fn known_suffix_uses_declared_datatype() {
        let mut columns = HashMap::new();
        columns.insert(
            "attrA".to_string(),
            StatColumnSchema { datatype: Datatype::Double, index: false, suffixes: vec![] },
        );
        let schema = DynamicStatsSchema::new(columns);
        assert_eq!(schema.resolve_suffix_datatype("attrA"), Datatype::Double);
    }

    #[test]
    fn all_six_tag_cfs_are_distinct() {
        let prefixes = [StatTagPrefix::Str, StatTagPrefix::U64, StatTagPrefix::Dbl];
        let suffixes = [StatTagSuffix::None, StatTagSuffix::Str, StatTagSuffix::U64];
        let mut names = std::collections::HashSet::new();
        for p in prefixes {
            for s in suffixes {
                names.insert(stat_tag_cf_name(p, s));
            }
        }
        assert_eq!(names.len(), 9); // full matrix; predicate's compiler only ever reaches 6 of these
    }
}
