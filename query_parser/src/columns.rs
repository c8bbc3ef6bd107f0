//! Builtin column datatypes, used to pick a typed comparison strategy for
//! WHERE/filter/sort terms on the statically-known tables (`spec.md` §4.6,
//! §4.7). Dynamic stat tables carry their own `table_schema`-declared
//! datatypes instead (`schema::DynamicStatsSchema`); this lookup is the
//! fallback for every other table family.

use schema::Datatype;

/// Resolves a column's declared datatype by name. Columns not listed here
/// (message/session free-text fields, unique-columns map keys) default to
/// `Datatype::String`.
pub fn column_datatype(name: &str) -> Datatype {
    match name {
        "bytes" | "packets" | "sum(packets)" | "sum(bytes)" | "flow_count" | "sport" | "dport" | "proto" | "svn" | "dvn" | "T" | "T=" | "limit" | "is_short" => Datatype::Int,
        "sip" | "dip" => Datatype::IpAddr,
        "uuid" | "UuidKey" | "object_id" | "ObjectId" => Datatype::Uuid,
        _ => Datatype::String,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_columns_resolve_to_declared_type() {
        assert_eq!(column_datatype("bytes"), Datatype::Int);
        assert_eq!(column_datatype("sip"), Datatype::IpAddr);
        assert_eq!(column_datatype("object_id"), Datatype::Uuid);
    }

    #[test]
    fn unknown_column_defaults_to_string() {
        assert_eq!(column_datatype("Source"), Datatype::String);
    }
}
