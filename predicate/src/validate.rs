//! Cross-field validation rules for a compiled AND-group
//! (`spec.md` §4.4 "Cross-field validation rules").

use crate::term::{MatchTerm, Op};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrossFieldError {
    /// `sip` (or `dip`) present without its owning `svn`/`dvn`.
    IpWithoutVn { ip_field: &'static str, vn_field: &'static str },
    /// `svn`/`dvn` is a range while `sip`/`dip` is also present.
    IpWithRangeVn { ip_field: &'static str, vn_field: &'static str },
    /// `sport`/`dport` present without `proto`.
    PortWithoutProto { port_field: &'static str },
    /// `proto` is a range while `sport`/`dport` is also present.
    PortWithRangeProto { port_field: &'static str },
    /// Object-table query with no object-id term.
    MissingObjectId,
}

fn find<'a>(terms: &'a [MatchTerm], name: &str) -> Option<&'a MatchTerm> {
    terms.iter().find(|t| t.name == name)
}

fn is_range(term: &MatchTerm) -> bool {
    matches!(term.op, Op::InRange) || term.value2.is_some()
}

/// Validates one AND-group against the flow-tuple composition rules
/// (`spec.md` §4.4):
/// - sip implies svn; dip implies dvn; sport or dport implies proto.
/// - If svn is a range, sip must be absent (and symmetrically dvn/dip).
/// - If proto is a range, sport and dport must be absent.
pub fn validate_cross_field(terms: &[MatchTerm]) -> Result<(), CrossFieldError> {
    if let Some(sip) = find(terms, "sip") {
        let _ = sip;
        let svn = find(terms, "svn");
        if svn.is_none() {
            return Err(CrossFieldError::IpWithoutVn { ip_field: "sip", vn_field: "svn" });
        }
        if is_range(svn.unwrap()) {
            return Err(CrossFieldError::IpWithRangeVn { ip_field: "sip", vn_field: "svn" });
        }
    }
    if let Some(dip) = find(terms, "dip") {
        let _ = dip;
        let dvn = find(terms, "dvn");
        if dvn.is_none() {
            return Err(CrossFieldError::IpWithoutVn { ip_field: "dip", vn_field: "dvn" });
        }
        if is_range(dvn.unwrap()) {
            return Err(CrossFieldError::IpWithRangeVn { ip_field: "dip", vn_field: "dvn" });
        }
    }

    let proto = find(terms, "proto");
    if let Some(sport) = find(terms, "sport") {
        let _ = sport;
        match proto {
            None => return Err(CrossFieldError::PortWithoutProto { port_field: "sport" }),
            Some(p) if is_range(p) => return Err(CrossFieldError::PortWithRangeProto { port_field: "sport" }),
            _ => {}
        }
    }
    if let Some(dport) = find(terms, "dport") {
        let _ = dport;
        match proto {
            None => return Err(CrossFieldError::PortWithoutProto { port_field: "dport" }),
            Some(p) if is_range(p) => return Err(CrossFieldError::PortWithRangeProto { port_field: "dport" }),
            _ => {}
        }
    }

    Ok(())
}

/// Object-table queries must specify an object-id term (`spec.md` §4.4).
pub fn validate_object_id(terms: &[MatchTerm]) -> Result<(), CrossFieldError> {
    if find(terms, "object_id").is_none() && find(terms, "ObjectId").is_none() {
        return Err(CrossFieldError::MissingObjectId);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_types::DbDataValue;

    fn eq(name: &str, v: u64) -> MatchTerm {
        MatchTerm::new(name, DbDataValue::U64(v), Op::Equal)
    }

    fn range(name: &str, lo: u64, hi: u64) -> MatchTerm {
        MatchTerm::new(name, DbDataValue::U64(lo), Op::InRange).with_value2(DbDataValue::U64(hi))
    }

    #[test]
    fn sip_without_svn_is_rejected() {
        let terms = vec![eq("sip", 1)];
        assert_eq!(
            validate_cross_field(&terms),
            Err(CrossFieldError::IpWithoutVn { ip_field: "sip", vn_field: "svn" })
        );
    }

    #[test]
    fn sip_with_range_svn_is_rejected() {
        let terms = vec![range("svn", 1, 5), eq("sip", 1)];
        assert_eq!(
            validate_cross_field(&terms),
            Err(CrossFieldError::IpWithRangeVn { ip_field: "sip", vn_field: "svn" })
        );
    }

    #[test]
    fn sip_with_scalar_svn_is_accepted() {
        let terms = vec![eq("svn", 1), eq("sip", 1)];
        assert!(validate_cross_field(&terms).is_ok());
    }

    #[test]
    fn sport_without_proto_is_rejected() {
        let terms = vec![eq("sport", 80)];
        assert_eq!(
            validate_cross_field(&terms),
            Err(CrossFieldError::PortWithoutProto { port_field: "sport" })
        );
    }

    #[test]
    fn sport_with_range_proto_is_rejected() {
        let terms = vec![range("proto", 1, 6), eq("sport", 80)];
        assert_eq!(
            validate_cross_field(&terms),
            Err(CrossFieldError::PortWithRangeProto { port_field: "sport" })
        );
    }

    #[test]
    fn object_query_requires_object_id() {
        assert!(validate_object_id(&[]).is_err());
        assert!(validate_object_id(&[eq("object_id", 1)]).is_ok());
    }
}
