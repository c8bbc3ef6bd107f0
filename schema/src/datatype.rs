//! The declared datatype of a column, used to convert raw cells to their
//! JSON form and to pick a comparison/arithmetic strategy
//! (`spec.md` §4.6, §4.7).

/// Column datatypes named in the DDL (`spec.md` §4.6:
/// "`string|uuid|ipaddr|double|int`").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Datatype {
    String,
    Uuid,
    IpAddr,
    Double,
    Int,
    /// Suffix/prefix cells whose schema was unknown at compile time
    /// (`spec.md` §9, Open Question — two-step stats where-term parsing).
    /// Coerced to a string cell; kept distinct purely for logging.
    DynamicUnchecked,
}

impl Datatype {
    /// Whether two values of this datatype compare numerically
    /// (`spec.md` §4.7 Sort: "`int`/`long`/`ipv4` are compared
    /// numerically via parsed uint64; others lexicographically").
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::IpAddr)
    }
}
