//! Comparison and spatial operators shared by every dialect.

use serde::{Deserialize, Serialize};

/// A `where:` comparison operator, as it appears on the GraphQL argument
/// surface (spec.md §4.3.1) before being rendered to dialect SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// `eq`
    Eq,
    /// `neq`
    Neq,
    /// `gt`
    Gt,
    /// `gte`
    Gte,
    /// `lt`
    Lt,
    /// `lte`
    Lte,
    /// `in`
    In,
    /// `nin`
    NotIn,
    /// `like`
    Like,
    /// `ilike`
    Ilike,
    /// `contains` (substring)
    Contains,
    /// `is_null` / `isnull`
    IsNull,
    /// GIS: `st_dwithin`
    StDwithin,
    /// GIS: `st_within`
    StWithin,
    /// GIS: `st_contains`
    StContains,
    /// GIS: `st_intersects`
    StIntersects,
    /// GIS: `st_covers`
    StCovers,
    /// GIS: `st_coveredby`
    StCoveredBy,
    /// GIS: `st_touches`
    StTouches,
    /// GIS: `st_overlaps`
    StOverlaps,
    /// GIS: `near` (nearest-neighbour ordering helper, not a boolean predicate)
    Near,
}

impl Operator {
    /// Parse a `where:` operator key from the GraphQL argument surface.
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "eq" => Self::Eq,
            "neq" => Self::Neq,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "in" => Self::In,
            "nin" => Self::NotIn,
            "like" => Self::Like,
            "ilike" => Self::Ilike,
            "contains" => Self::Contains,
            "isnull" | "is_null" => Self::IsNull,
            "st_dwithin" => Self::StDwithin,
            "st_within" => Self::StWithin,
            "st_contains" => Self::StContains,
            "st_intersects" => Self::StIntersects,
            "st_covers" => Self::StCovers,
            "st_coveredby" => Self::StCoveredBy,
            "st_touches" => Self::StTouches,
            "st_overlaps" => Self::StOverlaps,
            "near" => Self::Near,
            _ => return None,
        })
    }

    /// `true` for the nine GIS predicates/helpers (spec.md §4.3.1).
    #[must_use]
    pub const fn is_spatial(self) -> bool {
        matches!(
            self,
            Self::StDwithin
                | Self::StWithin
                | Self::StContains
                | Self::StIntersects
                | Self::StCovers
                | Self::StCoveredBy
                | Self::StTouches
                | Self::StOverlaps
                | Self::Near
        )
    }

    /// `true` when the right-hand side is a list value (`in`/`nin`).
    #[must_use]
    pub const fn expects_list(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }

    /// Plain SQL infix form, for the operators that have one.
    #[must_use]
    pub const fn sql_infix(self) -> Option<&'static str> {
        match self {
            Self::Eq => Some("="),
            Self::Neq => Some("<>"),
            Self::Gt => Some(">"),
            Self::Gte => Some(">="),
            Self::Lt => Some("<"),
            Self::Lte => Some("<="),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_known_operators() {
        assert_eq!(Operator::from_str("gte"), Some(Operator::Gte));
        assert_eq!(Operator::from_str("st_dwithin"), Some(Operator::StDwithin));
        assert_eq!(Operator::from_str("bogus"), None);
    }

    #[test]
    fn spatial_classification() {
        assert!(Operator::StWithin.is_spatial());
        assert!(!Operator::Eq.is_spatial());
    }
}
