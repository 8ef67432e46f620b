//! Static operator table (§4.3). A tagged variant per operator with an
//! explicit allowed-type set, not runtime reflection over suffix strings.

use crate::domain::SemanticType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    Exact,
    Differs,
    Contains,
    In,
    Less,
    Greater,
    StrictlyLess,
    StrictlyGreater,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateFn {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// What a `<column>__<suffix>` key decodes to before the value is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suffix {
    Filter(FilterOp),
    Sort,
    GroupBy,
    Aggregate(AggregateFn),
}

impl Suffix {
    /// Map a raw `__<suffix>` token to its operator, or `None` if the token
    /// is not one of the recognized suffixes.
    pub fn parse(token: &str) -> Option<Self> {
        Some(match token {
            "exact" => Suffix::Filter(FilterOp::Exact),
            "differs" => Suffix::Filter(FilterOp::Differs),
            "contains" => Suffix::Filter(FilterOp::Contains),
            "in" => Suffix::Filter(FilterOp::In),
            "less" => Suffix::Filter(FilterOp::Less),
            "greater" => Suffix::Filter(FilterOp::Greater),
            "strictly_less" => Suffix::Filter(FilterOp::StrictlyLess),
            "strictly_greater" => Suffix::Filter(FilterOp::StrictlyGreater),
            "sort" => Suffix::Sort,
            "groupby" => Suffix::GroupBy,
            "count" => Suffix::Aggregate(AggregateFn::Count),
            "sum" => Suffix::Aggregate(AggregateFn::Sum),
            "avg" => Suffix::Aggregate(AggregateFn::Avg),
            "min" => Suffix::Aggregate(AggregateFn::Min),
            "max" => Suffix::Aggregate(AggregateFn::Max),
            _ => return None,
        })
    }

    pub fn token(self) -> &'static str {
        match self {
            Suffix::Filter(FilterOp::Exact) => "exact",
            Suffix::Filter(FilterOp::Differs) => "differs",
            Suffix::Filter(FilterOp::Contains) => "contains",
            Suffix::Filter(FilterOp::In) => "in",
            Suffix::Filter(FilterOp::Less) => "less",
            Suffix::Filter(FilterOp::Greater) => "greater",
            Suffix::Filter(FilterOp::StrictlyLess) => "strictly_less",
            Suffix::Filter(FilterOp::StrictlyGreater) => "strictly_greater",
            Suffix::Sort => "sort",
            Suffix::GroupBy => "groupby",
            Suffix::Aggregate(AggregateFn::Count) => "count",
            Suffix::Aggregate(AggregateFn::Sum) => "sum",
            Suffix::Aggregate(AggregateFn::Avg) => "avg",
            Suffix::Aggregate(AggregateFn::Min) => "min",
            Suffix::Aggregate(AggregateFn::Max) => "max",
        }
    }

    /// Whether this suffix is legal on a column of the given semantic type.
    pub fn allowed_on(self, ty: SemanticType) -> bool {
        match self {
            Suffix::Filter(FilterOp::Contains) => ty == SemanticType::String,
            Suffix::Filter(
                FilterOp::Less | FilterOp::Greater | FilterOp::StrictlyLess | FilterOp::StrictlyGreater,
            ) => ty.is_orderable(),
            Suffix::Filter(FilterOp::Exact | FilterOp::Differs | FilterOp::In) => true,
            Suffix::Sort => true,
            Suffix::GroupBy => true,
            Suffix::Aggregate(AggregateFn::Sum | AggregateFn::Avg) => ty.is_numeric(),
            Suffix::Aggregate(AggregateFn::Count | AggregateFn::Min | AggregateFn::Max) => true,
        }
    }

    /// Whether the key carries a value (`col__exact=5`) or is a bare
    /// presence flag (`col__groupby`, `col__count`, ...).
    pub fn takes_value(self) -> bool {
        matches!(self, Suffix::Filter(_) | Suffix::Sort)
    }
}

/// All suffixes, for enumerating legal operators per column type (swagger
/// generation, exhaustive property tests).
pub const ALL_SUFFIXES: &[Suffix] = &[
    Suffix::Sort,
    Suffix::Filter(FilterOp::Exact),
    Suffix::Filter(FilterOp::Differs),
    Suffix::Filter(FilterOp::Contains),
    Suffix::Filter(FilterOp::In),
    Suffix::Filter(FilterOp::Less),
    Suffix::Filter(FilterOp::Greater),
    Suffix::Filter(FilterOp::StrictlyLess),
    Suffix::Filter(FilterOp::StrictlyGreater),
    Suffix::GroupBy,
    Suffix::Aggregate(AggregateFn::Count),
    Suffix::Aggregate(AggregateFn::Sum),
    Suffix::Aggregate(AggregateFn::Avg),
    Suffix::Aggregate(AggregateFn::Min),
    Suffix::Aggregate(AggregateFn::Max),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_suffix_token() {
        for suffix in ALL_SUFFIXES {
            let token = suffix.token();
            assert_eq!(Suffix::parse(token), Some(*suffix));
        }
    }

    #[test]
    fn unknown_token_is_none() {
        assert_eq!(Suffix::parse("frobnicate"), None);
    }

    #[test]
    fn contains_only_legal_on_string() {
        let suffix = Suffix::Filter(FilterOp::Contains);
        assert!(suffix.allowed_on(SemanticType::String));
        assert!(!suffix.allowed_on(SemanticType::Int));
        assert!(!suffix.allowed_on(SemanticType::Bool));
    }

    #[test]
    fn ordering_ops_require_orderable_type() {
        for suffix in [
            Suffix::Filter(FilterOp::Less),
            Suffix::Filter(FilterOp::Greater),
            Suffix::Filter(FilterOp::StrictlyLess),
            Suffix::Filter(FilterOp::StrictlyGreater),
        ] {
            assert!(suffix.allowed_on(SemanticType::Int));
            assert!(suffix.allowed_on(SemanticType::Float));
            assert!(suffix.allowed_on(SemanticType::Date));
            assert!(suffix.allowed_on(SemanticType::Datetime));
            assert!(!suffix.allowed_on(SemanticType::String));
            assert!(!suffix.allowed_on(SemanticType::Bool));
            assert!(!suffix.allowed_on(SemanticType::Json));
        }
    }

    #[test]
    fn sum_and_avg_require_numeric() {
        assert!(Suffix::Aggregate(AggregateFn::Sum).allowed_on(SemanticType::Int));
        assert!(Suffix::Aggregate(AggregateFn::Sum).allowed_on(SemanticType::Float));
        assert!(!Suffix::Aggregate(AggregateFn::Sum).allowed_on(SemanticType::String));
        assert!(!Suffix::Aggregate(AggregateFn::Avg).allowed_on(SemanticType::Date));
    }

    #[test]
    fn count_min_max_allowed_on_any_type() {
        for ty in [
            SemanticType::String,
            SemanticType::Int,
            SemanticType::Float,
            SemanticType::Bool,
            SemanticType::Date,
            SemanticType::Datetime,
            SemanticType::Json,
        ] {
            assert!(Suffix::Aggregate(AggregateFn::Count).allowed_on(ty));
            assert!(Suffix::Aggregate(AggregateFn::Min).allowed_on(ty));
            assert!(Suffix::Aggregate(AggregateFn::Max).allowed_on(ty));
        }
    }
}
