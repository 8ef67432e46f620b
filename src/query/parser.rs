//! Turns the flat `key=value` multimap of a request's query string into a
//! validated `QueryPlan` (§4.3). Aggregation-allowed gating is deliberately
//! NOT performed here — it depends on the resolved `ResourceRef`, which the
//! caller resolves before parsing (§5 ordering); see
//! `query::compiler::require_aggregation_allowed`.

use crate::domain::{Profile, SemanticType};
use crate::error::{GatewayError, GatewayResult};
use crate::query::operators::{AggregateFn, FilterOp, SortDirection, Suffix};
use crate::query::plan::{
    AggregateClause, Aggregation, FilterClause, FilterValue, Projection, QueryPlan, SortClause,
};
use chrono::{DateTime, NaiveDate};
use serde_json::{Number, Value as JsonValue};

const RESERVED_PAGE: &str = "page";
const RESERVED_PAGE_SIZE: &str = "page_size";
const RESERVED_COLUMNS: &str = "columns";

/// Parse a raw (already percent-decoded) `key=value` pair list, in the order
/// they appeared on the wire, into a `QueryPlan` validated against `profile`.
pub fn parse_plan(
    pairs: &[(String, String)],
    profile: &Profile,
    page_size_default: u32,
    page_size_max: u32,
) -> GatewayResult<QueryPlan> {
    let mut page: u32 = 1;
    let mut page_size: u32 = page_size_default;
    let mut columns_raw: Option<String> = None;
    let mut filters = Vec::new();
    let mut sorts = Vec::new();
    let mut aggregation = Aggregation::default();

    for (key, value) in pairs {
        match key.as_str() {
            RESERVED_PAGE => {
                page = parse_positive_int(key, value)?;
            }
            RESERVED_PAGE_SIZE => {
                page_size = parse_positive_int(key, value)?;
            }
            RESERVED_COLUMNS => {
                columns_raw = Some(value.clone());
            }
            _ => {
                let Some((column, suffix)) = split_suffix(key) else {
                    // No recognized `__<suffix>` tail: reserved extension
                    // surface, ignored per §4.3.
                    continue;
                };

                if !profile.has_column(&column) {
                    return Err(GatewayError::InvalidParameter {
                        column,
                        suffix: suffix.token().to_string(),
                    });
                }
                let ty = profile.semantic_type_of(&column).unwrap();
                if !suffix.allowed_on(ty) {
                    return Err(GatewayError::InvalidParameter {
                        column,
                        suffix: suffix.token().to_string(),
                    });
                }

                match suffix {
                    Suffix::Filter(op) => {
                        let parsed_value = parse_filter_value(&column, suffix, op, ty, value)?;
                        filters.push(FilterClause {
                            column,
                            op,
                            value: parsed_value,
                        });
                    }
                    Suffix::Sort => {
                        let direction = parse_direction(&column, value)?;
                        sorts.push(SortClause { column, direction });
                    }
                    Suffix::GroupBy => {
                        aggregation.group_by.push(column);
                    }
                    Suffix::Aggregate(function) => {
                        aggregation.aggregates.push(AggregateClause { column, function });
                    }
                }
            }
        }
    }

    if page_size < 1 || page_size > page_size_max {
        return Err(GatewayError::InvalidValue {
            column: "page_size".to_string(),
            suffix: "page_size".to_string(),
            value: page_size.to_string(),
        });
    }
    if page < 1 {
        return Err(GatewayError::InvalidValue {
            column: "page".to_string(),
            suffix: "page".to_string(),
            value: page.to_string(),
        });
    }

    if !aggregation.is_empty() && !sorts.is_empty() {
        let offender = &sorts[0];
        return Err(GatewayError::InvalidParameter {
            column: offender.column.clone(),
            suffix: "sort".to_string(),
        });
    }

    let projection = resolve_projection(columns_raw, &aggregation, profile)?;

    Ok(QueryPlan {
        filters,
        sorts,
        projection,
        aggregation,
        page,
        page_size,
    })
}

fn resolve_projection(
    columns_raw: Option<String>,
    aggregation: &Aggregation,
    profile: &Profile,
) -> GatewayResult<Projection> {
    let requested: Option<Vec<String>> = columns_raw.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    });

    if !aggregation.is_empty() {
        let allowed = aggregation.result_columns();
        if let Some(requested) = &requested {
            for col in requested {
                if !allowed.contains(col) {
                    return Err(GatewayError::InvalidParameter {
                        column: col.clone(),
                        suffix: "columns".to_string(),
                    });
                }
            }
            return Ok(Projection::Columns(requested.clone()));
        }
        return Ok(Projection::Columns(allowed));
    }

    match requested {
        None => Ok(Projection::All),
        Some(cols) => {
            for col in &cols {
                if !profile.has_column(col) {
                    return Err(GatewayError::InvalidParameter {
                        column: col.clone(),
                        suffix: "columns".to_string(),
                    });
                }
            }
            Ok(Projection::Columns(cols))
        }
    }
}

/// Split `<column>__<suffix>` by matching against the closed suffix table,
/// longest token first so no suffix can be shadowed by a shorter one.
fn split_suffix(key: &str) -> Option<(String, Suffix)> {
    let mut candidates: Vec<Suffix> = crate::query::operators::ALL_SUFFIXES.to_vec();
    candidates.sort_by_key(|s| std::cmp::Reverse(s.token().len()));
    for suffix in candidates {
        let marker = format!("__{}", suffix.token());
        if let Some(column) = key.strip_suffix(&marker) {
            if !column.is_empty() {
                return Some((column.to_string(), suffix));
            }
        }
    }
    None
}

fn parse_positive_int(key: &str, value: &str) -> GatewayResult<u32> {
    value
        .parse::<u32>()
        .map_err(|_| GatewayError::InvalidValue {
            column: key.to_string(),
            suffix: key.to_string(),
            value: value.to_string(),
        })
}

fn parse_direction(column: &str, value: &str) -> GatewayResult<SortDirection> {
    match value {
        "asc" => Ok(SortDirection::Asc),
        "desc" => Ok(SortDirection::Desc),
        _ => Err(GatewayError::InvalidValue {
            column: column.to_string(),
            suffix: "sort".to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_filter_value(
    column: &str,
    suffix: Suffix,
    op: FilterOp,
    ty: SemanticType,
    raw: &str,
) -> GatewayResult<FilterValue> {
    if op == FilterOp::In {
        let values = raw
            .split(',')
            .map(|token| parse_scalar(ty, token))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|bad| GatewayError::InvalidValue {
                column: column.to_string(),
                suffix: suffix.token().to_string(),
                value: bad,
            })?;
        return Ok(FilterValue::List(values));
    }
    parse_scalar(ty, raw)
        .map(FilterValue::Scalar)
        .map_err(|bad| GatewayError::InvalidValue {
            column: column.to_string(),
            suffix: suffix.token().to_string(),
            value: bad,
        })
}

/// Parse a raw string into the JSON representation of `ty`. Errors return
/// the offending raw token for the caller to wrap into `InvalidValue`.
fn parse_scalar(ty: SemanticType, raw: &str) -> Result<JsonValue, String> {
    match ty {
        SemanticType::String => Ok(JsonValue::String(raw.to_string())),
        SemanticType::Int => raw
            .parse::<i64>()
            .map(|n| JsonValue::Number(Number::from(n)))
            .map_err(|_| raw.to_string()),
        SemanticType::Float => raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(JsonValue::Number)
            .ok_or_else(|| raw.to_string()),
        SemanticType::Bool => match raw {
            "true" => Ok(JsonValue::Bool(true)),
            "false" => Ok(JsonValue::Bool(false)),
            _ => Err(raw.to_string()),
        },
        SemanticType::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(|_| JsonValue::String(raw.to_string()))
            .map_err(|_| raw.to_string()),
        SemanticType::Datetime => DateTime::parse_from_rfc3339(raw)
            .map(|_| JsonValue::String(raw.to_string()))
            .map_err(|_| raw.to_string()),
        SemanticType::Json => serde_json::from_str(raw).map_err(|_| raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProfileColumn;

    fn profile() -> Profile {
        Profile {
            columns: vec![
                ProfileColumn { name: "id".into(), semantic_type: SemanticType::String },
                ProfileColumn { name: "score".into(), semantic_type: SemanticType::Float },
                ProfileColumn { name: "decompte".into(), semantic_type: SemanticType::Int },
                ProfileColumn { name: "is_true".into(), semantic_type: SemanticType::Bool },
                ProfileColumn { name: "birth".into(), semantic_type: SemanticType::Date },
                ProfileColumn { name: "liste".into(), semantic_type: SemanticType::String },
            ],
            metadata: JsonValue::Null,
        }
    }

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn scenario_1_exact_and_greater() {
        let plan = parse_plan(
            &pairs(&[("score__greater", "0.9"), ("decompte__exact", "13")]),
            &profile(),
            20,
            50,
        )
        .unwrap();
        assert_eq!(plan.filters.len(), 2);
        assert_eq!(plan.page, 1);
        assert_eq!(plan.page_size, 20);
    }

    #[test]
    fn unknown_key_without_separator_is_ignored() {
        let plan = parse_plan(&pairs(&[("format", "json")]), &profile(), 20, 50).unwrap();
        assert!(plan.filters.is_empty());
    }

    #[test]
    fn rejects_contains_on_non_string_column() {
        let err = parse_plan(&pairs(&[("score__contains", "abc")]), &profile(), 20, 50)
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidParameter { .. }));
    }

    #[test]
    fn rejects_unknown_column() {
        let err = parse_plan(&pairs(&[("nope__exact", "1")]), &profile(), 20, 50).unwrap_err();
        match err {
            GatewayError::InvalidParameter { column, suffix } => {
                assert_eq!(column, "nope");
                assert_eq!(suffix, "exact");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_scalar_value() {
        let err = parse_plan(&pairs(&[("decompte__exact", "thirteen")]), &profile(), 20, 50)
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidValue { .. }));
    }

    #[test]
    fn columns_projection_round_trips() {
        let plan = parse_plan(&pairs(&[("columns", "id,score")]), &profile(), 20, 50).unwrap();
        assert_eq!(
            plan.projection,
            Projection::Columns(vec!["id".to_string(), "score".to_string()])
        );
    }

    #[test]
    fn sort_rejected_alongside_aggregation() {
        let err = parse_plan(
            &pairs(&[("decompte__groupby", ""), ("score__sort", "asc")]),
            &profile(),
            20,
            50,
        )
        .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidParameter { .. }));
    }

    #[test]
    fn aggregation_projection_defaults_to_group_and_aggregate_columns() {
        let plan = parse_plan(
            &pairs(&[("decompte__groupby", ""), ("score__avg", "")]),
            &profile(),
            20,
            50,
        )
        .unwrap();
        assert_eq!(
            plan.projection,
            Projection::Columns(vec!["decompte".to_string(), "score__avg".to_string()])
        );
    }

    #[test]
    fn in_filter_parses_comma_list() {
        let plan = parse_plan(&pairs(&[("decompte__in", "1,2,3")]), &profile(), 20, 50).unwrap();
        match &plan.filters[0].value {
            FilterValue::List(values) => assert_eq!(values.len(), 3),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn page_size_above_max_is_rejected() {
        let err = parse_plan(&pairs(&[("page_size", "1000")]), &profile(), 20, 50).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidValue { .. }));
    }

    #[test]
    fn suffix_matching_prefers_longest_token() {
        let plan = parse_plan(&pairs(&[("score__strictly_greater", "1.0")]), &profile(), 20, 50)
            .unwrap();
        assert_eq!(plan.filters[0].op, FilterOp::StrictlyGreater);
    }
}
