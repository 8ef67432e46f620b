//! Lowers a validated `QueryPlan` to the downstream dialect (§4.4, §4.4.1):
//! PostgREST-equivalent query parameters, an `order` term per sort, a
//! `select` projection, aggregate-alias expressions, and a `Range` header
//! for pagination.

use crate::domain::ResourceRef;
use crate::error::{GatewayError, GatewayResult};
use crate::query::escaping::escape_identifier;
use crate::query::operators::{AggregateFn, FilterOp, SortDirection};
use crate::query::plan::{aggregate_alias, FilterValue, Projection, QueryPlan};
use serde_json::Value as JsonValue;

/// A request fully lowered to the downstream wire syntax: ready to become a
/// `reqwest::Request` against `<base>/<table>`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRequest {
    pub table: String,
    /// `(key, value)` query parameters, stable client-supplied order for
    /// filters, followed by `order`/`select` if present.
    pub query_params: Vec<(String, String)>,
    pub range_start: u64,
    pub range_end_inclusive: u64,
    pub prefer_exact_count: bool,
}

/// Validate the aggregation-allowed gate (§4.1, §7 `aggregation_not_allowed`).
/// Must run after resource resolution and before compilation.
pub fn require_aggregation_allowed(plan: &QueryPlan, resource: &ResourceRef) -> GatewayResult<()> {
    if plan.is_aggregated() && !resource.aggregation_allowed {
        return Err(GatewayError::AggregationNotAllowed {
            resource_id: resource.resource_id,
        });
    }
    Ok(())
}

pub fn compile(plan: &QueryPlan, table: &str) -> CompiledRequest {
    let mut query_params = Vec::new();

    for filter in &plan.filters {
        let key = escape_identifier(&filter.column);
        let value = compile_filter_value(filter.op, &filter.value);
        query_params.push((key, value));
    }

    if !plan.sorts.is_empty() {
        let order = plan
            .sorts
            .iter()
            .map(|s| {
                let dir = match s.direction {
                    SortDirection::Asc => "asc",
                    SortDirection::Desc => "desc",
                };
                format!("{}.{}", escape_identifier(&s.column), dir)
            })
            .collect::<Vec<_>>()
            .join(",");
        query_params.push(("order".to_string(), order));
    }

    if let Some(select) = compile_select(plan) {
        query_params.push(("select".to_string(), select));
    }

    let offset = (plan.page as u64 - 1) * plan.page_size as u64;
    let range_end_inclusive = offset + plan.page_size as u64 - 1;

    CompiledRequest {
        table: table.to_string(),
        query_params,
        range_start: offset,
        range_end_inclusive,
        prefer_exact_count: true,
    }
}

/// Reserved alias for the probe's forcing aggregate (§4.5). `__`-prefixed,
/// like `domain::SYNTHETIC_ID_COLUMN`, so it can never collide with a real
/// column or a real aggregate alias (those are `<column>__<fn>`, never
/// bare `__<word>`).
const PROBE_COUNT_ALIAS: &str = "__group_count";

/// Build the group-count probe (§4.5): same filters, projected down to the
/// group-by columns plus a forcing `count(...)` aggregate, so the
/// downstream actually performs a `GROUP BY` and its `Content-Range` total
/// reflects the number of distinct group-by tuples rather than raw
/// pre-aggregation row count. A bare `select` of plain columns does NOT
/// trigger grouping at the downstream (§4.4.1) — at least one aggregate
/// function in `select` is required. Skipped by the caller when the plan
/// has aggregates but no `group_by`.
pub fn compile_group_total_probe(plan: &QueryPlan, table: &str) -> CompiledRequest {
    let mut query_params: Vec<(String, String)> = plan
        .filters
        .iter()
        .map(|f| (escape_identifier(&f.column), compile_filter_value(f.op, &f.value)))
        .collect();

    let mut terms: Vec<String> = plan
        .aggregation
        .group_by
        .iter()
        .map(|c| escape_identifier(c))
        .collect();
    let counted_column = escape_identifier(&plan.aggregation.group_by[0]);
    terms.push(format!("{PROBE_COUNT_ALIAS}:count({counted_column})"));
    query_params.push(("select".to_string(), terms.join(",")));

    CompiledRequest {
        table: table.to_string(),
        query_params,
        range_start: 0,
        range_end_inclusive: 0,
        prefer_exact_count: true,
    }
}

fn compile_select(plan: &QueryPlan) -> Option<String> {
    if plan.is_aggregated() {
        let mut terms: Vec<String> = plan
            .aggregation
            .group_by
            .iter()
            .map(|c| escape_identifier(c))
            .collect();
        for agg in &plan.aggregation.aggregates {
            let fn_name = match agg.function {
                AggregateFn::Count => "count",
                AggregateFn::Sum => "sum",
                AggregateFn::Avg => "avg",
                AggregateFn::Min => "min",
                AggregateFn::Max => "max",
            };
            let alias = aggregate_alias(&agg.column, agg.function);
            terms.push(format!("{alias}:{fn_name}({})", escape_identifier(&agg.column)));
        }
        return Some(terms.join(","));
    }

    match &plan.projection {
        Projection::All => None,
        Projection::Columns(cols) => Some(
            cols.iter()
                .map(|c| escape_identifier(c))
                .collect::<Vec<_>>()
                .join(","),
        ),
    }
}

fn compile_filter_value(op: FilterOp, value: &FilterValue) -> String {
    match (op, value) {
        (FilterOp::Exact, FilterValue::Scalar(v)) => format!("eq.{}", format_scalar(v)),
        (FilterOp::Differs, FilterValue::Scalar(v)) => format!("neq.{}", format_scalar(v)),
        (FilterOp::Contains, FilterValue::Scalar(v)) => format!("ilike.*{}*", format_scalar(v)),
        (FilterOp::Less, FilterValue::Scalar(v)) => format!("lte.{}", format_scalar(v)),
        (FilterOp::Greater, FilterValue::Scalar(v)) => format!("gte.{}", format_scalar(v)),
        (FilterOp::StrictlyLess, FilterValue::Scalar(v)) => format!("lt.{}", format_scalar(v)),
        (FilterOp::StrictlyGreater, FilterValue::Scalar(v)) => format!("gt.{}", format_scalar(v)),
        (FilterOp::In, FilterValue::List(values)) => {
            let joined = values.iter().map(format_scalar).collect::<Vec<_>>().join(",");
            format!("in.({joined})")
        }
        _ => unreachable!("parser guarantees value cardinality matches the operator"),
    }
}

fn format_scalar(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ResourceStatus;
    use crate::query::operators::{AggregateFn as AF, FilterOp as FO, SortDirection as SD};
    use crate::query::plan::{AggregateClause, Aggregation, FilterClause, SortClause};
    use serde_json::json;
    use uuid::Uuid;

    fn plan() -> QueryPlan {
        QueryPlan {
            filters: vec![
                FilterClause {
                    column: "score".into(),
                    op: FO::Greater,
                    value: FilterValue::Scalar(json!(0.9)),
                },
                FilterClause {
                    column: "decompte".into(),
                    op: FO::Exact,
                    value: FilterValue::Scalar(json!(13)),
                },
            ],
            sorts: vec![],
            projection: Projection::All,
            aggregation: Aggregation::default(),
            page: 1,
            page_size: 20,
        }
    }

    #[test]
    fn compiles_filters_as_postgrest_operator_prefixes() {
        let compiled = compile(&plan(), "table_abc");
        assert!(compiled
            .query_params
            .contains(&("score".to_string(), "gte.0.9".to_string())));
        assert!(compiled
            .query_params
            .contains(&("decompte".to_string(), "eq.13".to_string())));
    }

    #[test]
    fn omits_select_when_projection_is_all() {
        let compiled = compile(&plan(), "t");
        assert!(!compiled.query_params.iter().any(|(k, _)| k == "select"));
    }

    #[test]
    fn range_header_reflects_page_and_page_size() {
        let mut p = plan();
        p.page = 3;
        p.page_size = 10;
        let compiled = compile(&p, "t");
        assert_eq!(compiled.range_start, 20);
        assert_eq!(compiled.range_end_inclusive, 29);
    }

    #[test]
    fn contains_wraps_value_in_wildcards_for_ilike() {
        let mut p = plan();
        p.filters = vec![FilterClause {
            column: "liste".into(),
            op: FO::Contains,
            value: FilterValue::Scalar(json!("abc")),
        }];
        let compiled = compile(&p, "t");
        assert!(compiled
            .query_params
            .contains(&("liste".to_string(), "ilike.*abc*".to_string())));
    }

    #[test]
    fn in_filter_renders_comma_delimited_set() {
        let mut p = plan();
        p.filters = vec![FilterClause {
            column: "decompte".into(),
            op: FO::In,
            value: FilterValue::List(vec![json!(1), json!(2), json!(3)]),
        }];
        let compiled = compile(&p, "t");
        assert!(compiled
            .query_params
            .contains(&("decompte".to_string(), "in.(1,2,3)".to_string())));
    }

    #[test]
    fn exotic_column_name_is_quoted_in_order_and_select() {
        let mut p = plan();
        p.filters = vec![];
        p.sorts = vec![SortClause { column: "first name".into(), direction: SD::Desc }];
        p.projection = Projection::Columns(vec!["first name".into()]);
        let compiled = compile(&p, "t");
        assert!(compiled
            .query_params
            .contains(&("order".to_string(), "\"first name\".desc".to_string())));
        assert!(compiled
            .query_params
            .contains(&("select".to_string(), "\"first name\"".to_string())));
    }

    #[test]
    fn aggregation_select_emits_group_by_and_aliased_aggregates() {
        let mut p = plan();
        p.filters = vec![];
        p.aggregation = Aggregation {
            group_by: vec!["decompte".into()],
            aggregates: vec![AggregateClause { column: "score".into(), function: AF::Avg }],
        };
        let compiled = compile(&p, "t");
        let select = compiled
            .query_params
            .iter()
            .find(|(k, _)| k == "select")
            .unwrap()
            .1
            .clone();
        assert_eq!(select, "decompte,score__avg:avg(score)");
    }

    #[test]
    fn group_total_probe_selects_group_columns_plus_forcing_count() {
        let mut p = plan();
        p.filters = vec![];
        p.aggregation = Aggregation {
            group_by: vec!["decompte".into()],
            aggregates: vec![AggregateClause { column: "score".into(), function: AF::Avg }],
        };
        let probe = compile_group_total_probe(&p, "t");
        assert!(probe.query_params.contains(&(
            "select".to_string(),
            "decompte,__group_count:count(decompte)".to_string()
        )));
        assert_eq!(probe.range_start, 0);
        assert_eq!(probe.range_end_inclusive, 0);
    }

    #[test]
    fn aggregation_gate_rejects_disallowed_resource() {
        let resource = ResourceRef {
            resource_id: Uuid::nil(),
            table_name: "t".into(),
            status: ResourceStatus::Ok,
            dataset_id: None,
            aggregation_allowed: false,
            url: None,
            created_at: None,
        };
        let mut p = plan();
        p.filters = vec![];
        p.aggregation = Aggregation {
            group_by: vec!["decompte".into()],
            aggregates: vec![],
        };
        let err = require_aggregation_allowed(&p, &resource).unwrap_err();
        assert!(matches!(err, GatewayError::AggregationNotAllowed { .. }));
    }
}
